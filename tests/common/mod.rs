use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A well-formed version 1 insert for project 1, group 2.
#[allow(dead_code)]
pub fn insert_payload(event_id: &str) -> String {
    format!(
        r#"[1, "insert", {{
            "project_id": 1,
            "group_id": 2,
            "event_id": "{event_id}",
            "message": "hello world",
            "platform": "python",
            "datetime": "2019-01-01T12:00:00+02:00",
            "data": {{"tags": [["level", "error"]]}},
            "extra": {{"from": "test"}},
            "primary_hash": "49f68a5c8493ec2c0bf489821c21fc3b"
        }}, {{
            "is_new": true,
            "is_sample": false,
            "is_regression": false,
            "is_new_group_environment": true
        }}]"#
    )
}

#[allow(dead_code)]
pub fn temp_payload_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let path = temp_dir.path().join("payload.json");
    fs::write(&path, contents).expect("failed to write payload file");
    (temp_dir, path)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("eventrelay.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
