//! Versioned event-change messages carried on the event-stream topic.
//!
//! Every message is a JSON array envelope:
//!
//! ```text
//! [version, operation, ...operation specific fields]
//! ```
//!
//! Only version `1` is understood. Within version 1 the `insert` operation is
//! decoded into an [`EventChange`]; any other operation is recognized but
//! reported as [`ParsedMessage::Ignored`].
//!
//! # Example
//!
//! ```rust
//! use eventrelay::eventstream::kafka::message::{parse_event_message, ParsedMessage};
//!
//! let payload = br#"[1, "delete", {}, {}]"#;
//! let parsed = parse_event_message(payload).unwrap();
//! assert!(matches!(parsed, ParsedMessage::Ignored { .. }));
//! ```

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// The only envelope version this decoder understands.
pub const SUPPORTED_VERSION: i64 = 1;

/// Number of envelope elements every version 1 message carries.
const VERSION_1_ARITY: usize = 4;

/// Errors that can occur while decoding a message payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The payload is malformed or does not match the expected schema.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The envelope carries a version this decoder does not understand.
    #[error("Unsupported message version: {0}")]
    InvalidVersion(i64),
}

/// An event as it is handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Project the event belongs to.
    pub project_id: u64,

    /// Group (issue) the event was assigned to.
    pub group_id: u64,

    /// Hex event identifier.
    pub event_id: String,

    /// Event message text.
    pub message: String,

    /// Platform tag (e.g. "python").
    pub platform: String,

    /// When the event occurred, normalized to UTC with microsecond precision.
    pub datetime: DateTime<Utc>,

    /// Opaque event data.
    pub data: Map<String, JsonValue>,

    /// Opaque extra payload attached by the producer.
    pub extra: Map<String, JsonValue>,
}

/// A decoded version 1 `insert` message.
///
/// The fields are flat so a persistence layer can consume them without
/// knowing anything about the wire envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventChange {
    /// The event being inserted.
    pub event: Event,

    /// Primary grouping hash.
    pub primary_hash: String,

    /// The event created a new group.
    pub is_new: bool,

    /// The event was sampled.
    pub is_sample: bool,

    /// The event reopened a resolved group.
    pub is_regression: bool,

    /// First event of the group in this environment.
    pub is_new_group_environment: bool,
}

/// Outcome of successfully decoding a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedMessage {
    /// A version 1 insert.
    Insert(Box<EventChange>),

    /// A recognized operation this consumer deliberately does not materialize.
    Ignored {
        /// The operation name carried by the envelope.
        operation: String,
    },
}

/// Wire shape of the version 1 insert event body.
#[derive(Debug, Serialize)]
struct EventData {
    project_id: u64,
    group_id: u64,
    event_id: String,
    message: String,
    platform: String,
    datetime: String,
    data: Map<String, JsonValue>,
    extra: Map<String, JsonValue>,
    primary_hash: String,
}

/// Wire shape of the version 1 insert task state.
#[derive(Debug, Serialize)]
struct TaskState {
    is_new: bool,
    is_sample: bool,
    is_regression: bool,
    is_new_group_environment: bool,
}

/// Decodes one raw message payload.
///
/// Decoding is all-or-nothing: either a complete [`ParsedMessage`] is
/// returned or a [`DecodeError`] describing the first problem found.
///
/// # Errors
///
/// Returns `DecodeError::InvalidPayload` when the payload is not a JSON array
/// of at least two elements starting with an integer version and a string
/// operation, when a version 1 envelope has the wrong arity, or when an
/// insert body is missing keys or carries mistyped values.
///
/// Returns `DecodeError::InvalidVersion` for any version other than 1.
///
/// # Example
///
/// ```rust
/// use eventrelay::eventstream::kafka::message::{parse_event_message, DecodeError};
///
/// let result = parse_event_message(br#"[0, "insert", {}]"#);
/// assert_eq!(result, Err(DecodeError::InvalidVersion(0)));
/// ```
pub fn parse_event_message(payload: &[u8]) -> Result<ParsedMessage, DecodeError> {
    let value: JsonValue = serde_json::from_slice(payload)
        .map_err(|e| DecodeError::InvalidPayload(format!("not valid JSON: {}", e)))?;

    let mut elements = match value {
        JsonValue::Array(elements) if elements.len() >= 2 => elements,
        JsonValue::Array(elements) => {
            return Err(DecodeError::InvalidPayload(format!(
                "envelope must have at least 2 elements, got {}",
                elements.len()
            )))
        }
        other => {
            return Err(DecodeError::InvalidPayload(format!(
                "envelope must be an array, got {}",
                json_type_name(&other)
            )))
        }
    };

    let version = elements[0].as_i64().ok_or_else(|| {
        DecodeError::InvalidPayload(format!(
            "envelope version must be an integer, got {}",
            json_type_name(&elements[0])
        ))
    })?;

    let operation = match &elements[1] {
        JsonValue::String(operation) => operation.clone(),
        other => {
            return Err(DecodeError::InvalidPayload(format!(
                "envelope operation must be a string, got {}",
                json_type_name(other)
            )))
        }
    };

    if version != SUPPORTED_VERSION {
        return Err(DecodeError::InvalidVersion(version));
    }

    if elements.len() != VERSION_1_ARITY {
        return Err(DecodeError::InvalidPayload(format!(
            "version 1 envelope must have {} elements, got {}",
            VERSION_1_ARITY,
            elements.len()
        )));
    }

    if operation != "insert" {
        return Ok(ParsedMessage::Ignored { operation });
    }

    let task_state = elements.pop().unwrap_or(JsonValue::Null);
    let event_data = elements.pop().unwrap_or(JsonValue::Null);

    let mut event_data = Section::new("event data", event_data)?;
    let mut task_state = Section::new("task state", task_state)?;

    let raw_datetime = event_data.string("datetime")?;
    let event = Event {
        project_id: event_data.unsigned("project_id")?,
        group_id: event_data.unsigned("group_id")?,
        event_id: event_data.string("event_id")?,
        message: event_data.string("message")?,
        platform: event_data.string("platform")?,
        datetime: parse_datetime(&raw_datetime)?,
        data: event_data.object("data")?,
        extra: event_data.object("extra")?,
    };

    Ok(ParsedMessage::Insert(Box::new(EventChange {
        event,
        primary_hash: event_data.string("primary_hash")?,
        is_new: task_state.boolean("is_new")?,
        is_sample: task_state.boolean("is_sample")?,
        is_regression: task_state.boolean("is_regression")?,
        is_new_group_environment: task_state.boolean("is_new_group_environment")?,
    })))
}

/// One object element of an insert envelope, consumed key by key.
///
/// Errors name the section and the offending key. Keys that are never
/// taken are ignored.
struct Section {
    name: &'static str,
    fields: Map<String, JsonValue>,
}

impl Section {
    fn new(name: &'static str, value: JsonValue) -> Result<Self, DecodeError> {
        match value {
            JsonValue::Object(fields) => Ok(Self { name, fields }),
            other => Err(DecodeError::InvalidPayload(format!(
                "{} must be an object, got {}",
                name,
                json_type_name(&other)
            ))),
        }
    }

    fn take(&mut self, key: &str) -> Result<JsonValue, DecodeError> {
        self.fields.remove(key).ok_or_else(|| {
            DecodeError::InvalidPayload(format!("{}: missing key {:?}", self.name, key))
        })
    }

    fn mistyped(&self, key: &str, expected: &str, found: &JsonValue) -> DecodeError {
        DecodeError::InvalidPayload(format!(
            "{}: key {:?} must be {}, got {}",
            self.name,
            key,
            expected,
            json_type_name(found)
        ))
    }

    fn unsigned(&mut self, key: &str) -> Result<u64, DecodeError> {
        let value = self.take(key)?;
        value
            .as_u64()
            .ok_or_else(|| self.mistyped(key, "an unsigned integer", &value))
    }

    fn string(&mut self, key: &str) -> Result<String, DecodeError> {
        match self.take(key)? {
            JsonValue::String(value) => Ok(value),
            other => Err(self.mistyped(key, "a string", &other)),
        }
    }

    fn boolean(&mut self, key: &str) -> Result<bool, DecodeError> {
        match self.take(key)? {
            JsonValue::Bool(value) => Ok(value),
            other => Err(self.mistyped(key, "a boolean", &other)),
        }
    }

    fn object(&mut self, key: &str) -> Result<Map<String, JsonValue>, DecodeError> {
        match self.take(key)? {
            JsonValue::Object(value) => Ok(value),
            other => Err(self.mistyped(key, "an object", &other)),
        }
    }
}

/// Encodes an [`EventChange`] as a version 1 `insert` envelope.
///
/// This is the inverse of [`parse_event_message`] for inserts.
pub fn encode_insert(change: &EventChange) -> Result<Vec<u8>, serde_json::Error> {
    let event_data = EventData {
        project_id: change.event.project_id,
        group_id: change.event.group_id,
        event_id: change.event.event_id.clone(),
        message: change.event.message.clone(),
        platform: change.event.platform.clone(),
        datetime: change
            .event
            .datetime
            .to_rfc3339_opts(SecondsFormat::Micros, true),
        data: change.event.data.clone(),
        extra: change.event.extra.clone(),
        primary_hash: change.primary_hash.clone(),
    };
    let task_state = TaskState {
        is_new: change.is_new,
        is_sample: change.is_sample,
        is_regression: change.is_regression,
        is_new_group_environment: change.is_new_group_environment,
    };

    serde_json::to_vec(&(SUPPORTED_VERSION, "insert", event_data, task_state))
}

/// Parses an ISO-8601 timestamp into UTC.
///
/// Zone-less timestamps are taken to be UTC already. Fractional seconds
/// beyond microseconds are truncated, the precision [`encode_insert`] writes.
fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, DecodeError> {
    let parsed = match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| {
                DecodeError::InvalidPayload(format!(
                    "event data: key \"datetime\" is not an ISO-8601 timestamp ({:?}): {}",
                    raw, e
                ))
            })?,
    };

    Ok(parsed.trunc_subsecs(6))
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn event_data() -> JsonValue {
        json!({
            "project_id": 1,
            "group_id": 2,
            "event_id": "00000000000010008080808080808080",
            "message": "message",
            "platform": "python",
            "datetime": "2018-07-20T21:04:27.600640Z",
            "data": {},
            "extra": {},
            "primary_hash": "49f68a5c8493ec2c0bf489821c21fc3b"
        })
    }

    fn task_state() -> JsonValue {
        json!({
            "is_new": true,
            "is_sample": false,
            "is_regression": false,
            "is_new_group_environment": true
        })
    }

    fn encode(value: JsonValue) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    fn expect_invalid_payload(payload: &[u8]) -> String {
        match parse_event_message(payload) {
            Err(DecodeError::InvalidPayload(reason)) => reason,
            other => panic!("expected InvalidPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_invalid_payload_object() {
        expect_invalid_payload(br#"{"format": "invalid"}"#);
    }

    #[test]
    fn test_parse_invalid_payload_not_json() {
        let reason = expect_invalid_payload(b"not json at all");
        assert!(reason.contains("not valid JSON"));
    }

    #[test]
    fn test_parse_invalid_payload_short_envelope() {
        expect_invalid_payload(b"[1]");
        expect_invalid_payload(b"[]");
    }

    #[test]
    fn test_parse_invalid_payload_version_not_integer() {
        let reason = expect_invalid_payload(br#"["1", "insert", {}, {}]"#);
        assert!(reason.contains("version"));
        expect_invalid_payload(br#"[1.5, "insert", {}, {}]"#);
    }

    #[test]
    fn test_parse_invalid_payload_operation_not_string() {
        let reason = expect_invalid_payload(br#"[1, 7, {}, {}]"#);
        assert!(reason.contains("operation"));
    }

    #[test]
    fn test_parse_invalid_version() {
        let result = parse_event_message(&encode(json!([0, "insert", {}])));
        assert_eq!(result, Err(DecodeError::InvalidVersion(0)));
    }

    #[test]
    fn test_parse_invalid_version_is_checked_before_arity() {
        let result = parse_event_message(&encode(json!([2, "insert"])));
        assert_eq!(result, Err(DecodeError::InvalidVersion(2)));
    }

    #[test]
    fn test_parse_version_1_insert() {
        let payload = encode(json!([1, "insert", event_data(), task_state()]));

        let change = match parse_event_message(&payload).unwrap() {
            ParsedMessage::Insert(change) => change,
            other => panic!("expected insert, got {:?}", other),
        };

        let event = &change.event;
        assert_eq!(event.project_id, 1);
        assert_eq!(event.group_id, 2);
        assert_eq!(event.event_id, "00000000000010008080808080808080");
        assert_eq!(event.message, "message");
        assert_eq!(event.platform, "python");
        assert_eq!(
            event.datetime,
            Utc.with_ymd_and_hms(2018, 7, 20, 21, 4, 27).unwrap()
                + chrono::Duration::microseconds(600_640)
        );
        assert!(event.data.is_empty());
        assert!(event.extra.is_empty());

        assert_eq!(change.primary_hash, "49f68a5c8493ec2c0bf489821c21fc3b");
        assert!(change.is_new);
        assert!(!change.is_sample);
        assert!(!change.is_regression);
        assert!(change.is_new_group_environment);
    }

    #[test]
    fn test_parse_version_1_insert_output_fields() {
        let payload = encode(json!([1, "insert", event_data(), task_state()]));
        let ParsedMessage::Insert(change) = parse_event_message(&payload).unwrap() else {
            panic!("expected insert");
        };

        let serialized = serde_json::to_value(&change).unwrap();
        let mut keys: Vec<_> = serialized.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "event",
                "is_new",
                "is_new_group_environment",
                "is_regression",
                "is_sample",
                "primary_hash",
            ]
        );

        let mut event_keys: Vec<_> = serialized["event"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        event_keys.sort();
        assert_eq!(
            event_keys,
            vec![
                "data",
                "datetime",
                "event_id",
                "extra",
                "group_id",
                "message",
                "platform",
                "project_id",
            ]
        );
    }

    #[test]
    fn test_parse_version_1_unsupported_operation() {
        let result = parse_event_message(&encode(json!([1, "delete", {}, {}])));
        assert_eq!(
            result,
            Ok(ParsedMessage::Ignored {
                operation: "delete".to_string()
            })
        );
    }

    #[test]
    fn test_parse_version_1_unsupported_operation_wrong_arity() {
        expect_invalid_payload(&encode(json!([1, "delete"])));
        expect_invalid_payload(&encode(json!([1, "delete", {}, {}, {}])));
    }

    #[test]
    fn test_parse_insert_missing_key() {
        let mut data = event_data();
        data.as_object_mut().unwrap().remove("primary_hash");

        let reason = expect_invalid_payload(&encode(json!([1, "insert", data, task_state()])));
        assert!(reason.contains("primary_hash"), "reason was: {}", reason);
    }

    #[test]
    fn test_parse_insert_task_state_wrong_type() {
        let mut state = task_state();
        state["is_sample"] = json!("false");

        let reason = expect_invalid_payload(&encode(json!([1, "insert", event_data(), state])));
        assert!(reason.starts_with("task state"), "reason was: {}", reason);
        assert!(reason.contains("is_sample"), "reason was: {}", reason);
        assert!(reason.contains("a boolean"), "reason was: {}", reason);
    }

    #[test]
    fn test_parse_insert_event_data_wrong_types_name_the_key() {
        for (key, value) in [
            ("project_id", json!("1")),
            ("group_id", json!(-2)),
            ("event_id", json!(42)),
            ("datetime", json!(1532120667)),
            ("primary_hash", json!(null)),
            ("extra", json!([])),
        ] {
            let mut data = event_data();
            data[key] = value;

            let reason = expect_invalid_payload(&encode(json!([1, "insert", data, task_state()])));
            assert!(reason.starts_with("event data"), "reason was: {}", reason);
            assert!(
                reason.contains(&format!("{:?}", key)),
                "reason for {} was: {}",
                key,
                reason
            );
        }
    }

    #[test]
    fn test_parse_insert_missing_task_state_key() {
        let mut state = task_state();
        state.as_object_mut().unwrap().remove("is_regression");

        let reason = expect_invalid_payload(&encode(json!([1, "insert", event_data(), state])));
        assert!(reason.contains("is_regression"), "reason was: {}", reason);
    }

    #[test]
    fn test_parse_insert_sections_must_be_objects() {
        let reason = expect_invalid_payload(&encode(json!([1, "insert", [], task_state()])));
        assert_eq!(reason, "event data must be an object, got array");

        let reason = expect_invalid_payload(&encode(json!([1, "insert", event_data(), "yes"])));
        assert_eq!(reason, "task state must be an object, got string");
    }

    #[test]
    fn test_parse_insert_data_must_be_object() {
        let mut data = event_data();
        data["data"] = json!([1, 2, 3]);

        expect_invalid_payload(&encode(json!([1, "insert", data, task_state()])));
    }

    #[test]
    fn test_parse_insert_bad_datetime() {
        let mut data = event_data();
        data["datetime"] = json!("yesterday afternoon");

        let reason = expect_invalid_payload(&encode(json!([1, "insert", data, task_state()])));
        assert!(reason.contains("datetime"));
    }

    #[test]
    fn test_parse_insert_datetime_with_offset_is_normalized() {
        let mut data = event_data();
        data["datetime"] = json!("2018-07-20T23:04:27+02:00");

        let payload = encode(json!([1, "insert", data, task_state()]));
        let ParsedMessage::Insert(change) = parse_event_message(&payload).unwrap() else {
            panic!("expected insert");
        };
        assert_eq!(
            change.event.datetime,
            Utc.with_ymd_and_hms(2018, 7, 20, 21, 4, 27).unwrap()
        );
    }

    #[test]
    fn test_parse_insert_naive_datetime_is_utc() {
        let mut data = event_data();
        data["datetime"] = json!("2018-07-20T21:04:27.5");

        let payload = encode(json!([1, "insert", data, task_state()]));
        let ParsedMessage::Insert(change) = parse_event_message(&payload).unwrap() else {
            panic!("expected insert");
        };
        assert_eq!(
            change.event.datetime,
            Utc.with_ymd_and_hms(2018, 7, 20, 21, 4, 27).unwrap()
                + chrono::Duration::milliseconds(500)
        );
    }

    #[test]
    fn test_parse_insert_tolerates_unknown_keys() {
        let mut data = event_data();
        data["received"] = json!(1532120667.6);

        let payload = encode(json!([1, "insert", data, task_state()]));
        assert!(matches!(
            parse_event_message(&payload),
            Ok(ParsedMessage::Insert(_))
        ));
    }

    #[test]
    fn test_parse_insert_preserves_opaque_data() {
        let mut data = event_data();
        data["data"] = json!({"tags": [["level", "error"]], "sdk": {"name": "raven"}});
        data["extra"] = json!({"retry": 3});

        let payload = encode(json!([1, "insert", data, task_state()]));
        let ParsedMessage::Insert(change) = parse_event_message(&payload).unwrap() else {
            panic!("expected insert");
        };
        assert_eq!(change.event.data["sdk"]["name"], "raven");
        assert_eq!(change.event.extra["retry"], 3);
    }

    #[test]
    fn test_encode_insert_roundtrip() {
        let payload = encode(json!([1, "insert", event_data(), task_state()]));
        let ParsedMessage::Insert(change) = parse_event_message(&payload).unwrap() else {
            panic!("expected insert");
        };

        let encoded = encode_insert(&change).unwrap();
        assert_eq!(
            parse_event_message(&encoded),
            Ok(ParsedMessage::Insert(change))
        );
    }

    #[test]
    fn test_parse_insert_nanosecond_datetime_roundtrips() {
        let mut data = event_data();
        data["datetime"] = json!("2018-07-20T21:04:27.123456789Z");

        let payload = encode(json!([1, "insert", data, task_state()]));
        let ParsedMessage::Insert(change) = parse_event_message(&payload).unwrap() else {
            panic!("expected insert");
        };
        assert_eq!(change.event.datetime.timestamp_subsec_nanos(), 123_456_000);

        let encoded = encode_insert(&change).unwrap();
        assert_eq!(
            parse_event_message(&encoded),
            Ok(ParsedMessage::Insert(change))
        );
    }

    #[test]
    fn test_encode_insert_datetime_format() {
        let payload = encode(json!([1, "insert", event_data(), task_state()]));
        let ParsedMessage::Insert(change) = parse_event_message(&payload).unwrap() else {
            panic!("expected insert");
        };

        let encoded: JsonValue = serde_json::from_slice(&encode_insert(&change).unwrap()).unwrap();
        assert_eq!(encoded[0], 1);
        assert_eq!(encoded[1], "insert");
        assert_eq!(encoded[2]["datetime"], "2018-07-20T21:04:27.600640Z");
    }

    #[test]
    fn test_decode_error_display() {
        assert_eq!(
            DecodeError::InvalidVersion(3).to_string(),
            "Unsupported message version: 3"
        );
        assert_eq!(
            DecodeError::InvalidPayload("bad".to_string()).to_string(),
            "Invalid payload: bad"
        );
    }
}
