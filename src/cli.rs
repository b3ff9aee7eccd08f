//! Command-line interface definition for EventRelay
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to run the relay and to decode single payloads.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// EventRelay - Kafka event-change relay
///
/// Joins one consumer per topic and decodes versioned event-change
/// messages.
#[derive(Parser, Debug, Clone)]
#[command(name = "eventrelay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/eventrelay.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for EventRelay
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Consume the configured topics and relay decoded events
    Run {
        /// Kafka brokers, comma-separated
        #[arg(short, long)]
        brokers: Option<String>,

        /// Topic to consume (repeatable); replaces the configured topics
        #[arg(short = 't', long = "topic")]
        topics: Vec<String>,

        /// Consumer group ID
        #[arg(short, long)]
        group_id: Option<String>,

        /// Poll timeout in milliseconds once every consumer is idle
        #[arg(long)]
        throttle_ms: Option<u64>,

        /// Stop after handling this many messages
        #[arg(short = 'n', long)]
        max_messages: Option<u64>,
    },

    /// Decode one message payload and print it as JSON
    Decode {
        /// File holding the payload (reads STDIN when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/eventrelay.yaml".to_string()),
            verbose: false,
            json_logs: false,
            command: Commands::Decode { file: None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/eventrelay.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Decode { file: None }));
    }

    #[test]
    fn test_cli_parse_run_with_topics() {
        let cli = Cli::try_parse_from([
            "eventrelay",
            "run",
            "--brokers",
            "kafka:9092",
            "-t",
            "events",
            "--topic",
            "replay",
            "--throttle-ms",
            "250",
            "-n",
            "10",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                brokers,
                topics,
                group_id,
                throttle_ms,
                max_messages,
            } => {
                assert_eq!(brokers.as_deref(), Some("kafka:9092"));
                assert_eq!(topics, vec!["events".to_string(), "replay".to_string()]);
                assert_eq!(group_id, None);
                assert_eq!(throttle_ms, Some(250));
                assert_eq!(max_messages, Some(10));
            }
            other => panic!("Expected Run command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_run_defaults() {
        let cli = Cli::try_parse_from(["eventrelay", "run"]).unwrap();
        assert_eq!(cli.config, Some("config/eventrelay.yaml".to_string()));
        if let Commands::Run { topics, .. } = cli.command {
            assert!(topics.is_empty());
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_decode_with_file() {
        let cli = Cli::try_parse_from([
            "eventrelay",
            "-v",
            "--json-logs",
            "decode",
            "--file",
            "payload.json",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert!(cli.json_logs);
        if let Commands::Decode { file } = cli.command {
            assert_eq!(file, Some(PathBuf::from("payload.json")));
        } else {
            panic!("Expected Decode command");
        }
    }

    #[test]
    fn test_cli_parse_custom_config() {
        let cli = Cli::try_parse_from(["eventrelay", "-c", "/etc/relay.yaml", "decode"]).unwrap();
        assert_eq!(cli.config, Some("/etc/relay.yaml".to_string()));
    }

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["eventrelay"]).is_err());
    }

    #[test]
    fn test_cli_rejects_non_numeric_throttle() {
        assert!(Cli::try_parse_from(["eventrelay", "run", "--throttle-ms", "soon"]).is_err());
    }
}
