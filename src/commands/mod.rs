/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes two top-level command modules:

- `run`: consume the configured topics and relay decoded events
- `decode`: decode a single payload and print it as JSON
*/

use crate::config::Config;
use crate::error::{EventRelayError, Result};
use crate::eventstream::kafka::{
    parse_event_message, KafkaHandle, LoggingSink, ParsedMessage, Relay, RelayStats,
};
use std::path::PathBuf;

// Relay command handler
pub mod r#run {
    //! Relay loop handler.
    //!
    //! Builds one Kafka consumer per configured topic and runs the relay on a
    //! blocking task. An interrupt signal flips the relay's stop flag; the
    //! loop notices it before the next poll.

    use super::*;
    use std::sync::atomic::Ordering;

    /// Run the relay until it is interrupted, hits its message limit, or fails
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration (consumed)
    ///
    /// # Errors
    ///
    /// Returns error if a consumer cannot be created or the relay aborts
    pub async fn run_relay(config: Config) -> Result<RelayStats> {
        let consumer_configs = config.consumer_configs()?;

        let handles = consumer_configs
            .iter()
            .map(KafkaHandle::new)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(EventRelayError::from)?;

        let mut relay = Relay::new(LoggingSink)
            .with_throttle(config.relay.throttle())
            .with_payload_logging(config.logging.include_payload);
        if let Some(max) = config.relay.max_messages {
            relay = relay.with_max_messages(max);
        }

        let stop = relay.stop_handle();
        let mut task = tokio::task::spawn_blocking(move || relay.run(&handles));

        let outcome = tokio::select! {
            joined = &mut task => joined,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received interrupt, stopping relay");
                stop.store(false, Ordering::SeqCst);
                task.await
            }
        };

        let stats = outcome
            .map_err(EventRelayError::from)?
            .map_err(EventRelayError::from)?;

        tracing::info!(
            inserted = stats.inserted,
            ignored = stats.ignored,
            invalid = stats.invalid,
            poll_errors = stats.poll_errors,
            "Relay finished"
        );
        Ok(stats)
    }
}

// Decode command handler
pub mod decode {
    //! Single-payload decoder.
    //!
    //! Useful for inspecting captured messages: the payload is read from a
    //! file or STDIN and the decoded record is written to STDOUT.

    use super::*;
    use serde_json::json;
    use std::io::{Read, Write};

    /// Decodes one payload into its JSON rendering
    ///
    /// Inserts render as the full event change; ignored operations render
    /// as `{"ignored": "<operation>"}`.
    ///
    /// # Errors
    ///
    /// Returns the decode error for malformed or unsupported payloads
    ///
    /// # Examples
    ///
    /// ```
    /// use eventrelay::commands::decode::decode_payload;
    ///
    /// let value = decode_payload(br#"[1, "delete", {}, {}]"#).unwrap();
    /// assert_eq!(value["ignored"], "delete");
    /// ```
    pub fn decode_payload(payload: &[u8]) -> Result<serde_json::Value> {
        let parsed = parse_event_message(payload).map_err(EventRelayError::from)?;
        let value = match parsed {
            ParsedMessage::Insert(change) => {
                serde_json::to_value(&*change).map_err(EventRelayError::from)?
            }
            ParsedMessage::Ignored { operation } => json!({ "ignored": operation }),
        };
        Ok(value)
    }

    /// Reads a payload from `file` (or STDIN) and prints it decoded
    ///
    /// # Errors
    ///
    /// Returns error if the input cannot be read or does not decode
    pub fn run_decode(file: Option<PathBuf>) -> Result<()> {
        let payload = match &file {
            Some(path) => {
                tracing::debug!("Reading payload from {}", path.display());
                std::fs::read(path).map_err(EventRelayError::from)?
            }
            None => {
                let mut buf = Vec::new();
                std::io::stdin()
                    .read_to_end(&mut buf)
                    .map_err(EventRelayError::from)?;
                buf
            }
        };

        let value = decode_payload(&payload)?;
        let rendered = serde_json::to_string_pretty(&value).map_err(EventRelayError::from)?;

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", rendered).map_err(EventRelayError::from)?;
        Ok(())
    }

}
