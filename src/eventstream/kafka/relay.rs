//! Relay loop: joined consumers in, decoded event changes out.
//!
//! The relay pulls messages from a [`Joiner`], decodes each payload with
//! [`parse_event_message`] and hands inserts to an [`EventSink`]. It owns the
//! policy decisions the joiner and decoder deliberately leave to their caller:
//!
//! - malformed payloads are logged, counted and skipped
//! - ignored operations are counted
//! - an unsupported envelope version stops the relay, since every following
//!   message is likely to be unreadable as well
//! - poll errors are logged and counted, and polling continues
//!
//! # Example
//!
//! ```rust
//! use eventrelay::eventstream::kafka::fake::FakeHandle;
//! use eventrelay::eventstream::kafka::relay::{MemorySink, Relay};
//!
//! let handles = vec![FakeHandle::new("events").with_message(r#"[1, "delete", {}, {}]"#)];
//! let mut relay = Relay::new(MemorySink::default()).with_max_messages(1);
//!
//! let stats = relay.run(&handles).unwrap();
//! assert_eq!(stats.ignored, 1);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::increment_counter;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::telemetry::{MESSAGES_TOTAL, POLL_ERRORS_TOTAL};

use super::consumer::{ConsumerHandle, MessagePayload};
use super::join::{JoinError, Joiner, PollResult, DEFAULT_THROTTLE};
use super::message::{parse_event_message, DecodeError, EventChange, ParsedMessage};

/// Errors that stop the relay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The relay could not start polling.
    #[error("Join error: {0}")]
    Join(#[from] JoinError),

    /// A message could not be decoded and the relay cannot continue.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The sink rejected a decoded event.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Error reported by an [`EventSink`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SinkError(pub String);

/// Receiver of decoded event inserts.
///
/// This is where a persistence or post-processing layer plugs in.
pub trait EventSink {
    /// Accepts one decoded insert.
    fn insert(&mut self, change: EventChange) -> Result<(), SinkError>;
}

/// Sink that only logs each insert.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl EventSink for LoggingSink {
    fn insert(&mut self, change: EventChange) -> Result<(), SinkError> {
        info!(
            project_id = change.event.project_id,
            group_id = change.event.group_id,
            event_id = %change.event.event_id,
            platform = %change.event.platform,
            datetime = %change.event.datetime,
            primary_hash = %change.primary_hash,
            is_new = change.is_new,
            is_sample = change.is_sample,
            is_regression = change.is_regression,
            is_new_group_environment = change.is_new_group_environment,
            "Relayed event insert"
        );
        Ok(())
    }
}

/// Sink that keeps every insert in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    /// Inserts received so far, oldest first.
    pub changes: Vec<EventChange>,
}

impl EventSink for MemorySink {
    fn insert(&mut self, change: EventChange) -> Result<(), SinkError> {
        self.changes.push(change);
        Ok(())
    }
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Decoded and handed to the sink.
    Inserted,
    /// Recognized operation that is not relayed.
    Ignored,
    /// Malformed message, skipped.
    Invalid,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Ignored => "ignored",
            Self::Invalid => "invalid",
        }
    }
}

/// Counters for one relay run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    /// Inserts handed to the sink.
    pub inserted: u64,
    /// Messages with an ignored operation.
    pub ignored: u64,
    /// Malformed messages that were skipped.
    pub invalid: u64,
    /// Poll errors reported by consumers.
    pub poll_errors: u64,
}

impl RelayStats {
    /// Number of messages handled, whatever the outcome.
    pub fn handled(&self) -> u64 {
        self.inserted + self.ignored + self.invalid
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Inserted => self.inserted += 1,
            Outcome::Ignored => self.ignored += 1,
            Outcome::Invalid => self.invalid += 1,
        }
        increment_counter!(MESSAGES_TOTAL, "outcome" => outcome.as_str());
    }
}

/// Drives joined consumers into an [`EventSink`].
///
/// A relay runs once: after it stops, further calls to [`Relay::run`] return
/// without polling.
#[derive(Debug)]
pub struct Relay<S> {
    sink: S,
    running: Arc<AtomicBool>,
    stats: RelayStats,
    throttle: Duration,
    max_messages: Option<u64>,
    log_payloads: bool,
}

impl<S: EventSink> Relay<S> {
    /// Creates a relay feeding `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            running: Arc::new(AtomicBool::new(true)),
            stats: RelayStats::default(),
            throttle: DEFAULT_THROTTLE,
            max_messages: None,
            log_payloads: false,
        }
    }

    /// Sets the joiner's throttled poll timeout.
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Stops the relay after `max` handled messages.
    pub fn with_max_messages(mut self, max: u64) -> Self {
        self.max_messages = Some(max);
        self
    }

    /// Includes raw payloads in the log line of skipped messages.
    pub fn with_payload_logging(mut self, enabled: bool) -> Self {
        self.log_payloads = enabled;
        self
    }

    /// Returns a flag that stops the relay when set to `false`.
    ///
    /// The flag is checked between poll calls, so the relay exits within one
    /// throttle interval. A relay stopped before [`Relay::run`] is called
    /// returns immediately.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Stops the relay.
    pub fn stop(&self) {
        info!("Stopping relay");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Checks whether the relay has not been stopped yet.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns the counters accumulated so far.
    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    /// Returns the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consumes the relay and returns the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Polls `handles` until stopped, the message limit is reached, or a fatal
    /// error occurs.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Join` if `handles` is empty,
    /// `RelayError::Decode` on an unsupported message version, and
    /// `RelayError::Sink` if the sink rejects an insert.
    pub fn run<H>(&mut self, handles: &[H]) -> Result<RelayStats, RelayError>
    where
        H: ConsumerHandle,
        H::Message: MessagePayload,
    {
        let mut joiner = Joiner::new(handles)?.with_throttle(self.throttle);

        info!(
            consumers = handles.len(),
            throttle_ms = self.throttle.as_millis() as u64,
            max_messages = ?self.max_messages,
            "Starting relay"
        );

        let result = self.poll_loop(&mut joiner);
        self.running.store(false, Ordering::SeqCst);

        match &result {
            Ok(stats) => info!(
                inserted = stats.inserted,
                ignored = stats.ignored,
                invalid = stats.invalid,
                poll_errors = stats.poll_errors,
                "Relay stopped"
            ),
            Err(e) => error!(error = %e, "Relay aborted"),
        }

        result
    }

    fn poll_loop<H>(&mut self, joiner: &mut Joiner<'_, H>) -> Result<RelayStats, RelayError>
    where
        H: ConsumerHandle,
        H::Message: MessagePayload,
    {
        while self.running.load(Ordering::SeqCst) {
            if let Some(max) = self.max_messages {
                if self.stats.handled() >= max {
                    debug!(max_messages = max, "Message limit reached");
                    break;
                }
            }

            match joiner.poll_once() {
                PollResult::Empty => {}
                PollResult::Message(_, message) => {
                    self.process_payload(message.payload())?;
                }
                PollResult::Error(e) => {
                    self.stats.poll_errors += 1;
                    increment_counter!(POLL_ERRORS_TOTAL);
                    warn!(consumer = e.index, error = %e.cause, "Consumer poll failed");
                }
            }
        }

        Ok(self.stats)
    }

    /// Decodes one payload and routes the result.
    ///
    /// A missing payload is treated as a malformed message.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Decode` on an unsupported message version and
    /// `RelayError::Sink` if the sink rejects the insert.
    pub fn process_payload(&mut self, payload: Option<&[u8]>) -> Result<Outcome, RelayError> {
        let Some(payload) = payload else {
            warn!("Skipping message without payload");
            self.stats.record(Outcome::Invalid);
            return Ok(Outcome::Invalid);
        };

        let outcome = match parse_event_message(payload) {
            Ok(ParsedMessage::Insert(change)) => {
                debug!(
                    project_id = change.event.project_id,
                    event_id = %change.event.event_id,
                    "Decoded event insert"
                );
                self.sink.insert(*change)?;
                Outcome::Inserted
            }
            Ok(ParsedMessage::Ignored { operation }) => {
                debug!(operation = %operation, "Ignoring unsupported operation");
                Outcome::Ignored
            }
            Err(DecodeError::InvalidPayload(reason)) => {
                if self.log_payloads {
                    warn!(
                        reason = %reason,
                        payload = %String::from_utf8_lossy(payload),
                        "Skipping invalid event message"
                    );
                } else {
                    warn!(reason = %reason, "Skipping invalid event message");
                }
                Outcome::Invalid
            }
            Err(e @ DecodeError::InvalidVersion(_)) => {
                error!(error = %e, "Cannot decode event message, consumer upgrade required");
                return Err(e.into());
            }
        };

        self.stats.record(outcome);
        Ok(outcome)
    }
}
