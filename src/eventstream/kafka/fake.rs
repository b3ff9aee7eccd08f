//! In-process fake consumer handle for tests
//!
//! [`FakeHandle`] replays a script of poll outcomes and records the timeout
//! of every poll call, so joiner backoff and relay behavior can be checked
//! without a broker. Once the script runs out every poll comes back empty.
//! Empty polls block for their timeout, like a real consumer with nothing to
//! deliver.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use eventrelay::eventstream::kafka::fake::FakeHandle;
//! use eventrelay::eventstream::kafka::ConsumerHandle;
//!
//! let handle = FakeHandle::new("events")
//!     .with_empty()
//!     .with_message(r#"[1, "delete", {}, {}]"#);
//!
//! assert!(handle.poll(Duration::ZERO).is_none());
//! assert!(handle.poll(Duration::ZERO).unwrap().is_ok());
//! assert_eq!(handle.timeouts(), vec![Duration::ZERO, Duration::ZERO]);
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;

use super::consumer::ConsumerHandle;

/// Error injected by a [`FakeHandle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FakeError(pub String);

type FakePoll = Option<Result<Vec<u8>, FakeError>>;

/// A scripted consumer handle.
#[derive(Debug)]
pub struct FakeHandle {
    name: String,
    script: Mutex<VecDeque<FakePoll>>,
    timeouts: Mutex<Vec<Duration>>,
}

impl FakeHandle {
    /// Creates a handle with an empty script.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            timeouts: Mutex::new(Vec::new()),
        }
    }

    /// Appends a poll that times out with nothing.
    pub fn with_empty(self) -> Self {
        self.push(None)
    }

    /// Appends a poll that delivers `payload`.
    pub fn with_message(self, payload: impl Into<Vec<u8>>) -> Self {
        self.push(Some(Ok(payload.into())))
    }

    /// Appends a poll that fails with `reason`.
    pub fn with_error(self, reason: &str) -> Self {
        self.push(Some(Err(FakeError(reason.to_string()))))
    }

    fn push(self, outcome: FakePoll) -> Self {
        lock(&self.script).push_back(outcome);
        self
    }

    /// Returns the handle's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the timeout of every poll so far, oldest first.
    pub fn timeouts(&self) -> Vec<Duration> {
        lock(&self.timeouts).clone()
    }

    /// Returns how many scripted outcomes have not been polled yet.
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

impl ConsumerHandle for FakeHandle {
    type Message = Vec<u8>;
    type Error = FakeError;

    fn poll(&self, timeout: Duration) -> Option<Result<Vec<u8>, FakeError>> {
        lock(&self.timeouts).push(timeout);
        let outcome = lock(&self.script).pop_front().flatten();
        if outcome.is_none() && !timeout.is_zero() {
            std::thread::sleep(timeout);
        }
        outcome
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_handle_replays_script() {
        let handle = FakeHandle::new("events")
            .with_message("first")
            .with_error("boom")
            .with_empty();

        assert_eq!(handle.name(), "events");
        assert_eq!(handle.remaining(), 3);
        assert_eq!(
            handle.poll(Duration::ZERO).unwrap().unwrap(),
            b"first".to_vec()
        );
        assert_eq!(
            handle.poll(Duration::ZERO).unwrap().unwrap_err(),
            FakeError("boom".to_string())
        );
        assert!(handle.poll(Duration::ZERO).is_none());
        assert_eq!(handle.remaining(), 0);
    }

    #[test]
    fn test_fake_handle_exhausted_script_is_empty() {
        let handle = FakeHandle::new("events");
        let started = std::time::Instant::now();
        assert!(handle.poll(Duration::from_millis(20)).is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(handle.timeouts(), vec![Duration::from_millis(20)]);
    }
}
