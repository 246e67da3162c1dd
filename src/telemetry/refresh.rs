use std::time::Duration;

use tracing::{Level, event};
use uuid::Uuid;

use crate::errors::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    RefreshFailed,
    ServerError,
}

/// Structured events for one refresh cycle.
#[derive(Clone, Debug)]
pub struct RefreshTelemetry {
    attempt_id: Uuid,
    url: String,
}

impl RefreshTelemetry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            url: url.into(),
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn emit_start(&self, queued: usize) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            url = %self.url,
            queued,
            "refresh.start"
        );
    }

    pub fn emit_success(&self, replaying: usize, elapsed: Duration) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            url = %self.url,
            replaying,
            elapsed_ms = elapsed.as_millis() as u64,
            "refresh.success"
        );
    }

    /// The cause stays in the logs; queued callers only ever see `Error::Aborted`.
    pub fn emit_failure(&self, error: &Error, elapsed: Duration) {
        event!(
            Level::ERROR,
            attempt_id = %self.attempt_id,
            url = %self.url,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %error,
            "refresh.failure"
        );
    }
}

pub fn emit_abort(reason: AbortReason, aborted: usize) {
    if aborted == 0 {
        return;
    }
    event!(
        Level::WARN,
        reason = ?reason,
        aborted,
        "refresh.abort"
    );
}
