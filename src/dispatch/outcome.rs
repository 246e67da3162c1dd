use std::time::Duration;

use tracing::Level;
use tracing::event;

use crate::errors::Error;
use crate::types::{Method, Response};

/// Summary of one settled top-level `execute`.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub method: Method,
    pub endpoint: String,
    pub status: Option<u16>,
    pub error: Option<String>,
    /// Refresh cycles the call went through before settling.
    pub cycles: u8,
    pub elapsed: Duration,
}

impl DispatchOutcome {
    pub fn new(
        method: Method,
        endpoint: impl Into<String>,
        result: &Result<Response, Error>,
        cycles: u8,
        elapsed: Duration,
    ) -> Self {
        let (status, error) = match result {
            Ok(resp) => (Some(resp.status), None),
            Err(err) => (err.status(), Some(err.to_string())),
        };
        Self {
            method,
            endpoint: endpoint.into(),
            status,
            error,
            cycles,
            elapsed,
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn log(&self) {
        if self.success() {
            event!(
                Level::INFO,
                method = %self.method,
                endpoint = %self.endpoint,
                status = self.status,
                cycles = self.cycles,
                elapsed_ms = self.elapsed.as_millis() as u64,
                "dispatch.outcome"
            );
        } else {
            event!(
                Level::WARN,
                method = %self.method,
                endpoint = %self.endpoint,
                status = self.status,
                error = self.error.as_deref().unwrap_or_default(),
                cycles = self.cycles,
                elapsed_ms = self.elapsed.as_millis() as u64,
                "dispatch.outcome"
            );
        }
    }
}
