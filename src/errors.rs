use std::fmt;
use std::time::Duration;

/// Message delivered to every queued call when the credential refresh fails.
pub const ABORTED_MESSAGE: &str = "aborted — credential could not be refreshed";

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    Http(reqwest::Error),
    /// Network-level failure reported by a transport without a `reqwest` source.
    Transport(String),
    Timeout(Duration),
    /// Credential rejected outright; not eligible for refresh.
    Unauthorized(u16, String),
    Server(u16, String),
    Aborted,
    /// A call kept observing an expired credential after this many refresh cycles.
    RefreshLoop(u8),
    InvalidRequest(String),
    Config(String),
    Store(String),
}

impl Error {
    /// True for failures that happened below HTTP (connect, DNS, TLS, deadline).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Transport(_) | Error::Timeout(_)
        )
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized(status, _) | Error::Server(status, _) => Some(*status),
            Error::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Json(err) => write!(f, "json error: {err}"),
            Error::Http(err) => write!(f, "http error: {err}"),
            Error::Transport(msg) => write!(f, "transport error: {msg}"),
            Error::Timeout(after) => {
                write!(f, "request timed out after {}ms", after.as_millis())
            }
            Error::Unauthorized(status, body) if body.is_empty() => {
                write!(f, "unauthorized (status {status})")
            }
            Error::Unauthorized(status, body) => {
                write!(f, "unauthorized (status {status}): {body}")
            }
            Error::Server(status, _) => write!(f, "Request failed with status: {status}"),
            Error::Aborted => f.write_str(ABORTED_MESSAGE),
            Error::RefreshLoop(cycles) => write!(
                f,
                "credential still rejected after {cycles} refresh cycle(s)"
            ),
            Error::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            Error::Config(msg) => write!(f, "config error: {msg}"),
            Error::Store(msg) => write!(f, "token store error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err)
    }
}
