//! Bearer-token request dispatch with single-flight credential refresh.
//!
//! A [`Dispatcher`] attaches the stored credential to every call. When the server
//! reports the credential as expired, exactly one refresh call is made; every call
//! that hits the expiry meanwhile is parked and replayed, in arrival order, with the
//! refreshed credential. If the refresh fails, every parked call is rejected with
//! [`Error::Aborted`].

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod loading;
pub mod refresh;
pub mod telemetry;
pub mod token;
pub mod transport;
pub mod types;

pub use config::Config;
pub use dispatch::Dispatcher;
pub use errors::Error;
pub use token::{Credential, FileTokenStore, MemoryTokenStore, TokenStore};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
pub use types::{Method, RequestDescriptor, Response};

#[cfg(test)]
mod tests;
