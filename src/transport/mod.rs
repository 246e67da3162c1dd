//! The narrow HTTP contract the dispatcher depends on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::Error;
use crate::loading::LoadingSignal;
use crate::token::Credential;
use crate::types::{Method, Response};

mod http;

pub use http::ReqwestTransport;

/// One fully-resolved outgoing call.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub query: Vec<(String, String)>,
    pub timeout: Duration,
}

impl TransportRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Bearer token carried by this request, if any.
    pub fn bearer(&self) -> Option<&str> {
        self.header("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
    }
}

pub type TransportResponse = Response;

/// Performs exactly one HTTP exchange.
///
/// Any HTTP status is a successful exchange; `Err` is reserved for failures below
/// HTTP (connect, TLS, DNS, deadline).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, Error>;
}

/// Sends under the request's deadline while holding the loading signal busy.
pub(crate) async fn send_tracked(
    transport: &dyn Transport,
    loading: &Arc<LoadingSignal>,
    request: TransportRequest,
) -> Result<TransportResponse, Error> {
    let _busy = loading.begin();
    let deadline = request.timeout;
    match tokio::time::timeout(deadline, transport.send(request)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(deadline)),
    }
}

pub(crate) fn default_headers(credential: Option<&Credential>) -> Vec<(String, String)> {
    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    if let Some(credential) = credential {
        headers.push((
            "Authorization".to_string(),
            credential.authorization_header(),
        ));
    }
    headers
}
