use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::errors::Error;
use crate::types::Method;

use super::{Transport, TransportRequest, TransportResponse};

const USER_AGENT: &str = "bearer-dispatch/0.1.0";

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, Error> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout)
            .header("User-Agent", USER_AGENT);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let resp = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                Error::Timeout(request.timeout)
            } else {
                Error::Http(err)
            }
        })?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = resp.text().await.map_err(|err| {
            if err.is_timeout() {
                Error::Timeout(request.timeout)
            } else {
                Error::Http(err)
            }
        })?;
        debug!(
            "transport exchange: {} {} -> {}",
            request.method, request.url, status
        );
        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
