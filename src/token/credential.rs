use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// On-disk form of a credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSnapshot {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

/// Opaque bearer token plus an optional expiry hint.
///
/// Expiry is discovered from server responses, so the hint is informational only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    value: String,
    expires_at: Option<Timestamp>,
}

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Builds a credential from a refresh payload, reading `expires_in` seconds when
    /// present.
    pub(crate) fn from_refresh_payload(
        payload: &serde_json::Value,
        token_field: &str,
    ) -> Result<Self, Error> {
        let value = payload
            .get(token_field)
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Json(serde::de::Error::custom(format!(
                    "refresh payload has no '{token_field}' string field"
                )))
            })?;
        let mut credential = Credential::new(value);
        if let Some(secs) = payload.get("expires_in").and_then(|v| v.as_i64())
            && secs > 0
        {
            credential.expires_at = Timestamp::now()
                .checked_add(SignedDuration::from_secs(secs))
                .ok();
        }
        Ok(credential)
    }

    /// Returns the raw token value suitable for Authorization headers.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        self.expires_at
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.value)
    }

    pub fn to_snapshot(&self) -> CredentialSnapshot {
        CredentialSnapshot {
            value: self.value.clone(),
            expires_at: self.expires_at,
        }
    }

    pub fn from_snapshot(snapshot: CredentialSnapshot) -> Result<Self, Error> {
        if snapshot.value.is_empty() {
            return Err(Error::Store("Stored credential is empty".into()));
        }
        Ok(Self {
            value: snapshot.value,
            expires_at: snapshot.expires_at,
        })
    }
}
