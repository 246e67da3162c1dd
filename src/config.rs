//! read dispatcher configuration from a file, the environment, or code

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::Error;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Prefix for endpoints that are not absolute URLs.
    #[serde(default)]
    pub base_url: Option<String>,
    pub refresh_endpoint: String,
    #[serde(default = "default_token_field")]
    pub token_field: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_credential_key")]
    pub credential_key: String,
    /// When set, the credential is persisted to this JSON file.
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    #[serde(default = "default_max_refresh_cycles")]
    pub max_refresh_cycles: u8,
    #[serde(default = "default_auth_expired_status")]
    pub auth_expired_status: u16,
    #[serde(default = "default_unauthorized_status")]
    pub unauthorized_status: u16,
}

fn default_token_field() -> String {
    "token".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_credential_key() -> String {
    "token".to_string()
}

fn default_max_refresh_cycles() -> u8 {
    3
}

fn default_auth_expired_status() -> u16 {
    403
}

fn default_unauthorized_status() -> u16 {
    401
}

impl Config {
    pub fn new(refresh_endpoint: impl Into<String>) -> Self {
        Self {
            base_url: None,
            refresh_endpoint: refresh_endpoint.into(),
            token_field: default_token_field(),
            timeout_secs: default_timeout_secs(),
            credential_key: default_credential_key(),
            token_path: None,
            max_refresh_cycles: default_max_refresh_cycles(),
            auth_expired_status: default_auth_expired_status(),
            unauthorized_status: default_unauthorized_status(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_token_field(mut self, field: impl Into<String>) -> Self {
        self.token_field = field.into();
        self
    }

    /// Deadlines are kept in whole seconds; any fraction rounds up, so 500ms
    /// becomes 1s and 1.5s becomes 2s.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self.timeout_secs = secs.max(1);
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    pub fn with_max_refresh_cycles(mut self, cycles: u8) -> Self {
        self.max_refresh_cycles = cycles;
        self
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// # ENV Vars
    /// * `DISPATCH_REFRESH_URL` - refresh endpoint (required)
    /// * `DISPATCH_BASE_URL` - prefix for relative endpoints
    /// * `DISPATCH_TOKEN_FIELD` - JSON field holding the refreshed token
    /// * `DISPATCH_TIMEOUT_SECS` - per-call deadline
    /// * `DISPATCH_TOKEN_PATH` - file used to persist the credential
    /// * `DISPATCH_MAX_REFRESH_CYCLES` - refresh cycles a single call may go through
    pub fn from_env() -> Result<Self, Error> {
        let refresh_endpoint = std::env::var("DISPATCH_REFRESH_URL")
            .map_err(|_| Error::Config("Missing DISPATCH_REFRESH_URL env var".to_string()))?;
        let mut config = Config::new(refresh_endpoint);
        if let Ok(base) = std::env::var("DISPATCH_BASE_URL") {
            config.base_url = Some(base);
        }
        if let Ok(field) = std::env::var("DISPATCH_TOKEN_FIELD") {
            config.token_field = field;
        }
        if let Ok(raw) = std::env::var("DISPATCH_TIMEOUT_SECS") {
            config.timeout_secs = raw.parse().map_err(|_| {
                Error::Config(format!("DISPATCH_TIMEOUT_SECS is not a number: '{raw}'"))
            })?;
        }
        if let Ok(path) = std::env::var("DISPATCH_TOKEN_PATH") {
            config.token_path = Some(PathBuf::from(path));
        }
        if let Ok(raw) = std::env::var("DISPATCH_MAX_REFRESH_CYCLES") {
            config.max_refresh_cycles = raw.parse().map_err(|_| {
                Error::Config(format!(
                    "DISPATCH_MAX_REFRESH_CYCLES is not a number: '{raw}'"
                ))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if let Some(base) = &self.base_url {
            reqwest::Url::parse(base)
                .map_err(|e| Error::Config(format!("Invalid base URL '{base}': {e}")))?;
        }
        let refresh = self.resolve(&self.refresh_endpoint);
        reqwest::Url::parse(&refresh)
            .map_err(|e| Error::Config(format!("Invalid refresh URL '{refresh}': {e}")))?;
        if self.timeout_secs == 0 {
            return Err(Error::Config("Timeout must be > 0".into()));
        }
        if self.max_refresh_cycles == 0 {
            return Err(Error::Config("max_refresh_cycles must be >= 1".into()));
        }
        if self.token_field.is_empty() {
            return Err(Error::Config("Token field must not be empty".into()));
        }
        if self.auth_expired_status == self.unauthorized_status {
            return Err(Error::Config(
                "Auth-expired and unauthorized statuses must differ".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn refresh_url(&self) -> String {
        self.resolve(&self.refresh_endpoint)
    }

    /// Absolute endpoints pass through; anything else is appended to `base_url`.
    pub fn resolve(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            ),
            None => endpoint.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_endpoints_join_base_url() {
        let config = Config::new("/auth/refresh").with_base_url("https://api.example.com/");
        assert_eq!(config.resolve("/me"), "https://api.example.com/me");
        assert_eq!(config.resolve("me"), "https://api.example.com/me");
        assert_eq!(
            config.resolve("http://other.example.com/x"),
            "http://other.example.com/x"
        );
        assert_eq!(config.refresh_url(), "https://api.example.com/auth/refresh");
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"refresh_endpoint":"https://api.example.com/refresh"}"#)
                .expect("config");
        assert_eq!(config.token_field, "token");
        assert_eq!(config.timeout(), Duration::from_secs(20));
        assert_eq!(config.auth_expired_status, 403);
        assert_eq!(config.unauthorized_status, 401);
        assert_eq!(config.max_refresh_cycles, 3);
        config.validate().expect("valid");
    }

    #[test]
    fn sub_second_timeouts_round_up() {
        let config = Config::new("https://api.example.com/refresh");
        let half = config.clone().with_timeout(Duration::from_millis(500));
        assert_eq!(half.timeout(), Duration::from_secs(1));
        let fraction = config.clone().with_timeout(Duration::from_millis(1500));
        assert_eq!(fraction.timeout(), Duration::from_secs(2));
        let whole = config.with_timeout(Duration::from_secs(7));
        assert_eq!(whole.timeout(), Duration::from_secs(7));
    }

    #[test]
    fn validate_rejects_relative_refresh_without_base() {
        let err = Config::new("/auth/refresh").validate().expect_err("invalid");
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn validate_rejects_colliding_statuses() {
        let mut config = Config::new("https://api.example.com/refresh");
        config.unauthorized_status = 403;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
