use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cuecast_transport::{
    Anonymous, CredentialsProvider, HttpTransport, StaticToken, TransportError,
};

/// Default backend base URL for local development.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api/v1";

/// Default number of section listings in flight at once.
pub const DEFAULT_LIST_CONCURRENCY: usize = 4;

#[derive(Debug, thiserror::Error)]
#[error("Invalid value '{value}' for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Sync client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backend base URL, e.g. `https://host/api/v1`.
    pub api_url: String,
    /// Bearer token. `None` sends requests unauthenticated.
    pub api_token: Option<String>,
    /// Identity used in create envelopes. Required for publishing.
    pub user_uid: Option<String>,
    /// Where package scratch files are written.
    pub scratch_dir: PathBuf,
    pub list_concurrency: usize,
    /// Per-request bound. `None` relies on cancellation alone.
    pub request_timeout: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            user_uid: None,
            scratch_dir: std::env::temp_dir(),
            list_concurrency: DEFAULT_LIST_CONCURRENCY,
            request_timeout: None,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                          |
    /// |--------------------------------|----------------------------------|
    /// | `CUECAST_API_URL`              | `http://localhost:3000/api/v1`   |
    /// | `CUECAST_API_TOKEN`            | unset                            |
    /// | `CUECAST_USER_UID`             | unset                            |
    /// | `CUECAST_SCRATCH_DIR`          | system temp dir                  |
    /// | `CUECAST_LIST_CONCURRENCY`     | `4`                              |
    /// | `CUECAST_REQUEST_TIMEOUT_SECS` | unset                            |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let list_concurrency = match get("CUECAST_LIST_CONCURRENCY") {
            Some(raw) => parse_positive("CUECAST_LIST_CONCURRENCY", &raw)?,
            None => defaults.list_concurrency,
        };

        let request_timeout = match get("CUECAST_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(
                parse_positive("CUECAST_REQUEST_TIMEOUT_SECS", &raw)? as u64,
            )),
            None => None,
        };

        Ok(Self {
            api_url: get("CUECAST_API_URL").unwrap_or(defaults.api_url),
            api_token: get("CUECAST_API_TOKEN"),
            user_uid: get("CUECAST_USER_UID"),
            scratch_dir: get("CUECAST_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            list_concurrency,
            request_timeout,
        })
    }

    pub fn credentials(&self) -> Arc<dyn CredentialsProvider> {
        match &self.api_token {
            Some(token) => Arc::new(StaticToken::new(token.clone())),
            None => Arc::new(Anonymous),
        }
    }

    /// HTTP transport for the configured backend.
    pub fn transport(&self) -> Result<HttpTransport, TransportError> {
        HttpTransport::new(&self.api_url, self.credentials(), self.request_timeout)
    }
}

fn parse_positive(var: &'static str, raw: &str) -> Result<usize, ConfigError> {
    let invalid = |reason: &str| ConfigError {
        var,
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    match raw.parse::<usize>() {
        Ok(0) => Err(invalid("must be greater than zero")),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(&e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<SyncConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SyncConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.api_token, None);
        assert_eq!(config.user_uid, None);
        assert_eq!(config.list_concurrency, DEFAULT_LIST_CONCURRENCY);
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn reads_every_variable() {
        let config = load(&[
            ("CUECAST_API_URL", "https://api.example.com/v2"),
            ("CUECAST_API_TOKEN", "secret"),
            ("CUECAST_USER_UID", "user-7"),
            ("CUECAST_SCRATCH_DIR", "/var/tmp/cuecast"),
            ("CUECAST_LIST_CONCURRENCY", "8"),
            ("CUECAST_REQUEST_TIMEOUT_SECS", "45"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "https://api.example.com/v2");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.user_uid.as_deref(), Some("user-7"));
        assert_eq!(config.scratch_dir, PathBuf::from("/var/tmp/cuecast"));
        assert_eq!(config.list_concurrency, 8);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(45)));
        assert_eq!(config.credentials().bearer_token().as_deref(), Some("secret"));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("CUECAST_API_TOKEN", "  "), ("CUECAST_API_URL", "")]).unwrap();
        assert_eq!(config.api_token, None);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn malformed_numbers_are_errors() {
        assert_matches!(
            load(&[("CUECAST_LIST_CONCURRENCY", "many")]),
            Err(ConfigError { var: "CUECAST_LIST_CONCURRENCY", .. })
        );
        assert_matches!(
            load(&[("CUECAST_LIST_CONCURRENCY", "0")]),
            Err(ConfigError { var: "CUECAST_LIST_CONCURRENCY", .. })
        );
        assert_matches!(
            load(&[("CUECAST_REQUEST_TIMEOUT_SECS", "-1")]),
            Err(ConfigError { var: "CUECAST_REQUEST_TIMEOUT_SECS", .. })
        );
    }
}
