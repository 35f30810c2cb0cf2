use std::path::PathBuf;
use std::time::Duration;

use opname_core::types::DbId;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Base URL of the opname API, without a trailing slash.
    pub api_url: String,
    /// Where the local session state is kept between runs.
    pub state_path: PathBuf,
    /// The signed-in user; owner of sessions started from this client.
    pub user_id: DbId,
    /// Per-request timeout. `None` keeps the HTTP client default.
    pub request_timeout: Option<Duration>,
}

impl CliConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                       | Default                     |
    /// |-------------------------------|-----------------------------|
    /// | `OPNAME_API_URL`              | `http://localhost:8000/api` |
    /// | `OPNAME_STATE_PATH`           | `.opname/state.json`        |
    /// | `OPNAME_USER_ID`              | required                    |
    /// | `OPNAME_REQUEST_TIMEOUT_SECS` | none                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_url = var("OPNAME_API_URL")
            .unwrap_or_else(|| "http://localhost:8000/api".into())
            .trim()
            .trim_end_matches('/')
            .to_string();

        let state_path = var("OPNAME_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".opname/state.json"));

        let user_id = var("OPNAME_USER_ID").ok_or(ConfigError::Missing("OPNAME_USER_ID"))?;
        let user_id: DbId = user_id
            .trim()
            .parse()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| ConfigError::Invalid {
                name: "OPNAME_USER_ID",
                expected: "a positive integer",
                value: user_id.clone(),
            })?;

        let request_timeout = match var("OPNAME_REQUEST_TIMEOUT_SECS") {
            None => None,
            Some(value) => {
                let secs: u64 = value.trim().parse().map_err(|_| ConfigError::Invalid {
                    name: "OPNAME_REQUEST_TIMEOUT_SECS",
                    expected: "a whole number of seconds",
                    value: value.clone(),
                })?;
                Some(Duration::from_secs(secs))
            }
        };

        Ok(Self {
            api_url,
            state_path,
            user_id,
            request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<CliConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CliConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_user_is_set() {
        let config = load(&[("OPNAME_USER_ID", "42")]).unwrap();
        assert_eq!(config.api_url, "http://localhost:8000/api");
        assert_eq!(config.state_path, PathBuf::from(".opname/state.json"));
        assert_eq!(config.user_id, 42);
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            ("OPNAME_USER_ID", "7"),
            ("OPNAME_API_URL", "https://itam.example.com/api/"),
            ("OPNAME_STATE_PATH", "/var/lib/opname/state.json"),
            ("OPNAME_REQUEST_TIMEOUT_SECS", "15"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "https://itam.example.com/api");
        assert_eq!(config.state_path, PathBuf::from("/var/lib/opname/state.json"));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn missing_user_is_an_error() {
        assert_matches!(load(&[]), Err(ConfigError::Missing("OPNAME_USER_ID")));
        assert_matches!(
            load(&[("OPNAME_USER_ID", "  ")]),
            Err(ConfigError::Missing(_))
        );
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        assert_matches!(
            load(&[("OPNAME_USER_ID", "abc")]),
            Err(ConfigError::Invalid { name: "OPNAME_USER_ID", .. })
        );
        assert_matches!(
            load(&[("OPNAME_USER_ID", "0")]),
            Err(ConfigError::Invalid { .. })
        );
        assert_matches!(
            load(&[("OPNAME_USER_ID", "1"), ("OPNAME_REQUEST_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Invalid { name: "OPNAME_REQUEST_TIMEOUT_SECS", .. })
        );
    }
}
