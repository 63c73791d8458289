use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Default slot name for the mirrored completion list.
pub const DEFAULT_CACHE_KEY: &str = "progress";

/// Settings for the progress tracker's local cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressConfig {
    pub cache_key: String,
    pub cache_dir: PathBuf,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            cache_key: DEFAULT_CACHE_KEY.into(),
            cache_dir: PathBuf::from(".academy-cache"),
        }
    }
}

impl ProgressConfig {
    /// Reads `ACADEMY_CACHE_KEY` and `ACADEMY_CACHE_DIR`, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let cache_key = env::var("ACADEMY_CACHE_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.cache_key);
        let cache_dir = env::var("ACADEMY_CACHE_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or(defaults.cache_dir, PathBuf::from);
        Self {
            cache_key,
            cache_dir,
        }
    }

    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }
}

/// Connection settings for the hosted REST progress store.
///
/// `api_key` is the public project key. Row-level policies on the store see
/// the learner only when `access_token` carries their signed-in session;
/// without it requests run as the anonymous role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestStoreConfig {
    pub base_url: String,
    pub api_key: String,
    pub access_token: Option<String>,
}

impl RestStoreConfig {
    /// Validate and build a config.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if either value is blank or the url is not http(s).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_owned();
        let api_key = api_key.into().trim().to_owned();
        if base_url.is_empty() {
            return Err(ConfigError::Empty {
                name: "ACADEMY_REST_URL",
            });
        }
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(ConfigError::InvalidUrl {
                name: "ACADEMY_REST_URL",
                value: base_url,
            });
        }
        if api_key.is_empty() {
            return Err(ConfigError::Empty {
                name: "ACADEMY_REST_KEY",
            });
        }
        Ok(Self {
            base_url,
            api_key,
            access_token: None,
        })
    }

    /// Authenticate requests as a signed-in session. Blank tokens are ignored.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into().trim().to_owned();
        self.access_token = (!token.is_empty()).then_some(token);
        self
    }

    /// Reads `ACADEMY_REST_URL`, `ACADEMY_REST_KEY` and the optional
    /// `ACADEMY_REST_TOKEN`.
    ///
    /// Returns `Ok(None)` when the url is unset, meaning the local database is
    /// the progress store.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the url is set but the pair is unusable.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(base_url) = env::var("ACADEMY_REST_URL") else {
            return Ok(None);
        };
        let api_key = env::var("ACADEMY_REST_KEY").unwrap_or_default();
        let config = Self::new(base_url, api_key)?;
        Ok(Some(match env::var("ACADEMY_REST_TOKEN") {
            Ok(token) => config.with_access_token(token),
            Err(_) => config,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_config_trims_trailing_slash() {
        let cfg = RestStoreConfig::new("https://db.example.com/ ", " key ").unwrap();
        assert_eq!(cfg.base_url, "https://db.example.com");
        assert_eq!(cfg.api_key, "key");
        assert_eq!(cfg.access_token, None);
    }

    #[test]
    fn blank_access_token_is_dropped() {
        let cfg = RestStoreConfig::new("https://x", "k").unwrap();
        assert_eq!(cfg.clone().with_access_token("  ").access_token, None);
        assert_eq!(
            cfg.with_access_token(" jwt ").access_token.as_deref(),
            Some("jwt")
        );
    }

    #[test]
    fn rest_config_rejects_bad_values() {
        assert!(matches!(
            RestStoreConfig::new("ftp://x", "k"),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert_eq!(
            RestStoreConfig::new("https://x", "  "),
            Err(ConfigError::Empty {
                name: "ACADEMY_REST_KEY"
            })
        );
    }

    #[test]
    fn progress_config_defaults() {
        let cfg = ProgressConfig::default().with_cache_dir("/tmp/academy");
        assert_eq!(cfg.cache_key, "progress");
        assert_eq!(cfg.cache_dir, PathBuf::from("/tmp/academy"));
    }
}
