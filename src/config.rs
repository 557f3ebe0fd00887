//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Source tag sent with every registration from this funnel.
pub const DEFAULT_SOURCE: &str = "ITW_Quiz_Page";

/// Funnel configuration, built from `FUNNEL_*` environment variables.
#[derive(Debug, Clone)]
pub struct FunnelConfig {
    /// Base URL of the registration API (`{base}/register`, `{base}/signin`).
    pub api_base_url: String,
    /// Source tag identifying this funnel to the backend.
    pub source: String,
    /// Timeout applied by the HTTP client to each API call.
    pub http_timeout: Duration,
    /// Pause between an answer being chosen and the step advancing.
    pub advance_delay: Duration,
    /// libSQL file for the durable answer slots. `None` keeps them in memory.
    pub storage_path: Option<PathBuf>,
    /// Port for the JSON API.
    pub port: u16,
    /// Restore stored answers on a new session instead of clearing them.
    pub resume_session: bool,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api/ad-campaign".to_string(),
            source: DEFAULT_SOURCE.to_string(),
            http_timeout: Duration::from_secs(30),
            advance_delay: Duration::from_millis(200),
            storage_path: None,
            port: 8080,
            resume_session: false,
        }
    }
}

impl FunnelConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base_url = std::env::var("FUNNEL_API_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);

        let source = std::env::var("FUNNEL_SOURCE").unwrap_or(defaults.source);

        let http_timeout = parse_env::<u64>("FUNNEL_HTTP_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);

        let advance_delay = parse_env::<u64>("FUNNEL_ADVANCE_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.advance_delay);

        let storage_path = std::env::var("FUNNEL_STORAGE_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let port = parse_env::<u16>("FUNNEL_PORT")?.unwrap_or(defaults.port);

        let resume_session = parse_env::<bool>("FUNNEL_RESUME_SESSION")?.unwrap_or(false);

        Ok(Self {
            api_base_url,
            source,
            http_timeout,
            advance_delay,
            storage_path,
            port,
            resume_session,
        })
    }
}

fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FunnelConfig::default();
        assert_eq!(config.source, "ITW_Quiz_Page");
        assert_eq!(config.advance_delay, Duration::from_millis(200));
        assert!(config.storage_path.is_none());
        assert!(!config.resume_session);
    }

    #[test]
    fn parse_env_missing_is_none() {
        let parsed = parse_env::<u16>("FUNNEL_TEST_SURELY_UNSET_VAR").unwrap();
        assert!(parsed.is_none());
    }
}
