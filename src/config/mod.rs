use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use crate::errors::{AppError, AppResult};
use crate::utils::UrlUtils;
use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub guide: GuideConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

/// Endpoints to load from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_playlist_url")]
    pub playlist_url: String,
    /// When unset, the playlist's `x-tvg-url` header attribute is used
    #[serde(default = "default_guide_url")]
    pub guide_url: Option<String>,
}

/// Resilient fetcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Hard bound on each individual request attempt
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
    /// Extra rounds after the first one
    #[serde(default = "default_fetch_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_retry_delay", with = "duration_serde")]
    pub initial_retry_delay: Duration,
    #[serde(default = "default_max_retry_delay", with = "duration_serde")]
    pub max_retry_delay: Duration,
    /// Proxy URL prefixes; the percent-encoded target is appended
    #[serde(default = "default_proxies")]
    pub proxies: Vec<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_accept")]
    pub accept: String,
}

/// Guide parser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideConfig {
    /// Structural parse attempts before giving up
    #[serde(default = "default_guide_parse_attempts")]
    pub parse_attempts: u32,
    /// Base delay, doubled after each failed attempt
    #[serde(default = "default_guide_parse_retry_delay", with = "duration_serde")]
    pub parse_retry_delay: Duration,
    #[serde(default = "default_guide_accept")]
    pub accept: String,
}

/// Load sequencing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Whole-pipeline playlist retries after the first attempt
    #[serde(default = "default_playlist_retries")]
    pub playlist_retries: u32,
    #[serde(default = "default_playlist_retry_delay", with = "duration_serde")]
    pub playlist_retry_delay: Duration,
    #[serde(default = "default_guide_enabled")]
    pub guide_enabled: bool,
}

fn default_playlist_url() -> String {
    DEFAULT_PLAYLIST_URL.to_string()
}

fn default_guide_url() -> Option<String> {
    Some(DEFAULT_GUIDE_URL.to_string())
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
}

fn default_fetch_max_retries() -> u32 {
    DEFAULT_FETCH_MAX_RETRIES
}

fn default_initial_retry_delay() -> Duration {
    Duration::from_millis(DEFAULT_INITIAL_RETRY_DELAY_MS)
}

fn default_max_retry_delay() -> Duration {
    Duration::from_millis(DEFAULT_MAX_RETRY_DELAY_MS)
}

fn default_proxies() -> Vec<String> {
    DEFAULT_PROXIES.iter().map(|p| p.to_string()).collect()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_accept() -> String {
    DEFAULT_ACCEPT.to_string()
}

fn default_guide_parse_attempts() -> u32 {
    DEFAULT_GUIDE_PARSE_ATTEMPTS
}

fn default_guide_parse_retry_delay() -> Duration {
    Duration::from_millis(DEFAULT_GUIDE_PARSE_RETRY_DELAY_MS)
}

fn default_guide_accept() -> String {
    DEFAULT_GUIDE_ACCEPT.to_string()
}

fn default_playlist_retries() -> u32 {
    DEFAULT_PLAYLIST_RETRIES
}

fn default_playlist_retry_delay() -> Duration {
    Duration::from_secs(DEFAULT_PLAYLIST_RETRY_DELAY_SECS)
}

fn default_guide_enabled() -> bool {
    true
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            playlist_url: default_playlist_url(),
            guide_url: default_guide_url(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            max_retries: default_fetch_max_retries(),
            initial_retry_delay: default_initial_retry_delay(),
            max_retry_delay: default_max_retry_delay(),
            proxies: default_proxies(),
            user_agent: default_user_agent(),
            origin: default_origin(),
            accept: default_accept(),
        }
    }
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            parse_attempts: default_guide_parse_attempts(),
            parse_retry_delay: default_guide_parse_retry_delay(),
            accept: default_guide_accept(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            playlist_retries: default_playlist_retries(),
            playlist_retry_delay: default_playlist_retry_delay(),
            guide_enabled: default_guide_enabled(),
        }
    }
}

impl FetchConfig {
    /// Backoff before retry round `round + 1`: `min(initial × 2^round, max)`
    pub fn backoff_for_round(&self, round: u32) -> Duration {
        let factor = 2u32.checked_pow(round).unwrap_or(u32::MAX);
        self.initial_retry_delay
            .checked_mul(factor)
            .unwrap_or(self.max_retry_delay)
            .min(self.max_retry_delay)
    }

    /// Total rounds a single fetch may run
    pub fn total_rounds(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Upper bound on one `fetch` call before it reports exhaustion
    ///
    /// Each round may time out on the direct request, the cached proxy and
    /// every listed proxy; backoff sleeps separate the rounds.
    pub fn worst_case_duration(&self) -> Duration {
        let attempts_per_round = 2 + self.proxies.len() as u32;
        let requests = self.request_timeout * attempts_per_round * self.total_rounds();
        let backoff: Duration = (0..self.max_retries).map(|r| self.backoff_for_round(r)).sum();
        requests + backoff
    }
}

impl LoaderConfig {
    /// Upper bound before a playlist failure is surfaced: both retry layers
    /// compose, so the fetch bound is multiplied by the pipeline attempts.
    pub fn worst_case_playlist_latency(&self, fetch: &FetchConfig) -> Duration {
        let attempts = self.playlist_retries.saturating_add(1);
        fetch.worst_case_duration() * attempts + self.playlist_retry_delay * self.playlist_retries
    }
}

impl Config {
    /// Read the TOML file if present, otherwise fall back to defaults
    ///
    /// Nothing is written to disk.
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if Path::new(config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            let config: Config = toml::from_str(&contents)?;
            info!("Configuration loaded from: {}", config_file);
            Ok(config)
        } else {
            info!("No config file at {}, using defaults", config_file);
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if !UrlUtils::is_valid(&self.sources.playlist_url) {
            return Err(AppError::configuration(format!(
                "sources.playlist_url is not a valid URL: '{}'",
                self.sources.playlist_url
            )));
        }

        if let Some(guide_url) = &self.sources.guide_url {
            if !UrlUtils::is_valid(guide_url) {
                return Err(AppError::configuration(format!(
                    "sources.guide_url is not a valid URL: '{guide_url}'"
                )));
            }
        }

        if self.fetch.request_timeout.is_zero() {
            return Err(AppError::configuration("fetch.request_timeout must be greater than zero"));
        }

        if self.fetch.initial_retry_delay > self.fetch.max_retry_delay {
            return Err(AppError::configuration(
                "fetch.initial_retry_delay must not exceed fetch.max_retry_delay",
            ));
        }

        if let Some(bad) = self
            .fetch
            .proxies
            .iter()
            .find(|p| !UrlUtils::is_valid_proxy_template(p))
        {
            return Err(AppError::configuration(format!(
                "fetch.proxies contains an invalid template: '{bad}'"
            )));
        }

        if self.guide.parse_attempts == 0 {
            return Err(AppError::configuration("guide.parse_attempts must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = Config::default();
        assert_eq!(config.fetch.request_timeout, Duration::from_secs(30));
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.fetch.proxies.len(), 5);
        assert_eq!(config.fetch.proxies[0], "https://corsproxy.io/?");
        assert_eq!(config.loader.playlist_retries, 3);
        assert_eq!(config.loader.playlist_retry_delay, Duration::from_secs(5));
        assert_eq!(config.guide.parse_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [sources]
            playlist_url = "http://example.com/list.m3u"

            [fetch]
            request_timeout = "5s"
            proxies = []
            "#,
        )
        .unwrap();

        assert_eq!(config.sources.playlist_url, "http://example.com/list.m3u");
        assert_eq!(config.sources.guide_url.as_deref(), Some(DEFAULT_GUIDE_URL));
        assert_eq!(config.fetch.request_timeout, Duration::from_secs(5));
        assert!(config.fetch.proxies.is_empty());
        assert_eq!(config.fetch.max_retries, DEFAULT_FETCH_MAX_RETRIES);
        assert_eq!(config.loader.playlist_retries, DEFAULT_PLAYLIST_RETRIES);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let fetch = FetchConfig::default();
        assert_eq!(fetch.backoff_for_round(0), Duration::from_secs(1));
        assert_eq!(fetch.backoff_for_round(1), Duration::from_secs(2));
        assert_eq!(fetch.backoff_for_round(3), Duration::from_secs(8));
        assert_eq!(fetch.backoff_for_round(4), Duration::from_secs(10));
        assert_eq!(fetch.backoff_for_round(40), Duration::from_secs(10));
    }

    #[test]
    fn test_worst_case_bounds() {
        let fetch = FetchConfig::default();
        // 6 rounds x 7 attempts x 30s + (1 + 2 + 4 + 8 + 10)s
        assert_eq!(fetch.worst_case_duration(), Duration::from_secs(6 * 7 * 30 + 25));

        let loader = LoaderConfig::default();
        assert_eq!(
            loader.worst_case_playlist_latency(&fetch),
            fetch.worst_case_duration() * 4 + Duration::from_secs(15)
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.fetch.proxies.push("not a proxy".to_string());
        assert!(matches!(config.validate(), Err(AppError::Configuration { .. })));

        let mut config = Config::default();
        config.sources.playlist_url = "bit.ly/nope".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults_without_writing() {
        let path = std::env::temp_dir().join("m3u-guide-definitely-missing.toml");
        let _ = std::fs::remove_file(&path);
        let config = Config::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.sources.playlist_url, DEFAULT_PLAYLIST_URL);
        assert!(!path.exists());
    }
}
