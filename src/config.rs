//! Configuration file parser for ~/.config/newsdeck/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning so typos
//! do not go unnoticed.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Image hosts that refuse cross-origin embedding often enough that a
/// failed load is worth one retry through the relay.
pub const DEFAULT_CORS_RESTRICTED_HOSTS: &[&str] = &[
    "cdn.cnn.com",
    "media.cnn.com",
    "static01.nyt.com",
    "i.guim.co.uk",
    "ichef.bbci.co.uk",
    "s.yimg.com",
    "images.wsj.net",
    "assets.bwbx.io",
    "media.wired.com",
    "cdn.vox-cdn.com",
    "www.washingtonpost.com",
    "static.foxnews.com",
    "cloudfront.net",
];

/// Top-level client configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The `Debug` impl masks `api_token`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the news backend (no trailing path required).
    pub api_base_url: String,

    /// Country used before location detection completes.
    pub default_country: String,

    /// Source channel used by the initial filter ("all" for every source).
    pub default_source: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Retries for idempotent reads on transient failures. Mutations never retry.
    pub max_retries: u32,

    /// Base delay for exponential backoff between read retries.
    pub retry_backoff_ms: u64,

    /// CORS relay; the blocked image URL is appended as the `url` query parameter.
    pub image_proxy_url: String,

    /// Base for deterministic placeholder images.
    pub placeholder_base_url: String,

    /// Number of enhanced image URLs remembered for the session.
    pub image_cache_capacity: usize,

    /// Host suffixes treated as CORS-restrictive.
    pub cors_restricted_hosts: Vec<String>,

    /// Bearer credential (alternative to the NEWSDECK_TOKEN env var).
    /// Env var takes precedence over config file.
    pub api_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            default_country: "us".to_string(),
            default_source: "all".to_string(),
            request_timeout_secs: 15,
            max_retries: 2,
            retry_backoff_ms: 500,
            image_proxy_url: "https://images.weserv.nl/".to_string(),
            placeholder_base_url: "https://picsum.photos".to_string(),
            image_cache_capacity: 512,
            cors_restricted_hosts: DEFAULT_CORS_RESTRICTED_HOSTS
                .iter()
                .map(|h| h.to_string())
                .collect(),
            api_token: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("default_country", &self.default_country)
            .field("default_source", &self.default_source)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("image_proxy_url", &self.image_proxy_url)
            .field("placeholder_base_url", &self.placeholder_base_url)
            .field("image_cache_capacity", &self.image_cache_capacity)
            .field("cors_restricted_hosts", &self.cors_restricted_hosts)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: &'static [&'static str] = &[
        "api_base_url",
        "default_country",
        "default_source",
        "request_timeout_secs",
        "max_retries",
        "retry_backoff_ms",
        "image_proxy_url",
        "placeholder_base_url",
        "image_cache_capacity",
        "cors_restricted_hosts",
        "api_token",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(api = %config.api_base_url, country = %config.default_country, "Loaded configuration");
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.default_country, "us");
        assert_eq!(config.default_source, "all");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.image_cache_capacity, 512);
        assert!(config
            .cors_restricted_hosts
            .iter()
            .any(|h| h == "static01.nyt.com"));
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/newsdeck_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.default_country, "us");
    }

    #[test]
    fn test_whitespace_only_returns_default() {
        let config = Config::parse("   \n  \n  ").unwrap();
        assert_eq!(config.default_source, "all");
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::parse("default_country = \"gb\"\n").unwrap();
        assert_eq!(config.default_country, "gb");
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.image_proxy_url, "https://images.weserv.nl/");
    }

    #[test]
    fn test_full_config() {
        let content = r#"
api_base_url = "https://news.example.com/api"
default_country = "in"
default_source = "gnews"
request_timeout_secs = 5
max_retries = 0
retry_backoff_ms = 50
image_proxy_url = "https://relay.example.com/img"
placeholder_base_url = "https://placeholder.example.com"
image_cache_capacity = 16
cors_restricted_hosts = ["blocked.example.com"]
api_token = "token-abc"
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.api_base_url, "https://news.example.com/api");
        assert_eq!(config.default_country, "in");
        assert_eq!(config.default_source, "gnews");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.retry_backoff(), Duration::from_millis(50));
        assert_eq!(config.image_cache_capacity, 16);
        assert_eq!(config.cors_restricted_hosts, vec!["blocked.example.com"]);
        assert_eq!(config.api_token.as_deref(), Some("token-abc"));
    }

    #[test]
    fn test_zero_timeout_clamped() {
        let config = Config::parse("request_timeout_secs = 0\n").unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::parse("default_country = \"ca\"\ntheme = \"dark\"\n").unwrap();
        assert_eq!(config.default_country, "ca");
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::parse("max_retries = \"many\"\n").is_err());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("newsdeck_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join("newsdeck_config_test_load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "default_source = \"rss\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.default_source, "rss");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_debug_masks_api_token() {
        let config = Config {
            api_token: Some("super-secret-token-12345".to_string()),
            ..Config::default()
        };

        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-token-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
