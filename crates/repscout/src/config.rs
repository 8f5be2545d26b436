//! Runtime configuration.
//!
//! Every tunable has a default; [`ScoutConfig::from_env`] overlays
//! `REPSCOUT_*` environment variables on top. Unparsable values fall back to
//! the default rather than failing the run.

use std::time::Duration;

pub const DEFAULT_LOOKUP_BASE_URL: &str = "https://lookup.robokiller.com/search";
pub const DEFAULT_CONCURRENCY: usize = 50;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_BLOCK_THRESHOLD: u32 = 3;
pub const DEFAULT_STALE_AFTER_HOURS: i64 = 48;
pub const DEFAULT_MIN_IDENTIFIER_DIGITS: usize = 10;

const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 45;
const DEFAULT_MODEL_MAX_TEXT_CHARS: usize = 10_000;
const DEFAULT_MODEL_NAME: &str = "openai/gpt-oss-20b";
pub const DEFAULT_EGRESS_LIST_URL: &str = "https://proxy.webshare.io/api/v2/proxy/list/";
const DEFAULT_EGRESS_PAGE_SIZE: u32 = 100;

/// Top-level configuration for a lookup run.
#[derive(Debug, Clone)]
pub struct ScoutConfig {
    /// Lookup endpoint; the identifier is appended as `?q=<digits>`.
    pub lookup_base_url: String,
    pub fetch_timeout: Duration,
    pub concurrency: usize,
    /// Blocked count at which an egress point stops being selected.
    pub block_threshold: u32,
    pub stale_after: chrono::Duration,
    pub min_identifier_digits: usize,
    pub model: Option<ModelConfig>,
    pub egress_list: Option<EgressListConfig>,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            lookup_base_url: DEFAULT_LOOKUP_BASE_URL.to_string(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            block_threshold: DEFAULT_BLOCK_THRESHOLD,
            stale_after: chrono::Duration::hours(DEFAULT_STALE_AFTER_HOURS),
            min_identifier_digits: DEFAULT_MIN_IDENTIFIER_DIGITS,
            model: None,
            egress_list: None,
        }
    }
}

impl ScoutConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            lookup_base_url: read_env_string("REPSCOUT_LOOKUP_URL")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.lookup_base_url),
            fetch_timeout: Duration::from_secs(
                read_env_u64("REPSCOUT_FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS).max(1),
            ),
            concurrency: read_env_usize("REPSCOUT_CONCURRENCY", DEFAULT_CONCURRENCY).max(1),
            block_threshold: read_env_u32("REPSCOUT_BLOCK_THRESHOLD", DEFAULT_BLOCK_THRESHOLD)
                .max(1),
            stale_after: chrono::Duration::hours(
                read_env_u64("REPSCOUT_STALE_AFTER_HOURS", DEFAULT_STALE_AFTER_HOURS as u64)
                    as i64,
            ),
            min_identifier_digits: defaults.min_identifier_digits,
            model: ModelConfig::from_env(),
            egress_list: EgressListConfig::from_env(),
        }
    }
}

/// OpenAI-compatible text-generation endpoint used by the model strategy.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL, e.g. `http://host:port/v1`; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_text_chars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: DEFAULT_MODEL_NAME.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECS),
            max_text_chars: DEFAULT_MODEL_MAX_TEXT_CHARS,
            temperature: 0.1,
            max_tokens: 600,
        }
    }

    /// `None` unless a base URL is configured.
    fn from_env() -> Option<Self> {
        let base_url = read_env_string("REPSCOUT_MODEL_URL")
            .or_else(|| read_env_string("OPENAI_COMPATIBLE_URL"))
            .filter(|s| !s.is_empty())?;
        let mut cfg = Self::new(base_url);
        if let Some(model) = read_env_string("REPSCOUT_MODEL")
            .or_else(|| read_env_string("OPENAI_COMPATIBLE_MODEL"))
            .filter(|s| !s.is_empty())
        {
            cfg.model = model;
        }
        cfg.api_key = read_env_string("REPSCOUT_MODEL_KEY")
            .or_else(|| read_env_string("OPENAI_COMPATIBLE_KEY"))
            .filter(|s| !s.is_empty());
        cfg.timeout = Duration::from_secs(read_env_u64(
            "REPSCOUT_MODEL_TIMEOUT_SECS",
            DEFAULT_MODEL_TIMEOUT_SECS,
        ));
        Some(cfg)
    }
}

/// Paginated proxy-list endpoint.
#[derive(Debug, Clone)]
pub struct EgressListConfig {
    pub url: String,
    pub token: String,
    pub page_size: u32,
    pub timeout: Duration,
}

impl EgressListConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            page_size: DEFAULT_EGRESS_PAGE_SIZE,
            timeout: Duration::from_secs(10),
        }
    }

    /// `None` unless a token is configured.
    fn from_env() -> Option<Self> {
        let token = read_env_string("REPSCOUT_EGRESS_TOKEN")
            .or_else(|| read_env_string("WEBSHARE_API_KEY"))
            .filter(|s| !s.is_empty())?;
        let url = read_env_string("REPSCOUT_EGRESS_URL")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_EGRESS_LIST_URL.to_string());
        let mut cfg = Self::new(url, token);
        cfg.page_size = read_env_u32("REPSCOUT_EGRESS_PAGE_SIZE", DEFAULT_EGRESS_PAGE_SIZE).max(1);
        Some(cfg)
    }
}

fn read_env_u64(name: &str, default_value: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn read_env_u32(name: &str, default_value: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default_value)
}

fn read_env_usize(name: &str, default_value: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default_value)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}
