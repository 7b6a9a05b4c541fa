use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::model::Account;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as float: {source}")]
    ParseFloat {
        name: String,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
    #[error("failed to read accounts file {path}: {source}")]
    AccountsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse accounts file {path}: {source}")]
    AccountsParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Target site
    pub site_url: String,
    pub accounts_file: PathBuf,
    pub storage_dir: PathBuf,

    // Harvest volumes
    pub latest_limit: usize,
    pub hot_limit: usize,
    pub read_limit: usize,
    pub ai_limit: usize,
    pub categories: Vec<String>,

    // Quality filter
    pub exclude_categories: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub priority_categories: Vec<String>,
    pub user_interests: Vec<String>,
    pub min_replies: u64,
    pub min_views: u64,
    pub min_views_for_zero_replies: u64,

    // Concurrency
    pub fetch_concurrency: usize,
    pub courtesy_delay: Duration,
    pub account_concurrency: usize,
    pub account_stagger: Duration,

    // Browser
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub page_timeout: Duration,
    pub challenge_timeout: Duration,

    // Human-likeness (cosmetic, never gates success)
    pub humanize: bool,
    pub humanize_delay_ms: (u64, u64),
    pub char_jitter_ms: (u64, u64),

    // Scroll loading
    pub scroll_enabled: bool,
    pub scroll_times: u32,
    pub scroll_interval: Duration,

    // Detail fetch
    pub detail_max_retries: u32,

    // Cache
    pub cache_days: i64,

    // AI
    pub ai_enabled: bool,
    pub ai_api_key: Option<String>,
    pub ai_api_base: Option<String>,
    pub ai_model: String,
    pub ai_temperature: f32,
    pub ai_max_tokens: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            site_url: required_env("SITE_URL").map(|u| u.trim_end_matches('/').to_string())?,
            accounts_file: PathBuf::from(env_or_default("ACCOUNTS_FILE", "./accounts.toml")),
            storage_dir: PathBuf::from(env_or_default("STORAGE_DIR", "./data")),

            latest_limit: parse_env_usize("LATEST_LIMIT", 20)?,
            hot_limit: parse_env_usize("HOT_LIMIT", 10)?,
            read_limit: parse_env_usize("READ_LIMIT", 5)?,
            ai_limit: parse_env_usize("AI_LIMIT", 3)?,
            categories: env_list("CATEGORIES", &[]),

            exclude_categories: env_list(
                "EXCLUDE_CATEGORIES",
                &["Announcements", "Site Feedback", "Staff"],
            ),
            exclude_keywords: env_list(
                "EXCLUDE_KEYWORDS",
                &["community guidelines", "forum rules", "moderator", "banned"],
            ),
            priority_categories: env_list(
                "PRIORITY_CATEGORIES",
                &["Linux", "DevOps", "Docker", "AI", "Programming", "Tutorials"],
            ),
            user_interests: env_list("USER_INTERESTS", &[]),
            min_replies: parse_env_u64("MIN_REPLIES", 1)?,
            min_views: parse_env_u64("MIN_VIEWS", 30)?,
            min_views_for_zero_replies: parse_env_u64("MIN_VIEWS_FOR_ZERO_REPLIES", 50)?,

            fetch_concurrency: parse_env_usize("FETCH_CONCURRENCY", 3)?,
            courtesy_delay: Duration::from_millis(parse_env_u64("COURTESY_DELAY_MS", 500)?),
            account_concurrency: parse_env_usize("ACCOUNT_CONCURRENCY", 2)?,
            account_stagger: Duration::from_secs(parse_env_u64("ACCOUNT_STAGGER_SECS", 120)?),

            headless: parse_env_bool("HEADLESS", true)?,
            chrome_path: optional_env("CHROME_PATH"),
            page_timeout: Duration::from_secs(parse_env_u64("PAGE_TIMEOUT_SECS", 60)?),
            challenge_timeout: Duration::from_secs(parse_env_u64("CHALLENGE_TIMEOUT_SECS", 30)?),

            humanize: parse_env_bool("HUMANIZE", true)?,
            humanize_delay_ms: (
                parse_env_u64("HUMANIZE_MIN_DELAY_MS", 300)?,
                parse_env_u64("HUMANIZE_MAX_DELAY_MS", 1500)?,
            ),
            char_jitter_ms: (
                parse_env_u64("CHAR_JITTER_MIN_MS", 40)?,
                parse_env_u64("CHAR_JITTER_MAX_MS", 160)?,
            ),

            scroll_enabled: parse_env_bool("SCROLL_ENABLED", false)?,
            scroll_times: parse_env_u32("SCROLL_TIMES", 3)?,
            scroll_interval: Duration::from_millis(parse_env_u64("SCROLL_INTERVAL_MS", 1500)?),

            detail_max_retries: parse_env_u32("DETAIL_MAX_RETRIES", 3)?,

            cache_days: i64::try_from(parse_env_u64("CACHE_DAYS", 7)?).unwrap_or(7),

            ai_enabled: parse_env_bool("AI_ENABLED", true)?,
            ai_api_key: optional_env("AI_API_KEY"),
            ai_api_base: optional_env("AI_API_BASE"),
            ai_model: env_or_default("AI_MODEL", "gpt-4o-mini"),
            ai_temperature: parse_env_f32("AI_TEMPERATURE", 0.7)?,
            ai_max_tokens: parse_env_u32("AI_MAX_TOKENS", 800)?,
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "SITE_URL".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        match url::Url::parse(&self.site_url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
            Ok(parsed) => {
                return Err(ConfigError::InvalidValue {
                    name: "SITE_URL".to_string(),
                    message: format!("unsupported scheme: {}", parsed.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::InvalidValue {
                    name: "SITE_URL".to_string(),
                    message: format!("not a valid URL: {e}"),
                });
            }
        }
        if self.fetch_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "FETCH_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.account_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "ACCOUNT_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.humanize_delay_ms.0 > self.humanize_delay_ms.1 {
            return Err(ConfigError::InvalidValue {
                name: "HUMANIZE_MIN_DELAY_MS".to_string(),
                message: "must not exceed HUMANIZE_MAX_DELAY_MS".to_string(),
            });
        }
        if self.char_jitter_ms.0 > self.char_jitter_ms.1 {
            return Err(ConfigError::InvalidValue {
                name: "CHAR_JITTER_MIN_MS".to_string(),
                message: "must not exceed CHAR_JITTER_MAX_MS".to_string(),
            });
        }
        if self.cache_days < 1 {
            return Err(ConfigError::InvalidValue {
                name: "CACHE_DAYS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Load the accounts file and keep only enabled, complete accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_accounts(&self) -> Result<Vec<Account>, ConfigError> {
        #[derive(serde::Deserialize)]
        struct AccountsFile {
            #[serde(default)]
            accounts: Vec<Account>,
        }

        let raw =
            std::fs::read_to_string(&self.accounts_file).map_err(|e| ConfigError::AccountsIo {
                path: self.accounts_file.clone(),
                source: e,
            })?;
        let parsed: AccountsFile =
            toml::from_str(&raw).map_err(|e| ConfigError::AccountsParse {
                path: self.accounts_file.clone(),
                source: e,
            })?;
        Ok(parsed
            .accounts
            .into_iter()
            .filter(|a| a.enabled && !a.username.is_empty() && !a.password.is_empty())
            .collect())
    }

    /// A minimal configuration for tests. Every timing knob is zeroed so
    /// tests never sleep for real.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            site_url: "https://forum.example.com".to_string(),
            accounts_file: PathBuf::from("accounts.toml"),
            storage_dir: PathBuf::from("./data"),
            latest_limit: 20,
            hot_limit: 10,
            read_limit: 5,
            ai_limit: 3,
            categories: Vec::new(),
            exclude_categories: vec!["Announcements".to_string()],
            exclude_keywords: vec!["forum rules".to_string()],
            priority_categories: vec!["Linux".to_string()],
            user_interests: Vec::new(),
            min_replies: 1,
            min_views: 30,
            min_views_for_zero_replies: 50,
            fetch_concurrency: 3,
            courtesy_delay: Duration::from_millis(0),
            account_concurrency: 2,
            account_stagger: Duration::from_secs(0),
            headless: true,
            chrome_path: None,
            page_timeout: Duration::from_secs(5),
            challenge_timeout: Duration::from_secs(1),
            humanize: false,
            humanize_delay_ms: (0, 0),
            char_jitter_ms: (0, 0),
            scroll_enabled: false,
            scroll_times: 0,
            scroll_interval: Duration::from_millis(0),
            detail_max_retries: 2,
            cache_days: 7,
            ai_enabled: false,
            ai_api_key: None,
            ai_api_base: None,
            ai_model: "gpt-4o-mini".to_string(),
            ai_temperature: 0.7,
            ai_max_tokens: 800,
        }
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_list(name: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => default.iter().map(ToString::to_string).collect(),
    }
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_f32(name: &str, default: f32) -> Result<f32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseFloat {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
