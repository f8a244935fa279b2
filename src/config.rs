//! Configuration loader and validator for the front-page scorer.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub app: App,
    pub reddit: Reddit,
    #[serde(default)]
    pub fetch: Fetch,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default)]
    pub scoring: Scoring,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub health_bind: String,
}

/// Reddit API settings. Leave the credentials empty to read the public listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reddit {
    pub user_agent: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_public_base")]
    pub public_base: String,
    #[serde(default = "default_oauth_base")]
    pub oauth_base: String,
    #[serde(default = "default_auth_base")]
    pub auth_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fetch {
    pub listing_limit: u32,
    pub transform_workers: usize,
}

impl Default for Fetch {
    fn default() -> Self {
        Self {
            listing_limit: 10,
            transform_workers: 1,
        }
    }
}

/// Driving loop cadence. Analysis always runs at the top of the hour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub fetch_interval_secs: u64,
    pub tick_ms: u64,
    pub error_pause_secs: u64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            fetch_interval_secs: 600,
            tick_ms: 1_000,
            error_pause_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scoring {
    pub window_hours: u32,
}

impl Default for Scoring {
    fn default() -> Self {
        Self { window_hours: 24 }
    }
}

fn default_public_base() -> String {
    "https://www.reddit.com/".into()
}

fn default_oauth_base() -> String {
    "https://oauth.reddit.com/".into()
}

fn default_auth_base() -> String {
    "https://www.reddit.com/".into()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// `DATABASE_URL` if set, otherwise a SQLite file under `app.data_dir`.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "sqlite://{}/posts.db",
                self.app.data_dir.trim_end_matches('/')
            )
        })
    }

    /// Fill Reddit credentials from `REDDIT_CLIENT_ID` / `REDDIT_CLIENT_SECRET`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("REDDIT_CLIENT_ID") {
            self.reddit.client_id = Some(id);
        }
        if let Ok(secret) = std::env::var("REDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = Some(secret);
        }
    }

    /// App-only credentials, present only when both halves are non-empty.
    pub fn reddit_credentials(&self) -> Option<(String, String)> {
        let id = self.reddit.client_id.as_deref().map(str::trim)?;
        let secret = self.reddit.client_secret.as_deref().map(str::trim)?;
        if id.is_empty() || secret.is_empty() {
            return None;
        }
        Some((id.to_string(), secret.to_string()))
    }
}

/// Load configuration from a YAML file, apply environment overrides and validate.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_env_overrides();
    validate(&cfg)?;
    Ok(cfg)
}

const MAX_FETCH_INTERVAL_SECS: u64 = 24 * 60 * 60;
const MAX_WINDOW_HOURS: u32 = 365 * 24;

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.health_bind.parse::<std::net::SocketAddr>().is_err() {
        return Err(ConfigError::Invalid(
            "app.health_bind must be a socket address like 0.0.0.0:8080",
        ));
    }

    if cfg.reddit.user_agent.trim().is_empty() {
        return Err(ConfigError::Invalid("reddit.user_agent must be non-empty"));
    }
    for base in [
        &cfg.reddit.public_base,
        &cfg.reddit.oauth_base,
        &cfg.reddit.auth_base,
    ] {
        if reqwest::Url::parse(base).is_err() {
            return Err(ConfigError::Invalid("reddit base URLs must be absolute URLs"));
        }
    }
    if cfg.reddit.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("reddit.request_timeout_secs must be > 0"));
    }

    // Reddit caps a listing page at 100 items.
    if cfg.fetch.listing_limit == 0 || cfg.fetch.listing_limit > 100 {
        return Err(ConfigError::Invalid("fetch.listing_limit must be in 1..=100"));
    }
    if cfg.fetch.transform_workers == 0 {
        return Err(ConfigError::Invalid("fetch.transform_workers must be > 0"));
    }

    if cfg.schedule.fetch_interval_secs == 0
        || cfg.schedule.fetch_interval_secs > MAX_FETCH_INTERVAL_SECS
    {
        return Err(ConfigError::Invalid(
            "schedule.fetch_interval_secs must be in 1..=86400",
        ));
    }
    if cfg.schedule.tick_ms == 0 {
        return Err(ConfigError::Invalid("schedule.tick_ms must be > 0"));
    }

    if cfg.scoring.window_hours == 0 || cfg.scoring.window_hours > MAX_WINDOW_HOURS {
        return Err(ConfigError::Invalid("scoring.window_hours must be in 1..=8760"));
    }

    Ok(())
}

/// Returns an example YAML configuration.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  health_bind: "0.0.0.0:8080"

reddit:
  user_agent: "frontpage-scorer/0.1 (by /u/YOUR_REDDIT_USERNAME)"
  # Optional app-only OAuth credentials; REDDIT_CLIENT_ID / REDDIT_CLIENT_SECRET override these.
  client_id: ""
  client_secret: ""

fetch:
  listing_limit: 10
  transform_workers: 4

schedule:
  fetch_interval_secs: 600
  tick_ms: 1000
  error_pause_secs: 60

scoring:
  window_hours: 24
"#
}
