//! Configuration for the activity agent.

use crate::wm::parser::HYPRCTL_STRIDE;
use crate::wm::window::IdentityStrategy;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding the remote store URL.
pub const ENV_DB_URL: &str = "ACTIVITY_AGENT_DB_URL";
/// Environment variable overriding the remote store API key.
pub const ENV_API_KEY: &str = "ACTIVITY_AGENT_API_KEY";

/// Longest accepted session interval.
pub const MAX_SESSION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input device nodes to read
    pub devices: Vec<DeviceConfig>,

    /// Length of one session bucket
    #[serde(with = "duration_serde")]
    pub session_interval: Duration,

    /// How often the monitor ticks and how much time each tick credits
    #[serde(with = "duration_serde")]
    pub increment_interval: Duration,

    /// How windows are matched against known activity
    pub identity: IdentityStrategy,

    /// Window-manager scraping
    pub scraper: ScraperConfig,

    /// IANA time zone used to date archives
    pub timezone: String,

    /// Delete sessions that ended longer ago than this many days
    pub retention_days: Option<u32>,

    /// Where sessions and archives are persisted
    pub store: StoreConfig,

    /// Path for local state
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity-agent");

        Self {
            devices: vec![
                DeviceConfig::new("mouse", "/dev/input/event19"),
                DeviceConfig::new("keyboard", "/dev/input/event3"),
            ],
            session_interval: Duration::from_secs(30 * 60),
            increment_interval: Duration::from_secs(60),
            identity: IdentityStrategy::default(),
            scraper: ScraperConfig::default(),
            timezone: "UTC".to_string(),
            retention_days: None,
            store: StoreConfig::Json {
                path: data_dir.join("store.json"),
            },
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)?;
        if let StoreConfig::Json { path } = &self.store {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Reject settings the monitor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_interval.as_secs() == 0 {
            return Err(ConfigError::Invalid(
                "session_interval must be at least one second".to_string(),
            ));
        }
        if self.session_interval > MAX_SESSION_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "session_interval must be at most {} seconds",
                MAX_SESSION_INTERVAL.as_secs()
            )));
        }
        if self.increment_interval.as_secs() == 0 {
            return Err(ConfigError::Invalid(
                "increment_interval must be at least one second".to_string(),
            ));
        }
        if self.scraper.stride == 0 {
            return Err(ConfigError::Invalid(
                "scraper.stride must be positive".to_string(),
            ));
        }
        self.tz()?;
        Ok(())
    }

    /// The configured time zone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown time zone '{}'", self.timezone)))
    }

    /// The session interval, clamped to [`MAX_SESSION_INTERVAL`].
    pub fn session_interval(&self) -> chrono::Duration {
        let interval = self.session_interval.min(MAX_SESSION_INTERVAL);
        chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::days(1))
    }

    pub fn retention(&self) -> Option<chrono::Duration> {
        self.retention_days
            .map(|days| chrono::Duration::days(i64::from(days)))
    }
}

/// One input device node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub path: PathBuf,
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Parse a `name=path` pair.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.split_once('=') {
            Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
                Ok(Self::new(name.trim(), path.trim()))
            }
            _ => Err(ConfigError::Invalid(format!(
                "device must be given as name=path, got '{s}'"
            ))),
        }
    }
}

/// How the window list is obtained.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Lines per window block in the command output
    pub stride: usize,
    /// Skip windows with an empty title
    pub require_title: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            command: "hyprctl".to_string(),
            args: vec!["clients".to_string()],
            stride: HYPRCTL_STRIDE,
            require_title: false,
        }
    }
}

/// Persistence backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Keep everything in memory; lost on exit
    Memory,
    /// A local JSON file
    Json { path: PathBuf },
    /// A PostgREST endpoint
    Remote {
        #[serde(default)]
        url: String,
        #[serde(default)]
        api_key: String,
    },
}

impl StoreConfig {
    /// Parse a store selector from the command line: `memory`, `json`,
    /// `json:<path>` or `remote`.
    pub fn from_arg(s: &str, data_path: &std::path::Path) -> Result<Self, ConfigError> {
        match s.split_once(':') {
            None if s == "memory" => Ok(StoreConfig::Memory),
            None if s == "json" => Ok(StoreConfig::Json {
                path: data_path.join("store.json"),
            }),
            None if s == "remote" => Ok(StoreConfig::Remote {
                url: String::new(),
                api_key: String::new(),
            }),
            Some(("json", path)) if !path.is_empty() => Ok(StoreConfig::Json {
                path: PathBuf::from(path),
            }),
            _ => Err(ConfigError::Invalid(format!("unknown store '{s}'"))),
        }
    }

    /// Fill remote credentials from the environment when unset.
    pub fn with_env(self) -> Self {
        match self {
            StoreConfig::Remote { url, api_key } => StoreConfig::Remote {
                url: std::env::var(ENV_DB_URL).unwrap_or(url),
                api_key: std::env::var(ENV_API_KEY).unwrap_or(api_key),
            },
            other => other,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
