//! Config file handling

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::ReqdeckError;
use crate::http::ExecutorOptions;
use crate::persistence::{DEFAULT_AUTOSAVE_DELAY, DEFAULT_BASE_URL, DEFAULT_POLL_INTERVAL};
use crate::runner::{RunMode, RunOptions};
use crate::scripting::ScriptLimits;

/// Overrides the config directory
pub const CONFIG_DIR_ENV: &str = "REQDECK_CONFIG_DIR";

/// Storage backend settings
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_id: Option<String>,
    pub poll_interval: Duration,
    pub autosave_delay: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_id: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
        }
    }
}

/// reqdeck configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub config_dir: PathBuf,
    pub runner: RunOptions,
    /// Per-request network timeout
    pub http_timeout: Duration,
    pub scripts: ScriptLimits,
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_dir(Self::default_config_dir())
    }
}

impl Config {
    fn with_dir(config_dir: PathBuf) -> Self {
        Self {
            config_dir,
            runner: RunOptions::default(),
            http_timeout: Duration::from_secs(30),
            scripts: ScriptLimits::default(),
            api: ApiConfig::default(),
        }
    }

    /// Load configuration from the config file (TOML format)
    pub fn load() -> Result<Self, ReqdeckError> {
        Self::load_from(&Self::default_config_dir())
    }

    /// Load `config.toml` from `config_dir`; a missing file yields defaults
    pub fn load_from(config_dir: &Path) -> Result<Self, ReqdeckError> {
        let config_file = config_dir.join("config.toml");

        if !config_file.exists() {
            return Ok(Self::with_dir(config_dir.to_path_buf()));
        }

        let content = std::fs::read_to_string(&config_file)
            .map_err(|e| ReqdeckError::Config(format!("Failed to read config: {}", e)))?;

        Self::parse(&content, config_dir)
    }

    /// Parse config TOML; absent keys keep their defaults
    pub fn parse(content: &str, config_dir: &Path) -> Result<Self, ReqdeckError> {
        let toml_value: toml::Value = toml::from_str(content)
            .map_err(|e| ReqdeckError::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Self::with_dir(config_dir.to_path_buf());

        if let Some(mode) = get_str(&toml_value, "runner", "mode") {
            config.runner.mode = mode
                .parse::<RunMode>()
                .map_err(|e| ReqdeckError::Config(format!("runner.mode: {}", e)))?;
        }
        if let Some(delay) = get_duration(&toml_value, "runner", "delay")? {
            config.runner.delay = delay;
        }

        if let Some(timeout) = get_duration(&toml_value, "http", "timeout")? {
            config.http_timeout = timeout;
        }

        if let Some(timeout) = get_duration(&toml_value, "scripts", "timeout")? {
            config.scripts.timeout = timeout;
        }
        if let Some(limit) = toml_value
            .get("scripts")
            .and_then(|s| s.get("memory_limit_mb"))
            .and_then(|v| v.as_integer())
        {
            if limit <= 0 {
                return Err(ReqdeckError::Config(
                    "scripts.memory_limit_mb must be positive".to_string(),
                ));
            }
            config.scripts.memory_limit = usize::try_from(limit)
                .ok()
                .and_then(|mb| mb.checked_mul(1024 * 1024))
                .ok_or_else(|| {
                    ReqdeckError::Config("scripts.memory_limit_mb is too large".to_string())
                })?;
        }

        if let Some(base_url) = get_str(&toml_value, "api", "base_url") {
            config.api.base_url = base_url.to_string();
        }
        config.api.user_id = get_str(&toml_value, "api", "user_id").map(String::from);
        if let Some(interval) = get_duration(&toml_value, "api", "poll_interval")? {
            if interval.is_zero() {
                return Err(ReqdeckError::Config(
                    "api.poll_interval must be greater than zero".to_string(),
                ));
            }
            config.api.poll_interval = interval;
        }
        if let Some(delay) = get_duration(&toml_value, "api", "autosave_delay")? {
            config.api.autosave_delay = delay;
        }

        Ok(config)
    }

    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            timeout: self.http_timeout,
            script_limits: self.scripts.clone(),
        }
    }

    /// Get the default config directory
    fn default_config_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return PathBuf::from(dir);
        }
        dirs::config_dir()
            .map(|p| p.join("reqdeck"))
            .unwrap_or_else(|| PathBuf::from(".reqdeck"))
    }
}

fn get_str<'a>(toml: &'a toml::Value, section: &str, key: &str) -> Option<&'a str> {
    toml.get(section).and_then(|s| s.get(key)).and_then(|v| v.as_str())
}

/// Durations are humantime strings (`"500ms"`, `"2s"`) or integer milliseconds
fn get_duration(
    toml: &toml::Value,
    section: &str,
    key: &str,
) -> Result<Option<Duration>, ReqdeckError> {
    let Some(value) = toml.get(section).and_then(|s| s.get(key)) else {
        return Ok(None);
    };
    if let Some(ms) = value.as_integer() {
        if ms < 0 {
            return Err(ReqdeckError::Config(format!("{}.{} must not be negative", section, key)));
        }
        return Ok(Some(Duration::from_millis(ms as u64)));
    }
    let text = value
        .as_str()
        .ok_or_else(|| ReqdeckError::Config(format!("{}.{} must be a duration", section, key)))?;
    humantime::parse_duration(text)
        .map(Some)
        .map_err(|e| ReqdeckError::Config(format!("{}.{}: {}", section, key, e)))
}
