use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{error, warn};

pub const BACKEND_URL_ENV: &str = "CHAI_BACKEND_URL";

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_duration_ms() -> u64 {
    4000
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// How long a toast stays on screen.
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    /// Mirror toasts to the desktop notification daemon.
    #[serde(default)]
    pub desktop: bool,
    /// Show a generic toast for failures that carry no message of their own.
    #[serde(default)]
    pub report_unclassified: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 900,
            height: 700,
            min_width: 400,
            min_height: 300,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            duration_ms: default_duration_ms(),
            desktop: false,
            report_unclassified: false,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        let mut config = if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                    warn!(path = %config_path.display(), "Error parsing config.toml: {}. Using defaults.", e);
                    Config::default()
                }),
                Err(e) => {
                    warn!(path = %config_path.display(), "Error reading config.toml: {}. Using defaults.", e);
                    Config::default()
                }
            }
        } else {
            Config::default()
        };

        config.apply_env_override(std::env::var(BACKEND_URL_ENV).ok());

        if config.backend.base_url.is_empty() {
            error!(
                "No backend URL configured; set {} or backend.base_url in {}",
                BACKEND_URL_ENV,
                config_path.display()
            );
        }

        config
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn apply_env_override(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            self.backend.base_url = url;
        }
    }

    pub fn get_config_path() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/chai/config.toml")
        } else {
            PathBuf::from("config.toml")
        }
    }
}
