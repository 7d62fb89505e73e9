//! Configuration management (TOML)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchSection,
    #[serde(default)]
    pub ignore: IgnoreSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSection {
    /// CPU share above which the top process triggers an alert.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,
    /// CPU share above which it is killed without asking. 0 disables.
    #[serde(default)]
    pub kill_limit: f64,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IgnoreSection {
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Alert for ignored processes too, instead of staying silent.
    #[serde(default)]
    pub alert_ignored: bool,
}

fn default_alert_threshold() -> f64 {
    90.0
}

fn default_interval_seconds() -> u64 {
    5
}

impl Default for WatchSection {
    fn default() -> Self {
        WatchSection {
            alert_threshold: default_alert_threshold(),
            kill_limit: 0.0,
            interval_seconds: default_interval_seconds(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> std::path::PathBuf {
        directories::ProjectDirs::from("", "", "hogwatch")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| std::path::PathBuf::from("config.toml"))
    }
}
