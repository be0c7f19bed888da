//! Configuration file support for sentinel
//!
//! Reads from .sentinel/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::trace::Grid;

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Replay pacing
    #[serde(default)]
    pub replay: ReplayConfig,

    /// Terminal UI settings
    #[serde(default)]
    pub tui: TuiConfig,

    /// Grid pitch for node positions
    #[serde(default)]
    pub layout: LayoutConfig,

    /// HTTP API settings
    #[serde(default)]
    pub serve: ServeConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReplayConfig {
    /// Milliseconds between revealed steps
    /// Default: 600
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TuiConfig {
    /// Input poll / redraw cadence in milliseconds
    /// Default: 100
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LayoutConfig {
    #[serde(default = "default_column_width")]
    pub column_width: f64,
    #[serde(default = "default_row_height")]
    pub row_height: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServeConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_interval_ms() -> u64 {
    600
}

fn default_tick_ms() -> u64 {
    100
}

fn default_column_width() -> f64 {
    350.0
}

fn default_row_height() -> f64 {
    180.0
}

fn default_port() -> u16 {
    3000
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            column_width: default_column_width(),
            row_height: default_row_height(),
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Config {
    /// Load config from .sentinel/config.toml
    /// Returns default config if file doesn't exist
    pub fn load() -> Self {
        if let Some(path) = Self::find_config_path() {
            if let Ok(contents) = std::fs::read_to_string(&path) {
                match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!(path = %path.display(), "ignoring invalid config: {}", e),
                }
            }
        }
        Self::default()
    }

    /// Find config.toml by walking up directory tree
    fn find_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut dir = current_dir.as_path();

        loop {
            let config_path = dir.join(".sentinel").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        None
    }

    pub fn replay_interval(&self) -> Duration {
        Duration::from_millis(self.replay.interval_ms)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tui.tick_ms.max(10))
    }

    pub fn grid(&self) -> Grid {
        Grid {
            column_width: self.layout.column_width,
            row_height: self.layout.row_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.replay_interval(), Duration::from_millis(600));
        assert_eq!(config.tick_rate(), Duration::from_millis(100));
        assert_eq!(config.grid(), Grid::default());
        assert_eq!(config.serve.port, 3000);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[replay]
interval_ms = 250

[layout]
row_height = 90.0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.replay_interval(), Duration::from_millis(250));
        assert_eq!(config.layout.row_height, 90.0);
        assert_eq!(config.layout.column_width, 350.0);
        assert_eq!(config.tui.tick_ms, 100);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let rendered = toml::to_string(&Config::default()).unwrap();
        assert!(rendered.contains("interval_ms = 600"));
    }
}
