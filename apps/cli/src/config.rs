//! CLI configuration.
//!
//! Stored as TOML at `~/.config/upqueue/cli.toml` unless `--config` points
//! elsewhere. Every key is optional; command-line flags win over the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use upqueue_queue::QueueOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upload endpoint.
    pub url: String,
    pub method: String,
    pub queue: QueueConfig,
    pub area: AreaConfig,
    pub headers: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "POST".into(),
            queue: QueueConfig::default(),
            area: AreaConfig::default(),
            headers: BTreeMap::new(),
            params: BTreeMap::new(),
        }
    }
}

/// Admission settings. Keys left out of a `[queue]` table keep these
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 0 means unlimited.
    pub max_parallel: usize,
    pub batch_offset_ms: u64,
    pub auto_start: bool,
    pub auto_remove: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            batch_offset_ms: 0,
            auto_start: true,
            auto_remove: false,
        }
    }
}

impl QueueConfig {
    pub fn options(&self) -> QueueOptions {
        QueueOptions::default()
            .with_max_parallel(self.max_parallel)
            .with_batch_offset(Duration::from_millis(self.batch_offset_ms))
            .with_auto_start(self.auto_start)
            .with_auto_remove(self.auto_remove)
    }
}

/// Validation settings applied to every selected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    /// MiB.
    pub max_file_size: u64,
    pub accept: String,
    pub validate_extension: bool,
    pub allow_empty_file: bool,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1024,
            accept: "*.*".into(),
            validate_extension: false,
            allow_empty_file: false,
        }
    }
}

impl Config {
    /// Loads `path`, or the default location when `None`.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => config_path(),
        };

        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("upqueue").join("cli.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("upqueue")
            .join("cli.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.method, "POST");
        assert!(config.queue.auto_start);
        assert_eq!(config.queue.max_parallel, 4);
        assert_eq!(config.area.max_file_size, 1024);
        assert_eq!(config.area.accept, "*.*");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
            url = "https://up.example/files"

            [queue]
            max_parallel = 2
            batch_offset_ms = 250

            [headers]
            Authorization = "Bearer abc"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.url, "https://up.example/files");
        assert_eq!(config.method, "POST");
        assert_eq!(config.queue.max_parallel, 2);
        assert_eq!(config.queue.batch_offset_ms, 250);
        assert!(config.queue.auto_start);
        assert_eq!(config.headers["Authorization"], "Bearer abc");
        assert_eq!(config.area, AreaConfig::default());
    }

    #[test]
    fn queue_table_keeps_omitted_defaults() {
        let config: Config =
            toml::from_str("url = \"http://x\"\n[queue]\nbatch_offset_ms = 250\n").unwrap();
        assert_eq!(config.queue.max_parallel, 4);
        assert!(config.queue.auto_start);

        let options = config.queue.options();
        assert_eq!(options.max_parallel, 4);
        assert_eq!(options.batch_offset(), Duration::from_millis(250));
        assert!(options.auto_start);
        assert!(!options.auto_remove);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&tmp.path().join("absent.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_reads_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cli.toml");
        let config = Config {
            url: "https://up.example".into(),
            ..Config::default()
        };
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        assert_eq!(Config::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cli.toml");
        std::fs::write(&path, "url = [").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn config_path_not_empty() {
        assert!(config_path().to_string_lossy().contains("upqueue"));
    }
}
