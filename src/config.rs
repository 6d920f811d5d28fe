use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampling: SamplingConfig,
    pub network: NetworkConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Seconds between samples; unset samples as fast as possible.
    pub interval_secs: Option<f64>,
    pub include_children: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub enabled: bool,
    pub command: Vec<String>,
    pub filter: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            enabled: true,
            command: vec!["bandwhich".to_string(), "-trp".to_string()],
            filter: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Log file used when `--log` is not given; `{pid}` is substituted.
    pub log_template: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            log_template: "psrecord_{pid}.log".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn log_path(&self, pid: u32) -> PathBuf {
        PathBuf::from(self.log_template.replace("{pid}", &pid.to_string()))
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("psrecord").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "ignoring invalid config file");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.sampling.interval_secs, None);
        assert!(!config.sampling.include_children);
        assert!(config.network.enabled);
        assert_eq!(config.network.command, ["bandwhich", "-trp"]);
        assert_eq!(config.network.filter, None);
        assert_eq!(config.output.log_template, "psrecord_{pid}.log");
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[sampling]
interval_secs = 0.5
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sampling.interval_secs, Some(0.5));
        // Other fields should be defaults
        assert!(!config.sampling.include_children);
        assert!(config.network.enabled);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[sampling]
interval_secs = 1.0
include_children = true

[network]
enabled = false
command = ["sudo", "bandwhich", "-trp"]
filter = "python"

[output]
log_template = "runs/{pid}.log"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sampling.interval_secs, Some(1.0));
        assert!(config.sampling.include_children);
        assert!(!config.network.enabled);
        assert_eq!(config.network.command, ["sudo", "bandwhich", "-trp"]);
        assert_eq!(config.network.filter.as_deref(), Some("python"));
        assert_eq!(config.output.log_path(42), PathBuf::from("runs/42.log"));
    }

    #[test]
    fn default_log_path_uses_pid() {
        let config = Config::default();
        assert_eq!(config.output.log_path(1234), PathBuf::from("psrecord_1234.log"));
    }

    #[test]
    fn missing_file_returns_default() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert!(config.network.enabled);
    }

    #[test]
    fn invalid_toml_returns_default() {
        let temp = std::env::temp_dir().join("psrecord_test_invalid.toml");
        std::fs::write(&temp, "this is not valid toml {{{{").unwrap();
        let config = load_config_from_path(&temp);
        assert_eq!(config.sampling.interval_secs, None);
        let _ = std::fs::remove_file(&temp);
    }
}
