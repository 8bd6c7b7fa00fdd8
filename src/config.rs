use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MonitorError, Result};
use crate::feature_engineering::FeatureLayout;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub log_path: PathBuf,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub models: Vec<ModelParams>,
}

/// One served model version.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelParams {
    pub version: String,
    pub path: PathBuf,
    #[serde(default)]
    pub features: FeatureLayout,
}

fn default_cache_ttl_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| MonitorError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).map_err(|e| MonitorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(MonitorError::Config("no models configured".to_string()));
        }
        let mut seen = HashSet::new();
        for model in &self.models {
            if model.version.trim().is_empty() {
                return Err(MonitorError::Config("model version must not be blank".to_string()));
            }
            if !seen.insert(model.version.as_str()) {
                return Err(MonitorError::Config(format!(
                    "duplicate model version {}",
                    model.version
                )));
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_path = "monitoring_logs.csv"
log_level = "debug"

[[models]]
version = "v1"
path = "units_sold_model_v1.gbdt"
features = "numeric"

[[models]]
version = "v2"
path = "units_sold_model_v2.gbdt"
features = "one_hot"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.log_path, PathBuf::from("monitoring_logs.csv"));
        assert_eq!(config.cache_ttl(), Duration::from_secs(5));
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[1].features, FeatureLayout::OneHot);
    }

    #[test]
    fn test_rejects_duplicate_versions() {
        let toml = r#"
log_path = "logs.csv"
[[models]]
version = "v1"
path = "a"
[[models]]
version = "v1"
path = "b"
"#;
        assert!(matches!(Config::from_toml(toml), Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_rejects_empty_model_list() {
        assert!(Config::from_toml("log_path = \"logs.csv\"").is_err());
    }
}
