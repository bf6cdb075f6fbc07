use super::models::EngineConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> EngineConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return EngineConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err:#}");
            EngineConfig::default()
        }
    }
}

pub fn parse_config(contents: &str) -> Result<EngineConfig> {
    let config: EngineConfig = toml::from_str(contents).context("Parsing engine config")?;
    Ok(config.sanitized())
}

pub fn serialize_config(config: &EngineConfig) -> Result<String> {
    toml::to_string(config).context("Serializing engine config")
}
