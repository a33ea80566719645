use std::path::{Path, PathBuf};

use crate::config::types::CodeletConfig;
use crate::error::{CodeletError, Result};

/// Get the default configuration file path
pub fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "codelet", "codelet") {
        proj_dirs.config_dir().join("config.toml")
    } else {
        // Fallback to home directory
        dirs_fallback().join(".codelet").join("config.toml")
    }
}

fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(config_path: Option<&Path>) -> Result<CodeletConfig> {
    let path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    if !path.exists() {
        // Return defaults if no config file exists
        return Ok(CodeletConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config: CodeletConfig =
        toml::from_str(&content).map_err(|e| CodeletError::TomlParse(e.to_string()))?;

    Ok(config)
}
