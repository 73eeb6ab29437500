//! Initialize the configuration directory: create ~/.modechat and a default config.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Written on `init`: static auth with no tokens and the file history backend.
const DEFAULT_CONFIG: &str = r#"{
  "gateway": { "bind": "127.0.0.1", "port": 15151 },
  "completion": { "model": "gpt-4o", "temperature": 0.7, "maxTokens": 800 },
  "auth": { "provider": "static", "tokens": {} },
  "storage": { "backend": "file" }
}
"#;

/// Ensure the configuration directory has been initialized (config file exists).
pub fn require_initialized(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        anyhow::bail!(
            "configuration not initialized; run `modechat init` first (config file not found: {})",
            config_path.display()
        );
    }
    Ok(())
}

/// Create the config directory and a default `config.json` if they do not exist.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}
