//! Configuration management for the CLI

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use verifier_lib::VerifierConfig;

/// Load verifier configuration
///
/// An explicit `path` must exist; otherwise `~/.config/rv/config.toml` is used
/// when present. Environment variables prefixed `RV_` override file values.
pub fn load(path: Option<&Path>) -> Result<VerifierConfig> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        None => {
            if let Some(default_path) = default_config_path() {
                builder = builder.add_source(config::File::from(default_path).required(false));
            }
        }
    }

    let settings = builder
        .add_source(config::Environment::with_prefix("RV").try_parsing(true))
        .build()
        .context("Failed to load configuration")?;

    settings
        .try_deserialize()
        .context("Failed to parse configuration")
}

/// Get the default configuration file path
fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".config").join("rv").join("config.toml"))
}
