//! Layered configuration: defaults, then a TOML file, then `MEDTRACK_*`
//! environment variables, then command-line overrides.

use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use medtrack_core::ClientConfig;

/// File read when `--config` is not given. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "medtrack.toml";

pub fn load(path: Option<&Path>, base_url: Option<&str>) -> Result<ClientConfig> {
    let mut figment = Figment::from(Serialized::defaults(ClientConfig::default()));
    figment = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("config file {} does not exist", path.display());
            }
            figment.merge(Toml::file(path))
        }
        None => figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
    };
    figment = figment.merge(Env::prefixed("MEDTRACK_"));

    let mut config: ClientConfig = figment.extract().context("invalid medtrack configuration")?;
    if let Some(url) = base_url {
        config.base_url = url.to_string();
    }
    tracing::debug!(base_url = %config.base_url, "configuration loaded");
    Ok(config)
}
