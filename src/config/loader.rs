use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::Path;

use super::{ConfigOverrides, LoopConfig};

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

impl LoopConfig {
    pub fn load() -> Result<Self> {
        Self::load_with(None, None)
    }

    /// Load every layer, lowest priority first.
    pub fn load_with(
        custom_config: Option<&str>,
        cli_overrides: Option<&ConfigOverrides>,
    ) -> Result<Self> {
        tracing::trace!("CONFIG LOAD: Starting");

        let mut figment = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG)) // Embedded defaults
            .merge(Toml::file(Self::user_config_path()))
            .merge(Toml::file("parloop.toml"));

        if let Some(custom_path) = custom_config {
            if !Path::new(custom_path).is_file() {
                anyhow::bail!("Config file not found: {}", custom_path);
            }
            figment = figment.merge(Toml::file(custom_path));
        }

        // Environment variables beat files, CLI flags beat everything
        figment = figment.merge(Env::prefixed("PARLOOP_").split("__"));
        if let Some(overrides) = cli_overrides {
            tracing::trace!("CONFIG LOAD: Applying CLI overrides");
            figment = figment.merge(Serialized::defaults(overrides));
        }

        let config: LoopConfig = figment
            .extract()
            .context("Failed to parse parloop configuration")?;
        tracing::trace!("CONFIG LOAD: Final execution = {:?}", config.execution);

        Ok(config)
    }

    fn user_config_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{}/.config/parloop/config.toml", home),
            Err(_) => "~/.config/parloop/config.toml".to_string(),
        }
    }
}
