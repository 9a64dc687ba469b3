// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{bail, Context, Result};
use ::config::{Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::Path;

/// Prefix for environment overrides, e.g. `COLLECTOR__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "COLLECTOR";

/// Load configuration from defaults, an optional file (YAML or JSON) and the
/// process environment, in that order of precedence.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    build(path, None)
}

/// Same as [`load_config`] but reads overrides from `env` instead of the
/// process environment.
pub fn load_config_with_env(path: Option<&Path>, env: HashMap<String, String>) -> Result<Config> {
    build(path, Some(env))
}

fn build(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Config> {
    let defaults = ::config::Config::try_from(&Config::default())
        .context("Failed to seed config defaults")?;

    let mut builder = ::config::Config::builder().add_source(defaults);

    if let Some(path) = path {
        if !path.exists() {
            bail!("config file {} does not exist", path.display());
        }
        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            other => bail!(
                "unsupported config file extension {:?} for {}",
                other,
                path.display()
            ),
        };
        builder = builder.add_source(File::from(path).format(format).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(env),
    );

    let config: Config = builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    config.validate()?;
    Ok(config)
}
