//! Startup configuration loading.
//!
//! Settings come from an optional `password-hash.toml` next to the process,
//! overridden by `PASSWORD_HASH_*` environment variables:
//!
//! ```text
//! PASSWORD_HASH_ALGORITHM=argon2id
//! PASSWORD_HASH_OPTIONS__MEMORY_COST=65536
//! PASSWORD_HASH_OPTIONS__COST=12
//! ```

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::algorithm::HashOptions;

/// File looked up (optionally) by [`Settings::new`].
pub const CONFIG_FILE: &str = "password-hash.toml";

/// Prefix of the environment variables read by [`Settings::new`].
pub const ENV_PREFIX: &str = "PASSWORD_HASH";

/// Raw, unvalidated hashing settings.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Algorithm identifier, resolved by [`crate::HashConfig::from_settings`]
    pub algorithm: Option<String>,
    /// Options handed to the algorithm
    #[serde(default)]
    pub options: HashOptions,
}

impl Settings {
    /// Load from the optional config file and the environment.
    pub fn new() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                File::with_name(CONFIG_FILE)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    /// Load from a TOML document.
    pub fn from_toml(document: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
