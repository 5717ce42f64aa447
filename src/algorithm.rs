//! Algorithm configuration: which primitive new hashes are issued with, and
//! its tunable options.

use core::{fmt, str::FromStr};

use argon2::{Algorithm as Argon2Variant, Argon2, PasswordHasher, Version};
use password_hash::SaltString;
use rand::rngs::OsRng;
use serde::Deserialize;

use crate::{
    activation::Notifier,
    bcrypt_phc::{self, COST_RANGE},
    error::{Error, Result},
    settings::Settings,
};

/// Password hashing algorithms new credentials can be issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    /// bcrypt, issued as a `$2y$` modular crypt string
    Bcrypt,
    /// Argon2i, issued as a PHC string
    Argon2i,
    /// Argon2id, issued as a PHC string
    #[default]
    Argon2id,
}

impl Algorithm {
    /// Identifier used in PHC strings and configuration.
    #[must_use]
    pub fn ident(self) -> &'static str {
        match self {
            Self::Bcrypt => "bcrypt",
            Self::Argon2i => "argon2i",
            Self::Argon2id => "argon2id",
        }
    }

    /// Map a PHC algorithm identifier to a supported algorithm.
    #[must_use]
    pub fn from_ident(ident: &str) -> Option<Self> {
        match ident {
            "bcrypt" => Some(Self::Bcrypt),
            "argon2i" => Some(Self::Argon2i),
            "argon2id" => Some(Self::Argon2id),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ident())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "2y" | "bcrypt" | "password_bcrypt" => Ok(Self::Bcrypt),
            "argon2i" | "password_argon2i" => Ok(Self::Argon2i),
            "argon2id" | "password_argon2id" => Ok(Self::Argon2id),
            _ => Err(Error::UnknownAlgorithm(s.to_owned())),
        }
    }
}

/// Tunable hashing options. Unset values use the primitive's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HashOptions {
    /// bcrypt cost factor
    pub cost: Option<u32>,
    /// Argon2 memory size in KiB
    pub memory_cost: Option<u32>,
    /// Argon2 number of passes
    pub time_cost: Option<u32>,
    /// Argon2 degree of parallelism
    pub threads: Option<u32>,
}

impl HashOptions {
    /// Set the bcrypt cost factor.
    #[must_use]
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Set the Argon2 memory, time and parallelism costs.
    #[must_use]
    pub fn with_argon2(mut self, memory_cost: u32, time_cost: u32, threads: u32) -> Self {
        self.memory_cost = Some(memory_cost);
        self.time_cost = Some(time_cost);
        self.threads = Some(threads);
        self
    }

    /// Resolve the bcrypt parameters these options describe.
    pub fn bcrypt_params(&self) -> Result<bcrypt_phc::Params> {
        let cost = self.cost.unwrap_or(::bcrypt::DEFAULT_COST);
        bcrypt_phc::Params::new(cost).map_err(|_| {
            Error::InvalidOptions(format!(
                "bcrypt cost {cost} is outside {}..={}",
                COST_RANGE.start(),
                COST_RANGE.end()
            ))
        })
    }

    /// Resolve the Argon2 parameters these options describe.
    pub fn argon2_params(&self) -> Result<argon2::Params> {
        argon2::Params::new(
            self.memory_cost.unwrap_or(argon2::Params::DEFAULT_M_COST),
            self.time_cost.unwrap_or(argon2::Params::DEFAULT_T_COST),
            self.threads.unwrap_or(argon2::Params::DEFAULT_P_COST),
            None,
        )
        .map_err(|err| Error::InvalidOptions(format!("argon2: {err}")))
    }
}

/// Process-wide algorithm configuration.
///
/// Built once at startup; the verifier only swaps it through an explicit
/// `reconfigure`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashConfig {
    /// Algorithm new hashes are issued with
    pub algorithm: Algorithm,
    /// Options for that algorithm
    pub options: HashOptions,
}

impl HashConfig {
    /// Configuration from explicit values.
    #[must_use]
    pub fn new(algorithm: Algorithm, options: HashOptions) -> Self {
        Self { algorithm, options }
    }

    /// Resolve loaded settings.
    ///
    /// An unknown algorithm identifier isn't fatal: the admin is warned and the
    /// default algorithm is used instead.
    pub fn from_settings(settings: Settings, notifier: &dyn Notifier) -> Self {
        let algorithm = match settings.algorithm.as_deref() {
            None => Algorithm::default(),
            Some(ident) => ident.parse().unwrap_or_else(|_| {
                notifier.admin_warning(&format!(
                    "The configured password hashing algorithm \"{ident}\" does not exist. \
                     The default algorithm ({}) will be used.",
                    Algorithm::default()
                ));
                Algorithm::default()
            }),
        };

        Self {
            algorithm,
            options: settings.options,
        }
    }

    /// Hash `password` with a fresh random salt.
    pub fn hash_password(&self, password: &[u8]) -> Result<String> {
        let variant = match self.algorithm {
            Algorithm::Bcrypt => {
                let params = self.options.bcrypt_params()?;
                return Ok(bcrypt_phc::hash_mcf(password, params)?);
            }
            Algorithm::Argon2i => Argon2Variant::Argon2i,
            Algorithm::Argon2id => Argon2Variant::Argon2id,
        };

        let argon2 = Argon2::new(variant, Version::V0x13, self.options.argon2_params()?);
        let salt = SaltString::generate(&mut OsRng);
        Ok(argon2.hash_password(password, &salt)?.to_string())
    }
}
