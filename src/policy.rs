//! Rehash policy: does a stored hash fall short of the current configuration?

use password_hash::PasswordHash;

use crate::{
    algorithm::{Algorithm, HashConfig},
    bcrypt_phc,
    format::{self, HashFormat},
};

/// Whether `hash` should be replaced by one issued under `config`.
///
/// Legacy formats always need a rehash. Modern hashes need one when their
/// algorithm or embedded parameters differ from `config`, or when they can't
/// be parsed at all.
#[must_use]
pub fn needs_rehash(hash: &str, config: &HashConfig) -> bool {
    match format::detect(hash) {
        HashFormat::ModernEncoded(algorithm) => {
            algorithm != config.algorithm
                || format::parse_modern(hash)
                    .map_or(true, |parsed| params_differ(&parsed, config))
        }
        HashFormat::LegacyUnsalted | HashFormat::LegacyPortable => true,
    }
}

fn params_differ(parsed: &PasswordHash<'_>, config: &HashConfig) -> bool {
    match config.algorithm {
        Algorithm::Bcrypt => {
            match (
                bcrypt_phc::Params::try_from(parsed),
                config.options.bcrypt_params(),
            ) {
                (Ok(stored), Ok(wanted)) => stored != wanted,
                _ => true,
            }
        }
        Algorithm::Argon2i | Algorithm::Argon2id => {
            let current_version = u32::from(argon2::Version::V0x13);
            if parsed.version != Some(current_version) {
                return true;
            }

            match (
                argon2::Params::try_from(parsed),
                config.options.argon2_params(),
            ) {
                (Ok(stored), Ok(wanted)) => {
                    stored.m_cost() != wanted.m_cost()
                        || stored.t_cost() != wanted.t_cost()
                        || stored.p_cost() != wanted.p_cost()
                        || output_len(&stored) != output_len(&wanted)
                }
                _ => true,
            }
        }
    }
}

fn output_len(params: &argon2::Params) -> usize {
    params
        .output_len()
        .unwrap_or(argon2::Params::DEFAULT_OUTPUT_LEN)
}
