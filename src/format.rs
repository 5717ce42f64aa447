//! Stored hash classification.

use password_hash::{McfHasher, PasswordHash};

use crate::{
    algorithm::Algorithm,
    bcrypt_phc::{self, Bcrypt},
};

/// Anything this long or shorter without an algorithm tag is a bare MD5 digest.
pub const LEGACY_UNSALTED_MAX_LEN: usize = 32;

/// Format of a stored credential hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashFormat {
    /// Self-describing hash (algorithm, parameters, salt and digest)
    ModernEncoded(Algorithm),
    /// Bare, unsalted MD5 hex digest
    LegacyUnsalted,
    /// phpass portable hash, or anything unrecognised
    LegacyPortable,
}

/// Classify a stored hash. Total: every input maps to exactly one format.
#[must_use]
pub fn detect(hash: &str) -> HashFormat {
    if let Some(algorithm) = algorithm_info(hash) {
        HashFormat::ModernEncoded(algorithm)
    } else if hash.len() <= LEGACY_UNSALTED_MAX_LEN {
        HashFormat::LegacyUnsalted
    } else {
        HashFormat::LegacyPortable
    }
}

/// Algorithm a self-describing hash was produced with, if any.
#[must_use]
pub fn algorithm_info(hash: &str) -> Option<Algorithm> {
    if bcrypt_phc::is_mcf(hash) {
        return Some(Algorithm::Bcrypt);
    }
    if !hash.starts_with('$') {
        return None;
    }

    let parsed = PasswordHash::new(hash).ok()?;
    Algorithm::from_ident(parsed.algorithm.as_str())
}

/// Parse a modern hash into PHC form, converting bcrypt MCF strings on the way.
pub(crate) fn parse_modern(hash: &str) -> password_hash::Result<PasswordHash<'_>> {
    if bcrypt_phc::is_mcf(hash) {
        Bcrypt.upgrade_mcf_hash(hash)
    } else {
        PasswordHash::new(hash)
    }
}
