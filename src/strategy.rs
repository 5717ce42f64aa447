//! Per-format verification strategies.

use argon2::Argon2;
use md5::{Digest, Md5};
use subtle::ConstantTimeEq;

use crate::{
    algorithm::HashConfig, bcrypt_phc::Bcrypt, format, policy, portable::PortableHasher,
};

/// Result of checking a password against one stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Check {
    /// The password matched
    pub matched: bool,
    /// The stored hash should be replaced
    pub needs_rehash: bool,
}

impl Check {
    const MISMATCH: Self = Self {
        matched: false,
        needs_rehash: false,
    };

    /// Outcome for formats that are always replaced after a successful login.
    fn legacy(matched: bool) -> Self {
        Self {
            matched,
            needs_rehash: matched,
        }
    }
}

/// Check a self-describing hash using the parameters embedded in it.
///
/// `config` is only consulted for the rehash decision.
#[must_use]
pub fn modern(password: &str, hash: &str, config: &HashConfig) -> Check {
    let Ok(parsed) = format::parse_modern(hash) else {
        return Check::MISMATCH;
    };

    let matched = parsed
        .verify_password(&[&Argon2::default(), &Bcrypt], password)
        .is_ok();

    Check {
        matched,
        needs_rehash: matched && policy::needs_rehash(hash, config),
    }
}

/// Check a bare MD5 hex digest.
#[must_use]
pub fn unsalted(password: &str, hash: &str) -> Check {
    let digest = hex::encode(Md5::digest(password.as_bytes()));
    Check::legacy(hash.as_bytes().ct_eq(digest.as_bytes()).into())
}

/// Check a phpass portable hash.
#[must_use]
pub fn portable(password: &str, hash: &str, hasher: &PortableHasher) -> Check {
    Check::legacy(hasher.check_password(password.as_bytes(), hash))
}
