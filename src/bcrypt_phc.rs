//! bcrypt support on top of the `password-hash` traits.
//!
//! Stored bcrypt hashes come in two shapes: the classic modular crypt format
//! (`$2y$10$...`, what PHP and most frameworks emit) and the PHC string
//! format (`$bcrypt$r=10$...`). Both are verified by converting into a
//! [`PasswordHash`] and running the [`Bcrypt`] hasher over it, so the final
//! digest comparison is the constant-time one from [`password_hash::Output`].

use alloc::{string::String, vec::Vec};
use password_hash::{
    errors::InvalidValue, Encoding, Error, Ident, McfHasher, ParamsString, PasswordHash,
    PasswordHasher, Salt,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

pub(crate) const ALGORITHM: Ident<'static> = Ident::new_unwrap("bcrypt");

/// Cost range accepted by the bcrypt primitive.
pub const COST_RANGE: core::ops::RangeInclusive<u32> = 4..=31;

/// Length of a modular crypt bcrypt string (`$2y$NN$` + 22 salt + 31 hash).
const MCF_LEN: usize = 60;

/// bcrypt parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Params {
    cost: u32,
}

impl Params {
    /// Build parameters for the given cost, rejecting values the primitive can't run.
    pub fn new(cost: u32) -> password_hash::Result<Self> {
        if COST_RANGE.contains(&cost) {
            Ok(Self { cost })
        } else {
            Err(Error::ParamValueInvalid(InvalidValue::Malformed))
        }
    }

    /// Work factor (log2 of the number of expansion rounds)
    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            cost: ::bcrypt::DEFAULT_COST,
        }
    }
}

impl<'a> TryFrom<&'a PasswordHash<'a>> for Params {
    type Error = Error;

    fn try_from(value: &'a PasswordHash<'a>) -> Result<Self, Self::Error> {
        let rounds = value
            .params
            .get_decimal("r")
            .ok_or(Error::ParamValueInvalid(InvalidValue::Malformed))?;

        Self::new(rounds)
    }
}

impl TryInto<ParamsString> for Params {
    type Error = Error;

    fn try_into(self) -> Result<ParamsString, Self::Error> {
        let mut string = ParamsString::new();
        string.add_decimal("r", self.cost)?;
        Ok(string)
    }
}

/// bcrypt hasher
pub struct Bcrypt;

impl PasswordHasher for Bcrypt {
    type Params = Params;

    fn hash_password_customized<'a>(
        &self,
        password: &[u8],
        algorithm: Option<password_hash::Ident<'a>>,
        _version: Option<password_hash::Decimal>,
        params: Self::Params,
        salt: impl Into<password_hash::Salt<'a>>,
    ) -> password_hash::Result<PasswordHash<'a>> {
        if let Some(algorithm) = algorithm {
            if algorithm != ALGORITHM {
                return Err(Error::Algorithm);
            }
        }
        let params = Params::new(params.cost)?;

        let salt = salt.into();
        let mut salt_bytes = [0; 16];

        // MCF salts keep the bcrypt alphabet after conversion, PHC salts use standard B64.
        if Encoding::Bcrypt
            .decode(salt.as_str(), &mut salt_bytes)
            .is_err()
        {
            salt.decode_b64(&mut salt_bytes)?;
        }

        // Null-terminate the password
        let mut password_vec = Zeroizing::new(Vec::with_capacity(password.len() + 1));
        password_vec.extend_from_slice(password);
        password_vec.push(0);

        // Truncate to 72 bytes like the `bcrypt` crate and PHP do
        let truncated = if password_vec.len() > 72 {
            &password_vec[..72]
        } else {
            &password_vec
        };

        // The last byte of the raw output is never encoded
        let raw_hash = ::bcrypt::bcrypt(params.cost, salt_bytes, truncated);
        let raw_hash = &raw_hash[..23];

        Ok(PasswordHash {
            algorithm: ALGORITHM,
            version: None,
            params: params.try_into()?,
            salt: Some(salt),
            hash: Some(raw_hash.try_into()?),
        })
    }
}

impl McfHasher for Bcrypt {
    fn upgrade_mcf_hash<'a>(&self, hash: &'a str) -> password_hash::Result<PasswordHash<'a>> {
        if !is_mcf(hash) {
            return Err(Error::PhcStringField);
        }

        // Manual MCF decoding because the bcrypt crate doesn't expose all the necessary fields
        let mut mcf_split = hash.split('$').filter(|part| !part.is_empty()).skip(1);

        let cost = mcf_split
            .next()
            .and_then(|cost_str| cost_str.parse::<u32>().ok())
            .ok_or(Error::ParamValueInvalid(InvalidValue::Malformed))?;

        let mcf_content = mcf_split
            .next()
            .ok_or(Error::ParamValueInvalid(InvalidValue::Malformed))?;

        let (b64_salt, b64_hash) = mcf_content
            .get(..22)
            .zip(mcf_content.get(22..))
            .ok_or(Error::ParamValueInvalid(InvalidValue::Malformed))?;

        let mut raw_hash = [0; 23];
        Encoding::Bcrypt.decode(b64_hash, &mut raw_hash)?;

        let params = Params::new(cost)?.try_into()?;

        Ok(PasswordHash {
            algorithm: ALGORITHM,
            version: None,
            params,
            salt: Some(Salt::from_b64(b64_salt)?),
            hash: Some(raw_hash.as_ref().try_into()?),
        })
    }
}

/// Whether `hash` has the shape of a modular crypt bcrypt string.
///
/// Only the layout is checked: prefix, two-digit cost, total length, and a
/// salt-plus-digest tail drawn from the bcrypt alphabet.
///
/// `$2x$` is not accepted. It marks hashes from the broken `crypt_blowfish`
/// variant, which the standard algorithm can't reproduce for non-ASCII
/// passwords.
#[must_use]
pub fn is_mcf(hash: &str) -> bool {
    let bytes = hash.as_bytes();
    bytes.len() == MCF_LEN
        && bytes[0] == b'$'
        && bytes[1] == b'2'
        && matches!(bytes[2], b'a' | b'b' | b'y')
        && bytes[3] == b'$'
        && bytes[4].is_ascii_digit()
        && bytes[5].is_ascii_digit()
        && bytes[6] == b'$'
        && bytes[7..].iter().all(|&c| is_bcrypt_char(c))
}

fn is_bcrypt_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'.' || c == b'/'
}

/// Hash `password` into a `$2y$` modular crypt string with a fresh random salt.
pub fn hash_mcf(password: &[u8], params: Params) -> Result<String, ::bcrypt::BcryptError> {
    let mut salt = [0_u8; 16];
    OsRng.fill_bytes(&mut salt);

    let parts = ::bcrypt::hash_with_salt(password, params.cost, salt)?;
    Ok(parts.format_for_version(::bcrypt::Version::TwoY))
}
