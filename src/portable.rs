//! The phpass "portable" hash scheme.
//!
//! Portable hashes look like `$P$B` + 8 salt characters + 22 digest
//! characters. They carry an iteration count but no algorithm tag, so a
//! configured [`PortableHasher`] is needed to check them. The hasher is kept
//! behind a [`PortableHandle`] that builds it on first use and hands the same
//! instance to every later caller.

use std::sync::Arc;

use md5::{Digest, Md5};
use once_cell::sync::OnceCell;
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

const ITOA64: &[u8; 64] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Iteration count (log2) the legacy hashes were issued with.
pub const LEGACY_ITERATION_COUNT_LOG2: u32 = 8;

/// Longest password the scheme will look at.
pub const MAX_PASSWORD_LEN: usize = 4096;

const SETTING_LEN: usize = 12;
const HASH_LEN: usize = 34;

/// Stateful checker/issuer for phpass portable hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortableHasher {
    iteration_count_log2: u32,
    portable: bool,
}

impl PortableHasher {
    /// Configure a hasher. Out-of-range iteration counts fall back to 8.
    #[must_use]
    pub fn new(iteration_count_log2: u32, portable: bool) -> Self {
        let iteration_count_log2 = if (4..=31).contains(&iteration_count_log2) {
            iteration_count_log2
        } else {
            LEGACY_ITERATION_COUNT_LOG2
        };

        Self {
            iteration_count_log2,
            portable,
        }
    }

    /// Hasher with the parameters every legacy record was created with.
    #[must_use]
    pub fn legacy() -> Self {
        Self::new(LEGACY_ITERATION_COUNT_LOG2, true)
    }

    /// Whether the hasher was configured for portable output.
    #[must_use]
    pub fn is_portable(&self) -> bool {
        self.portable
    }

    /// Check `password` against a stored portable hash.
    ///
    /// Anything that isn't a well-formed `$P$`/`$H$` hash simply doesn't match.
    #[must_use]
    pub fn check_password(&self, password: &[u8], stored: &str) -> bool {
        if password.len() > MAX_PASSWORD_LEN {
            return false;
        }

        match crypt_private(password, stored) {
            Some(computed) => computed.as_bytes().ct_eq(stored.as_bytes()).into(),
            None => false,
        }
    }

    /// Issue a fresh portable hash for `password`.
    ///
    /// Only used to produce legacy records (fixtures, imports); new
    /// credentials should never be stored in this format.
    #[must_use]
    pub fn hash_password(&self, password: &[u8]) -> Option<String> {
        if password.len() > MAX_PASSWORD_LEN {
            return None;
        }

        let mut salt = [0_u8; 6];
        OsRng.fill_bytes(&mut salt);

        let hash = crypt_private(password, &self.gensalt(&salt))?;
        (hash.len() == HASH_LEN).then_some(hash)
    }

    fn gensalt(&self, input: &[u8]) -> String {
        let count = (self.iteration_count_log2 + 5).min(30) as usize;

        let mut setting = String::with_capacity(SETTING_LEN);
        setting.push_str("$P$");
        setting.push(char::from(ITOA64[count]));
        setting.push_str(&encode64(input));
        setting
    }
}

impl Default for PortableHasher {
    fn default() -> Self {
        Self::legacy()
    }
}

/// Lazily-built, shared [`PortableHasher`].
///
/// Clones share the same slot, so however many threads race on first use,
/// exactly one hasher gets built and published.
#[derive(Debug, Clone, Default)]
pub struct PortableHandle {
    cell: Arc<OnceCell<PortableHasher>>,
}

impl PortableHandle {
    /// Empty handle; the hasher is built on the first [`PortableHandle::get`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared hasher, building it with the legacy parameters if needed.
    pub fn get(&self) -> &PortableHasher {
        self.cell.get_or_init(|| {
            tracing::debug!("constructing portable hash verifier");
            PortableHasher::legacy()
        })
    }

    /// Whether the hasher has been built yet.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

fn crypt_private(password: &[u8], setting: &str) -> Option<String> {
    let bytes = setting.as_bytes();
    if bytes.len() < SETTING_LEN || !setting.is_char_boundary(SETTING_LEN) {
        return None;
    }

    let id = &bytes[..3];
    if id != b"$P$" && id != b"$H$" {
        return None;
    }

    let count_log2 = ITOA64.iter().position(|&c| c == bytes[3])?;
    if !(7..=30).contains(&count_log2) {
        return None;
    }
    let count = 1_u32 << count_log2;

    let salt = &bytes[4..SETTING_LEN];

    let mut buffer = Zeroizing::new(Vec::with_capacity(16 + password.len()));
    buffer.extend_from_slice(salt);
    buffer.extend_from_slice(password);
    let mut digest = Md5::digest(buffer.as_slice());

    for _ in 0..count {
        buffer.clear();
        buffer.extend_from_slice(&digest);
        buffer.extend_from_slice(password);
        digest = Md5::digest(buffer.as_slice());
    }

    let mut output = String::with_capacity(HASH_LEN);
    output.push_str(&setting[..SETTING_LEN]);
    output.push_str(&encode64(&digest));
    Some(output)
}

/// phpass' own base-64 flavour: little-endian groups over `ITOA64`.
fn encode64(input: &[u8]) -> String {
    let mut output = String::with_capacity(input.len().div_ceil(3) * 4);

    for chunk in input.chunks(3) {
        let mut value = u32::from(chunk[0]);
        if let Some(&second) = chunk.get(1) {
            value |= u32::from(second) << 8;
        }
        if let Some(&third) = chunk.get(2) {
            value |= u32::from(third) << 16;
        }

        for i in 0..=chunk.len() {
            output.push(char::from(ITOA64[((value >> (6 * i)) & 0x3f) as usize]));
        }
    }

    output
}
