use thiserror::Error;

use crate::store::StoreError;

/// Errors raised while issuing or persisting a password hash
#[derive(Error, Debug)]
pub enum Error {
    /// The RustCrypto hashing layer rejected the input or parameters
    #[error("password hashing failed: {0}")]
    Hash(#[from] password_hash::Error),

    /// The bcrypt primitive failed
    #[error("bcrypt hashing failed: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    /// The configured (or filtered) options can't be used with the algorithm
    #[error("invalid hash options: {0}")]
    InvalidOptions(String),

    /// An algorithm identifier that isn't supported
    #[error("unknown password hashing algorithm {0:?}")]
    UnknownAlgorithm(String),

    /// The new hash could not be written back
    #[error("credential update failed: {0}")]
    Store(#[from] StoreError),
}

/// Reasons the verifier refuses to install itself into a host.
///
/// The messages are the admin-facing warnings.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationError {
    /// Another provider already overrides password hashing
    #[error("Another provider has already overridden the password hashing mechanism. Native password hashing will not be enabled.")]
    Conflict,

    /// The host lacks the hashing primitive
    #[error("The host does not provide a native password hashing primitive. Upgrade the host or disable native password hashing.")]
    MissingCapability,
}

/// Result type for hashing operations
pub type Result<T> = std::result::Result<T, Error>;
