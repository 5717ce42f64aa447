#![doc = include_str!("../README.md")]
#![forbid(missing_docs, rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]

extern crate alloc;

pub mod activation;
pub mod algorithm;
pub mod bcrypt_phc;
mod error;
pub mod format;
pub mod hooks;
pub mod policy;
pub mod portable;
pub mod settings;
pub mod store;
pub mod strategy;
mod verifier;

pub use self::{
    activation::{activate, HostCapabilities, Notifier, TracingNotifier},
    algorithm::{Algorithm, HashConfig, HashOptions},
    error::{ActivationError, Error, Result},
    format::HashFormat,
    hooks::{CheckContext, Hooks},
    portable::PortableHandle,
    settings::Settings,
    store::{CredentialStore, MemoryStore, StoreError, UserId},
    verifier::{CredentialVerifier, Upgrade, Verification},
};
