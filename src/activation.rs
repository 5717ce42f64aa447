//! Installing the verifier into a host.
//!
//! The host tells us whether someone else already replaced its password
//! hashing and whether it has the hashing primitive at all. Either problem
//! means we stay out of the way and leave an admin warning.

use crate::{
    algorithm::HashConfig, error::ActivationError, store::CredentialStore,
    verifier::CredentialVerifier,
};

/// Host notification mechanism for admin-facing warnings.
pub trait Notifier {
    /// Surface a human-readable, advisory warning.
    fn admin_warning(&self, message: &str);
}

/// [`Notifier`] that logs warnings through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn admin_warning(&self, message: &str) {
        tracing::warn!(target: "password_rehash::admin", "{message}");
    }
}

/// What the host can tell us about its password hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Another provider already overrides password hashing
    pub hasher_overridden: bool,
    /// The native hashing primitive is available
    pub native_hashing: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            hasher_overridden: false,
            native_hashing: true,
        }
    }
}

/// Build a verifier for the host, or refuse with a warning.
///
/// A refusal is never fatal: the warning goes to `notifier` and the host keeps
/// its own hashing.
pub fn activate<S>(
    host: &HostCapabilities,
    notifier: &dyn Notifier,
    config: HashConfig,
    store: S,
) -> Result<CredentialVerifier<S>, ActivationError>
where
    S: CredentialStore,
{
    let refusal = if host.hasher_overridden {
        Some(ActivationError::Conflict)
    } else if !host.native_hashing {
        Some(ActivationError::MissingCapability)
    } else {
        None
    };

    if let Some(err) = refusal {
        notifier.admin_warning(&err.to_string());
        return Err(err);
    }

    tracing::debug!(algorithm = %config.algorithm, "password hashing activated");
    Ok(CredentialVerifier::new(config, store))
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::{activate, HostCapabilities, Notifier};
    use crate::{settings::Settings, store::MemoryStore, ActivationError, Algorithm, HashConfig};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Notifier for Recorder {
        fn admin_warning(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_owned());
        }
    }

    #[test]
    fn activates_on_capable_host() {
        let notifier = Recorder::default();
        let verifier = activate(
            &HostCapabilities::default(),
            &notifier,
            HashConfig::default(),
            MemoryStore::new(),
        )
        .unwrap();

        assert_eq!(verifier.config().algorithm, Algorithm::Argon2id);
        assert!(notifier.0.lock().unwrap().is_empty());
    }

    #[test]
    fn refuses_when_overridden() {
        let notifier = Recorder::default();
        let host = HostCapabilities {
            hasher_overridden: true,
            native_hashing: true,
        };

        let err = activate(&host, &notifier, HashConfig::default(), MemoryStore::new())
            .unwrap_err();
        assert_eq!(err, ActivationError::Conflict);

        let warnings = notifier.0.lock().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("already overridden"));
    }

    #[test]
    fn refuses_without_primitive() {
        let notifier = Recorder::default();
        let host = HostCapabilities {
            hasher_overridden: false,
            native_hashing: false,
        };

        let err = activate(&host, &notifier, HashConfig::default(), MemoryStore::new())
            .unwrap_err();
        assert_eq!(err, ActivationError::MissingCapability);
        assert_eq!(notifier.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn unknown_algorithm_warns_and_falls_back() {
        let notifier = Recorder::default();
        let settings = Settings::from_toml("algorithm = \"rot13\"").unwrap();

        let config = HashConfig::from_settings(settings, &notifier);
        assert_eq!(config.algorithm, Algorithm::default());

        let warnings = notifier.0.lock().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("rot13"));
    }

    #[test]
    fn known_algorithm_is_silent() {
        let notifier = Recorder::default();
        let settings = Settings::from_toml("algorithm = \"2y\"\n[options]\ncost = 9").unwrap();

        let config = HashConfig::from_settings(settings, &notifier);
        assert_eq!(config.algorithm, Algorithm::Bcrypt);
        assert_eq!(config.options.cost, Some(9));
        assert!(notifier.0.lock().unwrap().is_empty());
    }
}
