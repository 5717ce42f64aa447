//! Credential verifier: format dispatch, rehash and write-back.

use crate::{
    algorithm::HashConfig,
    error::{Error, Result},
    format::{self, HashFormat},
    hooks::{CheckContext, Hooks},
    policy,
    portable::PortableHandle,
    store::{
        CredentialFields, CredentialStore, StoreError, UserId, USERS_CACHE_GROUP, USERS_TABLE,
    },
    strategy,
};

/// What happened to the stored hash during a check
#[derive(Debug)]
pub enum Upgrade {
    /// Password didn't match, or the hash is already current
    NotRequired,
    /// A rehash was due but no user id was given, so nothing was written
    Skipped,
    /// A new hash was issued and stored
    Persisted,
    /// A rehash was due but issuing or storing it failed; the old hash stays
    Failed(Error),
}

/// Outcome of a password check.
#[derive(Debug)]
pub struct Verification {
    /// The password was correct
    pub matched: bool,
    /// Hash now stored for the user: the new one after an upgrade, the
    /// original otherwise
    pub hash: String,
    /// User the check was made for
    pub user_id: Option<UserId>,
    /// Rehash status
    pub upgrade: Upgrade,
}

impl Verification {
    /// The stored hash was replaced during this check.
    #[must_use]
    pub fn is_upgraded(&self) -> bool {
        matches!(self.upgrade, Upgrade::Persisted)
    }
}

/// Checks passwords against stored hashes of any supported format and
/// upgrades outdated hashes in place.
#[derive(Debug)]
pub struct CredentialVerifier<S> {
    config: HashConfig,
    store: S,
    portable: PortableHandle,
    hooks: Hooks,
}

impl<S> CredentialVerifier<S>
where
    S: CredentialStore,
{
    /// Verifier with no hooks and its own portable hasher slot.
    pub fn new(config: HashConfig, store: S) -> Self {
        Self::with_parts(config, store, PortableHandle::new(), Hooks::new())
    }

    /// Verifier sharing `portable` with other verifiers and using `hooks`.
    pub fn with_parts(
        config: HashConfig,
        store: S,
        portable: PortableHandle,
        hooks: Hooks,
    ) -> Self {
        Self {
            config,
            store,
            portable,
            hooks,
        }
    }

    /// Current algorithm configuration, before options filters.
    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    /// The storage collaborator.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registered hooks, for adding filters after construction.
    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Replace the algorithm configuration.
    pub fn reconfigure(&mut self, config: HashConfig) {
        tracing::info!(algorithm = %config.algorithm, "password hashing reconfigured");
        self.config = config;
    }

    /// Check `password` against `hash`. See [`CredentialVerifier::verify`].
    pub fn check_password(&self, password: &str, hash: &str, user_id: Option<UserId>) -> bool {
        self.verify(password, hash, user_id).matched
    }

    /// Check `password` against `hash` and upgrade the stored hash when it's due.
    ///
    /// With a `user_id`, a correct password on a legacy or outdated hash gets
    /// a fresh hash written back before this returns. Without one nothing is
    /// written. Never fails: malformed hashes just don't match, and a failed
    /// upgrade is reported through [`Upgrade::Failed`].
    pub fn verify(&self, password: &str, hash: &str, user_id: Option<UserId>) -> Verification {
        let detected = format::detect(hash);
        let check = match detected {
            HashFormat::ModernEncoded(_) => {
                strategy::modern(password, hash, &self.effective_config())
            }
            HashFormat::LegacyUnsalted => strategy::unsalted(password, hash),
            HashFormat::LegacyPortable => {
                strategy::portable(password, hash, self.portable.get())
            }
        };
        tracing::debug!(
            format = ?detected,
            matched = check.matched,
            needs_rehash = check.needs_rehash,
            "password checked"
        );

        let (effective_hash, upgrade) = match (check.matched && check.needs_rehash, user_id) {
            (false, _) => (hash.to_owned(), Upgrade::NotRequired),
            (true, None) => (hash.to_owned(), Upgrade::Skipped),
            (true, Some(user_id)) => match self.update_hash(password, user_id) {
                Ok(new_hash) => (new_hash, Upgrade::Persisted),
                Err(err) => {
                    tracing::warn!(
                        %user_id,
                        error = %err,
                        "password verified but hash upgrade failed"
                    );
                    (hash.to_owned(), Upgrade::Failed(err))
                }
            },
        };

        let outcome = Verification {
            matched: check.matched,
            hash: effective_hash,
            user_id,
            upgrade,
        };
        let context = CheckContext {
            password,
            stored_hash: hash,
            user_id,
        };
        self.hooks.filter_check(outcome, &context)
    }

    /// Issue a new hash for `password` under the current configuration.
    pub fn get_hash(&self, password: &str) -> Result<String> {
        self.effective_config().hash_password(password.as_bytes())
    }

    /// Issue and store a new hash for `user_id`, clearing any pending
    /// activation key. Used for explicit password changes.
    pub fn update_hash(&self, password: &str, user_id: UserId) -> Result<String> {
        let hash = self.get_hash(password)?;
        let fields = CredentialFields {
            password_hash: &hash,
            activation_key: "",
        };

        let written = self.store.update(USERS_TABLE, &fields, user_id);
        self.store.invalidate_cache(user_id, USERS_CACHE_GROUP);

        match written? {
            0 => Err(Error::Store(StoreError::NotFound(user_id))),
            _ => {
                tracing::info!(
                    %user_id,
                    algorithm = %self.config.algorithm,
                    "stored new password hash"
                );
                Ok(hash)
            }
        }
    }

    /// Whether `hash` would be replaced after a successful check.
    pub fn needs_rehash(&self, hash: &str) -> bool {
        policy::needs_rehash(hash, &self.effective_config())
    }

    fn effective_config(&self) -> HashConfig {
        HashConfig {
            algorithm: self.config.algorithm,
            options: self.hooks.filter_options(self.config.options.clone()),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{CredentialVerifier, Upgrade};
    use crate::{
        portable::PortableHasher,
        store::{MemoryStore, UserRecord},
        Algorithm, HashConfig, HashOptions, Hooks, UserId,
    };

    const MD5_SECRET: &str = "5ebe2294ecd0e0f08eab7690d2a6ee69";

    fn bcrypt_config(cost: u32) -> HashConfig {
        HashConfig::new(Algorithm::Bcrypt, HashOptions::default().with_cost(cost))
    }

    fn store_with(user_id: UserId, hash: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert(
            user_id,
            UserRecord {
                password_hash: hash.to_owned(),
                activation_key: "reset-key".to_owned(),
            },
        );
        store
    }

    #[test]
    fn get_hash_round_trip() {
        let verifier = CredentialVerifier::new(HashConfig::default(), MemoryStore::new());
        let hash = verifier.get_hash("secret").unwrap();

        assert!(verifier.check_password("secret", &hash, None));
        assert!(!verifier.check_password("secret!", &hash, None));
        assert_ne!(hash, verifier.get_hash("secret").unwrap());
    }

    #[test]
    fn legacy_unsalted_is_upgraded_once() {
        let store = store_with(UserId(42), MD5_SECRET);
        let verifier = CredentialVerifier::new(bcrypt_config(4), Arc::clone(&store));

        let outcome = verifier.verify("secret", MD5_SECRET, Some(UserId(42)));
        assert!(outcome.matched);
        assert!(outcome.is_upgraded());
        assert!(outcome.hash.starts_with("$2y$04$"));
        assert_eq!(store.update_count(), 1);
        assert_eq!(store.invalidations(), vec![UserId(42)]);

        let record = store.record(UserId(42)).unwrap();
        assert_eq!(record.password_hash, outcome.hash);
        assert!(record.activation_key.is_empty());

        let again = verifier.verify("secret", &record.password_hash, Some(UserId(42)));
        assert!(again.matched);
        assert!(matches!(again.upgrade, Upgrade::NotRequired));
        assert_eq!(store.update_count(), 1);
    }

    #[test]
    fn wrong_password_never_writes() {
        let store = store_with(UserId(7), MD5_SECRET);
        let verifier = CredentialVerifier::new(bcrypt_config(4), Arc::clone(&store));

        let outcome = verifier.verify("guess", MD5_SECRET, Some(UserId(7)));
        assert!(!outcome.matched);
        assert_eq!(outcome.hash, MD5_SECRET);
        assert!(matches!(outcome.upgrade, Upgrade::NotRequired));
        assert_eq!(store.update_count(), 0);
    }

    #[test]
    fn portable_without_user_is_verification_only() {
        let store = Arc::new(MemoryStore::new());
        let verifier = CredentialVerifier::new(HashConfig::default(), Arc::clone(&store));
        let hash = PortableHasher::legacy().hash_password(b"secret").unwrap();

        let outcome = verifier.verify("secret", &hash, None);
        assert!(outcome.matched);
        assert!(matches!(outcome.upgrade, Upgrade::Skipped));
        assert_eq!(outcome.hash, hash);

        assert!(!verifier.check_password("wrong", &hash, None));
        assert_eq!(store.update_count(), 0);
    }

    #[test]
    fn failed_write_keeps_original_hash() {
        let store = store_with(UserId(3), MD5_SECRET);
        store.fail_writes(true);
        let verifier = CredentialVerifier::new(bcrypt_config(4), Arc::clone(&store));

        let outcome = verifier.verify("secret", MD5_SECRET, Some(UserId(3)));
        assert!(outcome.matched);
        assert_eq!(outcome.hash, MD5_SECRET);
        assert!(matches!(outcome.upgrade, Upgrade::Failed(crate::Error::Store(_))));
        assert_eq!(store.record(UserId(3)).unwrap().password_hash, MD5_SECRET);
    }

    #[test]
    fn unknown_user_is_not_persisted() {
        let store = Arc::new(MemoryStore::new());
        let verifier = CredentialVerifier::new(bcrypt_config(4), Arc::clone(&store));

        let outcome = verifier.verify("secret", MD5_SECRET, Some(UserId(99)));
        assert!(outcome.matched);
        assert_eq!(outcome.hash, MD5_SECRET);
        assert!(matches!(
            outcome.upgrade,
            Upgrade::Failed(crate::Error::Store(crate::StoreError::NotFound(UserId(99))))
        ));
    }

    #[test]
    fn invalid_options_fail_the_upgrade_not_the_check() {
        let store = store_with(UserId(5), MD5_SECRET);
        let verifier = CredentialVerifier::new(bcrypt_config(99), Arc::clone(&store));

        let outcome = verifier.verify("secret", MD5_SECRET, Some(UserId(5)));
        assert!(outcome.matched);
        assert!(matches!(
            outcome.upgrade,
            Upgrade::Failed(crate::Error::InvalidOptions(_))
        ));
        assert_eq!(store.update_count(), 0);
    }

    #[test]
    fn options_filter_feeds_issuance_and_policy() {
        let mut verifier = CredentialVerifier::new(bcrypt_config(4), MemoryStore::new());
        verifier
            .hooks_mut()
            .add_options_filter(|options| options.with_cost(5));

        let hash = verifier.get_hash("secret").unwrap();
        assert!(hash.starts_with("$2y$05$"));
        assert!(!verifier.needs_rehash(&hash));

        let unfiltered = bcrypt_config(4).hash_password(b"secret").unwrap();
        assert!(verifier.needs_rehash(&unfiltered));
    }

    #[test]
    fn check_filter_sees_final_outcome() {
        let hooks = Hooks::new().with_check_filter(|mut outcome, context| {
            if context.user_id == Some(UserId(13)) {
                outcome.matched = false;
            }
            outcome
        });
        let verifier = CredentialVerifier::with_parts(
            HashConfig::default(),
            MemoryStore::new(),
            Default::default(),
            hooks,
        );

        let hash = verifier.get_hash("secret").unwrap();
        assert!(verifier.check_password("secret", &hash, Some(UserId(12))));
        assert!(!verifier.check_password("secret", &hash, Some(UserId(13))));
    }

    #[test]
    fn reconfigure_changes_policy() {
        let mut verifier = CredentialVerifier::new(bcrypt_config(4), MemoryStore::new());
        let hash = verifier.get_hash("secret").unwrap();
        assert!(!verifier.needs_rehash(&hash));

        verifier.reconfigure(HashConfig::default());
        assert!(verifier.needs_rehash(&hash));
        assert!(verifier.check_password("secret", &hash, None));
    }

    #[test]
    fn update_hash_is_unconditional() {
        let store = Arc::new(MemoryStore::new());
        let verifier = CredentialVerifier::new(HashConfig::default(), Arc::clone(&store));
        let current = verifier.get_hash("secret").unwrap();
        store.insert(
            UserId(1),
            UserRecord {
                password_hash: current.clone(),
                activation_key: String::new(),
            },
        );

        let replaced = verifier.update_hash("secret", UserId(1)).unwrap();
        assert_ne!(replaced, current);
        assert_eq!(store.record(UserId(1)).unwrap().password_hash, replaced);
        assert_eq!(store.update_count(), 1);
    }
}
