//! Extension points.
//!
//! Filters run synchronously in registration order. With nothing registered
//! they are the identity.

use core::fmt;

use crate::{algorithm::HashOptions, store::UserId, verifier::Verification};

/// Rewrites the options used to issue new hashes.
pub type OptionsFilter = Box<dyn Fn(HashOptions) -> HashOptions + Send + Sync>;

/// Observes or overrides the outcome of a password check.
pub type CheckFilter = Box<dyn Fn(Verification, &CheckContext<'_>) -> Verification + Send + Sync>;

/// What a check filter gets to see besides the outcome.
///
/// `password` is the plaintext; filters must never log or store it.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    /// Plaintext password that was checked
    pub password: &'a str,
    /// Hash the password was checked against
    pub stored_hash: &'a str,
    /// User the check was made for, if any
    pub user_id: Option<UserId>,
}

/// Registered filters
#[derive(Default)]
pub struct Hooks {
    options: Vec<OptionsFilter>,
    check: Vec<CheckFilter>,
}

impl Hooks {
    /// No filters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an options filter, builder style.
    #[must_use]
    pub fn with_options_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(HashOptions) -> HashOptions + Send + Sync + 'static,
    {
        self.add_options_filter(filter);
        self
    }

    /// Register a check filter, builder style.
    #[must_use]
    pub fn with_check_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(Verification, &CheckContext<'_>) -> Verification + Send + Sync + 'static,
    {
        self.add_check_filter(filter);
        self
    }

    /// Register an options filter after the existing ones.
    pub fn add_options_filter<F>(&mut self, filter: F)
    where
        F: Fn(HashOptions) -> HashOptions + Send + Sync + 'static,
    {
        self.options.push(Box::new(filter));
    }

    /// Register a check filter after the existing ones.
    pub fn add_check_filter<F>(&mut self, filter: F)
    where
        F: Fn(Verification, &CheckContext<'_>) -> Verification + Send + Sync + 'static,
    {
        self.check.push(Box::new(filter));
    }

    pub(crate) fn filter_options(&self, options: HashOptions) -> HashOptions {
        self.options.iter().fold(options, |options, filter| filter(options))
    }

    pub(crate) fn filter_check(
        &self,
        outcome: Verification,
        context: &CheckContext<'_>,
    ) -> Verification {
        self.check
            .iter()
            .fold(outcome, |outcome, filter| filter(outcome, context))
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("options", &self.options.len())
            .field("check", &self.check.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::{CheckContext, Hooks};
    use crate::{HashOptions, Upgrade, Verification};

    #[test]
    fn options_filters_run_in_order() {
        let hooks = Hooks::new()
            .with_options_filter(|options| options.with_cost(11))
            .with_options_filter(|mut options| {
                options.cost = options.cost.map(|cost| cost + 1);
                options
            });

        assert_eq!(hooks.filter_options(HashOptions::default()).cost, Some(12));
    }

    #[test]
    fn no_filters_is_identity() {
        let hooks = Hooks::new();
        let options = HashOptions::default().with_argon2(8192, 3, 1);
        assert_eq!(hooks.filter_options(options.clone()), options);

        let outcome = Verification {
            matched: true,
            hash: "hash".into(),
            user_id: None,
            upgrade: Upgrade::NotRequired,
        };
        let context = CheckContext {
            password: "pw",
            stored_hash: "hash",
            user_id: None,
        };
        let filtered = hooks.filter_check(outcome, &context);
        assert!(filtered.matched);
        assert_eq!(filtered.hash, "hash");
    }

    #[test]
    fn check_filter_can_override() {
        let hooks = Hooks::new().with_check_filter(|mut outcome, context| {
            outcome.matched = outcome.matched && context.stored_hash != "banned";
            outcome
        });

        let outcome = Verification {
            matched: true,
            hash: "banned".into(),
            user_id: None,
            upgrade: Upgrade::NotRequired,
        };
        let context = CheckContext {
            password: "pw",
            stored_hash: "banned",
            user_id: None,
        };
        assert!(!hooks.filter_check(outcome, &context).matched);
    }
}
