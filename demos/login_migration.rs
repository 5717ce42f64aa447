use std::sync::Arc;

use password_rehash::{
    activate, portable::PortableHasher, store::UserRecord, HashConfig, HostCapabilities,
    MemoryStore, Settings, TracingNotifier, UserId,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    // Config file and PASSWORD_HASH_* variables, falling back to Argon2id defaults
    let settings = Settings::new().unwrap_or_default();
    let config = HashConfig::from_settings(settings, &TracingNotifier);

    // A user table that has lived through a few generations of hashing
    let password = "correctbatteryhorsestapler";
    let store = Arc::new(MemoryStore::new());
    let users = [
        (UserId(1), "f3e7b6c1d87e3351286287f93f4d6b26".to_owned()),
        (
            UserId(2),
            PortableHasher::legacy()
                .hash_password(password.as_bytes())
                .unwrap(),
        ),
        (
            UserId(3),
            "$2b$04$EGdrhbKUv8Oc9vGiXX0HQOxSg445d458Muh7DAHskb6QbtCvdxcie".to_owned(),
        ),
    ];
    for (user_id, hash) in &users {
        store.insert(
            *user_id,
            UserRecord {
                password_hash: hash.clone(),
                activation_key: String::new(),
            },
        );
    }

    let verifier = activate(
        &HostCapabilities::default(),
        &TracingNotifier,
        config,
        Arc::clone(&store),
    )
    .unwrap();

    // Each successful login moves the user onto the configured algorithm
    for (user_id, old_hash) in &users {
        let outcome = verifier.verify(password, old_hash, Some(*user_id));
        println!(
            "user {user_id}: matched={} upgrade={:?}\n  old: {old_hash}\n  new: {}",
            outcome.matched, outcome.upgrade, outcome.hash
        );
    }

    // The second login finds nothing left to do
    let current = store.record(UserId(3)).unwrap().password_hash;
    let outcome = verifier.verify(password, &current, Some(UserId(3)));
    println!("user 3 again: upgrade={:?}", outcome.upgrade);
}
