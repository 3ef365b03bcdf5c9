//! Provider-name-keyed registry of credential pools.
//!
//! Pools are created lazily on first access, loading their keys from the
//! process environment (`{PROVIDER}_API_KEY_1..N`, see [`crate::config`]).
//! The binary installs the process-wide registry at startup through
//! [`init_global`] with the configured cooldown; components that need
//! isolation (tests, embedding) hold their own [`PoolRegistry`] instance
//! instead.

use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::info;

use super::{CredentialPool, SharedCredentialPool, DEFAULT_COOLDOWN};
use crate::config;

/// Lazily-populated map of provider name → credential pool.
pub struct PoolRegistry {
    cooldown: Duration,
    pools: Mutex<HashMap<String, SharedCredentialPool>>,
}

/// Shared handle passed to the fallback engine and CLI surfaces.
pub type SharedPoolRegistry = Arc<PoolRegistry>;

impl PoolRegistry {
    pub fn new() -> Self {
        Self::with_cooldown(DEFAULT_COOLDOWN)
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            cooldown,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// The pool for `provider`, created from the process environment on
    /// first access. A provider with no configured keys yields an empty
    /// pool — callers observe unavailability, never a crash.
    pub fn pool(&self, provider: &str) -> SharedCredentialPool {
        let mut pools = self.lock_pools();
        if let Some(pool) = pools.get(provider) {
            return Arc::clone(pool);
        }

        let creds = config::credentials_from_env(provider);
        let pool = Arc::new(CredentialPool::with_cooldown(provider, creds, self.cooldown));
        info!(provider, keys = pool.len(), "credential pool created");
        pools.insert(provider.to_string(), Arc::clone(&pool));
        pool
    }

    /// Install a pre-built pool, replacing any existing pool for the same
    /// provider. Used by tests and by embedders with non-env key sources.
    pub fn insert(&self, pool: CredentialPool) -> SharedCredentialPool {
        let shared = Arc::new(pool);
        self.lock_pools()
            .insert(shared.provider().to_string(), Arc::clone(&shared));
        shared
    }

    /// True when `provider` has at least one credential loaded.
    pub fn has_credentials(&self, provider: &str) -> bool {
        !self.pool(provider).is_empty()
    }

    /// Provider names with an instantiated pool, sorted for stable output.
    pub fn known_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock_pools().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock_pools(&self) -> std::sync::MutexGuard<'_, HashMap<String, SharedCredentialPool>> {
        self.pools.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceCell<SharedPoolRegistry> = OnceCell::new();

/// Install the process-wide registry with a tuned cooldown. Later calls are
/// no-ops; if never called, the first [`global`] access builds one with the
/// default cooldown.
pub fn init_global(cooldown: Duration) -> SharedPoolRegistry {
    let _ = GLOBAL.set(Arc::new(PoolRegistry::with_cooldown(cooldown)));
    global()
}

/// Process-wide registry, created on first demand and torn down only at
/// process exit.
pub fn global() -> SharedPoolRegistry {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(PoolRegistry::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credential;

    #[test]
    fn pool_is_created_once_and_reused() {
        let registry = PoolRegistry::new();
        let a = registry.pool("nonexistent-test-provider");
        let b = registry.pool("nonexistent-test-provider");
        assert!(Arc::ptr_eq(&a, &b), "same provider must share one pool");
    }

    #[test]
    fn unconfigured_provider_yields_empty_pool() {
        let registry = PoolRegistry::new();
        let pool = registry.pool("surely-not-configured-anywhere");
        assert!(pool.is_empty());
        assert!(!registry.has_credentials("surely-not-configured-anywhere"));
    }

    #[test]
    fn insert_replaces_and_is_listed() {
        let registry = PoolRegistry::new();
        registry.insert(CredentialPool::new(
            "zeta",
            vec![Credential::new("Z_API_KEY_1", "s1", "zeta")],
        ));
        registry.insert(CredentialPool::new(
            "alpha",
            vec![Credential::new("A_API_KEY_1", "s1", "alpha")],
        ));

        assert!(registry.has_credentials("alpha"));
        assert_eq!(registry.known_providers(), vec!["alpha", "zeta"]);

        // Replacing swaps the pool out wholesale.
        registry.insert(CredentialPool::new("alpha", vec![]));
        assert!(!registry.has_credentials("alpha"));
    }

    #[test]
    fn global_registry_is_installed_once() {
        // Whichever call wins the install, every later one observes the
        // same registry.
        let installed = init_global(Duration::from_secs(7));
        assert!(Arc::ptr_eq(&installed, &global()));
        assert!(Arc::ptr_eq(&init_global(Duration::from_secs(9)), &installed));
    }
}
