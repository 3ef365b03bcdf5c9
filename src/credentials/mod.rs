// SPDX-License-Identifier: MIT
//! Per-provider credential pools: round-robin rotation with failure quarantine.
//!
//! Each provider name owns one [`CredentialPool`] holding its API keys in
//! load order. Selection walks the pool with a shared cursor so no key is
//! hammered exclusively; a key that triggers a rate-limit response is
//! quarantined for a fixed cooldown and silently rejoins the rotation once
//! the cooldown has passed.
//!
//! Quarantine release is lazy: expired entries are evicted on the next
//! [`CredentialPool::next_credential`] call, never by a background timer.
//! Deadlines use [`tokio::time::Instant`] so tests can drive them with a
//! paused clock instead of sleeping.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::PoolError;

pub mod registry;
pub mod rotation;

pub use registry::{PoolRegistry, SharedPoolRegistry};
pub use rotation::execute_with_rotation;

/// Default quarantine window after a rate-limit-class failure.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

// ─── Credential ───────────────────────────────────────────────────────────────

/// One API key plus its usage bookkeeping.
///
/// The secret is immutable after load. Counters are monotonic for the
/// process lifetime and safe to read concurrently with rotation.
pub struct Credential {
    name: String,
    secret: String,
    provider: String,
    total_requests: AtomicU64,
    failure_count: AtomicU64,
    /// Epoch millis of the last selection; 0 = never used.
    last_used_ms: AtomicU64,
}

impl Credential {
    pub fn new(
        name: impl Into<String>,
        secret: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
            provider: provider.into(),
            total_requests: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            last_used_ms: AtomicU64::new(0),
        }
    }

    /// Display name, e.g. `GOOGLE_API_KEY_2`. Safe to log.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw secret. Never log this.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Owning provider name (pool key), e.g. `google`.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn last_used(&self) -> Option<DateTime<Utc>> {
        match self.last_used_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms as i64),
        }
    }

    /// Count a selection. Called once per rotation pick, before the attempt
    /// outcome is known.
    pub(crate) fn record_use(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.last_used_ms
            .store(Utc::now().timestamp_millis() as u64, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The secret stays out of logs and panic messages.
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("secret", &"<redacted>")
            .field("total_requests", &self.total_requests())
            .field("failure_count", &self.failure_count())
            .finish()
    }
}

// ─── CredentialPool ───────────────────────────────────────────────────────────

/// Cursor + quarantine map. The credential list itself is immutable after
/// construction, so only this small struct sits behind the mutex.
struct RotationState {
    cursor: u64,
    /// Credential name → quarantine release deadline. An entry at exactly
    /// the deadline is still quarantined; eligibility starts strictly after.
    quarantined: HashMap<String, Instant>,
}

/// Ordered credentials for one provider, with round-robin selection.
///
/// The mutex guards a few map operations and is never held across an await,
/// so selection order is exact even under concurrent callers — stricter than
/// required, at no meaningful contention cost.
pub struct CredentialPool {
    provider: String,
    credentials: Vec<Arc<Credential>>,
    cooldown: Duration,
    state: Mutex<RotationState>,
}

/// Shared handle used across concurrent orchestration calls.
pub type SharedCredentialPool = Arc<CredentialPool>;

impl CredentialPool {
    pub fn new(provider: impl Into<String>, credentials: Vec<Credential>) -> Self {
        Self::with_cooldown(provider, credentials, DEFAULT_COOLDOWN)
    }

    pub fn with_cooldown(
        provider: impl Into<String>,
        credentials: Vec<Credential>,
        cooldown: Duration,
    ) -> Self {
        Self {
            provider: provider.into(),
            credentials: credentials.into_iter().map(Arc::new).collect(),
            cooldown,
            state: Mutex::new(RotationState {
                cursor: 0,
                quarantined: HashMap::new(),
            }),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Number of credentials loaded, quarantined or not.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Pick the next eligible credential.
    ///
    /// Evicts quarantine entries whose deadline has passed, then returns the
    /// credential at `cursor mod |eligible|` and advances the cursor. The
    /// cursor only advances when a credential is actually returned.
    pub fn next_credential(&self) -> Result<Arc<Credential>, PoolError> {
        if self.credentials.is_empty() {
            return Err(PoolError::Empty(self.provider.clone()));
        }

        let mut state = self.lock_state();
        let now = Instant::now();
        state.quarantined.retain(|_, release| *release >= now);

        let eligible: Vec<&Arc<Credential>> = self
            .credentials
            .iter()
            .filter(|c| !state.quarantined.contains_key(c.name()))
            .collect();

        if eligible.is_empty() {
            return Err(PoolError::AllQuarantined {
                provider: self.provider.clone(),
                total: self.credentials.len(),
            });
        }

        let idx = (state.cursor as usize) % eligible.len();
        state.cursor = state.cursor.wrapping_add(1);
        let picked = Arc::clone(eligible[idx]);
        debug!(
            provider = %self.provider,
            credential = %picked.name(),
            eligible = eligible.len(),
            "credential selected"
        );
        Ok(picked)
    }

    /// Quarantine a credential for the cooldown window and bump its failure
    /// counter. Unknown names are ignored (the pool may have been rebuilt
    /// with fewer keys than a caller remembers).
    pub fn mark_failed(&self, name: &str, cause: &str) {
        let Some(cred) = self.credentials.iter().find(|c| c.name() == name) else {
            debug!(
                provider = %self.provider,
                credential = name,
                "mark_failed for unknown credential — ignored"
            );
            return;
        };
        cred.record_failure();

        let release = Instant::now() + self.cooldown;
        self.lock_state().quarantined.insert(name.to_string(), release);
        warn!(
            provider = %self.provider,
            credential = name,
            cooldown_secs = self.cooldown.as_secs(),
            cause,
            "credential quarantined"
        );
    }

    /// Read-only snapshot for observability.
    ///
    /// Never mutates rotation state: expired quarantine entries are reported
    /// by deadline comparison here rather than evicted.
    pub fn stats(&self) -> PoolStats {
        let now = Instant::now();
        let state = self.lock_state();

        let per_credential: Vec<CredentialStats> = self
            .credentials
            .iter()
            .map(|c| {
                let quarantined = state
                    .quarantined
                    .get(c.name())
                    .is_some_and(|release| *release >= now);
                CredentialStats {
                    name: c.name().to_string(),
                    total_requests: c.total_requests(),
                    failures: c.failure_count(),
                    available: !quarantined,
                    last_used: c.last_used(),
                }
            })
            .collect();

        let available = per_credential.iter().filter(|c| c.available).count();
        PoolStats {
            provider: self.provider.clone(),
            total: self.credentials.len(),
            available,
            quarantined: self.credentials.len() - available,
            per_credential,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RotationState> {
        // A poisoned lock means a panic mid-update elsewhere; the state is
        // still structurally valid (plain maps and integers), so recover.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ─── Snapshots ────────────────────────────────────────────────────────────────

/// Per-credential slice of a [`PoolStats`] snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialStats {
    pub name: String,
    pub total_requests: u64,
    pub failures: u64,
    /// False while the credential sits in quarantine.
    pub available: bool,
    pub last_used: Option<DateTime<Utc>>,
}

/// Point-in-time view of one provider's pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub provider: String,
    pub total: usize,
    pub available: usize,
    pub quarantined: usize,
    pub per_credential: Vec<CredentialStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pool_of(provider: &str, names: &[&str]) -> CredentialPool {
        let creds = names
            .iter()
            .map(|n| Credential::new(*n, format!("secret-{n}"), provider))
            .collect();
        CredentialPool::new(provider, creds)
    }

    #[test]
    fn round_robin_cycles_in_order() {
        let pool = pool_of("google", &["k1", "k2", "k3"]);

        let picks: Vec<String> = (0..6)
            .map(|_| pool.next_credential().unwrap().name().to_string())
            .collect();
        assert_eq!(picks, ["k1", "k2", "k3", "k1", "k2", "k3"]);
    }

    #[test]
    fn empty_pool_is_a_distinct_error() {
        let pool = pool_of("google", &[]);
        assert_eq!(
            pool.next_credential().unwrap_err(),
            PoolError::Empty("google".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn quarantined_credential_is_skipped() {
        let pool = pool_of("google", &["k1", "k2"]);
        pool.mark_failed("k1", "http 429");

        for _ in 0..4 {
            assert_eq!(pool.next_credential().unwrap().name(), "k2");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn all_quarantined_signals_exhaustion() {
        let pool = pool_of("google", &["k1", "k2"]);
        pool.mark_failed("k1", "http 429");
        pool.mark_failed("k2", "http 429");

        assert_eq!(
            pool.next_credential().unwrap_err(),
            PoolError::AllQuarantined {
                provider: "google".into(),
                total: 2,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn quarantine_releases_strictly_after_deadline() {
        let pool = pool_of("google", &["k1", "k2"]);
        pool.mark_failed("k1", "http 429");

        // At exactly the deadline the credential is still excluded.
        tokio::time::advance(DEFAULT_COOLDOWN).await;
        assert_eq!(pool.next_credential().unwrap().name(), "k2");

        // Strictly past the deadline it rejoins the rotation.
        tokio::time::advance(Duration::from_millis(1)).await;
        let picks: Vec<String> = (0..2)
            .map(|_| pool.next_credential().unwrap().name().to_string())
            .collect();
        assert!(
            picks.contains(&"k1".to_string()),
            "released credential should rejoin rotation, got {picks:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn release_after_total_quarantine_recovers_the_pool() {
        let pool = pool_of("google", &["k1", "k2"]);
        pool.mark_failed("k1", "http 429");
        pool.mark_failed("k2", "http 429");
        assert!(pool.next_credential().is_err());

        tokio::time::advance(DEFAULT_COOLDOWN + Duration::from_millis(1)).await;
        assert!(pool.next_credential().is_ok(), "pool should recover after cooldown");
    }

    #[tokio::test(start_paused = true)]
    async fn stats_reflect_quarantine_without_mutating_rotation() {
        let pool = pool_of("google", &["k1", "k2", "k3"]);
        pool.next_credential().unwrap(); // k1 — advances cursor to 1
        pool.mark_failed("k2", "quota exceeded");

        let stats = pool.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.available, 2);
        assert_eq!(stats.quarantined, 1);
        let k2 = stats
            .per_credential
            .iter()
            .find(|c| c.name == "k2")
            .expect("k2 present in snapshot");
        assert!(!k2.available);
        assert_eq!(k2.failures, 1);

        // stats() must not advance the cursor: next pick is k3 (k2 skipped),
        // continuing from where rotation left off.
        assert_eq!(pool.next_credential().unwrap().name(), "k3");
    }

    #[test]
    fn mark_failed_unknown_name_is_ignored() {
        let pool = pool_of("google", &["k1"]);
        pool.mark_failed("missing", "http 429");
        assert_eq!(pool.stats().quarantined, 0);
        assert_eq!(pool.next_credential().unwrap().name(), "k1");
    }

    #[test]
    fn debug_redacts_the_secret() {
        let cred = Credential::new("k1", "sk-very-secret", "google");
        let rendered = format!("{cred:?}");
        assert!(!rendered.contains("sk-very-secret"), "secret leaked: {rendered}");
        assert!(rendered.contains("<redacted>"));
    }

    proptest! {
        // N healthy credentials: N consecutive picks hit each exactly once
        // before any repeat.
        #[test]
        fn round_robin_liveness(n in 1usize..=8) {
            let names: Vec<String> = (0..n).map(|i| format!("k{i}")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let pool = pool_of("p", &refs);

            let mut seen = std::collections::HashSet::new();
            for _ in 0..n {
                let picked = pool.next_credential().unwrap().name().to_string();
                prop_assert!(seen.insert(picked), "credential repeated before full cycle");
            }
            prop_assert_eq!(seen.len(), n);
        }
    }
}
