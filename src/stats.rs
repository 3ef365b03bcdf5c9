//! Observability surface: per-pool snapshots plus the engine run counters.
//!
//! Everything here is read-only over live state. Pool snapshots come from
//! [`CredentialPool::stats`](crate::credentials::CredentialPool::stats) and
//! never advance rotation; counters are plain atomics incremented inline.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::credentials::{PoolRegistry, PoolStats};

// ─── Service summary ──────────────────────────────────────────────────────────

/// Point-in-time view across every instantiated pool.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    pub providers: Vec<PoolStats>,
}

impl ServiceSummary {
    pub fn total_credentials(&self) -> usize {
        self.providers.iter().map(|p| p.total).sum()
    }

    pub fn total_quarantined(&self) -> usize {
        self.providers.iter().map(|p| p.quarantined).sum()
    }
}

/// Snapshot every pool the registry has instantiated, sorted by provider
/// name for stable output.
pub fn service_summary(registry: &PoolRegistry) -> ServiceSummary {
    let providers = registry
        .known_providers()
        .iter()
        .map(|name| registry.pool(name).stats())
        .collect();
    ServiceSummary { providers }
}

// ─── Engine counters ──────────────────────────────────────────────────────────

/// In-process counters for the fallback engine, incremented inline.
#[derive(Debug, Default)]
pub struct EngineCounters {
    /// Fallback runs started.
    pub runs: AtomicU64,
    /// Runs that ended with a provider success.
    pub successes: AtomicU64,
    /// Runs that exhausted every available descriptor.
    pub aggregate_failures: AtomicU64,
    /// Individual descriptor attempts that failed.
    pub descriptor_failures: AtomicU64,
    /// Descriptors skipped by preflight without an attempt.
    pub preflight_skips: AtomicU64,
}

/// Shared handle — cheaply clonable.
pub type SharedEngineCounters = Arc<EngineCounters>;

impl EngineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_runs(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_successes(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_aggregate_failures(&self) {
        self.aggregate_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_descriptor_failures(&self) {
        self.descriptor_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_preflight_skips(&self) {
        self.preflight_skips.fetch_add(1, Ordering::Relaxed);
    }

    /// Serializable snapshot of the counters.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            aggregate_failures: self.aggregate_failures.load(Ordering::Relaxed),
            descriptor_failures: self.descriptor_failures.load(Ordering::Relaxed),
            preflight_skips: self.preflight_skips.load(Ordering::Relaxed),
        }
    }
}

/// Frozen counter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub runs: u64,
    pub successes: u64,
    pub aggregate_failures: u64,
    pub descriptor_failures: u64,
    pub preflight_skips: u64,
}
