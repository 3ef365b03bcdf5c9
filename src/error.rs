// SPDX-License-Identifier: MIT
//! Error taxonomy for the orchestrator.
//!
//! Four layers, matching the recovery boundaries:
//! - [`InvokeError`] — one adapter attempt failed (HTTP status, transport,
//!   or response shape). Recovered by the rotation executor when the
//!   classification says rate-limit, otherwise propagated.
//! - [`PoolError`] / [`RotationError`] — a provider's whole credential pool
//!   could not produce a success. Recovered by the fallback engine, which
//!   moves to the next descriptor.
//! - [`OrchestrateError`] — nothing left to try; surfaced to the caller
//!   with the full per-descriptor failure list.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::providers::Capability;

// ─── Classification ───────────────────────────────────────────────────────────

/// Verdict for one failed invocation attempt.
///
/// Decides whether the rotation executor quarantines the credential and
/// continues with the next one, or stops trying this provider entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Quota or throughput rejection — eligible for credential rotation.
    RateLimit,
    /// Anything else — assumed deterministic for this request, so retrying
    /// with a different credential would only burn quota.
    Permanent,
}

// ─── Attempt-level errors ─────────────────────────────────────────────────────

/// Failure of a single invocation attempt, as produced by an adapter.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    /// The provider answered with a non-success HTTP status.
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    /// The request never completed (connect failure, timeout, TLS).
    #[error("transport: {0}")]
    Transport(String),
    /// The provider answered 2xx but the body had an unexpected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// A local step around the wire call failed: missing credential for a
    /// keyed adapter, unreadable input image, unwritable artifact directory.
    #[error("local: {0}")]
    Local(String),
}

impl From<reqwest::Error> for InvokeError {
    fn from(e: reqwest::Error) -> Self {
        // Preserve the status when reqwest saw one; `error_for_status` paths
        // carry it, pure connect/timeout failures do not.
        match e.status() {
            Some(status) => InvokeError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            },
            None => InvokeError::Transport(e.to_string()),
        }
    }
}

// ─── Pool / rotation errors ───────────────────────────────────────────────────

/// Why a credential pool could not hand out a credential.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// The pool was built with zero credentials (no env keys configured).
    #[error("no credentials configured for provider '{0}'")]
    Empty(String),
    /// Every credential is currently quarantined.
    #[error("all {total} credentials for provider '{provider}' are quarantined")]
    AllQuarantined { provider: String, total: usize },
}

/// Terminal result of a rotation sequence over one provider's credentials.
#[derive(Debug, Error)]
pub enum RotationError {
    /// Every credential was already quarantined before any attempt was made.
    #[error("all credentials for provider '{provider}' are quarantined")]
    AllQuarantined { provider: String },
    /// The pool has no credentials at all. Availability filtering normally
    /// keeps such descriptors out of the engine, so seeing this means a
    /// descriptor was invoked directly against an unconfigured provider.
    #[error("no credentials configured for provider '{provider}'")]
    NoCredentials { provider: String },
    /// Every credential was tried and every attempt was rate-limited.
    #[error("all {tried} credentials for provider '{provider}' exhausted; last error: {last}")]
    AllExhausted {
        provider: String,
        tried: usize,
        #[source]
        last: InvokeError,
    },
    /// A non-rate-limit failure, propagated without trying further
    /// credentials.
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

// ─── Engine-level errors ──────────────────────────────────────────────────────

/// Category recorded for one failed descriptor attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Rotation never ran an attempt: every credential was quarantined.
    AllCredentialsQuarantined,
    /// Rotation tried every credential; all attempts were rate-limited.
    AllCredentialsExhausted,
    /// The invocation failed for a non-rate-limit reason.
    Invocation,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::AllCredentialsQuarantined => "all_credentials_quarantined",
            FailureKind::AllCredentialsExhausted => "all_credentials_exhausted",
            FailureKind::Invocation => "invocation",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RotationError {
    /// The attempt category the fallback engine records for this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            RotationError::AllQuarantined { .. } => FailureKind::AllCredentialsQuarantined,
            RotationError::AllExhausted { .. } => FailureKind::AllCredentialsExhausted,
            RotationError::NoCredentials { .. } | RotationError::Invoke(_) => {
                FailureKind::Invocation
            }
        }
    }
}

/// One failed descriptor attempt inside a fallback run, in attempt order.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptFailure {
    /// Descriptor id, e.g. `openrouter-gpt-4o-mini`.
    pub descriptor: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Caller-facing terminal error from a fallback run.
#[derive(Debug, Error)]
pub enum OrchestrateError {
    /// Zero descriptors are registered and available for this capability.
    /// A deployment problem (no keys configured), not a transient failure.
    #[error("no providers available for capability '{capability}'")]
    NoProvidersAvailable { capability: Capability },
    /// Every available descriptor was tried and failed.
    #[error("all {} providers failed for capability '{capability}'", .failures.len())]
    AggregateFailure {
        capability: Capability,
        /// One entry per attempted descriptor, in attempt order.
        failures: Vec<AttemptFailure>,
    },
}

impl OrchestrateError {
    /// The recorded per-descriptor failures, if this is an aggregate.
    pub fn failures(&self) -> &[AttemptFailure] {
        match self {
            OrchestrateError::AggregateFailure { failures, .. } => failures,
            OrchestrateError::NoProvidersAvailable { .. } => &[],
        }
    }
}
