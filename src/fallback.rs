// SPDX-License-Identifier: MIT
//! Capability-agnostic fallback across providers.
//!
//! One engine run walks the priority-ordered available descriptors for a
//! capability and returns the first success. Keyed descriptors rotate
//! through their credential pool internally; keyless ones invoke directly.
//! Per-descriptor failures are collected in attempt order, so a total
//! failure reports everything that was tried and why.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::credentials::{execute_with_rotation, SharedPoolRegistry};
use crate::error::{AttemptFailure, OrchestrateError, RotationError};
use crate::providers::{
    available_descriptors, Capability, DescriptorInfo, InvokeOutput, ProviderDescriptor,
    ProviderRequest,
};
use crate::stats::{EngineCounters, ServiceSummary};

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct FallbackEngine {
    pools: SharedPoolRegistry,
    descriptors: Vec<ProviderDescriptor>,
    counters: EngineCounters,
}

/// Thread-safe wrapper for long-lived handles.
pub type SharedFallbackEngine = Arc<FallbackEngine>;

/// A successful run: the output plus where it came from.
#[derive(Debug, Clone)]
pub struct FallbackSuccess {
    pub output: InvokeOutput,
    /// Descriptor that produced the output.
    pub descriptor_id: &'static str,
    /// Credential used, `None` for keyless descriptors.
    pub credential: Option<String>,
    pub duration_ms: u64,
}

impl FallbackEngine {
    /// Engine over the built-in catalog.
    pub fn new(pools: SharedPoolRegistry) -> Self {
        Self::with_descriptors(pools, crate::providers::catalog::all())
    }

    /// Engine over an explicit descriptor set.
    pub fn with_descriptors(
        pools: SharedPoolRegistry,
        descriptors: Vec<ProviderDescriptor>,
    ) -> Self {
        Self {
            pools,
            descriptors,
            counters: EngineCounters::new(),
        }
    }

    pub fn pools(&self) -> &SharedPoolRegistry {
        &self.pools
    }

    pub fn counters(&self) -> &EngineCounters {
        &self.counters
    }

    /// Pool summary across this engine's registry.
    pub fn service_summary(&self) -> ServiceSummary {
        crate::stats::service_summary(&self.pools)
    }

    /// Descriptor listing for one capability in priority order, including
    /// unavailable entries (marked) so operators can see what's missing.
    pub fn descriptor_info(&self, capability: Capability) -> Vec<DescriptorInfo> {
        let mut rows: Vec<&ProviderDescriptor> = self
            .descriptors
            .iter()
            .filter(|d| d.capability == capability)
            .collect();
        rows.sort_by_key(|d| d.priority);
        rows.iter().map(|d| d.info(&self.pools)).collect()
    }

    /// Run `request` against `capability`'s providers; first success wins.
    ///
    /// Fails fast with [`OrchestrateError::NoProvidersAvailable`] when the
    /// filtered registry view is empty — that is a deployment problem, not
    /// a transient one. Otherwise every available descriptor is tried in
    /// priority order and a full wipe-out returns the ordered failure list.
    pub async fn run(
        &self,
        capability: Capability,
        request: &ProviderRequest,
    ) -> Result<FallbackSuccess, OrchestrateError> {
        let run_id = Uuid::new_v4();
        self.counters.inc_runs();

        let candidates = available_descriptors(&self.descriptors, capability, &self.pools);
        if candidates.is_empty() {
            warn!(%run_id, capability = %capability, "no providers available");
            return Err(OrchestrateError::NoProvidersAvailable { capability });
        }

        info!(
            %run_id,
            capability = %capability,
            candidates = candidates.len(),
            "fallback run started"
        );

        let mut failures: Vec<AttemptFailure> = Vec::new();
        for descriptor in candidates {
            if let Err(reason) = descriptor.invoker.preflight(request) {
                debug!(%run_id, descriptor = descriptor.id, reason, "preflight skip");
                self.counters.inc_preflight_skips();
                continue;
            }

            let started = Instant::now();
            let outcome = self.try_descriptor(descriptor, request).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok((output, credential)) => {
                    self.counters.inc_successes();
                    info!(
                        %run_id,
                        descriptor = descriptor.id,
                        provider = descriptor.provider,
                        duration_ms,
                        fallbacks = failures.len(),
                        "provider succeeded"
                    );
                    return Ok(FallbackSuccess {
                        output,
                        descriptor_id: descriptor.id,
                        credential,
                        duration_ms,
                    });
                }
                Err(err) => {
                    self.counters.inc_descriptor_failures();
                    warn!(
                        %run_id,
                        descriptor = descriptor.id,
                        provider = descriptor.provider,
                        duration_ms,
                        err = %err,
                        "provider failed — falling back"
                    );
                    failures.push(AttemptFailure {
                        descriptor: descriptor.id.to_string(),
                        kind: err.failure_kind(),
                        message: err.to_string(),
                    });
                }
            }
        }

        self.counters.inc_aggregate_failures();
        warn!(
            %run_id,
            capability = %capability,
            failed = failures.len(),
            "all providers failed"
        );
        Err(OrchestrateError::AggregateFailure {
            capability,
            failures,
        })
    }

    /// One descriptor attempt: credential rotation for keyed descriptors,
    /// direct invocation for keyless ones.
    async fn try_descriptor(
        &self,
        descriptor: &ProviderDescriptor,
        request: &ProviderRequest,
    ) -> Result<(InvokeOutput, Option<String>), RotationError> {
        if !descriptor.requires_credential {
            let output = descriptor.invoker.invoke(request, None).await?;
            return Ok((output, None));
        }

        let pool = self.pools.pool(descriptor.provider);
        let invoker = &descriptor.invoker;
        let mut used: Option<String> = None;
        let output = execute_with_rotation(
            &pool,
            |err| invoker.classify(err),
            |cred| {
                used = Some(cred.name().to_string());
                async move { invoker.invoke(request, Some(&cred)).await }
            },
        )
        .await?;
        Ok((output, used))
    }
}
