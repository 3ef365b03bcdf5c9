//! Provider descriptors and the capability-indexed registry view.
//!
//! A [`ProviderDescriptor`] is a static data record — id, priority,
//! capability, pool key — plus an invocation strategy behind
//! [`Invoke`]. The engine never branches on provider names; everything
//! provider-specific lives in the descriptor's strategy.
//!
//! The registry is derived, not stored: [`available_descriptors`]
//! recomputes the filtered, ordered view on every query so results always
//! reflect current pool availability without cache invalidation.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::credentials::PoolRegistry;

pub mod adapters;
pub mod catalog;
pub mod classify;
pub mod invoke;

pub use invoke::{
    ImageArtifact, Invoke, InvokeOutput, ProviderRequest, RequestOptions, RequestPayload,
};

// ─── Capability ───────────────────────────────────────────────────────────────

/// The two request families the orchestrator serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    VisionAnalysis,
    ImageGeneration,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::VisionAnalysis => "vision-analysis",
            Capability::ImageGeneration => "image-generation",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vision-analysis" | "vision" | "analysis" => Ok(Capability::VisionAnalysis),
            "image-generation" | "image" | "generation" => Ok(Capability::ImageGeneration),
            other => Err(format!(
                "unknown capability '{other}' (expected 'vision-analysis' or 'image-generation')"
            )),
        }
    }
}

// ─── ProviderDescriptor ───────────────────────────────────────────────────────

/// Static record describing one invokable backend/model combination.
///
/// Several descriptors may share one credential pool (multiple models under
/// one provider account). Descriptors are defined once at startup and never
/// mutated; runtime state lives entirely in the pools they reference.
#[derive(Clone)]
pub struct ProviderDescriptor {
    /// Stable id, e.g. `openrouter-gpt-4o-mini`.
    pub id: &'static str,
    pub display_name: &'static str,
    /// Credential pool key, e.g. `openrouter`.
    pub provider: &'static str,
    pub capability: Capability,
    /// Lower is tried first; equal priorities keep registration order.
    pub priority: u8,
    /// Keyless descriptors (`false`) skip the rotation executor entirely.
    pub requires_credential: bool,
    pub invoker: Arc<dyn Invoke>,
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("capability", &self.capability)
            .field("priority", &self.priority)
            .field("requires_credential", &self.requires_credential)
            .finish()
    }
}

impl ProviderDescriptor {
    /// Pure availability query: keyless descriptors are always available,
    /// keyed ones need at least one credential in their pool.
    pub fn is_available(&self, pools: &PoolRegistry) -> bool {
        !self.requires_credential || pools.has_credentials(self.provider)
    }

    /// Serializable row for listings.
    pub fn info(&self, pools: &PoolRegistry) -> DescriptorInfo {
        DescriptorInfo {
            id: self.id,
            display_name: self.display_name,
            provider: self.provider,
            capability: self.capability,
            priority: self.priority,
            requires_credential: self.requires_credential,
            available: self.is_available(pools),
        }
    }
}

/// One row of a descriptor listing (`atelierd providers`).
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    pub provider: &'static str,
    pub capability: Capability,
    pub priority: u8,
    pub requires_credential: bool,
    pub available: bool,
}

// ─── Registry query ───────────────────────────────────────────────────────────

/// The ordered set of descriptors to try for `capability`.
///
/// Filters by capability and availability, then stable-sorts ascending by
/// priority — equal priorities preserve registration order, which callers
/// rely on for deterministic trial order.
pub fn available_descriptors<'a>(
    descriptors: &'a [ProviderDescriptor],
    capability: Capability,
    pools: &PoolRegistry,
) -> Vec<&'a ProviderDescriptor> {
    let mut matching: Vec<&ProviderDescriptor> = descriptors
        .iter()
        .filter(|d| d.capability == capability && d.is_available(pools))
        .collect();
    matching.sort_by_key(|d| d.priority);
    matching
}
