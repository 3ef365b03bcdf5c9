//! The uniform invocation contract between the engine and provider code.
//!
//! Adapters translate a [`ProviderRequest`] into one concrete wire call and
//! hand back an [`InvokeOutput`]. The engine and rotation executor only see
//! this boundary — wire formats, auth header styles, and response parsing
//! never leak past it.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use super::classify;
use crate::credentials::Credential;
use crate::error::{ErrorClass, InvokeError};

// ─── Request ──────────────────────────────────────────────────────────────────

/// What the caller wants done.
#[derive(Debug, Clone)]
pub enum RequestPayload {
    /// Analyze local images against a prompt. Callers send a character
    /// shot plus an optional product shot, so zero to two paths.
    Vision { prompt: String, images: Vec<PathBuf> },
    /// Generate an image from a text prompt.
    Prompt(String),
}

/// Provider-agnostic tuning knobs. Adapters read what applies to their
/// wire and ignore the rest.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub seed: Option<u64>,
    /// Override the descriptor's default model where the wire allows it.
    pub model: Option<String>,
    /// Directory for image artifacts persisted from byte responses.
    /// Defaults to the OS temp dir.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub payload: RequestPayload,
    pub options: RequestOptions,
}

impl ProviderRequest {
    pub fn vision(prompt: impl Into<String>, images: Vec<PathBuf>) -> Self {
        Self {
            payload: RequestPayload::Vision {
                prompt: prompt.into(),
                images,
            },
            options: RequestOptions::default(),
        }
    }

    pub fn image(prompt: impl Into<String>) -> Self {
        Self {
            payload: RequestPayload::Prompt(prompt.into()),
            options: RequestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// The prompt text, whichever payload shape carries it.
    pub fn prompt(&self) -> &str {
        match &self.payload {
            RequestPayload::Vision { prompt, .. } => prompt,
            RequestPayload::Prompt(prompt) => prompt,
        }
    }

    /// Local files this request depends on — the default preflight input.
    pub fn local_inputs(&self) -> &[PathBuf] {
        match &self.payload {
            RequestPayload::Vision { images, .. } => images,
            RequestPayload::Prompt(_) => &[],
        }
    }
}

// ─── Output ───────────────────────────────────────────────────────────────────

/// Where a generated image ended up. Providers either return a hosted URL
/// or bytes that get persisted locally; some of the flows produce both.
#[derive(Debug, Clone, Serialize)]
pub struct ImageArtifact {
    pub url: Option<String>,
    pub path: Option<PathBuf>,
    pub provider: String,
    pub model: String,
}

/// Successful invocation result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeOutput {
    /// Parsed JSON from a vision model.
    Analysis(Value),
    Image(ImageArtifact),
}

impl InvokeOutput {
    pub fn as_analysis(&self) -> Option<&Value> {
        match self {
            InvokeOutput::Analysis(v) => Some(v),
            InvokeOutput::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageArtifact> {
        match self {
            InvokeOutput::Image(a) => Some(a),
            InvokeOutput::Analysis(_) => None,
        }
    }
}

// ─── The strategy trait ───────────────────────────────────────────────────────

/// One callable backend — the strategy a descriptor points at.
#[async_trait]
pub trait Invoke: Send + Sync {
    /// One attempt against the provider. `credential` is `None` exactly for
    /// keyless descriptors.
    async fn invoke(
        &self,
        request: &ProviderRequest,
        credential: Option<&Credential>,
    ) -> Result<InvokeOutput, InvokeError>;

    /// Cheap local check before any network call. A failure makes the
    /// engine skip this descriptor without recording an attempt.
    fn preflight(&self, request: &ProviderRequest) -> Result<(), String> {
        for path in request.local_inputs() {
            if !path.exists() {
                return Err(format!("missing local input: {}", path.display()));
            }
        }
        Ok(())
    }

    /// Map an attempt failure to a rotation decision. The default heuristic
    /// covers HTTP 429 and the common quota phrasings; override when a
    /// provider words its limits differently.
    fn classify(&self, err: &InvokeError) -> ErrorClass {
        classify::default_error_class(err)
    }
}
