//! Text-to-image adapters for the HTTP backends that take a prompt and
//! return a URL, raw bytes, or base64 — one struct per wire family.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{byte_body, decode_image, dims, json_body, persist_png, random_seed, require_secret};
use crate::credentials::Credential;
use crate::error::InvokeError;
use crate::providers::invoke::{ImageArtifact, Invoke, InvokeOutput, ProviderRequest};

// ─── NVIDIA NIM ───────────────────────────────────────────────────────────────

/// NVIDIA cloud-function diffusion endpoints. Responds with base64 under an
/// `image` key.
#[derive(Debug, Clone)]
pub struct NvcfImageAdapter {
    /// Function path segment — a UUID for some models, a slug for others.
    pub function: &'static str,
    /// Short model name recorded on artifacts.
    pub model: &'static str,
    pub negative_prompt: &'static str,
    pub cfg_scale: f64,
    /// DDIM for SDXL; SD3 takes no sampler field.
    pub sampler: Option<&'static str>,
    /// SDXL wants an explicit seed, SD3 rejects one.
    pub send_seed: bool,
}

#[async_trait]
impl Invoke for NvcfImageAdapter {
    async fn invoke(
        &self,
        request: &ProviderRequest,
        credential: Option<&Credential>,
    ) -> Result<InvokeOutput, InvokeError> {
        let secret = require_secret(credential, "nvidia")?;
        let (width, height) = dims(&request.options);

        let mut body = json!({
            "prompt": request.prompt(),
            "negative_prompt": self.negative_prompt,
            "steps": 30,
            "cfg_scale": self.cfg_scale,
            "width": width,
            "height": height
        });
        if let Some(sampler) = self.sampler {
            body["sampler"] = json!(sampler);
        }
        if self.send_seed {
            body["seed"] = json!(request.options.seed.unwrap_or_else(random_seed));
        }

        let url = format!(
            "https://api.nvcf.nvidia.com/v2/nvcf/pexec/functions/{}",
            self.function
        );
        let resp = super::http_client()
            .post(&url)
            .bearer_auth(secret)
            .json(&body)
            .send()
            .await
            .map_err(InvokeError::from)?;
        let data = json_body(resp).await?;

        let encoded = data["image"]
            .as_str()
            .ok_or_else(|| InvokeError::Malformed("no image field in response".into()))?;
        let bytes = decode_image(encoded)?;
        let path = persist_png("nvidia", &bytes, &request.options).await?;
        debug!(model = self.model, "nvidia image persisted");
        Ok(InvokeOutput::Image(ImageArtifact {
            url: None,
            path: Some(path),
            provider: "nvidia".into(),
            model: self.model.into(),
        }))
    }
}

// ─── Fireworks ────────────────────────────────────────────────────────────────

/// Fireworks image workflows. Responds with a hosted URL, either top-level
/// or nested under `images`.
#[derive(Debug, Clone)]
pub struct FireworksImageAdapter {
    /// Model path under `accounts/fireworks/models/`.
    pub workflow: &'static str,
    pub model: &'static str,
    pub cfg_scale: f64,
    pub send_seed: bool,
}

#[async_trait]
impl Invoke for FireworksImageAdapter {
    async fn invoke(
        &self,
        request: &ProviderRequest,
        credential: Option<&Credential>,
    ) -> Result<InvokeOutput, InvokeError> {
        let secret = require_secret(credential, "fireworks")?;
        let (width, height) = dims(&request.options);

        let mut body = json!({
            "prompt": request.prompt(),
            "cfg_scale": self.cfg_scale,
            "height": height,
            "width": width,
            "steps": 30
        });
        if self.send_seed {
            body["seed"] = json!(request.options.seed.unwrap_or_else(random_seed));
        }

        let url = format!(
            "https://api.fireworks.ai/inference/v1/image_generation/accounts/fireworks/models/{}",
            self.workflow
        );
        let resp = super::http_client()
            .post(&url)
            .bearer_auth(secret)
            .json(&body)
            .send()
            .await
            .map_err(InvokeError::from)?;
        let data = json_body(resp).await?;

        let image_url = data["url"]
            .as_str()
            .or_else(|| data["images"][0]["url"].as_str())
            .ok_or_else(|| InvokeError::Malformed("no image url in response".into()))?;
        debug!(model = self.model, "fireworks image ready");
        Ok(InvokeOutput::Image(ImageArtifact {
            url: Some(image_url.to_string()),
            path: None,
            provider: "fireworks".into(),
            model: self.model.into(),
        }))
    }
}

// ─── Together ─────────────────────────────────────────────────────────────────

/// `api.together.xyz/v1/images/generations`, the OpenAI-style image API.
#[derive(Debug, Clone)]
pub struct TogetherImageAdapter {
    /// Full model id on the wire.
    pub model_id: &'static str,
    pub model: &'static str,
    pub steps: u32,
}

#[async_trait]
impl Invoke for TogetherImageAdapter {
    async fn invoke(
        &self,
        request: &ProviderRequest,
        credential: Option<&Credential>,
    ) -> Result<InvokeOutput, InvokeError> {
        let secret = require_secret(credential, "together")?;
        let (width, height) = dims(&request.options);

        let body = json!({
            "model": self.model_id,
            "prompt": request.prompt(),
            "width": width,
            "height": height,
            "steps": self.steps,
            "n": 1
        });
        let resp = super::http_client()
            .post("https://api.together.xyz/v1/images/generations")
            .bearer_auth(secret)
            .json(&body)
            .send()
            .await
            .map_err(InvokeError::from)?;
        let data = json_body(resp).await?;

        let image_url = data["data"][0]["url"]
            .as_str()
            .ok_or_else(|| InvokeError::Malformed("no image url in response".into()))?;
        debug!(model = self.model, "together image ready");
        Ok(InvokeOutput::Image(ImageArtifact {
            url: Some(image_url.to_string()),
            path: None,
            provider: "together".into(),
            model: self.model.into(),
        }))
    }
}

// ─── FAL ──────────────────────────────────────────────────────────────────────

/// `fal.run/{app}` synchronous endpoints. Auth header is `Key …`, not
/// `Bearer`.
#[derive(Debug, Clone)]
pub struct FalImageAdapter {
    pub app: &'static str,
    pub model: &'static str,
}

#[async_trait]
impl Invoke for FalImageAdapter {
    async fn invoke(
        &self,
        request: &ProviderRequest,
        credential: Option<&Credential>,
    ) -> Result<InvokeOutput, InvokeError> {
        let secret = require_secret(credential, "fal")?;

        let body = json!({
            "prompt": request.prompt(),
            "image_size": "square_hd",
            "num_inference_steps": 28,
            "guidance_scale": 3.5,
            "num_images": 1
        });
        let resp = super::http_client()
            .post(format!("https://fal.run/{}", self.app))
            .header("Authorization", format!("Key {secret}"))
            .json(&body)
            .send()
            .await
            .map_err(InvokeError::from)?;
        let data = json_body(resp).await?;

        let image_url = data["images"][0]["url"]
            .as_str()
            .ok_or_else(|| InvokeError::Malformed("no image url in response".into()))?;
        debug!(model = self.model, "fal image ready");
        Ok(InvokeOutput::Image(ImageArtifact {
            url: Some(image_url.to_string()),
            path: None,
            provider: "fal".into(),
            model: self.model.into(),
        }))
    }
}

// ─── Segmind ──────────────────────────────────────────────────────────────────

/// Segmind v1 endpoints. Auth is an `x-api-key` header and a successful
/// response is the PNG itself.
#[derive(Debug, Clone)]
pub struct SegmindImageAdapter {
    /// Endpoint path under `/v1/`.
    pub endpoint: &'static str,
    pub model: &'static str,
    pub guidance_scale: f64,
}

#[async_trait]
impl Invoke for SegmindImageAdapter {
    async fn invoke(
        &self,
        request: &ProviderRequest,
        credential: Option<&Credential>,
    ) -> Result<InvokeOutput, InvokeError> {
        let secret = require_secret(credential, "segmind")?;
        let (width, height) = dims(&request.options);

        let body = json!({
            "prompt": request.prompt(),
            "negative_prompt": "blurry, low quality",
            "steps": 30,
            "guidance_scale": self.guidance_scale,
            "width": width,
            "height": height,
            "seed": request.options.seed.unwrap_or_else(random_seed)
        });
        let resp = super::http_client()
            .post(format!("https://api.segmind.com/v1/{}", self.endpoint))
            .header("x-api-key", secret)
            .json(&body)
            .send()
            .await
            .map_err(InvokeError::from)?;
        let bytes = byte_body(resp).await?;

        let path = persist_png("segmind", &bytes, &request.options).await?;
        debug!(model = self.model, "segmind image persisted");
        Ok(InvokeOutput::Image(ImageArtifact {
            url: None,
            path: Some(path),
            provider: "segmind".into(),
            model: self.model.into(),
        }))
    }
}

// ─── DeepInfra ────────────────────────────────────────────────────────────────

/// `api.deepinfra.com/v1/inference/{model}` — answers with a base64 array.
#[derive(Debug, Clone)]
pub struct DeepInfraImageAdapter {
    pub model_id: &'static str,
    pub model: &'static str,
    pub steps: u32,
    /// SDXL-style endpoints take guidance plus a negative prompt; Flux
    /// takes neither.
    pub guidance_scale: Option<f64>,
}

#[async_trait]
impl Invoke for DeepInfraImageAdapter {
    async fn invoke(
        &self,
        request: &ProviderRequest,
        credential: Option<&Credential>,
    ) -> Result<InvokeOutput, InvokeError> {
        let secret = require_secret(credential, "deepinfra")?;
        let (width, height) = dims(&request.options);

        let mut body = json!({
            "prompt": request.prompt(),
            "width": width,
            "height": height,
            "num_inference_steps": self.steps
        });
        if let Some(guidance) = self.guidance_scale {
            body["guidance_scale"] = json!(guidance);
            body["negative_prompt"] = json!("blurry, low quality");
        }

        let resp = super::http_client()
            .post(format!(
                "https://api.deepinfra.com/v1/inference/{}",
                self.model_id
            ))
            .bearer_auth(secret)
            .json(&body)
            .send()
            .await
            .map_err(InvokeError::from)?;
        let data = json_body(resp).await?;

        let encoded = data["images"][0]
            .as_str()
            .ok_or_else(|| InvokeError::Malformed("no images in response".into()))?;
        let bytes = decode_image(encoded)?;
        let path = persist_png("deepinfra", &bytes, &request.options).await?;
        debug!(model = self.model, "deepinfra image persisted");
        Ok(InvokeOutput::Image(ImageArtifact {
            url: None,
            path: Some(path),
            provider: "deepinfra".into(),
            model: self.model.into(),
        }))
    }
}

// ─── Hugging Face inference ───────────────────────────────────────────────────

/// Serverless inference with a fixed ladder of fallback model ids. The free
/// endpoints go cold or vanish often enough that one descriptor covers
/// several models; only the last error surfaces if the whole ladder fails.
#[derive(Debug, Clone)]
pub struct HfInferenceImageAdapter {
    pub models: &'static [&'static str],
}

#[async_trait]
impl Invoke for HfInferenceImageAdapter {
    async fn invoke(
        &self,
        request: &ProviderRequest,
        credential: Option<&Credential>,
    ) -> Result<InvokeOutput, InvokeError> {
        let secret = require_secret(credential, "huggingface")?;
        let (width, height) = dims(&request.options);

        let mut last: Option<InvokeError> = None;
        for model in self.models {
            let body = json!({
                "inputs": request.prompt(),
                "parameters": {
                    "width": width,
                    "height": height,
                    "num_inference_steps": 4
                }
            });
            let sent = super::http_client()
                .post(format!("https://api-inference.huggingface.co/models/{model}"))
                .bearer_auth(secret)
                .json(&body)
                .send()
                .await;
            match sent {
                Ok(resp) => match byte_body(resp).await {
                    Ok(bytes) => {
                        let path = persist_png("hf", &bytes, &request.options).await?;
                        debug!(model, "hugging face image persisted");
                        return Ok(InvokeOutput::Image(ImageArtifact {
                            url: None,
                            path: Some(path),
                            provider: "huggingface".into(),
                            model: (*model).into(),
                        }));
                    }
                    Err(e) => {
                        debug!(model, error = %e, "hugging face model rejected, trying next");
                        last = Some(e);
                    }
                },
                Err(e) => {
                    let e = InvokeError::from(e);
                    debug!(model, error = %e, "hugging face model unreachable, trying next");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| InvokeError::Local("no hugging face models configured".into())))
    }
}
