//! Google Generative Language API adapters: `generateContent` vision, the
//! experimental flash image mode, and Imagen over `:predict`.
//!
//! The API key rides in the query string on this surface, so request URLs
//! must never be logged.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{decode_image, encode_image, json_body, parse_json_answer, persist_png, require_secret};
use crate::credentials::Credential;
use crate::error::InvokeError;
use crate::providers::invoke::{ImageArtifact, Invoke, InvokeOutput, ProviderRequest};

const API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Which REST surface a model lives on. Previews only exist on `v1beta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiApiVersion {
    V1,
    V1Beta,
}

impl GeminiApiVersion {
    fn as_path(self) -> &'static str {
        match self {
            GeminiApiVersion::V1 => "v1",
            GeminiApiVersion::V1Beta => "v1beta",
        }
    }
}

// ─── Vision ───────────────────────────────────────────────────────────────────

/// `models/{model}:generateContent` with inline JPEG parts.
#[derive(Debug, Clone)]
pub struct GeminiVisionAdapter {
    version: GeminiApiVersion,
    model: &'static str,
}

impl GeminiVisionAdapter {
    pub fn new(version: GeminiApiVersion, model: &'static str) -> Self {
        Self { version, model }
    }
}

#[async_trait]
impl Invoke for GeminiVisionAdapter {
    async fn invoke(
        &self,
        request: &ProviderRequest,
        credential: Option<&Credential>,
    ) -> Result<InvokeOutput, InvokeError> {
        let secret = require_secret(credential, "gemini-vision")?;
        let model = request.options.model.as_deref().unwrap_or(self.model);

        let mut parts = vec![json!({ "text": request.prompt() })];
        for path in request.local_inputs() {
            let encoded = encode_image(path).await?;
            parts.push(json!({
                "inline_data": { "mime_type": "image/jpeg", "data": encoded }
            }));
        }

        let url = format!(
            "{API_BASE}/{}/models/{model}:generateContent?key={secret}",
            self.version.as_path()
        );
        let resp = super::http_client()
            .post(&url)
            .json(&json!({ "contents": [{ "parts": parts }] }))
            .send()
            .await
            .map_err(InvokeError::from)?;
        let data = json_body(resp).await?;

        let raw = data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| InvokeError::Malformed("no text part in candidates".into()))?;
        let parsed = parse_json_answer(raw)?;
        debug!(model, "gemini analysis parsed");
        Ok(InvokeOutput::Analysis(parsed))
    }
}

// ─── Flash image mode ─────────────────────────────────────────────────────────

/// The experimental image-output mode of Gemini 2.0 Flash: same
/// `generateContent` wire, but the answer part carries inline base64 PNG
/// data instead of text.
#[derive(Debug, Clone, Default)]
pub struct GeminiImageAdapter;

#[async_trait]
impl Invoke for GeminiImageAdapter {
    async fn invoke(
        &self,
        request: &ProviderRequest,
        credential: Option<&Credential>,
    ) -> Result<InvokeOutput, InvokeError> {
        let secret = require_secret(credential, "gemini-image")?;

        let url =
            format!("{API_BASE}/v1beta/models/gemini-2.0-flash-exp:generateContent?key={secret}");
        let body = json!({
            "contents": [{
                "parts": [{ "text": format!("Generate an image: {}", request.prompt()) }]
            }],
            "generationConfig": {
                "temperature": 1.0,
                "topK": 40,
                "topP": 0.95,
                "maxOutputTokens": 8192
            }
        });
        let resp = super::http_client()
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(InvokeError::from)?;
        let data = json_body(resp).await?;

        let inline = data["candidates"][0]["content"]["parts"][0]["inlineData"]["data"]
            .as_str()
            .ok_or_else(|| InvokeError::Malformed("no inline image data in response".into()))?;
        let bytes = decode_image(inline)?;
        let path = persist_png("gemini", &bytes, &request.options).await?;
        debug!("gemini flash image persisted");
        Ok(InvokeOutput::Image(ImageArtifact {
            url: None,
            path: Some(path),
            provider: "google".into(),
            model: "gemini-2.0-flash".into(),
        }))
    }
}

// ─── Imagen ───────────────────────────────────────────────────────────────────

/// Imagen 3 over the `:predict` surface.
#[derive(Debug, Clone, Default)]
pub struct ImagenAdapter;

#[async_trait]
impl Invoke for ImagenAdapter {
    async fn invoke(
        &self,
        request: &ProviderRequest,
        credential: Option<&Credential>,
    ) -> Result<InvokeOutput, InvokeError> {
        let secret = require_secret(credential, "imagen")?;

        let url = format!("{API_BASE}/v1beta/models/imagen-3.0-generate-001:predict?key={secret}");
        let body = json!({
            "instances": [{ "prompt": request.prompt() }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": "1:1",
                "safetyFilterLevel": "block_some",
                "personGeneration": "allow_all"
            }
        });
        let resp = super::http_client()
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(InvokeError::from)?;
        let data = json_body(resp).await?;

        let encoded = data["predictions"][0]["bytesBase64Encoded"]
            .as_str()
            .ok_or_else(|| InvokeError::Malformed("no image data in predictions".into()))?;
        let bytes = decode_image(encoded)?;
        let path = persist_png("imagen", &bytes, &request.options).await?;
        debug!("imagen artifact persisted");
        Ok(InvokeOutput::Image(ImageArtifact {
            url: None,
            path: Some(path),
            provider: "google".into(),
            model: "imagen-3".into(),
        }))
    }
}
