//! OpenAI-compatible chat-completions vision adapters.
//!
//! Covers OpenRouter, Fireworks and the Hugging Face router — the same
//! message schema with different endpoints and strictness. Images travel
//! inline as `data:` URLs; answers come back as JSON text that may or may
//! not be fenced.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{encode_image, json_body, parse_json_answer, require_secret};
use crate::credentials::Credential;
use crate::error::InvokeError;
use crate::providers::invoke::{Invoke, InvokeOutput, ProviderRequest};

/// Instruction prepended to every analysis request.
pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert AI fashion stylist. Analyze the \
    provided images and return ONLY a valid JSON object. Do not include any extra text, \
    markdown, or commentary. The JSON should conform to the structure specified in the \
    user's request.";

pub const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const FIREWORKS_CHAT_ENDPOINT: &str = "https://api.fireworks.ai/inference/v1/chat/completions";
pub const HF_ROUTER_ENDPOINT: &str = "https://router.huggingface.co/v1/chat/completions";

/// One chat-completions backend.
#[derive(Debug, Clone)]
pub struct ChatVisionAdapter {
    endpoint: &'static str,
    model: &'static str,
    /// Send the instruction as a proper system message and request
    /// `response_format: json_object`. The HF router rejects both, so its
    /// instruction rides inside the user content instead.
    strict_json_mode: bool,
}

impl ChatVisionAdapter {
    /// OpenRouter / Fireworks flavor: system message plus JSON response
    /// format.
    pub fn openai_compatible(endpoint: &'static str, model: &'static str) -> Self {
        Self {
            endpoint,
            model,
            strict_json_mode: true,
        }
    }

    /// Hugging Face router flavor: user-only message, no response format.
    pub fn hf_router(model: &'static str) -> Self {
        Self {
            endpoint: HF_ROUTER_ENDPOINT,
            model,
            strict_json_mode: false,
        }
    }

    fn model_for<'a>(&'a self, request: &'a ProviderRequest) -> &'a str {
        request.options.model.as_deref().unwrap_or(self.model)
    }

    async fn build_body(&self, request: &ProviderRequest) -> Result<Value, InvokeError> {
        let mut content = Vec::new();
        if self.strict_json_mode {
            content.push(json!({ "type": "text", "text": request.prompt() }));
        } else {
            // No system slot on this wire: fold the instruction into the
            // user turn.
            content.push(json!({
                "type": "text",
                "text": format!("{ANALYSIS_SYSTEM_PROMPT} {}", request.prompt())
            }));
        }
        for path in request.local_inputs() {
            let encoded = encode_image(path).await?;
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": format!("data:image/jpeg;base64,{encoded}") }
            }));
        }
        if !self.strict_json_mode && request.local_inputs().len() == 1 {
            content.push(json!({
                "type": "text",
                "text": "NOTE: Only the character image is provided. Please provide an \
                         analysis based on that single image."
            }));
        }

        let mut messages = Vec::new();
        if self.strict_json_mode {
            messages.push(json!({ "role": "system", "content": ANALYSIS_SYSTEM_PROMPT }));
        }
        messages.push(json!({ "role": "user", "content": content }));

        let mut body = json!({ "model": self.model_for(request), "messages": messages });
        if self.strict_json_mode {
            body["max_tokens"] = json!(4096);
            body["response_format"] = json!({ "type": "json_object" });
        }
        Ok(body)
    }
}

#[async_trait]
impl Invoke for ChatVisionAdapter {
    async fn invoke(
        &self,
        request: &ProviderRequest,
        credential: Option<&Credential>,
    ) -> Result<InvokeOutput, InvokeError> {
        let secret = require_secret(credential, "chat-vision")?;
        let body = self.build_body(request).await?;

        let resp = super::http_client()
            .post(self.endpoint)
            .bearer_auth(secret)
            .json(&body)
            .send()
            .await
            .map_err(InvokeError::from)?;
        let data = json_body(resp).await?;

        let answer = &data["choices"][0]["message"]["content"];
        let parsed = match answer {
            // Most backends return the JSON as a string, fenced or not.
            Value::String(text) => parse_json_answer(text)?,
            // Some json_object implementations hand back the object itself.
            Value::Object(_) => answer.clone(),
            _ => {
                return Err(InvokeError::Malformed(
                    "no message content in chat completion".into(),
                ))
            }
        };
        debug!(model = self.model_for(request), "chat vision analysis parsed");
        Ok(InvokeOutput::Analysis(parsed))
    }
}
