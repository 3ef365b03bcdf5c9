//! Keyless fallback: pollinations.ai serves images straight off a GET URL,
//! so "generation" is just building that URL. No network call, no way to
//! rate-limit, which is what makes it the floor of the priority ladder.

use async_trait::async_trait;
use tracing::debug;

use super::random_seed;
use crate::credentials::Credential;
use crate::error::InvokeError;
use crate::providers::invoke::{ImageArtifact, Invoke, InvokeOutput, ProviderRequest};

const BASE: &str = "https://image.pollinations.ai";
const DEFAULT_MODEL: &str = "flux";

#[derive(Debug, Clone, Default)]
pub struct PollinationsAdapter;

impl PollinationsAdapter {
    /// Build the hosted-image URL for a request. Pure; no network.
    pub fn image_url(request: &ProviderRequest) -> Result<String, InvokeError> {
        let options = &request.options;
        let model = options.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let (width, height) = super::dims(options);
        let seed = options.seed.unwrap_or_else(random_seed);

        let mut url = reqwest::Url::parse(BASE)
            .map_err(|e| InvokeError::Local(format!("bad base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| InvokeError::Local("base url cannot take segments".into()))?
            .push("prompt")
            .push(request.prompt());
        url.query_pairs_mut()
            .append_pair("width", &width.to_string())
            .append_pair("height", &height.to_string())
            .append_pair("model", model)
            .append_pair("seed", &seed.to_string())
            .append_pair("nologo", "true");
        Ok(url.into())
    }
}

#[async_trait]
impl Invoke for PollinationsAdapter {
    async fn invoke(
        &self,
        request: &ProviderRequest,
        _credential: Option<&Credential>,
    ) -> Result<InvokeOutput, InvokeError> {
        let model = request
            .options
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let url = Self::image_url(request)?;
        debug!("pollinations fallback url built");
        Ok(InvokeOutput::Image(ImageArtifact {
            url: Some(url),
            path: None,
            provider: "pollinations".into(),
            model,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::invoke::RequestOptions;

    #[test]
    fn url_carries_prompt_and_options() {
        let request = ProviderRequest::image("red silk dress, studio light").with_options(
            RequestOptions {
                width: Some(512),
                height: Some(768),
                seed: Some(42),
                model: Some("turbo".into()),
                output_dir: None,
            },
        );

        let url = PollinationsAdapter::image_url(&request).expect("url");
        assert!(url.starts_with("https://image.pollinations.ai/prompt/"));
        assert!(url.contains("red%20silk%20dress"));
        assert!(url.contains("width=512"));
        assert!(url.contains("height=768"));
        assert!(url.contains("model=turbo"));
        assert!(url.contains("seed=42"));
        assert!(url.contains("nologo=true"));
    }

    #[tokio::test]
    async fn invoke_returns_hosted_url_without_credential() {
        let request = ProviderRequest::image("minimalist coat");

        let out = PollinationsAdapter
            .invoke(&request, None)
            .await
            .expect("invoke");
        let artifact = out.as_image().expect("image artifact");
        assert_eq!(artifact.provider, "pollinations");
        assert_eq!(artifact.model, "flux");
        assert!(artifact
            .url
            .as_deref()
            .expect("url")
            .contains("minimalist%20coat"));
        assert!(artifact.path.is_none());
    }
}
