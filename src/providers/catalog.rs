//! The built-in provider catalog.
//!
//! Priority bands follow cost: the free Google tiers lead, then the
//! free-credit vendors, with the keyless pollinations endpoint as the floor
//! nothing can sink below. Several descriptors share one credential pool
//! (multiple models under one vendor account).

use once_cell::sync::Lazy;
use std::sync::Arc;

use super::adapters::chat_vision::{
    ChatVisionAdapter, FIREWORKS_CHAT_ENDPOINT, OPENROUTER_ENDPOINT,
};
use super::adapters::gemini::{
    GeminiApiVersion, GeminiImageAdapter, GeminiVisionAdapter, ImagenAdapter,
};
use super::adapters::image_gen::{
    DeepInfraImageAdapter, FalImageAdapter, FireworksImageAdapter, HfInferenceImageAdapter,
    NvcfImageAdapter, SegmindImageAdapter, TogetherImageAdapter,
};
use super::adapters::pollinations::PollinationsAdapter;
use super::{Capability, ProviderDescriptor};

/// Fallback ladder for the serverless Hugging Face inference endpoint.
const HF_IMAGE_MODELS: &[&str] = &[
    "black-forest-labs/FLUX.1-schnell",
    "stabilityai/stable-diffusion-xl-base-1.0",
    "runwayml/stable-diffusion-v1-5",
];

// ─── Vision analysis ──────────────────────────────────────────────────────────

/// Vision-analysis descriptors, cheapest first.
pub static VISION_PROVIDERS: Lazy<Vec<ProviderDescriptor>> = Lazy::new(|| {
    vec![
        ProviderDescriptor {
            id: "google-gemini-2.5-flash",
            display_name: "Google Gemini 2.5 Flash",
            provider: "google",
            capability: Capability::VisionAnalysis,
            priority: 10,
            requires_credential: true,
            invoker: Arc::new(GeminiVisionAdapter::new(
                GeminiApiVersion::V1,
                "gemini-2.5-flash",
            )),
        },
        ProviderDescriptor {
            id: "google-gemini-2.0-flash",
            display_name: "Google Gemini 2.0 Flash",
            provider: "google",
            capability: Capability::VisionAnalysis,
            priority: 11,
            requires_credential: true,
            invoker: Arc::new(GeminiVisionAdapter::new(
                GeminiApiVersion::V1,
                "gemini-2.0-flash",
            )),
        },
        ProviderDescriptor {
            id: "google-gemini-3-pro-preview",
            display_name: "Google Gemini 3 Pro Preview",
            provider: "google",
            capability: Capability::VisionAnalysis,
            priority: 12,
            requires_credential: true,
            // Previews only exist on the beta surface.
            invoker: Arc::new(GeminiVisionAdapter::new(
                GeminiApiVersion::V1Beta,
                "gemini-3-pro-preview",
            )),
        },
        ProviderDescriptor {
            id: "openrouter-gpt-4o-mini",
            display_name: "OpenRouter GPT-4o Mini",
            provider: "openrouter",
            capability: Capability::VisionAnalysis,
            priority: 20,
            requires_credential: true,
            invoker: Arc::new(ChatVisionAdapter::openai_compatible(
                OPENROUTER_ENDPOINT,
                "openai/gpt-4o-mini",
            )),
        },
        ProviderDescriptor {
            id: "openrouter-gemini-pro-1.5",
            display_name: "OpenRouter Gemini Pro 1.5",
            provider: "openrouter",
            capability: Capability::VisionAnalysis,
            priority: 21,
            requires_credential: true,
            invoker: Arc::new(ChatVisionAdapter::openai_compatible(
                OPENROUTER_ENDPOINT,
                "google/gemini-pro-1.5",
            )),
        },
        ProviderDescriptor {
            id: "openrouter-qwen-2-vl-72b",
            display_name: "OpenRouter Qwen 2 VL 72B",
            provider: "openrouter",
            capability: Capability::VisionAnalysis,
            priority: 22,
            requires_credential: true,
            invoker: Arc::new(ChatVisionAdapter::openai_compatible(
                OPENROUTER_ENDPOINT,
                "qwen/qwen-2-vl-72b-instruct",
            )),
        },
        ProviderDescriptor {
            id: "fireworks-llava-next",
            display_name: "Fireworks Llava Next",
            provider: "fireworks",
            capability: Capability::VisionAnalysis,
            priority: 30,
            requires_credential: true,
            invoker: Arc::new(ChatVisionAdapter::openai_compatible(
                FIREWORKS_CHAT_ENDPOINT,
                "fireworks/firellava-13b",
            )),
        },
        ProviderDescriptor {
            id: "huggingface-kimi",
            display_name: "Hugging Face Kimi K2.5",
            provider: "huggingface",
            capability: Capability::VisionAnalysis,
            priority: 40,
            requires_credential: true,
            invoker: Arc::new(ChatVisionAdapter::hf_router("moonshotai/Kimi-K2.5:fastest")),
        },
    ]
});

// ─── Image generation ─────────────────────────────────────────────────────────

/// Image-generation descriptors, cheapest first, pollinations last.
pub static IMAGE_PROVIDERS: Lazy<Vec<ProviderDescriptor>> = Lazy::new(|| {
    vec![
        ProviderDescriptor {
            id: "gemini-2.0-flash-image",
            display_name: "Google Gemini 2.0 Flash (Image)",
            provider: "google",
            capability: Capability::ImageGeneration,
            priority: 10,
            requires_credential: true,
            invoker: Arc::new(GeminiImageAdapter),
        },
        ProviderDescriptor {
            id: "google-imagen-3",
            display_name: "Google Imagen 3",
            provider: "google",
            capability: Capability::ImageGeneration,
            priority: 11,
            requires_credential: true,
            invoker: Arc::new(ImagenAdapter),
        },
        ProviderDescriptor {
            id: "nvidia-sdxl",
            display_name: "NVIDIA Stable Diffusion XL",
            provider: "nvidia",
            capability: Capability::ImageGeneration,
            priority: 12,
            requires_credential: true,
            invoker: Arc::new(NvcfImageAdapter {
                function: "0e22db2d-b823-4e7a-b2f9-a6e5e8b90d3f",
                model: "sdxl",
                negative_prompt: "blurry, low quality, distorted",
                cfg_scale: 7.5,
                sampler: Some("DDIM"),
                send_seed: true,
            }),
        },
        ProviderDescriptor {
            id: "nvidia-sd3",
            display_name: "NVIDIA Stable Diffusion 3",
            provider: "nvidia",
            capability: Capability::ImageGeneration,
            priority: 13,
            requires_credential: true,
            invoker: Arc::new(NvcfImageAdapter {
                function: "stable-diffusion-3-medium",
                model: "sd3",
                negative_prompt: "blurry, low quality",
                cfg_scale: 7.0,
                sampler: None,
                send_seed: false,
            }),
        },
        ProviderDescriptor {
            id: "fireworks-sd3",
            display_name: "Fireworks Stable Diffusion 3",
            provider: "fireworks",
            capability: Capability::ImageGeneration,
            priority: 14,
            requires_credential: true,
            invoker: Arc::new(FireworksImageAdapter {
                workflow: "stable-diffusion-3",
                model: "sd3",
                cfg_scale: 7.5,
                send_seed: true,
            }),
        },
        ProviderDescriptor {
            id: "fireworks-playground-v2.5",
            display_name: "Fireworks Playground v2.5",
            provider: "fireworks",
            capability: Capability::ImageGeneration,
            priority: 15,
            requires_credential: true,
            invoker: Arc::new(FireworksImageAdapter {
                workflow: "playground-v2-5-1024px-aesthetic",
                model: "playground-v2.5",
                cfg_scale: 7.0,
                send_seed: false,
            }),
        },
        ProviderDescriptor {
            id: "together-flux-schnell",
            display_name: "Together AI Flux Schnell",
            provider: "together",
            capability: Capability::ImageGeneration,
            priority: 16,
            requires_credential: true,
            invoker: Arc::new(TogetherImageAdapter {
                model_id: "black-forest-labs/FLUX.1-schnell",
                model: "flux-schnell",
                steps: 4,
            }),
        },
        ProviderDescriptor {
            id: "together-sdxl",
            display_name: "Together AI SDXL",
            provider: "together",
            capability: Capability::ImageGeneration,
            priority: 17,
            requires_credential: true,
            invoker: Arc::new(TogetherImageAdapter {
                model_id: "stabilityai/stable-diffusion-xl-base-1.0",
                model: "sdxl",
                steps: 30,
            }),
        },
        ProviderDescriptor {
            id: "fal-flux-pro",
            display_name: "FAL.ai Flux Pro",
            provider: "fal",
            capability: Capability::ImageGeneration,
            priority: 18,
            requires_credential: true,
            invoker: Arc::new(FalImageAdapter {
                app: "fal-ai/flux-pro",
                model: "flux-pro",
            }),
        },
        ProviderDescriptor {
            id: "fal-flux-realism",
            display_name: "FAL.ai Flux Realism",
            provider: "fal",
            capability: Capability::ImageGeneration,
            priority: 19,
            requires_credential: true,
            invoker: Arc::new(FalImageAdapter {
                app: "fal-ai/flux-realism",
                model: "flux-realism",
            }),
        },
        ProviderDescriptor {
            id: "segmind-sd3",
            display_name: "Segmind Stable Diffusion 3",
            provider: "segmind",
            capability: Capability::ImageGeneration,
            priority: 20,
            requires_credential: true,
            invoker: Arc::new(SegmindImageAdapter {
                endpoint: "sd3-medium",
                model: "sd3",
                guidance_scale: 7.0,
            }),
        },
        ProviderDescriptor {
            id: "segmind-sdxl",
            display_name: "Segmind SDXL",
            provider: "segmind",
            capability: Capability::ImageGeneration,
            priority: 21,
            requires_credential: true,
            invoker: Arc::new(SegmindImageAdapter {
                endpoint: "sdxl1.0-txt2img",
                model: "sdxl",
                guidance_scale: 7.5,
            }),
        },
        ProviderDescriptor {
            id: "deepinfra-sdxl",
            display_name: "DeepInfra SDXL",
            provider: "deepinfra",
            capability: Capability::ImageGeneration,
            priority: 22,
            requires_credential: true,
            invoker: Arc::new(DeepInfraImageAdapter {
                model_id: "stabilityai/stable-diffusion-xl-base-1.0",
                model: "sdxl",
                steps: 30,
                guidance_scale: Some(7.5),
            }),
        },
        ProviderDescriptor {
            id: "deepinfra-flux-schnell",
            display_name: "DeepInfra Flux Schnell",
            provider: "deepinfra",
            capability: Capability::ImageGeneration,
            priority: 23,
            requires_credential: true,
            invoker: Arc::new(DeepInfraImageAdapter {
                model_id: "black-forest-labs/FLUX-1-schnell",
                model: "flux-schnell",
                steps: 4,
                guidance_scale: None,
            }),
        },
        ProviderDescriptor {
            id: "huggingface-flux",
            display_name: "Hugging Face Flux Schnell",
            provider: "huggingface",
            capability: Capability::ImageGeneration,
            priority: 24,
            requires_credential: true,
            invoker: Arc::new(HfInferenceImageAdapter {
                models: HF_IMAGE_MODELS,
            }),
        },
        ProviderDescriptor {
            id: "pollinations",
            display_name: "Pollinations AI",
            provider: "pollinations",
            capability: Capability::ImageGeneration,
            priority: 99,
            requires_credential: false,
            invoker: Arc::new(PollinationsAdapter),
        },
    ]
});

/// Every built-in descriptor, both capabilities.
pub fn all() -> Vec<ProviderDescriptor> {
    VISION_PROVIDERS
        .iter()
        .cloned()
        .chain(IMAGE_PROVIDERS.iter().cloned())
        .collect()
}
