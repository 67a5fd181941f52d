//! Kitchen concept images from a hosted text-to-image model.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::contact::to_data_url;
use crate::errors::ImageError;
use crate::site_config::ImageSection;

const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Render `prompt`, returning the image as a `data:` URL.
    async fn generate(&self, prompt: &str) -> Result<String, ImageError>;
}

#[derive(Debug, Serialize, PartialEq)]
struct InferenceParameters<'a> {
    negative_prompt: &'a str,
    num_inference_steps: u32,
    guidance_scale: f64,
}

#[derive(Debug, Serialize, PartialEq)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters<'a>,
}

/// Client for the Hugging Face inference API.
pub struct HuggingFaceGenerator {
    client: reqwest::Client,
    token: Option<String>,
    config: ImageSection,
}

impl HuggingFaceGenerator {
    pub fn new(config: ImageSection, token: Option<String>) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            token: token.filter(|t| !t.trim().is_empty()),
            config,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> InferenceRequest<'a> {
        InferenceRequest {
            inputs: prompt,
            parameters: InferenceParameters {
                negative_prompt: &self.config.negative_prompt,
                num_inference_steps: self.config.num_inference_steps,
                guidance_scale: self.config.guidance_scale,
            },
        }
    }
}

#[async_trait]
impl ImageGenerator for HuggingFaceGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ImageError> {
        let token = self.token.as_deref().ok_or(ImageError::MissingToken)?;

        let resp = self
            .client
            .post(&self.config.model_url)
            .bearer_auth(token)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "image model returned error status");
            return Err(ImageError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string());
        let bytes = resp.bytes().await?;

        info!(bytes = bytes.len(), %content_type, "kitchen image generated");
        Ok(to_data_url(&content_type, &bytes))
    }
}
