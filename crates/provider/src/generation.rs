//! REST client for the image-transformation provider.
//!
//! Wraps the provider's `POST /v1/generations` endpoint using
//! [`reqwest`]. One attempt per call; retry policy lives in
//! [`crate::retry::RetryingGenerator`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use restyle_core::contracts::{
    GenerationOutput, GenerationProvider, GenerationRequest, ImagePayload, ProviderError,
    ProviderFlags,
};

use crate::wire;

/// HTTP client for the generation provider.
pub struct HttpGenerationClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
    image_b64: String,
    width: u32,
    height: u32,
    quality: &'a str,
    fidelity: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(flatten)]
    image: wire::ImageFields,
    #[serde(default)]
    flagged: bool,
    #[serde(default)]
    categories: Vec<String>,
    message: Option<String>,
}

impl HttpGenerationClient {
    /// Create a client for the provider at `base_url`.
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`] (useful
    /// for connection pooling across services).
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, ProviderError> {
        let body = GenerateBody {
            prompt: &request.prompt,
            image_b64: wire::encode_image(&request.image),
            width: request.size.width,
            height: request.size.height,
            quality: request.quality.as_str(),
            fidelity: request.fidelity,
        };

        let mut builder = self
            .client
            .post(format!("{}/v1/generations", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(wire::transport_err)?;
        if !response.status().is_success() {
            return Err(wire::status_err(response).await);
        }

        let parsed: GenerateResponse = response.json().await.map_err(wire::transport_err)?;
        let flags = ProviderFlags {
            flagged: parsed.flagged,
            categories: parsed.categories,
            message: parsed.message,
        };
        Ok(GenerationOutput {
            image: parsed.image.into_payload()?,
            flags,
        })
    }

    /// Fetch URL results with the same pooled client.
    async fn resolve_image(&self, payload: &ImagePayload) -> Result<Vec<u8>, ProviderError> {
        match payload {
            ImagePayload::Bytes(bytes) => Ok(bytes.clone()),
            ImagePayload::Url(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(wire::transport_err)?;
                if !response.status().is_success() {
                    return Err(wire::status_err(response).await);
                }
                let bytes = response.bytes().await.map_err(wire::transport_err)?;
                Ok(bytes.to_vec())
            }
        }
    }
}
