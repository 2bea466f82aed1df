//! REST client for the face restoration/enhancement service.
//!
//! Both calls are best-effort from the pipeline's point of view; the
//! worker wraps them in its fail-open combinator. The client still
//! reports precise errors so the skip reason lands in the logs.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use restyle_core::contracts::{FaceRestoreProvider, ProviderError};

use crate::wire;

/// Fixed timeout for face service calls.
const FACE_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for the face service.
pub struct HttpFaceRestoreClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct RestoreBody {
    source_b64: String,
    target_b64: String,
}

#[derive(Debug, Serialize)]
struct EnhanceBody {
    image_b64: String,
}

#[derive(Debug, Deserialize)]
struct FaceResponse {
    #[serde(flatten)]
    image: wire::ImageFields,
}

impl HttpFaceRestoreClient {
    /// Create a client for the face service at `base_url`.
    ///
    /// The timeout is baked into the client because face calls carry a
    /// fixed bound and are never retried.
    pub fn new(base_url: String) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(FACE_CALL_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    async fn post_for_bytes<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(wire::transport_err)?;
        if !response.status().is_success() {
            return Err(wire::status_err(response).await);
        }

        let parsed: FaceResponse = response.json().await.map_err(wire::transport_err)?;
        match parsed.image.into_payload()? {
            restyle_core::contracts::ImagePayload::Bytes(bytes) => Ok(bytes),
            restyle_core::contracts::ImagePayload::Url(url) => {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(wire::transport_err)?;
                if !response.status().is_success() {
                    return Err(wire::status_err(response).await);
                }
                Ok(response
                    .bytes()
                    .await
                    .map_err(wire::transport_err)?
                    .to_vec())
            }
        }
    }
}

#[async_trait]
impl FaceRestoreProvider for HttpFaceRestoreClient {
    async fn restore(&self, source: &[u8], target: &[u8]) -> Result<Vec<u8>, ProviderError> {
        let body = RestoreBody {
            source_b64: wire::encode_image(source),
            target_b64: wire::encode_image(target),
        };
        self.post_for_bytes("/v1/face/restore", &body).await
    }

    async fn enhance(&self, image: &[u8]) -> Result<Vec<u8>, ProviderError> {
        let body = EnhanceBody {
            image_b64: wire::encode_image(image),
        };
        self.post_for_bytes("/v1/face/enhance", &body).await
    }
}
