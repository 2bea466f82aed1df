//! Shared wire-format helpers for the HTTP clients.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use restyle_core::contracts::{ImagePayload, ProviderError};

/// Image fields every image-bearing response may carry: exactly one of
/// inline base64 bytes or a fetchable URL.
#[derive(Debug, Deserialize)]
pub(crate) struct ImageFields {
    pub image_b64: Option<String>,
    pub image_url: Option<String>,
}

impl ImageFields {
    /// Normalize to an [`ImagePayload`], decoding inline base64.
    pub(crate) fn into_payload(self) -> Result<ImagePayload, ProviderError> {
        match (self.image_b64, self.image_url) {
            (Some(b64), _) => {
                let bytes = BASE64
                    .decode(b64.as_bytes())
                    .map_err(|e| ProviderError::Malformed(format!("invalid base64 image: {e}")))?;
                Ok(ImagePayload::Bytes(bytes))
            }
            (None, Some(url)) => Ok(ImagePayload::Url(url)),
            (None, None) => Err(ProviderError::Malformed(
                "response carried neither image bytes nor an image URL".into(),
            )),
        }
    }
}

/// Encode raw bytes for an inline request field.
pub(crate) fn encode_image(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Map a transport-level [`reqwest::Error`] onto the provider taxonomy.
pub(crate) fn transport_err(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else if e.is_decode() {
        ProviderError::Malformed(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Turn a non-2xx response into [`ProviderError::Status`], preserving the
/// body text for diagnostics.
pub(crate) async fn status_err(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    ProviderError::Status { status, message }
}
