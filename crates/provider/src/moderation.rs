//! REST client for the content moderation gate.
//!
//! The classifier itself is external; this client only carries its
//! boolean-plus-reason contract. Provider-flag checks are pure and come
//! from the trait's provided method.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use restyle_core::contracts::{ModerationError, ModerationGate, Verdict};

/// Timeout for moderation calls; the gate sits on the critical path of
/// every prompted job.
const MODERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the moderation service.
pub struct HttpModerationGate {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct CheckTextBody<'a> {
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct CheckTextResponse {
    allowed: bool,
    reason: Option<String>,
}

impl HttpModerationGate {
    pub fn new(base_url: String) -> Result<Self, ModerationError> {
        let client = reqwest::Client::builder()
            .timeout(MODERATION_TIMEOUT)
            .build()
            .map_err(|e| ModerationError(e.to_string()))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl ModerationGate for HttpModerationGate {
    async fn check_text(&self, text: &str) -> Result<Verdict, ModerationError> {
        let response = self
            .client
            .post(format!("{}/v1/moderations", self.base_url))
            .json(&CheckTextBody { input: text })
            .send()
            .await
            .map_err(|e| ModerationError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModerationError(format!(
                "moderation service returned {status}: {body}"
            )));
        }

        let parsed: CheckTextResponse = response
            .json()
            .await
            .map_err(|e| ModerationError(e.to_string()))?;

        Ok(Verdict {
            allowed: parsed.allowed,
            reason: parsed.reason,
        })
    }
}
