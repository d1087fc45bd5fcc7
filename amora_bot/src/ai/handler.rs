//! Generation backend client. One OpenRouter-style chat-completion call per
//! served message, with the model parameters fixed by the character's tier.

use std::time::Duration;

use log::{debug, error, warn};
use reqwest::Client;
use thiserror::Error;

use super::dto::ChatCompletion;
use super::models::ModelTier;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed generation failures, recovered locally: the user sees an apology,
/// no history is written, no free-message slot is consumed.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("generation backend unavailable: {0}")]
    Unavailable(String),
    #[error("generation backend timed out")]
    Timeout,
    #[error("generation backend returned a malformed response")]
    BadResponse,
}

#[derive(Clone)]
pub struct AI {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AI {
    pub fn new(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            api_key,
            base_url,
        }
    }

    pub async fn generate_reply(
        &self,
        prompt: &str,
        tier: ModelTier,
    ) -> Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!("🌐 Generation request to {} (tier {})", url, tier.label());

        let body = serde_json::json!({
            "model": tier.model(),
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": tier.max_tokens(),
            "temperature": tier.temperature(),
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout
                } else {
                    BackendError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable error body".to_string());
            error!("❌ Generation backend returned {}: {}", status, detail);
            return Err(BackendError::Unavailable(format!("status {}", status)));
        }

        let completion: ChatCompletion = response.json().await.map_err(|e| {
            warn!("⚠️ Malformed generation response: {}", e);
            BackendError::BadResponse
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(BackendError::BadResponse)
    }
}
