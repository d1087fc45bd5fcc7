//! Thin client for the OCR sidecar that turns a payment screenshot into
//! text. External collaborator: bytes in, extracted text out.

use log::debug;
use reqwest::Client;
use serde::Deserialize;

use super::dto::AdjudicatorError;

#[derive(Deserialize)]
struct OcrResponse {
    text: String,
}

#[derive(Clone)]
pub struct OcrClient {
    client: Client,
    endpoint: Option<String>,
}

impl OcrClient {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    pub async fn extract_text(&self, image: &[u8]) -> Result<String, AdjudicatorError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or(AdjudicatorError::OcrUnavailable)?;
        debug!("🌐 OCR request ({} bytes) to {}", image.len(), endpoint);

        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| AdjudicatorError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AdjudicatorError::Provider(format!(
                "OCR sidecar returned {}",
                response.status()
            )));
        }
        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| AdjudicatorError::Provider(e.to_string()))?;
        Ok(body.text)
    }
}
