// src/pdf/ocr.rs
use base64::Engine;

use crate::utils::error::PdfError;

pub const MISTRAL_OCR_MODEL: &str = "mistral-ocr-latest";

/// Client for the Mistral OCR endpoint, used for scanned PDFs without a text layer.
pub struct MistralOcr {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl MistralOcr {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: MISTRAL_OCR_MODEL.to_string(),
            base_url: crate::llm::backend::MISTRAL_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sends the PDF as a base64 data URL and joins the per-page markdown.
    pub async fn recognize(&self, bytes: &[u8], file_name: &str) -> Result<String, PdfError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let body = serde_json::json!({
            "model": &self.model,
            "document": {
                "type": "document_url",
                "document_url": format!("data:application/pdf;base64,{}", encoded),
                "document_name": file_name,
            },
        });

        tracing::info!("Running OCR for {} ({} bytes)", file_name, bytes.len());
        let url = format!("{}/v1/ocr", self.base_url.trim_end_matches('/'));
        let resp = self.client.post(&url).bearer_auth(&self.api_key).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let details = resp.text().await.unwrap_or_default();
            return Err(PdfError::Ocr(format!("status {}: {}", status.as_u16(), details)));
        }

        let json: serde_json::Value = resp.json().await?;
        let pages = json["pages"]
            .as_array()
            .ok_or_else(|| PdfError::Ocr("response has no pages".into()))?;

        let text = pages
            .iter()
            .filter_map(|page| page["markdown"].as_str())
            .collect::<Vec<_>>()
            .join("\n");
        tracing::debug!("OCR returned {} pages, {} characters", pages.len(), text.len());

        Ok(text)
    }
}
