//! OpenAI-compatible chat-completions provider.
//!
//! Works against any endpoint that accepts the chat-completions request format with `image_url`
//! content parts carrying a `data:` URL.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use url::Url;

use super::{ExtractionError, ExtractionProvider, InlineImage, Result, reply};
use crate::config::ExtractionConfig;

pub struct OpenAiProvider {
    client: Client,
    url: Url,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(config: &ExtractionConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ExtractionProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str, image: &InlineImage) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or(ExtractionError::MissingCredentials)?;

        let payload = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": image.data_url() } }
                ]
            }],
            "max_tokens": self.max_tokens
        });

        tracing::info!(
            model = %self.model,
            mime_type = %image.mime_type,
            image_bytes_b64 = image.base64.len(),
            "Sending extraction request"
        );

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let body = response.text().await.map_err(reqwest::Error::without_url)?;

        if !status.is_success() {
            return Err(ExtractionError::ProviderApi {
                status: status.as_u16(),
                body,
            });
        }

        reply::decode_reply(&body)
    }
}
