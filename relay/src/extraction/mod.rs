//! Field extraction through a vision/language model.
//!
//! The extraction flow sends the uploaded image together with a schema-specific prompt to a
//! chat-completions style provider, takes the text of the first reply, strips any markdown code
//! fence and parses what is left as a JSON object.
//!
//! ```text
//! TempUpload ──read──▶ base64 ──▶ ExtractionProvider::complete(prompt, image)
//!                                            │
//!                                            ▼
//!                        reply::decode_reply  (first choice → message text)
//!                                            │
//!                                            ▼
//!                        reply::parse_extraction  (strip ```json fence → JSON object)
//! ```
//!
//! Providers only deal with transport and response shape. Prompt construction and reply parsing
//! are pure and shared.

use async_trait::async_trait;

use crate::config::ExtractionConfig;
use crate::records::ExtractionResult;
use crate::types::RecordType;

pub mod openai;
pub mod prompt;
pub mod reply;

/// Errors that can occur while extracting fields from an upload
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Extraction provider API key is not configured")]
    MissingCredentials,

    #[error("Extraction request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Extraction provider error ({status}): {body}")]
    ProviderApi { status: u16, body: String },

    #[error("Unexpected extraction provider response shape: {0}")]
    UnexpectedShape(String),

    #[error("Failed to parse extracted data: {source}. Raw response: {raw}")]
    InvalidJson {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Image handed to the provider, already base64 encoded.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub base64: String,
}

impl InlineImage {
    pub fn encode(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        use base64::{Engine, engine::general_purpose::STANDARD};
        Self {
            mime_type: mime_type.into(),
            base64: STANDARD.encode(bytes),
        }
    }

    /// `data:` URL form used by chat-completions image parts
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// A vision model that answers a text prompt about one image.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Send the prompt and image, returning the text of the model's reply.
    async fn complete(&self, prompt: &str, image: &InlineImage) -> Result<String>;
}

/// Run the full extraction for one record type.
pub async fn extract(provider: &dyn ExtractionProvider, record_type: RecordType, image: &InlineImage) -> Result<ExtractionResult> {
    let prompt = prompt::for_record_type(record_type);
    let reply = provider.complete(prompt, image).await?;
    tracing::debug!(record_type = %record_type, reply_length = reply.len(), "Received extraction reply");
    reply::parse_extraction(&reply)
}

/// Create the extraction provider from configuration
pub fn create_provider(config: &ExtractionConfig) -> anyhow::Result<Box<dyn ExtractionProvider>> {
    Ok(Box::new(openai::OpenAiProvider::new(config)?))
}
