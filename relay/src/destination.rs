//! Outbound calls to the destination webhooks.
//!
//! One POST per request, no retries. The destination's status and raw body text are handed back
//! as-is; deciding what a non-success status means for the caller is the handler's job.

use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use tokio_util::io::ReaderStream;
use url::Url;

use crate::config::DestinationsConfig;
use crate::records::OutboundRecord;
use crate::types::RecordType;
use crate::upload::{FALLBACK_CONTENT_TYPE, TempUpload};

/// Raw outcome of a destination call.
#[derive(Debug, Clone)]
pub struct DestinationReply {
    pub status: StatusCode,
    pub body: String,
}

impl DestinationReply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Form fields forwarded alongside the file in the direct flow.
#[derive(Debug, Clone, Default)]
pub struct ForwardedFields<'a> {
    pub upload_type: Option<&'a str>,
    pub client_name: Option<&'a str>,
    pub payment_by: Option<&'a str>,
}

/// Client for the destination webhooks.
///
/// Webhook URLs are bearer secrets. Transport errors are returned without the request URL and
/// logs only carry the host.
#[derive(Clone)]
pub struct DestinationClient {
    client: Client,
    config: DestinationsConfig,
}

impl DestinationClient {
    pub fn new(config: &DestinationsConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn url_for(&self, record_type: RecordType) -> Option<&Url> {
        self.config.url_for(record_type)
    }

    /// Forward the staged file and form fields as multipart form data.
    ///
    /// The file is streamed from disk rather than buffered.
    pub async fn forward_multipart(&self, url: &Url, fields: &ForwardedFields<'_>, file: &TempUpload) -> anyhow::Result<DestinationReply> {
        let stream = ReaderStream::new(file.open().await?);
        let part = Part::stream_with_length(Body::wrap_stream(stream), file.size)
            .file_name(file.filename.clone())
            .mime_str(&file.mime_type_or(FALLBACK_CONTENT_TYPE))?;

        let mut form = Form::new();
        if let Some(upload_type) = fields.upload_type {
            form = form.text("uploadType", upload_type.to_string());
        }
        form = form.text("clientName", fields.client_name.unwrap_or_default().to_string());
        if let Some(payment_by) = fields.payment_by.filter(|p| !p.is_empty()) {
            form = form.text("paymentBy", payment_by.to_string());
        }
        let form = form.part("file", part);

        tracing::info!(
            host = url.host_str().unwrap_or_default(),
            filename = %file.filename,
            size = file.size,
            "Forwarding upload to destination"
        );

        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        Self::read_reply(response).await
    }

    /// Forward a normalized record as JSON.
    pub async fn forward_record(&self, url: &Url, record: &OutboundRecord) -> anyhow::Result<DestinationReply> {
        tracing::info!(
            host = url.host_str().unwrap_or_default(),
            record_type = %record.record_type(),
            "Forwarding extracted record to destination"
        );

        let response = self
            .client
            .post(url.clone())
            .json(record)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        Self::read_reply(response).await
    }

    async fn read_reply(response: reqwest::Response) -> anyhow::Result<DestinationReply> {
        let status = response.status();
        let body = response.text().await.map_err(reqwest::Error::without_url)?;
        tracing::debug!(status = %status, body_length = body.len(), "Destination responded");
        Ok(DestinationReply { status, body })
    }
}
