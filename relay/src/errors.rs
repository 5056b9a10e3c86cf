use crate::api::models::upload::{DestinationErrorBody, ErrorBody, FailureBody};
use crate::extraction::ExtractionError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Anything other than POST or OPTIONS on the upload endpoint
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Multipart body carried no (non-empty) `file` field
    #[error("No file uploaded")]
    NoFile,

    /// Upload exceeded the configured size bound
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// Upload content type is not on the configured allow-list
    #[error("Unsupported file type: {mime_type}")]
    UnsupportedMediaType { mime_type: String },

    /// Malformed multipart body or unreadable field
    #[error("{message}")]
    Multipart { message: String },

    /// The extraction provider failed or returned something unusable
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The destination webhook answered with a non-success status
    #[error("Webhook request failed with status {status}")]
    DestinationRejected { status: StatusCode, body: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::NoFile => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            // Malformed bodies count as a generic upload failure, like any other parse crash
            Error::Multipart { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Extraction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::DestinationRejected { status, .. } => *status,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `message` field of a generic failure body.
    ///
    /// Extraction errors keep the provider's raw text (or the unparseable reply) so the caller
    /// can see what the model actually said. Credentials never reach this string.
    pub fn user_message(&self) -> String {
        match self {
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Other(e) => format!("{e:#}"),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Extraction(_) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Upload failed: {:#}", self);
            }
            Error::DestinationRejected { status, body } => {
                tracing::warn!(status = %status, details = %body, "Destination webhook rejected the record");
            }
            Error::Multipart { .. } => {
                tracing::warn!("Failed to parse upload: {}", self);
            }
            Error::MethodNotAllowed | Error::NoFile | Error::PayloadTooLarge { .. } | Error::UnsupportedMediaType { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        match self {
            Error::MethodNotAllowed | Error::NoFile => (status, Json(ErrorBody::new(self.to_string()))).into_response(),
            Error::DestinationRejected { body, .. } => (
                status,
                Json(DestinationErrorBody {
                    error: "Webhook request failed".to_string(),
                    details: body,
                }),
            )
                .into_response(),
            other => (
                status,
                Json(FailureBody {
                    error: "Upload failed".to_string(),
                    message: other.user_message(),
                }),
            )
                .into_response(),
        }
    }
}

/// Type alias for handler results
pub type Result<T> = std::result::Result<T, Error>;
