use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Success body of the direct relay flow
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectRelayResponse {
    pub success: bool,
    pub message: String,
    /// Destination response body, verbatim
    pub webhook_response: String,
}

/// Success body of the extraction flow
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRelayResponse {
    pub success: bool,
    pub message: String,
    /// Fields the model extracted, as parsed from its reply
    #[schema(value_type = Object)]
    pub extracted_data: serde_json::Map<String, serde_json::Value>,
    /// Destination response body, verbatim
    pub make_response: String,
}

/// Body for client errors (400, 405)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// Body returned with the destination's own status when it rejects a record
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DestinationErrorBody {
    pub error: String,
    /// Destination response body, verbatim
    pub details: String,
}

/// Body for every other failure
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FailureBody {
    pub error: String,
    pub message: String,
}
