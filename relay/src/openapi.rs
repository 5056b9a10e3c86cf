//! OpenAPI document served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::api;
use crate::api::models::upload::{DestinationErrorBody, DirectRelayResponse, ErrorBody, ExtractRelayResponse, FailureBody};
use crate::types::RecordType;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "relay",
        description = "Relays statement and transaction uploads to destination webhooks, optionally extracting their fields with a vision model first."
    ),
    paths(api::handlers::upload::relay_upload, api::handlers::health::healthz),
    components(schemas(
        DirectRelayResponse,
        ExtractRelayResponse,
        ErrorBody,
        DestinationErrorBody,
        FailureBody,
        RecordType,
    )),
    tags(
        (name = "upload", description = "Upload relay"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;
