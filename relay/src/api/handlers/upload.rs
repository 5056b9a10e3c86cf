//! The upload relay endpoint.
//!
//! ```text
//! POST /api/upload
//!   ├─ UploadForm::from_multipart()       // stage file, first value wins
//!   ├─ no file?            → 400, no outbound call
//!   ├─ UploadType → RecordType → destination URL
//!   ├─ mode = direct:  forward_multipart(fields + file stream)
//!   │  mode = extract: read → base64 → extraction::extract() → OutboundRecord → forward_record()
//!   ├─ TempUpload::release()               // exactly once, whatever happened above
//!   └─ destination 2xx → 200 body, otherwise destination status + details
//! ```

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use url::Url;

use crate::AppState;
use crate::api::models::upload::{DestinationErrorBody, DirectRelayResponse, ErrorBody, ExtractRelayResponse, FailureBody};
use crate::config::RelayMode;
use crate::destination::ForwardedFields;
use crate::errors::{Error, Result};
use crate::extraction::{self, InlineImage};
use crate::records::{OutboundRecord, Submission};
use crate::types::{RecordType, UploadType};
use crate::upload::{TempUpload, UploadForm};

/// MIME type assumed for images the client did not label.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "upload",
    summary = "Relay an upload",
    description = "Accepts a statement or transaction upload and forwards it to the destination webhook \
                   selected by `uploadType`. Anything other than `statement` is routed as a transaction.",
    request_body(
        content_type = "multipart/form-data",
        description = "Fields `uploadType`, `clientName`, optional `paymentBy`, and the file under `file`"
    ),
    responses(
        (status = 200, description = "Forwarded. Direct mode answers with this body, extract mode with `ExtractRelayResponse`", body = DirectRelayResponse),
        (status = 400, description = "No file uploaded", body = ErrorBody),
        (status = 405, description = "Method not allowed", body = ErrorBody),
        (status = 413, description = "File too large", body = FailureBody),
        (status = 500, description = "Parse, extraction or network failure", body = FailureBody),
        (status = "default", description = "Destination rejected the record; its status is passed through", body = DestinationErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn relay_upload(State(state): State<AppState>, multipart: std::result::Result<Multipart, MultipartRejection>) -> Result<Response> {
    let mut multipart = multipart.map_err(|e| Error::Multipart {
        message: format!("Failed to parse multipart data: {}", e.body_text()),
    })?;

    let UploadForm {
        upload_type,
        client_name,
        payment_by,
        file,
    } = UploadForm::from_multipart(&mut multipart, &state.config.staging_dir(), &state.config.limits).await?;

    let Some(file) = file else {
        return Err(Error::NoFile);
    };

    let record_type = upload_type.record_type();
    if upload_type.is_fallback() {
        tracing::info!(
            declared = ?upload_type.as_submitted(),
            "Unrecognized upload type, routing as transaction"
        );
    }

    let url = state.destinations.url_for(record_type).cloned().ok_or_else(|| Error::Internal {
        operation: format!("resolve {record_type} destination"),
    })?;

    tracing::info!(
        record_type = %record_type,
        filename = %file.filename,
        size = file.size,
        mode = ?state.config.mode,
        "Relaying upload"
    );

    let submission = Submission {
        client_name: client_name.as_deref(),
        payment_by: payment_by.as_deref(),
    };

    match state.config.mode {
        RelayMode::Direct => relay_direct(&state, &url, &upload_type, &submission, file).await,
        RelayMode::Extract => relay_extracted(&state, &url, record_type, &submission, file).await,
    }
}

async fn relay_direct(state: &AppState, url: &Url, upload_type: &UploadType, submission: &Submission<'_>, file: TempUpload) -> Result<Response> {
    let fields = ForwardedFields {
        upload_type: upload_type.as_submitted(),
        client_name: submission.client_name,
        payment_by: submission.payment_by,
    };

    let outcome = state.destinations.forward_multipart(url, &fields, &file).await;
    file.release();
    let reply = outcome?;

    if !reply.is_success() {
        return Err(Error::DestinationRejected {
            status: reply.status,
            body: reply.body,
        });
    }

    Ok((
        StatusCode::OK,
        Json(DirectRelayResponse {
            success: true,
            message: "File uploaded successfully".to_string(),
            webhook_response: reply.body,
        }),
    )
        .into_response())
}

async fn relay_extracted(
    state: &AppState,
    url: &Url,
    record_type: RecordType,
    submission: &Submission<'_>,
    file: TempUpload,
) -> Result<Response> {
    let outcome = async {
        let bytes = file.read().await.map_err(|e| Error::Internal {
            operation: format!("read staged upload: {e}"),
        })?;
        let image = InlineImage::encode(&bytes, file.mime_type_or(DEFAULT_IMAGE_MIME));

        let extracted = extraction::extract(state.extractor.as_ref(), record_type, &image).await?;
        tracing::info!(record_type = %record_type, fields = extracted.fields().len(), "Extracted fields from upload");

        let record = OutboundRecord::from_extraction(record_type, &extracted, submission);
        let reply = state.destinations.forward_record(url, &record).await?;
        Ok::<_, Error>((extracted, reply))
    }
    .await;
    file.release();
    let (extracted, reply) = outcome?;

    if !reply.is_success() {
        return Err(Error::DestinationRejected {
            status: reply.status,
            body: reply.body,
        });
    }

    Ok((
        StatusCode::OK,
        Json(ExtractRelayResponse {
            success: true,
            message: "Data extracted and sent successfully".to_string(),
            extracted_data: extracted.into_fields(),
            make_response: reply.body,
        }),
    )
        .into_response())
}

/// Cross-origin pre-flight. The CORS headers themselves are added router-wide.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Any method other than POST or OPTIONS.
pub async fn method_not_allowed() -> Error {
    Error::MethodNotAllowed
}
