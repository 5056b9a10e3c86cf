//! Multipart upload parsing and staging.
//!
//! The incoming body is streamed field by field. Text fields are kept in memory; the `file` field
//! is written chunk by chunk into a staging file so large statements never sit in memory during
//! parsing. The staging file is owned by a [`TempUpload`] guard which removes it exactly once,
//! either through an explicit [`TempUpload::release`] or when the guard is dropped on an early
//! return. Removal failures are logged and never propagated.

use std::io;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::LimitsConfig;
use crate::errors::{Error, Result};
use crate::types::UploadType;

/// Content type used when neither the client nor the filename says anything.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Parsed upload request.
#[derive(Debug)]
pub struct UploadForm {
    pub upload_type: UploadType,
    pub client_name: Option<String>,
    pub payment_by: Option<String>,
    pub file: Option<TempUpload>,
}

impl UploadForm {
    /// Read every field of a multipart body.
    ///
    /// Repeated fields keep their first value; later values are read past and discarded. A `file`
    /// part only counts as the upload when it carries a `filename` parameter; a plain text field
    /// named `file` is skipped. An empty file part (what browsers send when nothing was picked)
    /// is dropped as if it were absent.
    pub async fn from_multipart(multipart: &mut Multipart, staging_dir: &Path, limits: &LimitsConfig) -> Result<Self> {
        let mut upload_type: Option<String> = None;
        let mut client_name: Option<String> = None;
        let mut payment_by: Option<String> = None;
        let mut file: Option<TempUpload> = None;

        while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
            let field_name = field.name().unwrap_or("").to_string();

            match field_name.as_str() {
                "uploadType" => read_first_text(&mut upload_type, field.text().await.map_err(multipart_error)?),
                "clientName" => read_first_text(&mut client_name, field.text().await.map_err(multipart_error)?),
                "paymentBy" => read_first_text(&mut payment_by, field.text().await.map_err(multipart_error)?),
                "file" if file.is_none() && field.file_name().is_some() => {
                    let filename = field
                        .file_name()
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("upload-{}", Uuid::new_v4()));
                    let content_type = field.content_type().filter(|ct| !ct.is_empty()).map(str::to_string);

                    let mut staged = TempUpload::create(staging_dir, filename, content_type)?;

                    let mime_type = staged.mime_type_or(FALLBACK_CONTENT_TYPE);
                    if !limits.allows_mime_type(&mime_type) {
                        return Err(Error::UnsupportedMediaType { mime_type });
                    }

                    let mut writer = staged.writer()?;
                    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                        staged.size += chunk.len() as u64;
                        if staged.size > limits.max_upload_bytes {
                            tracing::warn!(
                                filename = %staged.filename,
                                size = staged.size,
                                max_upload_bytes = limits.max_upload_bytes,
                                "Upload size limit exceeded, aborting"
                            );
                            return Err(too_large(limits.max_upload_bytes));
                        }
                        writer.write_all(&chunk).await.map_err(|e| Error::Internal {
                            operation: format!("stage upload: {e}"),
                        })?;
                    }
                    writer.flush().await.map_err(|e| Error::Internal {
                        operation: format!("stage upload: {e}"),
                    })?;

                    if staged.size == 0 {
                        tracing::debug!(filename = %staged.filename, "Ignoring empty file part");
                        continue;
                    }

                    tracing::debug!(
                        filename = %staged.filename,
                        content_type = ?staged.content_type,
                        size = staged.size,
                        "Staged uploaded file"
                    );
                    file = Some(staged);
                }
                _ => {
                    tracing::trace!(field = %field_name, "Skipping multipart field");
                }
            }
        }

        Ok(Self {
            upload_type: UploadType::from_field(upload_type.as_deref()),
            client_name,
            payment_by,
            file,
        })
    }
}

fn read_first_text(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn too_large(max_upload_bytes: u64) -> Error {
    Error::PayloadTooLarge {
        message: format!(
            "File size exceeds maximum allowed size of {} bytes ({} MB)",
            max_upload_bytes,
            max_upload_bytes / (1024 * 1024)
        ),
    }
}

fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return Error::PayloadTooLarge { message: e.body_text() };
    }
    Error::Multipart {
        message: format!("Failed to parse multipart data: {}", e.body_text()),
    }
}

/// An uploaded file staged on local disk for the duration of one request.
#[derive(Debug)]
pub struct TempUpload {
    file: Option<NamedTempFile>,
    path: PathBuf,
    /// Original filename, or a generated `upload-<uuid>` name
    pub filename: String,
    /// Content type declared on the multipart part
    pub content_type: Option<String>,
    pub size: u64,
}

impl TempUpload {
    pub(crate) fn create(staging_dir: &Path, filename: String, content_type: Option<String>) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(staging_dir)
            .map_err(|e| Error::Internal {
                operation: format!("create staging file in {}: {e}", staging_dir.display()),
            })?;
        let path = file.path().to_path_buf();

        Ok(Self {
            file: Some(file),
            path,
            filename,
            content_type,
            size: 0,
        })
    }

    pub(crate) fn writer(&self) -> Result<tokio::fs::File> {
        let std_file = self
            .file
            .as_ref()
            .map(|f| f.as_file().try_clone())
            .transpose()
            .map_err(|e| Error::Internal {
                operation: format!("open staging file: {e}"),
            })?
            .ok_or_else(|| Error::Internal {
                operation: "open released staging file".to_string(),
            })?;
        Ok(tokio::fs::File::from_std(std_file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Effective MIME type: the declared content type, else a guess from the filename, else
    /// `default`.
    pub fn mime_type_or(&self, default: &str) -> String {
        self.content_type
            .clone()
            .filter(|ct| ct != FALLBACK_CONTENT_TYPE)
            .or_else(|| mime_guess::from_path(&self.filename).first().map(|m| m.essence_str().to_string()))
            .unwrap_or_else(|| default.to_string())
    }

    pub async fn open(&self) -> io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path).await
    }

    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    /// Remove the staging file now rather than at drop.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        match file.close() {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed staged upload"),
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "Error deleting temp file"),
        }
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        self.remove();
    }
}
