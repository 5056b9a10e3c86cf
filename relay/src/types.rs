//! Upload discriminator types.
//!
//! The `uploadType` form field is free text on the wire, but the relay only knows two record
//! kinds. [`UploadType`] keeps what the client actually declared, while [`RecordType`] is the
//! closed set used for routing and payload shape.
//!
//! # Fallback
//!
//! Anything other than `statement` is routed as a transaction, including a missing field and
//! unrecognized values such as `"bogus"`. [`UploadType::Unrecognized`] keeps the declared value
//! so the fallback shows up in logs and the direct flow can still forward it verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// The record kind a request is routed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Statement,
    Transaction,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Statement => "statement",
            RecordType::Transaction => "transaction",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `uploadType` value as declared by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadType {
    /// `uploadType=statement`
    Statement,
    /// `uploadType=transaction`
    Transaction,
    /// Field absent or carrying any other value. Routed as a transaction.
    Unrecognized(Option<String>),
}

impl UploadType {
    /// Interpret the first submitted value of the `uploadType` field.
    pub fn from_field(value: Option<&str>) -> Self {
        match value {
            Some("statement") => UploadType::Statement,
            Some("transaction") => UploadType::Transaction,
            other => UploadType::Unrecognized(other.map(str::to_string)),
        }
    }

    pub fn record_type(&self) -> RecordType {
        match self {
            UploadType::Statement => RecordType::Statement,
            UploadType::Transaction | UploadType::Unrecognized(_) => RecordType::Transaction,
        }
    }

    /// The raw value as the client sent it, if any.
    pub fn as_submitted(&self) -> Option<&str> {
        match self {
            UploadType::Statement => Some("statement"),
            UploadType::Transaction => Some("transaction"),
            UploadType::Unrecognized(value) => value.as_deref(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, UploadType::Unrecognized(_))
    }
}
