//! HTTP request handlers.
//!
//! - [`upload`]: the upload relay endpoint, its pre-flight and method gate
//! - [`health`]: liveness probe

pub mod health;
pub mod upload;
