//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Response bodies
//!
//! # Routes
//!
//! - `POST /api/upload` (+ `OPTIONS` pre-flight): upload relay
//! - `GET /healthz`: liveness
//! - `GET /api-docs/openapi.json`: OpenAPI document

pub mod handlers;
pub mod models;
