//! # relay: upload relay for statements and transactions
//!
//! `relay` accepts a file upload from a browser form, decides from the `uploadType` field whether
//! it is a bank statement or a transaction receipt, and hands it on to the matching destination
//! webhook. It runs in one of two modes:
//!
//! - **direct**: the file and the form fields are forwarded as multipart form data, unchanged.
//! - **extract**: the image is sent to a vision-capable chat completions model, the fields it
//!   reads off the document are normalized into a statement or transaction record, and that
//!   record is forwarded as JSON.
//!
//! Either way the caller gets the destination's answer back: its body on success, its status and
//! body on rejection.
//!
//! ## Request Flow
//!
//! The multipart body is streamed into a staging file under the configured temp directory. The
//! staging file lives exactly as long as the request; it is removed before the response is
//! written, and removal failures are only logged. See [`upload`] and
//! [`api::handlers::upload`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use relay::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     relay::install_crypto_provider();
//!
//!     let args = relay::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     relay::telemetry::init_telemetry(&config)?;
//!
//!     let app = Application::new(config)?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod config;
pub mod destination;
pub mod errors;
pub mod extraction;
mod openapi;
pub mod records;
pub mod telemetry;
pub mod types;
pub mod upload;

#[cfg(test)]
mod test;
#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, header},
    routing::{get, post},
};
use bon::Builder;
use tokio::net::TcpListener;
use tower_http::{
    set_header::SetResponseHeaderLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};
use utoipa::OpenApi;

pub use config::Config;

use crate::{
    api::handlers::{self, health},
    destination::DestinationClient,
    extraction::ExtractionProvider,
    openapi::ApiDoc,
};

/// Room left for field headers and boundaries on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Install the process-wide rustls crypto provider.
///
/// reqwest is built without a bundled provider, so this must run before the first client is
/// constructed. Calling it more than once is harmless.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .destinations(destinations)
///     .extractor(extractor)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub destinations: DestinationClient,
    pub extractor: Arc<dyn ExtractionProvider>,
}

impl AppState {
    /// Build the outbound clients described by `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let destinations = DestinationClient::new(&config.destinations)?;
        let extractor: Arc<dyn ExtractionProvider> = Arc::from(extraction::create_provider(&config.extraction)?);

        Ok(Self::builder().config(config).destinations(destinations).extractor(extractor).build())
    }
}

fn header_value(value: &str, name: &HeaderName) -> anyhow::Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| anyhow::anyhow!("Invalid value {value:?} for {name}: {e}"))
}

/// Every response, errors and pre-flights included, carries the same three CORS headers.
fn cors_headers(config: &Config) -> anyhow::Result<[(HeaderName, HeaderValue); 3]> {
    Ok([
        (
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            header_value(&config.cors.allow_origin, &header::ACCESS_CONTROL_ALLOW_ORIGIN)?,
        ),
        (header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST, OPTIONS")),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type")),
    ])
}

/// Build the application router.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let body_limit = usize::try_from(state.config.limits.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let cors = cors_headers(&state.config)?;

    let upload_routes = Router::new()
        .route(
            "/api/upload",
            post(handlers::upload::relay_upload)
                .options(handlers::upload::preflight)
                .fallback(handlers::upload::method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(body_limit));

    let mut router = Router::new()
        .merge(upload_routes)
        .route("/healthz", get(health::healthz))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state);

    for (name, value) in cors {
        router = router.layer(SetResponseHeaderLayer::overriding(name, value));
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns the router and configuration.
///
/// 1. **Create**: [`Application::new`] builds the outbound clients and the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: when the shutdown signal fires, in-flight requests finish and telemetry is flushed
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all outbound clients initialized
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting relay with configuration: {:#?}", config);
        install_crypto_provider();

        std::fs::create_dir_all(config.staging_dir())?;
        let state = AppState::from_config(config)?;
        Self::from_state(state)
    }

    /// Create an application around prepared state, e.g. with a substituted extraction provider.
    pub fn from_state(state: AppState) -> anyhow::Result<Self> {
        let config = state.config.clone();
        if config.extraction.api_key.is_none() && config.mode == config::RelayMode::Extract {
            tracing::warn!("No extraction API key configured; extract-mode uploads will fail");
        }
        let router = build_router(state)?;
        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            mode = ?self.config.mode,
            "Relay listening on http://{}, available at http://localhost:{}",
            bind_addr,
            self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
