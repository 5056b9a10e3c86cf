//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `RELAY_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `RELAY_` override YAML values
//! 3. **OPENAI_API_KEY** - Special case: overrides `extraction.api_key` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `RELAY_DESTINATIONS__STATEMENT=https://hook.example.com/abc` sets `destinations.statement`.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! RELAY_PORT=8080
//!
//! # Switch to the extraction flow
//! RELAY_MODE=extract
//! OPENAI_API_KEY=sk-...
//!
//! # Destination webhooks
//! RELAY_DESTINATIONS__STATEMENT=https://hook.us2.make.com/statement
//! RELAY_DESTINATIONS__TRANSACTION=https://hook.us2.make.com/transaction
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;
use crate::types::RecordType;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "RELAY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults so a partial YAML file (or none at all) is enough, as long as the
/// destination webhooks are provided somewhere.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Which relay flow the upload endpoint runs
    pub mode: RelayMode,
    /// Destination webhooks, one per record type
    pub destinations: DestinationsConfig,
    /// Extraction provider settings (only used in `extract` mode)
    pub extraction: ExtractionConfig,
    /// Upload bounds
    pub limits: LimitsConfig,
    /// Directory uploads are staged in while a request is in flight.
    /// Defaults to the OS temp directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    /// Cross-origin settings applied to every response
    pub cors: CorsConfig,
    /// Console log format
    pub log_format: LogFormat,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Which version of the upload flow to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Forward the raw file as multipart form data.
    #[default]
    Direct,
    /// Extract fields with a vision model and forward normalized JSON.
    Extract,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Destination webhook endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DestinationsConfig {
    /// Webhook receiving statement records
    pub statement: Option<Url>,
    /// Webhook receiving transaction records (and every unrecognized upload type)
    pub transaction: Option<Url>,
    /// Timeout for a single destination call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl DestinationsConfig {
    pub fn url_for(&self, record_type: RecordType) -> Option<&Url> {
        match record_type {
            RecordType::Statement => self.statement.as_ref(),
            RecordType::Transaction => self.transaction.as_ref(),
        }
    }
}

impl Default for DestinationsConfig {
    fn default() -> Self {
        Self {
            statement: None,
            transaction: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Vision model used by the extraction flow.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Chat-completions endpoint
    pub url: Url,
    /// Model name sent with every request
    pub model: String,
    /// Bearer token; usually supplied through `OPENAI_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Upper bound on the reply length
    pub max_tokens: u32,
    /// Timeout for a single extraction call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl std::fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("url", &self.url.as_str())
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("https://api.openai.com/v1/chat/completions").expect("static URL is valid"),
            model: "gpt-4o".to_string(),
            api_key: None,
            max_tokens: 1000,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest accepted file, in bytes
    pub max_upload_bytes: u64,
    /// Accepted file content types. Empty means any type is accepted.
    /// Entries may end in `/*` to match a whole family (e.g. `image/*`).
    pub allowed_mime_types: Vec<String>,
}

impl LimitsConfig {
    pub fn allows_mime_type(&self, mime_type: &str) -> bool {
        if self.allowed_mime_types.is_empty() {
            return true;
        }
        let mime_type = mime_type.to_ascii_lowercase();
        self.allowed_mime_types.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            match allowed.strip_suffix("/*") {
                Some(family) => mime_type.split('/').next() == Some(family),
                None => allowed == mime_type,
            }
        })
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 20 * 1024 * 1024,
            allowed_mime_types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Value of `Access-Control-Allow-Origin`
    pub allow_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            mode: RelayMode::default(),
            destinations: DestinationsConfig::default(),
            extraction: ExtractionConfig::default(),
            limits: LimitsConfig::default(),
            temp_dir: None,
            cors: CorsConfig::default(),
            log_format: LogFormat::default(),
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        for record_type in [RecordType::Statement, RecordType::Transaction] {
            if self.destinations.url_for(record_type).is_none() {
                return Err(Error::Internal {
                    operation: format!(
                        "Config validation: no {record_type} destination configured. \
                         Set RELAY_DESTINATIONS__{} or add destinations.{record_type} to the config file.",
                        record_type.as_str().to_uppercase()
                    ),
                });
            }
        }

        if self.limits.max_upload_bytes == 0 {
            return Err(Error::Internal {
                operation: "Config validation: limits.max_upload_bytes must be greater than zero".to_string(),
            });
        }

        if self.destinations.timeout.is_zero() || self.extraction.timeout.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: destination and extraction timeouts must be non-zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("RELAY_").ignore(&["config"]).split("__"))
            // The provider key is conventionally exported without our prefix
            .merge(Env::raw().only(&["OPENAI_API_KEY"]).map(|_| "extraction.api_key".into()))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Directory uploads are staged in.
    pub fn staging_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
