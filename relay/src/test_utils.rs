//! Shared helpers for unit and end-to-end tests.

use std::path::Path;
use std::time::Duration;

use axum_test::TestServer;
use tokio::io::AsyncWriteExt;
use wiremock::MockServer;

use crate::config::{Config, DestinationsConfig, ExtractionConfig, RelayMode};
use crate::upload::TempUpload;

/// Config pointing both destinations and the extraction provider at `server`, staging uploads
/// in `staging_dir`.
pub fn create_test_config(server: &MockServer, staging_dir: &Path, mode: RelayMode) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        mode,
        destinations: DestinationsConfig {
            statement: Some(format!("{}/hooks/statement", server.uri()).parse().unwrap()),
            transaction: Some(format!("{}/hooks/transaction", server.uri()).parse().unwrap()),
            timeout: Duration::from_secs(5),
        },
        extraction: ExtractionConfig {
            url: format!("{}/v1/chat/completions", server.uri()).parse().unwrap(),
            api_key: Some("sk-test".to_string()),
            timeout: Duration::from_secs(5),
            ..Default::default()
        },
        temp_dir: Some(staging_dir.to_path_buf()),
        ..Default::default()
    }
}

pub fn create_test_app(config: Config) -> TestServer {
    crate::install_crypto_provider();
    crate::Application::new(config)
        .expect("Failed to create application")
        .into_test_server()
}

/// Write `bytes` to a staging file the way an upload would be staged.
pub async fn stage_file(staging_dir: &Path, filename: &str, content_type: Option<&str>, bytes: &[u8]) -> TempUpload {
    let mut staged = TempUpload::create(staging_dir, filename.to_string(), content_type.map(str::to_string)).unwrap();
    let mut writer = staged.writer().unwrap();
    writer.write_all(bytes).await.unwrap();
    writer.flush().await.unwrap();
    staged.size = bytes.len() as u64;
    staged
}

/// Number of entries left in a staging directory.
pub fn staged_files(staging_dir: &Path) -> usize {
    std::fs::read_dir(staging_dir).unwrap().count()
}

/// A chat-completions response whose first choice says `content`.
pub fn chat_completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}
