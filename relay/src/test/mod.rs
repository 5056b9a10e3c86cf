//! End-to-end tests: the full router, real outbound clients, destinations and the extraction
//! provider mocked with wiremock.

use axum::http::{Method, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::RelayMode;
use crate::test_utils::{chat_completion, create_test_app, create_test_config, staged_files};

const RECEIPT: &[u8] = b"\x89PNG\r\n\x1a\nreceipt-image-bytes";

fn receipt_part() -> Part {
    Part::bytes(RECEIPT).file_name("receipt.png").mime_type("image/png")
}

async fn forbid_destinations(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/hooks/statement"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hooks/transaction"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

async fn forbid_extraction(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

fn assert_cors_headers(response: &axum_test::TestResponse) {
    assert_eq!(response.header("access-control-allow-origin").to_str().unwrap(), "*");
    assert_eq!(response.header("access-control-allow-methods").to_str().unwrap(), "POST, OPTIONS");
    assert_eq!(response.header("access-control-allow-headers").to_str().unwrap(), "Content-Type");
}

#[test_log::test(tokio::test)]
async fn test_other_methods_are_rejected() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    forbid_destinations(&mock).await;
    let app = create_test_app(create_test_config(&mock, staging.path(), RelayMode::Direct));

    for response in [
        app.get("/api/upload").await,
        app.put("/api/upload").await,
        app.delete("/api/upload").await,
    ] {
        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        response.assert_json(&json!({ "error": "Method not allowed" }));
        assert_cors_headers(&response);
    }
}

#[test_log::test(tokio::test)]
async fn test_preflight_answers_with_cors_headers() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    forbid_destinations(&mock).await;
    let app = create_test_app(create_test_config(&mock, staging.path(), RelayMode::Direct));

    let response = app.method(Method::OPTIONS, "/api/upload").await;

    response.assert_status_ok();
    assert!(response.text().is_empty());
    assert_cors_headers(&response);
}

#[test_log::test(tokio::test)]
async fn test_configured_origin_is_used() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&mock, staging.path(), RelayMode::Direct);
    config.cors.allow_origin = "https://forms.example.com".to_string();
    let app = create_test_app(config);

    let response = app.method(Method::OPTIONS, "/api/upload").await;

    assert_eq!(
        response.header("access-control-allow-origin").to_str().unwrap(),
        "https://forms.example.com"
    );
}

#[test_log::test(tokio::test)]
async fn test_missing_file_is_bad_request() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    forbid_destinations(&mock).await;
    forbid_extraction(&mock).await;

    for mode in [RelayMode::Direct, RelayMode::Extract] {
        let app = create_test_app(create_test_config(&mock, staging.path(), mode));
        let response = app
            .post("/api/upload")
            .multipart(MultipartForm::new().add_text("uploadType", "statement").add_text("clientName", "Acme"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "No file uploaded" }));
        assert_cors_headers(&response);
    }
    assert_eq!(staged_files(staging.path()), 0);
}

#[test_log::test(tokio::test)]
async fn test_text_field_named_file_is_bad_request() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    forbid_destinations(&mock).await;
    forbid_extraction(&mock).await;

    for mode in [RelayMode::Direct, RelayMode::Extract] {
        let app = create_test_app(create_test_config(&mock, staging.path(), mode));
        let response = app
            .post("/api/upload")
            .multipart(MultipartForm::new().add_text("uploadType", "statement").add_text("file", "not a file"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "No file uploaded" }));
    }
    assert!(mock.received_requests().await.unwrap().is_empty());
    assert_eq!(staged_files(staging.path()), 0);
}

#[test_log::test(tokio::test)]
async fn test_direct_statement_is_forwarded_to_statement_hook() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/hooks/statement"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Accepted"))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/hooks/transaction"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock)
        .await;
    let app = create_test_app(create_test_config(&mock, staging.path(), RelayMode::Direct));

    let response = app
        .post("/api/upload")
        .multipart(
            MultipartForm::new()
                .add_text("uploadType", "statement")
                .add_text("clientName", "Acme")
                .add_text("paymentBy", "Card")
                .add_part("file", receipt_part()),
        )
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({
        "success": true,
        "message": "File uploaded successfully",
        "webhookResponse": "Accepted"
    }));
    assert_cors_headers(&response);

    let received = &mock.received_requests().await.unwrap()[0];
    let body = String::from_utf8_lossy(&received.body);
    assert!(body.contains("name=\"uploadType\"\r\n\r\nstatement"));
    assert!(body.contains("name=\"clientName\"\r\n\r\nAcme"));
    assert!(body.contains("name=\"paymentBy\"\r\n\r\nCard"));
    assert!(body.contains("filename=\"receipt.png\""));
    assert!(body.contains("Content-Type: image/png"));
    assert!(body.contains("receipt-image-bytes"));

    assert_eq!(staged_files(staging.path()), 0);
}

#[test_log::test(tokio::test)]
async fn test_direct_unrecognized_type_goes_to_transaction_hook() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/hooks/transaction"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(2)
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/hooks/statement"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock)
        .await;
    let app = create_test_app(create_test_config(&mock, staging.path(), RelayMode::Direct));

    let declared = app
        .post("/api/upload")
        .multipart(MultipartForm::new().add_text("uploadType", "bogus").add_part("file", receipt_part()))
        .await;
    declared.assert_status_ok();

    let undeclared = app
        .post("/api/upload")
        .multipart(MultipartForm::new().add_part("file", receipt_part()))
        .await;
    undeclared.assert_status_ok();

    let received = mock.received_requests().await.unwrap();
    let first = String::from_utf8_lossy(&received[0].body);
    assert!(first.contains("name=\"uploadType\"\r\n\r\nbogus"));
    assert!(first.contains("name=\"clientName\"\r\n\r\n\r\n"));
    assert!(!first.contains("name=\"paymentBy\""));

    let second = String::from_utf8_lossy(&received[1].body);
    assert!(!second.contains("name=\"uploadType\""));
}

#[test_log::test(tokio::test)]
async fn test_direct_destination_rejection_passes_status_through() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/hooks/transaction"))
        .respond_with(ResponseTemplate::new(410).set_body_string("There is no scenario listening for this webhook."))
        .expect(1)
        .mount(&mock)
        .await;
    let app = create_test_app(create_test_config(&mock, staging.path(), RelayMode::Direct));

    let response = app
        .post("/api/upload")
        .multipart(MultipartForm::new().add_text("uploadType", "transaction").add_part("file", receipt_part()))
        .await;

    response.assert_status(StatusCode::GONE);
    response.assert_json(&json!({
        "error": "Webhook request failed",
        "details": "There is no scenario listening for this webhook."
    }));
    assert_cors_headers(&response);
    assert_eq!(staged_files(staging.path()), 0);
}

#[test_log::test(tokio::test)]
async fn test_direct_unreachable_destination_is_generic_failure() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&mock, staging.path(), RelayMode::Direct);
    config.destinations.transaction = Some("http://127.0.0.1:1/secret-hook-token".parse().unwrap());
    let app = create_test_app(config);

    let response = app
        .post("/api/upload")
        .multipart(MultipartForm::new().add_part("file", receipt_part()))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Upload failed");
    assert!(body["message"].is_string());
    assert!(!response.text().contains("secret-hook-token"));
    assert_eq!(staged_files(staging.path()), 0);
}

#[test_log::test(tokio::test)]
async fn test_extract_statement_forwards_normalized_record() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    let reply = "```json\n{\"clientName\": \"\", \"bank\": \"Maybank\", \"currency\": null, \"dueAmount\": 1234.5}\n```";
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-4o", "max_tokens": 1000 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(reply)))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/hooks/statement"))
        .and(body_partial_json(json!({
            "recordType": "statement",
            "clientName": "Acme",
            "paymentBy": "Card",
            "bank": "Maybank",
            "currency": "MYR",
            "dueAmount": 1234.5,
            "cardType": null,
            "statementDate": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("Accepted"))
        .expect(1)
        .mount(&mock)
        .await;
    let app = create_test_app(create_test_config(&mock, staging.path(), RelayMode::Extract));

    let response = app
        .post("/api/upload")
        .multipart(
            MultipartForm::new()
                .add_text("uploadType", "statement")
                .add_text("clientName", "Acme")
                .add_text("paymentBy", "Card")
                .add_part("file", receipt_part()),
        )
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({
        "success": true,
        "message": "Data extracted and sent successfully",
        "extractedData": { "clientName": "", "bank": "Maybank", "currency": null, "dueAmount": 1234.5 },
        "makeResponse": "Accepted"
    }));

    let requests = mock.received_requests().await.unwrap();
    let chat = requests
        .iter()
        .find(|r| r.url.path() == "/v1/chat/completions")
        .expect("extraction request");
    let chat_body = String::from_utf8_lossy(&chat.body);
    assert!(chat_body.contains(&format!("data:image/png;base64,{}", STANDARD.encode(RECEIPT))));

    assert_eq!(staged_files(staging.path()), 0);
}

#[test_log::test(tokio::test)]
async fn test_extract_transaction_uses_submitted_fields() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    let reply = r#"{"date": "2024-03-01", "currency": "SGD", "clientName": "Ignored Pte Ltd"}"#;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(reply)))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/hooks/transaction"))
        .and(body_partial_json(json!({
            "recordType": "transaction",
            "clientName": "Acme",
            "paymentBy": null,
            "date": "2024-03-01",
            "currency": "SGD",
            "transactionId": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock)
        .await;
    let app = create_test_app(create_test_config(&mock, staging.path(), RelayMode::Extract));

    let response = app
        .post("/api/upload")
        .multipart(
            MultipartForm::new()
                .add_text("uploadType", "something-else")
                .add_text("clientName", "Acme")
                .add_part("file", receipt_part()),
        )
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["makeResponse"], "ok");
    assert_eq!(body["extractedData"]["currency"], "SGD");
}

#[test_log::test(tokio::test)]
async fn test_extract_unparseable_reply_reports_raw_text() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    forbid_destinations(&mock).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("Sorry, I can't read this document.")))
        .expect(1)
        .mount(&mock)
        .await;
    let app = create_test_app(create_test_config(&mock, staging.path(), RelayMode::Extract));

    let response = app
        .post("/api/upload")
        .multipart(MultipartForm::new().add_text("uploadType", "statement").add_part("file", receipt_part()))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Upload failed");
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("Raw response: Sorry, I can't read this document.")
    );
    assert_eq!(staged_files(staging.path()), 0);
}

#[test_log::test(tokio::test)]
async fn test_extract_provider_error_is_generic_failure() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    forbid_destinations(&mock).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit reached"))
        .expect(1)
        .mount(&mock)
        .await;
    let app = create_test_app(create_test_config(&mock, staging.path(), RelayMode::Extract));

    let response = app
        .post("/api/upload")
        .multipart(MultipartForm::new().add_part("file", receipt_part()))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert!(body["message"].as_str().unwrap().contains("Rate limit reached"));
    assert_eq!(staged_files(staging.path()), 0);
}

#[test_log::test(tokio::test)]
async fn test_extract_without_api_key_makes_no_calls() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    forbid_destinations(&mock).await;
    forbid_extraction(&mock).await;
    let mut config = create_test_config(&mock, staging.path(), RelayMode::Extract);
    config.extraction.api_key = None;
    let app = create_test_app(config);

    let response = app
        .post("/api/upload")
        .multipart(MultipartForm::new().add_part("file", receipt_part()))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert!(!body["message"].as_str().unwrap().contains("sk-"));
    assert_eq!(staged_files(staging.path()), 0);
}

#[test_log::test(tokio::test)]
async fn test_extract_destination_rejection_passes_status_through() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("{}")))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/hooks/statement"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Bad record"))
        .expect(1)
        .mount(&mock)
        .await;
    let app = create_test_app(create_test_config(&mock, staging.path(), RelayMode::Extract));

    let response = app
        .post("/api/upload")
        .multipart(MultipartForm::new().add_text("uploadType", "statement").add_part("file", receipt_part()))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "error": "Webhook request failed", "details": "Bad record" }));
}

#[test_log::test(tokio::test)]
async fn test_oversized_upload_is_rejected() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    forbid_destinations(&mock).await;
    let mut config = create_test_config(&mock, staging.path(), RelayMode::Direct);
    config.limits.max_upload_bytes = 8;
    let app = create_test_app(config);

    let response = app
        .post("/api/upload")
        .multipart(MultipartForm::new().add_part("file", receipt_part()))
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Upload failed");
    assert_cors_headers(&response);
    assert_eq!(staged_files(staging.path()), 0);
}

#[test_log::test(tokio::test)]
async fn test_disallowed_file_type_is_rejected() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    forbid_destinations(&mock).await;
    let mut config = create_test_config(&mock, staging.path(), RelayMode::Direct);
    config.limits.allowed_mime_types = vec!["application/pdf".to_string()];
    let app = create_test_app(config);

    let response = app
        .post("/api/upload")
        .multipart(MultipartForm::new().add_part("file", receipt_part()))
        .await;

    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(staged_files(staging.path()), 0);
}

#[test_log::test(tokio::test)]
async fn test_non_multipart_body_is_generic_failure() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    forbid_destinations(&mock).await;
    let app = create_test_app(create_test_config(&mock, staging.path(), RelayMode::Direct));

    let response = app.post("/api/upload").json(&json!({ "uploadType": "statement" })).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Upload failed");
    assert_cors_headers(&response);
}

#[test_log::test(tokio::test)]
async fn test_health_and_openapi_routes() {
    let mock = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    let app = create_test_app(create_test_config(&mock, staging.path(), RelayMode::Direct));

    let health = app.get("/healthz").await;
    health.assert_status_ok();
    health.assert_text("OK");

    let doc: serde_json::Value = app.get("/api-docs/openapi.json").await.json();
    assert!(doc["paths"]["/api/upload"]["post"].is_object());
}
