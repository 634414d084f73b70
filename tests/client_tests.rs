//! OpenAI client HTTP tests
//!
//! Exercise the client against a mock HTTP server: request shapes, auth
//! header, response parsing, and error mapping.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use promobatch::client::{BatchService, OpenAiClient};
use promobatch::core::batch::BatchStatus;
use promobatch::PipelineError;

async fn client(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new("test-key", server.uri()).unwrap()
}

#[tokio::test]
async fn upload_file_posts_multipart_and_parses_the_handle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-abc",
            "object": "file",
            "filename": "batch_inputs.jsonl",
            "purpose": "batch",
            "bytes": 120
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = client(&server)
        .await
        .upload_file("batch_inputs.jsonl", b"{}\n".to_vec())
        .await
        .unwrap();

    assert_eq!(file.id, "file-abc");
    assert_eq!(file.purpose.as_deref(), Some("batch"));
}

#[tokio::test]
async fn create_batch_sends_the_job_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/batches"))
        .and(body_partial_json(json!({
            "input_file_id": "file-abc",
            "endpoint": "/v1/chat/completions",
            "completion_window": "24h"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "batch-1",
            "object": "batch",
            "status": "validating",
            "input_file_id": "file-abc",
            "created_at": 1_714_500_000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let metadata = std::collections::HashMap::from([(
        "description".to_string(),
        "promo price extraction".to_string(),
    )]);
    let job = client(&server)
        .await
        .create_batch("file-abc", "/v1/chat/completions", "24h", &metadata)
        .await
        .unwrap();

    assert_eq!(job.id, "batch-1");
    assert_eq!(job.status, BatchStatus::Validating);
}

#[tokio::test]
async fn retrieve_batch_reads_progress_counts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/batches/batch-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "batch-1",
            "status": "in_progress",
            "request_counts": {"total": 10, "completed": 7, "failed": 0}
        })))
        .mount(&server)
        .await;

    let job = client(&server).await.retrieve_batch("batch-1").await.unwrap();

    assert_eq!(job.status, BatchStatus::InProgress);
    assert_eq!(job.request_counts.completed, 7);
    assert_eq!(job.request_counts.total, 10);
}

#[tokio::test]
async fn cancel_batch_hits_the_cancel_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/batches/batch-1/cancel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "batch-1",
            "status": "cancelling"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let job = client(&server).await.cancel_batch("batch-1").await.unwrap();
    assert_eq!(job.status, BatchStatus::Cancelling);
}

#[tokio::test]
async fn file_content_returns_the_raw_bytes() {
    let server = MockServer::start().await;
    let payload = "{\"custom_id\":\"a\"}\n{\"custom_id\":\"b\"}\n";
    Mock::given(method("GET"))
        .and(path("/files/file-out/content"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(payload, "application/jsonl"))
        .mount(&server)
        .await;

    let bytes = client(&server).await.file_content("file-out").await.unwrap();
    assert_eq!(bytes, payload.as_bytes());
}

#[tokio::test]
async fn api_errors_carry_status_and_service_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/batches/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"message": "No batch found", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .retrieve_batch("missing")
        .await
        .unwrap_err();

    match err {
        PipelineError::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "No batch found");
        }
        other => panic!("expected Api error, got {other}"),
    }
}
