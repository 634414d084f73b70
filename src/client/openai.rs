//! OpenAI Batch API client

use async_trait::async_trait;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

use super::BatchService;
use crate::core::batch::{BatchJob, FileObject};
use crate::utils::error::{PipelineError, Result};

/// HTTP client for the OpenAI Batch API
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl OpenAiClient {
    /// Create a client against the given base URL
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Turn a response into `T`, mapping non-2xx statuses to [`PipelineError::Api`]
    async fn into_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        // OpenAI wraps failures as {"error": {"message": ...}}
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);
        Err(PipelineError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl BatchService for OpenAiClient {
    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<FileObject> {
        debug!(filename, size = bytes.len(), "uploading batch input file");
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/jsonl")?;
        let form = multipart::Form::new()
            .text("purpose", "batch")
            .part("file", part);

        let response = self
            .http
            .post(self.url("/files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        Self::into_json(response).await
    }

    async fn create_batch(
        &self,
        input_file_id: &str,
        endpoint: &str,
        completion_window: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<BatchJob> {
        let body = json!({
            "input_file_id": input_file_id,
            "endpoint": endpoint,
            "completion_window": completion_window,
            "metadata": metadata,
        });
        let response = self
            .http
            .post(self.url("/batches"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        Self::into_json(response).await
    }

    async fn retrieve_batch(&self, batch_id: &str) -> Result<BatchJob> {
        let response = self
            .http
            .get(self.url(&format!("/batches/{batch_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::into_json(response).await
    }

    async fn cancel_batch(&self, batch_id: &str) -> Result<BatchJob> {
        let response = self
            .http
            .post(self.url(&format!("/batches/{batch_id}/cancel")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::into_json(response).await
    }

    async fn file_content(&self, file_id: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.url(&format!("/files/{file_id}/content")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
