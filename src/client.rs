//! Rendering service client.
//!
//! [`GenerationClient`] is the seam between the executor and the outside
//! world; [`HttpGenerationClient`] is the production implementation speaking
//! the `POST /v1/images/generations` wire protocol. Tests swap in scripted
//! implementations instead of a live service.

use crate::config::GenerationConfig;
use crate::error::GenerateError;
use crate::types::Task;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Performs one generation attempt for a task.
///
/// Implementations take the task and an immutable config snapshot and return
/// either a result handle (URL or inline payload) or a terminal
/// [`GenerateError`] for this attempt. They never retry internally.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Run one generation call and return the result handle
    async fn generate(&self, task: &Task, config: &GenerationConfig)
    -> Result<String, GenerateError>;
}

/// Fetches raw bytes for a result handle during export.
///
/// Split from [`GenerationClient`] because export runs against already
/// completed tasks and only needs content retrieval.
#[async_trait]
pub trait ResultFetcher: Send + Sync {
    /// Fetch the result's bytes and its content type, if the server sent one
    async fn fetch(&self, result_url: &str) -> Result<(Vec<u8>, Option<String>), String>;
}

#[derive(Debug, Deserialize)]
struct GenerationsResponse {
    #[serde(default)]
    data: Vec<GenerationsItem>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GenerationsItem {
    url: Option<String>,
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// HTTP client for an OpenAI-compatible image generations endpoint
#[derive(Clone, Debug)]
pub struct HttpGenerationClient {
    http: reqwest::Client,
}

impl HttpGenerationClient {
    /// Create a client with the default connection settings
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Create a client with a request timeout applied to every call
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    fn endpoint(base_url: &str) -> String {
        format!("{}/v1/images/generations", base_url.trim_end_matches('/'))
    }
}

impl Default for HttpGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(
        &self,
        task: &Task,
        config: &GenerationConfig,
    ) -> Result<String, GenerateError> {
        let mut body = json!({
            "model": config.model,
            "prompt": task.prompt,
            "response_format": "url",
            "aspect_ratio": config.aspect_ratio.as_str(),
            "image_size": config.image_size.as_str(),
        });
        if !task.reference_images.is_empty() {
            body["image"] = json!(task.reference_images);
        }

        let endpoint = Self::endpoint(&config.base_url);
        debug!(task_id = %task.id, model = %config.model, "sending generation request");

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let parsed: GenerationsResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) if status.is_success() => return Err(err.into()),
            // Non-success with an unparseable body: report the status alone
            Err(_) => GenerationsResponse {
                data: vec![],
                error: None,
            },
        };

        if !status.is_success() {
            let message = parsed
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));
            return Err(GenerateError::Service {
                status: status.as_u16(),
                message,
            });
        }

        parsed
            .data
            .into_iter()
            .next()
            .and_then(|item| item.url.or(item.b64_json))
            .filter(|handle| !handle.is_empty())
            .ok_or(GenerateError::EmptyResult)
    }
}

#[async_trait]
impl ResultFetcher for HttpGenerationClient {
    async fn fetch(&self, result_url: &str) -> Result<(Vec<u8>, Option<String>), String> {
        let response = self
            .http
            .get(result_url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP error {}", response.status().as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        Ok((bytes.to_vec(), content_type))
    }
}
