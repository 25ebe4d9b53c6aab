use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{multipart, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::error::{EngineError, EngineResult};
use crate::models::template::{Template, TemplateOrigin};
use crate::models::{Assignment, NewAssignment, RosterEntry, UploadResponse};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// The remote assignment service: catalog, creation, uploads and roster.
#[async_trait]
pub trait AssignmentApi: Send + Sync {
    async fn list_assignments(&self) -> EngineResult<Vec<Assignment>>;
    async fn create_assignment(&self, assignment: &NewAssignment) -> EngineResult<Assignment>;
    /// Uploads one file and returns its durable URL.
    async fn upload(&self, bytes: Vec<u8>, file_name: &str, mime: &str) -> EngineResult<String>;
    async fn list_templates(&self) -> EngineResult<Vec<Template>>;
    async fn list_classes(&self) -> EngineResult<Vec<RosterEntry>>;
    async fn list_students(&self) -> EngineResult<Vec<RosterEntry>>;
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
}

pub struct HttpAssignmentApi {
    http_client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl HttpAssignmentApi {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let parsed = Url::parse(base_url)
            .with_context(|| format!("Invalid assignments API URL: {}", base_url))?;

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> EngineResult<T> {
        retry_async_with_config(&self.retry, EngineError::is_retryable, || async {
            let response = self
                .http_client
                .get(self.endpoint(path))
                .send()
                .await
                .map_err(transport_error)?;
            decode(path, response).await
        })
        .await
    }
}

#[async_trait]
impl AssignmentApi for HttpAssignmentApi {
    async fn list_assignments(&self) -> EngineResult<Vec<Assignment>> {
        self.get_json("assignments").await
    }

    async fn create_assignment(&self, assignment: &NewAssignment) -> EngineResult<Assignment> {
        let response = self
            .http_client
            .post(self.endpoint("assignments"))
            .json(assignment)
            .send()
            .await
            .map_err(transport_error)?;

        let created: Assignment = decode("assignments", response).await?;
        tracing::info!("Assignment created remotely: {}", created.id);
        Ok(created)
    }

    async fn upload(&self, bytes: Vec<u8>, file_name: &str, mime: &str) -> EngineResult<String> {
        let size = bytes.len();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| EngineError::network(format!("Invalid media type {}: {}", mime, e), false))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http_client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let uploaded: UploadResponse = decode("upload", response).await?;
        tracing::debug!("Uploaded {} ({} bytes) -> {}", file_name, size, uploaded.url);
        Ok(uploaded.url)
    }

    async fn list_templates(&self) -> EngineResult<Vec<Template>> {
        let mut templates: Vec<Template> = self.get_json("assignments/templates").await?;
        for template in &mut templates {
            template.origin = TemplateOrigin::Api;
        }
        Ok(templates)
    }

    async fn list_classes(&self) -> EngineResult<Vec<RosterEntry>> {
        self.get_json("teacher/classes").await
    }

    async fn list_students(&self) -> EngineResult<Vec<RosterEntry>> {
        self.get_json("teacher/students").await
    }
}

fn transport_error(e: reqwest::Error) -> EngineError {
    EngineError::network(format!("Request failed: {}", e), true)
}

async fn decode<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> EngineResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| EngineError::network(format!("Unexpected response from /{}: {}", path, e), false));
    }

    let message = response
        .json::<ApiErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error)
        .unwrap_or_else(|| format!("/{} returned {}", path, status));

    Err(EngineError::network(message, is_retryable_status(status)))
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_cleanly() {
        let api = HttpAssignmentApi::new("http://localhost:3000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.endpoint("/upload"), "http://localhost:3000/api/upload");
        assert_eq!(
            api.endpoint("assignments/templates"),
            "http://localhost:3000/api/assignments/templates"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(HttpAssignmentApi::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn only_transient_statuses_retry() {
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }
}
