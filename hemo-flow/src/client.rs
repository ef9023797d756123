//! Seams to the two external services: the OCR endpoint that turns a
//! document into measurements, and the Agent endpoint that writes the
//! narrative analysis.

use async_trait::async_trait;
use reqwest::{Client, multipart};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::UpstreamError;
use crate::measurement::Measurement;

/// MIME types the OCR service accepts.
pub const ALLOWED_MIME_TYPES: [&str; 4] =
    ["application/pdf", "image/jpeg", "image/png", "image/jpg"];

/// Multipart field the OCR service reads the document from.
pub const UPLOAD_FIELD: &str = "file";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A document as captured from the user, before it is sent anywhere.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn has_supported_type(&self) -> bool {
        let essence = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        ALLOWED_MIME_TYPES.contains(&essence.as_str())
    }
}

#[async_trait]
pub trait OcrService: Send + Sync {
    /// Upload the document and return the raw measurements in the order the
    /// service listed them.
    async fn extract(
        &self,
        endpoint: &str,
        document: &DocumentUpload,
    ) -> Result<Vec<Measurement>, UpstreamError>;
}

#[async_trait]
pub trait AgentService: Send + Sync {
    /// Ask for an interpretation. `Ok(None)` means the service answered but
    /// sent no usable `analysis` text.
    async fn analyze(&self, endpoint: &str, body: &Value) -> Result<Option<String>, UpstreamError>;
}

pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().timeout(timeout).build()
}

#[derive(Clone)]
pub struct HttpOcrClient {
    client: Client,
}

impl HttpOcrClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OcrService for HttpOcrClient {
    async fn extract(
        &self,
        endpoint: &str,
        document: &DocumentUpload,
    ) -> Result<Vec<Measurement>, UpstreamError> {
        info!(
            "Uploading {} ({}, {} bytes) to OCR endpoint",
            document.file_name,
            document.content_type,
            document.bytes.len()
        );

        let part = multipart::Part::bytes(document.bytes.clone())
            .file_name(document.file_name.clone())
            .mime_str(&document.content_type)
            .map_err(|e| UpstreamError::Network(e.to_string()))?;
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);

        let response = self.client.post(endpoint).multipart(form).send().await?;
        let payload = read_json(response).await?;

        let entries = payload
            .get("measurements")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                UpstreamError::Parse("response has no `measurements` array".to_string())
            })?;

        info!("OCR endpoint returned {} measurements", entries.len());
        Ok(entries.iter().map(Measurement::from_value).collect())
    }
}

#[derive(Clone)]
pub struct HttpAgentClient {
    client: Client,
}

impl HttpAgentClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentService for HttpAgentClient {
    async fn analyze(&self, endpoint: &str, body: &Value) -> Result<Option<String>, UpstreamError> {
        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;
        let payload = read_json(response).await?;

        let analysis = payload
            .get("analysis")
            .and_then(Value::as_str)
            .map(str::to_string);
        if analysis.is_none() {
            warn!("Agent response carried no analysis text");
        }
        Ok(analysis)
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        warn!("Upstream request failed: {}", status);
        return Err(UpstreamError::Status(status.as_u16()));
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Parse(e.to_string()))
}
