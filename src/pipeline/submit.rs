//! Job submission: one multipart `POST` carrying the selected file.
//!
//! In streaming mode the service answers `{"task_id": "…"}` and the job
//! continues on the progress channel. In direct mode the response body is
//! the finished artifact and the caller saves it straight away.
//!
//! A non-2xx status fails the upload before the body is read, and a 2xx
//! response without a usable `task_id` is a protocol violation: the job is
//! never continued with a made-up identifier.

use super::fetch::{read_artifact, Artifact};
use crate::config::ClientConfig;
use crate::error::RelayError;
use crate::job::LocalFile;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Name of the single multipart field.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    task_id: Option<serde_json::Value>,
}

/// Uploads the selected file to the submit endpoint.
pub struct Submitter<'a> {
    client: &'a Client,
    config: &'a ClientConfig,
}

impl<'a> Submitter<'a> {
    pub fn new(client: &'a Client, config: &'a ClientConfig) -> Self {
        Self { client, config }
    }

    /// Upload `file` and return the job id the service assigned.
    pub async fn submit(&self, file: &LocalFile) -> Result<String, RelayError> {
        let url = self.config.endpoint(&self.config.upload_path)?;
        let response = self.post(&url, file).await?;

        if !response.status().is_success() {
            return Err(RelayError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| RelayError::UploadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let job_id = parse_job_id(&body, url.as_str())?;
        info!("Upload accepted, job id {}", job_id);
        Ok(job_id)
    }

    /// Upload `file` to the direct endpoint; the response is the artifact.
    pub async fn submit_direct(&self, file: &LocalFile) -> Result<Artifact, RelayError> {
        let url = self.config.endpoint(&self.config.direct_upload_path)?;
        let response = self.post(&url, file).await?;
        read_artifact(
            response,
            url.as_str(),
            self.config,
            self.config.upload_timeout_secs,
        )
        .await
    }

    async fn post(&self, url: &Url, file: &LocalFile) -> Result<Response, RelayError> {
        info!(
            "Uploading '{}' ({} bytes) to {}",
            file.name,
            file.bytes.len(),
            url
        );

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(mime_for(&file.name))
            .map_err(|e| RelayError::UploadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let form = Form::new().part(FILE_FIELD, part);

        let mut request = self.client.post(url.clone()).multipart(form);
        if let Some(secs) = self.config.upload_timeout_secs {
            request = request.timeout(Duration::from_secs(secs));
        }
        if let Some(ref key) = self.config.api_key {
            request = request.header(self.config.api_key_header.as_str(), key.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RelayError::Timeout {
                    url: url.to_string(),
                    secs: self
                        .config
                        .upload_timeout_secs
                        .unwrap_or(self.config.connect_timeout_secs),
                }
            } else {
                RelayError::UploadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;
        debug!("Upload response: HTTP {}", response.status());
        Ok(response)
    }
}

/// Extract a non-empty string `task_id` from a JSON body.
fn parse_job_id(body: &[u8], url: &str) -> Result<String, RelayError> {
    let parsed: SubmitResponse =
        serde_json::from_slice(body).map_err(|e| RelayError::Protocol {
            detail: format!("upload response is not a JSON object: {e}"),
        })?;
    match parsed.task_id {
        Some(serde_json::Value::String(id)) if !id.trim().is_empty() => Ok(id),
        _ => Err(RelayError::MissingJobId {
            url: url.to_string(),
        }),
    }
}

/// Content type for the multipart part, from the file extension.
fn mime_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "csv" => "text/csv",
        "json" => "application/json",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
