//! Client configuration for talking to the conversion service.
//!
//! Every endpoint, credential and timeout lives in [`ClientConfig`], built via
//! [`ClientConfigBuilder`]. The API key is deployment configuration: it is
//! supplied by whoever constructs the config and never logged (the `Debug`
//! impl redacts it).

use crate::error::RelayError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for one relay client.
///
/// # Example
/// ```rust
/// use report_relay::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("https://reports.example.org")
///     .api_key("secret")
///     .output_dir("/tmp/reports")
///     .build()
///     .unwrap();
/// assert_eq!(config.progress_base_url().unwrap().scheme(), "wss");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Root of the conversion service (`http` or `https`).
    pub base_url: String,

    /// Root for the progress WebSocket. If None, derived from `base_url`
    /// by swapping `http` → `ws` and `https` → `wss`.
    pub progress_base_url: Option<String>,

    /// Which upload-response shape the deployment speaks. Default: [`InterfaceMode::Streaming`].
    pub mode: InterfaceMode,

    /// Submit endpoint for streaming mode. Default: `/api/processing/upload`.
    pub upload_path: String,

    /// Submit endpoint for direct mode. Default: `/api/upload/`.
    pub direct_upload_path: String,

    /// Progress endpoint prefix; the job id is appended as a path segment.
    /// Default: `/api/processing/ws`.
    pub progress_path: String,

    /// Liveness endpoint. Default: `/health/`.
    pub health_path: String,

    /// Static API key for trusted deployments.
    pub api_key: Option<String>,

    /// Header carrying the API key on HTTP calls. Default: `X-API-KEY`.
    pub api_key_header: String,

    /// Query parameter carrying the API key on the progress URL. Default: `api_key`.
    pub api_key_query_param: String,

    /// Whether the progress URL carries the API key. Default: true.
    pub api_key_in_progress_query: bool,

    /// Filename used when the download response suggests none. Default: `report.xlsx`.
    pub default_filename: String,

    /// Directory the artifact is saved into. Default: current directory.
    pub output_dir: PathBuf,

    /// Replace an existing file instead of picking `name (n).ext`. Default: false.
    pub overwrite: bool,

    /// Whole-request deadline for the upload, in seconds. Default: None, so a
    /// slow upload runs until the server answers.
    pub upload_timeout_secs: Option<u64>,

    /// Whole-request deadline for the artifact download, in seconds.
    /// Default: None.
    pub download_timeout_secs: Option<u64>,

    /// Connect timeout for HTTP and the progress channel, in seconds. Default: 30.
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            progress_base_url: None,
            mode: InterfaceMode::default(),
            upload_path: "/api/processing/upload".to_string(),
            direct_upload_path: "/api/upload/".to_string(),
            progress_path: "/api/processing/ws".to_string(),
            health_path: "/health/".to_string(),
            api_key: None,
            api_key_header: "X-API-KEY".to_string(),
            api_key_query_param: "api_key".to_string(),
            api_key_in_progress_query: true,
            default_filename: "report.xlsx".to_string(),
            output_dir: PathBuf::from("."),
            overwrite: false,
            upload_timeout_secs: None,
            download_timeout_secs: None,
            connect_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("progress_base_url", &self.progress_base_url)
            .field("mode", &self.mode)
            .field("upload_path", &self.upload_path)
            .field("direct_upload_path", &self.direct_upload_path)
            .field("progress_path", &self.progress_path)
            .field("health_path", &self.health_path)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_header", &self.api_key_header)
            .field("api_key_query_param", &self.api_key_query_param)
            .field("api_key_in_progress_query", &self.api_key_in_progress_query)
            .field("default_filename", &self.default_filename)
            .field("output_dir", &self.output_dir)
            .field("overwrite", &self.overwrite)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Parsed service root.
    pub fn base(&self) -> Result<Url, RelayError> {
        Url::parse(&self.base_url).map_err(|e| {
            RelayError::InvalidConfig(format!("base URL '{}' is not a URL: {e}", self.base_url))
        })
    }

    /// Resolve an endpoint path (or absolute URL) against the service root.
    pub fn endpoint(&self, path: &str) -> Result<Url, RelayError> {
        self.base()?
            .join(path)
            .map_err(|e| RelayError::InvalidConfig(format!("bad endpoint '{path}': {e}")))
    }

    /// Root of the progress WebSocket, explicit or derived from `base_url`.
    pub fn progress_base_url(&self) -> Result<Url, RelayError> {
        if let Some(ref explicit) = self.progress_base_url {
            return Url::parse(explicit).map_err(|e| {
                RelayError::InvalidConfig(format!("progress URL '{explicit}' is not a URL: {e}"))
            });
        }
        let mut url = self.base()?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|_| {
            RelayError::InvalidConfig(format!("cannot derive a {scheme} URL from '{}'", self.base_url))
        })?;
        Ok(url)
    }

    /// Progress URL for one job: `<ws root><progress_path>/<job_id>[?api_key=…]`.
    pub fn progress_url(&self, job_id: &str) -> Result<Url, RelayError> {
        let mut url = self
            .progress_base_url()?
            .join(&self.progress_path)
            .map_err(|e| RelayError::InvalidConfig(format!("bad progress path: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| RelayError::InvalidConfig("progress URL cannot take a path".into()))?
            .pop_if_empty()
            .push(job_id);
        if self.api_key_in_progress_query {
            if let Some(ref key) = self.api_key {
                url.query_pairs_mut()
                    .append_pair(&self.api_key_query_param, key);
            }
        }
        Ok(url)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn progress_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.progress_base_url = Some(url.into());
        self
    }

    pub fn mode(mut self, mode: InterfaceMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn upload_path(mut self, path: impl Into<String>) -> Self {
        self.config.upload_path = path.into();
        self
    }

    pub fn direct_upload_path(mut self, path: impl Into<String>) -> Self {
        self.config.direct_upload_path = path.into();
        self
    }

    pub fn progress_path(mut self, path: impl Into<String>) -> Self {
        self.config.progress_path = path.into();
        self
    }

    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.config.health_path = path.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_key_header(mut self, name: impl Into<String>) -> Self {
        self.config.api_key_header = name.into();
        self
    }

    pub fn api_key_query_param(mut self, name: impl Into<String>) -> Self {
        self.config.api_key_query_param = name.into();
        self
    }

    pub fn api_key_in_progress_query(mut self, v: bool) -> Self {
        self.config.api_key_in_progress_query = v;
        self
    }

    pub fn default_filename(mut self, name: impl Into<String>) -> Self {
        self.config.default_filename = name.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn overwrite(mut self, v: bool) -> Self {
        self.config.overwrite = v;
        self
    }

    /// Abort the upload if the whole request takes longer than `secs`.
    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = Some(secs);
        self
    }

    /// Abort the download if the whole request takes longer than `secs`.
    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = Some(secs);
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, RelayError> {
        let c = &self.config;

        let base = Url::parse(&c.base_url).map_err(|e| {
            RelayError::InvalidConfig(format!("base URL '{}' is not a URL: {e}", c.base_url))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(RelayError::InvalidConfig(format!(
                "base URL must be http or https, got '{}'",
                base.scheme()
            )));
        }

        if let Some(ref ws) = c.progress_base_url {
            let url = Url::parse(ws).map_err(|e| {
                RelayError::InvalidConfig(format!("progress URL '{ws}' is not a URL: {e}"))
            })?;
            if !matches!(url.scheme(), "ws" | "wss") {
                return Err(RelayError::InvalidConfig(format!(
                    "progress URL must be ws or wss, got '{}'",
                    url.scheme()
                )));
            }
        }

        if c.default_filename.trim().is_empty() {
            return Err(RelayError::InvalidConfig(
                "default filename must not be empty".into(),
            ));
        }
        if c.api_key_header.trim().is_empty() {
            return Err(RelayError::InvalidConfig(
                "API key header name must not be empty".into(),
            ));
        }
        if c.api_key_query_param.trim().is_empty() {
            return Err(RelayError::InvalidConfig(
                "API key query parameter must not be empty".into(),
            ));
        }
        if c.upload_timeout_secs == Some(0)
            || c.download_timeout_secs == Some(0)
            || c.connect_timeout_secs == 0
        {
            return Err(RelayError::InvalidConfig("timeouts must be ≥ 1s".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Shape of the submit endpoint's success response.
///
/// | Mode | Upload returns | Then |
/// |------|----------------|------|
/// | `Streaming` | `{"task_id": "…"}` | progress channel, then download |
/// | `Direct` | the artifact itself | save immediately |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterfaceMode {
    /// Job id + WebSocket progress + authenticated download. (default)
    #[default]
    Streaming,
    /// The upload response body is the finished artifact.
    Direct,
}
