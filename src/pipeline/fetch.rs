//! Artifact retrieval and filename resolution.
//!
//! The completion frame's `download_url` is passed in unchanged and resolved
//! against the service root the way a browser resolves a relative link, so
//! absolute URLs pass straight through.
//!
//! ## Filename resolution
//!
//! The suggested name comes from `Content-Disposition`, and only when the
//! header carries an `attachment` directive:
//!
//! 1. `filename*=UTF-8''…` (RFC 5987, percent-decoded) wins when present.
//! 2. Otherwise `filename=` with a double-quoted, single-quoted or bare value.
//! 3. Surrounding quotes are stripped and directory components dropped, so a
//!    hostile header cannot steer the save outside the output directory.
//! 4. Anything else (no header, no directive, no usable token) falls back to
//!    the configured default name.

use crate::config::ClientConfig;
use crate::error::RelayError;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, info};

/// A downloaded artifact, held in memory until it is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub payload: Vec<u8>,
}

/// Authenticated download of finished artifacts.
pub struct ArtifactFetcher<'a> {
    client: &'a Client,
    config: &'a ClientConfig,
}

impl<'a> ArtifactFetcher<'a> {
    pub fn new(client: &'a Client, config: &'a ClientConfig) -> Self {
        Self { client, config }
    }

    /// GET `download_url` and return its body plus the resolved filename.
    pub async fn fetch(&self, download_url: &str) -> Result<Artifact, RelayError> {
        let url = self.config.endpoint(download_url)?;
        info!("Downloading artifact from: {}", url);

        let mut request = self.client.get(url.clone());
        if let Some(secs) = self.config.download_timeout_secs {
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
                        .download_timeout_secs
                        .unwrap_or(self.config.connect_timeout_secs),
                }
            } else {
                RelayError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        read_artifact(
            response,
            url.as_str(),
            self.config,
            self.config.download_timeout_secs,
        )
        .await
    }
}

/// Turn a response into an [`Artifact`], rejecting failure statuses before
/// touching the body. `deadline` is the whole-request timeout the response
/// was sent with, if any.
pub(crate) async fn read_artifact(
    response: Response,
    url: &str,
    config: &ClientConfig,
    deadline: Option<u64>,
) -> Result<Artifact, RelayError> {
    if !response.status().is_success() {
        return Err(RelayError::HttpStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let disposition = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    debug!("Content-Disposition: {:?}", disposition);
    let filename = filename_from_disposition(disposition.as_deref(), &config.default_filename);

    let payload = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            RelayError::Timeout {
                url: url.to_string(),
                secs: deadline.unwrap_or(config.connect_timeout_secs),
            }
        } else {
            RelayError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    info!("Received '{}' ({} bytes)", filename, payload.len());
    Ok(Artifact {
        filename,
        payload: payload.to_vec(),
    })
}

static FILENAME_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)filename\*\s*=\s*([^;\n]*)").unwrap());

static FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename[^;=\n*]*=\s*(?:"([^"]*)"|'([^']*)'|([^;\n]*))"#).unwrap()
});

/// Resolve the save-as name from a `Content-Disposition` value.
pub fn filename_from_disposition(header: Option<&str>, default: &str) -> String {
    let Some(header) = header else {
        return default.to_string();
    };
    if !header.to_ascii_lowercase().contains("attachment") {
        return default.to_string();
    }

    let extended = FILENAME_EXT
        .captures(header)
        .and_then(|c| c.get(1))
        .and_then(|m| decode_ext_value(m.as_str()));

    let plain = || {
        FILENAME.captures(header).and_then(|c| {
            c.get(1)
                .or_else(|| c.get(2))
                .or_else(|| c.get(3))
                .map(|m| m.as_str().to_string())
        })
    };

    extended
        .or_else(plain)
        .and_then(|raw| sanitize(&raw))
        .unwrap_or_else(|| default.to_string())
}

/// Decode an RFC 5987 `charset'lang'value`; a bare value is used as-is.
fn decode_ext_value(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    let encoded = match raw.find("''") {
        Some(i) => &raw[i + 2..],
        None => raw,
    };
    urlencoding::decode(encoded).ok().map(|s| s.into_owned())
}

/// Strip quotes and path components; reject names that are empty or only dots.
fn sanitize(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    let name = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    if name.is_empty() || name.chars().all(|c| c == '.') {
        None
    } else {
        Some(name.to_string())
    }
}
