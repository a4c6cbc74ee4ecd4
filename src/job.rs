//! Job data model: the selected file, the job's lifecycle state and the
//! progress frames the service pushes while it works.

use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lifecycle of one upload-to-download cycle.
///
/// ```text
/// Idle ──▶ Uploading ──▶ Running ──▶ Complete
///              │            │
///              └────────────┴──────▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    Uploading,
    Running,
    Complete,
    Failed,
}

impl JobState {
    /// Complete and Failed absorb every later event.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }
}

/// The file the user picked, read fully into memory.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub path: PathBuf,
    /// Name sent as the multipart `filename`.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    /// Validate and read the selected file.
    ///
    /// Every check here happens before any network call: an empty path means
    /// nothing was selected, and a missing or unreadable file never reaches
    /// the transport layer.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(RelayError::NoFileSelected);
        }
        let path = path.to_path_buf();

        let meta = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(RelayError::PermissionDenied { path });
            }
            Err(_) => return Err(RelayError::FileNotFound { path }),
        };
        if !meta.is_file() {
            return Err(RelayError::NotAFile { path });
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(RelayError::PermissionDenied { path });
            }
            Err(_) => return Err(RelayError::FileNotFound { path }),
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        debug!("Selected {} ({} bytes)", path.display(), bytes.len());
        Ok(Self { path, name, bytes })
    }

    /// Wrap bytes that did not come from disk.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        Self {
            path: PathBuf::from(&name),
            name,
            bytes,
        }
    }
}

/// One frame received on the progress channel.
///
/// Wire shape: `{ "progress": number, "message"?: string, "detail"?: string,
/// "download_url"?: string }`. `-1` and `100` are sentinels, see
/// [`ProgressEvent::FAILED`] and [`ProgressEvent::COMPLETE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub progress: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl ProgressEvent {
    /// Sentinel: the remote job failed; the reason is in `message`.
    pub const FAILED: i64 = -1;
    /// Sentinel: the artifact is ready at `download_url`.
    pub const COMPLETE: i64 = 100;

    pub fn new(progress: i64) -> Self {
        Self {
            progress,
            message: None,
            detail: None,
            download_url: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    /// Decode a JSON text frame.
    ///
    /// Integral floats (`55.0`) are accepted because some servers serialise
    /// every number as a float; anything else non-integral is rejected.
    pub fn from_json(text: &str) -> Result<Self, RelayError> {
        #[derive(Deserialize)]
        struct Wire {
            progress: serde_json::Number,
            #[serde(default)]
            message: Option<String>,
            #[serde(default)]
            detail: Option<String>,
            #[serde(default)]
            download_url: Option<String>,
        }

        let wire: Wire = serde_json::from_str(text).map_err(|e| RelayError::Protocol {
            detail: format!("undecodable progress frame: {e}"),
        })?;
        let progress = wire
            .progress
            .as_i64()
            .or_else(|| {
                wire.progress
                    .as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| f as i64)
            })
            .ok_or_else(|| RelayError::Protocol {
                detail: format!("progress is not an integer: {}", wire.progress),
            })?;

        Ok(Self {
            progress,
            message: wire.message,
            detail: wire.detail,
            download_url: wire.download_url,
        })
    }
}

/// One job, owned by the relay for a single upload-to-download cycle.
///
/// `download_url` is only ever set together with the `Complete` state.
#[derive(Debug, Clone)]
pub struct Job {
    file_name: String,
    job_id: Option<String>,
    state: JobState,
    last_progress: i64,
    status_message: String,
    status_detail: String,
    download_url: Option<String>,
}

impl Job {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            job_id: None,
            state: JobState::Idle,
            last_progress: 0,
            status_message: String::new(),
            status_detail: String::new(),
            download_url: None,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn last_progress(&self) -> i64 {
        self.last_progress
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn status_detail(&self) -> &str {
        &self.status_detail
    }

    pub fn download_url(&self) -> Option<&str> {
        self.download_url.as_deref()
    }

    /// Any state → Uploading. Nothing from a previous cycle survives.
    pub fn begin_upload(&mut self, message: impl Into<String>) {
        self.job_id = None;
        self.download_url = None;
        self.state = JobState::Uploading;
        self.last_progress = 0;
        self.status_message = message.into();
        self.status_detail.clear();
    }

    /// Uploading → Running, once the service has issued a job id.
    pub fn accept(&mut self, job_id: impl Into<String>) {
        self.job_id = Some(job_id.into());
        self.state = JobState::Running;
    }

    /// Apply a non-terminal status update.
    pub fn update(&mut self, progress: i64, message: Option<&str>, detail: Option<&str>) {
        if self.state.is_terminal() {
            return;
        }
        self.last_progress = progress;
        if let Some(m) = message {
            self.status_message = m.to_string();
        }
        self.status_detail = detail.unwrap_or_default().to_string();
    }

    /// Running → Complete. The only place `download_url` is set.
    pub fn complete(&mut self, download_url: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Complete;
        self.last_progress = ProgressEvent::COMPLETE;
        self.download_url = Some(download_url.into());
    }

    /// Any state → Failed. Clears the download URL.
    ///
    /// A completed job can still fail while its artifact is fetched or
    /// saved; only an earlier failure is kept as is.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.state == JobState::Failed {
            return;
        }
        self.state = JobState::Failed;
        self.status_message = reason.into();
        self.download_url = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_full_frame() {
        let ev = ProgressEvent::from_json(
            r#"{"progress":100,"message":"done","download_url":"/dl/abc"}"#,
        )
        .unwrap();
        assert_eq!(ev.progress, 100);
        assert_eq!(ev.message.as_deref(), Some("done"));
        assert_eq!(ev.download_url.as_deref(), Some("/dl/abc"));
        assert_eq!(ev.detail, None);
    }

    #[test]
    fn decode_accepts_integral_float_and_null_fields() {
        let ev = ProgressEvent::from_json(r#"{"progress":55.0,"detail":null}"#).unwrap();
        assert_eq!(ev, ProgressEvent::new(55));
    }

    #[test]
    fn decode_rejects_bad_frames() {
        assert!(ProgressEvent::from_json("not json").is_err());
        assert!(ProgressEvent::from_json(r#"{"message":"x"}"#).is_err());
        assert!(ProgressEvent::from_json(r#"{"progress":12.5}"#).is_err());
    }

    #[test]
    fn download_url_only_in_complete_state() {
        let mut job = Job::new("a.csv");
        assert_eq!(job.state(), JobState::Idle);
        job.begin_upload("Uploading file…");
        assert_eq!(job.state(), JobState::Uploading);
        job.accept("abc");
        assert_eq!(job.job_id(), Some("abc"));
        assert_eq!(job.download_url(), None);

        job.complete("/dl/abc");
        assert_eq!(job.state(), JobState::Complete);
        assert_eq!(job.download_url(), Some("/dl/abc"));

        // progress after completion is absorbed
        job.update(40, Some("late"), None);
        assert_eq!(job.last_progress(), ProgressEvent::COMPLETE);
        assert_eq!(job.status_message(), "Uploading file…");
    }

    #[test]
    fn fetch_failure_after_completion_fails_the_job() {
        let mut job = Job::new("a.csv");
        job.accept("abc");
        job.complete("/dl/abc");

        job.fail("HTTP 404");
        assert_eq!(job.state(), JobState::Failed);
        assert_eq!(job.download_url(), None);
        assert_eq!(job.status_message(), "HTTP 404");

        job.begin_upload("Uploading file…");
        assert_eq!(job.state(), JobState::Uploading);
        assert_eq!(job.job_id(), None);
        job.fail("HTTP 404");

        // the first failure reason sticks
        job.fail("second");
        assert_eq!(job.status_message(), "HTTP 404");
        job.complete("/dl/again");
        assert_eq!(job.download_url(), None);
    }

    #[test]
    fn update_clears_missing_detail() {
        let mut job = Job::new("a.csv");
        job.accept("abc");
        job.update(55, None, Some("parsing"));
        assert_eq!(job.status_detail(), "parsing");
        job.update(60, Some("next"), None);
        assert_eq!(job.status_detail(), "");
        assert_eq!(job.status_message(), "next");
        assert_eq!(job.last_progress(), 60);
    }

    #[tokio::test]
    async fn open_rejects_empty_and_missing_paths() {
        assert!(matches!(
            LocalFile::open("").await,
            Err(RelayError::NoFileSelected)
        ));
        assert!(matches!(
            LocalFile::open("/definitely/not/here.csv").await,
            Err(RelayError::FileNotFound { .. })
        ));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LocalFile::open(dir.path()).await,
            Err(RelayError::NotAFile { .. })
        ));
    }

    #[tokio::test]
    async fn open_reads_name_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.csv");
        std::fs::write(&p, b"x,y\n1,2\n").unwrap();
        let f = LocalFile::open(&p).await.unwrap();
        assert_eq!(f.name, "a.csv");
        assert_eq!(f.bytes, b"x,y\n1,2\n");
    }
}
