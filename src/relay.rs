//! The job orchestrator: upload → progress → download → save.
//!
//! [`Relay::run`] drives exactly one job at a time through the stages in
//! [`crate::pipeline`], strictly in order: the progress channel is opened
//! only after the upload returned a job id, and the artifact is fetched only
//! after the channel reported completion. Every stage suspends on its own
//! I/O; nothing runs in parallel.
//!
//! The injected [`ViewSelector`] is told about every transition. Any failure
//! after the local file checks switches it to the error view and leaves the
//! relay ready for the next `run`; no state from the failed job survives.

use crate::config::{ClientConfig, InterfaceMode};
use crate::error::RelayError;
use crate::job::{Job, LocalFile};
use crate::pipeline::channel::ProgressChannel;
use crate::pipeline::fetch::{Artifact, ArtifactFetcher};
use crate::pipeline::progress::{ChannelState, Termination};
use crate::pipeline::save::save_artifact;
use crate::pipeline::submit::Submitter;
use crate::view::{ProgressSnapshot, SharedView, View};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Status text while the file is being uploaded.
pub const UPLOADING_MESSAGE: &str = "Uploading file…";

/// Summary of one finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    /// Id assigned by the service; `None` in direct mode.
    pub job_id: Option<String>,
    /// Name resolved from the download response.
    pub filename: String,
    /// Where the artifact was written.
    pub saved_path: PathBuf,
    /// Artifact size in bytes.
    pub bytes: u64,
    /// Progress frames received.
    pub events: usize,
    pub duration_ms: u64,
}

/// Client-side orchestrator for conversion jobs.
pub struct Relay {
    config: ClientConfig,
    client: Client,
    view: SharedView,
}

impl Relay {
    /// Build a relay with its own HTTP client.
    pub fn new(config: ClientConfig, view: SharedView) -> Result<Self, RelayError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            config,
            client,
            view,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one job for the file at `path`.
    ///
    /// Local problems (nothing selected, unreadable file) are returned before
    /// any request is made and leave the view untouched.
    pub async fn run(&self, path: impl AsRef<Path>) -> Result<JobReport, RelayError> {
        let file = LocalFile::open(path).await?;
        self.run_file(file).await
    }

    /// Run one job for an already-loaded file.
    pub async fn run_file(&self, file: LocalFile) -> Result<JobReport, RelayError> {
        let mut job = Job::new(file.name.clone());
        self.run_job(file, &mut job).await
    }

    /// Run one job, recording every transition on the caller's `job`.
    ///
    /// On failure `job` ends in [`JobState::Failed`](crate::job::JobState)
    /// without a download URL, even if the service had already reported
    /// completion.
    pub async fn run_job(&self, file: LocalFile, job: &mut Job) -> Result<JobReport, RelayError> {
        let start = Instant::now();

        // ── Reset ────────────────────────────────────────────────────────
        self.view.show(View::Idle);

        match self.execute(&file, job).await {
            Ok((artifact, saved_path, events)) => {
                // ── Back to idle, ready for the next file ────────────────
                self.view.show(View::Idle);
                self.view.clear_selection();

                let report = JobReport {
                    job_id: job.job_id().map(str::to_owned),
                    filename: artifact.filename,
                    saved_path,
                    bytes: artifact.payload.len() as u64,
                    events,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
                info!(
                    "Job finished: {} → {} in {}ms",
                    file.name,
                    report.saved_path.display(),
                    report.duration_ms
                );
                Ok(report)
            }
            Err(err) => {
                job.fail(err.user_message());
                warn!("Job for '{}' failed: {}", file.name, err);
                self.view.render_error(&err.user_message());
                self.view.show(View::Error);
                Err(err)
            }
        }
    }

    /// Upload, follow and download. Returns the artifact, where it was
    /// saved, and the number of progress frames seen.
    async fn execute(
        &self,
        file: &LocalFile,
        job: &mut Job,
    ) -> Result<(Artifact, PathBuf, usize), RelayError> {
        // ── Step 1: Upload ───────────────────────────────────────────────
        job.begin_upload(UPLOADING_MESSAGE);
        self.view.show(View::Progress);
        self.view.render_progress(&ProgressSnapshot {
            progress: 0,
            message: UPLOADING_MESSAGE.to_string(),
            detail: String::new(),
        });

        let submitter = Submitter::new(&self.client, &self.config);

        let (artifact, events) = match self.config.mode {
            InterfaceMode::Direct => {
                let artifact = submitter.submit_direct(file).await?;
                self.view.show(View::Result);
                (artifact, 0)
            }
            InterfaceMode::Streaming => {
                let job_id = submitter.submit(file).await?;
                job.accept(job_id.as_str());

                // ── Step 2: Follow progress ──────────────────────────────
                let channel = ProgressChannel::open(&self.config, &job_id).await?;
                let channel_url = channel.url().to_string();
                let outcome = channel.follow(self.view.as_ref(), job).await;

                let download_url = match outcome.state {
                    ChannelState::Complete { download_url } => download_url,
                    ChannelState::Failed(t) => return Err(termination_error(t, &channel_url)),
                    ChannelState::Running(_) => {
                        return Err(RelayError::ConnectionFailed {
                            url: channel_url,
                            reason: "channel ended without a final status".into(),
                        })
                    }
                };

                // ── Step 3: Download ─────────────────────────────────────
                let fetcher = ArtifactFetcher::new(&self.client, &self.config);
                (fetcher.fetch(&download_url).await?, outcome.events)
            }
        };

        // ── Step 4: Save ─────────────────────────────────────────────────
        let saved = save_artifact(&artifact, &self.config.output_dir, self.config.overwrite).await?;
        Ok((artifact, saved, events))
    }

    /// `GET` the health endpoint and expect `{"ping": "pong"}`.
    pub async fn check_health(&self) -> Result<(), RelayError> {
        #[derive(Deserialize)]
        struct Pong {
            ping: String,
        }

        let url = self.config.endpoint(&self.config.health_path)?;
        let secs = self.config.connect_timeout_secs;
        let mut request = self
            .client
            .get(url.clone())
            .timeout(Duration::from_secs(secs));
        if let Some(ref key) = self.config.api_key {
            request = request.header(self.config.api_key_header.as_str(), key.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RelayError::Timeout {
                    url: url.to_string(),
                    secs,
                }
            } else {
                RelayError::ConnectionFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;
        if !response.status().is_success() {
            return Err(RelayError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::ConnectionFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        match serde_json::from_slice::<Pong>(&body) {
            Ok(p) if p.ping == "pong" => {
                info!("Service at {} is up", self.config.base_url);
                Ok(())
            }
            _ => Err(RelayError::Protocol {
                detail: format!(
                    "health check expected {{\"ping\":\"pong\"}}, got {}",
                    String::from_utf8_lossy(&body)
                ),
            }),
        }
    }
}

fn termination_error(t: Termination, url: &str) -> RelayError {
    match t {
        Termination::Job { reason } => RelayError::JobFailed { reason },
        Termination::Connection { reason } => RelayError::ConnectionFailed {
            url: url.to_string(),
            reason,
        },
        Termination::Protocol { detail } => RelayError::Protocol { detail },
    }
}
