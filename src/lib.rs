//! # report-relay
//!
//! Client side of an asynchronous file-conversion service: upload a file,
//! follow the job's progress over a WebSocket, and save the produced report
//! when the service says it is ready.
//!
//! ## Job Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Submit   multipart POST → {"task_id": "…"}
//!  ├─ 2. Follow   WebSocket frames {progress, message?, detail?, download_url?}
//!  │              -1 → failed, 100 → complete, anything else → status update
//!  ├─ 3. Fetch    GET download_url (API-key header), filename from Content-Disposition
//!  └─ 4. Save     staged temp file → rename into the output directory
//! ```
//!
//! Every transition is reported to an injected [`ViewSelector`], which shows
//! one of four views: idle, progress, result or error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use report_relay::{ClientConfig, NoopView, Relay};
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("http://127.0.0.1:8000")
//!         .api_key("deployment-key")
//!         .output_dir("reports")
//!         .build()?;
//!     let relay = Relay::new(config, Arc::new(NoopView))?;
//!     let report = relay.run("patients.xlsx").await?;
//!     eprintln!("saved {} ({} bytes)", report.saved_path.display(), report.bytes);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `report-relay` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod relay;
pub mod view;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder, InterfaceMode};
pub use error::{ErrorKind, RelayError};
pub use job::{Job, JobState, LocalFile, ProgressEvent};
pub use pipeline::fetch::{filename_from_disposition, Artifact, ArtifactFetcher};
pub use pipeline::progress::{reduce, ChannelInput, ChannelState, Effect, Termination};
pub use pipeline::submit::Submitter;
pub use pipeline::channel::ProgressChannel;
pub use relay::{JobReport, Relay};
pub use view::{NoopView, ProgressSnapshot, SharedView, View, ViewSelector};
