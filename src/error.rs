//! Error types for the report-relay library.
//!
//! Every failure is fatal for the current job: nothing is retried
//! automatically, and retry is a user action (submit the file again).
//! [`RelayError`] carries the context needed to explain the failure, and
//! [`RelayError::kind`] sorts each variant into one of the failure classes a
//! caller typically branches on:
//!
//! * [`ErrorKind::Local`] — rejected before any network call (no file, unreadable file).
//! * [`ErrorKind::Transport`] — a request or connection could not complete, or
//!   the server answered with a failure status.
//! * [`ErrorKind::Protocol`] — the server answered successfully but the body
//!   did not have the expected shape.
//! * [`ErrorKind::JobFailure`] — the remote conversion reported failure.
//! * [`ErrorKind::Output`] / [`ErrorKind::Config`] — local save or setup problems.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the report-relay library.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Local errors ──────────────────────────────────────────────────────
    /// No file was selected for upload.
    #[error("No file selected.\nChoose a file to upload and try again.")]
    NoFileSelected,

    /// The selected file does not exist.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The selected path is a directory or another non-regular file.
    #[error("'{path}' is not a regular file")]
    NotAFile { path: PathBuf },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The upload request could not be sent or the connection dropped.
    #[error("Failed to upload file to '{url}': {reason}\nCheck the server address and your connection.")]
    UploadFailed { url: String, reason: String },

    /// A request completed with a non-success HTTP status.
    #[error("Server returned HTTP {status} for '{url}'")]
    HttpStatus { url: String, status: u16 },

    /// A request exceeded its configured timeout.
    #[error("Request to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The progress connection failed or closed before a terminal event.
    #[error("Progress connection error for '{url}': {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// The artifact download could not be completed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    // ── Protocol errors ───────────────────────────────────────────────────
    /// The upload succeeded but the response carried no job identifier.
    #[error("Upload response from '{url}' has no task_id field")]
    MissingJobId { url: String },

    /// A successful response or a frame violated the expected shape.
    #[error("Unexpected response: {detail}")]
    Protocol { detail: String },

    // ── Job failure ───────────────────────────────────────────────────────
    /// The remote conversion reported failure through the -1 sentinel.
    #[error("Conversion failed: {reason}")]
    JobFailed { reason: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not stage or write the downloaded artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification of a [`RelayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Local,
    Transport,
    Protocol,
    JobFailure,
    Output,
    Config,
}

impl RelayError {
    /// Which failure class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::NoFileSelected
            | RelayError::FileNotFound { .. }
            | RelayError::PermissionDenied { .. }
            | RelayError::NotAFile { .. } => ErrorKind::Local,
            RelayError::UploadFailed { .. }
            | RelayError::HttpStatus { .. }
            | RelayError::Timeout { .. }
            | RelayError::ConnectionFailed { .. }
            | RelayError::DownloadFailed { .. } => ErrorKind::Transport,
            RelayError::MissingJobId { .. } | RelayError::Protocol { .. } => ErrorKind::Protocol,
            RelayError::JobFailed { .. } => ErrorKind::JobFailure,
            RelayError::OutputWriteFailed { .. } => ErrorKind::Output,
            RelayError::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// Text to show in the error view.
    ///
    /// A job failure shows the server's reason as-is; everything else uses
    /// the `Display` form.
    pub fn user_message(&self) -> String {
        match self {
            RelayError::JobFailed { reason } => reason.clone(),
            other => other.to_string(),
        }
    }
}
