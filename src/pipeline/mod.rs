//! Pipeline stages for one conversion job.
//!
//! Each submodule owns one step of the exchange with the service, so each
//! can be tested on its own and the orchestrator in [`crate::relay`] only
//! sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! submit ──▶ channel ──▶ fetch ──▶ save
//! (job id)   (events)    (bytes)   (file)
//! ```
//!
//! 1. [`submit`]   — multipart upload; yields a job id (or, in direct mode,
//!    the artifact itself)
//! 2. [`channel`]  — WebSocket keyed by the job id; feeds frames through the
//!    pure state machine in [`progress`]
//! 3. [`fetch`]    — authenticated download; resolves the save-as filename
//!    from `Content-Disposition`
//! 4. [`save`]     — stages the payload in a scoped temp file and renames it
//!    into the output directory

pub mod channel;
pub mod fetch;
pub mod progress;
pub mod save;
pub mod submit;
