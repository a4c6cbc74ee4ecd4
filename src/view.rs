//! The presentation collaborator the relay drives.
//!
//! The relay never draws anything itself. It holds one injected
//! [`Arc<dyn ViewSelector>`] and tells it which of four views to show, plus
//! the text/number each view displays. A terminal progress bar, a GUI, or a
//! test recorder can all sit behind the same trait.
//!
//! # Example
//!
//! ```rust
//! use report_relay::{View, ViewSelector, ProgressSnapshot};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct LastView(Mutex<Option<View>>);
//!
//! impl ViewSelector for LastView {
//!     fn show(&self, view: View) {
//!         *self.0.lock().unwrap() = Some(view);
//!     }
//! }
//!
//! let v = LastView::default();
//! v.show(View::Progress);
//! v.render_progress(&ProgressSnapshot::default());
//! assert_eq!(*v.0.lock().unwrap(), Some(View::Progress));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The four mutually exclusive views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum View {
    /// File picker, ready for a new job.
    Idle,
    /// Upload / conversion in progress.
    Progress,
    /// Artifact ready for download.
    Result,
    /// A terminal error with a message.
    Error,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            View::Idle => "idle",
            View::Progress => "progress",
            View::Result => "result",
            View::Error => "error",
        };
        f.write_str(name)
    }
}

/// What the progress view displays. Always rendered whole, never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub progress: i64,
    pub message: String,
    pub detail: String,
}

/// Display capability injected into [`crate::Relay`].
///
/// `show` must leave exactly one view visible. The other methods default to
/// no-ops so implementations only override what they render.
pub trait ViewSelector: Send + Sync {
    /// Make `view` the only visible view.
    fn show(&self, view: View);

    /// Redraw the progress view's bar, status text and detail text.
    fn render_progress(&self, snapshot: &ProgressSnapshot) {
        let _ = snapshot;
    }

    /// Set the error view's message. Called before `show(View::Error)`.
    fn render_error(&self, message: &str) {
        let _ = message;
    }

    /// Forget the previously selected file so the next job starts clean.
    fn clear_selection(&self) {}
}

/// A view that discards everything. Used when no presentation is attached.
pub struct NoopView;

impl ViewSelector for NoopView {
    fn show(&self, _view: View) {}
}

/// Convenience alias matching the type stored in [`crate::Relay`].
pub type SharedView = Arc<dyn ViewSelector>;
