//! Save-as for downloaded artifacts.
//!
//! The payload is first written to a hidden staging file next to its final
//! location, then renamed into place. The staging file is a
//! [`tempfile::NamedTempFile`]: it is deleted on drop, so every exit path
//! (a successful rename, a write error, a rename error) releases it.

use super::fetch::Artifact;
use crate::error::RelayError;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Candidate names tried before giving up on a free slot.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Write `artifact` into `dir` under its resolved filename.
///
/// With `overwrite = false` an existing file is kept and the artifact is
/// saved as `stem (1).ext`, `stem (2).ext`, … instead.
pub async fn save_artifact(
    artifact: &Artifact,
    dir: &Path,
    overwrite: bool,
) -> Result<PathBuf, RelayError> {
    let dir = dir.to_path_buf();
    let filename = artifact.filename.clone();
    let payload = artifact.payload.clone();

    tokio::task::spawn_blocking(move || save_blocking(&payload, &dir, &filename, overwrite))
        .await
        .map_err(|e| RelayError::OutputWriteFailed {
            path: PathBuf::from(&artifact.filename),
            source: io::Error::new(io::ErrorKind::Other, e.to_string()),
        })?
}

fn save_blocking(
    payload: &[u8],
    dir: &Path,
    filename: &str,
    overwrite: bool,
) -> Result<PathBuf, RelayError> {
    let target = dir.join(filename);
    let write_err = |source: io::Error| RelayError::OutputWriteFailed {
        path: target.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".report-relay-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(write_err)?;
    debug!("Staging {} bytes in {}", payload.len(), staged.path().display());
    staged.write_all(payload).map_err(write_err)?;
    staged.as_file().sync_all().map_err(write_err)?;

    let saved = if overwrite {
        staged.persist(&target).map_err(|e| write_err(e.error))?;
        target.clone()
    } else {
        persist_free_name(staged, dir, filename).map_err(write_err)?
    };

    info!("Saved {}", saved.display());
    Ok(saved)
}

/// Rename `staged` to the first name in `dir` that does not exist yet.
fn persist_free_name(mut staged: NamedTempFile, dir: &Path, filename: &str) -> io::Result<PathBuf> {
    for n in 0..MAX_NAME_ATTEMPTS {
        let candidate = dir.join(numbered_name(filename, n));
        match staged.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => staged = e.file,
            Err(e) => return Err(e.error),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for '{filename}' after {MAX_NAME_ATTEMPTS} attempts"),
    ))
}

/// `a.xlsx` → `a.xlsx`, `a (1).xlsx`, `a (2).xlsx`, …
fn numbered_name(filename: &str, n: usize) -> String {
    if n == 0 {
        return filename.to_string();
    }
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    match path.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    }
}
