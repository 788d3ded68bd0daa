use crate::types::{RepositoryRecord, Snapshot};
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode or decode snapshot {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Written,
    /// An earlier snapshot was left untouched.
    Preserved,
}

/// Keep a repository that has stars or forks, or that was created inside `window`.
pub fn is_notable(record: &RepositoryRecord, now: DateTime<Utc>, window: Duration) -> bool {
    record.stargazer_count > 0 || record.fork_count > 0 || now - record.created_at < window
}

pub fn retain_notable(
    records: Vec<RepositoryRecord>,
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<RepositoryRecord> {
    let before = records.len();
    let kept: Vec<RepositoryRecord> = records
        .into_iter()
        .filter(|r| is_notable(r, now, window))
        .collect();
    info!(kept = kept.len(), dropped = before - kept.len(), "quality filter applied");
    kept
}

/// Replaces `path` with `snapshot`. The JSON goes to a temporary file in the same
/// directory first and is renamed into place, so readers never see a partial file.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let write_err = |source: std::io::Error| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(write_err)?;

    let contents = serde_json::to_string_pretty(snapshot).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<Snapshot, SnapshotError> {
    let contents = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Handles a run that discovered nothing: an existing snapshot is kept as is,
/// otherwise an explicit empty one is written.
pub fn publish_empty(path: &Path, now: DateTime<Utc>) -> Result<PublishOutcome, SnapshotError> {
    if path.exists() {
        warn!(path = %path.display(), "no repositories found, keeping previous snapshot");
        return Ok(PublishOutcome::Preserved);
    }
    warn!(path = %path.display(), "no repositories found, writing empty snapshot");
    write_snapshot(path, &Snapshot::new(now, Vec::new()))?;
    Ok(PublishOutcome::Written)
}
