use std::path::PathBuf;

use thiserror::Error;

/// Failures the data pipeline can surface to callers.
///
/// Only `RemoteFetch`, `RemoteSchema` and `Cancelled` abort a refresh.
/// `SnapshotUnavailable` means "no data yet" and `PlayerHistoryUnavailable`
/// is collected per player without stopping the batch.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("remote fetch failed for {url}: {message}")]
    RemoteFetch { url: String, message: String },

    #[error("unexpected remote payload ({context}): {message}")]
    RemoteSchema { context: String, message: String },

    #[error("snapshot unavailable at {}: {reason}", path.display())]
    SnapshotUnavailable { path: PathBuf, reason: String },

    #[error("history unavailable for player {player_id}: {message}")]
    PlayerHistoryUnavailable { player_id: u32, message: String },

    #[error("snapshot write failed at {}: {message}", path.display())]
    SnapshotWrite { path: PathBuf, message: String },

    #[error("refresh cancelled")]
    Cancelled,
}

impl DataError {
    pub fn schema(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        DataError::RemoteSchema {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn fetch(url: impl Into<String>, err: &anyhow::Error) -> Self {
        DataError::RemoteFetch {
            url: url.into(),
            message: format!("{err:#}"),
        }
    }

    /// True for the "nothing usable on disk" case that callers treat as a first run.
    pub fn is_snapshot_unavailable(&self) -> bool {
        matches!(self, DataError::SnapshotUnavailable { .. })
    }
}

pub type DataResult<T> = std::result::Result<T, DataError>;
