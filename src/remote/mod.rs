//! Publishing and fetching whole-board snapshots through a remote table store.

use thiserror::Error;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::storage::SnapshotError;

mod client;
mod worker;

pub use client::TableStoreClient;
pub use worker::{RemoteEvent, RemoteOp, RemoteWorker};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote snapshot service is not configured: {0}")]
    MissingConfig(&'static str),
    #[error("remote service answered HTTP {status}")]
    Http { status: u16, body: String },
    #[error("could not reach remote service: {0}")]
    Transport(String),
    #[error("no snapshot has been published yet")]
    NoRecords,
    #[error("latest snapshot has no json field")]
    MissingJson,
    #[error("latest snapshot is not a board: {0}")]
    Invalid(#[from] SnapshotError),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

/// A store of timestamp-named snapshot records.
pub trait SnapshotService: Send {
    fn publish(&self, name: &str, json: &str) -> Result<(), RemoteError>;
    /// Raw `json` field of the most recently created record.
    fn fetch_latest(&self) -> Result<String, RemoteError>;
}

/// `YYYY-MM-DD HH:MM:SS` in UTC, the record name used when publishing.
pub fn snapshot_name(now: OffsetDateTime) -> String {
    let utc = now.to_offset(time::UtcOffset::UTC);
    utc.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}


#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn snapshot_names_are_utc_seconds() {
        assert_eq!(
            snapshot_name(datetime!(2025-06-10 09:05:07 +02:00)),
            "2025-06-10 07:05:07"
        );
    }
}
