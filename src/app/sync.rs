use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use super::{Board, NoticeLevel};
use crate::remote::{snapshot_name, RemoteError, RemoteEvent, RemoteOp};
use crate::storage;
use crate::view::ViewTree;

impl Board {
    /// Sends the whole store to the remote service in the background.
    pub fn publish_remote(&mut self, now: OffsetDateTime) -> bool {
        let Some(remote) = &self.remote else {
            self.report_remote_failure(
                RemoteOp::Publish,
                &RemoteError::MissingConfig("no remote service configured"),
            );
            return false;
        };
        let json = match storage::encode(&self.store) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(?err, "could not serialise store for publishing");
                return false;
            }
        };
        remote.publish(snapshot_name(now), json);
        true
    }

    /// Asks the remote service for its newest snapshot in the background.
    pub fn fetch_remote(&mut self) -> bool {
        let Some(remote) = &self.remote else {
            self.report_remote_failure(
                RemoteOp::Fetch,
                &RemoteError::MissingConfig("no remote service configured"),
            );
            return false;
        };
        remote.fetch();
        true
    }

    pub fn poll_remote(&mut self) -> usize {
        let events = match &self.remote {
            Some(remote) => remote.poll(),
            None => return 0,
        };
        let count = events.len();
        for event in events {
            // Failures are already turned into notices.
            let _ = self.apply_remote_event(event);
        }
        count
    }

    /// Blocks for one finished remote request; for callers without an event loop.
    pub fn wait_remote(&mut self) -> Option<Result<(), RemoteError>> {
        let event = self.remote.as_ref()?.wait()?;
        Some(self.apply_remote_event(event))
    }

    fn apply_remote_event(&mut self, event: RemoteEvent) -> Result<(), RemoteError> {
        match event {
            RemoteEvent::Published { name } => {
                self.notices
                    .blocking(NoticeLevel::Info, format!("Snapshot {name} published"));
                Ok(())
            }
            RemoteEvent::Fetched { json } => self.apply_remote_snapshot(&json),
            RemoteEvent::Failed { op, error } => {
                self.report_remote_failure(op, &error);
                Err(error)
            }
        }
    }

    /// Replaces the whole board with a fetched snapshot once it passes
    /// validation; the loaded store becomes the new undo baseline. A snapshot
    /// that fails validation is reported and local state stays untouched.
    pub fn apply_remote_snapshot(&mut self, raw: &str) -> Result<(), RemoteError> {
        let store = match storage::decode_remote(raw) {
            Ok(store) => store,
            Err(err) => {
                let error = RemoteError::from(err);
                self.report_remote_failure(RemoteOp::Fetch, &error);
                return Err(error);
            }
        };
        tracing::info!(cards = store.card_count(), "remote snapshot loaded");
        self.drag = None;
        self.highlight_until = None;
        self.store = store;
        self.history.reset();
        self.view = ViewTree::build(
            &self.store,
            self.range.start(),
            self.range.end(),
            self.today,
            self.options,
        );
        self.persist();
        self.notices
            .blocking(NoticeLevel::Info, "Remote snapshot loaded");
        Ok(())
    }

    fn report_remote_failure(&mut self, op: RemoteOp, error: &RemoteError) {
        tracing::error!(?op, %error, "remote snapshot request failed");
        let action = match op {
            RemoteOp::Publish => "Publishing the snapshot failed",
            RemoteOp::Fetch => "Loading the remote snapshot failed",
        };
        let detail = match error {
            RemoteError::MissingConfig(_) => "set remote.base_id, remote.table and an access token".to_string(),
            RemoteError::Http { status, .. } => format!("the service answered HTTP {status}"),
            RemoteError::Transport(_) => "the service could not be reached".to_string(),
            RemoteError::NoRecords => "there is no published snapshot yet".to_string(),
            RemoteError::MissingJson => "the newest record has no json field".to_string(),
            RemoteError::Invalid(_) => "the snapshot does not look like a board".to_string(),
        };
        self.notices
            .blocking(NoticeLevel::Error, format!("{action}: {detail}"));
    }

    /// Writes `daynote-YYYYMMDD.json` into `dir`.
    pub fn export(&mut self, dir: &Path) -> anyhow::Result<PathBuf> {
        self.commit_all_edits();
        storage::export_snapshot(&self.store, dir, self.today)
    }
}
