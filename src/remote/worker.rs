use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{RemoteError, SnapshotService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Publish,
    Fetch,
}

#[derive(Debug)]
enum RemoteJob {
    Publish { name: String, json: String },
    Fetch,
}

#[derive(Debug)]
pub enum RemoteEvent {
    Published { name: String },
    Fetched { json: String },
    Failed { op: RemoteOp, error: RemoteError },
}

/// Runs remote requests on a background thread so the board never waits on
/// the network. Completed requests are drained with [`RemoteWorker::poll`].
pub struct RemoteWorker {
    jobs: Option<Sender<RemoteJob>>,
    pending: AtomicUsize,
    events: Receiver<RemoteEvent>,
    worker: Option<JoinHandle<()>>,
}

impl RemoteWorker {
    pub fn spawn(service: Box<dyn SnapshotService>) -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<RemoteJob>();
        let (event_tx, event_rx) = unbounded::<RemoteEvent>();
        let worker = thread::Builder::new()
            .name("daynote-remote".into())
            .spawn(move || {
                for job in job_rx {
                    let event = match job {
                        RemoteJob::Publish { name, json } => {
                            match service.publish(&name, &json) {
                                Ok(()) => RemoteEvent::Published { name },
                                Err(error) => RemoteEvent::Failed {
                                    op: RemoteOp::Publish,
                                    error,
                                },
                            }
                        }
                        RemoteJob::Fetch => match service.fetch_latest() {
                            Ok(json) => RemoteEvent::Fetched { json },
                            Err(error) => RemoteEvent::Failed {
                                op: RemoteOp::Fetch,
                                error,
                            },
                        },
                    };
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
            })
            .context("spawning remote snapshot worker")?;
        Ok(Self {
            jobs: Some(job_tx),
            pending: AtomicUsize::new(0),
            events: event_rx,
            worker: Some(worker),
        })
    }

    pub fn publish(&self, name: String, json: String) {
        self.send(RemoteJob::Publish { name, json });
    }

    pub fn fetch(&self) {
        self.send(RemoteJob::Fetch);
    }

    fn send(&self, job: RemoteJob) {
        let Some(jobs) = &self.jobs else {
            return;
        };
        match jobs.send(job) {
            Ok(()) => {
                self.pending.fetch_add(1, Ordering::SeqCst);
            }
            Err(_) => tracing::error!("remote snapshot worker is gone"),
        }
    }

    /// Requests sent whose event has not been drained yet.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn poll(&self) -> Vec<RemoteEvent> {
        let events: Vec<RemoteEvent> = self.events.try_iter().collect();
        self.pending.fetch_sub(events.len(), Ordering::SeqCst);
        events
    }

    /// Blocks for the next completed request; `None` right away when no
    /// request is outstanding.
    pub fn wait(&self) -> Option<RemoteEvent> {
        if self.pending() == 0 {
            return None;
        }
        let event = self.events.recv().ok()?;
        self.pending.fetch_sub(1, Ordering::SeqCst);
        Some(event)
    }
}

impl Drop for RemoteWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
