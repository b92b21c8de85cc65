use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::board::CardId;

#[derive(Debug)]
struct UploadJob {
    card_id: CardId,
    path: PathBuf,
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    Ready { card_id: CardId, data_uri: String },
    Failed { card_id: CardId, message: String },
}

/// Reads and encodes image files off the interaction thread.
///
/// Results are drained with [`ImageUploads::poll`]; a failed upload never
/// touches the board.
#[derive(Debug)]
pub struct ImageUploads {
    jobs: Option<Sender<UploadJob>>,
    pending: AtomicUsize,
    events: Receiver<UploadEvent>,
    worker: Option<JoinHandle<()>>,
}

impl ImageUploads {
    pub fn spawn(max_bytes: usize) -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<UploadJob>();
        let (event_tx, event_rx) = unbounded::<UploadEvent>();
        let worker = thread::Builder::new()
            .name("daynote-uploads".into())
            .spawn(move || {
                for job in job_rx {
                    let event = match encode_image_file(&job.path, max_bytes) {
                        Ok(data_uri) => UploadEvent::Ready {
                            card_id: job.card_id,
                            data_uri,
                        },
                        Err(err) => {
                            tracing::warn!(?err, path = %job.path.display(), "image upload failed");
                            UploadEvent::Failed {
                                card_id: job.card_id,
                                message: format!("{err:#}"),
                            }
                        }
                    };
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
            })
            .context("spawning image upload worker")?;
        Ok(Self {
            jobs: Some(job_tx),
            pending: AtomicUsize::new(0),
            events: event_rx,
            worker: Some(worker),
        })
    }

    pub fn submit(&self, card_id: CardId, path: impl Into<PathBuf>) {
        let Some(jobs) = &self.jobs else {
            return;
        };
        let path = path.into();
        match jobs.send(UploadJob { card_id, path }) {
            Ok(()) => {
                self.pending.fetch_add(1, Ordering::SeqCst);
            }
            Err(_) => tracing::error!(card_id, "image upload worker is gone"),
        }
    }

    /// Submitted jobs whose event has not been drained yet.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn poll(&self) -> Vec<UploadEvent> {
        let events: Vec<UploadEvent> = self.events.try_iter().collect();
        self.pending.fetch_sub(events.len(), Ordering::SeqCst);
        events
    }

    /// Blocks until one event arrives; `None` right away when nothing is
    /// pending. Used by tests and the CLI.
    pub fn wait(&self) -> Option<UploadEvent> {
        if self.pending() == 0 {
            return None;
        }
        let event = self.events.recv().ok()?;
        self.pending.fetch_sub(1, Ordering::SeqCst);
        Some(event)
    }
}

impl Drop for ImageUploads {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

pub fn encode_image_file(path: &Path, max_bytes: usize) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
    if bytes.len() > max_bytes {
        bail!("image is {} bytes, limit is {max_bytes}", bytes.len());
    }
    let Some(mime) = sniff_image_type(&bytes) else {
        bail!("{} is not a png, jpeg, gif or webp image", path.display());
    };
    Ok(format!("data:{mime};base64,{}", BASE64.encode(&bytes)))
}

fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF8") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
