//! Local persistence of the card store as a single JSON snapshot.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use time::macros::format_description;
use time::Date;

use crate::board::CardStore;
use crate::config::{ConfigPaths, StorageOptions};

mod record;

pub use record::{decode_lenient, decode_remote, encode, encode_pretty, SnapshotError};

const SNAPSHOT_TMP_EXTENSION: &str = "json.tmp";

/// Where the serialized store lives between sessions.
pub trait SnapshotStore: Send + Sync {
    /// Raw record, or `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, json: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct StorageHandle {
    snapshot_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn export_dir(&self) -> &Path {
        &self.options.export_dir
    }

}

impl SnapshotStore for StorageHandle {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&*self.snapshot_path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err)
                .with_context(|| format!("reading snapshot {}", self.snapshot_path.display())),
        }
    }

    fn save(&self, json: &str) -> Result<()> {
        write_atomically(&self.snapshot_path, json.as_bytes())
    }
}

/// In-process store, handy for tests and dry runs.
#[derive(Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<String>>,
    fail_saves: Mutex<bool>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
            fail_saves: Mutex::new(false),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.slot.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail_saves.lock() = failing;
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, json: &str) -> Result<()> {
        if *self.fail_saves.lock() {
            bail!("snapshot storage unavailable");
        }
        *self.slot.lock() = Some(json.to_string());
        Ok(())
    }
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Arc<T> {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn save(&self, json: &str) -> Result<()> {
        (**self).save(json)
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let snapshot_path = if storage.snapshot_path.as_os_str().is_empty() {
        paths.snapshot_path.clone()
    } else {
        storage.snapshot_path.clone()
    };
    if let Some(parent) = snapshot_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let mut options = storage.clone();
    if options.export_dir.as_os_str().is_empty() {
        options.export_dir = paths.export_dir.clone();
    }
    Ok(StorageHandle {
        snapshot_path: Arc::new(snapshot_path),
        options: Arc::new(options),
    })
}

/// Writes a pretty snapshot named `daynote-YYYYMMDD.json` into `dir`.
pub fn export_snapshot(store: &CardStore, dir: &Path, today: Date) -> Result<PathBuf> {
    let stamp = today
        .format(format_description!("[year][month][day]"))
        .context("formatting export date")?;
    let path = dir.join(format!("daynote-{stamp}.json"));
    let json = encode_pretty(store).context("serialising export")?;
    write_atomically(&path, json.as_bytes())?;
    tracing::info!(path = %path.display(), cards = store.card_count(), "exported snapshot");
    Ok(path)
}

fn write_atomically(final_path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = final_path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("ensuring dir {}", dir.display()))?;
    }
    let tmp_path = final_path.with_extension(SNAPSHOT_TMP_EXTENSION);
    fs::write(&tmp_path, bytes)
        .with_context(|| format!("writing temporary snapshot {}", tmp_path.display()))?;
    fs::rename(&tmp_path, final_path)
        .with_context(|| format!("atomically persisting snapshot {}", final_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Card, CardContent};
    use tempfile::TempDir;
    use time::macros::date;

    fn init_storage() -> anyhow::Result<(TempDir, StorageHandle)> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::under(temp.path());
        paths.ensure_directories()?;
        let storage = init(&paths, &StorageOptions::default())?;
        Ok((temp, storage))
    }

    fn sample_store() -> CardStore {
        let mut store = CardStore::default();
        let id = store.mint_id();
        store.upsert(date!(2025 - 06 - 10), Card::new(id, CardContent::plain("Buy milk")));
        store
    }

    fn reload(storage: &StorageHandle) -> anyhow::Result<CardStore> {
        Ok(storage
            .load()?
            .map(|raw| decode_lenient(&raw))
            .unwrap_or_default())
    }

    #[test]
    fn missing_snapshot_loads_empty() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        assert!(storage.load()?.is_none());
        assert_eq!(reload(&storage)?, CardStore::default());
        Ok(())
    }

    #[test]
    fn saved_store_survives_reload() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let store = sample_store();
        storage.save(&encode(&store)?)?;
        assert!(!storage
            .snapshot_path()
            .with_extension(SNAPSHOT_TMP_EXTENSION)
            .exists());
        assert_eq!(reload(&storage)?, store);
        Ok(())
    }

    #[test]
    fn corrupt_file_loads_empty() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        fs::write(storage.snapshot_path(), "{\"cards\": 12")?;
        assert_eq!(reload(&storage)?, CardStore::default());
        Ok(())
    }

    #[test]
    fn export_uses_dated_file_name() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let path = export_snapshot(&sample_store(), storage.export_dir(), date!(2025 - 06 - 12))?;
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("daynote-20250612.json")
        );
        assert_eq!(decode_lenient(&fs::read_to_string(path)?), sample_store());
        Ok(())
    }

    #[test]
    fn memory_store_can_fail_saves() {
        let memory = MemorySnapshotStore::new();
        memory.set_failing(true);
        assert!(memory.save("{}").is_err());
        memory.set_failing(false);
        assert!(memory.save("{}").is_ok());
        assert_eq!(memory.contents().as_deref(), Some("{}"));
    }
}
