//! Single-file JSON ledger store.
//!
//! The whole ledger lives in one versioned JSON document next to a `<file>.lock` sidecar.
//! Every access takes an OS lock on the sidecar: shared for reads, exclusive for
//! transactions. A transaction reloads the file under the exclusive lock, runs against
//! that copy, writes it to `<file>.tmp` and renames it over the ledger file. Separate
//! processes (or separate stores in one process) on the same file therefore serialize,
//! and a crash mid-write leaves the previous file intact.

use fs2::FileExt;
use puc_core::{LedgerError, LedgerStore, LedgerTables, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LEDGER_FILE_VERSION_V1: u32 = 1;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LedgerFileV1 {
    version: u32,
    tables: LedgerTables,
}

#[derive(Serialize)]
struct LedgerFileRefV1<'a> {
    version: u32,
    tables: &'a LedgerTables,
}

fn storage_err(context: &str, path: &Path, e: impl std::fmt::Display) -> LedgerError {
    LedgerError::StorageError(format!("{context} {}: {e}", path.display()))
}

fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Held OS lock on the sidecar file; released on drop.
struct FileLock {
    file: File,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Durable [`LedgerStore`] backed by one JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileStore {
    /// Open the ledger at `path`. A missing file is an empty ledger; it is written on the
    /// first committed transaction. An existing file is validated now.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::at(path.into());
        if store.path.exists() {
            let _lock = store.lock(false)?;
            store.load()?;
        }
        Ok(store)
    }

    /// Create a new, empty ledger file. Refuses to overwrite an existing one.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::at(path.into());
        let _lock = store.lock(true)?;
        if store.path.exists() {
            return Err(LedgerError::StorageError(format!(
                "ledger file {} already exists",
                store.path.display()
            )));
        }
        store.persist(&LedgerTables::default())?;
        tracing::info!(path = %store.path.display(), "Created ledger file");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn at(path: PathBuf) -> Self {
        Self {
            lock_path: path.with_extension("lock"),
            path,
        }
    }

    /// Take the sidecar lock, creating the ledger directory on first use. Blocks until
    /// other holders release it.
    fn lock(&self, exclusive: bool) -> Result<FileLock> {
        if let Some(parent) = self.lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| storage_err("failed to create directory for", &self.path, e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| storage_err("failed to open lock", &self.lock_path, e))?;
        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(|e| storage_err("failed to lock", &self.lock_path, e))?;
        Ok(FileLock { file })
    }

    /// Current committed tables. Callers hold the lock.
    fn load(&self) -> Result<LedgerTables> {
        if !self.path.exists() {
            return Ok(LedgerTables::default());
        }
        let bytes = fs::read(&self.path).map_err(|e| storage_err("failed to read", &self.path, e))?;
        let file: LedgerFileV1 = serde_json::from_slice(&bytes)
            .map_err(|e| storage_err("failed to parse", &self.path, e))?;
        if file.version != LEDGER_FILE_VERSION_V1 {
            return Err(LedgerError::StorageError(format!(
                "unsupported ledger file version {} in {}",
                file.version,
                self.path.display()
            )));
        }
        Ok(file.tables)
    }

    fn persist(&self, tables: &LedgerTables) -> Result<()> {
        let doc = LedgerFileRefV1 {
            version: LEDGER_FILE_VERSION_V1,
            tables,
        };
        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| storage_err("failed to encode", &self.path, e))?;
        atomic_write(&self.path, &bytes).map_err(|e| storage_err("failed to write", &self.path, e))
    }
}

impl LedgerStore for JsonFileStore {
    fn read<T>(&self, f: impl FnOnce(&LedgerTables) -> T) -> Result<T> {
        if !self.path.exists() {
            return Ok(f(&LedgerTables::default()));
        }
        let _lock = self.lock(false)?;
        let tables = self.load()?;
        Ok(f(&tables))
    }

    fn transact<T>(&self, f: impl FnOnce(&mut LedgerTables) -> Result<T>) -> Result<T> {
        let _lock = self.lock(true)?;
        let committed = self.load()?;
        let mut working = committed.clone();
        let out = f(&mut working)?;
        if working != committed {
            self.persist(&working)?;
        }
        Ok(out)
    }
}
