// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Append-only file store rooted at a fixed directory.
//!
//! Names are re-checked here even though the validator already screened
//! them: a name must be a single normal path component and the resolved
//! file must stay inside the canonical root, symlinks included.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Storage error types.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("File name {0:?} resolves outside the storage root")]
    PathEscape(String),

    #[error("Storage I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Appends payloads to files under a single root directory.
#[derive(Debug)]
pub struct AppendStore {
    /// Canonical storage root
    root: PathBuf,
    /// Per-file append locks
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AppendStore {
    /// Open a store at `root`, creating the directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        fs::create_dir_all(root).await?;
        let root = fs::canonicalize(root).await?;
        debug!(root = %root.display(), "Append store opened");

        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Canonical storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append `data` to the file `fname`, creating it if needed.
    ///
    /// Appends to the same name are serialized; existing content is never
    /// truncated.
    pub async fn append(&self, fname: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.resolve(fname).await?;

        let lock = self.lock_for(fname).await;
        let _held = lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(data).await?;
        file.sync_all().await?;

        debug!(fname = %fname, bytes = data.len(), "Appended to file");
        Ok(())
    }

    /// Resolve `fname` to a path that is guaranteed to be inside the root.
    pub async fn resolve(&self, fname: &str) -> Result<PathBuf, StoreError> {
        if !is_single_component(fname) {
            warn!(fname = ?fname, "Rejected file name with path structure");
            return Err(StoreError::PathEscape(fname.to_string()));
        }

        let path = self.root.join(fname);

        // An existing entry may be a symlink; follow it and re-check.
        match fs::canonicalize(&path).await {
            Ok(real) if real.parent() == Some(self.root.as_path()) => Ok(path),
            Ok(real) => {
                warn!(fname = %fname, target = %real.display(), "File resolves outside storage root");
                Err(StoreError::PathEscape(fname.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // A dangling symlink would be created through on open.
                match fs::symlink_metadata(&path).await {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        warn!(fname = %fname, "Dangling symlink in storage root");
                        Err(StoreError::PathEscape(fname.to_string()))
                    }
                    _ => Ok(path),
                }
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Drop lock entries no append is currently using.
    pub async fn prune_locks(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    async fn lock_for(&self, fname: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(fname.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// True if `name` is exactly one ordinary path component.
fn is_single_component(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
