//! Atomic JSON persistence for the small files in the data directory.
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! crash mid-write leaves either the old or the new content, never a torn file.
//!
//! Writes to one path are serialized, and a write that has reached the
//! blocking pool finishes even if the caller stops waiting for it. A later
//! write or removal of the same path therefore always lands last.

use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock, Mutex},
};

use serde::{Serialize, de::DeserializeOwned};

use crate::Result;

/// Who may read a persisted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Default permissions for the process umask.
    Normal,
    /// Owner read/write only (0600 on unix). Used for the token vault.
    Private,
}

/// Read and deserialize `path`, returning `None` if it does not exist.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub async fn write_json<T: Serialize>(path: &Path, value: &T, visibility: Visibility) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, bytes, visibility).await
}

type PathLocks = Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>;

static PATH_LOCKS: LazyLock<PathLocks> = LazyLock::new(Default::default);

fn path_lock(path: &Path) -> Arc<tokio::sync::Mutex<()>> {
    PATH_LOCKS
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .entry(path.to_path_buf())
        .or_default()
        .clone()
}

/// Atomically replace `path` with `bytes`, creating parent directories.
pub async fn write_atomic(path: &Path, bytes: Vec<u8>, visibility: Visibility) -> Result<()> {
    let path = path.to_path_buf();
    // Moved into the blocking task: released only once the rename is done.
    let guard = path_lock(&path).lock_owned().await;
    tokio::task::spawn_blocking(move || {
        let _guard = guard;
        write_atomic_blocking(&path, &bytes, visibility)
    })
    .await
    .map_err(std::io::Error::other)?
}

fn write_atomic_blocking(path: &Path, bytes: &[u8], visibility: Visibility) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    #[cfg(unix)]
    if visibility == Visibility::Private {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = visibility;

    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Delete `path`, treating a missing file as success.
pub async fn remove_if_exists(path: &Path) -> Result<()> {
    let path = path.to_path_buf();
    let guard = path_lock(&path).lock_owned().await;
    tokio::task::spawn_blocking(move || {
        let _guard = guard;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    })
    .await
    .map_err(std::io::Error::other)?
}
