use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use crate::error::CheckpointError;
use crate::logging::LogContext;

/// File name used when the configured path is a directory
pub const CHECKPOINT_FILE_NAME: &str = "state.json";

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointState {
    last_block: u64,
}

/// Resolve the configured checkpoint location to a file path.
///
/// An existing directory, or a path ending in a separator, holds `state.json`.
/// Anything else is the checkpoint file itself.
pub fn resolve_checkpoint_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let raw = path.to_string_lossy();
    let names_directory = raw.ends_with('/') || raw.ends_with(MAIN_SEPARATOR) || path.is_dir();

    if names_directory {
        path.join(CHECKPOINT_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}

/// Durable "last fully processed block"
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    configured: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            configured: path.into(),
        }
    }

    /// Current location of the checkpoint file
    pub fn path(&self) -> PathBuf {
        resolve_checkpoint_path(&self.configured)
    }

    /// Persisted block number, or 0 when nothing has been saved yet
    pub fn load(&self) -> Result<u64, CheckpointError> {
        let path = self.path();

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                LogContext::new("checkpoint", "load")
                    .with_metadata("path", serde_json::json!(path.display().to_string()))
                    .debug("No checkpoint file, starting from 0");
                return Ok(0);
            }
            Err(source) => return Err(CheckpointError::Io { path, source }),
        };

        let state: CheckpointState =
            serde_json::from_str(&content).map_err(|e| CheckpointError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        Ok(state.last_block)
    }

    /// Persist `block_number`, replacing the previous value atomically
    pub fn save(&self, block_number: u64) -> Result<(), CheckpointError> {
        let path = self.path();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CheckpointError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let data = serde_json::to_vec(&CheckpointState {
            last_block: block_number,
        })?;

        let tmp = tmp_path(&path);
        write_atomic(&path, &tmp, &data).map_err(|(failed, source)| CheckpointError::Io { path: failed, source })?;

        LogContext::new("checkpoint", "save")
            .with_block_number(block_number)
            .trace("Checkpoint persisted");

        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Write to `tmp`, fsync, rename over `path`, then fsync the parent directory.
/// The temp file never outlives a failed attempt.
fn write_atomic(path: &Path, tmp: &Path, data: &[u8]) -> Result<(), (PathBuf, io::Error)> {
    // Leftover from an interrupted save
    let _ = fs::remove_file(tmp);

    let write_tmp = || -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(tmp)?;
        file.write_all(data)?;
        file.sync_all()
    };
    if let Err(e) = write_tmp() {
        if e.kind() != ErrorKind::AlreadyExists {
            let _ = fs::remove_file(tmp);
        }
        return Err((tmp.to_path_buf(), e));
    }

    if let Err(e) = fs::rename(tmp, path) {
        let _ = fs::remove_file(tmp);
        return Err((path.to_path_buf(), e));
    }

    fsync_parent(path).map_err(|e| (path.to_path_buf(), e))
}

#[cfg(target_family = "unix")]
fn fsync_parent(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::File::open(parent)?.sync_all()
}

#[cfg(not(target_family = "unix"))]
fn fsync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}
