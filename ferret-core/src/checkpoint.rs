//! Thread-keyed checkpointing of workflow state.
//!
//! A thread is a conversation: each run on a thread starts from the message
//! history the previous run left behind. [`InMemoryCheckpointer`] keeps snapshots
//! for the life of the process; [`FileCheckpointer`] writes one JSON file per
//! thread, atomically (write to a temp sibling, then rename).

use crate::error::CheckpointError;
use crate::state::WorkflowState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Stores the latest workflow state per thread.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn put(&self, thread_id: &str, state: &WorkflowState) -> Result<(), CheckpointError>;

    /// The latest snapshot for `thread_id`, or `None` for a new thread.
    async fn get(&self, thread_id: &str) -> Result<Option<WorkflowState>, CheckpointError>;
}

fn check_thread_id(thread_id: &str) -> Result<(), CheckpointError> {
    if thread_id.trim().is_empty() {
        return Err(CheckpointError::EmptyThreadId);
    }
    Ok(())
}

/// Process-local checkpoints.
#[derive(Default)]
pub struct InMemoryCheckpointer {
    threads: RwLock<HashMap<String, WorkflowState>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn put(&self, thread_id: &str, state: &WorkflowState) -> Result<(), CheckpointError> {
        check_thread_id(thread_id)?;
        self.threads
            .write()
            .await
            .insert(thread_id.to_string(), state.clone());
        Ok(())
    }

    async fn get(&self, thread_id: &str) -> Result<Option<WorkflowState>, CheckpointError> {
        check_thread_id(thread_id)?;
        Ok(self.threads.read().await.get(thread_id).cloned())
    }
}

/// Checkpoints stored as `<dir>/<thread>.json`.
pub struct FileCheckpointer {
    dir: PathBuf,
}

impl FileCheckpointer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(thread_id)))
    }
}

/// Map a thread id onto a file name. Bytes outside `[A-Za-z0-9_-]` are
/// percent-encoded so distinct ids never share a file.
fn file_stem(thread_id: &str) -> String {
    let mut stem = String::with_capacity(thread_id.len());
    for byte in thread_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }
    stem
}

fn storage(err: std::io::Error) -> CheckpointError {
    CheckpointError::Storage {
        message: err.to_string(),
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn put(&self, thread_id: &str, state: &WorkflowState) -> Result<(), CheckpointError> {
        check_thread_id(thread_id)?;
        let json =
            serde_json::to_string_pretty(state).map_err(|e| CheckpointError::Serialization {
                message: e.to_string(),
            })?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(storage)?;
        let path = self.path_for(thread_id);
        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(storage)?;
        tokio::fs::rename(&tmp, &path).await.map_err(storage)?;
        debug!(thread = %thread_id, path = %path.display(), "Checkpoint saved");
        Ok(())
    }

    async fn get(&self, thread_id: &str) -> Result<Option<WorkflowState>, CheckpointError> {
        check_thread_id(thread_id)?;
        let path = self.path_for(thread_id);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage(e)),
        };
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| CheckpointError::Serialization {
                message: format!("{}: {e}", path.display()),
            })
    }
}
