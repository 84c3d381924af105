use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::types::AgentState;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Persists one [`AgentState`] per thread id so an interrupted run can be
/// resumed with its history intact. Saving overwrites; there is no version
/// chain.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, thread_id: &str, state: &AgentState) -> Result<(), CheckpointError>;
    async fn load(&self, thread_id: &str) -> Result<Option<AgentState>, CheckpointError>;
}

/// In-process store; state is lost on restart. The default when no
/// checkpoint directory is configured.
#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    threads: Mutex<HashMap<String, AgentState>>,
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointer {
    async fn save(&self, thread_id: &str, state: &AgentState) -> Result<(), CheckpointError> {
        self.threads
            .lock()
            .await
            .insert(thread_id.to_string(), state.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<AgentState>, CheckpointError> {
        Ok(self.threads.lock().await.get(thread_id).cloned())
    }
}

/// One JSON file per thread under a directory. Writes go to a temp file
/// first and are renamed into place, so a crash mid-write never leaves a
/// truncated checkpoint behind.
pub struct FileCheckpointer {
    dir: PathBuf,
    // Serializes write+rename pairs for the same directory.
    io: Mutex<()>,
}

impl FileCheckpointer {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            io: Mutex::new(()),
        })
    }

    fn path_for(&self, thread_id: &str) -> PathBuf {
        // Thread ids come from callers; keep only filesystem-safe chars.
        let safe: String = thread_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointer {
    async fn save(&self, thread_id: &str, state: &AgentState) -> Result<(), CheckpointError> {
        let path = self.path_for(thread_id);
        let bytes = serde_json::to_vec_pretty(state)?;
        let _guard = self.io.lock().await;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(thread_id, path = %path.display(), "checkpoint saved");
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<AgentState>, CheckpointError> {
        let path = self.path_for(thread_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
