//! Checkpoint persistence keyed by session.
//!
//! A checkpoint holds the record as of the last executed stage and, when the
//! run is paused, the stage awaiting approval. Writes replace the previous
//! checkpoint for the session atomically.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use fs2::FileExt;
use tokio::sync::RwLock;

use crate::domain::{AuditRecord, Checkpoint};

/// Storage for per-session checkpoints
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Replace the checkpoint for `session`
    async fn save(&self, session: &str, record: &AuditRecord, pending_stage: Option<&str>)
        -> Result<()>;

    /// Load the checkpoint for `session`, if any
    async fn load(&self, session: &str) -> Result<Option<Checkpoint>>;

    /// Stage awaiting approval for `session`, if paused
    async fn get_pending(&self, session: &str) -> Result<Option<String>> {
        Ok(self
            .load(session)
            .await?
            .and_then(|checkpoint| checkpoint.pending_stage))
    }
}

/// Process-lifetime store
#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with a checkpoint
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(
        &self,
        session: &str,
        record: &AuditRecord,
        pending_stage: Option<&str>,
    ) -> Result<()> {
        let checkpoint = Checkpoint::new(session, record.clone(), pending_stage.map(String::from));
        self.entries
            .write()
            .await
            .insert(session.to_string(), checkpoint);
        Ok(())
    }

    async fn load(&self, session: &str) -> Result<Option<Checkpoint>> {
        Ok(self.entries.read().await.get(session).cloned())
    }
}

/// One JSON file per session, so a run paused by one process can be
/// approved by another.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Open (and create) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create checkpoint directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open the store under the configured home (`$SENTINELS_HOME/checkpoints`)
    pub fn open_default() -> Result<Self> {
        Self::open(crate::config::checkpoints_dir()?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the checkpoint file for a session
    pub fn checkpoint_path(&self, session: &str) -> Result<PathBuf> {
        validate_session(session)?;
        Ok(self.dir.join(format!("{}.json", session)))
    }

    fn lock_path(&self, session: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", session))
    }

    /// List sessions that have a checkpoint
    pub async fn list_sessions(&self) -> Result<Vec<String>> {
        let mut sessions = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(session) = name.strip_suffix(".json") {
                    sessions.push(session.to_string());
                }
            }
        }

        sessions.sort();
        Ok(sessions)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(
        &self,
        session: &str,
        record: &AuditRecord,
        pending_stage: Option<&str>,
    ) -> Result<()> {
        let path = self.checkpoint_path(session)?;
        let lock_path = self.lock_path(session);
        let dir = self.dir.clone();
        let checkpoint = Checkpoint::new(session, record.clone(), pending_stage.map(String::from));
        let json = serde_json::to_vec_pretty(&checkpoint).context("Failed to serialize checkpoint")?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            let lock = open_lock(&lock_path)?;
            FileExt::lock_exclusive(&lock)
                .with_context(|| format!("Failed to lock {}", lock_path.display()))?;

            // Write beside the target then rename so readers never see a partial file
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)
                .context("Failed to create temporary checkpoint file")?;
            tmp.write_all(&json).context("Failed to write checkpoint")?;
            tmp.flush().context("Failed to flush checkpoint")?;
            tmp.persist(&path)
                .with_context(|| format!("Failed to persist checkpoint: {}", path.display()))?;

            FileExt::unlock(&lock).context("Failed to release checkpoint lock")?;
            Ok(())
        })
        .await
        .context("Checkpoint writer task panicked")?
    }

    async fn load(&self, session: &str) -> Result<Option<Checkpoint>> {
        let path = self.checkpoint_path(session)?;
        let lock_path = self.lock_path(session);

        tokio::task::spawn_blocking(move || -> Result<Option<Checkpoint>> {
            if !path.exists() {
                return Ok(None);
            }

            let lock = open_lock(&lock_path)?;
            FileExt::lock_shared(&lock)
                .with_context(|| format!("Failed to lock {}", lock_path.display()))?;

            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read checkpoint: {}", path.display()))?;
            FileExt::unlock(&lock).context("Failed to release checkpoint lock")?;

            let checkpoint = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse checkpoint: {}", path.display()))?;
            Ok(Some(checkpoint))
        })
        .await
        .context("Checkpoint reader task panicked")?
    }
}

fn open_lock(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open lock file: {}", path.display()))
}

/// Session keys become file names, so keep them to a safe alphabet
pub fn validate_session(session: &str) -> Result<()> {
    if session.is_empty() {
        anyhow::bail!("Session key cannot be empty");
    }
    if session.len() > 128 {
        anyhow::bail!("Session key is longer than 128 characters");
    }
    if session.starts_with('.') {
        anyhow::bail!("Session key cannot start with '.'");
    }
    if !session
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        anyhow::bail!(
            "Invalid session key '{}': use letters, digits, '-', '_' or '.'",
            session
        );
    }
    Ok(())
}
