//! Append-only run journal with file-based persistence.
//!
//! Each session gets a newline-delimited JSON (JSONL) file so the lifecycle of
//! an audit (started, stages, paused, approved, completed) can be inspected
//! after the fact.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::domain::{Event, EventType};

use super::checkpoint::validate_session;

/// File-based journal directory; one JSONL file per session
#[derive(Debug, Clone)]
pub struct RunJournal {
    dir: PathBuf,
}

impl RunJournal {
    /// Create or open a journal directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create journal directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open the journal under the configured home (`$SENTINELS_HOME/journal`)
    pub async fn open_default() -> Result<Self> {
        Self::open(crate::config::journal_dir()?).await
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to a session's events file
    pub fn events_path(&self, session: &str) -> Result<PathBuf> {
        validate_session(session)?;
        Ok(self.dir.join(format!("{}.jsonl", session)))
    }

    /// Append an event to its session's log
    pub async fn append(&self, event: &Event) -> Result<()> {
        let path = self.events_path(&event.session)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open events file: {}", path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Replay all events for a session in order
    pub async fn replay(&self, session: &str) -> Result<Vec<Event>> {
        let path = self.events_path(session)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path)
            .await
            .with_context(|| format!("Failed to open events file: {}", path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse event: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Get the last event of a specific type
    pub async fn last_event_of_type(
        &self,
        session: &str,
        event_type: EventType,
    ) -> Result<Option<Event>> {
        let events = self.replay(session).await?;
        Ok(events.into_iter().rev().find(|e| e.event_type == event_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_event_append_and_replay() {
        let temp = TempDir::new().unwrap();
        let journal = RunJournal::open(temp.path()).await.unwrap();

        journal
            .append(&Event::new("s1", None, EventType::RunStarted, "Run started"))
            .await
            .unwrap();
        journal
            .append(&Event::new(
                "s1",
                Some("discovery".to_string()),
                EventType::StageCompleted,
                "Stage completed",
            ))
            .await
            .unwrap();
        journal
            .append(&Event::new("other", None, EventType::RunStarted, "Other run"))
            .await
            .unwrap();

        let events = journal.replay("s1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::RunStarted);
        assert_eq!(events[1].stage.as_deref(), Some("discovery"));
    }

    #[tokio::test]
    async fn test_replay_missing_session_is_empty() {
        let temp = TempDir::new().unwrap();
        let journal = RunJournal::open(temp.path()).await.unwrap();
        assert!(journal.replay("never-ran").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_event_of_type() {
        let temp = TempDir::new().unwrap();
        let journal = RunJournal::open(temp.path()).await.unwrap();

        for summary in ["first pause", "second pause"] {
            journal
                .append(&Event::new("s1", None, EventType::RunPaused, summary))
                .await
                .unwrap();
        }

        let last = journal
            .last_event_of_type("s1", EventType::RunPaused)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.summary, "second pause");
    }
}
