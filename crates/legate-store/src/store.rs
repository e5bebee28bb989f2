use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use legate_openai::Message;

use crate::error::Result;

/// Snapshot of one conversation thread as last fetched from the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// On-disk document: a single JSON file holding every known thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreDocument {
    threads: HashMap<String, ThreadRecord>,
}

/// File-backed store for conversation snapshots.
///
/// The whole document is rewritten on every save via a sibling temp file and
/// rename, so readers never observe a torn write. There is no cross-process
/// locking; a single writer is assumed.
pub struct ThreadStore {
    path: PathBuf,
}

impl ThreadStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save the snapshot for a thread, preserving its original `created_at`
    /// and refreshing `updated_at`.
    pub async fn record_snapshot(&self, thread_id: &str, messages: &[Message]) -> Result<()> {
        let mut document = self.read_document().await?;
        let now = Utc::now();
        let created_at = document
            .threads
            .get(thread_id)
            .map(|record| record.created_at)
            .unwrap_or(now);

        document.threads.insert(
            thread_id.to_string(),
            ThreadRecord {
                messages: messages.to_vec(),
                created_at,
                updated_at: now,
            },
        );

        self.write_document(&document).await?;
        tracing::debug!(
            "Saved snapshot for thread {} ({} messages)",
            thread_id,
            messages.len()
        );
        Ok(())
    }

    /// Id of the most recently updated thread, if any.
    pub async fn most_recent_thread(&self) -> Result<Option<String>> {
        let document = self.read_document().await?;
        Ok(document
            .threads
            .iter()
            .max_by_key(|(_, record)| record.updated_at)
            .map(|(thread_id, _)| thread_id.clone()))
    }

    /// Stored record for a thread, if any.
    pub async fn load(&self, thread_id: &str) -> Result<Option<ThreadRecord>> {
        let document = self.read_document().await?;
        Ok(document.threads.get(thread_id).cloned())
    }

    /// A missing file is an empty store, not an error.
    async fn read_document(&self) -> Result<StoreDocument> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(StoreDocument::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn write_document(&self, document: &StoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let raw = serde_json::to_string_pretty(document)?;
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, raw).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "threads.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
