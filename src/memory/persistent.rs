//! Durable storage for conversation memory as two JSON documents.
//!
//! Layout under `<workspace_root>/.memory/`:
//!   context.json  - last N messages, all context facts, `updated`
//!   summary.json  - last 10 summaries, `updated`
//!
//! Each document is replaced atomically (temp file + rename). The pair is not:
//! a crash between the two renames leaves one document a save behind.

use super::compact::Summary;
use super::context_store::ContextEntry;
use super::message_log::Message;
use crate::{MemoryConfig, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Summaries kept in the archive document
pub const SUMMARY_ARCHIVE_LIMIT: usize = 10;

/// Attempts per document write when the error looks transient
const WRITE_ATTEMPTS: u32 = 3;

const RETRY_BACKOFF: Duration = Duration::from_millis(20);

#[derive(Debug, Default, Deserialize)]
struct WorkingStateDocument {
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    context: BTreeMap<String, ContextEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryArchiveDocument {
    #[serde(default)]
    summaries: Vec<Summary>,
}

#[derive(Serialize)]
struct WorkingStateRef<'a> {
    messages: &'a [Message],
    context: &'a BTreeMap<String, ContextEntry>,
    updated: String,
}

#[derive(Serialize)]
struct SummaryArchiveRef<'a> {
    summaries: &'a [Summary],
    updated: String,
}

/// State recovered from disk. Documents that were missing or unreadable
/// contribute empty defaults.
#[derive(Debug, Clone, Default)]
pub struct LoadedState {
    pub messages: Vec<Message>,
    pub summaries: Vec<Summary>,
    pub context: BTreeMap<String, ContextEntry>,
}

/// Reads and writes the two memory documents.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    memory_dir: PathBuf,
    context_file: PathBuf,
    summary_file: PathBuf,
    /// Messages written to the working-state document
    window: usize,
}

impl MemoryStore {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            memory_dir: config.memory_dir(),
            context_file: config.context_file(),
            summary_file: config.summary_file(),
            window: config.max_messages,
        }
    }

    pub fn context_file(&self) -> &Path {
        &self.context_file
    }

    pub fn summary_file(&self) -> &Path {
        &self.summary_file
    }

    /// Create the storage directory if needed.
    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.memory_dir).await?;
        Ok(())
    }

    /// Load both documents. Never fails: each document that is missing or
    /// malformed is replaced by its empty default.
    pub async fn load(&self) -> LoadedState {
        let working: WorkingStateDocument = read_document(&self.context_file)
            .await
            .unwrap_or_default();
        let archive: SummaryArchiveDocument = read_document(&self.summary_file)
            .await
            .unwrap_or_default();

        debug!(
            "Loaded memory: {} messages, {} summaries, {} context keys",
            working.messages.len(),
            archive.summaries.len(),
            working.context.len()
        );

        LoadedState {
            messages: working.messages,
            summaries: archive.summaries,
            context: working.context,
        }
    }

    /// Overwrite both documents with the given state.
    ///
    /// Only the most recent `window` messages and 10 summaries are written.
    pub async fn save(
        &self,
        messages: &[Message],
        summaries: &[Summary],
        context: &BTreeMap<String, ContextEntry>,
    ) -> Result<()> {
        self.ensure_dir().await?;

        let updated = Utc::now().to_rfc3339();
        let working = WorkingStateRef {
            messages: tail(messages, self.window),
            context,
            updated: updated.clone(),
        };
        let archive = SummaryArchiveRef {
            summaries: tail(summaries, SUMMARY_ARCHIVE_LIMIT),
            updated,
        };

        let working_json = serde_json::to_string_pretty(&working)?;
        let archive_json = serde_json::to_string_pretty(&archive)?;

        write_atomic(&self.context_file, working_json.as_bytes()).await?;
        write_atomic(&self.summary_file, archive_json.as_bytes()).await?;
        Ok(())
    }
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

async fn read_document<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No memory document at {}", path.display());
            return None;
        }
        Err(e) => {
            warn!("Memory load failed for {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!("Memory load failed for {}: {}", path.display(), e);
            None
        }
    }
}

fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}

/// Write `bytes` to `<path>.tmp` then rename over `path`, retrying transient
/// failures.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    write_with_retry(path, || write_once(path, bytes)).await?;
    Ok(())
}

/// Run `write` until it succeeds, fails with a non-transient error, or uses up
/// `WRITE_ATTEMPTS`.
async fn write_with_retry<F, Fut>(path: &Path, mut write: F) -> std::io::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    let mut attempt = 1;
    loop {
        match write().await {
            Ok(()) => return Ok(()),
            Err(e) if is_transient(e.kind()) && attempt < WRITE_ATTEMPTS => {
                warn!(
                    "Transient write error on {} (attempt {}/{}): {}",
                    path.display(),
                    attempt,
                    WRITE_ATTEMPTS,
                    e
                );
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn write_once(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = tmp_path(path);
    let result = write_and_rename(&tmp, path, bytes).await;
    if result.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }
    result
}

async fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(tmp, path).await
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
