//! The conversation memory facade.
//!
//! Every mutation writes both documents before returning. Save failures are
//! logged and counted instead of propagated, so the in-memory state is always
//! authoritative for the running process.

use super::compact::{truncate_chars, Summarizer, Summary, TruncatingSummarizer};
use super::context_store::ContextStore;
use super::message_log::{Message, MessageLog};
use super::persistent::MemoryStore;
use crate::{MemoryConfig, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{error, info, warn};

/// Header of the synthetic system entry in the context view
pub const SUMMARY_HEADER: &str = "Previous conversation summary:\n";

/// Summaries surfaced in the context view
const CONTEXT_SUMMARY_COUNT: usize = 3;

/// Characters shown per summary in the context view
const CONTEXT_SUMMARY_CHARS: usize = 200;

const APPROX_CHARS_PER_TOKEN: usize = 4;

/// One entry of the prompt-ready context view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextMessage {
    pub role: String,
    pub content: String,
    /// `None` for the synthetic summary entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&Message> for ContextMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.clone(),
            content: message.content.clone(),
            timestamp: Some(message.timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub message_count: usize,
    pub summary_count: usize,
    pub context_keys: Vec<String>,
    /// Crude estimate: characters / 4, summed per message
    pub estimated_tokens: usize,
    /// Saves that failed since this instance was opened
    pub save_failures: u64,
}

impl fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = if self.context_keys.is_empty() {
            "none".to_string()
        } else {
            self.context_keys.join(", ")
        };
        writeln!(f, "Memory Stats:")?;
        writeln!(f, "- Messages: {}", self.message_count)?;
        writeln!(f, "- Summaries: {}", self.summary_count)?;
        writeln!(f, "- Context Keys: {}", keys)?;
        write!(f, "- Estimated Tokens: ~{}", self.estimated_tokens)?;
        if self.save_failures > 0 {
            write!(f, "\n- Failed Saves: {}", self.save_failures)?;
        }
        Ok(())
    }
}

/// Bounded, durable working memory for one agent process.
pub struct ConversationMemory {
    config: MemoryConfig,
    store: MemoryStore,
    log: MessageLog,
    summaries: Vec<Summary>,
    context: ContextStore,
    summarizer: Box<dyn Summarizer>,
    save_failures: u64,
}

impl ConversationMemory {
    /// Open memory rooted at `config.workspace_root`, hydrating from disk.
    ///
    /// Fails only on invalid configuration. Missing or corrupt documents start
    /// empty.
    pub async fn open(config: MemoryConfig) -> Result<Self> {
        config.validate()?;

        let store = MemoryStore::new(&config);
        if let Err(e) = store.ensure_dir().await {
            warn!("Could not create memory directory: {}", e);
        }
        let loaded = store.load().await;

        Ok(Self {
            log: MessageLog::from_messages(loaded.messages, config.summary_threshold),
            summaries: loaded.summaries,
            context: ContextStore::from_entries(loaded.context),
            summarizer: Box::new(TruncatingSummarizer::default()),
            save_failures: 0,
            store,
            config,
        })
    }

    /// Replace the summarizer used for compaction
    pub fn with_summarizer(mut self, summarizer: impl Summarizer + 'static) -> Self {
        self.summarizer = Box::new(summarizer);
        self
    }

    /// Record a dialogue turn, compacting and persisting as needed.
    pub async fn add_message(&mut self, role: &str, content: &str) {
        if let Some(summary) = self.log.append(role, content, self.summarizer.as_ref()) {
            self.summaries.push(summary);
        }
        self.persist().await;
    }

    /// Prompt-ready view: a summary digest (if any) then the recent window.
    pub fn get_context_messages(&self) -> Vec<ContextMessage> {
        let mut view = Vec::new();

        if !self.summaries.is_empty() {
            let start = self.summaries.len().saturating_sub(CONTEXT_SUMMARY_COUNT);
            let mut content = String::from(SUMMARY_HEADER);
            for s in &self.summaries[start..] {
                content.push_str("- ");
                content.push_str(truncate_chars(&s.summary, CONTEXT_SUMMARY_CHARS));
                content.push('\n');
            }
            view.push(ContextMessage {
                role: "system".to_string(),
                content,
                timestamp: None,
            });
        }

        view.extend(
            self.log
                .recent(self.config.max_messages)
                .iter()
                .map(ContextMessage::from),
        );
        view
    }

    pub async fn set_context(&mut self, key: &str, value: &str) {
        self.context.set(key, value);
        self.persist().await;
    }

    pub fn get_context(&self, key: &str) -> Option<String> {
        self.context.get(key).map(str::to_string)
    }

    /// Facts rendered for a system prompt; empty when there are none.
    pub fn persistent_context(&self) -> String {
        self.context.render()
    }

    /// Drop all messages, summaries and facts, and persist the empty state.
    pub async fn clear(&mut self) {
        self.log.clear();
        self.summaries.clear();
        self.context.clear();
        self.persist().await;
        info!("Memory cleared");
    }

    pub fn get_stats(&self) -> MemoryStats {
        MemoryStats {
            message_count: self.log.len(),
            summary_count: self.summaries.len(),
            context_keys: self.context.keys(),
            estimated_tokens: self
                .log
                .messages()
                .iter()
                .map(|m| m.content.chars().count() / APPROX_CHARS_PER_TOKEN)
                .sum(),
            save_failures: self.save_failures,
        }
    }

    /// Write the current state to disk. Returns whether the save succeeded.
    pub async fn persist(&mut self) -> bool {
        match self
            .store
            .save(self.log.messages(), &self.summaries, self.context.entries())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                self.save_failures += 1;
                error!(
                    "Memory save failed ({} failures so far): {}",
                    self.save_failures, e
                );
                false
            }
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn summaries(&self) -> &[Summary] {
        &self.summaries
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }
}
