//! Memory module for convmem
//!
//! Provides the message log, compaction, context facts, and persistent storage,
//! composed behind `ConversationMemory`.

mod compact;
mod context_store;
mod conversation;
mod message_log;
mod persistent;
mod timestamp;

pub use compact::{
    compact_messages, Summarizer, Summary, TruncatingSummarizer, SUMMARY_CONTENT_CHARS,
    SUMMARY_DELIMITER,
};
pub use context_store::{ContextEntry, ContextStore};
pub use conversation::{ContextMessage, ConversationMemory, MemoryStats, SUMMARY_HEADER};
pub use message_log::{Message, MessageLog};
pub use persistent::{LoadedState, MemoryStore, SUMMARY_ARCHIVE_LIMIT};
