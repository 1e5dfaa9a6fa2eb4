//! Agent-facing memory actions.
//!
//! The agent calls tools as `TOOL: name(args)` in its response text. Only the
//! fact, stats and clear actions are exposed to the agent; pushing turns and
//! reading the context view are for the owning orchestrator.

use crate::memory::{ContextMessage, ConversationMemory};
use regex::Regex;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Prompt text describing the memory tools to the agent
pub const TOOL_CATALOG: &str = r#"Memory tools (persistent across sessions):
- TOOL: save_fact("key|value") - Remember a fact, e.g. save_fact("project_name|convmem")
- TOOL: read_fact("key") - Recall a fact saved earlier
- TOOL: memory_stats() - Show message, summary and fact counts
- TOOL: clear_memory() - Forget everything; use only when starting a completely new task
Values are stored exactly as written between the quotes, spaces included."#;

/// A parsed agent action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryAction {
    SaveFact { key: String, value: String },
    ReadFact { key: String },
    Stats,
    Clear,
}

/// Why a tool call could not be turned into an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No `TOOL: name(args)` in the text
    NoToolCall,
    UnknownTool(String),
    BadArguments { tool: String, expected: &'static str },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoToolCall => write!(f, "no tool call found"),
            Self::UnknownTool(name) => write!(f, "{}: Unknown tool", name),
            Self::BadArguments { tool, expected } => {
                write!(f, "{}: Format error, should be {}", tool, expected)
            }
        }
    }
}

impl MemoryAction {
    /// Parse the first `TOOL: name(args)` occurrence in `text`.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let tool_regex =
            Regex::new(r"TOOL:\s*(\w+)\s*\((.*)\)").map_err(|_| ParseError::NoToolCall)?;
        let caps = tool_regex.captures(text).ok_or(ParseError::NoToolCall)?;
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let args = unquote(caps.get(2).map(|m| m.as_str()).unwrap_or_default());

        match name {
            "save_fact" => {
                // Format: key|value (value may contain further '|')
                match args.split_once('|') {
                    Some((key, value)) => Ok(Self::SaveFact {
                        key: key.to_string(),
                        value: value.to_string(),
                    }),
                    None => Err(ParseError::BadArguments {
                        tool: name.to_string(),
                        expected: "key|value",
                    }),
                }
            }
            "read_fact" => Ok(Self::ReadFact {
                key: args.to_string(),
            }),
            "memory_stats" => Ok(Self::Stats),
            "clear_memory" => Ok(Self::Clear),
            other => Err(ParseError::UnknownTool(other.to_string())),
        }
    }
}

/// Strip surrounding whitespace and at most one matching pair of quotes.
fn unquote(args: &str) -> &str {
    let args = args.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = args
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    args
}

/// Shared handle to a `ConversationMemory`, serializing every mutation.
#[derive(Clone)]
pub struct MemoryTools {
    memory: Arc<RwLock<ConversationMemory>>,
}

impl MemoryTools {
    pub fn new(memory: ConversationMemory) -> Self {
        Self {
            memory: Arc::new(RwLock::new(memory)),
        }
    }

    pub fn from_shared(memory: Arc<RwLock<ConversationMemory>>) -> Self {
        Self { memory }
    }

    /// Get the underlying memory handle
    pub fn memory(&self) -> Arc<RwLock<ConversationMemory>> {
        self.memory.clone()
    }

    pub fn tool_catalog(&self) -> &'static str {
        TOOL_CATALOG
    }

    /// Execute a tool call if present in `response`.
    ///
    /// Returns `None` when the text holds no tool call; errors in the call
    /// itself come back as a message for the agent.
    pub async fn execute_tool_call(&self, response: &str) -> Option<String> {
        match MemoryAction::parse(response) {
            Ok(action) => Some(self.execute(action).await),
            Err(ParseError::NoToolCall) => None,
            Err(e) => Some(e.to_string()),
        }
    }

    pub async fn execute(&self, action: MemoryAction) -> String {
        match action {
            MemoryAction::SaveFact { key, value } => {
                self.memory.write().await.set_context(&key, &value).await;
                info!("Context saved: {}", key);
                format!("Saved '{}' to memory", key)
            }
            MemoryAction::ReadFact { key } => match self.memory.read().await.get_context(&key) {
                Some(value) if value.is_empty() => {
                    format!("'{}' is stored with an empty value", key)
                }
                Some(value) => value,
                None => format!("'{}' not found in memory", key),
            },
            MemoryAction::Stats => self.memory.read().await.get_stats().to_string(),
            MemoryAction::Clear => {
                self.memory.write().await.clear().await;
                "Memory cleared".to_string()
            }
        }
    }

    /// Push a raw dialogue turn (orchestrator only)
    pub async fn add_to_memory(&self, role: &str, content: &str) {
        self.memory.write().await.add_message(role, content).await;
    }

    /// Assembled context view for prompt construction (orchestrator only)
    pub async fn memory_context(&self) -> Vec<ContextMessage> {
        self.memory.read().await.get_context_messages()
    }

    /// Saved facts as a prompt block (orchestrator only)
    pub async fn persistent_context(&self) -> String {
        self.memory.read().await.persistent_context()
    }
}
