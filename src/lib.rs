//! convmem - conversation memory for agents
//!
//! A bounded working memory that:
//! - Keeps recent dialogue turns available for prompting
//! - Compacts older turns into summaries so growth stays bounded
//! - Remembers named facts across sessions

pub mod memory;
pub mod tools;

pub use memory::{
    ContextMessage, ConversationMemory, MemoryStats, Message, Summarizer, Summary,
    TruncatingSummarizer,
};
pub use tools::{MemoryAction, MemoryTools, ParseError};

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default number of raw messages kept on disk and in the context view
pub const DEFAULT_MAX_MESSAGES: usize = 20;

/// Default log length at which compaction runs
pub const DEFAULT_SUMMARY_THRESHOLD: usize = 15;

/// Environment variable overriding the default workspace root
pub const WORKSPACE_ENV: &str = "CONVMEM_HOME";

/// Configuration for convmem
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Root directory; documents live under `<root>/.memory/`
    pub workspace_root: PathBuf,

    /// Window size: raw messages persisted and shown in the context view
    pub max_messages: usize,

    /// Compaction fires once the log reaches this many messages
    pub summary_threshold: usize,
}

/// On-disk shape of a config file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    workspace_root: Option<PathBuf>,
    max_messages: Option<usize>,
    summary_threshold: Option<usize>,
}

impl MemoryConfig {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            max_messages: DEFAULT_MAX_MESSAGES,
            summary_threshold: DEFAULT_SUMMARY_THRESHOLD,
        }
    }

    /// Load a TOML config file. Missing keys fall back to defaults, and a
    /// missing `workspace_root` falls back to [`default_workspace_root`].
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let root = match file.workspace_root {
            Some(root) => root,
            None => default_workspace_root()?,
        };

        let mut config = Self::new(root);
        if let Some(max) = file.max_messages {
            config.max_messages = max;
        }
        if let Some(threshold) = file.summary_threshold {
            config.summary_threshold = threshold;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn with_summary_threshold(mut self, threshold: usize) -> Self {
        self.summary_threshold = threshold;
        self
    }

    /// Reject settings that would make the window or compaction meaningless.
    ///
    /// `max_messages >= summary_threshold` is expected but not required.
    pub fn validate(&self) -> Result<()> {
        if self.max_messages == 0 {
            return Err(MemoryError::Config("max_messages must be at least 1".into()));
        }
        if self.summary_threshold < 2 {
            return Err(MemoryError::Config(
                "summary_threshold must be at least 2".into(),
            ));
        }
        Ok(())
    }

    /// Directory holding both documents
    pub fn memory_dir(&self) -> PathBuf {
        self.workspace_root.join(".memory")
    }

    /// Working-state document (recent messages + context facts)
    pub fn context_file(&self) -> PathBuf {
        self.memory_dir().join("context.json")
    }

    /// Summary-archive document
    pub fn summary_file(&self) -> PathBuf {
        self.memory_dir().join("summary.json")
    }
}

/// Resolve the default workspace root: `$CONVMEM_HOME`, else `~/.convmem`.
pub fn default_workspace_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var(WORKSPACE_ENV) {
        return Ok(PathBuf::from(root));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| MemoryError::Config("could not find home directory".into()))?;
    Ok(home.join(".convmem"))
}

/// Result type for convmem operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors that can occur in convmem
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
