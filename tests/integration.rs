//! Integration tests for conversation memory

use convmem::memory::{Message, SUMMARY_HEADER};
use convmem::{ConversationMemory, MemoryConfig, MemoryTools, Summarizer};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> MemoryConfig {
    MemoryConfig::new(dir.path().to_path_buf())
}

async fn open(config: MemoryConfig) -> ConversationMemory {
    ConversationMemory::open(config).await.unwrap()
}

/// Fifteen alternating turns with the default settings fold seven into one summary
#[tokio::test]
async fn test_default_compaction_scenario() {
    let dir = TempDir::new().unwrap();
    let mut memory = open(config_in(&dir)).await;

    for i in 0..15 {
        let role = if i % 2 == 0 { "user" } else { "assistant" };
        memory.add_message(role, &format!("msg{i}")).await;
    }

    assert_eq!(memory.messages().len(), 8);
    assert_eq!(memory.summaries().len(), 1);
    assert_eq!(memory.summaries()[0].message_count, 7);
    assert_eq!(memory.messages()[0].content, "msg7");

    let view = memory.get_context_messages();
    assert_eq!(view.len(), 9);
    assert_eq!(view[0].role, "system");
    assert!(view[0].content.starts_with(SUMMARY_HEADER));
    assert!(view[0].content.contains("user: msg0 | assistant: msg1"));
}

/// The log never holds the threshold count once `add_message` returns
#[tokio::test]
async fn test_log_stays_below_threshold() {
    let dir = TempDir::new().unwrap();
    let mut memory = open(config_in(&dir).with_summary_threshold(6)).await;

    let mut folded = 0;
    for i in 0..50 {
        let before = memory.messages().len() + 1;
        memory.add_message("user", &format!("turn {i}")).await;
        assert!(memory.messages().len() < 6);

        let total: usize = memory.summaries().iter().map(|s| s.message_count).sum();
        if total > folded {
            let old = total - folded;
            assert_eq!(old, before / 2);
            assert_eq!(old + memory.messages().len(), before);
            folded = total;
        }
    }
}

/// Reads do not change state or results
#[tokio::test]
async fn test_reads_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut memory = open(config_in(&dir)).await;
    for i in 0..20 {
        memory.add_message("user", &format!("m{i}")).await;
    }
    memory.set_context("k", "v").await;

    assert_eq!(memory.get_context_messages(), memory.get_context_messages());
    assert_eq!(memory.get_stats(), memory.get_stats());
}

/// A fresh instance sees the last window of messages, all facts and the last 10 summaries
#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir).with_summary_threshold(4);

    let mut memory = open(config.clone()).await;
    for i in 0..30 {
        memory.add_message("user", &format!("m{i}")).await;
    }
    memory.set_context("project", "convmem").await;
    memory.set_context("empty", "").await;
    assert!(memory.summaries().len() > 10);

    let messages = memory.messages().to_vec();
    let archived = memory.summaries()[memory.summaries().len() - 10..].to_vec();
    drop(memory);

    let reopened = open(config).await;
    assert_eq!(reopened.messages(), messages.as_slice());
    assert_eq!(reopened.summaries(), archived.as_slice());
    assert_eq!(reopened.get_context("project").as_deref(), Some("convmem"));
    assert_eq!(reopened.get_context("empty").as_deref(), Some(""));
    assert_eq!(reopened.get_context("missing"), None);
}

/// Only the most recent window of messages is written to disk
#[tokio::test]
async fn test_window_limits_persisted_messages() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir)
        .with_max_messages(5)
        .with_summary_threshold(50);

    let mut memory = open(config.clone()).await;
    for i in 0..12 {
        memory.add_message("user", &format!("m{i}")).await;
    }
    assert_eq!(memory.messages().len(), 12);

    let reopened = open(config).await;
    let contents: Vec<&str> = reopened.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["m7", "m8", "m9", "m10", "m11"]);
}

/// Latest write to a key wins
#[tokio::test]
async fn test_fact_overwrite() {
    let dir = TempDir::new().unwrap();
    let mut memory = open(config_in(&dir)).await;
    memory.set_context("k", "v1").await;
    memory.set_context("k", "v2").await;
    assert_eq!(memory.get_context("k").as_deref(), Some("v2"));
    assert_eq!(memory.get_stats().context_keys, vec!["k".to_string()]);
}

/// Clear wipes memory and leaves empty documents behind
#[tokio::test]
async fn test_clear_resets_everything() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let mut memory = open(config.clone()).await;
    for i in 0..20 {
        memory.add_message("user", &format!("m{i}")).await;
    }
    memory.set_context("k", "v").await;

    memory.clear().await;

    let stats = memory.get_stats();
    assert_eq!(stats.message_count, 0);
    assert_eq!(stats.summary_count, 0);
    assert!(stats.context_keys.is_empty());
    assert_eq!(stats.estimated_tokens, 0);

    let working: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config.context_file()).unwrap()).unwrap();
    assert_eq!(working["messages"], serde_json::json!([]));
    assert_eq!(working["context"], serde_json::json!({}));

    let archive: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config.summary_file()).unwrap()).unwrap();
    assert_eq!(archive["summaries"], serde_json::json!([]));

    let reopened = open(config).await;
    assert!(reopened.messages().is_empty());
    assert!(reopened.summaries().is_empty());
}

/// Corrupt documents start empty instead of failing
#[tokio::test]
async fn test_corrupt_documents_start_empty() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    std::fs::create_dir_all(config.memory_dir()).unwrap();
    std::fs::write(config.context_file(), "not json at all").unwrap();
    std::fs::write(config.summary_file(), "[1, 2,").unwrap();

    let mut memory = open(config.clone()).await;
    assert!(memory.messages().is_empty());
    assert!(memory.summaries().is_empty());

    memory.add_message("user", "fresh start").await;
    let reopened = open(config).await;
    assert_eq!(reopened.messages().len(), 1);
}

struct HeadlineSummarizer;

impl Summarizer for HeadlineSummarizer {
    fn summarize(&self, batch: &[Message]) -> String {
        format!("{} earlier turns", batch.len())
    }
}

/// A custom summarizer plugs into compaction without changing the trigger
#[tokio::test]
async fn test_custom_summarizer() {
    let dir = TempDir::new().unwrap();
    let mut memory = open(config_in(&dir).with_summary_threshold(4))
        .await
        .with_summarizer(HeadlineSummarizer);

    for i in 0..4 {
        memory.add_message("user", &format!("m{i}")).await;
    }
    assert_eq!(memory.summaries()[0].summary, "2 earlier turns");
    assert_eq!(memory.messages().len(), 2);
}

/// The agent-facing actions and the orchestrator entry points share one memory
#[tokio::test]
async fn test_tools_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let tools = MemoryTools::new(open(config.clone()).await);

    tools.add_to_memory("user", "remember my editor").await;
    let reply = tools
        .execute_tool_call(r#"Sure. TOOL: save_fact("editor|helix")"#)
        .await;
    assert_eq!(reply.as_deref(), Some("Saved 'editor' to memory"));

    assert_eq!(tools.memory_context().await.len(), 1);
    assert_eq!(
        tools.persistent_context().await,
        "[Persistent Context]\n- editor: helix"
    );

    let stats = tools.execute_tool_call("TOOL: memory_stats()").await.unwrap();
    assert!(stats.contains("- Messages: 1"));
    assert!(stats.contains("- Estimated Tokens: ~4"));

    let reopened = open(config).await;
    assert_eq!(reopened.get_context("editor").as_deref(), Some("helix"));
}
