//! convmem CLI
//!
//! Inspect and drive a conversation memory workspace from the shell.

use clap::{Parser, Subcommand};
use convmem::{default_workspace_root, ConversationMemory, MemoryConfig, MemoryTools};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// convmem - bounded, durable conversation memory
#[derive(Parser, Debug)]
#[command(name = "convmem")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Workspace root; documents live under <root>/.memory/
    #[arg(short = 'w', long, global = true)]
    workspace: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raw messages kept on disk and in the context view
    #[arg(long, global = true)]
    max_messages: Option<usize>,

    /// Log length that triggers compaction
    #[arg(long, global = true)]
    threshold: Option<usize>,

    /// Verbose output: debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append a dialogue turn
    Add { role: String, content: String },
    /// Print the prompt-ready context view as JSON
    Context,
    /// Save a fact
    Set { key: String, value: String },
    /// Print a fact; exits with status 1 when it is not stored
    Get { key: String },
    /// Print memory statistics
    Stats,
    /// Print saved facts as a prompt block
    Facts,
    /// Forget everything
    Clear,
    /// Run an agent tool call, e.g. 'TOOL: read_fact("lang")'
    Tool { call: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let status = run(cli, &mut io::stdout()).await?;
    Ok(ExitCode::from(status))
}

/// Execute one subcommand, writing its output to `out`. Returns the process
/// exit status.
async fn run(cli: Cli, out: &mut impl Write) -> anyhow::Result<u8> {
    let config = resolve_config(&cli)?;
    debug!("Memory directory: {:?}", config.memory_dir());

    let mut memory = ConversationMemory::open(config).await?;

    match cli.command {
        Command::Add { role, content } => {
            memory.add_message(&role, &content).await;
            info!("Added {} message", role);
        }
        Command::Context => {
            let view = memory.get_context_messages();
            writeln!(out, "{}", serde_json::to_string_pretty(&view)?)?;
        }
        Command::Set { key, value } => {
            memory.set_context(&key, &value).await;
        }
        Command::Get { key } => match memory.get_context(&key) {
            Some(value) => writeln!(out, "{}", value)?,
            None => {
                eprintln!("'{}' not found in memory", key);
                return Ok(1);
            }
        },
        Command::Stats => writeln!(out, "{}", memory.get_stats())?,
        Command::Facts => writeln!(out, "{}", memory.persistent_context())?,
        Command::Clear => memory.clear().await,
        Command::Tool { call } => {
            let tools = MemoryTools::new(memory);
            match tools.execute_tool_call(&call).await {
                Some(output) => writeln!(out, "{}", output)?,
                None => {
                    eprintln!("No tool call found in input");
                    return Ok(1);
                }
            }
        }
    }

    Ok(0)
}

/// Merge config file, defaults and command-line overrides.
fn resolve_config(cli: &Cli) -> anyhow::Result<MemoryConfig> {
    let mut config = match (&cli.config, &cli.workspace) {
        (Some(path), _) => MemoryConfig::from_toml_file(path)?,
        (None, Some(root)) => MemoryConfig::new(root.clone()),
        (None, None) => MemoryConfig::new(default_workspace_root()?),
    };

    if let Some(root) = &cli.workspace {
        config.workspace_root = root.clone();
    }
    if let Some(max) = cli.max_messages {
        config = config.with_max_messages(max);
    }
    if let Some(threshold) = cli.threshold {
        config = config.with_summary_threshold(threshold);
    }
    config.validate()?;
    Ok(config)
}
