use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use research_assistant::commands::{AskOptions, ask, serve_mcp, show_status};
use research_assistant::config::{Config, load_config, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "research-assistant")]
#[command(about = "A retrieval-augmented research assistant with MCP server")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to the platform config dir)
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Answer a question from the given documents
    Ask {
        /// The question to research
        query: String,
        /// Text file to ingest before answering (repeatable)
        #[arg(long = "document", short = 'd', value_name = "PATH")]
        documents: Vec<PathBuf>,
        /// Maximum number of sources per question
        #[arg(long)]
        max_sources: Option<usize>,
        /// Answer directly without decomposing the question
        #[arg(long)]
        no_reasoning: bool,
        /// Single-shot chat answer instead of multi-step research
        #[arg(long)]
        chat: bool,
        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start MCP server on stdio
    Serve,
    /// Show Ollama connectivity and retrieval settings
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout carries MCP traffic and answers, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = cli.config_dir.as_deref();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&load_config(config_dir)?)?;
            } else {
                run_interactive_config(&Config::resolve_dir(config_dir)?)?;
            }
        }
        Commands::Ask {
            query,
            documents,
            max_sources,
            no_reasoning,
            chat,
            json,
        } => {
            let options = AskOptions {
                query,
                documents,
                max_sources,
                use_reasoning: !no_reasoning,
                chat,
                json,
            };
            ask(&load_config(config_dir)?, &options).await?;
        }
        Commands::Serve => {
            serve_mcp(&load_config(config_dir)?).await?;
        }
        Commands::Status => {
            show_status(&load_config(config_dir)?).await?;
        }
    }

    Ok(())
}
