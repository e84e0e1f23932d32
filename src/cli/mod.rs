use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::config;

pub mod chat;
pub mod models;
pub mod refresh;
pub mod retrieve;
pub mod serve;

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat session in the terminal
    Chat {
        /// Model to use instead of the first cached one
        #[arg(long)]
        model: Option<String>,

        /// Number of passages to retrieve per question
        #[arg(long, value_parser = config::parse_top_k)]
        top_k: Option<usize>,
    },
    /// Run the chat API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Fetch the available models and overwrite the local cache
    RefreshModels {},
    /// List the locally cached models
    Models {},
    /// Run a single retrieval and save the raw response
    Retrieve {
        #[arg(long)]
        query: String,

        #[arg(long, default_value = "4", value_parser = config::parse_top_k)]
        k: usize,

        #[arg(long, default_value = "test_denser_retriever_output.json")]
        output: String,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

/// Installs the global subscriber. `RUST_LOG` wins over the default
/// directives.
pub fn init_tracing(default_directives: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directives.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // Handle each sub command
    match args.command {
        Some(Command::Chat { model, top_k }) => {
            chat::run(model, top_k).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port).await?;
        }
        Some(Command::RefreshModels {}) => {
            refresh::run().await?;
        }
        Some(Command::Models {}) => {
            models::run()?;
        }
        Some(Command::Retrieve { query, k, output }) => {
            retrieve::run(&query, k, &output).await?;
        }
        None => {
            chat::run(None, None).await?;
        }
    }

    Ok(())
}
