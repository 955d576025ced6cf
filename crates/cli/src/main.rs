//! Tumor board assistant CLI.
//!
//! Commands:
//! - `onboard`  Initialize config and the default template
//! - `chat`     Interactive or single-message conversation
//! - `export`   Generate a tumor board review for one patient
//! - `archive`  Move a conversation's artifacts to timestamped names
//! - `status`   Show the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "tumorboard",
    about = "Tumor board review assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and the default template
    Onboard {
        /// Where to write the template (defaults to the configured directory)
        #[arg(long)]
        templates_dir: Option<PathBuf>,
    },

    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Select this patient before the first message
        #[arg(short, long)]
        patient: Option<String>,
    },

    /// Generate a tumor board review document
    Export {
        /// Patient to export
        #[arg(short, long)]
        patient: String,

        /// JSON file with the document fields
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Reuse the artifacts of an earlier conversation
        #[arg(short, long)]
        conversation: Option<String>,

        /// Build the patient timeline before exporting
        #[arg(long)]
        timeline: bool,
    },

    /// Archive the artifacts of a conversation
    Archive {
        /// Conversation whose artifacts are moved
        conversation: String,
    },

    /// Show system status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard { templates_dir } => commands::onboard::run(templates_dir.as_deref()).await?,
        Commands::Chat { message, patient } => commands::chat::run(message, patient).await?,
        Commands::Export {
            patient,
            input,
            conversation,
            timeline,
        } => commands::export::run(patient, input, conversation, timeline).await?,
        Commands::Archive { conversation } => commands::archive::run(conversation).await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
