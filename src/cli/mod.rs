use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use etfscout::{interactions::Feedback, orchestrator::EtfAssistant, Config, Database};
use tracing::info;

pub mod commands;

#[derive(Parser)]
#[command(
    name = "etfscout",
    about = "ETF metric lookup and question answering",
    version = "0.1.0",
    author = "jdhiman"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show growth, value and dividend metrics for an ETF
    Lookup {
        /// Ticker symbol (case-insensitive)
        #[arg(short, long)]
        ticker: String,

        /// Print the metrics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask a free-text question about ETFs and log the interaction
    Ask {
        /// The question
        #[arg(short, long)]
        query: String,

        /// Feedback to record with the answer (prompted for when omitted)
        #[arg(short, long, value_enum)]
        feedback: Option<FeedbackArg>,
    },

    /// Show the most recent logged interactions
    History {
        /// Number of entries to show
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },

    /// Show interaction and feedback counts
    Stats,

    /// Interactive session: search tickers, ask questions, give feedback
    Interactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FeedbackArg {
    Up,
    Down,
    None,
}

impl FeedbackArg {
    pub fn into_feedback(self) -> Option<Feedback> {
        match self {
            FeedbackArg::Up => Some(Feedback::Positive),
            FeedbackArg::Down => Some(Feedback::Negative),
            FeedbackArg::None => None,
        }
    }
}

/// Execute CLI command against an open database
pub async fn run(command: Commands, config: &Config, db: &Database) -> Result<()> {
    let assistant = EtfAssistant::from_config(config, db)?;

    match command {
        Commands::Lookup { ticker, json } => {
            info!("Looking up {}", ticker);
            commands::lookup(&assistant, &ticker, json).await?;
        }
        Commands::Ask { query, feedback } => {
            info!("Answering question ({} chars)", query.len());
            commands::ask(&assistant, &query, feedback).await?;
        }
        Commands::History { limit } => {
            commands::history(assistant.logger(), limit).await?;
        }
        Commands::Stats => {
            commands::stats(assistant.logger()).await?;
        }
        Commands::Interactive => {
            info!("Starting interactive session");
            commands::interactive(&assistant).await?;
        }
    }
    Ok(())
}
