use clap::{Args, Parser, Subcommand};
use quill_core::{TripType, Voice};
use std::path::PathBuf;

/// Command-line arguments for the quill CLI
#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Hotel review generation with provider fallback", long_about = None)]
pub struct Cli {
    /// Configuration file, overriding `QUILL_CONFIG` and `~/.quill/config.toml`
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand)]
pub enum Commands {
    /// Generate a review for one stay
    Generate(GenerateArgs),

    /// Show request, provider, cache and cost metrics
    Metrics,

    /// Check every configured provider and show the chain
    Providers,

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Review request fields
#[derive(Args)]
pub struct GenerateArgs {
    /// Hotel name
    pub hotel_name: String,

    /// Star rating from 1 to 5
    #[arg(short, long)]
    pub rating: u8,

    /// Purpose of the stay (leisure, business, family, couple, solo)
    #[arg(short, long)]
    pub trip_type: Option<TripType>,

    /// Something worth mentioning; repeat or separate with commas
    #[arg(long = "highlight", value_delimiter = ',')]
    pub highlights: Vec<String>,

    /// Length of the stay
    #[arg(long)]
    pub nights: Option<u32>,

    /// Party size
    #[arg(long)]
    pub guests: Option<u32>,

    /// Output language
    #[arg(short, long)]
    pub language: Option<String>,

    /// Tone (friendly, professional, enthusiastic, concise)
    #[arg(short, long)]
    pub voice: Option<Voice>,

    /// Session id used for A/B variant assignment
    #[arg(long)]
    pub session: Option<String>,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}
