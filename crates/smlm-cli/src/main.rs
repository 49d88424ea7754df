mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smlm", about = "Single-molecule localization microscopy analysis")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show stack metadata
    Info(commands::info::InfoArgs),
    /// Localize particles in every frame and export the table
    Analyze(commands::analyze::AnalyzeArgs),
    /// Localize particles in single frames
    Preview(commands::preview::PreviewArgs),
    /// Print or save the default analysis config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Analyze(args) => commands::analyze::run(args),
        Commands::Preview(args) => commands::preview::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
