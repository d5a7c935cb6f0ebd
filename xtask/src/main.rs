use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod tasks;

#[derive(Parser)]
#[command(
    name = "segmetrics",
    about = "Segmentation scoring and mask inspection toolkit",
    author,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score predicted masks against ground truth masks
    Evaluate(tasks::evaluate::EvaluateArgs),
    /// Colour-code class masks, one file at a time
    View(tasks::view::ViewArgs),
    /// Overlay result masks on their source images
    Compare(tasks::compare::CompareArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Evaluate(args) => tasks::evaluate::run(args),
        Commands::View(args) => tasks::view::run(args),
        Commands::Compare(args) => tasks::compare::run(args),
    }
}
