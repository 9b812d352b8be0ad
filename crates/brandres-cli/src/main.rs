mod run;
mod status;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "brandres")]
#[command(about = "Resolve and publish brand logo assets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve every brand that is not finished yet, then publish the mapping.
    Run {
        /// Only resolve the brand with this slug.
        #[arg(long)]
        brand: Option<String>,
        /// Reset failed brands to pending before running.
        #[arg(long)]
        retry_failed: bool,
        /// Re-resolve finished brands; a mapping is only replaced by a
        /// more confident one.
        #[arg(long)]
        refresh: bool,
    },
    /// Print per-brand progress from the checkpoint.
    Status {
        #[arg(long)]
        brand: Option<String>,
    },
    /// Reset failed brands to pending without running.
    ResetFailed,
    /// Rewrite the mapping artifact from the checkpoint.
    Publish,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = brandres_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            brand,
            retry_failed,
            refresh,
        } => {
            let options = run::RunOptions {
                brand_filter: brand,
                retry_failed,
                refresh,
            };
            let summary = run::run_resolution(&config, &options).await?;
            println!("{summary}");
        }
        Commands::Status { brand } => status::run_status(&config, brand.as_deref()).await?,
        Commands::ResetFailed => status::run_reset_failed(&config).await?,
        Commands::Publish => status::run_publish(&config).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests;
