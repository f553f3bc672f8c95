//! CLI for the rebound retry executor demos.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rebound_core::config;
use rebound_core::retry::Cancellation;

use commands::{
    run_concurrent, run_http, run_orders, run_presets, run_simple, run_table,
};

/// Top-level CLI for the rebound demos.
#[derive(Debug, Parser)]
#[command(name = "rebound")]
#[command(about = "rebound: retry executor with exponential backoff and jitter", long_about = None)]
pub struct Cli {
    /// Retry profile: default, fast, slow, or a [profiles.<name>] entry from config.toml.
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Retry an operation that fails twice before succeeding.
    Simple,

    /// Retry HTTP requests against a local server that answers 503 twice.
    Http,

    /// Run several independent workers, each with its own retry loop.
    Concurrent {
        /// Number of workers.
        #[arg(long, default_value = "3", value_name = "N")]
        workers: usize,
    },

    /// Show the fast and slow presets and run an always-failing call with notifications.
    Presets,

    /// Create an order in an in-memory store with retried transactions.
    Orders {
        /// Customer id.
        #[arg(long, default_value = "customer-1")]
        customer: String,
        /// Order amount.
        #[arg(long, default_value = "100.0")]
        amount: f64,
    },

    /// Print the backoff wait for each attempt of a profile.
    Table {
        /// Number of attempt indices to print.
        #[arg(long, default_value = "8", value_name = "N")]
        attempts: u32,
    },

    /// Run the simple, http, concurrent and presets demos in order.
    All,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        // Ctrl-C cancels any retry wait in progress.
        let cancel = Cancellation::new();
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, cancelling");
                    cancel.cancel();
                }
            });
        }

        let profile = cli.profile.as_deref();
        match cli.command {
            CliCommand::Simple => run_simple(&cfg, profile, &cancel).await?,
            CliCommand::Http => run_http(&cfg, profile, &cancel).await?,
            CliCommand::Concurrent { workers } => run_concurrent(&cfg, profile, &cancel, workers).await?,
            CliCommand::Presets => run_presets(&cfg, profile, &cancel).await?,
            CliCommand::Orders { customer, amount } => {
                run_orders(&cfg, profile, &cancel, &customer, amount).await?
            }
            CliCommand::Table { attempts } => run_table(&cfg, profile, attempts)?,
            CliCommand::All => {
                println!("=== rebound retry examples ===\n");
                println!("1. Simple retry:");
                run_simple(&cfg, profile, &cancel).await?;
                println!("\n2. HTTP client retry:");
                run_http(&cfg, profile, &cancel).await?;
                println!("\n3. Concurrent retry:");
                run_concurrent(&cfg, profile, &cancel, 3).await?;
                println!("\n4. Policy presets:");
                run_presets(&cfg, profile, &cancel).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
