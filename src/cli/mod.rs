//! CLI commands for msgrelay using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{get_settings_path, load_settings, save_settings, Settings};
use crate::simulation::run_simulation;

/// msgrelay - request/response message router with relay side-channel.
#[derive(Parser)]
#[command(name = "msgrelay")]
#[command(version = "0.1.0")]
#[command(about = "Request/response message router with relay side-channel", long_about = None)]
pub struct Commands {
    /// Settings file (defaults to ~/.msgrelay/settings.json)
    #[arg(long, global = true, env = "MSGRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run callers, an echo worker and a relay consumer through one router
    Simulate {
        /// Number of concurrent requests
        #[arg(long)]
        requests: Option<usize>,

        /// Relay events emitted by the worker per request
        #[arg(long)]
        progress: Option<usize>,

        /// Per-request wait timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Artificial worker latency in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective settings
    Config,

    /// Write default settings to the settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    pub async fn run(self) -> Result<()> {
        let config = self.config;
        match self.command {
            Command::Simulate {
                requests,
                progress,
                timeout_ms,
                delay_ms,
                json,
            } => {
                let mut settings = load_settings(config.as_deref())?;
                if let Some(n) = requests {
                    settings.simulation.requests = n;
                }
                if let Some(n) = progress {
                    settings.simulation.progress_events = n;
                }
                if let Some(ms) = timeout_ms {
                    settings.queues.default_timeout_ms = ms;
                }
                if let Some(ms) = delay_ms {
                    settings.simulation.worker_delay_ms = ms;
                }
                crate::config::validate_settings(&settings)?;

                let report = run_simulation(&settings).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    println!("Requests:      {}", report.requests);
                    println!("Answered:      {}", report.answered);
                    println!("Timed out:     {}", report.timed_out);
                    println!("Failed:        {}", report.failed);
                    println!("Relay events:  {}", report.relay_events);
                    println!("Unmatched:     {}", report.stats.unmatched);
                    println!("Elapsed:       {} ms", report.elapsed_ms);
                }
                Ok(())
            }
            Command::Config => {
                let settings = load_settings(config.as_deref())?;
                println!("{}", serde_json::to_string_pretty(&settings)?);
                Ok(())
            }
            Command::Init { force } => {
                let path = match config {
                    Some(p) => p,
                    None => get_settings_path()?,
                };
                if path.exists() && !force {
                    anyhow::bail!(
                        "Settings already exist at {}. Use --force to overwrite.",
                        path.display()
                    );
                }
                save_settings(&Settings::default(), &path)?;
                println!("Wrote default settings to {}", path.display());
                Ok(())
            }
        }
    }
}
