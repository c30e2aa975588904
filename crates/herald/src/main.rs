// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Herald - message lifecycle and dispatch engine.
//!
//! This is the binary entry point: a worker server plus one-shot commands
//! for creating, sending and requeueing messages.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod runtime;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use herald_config::HeraldConfig;
use herald_core::HeraldError;

use crate::commands::{FilterArgs, MessageArgs, RetryArgs};
use crate::runtime::Runtime;

/// Herald - message lifecycle and dispatch engine.
#[derive(Parser, Debug)]
#[command(name = "herald", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long = "config", id = "config_path", global = true)]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run queue workers until interrupted.
    Serve,
    /// Create a message and send it immediately.
    Send {
        #[command(flatten)]
        message: MessageArgs,
        /// Record a successful send without invoking the transport.
        #[arg(long)]
        fake: bool,
    },
    /// Create a message and queue it for a worker.
    Queue {
        #[command(flatten)]
        message: MessageArgs,
        /// Store for an external collector instead of enqueueing a job.
        #[arg(long)]
        pull: bool,
        #[command(flatten)]
        retry: RetryArgs,
    },
    /// Send every unsent message matching the filters now.
    Resend {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Queue every unsent message matching the filters.
    Requeue {
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        retry: RetryArgs,
    },
    /// Show storage health, record totals and queue depth.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Print the effective configuration.
    Config,
}

fn load_config(path: Option<&PathBuf>) -> HeraldConfig {
    let loaded = match path {
        Some(path) => herald_config::load_and_validate_path(path),
        None => herald_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            herald_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

async fn run(command: Commands, config: HeraldConfig) -> Result<(), HeraldError> {
    match command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Config => commands::run_config(&config),
        command => {
            let runtime = Runtime::open(&config).await?;
            let result = match command {
                Commands::Send { message, fake } => {
                    commands::run_send(&runtime, message, fake).await
                }
                Commands::Queue {
                    message,
                    pull,
                    retry,
                } => commands::run_queue(&runtime, message, pull, retry).await,
                Commands::Resend { filter } => commands::run_resend(&runtime, filter).await,
                Commands::Requeue { filter, retry } => {
                    commands::run_requeue(&runtime, filter, retry).await
                }
                Commands::Status { json, plain } => {
                    status::run_status(&runtime, &config.worker.queues, json, plain).await
                }
                Commands::Serve | Commands::Config => Ok(()),
            };
            runtime.shutdown().await?;
            result
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config_path.as_ref());
    serve::init_tracing(&config.logging);

    let Some(command) = cli.command else {
        println!("herald: use --help for available commands");
        return;
    };

    if let Err(e) = run(command, config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
