// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `herald serve` command implementation.
//!
//! Opens the SQLite store and queue, starts the worker pool on the configured
//! queues, and runs until SIGINT or SIGTERM. Outcome events are logged as
//! they are published.

use herald_bus::EventEnvelope;
use herald_config::{HeraldConfig, LoggingConfig};
use herald_core::HeraldError;
use herald_dispatch::{Worker, install_signal_handler};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::runtime::Runtime;

/// Runs the `herald serve` command.
pub async fn run_serve(config: HeraldConfig) -> Result<(), HeraldError> {
    info!("starting herald serve");

    let runtime = Runtime::open(&config).await?;
    let cancel = install_signal_handler();

    let events = tokio::spawn(log_events(
        runtime.engine.events().subscribe(),
        cancel.clone(),
    ));

    let worker = Worker::new(runtime.engine.clone(), config.worker.clone());
    let result = worker.run(cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = events.await {
        warn!(error = %e, "event logger task failed");
    }
    runtime.shutdown().await?;

    let snapshot = result?;
    info!(
        completed = snapshot.completed,
        retried = snapshot.retried,
        failed = snapshot.failed,
        reclaimed = snapshot.reclaimed,
        "herald serve stopped"
    );
    Ok(())
}

/// Log every published event until cancelled.
async fn log_events(mut rx: broadcast::Receiver<EventEnvelope>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(envelope) => {
                    let message_id = envelope
                        .event
                        .message_id()
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    if envelope.event.is_error() {
                        warn!(event = envelope.name, message_id = %message_id, "dispatch event");
                    } else {
                        debug!(event = envelope.name, message_id = %message_id, "dispatch event");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event logger lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("herald={},warn", logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
