// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `herald status` command implementation.
//!
//! Reports adapter health, sent/unsent record totals and per-queue job
//! counts read straight from the database.

use std::io::IsTerminal;

use herald_core::{HealthStatus, HeraldError, JobQueue, MessageCriteria, PluginAdapter, QueueCounts};
use serde::Serialize;

use crate::runtime::Runtime;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub storage: String,
    pub transports: Vec<ComponentHealth>,
    pub sent: usize,
    pub unsent: usize,
    pub queues: Vec<QueueStatus>,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub name: String,
    #[serde(flatten)]
    pub counts: QueueCounts,
}

fn describe(status: &HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => "healthy".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
        HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
    }
}

/// Gather the status report.
pub async fn collect_status(
    runtime: &Runtime,
    queues: &[String],
) -> Result<StatusResponse, HeraldError> {
    let storage = match runtime.storage.health_check().await {
        Ok(status) => describe(&status),
        Err(e) => format!("unhealthy: {e}"),
    };

    let transports = runtime
        .engine
        .transports()
        .health()
        .await
        .into_iter()
        .map(|(name, status)| ComponentHealth {
            name,
            status: describe(&status),
        })
        .collect();

    let sent = runtime.engine.sent(MessageCriteria::all()).await?.len();
    let unsent = runtime.engine.unsent(MessageCriteria::all()).await?.len();

    let mut queue_status = Vec::with_capacity(queues.len());
    for name in queues {
        queue_status.push(QueueStatus {
            name: name.clone(),
            counts: runtime.storage.counts(name).await?,
        });
    }

    Ok(StatusResponse {
        storage,
        transports,
        sent,
        unsent,
        queues: queue_status,
    })
}

/// Run the `herald status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(
    runtime: &Runtime,
    queues: &[String],
    json: bool,
    plain: bool,
) -> Result<(), HeraldError> {
    let status = collect_status(runtime, queues).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&status)
            .map_err(|e| HeraldError::Internal(format!("failed to render status: {e}")))?;
        println!("{rendered}");
        return Ok(());
    }

    let use_color = !plain && std::io::stdout().is_terminal();
    print_status(&status, use_color);
    Ok(())
}

fn print_status(status: &StatusResponse, use_color: bool) {
    println!();
    println!("  herald status");
    println!("  {}", "-".repeat(35));
    println!("    Storage:  {}", paint(&status.storage, use_color));
    for transport in &status.transports {
        println!(
            "    {:<9} {}",
            format!("{}:", transport.name),
            paint(&transport.status, use_color)
        );
    }
    println!("    Records:  {} sent, {} unsent", status.sent, status.unsent);
    for queue in &status.queues {
        let c = &queue.counts;
        println!(
            "    Queue {}: {} pending, {} processing, {} completed, {} failed",
            queue.name, c.pending, c.processing, c.completed, c.failed
        );
    }
    println!();
}

fn paint(status: &str, use_color: bool) -> String {
    if !use_color {
        return status.to_string();
    }
    use colored::Colorize;
    if status == "healthy" {
        status.green().to_string()
    } else if status.starts_with("degraded") {
        status.yellow().to_string()
    } else {
        status.red().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_health() {
        assert_eq!(describe(&HealthStatus::Healthy), "healthy");
        assert_eq!(
            describe(&HealthStatus::Degraded("slow".into())),
            "degraded: slow"
        );
    }

    #[test]
    fn paint_without_color_is_identity() {
        assert_eq!(paint("unhealthy: down", false), "unhealthy: down");
    }

    #[test]
    fn queue_status_flattens_counts() {
        let queue = QueueStatus {
            name: "email".into(),
            counts: QueueCounts {
                pending: 2,
                ..QueueCounts::default()
            },
        };
        let json = serde_json::to_value(&queue).unwrap();
        assert_eq!(json["name"], "email");
        assert_eq!(json["pending"], 2);
    }
}
