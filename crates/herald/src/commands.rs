// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot subcommands: `send`, `queue`, `resend`, `requeue` and `config`.
//!
//! Records are printed to stdout as JSON, one document per command.

use std::str::FromStr;

use clap::Args;
use herald_config::HeraldConfig;
use herald_core::{
    BackoffPolicy, HeraldError, MessageCriteria, MessageType, Mime, Mode, NewMessage, Priority,
};
use herald_dispatch::{QueueOptions, SendOptions};
use serde::Serialize;

use crate::runtime::Runtime;

/// Fields of a new outbound message.
#[derive(Args, Debug, Clone)]
pub struct MessageArgs {
    /// Sender address.
    #[arg(long)]
    pub from: String,
    /// Recipient address (repeatable).
    #[arg(long, required = true)]
    pub to: Vec<String>,
    #[arg(long)]
    pub cc: Vec<String>,
    #[arg(long)]
    pub bcc: Vec<String>,
    #[arg(long)]
    pub subject: Option<String>,
    /// Message body. HTML bodies are detected automatically.
    #[arg(long)]
    pub body: String,
    /// EMAIL, SMS or PUSH.
    #[arg(long = "type", value_parser = parse_message_type, default_value = "EMAIL")]
    pub message_type: MessageType,
    /// Force the body content type instead of detecting it.
    #[arg(long, value_parser = parse_mime)]
    pub mime: Option<Mime>,
    /// Transport identifier. Defaults to `dispatch.default_transport`.
    #[arg(long)]
    pub transport: Option<String>,
    /// Queue name. Defaults to the lowercased type.
    #[arg(long = "queue")]
    pub queue_name: Option<String>,
    #[arg(long, value_parser = parse_priority, default_value = "normal")]
    pub priority: Priority,
}

impl MessageArgs {
    pub fn into_draft(self) -> NewMessage {
        let mut draft = NewMessage::new(self.from, self.to, self.body)
            .message_type(self.message_type)
            .cc(self.cc)
            .bcc(self.bcc)
            .priority(self.priority);
        draft.subject = self.subject;
        draft.transport = self.transport;
        draft.queue_name = self.queue_name;
        draft.mime = self.mime;
        draft
    }
}

/// Filters shared by `resend` and `requeue`.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only records on this queue.
    #[arg(long = "queue")]
    pub queue_name: Option<String>,
    #[arg(long = "type", value_parser = parse_message_type)]
    pub message_type: Option<MessageType>,
    /// Only records using this transport.
    #[arg(long)]
    pub transport: Option<String>,
    /// At most this many records, oldest first.
    #[arg(long)]
    pub limit: Option<u32>,
}

impl FilterArgs {
    pub fn criteria(&self) -> MessageCriteria {
        MessageCriteria {
            queue_name: self.queue_name.clone(),
            message_type: self.message_type,
            transport: self.transport.clone(),
            limit: self.limit,
            ..MessageCriteria::all()
        }
    }
}

/// Retry settings for queued jobs.
#[derive(Args, Debug, Clone, Default)]
pub struct RetryArgs {
    /// Maximum delivery attempts.
    #[arg(long)]
    pub attempts: Option<u32>,
    /// Fixed delay between attempts, in milliseconds.
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,
}

impl RetryArgs {
    pub fn options(&self) -> QueueOptions {
        let mut options = QueueOptions::default();
        if let Some(attempts) = self.attempts {
            options = options.attempts(attempts);
        }
        if let Some(delay_ms) = self.retry_delay_ms {
            options = options.backoff(BackoffPolicy::Fixed { delay_ms });
        }
        options
    }
}

fn parse_message_type(s: &str) -> Result<MessageType, String> {
    MessageType::from_str(&s.to_uppercase()).map_err(|_| format!("unknown message type '{s}'"))
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    Priority::from_str(&s.to_lowercase()).map_err(|_| format!("unknown priority '{s}'"))
}

fn parse_mime(s: &str) -> Result<Mime, String> {
    Mime::from_str(s).map_err(|_| format!("unknown mime type '{s}'"))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), HeraldError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| HeraldError::Internal(format!("failed to render output: {e}")))?;
    println!("{rendered}");
    Ok(())
}

/// `herald send`: create a record and send it immediately.
pub async fn run_send(
    runtime: &Runtime,
    message: MessageArgs,
    fake: bool,
) -> Result<(), HeraldError> {
    let created = runtime.engine.create(message.into_draft()).await?;
    let options = if fake {
        SendOptions::fake()
    } else {
        SendOptions::default()
    };
    let sent = runtime.engine.send(created, options).await?;
    print_json(&sent)
}

/// `herald queue`: create a record and hand it to the queue.
pub async fn run_queue(
    runtime: &Runtime,
    message: MessageArgs,
    pull: bool,
    retry: RetryArgs,
) -> Result<(), HeraldError> {
    let mut draft = message.into_draft();
    if pull {
        draft.mode = Mode::Pull;
    }
    let created = runtime.engine.create(draft).await?;
    let queued = runtime.engine.queue(created, retry.options()).await?;

    #[derive(Serialize)]
    struct Output<'a> {
        job: Option<i64>,
        message: &'a herald_core::Message,
    }
    print_json(&Output {
        job: queued.job.map(|j| j.0),
        message: &queued.message,
    })
}

/// `herald resend`: send every matching unsent record now.
pub async fn run_resend(runtime: &Runtime, filter: FilterArgs) -> Result<(), HeraldError> {
    let report = runtime.engine.resend(filter.criteria()).await?;

    #[derive(Serialize)]
    struct Failure {
        id: String,
        error: String,
    }
    #[derive(Serialize)]
    struct Output {
        sent: Vec<String>,
        failed: Vec<Failure>,
    }
    print_json(&Output {
        sent: report.sent.iter().map(|m| m.id.to_string()).collect(),
        failed: report
            .failed
            .iter()
            .map(|(id, e)| Failure {
                id: id.to_string(),
                error: e.to_string(),
            })
            .collect(),
    })
}

/// `herald requeue`: queue every matching unsent record.
///
/// Waits for the background queue tasks before returning so the process
/// does not exit with work in flight.
pub async fn run_requeue(
    runtime: &Runtime,
    filter: FilterArgs,
    retry: RetryArgs,
) -> Result<(), HeraldError> {
    let ticket = runtime
        .engine
        .requeue(filter.criteria(), retry.options())
        .await?;
    let matched: Vec<String> = ticket.matched.iter().map(ToString::to_string).collect();
    ticket.settled().await;
    print_json(&serde_json::json!({ "requeued": matched }))
}

/// `herald config`: print the effective configuration as TOML.
pub fn run_config(config: &HeraldConfig) -> Result<(), HeraldError> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| HeraldError::Config(format!("failed to render config: {e}")))?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> MessageArgs {
        MessageArgs {
            from: "a@x.com".into(),
            to: vec!["b@x.com".into(), " ".into()],
            cc: vec![],
            bcc: vec![],
            subject: Some("hi".into()),
            body: "<p>hello</p>".into(),
            message_type: MessageType::Email,
            mime: None,
            transport: None,
            queue_name: None,
            priority: Priority::High,
        }
    }

    #[test]
    fn message_args_build_a_draft() {
        let draft = args().into_draft();
        assert_eq!(draft.subject.as_deref(), Some("hi"));
        assert_eq!(draft.priority, Priority::High);

        let message = draft.transport("log").normalize().unwrap();
        assert_eq!(message.to, vec!["b@x.com"]);
        assert_eq!(message.mime, Mime::TextHtml);
        assert_eq!(message.queue_name, "email");
    }

    #[test]
    fn value_parsers_are_case_insensitive() {
        assert_eq!(parse_message_type("sms").unwrap(), MessageType::Sms);
        assert_eq!(parse_priority("CRITICAL").unwrap(), Priority::Critical);
        assert_eq!(parse_mime("text/html").unwrap(), Mime::TextHtml);
        assert!(parse_message_type("fax").is_err());
    }

    #[test]
    fn filter_args_select_unsent_candidates() {
        let filter = FilterArgs {
            queue_name: Some("urgent".into()),
            limit: Some(5),
            ..FilterArgs::default()
        };
        let criteria = filter.criteria();
        assert_eq!(criteria.queue_name.as_deref(), Some("urgent"));
        assert_eq!(criteria.limit, Some(5));
        assert_eq!(criteria.sent, None);
    }

    #[test]
    fn retry_args_map_to_queue_options() {
        let retry = RetryArgs {
            attempts: Some(7),
            retry_delay_ms: Some(250),
        };
        let options = retry.options();
        assert_eq!(options.attempts, Some(7));
        assert_eq!(options.backoff, Some(BackoffPolicy::Fixed { delay_ms: 250 }));
        assert_eq!(RetryArgs::default().options(), QueueOptions::default());
    }
}
