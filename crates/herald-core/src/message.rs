// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message record and its pre-persist normalization.
//!
//! Callers build a [`NewMessage`] (or deserialize one from JSON, where
//! `to`/`cc`/`bcc` may be a single string or a list). [`NewMessage::normalize`]
//! turns it into a [`Message`] whose required fields are guaranteed present:
//!
//! 1. recipients are sequences (single strings become one-element lists),
//! 2. `queueName` falls back to the lower-cased `type`,
//! 3. `hash` is computed from the dedup projection when absent,
//! 4. `mime` is sniffed from the body when absent,
//!
//! and validation then rejects records with an empty `from`, `to`, or `body`.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HeraldError;
use crate::hash::Fingerprint;
use crate::types::{Direction, MessageId, MessageType, Mime, Mode, Priority, State};

/// Standard HTML element names, plus the common legacy ones.
const HTML_ELEMENTS: &str = "a|abbr|address|area|article|aside|audio|b|base|bdi|bdo|big|\
blockquote|body|br|button|canvas|caption|center|cite|code|col|colgroup|data|datalist|dd|\
del|details|dfn|dialog|div|dl|dt|em|embed|fieldset|figcaption|figure|font|footer|form|\
h[1-6]|head|header|hgroup|hr|html|i|iframe|img|input|ins|kbd|label|legend|li|link|main|\
map|mark|math|menu|meta|meter|nav|noscript|object|ol|optgroup|option|output|p|param|\
picture|pre|progress|q|rp|rt|ruby|s|samp|script|search|section|select|slot|small|source|\
span|strike|strong|style|sub|summary|sup|svg|table|tbody|td|template|textarea|tfoot|th|\
thead|time|title|tr|track|tt|u|ul|var|video|wbr";

static HTML_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)<!doctype\s+html|</?(?:{HTML_ELEMENTS})(?:\s[^<>]*)?/?>"
    ))
    .expect("HTML markup pattern is valid")
});

/// Returns true when the text contains recognizable HTML markup.
pub fn contains_html(text: &str) -> bool {
    HTML_MARKUP.is_match(text)
}

/// Pick the MIME type for a body: `text/html` if it carries markup, else `text/plain`.
pub fn detect_mime(body: &str) -> Mime {
    if contains_html(body) {
        Mime::TextHtml
    } else {
        Mime::TextPlain
    }
}

/// A recipient list that deserializes from either a single string or a list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany")]
pub struct Recipients(pub Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Recipients {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => Recipients(vec![s]),
            OneOrMany::Many(v) => Recipients(v),
        }
    }
}

impl From<&str> for Recipients {
    fn from(s: &str) -> Self {
        Recipients(vec![s.to_string()])
    }
}

impl From<String> for Recipients {
    fn from(s: String) -> Self {
        Recipients(vec![s])
    }
}

impl From<Vec<String>> for Recipients {
    fn from(v: Vec<String>) -> Self {
        Recipients(v)
    }
}

impl From<Vec<&str>> for Recipients {
    fn from(v: Vec<&str>) -> Self {
        Recipients(v.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Recipients {
    fn from(v: [&str; N]) -> Self {
        Recipients(v.iter().map(|s| s.to_string()).collect())
    }
}

impl Recipients {
    /// Trimmed, non-blank recipients in their original order.
    fn into_clean(self) -> Vec<String> {
        self.0
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect()
    }
}

/// A message as supplied by a caller, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(default)]
    pub id: Option<MessageId>,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub mime: Option<Mime>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub state: State,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: Recipients,
    #[serde(default)]
    pub cc: Recipients,
    #[serde(default)]
    pub bcc: Recipients,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub transport: Option<String>,
    #[serde(default)]
    pub queue_name: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
    #[serde(default)]
    pub hash: Option<String>,
}

impl NewMessage {
    /// Start a draft with the three required fields.
    pub fn new(from: impl Into<String>, to: impl Into<Recipients>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn cc(mut self, cc: impl Into<Recipients>) -> Self {
        self.cc = cc.into();
        self
    }

    pub fn bcc(mut self, bcc: impl Into<Recipients>) -> Self {
        self.bcc = bcc.into();
        self
    }

    pub fn transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    pub fn queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = Some(queue_name.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn mime(mut self, mime: Mime) -> Self {
        self.mime = Some(mime);
        self
    }

    pub fn options(mut self, options: serde_json::Value) -> Self {
        self.options = Some(options);
        self
    }

    /// Apply the pre-persist normalization steps and validate the result.
    ///
    /// Assigns a fresh id and timestamps if the draft has none.
    pub fn normalize(self) -> Result<Message, HeraldError> {
        let to = self.to.into_clean();
        let cc = self.cc.into_clean();
        let bcc = self.bcc.into_clean();

        let queue_name = match self.queue_name {
            Some(q) if !q.trim().is_empty() => q.trim().to_string(),
            _ => self.message_type.default_queue_name(),
        };

        let transport = self.transport.unwrap_or_default();

        let hash = match self.hash {
            Some(h) if !h.is_empty() => h,
            _ => Fingerprint {
                message_type: self.message_type,
                direction: self.direction,
                from: &self.from,
                to: &to,
                transport: &transport,
                queue_name: &queue_name,
                body: &self.body,
                priority: self.priority,
            }
            .compute(),
        };

        let mime = self.mime.unwrap_or_else(|| detect_mime(&self.body));

        let now = Utc::now();
        let message = Message {
            id: self.id.unwrap_or_else(MessageId::generate),
            message_type: self.message_type,
            mime,
            direction: self.direction,
            state: self.state,
            mode: self.mode,
            from: self.from,
            to,
            cc,
            bcc,
            subject: self.subject,
            body: self.body,
            sent_at: None,
            failed_at: None,
            result: None,
            transport,
            queue_name,
            priority: self.priority,
            options: self.options,
            hash,
            created_at: now,
            updated_at: now,
        };
        message.validate()?;
        Ok(message)
    }
}

/// A normalized, persistable message record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub mime: Mime,
    pub direction: Direction,
    pub state: State,
    pub mode: Mode,
    pub from: String,
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    pub transport: String,
    pub queue_name: String,
    pub priority: Priority,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Check the required-field invariants.
    pub fn validate(&self) -> Result<(), HeraldError> {
        if self.from.trim().is_empty() {
            return Err(HeraldError::validation("from", "sender must not be empty"));
        }
        if self.to.is_empty() {
            return Err(HeraldError::validation("to", "at least one recipient is required"));
        }
        if self.body.is_empty() {
            return Err(HeraldError::validation("body", "body must not be empty"));
        }
        if self.queue_name.is_empty() {
            return Err(HeraldError::validation("queueName", "queue name must not be empty"));
        }
        if self.hash.is_empty() {
            return Err(HeraldError::validation("hash", "hash must not be empty"));
        }
        Ok(())
    }

    /// The dedup projection of this record.
    pub fn fingerprint(&self) -> Fingerprint<'_> {
        Fingerprint {
            message_type: self.message_type,
            direction: self.direction,
            from: &self.from,
            to: &self.to,
            transport: &self.transport,
            queue_name: &self.queue_name,
            body: &self.body,
            priority: self.priority,
        }
    }

    /// Whether a transport has ever accepted this message.
    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Record a successful send. `sent_at` keeps its first value.
    pub fn mark_sent(&mut self, state: State, result: serde_json::Value) {
        let now = Utc::now();
        if self.sent_at.is_none() {
            self.sent_at = Some(now);
        }
        self.state = state;
        self.result = Some(result);
        self.updated_at = now;
    }

    /// Record a failed send. Overwrites any earlier `failed_at`.
    pub fn mark_failed(&mut self, result: serde_json::Value) {
        let now = Utc::now();
        self.failed_at = Some(now);
        self.result = Some(result);
        self.updated_at = now;
    }
}
