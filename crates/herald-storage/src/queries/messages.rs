// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message record persistence.

use herald_core::{HeraldError, Message, MessageCriteria, MessageId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::{
    encode_json, encode_opt_ts, encode_ts, json_column, opt_json_column, opt_ts_column,
    parsed_column, ts_column,
};

const COLUMNS: &str = "id, type, mime, direction, state, mode, sender, recipients, cc, bcc, \
     subject, body, sent_at, failed_at, result, transport, queue_name, priority, options, hash, \
     created_at, updated_at";

const INSERT: &str = "INSERT INTO messages (id, type, mime, direction, state, mode, sender, \
     recipients, cc, bcc, subject, body, sent_at, failed_at, result, transport, queue_name, \
     priority, options, hash, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, \
     ?19, ?20, ?21, ?22)";

const UPSERT_TAIL: &str = " ON CONFLICT(id) DO UPDATE SET
     type = excluded.type, mime = excluded.mime, direction = excluded.direction,
     state = excluded.state, mode = excluded.mode, sender = excluded.sender,
     recipients = excluded.recipients, cc = excluded.cc, bcc = excluded.bcc,
     subject = excluded.subject, body = excluded.body, sent_at = excluded.sent_at,
     failed_at = excluded.failed_at, result = excluded.result, transport = excluded.transport,
     queue_name = excluded.queue_name, priority = excluded.priority, options = excluded.options,
     hash = excluded.hash, updated_at = excluded.updated_at";

/// Result of a write that may collide with the unique hash index.
enum WriteOutcome {
    Written,
    DuplicateHash,
}

/// Insert a new record. A record with the same hash yields [`HeraldError::DuplicateKey`].
pub async fn insert_message(db: &Database, message: &Message) -> Result<(), HeraldError> {
    write(db, message, INSERT.to_string()).await
}

/// Insert or update a record by id.
pub async fn save_message(db: &Database, message: &Message) -> Result<(), HeraldError> {
    write(db, message, format!("{INSERT}{UPSERT_TAIL}")).await
}

async fn write(db: &Database, message: &Message, sql: String) -> Result<(), HeraldError> {
    let msg = message.clone();
    let hash = message.hash.clone();
    let outcome = db
        .connection()
        .call(move |conn| -> Result<WriteOutcome, rusqlite::Error> {
            let result = conn.execute(
                &sql,
                params![
                    msg.id.as_str(),
                    msg.message_type.to_string(),
                    msg.mime.to_string(),
                    msg.direction.to_string(),
                    msg.state.to_string(),
                    msg.mode.to_string(),
                    msg.from,
                    encode_json(&msg.to)?,
                    encode_json(&msg.cc)?,
                    encode_json(&msg.bcc)?,
                    msg.subject,
                    msg.body,
                    encode_opt_ts(msg.sent_at.as_ref()),
                    encode_opt_ts(msg.failed_at.as_ref()),
                    msg.result.as_ref().map(encode_json).transpose()?,
                    msg.transport,
                    msg.queue_name,
                    msg.priority.to_string(),
                    msg.options.as_ref().map(encode_json).transpose()?,
                    msg.hash,
                    encode_ts(&msg.created_at),
                    encode_ts(&msg.updated_at),
                ],
            );
            match result {
                Ok(_) => Ok(WriteOutcome::Written),
                Err(e) if is_hash_conflict(&e) => Ok(WriteOutcome::DuplicateHash),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        WriteOutcome::Written => Ok(()),
        WriteOutcome::DuplicateHash => Err(HeraldError::DuplicateKey { hash }),
    }
}

fn is_hash_conflict(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, Some(msg)) => {
            err.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("messages.hash")
        }
        _ => false,
    }
}

/// Fetch a record by id.
pub async fn get_message(db: &Database, id: &MessageId) -> Result<Option<Message>, HeraldError> {
    let id = id.as_str().to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Message>, rusqlite::Error> {
            let sql = format!("SELECT {COLUMNS} FROM messages WHERE id = ?1");
            conn.query_row(&sql, params![id], row_to_message).optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch every record matching `criteria`, oldest first.
pub async fn find_messages(
    db: &Database,
    criteria: &MessageCriteria,
) -> Result<Vec<Message>, HeraldError> {
    let (sql, values) = build_query(criteria);
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(params_from_iter(values), row_to_message)?
                .collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Translate criteria into a parameterized SELECT.
fn build_query(criteria: &MessageCriteria) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    let mut eq = |column: &str, value: String, clauses: &mut Vec<String>| {
        values.push(Value::Text(value));
        clauses.push(format!("{column} = ?{}", values.len()));
    };

    if let Some(t) = criteria.message_type {
        eq("type", t.to_string(), &mut clauses);
    }
    if let Some(d) = criteria.direction {
        eq("direction", d.to_string(), &mut clauses);
    }
    if let Some(s) = criteria.state {
        eq("state", s.to_string(), &mut clauses);
    }
    if let Some(m) = criteria.mode {
        eq("mode", m.to_string(), &mut clauses);
    }
    if let Some(q) = &criteria.queue_name {
        eq("queue_name", q.clone(), &mut clauses);
    }
    if let Some(t) = &criteria.transport {
        eq("transport", t.clone(), &mut clauses);
    }
    if let Some(f) = &criteria.from {
        eq("sender", f.clone(), &mut clauses);
    }
    if let Some(h) = &criteria.hash {
        eq("hash", h.clone(), &mut clauses);
    }

    if let Some(ids) = &criteria.ids {
        if ids.is_empty() {
            clauses.push("0".to_string());
        } else {
            let placeholders: Vec<String> = ids
                .iter()
                .map(|id| {
                    values.push(Value::Text(id.as_str().to_string()));
                    format!("?{}", values.len())
                })
                .collect();
            clauses.push(format!("id IN ({})", placeholders.join(", ")));
        }
    }

    match criteria.sent {
        Some(true) => clauses.push("sent_at IS NOT NULL".to_string()),
        Some(false) => clauses.push("sent_at IS NULL".to_string()),
        None => {}
    }

    let mut sql = format!("SELECT {COLUMNS} FROM messages");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at ASC, id ASC");
    if let Some(limit) = criteria.limit {
        values.push(Value::Integer(i64::from(limit)));
        sql.push_str(&format!(" LIMIT ?{}", values.len()));
    }
    (sql, values)
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId(row.get(0)?),
        message_type: parsed_column(row, 1)?,
        mime: parsed_column(row, 2)?,
        direction: parsed_column(row, 3)?,
        state: parsed_column(row, 4)?,
        mode: parsed_column(row, 5)?,
        from: row.get(6)?,
        to: json_column(row, 7)?,
        cc: json_column(row, 8)?,
        bcc: json_column(row, 9)?,
        subject: row.get(10)?,
        body: row.get(11)?,
        sent_at: opt_ts_column(row, 12)?,
        failed_at: opt_ts_column(row, 13)?,
        result: opt_json_column(row, 14)?,
        transport: row.get(15)?,
        queue_name: row.get(16)?,
        priority: parsed_column(row, 17)?,
        options: opt_json_column(row, 18)?,
        hash: row.get(19)?,
        created_at: ts_column(row, 20)?,
        updated_at: ts_column(row, 21)?,
    })
}
