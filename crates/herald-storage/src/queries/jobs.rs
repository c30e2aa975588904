// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crash-safe job queue operations.
//!
//! Claimed jobs carry a `locked_until` deadline. A worker that dies mid-job
//! leaves the row in `processing` until [`reclaim_expired`] returns it to
//! `pending`, or marks it `failed` once its attempts are spent.

use std::time::Duration;

use chrono::Utc;
use herald_core::{
    BackoffPolicy, HeraldError, Job, JobId, JobStatus, NewJob, Priority, QueueCounts,
};
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::{encode_json, encode_ts, json_column, parsed_column, ts_column};

const JOB_COLUMNS: &str = "id, queue_name, payload, priority, status, attempts, max_attempts, \
     backoff, last_error, run_at, created_at, updated_at";

const LOCK_EXPIRED: &str = "lock expired on final attempt";

fn chrono_delay(delay: Duration) -> chrono::Duration {
    chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::weeks(520))
}

/// Enqueue a new job. Returns the auto-generated id.
pub async fn enqueue(db: &Database, job: &NewJob) -> Result<JobId, HeraldError> {
    let job = job.clone();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            let now = encode_ts(&Utc::now());
            conn.execute(
                "INSERT INTO jobs (queue_name, payload, priority, status, attempts, max_attempts,
                                   backoff, run_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?5, ?6, ?6, ?6)",
                params![
                    job.queue_name,
                    job.payload,
                    job.priority.rank(),
                    job.max_attempts,
                    encode_json(&job.backoff)?,
                    now,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map(JobId)
        .map_err(map_tr_err)
}

/// Claim the next runnable job on `queue_name`.
///
/// Highest priority first, then earliest `run_at`, then insertion order.
/// The claim and the status change happen in one transaction.
pub async fn dequeue(
    db: &Database,
    queue_name: &str,
    lock_timeout: Duration,
) -> Result<Option<Job>, HeraldError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Job>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let now = Utc::now();
            let now_text = encode_ts(&now);

            let next = {
                let sql = format!(
                    "SELECT {JOB_COLUMNS} FROM jobs
                     WHERE queue_name = ?1 AND status = 'pending' AND run_at <= ?2
                       AND attempts < max_attempts
                     ORDER BY priority DESC, run_at ASC, id ASC
                     LIMIT 1"
                );
                tx.query_row(&sql, params![queue_name, now_text], row_to_job)
                    .optional()?
            };

            let Some(job) = next else {
                tx.commit()?;
                return Ok(None);
            };

            let locked_until = encode_ts(&(now + chrono_delay(lock_timeout)));
            tx.execute(
                "UPDATE jobs SET status = 'processing', attempts = attempts + 1,
                 locked_until = ?1, updated_at = ?2
                 WHERE id = ?3",
                params![locked_until, now_text, job.id.0],
            )?;
            tx.commit()?;

            Ok(Some(Job {
                status: JobStatus::Processing,
                attempts: job.attempts + 1,
                updated_at: now,
                ..job
            }))
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a job as completed.
pub async fn complete(db: &Database, id: JobId) -> Result<(), HeraldError> {
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE jobs SET status = 'completed', locked_until = NULL, updated_at = ?1
                 WHERE id = ?2",
                params![encode_ts(&Utc::now()), id.0],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(HeraldError::NotFound {
            id: id.0.to_string(),
        });
    }
    Ok(())
}

/// Record a failed attempt.
///
/// Attempts were counted at claim time. Once they reach `max_attempts` the job
/// is marked failed; otherwise it returns to pending with `run_at` pushed out
/// by the job's backoff policy.
pub async fn fail(db: &Database, id: JobId, error: &str) -> Result<JobStatus, HeraldError> {
    let error = error.to_string();
    let status = db
        .connection()
        .call(move |conn| -> Result<Option<JobStatus>, rusqlite::Error> {
            let row = conn
                .query_row(
                    "SELECT attempts, max_attempts, backoff FROM jobs WHERE id = ?1",
                    params![id.0],
                    |row| {
                        Ok((
                            row.get::<_, u32>(0)?,
                            row.get::<_, u32>(1)?,
                            json_column::<BackoffPolicy>(row, 2)?,
                        ))
                    },
                )
                .optional()?;
            let Some((attempts, max_attempts, backoff)) = row else {
                return Ok(None);
            };

            let now = Utc::now();
            if attempts >= max_attempts {
                conn.execute(
                    "UPDATE jobs SET status = 'failed', last_error = ?1, locked_until = NULL,
                     updated_at = ?2
                     WHERE id = ?3",
                    params![error, encode_ts(&now), id.0],
                )?;
                Ok(Some(JobStatus::Failed))
            } else {
                let run_at = now + chrono_delay(backoff.delay_for(attempts));
                conn.execute(
                    "UPDATE jobs SET status = 'pending', last_error = ?1, locked_until = NULL,
                     run_at = ?2, updated_at = ?3
                     WHERE id = ?4",
                    params![error, encode_ts(&run_at), encode_ts(&now), id.0],
                )?;
                Ok(Some(JobStatus::Pending))
            }
        })
        .await
        .map_err(map_tr_err)?;

    status.ok_or_else(|| HeraldError::NotFound {
        id: id.0.to_string(),
    })
}

/// Release expired `processing` jobs. Returns how many were reclaimed.
///
/// A job whose attempts are spent is marked `failed`; the rest return to
/// `pending`.
pub async fn reclaim_expired(db: &Database) -> Result<u64, HeraldError> {
    db.connection()
        .call(|conn| -> Result<usize, rusqlite::Error> {
            let now = encode_ts(&Utc::now());
            conn.execute(
                "UPDATE jobs SET
                   status = CASE WHEN attempts >= max_attempts THEN 'failed' ELSE 'pending' END,
                   last_error = CASE WHEN attempts >= max_attempts THEN ?2 ELSE last_error END,
                   locked_until = NULL, updated_at = ?1
                 WHERE status = 'processing' AND locked_until IS NOT NULL AND locked_until < ?1",
                params![now, LOCK_EXPIRED],
            )
        })
        .await
        .map(|n| n as u64)
        .map_err(map_tr_err)
}

/// Fetch a job by id.
pub async fn get_job(db: &Database, id: JobId) -> Result<Option<Job>, HeraldError> {
    db.connection()
        .call(move |conn| -> Result<Option<Job>, rusqlite::Error> {
            let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1");
            conn.query_row(&sql, params![id.0], row_to_job).optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Count jobs on `queue_name` by status.
pub async fn counts(db: &Database, queue_name: &str) -> Result<QueueCounts, HeraldError> {
    let queue_name = queue_name.to_string();
    let rows = db
        .connection()
        .call(move |conn| -> Result<Vec<(JobStatus, i64)>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM jobs WHERE queue_name = ?1 GROUP BY status",
            )?;
            stmt.query_map(params![queue_name], |row| {
                Ok((parsed_column::<JobStatus>(row, 0)?, row.get::<_, i64>(1)?))
            })?
            .collect()
        })
        .await
        .map_err(map_tr_err)?;

    let mut counts = QueueCounts::default();
    for (status, n) in rows {
        let n = n.max(0) as u64;
        match status {
            JobStatus::Pending => counts.pending = n,
            JobStatus::Processing => counts.processing = n,
            JobStatus::Completed => counts.completed = n,
            JobStatus::Failed => counts.failed = n,
        }
    }
    Ok(counts)
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: JobId(row.get(0)?),
        queue_name: row.get(1)?,
        payload: row.get(2)?,
        priority: Priority::from_rank(row.get(3)?),
        status: parsed_column(row, 4)?,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        backoff: json_column(row, 7)?,
        last_error: row.get(8)?,
        run_at: ts_column(row, 9)?,
        created_at: ts_column(row, 10)?,
        updated_at: ts_column(row, 11)?,
    })
}
