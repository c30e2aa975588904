// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end dispatch flows against a temp SQLite database.

use std::time::Duration;

use herald_core::{JobQueue, JobStatus, MessageCriteria, MessageStore, Mode, TransportFailure};
use herald_dispatch::{QueueOptions, SendOptions};
use herald_test_utils::{MockTransport, TestHarness};
use tokio_util::sync::CancellationToken;

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

#[tokio::test]
async fn queued_message_is_sent_by_processing_its_job() {
    let harness = TestHarness::builder().build().await.unwrap();
    let engine = &harness.engine;

    let message = engine.create(TestHarness::draft("hello")).await.unwrap();
    let queued = engine
        .queue(message.clone(), QueueOptions::default())
        .await
        .unwrap();

    let job = harness.storage.dequeue("email").await.unwrap().unwrap();
    assert_eq!(Some(job.id), queued.job);
    engine.process(&job).await.unwrap();
    harness.storage.complete(job.id).await.unwrap();

    let stored = harness.storage.find_by_id(&message.id).await.unwrap().unwrap();
    assert!(stored.is_sent());
    assert_eq!(stored.result.unwrap()["transport"], "mock");
    assert_eq!(harness.mock.call_count(), 1);
}

#[tokio::test]
async fn pull_mode_leaves_the_queue_empty() {
    let harness = TestHarness::builder().build().await.unwrap();
    let message = harness
        .engine
        .create(TestHarness::draft("pull me").mode(Mode::Pull))
        .await
        .unwrap();
    harness
        .engine
        .queue(message, QueueOptions::default())
        .await
        .unwrap();

    let counts = harness.storage.counts("email").await.unwrap();
    assert_eq!(counts.pending, 0);
    assert_eq!(harness.engine.unsent(MessageCriteria::all()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn worker_delivers_queued_messages_and_stops_on_cancel() {
    let harness = TestHarness::builder().build().await.unwrap();
    let engine = harness.engine.clone();
    for body in ["one", "two", "three"] {
        let m = engine.create(TestHarness::draft(body)).await.unwrap();
        engine.queue(m, QueueOptions::default()).await.unwrap();
    }

    let worker = harness.worker();
    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { worker.run(cancel).await }
    });

    wait_until(|| {
        let engine = engine.clone();
        async move {
            engine
                .unsent(MessageCriteria::all())
                .await
                .map(|m| m.is_empty())
                .unwrap_or(false)
        }
    })
    .await;

    cancel.cancel();
    let snapshot = run.await.unwrap().unwrap();
    assert_eq!(snapshot.completed, 3);
    assert_eq!(harness.storage.counts("email").await.unwrap().completed, 3);
}

#[tokio::test]
async fn worker_retries_then_gives_up() {
    let mock = MockTransport::new();
    mock.fail_next(5, TransportFailure::new("unreachable"));
    let harness = TestHarness::builder().with_mock(mock).build().await.unwrap();

    let message = harness
        .engine
        .create(TestHarness::draft("doomed"))
        .await
        .unwrap();
    let queued = harness
        .engine
        .queue(
            message.clone(),
            QueueOptions::default()
                .attempts(2)
                .backoff(TestHarness::quick_backoff()),
        )
        .await
        .unwrap();
    let job_id = queued.job.unwrap();

    let worker = harness.worker();
    let stats = worker.stats();
    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { worker.run(cancel).await }
    });

    let storage = harness.storage.clone();
    wait_until(|| {
        let storage = storage.clone();
        async move {
            matches!(
                storage.job(job_id).await,
                Ok(Some(job)) if job.status == JobStatus::Failed
            )
        }
    })
    .await;
    cancel.cancel();
    run.await.unwrap().unwrap();

    let job = harness.storage.job(job_id).await.unwrap().unwrap();
    assert_eq!(job.attempts, 2);
    assert!(job.last_error.unwrap().contains("unreachable"));
    assert_eq!(harness.mock.call_count(), 2);
    assert_eq!(stats.snapshot().retried, 1);
    assert_eq!(stats.snapshot().failed, 1);

    let stored = harness.storage.find_by_id(&message.id).await.unwrap().unwrap();
    assert!(stored.failed_at.is_some());
    assert!(!stored.is_sent());
}

#[tokio::test]
async fn events_reach_subscribers_in_order() {
    let harness = TestHarness::builder().build().await.unwrap();
    let mut rx = harness.engine.events().subscribe();

    let message = harness
        .engine
        .create(TestHarness::draft("observed"))
        .await
        .unwrap();
    let queued = harness
        .engine
        .queue(message, QueueOptions::default())
        .await
        .unwrap();
    harness
        .engine
        .send(queued.message, SendOptions::default())
        .await
        .unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.name, "message:queue:success");
    assert_eq!(second.name, "message:sent:success");
}

#[tokio::test]
async fn requeue_feeds_the_sqlite_queue() {
    let harness = TestHarness::builder().build().await.unwrap();
    for body in ["a", "b"] {
        harness
            .engine
            .create(TestHarness::draft(body))
            .await
            .unwrap();
    }

    let ticket = harness
        .engine
        .requeue(MessageCriteria::all(), QueueOptions::default())
        .await
        .unwrap();
    assert_eq!(ticket.matched.len(), 2);
    ticket.settled().await;

    assert_eq!(harness.storage.counts("email").await.unwrap().pending, 2);
}
