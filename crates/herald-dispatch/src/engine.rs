// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch engine: message lifecycle from draft to delivery outcome.
//!
//! One engine is built per process from explicit collaborators (store, queue,
//! transport registry) and handed to whoever needs it. It is cheap to clone.

use std::sync::Arc;

use futures::future::join_all;
use herald_bus::{DispatchEvent, EventBus};
use herald_config::DispatchConfig;
use herald_core::{
    payload_message_id, Direction, HeraldError, Job, JobQueue, Message, MessageCriteria,
    MessageStore, Mode, NewMessage, State,
};
use herald_transport::TransportRegistry;
use tracing::{debug, info, instrument, warn};

use crate::options::{QueueOptions, Queued, RequeueTicket, ResendReport, SendOptions};
use crate::queue_adapter::QueueAdapter;

/// Coordinates the store, the queue and the transports.
#[derive(Clone)]
pub struct DispatchEngine {
    store: Arc<dyn MessageStore>,
    queue: QueueAdapter,
    transports: Arc<TransportRegistry>,
    events: EventBus,
    config: Arc<DispatchConfig>,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<dyn MessageStore>,
        queue: Arc<dyn JobQueue>,
        transports: Arc<TransportRegistry>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            queue: QueueAdapter::new(queue),
            transports,
            events: EventBus::new(),
            config: Arc::new(config),
        }
    }

    /// Use an existing event bus instead of a private one.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// The bus outcome events are published on. Subscribe to observe them.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub fn queue_adapter(&self) -> &QueueAdapter {
        &self.queue
    }

    pub fn transports(&self) -> &Arc<TransportRegistry> {
        &self.transports
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Normalize a draft, filling the configured default transport first.
    ///
    /// The transport takes part in the hash, so it is settled before
    /// normalization computes it.
    pub fn prepare(&self, mut draft: NewMessage) -> Result<Message, HeraldError> {
        let needs_default = draft
            .transport
            .as_deref()
            .is_none_or(|t| t.trim().is_empty());
        if needs_default {
            draft.transport = Some(self.config.default_transport.clone());
        }
        draft.normalize()
    }

    /// Normalize and insert a new record. Fails on a hash collision.
    #[instrument(skip_all)]
    pub async fn create(&self, draft: NewMessage) -> Result<Message, HeraldError> {
        let message = self.prepare(draft)?;
        self.store.create(&message).await?;
        debug!(message_id = %message.id, hash = %message.hash, "message created");
        Ok(message)
    }

    /// Record an inbound message. No transport is involved.
    #[instrument(skip_all)]
    pub async fn receive(&self, mut draft: NewMessage) -> Result<Message, HeraldError> {
        draft.direction = Direction::Inbound;
        draft.state = State::Received;
        let message = self.prepare(draft)?;
        self.store.create(&message).await?;
        info!(message_id = %message.id, from = %message.from, "inbound message received");
        Ok(message)
    }

    /// Persist a record and, in push mode, enqueue a job for it.
    ///
    /// Pull-mode records are reset to `Unknown` and left for their transport
    /// to collect. Push-mode records move to `Queued`.
    #[instrument(skip_all, fields(message_id = %message.id, mode = %message.mode))]
    pub async fn queue(
        &self,
        mut message: Message,
        options: QueueOptions,
    ) -> Result<Queued, HeraldError> {
        message.validate()?;
        let attempts = options.attempts.unwrap_or(self.config.default_attempts);
        if attempts == 0 {
            return Err(HeraldError::validation("attempts", "must be at least 1"));
        }
        let backoff = options
            .backoff
            .unwrap_or_else(|| self.config.backoff_policy());

        message.state = match message.mode {
            Mode::Pull => State::Unknown,
            Mode::Push => State::Queued,
        };
        message.touch();

        if let Err(e) = self.store.save(&message).await {
            warn!(error = %e, "failed to persist message for queueing");
            self.emit(DispatchEvent::QueueError {
                message,
                error: e.to_string(),
            });
            return Err(e);
        }

        if message.mode == Mode::Pull {
            debug!("pull-mode message stored without a job");
            self.emit(DispatchEvent::QueueSuccess {
                message: message.clone(),
                job: None,
            });
            return Ok(Queued { message, job: None });
        }

        match self.queue.enqueue(&message, attempts, backoff).await {
            Ok(job) => {
                info!(job_id = %job, queue = %message.queue_name, "message queued");
                self.emit(DispatchEvent::QueueSuccess {
                    message: message.clone(),
                    job: Some(job),
                });
                Ok(Queued {
                    message,
                    job: Some(job),
                })
            }
            Err(e) => {
                warn!(error = %e, "failed to enqueue job");
                self.emit(DispatchEvent::QueueError {
                    message,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Send a record now, or fake a successful send.
    #[instrument(skip_all, fields(message_id = %message.id, fake = options.fake))]
    pub async fn send(
        &self,
        mut message: Message,
        options: SendOptions,
    ) -> Result<Message, HeraldError> {
        if !options.fake {
            return self.deliver(message).await;
        }
        message.validate()?;
        let synthetic = serde_json::json!({ "fake": true, "transport": message.transport });
        message.mark_sent(State::Sent, synthetic);
        self.store.save(&message).await?;
        debug!("fake send recorded");
        Ok(message)
    }

    /// Resolve the record's transport, invoke it and persist the outcome.
    ///
    /// A transport failure is saved on the record and then returned. A save
    /// failure on either branch is returned in its place.
    #[instrument(skip_all, fields(message_id = %message.id, transport = %message.transport))]
    pub async fn deliver(&self, mut message: Message) -> Result<Message, HeraldError> {
        message.validate()?;
        let transport = self.transports.resolve(&message.transport)?;

        match transport.send(&message).await {
            Ok(receipt) => {
                message.mark_sent(receipt.state.unwrap_or(State::Delivered), receipt.payload);
                self.store.save(&message).await?;
                info!(state = %message.state, "message sent");
                self.emit(DispatchEvent::SentSuccess {
                    message: message.clone(),
                });
                Ok(message)
            }
            Err(failure) => {
                warn!(error = %failure, "transport send failed");
                message.mark_failed(failure.to_value());
                self.emit(DispatchEvent::SentError {
                    message: message.clone(),
                    error: failure.clone(),
                });
                self.store.save(&message).await?;
                Err(HeraldError::Transport(failure))
            }
        }
    }

    /// Send every unsent record matching `criteria`, concurrently.
    #[instrument(skip_all)]
    pub async fn resend(&self, criteria: MessageCriteria) -> Result<ResendReport, HeraldError> {
        let pending = self.unsent(criteria).await?;
        if pending.is_empty() {
            return Ok(ResendReport::default());
        }
        info!(count = pending.len(), "resending unsent messages");

        let attempts = pending.into_iter().map(|message| {
            let id = message.id.clone();
            async move { (id, self.send(message, SendOptions::default()).await) }
        });

        let mut report = ResendReport::default();
        for (id, outcome) in join_all(attempts).await {
            match outcome {
                Ok(message) => report.sent.push(message),
                Err(e) => report.failed.push((id, e)),
            }
        }
        info!(
            sent = report.sent.len(),
            failed = report.failed.len(),
            "resend finished"
        );
        Ok(report)
    }

    /// Queue every unsent record matching `criteria` without waiting.
    ///
    /// Lookup failures are returned and published. Per-record queue failures
    /// are only published as queue errors.
    #[instrument(skip_all)]
    pub async fn requeue(
        &self,
        criteria: MessageCriteria,
        options: QueueOptions,
    ) -> Result<RequeueTicket, HeraldError> {
        let pending = match self.unsent(criteria).await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "requeue lookup failed");
                self.emit(DispatchEvent::RequeueError {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let matched: Vec<_> = pending.iter().map(|m| m.id.clone()).collect();
        info!(count = matched.len(), "requeueing unsent messages");
        self.emit(DispatchEvent::RequeueSuccess {
            messages: matched.clone(),
        });

        let tasks = pending
            .into_iter()
            .map(|message| {
                let engine = self.clone();
                tokio::spawn(async move {
                    let id = message.id.clone();
                    if let Err(e) = engine.queue(message, options).await {
                        debug!(message_id = %id, error = %e, "requeue of message failed");
                    }
                })
            })
            .collect();

        Ok(RequeueTicket::new(matched, tasks))
    }

    /// Worker entry point: send the record named by the job payload.
    ///
    /// A record that no longer exists counts as handled.
    #[instrument(skip_all, fields(job_id = %job.id, queue = %job.queue_name, attempt = job.attempts))]
    pub async fn process(&self, job: &Job) -> Result<(), HeraldError> {
        let id = payload_message_id(&job.payload)?;
        match self.store.find_by_id(&id).await? {
            Some(message) => self.send(message, SendOptions::default()).await.map(|_| ()),
            None => {
                debug!(message_id = %id, "message gone, nothing to do");
                Ok(())
            }
        }
    }

    /// Records matching `criteria` that have been sent.
    pub async fn sent(&self, criteria: MessageCriteria) -> Result<Vec<Message>, HeraldError> {
        self.store.find(&criteria.sent()).await
    }

    /// Records matching `criteria` that have not been sent.
    pub async fn unsent(&self, criteria: MessageCriteria) -> Result<Vec<Message>, HeraldError> {
        self.store.find(&criteria.unsent()).await
    }

    fn emit(&self, event: DispatchEvent) {
        let name = event.name();
        let delivered = self.events.publish(event);
        debug!(event = name, subscribers = delivered, "event published");
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("store", &self.store.name())
            .field("transports", &self.transports.names())
            .field("default_transport", &self.config.default_transport)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{BackoffPolicy, JobStatus, MessageId, TransportFailure, TransportReceipt};
    use herald_test_utils::{MemoryQueue, MemoryStore, MockTransport};
    use tokio::sync::broadcast;
    use tracing_test::traced_test;

    struct Fixture {
        engine: DispatchEngine,
        store: Arc<MemoryStore>,
        queue: Arc<MemoryQueue>,
        mock: Arc<MockTransport>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let mock = Arc::new(MockTransport::new());
        let mut registry = TransportRegistry::new();
        registry.register(mock.clone());
        let config = DispatchConfig {
            default_transport: "mock".into(),
            ..DispatchConfig::default()
        };
        let engine = DispatchEngine::new(store.clone(), queue.clone(), Arc::new(registry), config);
        Fixture {
            engine,
            store,
            queue,
            mock,
        }
    }

    fn draft(body: &str) -> NewMessage {
        NewMessage::new("a@x.com", "b@x.com", body)
    }

    fn event_names(rx: &mut broadcast::Receiver<herald_bus::EventEnvelope>) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            names.push(envelope.event.name());
        }
        names
    }

    #[tokio::test]
    async fn create_fills_default_transport_before_hashing() {
        let f = fixture();
        let created = f.engine.create(draft("hello")).await.unwrap();
        assert_eq!(created.transport, "mock");

        let explicit = draft("hello").transport("mock").normalize().unwrap();
        assert_eq!(created.hash, explicit.hash);
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_content() {
        let f = fixture();
        f.engine.create(draft("same")).await.unwrap();
        let err = f.engine.create(draft("same")).await.unwrap_err();
        assert!(err.is_duplicate_key());
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn receive_records_inbound_message() {
        let f = fixture();
        let received = f.engine.receive(draft("incoming")).await.unwrap();
        assert_eq!(received.direction, Direction::Inbound);
        assert_eq!(received.state, State::Received);
        assert_eq!(f.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn push_queue_creates_exactly_one_job() {
        let f = fixture();
        let mut rx = f.engine.events().subscribe();
        let message = f.engine.create(draft("push")).await.unwrap();

        let queued = f
            .engine
            .queue(message.clone(), QueueOptions::default().attempts(2))
            .await
            .unwrap();

        assert_eq!(queued.message.state, State::Queued);
        let jobs = f.queue.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(Some(jobs[0].id), queued.job);
        assert_eq!(jobs[0].max_attempts, 2);
        assert_eq!(payload_message_id(&jobs[0].payload).unwrap(), message.id);
        assert_eq!(f.store.get(&message.id).unwrap().state, State::Queued);
        assert_eq!(event_names(&mut rx), vec!["message:queue:success"]);
    }

    #[tokio::test]
    async fn pull_queue_persists_without_a_job() {
        let f = fixture();
        let message = f
            .engine
            .create(draft("pull").mode(Mode::Pull))
            .await
            .unwrap();

        let queued = f
            .engine
            .queue(message, QueueOptions::default())
            .await
            .unwrap();

        assert_eq!(queued.job, None);
        assert_eq!(queued.message.state, State::Unknown);
        assert!(f.queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn zero_attempts_is_rejected() {
        let f = fixture();
        let message = f.engine.create(draft("x")).await.unwrap();
        let err = f
            .engine
            .queue(message, QueueOptions::default().attempts(0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(f.queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn enqueue_failure_publishes_queue_error() {
        let f = fixture();
        let mut rx = f.engine.events().subscribe();
        let message = f.engine.create(draft("x")).await.unwrap();
        f.queue.fail_enqueue(true);

        let err = f
            .engine
            .queue(message, QueueOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "queue");
        assert_eq!(event_names(&mut rx), vec!["message:queue:error"]);
    }

    #[tokio::test]
    async fn save_failure_during_queue_creates_no_job() {
        let f = fixture();
        let mut rx = f.engine.events().subscribe();
        let message = f.engine.create(draft("x")).await.unwrap();
        f.store.fail_saves(true);

        let err = f
            .engine
            .queue(message, QueueOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_persistence());
        assert!(f.queue.jobs().is_empty());
        assert_eq!(event_names(&mut rx), vec!["message:queue:error"]);
    }

    #[tokio::test]
    async fn fake_send_marks_sent_without_transport() {
        let f = fixture();
        let message = f.engine.create(draft("fake")).await.unwrap();

        let sent = f
            .engine
            .send(message, SendOptions::fake())
            .await
            .unwrap();

        assert!(sent.is_sent());
        assert_eq!(sent.state, State::Sent);
        assert_eq!(sent.result.as_ref().unwrap()["fake"], true);
        assert_eq!(f.mock.call_count(), 0);
        assert!(f.store.get(&sent.id).unwrap().is_sent());
    }

    #[tokio::test]
    #[traced_test]
    async fn successful_delivery_records_receipt() {
        let f = fixture();
        let mut rx = f.engine.events().subscribe();
        let message = f.engine.create(draft("deliver")).await.unwrap();

        let sent = f
            .engine
            .send(message, SendOptions::default())
            .await
            .unwrap();

        assert_eq!(sent.state, State::Delivered);
        assert_eq!(sent.result.as_ref().unwrap()["transport"], "mock");
        assert!(sent.failed_at.is_none());
        assert_eq!(f.store.get(&sent.id).unwrap(), sent);
        assert_eq!(f.mock.call_count(), 1);
        assert_eq!(event_names(&mut rx), vec!["message:sent:success"]);
        assert!(logs_contain("message sent"));
    }

    #[tokio::test]
    async fn receipt_state_overrides_delivered() {
        let f = fixture();
        f.mock
            .push_ok(TransportReceipt::new(serde_json::Value::Null).with_state(State::Sent));
        let message = f.engine.create(draft("x")).await.unwrap();
        let sent = f.engine.deliver(message).await.unwrap();
        assert_eq!(sent.state, State::Sent);
    }

    #[tokio::test]
    async fn transport_failure_is_recorded_and_returned() {
        let f = fixture();
        let mut rx = f.engine.events().subscribe();
        f.mock
            .push_failure(TransportFailure::new("mailbox full").with_code("552"));
        let message = f.engine.create(draft("x")).await.unwrap();

        let err = f
            .engine
            .send(message.clone(), SendOptions::default())
            .await
            .unwrap_err();

        match err {
            HeraldError::Transport(failure) => assert_eq!(failure.code.as_deref(), Some("552")),
            other => panic!("expected transport error, got {other:?}"),
        }
        let stored = f.store.get(&message.id).unwrap();
        assert!(stored.failed_at.is_some());
        assert!(stored.sent_at.is_none());
        assert_eq!(stored.result.unwrap()["message"], "mailbox full");
        assert_eq!(event_names(&mut rx), vec!["message:sent:error"]);
    }

    #[tokio::test]
    async fn unknown_transport_fails_before_any_mutation() {
        let f = fixture();
        let message = f
            .engine
            .create(draft("x").transport("carrier-pigeon"))
            .await
            .unwrap();

        let err = f.engine.deliver(message.clone()).await.unwrap_err();
        assert!(matches!(err, HeraldError::Resolution { .. }));
        assert_eq!(f.store.get(&message.id).unwrap(), message);
        assert_eq!(f.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn save_failure_after_send_is_returned() {
        let f = fixture();
        let message = f.engine.create(draft("x")).await.unwrap();
        f.store.fail_saves(true);

        let err = f.engine.deliver(message).await.unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(f.mock.call_count(), 1);
    }

    #[tokio::test]
    async fn resend_touches_only_unsent_records() {
        let f = fixture();
        let done = f.engine.create(draft("done")).await.unwrap();
        let done = f.engine.deliver(done).await.unwrap();
        let first_sent_at = done.sent_at;
        f.engine.create(draft("pending one")).await.unwrap();
        f.engine.create(draft("pending two")).await.unwrap();
        f.mock.fail_next(1, TransportFailure::new("flaky"));

        let report = f.engine.resend(MessageCriteria::all()).await.unwrap();

        assert_eq!(report.total(), 2);
        assert_eq!(report.sent.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(f.mock.call_count(), 3);
        assert_eq!(f.store.get(&done.id).unwrap().sent_at, first_sent_at);
    }

    #[tokio::test]
    async fn resend_with_nothing_unsent_is_empty() {
        let f = fixture();
        let report = f.engine.resend(MessageCriteria::all()).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(f.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn requeue_queues_every_unsent_record() {
        let f = fixture();
        let mut rx = f.engine.events().subscribe();
        let a = f.engine.create(draft("a")).await.unwrap();
        let b = f.engine.create(draft("b")).await.unwrap();
        let sent = f.engine.create(draft("c")).await.unwrap();
        f.engine.deliver(sent).await.unwrap();
        event_names(&mut rx);

        let ticket = f
            .engine
            .requeue(MessageCriteria::all(), QueueOptions::default())
            .await
            .unwrap();
        assert_eq!(ticket.matched, vec![a.id.clone(), b.id.clone()]);
        ticket.settled().await;

        assert_eq!(f.queue.jobs().len(), 2);
        let names = event_names(&mut rx);
        assert_eq!(names[0], "message:requeue:success");
        assert_eq!(
            names.iter().filter(|n| **n == "message:queue:success").count(),
            2
        );
    }

    #[tokio::test]
    async fn requeue_lookup_failure_publishes_requeue_error() {
        let f = fixture();
        let mut rx = f.engine.events().subscribe();
        f.store.fail_finds(true);

        let result = f
            .engine
            .requeue(MessageCriteria::all(), QueueOptions::default())
            .await;
        assert!(result.is_err());
        assert_eq!(event_names(&mut rx), vec!["message:requeue:error"]);
    }

    #[tokio::test]
    async fn process_sends_the_referenced_record() {
        let f = fixture();
        let message = f.engine.create(draft("job")).await.unwrap();
        let queued = f
            .engine
            .queue(message.clone(), QueueOptions::default())
            .await
            .unwrap();
        let job = f.queue.dequeue(&message.queue_name).await.unwrap().unwrap();
        assert_eq!(Some(job.id), queued.job);

        f.engine.process(&job).await.unwrap();
        assert!(f.store.get(&message.id).unwrap().is_sent());
    }

    #[tokio::test]
    async fn process_of_vanished_record_is_a_no_op() {
        let f = fixture();
        let ghost = draft("ghost").normalize().unwrap();
        f.engine
            .queue_adapter()
            .enqueue(&ghost, 1, BackoffPolicy::default())
            .await
            .unwrap();
        let job = f.queue.dequeue("email").await.unwrap().unwrap();

        assert!(f.store.get(&ghost.id).is_none());
        f.engine.process(&job).await.unwrap();
        assert_eq!(f.mock.call_count(), 0);
        f.queue.complete(job.id).await.unwrap();
        assert_eq!(f.queue.job(job.id).unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn process_rejects_malformed_payload() {
        let f = fixture();
        let mut job = {
            let ghost = draft("x").normalize().unwrap();
            let id = f
                .engine
                .queue_adapter()
                .enqueue(&ghost, 1, BackoffPolicy::default())
                .await
                .unwrap();
            f.queue.job(id).unwrap()
        };
        job.payload = "not json".into();
        assert_eq!(f.engine.process(&job).await.unwrap_err().kind(), "queue");
    }

    #[tokio::test]
    async fn sent_and_unsent_partition_records() {
        let f = fixture();
        let a = f.engine.create(draft("a")).await.unwrap();
        f.engine.create(draft("b")).await.unwrap();
        f.engine
            .send(a.clone(), SendOptions::fake())
            .await
            .unwrap();

        let sent: Vec<MessageId> = f
            .engine
            .sent(MessageCriteria::all())
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(sent, vec![a.id]);
        assert_eq!(f.engine.unsent(MessageCriteria::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_send_keeps_first_sent_at() {
        let f = fixture();
        let message = f.engine.create(draft("twice")).await.unwrap();
        let first = f.engine.deliver(message).await.unwrap();
        let second = f.engine.deliver(first.clone()).await.unwrap();
        assert_eq!(first.sent_at, second.sent_at);
        assert!(second.updated_at >= first.updated_at);
    }
}
