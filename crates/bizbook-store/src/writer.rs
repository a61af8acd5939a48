//! # Write Worker
//!
//! Single FIFO consumer that carries accepted mutations to the Persistence
//! Port.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  mutation (lock held) ──► WriteQueue::enqueue ──► unbounded mpsc        │
//! │                                                        │                │
//! │                                                        ▼                │
//! │                             WriteWorker::run (one task, in order)       │
//! │                                                        │                │
//! │                          port.write(scope, change) ────┤                │
//! │                                 │                      │                │
//! │                     Ok ◄────────┘                      │ Err            │
//! │                                                        ▼                │
//! │                      PersistenceFailed event, sleep(backoff), retry     │
//! │                      until max_retries or a non-retryable error         │
//! │                                                                         │
//! │  flush() ──► Flush marker queued behind earlier writes ──► reply        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A later write never overtakes an earlier one: there is exactly one
//! worker and it finishes (or abandons) each change before the next.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use bizbook_core::{EntityChange, Scope};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::events::StoreEvent;
use crate::port::PersistencePort;

// =============================================================================
// Retry Policy
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &StoreConfig) -> Self {
        RetryPolicy {
            max_retries: config.store.max_retries,
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from_config(&StoreConfig::default())
    }
}

// =============================================================================
// Commands & Handle
// =============================================================================

#[derive(Debug)]
enum WriteCommand {
    Write(EntityChange),
    Flush(oneshot::Sender<()>),
}

/// Sending side of the write worker.
///
/// The worker exits once every clone of its queue has been dropped and the
/// remaining commands are drained.
#[derive(Debug, Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<WriteCommand>,
    pending: Arc<AtomicUsize>,
}

impl WriteQueue {
    /// Queues a change behind every change queued before it.
    pub fn enqueue(&self, change: EntityChange) -> StoreResult<()> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.tx.send(WriteCommand::Write(change)).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            StoreError::ChannelError("Write worker stopped".into())
        })
    }

    /// Resolves once every change queued before this call has been written
    /// or abandoned.
    pub async fn flush(&self) -> StoreResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(WriteCommand::Flush(done_tx))
            .map_err(|_| StoreError::ChannelError("Write worker stopped".into()))?;
        done_rx
            .await
            .map_err(|_| StoreError::ChannelError("Write worker dropped flush".into()))
    }

    /// Changes queued or in flight.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Worker
// =============================================================================

pub struct WriteWorker {
    port: Arc<dyn PersistencePort>,
    scope: Scope,
    policy: RetryPolicy,
    events: broadcast::Sender<StoreEvent>,
    commands: mpsc::UnboundedReceiver<WriteCommand>,
    pending: Arc<AtomicUsize>,
}

impl WriteWorker {
    /// Creates a worker and the queue feeding it.
    pub fn new(
        port: Arc<dyn PersistencePort>,
        scope: Scope,
        policy: RetryPolicy,
        events: broadcast::Sender<StoreEvent>,
    ) -> (Self, WriteQueue) {
        let (tx, commands) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = WriteWorker {
            port,
            scope,
            policy,
            events,
            commands,
            pending: pending.clone(),
        };

        (worker, WriteQueue { tx, pending })
    }

    /// Runs until the queue is closed and drained.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(port = self.port.name(), scope = %self.scope, "Write worker starting");

        while let Some(command) = self.commands.recv().await {
            match command {
                WriteCommand::Write(change) => {
                    self.persist(&change).await;
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                }
                WriteCommand::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }

        info!(scope = %self.scope, "Write worker stopped");
    }

    async fn persist(&self, change: &EntityChange) {
        let kind = change.kind();
        let id = change.id();
        let mut backoff = self.policy.create_backoff();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let err = match self.port.write(&self.scope, change).await {
                Ok(()) => {
                    if attempt > 1 {
                        info!(entity_type = %kind, entity_id = %id, attempt, "Write succeeded after retry");
                    } else {
                        debug!(entity_type = %kind, entity_id = %id, "Write persisted");
                    }
                    return;
                }
                Err(err) => err,
            };

            let will_retry = err.is_retryable() && attempt <= self.policy.max_retries;
            warn!(
                entity_type = %kind,
                entity_id = %id,
                attempt,
                will_retry,
                error = %err,
                "Write failed"
            );
            let _ = self.events.send(StoreEvent::PersistenceFailed {
                kind,
                id: id.to_string(),
                attempt,
                error: err.to_string(),
                will_retry,
            });

            if !will_retry {
                error!(entity_type = %kind, entity_id = %id, attempt, "Abandoning write");
                return;
            }

            let delay = backoff.next_backoff().unwrap_or(self.policy.max_backoff);
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MemoryPort;
    use bizbook_core::EntityKind;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    fn spawn(port: Arc<MemoryPort>, policy: RetryPolicy) -> (WriteQueue, broadcast::Receiver<StoreEvent>) {
        let (events, rx) = broadcast::channel(64);
        let (worker, queue) = WriteWorker::new(port, Scope::new("shop"), policy, events);
        tokio::spawn(worker.run());
        (queue, rx)
    }

    #[tokio::test]
    async fn test_writes_arrive_in_order() {
        let port = Arc::new(MemoryPort::new());
        let (queue, _events) = spawn(port.clone(), fast_policy(0));

        for id in ["a", "b", "c"] {
            queue
                .enqueue(EntityChange::delete(EntityKind::Product, id))
                .unwrap();
        }
        queue.flush().await.unwrap();

        let ids: Vec<String> = port
            .applied_writes()
            .iter()
            .map(|c| c.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_retryable_failure_is_retried_and_reported() {
        let port = Arc::new(MemoryPort::new());
        port.fail_next_writes(2);
        let (queue, mut events) = spawn(port.clone(), fast_policy(3));

        queue
            .enqueue(EntityChange::delete(EntityKind::Invoice, "inv-1"))
            .unwrap();
        queue.flush().await.unwrap();

        assert_eq!(port.write_count(), 1);
        for expected_attempt in 1..=2 {
            match events.recv().await.unwrap() {
                StoreEvent::PersistenceFailed {
                    attempt, will_retry, ..
                } => {
                    assert_eq!(attempt, expected_attempt);
                    assert!(will_retry);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let port = Arc::new(MemoryPort::new());
        port.fail_next_writes(5);
        let (queue, mut events) = spawn(port.clone(), fast_policy(1));

        queue
            .enqueue(EntityChange::delete(EntityKind::Invoice, "inv-1"))
            .unwrap();
        queue
            .enqueue(EntityChange::delete(EntityKind::Invoice, "inv-2"))
            .unwrap();
        queue.flush().await.unwrap();

        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        // inv-1 used two attempts, inv-2 two more; the fifth failure is unused.
        assert_eq!(port.write_count(), 0);
        assert!(matches!(
            last,
            Some(StoreEvent::PersistenceFailed { attempt: 2, will_retry: false, .. })
        ));
    }

    #[tokio::test]
    async fn test_rejected_write_is_not_retried() {
        let port = Arc::new(MemoryPort::new());
        port.reject_next_writes(1);
        let (queue, mut events) = spawn(port.clone(), fast_policy(5));

        queue
            .enqueue(EntityChange::delete(EntityKind::Product, "p1"))
            .unwrap();
        queue
            .enqueue(EntityChange::delete(EntityKind::Product, "p2"))
            .unwrap();
        queue.flush().await.unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            StoreEvent::PersistenceFailed { attempt: 1, will_retry: false, .. }
        ));
        assert_eq!(port.write_count(), 1);
        assert_eq!(port.applied_writes()[0].id(), "p2");
    }
}
