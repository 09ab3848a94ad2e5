//! Task queue: ordered, at-least-once delivery of task ids to workers.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};

/// Error type for queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue has been closed and accepts no more deliveries.
    #[error("queue is closed")]
    Closed,
}

/// One scheduled execution of a task.
///
/// The attempt number the delivery schedules is part of the message: the
/// store's lease CAS uses it to tell a retry (next attempt) apart from a
/// duplicate redelivery of an attempt that already ran.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Delivery {
    /// The task to execute.
    pub task_id: String,
    /// Which execution attempt this delivery schedules (1-based).
    pub attempt: u32,
}

impl Delivery {
    /// The first delivery for a freshly created task.
    pub fn first(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            attempt: 1,
        }
    }

    /// The delivery scheduling the next attempt after this one.
    pub fn next_attempt(&self) -> Self {
        Self {
            task_id: self.task_id.clone(),
            attempt: self.attempt + 1,
        }
    }
}

/// Trait for task queue backends.
///
/// Delivery is at-least-once: consumers must tolerate duplicates (the worker
/// pool does, through the store's lease guard).
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a delivery for immediate execution.
    async fn enqueue(&self, delivery: Delivery) -> Result<(), QueueError>;

    /// Enqueue a delivery to become available after `delay` (retry timers).
    async fn enqueue_after(&self, delivery: Delivery, delay: Duration) -> Result<(), QueueError>;

    /// Wait for the next delivery. Returns None once the queue is closed and
    /// drained.
    async fn dequeue(&self) -> Option<Delivery>;

    /// Close the queue. Workers drain remaining deliveries and then stop.
    fn close(&self);
}

/// In-memory task queue backed by an unbounded tokio channel.
///
/// Multiple workers share the receiver and pull independently; ordering is
/// FIFO in enqueue order, with delayed deliveries inserted when their timer
/// fires. Closure is signalled through a watch flag so that a consumer
/// parked inside `dequeue` (holding the receiver lock) still observes it.
pub struct MemoryTaskQueue {
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Mutex<mpsc::UnboundedReceiver<Delivery>>,
    closed: watch::Sender<bool>,
}

impl MemoryTaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        Self {
            tx,
            rx: Mutex::new(rx),
            closed,
        }
    }
}

impl Default for MemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(&self, delivery: Delivery) -> Result<(), QueueError> {
        if *self.closed.borrow() {
            return Err(QueueError::Closed);
        }
        self.tx.send(delivery).map_err(|_| QueueError::Closed)
    }

    async fn enqueue_after(&self, delivery: Delivery, delay: Duration) -> Result<(), QueueError> {
        if *self.closed.borrow() || self.tx.is_closed() {
            return Err(QueueError::Closed);
        }

        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Queue closed during the delay: the delivery is dropped along
            // with the rest of the shutdown.
            let _ = tx.send(delivery);
        });
        Ok(())
    }

    async fn dequeue(&self) -> Option<Delivery> {
        let mut rx = self.rx.lock().await;
        let mut closed = self.closed.subscribe();

        loop {
            if *closed.borrow_and_update() {
                // Stop accepting sends, then drain what is buffered.
                rx.close();
                return rx.recv().await;
            }

            tokio::select! {
                delivery = rx.recv() => return delivery,
                _ = closed.changed() => continue,
            }
        }
    }

    fn close(&self) {
        // The watch flag wakes parked consumers even while one of them
        // holds the receiver lock across recv().
        self.closed.send_replace(true);
    }
}
