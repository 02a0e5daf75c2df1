//! # Queue Module
//!
//! Multi-producer, multi-consumer work queues connecting the pipeline
//! stages.
//!
//! ## Semantics
//! - `put` blocks while a bounded queue is full (backpressure)
//! - `take` blocks until an item arrives or the queue is closed
//! - every taken item must be acknowledged with `task_done`
//! - `join` blocks until every item ever put has been taken and acknowledged
//! - `close` wakes all blocked callers with [`QueueError::Closed`]; it is
//!   the termination signal for the stage consuming the queue
//!
//! ## Example
//! ```rust,ignore
//! let queue = WorkQueue::bounded(4);
//! let consumer = queue.clone();
//! std::thread::spawn(move || {
//!     while let Ok(item) = consumer.take() {
//!         handle(item);
//!         consumer.task_done().ok();
//!     }
//! });
//! queue.put(job)?;
//! queue.join();
//! queue.close();
//! ```

use crate::error::QueueError;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// A cloneable handle to a shared work queue
pub struct WorkQueue<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    items_tx: Sender<T>,
    items_rx: Receiver<T>,
    /// Dropping the sender disconnects `closed_rx`, waking every select
    closed_tx: Mutex<Option<Sender<()>>>,
    closed_rx: Receiver<()>,
    /// Items put but not yet acknowledged
    unfinished: Mutex<usize>,
    all_done: Condvar,
    capacity: Option<usize>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> WorkQueue<T> {
    /// Queue with no capacity limit; `put` never blocks
    pub fn unbounded() -> Self {
        let (items_tx, items_rx) = unbounded();
        Self::from_channel(items_tx, items_rx, None)
    }

    /// Queue holding at most `capacity` items; `put` blocks when full.
    ///
    /// A capacity of zero is treated as one.
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (items_tx, items_rx) = bounded(capacity);
        Self::from_channel(items_tx, items_rx, Some(capacity))
    }

    fn from_channel(items_tx: Sender<T>, items_rx: Receiver<T>, capacity: Option<usize>) -> Self {
        let (closed_tx, closed_rx) = bounded(0);
        Self {
            shared: Arc::new(Shared {
                items_tx,
                items_rx,
                closed_tx: Mutex::new(Some(closed_tx)),
                closed_rx,
                unfinished: Mutex::new(0),
                all_done: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Enqueue an item, blocking while the queue is full
    pub fn put(&self, item: T) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }

        // Counted before the send so `join` cannot slip past a blocked put
        *self.unfinished() += 1;

        let sent = select! {
            send(self.shared.items_tx, item) -> res => res.is_ok(),
            recv(self.shared.closed_rx) -> _ => false,
        };

        if sent {
            Ok(())
        } else {
            self.finish_one();
            Err(QueueError::Closed)
        }
    }

    /// Dequeue an item, blocking until one is available or the queue closes
    pub fn take(&self) -> Result<T, QueueError> {
        // Drain what is already queued before reporting closure
        if let Ok(item) = self.shared.items_rx.try_recv() {
            return Ok(item);
        }

        select! {
            recv(self.shared.items_rx) -> item => item.map_err(|_| QueueError::Closed),
            recv(self.shared.closed_rx) -> _ => Err(QueueError::Closed),
        }
    }

    /// Acknowledge that a previously taken item has been fully processed
    pub fn task_done(&self) -> Result<(), QueueError> {
        let mut unfinished = self.unfinished();
        if *unfinished == 0 {
            return Err(QueueError::TooManyTaskDone);
        }
        *unfinished -= 1;
        if *unfinished == 0 {
            self.shared.all_done.notify_all();
        }
        Ok(())
    }

    /// Block until every item put so far has been taken and acknowledged
    pub fn join(&self) {
        let mut unfinished = self.unfinished();
        while *unfinished > 0 {
            unfinished = self
                .shared
                .all_done
                .wait(unfinished)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Close the queue, waking every blocked `put` and `take`
    pub fn close(&self) {
        let mut closed_tx = self
            .shared
            .closed_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        closed_tx.take();
    }

    pub fn is_closed(&self) -> bool {
        self.shared
            .closed_tx
            .lock()
            .map(|tx| tx.is_none())
            .unwrap_or(true)
    }

    /// Number of items currently waiting in the queue
    pub fn len(&self) -> usize {
        self.shared.items_rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.items_rx.is_empty()
    }

    /// Maximum number of waiting items, `None` if unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.shared.capacity
    }

    /// Items put but not yet acknowledged with `task_done`
    pub fn unfinished_tasks(&self) -> usize {
        *self.unfinished()
    }

    fn finish_one(&self) {
        let mut unfinished = self.unfinished();
        *unfinished = unfinished.saturating_sub(1);
        if *unfinished == 0 {
            self.shared.all_done.notify_all();
        }
    }

    fn unfinished(&self) -> MutexGuard<'_, usize> {
        self.shared
            .unfinished
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
