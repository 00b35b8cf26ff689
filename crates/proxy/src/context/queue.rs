//! Bounded FIFO queues owned by a workflow context

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;
use crate::protocol::{ContextId, Payload, QueueId};

/// Result of a non-blocking write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryWrite {
    Enqueued,

    /// Queue was full; the value is handed back
    Full(Payload),
}

/// Result of a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Value(Payload),

    /// Queue is closed and drained
    Closed,
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<Payload>,
    closed: bool,
}

/// Bounded queue shared between the host's readers and writers
///
/// Items already enqueued stay readable after [`close`](Self::close); a read
/// returns [`QueueItem::Closed`] only once the queue is both closed and empty.
pub struct WorkflowQueue {
    queue_id: QueueId,
    capacity: usize,
    state: Mutex<QueueState>,
    readable: Notify,
    writable: Notify,
}

impl WorkflowQueue {
    /// Create a queue; capacity is clamped to at least 1
    pub fn new(queue_id: QueueId, capacity: usize) -> Self {
        Self {
            queue_id,
            capacity: capacity.max(1),
            state: Mutex::new(QueueState::default()),
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    pub fn queue_id(&self) -> QueueId {
        self.queue_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Enqueue without waiting
    pub fn try_write(&self, value: Payload) -> Result<TryWrite, ProxyError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ProxyError::QueueClosed(self.queue_id));
        }
        if state.items.len() >= self.capacity {
            return Ok(TryWrite::Full(value));
        }
        state.items.push_back(value);
        drop(state);

        self.readable.notify_one();
        Ok(TryWrite::Enqueued)
    }

    /// Enqueue, waiting for space
    pub async fn write(&self, value: Payload, cancel: &CancellationToken) -> Result<(), ProxyError> {
        let mut value = value;
        loop {
            let notified = self.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_write(value)? {
                TryWrite::Enqueued => return Ok(()),
                TryWrite::Full(returned) => value = returned,
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return Err(ProxyError::Canceled),
            }
        }
    }

    /// Dequeue, waiting for an item or for close
    pub async fn read(&self, cancel: &CancellationToken) -> Result<QueueItem, ProxyError> {
        loop {
            let notified = self.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_read() {
                return Ok(item);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return Err(ProxyError::Canceled),
            }
        }
    }

    fn try_read(&self) -> Option<QueueItem> {
        let mut state = self.state.lock();
        let next = state.items.pop_front();
        match next {
            Some(value) => {
                drop(state);
                self.writable.notify_one();
                Some(QueueItem::Value(value))
            }
            None if state.closed => Some(QueueItem::Closed),
            None => None,
        }
    }

    /// Close the queue, waking every waiter; closing twice is a no-op
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }
}

/// Queues of one context
pub struct QueueTable {
    context_id: ContextId,
    next_id: AtomicI64,
    queues: Mutex<HashMap<QueueId, Arc<WorkflowQueue>>>,
}

impl QueueTable {
    pub fn new(context_id: ContextId) -> Self {
        Self {
            context_id,
            next_id: AtomicI64::new(1),
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Create a queue with a fresh id
    pub fn create(&self, capacity: usize) -> Arc<WorkflowQueue> {
        let queue_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let queue = Arc::new(WorkflowQueue::new(queue_id, capacity));
        self.queues.lock().insert(queue_id, queue.clone());
        queue
    }

    pub fn get(&self, queue_id: QueueId) -> Result<Arc<WorkflowQueue>, ProxyError> {
        self.queues
            .lock()
            .get(&queue_id)
            .cloned()
            .ok_or(ProxyError::QueueNotFound {
                context_id: self.context_id,
                queue_id,
            })
    }

    /// Close every queue (used when the context goes away)
    pub fn close_all(&self) {
        let queues: Vec<_> = self.queues.lock().drain().map(|(_, q)| q).collect();
        for queue in queues {
            queue.close();
        }
    }

    pub fn len(&self) -> usize {
        self.queues.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.lock().is_empty()
    }
}
