//! Table of outstanding proxy-initiated requests

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{ProxyError, RemoteError};
use crate::protocol::{ContextId, ContinueAsNewOverrides, HostReply, Payload, RequestId};

/// Resolution of an outstanding request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Host answered with a (possibly empty) result
    Success(Option<Payload>),

    /// Host answered with an error
    Error(RemoteError),

    /// Host asked the engine to replay the current attempt
    ForceReplay,

    /// Host asked to end the run and continue as new
    ContinueAsNew(ContinueAsNewOverrides),
}

impl From<HostReply> for Outcome {
    fn from(reply: HostReply) -> Self {
        if reply.force_replay {
            Self::ForceReplay
        } else if let Some(overrides) = reply.continue_as_new {
            Self::ContinueAsNew(overrides)
        } else if let Some(error) = reply.error {
            Self::Error(error)
        } else {
            Self::Success(reply.result)
        }
    }
}

struct Operation {
    context_id: Option<ContextId>,
    reply_tx: oneshot::Sender<Outcome>,
}

/// Receiving half of an operation registered with [`OperationTable::add`]
#[derive(Debug)]
pub struct PendingReply {
    request_id: RequestId,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingReply {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Wait for the outcome; a removed operation reads as canceled
    pub async fn recv(self) -> Result<Outcome, ProxyError> {
        self.rx.await.map_err(|_| ProxyError::Canceled)
    }
}

/// Outstanding operations keyed by request id
///
/// Each entry is resolved exactly once: [`deliver`](Self::deliver) removes
/// the entry before completing it, so a late or duplicate reply finds nothing.
pub struct OperationTable {
    next_id: AtomicI64,
    operations: DashMap<RequestId, Operation>,
}

impl Default for OperationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationTable {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            operations: DashMap::new(),
        }
    }

    /// Allocate a fresh request id
    pub fn next_request_id(&self) -> RequestId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Register an outstanding operation
    pub fn add(
        &self,
        request_id: RequestId,
        context_id: Option<ContextId>,
    ) -> Result<PendingReply, ProxyError> {
        use dashmap::mapref::entry::Entry;

        let (reply_tx, rx) = oneshot::channel();
        match self.operations.entry(request_id) {
            Entry::Occupied(_) => Err(ProxyError::DuplicateRequest(request_id)),
            Entry::Vacant(slot) => {
                slot.insert(Operation {
                    context_id,
                    reply_tx,
                });
                Ok(PendingReply { request_id, rx })
            }
        }
    }

    /// Resolve an operation with its outcome
    pub fn deliver(&self, request_id: RequestId, outcome: Outcome) -> Result<(), ProxyError> {
        let (_, operation) = self
            .operations
            .remove(&request_id)
            .ok_or(ProxyError::OperationNotFound(request_id))?;

        if operation.reply_tx.send(outcome).is_err() {
            debug!(request_id, "waiter dropped before reply arrived");
        }
        Ok(())
    }

    /// Drop an operation without resolving it
    pub fn remove(&self, request_id: RequestId) -> bool {
        self.operations.remove(&request_id).is_some()
    }

    /// Drop every operation still outstanding for a context
    pub fn remove_for_context(&self, context_id: ContextId) -> usize {
        let before = self.operations.len();
        self.operations
            .retain(|_, operation| operation.context_id != Some(context_id));
        let removed = before.saturating_sub(self.operations.len());
        if removed > 0 {
            warn!(context_id, removed, "dropped outstanding operations of finished context");
        }
        removed
    }

    pub fn contains(&self, request_id: RequestId) -> bool {
        self.operations.contains_key(&request_id)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_deliver_resolves_once() {
        let table = OperationTable::new();
        let id = table.next_request_id();
        let pending = table.add(id, Some(1)).unwrap();

        table.deliver(id, Outcome::Success(Some(vec![1]))).unwrap();
        assert_eq!(pending.recv().await.unwrap(), Outcome::Success(Some(vec![1])));

        let err = table.deliver(id, Outcome::Success(None)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntityNotFound);
        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_request_id_rejected() {
        let table = OperationTable::new();
        let _pending = table.add(5, None).unwrap();
        assert!(matches!(table.add(5, None), Err(ProxyError::DuplicateRequest(5))));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_removed_operation_reads_as_canceled() {
        let table = OperationTable::new();
        let pending = table.add(1, Some(3)).unwrap();
        let _other = table.add(2, Some(4)).unwrap();

        assert_eq!(table.remove_for_context(3), 1);
        assert!(matches!(pending.recv().await, Err(ProxyError::Canceled)));
        assert!(table.contains(2));
    }

    #[test]
    fn test_host_reply_precedence() {
        let mut reply = HostReply::failed(1, RemoteError::application("boom"));
        reply.force_replay = true;
        assert_eq!(Outcome::from(reply.clone()), Outcome::ForceReplay);

        reply.force_replay = false;
        reply.continue_as_new = Some(ContinueAsNewOverrides::default());
        assert!(matches!(Outcome::from(reply.clone()), Outcome::ContinueAsNew(_)));

        reply.continue_as_new = None;
        assert!(matches!(Outcome::from(reply), Outcome::Error(_)));
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_reach_their_waiters() {
        let table = Arc::new(OperationTable::new());
        let mut waiters = Vec::new();

        for _ in 0..100 {
            let id = table.next_request_id();
            let pending = table.add(id, None).unwrap();
            waiters.push((id, pending));
        }

        let mut deliveries = Vec::new();
        for (id, _) in &waiters {
            let table = table.clone();
            let id = *id;
            deliveries.push(tokio::spawn(async move {
                table
                    .deliver(id, Outcome::Success(Some(id.to_le_bytes().to_vec())))
                    .unwrap();
            }));
        }
        for delivery in deliveries {
            delivery.await.unwrap();
        }

        for (id, pending) in waiters {
            assert_eq!(
                pending.recv().await.unwrap(),
                Outcome::Success(Some(id.to_le_bytes().to_vec()))
            );
        }
        assert!(table.is_empty());
    }
}
