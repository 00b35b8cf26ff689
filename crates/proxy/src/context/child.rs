//! Child workflows started from a workflow context

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::engine::{ChildResultFuture, ChildRun, EngineError, WorkflowExecution};
use crate::error::ProxyError;
use crate::protocol::{ChildId, ContextId, Payload};

/// A started child workflow
pub struct ChildContext {
    child_id: ChildId,
    execution: WorkflowExecution,
    result: Mutex<Option<ChildResultFuture>>,
    cancel: CancellationToken,
}

impl ChildContext {
    pub fn child_id(&self) -> ChildId {
        self.child_id
    }

    pub fn execution(&self) -> &WorkflowExecution {
        &self.execution
    }

    /// Claim the result future; only the first wait gets it
    pub fn take_result(&self) -> Result<ChildResultFuture, ProxyError> {
        self.result
            .lock()
            .take()
            .ok_or(ProxyError::ChildAlreadyAwaited(self.child_id))
    }

    /// Request cancellation of the child
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Children of one context
pub struct ChildTable {
    context_id: ContextId,
    next_id: AtomicI64,
    children: Mutex<HashMap<ChildId, Arc<ChildContext>>>,
}

impl ChildTable {
    pub fn new(context_id: ContextId) -> Self {
        Self {
            context_id,
            next_id: AtomicI64::new(1),
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate an id and the cancel token a new child will run under
    pub fn reserve(&self, parent: &CancellationToken) -> (ChildId, CancellationToken) {
        (
            self.next_id.fetch_add(1, Ordering::SeqCst),
            parent.child_token(),
        )
    }

    /// Record a started child under a reserved id
    pub fn insert(
        &self,
        child_id: ChildId,
        run: ChildRun,
        cancel: CancellationToken,
    ) -> Arc<ChildContext> {
        let child = Arc::new(ChildContext {
            child_id,
            execution: run.execution,
            result: Mutex::new(Some(run.result)),
            cancel,
        });
        self.children.lock().insert(child_id, child.clone());
        child
    }

    pub fn get(&self, child_id: ChildId) -> Result<Arc<ChildContext>, ProxyError> {
        self.children
            .lock()
            .get(&child_id)
            .cloned()
            .ok_or(ProxyError::ChildNotFound {
                context_id: self.context_id,
                child_id,
            })
    }

    /// Take the child's result future; the entry is removed when the claim drops
    pub fn claim(&self, child_id: ChildId) -> Result<ChildClaim<'_>, ProxyError> {
        let result = self.get(child_id)?.take_result()?;
        Ok(ChildClaim {
            table: self,
            child_id,
            result,
        })
    }

    pub fn remove(&self, child_id: ChildId) -> Option<Arc<ChildContext>> {
        self.children.lock().remove(&child_id)
    }

    pub fn len(&self) -> usize {
        self.children.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.lock().is_empty()
    }
}

/// Exclusive wait on one child's result
pub struct ChildClaim<'a> {
    table: &'a ChildTable,
    child_id: ChildId,
    result: ChildResultFuture,
}

impl ChildClaim<'_> {
    pub fn child_id(&self) -> ChildId {
        self.child_id
    }

    /// Resolve with the child's result
    pub async fn finish(mut self) -> Result<Option<Payload>, EngineError> {
        (&mut self.result).await
    }
}

impl Drop for ChildClaim<'_> {
    fn drop(&mut self) {
        self.table.remove(self.child_id);
    }
}
