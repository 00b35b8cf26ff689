//! Per-run state of a bridged workflow

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::child::ChildTable;
use super::queue::QueueTable;
use crate::engine::{WorkflowHandle, WorkflowInfo};
use crate::error::ProxyError;
use crate::protocol::{ClientId, ContextId, HostRequest, HostRequestBody, RequestId, WorkerId};

/// State of one workflow invocation, alive from invoke until the host's
/// final reply
pub struct WorkflowContext {
    context_id: ContextId,
    client_id: ClientId,
    worker_id: Option<WorkerId>,
    workflow_name: String,
    handle: Arc<dyn WorkflowHandle>,
    cancel: CancellationToken,
    children: ChildTable,
    queues: QueueTable,
    signals: Mutex<HashSet<String>>,
    queries: Mutex<HashSet<String>>,
}

impl WorkflowContext {
    pub fn new(
        context_id: ContextId,
        client_id: ClientId,
        workflow_name: impl Into<String>,
        handle: Arc<dyn WorkflowHandle>,
    ) -> Self {
        let cancel = handle.cancellation().child_token();
        Self {
            context_id,
            client_id,
            worker_id: None,
            workflow_name: workflow_name.into(),
            handle,
            cancel,
            children: ChildTable::new(context_id),
            queues: QueueTable::new(context_id),
            signals: Mutex::new(HashSet::new()),
            queries: Mutex::new(HashSet::new()),
        }
    }

    /// Worker the run was registered from; stamped on every host callback
    pub fn with_worker_id(mut self, worker_id: Option<WorkerId>) -> Self {
        self.worker_id = worker_id;
        self
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn worker_id(&self) -> Option<WorkerId> {
        self.worker_id
    }

    /// Build a callback to the host addressed from this context
    pub fn host_request(&self, request_id: RequestId, body: HostRequestBody) -> HostRequest {
        let request = HostRequest::new(request_id, self.client_id, Some(self.context_id), body);
        match self.worker_id {
            Some(worker_id) => request.with_worker_id(worker_id),
            None => request,
        }
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn handle(&self) -> &Arc<dyn WorkflowHandle> {
        &self.handle
    }

    /// Run metadata from the engine
    pub fn info(&self) -> WorkflowInfo {
        self.handle.info()
    }

    /// Read live; the flag changes as the engine moves past history
    pub fn is_replaying(&self) -> bool {
        self.handle.is_replaying()
    }

    /// Token canceled when the run is canceled or the context is torn down
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn children(&self) -> &ChildTable {
        &self.children
    }

    pub fn queues(&self) -> &QueueTable {
        &self.queues
    }

    /// Claim a signal name for this context
    pub fn claim_signal(&self, signal: &str) -> Result<(), ProxyError> {
        if self.signals.lock().insert(signal.to_string()) {
            Ok(())
        } else {
            Err(ProxyError::AlreadySubscribed(signal.to_string()))
        }
    }

    /// Record a query registration; returns false if the name was already registered
    pub fn claim_query(&self, query: &str) -> bool {
        self.queries.lock().insert(query.to_string())
    }

    /// Tear down: cancel waiters and close queues
    pub(crate) fn shutdown(&self) {
        self.cancel.cancel();
        self.queues.close_all();
    }
}

impl std::fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("context_id", &self.context_id)
            .field("client_id", &self.client_id)
            .field("worker_id", &self.worker_id)
            .field("workflow_name", &self.workflow_name)
            .finish_non_exhaustive()
    }
}
