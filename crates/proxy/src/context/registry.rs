//! Process-wide registry of live workflow contexts

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::workflow::WorkflowContext;
use crate::error::ProxyError;
use crate::protocol::ContextId;

/// Live contexts keyed by id
pub struct ContextRegistry {
    next_id: AtomicI64,
    contexts: RwLock<HashMap<ContextId, Arc<WorkflowContext>>>,
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            contexts: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate a fresh id; ids are never reused within the process
    pub fn next_context_id(&self) -> ContextId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn add(&self, context: Arc<WorkflowContext>) {
        let context_id = context.context_id();
        self.contexts.write().insert(context_id, context);
        debug!(context_id, "workflow context added");
    }

    pub fn get(&self, context_id: ContextId) -> Result<Arc<WorkflowContext>, ProxyError> {
        self.contexts
            .read()
            .get(&context_id)
            .cloned()
            .ok_or(ProxyError::ContextNotFound(context_id))
    }

    /// Remove and shut down a context
    pub fn remove(&self, context_id: ContextId) -> Option<Arc<WorkflowContext>> {
        let removed = self.contexts.write().remove(&context_id);
        if let Some(context) = &removed {
            context.shutdown();
            debug!(context_id, "workflow context removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }
}
