//! Engine clients known to the proxy

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::engine::EngineAdapter;
use crate::error::ProxyError;
use crate::protocol::ClientId;

struct ClientEntry {
    adapter: Arc<dyn EngineAdapter>,
    workflows: HashSet<String>,
}

/// Engine connections keyed by client id
///
/// Connecting and disconnecting clients happens outside the core; the
/// embedding process adds an adapter once its connection is up.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, ClientEntry>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, client_id: ClientId, adapter: Arc<dyn EngineAdapter>) {
        self.clients.write().insert(
            client_id,
            ClientEntry {
                adapter,
                workflows: HashSet::new(),
            },
        );
        info!(client_id, "engine client added");
    }

    pub fn get(&self, client_id: ClientId) -> Result<Arc<dyn EngineAdapter>, ProxyError> {
        self.clients
            .read()
            .get(&client_id)
            .map(|entry| entry.adapter.clone())
            .ok_or(ProxyError::ClientNotFound(client_id))
    }

    pub fn remove(&self, client_id: ClientId) -> bool {
        self.clients.write().remove(&client_id).is_some()
    }

    /// Record a workflow registration; false if the name was already taken
    pub fn mark_registered(&self, client_id: ClientId, workflow: &str) -> Result<bool, ProxyError> {
        let mut clients = self.clients.write();
        let entry = clients
            .get_mut(&client_id)
            .ok_or(ProxyError::ClientNotFound(client_id))?;
        Ok(entry.workflows.insert(workflow.to_string()))
    }

    /// Undo [`mark_registered`](Self::mark_registered) after a failed registration
    pub fn unmark_registered(&self, client_id: ClientId, workflow: &str) {
        if let Some(entry) = self.clients.write().get_mut(&client_id) {
            entry.workflows.remove(workflow);
        }
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}
