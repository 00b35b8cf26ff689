//! Shared state behind every handler

use std::sync::Arc;

use crate::client::ClientRegistry;
use crate::config::ProxyConfig;
use crate::context::ContextRegistry;
use crate::correlation::ReplyRouter;
use crate::transport::HostTransport;

/// Process-wide proxy state
pub struct ProxyState {
    pub config: ProxyConfig,
    pub clients: ClientRegistry,
    pub contexts: ContextRegistry,
    pub router: ReplyRouter,
}

impl ProxyState {
    pub fn new(config: ProxyConfig, transport: Arc<dyn HostTransport>) -> Self {
        Self {
            config,
            clients: ClientRegistry::new(),
            contexts: ContextRegistry::new(),
            router: ReplyRouter::new(transport),
        }
    }
}
