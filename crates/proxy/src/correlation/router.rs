//! Sends host callbacks and routes the host's replies back to their waiters

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::operation::{OperationTable, Outcome};
use crate::error::{ProxyError, RemoteError};
use crate::protocol::{ContextId, HostReply, HostRequest, RequestId};
use crate::transport::HostTransport;

/// Correlates proxy-initiated requests with the host's replies
pub struct ReplyRouter {
    operations: Arc<OperationTable>,
    transport: Arc<dyn HostTransport>,
}

impl ReplyRouter {
    pub fn new(transport: Arc<dyn HostTransport>) -> Self {
        Self {
            operations: Arc::new(OperationTable::new()),
            transport,
        }
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    /// Complete the operation a host reply answers
    pub fn deliver(&self, reply: HostReply) -> Result<(), ProxyError> {
        let request_id = reply.request_id;
        self.operations.deliver(request_id, reply.into()).map_err(|e| {
            warn!(request_id, "reply for unknown operation");
            e
        })
    }

    /// Send a callback to the host and wait for its outcome
    ///
    /// The operation is registered before the request leaves, so a fast reply
    /// always finds it. Transmission runs on its own task; a transmit failure
    /// resolves the operation with a generic error. Canceling `cancel` removes
    /// the operation and returns [`ProxyError::Canceled`].
    pub async fn round_trip<F>(
        &self,
        context_id: Option<ContextId>,
        cancel: &CancellationToken,
        build: F,
    ) -> Result<Outcome, ProxyError>
    where
        F: FnOnce(RequestId) -> HostRequest,
    {
        let request_id = self.operations.next_request_id();
        let pending = self.operations.add(request_id, context_id)?;
        let request = build(request_id);

        debug!(request_id, callback = request.body.name(), "sending request to host");

        let transport = self.transport.clone();
        let operations = self.operations.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.transmit(request).await {
                warn!(request_id, error = %e, "failed to send request to host");
                let _ = operations.deliver(
                    request_id,
                    Outcome::Error(RemoteError::generic(e.to_string())),
                );
            }
        });

        tokio::select! {
            biased;
            outcome = pending.recv() => outcome,
            _ = cancel.cancelled() => {
                self.operations.remove(request_id);
                debug!(request_id, "wait for host reply canceled");
                Err(ProxyError::Canceled)
            }
        }
    }
}
