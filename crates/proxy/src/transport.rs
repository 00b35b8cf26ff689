//! Outbound path to the host
//!
//! Framing and the wire itself live outside the core. The proxy only needs to
//! hand a [`HostRequest`] to something that will deliver it; replies come
//! back through [`RequestDispatcher::on_reply_received`](crate::handlers::RequestDispatcher::on_reply_received).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::protocol::HostRequest;

/// Transport errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The host side of the transport is gone
    #[error("transport closed")]
    Closed,

    /// Delivery failed
    #[error("send failed: {0}")]
    Send(String),
}

/// Sends proxy-initiated requests to the host
#[async_trait]
pub trait HostTransport: Send + Sync {
    async fn transmit(&self, request: HostRequest) -> Result<(), TransportError>;
}

/// Transport backed by an in-process channel
///
/// The receiving half is owned by whatever pumps requests to the host (a
/// socket writer, or a fake host in tests).
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<HostRequest>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl HostTransport for ChannelTransport {
    async fn transmit(&self, request: HostRequest) -> Result<(), TransportError> {
        self.tx.send(request).map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HostRequestBody;

    fn signal(request_id: i64) -> HostRequest {
        HostRequest::new(
            request_id,
            1,
            Some(1),
            HostRequestBody::SignalInvoke {
                signal: "approve".into(),
                args: None,
                replaying: false,
            },
        )
    }

    #[tokio::test]
    async fn test_channel_transport_delivers_in_order() {
        let (transport, mut rx) = ChannelTransport::new();
        transport.transmit(signal(1)).await.unwrap();
        transport.transmit(signal(2)).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().request_id, 1);
        assert_eq!(rx.recv().await.unwrap().request_id, 2);
    }

    #[tokio::test]
    async fn test_channel_transport_closed() {
        let (transport, rx) = ChannelTransport::new();
        drop(rx);

        let result = transport.transmit(signal(1)).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
