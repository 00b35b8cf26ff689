//! Replies to host-initiated requests

use serde::{Deserialize, Serialize};

use super::{ChildId, Payload, QueueId, RequestId};
use crate::engine::{RecordedValue, WorkflowDescription, WorkflowExecution};
use crate::error::RemoteError;

/// Reply sent to the host for one [`ProxyRequest`](super::ProxyRequest)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyReply {
    /// Echo of the request id
    pub request_id: RequestId,

    /// Set when the verb failed; the body is then [`ReplyBody::Empty`]
    #[serde(default)]
    pub error: Option<RemoteError>,

    #[serde(flatten)]
    pub body: ReplyBody,
}

impl ProxyReply {
    pub fn ok(request_id: RequestId, body: ReplyBody) -> Self {
        Self {
            request_id,
            error: None,
            body,
        }
    }

    pub fn failed(request_id: RequestId, error: impl Into<RemoteError>) -> Self {
        Self {
            request_id,
            error: Some(error.into()),
            body: ReplyBody::Empty,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Verb-specific reply data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum ReplyBody {
    Empty,
    Execution {
        execution: WorkflowExecution,
    },
    QueryResult {
        result: Option<Payload>,
    },
    Description {
        description: WorkflowDescription,
    },
    ChildStarted {
        child_id: ChildId,
        execution: WorkflowExecution,
    },
    ChildResult {
        result: Option<Payload>,
    },
    QueueCreated {
        queue_id: QueueId,
    },
    QueueWritten {
        status: WriteStatus,
    },
    /// `closed` is set once the queue is closed and drained; `data` is then empty
    QueueRead {
        data: Option<Payload>,
        closed: bool,
    },
    Value {
        value: RecordedValue,
    },
    Version {
        version: i32,
    },
}

/// Outcome of a queue write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    /// Item was enqueued
    Enqueued,

    /// Non-blocking write found the queue full; nothing was enqueued
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_failed_reply_has_empty_body() {
        let reply = ProxyReply::failed(3, RemoteError::generic("queue 1 is closed"));
        assert!(!reply.is_ok());
        assert_eq!(reply.body, ReplyBody::Empty);

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["reply"], "empty");
        assert_eq!(json["error"]["kind"], "generic");
    }

    #[test]
    fn test_queue_written_wire_shape() {
        let reply = ProxyReply::ok(
            9,
            ReplyBody::QueueWritten {
                status: WriteStatus::Full,
            },
        );
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "full");
        assert!(json["error"].is_null());
        assert_eq!(ErrorKind::Generic.to_string(), "generic");
    }
}
