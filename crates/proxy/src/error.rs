//! Error types shared by the correlation core and its handlers
//!
//! Two layers exist:
//! - [`ProxyError`] is what handlers return internally
//! - [`RemoteError`] is the structured `{kind, cause, message}` value carried
//!   on replies, so the host can rebuild an equivalent typed error

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::protocol::{ChildId, ClientId, ContextId, QueueId, RequestId};
use crate::transport::TransportError;

/// Error classification visible to the host
///
/// Force-replay is not a kind: it is a control outcome
/// (see [`Outcome::ForceReplay`](crate::correlation::Outcome::ForceReplay)),
/// never an error carried in a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown client, context, child workflow, queue or request
    EntityNotFound,

    /// Engine- or future-level cancellation
    Canceled,

    /// Queue-read timeout or engine-reported timeout
    Timeout,

    /// Opaque business failure reported by the host
    Application,

    /// Internal fault (transport failure, protocol misuse, closed queue)
    Generic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntityNotFound => write!(f, "entity_not_found"),
            Self::Canceled => write!(f, "canceled"),
            Self::Timeout => write!(f, "timeout"),
            Self::Application => write!(f, "application"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// Structured error exchanged with the host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteError {
    /// Error classification
    pub kind: ErrorKind,

    /// Optional underlying cause (e.g. the host-side exception type)
    pub cause: Option<String>,

    /// Human readable message
    pub message: String,
}

impl RemoteError {
    /// Create a new error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            cause: None,
            message: message.into(),
        }
    }

    /// Create an application (business) error
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Application, message)
    }

    /// Create a cancellation error
    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Canceled, message)
    }

    /// Create a generic (internal) error
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, message)
    }

    /// Attach a cause
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Whether this error represents a cancellation
    pub fn is_canceled(&self) -> bool {
        self.kind == ErrorKind::Canceled
    }

    /// Structural equality used when comparing recorded values on replay.
    ///
    /// Two errors describe the same failure when kind and message match;
    /// the cause is diagnostic only.
    pub fn same_failure(&self, other: &RemoteError) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} ({}): {}", self.kind, cause, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Errors produced by the proxy core
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// No engine client registered under this id
    #[error("client not found: {0}")]
    ClientNotFound(ClientId),

    /// Request did not carry a context id
    #[error("request has no workflow context id")]
    MissingContextId,

    /// No live workflow context with this id
    #[error("workflow context not found: {0}")]
    ContextNotFound(ContextId),

    /// No child workflow with this id in the context
    #[error("child workflow {child_id} not found in context {context_id}")]
    ChildNotFound {
        context_id: ContextId,
        child_id: ChildId,
    },

    /// No queue with this id in the context
    #[error("queue {queue_id} not found in context {context_id}")]
    QueueNotFound {
        context_id: ContextId,
        queue_id: QueueId,
    },

    /// Reply for a request that is not outstanding
    #[error("no outstanding operation for request {0}")]
    OperationNotFound(RequestId),

    /// Request id already has an outstanding operation
    #[error("request {0} already has an outstanding operation")]
    DuplicateRequest(RequestId),

    /// The wait was canceled
    #[error("operation canceled")]
    Canceled,

    /// The wait timed out
    #[error("operation timed out")]
    Timeout,

    /// Write attempted on a closed queue
    #[error("queue {0} is closed")]
    QueueClosed(QueueId),

    /// Child result already claimed by another wait
    #[error("child workflow {0} is already being awaited")]
    ChildAlreadyAwaited(ChildId),

    /// Signal already has a subscription in this context
    #[error("signal {0} is already subscribed")]
    AlreadySubscribed(String),

    /// Workflow or query name already registered in its scope
    #[error("{0} is already registered")]
    AlreadyRegistered(String),

    /// Host replied with something the verb does not accept
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Engine adapter error
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Transport error
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Error reported by the host
    #[error("{0}")]
    Remote(RemoteError),
}

impl ProxyError {
    /// Host-visible classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ClientNotFound(_)
            | Self::MissingContextId
            | Self::ContextNotFound(_)
            | Self::ChildNotFound { .. }
            | Self::QueueNotFound { .. }
            | Self::OperationNotFound(_) => ErrorKind::EntityNotFound,
            Self::Canceled => ErrorKind::Canceled,
            Self::Timeout => ErrorKind::Timeout,
            Self::Engine(e) => e.kind(),
            Self::Remote(e) => e.kind,
            Self::DuplicateRequest(_)
            | Self::QueueClosed(_)
            | Self::ChildAlreadyAwaited(_)
            | Self::AlreadySubscribed(_)
            | Self::AlreadyRegistered(_)
            | Self::UnexpectedReply(_)
            | Self::Transport(_) => ErrorKind::Generic,
        }
    }
}

impl From<ProxyError> for RemoteError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Remote(remote) => remote,
            ProxyError::Engine(EngineError::Failed(remote)) => remote,
            other => RemoteError::new(other.kind(), other.to_string()),
        }
    }
}

impl From<RemoteError> for ProxyError {
    fn from(err: RemoteError) -> Self {
        Self::Remote(err)
    }
}
