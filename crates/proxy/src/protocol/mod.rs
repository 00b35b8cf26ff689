//! Typed protocol records exchanged with the host
//!
//! Framing and encoding are handled by the transport layer. This module only
//! defines the shapes:
//! - [`ProxyRequest`] / [`ProxyReply`] for host-initiated verbs
//! - [`HostRequest`] / [`HostReply`] for proxy-initiated callbacks
//!   (workflow, signal and query invocations) that the host must answer

pub(crate) mod duration;
mod host;
mod reply;
mod request;

pub use host::{ContinueAsNewOverrides, HostReply, HostRequest, HostRequestBody};
pub use reply::{ProxyReply, ReplyBody, WriteStatus};
pub use request::{ProxyRequest, RequestBody, RequestHeader};

/// Process-unique request identifier
pub type RequestId = i64;

/// Process-unique workflow context identifier
pub type ContextId = i64;

/// Child workflow identifier, unique within its parent context
pub type ChildId = i64;

/// Queue identifier, unique within its context
pub type QueueId = i64;

/// Engine client identifier
pub type ClientId = i64;

/// Worker identifier
pub type WorkerId = i64;

/// Opaque encoded payload
pub type Payload = Vec<u8>;
