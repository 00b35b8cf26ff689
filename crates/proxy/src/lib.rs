//! # Workflow Engine Proxy
//!
//! Correlation core of an out-of-process bridge between a durable workflow
//! engine and a host process that implements workflows in another runtime.
//!
//! ## Features
//!
//! - **Request/reply correlation**: every proxy-initiated callback gets a fresh
//!   request id; the host's reply resumes exactly the waiter that sent it
//! - **Workflow contexts**: per-run state (children, queues, subscriptions)
//!   created on invoke and removed on the run's terminal outcome
//! - **Replay-aware verbs**: side effects, mutable values and version gates
//!   route through the engine's recording APIs
//! - **Cancellation everywhere**: every wait selects on the run's cancellation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     RequestDispatcher                        │
//! │  (host requests → handlers, host replies → ReplyRouter)      │
//! └─────────────────────────────────────────────────────────────┘
//!            │                                    │
//!            ▼                                    ▼
//! ┌───────────────────────────┐    ┌───────────────────────────┐
//! │      ContextRegistry      │    │        ReplyRouter        │
//! │ (contexts, children,      │    │ (OperationTable +         │
//! │  queues)                  │    │  HostTransport)           │
//! └───────────────────────────┘    └───────────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              EngineAdapter / WorkflowHandle                  │
//! │  (engine SDK seam; InMemoryEngine for tests)                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use everruns_proxy::prelude::*;
//!
//! let (transport, mut outbound) = ChannelTransport::new();
//! let dispatcher = RequestDispatcher::new(ProxyConfig::from_env(), Arc::new(transport));
//! dispatcher.add_client(1, Arc::new(InMemoryEngine::new()));
//!
//! let reply = dispatcher
//!     .handle(ProxyRequest::new(
//!         RequestHeader::new(1, 1),
//!         RequestBody::WorkflowRegister { workflow: "Billing".into() },
//!     ))
//!     .await;
//!
//! // Host callbacks arrive on `outbound`; answers go back through
//! // dispatcher.on_reply_received(HostReply::completed(id, result)).
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod state;
pub mod telemetry;
pub mod transport;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::ProxyConfig;
    pub use crate::engine::{
        EngineAdapter, InMemoryEngine, RecordedValue, RunOutcome, StartWorkflowOptions,
        WorkflowExecution, WorkflowHandle,
    };
    pub use crate::error::{ErrorKind, ProxyError, RemoteError};
    pub use crate::handlers::RequestDispatcher;
    pub use crate::protocol::{
        HostReply, HostRequest, HostRequestBody, ProxyReply, ProxyRequest, ReplyBody,
        RequestBody, RequestHeader,
    };
    pub use crate::transport::{ChannelTransport, HostTransport};
}

// Re-export key types at crate root
pub use config::ProxyConfig;
pub use correlation::{OperationTable, Outcome, ReplyRouter};
pub use error::{ErrorKind, ProxyError, RemoteError};
pub use handlers::RequestDispatcher;
pub use telemetry::{init_tracing, TelemetryConfig};
pub use transport::{ChannelTransport, HostTransport, TransportError};
