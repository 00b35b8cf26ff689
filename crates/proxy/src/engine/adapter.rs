//! Narrow call surface over the workflow engine's SDK
//!
//! The correlation core never touches engine SDK types directly. Everything
//! it needs is expressed by two traits:
//! - [`EngineAdapter`]: client-scoped calls against an engine connection
//! - [`WorkflowHandle`]: the deterministic handle of one executing run

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::types::{
    ChildWorkflowOptions, RecordedValue, RunOutcome, StartWorkflowOptions, WorkflowDescription,
    WorkflowExecution, WorkflowInfo,
};
use crate::error::{ErrorKind, RemoteError};
use crate::protocol::Payload;

/// Version reported by the engine for code paths that predate a change
pub const DEFAULT_VERSION: i32 = -1;

/// Errors reported by the engine adapter
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Call or awaited future was canceled
    #[error("canceled")]
    Canceled,

    /// Engine-reported timeout
    #[error("timed out: {0}")]
    Timeout(String),

    /// Workflow, query handler or other entity unknown to the engine
    #[error("not found: {0}")]
    NotFound(String),

    /// A workflow (typically a child) failed with a host error
    #[error("workflow failed: {0}")]
    Failed(RemoteError),

    /// Any other engine failure
    #[error("engine failure: {0}")]
    Failure(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Canceled => ErrorKind::Canceled,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::NotFound(_) => ErrorKind::EntityNotFound,
            Self::Failed(remote) => remote.kind,
            Self::Failure(_) => ErrorKind::Generic,
        }
    }
}

/// Bridged entry point registered with the engine for a workflow name
pub type WorkflowEntry =
    Arc<dyn Fn(Arc<dyn WorkflowHandle>, Option<Payload>) -> BoxFuture<'static, RunOutcome> + Send + Sync>;

/// Callback invoked by the engine for each query of a registered name
pub type QueryHandler = Arc<
    dyn Fn(Option<Payload>) -> BoxFuture<'static, Result<Option<Payload>, RemoteError>>
        + Send
        + Sync,
>;

/// Signals of one name, in arrival order
pub type SignalReceiver = mpsc::UnboundedReceiver<Option<Payload>>;

/// Eventual result of a child workflow
pub type ChildResultFuture = BoxFuture<'static, Result<Option<Payload>, EngineError>>;

/// Producer for a side effect or mutable value
pub type ValueProducer = Box<dyn FnOnce() -> RecordedValue + Send>;

/// Comparator deciding whether a new value matches the recorded one
pub type ValueComparator = Box<dyn Fn(&RecordedValue, &RecordedValue) -> bool + Send>;

/// A started child workflow
pub struct ChildRun {
    pub execution: WorkflowExecution,
    pub result: ChildResultFuture,
}

impl std::fmt::Debug for ChildRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildRun")
            .field("execution", &self.execution)
            .finish_non_exhaustive()
    }
}

/// Client-scoped engine calls
///
/// Every call is bounded by the caller with a deadline (see
/// [`ProxyConfig::client_call_timeout`](crate::config::ProxyConfig)).
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Register a bridged entry point for a workflow name
    async fn register_workflow(&self, workflow: &str, entry: WorkflowEntry)
        -> Result<(), EngineError>;

    /// Start a workflow execution
    async fn start_workflow(
        &self,
        workflow: &str,
        args: Option<Payload>,
        options: StartWorkflowOptions,
    ) -> Result<WorkflowExecution, EngineError>;

    /// Signal a running workflow
    async fn signal_workflow(
        &self,
        execution: &WorkflowExecution,
        signal: &str,
        args: Option<Payload>,
    ) -> Result<(), EngineError>;

    /// Signal a workflow, starting it first if it is not running
    async fn signal_with_start(
        &self,
        workflow: &str,
        signal: &str,
        signal_args: Option<Payload>,
        start_args: Option<Payload>,
        options: StartWorkflowOptions,
    ) -> Result<WorkflowExecution, EngineError>;

    /// Query a running workflow
    async fn query_workflow(
        &self,
        execution: &WorkflowExecution,
        query: &str,
        args: Option<Payload>,
    ) -> Result<Option<Payload>, EngineError>;

    /// Request cancellation of a workflow
    async fn cancel_workflow(&self, execution: &WorkflowExecution) -> Result<(), EngineError>;

    /// Forcefully terminate a workflow
    async fn terminate_workflow(
        &self,
        execution: &WorkflowExecution,
        reason: Option<String>,
    ) -> Result<(), EngineError>;

    /// Describe a workflow execution
    async fn describe_workflow(
        &self,
        execution: &WorkflowExecution,
    ) -> Result<WorkflowDescription, EngineError>;
}

/// Deterministic handle of one executing run
///
/// The engine drives a run on a cooperative scheduler; only one callback
/// touches a handle at a time. Suspension happens only inside the async
/// methods here or while awaiting the run's [`cancellation`](Self::cancellation).
#[async_trait]
pub trait WorkflowHandle: Send + Sync {
    /// Metadata of the run
    fn info(&self) -> WorkflowInfo;

    /// Whether the engine is currently replaying history (queried live)
    fn is_replaying(&self) -> bool;

    /// Token canceled when the engine cancels the run
    fn cancellation(&self) -> CancellationToken;

    /// Run a coroutine on the run's scheduler
    fn spawn(&self, task: BoxFuture<'static, ()>);

    /// Channel of incoming signals for a name
    fn signal_channel(&self, signal: &str) -> SignalReceiver;

    /// Install the callback for a query name
    fn set_query_handler(&self, query: &str, handler: QueryHandler) -> Result<(), EngineError>;

    /// Replay-safe timer
    async fn sleep(&self, duration: Duration) -> Result<(), EngineError>;

    /// Start a child workflow; canceling `cancel` cancels the child
    async fn start_child(
        &self,
        workflow: &str,
        args: Option<Payload>,
        options: ChildWorkflowOptions,
        cancel: CancellationToken,
    ) -> Result<ChildRun, EngineError>;

    /// Signal another execution and wait for delivery
    async fn signal_external(
        &self,
        execution: &WorkflowExecution,
        signal: &str,
        args: Option<Payload>,
    ) -> Result<(), EngineError>;

    /// Record a value once; replays return the recorded value
    fn side_effect(&self, producer: ValueProducer) -> RecordedValue;

    /// Record a value keyed by `id`, re-recording only when `equals` reports
    /// a change; replays return the recorded value
    fn mutable_side_effect(
        &self,
        id: &str,
        producer: ValueProducer,
        equals: ValueComparator,
    ) -> RecordedValue;

    /// Version gate for a change id
    fn get_version(
        &self,
        change_id: &str,
        min_supported: i32,
        max_supported: i32,
    ) -> Result<i32, EngineError>;
}
