//! Workflow engine seam
//!
//! - [`EngineAdapter`] and [`WorkflowHandle`] isolate the engine SDK
//! - [`InMemoryEngine`] is a process-local engine for tests and local hosting

mod adapter;
mod memory;
mod types;

pub use adapter::{
    ChildResultFuture, ChildRun, EngineAdapter, EngineError, QueryHandler, SignalReceiver,
    ValueComparator, ValueProducer, WorkflowEntry, WorkflowHandle, DEFAULT_VERSION,
};
pub use memory::{InMemoryEngine, InMemoryWorkflowHandle};
pub use types::{
    ChildWorkflowOptions, ContinueAsNewDirective, ExecutionStatus, RecordedValue, RunOutcome,
    StartWorkflowOptions, WorkflowDescription, WorkflowExecution, WorkflowInfo,
};
