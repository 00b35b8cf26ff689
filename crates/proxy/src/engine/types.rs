//! Engine-neutral value types passed across the adapter boundary

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::protocol::duration::{millis, option_millis};
use crate::protocol::Payload;

/// Identity of one workflow run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Business identifier of the workflow
    pub workflow_id: String,

    /// Identifier of this particular run
    pub run_id: String,
}

impl WorkflowExecution {
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }
}

/// Metadata of the executing run, as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    pub namespace: String,
    pub workflow_id: String,
    pub run_id: String,
    pub workflow_type: String,
    pub task_queue: String,

    /// Maximum duration of the whole execution
    #[serde(with = "millis")]
    pub execution_start_to_close_timeout: Duration,

    /// Workflow task schedule-to-close timeout
    #[serde(with = "millis")]
    pub schedule_to_close_timeout: Duration,

    /// Workflow task schedule-to-start timeout
    #[serde(with = "millis")]
    pub schedule_to_start_timeout: Duration,

    /// Workflow task start-to-close timeout
    #[serde(with = "millis")]
    pub start_to_close_timeout: Duration,
}

impl WorkflowInfo {
    pub fn execution(&self) -> WorkflowExecution {
        WorkflowExecution::new(&self.workflow_id, &self.run_id)
    }
}

/// Options for starting a top-level workflow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartWorkflowOptions {
    /// Explicit workflow id (engine generates one when absent)
    pub workflow_id: Option<String>,

    pub task_queue: String,

    #[serde(default, with = "option_millis")]
    pub execution_timeout: Option<Duration>,

    #[serde(default, with = "option_millis")]
    pub task_timeout: Option<Duration>,
}

impl StartWorkflowOptions {
    pub fn new(task_queue: impl Into<String>) -> Self {
        Self {
            task_queue: task_queue.into(),
            ..Default::default()
        }
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }
}

/// Options for starting a child workflow; absent fields inherit from the parent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildWorkflowOptions {
    pub namespace: Option<String>,
    pub workflow_id: Option<String>,
    pub task_queue: Option<String>,

    #[serde(default, with = "option_millis")]
    pub execution_timeout: Option<Duration>,

    #[serde(default, with = "option_millis")]
    pub task_timeout: Option<Duration>,

    /// Wait for the child to acknowledge cancellation before resolving
    #[serde(default)]
    pub wait_for_cancellation: bool,
}

/// Run state reported by describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Canceled,
    Terminated,
    ContinuedAsNew,
}

/// Result of describing a workflow execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDescription {
    pub execution: WorkflowExecution,
    pub workflow_type: String,
    pub task_queue: String,
    pub status: ExecutionStatus,
}

/// A value recorded in history by a side effect or mutable value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RecordedValue {
    /// Raw payload produced by the host
    Payload(Option<Payload>),

    /// Error produced by the host
    Error(RemoteError),
}

impl RecordedValue {
    /// Replay comparator: byte equality for payloads, kind and message
    /// equality for errors
    pub fn same_as(&self, other: &RecordedValue) -> bool {
        match (self, other) {
            (Self::Payload(a), Self::Payload(b)) => a == b,
            (Self::Error(a), Self::Error(b)) => a.same_failure(b),
            _ => false,
        }
    }
}

/// Directive returned to the engine to end this run and start a successor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueAsNewDirective {
    pub namespace: String,
    pub task_queue: String,
    pub workflow: String,
    pub args: Option<Payload>,

    #[serde(with = "millis")]
    pub execution_start_to_close_timeout: Duration,

    #[serde(with = "millis")]
    pub schedule_to_close_timeout: Duration,

    #[serde(with = "millis")]
    pub schedule_to_start_timeout: Duration,

    #[serde(with = "millis")]
    pub start_to_close_timeout: Duration,
}

/// What a bridged workflow entry point hands back to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Run completed with a result
    Completed(Option<Payload>),

    /// Run failed with a host error
    Failed(RemoteError),

    /// Run was canceled; maps to the engine's own canceled result
    Canceled,

    /// End this run and continue as a new one
    ContinueAsNew(ContinueAsNewDirective),

    /// Abort this attempt without completing so the engine replays it
    ForceReplay,
}
