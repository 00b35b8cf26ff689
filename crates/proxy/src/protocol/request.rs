//! Host-initiated requests

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::duration::option_millis;
use super::{ChildId, ClientId, ContextId, Payload, QueueId, RequestId, WorkerId};
use crate::engine::{ChildWorkflowOptions, RecordedValue, StartWorkflowOptions, WorkflowExecution};

/// Routing fields common to every request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub request_id: RequestId,
    pub client_id: ClientId,

    #[serde(default)]
    pub worker_id: Option<WorkerId>,

    /// Required by every workflow-scoped verb
    #[serde(default)]
    pub context_id: Option<ContextId>,
}

impl RequestHeader {
    pub fn new(request_id: RequestId, client_id: ClientId) -> Self {
        Self {
            request_id,
            client_id,
            worker_id: None,
            context_id: None,
        }
    }

    pub fn with_context(mut self, context_id: ContextId) -> Self {
        self.context_id = Some(context_id);
        self
    }
}

/// A request sent by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRequest {
    #[serde(flatten)]
    pub header: RequestHeader,

    #[serde(flatten)]
    pub body: RequestBody,
}

impl ProxyRequest {
    pub fn new(header: RequestHeader, body: RequestBody) -> Self {
        Self { header, body }
    }
}

/// Request verbs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestBody {
    // Client-scoped verbs
    WorkflowRegister {
        workflow: String,
    },
    WorkflowExecute {
        workflow: String,
        args: Option<Payload>,
        options: StartWorkflowOptions,
    },
    WorkflowSignal {
        execution: WorkflowExecution,
        signal: String,
        args: Option<Payload>,
    },
    WorkflowSignalWithStart {
        workflow: String,
        signal: String,
        signal_args: Option<Payload>,
        start_args: Option<Payload>,
        options: StartWorkflowOptions,
    },
    WorkflowQuery {
        execution: WorkflowExecution,
        query: String,
        args: Option<Payload>,
    },
    WorkflowCancel {
        execution: WorkflowExecution,
    },
    WorkflowTerminate {
        execution: WorkflowExecution,
        #[serde(default)]
        reason: Option<String>,
    },
    WorkflowDescribe {
        execution: WorkflowExecution,
    },

    // Workflow-scoped verbs
    SignalSubscribe {
        signal: String,
    },
    QueryRegister {
        query: String,
    },
    ChildStart {
        workflow: String,
        args: Option<Payload>,
        #[serde(default)]
        options: ChildWorkflowOptions,
    },
    ChildWait {
        child_id: ChildId,
    },
    ChildSignal {
        child_id: ChildId,
        signal: String,
        args: Option<Payload>,
    },
    ChildCancel {
        child_id: ChildId,
    },
    QueueNew {
        #[serde(default)]
        capacity: usize,
    },
    QueueWrite {
        queue_id: QueueId,
        data: Payload,
        #[serde(default)]
        no_block: bool,
    },
    QueueRead {
        queue_id: QueueId,
        #[serde(default, with = "option_millis")]
        timeout: Option<Duration>,
    },
    QueueClose {
        queue_id: QueueId,
    },
    /// Keyed mutable value; without an id the value is an unkeyed side effect
    MutableValue {
        #[serde(default)]
        id: Option<String>,
        value: RecordedValue,
    },
    GetVersion {
        change_id: String,
        min_supported: i32,
        max_supported: i32,
    },
}

impl RequestBody {
    /// Verb name for logging
    pub fn verb(&self) -> &'static str {
        match self {
            Self::WorkflowRegister { .. } => "workflow_register",
            Self::WorkflowExecute { .. } => "workflow_execute",
            Self::WorkflowSignal { .. } => "workflow_signal",
            Self::WorkflowSignalWithStart { .. } => "workflow_signal_with_start",
            Self::WorkflowQuery { .. } => "workflow_query",
            Self::WorkflowCancel { .. } => "workflow_cancel",
            Self::WorkflowTerminate { .. } => "workflow_terminate",
            Self::WorkflowDescribe { .. } => "workflow_describe",
            Self::SignalSubscribe { .. } => "signal_subscribe",
            Self::QueryRegister { .. } => "query_register",
            Self::ChildStart { .. } => "child_start",
            Self::ChildWait { .. } => "child_wait",
            Self::ChildSignal { .. } => "child_signal",
            Self::ChildCancel { .. } => "child_cancel",
            Self::QueueNew { .. } => "queue_new",
            Self::QueueWrite { .. } => "queue_write",
            Self::QueueRead { .. } => "queue_read",
            Self::QueueClose { .. } => "queue_close",
            Self::MutableValue { .. } => "mutable_value",
            Self::GetVersion { .. } => "get_version",
        }
    }

    /// Whether the verb runs inside a workflow context
    pub fn is_workflow_scoped(&self) -> bool {
        !matches!(
            self,
            Self::WorkflowRegister { .. }
                | Self::WorkflowExecute { .. }
                | Self::WorkflowSignal { .. }
                | Self::WorkflowSignalWithStart { .. }
                | Self::WorkflowQuery { .. }
                | Self::WorkflowCancel { .. }
                | Self::WorkflowTerminate { .. }
                | Self::WorkflowDescribe { .. }
        )
    }
}
