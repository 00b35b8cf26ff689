//! Proxy-initiated requests and the host's replies to them

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::duration::option_millis;
use super::{ClientId, ContextId, Payload, RequestId, WorkerId};
use crate::engine::{ContinueAsNewDirective, WorkflowInfo};
use crate::error::RemoteError;

/// Callback request sent to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRequest {
    /// Fresh id the host echoes back in its reply
    pub request_id: RequestId,

    pub client_id: ClientId,

    #[serde(default)]
    pub worker_id: Option<WorkerId>,

    /// Context the callback runs in
    #[serde(default)]
    pub context_id: Option<ContextId>,

    pub sent_at: DateTime<Utc>,

    #[serde(flatten)]
    pub body: HostRequestBody,
}

impl HostRequest {
    pub fn new(
        request_id: RequestId,
        client_id: ClientId,
        context_id: Option<ContextId>,
        body: HostRequestBody,
    ) -> Self {
        Self {
            request_id,
            client_id,
            worker_id: None,
            context_id,
            sent_at: Utc::now(),
            body,
        }
    }

    pub fn with_worker_id(mut self, worker_id: WorkerId) -> Self {
        self.worker_id = Some(worker_id);
        self
    }
}

/// Callback variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostRequestBody {
    /// Run the host's implementation of a workflow
    WorkflowInvoke {
        info: WorkflowInfo,
        args: Option<Payload>,
        replaying: bool,
    },

    /// Deliver one signal
    SignalInvoke {
        signal: String,
        args: Option<Payload>,
        replaying: bool,
    },

    /// Answer one query
    QueryInvoke {
        query: String,
        args: Option<Payload>,
        replaying: bool,
    },
}

impl HostRequestBody {
    /// Callback name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::WorkflowInvoke { .. } => "workflow_invoke",
            Self::SignalInvoke { .. } => "signal_invoke",
            Self::QueryInvoke { .. } => "query_invoke",
        }
    }
}

/// Host answer to a [`HostRequest`]
///
/// Precedence when several fields are set: `force_replay`, then
/// `continue_as_new`, then `error`, then `result`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostReply {
    pub request_id: RequestId,

    #[serde(default)]
    pub error: Option<RemoteError>,

    #[serde(default)]
    pub result: Option<Payload>,

    /// Abort the current attempt so the engine replays it
    #[serde(default)]
    pub force_replay: bool,

    /// End the run and continue as new with these overrides
    #[serde(default)]
    pub continue_as_new: Option<ContinueAsNewOverrides>,
}

impl HostReply {
    pub fn completed(request_id: RequestId, result: Option<Payload>) -> Self {
        Self {
            request_id,
            result,
            ..Default::default()
        }
    }

    pub fn failed(request_id: RequestId, error: RemoteError) -> Self {
        Self {
            request_id,
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn force_replay(request_id: RequestId) -> Self {
        Self {
            request_id,
            force_replay: true,
            ..Default::default()
        }
    }

    pub fn continue_as_new(request_id: RequestId, overrides: ContinueAsNewOverrides) -> Self {
        Self {
            request_id,
            continue_as_new: Some(overrides),
            ..Default::default()
        }
    }
}

/// Continue-as-new fields supplied by the host
///
/// Empty strings, zero durations and absent values keep the current run's
/// settings. Absent `args` carry the current run's input forward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueAsNewOverrides {
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub task_queue: Option<String>,

    #[serde(default)]
    pub workflow: Option<String>,

    #[serde(default)]
    pub args: Option<Payload>,

    #[serde(default, with = "option_millis")]
    pub execution_start_to_close_timeout: Option<Duration>,

    #[serde(default, with = "option_millis")]
    pub schedule_to_close_timeout: Option<Duration>,

    #[serde(default, with = "option_millis")]
    pub schedule_to_start_timeout: Option<Duration>,

    #[serde(default, with = "option_millis")]
    pub start_to_close_timeout: Option<Duration>,
}

impl ContinueAsNewOverrides {
    /// Fill unset fields from the current run and its input
    pub fn merge(
        self,
        current: &WorkflowInfo,
        current_args: Option<Payload>,
    ) -> ContinueAsNewDirective {
        fn text(value: Option<String>, current: &str) -> String {
            value
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| current.to_string())
        }

        fn duration(value: Option<Duration>, current: Duration) -> Duration {
            value.filter(|d| !d.is_zero()).unwrap_or(current)
        }

        ContinueAsNewDirective {
            namespace: text(self.namespace, &current.namespace),
            task_queue: text(self.task_queue, &current.task_queue),
            workflow: text(self.workflow, &current.workflow_type),
            args: self.args.or(current_args),
            execution_start_to_close_timeout: duration(
                self.execution_start_to_close_timeout,
                current.execution_start_to_close_timeout,
            ),
            schedule_to_close_timeout: duration(
                self.schedule_to_close_timeout,
                current.schedule_to_close_timeout,
            ),
            schedule_to_start_timeout: duration(
                self.schedule_to_start_timeout,
                current.schedule_to_start_timeout,
            ),
            start_to_close_timeout: duration(
                self.start_to_close_timeout,
                current.start_to_close_timeout,
            ),
        }
    }
}
