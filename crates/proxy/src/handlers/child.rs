//! Child workflow verbs

use tracing::{debug, info};

use crate::context::WorkflowContext;
use crate::engine::ChildWorkflowOptions;
use crate::error::ProxyError;
use crate::protocol::{ChildId, Payload, ReplyBody};

pub(crate) async fn start(
    context: &WorkflowContext,
    workflow: String,
    args: Option<Payload>,
    options: ChildWorkflowOptions,
) -> Result<ReplyBody, ProxyError> {
    let (child_id, cancel) = context.children().reserve(context.cancellation());
    let run = context
        .handle()
        .start_child(&workflow, args, options, cancel.clone())
        .await?;

    let execution = run.execution.clone();
    context.children().insert(child_id, run, cancel);
    info!(
        context_id = context.context_id(),
        child_id,
        workflow_id = %execution.workflow_id,
        "child workflow started"
    );

    Ok(ReplyBody::ChildStarted {
        child_id,
        execution,
    })
}

/// Wait for a child's result; the child entry is removed once the wait ends
/// or is abandoned
pub(crate) async fn wait(context: &WorkflowContext, child_id: ChildId) -> Result<ReplyBody, ProxyError> {
    let claim = context.children().claim(child_id)?;

    let outcome = tokio::select! {
        biased;
        r = claim.finish() => r.map_err(ProxyError::from),
        _ = context.cancellation().cancelled() => Err(ProxyError::Canceled),
    };

    debug!(context_id = context.context_id(), child_id, ok = outcome.is_ok(), "child wait finished");

    outcome.map(|result| ReplyBody::ChildResult { result })
}

pub(crate) async fn signal(
    context: &WorkflowContext,
    child_id: ChildId,
    signal: String,
    args: Option<Payload>,
) -> Result<ReplyBody, ProxyError> {
    let child = context.children().get(child_id)?;
    context
        .handle()
        .signal_external(child.execution(), &signal, args)
        .await?;
    Ok(ReplyBody::Empty)
}

pub(crate) fn cancel(context: &WorkflowContext, child_id: ChildId) -> Result<ReplyBody, ProxyError> {
    let child = context.children().get(child_id)?;
    child.cancel();
    debug!(context_id = context.context_id(), child_id, "child cancel requested");
    Ok(ReplyBody::Empty)
}
