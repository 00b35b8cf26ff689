//! Client-scoped verbs, passed straight through to the engine adapter

use std::future::Future;
use std::sync::Arc;

use tracing::info;

use crate::engine::{EngineAdapter, EngineError, StartWorkflowOptions, WorkflowExecution};
use crate::error::ProxyError;
use crate::protocol::{ClientId, Payload, ReplyBody};
use crate::state::ProxyState;

/// Run an adapter call under the configured client deadline
async fn bounded<T>(
    state: &ProxyState,
    call: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, ProxyError> {
    tokio::time::timeout(state.config.client_call_timeout, call)
        .await
        .map_err(|_| ProxyError::Timeout)?
        .map_err(ProxyError::from)
}

fn client(state: &ProxyState, client_id: ClientId) -> Result<Arc<dyn EngineAdapter>, ProxyError> {
    state.clients.get(client_id)
}

pub(crate) async fn execute(
    state: &ProxyState,
    client_id: ClientId,
    workflow: String,
    args: Option<Payload>,
    options: StartWorkflowOptions,
) -> Result<ReplyBody, ProxyError> {
    let client = client(state, client_id)?;
    let execution = bounded(state, client.start_workflow(&workflow, args, options)).await?;
    info!(client_id, workflow = %workflow, workflow_id = %execution.workflow_id, "workflow started");
    Ok(ReplyBody::Execution { execution })
}

pub(crate) async fn signal(
    state: &ProxyState,
    client_id: ClientId,
    execution: WorkflowExecution,
    signal: String,
    args: Option<Payload>,
) -> Result<ReplyBody, ProxyError> {
    let client = client(state, client_id)?;
    bounded(state, client.signal_workflow(&execution, &signal, args)).await?;
    Ok(ReplyBody::Empty)
}

pub(crate) async fn signal_with_start(
    state: &ProxyState,
    client_id: ClientId,
    workflow: String,
    signal: String,
    signal_args: Option<Payload>,
    start_args: Option<Payload>,
    options: StartWorkflowOptions,
) -> Result<ReplyBody, ProxyError> {
    let client = client(state, client_id)?;
    let execution = bounded(
        state,
        client.signal_with_start(&workflow, &signal, signal_args, start_args, options),
    )
    .await?;
    Ok(ReplyBody::Execution { execution })
}

pub(crate) async fn query(
    state: &ProxyState,
    client_id: ClientId,
    execution: WorkflowExecution,
    query: String,
    args: Option<Payload>,
) -> Result<ReplyBody, ProxyError> {
    let client = client(state, client_id)?;
    let result = bounded(state, client.query_workflow(&execution, &query, args)).await?;
    Ok(ReplyBody::QueryResult { result })
}

pub(crate) async fn cancel(
    state: &ProxyState,
    client_id: ClientId,
    execution: WorkflowExecution,
) -> Result<ReplyBody, ProxyError> {
    let client = client(state, client_id)?;
    bounded(state, client.cancel_workflow(&execution)).await?;
    info!(client_id, workflow_id = %execution.workflow_id, "workflow cancel requested");
    Ok(ReplyBody::Empty)
}

pub(crate) async fn terminate(
    state: &ProxyState,
    client_id: ClientId,
    execution: WorkflowExecution,
    reason: Option<String>,
) -> Result<ReplyBody, ProxyError> {
    let client = client(state, client_id)?;
    bounded(state, client.terminate_workflow(&execution, reason)).await?;
    Ok(ReplyBody::Empty)
}

pub(crate) async fn describe(
    state: &ProxyState,
    client_id: ClientId,
    execution: WorkflowExecution,
) -> Result<ReplyBody, ProxyError> {
    let client = client(state, client_id)?;
    let description = bounded(state, client.describe_workflow(&execution)).await?;
    Ok(ReplyBody::Description { description })
}
