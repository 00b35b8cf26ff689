//! Workflow registration and the invoke state machine

use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use tracing::{debug, info, instrument, warn};

use crate::context::WorkflowContext;
use crate::correlation::Outcome;
use crate::engine::{RunOutcome, WorkflowEntry, WorkflowHandle};
use crate::error::{ProxyError, RemoteError};
use crate::protocol::{ClientId, HostRequestBody, Payload, ReplyBody, WorkerId};
use crate::state::ProxyState;

/// Register a bridged entry point for `workflow` on a client
#[instrument(skip(state))]
pub(crate) async fn register(
    state: &Arc<ProxyState>,
    client_id: ClientId,
    worker_id: Option<WorkerId>,
    workflow: String,
) -> Result<ReplyBody, ProxyError> {
    let client = state.clients.get(client_id)?;
    if !state.clients.mark_registered(client_id, &workflow)? {
        return Err(ProxyError::AlreadyRegistered(workflow));
    }

    let entry = workflow_entry(Arc::downgrade(state), client_id, worker_id, workflow.clone());
    let result = tokio::time::timeout(
        state.config.client_call_timeout,
        client.register_workflow(&workflow, entry),
    )
    .await;

    match result {
        Ok(Ok(())) => {
            info!(client_id, workflow = %workflow, "workflow registered");
            Ok(ReplyBody::Empty)
        }
        Ok(Err(e)) => {
            state.clients.unmark_registered(client_id, &workflow);
            Err(e.into())
        }
        Err(_) => {
            state.clients.unmark_registered(client_id, &workflow);
            Err(ProxyError::Timeout)
        }
    }
}

fn workflow_entry(
    state: Weak<ProxyState>,
    client_id: ClientId,
    worker_id: Option<WorkerId>,
    workflow: String,
) -> WorkflowEntry {
    Arc::new(
        move |handle: Arc<dyn WorkflowHandle>, args: Option<Payload>| {
            let state = state.clone();
            let workflow = workflow.clone();
            Box::pin(async move {
                match state.upgrade() {
                    Some(state) => {
                        run_workflow(state, client_id, worker_id, workflow, handle, args).await
                    }
                    None => RunOutcome::Failed(RemoteError::generic("proxy is shut down")),
                }
            }) as BoxFuture<'static, RunOutcome>
        },
    )
}

/// One invocation of a bridged workflow
///
/// Allocates a context, asks the host to run the workflow and turns the
/// host's reply into the run's outcome. The context is removed on every
/// path out.
#[instrument(
    skip(state, handle, args),
    fields(context_id = tracing::field::Empty)
)]
pub(crate) async fn run_workflow(
    state: Arc<ProxyState>,
    client_id: ClientId,
    worker_id: Option<WorkerId>,
    workflow: String,
    handle: Arc<dyn WorkflowHandle>,
    args: Option<Payload>,
) -> RunOutcome {
    let context_id = state.contexts.next_context_id();
    tracing::Span::current().record("context_id", context_id);

    let context = Arc::new(
        WorkflowContext::new(context_id, client_id, &workflow, handle).with_worker_id(worker_id),
    );
    state.contexts.add(context.clone());

    let info = context.info();
    let replaying = context.is_replaying();
    debug!(workflow_id = %info.workflow_id, replaying, "invoking workflow on host");

    let body = HostRequestBody::WorkflowInvoke {
        info: info.clone(),
        args: args.clone(),
        replaying,
    };
    let reply = state
        .router
        .round_trip(Some(context_id), context.cancellation(), |request_id| {
            context.host_request(request_id, body)
        })
        .await;

    let outcome = match reply {
        Ok(Outcome::ForceReplay) => {
            debug!("host requested replay");
            RunOutcome::ForceReplay
        }
        Ok(Outcome::ContinueAsNew(overrides)) => {
            let directive = overrides.merge(&info, args);
            info!(next = %directive.workflow, "workflow continuing as new");
            RunOutcome::ContinueAsNew(directive)
        }
        Ok(Outcome::Success(result)) => RunOutcome::Completed(result),
        Ok(Outcome::Error(error)) if error.is_canceled() => RunOutcome::Canceled,
        Ok(Outcome::Error(error)) => {
            warn!(error = %error, "workflow failed");
            RunOutcome::Failed(error)
        }
        Err(ProxyError::Canceled) => {
            debug!("workflow canceled while waiting for host");
            RunOutcome::Canceled
        }
        Err(e) => RunOutcome::Failed(e.into()),
    };

    state.contexts.remove(context_id);
    state.router.operations().remove_for_context(context_id);
    outcome
}
