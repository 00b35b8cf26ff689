//! Query handler registration

use std::sync::{Arc, Weak};

use futures::future::BoxFuture;

use crate::context::WorkflowContext;
use crate::correlation::Outcome;
use crate::engine::QueryHandler;
use crate::error::{ErrorKind, ProxyError, RemoteError};
use crate::protocol::{HostRequestBody, Payload, ReplyBody};
use crate::state::ProxyState;

/// Install an engine query handler that relays each query to the host
pub(crate) fn register(
    state: &Arc<ProxyState>,
    context: &Arc<WorkflowContext>,
    query: String,
) -> Result<ReplyBody, ProxyError> {
    if !context.claim_query(&query) {
        return Err(ProxyError::AlreadyRegistered(query));
    }

    let handler = query_handler(Arc::downgrade(state), Arc::downgrade(context), query.clone());
    context.handle().set_query_handler(&query, handler)?;
    Ok(ReplyBody::Empty)
}

// Weak references: the handler lives inside the engine handle the context owns
fn query_handler(
    state: Weak<ProxyState>,
    context: Weak<WorkflowContext>,
    query: String,
) -> QueryHandler {
    Arc::new(move |args: Option<Payload>| {
        let state = state.clone();
        let context = context.clone();
        let query = query.clone();
        Box::pin(async move {
            let (Some(state), Some(context)) = (state.upgrade(), context.upgrade()) else {
                return Err(RemoteError::new(
                    ErrorKind::EntityNotFound,
                    "workflow context is gone",
                ));
            };

            let context_id = context.context_id();
            let replaying = context.is_replaying();
            let reply = state
                .router
                .round_trip(Some(context_id), context.cancellation(), |request_id| {
                    context.host_request(
                        request_id,
                        HostRequestBody::QueryInvoke {
                            query,
                            args,
                            replaying,
                        },
                    )
                })
                .await;

            match reply {
                Ok(Outcome::Success(result)) => Ok(result),
                Ok(Outcome::Error(error)) => Err(error),
                Ok(other) => Err(ProxyError::UnexpectedReply(format!(
                    "query reply carried {other:?}"
                ))
                .into()),
                Err(e) => Err(e.into()),
            }
        }) as BoxFuture<'static, Result<Option<Payload>, RemoteError>>
    })
}
