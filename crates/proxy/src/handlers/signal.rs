//! Signal subscriptions

use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::WorkflowContext;
use crate::correlation::Outcome;
use crate::engine::SignalReceiver;
use crate::error::ProxyError;
use crate::protocol::{HostRequestBody, ReplyBody};
use crate::state::ProxyState;

/// Subscribe a context to a signal name
///
/// Starts a loop on the run's scheduler that relays each signal to the host
/// and waits for the host to finish with it before taking the next one.
pub(crate) fn subscribe(
    state: &Arc<ProxyState>,
    context: Arc<WorkflowContext>,
    signal: String,
) -> Result<ReplyBody, ProxyError> {
    context.claim_signal(&signal)?;

    let signals = context.handle().signal_channel(&signal);
    let handle = context.handle().clone();
    handle.spawn(Box::pin(relay_signals(state.clone(), context, signal, signals)));

    Ok(ReplyBody::Empty)
}

async fn relay_signals(
    state: Arc<ProxyState>,
    context: Arc<WorkflowContext>,
    signal: String,
    mut signals: SignalReceiver,
) {
    let context_id = context.context_id();
    let cancel = context.cancellation().clone();

    loop {
        let args = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = signals.recv() => match next {
                Some(args) => args,
                None => break,
            },
        };

        let replaying = context.is_replaying();
        let reply = state
            .router
            .round_trip(Some(context_id), &cancel, |request_id| {
                context.host_request(
                    request_id,
                    HostRequestBody::SignalInvoke {
                        signal: signal.clone(),
                        args,
                        replaying,
                    },
                )
            })
            .await;

        match reply {
            Ok(Outcome::Error(error)) => {
                warn!(context_id, signal = %signal, error = %error, "host failed to handle signal");
            }
            Ok(_) => debug!(context_id, signal = %signal, "signal handled"),
            Err(ProxyError::Canceled) => break,
            Err(e) => warn!(context_id, signal = %signal, error = %e, "signal relay failed"),
        }
    }

    debug!(context_id, signal = %signal, "signal subscription ended");
}
