//! Request dispatch
//!
//! [`RequestDispatcher`] is the proxy's front door: the embedding process
//! feeds it every host request and every host reply. Requests may block
//! (queue reads, child waits), so callers typically spawn one task per
//! request.

mod child;
mod client;
mod invoke;
mod query;
mod queue;
mod replay;
mod signal;

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::ProxyConfig;
use crate::context::WorkflowContext;
use crate::engine::EngineAdapter;
use crate::error::ProxyError;
use crate::protocol::{ClientId, HostReply, ProxyReply, ProxyRequest, ReplyBody, RequestBody, RequestHeader};
use crate::state::ProxyState;
use crate::transport::HostTransport;

/// Routes host requests to their handlers and host replies to their waiters
#[derive(Clone)]
pub struct RequestDispatcher {
    state: Arc<ProxyState>,
}

impl RequestDispatcher {
    pub fn new(config: ProxyConfig, transport: Arc<dyn HostTransport>) -> Self {
        info!(
            instance_id = %config.instance_id,
            max_queue_capacity = config.max_queue_capacity,
            "proxy dispatcher created"
        );
        Self {
            state: Arc::new(ProxyState::new(config, transport)),
        }
    }

    pub fn state(&self) -> &Arc<ProxyState> {
        &self.state
    }

    /// Make an engine connection available under a client id
    pub fn add_client(&self, client_id: ClientId, adapter: Arc<dyn EngineAdapter>) {
        self.state.clients.add(client_id, adapter);
    }

    /// Handle one host request; failures become a structured error on the reply
    #[instrument(
        skip(self, request),
        fields(
            instance_id = %self.state.config.instance_id,
            request_id = request.header.request_id,
            verb = request.body.verb(),
            context_id = ?request.header.context_id
        )
    )]
    pub async fn handle(&self, request: ProxyRequest) -> ProxyReply {
        let request_id = request.header.request_id;
        match self.dispatch(request).await {
            Ok(body) => ProxyReply::ok(request_id, body),
            Err(e) => {
                warn!(error = %e, kind = %e.kind(), "request failed");
                ProxyReply::failed(request_id, e)
            }
        }
    }

    /// Route a host reply to the operation waiting for it
    pub fn on_reply_received(&self, reply: HostReply) -> Result<(), ProxyError> {
        self.state.router.deliver(reply)
    }

    fn context(&self, header: &RequestHeader) -> Result<Arc<WorkflowContext>, ProxyError> {
        let context_id = header.context_id.ok_or(ProxyError::MissingContextId)?;
        self.state.contexts.get(context_id)
    }

    async fn dispatch(&self, request: ProxyRequest) -> Result<ReplyBody, ProxyError> {
        let ProxyRequest { header, body } = request;
        if body.is_workflow_scoped() && header.context_id.is_none() {
            return Err(ProxyError::MissingContextId);
        }
        let state = &self.state;
        let client_id = header.client_id;

        match body {
            RequestBody::WorkflowRegister { workflow } => {
                invoke::register(state, client_id, header.worker_id, workflow).await
            }
            RequestBody::WorkflowExecute {
                workflow,
                args,
                options,
            } => client::execute(state, client_id, workflow, args, options).await,
            RequestBody::WorkflowSignal {
                execution,
                signal,
                args,
            } => client::signal(state, client_id, execution, signal, args).await,
            RequestBody::WorkflowSignalWithStart {
                workflow,
                signal,
                signal_args,
                start_args,
                options,
            } => {
                client::signal_with_start(
                    state,
                    client_id,
                    workflow,
                    signal,
                    signal_args,
                    start_args,
                    options,
                )
                .await
            }
            RequestBody::WorkflowQuery {
                execution,
                query,
                args,
            } => client::query(state, client_id, execution, query, args).await,
            RequestBody::WorkflowCancel { execution } => {
                client::cancel(state, client_id, execution).await
            }
            RequestBody::WorkflowTerminate { execution, reason } => {
                client::terminate(state, client_id, execution, reason).await
            }
            RequestBody::WorkflowDescribe { execution } => {
                client::describe(state, client_id, execution).await
            }

            RequestBody::SignalSubscribe { signal } => {
                signal::subscribe(state, self.context(&header)?, signal)
            }
            RequestBody::QueryRegister { query } => {
                query::register(state, &self.context(&header)?, query)
            }
            RequestBody::ChildStart {
                workflow,
                args,
                options,
            } => child::start(&*self.context(&header)?, workflow, args, options).await,
            RequestBody::ChildWait { child_id } => {
                child::wait(&*self.context(&header)?, child_id).await
            }
            RequestBody::ChildSignal {
                child_id,
                signal,
                args,
            } => child::signal(&*self.context(&header)?, child_id, signal, args).await,
            RequestBody::ChildCancel { child_id } => {
                child::cancel(&*self.context(&header)?, child_id)
            }
            RequestBody::QueueNew { capacity } => {
                queue::create(&state.config, &*self.context(&header)?, capacity)
            }
            RequestBody::QueueWrite {
                queue_id,
                data,
                no_block,
            } => queue::write(&*self.context(&header)?, queue_id, data, no_block).await,
            RequestBody::QueueRead { queue_id, timeout } => {
                queue::read(&*self.context(&header)?, queue_id, timeout).await
            }
            RequestBody::QueueClose { queue_id } => {
                queue::close(&*self.context(&header)?, queue_id)
            }
            RequestBody::MutableValue { id, value } => {
                replay::record_value(&*self.context(&header)?, id, value)
            }
            RequestBody::GetVersion {
                change_id,
                min_supported,
                max_supported,
            } => replay::get_version(
                &*self.context(&header)?,
                change_id,
                min_supported,
                max_supported,
            ),
        }
    }
}
