//! End-to-end tests for the request dispatcher
//!
//! Drives the dispatcher the way a host would, against the in-memory engine.
//! The test body plays the host: it reads proxy callbacks from the channel
//! transport and answers them through `on_reply_received`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use everruns_proxy::engine::{ExecutionStatus, WorkflowInfo};
use everruns_proxy::prelude::*;
use everruns_proxy::protocol::{ContinueAsNewOverrides, WriteStatus};

const CLIENT: i64 = 1;
const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    dispatcher: RequestDispatcher,
    engine: InMemoryEngine,
    outbound: UnboundedReceiver<HostRequest>,
    next_request_id: AtomicI64,
}

impl Harness {
    async fn new(workflows: &[&str]) -> Self {
        let (transport, outbound) = ChannelTransport::new();
        let config = ProxyConfig::default().with_client_call_timeout(WAIT);
        let dispatcher = RequestDispatcher::new(config, Arc::new(transport));
        let engine = InMemoryEngine::new();
        dispatcher.add_client(CLIENT, Arc::new(engine.clone()));

        let harness = Self {
            dispatcher,
            engine,
            outbound,
            next_request_id: AtomicI64::new(1000),
        };

        for workflow in workflows {
            let reply = harness
                .call(None, RequestBody::WorkflowRegister {
                    workflow: workflow.to_string(),
                })
                .await;
            assert!(reply.is_ok(), "register {workflow}: {:?}", reply.error);
        }
        harness
    }

    fn request(&self, context_id: Option<i64>, body: RequestBody) -> ProxyRequest {
        let mut header = RequestHeader::new(self.next_request_id.fetch_add(1, Ordering::SeqCst), CLIENT);
        header.context_id = context_id;
        ProxyRequest::new(header, body)
    }

    async fn call(&self, context_id: Option<i64>, body: RequestBody) -> ProxyReply {
        self.dispatcher.handle(self.request(context_id, body)).await
    }

    fn spawn_call(&self, context_id: Option<i64>, body: RequestBody) -> JoinHandle<ProxyReply> {
        let dispatcher = self.dispatcher.clone();
        let request = self.request(context_id, body);
        tokio::spawn(async move { dispatcher.handle(request).await })
    }

    async fn next_host_request(&mut self) -> HostRequest {
        tokio::time::timeout(WAIT, self.outbound.recv())
            .await
            .expect("timed out waiting for a host callback")
            .expect("transport closed")
    }

    async fn no_host_request_within(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.outbound.recv())
            .await
            .is_err()
    }

    fn reply(&self, reply: HostReply) {
        self.dispatcher
            .on_reply_received(reply)
            .expect("reply should match an outstanding request");
    }

    /// Start a workflow and take the invoke callback it produces
    async fn start(&mut self, workflow: &str, options: StartWorkflowOptions) -> (WorkflowExecution, HostRequest) {
        let reply = self
            .call(None, RequestBody::WorkflowExecute {
                workflow: workflow.to_string(),
                args: Some(b"input".to_vec()),
                options,
            })
            .await;

        let execution = match reply.body {
            ReplyBody::Execution { execution } => execution,
            other => panic!("unexpected reply: {other:?} ({:?})", reply.error),
        };

        let invoke = self.next_host_request().await;
        (execution, invoke)
    }

    async fn outcome(&self, execution: &WorkflowExecution) -> RunOutcome {
        tokio::time::timeout(WAIT, self.engine.await_outcome(execution))
            .await
            .expect("timed out waiting for the run to finish")
            .expect("execution should exist")
    }
}

fn invoke_info(request: &HostRequest) -> (WorkflowInfo, bool) {
    match &request.body {
        HostRequestBody::WorkflowInvoke { info, replaying, .. } => (info.clone(), *replaying),
        other => panic!("expected workflow invoke, got {other:?}"),
    }
}

fn error_kind(reply: &ProxyReply) -> ErrorKind {
    reply.error.as_ref().expect("reply should carry an error").kind
}

#[test_log::test(tokio::test)]
async fn test_invoke_completes_run() {
    let mut h = Harness::new(&["Billing"]).await;
    let (execution, invoke) = h.start("Billing", StartWorkflowOptions::new("billing-tq")).await;

    let (info, replaying) = invoke_info(&invoke);
    assert_eq!(info.workflow_type, "Billing");
    assert_eq!(info.task_queue, "billing-tq");
    assert_eq!(info.workflow_id, execution.workflow_id);
    assert!(!replaying);
    assert!(invoke.context_id.is_some());
    assert_eq!(invoke.client_id, CLIENT);

    h.reply(HostReply::completed(invoke.request_id, Some(b"done".to_vec())));

    assert_eq!(h.outcome(&execution).await, RunOutcome::Completed(Some(b"done".to_vec())));
    assert!(h.dispatcher.state().contexts.is_empty());
    assert!(h.dispatcher.state().router.operations().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_duplicate_registration_rejected() {
    let h = Harness::new(&["Billing"]).await;
    let reply = h
        .call(None, RequestBody::WorkflowRegister {
            workflow: "Billing".into(),
        })
        .await;
    assert_eq!(error_kind(&reply), ErrorKind::Generic);
    assert!(h.engine.is_registered("Billing"));
}

#[test_log::test(tokio::test)]
async fn test_force_replay_reinvokes_in_new_context() {
    let mut h = Harness::new(&["Billing"]).await;
    let (execution, first) = h.start("Billing", StartWorkflowOptions::new("billing-tq")).await;

    h.reply(HostReply::force_replay(first.request_id));

    let second = h.next_host_request().await;
    let (_, replaying) = invoke_info(&second);
    assert!(replaying);
    assert_ne!(first.context_id, second.context_id);

    h.reply(HostReply::completed(second.request_id, None));
    assert_eq!(h.outcome(&execution).await, RunOutcome::Completed(None));
}

#[test_log::test(tokio::test)]
async fn test_continue_as_new_merges_overrides() {
    let mut h = Harness::new(&["Billing"]).await;
    let options = StartWorkflowOptions::new("billing-tq").with_execution_timeout(Duration::from_secs(3600));
    let (execution, invoke) = h.start("Billing", options).await;

    let overrides = ContinueAsNewOverrides {
        workflow: Some("NextStep".into()),
        execution_start_to_close_timeout: Some(Duration::from_secs(30)),
        args: Some(b"carry".to_vec()),
        ..Default::default()
    };
    h.reply(HostReply::continue_as_new(invoke.request_id, overrides));

    match h.outcome(&execution).await {
        RunOutcome::ContinueAsNew(directive) => {
            assert_eq!(directive.workflow, "NextStep");
            assert_eq!(directive.task_queue, "billing-tq");
            assert_eq!(directive.execution_start_to_close_timeout, Duration::from_secs(30));
            assert_eq!(directive.args, Some(b"carry".to_vec()));
        }
        other => panic!("expected continue-as-new, got {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn test_continue_as_new_with_only_workflow_inherits_run_settings() {
    let mut h = Harness::new(&["Billing"]).await;
    let options = StartWorkflowOptions::new("billing-tq").with_execution_timeout(Duration::from_secs(30));
    let (execution, invoke) = h.start("Billing", options).await;
    let (info, _) = invoke_info(&invoke);

    let overrides = ContinueAsNewOverrides {
        workflow: Some("NextStep".into()),
        ..Default::default()
    };
    h.reply(HostReply::continue_as_new(invoke.request_id, overrides));

    match h.outcome(&execution).await {
        RunOutcome::ContinueAsNew(directive) => {
            assert_eq!(directive.workflow, "NextStep");
            assert_eq!(directive.namespace, info.namespace);
            assert_eq!(directive.task_queue, "billing-tq");
            assert_eq!(directive.execution_start_to_close_timeout, Duration::from_secs(30));
            assert_eq!(directive.schedule_to_close_timeout, info.schedule_to_close_timeout);
            assert_eq!(directive.schedule_to_start_timeout, info.schedule_to_start_timeout);
            assert_eq!(directive.start_to_close_timeout, info.start_to_close_timeout);
            assert_eq!(directive.args, Some(b"input".to_vec()));
        }
        other => panic!("expected continue-as-new, got {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn test_worker_id_carried_on_callbacks() {
    let mut h = Harness::new(&[]).await;
    let mut register = h.request(None, RequestBody::WorkflowRegister {
        workflow: "Billing".into(),
    });
    register.header.worker_id = Some(77);
    assert!(h.dispatcher.handle(register).await.is_ok());

    let (execution, invoke) = h.start("Billing", StartWorkflowOptions::new("tq")).await;
    assert_eq!(invoke.worker_id, Some(77));

    let reply = h
        .call(invoke.context_id, RequestBody::SignalSubscribe { signal: "s".into() })
        .await;
    assert!(reply.is_ok());
    let reply = h
        .call(invoke.context_id, RequestBody::QueryRegister { query: "q".into() })
        .await;
    assert!(reply.is_ok());

    let reply = h
        .call(None, RequestBody::WorkflowSignal {
            execution: execution.clone(),
            signal: "s".into(),
            args: None,
        })
        .await;
    assert!(reply.is_ok());
    let signal = h.next_host_request().await;
    assert!(matches!(&signal.body, HostRequestBody::SignalInvoke { .. }));
    assert_eq!(signal.worker_id, Some(77));
    h.reply(HostReply::completed(signal.request_id, None));

    let pending = h.spawn_call(None, RequestBody::WorkflowQuery {
        execution: execution.clone(),
        query: "q".into(),
        args: None,
    });
    let query = h.next_host_request().await;
    assert!(matches!(&query.body, HostRequestBody::QueryInvoke { .. }));
    assert_eq!(query.worker_id, Some(77));
    h.reply(HostReply::completed(query.request_id, None));
    assert!(pending.await.unwrap().is_ok());

    h.reply(HostReply::completed(invoke.request_id, None));
    assert_eq!(h.outcome(&execution).await, RunOutcome::Completed(None));
}

#[test_log::test(tokio::test)]
async fn test_host_errors_map_to_run_outcomes() {
    let mut h = Harness::new(&["Billing"]).await;

    let (failed, invoke) = h.start("Billing", StartWorkflowOptions::new("tq")).await;
    let error = RemoteError::application("card declined").with_cause("PaymentError");
    h.reply(HostReply::failed(invoke.request_id, error.clone()));
    assert_eq!(h.outcome(&failed).await, RunOutcome::Failed(error));

    let (canceled, invoke) = h.start("Billing", StartWorkflowOptions::new("tq")).await;
    h.reply(HostReply::failed(invoke.request_id, RemoteError::canceled("stopped")));
    assert_eq!(h.outcome(&canceled).await, RunOutcome::Canceled);
}

#[test_log::test(tokio::test)]
async fn test_cancel_unblocks_invoke_and_late_reply_is_unknown() {
    let mut h = Harness::new(&["Billing"]).await;
    let (execution, invoke) = h.start("Billing", StartWorkflowOptions::new("tq")).await;

    let reply = h
        .call(None, RequestBody::WorkflowCancel {
            execution: execution.clone(),
        })
        .await;
    assert!(reply.is_ok());
    assert_eq!(h.outcome(&execution).await, RunOutcome::Canceled);

    let late = h
        .dispatcher
        .on_reply_received(HostReply::completed(invoke.request_id, None))
        .unwrap_err();
    assert_eq!(late.kind(), ErrorKind::EntityNotFound);
}

#[test_log::test(tokio::test)]
async fn test_signals_relayed_one_at_a_time() {
    let mut h = Harness::new(&["Billing"]).await;
    let (execution, invoke) = h.start("Billing", StartWorkflowOptions::new("tq")).await;
    let context_id = invoke.context_id;

    let reply = h
        .call(context_id, RequestBody::SignalSubscribe {
            signal: "approve".into(),
        })
        .await;
    assert!(reply.is_ok());

    let again = h
        .call(context_id, RequestBody::SignalSubscribe {
            signal: "approve".into(),
        })
        .await;
    assert_eq!(error_kind(&again), ErrorKind::Generic);

    for args in [vec![1], vec![2]] {
        let reply = h
            .call(None, RequestBody::WorkflowSignal {
                execution: execution.clone(),
                signal: "approve".into(),
                args: Some(args),
            })
            .await;
        assert!(reply.is_ok());
    }

    let first = h.next_host_request().await;
    match &first.body {
        HostRequestBody::SignalInvoke { signal, args, .. } => {
            assert_eq!(signal, "approve");
            assert_eq!(args, &Some(vec![1]));
        }
        other => panic!("expected signal invoke, got {other:?}"),
    }
    assert_eq!(first.context_id, context_id);

    // The second signal waits until the host is done with the first
    assert!(h.no_host_request_within(Duration::from_millis(100)).await);
    h.reply(HostReply::completed(first.request_id, None));

    let second = h.next_host_request().await;
    assert!(matches!(
        &second.body,
        HostRequestBody::SignalInvoke { args, .. } if args == &Some(vec![2])
    ));
    h.reply(HostReply::completed(second.request_id, None));

    h.reply(HostReply::completed(invoke.request_id, None));
    assert_eq!(h.outcome(&execution).await, RunOutcome::Completed(None));
}

#[test_log::test(tokio::test)]
async fn test_query_relayed_to_host() {
    let mut h = Harness::new(&["Billing"]).await;
    let (execution, invoke) = h.start("Billing", StartWorkflowOptions::new("tq")).await;

    let reply = h
        .call(invoke.context_id, RequestBody::QueryRegister {
            query: "status".into(),
        })
        .await;
    assert!(reply.is_ok());

    let pending = h.spawn_call(None, RequestBody::WorkflowQuery {
        execution: execution.clone(),
        query: "status".into(),
        args: None,
    });

    let query = h.next_host_request().await;
    assert!(matches!(&query.body, HostRequestBody::QueryInvoke { query, .. } if query == "status"));
    h.reply(HostReply::completed(query.request_id, Some(b"busy".to_vec())));

    let reply = pending.await.unwrap();
    assert_eq!(reply.body, ReplyBody::QueryResult {
        result: Some(b"busy".to_vec())
    });

    let pending = h.spawn_call(None, RequestBody::WorkflowQuery {
        execution: execution.clone(),
        query: "status".into(),
        args: None,
    });
    let query = h.next_host_request().await;
    h.reply(HostReply::failed(query.request_id, RemoteError::application("not ready")));
    let reply = pending.await.unwrap();
    assert_eq!(error_kind(&reply), ErrorKind::Application);

    h.reply(HostReply::completed(invoke.request_id, None));
    h.outcome(&execution).await;
}

#[test_log::test(tokio::test)]
async fn test_child_start_and_wait() {
    let mut h = Harness::new(&["Billing", "Shipping"]).await;
    let (execution, parent) = h.start("Billing", StartWorkflowOptions::new("tq")).await;
    let context_id = parent.context_id;

    let reply = h
        .call(context_id, RequestBody::ChildStart {
            workflow: "Shipping".into(),
            args: None,
            options: Default::default(),
        })
        .await;
    let child_id = match reply.body {
        ReplyBody::ChildStarted { child_id, .. } => child_id,
        other => panic!("unexpected reply: {other:?} ({:?})", reply.error),
    };

    let child_invoke = h.next_host_request().await;
    let (child_info, _) = invoke_info(&child_invoke);
    assert_eq!(child_info.workflow_type, "Shipping");
    assert_eq!(child_info.task_queue, "tq");

    let wait = h.spawn_call(context_id, RequestBody::ChildWait { child_id });
    h.reply(HostReply::completed(child_invoke.request_id, Some(b"shipped".to_vec())));

    let reply = wait.await.unwrap();
    assert_eq!(reply.body, ReplyBody::ChildResult {
        result: Some(b"shipped".to_vec())
    });

    // Entry is gone once its result was retrieved
    let again = h.call(context_id, RequestBody::ChildWait { child_id }).await;
    assert_eq!(error_kind(&again), ErrorKind::EntityNotFound);

    h.reply(HostReply::completed(parent.request_id, None));
    h.outcome(&execution).await;
}

#[test_log::test(tokio::test)]
async fn test_canceled_child_wait() {
    let mut h = Harness::new(&["Billing", "Shipping"]).await;
    let (execution, parent) = h.start("Billing", StartWorkflowOptions::new("tq")).await;
    let context_id = parent.context_id;

    let reply = h
        .call(context_id, RequestBody::ChildStart {
            workflow: "Shipping".into(),
            args: None,
            options: Default::default(),
        })
        .await;
    let (child_id, child_execution) = match reply.body {
        ReplyBody::ChildStarted { child_id, execution } => (child_id, execution),
        other => panic!("unexpected reply: {other:?}"),
    };
    let _child_invoke = h.next_host_request().await;

    let wait = h.spawn_call(context_id, RequestBody::ChildWait { child_id });
    let reply = h.call(context_id, RequestBody::ChildCancel { child_id }).await;
    assert!(reply.is_ok());

    let reply = wait.await.unwrap();
    assert_eq!(error_kind(&reply), ErrorKind::Canceled);
    assert_eq!(h.outcome(&child_execution).await, RunOutcome::Canceled);

    let again = h.call(context_id, RequestBody::ChildCancel { child_id }).await;
    assert_eq!(error_kind(&again), ErrorKind::EntityNotFound);

    h.reply(HostReply::completed(parent.request_id, None));
    h.outcome(&execution).await;
}

#[test_log::test(tokio::test)]
async fn test_queue_verbs() {
    let mut h = Harness::new(&["Billing"]).await;
    let (execution, invoke) = h.start("Billing", StartWorkflowOptions::new("tq")).await;
    let ctx = invoke.context_id;

    let reply = h.call(ctx, RequestBody::QueueNew { capacity: 2 }).await;
    let queue_id = match reply.body {
        ReplyBody::QueueCreated { queue_id } => queue_id,
        other => panic!("unexpected reply: {other:?}"),
    };

    let write = |data: Vec<u8>| RequestBody::QueueWrite {
        queue_id,
        data,
        no_block: true,
    };
    for (data, expected) in [
        (vec![1], WriteStatus::Enqueued),
        (vec![2], WriteStatus::Enqueued),
        (vec![3], WriteStatus::Full),
    ] {
        let reply = h.call(ctx, write(data)).await;
        assert_eq!(reply.body, ReplyBody::QueueWritten { status: expected });
    }

    let read = |timeout: Option<Duration>| RequestBody::QueueRead { queue_id, timeout };
    for expected in [vec![1], vec![2]] {
        let reply = h.call(ctx, read(None)).await;
        assert_eq!(reply.body, ReplyBody::QueueRead {
            data: Some(expected),
            closed: false
        });
    }

    let reply = h.call(ctx, read(Some(Duration::from_millis(50)))).await;
    assert_eq!(error_kind(&reply), ErrorKind::Timeout);

    let reply = h.call(ctx, RequestBody::QueueClose { queue_id }).await;
    assert!(reply.is_ok());

    let reply = h.call(ctx, read(None)).await;
    assert_eq!(reply.body, ReplyBody::QueueRead {
        data: None,
        closed: true
    });

    let reply = h.call(ctx, write(vec![4])).await;
    assert_eq!(error_kind(&reply), ErrorKind::Generic);

    let reply = h.call(ctx, RequestBody::QueueClose { queue_id: 99 }).await;
    assert_eq!(error_kind(&reply), ErrorKind::EntityNotFound);

    h.reply(HostReply::completed(invoke.request_id, None));
    h.outcome(&execution).await;
}

#[test_log::test(tokio::test)]
async fn test_blocked_queue_read_released_by_write() {
    let mut h = Harness::new(&["Billing"]).await;
    let (execution, invoke) = h.start("Billing", StartWorkflowOptions::new("tq")).await;
    let ctx = invoke.context_id;

    let reply = h.call(ctx, RequestBody::QueueNew { capacity: 0 }).await;
    let queue_id = match reply.body {
        ReplyBody::QueueCreated { queue_id } => queue_id,
        other => panic!("unexpected reply: {other:?}"),
    };

    let read = h.spawn_call(ctx, RequestBody::QueueRead {
        queue_id,
        timeout: None,
    });
    let reply = h
        .call(ctx, RequestBody::QueueWrite {
            queue_id,
            data: vec![7],
            no_block: false,
        })
        .await;
    assert!(reply.is_ok());

    assert_eq!(read.await.unwrap().body, ReplyBody::QueueRead {
        data: Some(vec![7]),
        closed: false
    });

    h.reply(HostReply::completed(invoke.request_id, None));
    h.outcome(&execution).await;
}

#[test_log::test(tokio::test)]
async fn test_mutable_value_keeps_recorded_value_on_replay() {
    let mut h = Harness::new(&["Billing"]).await;
    let (execution, invoke) = h.start("Billing", StartWorkflowOptions::new("tq")).await;
    let ctx = invoke.context_id;

    let record = |payload: Vec<u8>| RequestBody::MutableValue {
        id: Some("x".into()),
        value: RecordedValue::Payload(Some(payload)),
    };

    let first = h.call(ctx, record(vec![1, 2, 3])).await;
    let second = h.call(ctx, record(vec![1, 2, 3])).await;
    assert_eq!(first.body, second.body);

    h.engine.handle(&execution).unwrap().set_replaying(true);
    let replayed = h.call(ctx, record(vec![9])).await;
    assert_eq!(replayed.body, ReplyBody::Value {
        value: RecordedValue::Payload(Some(vec![1, 2, 3]))
    });

    let side_effect = h
        .call(ctx, RequestBody::MutableValue {
            id: None,
            value: RecordedValue::Error(RemoteError::application("no stock")),
        })
        .await;
    assert!(matches!(
        side_effect.body,
        ReplyBody::Value {
            value: RecordedValue::Error(_)
        }
    ));

    h.reply(HostReply::completed(invoke.request_id, None));
    h.outcome(&execution).await;
}

#[test_log::test(tokio::test)]
async fn test_get_version() {
    let mut h = Harness::new(&["Billing"]).await;
    let (execution, invoke) = h.start("Billing", StartWorkflowOptions::new("tq")).await;
    let ctx = invoke.context_id;

    let reply = h
        .call(ctx, RequestBody::GetVersion {
            change_id: "new-tax".into(),
            min_supported: -1,
            max_supported: 2,
        })
        .await;
    assert_eq!(reply.body, ReplyBody::Version { version: 2 });

    let reply = h
        .call(ctx, RequestBody::GetVersion {
            change_id: "new-tax".into(),
            min_supported: 3,
            max_supported: 4,
        })
        .await;
    assert_eq!(error_kind(&reply), ErrorKind::Generic);

    h.reply(HostReply::completed(invoke.request_id, None));
    h.outcome(&execution).await;
}

#[test_log::test(tokio::test)]
async fn test_lookup_failures_are_entity_not_found() {
    let h = Harness::new(&[]).await;

    let missing_context = h.call(None, RequestBody::QueueNew { capacity: 1 }).await;
    assert_eq!(error_kind(&missing_context), ErrorKind::EntityNotFound);

    let unscoped_start = h
        .call(None, RequestBody::ChildStart {
            workflow: "Billing".into(),
            args: None,
            options: Default::default(),
        })
        .await;
    assert_eq!(error_kind(&unscoped_start), ErrorKind::EntityNotFound);
    assert_eq!(
        unscoped_start.error.unwrap().message,
        "request has no workflow context id"
    );

    let unknown_context = h.call(Some(404), RequestBody::ChildWait { child_id: 1 }).await;
    assert_eq!(error_kind(&unknown_context), ErrorKind::EntityNotFound);

    let mut header = RequestHeader::new(1, 77);
    header.context_id = None;
    let unknown_client = h
        .dispatcher
        .handle(ProxyRequest::new(header, RequestBody::WorkflowDescribe {
            execution: WorkflowExecution::new("wf", ""),
        }))
        .await;
    assert_eq!(error_kind(&unknown_client), ErrorKind::EntityNotFound);
    assert_eq!(unknown_client.request_id, 1);

    let unknown_reply = h.dispatcher.on_reply_received(HostReply::completed(12345, None));
    tokio_test::assert_err!(unknown_reply);
}

#[test_log::test(tokio::test)]
async fn test_describe_and_terminate() {
    let mut h = Harness::new(&["Billing"]).await;
    let (execution, _invoke) = h.start("Billing", StartWorkflowOptions::new("tq")).await;

    let reply = h
        .call(None, RequestBody::WorkflowDescribe {
            execution: execution.clone(),
        })
        .await;
    match reply.body {
        ReplyBody::Description { description } => {
            assert_eq!(description.status, ExecutionStatus::Running);
            assert_eq!(description.workflow_type, "Billing");
        }
        other => panic!("unexpected reply: {other:?}"),
    }

    let reply = h
        .call(None, RequestBody::WorkflowTerminate {
            execution: execution.clone(),
            reason: Some("manual".into()),
        })
        .await;
    assert!(reply.is_ok());
    assert_eq!(h.outcome(&execution).await, RunOutcome::Canceled);

    let reply = h
        .call(None, RequestBody::WorkflowDescribe {
            execution: execution.clone(),
        })
        .await;
    assert!(matches!(
        reply.body,
        ReplyBody::Description { description } if description.status == ExecutionStatus::Terminated
    ));
}

#[test_log::test(tokio::test)]
async fn test_signal_with_start_delivers_buffered_signal() {
    let mut h = Harness::new(&["Billing"]).await;

    let reply = h
        .call(None, RequestBody::WorkflowSignalWithStart {
            workflow: "Billing".into(),
            signal: "approve".into(),
            signal_args: Some(vec![5]),
            start_args: None,
            options: StartWorkflowOptions::new("tq").with_workflow_id("order-1"),
        })
        .await;
    let execution = match reply.body {
        ReplyBody::Execution { execution } => execution,
        other => panic!("unexpected reply: {other:?} ({:?})", reply.error),
    };
    assert_eq!(execution.workflow_id, "order-1");

    let invoke = h.next_host_request().await;
    let reply = h
        .call(invoke.context_id, RequestBody::SignalSubscribe {
            signal: "approve".into(),
        })
        .await;
    assert!(reply.is_ok());

    let signal = h.next_host_request().await;
    assert!(matches!(
        &signal.body,
        HostRequestBody::SignalInvoke { args, .. } if args == &Some(vec![5])
    ));
    h.reply(HostReply::completed(signal.request_id, None));

    h.reply(HostReply::completed(invoke.request_id, None));
    h.outcome(&execution).await;
}

#[test_log::test(tokio::test)]
async fn test_dispatcher_keeps_instance_id() {
    let (transport, _outbound) = ChannelTransport::new();
    let config = ProxyConfig::default().with_instance_id("proxy-under-test");
    let dispatcher = RequestDispatcher::new(config, Arc::new(transport));
    assert_eq!(dispatcher.state().config.instance_id, "proxy-under-test");

    let mut header = RequestHeader::new(1, CLIENT);
    header.context_id = None;
    let reply = dispatcher
        .handle(ProxyRequest::new(header, RequestBody::WorkflowRegister {
            workflow: "Billing".into(),
        }))
        .await;
    assert_eq!(error_kind(&reply), ErrorKind::EntityNotFound);
}
