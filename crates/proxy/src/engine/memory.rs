//! In-memory implementation of the engine seam for testing
//!
//! Runs every workflow as a tokio task in this process. It honours the
//! replay contracts the proxy depends on (recorded side effects, mutable
//! values, version markers) and re-runs an entry point in replay mode when
//! it returns [`RunOutcome::ForceReplay`]. A run still asking for replay
//! after the replay limit fails.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::adapter::*;
use super::types::*;
use crate::error::RemoteError;
use crate::protocol::Payload;

const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_MAX_REPLAYS: u32 = 3;
const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(3600);
const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(10);

type OutcomeSender = Arc<watch::Sender<Option<RunOutcome>>>;

/// Internal execution state
struct ExecutionRecord {
    handle: Arc<InMemoryWorkflowHandle>,
    outcome: OutcomeSender,
    terminated: bool,
}

/// Where and how to launch a run
struct Launch {
    namespace: String,
    workflow_id: Option<String>,
    task_queue: String,
    execution_timeout: Duration,
    task_timeout: Duration,
}

struct EngineInner {
    namespace: String,
    max_replays: u32,
    entries: RwLock<HashMap<String, WorkflowEntry>>,
    executions: RwLock<HashMap<String, ExecutionRecord>>,
}

impl EngineInner {
    fn launch(
        self: &Arc<Self>,
        workflow: &str,
        args: Option<Payload>,
        launch: Launch,
        cancel: CancellationToken,
    ) -> Result<(WorkflowExecution, OutcomeSender), EngineError> {
        let entry = self
            .entries
            .read()
            .get(workflow)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("workflow type {workflow}")))?;

        let execution = WorkflowExecution::new(
            launch
                .workflow_id
                .unwrap_or_else(|| format!("{}-{}", workflow, Uuid::now_v7())),
            Uuid::now_v7().to_string(),
        );

        let info = WorkflowInfo {
            namespace: launch.namespace,
            workflow_id: execution.workflow_id.clone(),
            run_id: execution.run_id.clone(),
            workflow_type: workflow.to_string(),
            task_queue: launch.task_queue,
            execution_start_to_close_timeout: launch.execution_timeout,
            schedule_to_close_timeout: launch.task_timeout,
            schedule_to_start_timeout: launch.task_timeout,
            start_to_close_timeout: launch.task_timeout,
        };

        let handle = Arc::new(InMemoryWorkflowHandle::new(
            Arc::downgrade(self),
            info,
            cancel,
        ));
        let (tx, _rx) = watch::channel(None);
        let outcome = Arc::new(tx);

        {
            let mut executions = self.executions.write();
            if let Some(existing) = executions.get(&execution.workflow_id) {
                if existing.outcome.borrow().is_none() {
                    return Err(EngineError::Failure(format!(
                        "workflow {} is already running",
                        execution.workflow_id
                    )));
                }
            }
            executions.insert(
                execution.workflow_id.clone(),
                ExecutionRecord {
                    handle: handle.clone(),
                    outcome: outcome.clone(),
                    terminated: false,
                },
            );
        }

        info!(workflow_id = %execution.workflow_id, workflow_type = workflow, "starting workflow run");

        let sender = outcome.clone();
        let max_replays = self.max_replays;
        tokio::spawn(async move {
            let dyn_handle: Arc<dyn WorkflowHandle> = handle.clone();
            let mut replays = 0;
            let result = loop {
                let outcome = entry(dyn_handle.clone(), args.clone()).await;
                if outcome == RunOutcome::ForceReplay && replays < max_replays {
                    replays += 1;
                    debug!(workflow_id = %handle.info.workflow_id, replays, "replaying workflow run");
                    handle.begin_replay();
                    continue;
                }
                if outcome == RunOutcome::ForceReplay {
                    warn!(workflow_id = %handle.info.workflow_id, replays, "replay limit exceeded");
                    break RunOutcome::Failed(RemoteError::generic("replay limit exceeded"));
                }
                break outcome;
            };
            sender.send_replace(Some(result));
        });

        Ok((execution, outcome))
    }

    fn record(&self, execution: &WorkflowExecution) -> Result<Arc<InMemoryWorkflowHandle>, EngineError> {
        let executions = self.executions.read();
        let record = executions
            .get(&execution.workflow_id)
            .filter(|r| execution.run_id.is_empty() || r.handle.info.run_id == execution.run_id)
            .ok_or_else(|| EngineError::NotFound(format!("workflow {}", execution.workflow_id)))?;
        Ok(record.handle.clone())
    }

    fn is_running(&self, workflow_id: &str) -> bool {
        self.executions
            .read()
            .get(workflow_id)
            .map(|r| r.outcome.borrow().is_none() && !r.terminated)
            .unwrap_or(false)
    }

    fn signal(
        &self,
        execution: &WorkflowExecution,
        signal: &str,
        args: Option<Payload>,
    ) -> Result<(), EngineError> {
        if !self.is_running(&execution.workflow_id) {
            return Err(EngineError::NotFound(format!(
                "running workflow {}",
                execution.workflow_id
            )));
        }
        let handle = self.record(execution)?;
        handle.deliver_signal(signal, args);
        Ok(())
    }
}

/// In-memory workflow engine
///
/// # Example
///
/// ```ignore
/// let engine = InMemoryEngine::new();
/// engine.register_workflow("Billing", entry).await?;
/// let execution = engine
///     .start_workflow("Billing", None, StartWorkflowOptions::new("billing-tq"))
///     .await?;
/// let outcome = engine.await_outcome(&execution).await?;
/// ```
#[derive(Clone)]
pub struct InMemoryEngine {
    inner: Arc<EngineInner>,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEngine {
    /// Create a new in-memory engine
    pub fn new() -> Self {
        Self::with_max_replays(DEFAULT_MAX_REPLAYS)
    }

    /// Create an engine that replays a force-replayed run at most `max_replays` times
    pub fn with_max_replays(max_replays: u32) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                namespace: DEFAULT_NAMESPACE.to_string(),
                max_replays,
                entries: RwLock::new(HashMap::new()),
                executions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Check if a workflow type is registered
    pub fn is_registered(&self, workflow: &str) -> bool {
        self.inner.entries.read().contains_key(workflow)
    }

    /// Handle of an execution, if it exists
    pub fn handle(&self, execution: &WorkflowExecution) -> Option<Arc<InMemoryWorkflowHandle>> {
        self.inner.record(execution).ok()
    }

    /// Outcome of an execution if it has finished
    pub fn outcome(&self, execution: &WorkflowExecution) -> Option<RunOutcome> {
        self.inner
            .executions
            .read()
            .get(&execution.workflow_id)
            .and_then(|r| r.outcome.borrow().clone())
    }

    /// Wait until an execution finishes
    pub async fn await_outcome(
        &self,
        execution: &WorkflowExecution,
    ) -> Result<RunOutcome, EngineError> {
        let mut rx = {
            let executions = self.inner.executions.read();
            let record = executions
                .get(&execution.workflow_id)
                .ok_or_else(|| EngineError::NotFound(format!("workflow {}", execution.workflow_id)))?;
            record.outcome.subscribe()
        };

        let outcome = rx
            .wait_for(|o| o.is_some())
            .await
            .map_err(|_| EngineError::Failure("engine dropped the execution".to_string()))?
            .clone();

        outcome.ok_or_else(|| EngineError::Failure("execution produced no outcome".to_string()))
    }

    fn launch_options(&self, options: StartWorkflowOptions) -> Launch {
        Launch {
            namespace: self.inner.namespace.clone(),
            workflow_id: options.workflow_id,
            task_queue: options.task_queue,
            execution_timeout: options.execution_timeout.unwrap_or(DEFAULT_EXECUTION_TIMEOUT),
            task_timeout: options.task_timeout.unwrap_or(DEFAULT_TASK_TIMEOUT),
        }
    }
}

#[async_trait]
impl EngineAdapter for InMemoryEngine {
    async fn register_workflow(
        &self,
        workflow: &str,
        entry: WorkflowEntry,
    ) -> Result<(), EngineError> {
        self.inner
            .entries
            .write()
            .insert(workflow.to_string(), entry);
        debug!(workflow, "registered workflow entry point");
        Ok(())
    }

    async fn start_workflow(
        &self,
        workflow: &str,
        args: Option<Payload>,
        options: StartWorkflowOptions,
    ) -> Result<WorkflowExecution, EngineError> {
        let launch = self.launch_options(options);
        let (execution, _) = self
            .inner
            .launch(workflow, args, launch, CancellationToken::new())?;
        Ok(execution)
    }

    async fn signal_workflow(
        &self,
        execution: &WorkflowExecution,
        signal: &str,
        args: Option<Payload>,
    ) -> Result<(), EngineError> {
        self.inner.signal(execution, signal, args)
    }

    async fn signal_with_start(
        &self,
        workflow: &str,
        signal: &str,
        signal_args: Option<Payload>,
        start_args: Option<Payload>,
        options: StartWorkflowOptions,
    ) -> Result<WorkflowExecution, EngineError> {
        let running = options
            .workflow_id
            .as_deref()
            .filter(|id| self.inner.is_running(id))
            .map(|id| self.inner.record(&WorkflowExecution::new(id, "")))
            .transpose()?;

        let execution = match running {
            Some(handle) => handle.info.execution(),
            None => {
                let launch = self.launch_options(options);
                let (execution, _) =
                    self.inner
                        .launch(workflow, start_args, launch, CancellationToken::new())?;
                execution
            }
        };

        self.inner.signal(&execution, signal, signal_args)?;
        Ok(execution)
    }

    async fn query_workflow(
        &self,
        execution: &WorkflowExecution,
        query: &str,
        args: Option<Payload>,
    ) -> Result<Option<Payload>, EngineError> {
        let handle = self.inner.record(execution)?;
        let handler = handle
            .queries
            .read()
            .get(query)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("query handler {query}")))?;

        handler(args).await.map_err(EngineError::Failed)
    }

    async fn cancel_workflow(&self, execution: &WorkflowExecution) -> Result<(), EngineError> {
        let handle = self.inner.record(execution)?;
        handle.cancel.cancel();
        Ok(())
    }

    async fn terminate_workflow(
        &self,
        execution: &WorkflowExecution,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        let mut executions = self.inner.executions.write();
        let record = executions
            .get_mut(&execution.workflow_id)
            .ok_or_else(|| EngineError::NotFound(format!("workflow {}", execution.workflow_id)))?;

        info!(workflow_id = %execution.workflow_id, reason = reason.as_deref().unwrap_or(""), "terminating workflow");
        record.terminated = true;
        record.handle.cancel.cancel();
        Ok(())
    }

    async fn describe_workflow(
        &self,
        execution: &WorkflowExecution,
    ) -> Result<WorkflowDescription, EngineError> {
        let executions = self.inner.executions.read();
        let record = executions
            .get(&execution.workflow_id)
            .ok_or_else(|| EngineError::NotFound(format!("workflow {}", execution.workflow_id)))?;

        let status = if record.terminated {
            ExecutionStatus::Terminated
        } else {
            match &*record.outcome.borrow() {
                None | Some(RunOutcome::ForceReplay) => ExecutionStatus::Running,
                Some(RunOutcome::Completed(_)) => ExecutionStatus::Completed,
                Some(RunOutcome::Failed(_)) => ExecutionStatus::Failed,
                Some(RunOutcome::Canceled) => ExecutionStatus::Canceled,
                Some(RunOutcome::ContinueAsNew(_)) => ExecutionStatus::ContinuedAsNew,
            }
        };

        Ok(WorkflowDescription {
            execution: record.handle.info.execution(),
            workflow_type: record.handle.info.workflow_type.clone(),
            task_queue: record.handle.info.task_queue.clone(),
            status,
        })
    }
}

/// Signal buffer for one name
struct SignalSlot {
    tx: mpsc::UnboundedSender<Option<Payload>>,
    rx: Option<SignalReceiver>,
}

impl SignalSlot {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Some(rx) }
    }
}

/// Side effects recorded in order, consumed by position on replay
#[derive(Default)]
struct SideEffectLog {
    recorded: Vec<RecordedValue>,
    cursor: usize,
}

/// Handle of one in-memory run
pub struct InMemoryWorkflowHandle {
    engine: Weak<EngineInner>,
    info: WorkflowInfo,
    replaying: AtomicBool,
    cancel: CancellationToken,
    signals: Mutex<HashMap<String, SignalSlot>>,
    queries: RwLock<HashMap<String, QueryHandler>>,
    side_effects: Mutex<SideEffectLog>,
    mutable_values: Mutex<HashMap<String, RecordedValue>>,
    versions: Mutex<HashMap<String, i32>>,
}

impl InMemoryWorkflowHandle {
    fn new(engine: Weak<EngineInner>, info: WorkflowInfo, cancel: CancellationToken) -> Self {
        Self {
            engine,
            info,
            replaying: AtomicBool::new(false),
            cancel,
            signals: Mutex::new(HashMap::new()),
            queries: RwLock::new(HashMap::new()),
            side_effects: Mutex::new(SideEffectLog::default()),
            mutable_values: Mutex::new(HashMap::new()),
            versions: Mutex::new(HashMap::new()),
        }
    }

    /// Force the replay flag (tests use this to simulate history replay)
    pub fn set_replaying(&self, replaying: bool) {
        self.replaying.store(replaying, Ordering::SeqCst);
    }

    /// Cancel the run as the engine would
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether a query handler is installed for the name
    pub fn has_query_handler(&self, query: &str) -> bool {
        self.queries.read().contains_key(query)
    }

    fn begin_replay(&self) {
        self.set_replaying(true);
        self.side_effects.lock().cursor = 0;
    }

    fn deliver_signal(&self, signal: &str, args: Option<Payload>) {
        let mut signals = self.signals.lock();
        let slot = signals
            .entry(signal.to_string())
            .or_insert_with(SignalSlot::new);
        // A dropped subscriber loses the signal, as with a real engine
        let _ = slot.tx.send(args);
    }

    fn engine(&self) -> Result<Arc<EngineInner>, EngineError> {
        self.engine
            .upgrade()
            .ok_or_else(|| EngineError::Failure("engine shut down".to_string()))
    }
}

#[async_trait]
impl WorkflowHandle for InMemoryWorkflowHandle {
    fn info(&self) -> WorkflowInfo {
        self.info.clone()
    }

    fn is_replaying(&self) -> bool {
        self.replaying.load(Ordering::SeqCst)
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }

    fn signal_channel(&self, signal: &str) -> SignalReceiver {
        let mut signals = self.signals.lock();
        let slot = signals
            .entry(signal.to_string())
            .or_insert_with(SignalSlot::new);
        match slot.rx.take() {
            Some(rx) => rx,
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                slot.tx = tx;
                rx
            }
        }
    }

    fn set_query_handler(&self, query: &str, handler: QueryHandler) -> Result<(), EngineError> {
        self.queries.write().insert(query.to_string(), handler);
        Ok(())
    }

    async fn sleep(&self, duration: Duration) -> Result<(), EngineError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancel.cancelled() => Err(EngineError::Canceled),
        }
    }

    async fn start_child(
        &self,
        workflow: &str,
        args: Option<Payload>,
        options: ChildWorkflowOptions,
        cancel: CancellationToken,
    ) -> Result<ChildRun, EngineError> {
        let engine = self.engine()?;
        let launch = Launch {
            namespace: options.namespace.unwrap_or_else(|| self.info.namespace.clone()),
            workflow_id: options.workflow_id,
            task_queue: options
                .task_queue
                .unwrap_or_else(|| self.info.task_queue.clone()),
            execution_timeout: options
                .execution_timeout
                .unwrap_or(self.info.execution_start_to_close_timeout),
            task_timeout: options
                .task_timeout
                .unwrap_or(self.info.start_to_close_timeout),
        };

        let (execution, outcome) = engine.launch(workflow, args, launch, cancel)?;
        let mut rx = outcome.subscribe();

        let result: ChildResultFuture = Box::pin(async move {
            let outcome = match rx.wait_for(|o| o.is_some()).await {
                Ok(value) => value.clone(),
                Err(_) => None,
            };

            match outcome {
                Some(RunOutcome::Completed(payload)) => Ok(payload),
                Some(RunOutcome::Failed(error)) => Err(EngineError::Failed(error)),
                Some(RunOutcome::Canceled) => Err(EngineError::Canceled),
                Some(RunOutcome::ContinueAsNew(directive)) => Err(EngineError::Failure(format!(
                    "child continued as new workflow {}",
                    directive.workflow
                ))),
                Some(RunOutcome::ForceReplay) | None => {
                    Err(EngineError::Failure("child run did not complete".to_string()))
                }
            }
        });

        Ok(ChildRun { execution, result })
    }

    async fn signal_external(
        &self,
        execution: &WorkflowExecution,
        signal: &str,
        args: Option<Payload>,
    ) -> Result<(), EngineError> {
        self.engine()?.signal(execution, signal, args)
    }

    fn side_effect(&self, producer: ValueProducer) -> RecordedValue {
        let mut log = self.side_effects.lock();
        let position = log.cursor;
        log.cursor += 1;

        if let Some(recorded) = log.recorded.get(position) {
            return recorded.clone();
        }

        let value = producer();
        log.recorded.push(value.clone());
        value
    }

    fn mutable_side_effect(
        &self,
        id: &str,
        producer: ValueProducer,
        equals: ValueComparator,
    ) -> RecordedValue {
        let mut values = self.mutable_values.lock();

        if self.is_replaying() {
            if let Some(recorded) = values.get(id) {
                return recorded.clone();
            }
        }

        let value = producer();
        match values.get(id) {
            Some(recorded) if equals(recorded, &value) => recorded.clone(),
            _ => {
                values.insert(id.to_string(), value.clone());
                value
            }
        }
    }

    fn get_version(
        &self,
        change_id: &str,
        min_supported: i32,
        max_supported: i32,
    ) -> Result<i32, EngineError> {
        let mut versions = self.versions.lock();
        let version = match versions.get(change_id) {
            Some(version) => *version,
            None if self.is_replaying() => DEFAULT_VERSION,
            None => {
                versions.insert(change_id.to_string(), max_supported);
                max_supported
            }
        };

        if version < min_supported || version > max_supported {
            return Err(EngineError::Failure(format!(
                "version {version} of change {change_id} is outside supported range [{min_supported}, {max_supported}]"
            )));
        }
        Ok(version)
    }
}
