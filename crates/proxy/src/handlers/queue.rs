//! Queue verbs

use std::time::Duration;

use tracing::debug;

use crate::config::ProxyConfig;
use crate::context::{QueueItem, TryWrite, WorkflowContext};
use crate::error::ProxyError;
use crate::protocol::{Payload, QueueId, ReplyBody, WriteStatus};

pub(crate) fn create(
    config: &ProxyConfig,
    context: &WorkflowContext,
    capacity: usize,
) -> Result<ReplyBody, ProxyError> {
    let queue = context.queues().create(config.queue_capacity(capacity));
    debug!(
        context_id = context.context_id(),
        queue_id = queue.queue_id(),
        capacity = queue.capacity(),
        "queue created"
    );
    Ok(ReplyBody::QueueCreated {
        queue_id: queue.queue_id(),
    })
}

pub(crate) async fn write(
    context: &WorkflowContext,
    queue_id: QueueId,
    data: Payload,
    no_block: bool,
) -> Result<ReplyBody, ProxyError> {
    let queue = context.queues().get(queue_id)?;

    let status = if no_block {
        match queue.try_write(data)? {
            TryWrite::Enqueued => WriteStatus::Enqueued,
            TryWrite::Full(_) => WriteStatus::Full,
        }
    } else {
        queue.write(data, context.cancellation()).await?;
        WriteStatus::Enqueued
    };

    Ok(ReplyBody::QueueWritten { status })
}

/// Read one item; the timeout runs on the engine's replay-safe timer
pub(crate) async fn read(
    context: &WorkflowContext,
    queue_id: QueueId,
    timeout: Option<Duration>,
) -> Result<ReplyBody, ProxyError> {
    let queue = context.queues().get(queue_id)?;
    let cancel = context.cancellation();

    let item = match timeout {
        None => queue.read(cancel).await?,
        Some(timeout) => {
            tokio::select! {
                biased;
                item = queue.read(cancel) => item?,
                timer = context.handle().sleep(timeout) => {
                    timer?;
                    debug!(context_id = context.context_id(), queue_id, "queue read timed out");
                    return Err(ProxyError::Timeout);
                }
            }
        }
    };

    Ok(match item {
        QueueItem::Value(data) => ReplyBody::QueueRead {
            data: Some(data),
            closed: false,
        },
        QueueItem::Closed => ReplyBody::QueueRead {
            data: None,
            closed: true,
        },
    })
}

pub(crate) fn close(context: &WorkflowContext, queue_id: QueueId) -> Result<ReplyBody, ProxyError> {
    context.queues().get(queue_id)?.close();
    Ok(ReplyBody::Empty)
}
