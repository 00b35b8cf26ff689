//! Replay-safe values: side effects, mutable values and version gates

use crate::context::WorkflowContext;
use crate::engine::RecordedValue;
use crate::error::ProxyError;
use crate::protocol::ReplyBody;

/// Record a host-supplied value
///
/// With an id the value is a mutable value, re-recorded only when it changes;
/// without one it is a side effect recorded once. Either way a replaying run
/// gets the recorded value back.
pub(crate) fn record_value(
    context: &WorkflowContext,
    id: Option<String>,
    value: RecordedValue,
) -> Result<ReplyBody, ProxyError> {
    let handle = context.handle();
    let recorded = match id {
        Some(id) => handle.mutable_side_effect(
            &id,
            Box::new(move || value),
            Box::new(|recorded, new| recorded.same_as(new)),
        ),
        None => handle.side_effect(Box::new(move || value)),
    };

    Ok(ReplyBody::Value { value: recorded })
}

pub(crate) fn get_version(
    context: &WorkflowContext,
    change_id: String,
    min_supported: i32,
    max_supported: i32,
) -> Result<ReplyBody, ProxyError> {
    let version = context
        .handle()
        .get_version(&change_id, min_supported, max_supported)?;
    Ok(ReplyBody::Version { version })
}
