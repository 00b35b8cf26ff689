//! Workflow contexts and the objects they own
//!
//! A [`WorkflowContext`] lives from the moment the engine invokes a bridged
//! workflow until the host's final reply. It owns its [`ChildContext`]s and
//! [`WorkflowQueue`]s; removing the context cancels waits on both.

mod child;
mod queue;
mod registry;
mod workflow;

pub use child::{ChildClaim, ChildContext, ChildTable};
pub use queue::{QueueItem, QueueTable, TryWrite, WorkflowQueue};
pub use registry::ContextRegistry;
pub use workflow::WorkflowContext;
