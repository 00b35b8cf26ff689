//! Request/reply correlation with the host

mod operation;
mod router;

pub use operation::{OperationTable, Outcome, PendingReply};
pub use router::ReplyRouter;
