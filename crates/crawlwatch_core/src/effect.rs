use crate::{BatchAction, RequestDescriptor, TargetId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Read the listing for this request through the query cache.
    LoadListing(RequestDescriptor),
    /// Dispatch one action per target, in this order.
    RunBatch {
        action: BatchAction,
        targets: Vec<TargetId>,
    },
}
