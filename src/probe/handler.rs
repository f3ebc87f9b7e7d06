//! Client batch-meta handlers.

use crate::batch::Batch;
use crate::engine::ProbeReturn;
use std::sync::Arc;

/// A client callback invoked for every batch crossing a probed pad.
///
/// Handlers run synchronously on the data-plane thread that delivers the
/// batch, so they must be fast and must not block. Returning
/// [`ProbeReturn::Drop`] drops the batch and skips every handler registered
/// after this one.
///
/// Any `Fn(&mut Batch) -> ProbeReturn` closure is a handler; state the
/// handler needs (the "user data") is captured by the closure.
pub trait BatchMetaHandler: Send + Sync {
    /// Inspect or mutate `batch`.
    fn handle(&self, batch: &mut Batch) -> ProbeReturn;
}

impl<F> BatchMetaHandler for F
where
    F: Fn(&mut Batch) -> ProbeReturn + Send + Sync,
{
    fn handle(&self, batch: &mut Batch) -> ProbeReturn {
        self(batch)
    }
}

/// Shared reference to a registered handler.
///
/// Registration identity is the allocation behind the `Arc`: clones of one
/// `HandlerRef` are the same handler, two separate `Arc::new` calls are not.
pub type HandlerRef = Arc<dyn BatchMetaHandler>;

/// Wrap a closure as a [`HandlerRef`].
pub fn handler<F>(f: F) -> HandlerRef
where
    F: Fn(&mut Batch) -> ProbeReturn + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Whether two references name the same registered handler.
pub fn same_handler(a: &HandlerRef, b: &HandlerRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
