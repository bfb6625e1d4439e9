//! Per-request execution context.
//!
//! # Responsibility
//! - Carry the transactional resource resolved for one inbound request.
//! - Track whether an atomic operation is in flight for that request.
//!
//! # Invariants
//! - At most one atomic operation is unresolved per context at any time.
//!   A second one is fatal misuse and panics.

use log::error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Execution context supplied by the request-handling layer.
///
/// Clones share the in-flight marker, so a step that captured a clone cannot
/// start a nested atomic operation either.
#[derive(Debug)]
pub struct RequestContext<R> {
    request_id: String,
    resource: Arc<R>,
    in_atomic: Arc<AtomicBool>,
}

impl<R> Clone for RequestContext<R> {
    fn clone(&self) -> Self {
        Self {
            request_id: self.request_id.clone(),
            resource: Arc::clone(&self.resource),
            in_atomic: Arc::clone(&self.in_atomic),
        }
    }
}

impl<R> RequestContext<R> {
    pub fn new(request_id: impl Into<String>, resource: Arc<R>) -> Self {
        Self {
            request_id: request_id.into(),
            resource,
            in_atomic: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Whether an atomic operation is currently unresolved on this context.
    pub fn in_atomic(&self) -> bool {
        self.in_atomic.load(Ordering::SeqCst)
    }

    /// Marks an atomic operation as in flight until the returned scope drops.
    ///
    /// # Panics
    /// Panics when another atomic operation on this context is unresolved.
    pub(crate) fn enter_atomic(&self) -> AtomicScope {
        if self.in_atomic.swap(true, Ordering::SeqCst) {
            error!(
                "event=atomic_misuse module=atomic status=error request_id={} error_code=nested_atomic_operation",
                self.request_id
            );
            panic!(
                "nested atomic operation on request `{}`: the outer operation is still unresolved",
                self.request_id
            );
        }
        AtomicScope {
            in_atomic: Arc::clone(&self.in_atomic),
        }
    }
}

/// Clears the in-flight marker on every exit path, including cancellation.
pub(crate) struct AtomicScope {
    in_atomic: Arc<AtomicBool>,
}

impl Drop for AtomicScope {
    fn drop(&mut self) {
        self.in_atomic.store(false, Ordering::SeqCst);
    }
}
