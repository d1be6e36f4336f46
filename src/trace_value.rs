//! The attachment point for endpoint metadata.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::endpoint::EndpointInfo;

/// Get/set/clear access to a resource's endpoint slot.
///
/// The slot is either empty or holds exactly one [`EndpointInfo`].
pub trait TraceValue: Send + Sync {
    fn trace_endpoint(&self) -> Option<Arc<EndpointInfo>>;

    fn set_trace_endpoint(&self, endpoint: Arc<EndpointInfo>);

    /// Empty the slot. Clearing an empty slot is a no-op.
    fn clear_trace_endpoint(&self);
}

/// A resource that may expose a [`TraceValue`].
///
/// `None` means the capability is absent for this resource; every tracing
/// operation on it then degrades to a no-op.
pub trait HasTraceValue {
    fn trace_value(&self) -> Option<&dyn TraceValue>;

    /// The attached endpoint, if the capability exists and the slot is set.
    fn trace_endpoint(&self) -> Option<Arc<EndpointInfo>> {
        self.trace_value().and_then(|value| value.trace_endpoint())
    }
}

/// Lock-free single-slot storage.
///
/// Readers racing a writer observe either the previous value or the new one,
/// never a partial value.
#[derive(Default)]
pub struct TraceSlot {
    endpoint: ArcSwapOption<EndpointInfo>,
}

impl TraceSlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TraceValue for TraceSlot {
    fn trace_endpoint(&self) -> Option<Arc<EndpointInfo>> {
        self.endpoint.load_full()
    }

    fn set_trace_endpoint(&self, endpoint: Arc<EndpointInfo>) {
        self.endpoint.store(Some(endpoint));
    }

    fn clear_trace_endpoint(&self) {
        self.endpoint.store(None);
    }
}

impl fmt::Debug for TraceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceSlot")
            .field("endpoint", &self.endpoint.load().as_deref().map(EndpointInfo::url))
            .finish()
    }
}
