//! Resolving forwarding facades to the concrete connection behind them.

use std::sync::Arc;

use crate::connection::{Connection, TracedConnection};
use crate::endpoint::EndpointInfo;
use crate::error::ResolveError;
use crate::trace_value::HasTraceValue;

/// A connection handle that forwards to one concrete connection at a time.
///
/// The target may change between calls (failover, rebalancing), so callers
/// must ask again every time instead of holding on to an earlier answer.
pub trait Facade: Send + Sync {
    /// The concrete connection currently receiving forwarded calls.
    fn current_target(&self) -> Option<TracedConnection>;
}

/// What a connection handle really is.
#[derive(Clone, Copy)]
pub enum Handle<'a> {
    Concrete(&'a TracedConnection),
    Facade(&'a dyn Facade),
}

/// Return the concrete connection behind `handle`.
///
/// A concrete handle comes back unchanged. A facade is asked for its current
/// target; a facade without one fails with [`ResolveError::TargetUnresolved`].
pub fn resolve_concrete(handle: Handle<'_>) -> Result<TracedConnection, ResolveError> {
    match handle {
        Handle::Concrete(connection) => Ok(connection.clone()),
        Handle::Facade(facade) => facade
            .current_target()
            .ok_or(ResolveError::TargetUnresolved),
    }
}

/// [`resolve_concrete`] for any [`Connection`].
pub fn resolve<C: Connection + ?Sized>(connection: &C) -> Result<TracedConnection, ResolveError> {
    resolve_concrete(connection.handle())
}

/// Endpoint bound to the concrete connection behind `connection`.
///
/// An unresolved facade reads as "no endpoint".
pub fn resolved_endpoint<C: Connection + ?Sized>(connection: &C) -> Option<Arc<EndpointInfo>> {
    match resolve(connection) {
        Ok(concrete) => concrete.trace_endpoint(),
        Err(error) => {
            tracing::debug!(%error, "Could not resolve connection target");
            None
        }
    }
}
