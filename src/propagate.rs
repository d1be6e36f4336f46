//! Copying a connection's endpoint onto statements created from it.

use std::sync::Arc;

use crate::endpoint::EndpointInfo;
use crate::trace_value::HasTraceValue;

/// Copy the connection's current endpoint into `statement`.
///
/// Leaves the statement empty when the connection has nothing bound (closed,
/// or bind never happened) or when either side lacks the capability. Returns
/// the endpoint that was copied.
pub fn propagate<C, S>(connection: &C, statement: &S) -> Option<Arc<EndpointInfo>>
where
    C: HasTraceValue + ?Sized,
    S: HasTraceValue + ?Sized,
{
    let target = statement.trace_value()?;
    let endpoint = connection.trace_endpoint()?;
    target.set_trace_endpoint(endpoint.clone());
    Some(endpoint)
}
