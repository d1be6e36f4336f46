//! Connect-time binding of endpoints to connections.

use std::sync::Arc;

use crate::connection::TracedConnection;
use crate::endpoint::EndpointInfo;
use crate::trace_value::HasTraceValue;

/// Attach `endpoint` to a freshly opened connection.
///
/// Only the first bind of a connection takes effect, and a closed connection
/// is never bound. When the connection has no trace capability this does
/// nothing. Returns whether the endpoint was attached.
pub fn bind(connection: &TracedConnection, endpoint: Arc<EndpointInfo>) -> bool {
    let Some(value) = connection.trace_value() else {
        tracing::debug!(endpoint = %endpoint, "Connection has no trace capability, skipping bind");
        return false;
    };

    if !connection.lifecycle_cell().try_bind() {
        tracing::debug!(
            endpoint = %endpoint,
            state = ?connection.lifecycle(),
            "Connection already bound or closed, skipping bind"
        );
        return false;
    }

    if connection.config().log_lifecycle {
        tracing::debug!(
            db.system = %endpoint.system(),
            db.name = %endpoint.database_name(),
            server.address = %endpoint.host(),
            server.port = endpoint.port(),
            multi_host = endpoint.is_multi_host(),
            "Endpoint bound to connection"
        );
    }

    value.set_trace_endpoint(endpoint);
    true
}
