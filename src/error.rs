//! Error types.

use thiserror::Error;

/// Errors reported by the database client being traced.
///
/// Tracing conditions (missing capability, unresolved facade target) never
/// show up here; only failures of the underlying driver do.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The server could not be reached or refused the connection.
    #[error("connect to {target} failed: {reason}")]
    Connect { target: String, reason: String },

    /// The connection or statement was already closed.
    #[error("{0} is closed")]
    Closed(&'static str),

    /// The operation is not available on this resource.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The resource is in use by another caller.
    #[error("resource busy: {0}")]
    Busy(&'static str),

    /// The connection URL could not be understood.
    #[error("invalid connection url: {0}")]
    InvalidUrl(#[from] EndpointParseError),

    /// Error raised by SeaORM.
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    /// Any other driver failure.
    #[error("{0}")]
    Other(String),
}

/// Errors from turning a connection URL into an endpoint descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointParseError {
    #[error("unsupported url scheme `{0}`")]
    UnsupportedScheme(String),

    #[error("url has no host")]
    MissingHost,

    #[error("invalid port `{0}`")]
    InvalidPort(String),

    #[error("malformed url `{0}`")]
    Malformed(String),
}

/// Failure to reach the concrete connection behind a facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("facade target unresolved")]
    TargetUnresolved,
}
