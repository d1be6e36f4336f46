//! # sea-orm-endpoint-tracing
//!
//! Endpoint metadata for traced database connections and statements.
//!
//! When a connection is opened, the endpoint it talks to (host, port, database
//! name, and whether it is a load-balanced set) is attached to it. Every
//! statement created from the connection gets a copy, transaction control
//! leaves it alone, and closing the connection clears it. Tracing layers can
//! read the endpoint from any connection or statement without walking back to
//! the URL it came from.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sea_orm_endpoint_tracing::prelude::*;
//!
//! let driver = TracingDriver::wrap(SeaOrmDriver::default());
//! let conn = driver
//!     .connect("mysql://a.example:3306/orders", &ConnectProperties::new().with_user("app"))
//!     .await?;
//!
//! let stmt = conn.prepare_statement("select 1").await?;
//! stmt.execute_query().await?;
//! assert_eq!(stmt.trace_endpoint().unwrap().database_name(), "orders");
//!
//! conn.close().await?;
//! assert!(conn.trace_endpoint().is_none());
//! ```
//!
//! ## Load-balanced URLs
//!
//! A URL naming several hosts (`jdbc:mysql:loadbalance://db1,db2/orders`)
//! produces a [`LoadBalancedConnection`] that forwards to one concrete
//! connection at a time. The endpoint lives on the concrete connection; reach
//! it with [`proxy::resolve`] or [`proxy::resolved_endpoint`].
//!
//! ## Span Attributes
//!
//! Statement execution runs inside a `db.execute` span carrying the statement's
//! endpoint:
//!
//! | Attribute | Description |
//! |-----------|-------------|
//! | `db.system` | "mysql", "postgresql" or "sqlite" |
//! | `db.name` | Database name from the URL |
//! | `server.address` | Host (first host for load-balanced targets) |
//! | `server.port` | Port |
//! | `db.multi_host` | Whether the target is load-balanced |
//! | `db.operation` | "query" or "update" |

pub mod binder;
mod config;
mod connection;
mod driver;
mod endpoint;
mod error;
pub mod lifecycle;
mod load_balancer;
mod orm;
pub mod propagate;
pub mod proxy;
mod statement;
mod trace_value;
pub mod url;

pub use config::{BalanceKind, TracingConfig};
pub use connection::{Connection, TracedConnection};
pub use driver::{
    ConnectProperties, ConnectTarget, RawConnection, RawDriver, RawStatement, ResultSummary,
    TracingDriver,
};
pub use endpoint::{DbSystem, EndpointInfo, HostAddr};
pub use error::{DriverError, EndpointParseError, ResolveError};
pub use lifecycle::LifecycleState;
pub use load_balancer::{BalanceStrategy, LoadBalancedConnection, Random, RoundRobin};
pub use orm::{SeaOrmConnection, SeaOrmDriver, SeaOrmStatement, TracingExt};
pub use statement::{
    Concurrency, GeneratedKeys, Holdability, ResultSetType, StatementRequest, StatementShape,
    TracedStatement,
};
pub use trace_value::{HasTraceValue, TraceSlot, TraceValue};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ConnectProperties, Connection, EndpointInfo, HasTraceValue, SeaOrmDriver,
        TracedConnection, TracingConfig, TracingDriver, TracingExt,
    };
}
