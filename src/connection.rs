//! Traced database connections.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::TracingConfig;
use crate::driver::RawConnection;
use crate::error::DriverError;
use crate::lifecycle::{self, LifecycleCell, LifecycleState};
use crate::propagate::propagate;
use crate::proxy::Handle;
use crate::statement::{
    Concurrency, GeneratedKeys, Holdability, ResultSetType, StatementRequest, StatementShape,
    TracedStatement,
};
use crate::trace_value::{HasTraceValue, TraceSlot, TraceValue};

/// The application-facing connection API.
///
/// Implemented by [`TracedConnection`] and by the load-balancing facade. All
/// statement-creation overloads funnel into [`open_statement`](Self::open_statement),
/// which is the single place endpoint propagation happens.
#[async_trait]
pub trait Connection: HasTraceValue + Send + Sync + fmt::Debug {
    /// Canonical statement creation.
    async fn open_statement(&self, request: StatementRequest)
        -> Result<TracedStatement, DriverError>;

    /// Create a plain statement that takes SQL at execution time.
    async fn create_statement(&self) -> Result<TracedStatement, DriverError> {
        self.open_statement(StatementRequest::statement()).await
    }

    /// Prepare `sql`.
    async fn prepare_statement(&self, sql: &str) -> Result<TracedStatement, DriverError> {
        self.open_statement(StatementRequest::prepared(sql)).await
    }

    /// Prepare `sql`, choosing whether generated keys are returned.
    async fn prepare_statement_with_keys(
        &self,
        sql: &str,
        keys: GeneratedKeys,
    ) -> Result<TracedStatement, DriverError> {
        self.open_statement(
            StatementRequest::prepared(sql).with_shape(StatementShape::GeneratedKeys(keys)),
        )
        .await
    }

    /// Prepare `sql`, returning generated values for the named columns.
    async fn prepare_statement_with_column_names(
        &self,
        sql: &str,
        columns: &[&str],
    ) -> Result<TracedStatement, DriverError> {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.open_statement(
            StatementRequest::prepared(sql).with_shape(StatementShape::ColumnNames(columns)),
        )
        .await
    }

    /// Prepare `sql`, returning generated values for the given column indexes.
    async fn prepare_statement_with_column_indexes(
        &self,
        sql: &str,
        indexes: &[u32],
    ) -> Result<TracedStatement, DriverError> {
        self.open_statement(
            StatementRequest::prepared(sql)
                .with_shape(StatementShape::ColumnIndexes(indexes.to_vec())),
        )
        .await
    }

    /// Prepare `sql` with a result-set type and concurrency mode.
    async fn prepare_statement_with_result_set(
        &self,
        sql: &str,
        result_set: ResultSetType,
        concurrency: Concurrency,
    ) -> Result<TracedStatement, DriverError> {
        self.open_statement(StatementRequest::prepared(sql).with_shape(
            StatementShape::ResultSet {
                result_set,
                concurrency,
            },
        ))
        .await
    }

    /// Prepare `sql` with result-set type, concurrency mode and holdability.
    async fn prepare_statement_with_holdability(
        &self,
        sql: &str,
        result_set: ResultSetType,
        concurrency: Concurrency,
        holdability: Holdability,
    ) -> Result<TracedStatement, DriverError> {
        self.open_statement(StatementRequest::prepared(sql).with_shape(
            StatementShape::Holdable {
                result_set,
                concurrency,
                holdability,
            },
        ))
        .await
    }

    async fn set_auto_commit(&self, enabled: bool) -> Result<(), DriverError>;

    fn auto_commit(&self) -> bool;

    async fn commit(&self) -> Result<(), DriverError>;

    async fn rollback(&self) -> Result<(), DriverError>;

    /// Close the connection, clearing its endpoint even if the close fails.
    async fn close(&self) -> Result<(), DriverError>;

    fn is_closed(&self) -> bool;

    /// Whether this handle is concrete or a forwarding facade.
    fn handle(&self) -> Handle<'_>;
}

/// A physical connection carrying an endpoint slot.
///
/// Cloning is cheap and yields another handle to the same connection.
///
/// # Example
///
/// ```rust,ignore
/// use sea_orm_endpoint_tracing::prelude::*;
///
/// let conn = driver.connect("mysql://a.example:3306/orders", &props).await?;
/// let stmt = conn.prepare_statement("select 1").await?;
///
/// // The statement carries the connection's endpoint
/// assert_eq!(stmt.trace_endpoint(), conn.trace_endpoint());
/// ```
#[derive(Debug, Clone)]
pub struct TracedConnection {
    inner: Arc<ConnectionInner>,
}

#[derive(Debug)]
struct ConnectionInner {
    raw: Box<dyn RawConnection>,
    slot: Option<TraceSlot>,
    lifecycle: LifecycleCell,
    auto_commit: AtomicBool,
    closed: AtomicBool,
    config: Arc<TracingConfig>,
}

impl TracedConnection {
    /// Wrap a physical connection. The endpoint slot starts empty.
    pub fn new(raw: Box<dyn RawConnection>, config: Arc<TracingConfig>) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                raw,
                slot: config.enabled.then(TraceSlot::new),
                lifecycle: LifecycleCell::default(),
                auto_commit: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                config,
            }),
        }
    }

    /// Wrap a physical connection with default configuration.
    pub fn wrap(raw: impl RawConnection + 'static) -> Self {
        Self::new(Box::new(raw), Arc::new(TracingConfig::default()))
    }

    /// Get the tracing configuration.
    pub fn config(&self) -> &TracingConfig {
        &self.inner.config
    }

    /// Get a reference to the underlying connection.
    pub fn raw(&self) -> &dyn RawConnection {
        &*self.inner.raw
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.inner.lifecycle.get()
    }

    /// True when both handles refer to the same physical connection.
    pub fn same_connection(&self, other: &TracedConnection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn lifecycle_cell(&self) -> &LifecycleCell {
        &self.inner.lifecycle
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.is_closed() {
            return Err(DriverError::Closed("connection"));
        }
        Ok(())
    }
}

impl HasTraceValue for TracedConnection {
    fn trace_value(&self) -> Option<&dyn TraceValue> {
        self.inner.slot.as_ref().map(|slot| slot as &dyn TraceValue)
    }
}

#[async_trait]
impl Connection for TracedConnection {
    async fn open_statement(
        &self,
        request: StatementRequest,
    ) -> Result<TracedStatement, DriverError> {
        self.ensure_open()?;

        let raw = self.inner.raw.create_statement(&request).await?;
        let statement = TracedStatement::new(raw, request, &self.inner.config);
        let endpoint = propagate(self, &statement);

        if self.inner.config.log_lifecycle {
            tracing::debug!(
                shape = ?statement.shape(),
                endpoint = endpoint.as_deref().map(|e| e.url()).unwrap_or("none"),
                "Endpoint propagated to statement"
            );
        }

        Ok(statement)
    }

    async fn set_auto_commit(&self, enabled: bool) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.inner.raw.set_auto_commit(enabled).await?;
        self.inner.auto_commit.store(enabled, Ordering::Release);
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.inner.auto_commit.load(Ordering::Acquire)
    }

    async fn commit(&self) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.inner.raw.commit().await
    }

    async fn rollback(&self) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.inner.raw.rollback().await
    }

    async fn close(&self) -> Result<(), DriverError> {
        let result = if self.inner.closed.swap(true, Ordering::AcqRel) {
            Ok(())
        } else {
            self.inner.raw.close().await
        };

        lifecycle::on_close(self);

        if let Err(error) = &result {
            tracing::warn!(%error, "Connection close reported an error");
        }
        result
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn handle(&self) -> Handle<'_> {
        Handle::Concrete(self)
    }
}
