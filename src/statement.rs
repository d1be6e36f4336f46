//! Traced statements and the statement-creation request model.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use sea_orm::Value;
use tracing::{field, Instrument, Span};

use crate::config::TracingConfig;
use crate::driver::{RawStatement, ResultSummary};
use crate::error::DriverError;
use crate::trace_value::{HasTraceValue, TraceSlot, TraceValue};

/// Whether the driver should make auto-generated keys retrievable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedKeys {
    Return,
    None,
}

/// Scrollability of the result sets a statement produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSetType {
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
}

/// Whether result sets may be updated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    ReadOnly,
    Updatable,
}

/// What happens to open cursors on commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holdability {
    HoldOverCommit,
    CloseAtCommit,
}

/// The argument shape a statement was created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementShape {
    Plain,
    GeneratedKeys(GeneratedKeys),
    ColumnNames(Vec<String>),
    ColumnIndexes(Vec<u32>),
    ResultSet {
        result_set: ResultSetType,
        concurrency: Concurrency,
    },
    Holdable {
        result_set: ResultSetType,
        concurrency: Concurrency,
        holdability: Holdability,
    },
}

/// A request to create a statement.
///
/// Every creation overload on [`Connection`](crate::Connection) builds one of
/// these and hands it to the same canonical creation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRequest {
    /// SQL to prepare; `None` for a plain statement that receives SQL at
    /// execution time.
    pub sql: Option<String>,
    pub shape: StatementShape,
}

impl StatementRequest {
    /// A plain, unprepared statement.
    pub fn statement() -> Self {
        Self {
            sql: None,
            shape: StatementShape::Plain,
        }
    }

    /// A prepared statement for `sql`.
    pub fn prepared(sql: impl Into<String>) -> Self {
        Self {
            sql: Some(sql.into()),
            shape: StatementShape::Plain,
        }
    }

    pub fn with_shape(mut self, shape: StatementShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn is_prepared(&self) -> bool {
        self.sql.is_some()
    }
}

/// A statement created from a traced connection.
///
/// Carries its own copy of the connection's endpoint, taken at creation time,
/// so consumers can read endpoint context without reaching back to the
/// connection. Closing the connection does not clear it.
#[derive(Debug)]
pub struct TracedStatement {
    raw: Box<dyn RawStatement>,
    request: StatementRequest,
    slot: Option<TraceSlot>,
    params: Mutex<Vec<Option<Value>>>,
    closed: AtomicBool,
}

impl TracedStatement {
    pub(crate) fn new(
        raw: Box<dyn RawStatement>,
        request: StatementRequest,
        config: &TracingConfig,
    ) -> Self {
        Self {
            raw,
            request,
            slot: config.enabled.then(TraceSlot::new),
            params: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// The prepared SQL, if any.
    pub fn sql(&self) -> Option<&str> {
        self.request.sql.as_deref()
    }

    pub fn shape(&self) -> &StatementShape {
        &self.request.shape
    }

    pub fn is_prepared(&self) -> bool {
        self.request.is_prepared()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Bind a positional parameter. Indexes start at 1.
    pub fn set_param(&self, index: usize, value: impl Into<Value>) -> Result<(), DriverError> {
        if !self.is_prepared() {
            return Err(DriverError::Unsupported("parameters on a plain statement"));
        }
        if index == 0 {
            return Err(DriverError::Other("parameter indexes start at 1".into()));
        }
        let mut params = self.params();
        if params.len() < index {
            params.resize(index, None);
        }
        params[index - 1] = Some(value.into());
        Ok(())
    }

    pub fn clear_params(&self) {
        self.params().clear();
    }

    /// Run `sql` on a plain statement and return the row count.
    pub async fn query(&self, sql: &str) -> Result<ResultSummary, DriverError> {
        if self.is_prepared() {
            return Err(DriverError::Unsupported("sql text on a prepared statement"));
        }
        self.ensure_open()?;
        let span = self.span("query");
        self.raw.execute_query(sql, &[]).instrument(span).await
    }

    /// Run `sql` as an update on a plain statement.
    pub async fn update(&self, sql: &str) -> Result<ResultSummary, DriverError> {
        if self.is_prepared() {
            return Err(DriverError::Unsupported("sql text on a prepared statement"));
        }
        self.ensure_open()?;
        let span = self.span("update");
        self.raw.execute_update(sql, &[]).instrument(span).await
    }

    /// Run the prepared query with the bound parameters.
    pub async fn execute_query(&self) -> Result<ResultSummary, DriverError> {
        let (sql, params) = self.prepared_call()?;
        let span = self.span("query");
        self.raw.execute_query(sql, &params).instrument(span).await
    }

    /// Run the prepared update with the bound parameters.
    pub async fn execute_update(&self) -> Result<ResultSummary, DriverError> {
        let (sql, params) = self.prepared_call()?;
        let span = self.span("update");
        self.raw.execute_update(sql, &params).instrument(span).await
    }

    /// Close the statement. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), DriverError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.raw.close().await
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.is_closed() {
            return Err(DriverError::Closed("statement"));
        }
        Ok(())
    }

    fn prepared_call(&self) -> Result<(&str, Vec<Value>), DriverError> {
        let sql = self
            .request
            .sql
            .as_deref()
            .ok_or(DriverError::Unsupported("execute without sql on a plain statement"))?;
        self.ensure_open()?;

        let params = self
            .params()
            .iter()
            .enumerate()
            .map(|(i, value)| {
                value
                    .clone()
                    .ok_or_else(|| DriverError::Other(format!("parameter {} is not set", i + 1)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((sql, params))
    }

    fn params(&self) -> MutexGuard<'_, Vec<Option<Value>>> {
        self.params.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Span for one execution, carrying this statement's endpoint.
    fn span(&self, operation: &'static str) -> Span {
        let span = tracing::info_span!(
            "db.execute",
            otel.name = operation,
            db.operation = operation,
            db.prepared = self.is_prepared(),
            db.system = field::Empty,
            db.name = field::Empty,
            db.multi_host = field::Empty,
            server.address = field::Empty,
            server.port = field::Empty,
        );

        if let Some(endpoint) = self.trace_endpoint() {
            endpoint.record(&span);
        }

        span
    }
}

impl HasTraceValue for TracedStatement {
    fn trace_value(&self) -> Option<&dyn TraceValue> {
        self.slot.as_ref().map(|slot| slot as &dyn TraceValue)
    }
}
