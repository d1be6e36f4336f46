//! SeaORM as the underlying database client.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbBackend,
    Statement, TransactionTrait, Value,
};

use crate::binder;
use crate::config::TracingConfig;
use crate::connection::TracedConnection;
use crate::driver::{ConnectTarget, RawConnection, RawDriver, RawStatement, ResultSummary};
use crate::endpoint::EndpointInfo;
use crate::error::DriverError;
use crate::statement::StatementRequest;

/// Opens SeaORM connections for [`TracingDriver`](crate::TracingDriver).
#[derive(Debug, Clone)]
pub struct SeaOrmDriver {
    max_connections: Option<u32>,
    sqlx_logging: bool,
}

impl Default for SeaOrmDriver {
    fn default() -> Self {
        Self {
            max_connections: None,
            sqlx_logging: false,
        }
    }
}

impl SeaOrmDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the pool behind each physical connection.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Let sqlx log every statement itself.
    pub fn with_sqlx_logging(mut self, enabled: bool) -> Self {
        self.sqlx_logging = enabled;
        self
    }
}

#[async_trait]
impl RawDriver for SeaOrmDriver {
    async fn open(&self, target: &ConnectTarget) -> Result<Box<dyn RawConnection>, DriverError> {
        let mut options = ConnectOptions::new(target.url());
        options.sqlx_logging(self.sqlx_logging);
        if let Some(max) = self.max_connections {
            options.max_connections(max);
        }

        let db = Database::connect(options)
            .await
            .map_err(|e| DriverError::Connect {
                target: target.addr.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(SeaOrmConnection::new(db)))
    }
}

/// A SeaORM connection driven through the raw connection API.
///
/// Turning auto-commit off opens a [`DatabaseTransaction`] that statements run
/// inside until it is committed or rolled back.
#[derive(Debug, Clone)]
pub struct SeaOrmConnection {
    shared: Arc<Shared>,
}

struct Shared {
    backend: DbBackend,
    db: Mutex<Option<Arc<DatabaseConnection>>>,
    txn: Mutex<Option<Arc<DatabaseTransaction>>>,
    auto_commit: AtomicBool,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("backend", &self.backend)
            .field("open", &self.db().is_some())
            .field("in_transaction", &self.txn().is_some())
            .field("auto_commit", &self.auto_commit.load(Ordering::Relaxed))
            .finish()
    }
}

impl SeaOrmConnection {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend: db.get_database_backend(),
                db: Mutex::new(Some(Arc::new(db))),
                txn: Mutex::new(None),
                auto_commit: AtomicBool::new(true),
            }),
        }
    }

    pub fn backend(&self) -> DbBackend {
        self.shared.backend
    }
}

impl From<DatabaseConnection> for SeaOrmConnection {
    fn from(db: DatabaseConnection) -> Self {
        Self::new(db)
    }
}

impl Shared {
    fn db(&self) -> MutexGuard<'_, Option<Arc<DatabaseConnection>>> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn txn(&self) -> MutexGuard<'_, Option<Arc<DatabaseTransaction>>> {
        self.txn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connection(&self) -> Result<Arc<DatabaseConnection>, DriverError> {
        self.db().clone().ok_or(DriverError::Closed("connection"))
    }

    fn statement(&self, sql: &str, params: &[Value]) -> Statement {
        Statement::from_sql_and_values(self.backend, sql, params.iter().cloned())
    }

    async fn query(&self, stmt: Statement) -> Result<u64, DriverError> {
        let txn = self.txn().clone();
        let rows = match txn {
            Some(txn) => txn.query_all(stmt).await?,
            None => self.connection()?.query_all(stmt).await?,
        };
        Ok(rows.len() as u64)
    }

    async fn execute(&self, stmt: Statement) -> Result<u64, DriverError> {
        let txn = self.txn().clone();
        let result = match txn {
            Some(txn) => txn.execute(stmt).await?,
            None => self.connection()?.execute(stmt).await?,
        };
        Ok(result.rows_affected())
    }

    async fn begin(&self) -> Result<(), DriverError> {
        if self.txn().is_some() {
            return Ok(());
        }
        let txn = self.connection()?.begin().await?;
        *self.txn() = Some(Arc::new(txn));
        Ok(())
    }

    /// Commit or roll back the open transaction, if any.
    async fn finish(&self, commit: bool) -> Result<(), DriverError> {
        let txn = self.txn().take();
        let Some(txn) = txn else {
            return Ok(());
        };
        let txn = match Arc::try_unwrap(txn) {
            Ok(txn) => txn,
            Err(txn) => {
                *self.txn() = Some(txn);
                return Err(DriverError::Busy("transaction has statements in flight"));
            }
        };

        if commit {
            txn.commit().await?;
        } else {
            txn.rollback().await?;
        }
        Ok(())
    }

    /// Finish the current transaction and, in manual-commit mode, start the next.
    async fn end_transaction(&self, commit: bool) -> Result<(), DriverError> {
        self.finish(commit).await?;
        if !self.auto_commit.load(Ordering::Acquire) {
            self.begin().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RawConnection for SeaOrmConnection {
    async fn create_statement(
        &self,
        _request: &StatementRequest,
    ) -> Result<Box<dyn RawStatement>, DriverError> {
        self.shared.connection()?;
        Ok(Box::new(SeaOrmStatement {
            shared: self.shared.clone(),
        }))
    }

    async fn set_auto_commit(&self, enabled: bool) -> Result<(), DriverError> {
        let was = self.shared.auto_commit.load(Ordering::Acquire);
        match (was, enabled) {
            (true, false) => self.shared.begin().await?,
            (false, true) => self.shared.finish(true).await?,
            _ => {}
        }
        self.shared.auto_commit.store(enabled, Ordering::Release);
        Ok(())
    }

    async fn commit(&self) -> Result<(), DriverError> {
        self.shared.end_transaction(true).await
    }

    async fn rollback(&self) -> Result<(), DriverError> {
        self.shared.end_transaction(false).await
    }

    async fn close(&self) -> Result<(), DriverError> {
        let rollback = self.shared.finish(false).await;
        let db = self.shared.db().take();
        let Some(db) = db else {
            return Err(DriverError::Closed("connection"));
        };
        // A query still holding the handle drops the pool when it finishes.
        if let Ok(db) = Arc::try_unwrap(db) {
            db.close().await?;
        }
        rollback
    }
}

/// Statement handle running SQL through its parent [`SeaOrmConnection`].
#[derive(Debug)]
pub struct SeaOrmStatement {
    shared: Arc<Shared>,
}

#[async_trait]
impl RawStatement for SeaOrmStatement {
    async fn execute_query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<ResultSummary, DriverError> {
        let stmt = self.shared.statement(sql, params);
        let rows = self.shared.query(stmt).await?;
        Ok(ResultSummary { rows })
    }

    async fn execute_update(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<ResultSummary, DriverError> {
        let stmt = self.shared.statement(sql, params);
        let rows = self.shared.execute(stmt).await?;
        Ok(ResultSummary { rows })
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Extension trait for wrapping an existing SeaORM connection.
pub trait TracingExt {
    /// Wrap this connection and bind `endpoint` to it.
    fn with_endpoint(self, endpoint: EndpointInfo) -> TracedConnection;

    /// Wrap this connection with custom configuration and bind `endpoint`.
    fn with_endpoint_config(self, endpoint: EndpointInfo, config: TracingConfig)
        -> TracedConnection;
}

impl TracingExt for DatabaseConnection {
    fn with_endpoint(self, endpoint: EndpointInfo) -> TracedConnection {
        self.with_endpoint_config(endpoint, TracingConfig::default())
    }

    fn with_endpoint_config(
        self,
        endpoint: EndpointInfo,
        config: TracingConfig,
    ) -> TracedConnection {
        let conn = TracedConnection::new(Box::new(SeaOrmConnection::new(self)), Arc::new(config));
        binder::bind(&conn, Arc::new(endpoint));
        conn
    }
}
