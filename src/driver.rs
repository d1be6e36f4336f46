//! Driver abstraction and the tracing entry point.
//!
//! The `Raw*` traits describe the database client being instrumented. They know
//! nothing about endpoints; [`TracingDriver`] wraps what they return in traced
//! resources and binds endpoint metadata at connect time.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::Value;
use urlencoding::encode;

use crate::binder;
use crate::config::TracingConfig;
use crate::connection::{Connection, TracedConnection};
use crate::endpoint::{DbSystem, EndpointInfo, HostAddr};
use crate::error::DriverError;
use crate::load_balancer::LoadBalancedConnection;
use crate::statement::StatementRequest;
use crate::url::parse_url;

/// Outcome of executing a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultSummary {
    /// Rows returned by a query or affected by an update.
    pub rows: u64,
}

/// Credentials and driver options supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectProperties {
    pub user: Option<String>,
    pub password: Option<String>,
    pub options: BTreeMap<String, String>,
}

impl ConnectProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Fill anything not set explicitly from values found in the URL.
    fn merge(
        mut self,
        user: Option<String>,
        password: Option<String>,
        options: BTreeMap<String, String>,
    ) -> Self {
        self.user = self.user.or(user);
        self.password = self.password.or(password);
        for (key, value) in options {
            self.options.entry(key).or_insert(value);
        }
        self
    }
}

/// One physical server to open a connection to.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub system: DbSystem,
    pub addr: HostAddr,
    pub database_name: String,
    pub properties: ConnectProperties,
}

impl ConnectTarget {
    /// Driver URL for this single host, credentials included.
    pub fn url(&self) -> String {
        let query = self
            .properties
            .options
            .iter()
            .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        let query = if query.is_empty() {
            query
        } else {
            format!("?{query}")
        };

        if self.system == DbSystem::Sqlite {
            return format!("sqlite:{}{}", self.database_name, query);
        }

        let scheme = match self.system {
            DbSystem::Postgres => "postgres",
            _ => "mysql",
        };
        let credentials = match (&self.properties.user, &self.properties.password) {
            (Some(user), Some(password)) => format!("{}:{}@", encode(user), encode(password)),
            (Some(user), None) => format!("{}@", encode(user)),
            _ => String::new(),
        };
        format!(
            "{}://{}{}/{}{}",
            scheme, credentials, self.addr, self.database_name, query
        )
    }
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("system", &self.system)
            .field("addr", &self.addr)
            .field("database_name", &self.database_name)
            .field("user", &self.properties.user)
            .finish_non_exhaustive()
    }
}

/// Opens physical connections.
#[async_trait]
pub trait RawDriver: Send + Sync + fmt::Debug {
    async fn open(&self, target: &ConnectTarget) -> Result<Box<dyn RawConnection>, DriverError>;
}

/// A physical connection of the underlying client.
#[async_trait]
pub trait RawConnection: Send + Sync + fmt::Debug {
    async fn create_statement(
        &self,
        request: &StatementRequest,
    ) -> Result<Box<dyn RawStatement>, DriverError>;

    async fn set_auto_commit(&self, enabled: bool) -> Result<(), DriverError>;

    async fn commit(&self) -> Result<(), DriverError>;

    async fn rollback(&self) -> Result<(), DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

/// A statement of the underlying client.
#[async_trait]
pub trait RawStatement: Send + Sync + fmt::Debug {
    async fn execute_query(&self, sql: &str, params: &[Value])
        -> Result<ResultSummary, DriverError>;

    async fn execute_update(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<ResultSummary, DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

/// Connects through a [`RawDriver`] and hands back traced connections.
///
/// # Example
///
/// ```rust,ignore
/// use sea_orm_endpoint_tracing::{ConnectProperties, SeaOrmDriver, TracingDriver};
///
/// let driver = TracingDriver::wrap(SeaOrmDriver::default());
/// let conn = driver
///     .connect("mysql://a.example:3306/orders", &ConnectProperties::new().with_user("app"))
///     .await?;
///
/// let endpoint = conn.trace_endpoint();
/// ```
#[derive(Debug, Clone)]
pub struct TracingDriver {
    raw: Arc<dyn RawDriver>,
    config: Arc<TracingConfig>,
}

impl TracingDriver {
    /// Create a tracing driver with the given configuration.
    pub fn new(raw: impl RawDriver + 'static, config: TracingConfig) -> Self {
        Self {
            raw: Arc::new(raw),
            config: Arc::new(config),
        }
    }

    /// Create a tracing driver with default configuration.
    pub fn wrap(raw: impl RawDriver + 'static) -> Self {
        Self::new(raw, TracingConfig::default())
    }

    pub fn config(&self) -> &TracingConfig {
        &self.config
    }

    /// Open a connection for `url`.
    ///
    /// A multi-host URL yields a [`LoadBalancedConnection`]; anything else a
    /// [`TracedConnection`]. The endpoint is bound before this returns. When the
    /// connect itself fails nothing is bound and the error is returned as is.
    pub async fn connect(
        &self,
        url: &str,
        properties: &ConnectProperties,
    ) -> Result<Box<dyn Connection>, DriverError> {
        let parsed = parse_url(url)?;
        let endpoint = Arc::new(self.with_fallback_name(parsed.endpoint));
        let properties = properties
            .clone()
            .merge(parsed.user, parsed.password, parsed.options);

        if endpoint.is_multi_host() {
            let facade = LoadBalancedConnection::connect(
                self.raw.clone(),
                endpoint,
                properties,
                self.config.clone(),
            )
            .await?;
            return Ok(Box::new(facade));
        }

        let addr = HostAddr::new(endpoint.host(), endpoint.port());
        let conn = open_traced(&*self.raw, &addr, &endpoint, &properties, &self.config).await?;
        Ok(Box::new(conn))
    }

    fn with_fallback_name(&self, endpoint: EndpointInfo) -> EndpointInfo {
        match &self.config.database_name {
            Some(name) if endpoint.database_name().is_empty() => {
                endpoint.with_database_name(name.clone())
            }
            _ => endpoint,
        }
    }
}

/// Open one physical connection and bind `endpoint` to it.
pub(crate) async fn open_traced(
    raw: &dyn RawDriver,
    addr: &HostAddr,
    endpoint: &Arc<EndpointInfo>,
    properties: &ConnectProperties,
    config: &Arc<TracingConfig>,
) -> Result<TracedConnection, DriverError> {
    let target = ConnectTarget {
        system: endpoint.system(),
        addr: addr.clone(),
        database_name: endpoint.database_name().to_string(),
        properties: properties.clone(),
    };

    let conn = TracedConnection::new(raw.open(&target).await?, config.clone());
    binder::bind(&conn, endpoint.clone());
    Ok(conn)
}
