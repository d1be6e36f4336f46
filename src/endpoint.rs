//! Endpoint descriptors attached to traced resources.

use std::fmt;

use tracing::Span;

/// Database systems recognised in connection URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbSystem {
    MySql,
    Postgres,
    Sqlite,
}

impl DbSystem {
    /// Returns the OpenTelemetry `db.system` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            DbSystem::MySql => "mysql",
            DbSystem::Postgres => "postgresql",
            DbSystem::Sqlite => "sqlite",
        }
    }

    /// Port used when the URL does not name one.
    pub fn default_port(&self) -> u16 {
        match self {
            DbSystem::MySql => 3306,
            DbSystem::Postgres => 5432,
            DbSystem::Sqlite => 0,
        }
    }
}

impl fmt::Display for DbSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAddr {
    pub host: String,
    pub port: u16,
}

impl HostAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Immutable description of the database a connection talks to.
///
/// Built once per successful connect and shared by reference between the
/// connection and every statement created from it. Two descriptors are equal
/// when all their fields are equal.
///
/// For a load-balanced target `host` and `port` name the first listed host and
/// [`hosts`](Self::hosts) lists all of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointInfo {
    system: DbSystem,
    host: String,
    port: u16,
    database_name: String,
    multi_host: bool,
    hosts: Vec<HostAddr>,
    url: String,
}

impl EndpointInfo {
    /// Descriptor for a single server.
    pub fn single(
        system: DbSystem,
        host: impl Into<String>,
        port: u16,
        database_name: impl Into<String>,
    ) -> Self {
        let addr = HostAddr::new(host, port);
        let database_name = database_name.into();
        let url = normalized_url(system, std::slice::from_ref(&addr), &database_name);
        Self {
            system,
            host: addr.host.clone(),
            port: addr.port,
            database_name,
            multi_host: false,
            hosts: vec![addr],
            url,
        }
    }

    /// Descriptor for a load-balanced set of servers.
    ///
    /// Returns `None` when `hosts` is empty.
    pub fn multi_host(
        system: DbSystem,
        hosts: Vec<HostAddr>,
        database_name: impl Into<String>,
    ) -> Option<Self> {
        let first = hosts.first()?.clone();
        let database_name = database_name.into();
        let url = normalized_url(system, &hosts, &database_name);
        Some(Self {
            system,
            host: first.host,
            port: first.port,
            database_name,
            multi_host: true,
            hosts,
            url,
        })
    }

    /// Copy of this descriptor naming a different database.
    pub fn with_database_name(self, database_name: impl Into<String>) -> Self {
        let database_name = database_name.into();
        let url = normalized_url(self.system, &self.hosts, &database_name);
        Self {
            database_name,
            url,
            ..self
        }
    }

    pub fn system(&self) -> DbSystem {
        self.system
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// True when this describes a load-balanced set rather than one server.
    pub fn is_multi_host(&self) -> bool {
        self.multi_host
    }

    pub fn hosts(&self) -> &[HostAddr] {
        &self.hosts
    }

    /// Credential-free URL, e.g. `mysql://a.example:3306/orders`.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Record the endpoint attributes on a span.
    ///
    /// Only fields the span declared are written; the rest are ignored by
    /// `tracing`.
    pub fn record(&self, span: &Span) {
        span.record("db.system", self.system.as_str());
        span.record("db.name", self.database_name.as_str());
        span.record("server.address", self.host.as_str());
        span.record("server.port", self.port as i64);
        span.record("db.multi_host", self.multi_host);
    }
}

impl fmt::Display for EndpointInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

fn normalized_url(system: DbSystem, hosts: &[HostAddr], database_name: &str) -> String {
    if system == DbSystem::Sqlite {
        return format!("sqlite:{database_name}");
    }
    let hosts = hosts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("{}://{}/{}", system.as_str(), hosts, database_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_endpoint() {
        let info = EndpointInfo::single(DbSystem::MySql, "a.example", 3306, "orders");
        assert_eq!(info.host(), "a.example");
        assert_eq!(info.port(), 3306);
        assert_eq!(info.database_name(), "orders");
        assert!(!info.is_multi_host());
        assert_eq!(info.url(), "mysql://a.example:3306/orders");
    }

    #[test]
    fn test_multi_host_uses_first_host() {
        let info = EndpointInfo::multi_host(
            DbSystem::MySql,
            vec![HostAddr::new("db1", 3306), HostAddr::new("db2", 3307)],
            "orders",
        )
        .unwrap();
        assert!(info.is_multi_host());
        assert_eq!(info.host(), "db1");
        assert_eq!(info.port(), 3306);
        assert_eq!(info.hosts().len(), 2);
        assert_eq!(info.url(), "mysql://db1:3306,db2:3307/orders");
    }

    #[test]
    fn test_multi_host_requires_hosts() {
        assert!(EndpointInfo::multi_host(DbSystem::Postgres, Vec::new(), "x").is_none());
    }

    #[test]
    fn test_value_equality() {
        let a = EndpointInfo::single(DbSystem::Postgres, "pg", 5432, "app");
        let b = EndpointInfo::single(DbSystem::Postgres, "pg", 5432, "app");
        assert_eq!(a, b);
        assert_ne!(a, EndpointInfo::single(DbSystem::Postgres, "pg", 5433, "app"));
    }

    #[test]
    fn test_ipv6_host_display() {
        assert_eq!(HostAddr::new("::1", 5432).to_string(), "[::1]:5432");
    }
}
