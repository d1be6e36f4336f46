//! Configuration for endpoint tracing.

/// Target-selection policy for load-balanced connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalanceKind {
    /// Rotate through hosts in URL order.
    #[default]
    RoundRobin,
    /// Pick a host at random.
    Random,
}

/// Configuration options for endpoint tracing.
///
/// # Example
///
/// ```rust
/// use sea_orm_endpoint_tracing::TracingConfig;
///
/// let config = TracingConfig::default()
///     .with_lifecycle_logging(true)
///     .with_database_name("main");
/// ```
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Whether connections and statements carry an endpoint slot at all.
    /// When `false` every resource is built without the capability and all
    /// tracing operations are no-ops.
    /// Default: `true`
    pub enabled: bool,

    /// Emit `debug` events when endpoints are bound, propagated and cleared.
    /// Default: `false`
    pub log_lifecycle: bool,

    /// Database name used when the connection URL does not carry one.
    /// Default: `None`
    pub database_name: Option<String>,

    /// How load-balanced connections choose their next target.
    /// Default: [`BalanceKind::RoundRobin`]
    pub balance: BalanceKind,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_lifecycle: false,
            database_name: None,
            balance: BalanceKind::RoundRobin,
        }
    }
}

impl TracingConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable endpoint tracing entirely.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Enable or disable lifecycle events.
    pub fn with_lifecycle_logging(mut self, enabled: bool) -> Self {
        self.log_lifecycle = enabled;
        self
    }

    /// Set the fallback database name.
    ///
    /// Useful for URLs such as `mysql://host:3306` that select no schema.
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    /// Set the load-balancing policy.
    pub fn with_balance(mut self, balance: BalanceKind) -> Self {
        self.balance = balance;
        self
    }

    /// Create a development-friendly configuration with lifecycle events on.
    pub fn development() -> Self {
        Self {
            log_lifecycle: true,
            ..Self::default()
        }
    }

    /// Create a production configuration with lifecycle events off.
    pub fn production() -> Self {
        Self {
            log_lifecycle: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::default()
            .with_lifecycle_logging(true)
            .with_database_name("test_db")
            .with_balance(BalanceKind::Random);

        assert!(config.enabled);
        assert!(config.log_lifecycle);
        assert_eq!(config.database_name, Some("test_db".to_string()));
        assert_eq!(config.balance, BalanceKind::Random);
    }

    #[test]
    fn test_development_config() {
        assert!(TracingConfig::development().log_lifecycle);
    }

    #[test]
    fn test_production_config() {
        let config = TracingConfig::production();
        assert!(config.enabled);
        assert!(!config.log_lifecycle);
    }

    #[test]
    fn test_disabled_config() {
        assert!(!TracingConfig::new().with_enabled(false).enabled);
    }
}
