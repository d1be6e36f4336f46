//! Load-balanced connections over a multi-host URL.
//!
//! # Data Flow
//! ```text
//! connect(multi-host url)
//!     → strategy picks a host → open + bind concrete connection
//!     → facade forwards every call to the current concrete connection
//!     → commit / rollback → rebalance (pick next host, open on demand)
//!     → close → close every live concrete connection
//! ```
//!
//! Every concrete connection is bound with the same multi-host endpoint.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use async_trait::async_trait;

use crate::config::{BalanceKind, TracingConfig};
use crate::connection::{Connection, TracedConnection};
use crate::driver::{open_traced, ConnectProperties, RawDriver};
use crate::endpoint::EndpointInfo;
use crate::error::DriverError;
use crate::proxy::{Facade, Handle};
use crate::statement::{StatementRequest, TracedStatement};
use crate::trace_value::{HasTraceValue, TraceValue};

/// Chooses where a load-balanced connection goes next.
pub trait BalanceStrategy: Send + Sync + fmt::Debug {
    /// Index to start probing from among `len` hosts.
    fn next_index(&self, len: usize) -> Option<usize>;
}

/// Round-robin selector.
/// Stores an internal counter to rotate through hosts.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BalanceStrategy for RoundRobin {
    fn next_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.counter.fetch_add(1, Ordering::Relaxed) % len)
    }
}

/// Uniformly random selector.
#[derive(Debug, Default)]
pub struct Random;

impl BalanceStrategy for Random {
    fn next_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(fastrand::usize(..len))
    }
}

fn strategy_for(kind: BalanceKind) -> Box<dyn BalanceStrategy> {
    match kind {
        BalanceKind::RoundRobin => Box::new(RoundRobin::new()),
        BalanceKind::Random => Box::new(Random),
    }
}

/// A facade forwarding to one concrete connection per call.
///
/// The facade itself carries no endpoint; use
/// [`resolve`](crate::proxy::resolve) to reach the concrete connection whose
/// endpoint is bound.
pub struct LoadBalancedConnection {
    driver: Arc<dyn RawDriver>,
    endpoint: Arc<EndpointInfo>,
    properties: ConnectProperties,
    config: Arc<TracingConfig>,
    strategy: Box<dyn BalanceStrategy>,
    /// Live connection per host, indexed like `endpoint.hosts()`.
    live: Mutex<Vec<Option<TracedConnection>>>,
    current: ArcSwap<TracedConnection>,
    current_index: AtomicUsize,
    auto_commit: AtomicBool,
    closed: AtomicBool,
}

impl LoadBalancedConnection {
    /// Open the first reachable host, in strategy order.
    pub async fn connect(
        driver: Arc<dyn RawDriver>,
        endpoint: Arc<EndpointInfo>,
        properties: ConnectProperties,
        config: Arc<TracingConfig>,
    ) -> Result<Self, DriverError> {
        let strategy = strategy_for(config.balance);
        let hosts = endpoint.hosts().len();
        let start = strategy
            .next_index(hosts)
            .ok_or_else(|| DriverError::Other("no hosts to connect to".into()))?;

        let mut last_error = None;
        for i in 0..hosts {
            let index = (start + i) % hosts;
            let addr = &endpoint.hosts()[index];
            match open_traced(&*driver, addr, &endpoint, &properties, &config).await {
                Ok(conn) => {
                    let mut live = vec![None; hosts];
                    live[index] = Some(conn.clone());
                    return Ok(Self {
                        driver,
                        endpoint,
                        properties,
                        config,
                        strategy,
                        live: Mutex::new(live),
                        current: ArcSwap::from_pointee(conn),
                        current_index: AtomicUsize::new(index),
                        auto_commit: AtomicBool::new(true),
                        closed: AtomicBool::new(false),
                    });
                }
                Err(error) => {
                    tracing::warn!(host = %addr, %error, "Load-balanced host unavailable");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DriverError::Other("no hosts to connect to".into())))
    }

    /// The multi-host endpoint every target is bound with.
    pub fn endpoint(&self) -> &Arc<EndpointInfo> {
        &self.endpoint
    }

    /// The concrete connection calls are currently forwarded to.
    pub fn current(&self) -> TracedConnection {
        TracedConnection::clone(&self.current.load())
    }

    /// Index into `endpoint().hosts()` of the current target.
    pub fn current_index(&self) -> usize {
        self.current_index.load(Ordering::Acquire)
    }

    /// Every concrete connection opened so far and not yet dropped.
    pub fn live_targets(&self) -> Vec<TracedConnection> {
        self.live().iter().flatten().cloned().collect()
    }

    /// Move to another host chosen by the strategy.
    ///
    /// The facade's auto-commit mode is carried onto the new target. With a
    /// single host the current target is kept.
    pub async fn rebalance(&self) -> Result<(), DriverError> {
        self.ensure_open()?;

        let (index, conn) = self.pick(Some(self.current_index())).await?;
        let auto_commit = self.auto_commit.load(Ordering::Acquire);
        if conn.auto_commit() != auto_commit {
            conn.set_auto_commit(auto_commit).await?;
        }

        // Targets adopted into `live` are closed by `close`; only publish
        // while the facade is still open.
        self.ensure_open()?;
        self.current.store(Arc::new(conn));
        self.current_index.store(index, Ordering::Release);

        if self.config.log_lifecycle {
            tracing::debug!(
                host = %self.endpoint.hosts()[index],
                "Load-balanced connection switched target"
            );
        }
        Ok(())
    }

    /// Find an open connection, starting from the strategy's choice and
    /// skipping `skip` when there is an alternative.
    async fn pick(&self, skip: Option<usize>) -> Result<(usize, TracedConnection), DriverError> {
        let hosts = self.endpoint.hosts();
        let start = self
            .strategy
            .next_index(hosts.len())
            .ok_or_else(|| DriverError::Other("no hosts to connect to".into()))?;

        let mut last_error = None;
        for i in 0..hosts.len() {
            let index = (start + i) % hosts.len();
            if hosts.len() > 1 && skip == Some(index) {
                continue;
            }

            let existing = self.live()[index].clone().filter(|conn| !conn.is_closed());
            if let Some(conn) = existing {
                return Ok((index, conn));
            }

            match open_traced(
                &*self.driver,
                &hosts[index],
                &self.endpoint,
                &self.properties,
                &self.config,
            )
            .await
            {
                Ok(conn) => return self.adopt(index, conn).await,
                Err(error) => {
                    tracing::warn!(host = %hosts[index], %error, "Load-balanced host unavailable");
                    last_error = Some(error);
                }
            }
        }

        match last_error {
            Some(error) => Err(error),
            // Only the skipped host exists; stay on it.
            None => Ok((self.current_index(), self.current())),
        }
    }

    /// Record a freshly opened target in `live`, or close it again when the
    /// facade was closed while it was being opened.
    async fn adopt(
        &self,
        index: usize,
        conn: TracedConnection,
    ) -> Result<(usize, TracedConnection), DriverError> {
        let adopted = {
            let mut live = self.live();
            if self.is_closed() {
                false
            } else {
                live[index] = Some(conn.clone());
                true
            }
        };
        if adopted {
            return Ok((index, conn));
        }

        if let Err(error) = conn.close().await {
            tracing::warn!(%error, "Closing target opened after facade close failed");
        }
        Err(DriverError::Closed("connection"))
    }

    fn live(&self) -> MutexGuard<'_, Vec<Option<TracedConnection>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.is_closed() {
            return Err(DriverError::Closed("connection"));
        }
        Ok(())
    }

    async fn rebalance_after_transaction(&self) {
        if let Err(error) = self.rebalance().await {
            tracing::warn!(%error, "Rebalance failed, keeping current target");
        }
    }
}

impl fmt::Debug for LoadBalancedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadBalancedConnection")
            .field("endpoint", &self.endpoint.url())
            .field("current_index", &self.current_index())
            .field("strategy", &self.strategy)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl HasTraceValue for LoadBalancedConnection {
    fn trace_value(&self) -> Option<&dyn TraceValue> {
        None
    }
}

impl Facade for LoadBalancedConnection {
    fn current_target(&self) -> Option<TracedConnection> {
        Some(self.current())
    }
}

#[async_trait]
impl Connection for LoadBalancedConnection {
    async fn open_statement(
        &self,
        request: StatementRequest,
    ) -> Result<TracedStatement, DriverError> {
        self.ensure_open()?;
        self.current().open_statement(request).await
    }

    async fn set_auto_commit(&self, enabled: bool) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.current().set_auto_commit(enabled).await?;
        self.auto_commit.store(enabled, Ordering::Release);
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::Acquire)
    }

    async fn commit(&self) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.current().commit().await?;
        self.rebalance_after_transaction().await;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.current().rollback().await?;
        self.rebalance_after_transaction().await;
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        // Flag and snapshot under the lock `adopt` takes, so every target is
        // either in the snapshot or closed by `adopt`.
        let targets: Vec<TracedConnection> = {
            let live = self.live();
            self.closed.store(true, Ordering::Release);
            live.iter().flatten().cloned().collect()
        };
        let mut result = Ok(());
        for target in targets {
            if let Err(error) = target.close().await {
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        result
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn handle(&self) -> Handle<'_> {
        Handle::Facade(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        assert_eq!(lb.next_index(2), Some(0));
        assert_eq!(lb.next_index(2), Some(1));
        assert_eq!(lb.next_index(2), Some(0));
        assert_eq!(lb.next_index(0), None);
    }

    #[test]
    fn test_random_stays_in_range() {
        for _ in 0..100 {
            assert!(Random.next_index(3).unwrap() < 3);
        }
        assert_eq!(Random.next_index(0), None);
    }
}
