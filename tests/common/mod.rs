#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sea_orm::Value;
use tokio::sync::Notify;
use sea_orm_endpoint_tracing::{
    ConnectProperties, ConnectTarget, DriverError, RawConnection, RawDriver, RawStatement,
    ResultSummary, StatementRequest, TracingConfig, TracingDriver,
};

/// Connection settings shared by the integration tests.
#[derive(Debug, Clone)]
pub struct DatabaseFixture {
    pub url: &'static str,
    pub load_balance_url: &'static str,
    pub user: &'static str,
    pub password: &'static str,
}

impl DatabaseFixture {
    pub fn mysql() -> Self {
        Self {
            url: "jdbc:mysql://a.example:3306/orders",
            load_balance_url: "jdbc:mysql:loadbalance://db1.example:3306,db2.example:3307/orders",
            user: "app",
            password: "secret",
        }
    }

    pub fn properties(&self) -> ConnectProperties {
        ConnectProperties::new()
            .with_user(self.user)
            .with_password(self.password)
    }
}

/// Holds an open of one host until released.
#[derive(Debug, Default)]
pub struct OpenGate {
    /// Notified once the open has started waiting.
    pub entered: Notify,
    pub release: Notify,
}

/// Everything the fake driver saw.
#[derive(Debug, Default)]
pub struct FakeState {
    pub opened: Mutex<Vec<String>>,
    pub targets: Mutex<Vec<ConnectTarget>>,
    pub refused: Mutex<HashSet<String>>,
    pub gates: Mutex<HashMap<String, Arc<OpenGate>>>,
    pub fail_close: AtomicBool,
    pub requests: Mutex<Vec<StatementRequest>>,
    pub executed: Mutex<Vec<String>>,
    pub auto_commit_calls: Mutex<Vec<(String, bool)>>,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub closes: AtomicUsize,
}

impl FakeState {
    pub fn refuse(&self, addr: &str) {
        self.refused.lock().unwrap().insert(addr.to_string());
    }

    /// Make the next opens of `addr` wait on the returned gate.
    pub fn hold(&self, addr: &str) -> Arc<OpenGate> {
        let gate = Arc::new(OpenGate::default());
        self.gates
            .lock()
            .unwrap()
            .insert(addr.to_string(), gate.clone());
        gate
    }

    pub fn targets(&self) -> Vec<ConnectTarget> {
        self.targets.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<StatementRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

/// In-memory driver that records calls and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    pub state: Arc<FakeState>,
}

#[async_trait]
impl RawDriver for FakeDriver {
    async fn open(&self, target: &ConnectTarget) -> Result<Box<dyn RawConnection>, DriverError> {
        let addr = target.addr.to_string();
        if self.state.refused.lock().unwrap().contains(&addr) {
            return Err(DriverError::Connect {
                target: addr,
                reason: "connection refused".into(),
            });
        }
        let gate = self.state.gates.lock().unwrap().get(&addr).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.state.targets.lock().unwrap().push(target.clone());
        self.state.opened.lock().unwrap().push(addr.clone());
        Ok(Box::new(FakeConnection {
            addr,
            state: self.state.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct FakeConnection {
    addr: String,
    state: Arc<FakeState>,
}

#[async_trait]
impl RawConnection for FakeConnection {
    async fn create_statement(
        &self,
        request: &StatementRequest,
    ) -> Result<Box<dyn RawStatement>, DriverError> {
        self.state.requests.lock().unwrap().push(request.clone());
        Ok(Box::new(FakeStatement {
            addr: self.addr.clone(),
            state: self.state.clone(),
        }))
    }

    async fn set_auto_commit(&self, enabled: bool) -> Result<(), DriverError> {
        self.state
            .auto_commit_calls
            .lock()
            .unwrap()
            .push((self.addr.clone(), enabled));
        Ok(())
    }

    async fn commit(&self) -> Result<(), DriverError> {
        self.state.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DriverError> {
        self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(DriverError::Other("socket reset during close".into()));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeStatement {
    addr: String,
    state: Arc<FakeState>,
}

#[async_trait]
impl RawStatement for FakeStatement {
    async fn execute_query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<ResultSummary, DriverError> {
        self.state
            .executed
            .lock()
            .unwrap()
            .push(format!("{} {} ({} params)", self.addr, sql, params.len()));
        Ok(ResultSummary { rows: 1 })
    }

    async fn execute_update(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<ResultSummary, DriverError> {
        self.execute_query(sql, params).await?;
        Ok(ResultSummary { rows: 0 })
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// A tracing driver over a fresh fake driver.
pub fn driver(config: TracingConfig) -> (TracingDriver, Arc<FakeState>) {
    let fake = FakeDriver::default();
    let state = fake.state.clone();
    (TracingDriver::new(fake, config), state)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
