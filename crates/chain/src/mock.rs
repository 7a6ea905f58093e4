//! In-memory collaborators for tests and dry runs.
//!
//! Each mock splits into a cheap cloneable handle, used by the test to change
//! state or inject failures, and the boxed collaborator given to the engine.
//! Collaborators only observe the handle's state when `update` is called.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::contract::{ContractClientFactory, ContractDescriptor, FinancialContractClient};
use crate::oracle::{PriceFeed, PriceFeedBuildError, PriceFeedFactory};
use crate::types::{Liquidation, Position};

/// Contract state served by [`MockContractClient`].
#[derive(Debug, Clone, Default)]
pub struct MockContractState {
    pub positions: Vec<Position>,
    pub liquidations: Vec<Liquidation>,
    pub expired_or_shutdown: bool,
    pub funding_rate_multiplier: Option<Decimal>,
    pub fail_update: bool,
    pub fail_expiry_check: bool,
}

/// Test-side handle to a mock contract.
#[derive(Debug, Clone, Default)]
pub struct MockContractHandle {
    state: Arc<Mutex<MockContractState>>,
    updates: Arc<AtomicUsize>,
}

impl MockContractHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_positions(&self, positions: Vec<Position>) {
        self.state.lock().positions = positions;
    }

    pub fn set_liquidations(&self, liquidations: Vec<Liquidation>) {
        self.state.lock().liquidations = liquidations;
    }

    pub fn set_expired_or_shutdown(&self, expired: bool) {
        self.state.lock().expired_or_shutdown = expired;
    }

    pub fn set_funding_rate_multiplier(&self, multiplier: Option<Decimal>) {
        self.state.lock().funding_rate_multiplier = multiplier;
    }

    pub fn fail_update(&self, fail: bool) {
        self.state.lock().fail_update = fail;
    }

    pub fn fail_expiry_check(&self, fail: bool) {
        self.state.lock().fail_expiry_check = fail;
    }

    /// Number of `update` calls observed across all clients built from this handle.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn client(&self) -> MockContractClient {
        MockContractClient {
            handle: self.clone(),
            snapshot: MockContractState::default(),
        }
    }
}

/// Contract client serving a [`MockContractHandle`]'s state.
#[derive(Debug)]
pub struct MockContractClient {
    handle: MockContractHandle,
    snapshot: MockContractState,
}

#[async_trait]
impl FinancialContractClient for MockContractClient {
    async fn update(&mut self) -> Result<()> {
        self.handle.updates.fetch_add(1, Ordering::SeqCst);
        let state = self.handle.state.lock().clone();
        if state.fail_update {
            bail!("mock contract update failure");
        }
        self.snapshot = state;
        Ok(())
    }

    fn positions(&self) -> Vec<Position> {
        self.snapshot.positions.clone()
    }

    fn undisputed_liquidations(&self) -> Vec<Liquidation> {
        self.snapshot
            .liquidations
            .iter()
            .filter(|l| l.state.is_disputable_state())
            .cloned()
            .collect()
    }

    async fn is_expired_or_shutdown(&self) -> Result<bool> {
        if self.snapshot.fail_expiry_check {
            bail!("mock expiry check failure");
        }
        Ok(self.snapshot.expired_or_shutdown)
    }

    fn cumulative_funding_rate_multiplier(&self) -> Option<Decimal> {
        self.snapshot.funding_rate_multiplier
    }
}

/// Price state served by [`MockPriceFeed`].
#[derive(Debug, Clone)]
pub struct MockPriceState {
    pub current_price: Option<Decimal>,
    /// Answer for every historical lookup not marked as failing
    pub default_historical_price: Option<Decimal>,
    pub last_update_time: Option<u64>,
    pub lookback: Duration,
    pub fail_update: bool,
    /// Timestamps whose historical lookup errors
    pub failing_timestamps: HashSet<u64>,
}

impl Default for MockPriceState {
    fn default() -> Self {
        Self {
            current_price: None,
            default_historical_price: None,
            last_update_time: None,
            lookback: Duration::from_secs(7200),
            fail_update: false,
            failing_timestamps: HashSet::new(),
        }
    }
}

/// Test-side handle to a mock price feed.
#[derive(Debug, Clone, Default)]
pub struct MockPriceHandle {
    state: Arc<Mutex<MockPriceState>>,
}

impl MockPriceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current_price(&self, price: Option<Decimal>) {
        self.state.lock().current_price = price;
    }

    pub fn set_default_historical_price(&self, price: Option<Decimal>) {
        self.state.lock().default_historical_price = price;
    }

    pub fn set_last_update_time(&self, timestamp: Option<u64>) {
        self.state.lock().last_update_time = timestamp;
    }

    pub fn set_lookback(&self, lookback: Duration) {
        self.state.lock().lookback = lookback;
    }

    pub fn fail_update(&self, fail: bool) {
        self.state.lock().fail_update = fail;
    }

    pub fn fail_historical_at(&self, timestamp: u64) {
        self.state.lock().failing_timestamps.insert(timestamp);
    }

    pub fn feed(&self) -> MockPriceFeed {
        MockPriceFeed {
            handle: self.clone(),
            snapshot: MockPriceState::default(),
        }
    }
}

/// Price feed serving a [`MockPriceHandle`]'s state.
#[derive(Debug)]
pub struct MockPriceFeed {
    handle: MockPriceHandle,
    snapshot: MockPriceState,
}

#[async_trait]
impl PriceFeed for MockPriceFeed {
    async fn update(&mut self) -> Result<()> {
        let state = self.handle.state.lock().clone();
        if state.fail_update {
            bail!("mock price feed update failure");
        }
        self.snapshot = state;
        Ok(())
    }

    fn current_price(&self) -> Option<Decimal> {
        self.snapshot.current_price
    }

    async fn historical_price(&self, timestamp: u64) -> Result<Decimal> {
        if self.snapshot.failing_timestamps.contains(&timestamp) {
            bail!("mock historical price failure at {}", timestamp);
        }
        self.snapshot
            .default_historical_price
            .ok_or_else(|| anyhow!("no mock historical price at {}", timestamp))
    }

    fn lookback(&self) -> Duration {
        self.snapshot.lookback
    }

    fn last_update_time(&self) -> Option<u64> {
        self.snapshot.last_update_time
    }
}

/// Factory wiring mock handles to contract ids.
#[derive(Debug, Default)]
pub struct MockFactory {
    contracts: Mutex<HashMap<String, (MockContractHandle, MockPriceHandle)>>,
    require_lookback: bool,
    failing_feeds: Mutex<HashSet<String>>,
    feed_builds: AtomicUsize,
    client_builds: AtomicUsize,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds built without a lookback fail with `LookbackRequired`.
    pub fn requiring_lookback() -> Self {
        Self {
            require_lookback: true,
            ..Self::default()
        }
    }

    /// Register a contract id, returning its handles.
    pub fn register(&self, id: &str) -> (MockContractHandle, MockPriceHandle) {
        let handles = (MockContractHandle::new(), MockPriceHandle::new());
        self.contracts.lock().insert(id.to_string(), handles.clone());
        handles
    }

    /// Make feed construction fail for `id` with an invalid-config error.
    pub fn fail_feed_build(&self, id: &str) {
        self.failing_feeds.lock().insert(id.to_string());
    }

    pub fn feed_builds(&self) -> usize {
        self.feed_builds.load(Ordering::SeqCst)
    }

    pub fn client_builds(&self) -> usize {
        self.client_builds.load(Ordering::SeqCst)
    }

    fn handles(&self, id: &str) -> Option<(MockContractHandle, MockPriceHandle)> {
        self.contracts.lock().get(id).cloned()
    }
}

#[async_trait]
impl ContractClientFactory for MockFactory {
    async fn create(&self, contract: &ContractDescriptor) -> Result<Box<dyn FinancialContractClient>> {
        self.client_builds.fetch_add(1, Ordering::SeqCst);
        let (client, _) = self
            .handles(&contract.id)
            .ok_or_else(|| anyhow!("no mock registered for {}", contract.id))?;
        Ok(Box::new(client.client()))
    }
}

#[async_trait]
impl PriceFeedFactory for MockFactory {
    async fn create(
        &self,
        contract: &ContractDescriptor,
        lookback: Option<Duration>,
    ) -> std::result::Result<Box<dyn PriceFeed>, PriceFeedBuildError> {
        self.feed_builds.fetch_add(1, Ordering::SeqCst);
        if self.failing_feeds.lock().contains(&contract.id) {
            return Err(PriceFeedBuildError::InvalidConfig(format!(
                "mock feed for {} rejected",
                contract.id
            )));
        }
        if self.require_lookback && lookback.is_none() {
            return Err(PriceFeedBuildError::LookbackRequired);
        }
        let (_, price) = self
            .handles(&contract.id)
            .ok_or_else(|| anyhow!("no mock registered for {}", contract.id))?;
        if let Some(lookback) = lookback {
            price.set_lookback(lookback);
        }
        Ok(Box::new(price.feed()))
    }
}
