//! Fleet coordination.
//!
//! On each trigger (typically a new block) every active contract is evaluated
//! on its own task. Failures are recorded per contract; contracts whose
//! failure is permanent are excluded from all later cycles.

use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::cycle::ContractMonitor;
use crate::error::EngineError;
use crate::finding::Finding;
use crate::init::initialize_contracts;
use monitor_chain::{ContractClientFactory, PriceFeedFactory};

/// External event that starts an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Trigger {
    pub block_number: u64,
    pub timestamp: u64,
}

/// Outcome of one fleet invocation.
#[derive(Debug, Clone, Default)]
pub struct FleetReport {
    /// Findings of every contract that evaluated
    pub findings: Vec<Finding>,
    /// Contracts that failed this invocation
    pub failures: Vec<EngineError>,
    /// Classifier passes skipped by contracts that otherwise evaluated
    pub skipped: Vec<EngineError>,
    /// Contracts evaluated successfully
    pub evaluated: usize,
    /// Contracts permanently excluded, at initialization or since
    pub excluded: usize,
}

/// Runs the evaluation cycle over every configured contract.
pub struct Coordinator {
    monitors: Vec<Arc<ContractMonitor>>,
    /// Permanently excluded contracts and the reason; insert-once
    excluded: DashMap<String, EngineError>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("monitors", &self.monitors.len())
            .field("excluded", &self.excluded.len())
            .finish()
    }
}

impl Coordinator {
    pub fn new(monitors: Vec<ContractMonitor>) -> Self {
        Self {
            monitors: monitors.into_iter().map(Arc::new).collect(),
            excluded: DashMap::new(),
        }
    }

    /// Initialize every configured contract. Entries that fail are excluded for good.
    pub async fn initialize(
        config: &MonitorConfig,
        clients: &dyn ContractClientFactory,
        feeds: &dyn PriceFeedFactory,
    ) -> Self {
        let report = initialize_contracts(&config.contracts, &config.dispute, clients, feeds).await;
        let coordinator = Self::new(report.monitors);
        for failure in report.failures {
            coordinator.exclude(failure);
        }

        info!(
            active = coordinator.active_count(),
            excluded = coordinator.excluded.len(),
            "Fleet initialized"
        );
        coordinator
    }

    /// Permanently exclude a contract. Returns false if it was already
    /// excluded or the failure is not permanent.
    pub fn exclude(&self, reason: EngineError) -> bool {
        if !reason.is_permanent() {
            warn!(error = %reason, "Refusing to exclude contract for a transient failure");
            return false;
        }
        let contract = reason.contract().to_string();
        match self.excluded.entry(contract) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                error!(contract = %slot.key(), error = %reason, "Contract permanently excluded");
                slot.insert(reason);
                true
            }
        }
    }

    pub fn is_excluded(&self, contract: &str) -> bool {
        self.excluded.contains_key(contract)
    }

    /// Why a contract was excluded, if it was.
    pub fn exclusion_reason(&self, contract: &str) -> Option<EngineError> {
        self.excluded.get(contract).map(|e| e.value().clone())
    }

    pub fn active_count(&self) -> usize {
        self.monitors
            .iter()
            .filter(|m| !self.is_excluded(m.id()))
            .count()
    }

    /// Evaluate every active contract concurrently and wait for all of them.
    pub async fn run_cycle(&self) -> FleetReport {
        let mut report = FleetReport::default();

        let active: Vec<Arc<ContractMonitor>> = self
            .monitors
            .iter()
            .filter(|m| !self.is_excluded(m.id()))
            .cloned()
            .collect();
        report.excluded = self.excluded.len();

        let tasks = active.iter().map(|monitor| {
            let monitor = Arc::clone(monitor);
            tokio::spawn(async move { monitor.evaluate().await })
        });
        let results = join_all(tasks).await;

        for (monitor, result) in active.iter().zip(results) {
            let outcome = result.unwrap_or_else(|e| {
                Err(EngineError::CycleAborted {
                    contract: monitor.id().to_string(),
                    reason: e.to_string(),
                })
            });

            match outcome {
                Ok(evaluation) => {
                    report.evaluated += 1;
                    report.findings.extend(evaluation.findings);
                    report.skipped.extend(evaluation.skipped);
                }
                Err(e) => {
                    warn!(contract = %monitor.id(), error = %e, "Contract evaluation failed");
                    report.failures.push(e);
                }
            }
        }

        report
    }

    /// Handle one trigger and return the flattened findings.
    pub async fn handle_trigger(&self, trigger: Trigger) -> Vec<Finding> {
        let report = self.run_cycle().await;
        debug!(
            block = trigger.block_number,
            timestamp = trigger.timestamp,
            evaluated = report.evaluated,
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            excluded = report.excluded,
            findings = report.findings.len(),
            "Fleet cycle complete"
        );
        report.findings
    }
}
