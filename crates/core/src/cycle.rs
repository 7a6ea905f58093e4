//! Per-contract evaluation cycle.
//!
//! A cycle refreshes the contract's snapshot and price feed, then runs the
//! configured classifiers. Every failure is returned as an [`EngineError`]
//! recorded against this contract; nothing escapes to other contracts.

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::{ClassifierMode, ContractConfig};
use crate::dispute::{classify_disputable, PriceFeedState};
use crate::error::{chain_reason, EngineError};
use crate::finding::Finding;
use crate::liquidation::classify_liquidatable;
use monitor_chain::expiry::terminal_reason;
use monitor_chain::{ContractDescriptor, FinancialContractClient, PriceFeed};

/// Result of one contract cycle.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub findings: Vec<Finding>,
    /// Classifier passes skipped this cycle and why; the other pass still ran
    pub skipped: Vec<EngineError>,
}

/// Collaborator session owned by one contract.
///
/// Held behind a lock for the length of a cycle, so overlapping invocations
/// for the same contract run one after the other.
#[derive(Debug)]
pub struct ContractSession {
    pub client: Box<dyn FinancialContractClient>,
    pub feed: Box<dyn PriceFeed>,
}

/// One monitored financial contract.
#[derive(Debug)]
pub struct ContractMonitor {
    descriptor: ContractDescriptor,
    config: ContractConfig,
    mode: ClassifierMode,
    session: Mutex<ContractSession>,
}

impl ContractMonitor {
    pub fn new(
        descriptor: ContractDescriptor,
        config: ContractConfig,
        mode: ClassifierMode,
        client: Box<dyn FinancialContractClient>,
        feed: Box<dyn PriceFeed>,
    ) -> Self {
        Self {
            descriptor,
            config,
            mode,
            session: Mutex::new(ContractSession { client, feed }),
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &ContractDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &ContractConfig {
        &self.config
    }

    pub fn mode(&self) -> ClassifierMode {
        self.mode
    }

    /// Refresh collaborators and classify.
    #[instrument(skip(self), fields(contract = %self.descriptor.id, mode = ?self.mode))]
    pub async fn evaluate(&self) -> Result<Evaluation, EngineError> {
        let mut session = self.session.lock().await;
        let ContractSession { client, feed } = &mut *session;

        let (client_result, feed_result) = tokio::join!(client.update(), feed.update());
        client_result.map_err(|e| EngineError::SnapshotRefreshFailed {
            contract: self.id().to_string(),
            reason: chain_reason(&e),
        })?;
        feed_result.map_err(|e| EngineError::PriceFeedRefreshFailed {
            contract: self.id().to_string(),
            reason: chain_reason(&e),
        })?;

        let config = self
            .config
            .with_live_funding_rate(client.cumulative_funding_rate_multiplier());

        let mut evaluation = Evaluation::default();
        if self.mode.runs_liquidation() {
            match self.liquidatable(&**client, &**feed, &config).await {
                Ok(found) => evaluation.findings.extend(found),
                Err(e) => {
                    warn!(error = %e, "Skipping liquidation check");
                    evaluation.skipped.push(e);
                }
            }
        }
        if self.mode.runs_dispute() {
            match self.disputable(&**client, &**feed, &config).await {
                Ok(found) => evaluation.findings.extend(found),
                Err(e) => {
                    warn!(error = %e, "Skipping dispute check");
                    evaluation.skipped.push(e);
                }
            }
        }

        debug!(
            findings = evaluation.findings.len(),
            skipped = evaluation.skipped.len(),
            "Contract evaluated"
        );
        Ok(evaluation)
    }

    async fn liquidatable(
        &self,
        client: &dyn FinancialContractClient,
        feed: &dyn PriceFeed,
        config: &ContractConfig,
    ) -> Result<Vec<Finding>, EngineError> {
        let expired = client
            .is_expired_or_shutdown()
            .await
            .map_err(|e| EngineError::ExpiryCheckFailed {
                contract: self.id().to_string(),
                reason: chain_reason(&e),
            })?;
        if expired {
            info!(
                reason = terminal_reason(config.contract_type),
                "Contract no longer active, skipping liquidation check"
            );
            return Ok(Vec::new());
        }

        let price = feed.current_price().ok_or_else(|| EngineError::PriceUnavailable {
            contract: self.id().to_string(),
            reason: "no current price".to_string(),
        })?;

        let positions = client.positions();
        Ok(classify_liquidatable(self.id(), &positions, price, config, false))
    }

    async fn disputable(
        &self,
        client: &dyn FinancialContractClient,
        feed: &dyn PriceFeed,
        config: &ContractConfig,
    ) -> Result<Vec<Finding>, EngineError> {
        let liquidations = client.undisputed_liquidations();
        if liquidations.is_empty() {
            return Ok(Vec::new());
        }

        let state = PriceFeedState::capture(feed).ok_or_else(|| EngineError::PriceUnavailable {
            contract: self.id().to_string(),
            reason: "price feed has no update time".to_string(),
        })?;

        Ok(classify_disputable(
            self.id(),
            &liquidations,
            |timestamp| feed.historical_price(timestamp),
            &state,
            config,
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use monitor_chain::mock::{MockContractHandle, MockPriceHandle};
    use monitor_chain::{ContractType, ContractVersion, Liquidation, LiquidationState, Position};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const T: u64 = 1_700_000_000;

    fn monitor(mode: ClassifierMode, contract_type: ContractType) -> (ContractMonitor, MockContractHandle, MockPriceHandle) {
        let contract = MockContractHandle::new();
        let price = MockPriceHandle::new();
        price.set_current_price(Some(dec!(1.3)));
        price.set_default_historical_price(Some(dec!(1.1)));
        price.set_last_update_time(Some(T + 10));

        let descriptor = ContractDescriptor {
            id: "c1".into(),
            address: Address::ZERO,
            contract_type,
            contract_version: ContractVersion::new("2.0.1"),
            price_feed: serde_json::Value::Null,
        };
        let config = ContractConfig {
            contract_type,
            collateral_requirement: dec!(1.2),
            dispute_buffer_ratio: dec!(0.02),
            dispute_delay: Duration::ZERO,
            cumulative_funding_rate_multiplier: None,
        };
        let monitor = ContractMonitor::new(
            descriptor,
            config,
            mode,
            Box::new(contract.client()),
            Box::new(price.feed()),
        );
        (monitor, contract, price)
    }

    fn liquidation(sponsor: &str, locked: rust_decimal::Decimal) -> Liquidation {
        Liquidation {
            id: 0,
            sponsor: sponsor.into(),
            liquidation_time: T,
            locked_collateral: locked,
            tokens_liquidated: dec!(100),
            state: LiquidationState::PreDispute,
        }
    }

    #[tokio::test]
    async fn test_both_modes() {
        let (monitor, contract, _) = monitor(ClassifierMode::Both, ContractType::ExpiringMultiParty);
        contract.set_positions(vec![
            Position::new("0x01", dec!(125), dec!(100)),
            Position::new("0x02", dec!(175), dec!(100)),
        ]);
        contract.set_liquidations(vec![liquidation("0x03", dec!(150))]);

        let findings = monitor.evaluate().await.unwrap().findings;
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().any(|f| f.is_liquidatable() && f.sponsor() == "0x01"));
        assert!(findings.iter().any(|f| f.is_disputable() && f.sponsor() == "0x03"));
    }

    #[tokio::test]
    async fn test_mode_selects_classifier() {
        let (monitor, contract, _) = monitor(ClassifierMode::Dispute, ContractType::ExpiringMultiParty);
        contract.set_positions(vec![Position::new("0x01", dec!(125), dec!(100))]);
        contract.set_liquidations(vec![liquidation("0x03", dec!(150))]);

        let findings = monitor.evaluate().await.unwrap().findings;
        assert_eq!(findings.len(), 1);
        assert!(findings[0].is_disputable());
    }

    #[tokio::test]
    async fn test_snapshot_failure_recorded() {
        let (monitor, contract, _) = monitor(ClassifierMode::Both, ContractType::ExpiringMultiParty);
        contract.fail_update(true);

        let error = monitor.evaluate().await.unwrap_err();
        assert!(matches!(error, EngineError::SnapshotRefreshFailed { .. }));
        assert_eq!(error.contract(), "c1");
    }

    #[tokio::test]
    async fn test_feed_failure_recorded() {
        let (monitor, _, price) = monitor(ClassifierMode::Both, ContractType::ExpiringMultiParty);
        price.fail_update(true);

        let error = monitor.evaluate().await.unwrap_err();
        assert!(matches!(error, EngineError::PriceFeedRefreshFailed { .. }));
    }

    #[tokio::test]
    async fn test_expired_contract_skips_liquidations() {
        let (monitor, contract, _) = monitor(ClassifierMode::Liquidation, ContractType::ExpiringMultiParty);
        contract.set_positions(vec![Position::new("0x01", dec!(125), dec!(100))]);
        contract.set_expired_or_shutdown(true);

        assert!(monitor.evaluate().await.unwrap().findings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_current_price_keeps_disputes() {
        let (monitor, contract, price) = monitor(ClassifierMode::Both, ContractType::ExpiringMultiParty);
        price.set_current_price(None);
        contract.set_positions(vec![Position::new("0x01", dec!(125), dec!(100))]);
        contract.set_liquidations(vec![liquidation("0x03", dec!(150))]);

        let findings = monitor.evaluate().await.unwrap().findings;
        assert_eq!(findings.len(), 1);
        assert!(findings[0].is_disputable());
    }

    #[tokio::test]
    async fn test_live_funding_rate_used_for_perpetual() {
        let (monitor, contract, _) = monitor(ClassifierMode::Liquidation, ContractType::Perpetual);
        // Safe at raw debt (156 required), under-collateralized once debt grows 5%
        contract.set_positions(vec![Position::new("0x01", dec!(160), dec!(100))]);
        assert!(monitor.evaluate().await.unwrap().findings.is_empty());

        contract.set_funding_rate_multiplier(Some(dec!(1.05)));
        assert_eq!(monitor.evaluate().await.unwrap().findings.len(), 1);
    }

    #[tokio::test]
    async fn test_expiry_check_failure_skips_liquidations_only() {
        let (monitor, contract, _) = monitor(ClassifierMode::Both, ContractType::ExpiringMultiParty);
        contract.set_positions(vec![Position::new("0x01", dec!(125), dec!(100))]);
        contract.set_liquidations(vec![liquidation("0x03", dec!(150))]);
        contract.fail_expiry_check(true);

        let evaluation = monitor.evaluate().await.unwrap();
        assert_eq!(evaluation.findings.len(), 1);
        assert!(evaluation.findings[0].is_disputable());
        assert!(matches!(
            evaluation.skipped.as_slice(),
            [EngineError::ExpiryCheckFailed { contract, .. }] if contract == "c1"
        ));
    }
}
