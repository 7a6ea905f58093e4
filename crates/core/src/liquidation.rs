//! Liquidation eligibility classification.

use rust_decimal::Decimal;
use tracing::debug;

use crate::collateral::{collateral_ratio, is_undercollateralized};
use crate::config::ContractConfig;
use crate::finding::Finding;
use monitor_chain::Position;

/// Flag every position under-collateralized at `price`.
///
/// Expired or shut-down contracts are never evaluated and yield nothing.
/// Output order follows input order but callers should treat it as a set.
pub fn classify_liquidatable(
    contract_id: &str,
    positions: &[Position],
    price: Decimal,
    config: &ContractConfig,
    expired_or_shutdown: bool,
) -> Vec<Finding> {
    if expired_or_shutdown {
        return Vec::new();
    }

    positions
        .iter()
        .filter(|position| is_undercollateralized(position, price, config))
        .map(|position| {
            debug!(
                contract = contract_id,
                sponsor = %position.sponsor,
                collateral = %position.collateral,
                tokens = %position.tokens_outstanding,
                ratio = ?collateral_ratio(position, price, config),
                price = %price,
                "Position under-collateralized"
            );
            Finding::LiquidatablePosition {
                contract_id: contract_id.to_string(),
                position: position.clone(),
                price_used: price,
            }
        })
        .collect()
}
