//! Collateralization math.
//!
//! All functions are pure. Products saturate at `Decimal::MAX`, so an
//! overflowing requirement reads as "more collateral than any position holds".

use rust_decimal::Decimal;

use crate::config::ContractConfig;
use monitor_chain::{Liquidation, Position};

/// Raw debt adjusted by the contract's funding multiplier.
#[inline]
pub fn effective_debt(tokens: Decimal, config: &ContractConfig) -> Decimal {
    tokens.saturating_mul(config.funding_rate_multiplier())
}

/// Effective debt of a sponsor position.
#[inline]
pub fn position_debt(position: &Position, config: &ContractConfig) -> Decimal {
    effective_debt(position.tokens_outstanding, config)
}

/// Collateral needed to back `debt` at `price` under `collateral_requirement`.
#[inline]
pub fn required_collateral(debt: Decimal, price: Decimal, collateral_requirement: Decimal) -> Decimal {
    debt.saturating_mul(price).saturating_mul(collateral_requirement)
}

/// Strictly below the requirement. A position exactly at the threshold is safe.
pub fn is_undercollateralized(position: &Position, price: Decimal, config: &ContractConfig) -> bool {
    let required = required_collateral(
        position_debt(position, config),
        price,
        config.collateral_requirement,
    );
    position.collateral < required
}

/// A liquidation is disputable when its locked collateral met the requirement
/// at `price`, i.e. the position was not actually under-collateralized.
pub fn is_disputable(liquidation: &Liquidation, price: Decimal, config: &ContractConfig) -> bool {
    let required = required_collateral(
        effective_debt(liquidation.tokens_liquidated, config),
        price,
        config.collateral_requirement,
    );
    liquidation.locked_collateral >= required
}

/// Collateral ratio (collateral / debt value), `None` for zero debt or price.
pub fn collateral_ratio(position: &Position, price: Decimal, config: &ContractConfig) -> Option<Decimal> {
    let value = position_debt(position, config).checked_mul(price)?;
    position.collateral.checked_div(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_chain::{ContractType, LiquidationState};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn config(contract_type: ContractType, multiplier: Option<Decimal>) -> ContractConfig {
        ContractConfig {
            contract_type,
            collateral_requirement: dec!(1.2),
            dispute_buffer_ratio: dec!(0.02),
            dispute_delay: Duration::ZERO,
            cumulative_funding_rate_multiplier: multiplier,
        }
    }

    fn liquidation(locked: Decimal, tokens: Decimal) -> Liquidation {
        Liquidation {
            id: 0,
            sponsor: "0x01".into(),
            liquidation_time: 100,
            locked_collateral: locked,
            tokens_liquidated: tokens,
            state: LiquidationState::PreDispute,
        }
    }

    #[test]
    fn test_required_collateral() {
        assert_eq!(required_collateral(dec!(100), dec!(1.3), dec!(1.2)), dec!(156));
    }

    #[test]
    fn test_effective_debt_by_contract_type() {
        let emp = config(ContractType::ExpiringMultiParty, Some(dec!(2)));
        assert_eq!(effective_debt(dec!(100), &emp), dec!(100));

        let perp = config(ContractType::Perpetual, Some(dec!(1.05)));
        assert_eq!(effective_debt(dec!(100), &perp), dec!(105));
    }

    #[test]
    fn test_undercollateralized_threshold() {
        let emp = config(ContractType::ExpiringMultiParty, None);

        let under = Position::new("0x01", dec!(125), dec!(100));
        assert!(is_undercollateralized(&under, dec!(1.3), &emp));

        let safe = Position::new("0x02", dec!(175), dec!(100));
        assert!(!is_undercollateralized(&safe, dec!(1.3), &emp));
    }

    #[test]
    fn test_boundary_is_safe() {
        let emp = config(ContractType::ExpiringMultiParty, None);
        let at_threshold = Position::new("0x01", dec!(156), dec!(100));
        assert!(!is_undercollateralized(&at_threshold, dec!(1.3), &emp));

        let just_below = Position::new("0x01", dec!(155.999999), dec!(100));
        assert!(is_undercollateralized(&just_below, dec!(1.3), &emp));
    }

    #[test]
    fn test_funding_rate_tips_perpetual() {
        // 160 collateral covers 156 raw, but not 163.8 after a 1.05 multiplier
        let position = Position::new("0x01", dec!(160), dec!(100));
        let perp = config(ContractType::Perpetual, Some(dec!(1.05)));
        assert!(is_undercollateralized(&position, dec!(1.3), &perp));

        let fresh = config(ContractType::Perpetual, None);
        assert!(!is_undercollateralized(&position, dec!(1.3), &fresh));
    }

    #[test]
    fn test_zero_debt_never_flagged() {
        let emp = config(ContractType::ExpiringMultiParty, None);
        let position = Position::new("0x01", dec!(0), dec!(0));
        assert!(!is_undercollateralized(&position, dec!(1.3), &emp));
        assert_eq!(collateral_ratio(&position, dec!(1.3), &emp), None);
    }

    #[test]
    fn test_overflow_saturates() {
        let emp = config(ContractType::ExpiringMultiParty, None);
        let position = Position::new("0x01", dec!(1000000), Decimal::MAX);
        assert!(is_undercollateralized(&position, dec!(2), &emp));
    }

    #[test]
    fn test_disputable_inclusive_bound() {
        let emp = config(ContractType::ExpiringMultiParty, None);
        // 100 * 1.122 * 1.2 = 134.64
        assert!(is_disputable(&liquidation(dec!(134.64), dec!(100)), dec!(1.122), &emp));
        assert!(is_disputable(&liquidation(dec!(150), dec!(100)), dec!(1.122), &emp));
        assert!(!is_disputable(&liquidation(dec!(134.63), dec!(100)), dec!(1.122), &emp));
    }

    #[test]
    fn test_collateral_ratio() {
        let emp = config(ContractType::ExpiringMultiParty, None);
        let position = Position::new("0x01", dec!(260), dec!(100));
        assert_eq!(collateral_ratio(&position, dec!(1.3), &emp), Some(dec!(2)));
    }
}
