//! Classification results handed to the alerting layer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use monitor_chain::{Liquidation, Position};

/// One classification result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Finding {
    /// Position below its collateral requirement at the current price
    #[serde(rename_all = "camelCase")]
    LiquidatablePosition {
        contract_id: String,
        position: Position,
        price_used: Decimal,
    },
    /// Liquidation that the buffered historical price shows was invalid
    #[serde(rename_all = "camelCase")]
    DisputableLiquidation {
        contract_id: String,
        historical_price: Decimal,
        scaled_price: Decimal,
        liquidation: Liquidation,
    },
}

impl Finding {
    pub fn contract_id(&self) -> &str {
        match self {
            Self::LiquidatablePosition { contract_id, .. }
            | Self::DisputableLiquidation { contract_id, .. } => contract_id,
        }
    }

    pub fn sponsor(&self) -> &str {
        match self {
            Self::LiquidatablePosition { position, .. } => &position.sponsor,
            Self::DisputableLiquidation { liquidation, .. } => &liquidation.sponsor,
        }
    }

    pub fn is_liquidatable(&self) -> bool {
        matches!(self, Self::LiquidatablePosition { .. })
    }

    pub fn is_disputable(&self) -> bool {
        matches!(self, Self::DisputableLiquidation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_json_shape() {
        let finding = Finding::LiquidatablePosition {
            contract_id: "eth-usd".into(),
            position: Position::new("0xabc", dec!(125), dec!(100)),
            price_used: dec!(1.3),
        };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["kind"], "liquidatablePosition");
        assert_eq!(json["contractId"], "eth-usd");
        assert_eq!(json["priceUsed"], "1.3");
        assert_eq!(json["position"]["tokensOutstanding"], "100");
        assert_eq!(finding.sponsor(), "0xabc");
        assert!(finding.is_liquidatable());
    }
}
