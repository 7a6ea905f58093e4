//! Failure taxonomy for the evaluation engine.

use thiserror::Error;

/// Errors recorded against a single contract.
///
/// None of these escape a fleet invocation: they are logged and reported
/// next to the findings of the contracts that did evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Current or historical price missing, or outside the lookback window
    #[error("price unavailable for {contract}: {reason}")]
    PriceUnavailable { contract: String, reason: String },

    /// Position snapshot could not be refreshed this cycle
    #[error("snapshot refresh failed for {contract}: {reason}")]
    SnapshotRefreshFailed { contract: String, reason: String },

    /// Price feed could not be refreshed this cycle
    #[error("price feed refresh failed for {contract}: {reason}")]
    PriceFeedRefreshFailed { contract: String, reason: String },

    /// Expiry / shutdown state could not be read
    #[error("expiry check failed for {contract}: {reason}")]
    ExpiryCheckFailed { contract: String, reason: String },

    /// Contract type or version not supported
    #[error("unsupported contract configuration for {contract}: {reason}")]
    UnsupportedContractConfiguration { contract: String, reason: String },

    /// Risk parameters or entry fields violate their invariants
    #[error("invalid configuration for {contract}: {reason}")]
    InvalidConfiguration { contract: String, reason: String },

    /// Collaborators for the contract could not be constructed
    #[error("initialization failed for {contract}: {reason}")]
    InitializationFailed { contract: String, reason: String },

    /// The cycle task panicked or was cancelled
    #[error("evaluation aborted for {contract}: {reason}")]
    CycleAborted { contract: String, reason: String },
}

impl EngineError {
    /// Contract the error is recorded against.
    pub fn contract(&self) -> &str {
        match self {
            Self::PriceUnavailable { contract, .. }
            | Self::SnapshotRefreshFailed { contract, .. }
            | Self::PriceFeedRefreshFailed { contract, .. }
            | Self::ExpiryCheckFailed { contract, .. }
            | Self::UnsupportedContractConfiguration { contract, .. }
            | Self::InvalidConfiguration { contract, .. }
            | Self::InitializationFailed { contract, .. }
            | Self::CycleAborted { contract, .. } => contract,
        }
    }

    /// Permanent failures exclude the contract from every later cycle.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedContractConfiguration { .. }
                | Self::InvalidConfiguration { .. }
                | Self::InitializationFailed { .. }
        )
    }

    pub fn invalid_config(contract: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            contract: contract.to_string(),
            reason: reason.into(),
        }
    }
}

/// Render an anyhow error chain on one line.
pub(crate) fn chain_reason(error: &anyhow::Error) -> String {
    format!("{:#}", error)
}
