//! Expiration and emergency-shutdown detection.

use crate::types::ContractType;

/// Terminal timestamps read from a financial contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpiryTimestamps {
    /// Expiration (EMP) or emergency shutdown (Perpetual) timestamp; 0 = unset
    pub expiration_or_shutdown: u64,
    /// The contract's own notion of current time
    pub contract_time: u64,
}

impl ExpiryTimestamps {
    pub fn new(expiration_or_shutdown: u64, contract_time: u64) -> Self {
        Self {
            expiration_or_shutdown,
            contract_time,
        }
    }

    /// A contract is terminal once its clock reaches a non-zero terminal timestamp.
    pub fn is_expired_or_shutdown(&self) -> bool {
        is_expired_or_shutdown(self.expiration_or_shutdown, self.contract_time)
    }
}

/// Check whether a contract is expired (EMP) or shut down (Perpetual).
///
/// A zero terminal timestamp means a perpetual that was never shut down.
pub fn is_expired_or_shutdown(expiration_or_shutdown: u64, contract_time: u64) -> bool {
    expiration_or_shutdown > 0 && contract_time >= expiration_or_shutdown
}

/// Human readable reason for logging.
pub fn terminal_reason(contract_type: ContractType) -> &'static str {
    match contract_type {
        ContractType::ExpiringMultiParty => "expired",
        ContractType::Perpetual => "emergency shutdown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_expired_before_timestamp() {
        assert!(!is_expired_or_shutdown(1_700_000_100, 1_700_000_000));
    }

    #[test]
    fn test_expired_at_and_after_timestamp() {
        assert!(is_expired_or_shutdown(1_700_000_000, 1_700_000_000));
        assert!(is_expired_or_shutdown(1_700_000_000, 1_800_000_000));
    }

    #[test]
    fn test_zero_means_never_shut_down() {
        assert!(!is_expired_or_shutdown(0, 1_800_000_000));
        assert!(!ExpiryTimestamps::new(0, u64::MAX).is_expired_or_shutdown());
    }
}
