//! Monitor configuration with profile support.
//!
//! Loaded from a TOML file named by `MONITOR_CONFIG`, or built from a named
//! profile (`MONITOR_PROFILE`) when no file is given.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::ContractEntry;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Trigger timing
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Defaults for dispute classification, overridable per contract
    #[serde(default)]
    pub dispute: DisputeDefaults,

    /// Monitored financial contracts
    #[serde(default)]
    pub contracts: Vec<ContractEntry>,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// How often the fleet is evaluated when no block stream drives it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    12_000
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl TriggerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Dispute classification defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeDefaults {
    /// Margin added to the historical price, in [0, 1)
    #[serde(default = "default_buffer_ratio")]
    pub dispute_buffer_ratio: Decimal,

    /// Seconds a liquidation must age before it is flagged
    #[serde(default)]
    pub dispute_delay_secs: u64,

    /// Lookback handed to price feeds that need one (seconds)
    #[serde(default = "default_lookback")]
    pub lookback_secs: u64,
}

fn default_buffer_ratio() -> Decimal {
    Decimal::new(2, 2)
}
fn default_lookback() -> u64 {
    7200
}

impl Default for DisputeDefaults {
    fn default() -> Self {
        Self {
            dispute_buffer_ratio: default_buffer_ratio(),
            dispute_delay_secs: 0,
            lookback_secs: default_lookback(),
        }
    }
}

impl DisputeDefaults {
    pub fn dispute_delay(&self) -> Duration {
        Duration::from_secs(self.dispute_delay_secs)
    }

    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            trigger: TriggerConfig::default(),
            dispute: DisputeDefaults::default(),
            contracts: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file, expanding ${VAR} references.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text, expanding ${VAR} references.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars();
        Ok(config)
    }

    /// Testing profile: no buffer, no delay, fast polling.
    pub fn testing() -> Self {
        Self {
            profile: "testing".to_string(),
            trigger: TriggerConfig {
                poll_interval_ms: 1_000,
            },
            dispute: DisputeDefaults {
                dispute_buffer_ratio: Decimal::ZERO,
                dispute_delay_secs: 0,
                lookback_secs: default_lookback(),
            },
            contracts: Vec::new(),
        }
    }

    /// Config named by `MONITOR_CONFIG`, otherwise the `MONITOR_PROFILE` profile.
    /// Supported profiles: default, testing
    pub fn from_env() -> anyhow::Result<Self> {
        if let Ok(path) = std::env::var("MONITOR_CONFIG") {
            return Self::from_file(path);
        }
        let profile = std::env::var("MONITOR_PROFILE").unwrap_or_else(|_| "default".to_string());
        Ok(match profile.to_lowercase().as_str() {
            "testing" | "test" => Self::testing(),
            _ => Self::default(),
        })
    }

    /// Expand environment variables in config values.
    pub fn expand_env_vars(&mut self) {
        for entry in &mut self.contracts {
            entry.address = expand_env(&entry.address);
            if let Some(table) = entry.price_feed.as_mut() {
                expand_table(table);
            }
        }
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Monitor configuration loaded");
        tracing::info!(
            buffer_ratio = %self.dispute.dispute_buffer_ratio,
            delay_secs = self.dispute.dispute_delay_secs,
            lookback_secs = self.dispute.lookback_secs,
            "Dispute defaults"
        );
        tracing::info!(
            contracts = self.contracts.len(),
            poll_interval_ms = self.trigger.poll_interval_ms,
            "Fleet"
        );
    }
}

fn expand_table(table: &mut toml::Table) {
    for (_, value) in table.iter_mut() {
        expand_value(value);
    }
}

fn expand_value(value: &mut toml::Value) {
    match value {
        toml::Value::String(s) => *s = expand_env(s),
        toml::Value::Table(table) => expand_table(table),
        toml::Value::Array(items) => items.iter_mut().for_each(expand_value),
        _ => {}
    }
}

/// Expand ${VAR_NAME} patterns with environment variable values.
fn expand_env(s: &str) -> String {
    let mut result = s.to_string();
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return result;
    };

    for cap in re.captures_iter(s) {
        if let (Some(full_match), Some(var_match)) = (cap.get(0), cap.get(1)) {
            if let Ok(value) = std::env::var(var_match.as_str()) {
                result = result.replace(full_match.as_str(), &value);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierMode;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.dispute.dispute_buffer_ratio, dec!(0.02));
        assert_eq!(config.dispute.dispute_delay_secs, 0);
        assert!(config.contracts.is_empty());
    }

    #[test]
    fn test_testing_profile() {
        let config = MonitorConfig::testing();
        assert_eq!(config.profile, "testing");
        assert!(config.dispute.dispute_buffer_ratio.is_zero());
    }

    #[test]
    fn test_parse_contracts() {
        let config = MonitorConfig::from_toml(
            r#"
            profile = "mainnet"

            [dispute]
            dispute_delay_secs = 60

            [[contracts]]
            id = "eth-usd"
            address = "0x0000000000000000000000000000000000000001"
            contract_type = "ExpiringMultiParty"
            contract_version = "2.0.1"
            collateral_requirement = "1.25"
            mode = "dispute"

            [contracts.price_feed]
            lookback = 3600

            [[contracts]]
            id = "perp"
            address = "0x0000000000000000000000000000000000000002"
            contract_type = "Perpetual"
            contract_version = "2.0.1"
            collateral_requirement = "1.5"
            cumulative_funding_rate_multiplier = "1.01"
            "#,
        )
        .unwrap();

        assert_eq!(config.profile, "mainnet");
        assert_eq!(config.dispute.dispute_delay_secs, 60);
        assert_eq!(config.dispute.dispute_buffer_ratio, dec!(0.02));
        assert_eq!(config.contracts.len(), 2);

        let emp = &config.contracts[0];
        assert_eq!(emp.collateral_requirement, dec!(1.25));
        assert_eq!(emp.mode, ClassifierMode::Dispute);
        assert!(emp.price_feed.is_some());

        let perp = &config.contracts[1];
        assert_eq!(perp.mode, ClassifierMode::Both);
        assert_eq!(perp.cumulative_funding_rate_multiplier, Some(dec!(1.01)));
    }

    #[test]
    fn test_expand_env() {
        // Unique var name to avoid conflicts with parallel tests
        std::env::set_var("MONITOR_TEST_VAR", "test_value");
        assert_eq!(expand_env("${MONITOR_TEST_VAR}"), "test_value");
        assert_eq!(expand_env("prefix_${MONITOR_TEST_VAR}_suffix"), "prefix_test_value_suffix");
        assert_eq!(expand_env("no_vars"), "no_vars");
        assert_eq!(expand_env("${MONITOR_UNSET_VAR}"), "${MONITOR_UNSET_VAR}");
        std::env::remove_var("MONITOR_TEST_VAR");
    }

    #[test]
    fn test_expand_env_in_price_feed() {
        std::env::set_var("MONITOR_TEST_FEED_URL", "https://feed.local");
        let config = MonitorConfig::from_toml(
            r#"
            [[contracts]]
            id = "eth-usd"
            address = "0x0000000000000000000000000000000000000001"
            contract_type = "ExpiringMultiParty"
            contract_version = "2.0.1"
            collateral_requirement = "1.25"

            [contracts.price_feed]
            sources = ["${MONITOR_TEST_FEED_URL}/a"]

            [contracts.price_feed.backup]
            url = "${MONITOR_TEST_FEED_URL}"
            "#,
        )
        .unwrap();
        std::env::remove_var("MONITOR_TEST_FEED_URL");

        let feed = config.contracts[0].price_feed.as_ref().unwrap();
        assert_eq!(feed["sources"][0].as_str(), Some("https://feed.local/a"));
        assert_eq!(feed["backup"]["url"].as_str(), Some("https://feed.local"));
    }

    #[test]
    fn test_serialization() {
        let config = MonitorConfig::testing();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("profile = \"testing\""));

        let parsed: MonitorConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.profile, "testing");
    }
}
