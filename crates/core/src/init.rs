//! Contract initialization.
//!
//! Turns config entries into [`ContractMonitor`]s: checks the contract
//! type/version against the supported set, validates risk parameters and
//! builds the collaborators. Entries are initialized concurrently and each
//! failure is reported on its own.

use alloy::primitives::Address;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{ContractConfig, ContractEntry, DisputeDefaults};
use crate::cycle::ContractMonitor;
use crate::error::{chain_reason, EngineError};
use monitor_chain::{
    ContractClientFactory, ContractDescriptor, ContractType, ContractVersion, PriceFeed,
    PriceFeedBuildError, PriceFeedFactory,
};

/// Contract templates the engine knows how to read.
pub const SUPPORTED_CONTRACT_VERSIONS: &[(ContractType, &str)] = &[
    (ContractType::ExpiringMultiParty, "1.2.0"),
    (ContractType::ExpiringMultiParty, "1.2.1"),
    (ContractType::ExpiringMultiParty, "1.2.2"),
    (ContractType::ExpiringMultiParty, "2.0.1"),
    (ContractType::Perpetual, "2.0.1"),
];

/// Result of initializing the configured fleet.
#[derive(Debug, Default)]
pub struct InitReport {
    pub monitors: Vec<ContractMonitor>,
    pub failures: Vec<EngineError>,
}

/// Check a type/version pair against [`SUPPORTED_CONTRACT_VERSIONS`].
pub fn check_supported(entry: &ContractEntry) -> Result<(ContractType, ContractVersion), EngineError> {
    let unsupported = |reason: String| EngineError::UnsupportedContractConfiguration {
        contract: entry.id.clone(),
        reason,
    };

    let contract_type = ContractType::parse(&entry.contract_type)
        .ok_or_else(|| unsupported(format!("unknown contract type {}", entry.contract_type)))?;

    let supported = SUPPORTED_CONTRACT_VERSIONS
        .iter()
        .any(|(t, v)| *t == contract_type && *v == entry.contract_version);
    if !supported {
        return Err(unsupported(format!(
            "{} version {} is not supported",
            contract_type, entry.contract_version
        )));
    }

    Ok((contract_type, ContractVersion::new(entry.contract_version.clone())))
}

/// Resolve an entry's descriptor and risk parameters.
pub fn resolve_entry(
    entry: &ContractEntry,
    defaults: &DisputeDefaults,
) -> Result<(ContractDescriptor, ContractConfig), EngineError> {
    let (contract_type, contract_version) = check_supported(entry)?;

    let address: Address = entry.address.parse().map_err(|e| {
        EngineError::invalid_config(&entry.id, format!("invalid address {}: {}", entry.address, e))
    })?;

    let price_feed = match &entry.price_feed {
        Some(table) => serde_json::to_value(table)
            .map_err(|e| EngineError::invalid_config(&entry.id, format!("price feed config: {}", e)))?,
        None => serde_json::Value::Null,
    };

    let config = ContractConfig {
        contract_type,
        collateral_requirement: entry.collateral_requirement,
        dispute_buffer_ratio: entry
            .dispute_buffer_ratio
            .unwrap_or(defaults.dispute_buffer_ratio),
        dispute_delay: entry
            .dispute_delay_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| defaults.dispute_delay()),
        cumulative_funding_rate_multiplier: entry.cumulative_funding_rate_multiplier,
    };
    config.validate(&entry.id)?;

    let descriptor = ContractDescriptor {
        id: entry.id.clone(),
        address,
        contract_type,
        contract_version,
        price_feed,
    };
    Ok((descriptor, config))
}

/// Build a price feed, retrying once with an explicit lookback if the feed asks for one.
pub async fn build_price_feed(
    factory: &dyn PriceFeedFactory,
    descriptor: &ContractDescriptor,
    lookback: Duration,
) -> Result<Box<dyn PriceFeed>, EngineError> {
    let failed = |e: PriceFeedBuildError| EngineError::InitializationFailed {
        contract: descriptor.id.clone(),
        reason: format!("price feed: {}", e),
    };

    match factory.create(descriptor, None).await {
        Ok(feed) => Ok(feed),
        Err(PriceFeedBuildError::LookbackRequired) => {
            debug!(
                contract = %descriptor.id,
                lookback_secs = lookback.as_secs(),
                "Price feed needs a lookback, retrying"
            );
            factory.create(descriptor, Some(lookback)).await.map_err(failed)
        }
        Err(e) => Err(failed(e)),
    }
}

/// Initialize one config entry.
pub async fn initialize_contract(
    entry: &ContractEntry,
    defaults: &DisputeDefaults,
    clients: &dyn ContractClientFactory,
    feeds: &dyn PriceFeedFactory,
) -> Result<ContractMonitor, EngineError> {
    let (descriptor, config) = resolve_entry(entry, defaults)?;

    let client = clients
        .create(&descriptor)
        .await
        .map_err(|e| EngineError::InitializationFailed {
            contract: descriptor.id.clone(),
            reason: format!("contract client: {}", chain_reason(&e)),
        })?;

    let lookback = entry
        .lookback_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| defaults.lookback());
    let feed = build_price_feed(feeds, &descriptor, lookback).await?;

    info!(
        contract = %descriptor.id,
        address = %descriptor.address,
        contract_type = %descriptor.contract_type,
        version = %descriptor.contract_version,
        mode = ?entry.mode,
        "Contract initialized"
    );
    Ok(ContractMonitor::new(descriptor, config, entry.mode, client, feed))
}

/// Initialize every entry concurrently.
pub async fn initialize_contracts(
    entries: &[ContractEntry],
    defaults: &DisputeDefaults,
    clients: &dyn ContractClientFactory,
    feeds: &dyn PriceFeedFactory,
) -> InitReport {
    let mut report = InitReport::default();

    // An id names one contract in findings, exclusions and collaborator lookups
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        *seen.entry(entry.id.as_str()).or_default() += 1;
    }
    let mut reported = HashSet::new();
    for entry in entries {
        let count = seen[entry.id.as_str()];
        if count > 1 && reported.insert(entry.id.as_str()) {
            report.failures.push(EngineError::invalid_config(
                &entry.id,
                format!("contract id configured {} times", count),
            ));
        }
    }

    let results = join_all(
        entries
            .iter()
            .filter(|entry| seen.get(entry.id.as_str()) == Some(&1))
            .map(|entry| initialize_contract(entry, defaults, clients, feeds)),
    )
    .await;

    for result in results {
        match result {
            Ok(monitor) => report.monitors.push(monitor),
            Err(e) => report.failures.push(e),
        }
    }
    report
}
