// ⚠️ Cross-entity risk - bounced exposure per client across banks
// Recomputed from the current bounced-item snapshot on every call.

use crate::config::RiskConfig;
use crate::model::{is_placeholder_client, BankBouncedItem};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
            RiskTier::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRiskProfile {
    pub client_code: String,
    pub total_exposure: i64,
    pub bank_count: usize,
    /// Distinct banks, first-seen order
    pub banks: Vec<String>,
    pub risk_tier: RiskTier,
}

impl ClientRiskProfile {
    pub fn is_cross_bank(&self) -> bool {
        self.bank_count > 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskReport {
    /// Every real client, exposure descending
    pub profiles: Vec<ClientRiskProfile>,
    /// Client codes present on more than one bank, same order as `profiles`
    pub cross_bank: Vec<String>,
    /// Bounced items skipped because their client code is a placeholder
    pub unattributed_items: usize,
    pub unattributed_exposure: i64,
}

impl RiskReport {
    pub fn cross_bank_profiles(&self) -> impl Iterator<Item = &ClientRiskProfile> {
        self.profiles.iter().filter(|p| p.is_cross_bank())
    }

    pub fn count_at_least(&self, tier: RiskTier) -> usize {
        self.profiles.iter().filter(|p| p.risk_tier >= tier).count()
    }

    pub fn total_exposure(&self) -> i64 {
        self.profiles
            .iter()
            .fold(0i64, |acc, p| acc.saturating_add(p.total_exposure))
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct CrossEntityRiskAggregator {
    config: RiskConfig,
}

impl CrossEntityRiskAggregator {
    pub fn new(config: RiskConfig) -> Self {
        CrossEntityRiskAggregator { config }
    }

    pub fn tier(&self, exposure: i64, bank_count: usize) -> RiskTier {
        let c = &self.config;
        if exposure > c.critical_exposure {
            RiskTier::Critical
        } else if exposure > c.high_exposure || bank_count > c.high_bank_count {
            RiskTier::High
        } else if exposure > c.medium_exposure || bank_count > c.medium_bank_count {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    pub fn analyze(&self, items: &[BankBouncedItem]) -> RiskReport {
        struct Acc {
            client_code: String,
            exposure: i64,
            banks: Vec<String>,
        }

        let mut order: Vec<Acc> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut report = RiskReport::default();

        for item in items {
            let code = item.record.client_code.trim().to_uppercase();
            if is_placeholder_client(&code) {
                report.unattributed_items += 1;
                report.unattributed_exposure =
                    report.unattributed_exposure.saturating_add(item.record.amount);
                continue;
            }

            let slot = *index.entry(code.clone()).or_insert_with(|| {
                order.push(Acc {
                    client_code: code,
                    exposure: 0,
                    banks: Vec::new(),
                });
                order.len() - 1
            });
            let acc = &mut order[slot];
            acc.exposure = acc.exposure.saturating_add(item.record.amount);
            if !acc.banks.iter().any(|b| b == &item.bank) {
                acc.banks.push(item.bank.clone());
            }
        }

        let mut profiles: Vec<ClientRiskProfile> = order
            .into_iter()
            .map(|acc| ClientRiskProfile {
                risk_tier: self.tier(acc.exposure, acc.banks.len()),
                bank_count: acc.banks.len(),
                client_code: acc.client_code,
                total_exposure: acc.exposure,
                banks: acc.banks,
            })
            .collect();

        // stable: equal exposures keep first-seen order
        profiles.sort_by(|a, b| b.total_exposure.cmp(&a.total_exposure));

        report.cross_bank = profiles
            .iter()
            .filter(|p| p.is_cross_bank())
            .map(|p| p.client_code.clone())
            .collect();
        report.profiles = profiles;

        info!(
            clients = report.profiles.len(),
            cross_bank = report.cross_bank.len(),
            unattributed = report.unattributed_items,
            "risk aggregated"
        );
        report
    }
}

impl Default for CrossEntityRiskAggregator {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BouncedItemRecord;
    use chrono::NaiveDate;

    fn create_item(bank: &str, client: &str, amount: i64) -> BankBouncedItem {
        BankBouncedItem {
            bank: bank.to_string(),
            record: BouncedItemRecord {
                due_date: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
                return_date: None,
                client_code: client.to_string(),
                description: None,
                amount,
            },
        }
    }

    #[test]
    fn test_two_banks_25m_is_high() {
        let aggregator = CrossEntityRiskAggregator::default();
        let report = aggregator.analyze(&[
            create_item("BIAT", "C1", 15_000_000),
            create_item("STB", "c1 ", 10_000_000),
        ]);

        assert_eq!(report.profiles.len(), 1);
        let profile = &report.profiles[0];
        assert_eq!(profile.client_code, "C1");
        assert_eq!(profile.total_exposure, 25_000_000);
        assert_eq!(profile.bank_count, 2);
        assert_eq!(profile.banks, vec!["BIAT".to_string(), "STB".to_string()]);
        assert_eq!(profile.risk_tier, RiskTier::High);
        assert_eq!(report.cross_bank, vec!["C1".to_string()]);
    }

    #[test]
    fn test_tiers() {
        let aggregator = CrossEntityRiskAggregator::default();
        assert_eq!(aggregator.tier(50_000_001, 1), RiskTier::Critical);
        assert_eq!(aggregator.tier(50_000_000, 1), RiskTier::High);
        assert_eq!(aggregator.tier(1_000, 3), RiskTier::High);
        assert_eq!(aggregator.tier(10_000_001, 1), RiskTier::Medium);
        assert_eq!(aggregator.tier(1_000, 2), RiskTier::Medium);
        assert_eq!(aggregator.tier(10_000_000, 1), RiskTier::Low);
    }

    #[test]
    fn test_sorted_by_exposure_with_stable_ties() {
        let aggregator = CrossEntityRiskAggregator::default();
        let report = aggregator.analyze(&[
            create_item("BIAT", "A", 1_000_000),
            create_item("BIAT", "B", 5_000_000),
            create_item("UIB", "C", 1_000_000),
        ]);

        let codes: Vec<&str> = report.profiles.iter().map(|p| p.client_code.as_str()).collect();
        assert_eq!(codes, vec!["B", "A", "C"]);
        assert!(report.cross_bank.is_empty());
    }

    #[test]
    fn test_same_bank_counted_once() {
        let aggregator = CrossEntityRiskAggregator::default();
        let report = aggregator.analyze(&[
            create_item("BNA", "C1", 1_000_000),
            create_item("BNA", "C1", 2_000_000),
        ]);
        assert_eq!(report.profiles[0].bank_count, 1);
        assert_eq!(report.profiles[0].total_exposure, 3_000_000);
        assert_eq!(report.profiles[0].risk_tier, RiskTier::Low);
    }

    #[test]
    fn test_placeholders_are_excluded() {
        let aggregator = CrossEntityRiskAggregator::default();
        let report = aggregator.analyze(&[
            create_item("BIAT", "VARIOUS", 30_000_000),
            create_item("STB", "VARIOUS", 30_000_000),
            create_item("STB", "C2", 100_000),
        ]);

        assert_eq!(report.profiles.len(), 1);
        assert_eq!(report.unattributed_items, 2);
        assert_eq!(report.unattributed_exposure, 60_000_000);
        assert!(report.cross_bank.is_empty());
        assert_eq!(report.count_at_least(RiskTier::High), 0);
    }
}
