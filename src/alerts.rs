// 🚨 Alerts - data for an external notifier, never rendered here
//
// Sources: client exposure (risk), balance mismatches (validator),
// facility overuse (statements), low match rate (matcher).

use crate::config::AlertConfig;
use crate::matcher::MatchSummary;
use crate::model::Statement;
use crate::normalize::{format_amount, NumberFormat};
use crate::risk::{RiskReport, RiskTier};
use crate::validator::{BalanceCheck, ValidationReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub title: String,
    pub description: String,
    pub action: String,
    /// Machine-readable source: client_exposure, balance_mismatch, ...
    pub trigger: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub created_at: DateTime<Utc>,
}

pub struct AlertGenerator {
    config: AlertConfig,
}

impl AlertGenerator {
    pub fn new(config: AlertConfig) -> Self {
        AlertGenerator { config }
    }

    /// Critical first, then warnings, then info; generation order within a type
    pub fn generate(
        &self,
        statements: &[Statement],
        validations: &[ValidationReport],
        risk: &RiskReport,
        matches: &MatchSummary,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        self.risk_alerts(risk, now, &mut alerts);
        self.balance_alerts(validations, now, &mut alerts);
        self.facility_alerts(statements, now, &mut alerts);
        self.match_rate_alert(matches, now, &mut alerts);

        alerts.sort_by_key(|a| a.alert_type);
        alerts
    }

    fn risk_alerts(&self, risk: &RiskReport, now: DateTime<Utc>, out: &mut Vec<Alert>) {
        for profile in &risk.profiles {
            let alert_type = match profile.risk_tier {
                RiskTier::Critical => AlertType::Critical,
                RiskTier::High => AlertType::Warning,
                RiskTier::Medium if self.config.include_medium_risk && profile.is_cross_bank() => {
                    AlertType::Info
                }
                _ => continue,
            };

            out.push(Alert {
                id: new_id(),
                alert_type,
                title: format!("{} bounced exposure: {}", profile.risk_tier, profile.client_code),
                description: format!(
                    "{} bounced items total {} across {} bank(s): {}",
                    profile.client_code,
                    money(profile.total_exposure),
                    profile.bank_count,
                    profile.banks.join(", ")
                ),
                action: "Review the client's credit line and pending drafts".to_string(),
                trigger: "client_exposure".to_string(),
                value: Some(profile.total_exposure as f64),
                threshold: None,
                created_at: now,
            });
        }
    }

    fn balance_alerts(&self, validations: &[ValidationReport], now: DateTime<Utc>, out: &mut Vec<Alert>) {
        for report in validations {
            match &report.balance {
                BalanceCheck::Mismatch {
                    expected_closing,
                    reported_closing,
                    discrepancy,
                    tolerance,
                } => out.push(Alert {
                    id: new_id(),
                    alert_type: AlertType::Warning,
                    title: format!("Balance mismatch: {} {}", report.bank, report.statement_date),
                    description: format!(
                        "Reported closing {} vs expected {} (difference {})",
                        money(*reported_closing),
                        money(*expected_closing),
                        money(*discrepancy)
                    ),
                    action: "Check the statement for missing deposits or checks".to_string(),
                    trigger: "balance_mismatch".to_string(),
                    value: Some(discrepancy.unsigned_abs() as f64),
                    threshold: Some(*tolerance as f64),
                    created_at: now,
                }),
                BalanceCheck::Unavailable { reason } => out.push(Alert {
                    id: new_id(),
                    alert_type: AlertType::Critical,
                    title: format!("Balance check failed: {} {}", report.bank, report.statement_date),
                    description: reason.clone(),
                    action: "Review the extracted amounts".to_string(),
                    trigger: "balance_unavailable".to_string(),
                    value: None,
                    threshold: None,
                    created_at: now,
                }),
                BalanceCheck::Balanced { .. } => {}
            }
        }
    }

    fn facility_alerts(&self, statements: &[Statement], now: DateTime<Utc>, out: &mut Vec<Alert>) {
        for statement in statements {
            for facility in statement.facilities.iter().filter(|f| f.used_amount > f.limit_amount) {
                out.push(Alert {
                    id: new_id(),
                    alert_type: AlertType::Critical,
                    title: format!("Facility overuse: {} {}", statement.bank, facility.facility_type),
                    description: format!(
                        "Used {} on a limit of {} ({} over)",
                        money(facility.used_amount),
                        money(facility.limit_amount),
                        money(facility.used_amount.saturating_sub(facility.limit_amount))
                    ),
                    action: "Contact the bank before further drawdowns".to_string(),
                    trigger: "facility_overuse".to_string(),
                    value: Some(facility.used_amount as f64),
                    threshold: Some(facility.limit_amount as f64),
                    created_at: now,
                });
            }
        }
    }

    fn match_rate_alert(&self, matches: &MatchSummary, now: DateTime<Utc>, out: &mut Vec<Alert>) {
        if matches.total == 0 || matches.match_rate >= self.config.min_match_rate {
            return;
        }
        out.push(Alert {
            id: new_id(),
            alert_type: AlertType::Warning,
            title: "Low reconciliation match rate".to_string(),
            description: format!(
                "{} of {} collections matched ({:.1}%)",
                matches.perfect + matches.partial,
                matches.total,
                matches.match_rate
            ),
            action: "Review unmatched collections and missing statements".to_string(),
            trigger: "match_rate".to_string(),
            value: Some(matches.match_rate),
            threshold: Some(self.config.min_match_rate),
            created_at: now,
        });
    }
}

impl Default for AlertGenerator {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn money(value: i64) -> String {
    format_amount(value, &NumberFormat::SPACE_COMMA)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banks::BankId;
    use crate::model::{BankBouncedItem, BouncedItemRecord, FacilityRecord};
    use crate::risk::CrossEntityRiskAggregator;
    use crate::validator::StatementValidator;
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_bounced(bank: &str, client: &str, amount: i64) -> BankBouncedItem {
        BankBouncedItem {
            bank: bank.to_string(),
            record: BouncedItemRecord {
                due_date: date(2025, 6, 20),
                return_date: None,
                client_code: client.to_string(),
                description: None,
                amount,
            },
        }
    }

    #[test]
    fn test_quiet_period_has_no_alerts() {
        let generator = AlertGenerator::default();
        let alerts = generator.generate(&[], &[], &RiskReport::default(), &MatchSummary::default(), now());
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_alert_sources_and_ordering() {
        let mut statement = Statement::new(BankId::Attijari, date(2025, 6, 30));
        statement.opening_balance = 1_000_000;
        statement.closing_balance = 9_000_000;
        statement.facilities.push(FacilityRecord {
            facility_type: "DECOUVERT".to_string(),
            limit_amount: 30_000_000,
            used_amount: 31_000_000,
            available_amount: -1_000_000,
        });
        let validation = StatementValidator::new().validate(&statement);

        let risk = CrossEntityRiskAggregator::default().analyze(&[
            create_bounced("BIAT", "C1", 15_000_000),
            create_bounced("STB", "C1", 10_000_000),
        ]);
        let matches = MatchSummary {
            total: 4,
            perfect: 1,
            unmatched: 3,
            match_rate: 25.0,
            ..Default::default()
        };

        let alerts = AlertGenerator::default().generate(&[statement], &[validation], &risk, &matches, now());
        let triggers: Vec<&str> = alerts.iter().map(|a| a.trigger.as_str()).collect();

        assert_eq!(
            triggers,
            vec!["facility_overuse", "client_exposure", "balance_mismatch", "match_rate"]
        );
        assert_eq!(alerts[0].alert_type, AlertType::Critical);
        assert_eq!(alerts[3].threshold, Some(50.0));
        assert!(alerts.iter().all(|a| a.created_at == now()));
    }

    #[test]
    fn test_alert_json_shape() {
        let alert = Alert {
            id: "a1".to_string(),
            alert_type: AlertType::Warning,
            title: "t".to_string(),
            description: "d".to_string(),
            action: "a".to_string(),
            trigger: "match_rate".to_string(),
            value: None,
            threshold: Some(50.0),
            created_at: now(),
        };

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "warning");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("value").is_none());
        assert_eq!(json["threshold"], 50.0);
    }
}
