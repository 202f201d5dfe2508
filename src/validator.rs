// ⚖️ Statement Validator - does the statement add up?
//
//   expected_closing = opening + Σ uncredited deposits − Σ outstanding checks
//
// A mismatch beyond tolerance is a warning: the statement is still persisted.
// The only hard error is arithmetic overflow while summing.

use crate::config::ValidatorConfig;
use crate::error::{Warning, WarningKind};
use crate::model::{is_placeholder_client, Statement};
use crate::normalize::{format_amount, NumberFormat};
use crate::quality::{QualityIssue, Severity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// BALANCE CHECK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BalanceCheck {
    /// Reported closing balance is within tolerance of the expected one
    Balanced {
        expected_closing: i64,
        reported_closing: i64,
        discrepancy: i64,
        tolerance: i64,
    },

    /// Off by more than tolerance
    Mismatch {
        expected_closing: i64,
        reported_closing: i64,
        /// reported − expected
        discrepancy: i64,
        tolerance: i64,
    },

    /// Sums overflowed; nothing to compare
    Unavailable { reason: String },
}

impl BalanceCheck {
    pub fn is_balanced(&self) -> bool {
        matches!(self, BalanceCheck::Balanced { .. })
    }

    pub fn discrepancy(&self) -> i64 {
        match self {
            BalanceCheck::Balanced { discrepancy, .. } => *discrepancy,
            BalanceCheck::Mismatch { discrepancy, .. } => *discrepancy,
            BalanceCheck::Unavailable { .. } => 0,
        }
    }
}

// ============================================================================
// VALIDATION REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub bank: String,
    pub statement_date: NaiveDate,
    /// No hard errors; mismatches alone never clear it
    pub is_valid: bool,
    pub balance: BalanceCheck,
    pub total_deposits: i64,
    pub total_checks: i64,
    pub issues: Vec<QualityIssue>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn summary(&self) -> String {
        format!(
            "{} {}: {} ({} issues{})",
            self.bank,
            self.statement_date,
            if self.balance.is_balanced() {
                "balanced".to_string()
            } else {
                format!(
                    "off by {}",
                    format_amount(self.balance.discrepancy(), &NumberFormat::SPACE_COMMA)
                )
            },
            self.issues.len(),
            if self.is_valid { "" } else { ", INVALID" }
        )
    }

    /// Findings as pipeline warnings
    pub fn warnings(&self) -> Vec<Warning> {
        self.issues
            .iter()
            .filter(|i| i.severity != Severity::Info)
            .map(|i| Warning::new(WarningKind::ValidationMismatch, i.to_string()))
            .collect()
    }

    pub fn has_facility_overuse(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.field.starts_with("facilities") && i.issue.contains("exceeds limit"))
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

pub struct StatementValidator {
    config: ValidatorConfig,
}

impl StatementValidator {
    pub fn new() -> Self {
        Self::with_config(ValidatorConfig::default())
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        StatementValidator { config }
    }

    /// `max(min_tolerance, |reported| × tolerance_ratio)`
    pub fn tolerance(&self, reported_closing: i64) -> i64 {
        let proportional = (reported_closing.unsigned_abs() as f64 * self.config.tolerance_ratio) as i64;
        proportional.max(self.config.min_tolerance)
    }

    pub fn validate(&self, statement: &Statement) -> ValidationReport {
        let mut issues = Vec::new();
        let mut errors = Vec::new();

        let total_deposits = checked_sum(statement.deposits.iter().map(|d| d.amount));
        let total_checks = checked_sum(statement.checks.iter().map(|c| c.amount));

        let expected = match (total_deposits, total_checks) {
            (Some(deposits), Some(checks)) => statement
                .opening_balance
                .checked_add(deposits)
                .and_then(|v| v.checked_sub(checks)),
            _ => None,
        };

        let balance = match expected {
            Some(expected_closing) => {
                let reported_closing = statement.closing_balance;
                let discrepancy = reported_closing.saturating_sub(expected_closing);
                let tolerance = self.tolerance(reported_closing);
                if discrepancy.unsigned_abs() <= tolerance.unsigned_abs() {
                    BalanceCheck::Balanced {
                        expected_closing,
                        reported_closing,
                        discrepancy,
                        tolerance,
                    }
                } else {
                    issues.push(QualityIssue::warning(
                        "closing_balance",
                        format!(
                            "reported closing {} differs from expected {} by {} (tolerance {})",
                            fmt(reported_closing),
                            fmt(expected_closing),
                            fmt(discrepancy),
                            fmt(tolerance)
                        ),
                        "Check for missing uncredited deposits or outstanding checks",
                    ));
                    BalanceCheck::Mismatch {
                        expected_closing,
                        reported_closing,
                        discrepancy,
                        tolerance,
                    }
                }
            }
            None => {
                let reason = "sum of statement amounts overflows".to_string();
                errors.push(reason.clone());
                issues.push(QualityIssue::new(
                    Severity::Critical,
                    "balances",
                    reason.clone(),
                    "Review extracted amounts; a clamped value is likely involved",
                ));
                BalanceCheck::Unavailable { reason }
            }
        };

        self.check_balances(statement, &mut issues);
        self.check_facilities(statement, &mut issues);
        self.check_bounced_items(statement, &mut issues);

        ValidationReport {
            bank: statement.bank.name().to_string(),
            statement_date: statement.statement_date,
            is_valid: errors.is_empty(),
            balance,
            total_deposits: total_deposits.unwrap_or(0),
            total_checks: total_checks.unwrap_or(0),
            issues,
            errors,
        }
    }

    fn check_balances(&self, statement: &Statement, issues: &mut Vec<QualityIssue>) {
        for (field, value) in [
            ("opening_balance", statement.opening_balance),
            ("closing_balance", statement.closing_balance),
        ] {
            if value < 0 {
                issues.push(QualityIssue::warning(
                    field,
                    format!("negative balance {}", fmt(value)),
                    "Confirm the account is overdrawn",
                ));
            }
        }
    }

    fn check_facilities(&self, statement: &Statement, issues: &mut Vec<QualityIssue>) {
        for (i, facility) in statement.facilities.iter().enumerate() {
            let field = format!("facilities[{}]", i);
            if facility.used_amount > facility.limit_amount {
                issues.push(QualityIssue::warning(
                    &field,
                    format!(
                        "{}: used {} exceeds limit {}",
                        facility.facility_type,
                        fmt(facility.used_amount),
                        fmt(facility.limit_amount)
                    ),
                    "Facility overused; contact the bank",
                ));
            }
            let deviation = facility.availability_deviation();
            if deviation > self.config.facility_deviation {
                issues.push(QualityIssue::warning(
                    &field,
                    format!(
                        "{}: available {} is off limit − used by {}",
                        facility.facility_type,
                        fmt(facility.available_amount),
                        fmt(deviation)
                    ),
                    "Re-check the facility line extraction",
                ));
            }
        }
    }

    fn check_bounced_items(&self, statement: &Statement, issues: &mut Vec<QualityIssue>) {
        for (i, item) in statement.bounced_items.iter().enumerate() {
            let field = format!("bounced_items[{}]", i);
            if is_placeholder_client(&item.client_code) {
                issues.push(QualityIssue::warning(
                    &field,
                    format!("missing or placeholder client code '{}'", item.client_code),
                    "Bounced exposure cannot be attributed to a client",
                ));
            }
            if item.amount <= 0 {
                issues.push(QualityIssue::warning(
                    &field,
                    format!("non-positive amount {}", fmt(item.amount)),
                    "Re-check the bounced item extraction",
                ));
            }
        }
    }
}

impl Default for StatementValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn checked_sum(values: impl Iterator<Item = i64>) -> Option<i64> {
    values.fold(Some(0i64), |acc, v| acc.and_then(|a| a.checked_add(v)))
}

fn fmt(value: i64) -> String {
    format_amount(value, &NumberFormat::SPACE_COMMA)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banks::BankId;
    use crate::model::{BouncedItemRecord, CheckRecord, DepositRecord, FacilityRecord};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_statement(opening: i64, deposits: i64, checks: i64, closing: i64) -> Statement {
        let mut statement = Statement::new(BankId::Biat, date(2025, 6, 30));
        statement.opening_balance = opening;
        statement.closing_balance = closing;
        statement.deposits.push(DepositRecord {
            deposit_date: date(2025, 6, 20),
            value_date: None,
            instrument_type: "EFFET".to_string(),
            client_code: Some("C1".to_string()),
            reference: None,
            amount: deposits,
        });
        statement.checks.push(CheckRecord {
            issue_date: date(2025, 6, 18),
            check_number: "0012345".to_string(),
            payee: None,
            amount: checks,
        });
        statement
    }

    #[test]
    fn test_balanced_statement_has_no_warning() {
        let validator = StatementValidator::new();
        let report = validator.validate(&create_statement(15_450_000, 1_250_000, 750_000, 15_950_000));

        assert!(report.is_valid);
        assert!(report.balance.is_balanced());
        assert_eq!(report.balance.discrepancy(), 0);
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn test_mismatch_reports_signed_discrepancy() {
        let validator = StatementValidator::new();
        let report = validator.validate(&create_statement(15_450_000, 1_250_000, 750_000, 20_000_000));

        assert!(report.is_valid);
        match &report.balance {
            BalanceCheck::Mismatch {
                expected_closing,
                discrepancy,
                tolerance,
                ..
            } => {
                assert_eq!(*expected_closing, 15_950_000);
                assert_eq!(*discrepancy, 4_050_000);
                assert_eq!(*tolerance, 200_000);
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
        assert_eq!(report.warnings().len(), 1);
        assert_eq!(report.warnings()[0].kind, WarningKind::ValidationMismatch);
    }

    #[test]
    fn test_tolerance_floor_and_ratio() {
        let validator = StatementValidator::new();
        assert_eq!(validator.tolerance(100_000), 10_000);
        assert_eq!(validator.tolerance(20_000_000), 200_000);
        assert_eq!(validator.tolerance(-20_000_000), 200_000);

        let report = validator.validate(&create_statement(1_000_000, 0, 0, 1_009_000));
        assert!(report.balance.is_balanced());
    }

    #[test]
    fn test_facility_and_bounced_advisories() {
        let validator = StatementValidator::new();
        let mut statement = create_statement(-5_000, 0, 0, -5_000);
        statement.facilities.push(FacilityRecord {
            facility_type: "ESCOMPTE".to_string(),
            limit_amount: 30_000_000,
            used_amount: 31_000_000,
            available_amount: 0,
        });
        statement.bounced_items.push(BouncedItemRecord {
            due_date: date(2025, 6, 20),
            return_date: None,
            client_code: "VARIOUS".to_string(),
            description: None,
            amount: 0,
        });

        let report = validator.validate(&statement);

        assert!(report.is_valid);
        assert!(report.has_facility_overuse());
        let text: Vec<String> = report.issues.iter().map(|i| i.issue.clone()).collect();
        assert!(text.iter().any(|t| t.contains("negative balance")));
        assert!(text.iter().any(|t| t.contains("off limit")));
        assert!(text.iter().any(|t| t.contains("placeholder client")));
        assert!(text.iter().any(|t| t.contains("non-positive")));
    }

    #[test]
    fn test_overflow_is_the_only_hard_error() {
        let validator = StatementValidator::new();
        let mut statement = create_statement(i64::MAX, 1, 0, 0);
        statement.deposits.push(statement.deposits[0].clone());

        let report = validator.validate(&statement);

        assert!(!report.is_valid);
        assert!(matches!(report.balance, BalanceCheck::Unavailable { .. }));
        assert_eq!(report.errors.len(), 1);
    }
}
