// 🔗 Reconciliation Matcher - expected collections vs. bank evidence
// Rule tables per instrument, one scoring engine.
//
//   EFFET   → bounced-item short-circuit, else score deposits
//   CHEQUE  → score deposits
//   GENERIC → score deposits
//
// Inside an exclusive group only the first satisfied rule scores
// (exact amount beats "within 5%", ≤3 days beats ≤7 days).

use crate::banks::BankId;
use crate::config::MatcherConfig;
use crate::model::{BankBouncedItem, BankDeposit, CollectionRecord, DepositRecord, InstrumentType};
use crate::normalize::days_apart;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Perfect,
    Partial,
    Unmatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Draft,
    Cheque,
    Generic,
    None,
}

impl MatchType {
    fn of(instrument: InstrumentType) -> Self {
        match instrument {
            InstrumentType::Draft => MatchType::Draft,
            InstrumentType::Cheque => MatchType::Cheque,
            InstrumentType::Generic => MatchType::Generic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub collection: CollectionRecord,
    pub matched_record: Option<BankDeposit>,
    pub matched_bounced_item: Option<BankBouncedItem>,
    /// 0-100
    pub confidence: u32,
    pub status: MatchStatus,
    pub match_type: MatchType,
    pub reasons: Vec<String>,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        self.status != MatchStatus::Unmatched
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub total: usize,
    pub perfect: usize,
    pub partial: usize,
    pub unmatched: usize,
    pub bounced: usize,
    /// (perfect + partial) / total, as a percentage
    pub match_rate: f64,
}

impl MatchSummary {
    pub fn from_results(results: &[MatchResult]) -> Self {
        let mut summary = MatchSummary {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.status {
                MatchStatus::Perfect => summary.perfect += 1,
                MatchStatus::Partial => summary.partial += 1,
                MatchStatus::Unmatched => summary.unmatched += 1,
            }
            if result.matched_bounced_item.is_some() {
                summary.bounced += 1;
            }
        }
        if summary.total > 0 {
            summary.match_rate =
                (summary.perfect + summary.partial) as f64 / summary.total as f64 * 100.0;
        }
        summary
    }
}

// ============================================================================
// RULE TABLES
// ============================================================================

type Predicate = fn(&MatcherConfig, &CollectionRecord, &DepositRecord) -> bool;

pub struct ScoringRule {
    pub name: &'static str,
    pub weight: u32,
    /// Rules sharing a group are mutually exclusive; first satisfied wins
    pub group: Option<&'static str>,
    pub test: Predicate,
}

const fn rule(name: &'static str, weight: u32, group: Option<&'static str>, test: Predicate) -> ScoringRule {
    ScoringRule { name, weight, group, test }
}

pub const DRAFT_RULES: &[ScoringRule] = &[
    rule("amount exact", 50, Some("amount"), amount_exact),
    rule("amount within tolerance", 30, Some("amount"), amount_within),
    rule("draft label", 20, None, has_draft_label),
    rule("due date within near window", 20, Some("date"), due_date_near),
    rule("due date within far window", 10, Some("date"), due_date_far),
    rule("client code", 10, None, same_client),
];

pub const CHEQUE_RULES: &[ScoringRule] = &[
    rule("amount exact", 40, Some("amount"), amount_exact),
    rule("amount within tolerance", 25, Some("amount"), amount_within),
    rule("check number in reference", 30, None, reference_has_check_number),
    rule("cheque label", 20, None, has_cheque_label),
    rule("client code", 10, None, same_client),
];

pub const GENERIC_RULES: &[ScoringRule] = &[
    rule("amount exact", 50, Some("amount"), amount_exact),
    rule("amount within tolerance", 30, Some("amount"), amount_within),
    rule("instrument label", 20, None, has_any_label),
    rule("statement date within near window", 20, Some("date"), statement_date_near),
    rule("statement date within far window", 10, Some("date"), statement_date_far),
    rule("client code", 10, None, same_client),
];

pub fn rules_for(instrument: InstrumentType) -> &'static [ScoringRule] {
    match instrument {
        InstrumentType::Draft => DRAFT_RULES,
        InstrumentType::Cheque => CHEQUE_RULES,
        InstrumentType::Generic => GENERIC_RULES,
    }
}

fn amount_exact(_: &MatcherConfig, c: &CollectionRecord, d: &DepositRecord) -> bool {
    d.amount == c.amount
}

fn amount_within(cfg: &MatcherConfig, c: &CollectionRecord, d: &DepositRecord) -> bool {
    let diff = d.amount.abs_diff(c.amount) as f64;
    diff <= c.amount.unsigned_abs() as f64 * cfg.amount_tolerance_ratio
}

fn label_contains(label: &str, keywords: &[String]) -> bool {
    let label = label.to_uppercase();
    keywords
        .iter()
        .any(|k| !k.trim().is_empty() && label.contains(&k.trim().to_uppercase()))
}

fn has_draft_label(cfg: &MatcherConfig, _: &CollectionRecord, d: &DepositRecord) -> bool {
    label_contains(&d.instrument_type, &cfg.draft_labels)
}

fn has_cheque_label(cfg: &MatcherConfig, _: &CollectionRecord, d: &DepositRecord) -> bool {
    label_contains(&d.instrument_type, &cfg.cheque_labels)
}

fn has_any_label(_: &MatcherConfig, _: &CollectionRecord, d: &DepositRecord) -> bool {
    !d.instrument_type.trim().is_empty()
}

fn due_date_near(cfg: &MatcherConfig, c: &CollectionRecord, d: &DepositRecord) -> bool {
    c.draft_due_date
        .is_some_and(|due| days_apart(due, d.effective_date()) <= cfg.near_day_window)
}

fn due_date_far(cfg: &MatcherConfig, c: &CollectionRecord, d: &DepositRecord) -> bool {
    c.draft_due_date
        .is_some_and(|due| days_apart(due, d.effective_date()) <= cfg.far_day_window)
}

fn statement_date_near(cfg: &MatcherConfig, c: &CollectionRecord, d: &DepositRecord) -> bool {
    days_apart(c.statement_date, d.effective_date()) <= cfg.near_day_window
}

fn statement_date_far(cfg: &MatcherConfig, c: &CollectionRecord, d: &DepositRecord) -> bool {
    days_apart(c.statement_date, d.effective_date()) <= cfg.far_day_window
}

fn reference_has_check_number(_: &MatcherConfig, c: &CollectionRecord, d: &DepositRecord) -> bool {
    match (c.check_number.as_deref(), d.reference.as_deref()) {
        (Some(number), Some(reference)) if !number.trim().is_empty() => reference
            .to_uppercase()
            .contains(&number.trim().to_uppercase()),
        _ => false,
    }
}

fn same_client(_: &MatcherConfig, c: &CollectionRecord, d: &DepositRecord) -> bool {
    d.client_code
        .as_deref()
        .is_some_and(|code| same_client_code(code, &c.client_code))
}

/// Trimmed, case-insensitive
pub fn same_client_code(a: &str, b: &str) -> bool {
    let a = a.trim();
    !a.is_empty() && a.to_uppercase() == b.trim().to_uppercase()
}

/// Sum the weights of satisfied rules, honoring exclusive groups
pub fn score(
    rules: &[ScoringRule],
    config: &MatcherConfig,
    collection: &CollectionRecord,
    deposit: &DepositRecord,
) -> (u32, Vec<String>) {
    let mut total = 0u32;
    let mut reasons = Vec::new();
    let mut taken: Vec<&'static str> = Vec::new();

    for rule in rules {
        if let Some(group) = rule.group {
            if taken.contains(&group) {
                continue;
            }
        }
        if (rule.test)(config, collection, deposit) {
            total += rule.weight;
            reasons.push(format!("{} (+{})", rule.name, rule.weight));
            if let Some(group) = rule.group {
                taken.push(group);
            }
        }
    }

    (total.min(100), reasons)
}

// ============================================================================
// MATCHER
// ============================================================================

pub struct ReconciliationMatcher {
    config: MatcherConfig,
}

impl ReconciliationMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        ReconciliationMatcher { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn status_for(&self, confidence: u32) -> MatchStatus {
        if confidence >= self.config.perfect_threshold {
            MatchStatus::Perfect
        } else if confidence >= self.config.partial_threshold {
            MatchStatus::Partial
        } else {
            MatchStatus::Unmatched
        }
    }

    /// Match every collection against the period's evidence, in input order
    pub fn match_all(
        &self,
        collections: &[CollectionRecord],
        deposits: &[BankDeposit],
        bounced: &[BankBouncedItem],
    ) -> Vec<MatchResult> {
        let results: Vec<MatchResult> = collections
            .iter()
            .map(|c| self.match_collection(c, deposits, bounced))
            .collect();

        let summary = MatchSummary::from_results(&results);
        info!(
            total = summary.total,
            perfect = summary.perfect,
            partial = summary.partial,
            unmatched = summary.unmatched,
            "reconciliation matched"
        );
        results
    }

    pub fn match_collection(
        &self,
        collection: &CollectionRecord,
        deposits: &[BankDeposit],
        bounced: &[BankBouncedItem],
    ) -> MatchResult {
        if collection.instrument_type == InstrumentType::Draft {
            if let Some(item) = self.find_bounced(collection, bounced) {
                let confidence = self.config.bounced_confidence.min(100);
                debug!(client = %collection.client_code, bank = %item.bank, "draft matched a bounced item");
                return MatchResult {
                    collection: collection.clone(),
                    matched_record: None,
                    matched_bounced_item: Some(item.clone()),
                    confidence,
                    status: self.status_for(confidence),
                    match_type: MatchType::Draft,
                    reasons: vec![format!(
                        "bounced draft at {} (due {}, amount {})",
                        item.bank, item.record.due_date, item.record.amount
                    )],
                };
            }
        }

        let rules = rules_for(collection.instrument_type);
        let mut best: Option<(&BankDeposit, u32, Vec<String>)> = None;

        for deposit in deposits.iter().filter(|d| self.in_scope(collection, &d.bank)) {
            let (points, reasons) = score(rules, &self.config, collection, &deposit.record);
            // strict: ties keep the earlier candidate
            if best.as_ref().map_or(true, |(_, b, _)| points > *b) {
                best = Some((deposit, points, reasons));
            }
        }

        match best {
            Some((deposit, confidence, reasons)) => {
                let status = self.status_for(confidence);
                let matched = status != MatchStatus::Unmatched;
                MatchResult {
                    collection: collection.clone(),
                    matched_record: matched.then(|| deposit.clone()),
                    matched_bounced_item: None,
                    confidence,
                    status,
                    match_type: if matched {
                        MatchType::of(collection.instrument_type)
                    } else {
                        MatchType::None
                    },
                    reasons,
                }
            }
            None => MatchResult {
                collection: collection.clone(),
                matched_record: None,
                matched_bounced_item: None,
                confidence: 0,
                status: MatchStatus::Unmatched,
                match_type: MatchType::None,
                reasons: vec!["no candidate deposits".to_string()],
            },
        }
    }

    fn find_bounced<'a>(
        &self,
        collection: &CollectionRecord,
        bounced: &'a [BankBouncedItem],
    ) -> Option<&'a BankBouncedItem> {
        let due = collection.draft_due_date?;
        bounced.iter().find(|item| {
            self.in_scope(collection, &item.bank)
                && same_client_code(&item.record.client_code, &collection.client_code)
                && days_apart(item.record.due_date, due) <= self.config.bounced_day_window
                && u64::try_from(self.config.bounced_amount_tolerance)
                    .is_ok_and(|tolerance| item.record.amount.abs_diff(collection.amount) < tolerance)
        })
    }

    fn in_scope(&self, collection: &CollectionRecord, bank: &str) -> bool {
        if !self.config.restrict_to_collection_bank {
            return true;
        }
        match collection.bank_name.as_deref() {
            Some(wanted) if !wanted.trim().is_empty() => same_bank(wanted, bank),
            _ => true,
        }
    }
}

impl Default for ReconciliationMatcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}

fn same_bank(a: &str, b: &str) -> bool {
    match (BankId::from_name(a), BankId::from_name(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
