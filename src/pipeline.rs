// 🔄 Period pipeline
//
//   extract (concurrent, per document) ─┐
//                                       ├─ barrier ─→ validate → match → risk → alerts
//   collections ────────────────────────┘
//
// Matching and aggregation only ever see the complete snapshot.

use crate::alerts::{Alert, AlertGenerator};
use crate::banks::{BankId, BankRegistry};
use crate::config::PipelineConfig;
use crate::error::Warning;
use crate::matcher::{MatchResult, MatchSummary, ReconciliationMatcher};
use crate::model::{bounced_items_of, deposits_of, CollectionRecord, Statement};
use crate::parser::{DocumentSource, StatementExtractor};
use crate::risk::{CrossEntityRiskAggregator, RiskReport};
use crate::validator::{StatementValidator, ValidationReport};
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// One document to extract, optionally with the bank chosen by hand
pub struct DocumentInput<S> {
    pub source: S,
    pub bank: Option<BankId>,
}

impl<S> DocumentInput<S> {
    pub fn new(source: S) -> Self {
        DocumentInput { source, bank: None }
    }

    pub fn with_bank(mut self, bank: BankId) -> Self {
        self.bank = Some(bank);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentOutcome {
    pub name: String,
    pub success: bool,
    pub bank: Option<BankId>,
    pub statement_date: Option<NaiveDate>,
    pub records: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub documents: usize,
    pub failed_documents: usize,
    pub statements: usize,
    pub unbalanced_statements: usize,
    pub matches: MatchSummary,
    pub clients_at_risk: usize,
    pub cross_bank_clients: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub documents: Vec<DocumentOutcome>,
    /// Successfully extracted statements, in document order
    #[serde(skip)]
    pub statements: Vec<Statement>,
    pub validations: Vec<ValidationReport>,
    pub matches: Vec<MatchResult>,
    pub summary: PeriodSummary,
    pub risk: RiskReport,
    pub alerts: Vec<Alert>,
}

/// Components built once from configuration and shared by reference
pub struct ReconciliationPipeline {
    extractor: StatementExtractor,
    validator: StatementValidator,
    matcher: ReconciliationMatcher,
    aggregator: CrossEntityRiskAggregator,
    alerts: AlertGenerator,
}

impl ReconciliationPipeline {
    pub fn new(registry: Arc<BankRegistry>, config: &PipelineConfig) -> Self {
        ReconciliationPipeline {
            extractor: StatementExtractor::new(registry, config.extraction.clone()),
            validator: StatementValidator::with_config(config.validator.clone()),
            matcher: ReconciliationMatcher::new(config.matcher.clone()),
            aggregator: CrossEntityRiskAggregator::new(config.risk.clone()),
            alerts: AlertGenerator::new(config.alerts.clone()),
        }
    }

    pub fn extractor(&self) -> &StatementExtractor {
        &self.extractor
    }

    pub fn validator(&self) -> &StatementValidator {
        &self.validator
    }

    pub fn aggregator(&self) -> &CrossEntityRiskAggregator {
        &self.aggregator
    }

    /// Extract every document concurrently, then reconcile the snapshot
    pub async fn run<S: DocumentSource>(
        &self,
        documents: &[DocumentInput<S>],
        collections: &[CollectionRecord],
        processing_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> PeriodReport {
        let extractions = join_all(
            documents
                .iter()
                .map(|doc| self.extractor.extract(&doc.source, doc.bank, processing_date)),
        )
        .await;

        // barrier: every extraction has finished
        let mut outcomes = Vec::with_capacity(documents.len());
        let mut statements = Vec::new();
        for (doc, result) in documents.iter().zip(extractions) {
            let mut outcome = DocumentOutcome {
                name: doc.source.name().to_string(),
                success: result.success,
                bank: None,
                statement_date: None,
                records: 0,
                errors: result.errors,
                warnings: result.warnings,
            };
            match result.data {
                Some(extracted) if result.success => {
                    outcome.bank = Some(extracted.bank);
                    outcome.statement_date = Some(extracted.statement.statement_date);
                    outcome.records = extracted.statement.record_count();
                    statements.push(extracted.statement);
                }
                _ => {
                    warn!(document = %outcome.name, errors = ?outcome.errors, "document failed; left out of the period");
                }
            }
            outcomes.push(outcome);
        }

        self.reconcile(outcomes, statements, collections, now)
    }

    /// Validation, matching, risk and alerts over an already-extracted snapshot
    pub fn reconcile(
        &self,
        documents: Vec<DocumentOutcome>,
        statements: Vec<Statement>,
        collections: &[CollectionRecord],
        now: DateTime<Utc>,
    ) -> PeriodReport {
        let validations: Vec<ValidationReport> =
            statements.iter().map(|s| self.validator.validate(s)).collect();

        let deposits = deposits_of(&statements);
        let bounced = bounced_items_of(&statements);
        let matches = self.matcher.match_all(collections, &deposits, &bounced);
        let match_summary = MatchSummary::from_results(&matches);

        let risk = self.aggregator.analyze(&bounced);
        let alerts = self
            .alerts
            .generate(&statements, &validations, &risk, &match_summary, now);

        let summary = PeriodSummary {
            documents: documents.len(),
            failed_documents: documents.iter().filter(|d| !d.success).count(),
            statements: statements.len(),
            unbalanced_statements: validations.iter().filter(|v| !v.balance.is_balanced()).count(),
            matches: match_summary,
            clients_at_risk: risk.count_at_least(crate::risk::RiskTier::High),
            cross_bank_clients: risk.cross_bank.len(),
        };

        info!(
            statements = summary.statements,
            failed = summary.failed_documents,
            match_rate = summary.matches.match_rate,
            alerts = alerts.len(),
            "period reconciled"
        );

        PeriodReport {
            run_id: Uuid::new_v4().to_string(),
            generated_at: now,
            documents,
            statements,
            validations,
            matches,
            summary,
            risk,
            alerts,
        }
    }
}
