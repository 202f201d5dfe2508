// Statement Reconciliation - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod config;
pub mod normalize;      // Amounts + dates per bank number format
pub mod model;          // Statements, line items, collections
pub mod quality;
pub mod positions;      // Positioned text → columns → rows
pub mod calibration;    // Column fit vs. bank templates
pub mod banks;          // Six bank profiles + detection
pub mod grammar;        // Section FSM over statement text
pub mod validator;
pub mod matcher;
pub mod risk;
pub mod alerts;
pub mod parser;         // Page sources + document extraction
pub mod pipeline;
pub mod db;

// Re-export commonly used types
pub use error::{OperationResult, ReconError, Warning, WarningKind};
pub use config::{
    AlertConfig, ExtractionConfig, MatcherConfig, PipelineConfig, RiskConfig, ValidatorConfig,
};
pub use normalize::{format_amount, parse_amount, parse_date, NumberFormat};
pub use model::{
    BankBouncedItem, BankDeposit, BouncedItemRecord, CheckRecord, CollectionRecord,
    DepositRecord, FacilityRecord, InstrumentType, Statement, StatementRecord,
};
pub use quality::{QualityIssue, Severity};
pub use positions::{Column, ColumnBoundary, PositionalPage, TextItem, TextPositionIndexer};
pub use calibration::{CalibrationReport, ColumnCalibrationEngine, ColumnTemplate, ContentType};
pub use banks::{BankId, BankProfile, BankRegistry, Detection};
pub use grammar::{Extraction, SectionGrammarExtractor, SectionKind};
pub use validator::{BalanceCheck, StatementValidator, ValidationReport};
pub use matcher::{MatchResult, MatchStatus, MatchSummary, MatchType, ReconciliationMatcher};
pub use risk::{ClientRiskProfile, CrossEntityRiskAggregator, RiskReport, RiskTier};
pub use alerts::{Alert, AlertGenerator, AlertType};
pub use parser::{
    gather_pages, DocumentSource, ExtractedDocument, MemorySource, PageContent,
    StatementExtractor, TabularPage,
};
pub use pipeline::{DocumentInput, PeriodReport, ReconciliationPipeline};
pub use db::{
    get_bounced_items_for_period, get_statements_for_period, load_collections_csv,
    open_database, setup_database, statement_count, upsert_statement, UpsertOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
