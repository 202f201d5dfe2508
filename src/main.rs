use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use statement_recon::{
    db, format_amount, load_collections_csv, open_database, upsert_statement, BankId,
    BankRegistry, CrossEntityRiskAggregator, DocumentInput, MemorySource, NumberFormat,
    PipelineConfig, ReconciliationPipeline, StatementExtractor, StatementValidator,
};

#[derive(Parser, Debug)]
#[command(name = "statement-recon", version, about = "Bank statement extraction and collection reconciliation")]
struct Cli {
    /// Pipeline configuration (JSON); defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List supported banks
    Banks,

    /// Extract one statement (text, CSV rows or positional JSON)
    Extract {
        file: PathBuf,

        /// Skip detection and use this bank
        #[arg(long)]
        bank: Option<BankId>,

        /// Date used when the statement date is unreadable (YYYY-MM-DD)
        #[arg(long)]
        processing_date: Option<NaiveDate>,

        /// Store the statement in this database
        #[arg(long)]
        db: Option<PathBuf>,

        /// Print the extraction as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract statements, then match them against the collection ledger
    Reconcile {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Collection ledger CSV
        #[arg(long)]
        collections: PathBuf,

        #[arg(long)]
        processing_date: Option<NaiveDate>,

        #[arg(long)]
        db: Option<PathBuf>,

        /// Write the period report as JSON
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Cross-bank bounced exposure for a stored period
    Risk {
        #[arg(long)]
        db: PathBuf,

        /// YYYY-MM
        #[arg(long)]
        period: String,

        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Banks => run_banks(),
        Command::Extract {
            file,
            bank,
            processing_date,
            db,
            json,
        } => run_extract(&config, &file, bank, processing_date, db.as_deref(), json).await,
        Command::Reconcile {
            files,
            collections,
            processing_date,
            db,
            out,
        } => run_reconcile(&config, &files, &collections, processing_date, db.as_deref(), out.as_deref()).await,
        Command::Risk { db, period, json } => run_risk(&config, &db, &period, json),
    }
}

fn money(value: i64) -> String {
    format_amount(value, &NumberFormat::SPACE_COMMA)
}

fn run_banks() -> Result<()> {
    let registry = BankRegistry::new()?;
    println!("🏦 {} supported banks", registry.count());
    for profile in registry.all() {
        println!(
            "  {:<10} {:<16} {:?}, {} columns, sections: {}",
            profile.id.code(),
            profile.id.name(),
            profile.language,
            profile.templates.len(),
            profile
                .grammar
                .kinds()
                .iter()
                .map(|k| k.code())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}

async fn run_extract(
    config: &PipelineConfig,
    file: &Path,
    bank: Option<BankId>,
    processing_date: Option<NaiveDate>,
    db_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let registry = Arc::new(BankRegistry::new()?);
    let extractor = StatementExtractor::new(registry, config.extraction.clone());
    let source = MemorySource::from_path(file)
        .with_context(|| format!("Failed to read document: {}", file.display()))?;

    let processing_date = processing_date.unwrap_or_else(|| Utc::now().date_naive());
    let result = extractor.extract(&source, bank, processing_date).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for warning in &result.warnings {
            println!("⚠️  {}", warning);
        }
    }

    let doc = result.into_result()?;
    let validation = StatementValidator::with_config(config.validator.clone()).validate(&doc.statement);

    if !json {
        let s = &doc.statement;
        println!("📄 {} → {} ({})", doc.name, doc.bank, s.statement_date);
        if let Some(confidence) = doc.detection_confidence {
            println!("   detection confidence {:.2}", confidence);
        }
        for (page, report) in doc.calibration.iter().enumerate() {
            println!("   columns #{}: {}", page + 1, report.summary());
        }
        println!(
            "   opening {}  closing {}",
            money(s.opening_balance),
            money(s.closing_balance)
        );
        println!(
            "   {} deposits, {} checks, {} facilities, {} bounced items",
            s.deposits.len(),
            s.checks.len(),
            s.facilities.len(),
            s.bounced_items.len()
        );
        println!("   {}", validation.summary());
        for issue in &validation.issues {
            println!("   - {}", issue);
        }
    }

    if let Some(path) = db_path {
        let conn = open_database(path)?;
        let outcome = upsert_statement(&conn, &doc.statement)?;
        println!("💾 {:?}", outcome);
    }

    Ok(())
}

async fn run_reconcile(
    config: &PipelineConfig,
    files: &[PathBuf],
    collections_path: &Path,
    processing_date: Option<NaiveDate>,
    db_path: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let registry = Arc::new(BankRegistry::new()?);
    let pipeline = ReconciliationPipeline::new(registry, config);

    let collections = load_collections_csv(collections_path)?;
    let documents = files
        .iter()
        .map(|path| {
            MemorySource::from_path(path)
                .with_context(|| format!("Failed to read document: {}", path.display()))
                .map(DocumentInput::new)
        })
        .collect::<Result<Vec<_>>>()?;

    let processing_date = processing_date.unwrap_or_else(|| Utc::now().date_naive());
    let report = pipeline
        .run(&documents, &collections, processing_date, Utc::now())
        .await;

    if let Some(path) = db_path {
        let conn = open_database(path)?;
        let mut inserted = 0;
        for statement in &report.statements {
            if upsert_statement(&conn, statement)?.is_inserted() {
                inserted += 1;
            }
        }
        println!(
            "💾 {} new statements ({} already stored)",
            inserted,
            report.statements.len() - inserted
        );
    }

    let summary = &report.summary;
    println!("🔄 Run {}", report.run_id);
    println!(
        "   documents: {} ({} failed), statements: {} ({} unbalanced)",
        summary.documents, summary.failed_documents, summary.statements, summary.unbalanced_statements
    );
    for doc in report.documents.iter().filter(|d| !d.success) {
        println!("   ❌ {}: {}", doc.name, doc.errors.join("; "));
    }
    println!(
        "   matches: {} perfect, {} partial, {} unmatched ({:.1}%)",
        summary.matches.perfect, summary.matches.partial, summary.matches.unmatched, summary.matches.match_rate
    );
    println!(
        "   risk: {} clients HIGH or above, {} cross-bank",
        summary.clients_at_risk, summary.cross_bank_clients
    );
    for alert in &report.alerts {
        println!("   🚨 [{:?}] {}", alert.alert_type, alert.title);
    }

    if let Some(path) = out {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        println!("✓ Report written to {}", path.display());
    }

    Ok(())
}

fn run_risk(config: &PipelineConfig, db_path: &Path, period: &str, json: bool) -> Result<()> {
    let conn = open_database(db_path)?;
    let bounced = db::get_bounced_items_for_period(&conn, period)?;
    let report = CrossEntityRiskAggregator::new(config.risk.clone()).analyze(&bounced);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("⚠️  Bounced exposure for {} ({} items)", period, bounced.len());
    for profile in &report.profiles {
        println!(
            "  {:<8} {:<12} {:>16}  {}",
            profile.risk_tier.as_str(),
            profile.client_code,
            money(profile.total_exposure),
            profile.banks.join(", ")
        );
    }
    if report.unattributed_items > 0 {
        println!(
            "  ({} items without a client code, {})",
            report.unattributed_items,
            money(report.unattributed_exposure)
        );
    }
    Ok(())
}
