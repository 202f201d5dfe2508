// 🏗️ Document extraction
// Page source → raw text → bank → columns + calibration → grammar → Statement
//
// Page rendering is a capability (`DocumentSource`); the extractor only ever
// sees positioned text items, rows of cells, or plain text.

use crate::banks::{BankId, BankRegistry};
use crate::calibration::{configured_boundaries, BoundarySource, CalibrationReport, ColumnCalibrationEngine};
use crate::config::ExtractionConfig;
use crate::error::{OperationResult, ReconError, Result, Warning, WarningKind};
use crate::grammar::SectionGrammarExtractor;
use crate::model::Statement;
use crate::positions::{ColumnBoundary, PositionalPage, TextPositionIndexer};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

// ============================================================================
// PAGE SOURCES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularPage {
    pub rows: Vec<Vec<String>>,
}

impl TabularPage {
    /// Non-empty cells joined by a space, one line per row
    pub fn text(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.trim())
                    .filter(|cell| !cell.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageContent {
    Positional(PositionalPage),
    Tabular(TabularPage),
    Text(String),
}

/// Give me page text with per-item position, or rows of cells
pub trait DocumentSource: Send + Sync {
    fn name(&self) -> &str;

    fn page_count(&self) -> usize;

    fn load_page(&self, index: usize) -> impl Future<Output = Result<PageContent>> + Send;
}

/// Pages already in memory (files read by the CLI, request bodies in the API)
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    pages: Vec<PageContent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonPages {
    Many(Vec<PositionalPage>),
    One(PositionalPage),
}

impl MemorySource {
    pub fn new(name: &str, pages: Vec<PageContent>) -> Self {
        MemorySource {
            name: name.to_string(),
            pages,
        }
    }

    /// Plain text; form feeds separate pages
    pub fn from_text(name: &str, text: &str) -> Self {
        let pages = text
            .split('\u{000C}')
            .map(|page| PageContent::Text(page.to_string()))
            .collect();
        Self::new(name, pages)
    }

    /// One positional page or an array of them
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let pages = match serde_json::from_str::<JsonPages>(json)? {
            JsonPages::Many(pages) => pages,
            JsonPages::One(page) => vec![page],
        };
        Ok(Self::new(name, pages.into_iter().map(PageContent::Positional).collect()))
    }

    /// Every CSV row is one table row; the whole file is one page
    pub fn from_csv(name: &str, data: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self::new(name, vec![PageContent::Tabular(TabularPage { rows })]))
    }

    /// Pick the reader from the file extension (.json, .csv, anything else is text)
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "json" => Self::from_json(&name, &std::fs::read_to_string(path)?),
            "csv" => Self::from_csv(&name, &std::fs::read(path)?),
            "pdf" | "xls" | "xlsx" => Err(ReconError::UnsupportedDocument(format!(
                "{}: convert to text, CSV or positional JSON first",
                name
            ))),
            _ => Ok(Self::from_text(&name, &std::fs::read_to_string(path)?)),
        }
    }
}

impl DocumentSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn load_page(&self, index: usize) -> impl Future<Output = Result<PageContent>> + Send {
        let page = self.pages.get(index).cloned().ok_or_else(|| ReconError::MissingPage {
            document: self.name.clone(),
            page: index,
        });
        async move { page }
    }
}

// ============================================================================
// PAGE GATHERING
// ============================================================================

#[derive(Debug, Clone)]
pub struct GatheredPages {
    /// (page index, content), in page order
    pub pages: Vec<(usize, PageContent)>,
    pub total: usize,
    pub warnings: Vec<Warning>,
}

/// Load every page under a per-page timeout and a document deadline.
///
/// Timed-out and failed pages are skipped. Hitting the deadline stops the
/// scan; whatever was gathered is kept, and an empty harvest is an error.
pub async fn gather_pages<S: DocumentSource>(source: &S, config: &ExtractionConfig) -> Result<GatheredPages> {
    let total = source.page_count();
    let deadline = Instant::now() + Duration::from_millis(config.document_timeout_ms);
    let page_timeout = Duration::from_millis(config.page_timeout_ms);

    let mut pages = Vec::with_capacity(total);
    let mut warnings = Vec::new();
    let mut timed_out_pages = 0usize;
    let mut document_timed_out = false;

    for index in 0..total {
        let page_deadline = (Instant::now() + page_timeout).min(deadline);
        match timeout_at(page_deadline, source.load_page(index)).await {
            Ok(Ok(content)) => pages.push((index, content)),
            Ok(Err(e)) => {
                warn!(document = source.name(), page = index + 1, error = %e, "page failed");
                warnings.push(Warning::new(
                    WarningKind::PageFailure,
                    format!("page {} skipped: {}", index + 1, e),
                ));
            }
            Err(_) if Instant::now() >= deadline => {
                warn!(document = source.name(), page = index + 1, "document deadline reached");
                document_timed_out = true;
                break;
            }
            Err(_) => {
                warn!(document = source.name(), page = index + 1, "page timed out");
                timed_out_pages += 1;
            }
        }
    }

    if document_timed_out {
        if pages.is_empty() {
            return Err(ReconError::DocumentTimeout(source.name().to_string()));
        }
        warnings.push(Warning::new(
            WarningKind::PageTimeout,
            format!(
                "document deadline reached after {} of {} pages; keeping partial text",
                pages.len(),
                total
            ),
        ));
    }

    let skipped = total - pages.len();
    if total > 0 && skipped as f64 / total as f64 > config.max_skipped_page_fraction {
        warnings.push(Warning::new(
            WarningKind::PageTimeout,
            format!(
                "{} of {} pages skipped ({} timed out)",
                skipped, total, timed_out_pages
            ),
        ));
    }

    Ok(GatheredPages { pages, total, warnings })
}

// ============================================================================
// STATEMENT EXTRACTOR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedDocument {
    pub name: String,
    pub bank: BankId,
    /// None when the bank was chosen manually
    pub detection_confidence: Option<f64>,
    pub statement: Statement,
    pub calibration: Vec<CalibrationReport>,
    pub pages_total: usize,
    pub pages_read: usize,
}

pub struct StatementExtractor {
    registry: Arc<BankRegistry>,
    grammar: SectionGrammarExtractor,
    indexer: TextPositionIndexer,
    calibrator: ColumnCalibrationEngine,
    config: ExtractionConfig,
}

impl StatementExtractor {
    pub fn new(registry: Arc<BankRegistry>, config: ExtractionConfig) -> Self {
        StatementExtractor {
            grammar: SectionGrammarExtractor::new(Arc::clone(&registry)),
            indexer: TextPositionIndexer::with_tolerances(config.row_tolerance, config.min_column_gap),
            calibrator: ColumnCalibrationEngine::new(),
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &BankRegistry {
        &self.registry
    }

    /// Extract one document; `bank` overrides detection
    pub async fn extract<S: DocumentSource>(
        &self,
        source: &S,
        bank: Option<BankId>,
        processing_date: NaiveDate,
    ) -> OperationResult<ExtractedDocument> {
        let gathered = match gather_pages(source, &self.config).await {
            Ok(gathered) => gathered,
            Err(e) => return OperationResult::from_error(e, Vec::new()),
        };
        self.extract_pages(source.name(), gathered, bank, processing_date)
    }

    /// Synchronous path for text that is already in hand
    pub fn extract_text(
        &self,
        name: &str,
        text: &str,
        bank: Option<BankId>,
        processing_date: NaiveDate,
    ) -> OperationResult<ExtractedDocument> {
        let gathered = GatheredPages {
            pages: vec![(0, PageContent::Text(text.to_string()))],
            total: 1,
            warnings: Vec::new(),
        };
        self.extract_pages(name, gathered, bank, processing_date)
    }

    fn extract_pages(
        &self,
        name: &str,
        gathered: GatheredPages,
        bank: Option<BankId>,
        processing_date: NaiveDate,
    ) -> OperationResult<ExtractedDocument> {
        let GatheredPages {
            pages,
            total,
            mut warnings,
        } = gathered;

        // Raw reading-order text, used for detection only
        let raw = pages
            .iter()
            .map(|(index, page)| self.raw_text(*index, page, &mut warnings))
            .collect::<Vec<_>>()
            .join("\n");
        if raw.trim().is_empty() {
            return OperationResult::from_error(ReconError::EmptyDocument(name.to_string()), warnings);
        }

        let (bank, detection_confidence) = match bank {
            Some(bank) => (bank, None),
            None => {
                let detection = self.registry.detect(&raw, self.config.detection_threshold);
                let confidence = detection.confidence;
                let result = detection.into_result();
                match result.data {
                    Some(bank) if result.success => (bank, Some(confidence)),
                    _ => {
                        warnings.extend(result.warnings);
                        let errors = result.errors;
                        return OperationResult {
                            success: false,
                            data: None,
                            errors,
                            warnings,
                        };
                    }
                }
            }
        };

        let mut calibration = Vec::new();
        let text = pages
            .iter()
            .map(|(index, page)| match page {
                PageContent::Positional(p) => {
                    match self.render_columns(bank, *index, p, &mut warnings) {
                        Some((text, report)) => {
                            calibration.push(report);
                            text
                        }
                        None => self.raw_text(*index, page, &mut Vec::new()),
                    }
                }
                other => self.raw_text(*index, other, &mut Vec::new()),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let extraction = self.grammar.extract(bank, &text, processing_date);
        warnings.extend(extraction.warnings);

        info!(
            document = name,
            bank = bank.code(),
            records = extraction.statement.record_count(),
            warnings = warnings.len(),
            "document extracted"
        );

        OperationResult::ok(
            ExtractedDocument {
                name: name.to_string(),
                bank,
                detection_confidence,
                statement: extraction.statement,
                calibration,
                pages_total: total,
                pages_read: pages.len(),
            },
            warnings,
        )
    }

    fn raw_text(&self, index: usize, page: &PageContent, warnings: &mut Vec<Warning>) -> String {
        match page {
            PageContent::Text(text) => text.clone(),
            PageContent::Tabular(table) => table.text(),
            PageContent::Positional(p) => {
                let whole = [ColumnBoundary::new(0.0, p.page_width)];
                match self.indexer.assign(&p.items, &whole, p.page_width) {
                    Ok(columns) => self.indexer.render(&columns),
                    Err(e) => {
                        warnings.push(Warning::new(
                            WarningKind::PageFailure,
                            format!("page {} unreadable: {}", index + 1, e),
                        ));
                        String::new()
                    }
                }
            }
        }
    }

    /// Render a positional page through the bank's columns and score the fit
    fn render_columns(
        &self,
        bank: BankId,
        index: usize,
        page: &PositionalPage,
        warnings: &mut Vec<Warning>,
    ) -> Option<(String, CalibrationReport)> {
        let profile = self.registry.profile(bank);
        let templates = &profile.templates;

        let (boundaries, source) =
            match self.indexer.detect_boundaries(&page.items, page.page_width, templates.len()) {
                Some(detected) => (detected, BoundarySource::Detected),
                None => (configured_boundaries(templates, page.page_width), BoundarySource::Configured),
            };

        let columns = match self.indexer.assign(&page.items, &boundaries, page.page_width) {
            Ok(columns) => columns,
            Err(e) => {
                warnings.push(Warning::new(
                    WarningKind::Calibration,
                    format!("page {}: {}; reading it without columns", index + 1, e),
                ));
                return None;
            }
        };

        let report = self.calibrator.calibrate(
            &columns,
            templates,
            page.page_width,
            &profile.number_format,
            source,
        );
        debug!(page = index + 1, summary = %report.summary(), "page calibrated");

        if report.overall_calibration < self.config.min_calibration {
            warnings.push(Warning::new(
                WarningKind::Calibration,
                format!(
                    "page {}: column calibration {:.1} below {:.1}",
                    index + 1,
                    report.overall_calibration,
                    self.config.min_calibration
                ),
            ));
        }
        if report.overall_content < self.config.min_content {
            warnings.push(Warning::new(
                WarningKind::Calibration,
                format!(
                    "page {}: column content {:.1} below {:.1}",
                    index + 1,
                    report.overall_content,
                    self.config.min_content
                ),
            ));
        }

        let text = self
            .indexer
            .rows(&columns)
            .iter()
            .map(|row| row.text())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Some((text, report))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banks::grammars::samples;
    use crate::positions::TextItem;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_extractor(config: ExtractionConfig) -> StatementExtractor {
        StatementExtractor::new(Arc::new(BankRegistry::new().unwrap()), config)
    }

    /// Pages listed as (content, delay in ms); `None` content fails the page
    struct SlowSource {
        pages: Vec<(Option<PageContent>, u64)>,
    }

    impl DocumentSource for SlowSource {
        fn name(&self) -> &str {
            "slow.pdf"
        }

        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn load_page(&self, index: usize) -> impl Future<Output = Result<PageContent>> + Send {
            let (content, delay) = self.pages[index].clone();
            async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                content.ok_or(ReconError::MissingPage {
                    document: "slow.pdf".to_string(),
                    page: index,
                })
            }
        }
    }

    fn fast_config() -> ExtractionConfig {
        ExtractionConfig {
            page_timeout_ms: 50,
            document_timeout_ms: 2_000,
            ..ExtractionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_text_document_detects_bank() {
        let extractor = create_extractor(ExtractionConfig::default());
        let source = MemorySource::from_text("biat.txt", samples::BIAT);

        let result = extractor.extract(&source, None, date(2025, 7, 1)).await;

        assert!(result.success, "{:?}", result.errors);
        let doc = result.data.unwrap();
        assert_eq!(doc.bank, BankId::Biat);
        assert!(doc.detection_confidence.unwrap() >= 0.9);
        assert_eq!(doc.statement.statement_date, date(2025, 6, 30));
        assert_eq!(doc.statement.deposits.len(), 2);
        assert_eq!(doc.statement.checksum.len(), 64);
    }

    #[tokio::test]
    async fn test_unknown_layout_needs_manual_bank() {
        let extractor = create_extractor(ExtractionConfig::default());
        let source = MemorySource::from_text("mystery.txt", "RELEVE\nSOLDE 100\n");

        let result = extractor.extract(&source, None, date(2025, 7, 1)).await;
        assert!(!result.success);
        assert!(result.has_warning(WarningKind::DetectionFailure));

        let manual = extractor.extract(&source, Some(BankId::Stb), date(2025, 7, 1)).await;
        assert!(manual.success);
        assert_eq!(manual.data.unwrap().detection_confidence, None);
    }

    #[tokio::test]
    async fn test_empty_document_fails() {
        let extractor = create_extractor(ExtractionConfig::default());
        let source = MemorySource::from_text("blank.txt", "  \n\u{000C}\n");

        let result = extractor.extract(&source, None, date(2025, 7, 1)).await;
        assert!(!result.success);
        assert!(result.errors[0].contains("empty document"));
    }

    #[tokio::test]
    async fn test_positional_page_uses_configured_columns() {
        let extractor = create_extractor(ExtractionConfig::default());
        let items = samples::BIAT
            .lines()
            .enumerate()
            .map(|(i, line)| TextItem::new(line, 40.0, 20.0 + i as f64 * 12.0))
            .collect();
        let source = MemorySource::new(
            "biat.json",
            vec![PageContent::Positional(PositionalPage {
                page_width: 850.0,
                page_height: 1100.0,
                items,
            })],
        );

        let result = extractor.extract(&source, None, date(2025, 7, 1)).await;

        assert!(result.success, "{:?}", result.errors);
        assert!(!result.has_warning(WarningKind::Calibration));
        let doc = result.data.unwrap();
        assert_eq!(doc.bank, BankId::Biat);
        assert_eq!(doc.calibration.len(), 1);
        assert_eq!(doc.calibration[0].boundary_source, BoundarySource::Configured);
        assert_eq!(doc.calibration[0].overall_calibration, 100.0);
        // every line sits in the first column; none of them is a bare date
        let first = &doc.calibration[0].columns[0];
        assert_eq!(first.item_count, samples::BIAT.lines().count());
        assert_eq!(first.content, 0.0);
        assert_eq!(doc.statement.closing_balance, 15_950_000);
    }

    #[tokio::test]
    async fn test_slow_page_is_skipped_with_warning() {
        let extractor = create_extractor(fast_config());
        let source = SlowSource {
            pages: vec![
                (Some(PageContent::Text(samples::BIAT.to_string())), 0),
                (Some(PageContent::Text("ANNEXE".to_string())), 1_000),
                (None, 0),
            ],
        };

        let result = extractor.extract(&source, None, date(2025, 7, 1)).await;

        assert!(result.success, "{:?}", result.errors);
        assert!(result.has_warning(WarningKind::PageTimeout));
        assert!(result.has_warning(WarningKind::PageFailure));
        let doc = result.data.unwrap();
        assert_eq!(doc.pages_total, 3);
        assert_eq!(doc.pages_read, 1);
    }

    #[tokio::test]
    async fn test_document_deadline_without_text_fails() {
        let config = ExtractionConfig {
            page_timeout_ms: 5_000,
            document_timeout_ms: 50,
            ..ExtractionConfig::default()
        };
        let source = SlowSource {
            pages: vec![(Some(PageContent::Text(samples::BIAT.to_string())), 1_000)],
        };

        let err = gather_pages(&source, &config).await.unwrap_err();
        assert!(matches!(err, ReconError::DocumentTimeout(_)));
    }

    #[tokio::test]
    async fn test_document_deadline_keeps_partial_text() {
        let config = ExtractionConfig {
            page_timeout_ms: 5_000,
            document_timeout_ms: 300,
            ..ExtractionConfig::default()
        };
        let source = SlowSource {
            pages: vec![
                (Some(PageContent::Text(samples::BIAT.to_string())), 0),
                (Some(PageContent::Text("ANNEXE".to_string())), 2_000),
                (Some(PageContent::Text("ANNEXE".to_string())), 0),
            ],
        };

        let gathered = gather_pages(&source, &config).await.unwrap();
        assert_eq!(gathered.pages.len(), 1);
        assert!(gathered.warnings.iter().any(|w| w.kind == WarningKind::PageTimeout));
    }

    #[test]
    fn test_csv_rows_become_a_table() {
        let source = MemorySource::from_csv(
            "uib.csv",
            b"UNION INTERNATIONALE DE BANQUES,\nOPENING BALANCE,\"12,000.000\"\n",
        )
        .unwrap();
        assert_eq!(source.page_count(), 1);
        match &source.pages[0] {
            PageContent::Tabular(table) => {
                assert_eq!(table.text(), "UNION INTERNATIONALE DE BANQUES\nOPENING BALANCE 12,000.000")
            }
            other => panic!("unexpected page {:?}", other),
        }
    }

    #[test]
    fn test_json_accepts_one_page_or_many() {
        let one = r#"{"pageWidth": 600, "items": [{"text": "BIAT", "x": 10, "y": 10}]}"#;
        let many = format!("[{}, {}]", one, one);

        assert_eq!(MemorySource::from_json("a.json", one).unwrap().page_count(), 1);
        assert_eq!(MemorySource::from_json("b.json", &many).unwrap().page_count(), 2);
        assert!(MemorySource::from_json("c.json", "{}").is_err());
    }

    #[test]
    fn test_form_feed_splits_pages() {
        let source = MemorySource::from_text("two.txt", "page one\u{000C}page two");
        assert_eq!(source.page_count(), 2);
        assert!(MemorySource::from_path(Path::new("statement.pdf")).is_err());
    }
}
