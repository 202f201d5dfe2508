// 📜 Section Grammar Extractor
// Declarative per-bank grammars driving a line-scanning state machine that
// turns statement text into typed records.
//
// Grammar tables live in `banks::grammars`; this module compiles them and
// runs the scan. Output is a pure function of (text, bank, processing date).

use crate::banks::{BankId, BankRegistry};
use crate::error::{Result, Warning, WarningKind};
use crate::model::{
    BouncedItemRecord, CheckRecord, DepositRecord, FacilityRecord, Statement, PLACEHOLDER_CLIENT,
};
use crate::normalize::{parse_amount, parse_date, parse_date_strict, to_iso, NumberFormat};
use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// GRAMMAR TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SectionKind {
    Deposits,
    Checks,
    Facilities,
    BouncedItems,
}

impl SectionKind {
    pub const ALL: [SectionKind; 4] = [
        SectionKind::Deposits,
        SectionKind::Checks,
        SectionKind::Facilities,
        SectionKind::BouncedItems,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            SectionKind::Deposits => "DEPOSITS",
            SectionKind::Checks => "CHECKS",
            SectionKind::Facilities => "FACILITIES",
            SectionKind::BouncedItems => "BOUNCED_ITEMS",
        }
    }
}

/// Which capture group feeds which record field (1-based group indices)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureLayout {
    Deposit {
        deposit_date: usize,
        value_date: Option<usize>,
        instrument: usize,
        client_code: Option<usize>,
        reference: Option<usize>,
        amount: usize,
    },
    Check {
        issue_date: usize,
        check_number: usize,
        payee: Option<usize>,
        amount: usize,
    },
    Facility {
        facility_type: usize,
        limit: usize,
        used: usize,
        available: usize,
    },
    Bounced {
        due_date: usize,
        return_date: Option<usize>,
        client_code: usize,
        description: Option<usize>,
        amount: usize,
    },
}

impl CaptureLayout {
    pub fn kind(&self) -> SectionKind {
        match self {
            CaptureLayout::Deposit { .. } => SectionKind::Deposits,
            CaptureLayout::Check { .. } => SectionKind::Checks,
            CaptureLayout::Facility { .. } => SectionKind::Facilities,
            CaptureLayout::Bounced { .. } => SectionKind::BouncedItems,
        }
    }
}

/// Uncompiled section rule. `{DATE}`, `{AMT}` (fraction required) and `{BAL}`
/// (fraction optional) expand to the bank's date and number patterns.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    pub header: &'static str,
    pub line: &'static str,
    pub layout: CaptureLayout,
    pub total: Option<&'static str>,
    pub skip: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct GrammarSpec {
    pub number_format: NumberFormat,
    pub statement_date: &'static [&'static str],
    pub opening_balance: &'static [&'static str],
    pub closing_balance: &'static [&'static str],
    pub sections: Vec<RuleSpec>,
}

#[derive(Debug, Clone)]
pub struct SectionRule {
    pub kind: SectionKind,
    pub header: Regex,
    pub line: Regex,
    pub layout: CaptureLayout,
    pub total: Option<Regex>,
    pub skip: Option<Regex>,
}

#[derive(Debug, Clone)]
pub struct SectionGrammar {
    pub number_format: NumberFormat,
    pub statement_date: Vec<Regex>,
    pub opening_balance: Vec<Regex>,
    pub closing_balance: Vec<Regex>,
    pub sections: Vec<SectionRule>,
}

const DATE_PATTERN: &str = r"(?:\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4}|\d{4}-\d{2}-\d{2})";

/// Regex for a printed amount in `format`
pub fn amount_pattern(format: &NumberFormat, fraction_required: bool) -> String {
    let groups = match format.thousands_separator {
        Some(' ') => r"(?:[ \x{a0}]\d{3})*".to_string(),
        Some(sep) => format!(r"(?:{}\d{{3}})*", regex::escape(&sep.to_string())),
        None => String::new(),
    };
    let fraction = format!(
        r"{}\d{{1,{}}}",
        regex::escape(&format.decimal_separator.to_string()),
        format.minor_digits.max(1)
    );
    if fraction_required {
        format!(r"-?\d+{}{}", groups, fraction)
    } else {
        format!(r"-?\d+{}(?:{})?", groups, fraction)
    }
}

fn compile(template: &str, format: &NumberFormat) -> Result<Regex> {
    let expanded = template
        .replace("{DATE}", DATE_PATTERN)
        .replace("{AMT}", &amount_pattern(format, true))
        .replace("{BAL}", &amount_pattern(format, false));
    Ok(Regex::new(&format!("(?i){}", expanded))?)
}

fn compile_all(templates: &[&str], format: &NumberFormat) -> Result<Vec<Regex>> {
    templates.iter().map(|t| compile(t, format)).collect()
}

impl SectionGrammar {
    pub fn compile(spec: &GrammarSpec) -> Result<Self> {
        let format = &spec.number_format;
        let sections = spec
            .sections
            .iter()
            .map(|rule| {
                Ok(SectionRule {
                    kind: rule.layout.kind(),
                    header: compile(rule.header, format)?,
                    line: compile(rule.line, format)?,
                    layout: rule.layout,
                    total: rule.total.map(|t| compile(t, format)).transpose()?,
                    skip: rule.skip.map(|s| compile(s, format)).transpose()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SectionGrammar {
            number_format: spec.number_format,
            statement_date: compile_all(spec.statement_date, format)?,
            opening_balance: compile_all(spec.opening_balance, format)?,
            closing_balance: compile_all(spec.closing_balance, format)?,
            sections,
        })
    }

    /// Patterns whose presence marks a document as laid out by this grammar
    pub fn structure_patterns(&self) -> impl Iterator<Item = &Regex> {
        self.sections
            .iter()
            .map(|s| &s.header)
            .chain(&self.statement_date)
            .chain(&self.opening_balance)
            .chain(&self.closing_balance)
    }

    pub fn kinds(&self) -> Vec<SectionKind> {
        SectionKind::ALL
            .into_iter()
            .filter(|k| self.sections.iter().any(|s| s.kind == *k))
            .collect()
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    /// Index into `SectionGrammar::sections`
    InSection { kind: SectionKind, rule: usize },
}

/// Generic end of a section: a total line, or a heading-like line without digits
pub fn is_terminator(line: &str) -> bool {
    let upper = line.to_uppercase();
    if upper.contains("TOTAL") {
        return true;
    }
    let Some(first) = line.split_whitespace().next() else {
        return false;
    };
    let letters = first.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 3
        && first
            .chars()
            .all(|c| (c.is_alphabetic() && c.is_uppercase()) || c == '\'' || c == '-')
        && !line.chars().any(|c| c.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub statement: Statement,
    pub warnings: Vec<Warning>,
}

/// Per-run scratch state; every field derives from the text alone
struct Scan<'g> {
    grammar: &'g SectionGrammar,
    processing_date: NaiveDate,
    statement_date: Option<NaiveDate>,
    opening: Option<i64>,
    closing: Option<i64>,
    seen_headers: Vec<SectionKind>,
    deposits: Vec<DepositRecord>,
    checks: Vec<CheckRecord>,
    facilities: Vec<FacilityRecord>,
    bounced: Vec<BouncedItemRecord>,
    warnings: Vec<Warning>,
}

impl<'g> Scan<'g> {
    fn amount(&mut self, raw: &str, line_no: usize) -> i64 {
        let parsed = parse_amount(raw, &self.grammar.number_format);
        if let Some(w) = parsed.warning {
            self.warnings
                .push(Warning::new(WarningKind::ParseFailure, format!("line {}: {}", line_no, w)));
        }
        parsed.value
    }

    /// Record amounts are non-negative
    fn record_amount(&mut self, raw: &str, line_no: usize) -> i64 {
        let value = self.amount(raw, line_no);
        if value < 0 {
            self.warnings.push(Warning::new(
                WarningKind::ParseFailure,
                format!("line {}: negative amount '{}' taken as absolute", line_no, raw.trim()),
            ));
        }
        value.abs()
    }

    fn date(&mut self, raw: &str, line_no: usize) -> NaiveDate {
        let parsed = parse_date(raw, self.processing_date);
        if let Some(w) = parsed.warning {
            self.warnings
                .push(Warning::new(WarningKind::ParseFailure, format!("line {}: {}", line_no, w)));
        }
        parsed.value
    }

    fn optional_date(&mut self, raw: Option<&str>, line_no: usize) -> Option<NaiveDate> {
        let raw = raw?;
        let date = parse_date_strict(raw);
        if date.is_none() {
            self.warnings.push(Warning::new(
                WarningKind::ParseFailure,
                format!("line {}: unparsable optional date '{}' dropped", line_no, raw),
            ));
        }
        date
    }

    fn header_balances(&mut self, line: &str, line_no: usize) {
        if self.statement_date.is_none() {
            if let Some(raw) = first_capture(&self.grammar.statement_date, line) {
                self.statement_date = Some(self.date(&raw, line_no));
            }
        }
        if self.opening.is_none() {
            if let Some(raw) = first_capture(&self.grammar.opening_balance, line) {
                self.opening = Some(self.amount(&raw, line_no));
            }
        }
        if self.closing.is_none() {
            if let Some(raw) = first_capture(&self.grammar.closing_balance, line) {
                self.closing = Some(self.amount(&raw, line_no));
            }
        }
    }

    fn record(&mut self, layout: CaptureLayout, caps: &Captures, line_no: usize) {
        let text = |i: usize| -> Option<String> {
            caps.get(i)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let opt = |i: Option<usize>| i.and_then(text);

        match layout {
            CaptureLayout::Deposit {
                deposit_date,
                value_date,
                instrument,
                client_code,
                reference,
                amount,
            } => {
                let record = DepositRecord {
                    deposit_date: self.date(&text(deposit_date).unwrap_or_default(), line_no),
                    value_date: self.optional_date(opt(value_date).as_deref(), line_no),
                    instrument_type: text(instrument).unwrap_or_default().to_uppercase(),
                    client_code: opt(client_code),
                    reference: opt(reference),
                    amount: self.record_amount(&text(amount).unwrap_or_default(), line_no),
                };
                self.deposits.push(record);
            }
            CaptureLayout::Check {
                issue_date,
                check_number,
                payee,
                amount,
            } => {
                let record = CheckRecord {
                    issue_date: self.date(&text(issue_date).unwrap_or_default(), line_no),
                    check_number: text(check_number).unwrap_or_default(),
                    payee: opt(payee),
                    amount: self.record_amount(&text(amount).unwrap_or_default(), line_no),
                };
                self.checks.push(record);
            }
            CaptureLayout::Facility {
                facility_type,
                limit,
                used,
                available,
            } => {
                let record = FacilityRecord {
                    facility_type: text(facility_type).unwrap_or_default().to_uppercase(),
                    limit_amount: self.amount(&text(limit).unwrap_or_default(), line_no),
                    used_amount: self.amount(&text(used).unwrap_or_default(), line_no),
                    available_amount: self.amount(&text(available).unwrap_or_default(), line_no),
                };
                self.facilities.push(record);
            }
            CaptureLayout::Bounced {
                due_date,
                return_date,
                client_code,
                description,
                amount,
            } => {
                let record = BouncedItemRecord {
                    due_date: self.date(&text(due_date).unwrap_or_default(), line_no),
                    return_date: self.optional_date(opt(return_date).as_deref(), line_no),
                    client_code: text(client_code).unwrap_or_default().to_uppercase(),
                    description: opt(description),
                    amount: self.record_amount(&text(amount).unwrap_or_default(), line_no),
                };
                self.bounced.push(record);
            }
        }
    }

    fn count(&self, kind: SectionKind) -> usize {
        match kind {
            SectionKind::Deposits => self.deposits.len(),
            SectionKind::Checks => self.checks.len(),
            SectionKind::Facilities => self.facilities.len(),
            SectionKind::BouncedItems => self.bounced.len(),
        }
    }

    /// One aggregate record carrying only the section total
    fn synthetic_total(&mut self, kind: SectionKind, amount: i64, statement_date: NaiveDate) -> bool {
        let reference = format!("TOTAL_{}", kind.code());
        match kind {
            SectionKind::Deposits => self.deposits.push(DepositRecord {
                deposit_date: statement_date,
                value_date: None,
                instrument_type: "TOTAL".to_string(),
                client_code: Some(PLACEHOLDER_CLIENT.to_string()),
                reference: Some(reference),
                amount,
            }),
            SectionKind::Checks => self.checks.push(CheckRecord {
                issue_date: statement_date,
                check_number: reference,
                payee: Some(PLACEHOLDER_CLIENT.to_string()),
                amount,
            }),
            SectionKind::BouncedItems => self.bounced.push(BouncedItemRecord {
                due_date: statement_date,
                return_date: None,
                client_code: PLACEHOLDER_CLIENT.to_string(),
                description: Some(reference),
                amount,
            }),
            // limit/used/available cannot be rebuilt from one number
            SectionKind::Facilities => return false,
        }
        true
    }
}

fn first_capture(patterns: &[Regex], line: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|p| p.captures(line))
        .and_then(|caps| caps.get(1).map(|m| m.as_str().to_string()))
}

// ============================================================================
// EXTRACTOR
// ============================================================================

/// Run one grammar over statement text
pub fn extract_with(
    grammar: &SectionGrammar,
    bank: BankId,
    text: &str,
    processing_date: NaiveDate,
) -> Extraction {
    let mut scan = Scan {
        grammar,
        processing_date,
        statement_date: None,
        opening: None,
        closing: None,
        seen_headers: Vec::new(),
        deposits: Vec::new(),
        checks: Vec::new(),
        facilities: Vec::new(),
        bounced: Vec::new(),
        warnings: Vec::new(),
    };
    let mut state = ScanState::Idle;

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        scan.header_balances(line, line_no);

        if let Some(rule) = grammar.sections.iter().position(|s| s.header.is_match(line)) {
            let kind = grammar.sections[rule].kind;
            debug!(line = line_no, section = kind.code(), "entering section");
            if !scan.seen_headers.contains(&kind) {
                scan.seen_headers.push(kind);
            }
            state = ScanState::InSection { kind, rule };
            continue;
        }

        let ScanState::InSection { rule, .. } = state else {
            continue;
        };
        let section = &grammar.sections[rule];

        if section.skip.as_ref().is_some_and(|s| s.is_match(line)) {
            continue;
        }
        if let Some(caps) = section.line.captures(line) {
            scan.record(section.layout, &caps, line_no);
            continue;
        }
        if is_terminator(line) {
            state = ScanState::Idle;
        }
    }

    let statement_date = match scan.statement_date {
        Some(date) => date,
        None => {
            scan.warnings.push(Warning::new(
                WarningKind::ParseFailure,
                format!(
                    "statement date not found; using processing date {}",
                    to_iso(processing_date)
                ),
            ));
            processing_date
        }
    };

    for kind in grammar.kinds() {
        if scan.count(kind) > 0 {
            continue;
        }
        let total = grammar
            .sections
            .iter()
            .filter(|s| s.kind == kind)
            .filter_map(|s| s.total.as_ref())
            .find_map(|pattern| {
                text.lines()
                    .enumerate()
                    .find_map(|(i, line)| pattern.captures(line.trim()).map(|c| (i + 1, c)))
                    .and_then(|(i, c)| c.get(1).map(|m| (i, m.as_str().to_string())))
            });

        match total {
            Some((line_no, raw)) => {
                let amount = scan.record_amount(&raw, line_no);
                if scan.synthetic_total(kind, amount, statement_date) {
                    scan.warnings.push(Warning::new(
                        WarningKind::Degraded,
                        format!("{}: no line items, kept section total only", kind.code()),
                    ));
                }
            }
            None if !scan.seen_headers.contains(&kind) => {
                scan.warnings.push(Warning::new(
                    WarningKind::SectionNotFound,
                    format!("{} section not found", kind.code()),
                ));
            }
            None => {}
        }
    }

    fn balance(value: Option<i64>, name: &str, warnings: &mut Vec<Warning>) -> i64 {
        value.unwrap_or_else(|| {
            warnings.push(Warning::new(
                WarningKind::ParseFailure,
                format!("{} balance not found; using 0", name),
            ));
            0
        })
    }
    let opening_balance = balance(scan.opening, "opening", &mut scan.warnings);
    let closing_balance = balance(scan.closing, "closing", &mut scan.warnings);

    let statement = Statement {
        bank,
        statement_date,
        opening_balance,
        closing_balance,
        checksum: Statement::compute_checksum(text),
        deposits: scan.deposits,
        checks: scan.checks,
        facilities: scan.facilities,
        bounced_items: scan.bounced,
    };

    Extraction {
        statement,
        warnings: scan.warnings,
    }
}

/// Holds the compiled grammars of every supported bank
pub struct SectionGrammarExtractor {
    registry: Arc<BankRegistry>,
}

impl SectionGrammarExtractor {
    pub fn new(registry: Arc<BankRegistry>) -> Self {
        SectionGrammarExtractor { registry }
    }

    pub fn extract(&self, bank: BankId, text: &str, processing_date: NaiveDate) -> Extraction {
        let grammar = &self.registry.profile(bank).grammar;
        let extraction = extract_with(grammar, bank, text, processing_date);
        debug!(
            bank = bank.code(),
            records = extraction.statement.record_count(),
            warnings = extraction.warnings.len(),
            "grammar extraction done"
        );
        extraction
    }
}

// ============================================================================
// TESTS
// ============================================================================
