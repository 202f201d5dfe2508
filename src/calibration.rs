// 🎯 Column Calibration Engine
// Scores detected column geometry and content against a bank's column template.
//
// Geometry: 100 minus 10 points per percent of page width the column edges are
// off from the template zone (scaled from an 850pt reference page), floored at 0.
// Content: share of the items assigned to a column that pass the template validator;
// an empty column scores 100 and is flagged.

use crate::normalize::{parse_amount, parse_date_strict, NumberFormat};
use crate::positions::{Column, ColumnBoundary};
use crate::quality::{summarize, QualityIssue, Severity};
use serde::{Deserialize, Serialize};

/// Page width the template zones are expressed in
pub const REFERENCE_PAGE_WIDTH: f64 = 850.0;

// ============================================================================
// TEMPLATES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Date,
    Amount,
    Reference,
    ClientCode,
    Instrument,
    Text,
}

const INSTRUMENT_KEYWORDS: &[&str] = &[
    "EFFET", "CHEQUE", "CHÈQUE", "CHQ", "TRAITE", "LCN", "VIREMENT", "VIRT", "REMISE", "VERSEMENT",
    "ESPECES", "DRAFT", "CHECK", "TRANSFER", "DEPOSIT", "CASH",
];

impl ContentType {
    pub fn validate(&self, text: &str, format: &NumberFormat) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        match self {
            ContentType::Date => parse_date_strict(text).is_some(),
            ContentType::Amount => {
                text.chars().any(|c| c.is_ascii_digit()) && parse_amount(text, format).is_clean()
            }
            ContentType::Reference => {
                text.chars().any(|c| c.is_ascii_digit())
                    && text
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '/' | '_' | '.'))
            }
            ContentType::ClientCode => {
                (2..=20).contains(&text.len())
                    && text
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
            }
            ContentType::Instrument => {
                let upper = text.to_uppercase();
                INSTRUMENT_KEYWORDS.iter().any(|k| upper.contains(k))
            }
            ContentType::Text => true,
        }
    }
}

/// One expected column of a bank layout, in reference-page coordinates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnTemplate {
    pub name: &'static str,
    pub content_type: ContentType,
    pub x_zone: (f64, f64),
    pub expected_width: f64,
}

impl ColumnTemplate {
    pub const fn new(name: &'static str, content_type: ContentType, x_min: f64, x_max: f64) -> Self {
        ColumnTemplate {
            name,
            content_type,
            x_zone: (x_min, x_max),
            expected_width: x_max - x_min,
        }
    }

    pub fn validate(&self, text: &str, format: &NumberFormat) -> bool {
        self.content_type.validate(text, format)
    }

    pub fn scaled_zone(&self, page_width: f64) -> (f64, f64) {
        let factor = page_width / REFERENCE_PAGE_WIDTH;
        (self.x_zone.0 * factor, self.x_zone.1 * factor)
    }
}

/// Template zones scaled to the page, clamped inside it
pub fn configured_boundaries(templates: &[ColumnTemplate], page_width: f64) -> Vec<ColumnBoundary> {
    templates
        .iter()
        .map(|t| {
            let (start, end) = t.scaled_zone(page_width);
            ColumnBoundary::new(start.clamp(0.0, page_width), end.clamp(0.0, page_width))
        })
        .collect()
}

/// `max(0, 100 - (|aS-eS| + |aE-eE|) / (pageWidth/100) * 10)`
pub fn calibration_score(actual: &ColumnBoundary, expected: (f64, f64), page_width: f64) -> f64 {
    if page_width <= 0.0 {
        return 0.0;
    }
    let deviation = (actual.x_start - expected.0).abs() + (actual.x_end - expected.1).abs();
    (100.0 - deviation / (page_width / 100.0) * 10.0).max(0.0)
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundarySource {
    Detected,
    Configured,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScore {
    pub index: usize,
    pub name: String,
    pub calibration: f64,
    pub content: f64,
    pub item_count: usize,
    pub valid_items: usize,
    /// actual width / scaled expected width
    pub width_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub boundary_source: BoundarySource,
    pub columns: Vec<ColumnScore>,
    pub overall_calibration: f64,
    pub overall_content: f64,
    pub issues: Vec<QualityIssue>,
}

impl CalibrationReport {
    pub fn summary(&self) -> String {
        format!(
            "calibration {:.1}, content {:.1}, {} columns ({:?}), {}",
            self.overall_calibration,
            self.overall_content,
            self.columns.len(),
            self.boundary_source,
            summarize(&self.issues)
        )
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct ColumnCalibrationEngine {
    width_ratio_range: (f64, f64),
}

impl ColumnCalibrationEngine {
    pub fn new() -> Self {
        ColumnCalibrationEngine {
            width_ratio_range: (0.5, 2.0),
        }
    }

    /// Score columns against templates; content is `valid / total * 100` over assigned items
    pub fn calibrate(
        &self,
        columns: &[Column],
        templates: &[ColumnTemplate],
        page_width: f64,
        format: &NumberFormat,
        boundary_source: BoundarySource,
    ) -> CalibrationReport {
        let mut issues = Vec::new();

        if columns.len() != templates.len() {
            issues.push(QualityIssue::warning(
                "columns",
                format!(
                    "{} columns on the page, {} in the bank template",
                    columns.len(),
                    templates.len()
                ),
                "Select the bank manually or review the column template",
            ));
        }

        let mut scores = Vec::with_capacity(templates.len());

        for (column, template) in columns.iter().zip(templates) {
            let expected = template.scaled_zone(page_width);
            let calibration = calibration_score(&column.boundary, expected, page_width);

            let item_count = column.items.len();
            let valid_items = column
                .items
                .iter()
                .filter(|item| template.validate(&item.text, format))
                .count();
            let content = if item_count == 0 {
                issues.push(QualityIssue::info(
                    &format!("columns[{}]", column.index),
                    format!("column '{}' has no items (zero population)", template.name),
                    "Content score defaults to 100; confirm the column is really empty",
                ));
                100.0
            } else {
                valid_items as f64 / item_count as f64 * 100.0
            };

            let expected_width = template.expected_width * page_width / REFERENCE_PAGE_WIDTH;
            let width_ratio = if expected_width > 0.0 {
                column.boundary.width() / expected_width
            } else {
                0.0
            };
            if width_ratio < self.width_ratio_range.0 || width_ratio > self.width_ratio_range.1 {
                issues.push(QualityIssue::warning(
                    &format!("columns[{}]", column.index),
                    format!(
                        "column '{}' is {:.2}x its expected width",
                        template.name, width_ratio
                    ),
                    "Boundaries probably merged or split a column",
                ));
            }

            scores.push(ColumnScore {
                index: column.index,
                name: template.name.to_string(),
                calibration,
                content,
                item_count,
                valid_items,
                width_ratio,
            });
        }

        if scores.is_empty() {
            issues.push(QualityIssue::new(
                Severity::Critical,
                "columns",
                "nothing to calibrate",
                "Provide column boundaries or a bank template",
            ));
        }

        CalibrationReport {
            boundary_source,
            overall_calibration: mean(scores.iter().map(|s| s.calibration)),
            overall_content: mean(scores.iter().map(|s| s.content)),
            columns: scores,
            issues,
        }
    }
}

impl Default for ColumnCalibrationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

// ============================================================================
// TESTS
// ============================================================================
