// ✅ Quality findings shared by calibration and statement validation
//
// Findings never block anything: they are attached to reports and surfaced as
// warnings by the extraction pipeline.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // Structurally wrong (overflow, impossible geometry)
    Warning,  // Numbers do not add up or data is questionable
    Info,     // Usable but worth a look
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub field: String,
    pub issue: String,
    pub recommendation: String,
}

impl QualityIssue {
    pub fn new(severity: Severity, field: &str, issue: impl Into<String>, recommendation: &str) -> Self {
        QualityIssue {
            severity,
            field: field.to_string(),
            issue: issue.into(),
            recommendation: recommendation.to_string(),
        }
    }

    pub fn warning(field: &str, issue: impl Into<String>, recommendation: &str) -> Self {
        Self::new(Severity::Warning, field, issue, recommendation)
    }

    pub fn info(field: &str, issue: impl Into<String>, recommendation: &str) -> Self {
        Self::new(Severity::Info, field, issue, recommendation)
    }
}

impl std::fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.issue)
    }
}

/// "N issues (M critical)"
pub fn summarize(issues: &[QualityIssue]) -> String {
    format!(
        "{} issues ({} critical)",
        issues.len(),
        issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .count()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_counts_critical() {
        let issues = vec![
            QualityIssue::warning("closing_balance", "off by 4 050,000", "Check uncredited deposits"),
            QualityIssue::new(Severity::Critical, "deposits", "sum overflows", "Split the statement"),
            QualityIssue::info("columns[2]", "no items", "Check the template"),
        ];

        assert_eq!(summarize(&issues), "3 issues (1 critical)");
        assert_eq!(issues[0].to_string(), "closing_balance: off by 4 050,000");
    }
}
