// ⚙️ Pipeline configuration - settings as data
// One JSON document, every field defaulted, loaded once at start-up.
//
// {
//   "extraction": { "page_timeout_ms": 3000 },
//   "matcher":    { "restrict_to_collection_bank": true }
// }

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Minimum detection confidence to accept a bank guess
    pub detection_threshold: f64,
    pub page_timeout_ms: u64,
    pub document_timeout_ms: u64,
    /// Skipped/total pages above this raises a PageTimeout warning
    pub max_skipped_page_fraction: f64,
    pub min_calibration: f64,
    pub min_content: f64,
    pub row_tolerance: f64,
    pub min_column_gap: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            detection_threshold: 0.5,
            page_timeout_ms: 5_000,
            document_timeout_ms: 30_000,
            max_skipped_page_fraction: 0.25,
            min_calibration: 60.0,
            min_content: 70.0,
            row_tolerance: 3.0,
            min_column_gap: 12.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Tolerance floor in minor units
    pub min_tolerance: i64,
    /// Share of the reported closing balance accepted as tolerance
    pub tolerance_ratio: f64,
    /// Max |available − (limit − used)| before a facility is flagged
    pub facility_deviation: i64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            min_tolerance: 10_000,
            tolerance_ratio: 0.01,
            facility_deviation: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// "within x%" amount rule
    pub amount_tolerance_ratio: f64,
    /// Bounced draft short-circuit: |amount − expected| must stay below this
    pub bounced_amount_tolerance: i64,
    pub bounced_day_window: i64,
    pub bounced_confidence: u32,
    pub near_day_window: i64,
    pub far_day_window: i64,
    pub perfect_threshold: u32,
    pub partial_threshold: u32,
    /// Only consider deposits of the collection's bank when it names one
    pub restrict_to_collection_bank: bool,
    pub draft_labels: Vec<String>,
    pub cheque_labels: Vec<String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        MatcherConfig {
            amount_tolerance_ratio: 0.05,
            bounced_amount_tolerance: 1_000,
            bounced_day_window: 3,
            bounced_confidence: 90,
            near_day_window: 3,
            far_day_window: 7,
            perfect_threshold: 80,
            partial_threshold: 50,
            restrict_to_collection_bank: false,
            draft_labels: vec!["EFFET".to_string(), "DRAFT".to_string()],
            cheque_labels: vec!["CHEQUE".to_string(), "CHQ".to_string(), "CHECK".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub critical_exposure: i64,
    pub high_exposure: i64,
    pub medium_exposure: i64,
    /// More banks than this → HIGH
    pub high_bank_count: usize,
    /// More banks than this → MEDIUM
    pub medium_bank_count: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            critical_exposure: 50_000_000,
            high_exposure: 20_000_000,
            medium_exposure: 10_000_000,
            high_bank_count: 2,
            medium_bank_count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Below this share of perfect+partial matches an alert is raised (0-100)
    pub min_match_rate: f64,
    /// Also alert on MEDIUM cross-bank clients
    pub include_medium_risk: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            min_match_rate: 50.0,
            include_medium_risk: false,
        }
    }
}

// ============================================================================
// PIPELINE CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub extraction: ExtractionConfig,
    pub validator: ValidatorConfig,
    pub matcher: MatcherConfig,
    pub risk: RiskConfig,
    pub alerts: AlertConfig,
}

impl PipelineConfig {
    /// Load configuration from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse config JSON")
    }

    /// Defaults unless a path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json(
            r#"{ "extraction": { "page_timeout_ms": 1500 }, "matcher": { "restrict_to_collection_bank": true } }"#,
        )
        .unwrap();

        assert_eq!(config.extraction.page_timeout_ms, 1500);
        assert_eq!(config.extraction.detection_threshold, 0.5);
        assert!(config.matcher.restrict_to_collection_bank);
        assert_eq!(config.matcher.perfect_threshold, 80);
        assert_eq!(config.validator.min_tolerance, 10_000);
        assert_eq!(config.risk.critical_exposure, 50_000_000);
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(PipelineConfig::from_json("{}").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(PipelineConfig::from_json("{ nope").is_err());
        assert!(PipelineConfig::from_file("/nonexistent/config.json").is_err());
    }
}
