// 🚦 Error taxonomy + result envelope
//
// Hard errors are reserved for structurally invalid input. Everything that only
// degrades confidence travels as a Warning next to usable partial output.

use crate::banks::BankId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// HARD ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("empty document: {0}")]
    EmptyDocument(String),

    #[error("unrecognized bank format (best guess: {best:?}, confidence {confidence:.2})")]
    UnrecognizedBank {
        best: Option<BankId>,
        confidence: f64,
    },

    #[error("invalid column boundary #{index}: [{x_start}, {x_end}] on a page {page_width} wide")]
    InvalidBoundary {
        index: usize,
        x_start: f64,
        x_end: f64,
        page_width: f64,
    },

    #[error("document '{0}' timed out before any page text was gathered")]
    DocumentTimeout(String),

    #[error("document '{document}' has no page {page}")]
    MissingPage { document: String, page: usize },

    #[error("unsupported document: {0}")]
    UnsupportedDocument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, ReconError>;

// ============================================================================
// WARNINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Bank/format recognized with low confidence, or not at all
    DetectionFailure,
    /// A configured section never appeared in the text
    SectionNotFound,
    /// Amount or date could not be parsed; a default was used
    ParseFailure,
    /// Too many pages skipped on timeout
    PageTimeout,
    /// The rendering backend failed on one page
    PageFailure,
    /// Balances or facilities do not reconcile
    ValidationMismatch,
    /// Column geometry or content diverges from the bank template
    Calibration,
    /// Output is usable but coarser than expected (total-only sections, clamped values)
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Warning {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

// ============================================================================
// RESULT ENVELOPE
// ============================================================================

/// `{success, data?, errors?, warnings?}` returned by every public pipeline operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T, warnings: Vec<Warning>) -> Self {
        OperationResult {
            success: true,
            data: Some(data),
            errors: Vec::new(),
            warnings,
        }
    }

    pub fn failed(error: impl Into<String>, warnings: Vec<Warning>) -> Self {
        OperationResult {
            success: false,
            data: None,
            errors: vec![error.into()],
            warnings,
        }
    }

    pub fn from_error(error: ReconError, warnings: Vec<Warning>) -> Self {
        Self::failed(error.to_string(), warnings)
    }

    pub fn has_warning(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        OperationResult {
            success: self.success,
            data: self.data.map(f),
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    /// Consume the envelope, surfacing the first error as an `anyhow` error
    pub fn into_result(self) -> anyhow::Result<T> {
        match self.data {
            Some(data) if self.success => Ok(data),
            _ => Err(anyhow::anyhow!(
                "{}",
                self.errors
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "operation failed".to_string())
            )),
        }
    }
}
