// 🏦 Bank registry - stable identity + layout profile per bank
//
// "BIAT", "Banque Internationale Arabe de Tunisie", "biat" → same bank.
// Each profile carries everything the extraction needs: number format,
// column templates and compiled section grammar. Built once at start-up.

pub mod grammars;
pub mod templates;

use crate::calibration::ColumnTemplate;
use crate::error::{OperationResult, Result, Warning, WarningKind};
use crate::grammar::SectionGrammar;
use crate::normalize::NumberFormat;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// BANK IDENTITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BankId {
    Biat,
    Stb,
    Bna,
    Attijari,
    AmenBank,
    Uib,
}

impl BankId {
    pub const ALL: [BankId; 6] = [
        BankId::Biat,
        BankId::Stb,
        BankId::Bna,
        BankId::Attijari,
        BankId::AmenBank,
        BankId::Uib,
    ];

    /// Human-readable name for display and cross-bank lists
    pub fn name(&self) -> &'static str {
        match self {
            BankId::Biat => "BIAT",
            BankId::Stb => "STB",
            BankId::Bna => "BNA",
            BankId::Attijari => "Attijari Bank",
            BankId::AmenBank => "Amen Bank",
            BankId::Uib => "UIB",
        }
    }

    /// Short code used as the persistence key
    pub fn code(&self) -> &'static str {
        match self {
            BankId::Biat => "BIAT",
            BankId::Stb => "STB",
            BankId::Bna => "BNA",
            BankId::Attijari => "ATTIJARI",
            BankId::AmenBank => "AMEN",
            BankId::Uib => "UIB",
        }
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            BankId::Biat => &["Banque Internationale Arabe de Tunisie"],
            BankId::Stb => &["Societe Tunisienne de Banque", "Société Tunisienne de Banque"],
            BankId::Bna => &["Banque Nationale Agricole"],
            BankId::Attijari => &["Attijari", "Attijariwafa"],
            BankId::AmenBank => &["Amen", "AMEN_BANK"],
            BankId::Uib => &["Union Internationale de Banques"],
        }
    }

    /// Case-insensitive lookup by name, code or alias
    pub fn from_name(value: &str) -> Option<BankId> {
        let wanted = value.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        BankId::ALL.into_iter().find(|bank| {
            bank.name().to_lowercase() == wanted
                || bank.code().to_lowercase() == wanted
                || bank.aliases().iter().any(|a| a.to_lowercase() == wanted)
        })
    }
}

impl std::fmt::Display for BankId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for BankId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        BankId::from_name(s).ok_or_else(|| {
            format!(
                "unknown bank '{}' (expected one of: {})",
                s,
                BankId::ALL.map(|b| b.code()).join(", ")
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    French,
    English,
}

// ============================================================================
// PROFILE + REGISTRY
// ============================================================================

pub struct BankProfile {
    pub id: BankId,
    pub language: Language,
    /// Whole-word, case-insensitive names only this bank prints on its statements
    pub markers: Vec<Regex>,
    pub number_format: NumberFormat,
    pub templates: Vec<ColumnTemplate>,
    pub grammar: SectionGrammar,
}

impl BankProfile {
    /// Check if a string names this bank (code, name or alias, either way round)
    pub fn matches(&self, bank_string: &str) -> bool {
        let lower = bank_string.trim().to_lowercase();
        if lower.is_empty() {
            return false;
        }
        std::iter::once(self.id.name())
            .chain(std::iter::once(self.id.code()))
            .chain(self.id.aliases().iter().copied())
            .any(|name| {
                let name = name.to_lowercase();
                name == lower || lower.contains(&name)
            })
    }

    /// 0.6 for an identity marker + 0.4 x share of structure patterns present
    pub fn detection_score(&self, text: &str) -> f64 {
        let marker = self.markers.iter().any(|m| m.is_match(text));

        let mut total = 0usize;
        let mut found = 0usize;
        for pattern in self.grammar.structure_patterns() {
            total += 1;
            if text.lines().any(|line| pattern.is_match(line.trim())) {
                found += 1;
            }
        }
        let share = if total == 0 { 0.0 } else { found as f64 / total as f64 };

        (if marker { 0.6 } else { 0.0 }) + 0.4 * share
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub best: Option<BankId>,
    pub confidence: f64,
    pub threshold: f64,
    /// Every bank's score, in registry order
    pub scores: Vec<(BankId, f64)>,
}

impl Detection {
    pub fn is_confident(&self) -> bool {
        self.best.is_some() && self.confidence >= self.threshold
    }

    /// `success = false` with the best guess when below threshold
    pub fn into_result(self) -> OperationResult<BankId> {
        match self.best {
            Some(bank) if self.confidence >= self.threshold => {
                OperationResult::ok(bank, Vec::new())
            }
            best => {
                let reason = format!(
                    "bank format not recognized (best guess: {}, confidence {:.2} < {:.2}); select the bank manually",
                    best.map(|b| b.name()).unwrap_or("none"),
                    self.confidence,
                    self.threshold
                );
                OperationResult::failed(
                    reason.clone(),
                    vec![Warning::new(WarningKind::DetectionFailure, reason)],
                )
            }
        }
    }
}

/// "STB" must not fire inside "ASTBURY" or "STB2"
fn compile_markers(markers: &[&str]) -> Result<Vec<Regex>> {
    markers
        .iter()
        .map(|m| Ok(Regex::new(&format!(r"(?i)\b{}\b", regex::escape(m)))?))
        .collect()
}

pub struct BankRegistry {
    profiles: Vec<BankProfile>,
}

impl BankRegistry {
    /// Compile every bank profile
    pub fn new() -> Result<Self> {
        let profiles = BankId::ALL
            .into_iter()
            .map(|id| {
                let spec = grammars::grammar_spec(id);
                Ok(BankProfile {
                    id,
                    language: grammars::language(id),
                    markers: compile_markers(grammars::identity_markers(id))?,
                    number_format: spec.number_format,
                    templates: templates::column_templates(id),
                    grammar: SectionGrammar::compile(&spec)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(banks = profiles.len(), "bank registry ready");
        Ok(BankRegistry { profiles })
    }

    pub fn profile(&self, id: BankId) -> &BankProfile {
        // `new` builds one profile per BankId::ALL entry, in order
        &self.profiles[BankId::ALL.iter().position(|b| *b == id).unwrap_or(0)]
    }

    pub fn all(&self) -> &[BankProfile] {
        &self.profiles
    }

    pub fn count(&self) -> usize {
        self.profiles.len()
    }

    /// Find bank by any name (canonical or alias)
    pub fn find_by_string(&self, bank_string: &str) -> Option<&BankProfile> {
        BankId::from_name(bank_string)
            .map(|id| self.profile(id))
            .or_else(|| self.profiles.iter().find(|p| p.matches(bank_string)))
    }

    /// Score every bank against raw statement text
    pub fn detect(&self, text: &str, threshold: f64) -> Detection {
        let scores: Vec<(BankId, f64)> = self
            .profiles
            .iter()
            .map(|p| (p.id, p.detection_score(text)))
            .collect();

        let mut best: Option<(BankId, f64)> = None;
        for &(id, score) in &scores {
            if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((id, score));
            }
        }

        debug!(?best, threshold, "bank detection");
        Detection {
            best: best.map(|(id, _)| id),
            confidence: best.map(|(_, s)| s).unwrap_or(0.0),
            threshold,
            scores,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_names_and_codes() {
        assert_eq!(BankId::AmenBank.name(), "Amen Bank");
        assert_eq!(BankId::AmenBank.code(), "AMEN");
        assert_eq!(BankId::Attijari.to_string(), "Attijari Bank");
    }

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(BankId::from_name("biat"), Some(BankId::Biat));
        assert_eq!(BankId::from_name("amen bank"), Some(BankId::AmenBank));
        assert_eq!(
            BankId::from_name("Union Internationale de Banques"),
            Some(BankId::Uib)
        );
        assert_eq!(BankId::from_name("Chase"), None);
        assert!("nope".parse::<BankId>().is_err());
    }

    #[test]
    fn test_serde_codes() {
        assert_eq!(serde_json::to_string(&BankId::AmenBank).unwrap(), "\"AMEN_BANK\"");
        let id: BankId = serde_json::from_str("\"UIB\"").unwrap();
        assert_eq!(id, BankId::Uib);
    }

    #[test]
    fn test_registry_builds_all_banks() {
        let registry = BankRegistry::new().unwrap();
        assert_eq!(registry.count(), 6);
        for id in BankId::ALL {
            let profile = registry.profile(id);
            assert_eq!(profile.id, id);
            assert!(!profile.templates.is_empty());
            assert!(!profile.grammar.sections.is_empty());
        }
    }

    #[test]
    fn test_find_by_string() {
        let registry = BankRegistry::new().unwrap();
        assert_eq!(
            registry.find_by_string("BIAT - Agence Lac").map(|p| p.id),
            Some(BankId::Biat)
        );
        assert_eq!(registry.find_by_string("attijari").map(|p| p.id), Some(BankId::Attijari));
        assert!(registry.find_by_string("Wise").is_none());
    }

    #[test]
    fn test_short_markers_need_whole_words() {
        let registry = BankRegistry::new().unwrap();
        let stb = registry.profile(BankId::Stb);
        let uib = registry.profile(BankId::Uib);

        assert_eq!(stb.detection_score("ASTBURY STB2 CONSULTING"), 0.0);
        assert_eq!(uib.detection_score("SQUIBB PHARMA"), 0.0);
        assert!(stb.detection_score("Releve STB - agence Lac") >= 0.6);
        assert!(uib.detection_score("uib, union internationale de banques") >= 0.6);
    }

    #[test]
    fn test_detect_below_threshold_is_failure() {
        let registry = BankRegistry::new().unwrap();
        let detection = registry.detect("lorem ipsum dolor sit amet", 0.5);

        assert!(!detection.is_confident());
        let result = detection.into_result();
        assert!(!result.success);
        assert!(result.has_warning(WarningKind::DetectionFailure));
    }
}
