// 📦 Boundary records
// Statements and their line items as exchanged with the store, the matcher and
// the risk aggregator. Amounts are i64 minor units (millimes).

use crate::banks::BankId;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Client code carried by synthetic total-only records
pub const PLACEHOLDER_CLIENT: &str = "VARIOUS";

/// Codes that do not identify a real client
pub fn is_placeholder_client(code: &str) -> bool {
    matches!(
        code.trim().to_uppercase().as_str(),
        "" | PLACEHOLDER_CLIENT | "N/A" | "NA" | "-" | "UNKNOWN" | "INCONNU"
    )
}

// ============================================================================
// STATEMENT LINE ITEMS
// ============================================================================

/// Uncredited deposit (remise non créditée)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub deposit_date: NaiveDate,
    pub value_date: Option<NaiveDate>,
    pub instrument_type: String,
    pub client_code: Option<String>,
    pub reference: Option<String>,
    pub amount: i64,
}

impl DepositRecord {
    /// Date used for date-window rules: value date, else deposit date
    pub fn effective_date(&self) -> NaiveDate {
        self.value_date.unwrap_or(self.deposit_date)
    }
}

/// Outstanding check (chèque émis non débité)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub issue_date: NaiveDate,
    pub check_number: String,
    pub payee: Option<String>,
    pub amount: i64,
}

/// Credit line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityRecord {
    pub facility_type: String,
    pub limit_amount: i64,
    pub used_amount: i64,
    pub available_amount: i64,
}

impl FacilityRecord {
    pub fn expected_available(&self) -> i64 {
        self.limit_amount.saturating_sub(self.used_amount)
    }

    /// |available - (limit - used)|
    pub fn availability_deviation(&self) -> i64 {
        self.available_amount
            .saturating_sub(self.expected_available())
            .saturating_abs()
    }
}

/// Bounced item (impayé)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BouncedItemRecord {
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub client_code: String,
    pub description: Option<String>,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementRecord {
    Deposit(DepositRecord),
    Check(CheckRecord),
    Facility(FacilityRecord),
    BouncedItem(BouncedItemRecord),
}

impl StatementRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            StatementRecord::Deposit(_) => "deposit",
            StatementRecord::Check(_) => "check",
            StatementRecord::Facility(_) => "facility",
            StatementRecord::BouncedItem(_) => "bounced_item",
        }
    }
}

// ============================================================================
// STATEMENT
// ============================================================================

/// One bank statement for one statement date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub bank: BankId,
    pub statement_date: NaiveDate,
    pub opening_balance: i64,
    pub closing_balance: i64,
    /// SHA-256 of the rendered statement text
    pub checksum: String,
    #[serde(default)]
    pub deposits: Vec<DepositRecord>,
    #[serde(default)]
    pub checks: Vec<CheckRecord>,
    #[serde(default)]
    pub facilities: Vec<FacilityRecord>,
    #[serde(default)]
    pub bounced_items: Vec<BouncedItemRecord>,
}

impl Statement {
    pub fn new(bank: BankId, statement_date: NaiveDate) -> Self {
        Statement {
            bank,
            statement_date,
            opening_balance: 0,
            closing_balance: 0,
            checksum: String::new(),
            deposits: Vec::new(),
            checks: Vec::new(),
            facilities: Vec::new(),
            bounced_items: Vec::new(),
        }
    }

    /// Checksum half of the persistence key (bank, statement_date, checksum)
    pub fn compute_checksum(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// "YYYY-MM"
    pub fn period(&self) -> String {
        period_key(self.statement_date)
    }

    pub fn record_count(&self) -> usize {
        self.deposits.len() + self.checks.len() + self.facilities.len() + self.bounced_items.len()
    }

    /// Flatten into tagged records for storage
    pub fn records(&self) -> Vec<StatementRecord> {
        let mut records = Vec::with_capacity(self.record_count());
        records.extend(self.deposits.iter().cloned().map(StatementRecord::Deposit));
        records.extend(self.checks.iter().cloned().map(StatementRecord::Check));
        records.extend(self.facilities.iter().cloned().map(StatementRecord::Facility));
        records.extend(self.bounced_items.iter().cloned().map(StatementRecord::BouncedItem));
        records
    }

    /// Distribute tagged records back into their lists, keeping order
    pub fn push_record(&mut self, record: StatementRecord) {
        match record {
            StatementRecord::Deposit(r) => self.deposits.push(r),
            StatementRecord::Check(r) => self.checks.push(r),
            StatementRecord::Facility(r) => self.facilities.push(r),
            StatementRecord::BouncedItem(r) => self.bounced_items.push(r),
        }
    }
}

pub fn period_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

// ============================================================================
// CROSS-BANK VIEWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDeposit {
    pub bank: String,
    pub record: DepositRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankBouncedItem {
    pub bank: String,
    pub record: BouncedItemRecord,
}

/// Every deposit of the period, in statement order
pub fn deposits_of(statements: &[Statement]) -> Vec<BankDeposit> {
    statements
        .iter()
        .flat_map(|s| {
            s.deposits.iter().map(move |d| BankDeposit {
                bank: s.bank.name().to_string(),
                record: d.clone(),
            })
        })
        .collect()
}

/// Every bounced item of the period, in statement order
pub fn bounced_items_of(statements: &[Statement]) -> Vec<BankBouncedItem> {
    statements
        .iter()
        .flat_map(|s| {
            s.bounced_items.iter().map(move |b| BankBouncedItem {
                bank: s.bank.name().to_string(),
                record: b.clone(),
            })
        })
        .collect()
}

// ============================================================================
// COLLECTION LEDGER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InstrumentType {
    /// Time draft ("EFFET")
    Draft,
    Cheque,
    #[default]
    Generic,
}

impl InstrumentType {
    /// Lenient label parsing; anything unknown is generic
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "EFFET" | "EFFETS" | "DRAFT" | "TRAITE" | "LCN" => InstrumentType::Draft,
            "CHEQUE" | "CHÈQUE" | "CHQ" | "CHECK" => InstrumentType::Cheque,
            _ => InstrumentType::Generic,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InstrumentType::Draft => "EFFET",
            InstrumentType::Cheque => "CHEQUE",
            InstrumentType::Generic => "GENERIC",
        }
    }
}

impl Serialize for InstrumentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for InstrumentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(InstrumentType::from_label(&label))
    }
}

/// Expected collection from the external ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub client_code: String,
    pub amount: i64,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub instrument_type: InstrumentType,
    #[serde(default)]
    pub draft_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub check_number: Option<String>,
    pub statement_date: NaiveDate,
}

// ============================================================================
// TESTS
// ============================================================================
