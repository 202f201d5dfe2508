// 🗄️ Statement store - SQLite + WAL
//
// statements          one row per (bank, statement_date, checksum)
// statement_records   line items as tagged JSON, in statement order
// events              append-only audit trail
//
// Re-importing byte-identical statement text is a no-op.

use crate::banks::BankId;
use crate::model::{BankBouncedItem, CollectionRecord, Statement, StatementRecord};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "id", rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted(i64),
    /// Same bank, date and checksum already stored
    Unchanged(i64),
}

impl UpsertOutcome {
    pub fn id(&self) -> i64 {
        match self {
            UpsertOutcome::Inserted(id) | UpsertOutcome::Unchanged(id) => *id,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }
}

/// Audit trail entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(event_type: &str, entity_id: &str, data: serde_json::Value, actor: &str) -> Self {
        Event {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS statements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bank TEXT NOT NULL,
            statement_date TEXT NOT NULL,
            opening_balance INTEGER NOT NULL,
            closing_balance INTEGER NOT NULL,
            checksum TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (bank, statement_date, checksum)
        );

        CREATE TABLE IF NOT EXISTS statement_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            statement_id INTEGER NOT NULL REFERENCES statements(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            kind TEXT NOT NULL,
            payload TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_statements_date ON statements(statement_date);
        CREATE INDEX IF NOT EXISTS idx_records_statement ON statement_records(statement_id, position);
        CREATE INDEX IF NOT EXISTS idx_records_kind ON statement_records(kind);
        CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_id);",
    )?;

    Ok(())
}

// ============================================================================
// WRITES
// ============================================================================

/// Store a statement and its records; identical content is left untouched
pub fn upsert_statement(conn: &Connection, statement: &Statement) -> Result<UpsertOutcome> {
    let tx = conn.unchecked_transaction()?;
    let date = statement.statement_date.to_string();

    let changed = tx.execute(
        "INSERT INTO statements (bank, statement_date, opening_balance, closing_balance, checksum)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (bank, statement_date, checksum) DO NOTHING",
        params![
            statement.bank.code(),
            date,
            statement.opening_balance,
            statement.closing_balance,
            statement.checksum,
        ],
    )?;

    if changed == 0 {
        let id: i64 = tx.query_row(
            "SELECT id FROM statements WHERE bank = ?1 AND statement_date = ?2 AND checksum = ?3",
            params![statement.bank.code(), date, statement.checksum],
            |row| row.get(0),
        )?;
        tx.commit()?;
        debug!(bank = statement.bank.code(), %date, id, "statement unchanged");
        return Ok(UpsertOutcome::Unchanged(id));
    }

    let id = tx.last_insert_rowid();
    for (position, record) in statement.records().iter().enumerate() {
        tx.execute(
            "INSERT INTO statement_records (statement_id, position, kind, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, position as i64, record.kind(), serde_json::to_string(record)?],
        )?;
    }

    insert_event(
        &tx,
        &Event::new(
            "statement_added",
            &id.to_string(),
            serde_json::json!({
                "bank": statement.bank.code(),
                "statement_date": date,
                "records": statement.record_count(),
                "checksum": statement.checksum,
            }),
            "statement_store",
        ),
    )?;
    tx.commit()?;

    info!(bank = statement.bank.code(), %date, id, records = statement.record_count(), "statement stored");
    Ok(UpsertOutcome::Inserted(id))
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    conn.execute(
        "INSERT INTO events (event_id, timestamp, event_type, entity_id, data, actor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_id,
            serde_json::to_string(&event.data)?,
            event.actor,
        ],
    )?;
    Ok(())
}

// ============================================================================
// READS
// ============================================================================

/// Validate "YYYY-MM"
pub fn parse_period(period: &str) -> Result<(i32, u32)> {
    let (year, month) = period
        .split_once('-')
        .ok_or_else(|| anyhow!("Invalid period '{}': expected YYYY-MM", period))?;
    let year: i32 = year
        .parse()
        .with_context(|| format!("Invalid year in period '{}'", period))?;
    let month: u32 = month
        .parse()
        .with_context(|| format!("Invalid month in period '{}'", period))?;
    if year < 1900 || !(1..=12).contains(&month) {
        return Err(anyhow!("Invalid period '{}': expected YYYY-MM", period));
    }
    Ok((year, month))
}

pub fn get_statement(conn: &Connection, id: i64) -> Result<Option<Statement>> {
    let header = conn
        .query_row(
            "SELECT id, bank, statement_date, opening_balance, closing_balance, checksum
             FROM statements WHERE id = ?1",
            params![id],
            read_header,
        )
        .optional()?;

    match header {
        Some(header) => Ok(Some(load_statement(conn, header)?)),
        None => Ok(None),
    }
}

/// Every statement dated in the period, by date then bank
pub fn get_statements_for_period(conn: &Connection, period: &str) -> Result<Vec<Statement>> {
    let (year, month) = parse_period(period)?;
    let prefix = format!("{:04}-{:02}", year, month);

    let mut stmt = conn.prepare(
        "SELECT id, bank, statement_date, opening_balance, closing_balance, checksum
         FROM statements
         WHERE substr(statement_date, 1, 7) = ?1
         ORDER BY statement_date, bank, id",
    )?;
    let headers = stmt
        .query_map(params![prefix], read_header)?
        .collect::<Result<Vec<_>, _>>()?;

    headers
        .into_iter()
        .map(|header| load_statement(conn, header))
        .collect()
}

pub fn get_bounced_items_for_period(conn: &Connection, period: &str) -> Result<Vec<BankBouncedItem>> {
    let statements = get_statements_for_period(conn, period)?;
    Ok(crate::model::bounced_items_of(&statements))
}

pub fn statement_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM statements", [], |row| row.get(0))?;
    Ok(count)
}

pub fn get_events_for_entity(conn: &Connection, entity_id: &str) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_id, data, actor
         FROM events WHERE entity_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(event_id, timestamp, event_type, entity_id, data, actor)| {
            Ok(Event {
                event_id,
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .context("Invalid event timestamp")?
                    .with_timezone(&Utc),
                event_type,
                entity_id,
                data: serde_json::from_str(&data).context("Invalid event data")?,
                actor,
            })
        })
        .collect()
}

struct StatementHeader {
    id: i64,
    bank: String,
    statement_date: String,
    opening_balance: i64,
    closing_balance: i64,
    checksum: String,
}

fn read_header(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatementHeader> {
    Ok(StatementHeader {
        id: row.get(0)?,
        bank: row.get(1)?,
        statement_date: row.get(2)?,
        opening_balance: row.get(3)?,
        closing_balance: row.get(4)?,
        checksum: row.get(5)?,
    })
}

fn load_statement(conn: &Connection, header: StatementHeader) -> Result<Statement> {
    let bank = BankId::from_name(&header.bank)
        .ok_or_else(|| anyhow!("Unknown bank '{}' in statement {}", header.bank, header.id))?;
    let date = NaiveDate::parse_from_str(&header.statement_date, "%Y-%m-%d")
        .with_context(|| format!("Invalid date in statement {}", header.id))?;

    let mut statement = Statement::new(bank, date);
    statement.opening_balance = header.opening_balance;
    statement.closing_balance = header.closing_balance;
    statement.checksum = header.checksum;

    let mut stmt = conn.prepare(
        "SELECT payload FROM statement_records WHERE statement_id = ?1 ORDER BY position",
    )?;
    let payloads = stmt
        .query_map(params![header.id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    for payload in payloads {
        let record: StatementRecord = serde_json::from_str(&payload)
            .with_context(|| format!("Invalid record payload in statement {}", header.id))?;
        statement.push_record(record);
    }

    Ok(statement)
}

// ============================================================================
// COLLECTION LEDGER
// ============================================================================

/// Headers: client_code, amount, bank_name, instrument_type, draft_due_date,
/// check_number, statement_date. Amounts in minor units, dates ISO.
pub fn load_collections_csv(csv_path: &Path) -> Result<Vec<CollectionRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open collections CSV: {}", csv_path.display()))?;
    read_collections(&mut rdr)
}

pub fn parse_collections_csv(data: &str) -> Result<Vec<CollectionRecord>> {
    let mut rdr = csv::Reader::from_reader(data.as_bytes());
    read_collections(&mut rdr)
}

fn read_collections<R: std::io::Read>(rdr: &mut csv::Reader<R>) -> Result<Vec<CollectionRecord>> {
    let mut collections = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let record: CollectionRecord =
            result.with_context(|| format!("Failed to parse collection on line {}", line + 2))?;
        collections.push(record);
    }
    Ok(collections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BouncedItemRecord, DepositRecord, InstrumentType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn create_test_statement(bank: BankId, statement_date: NaiveDate, text: &str) -> Statement {
        let mut statement = Statement::new(bank, statement_date);
        statement.opening_balance = 15_450_000;
        statement.closing_balance = 15_950_000;
        statement.checksum = Statement::compute_checksum(text);
        statement.deposits.push(DepositRecord {
            deposit_date: date(2025, 6, 20),
            value_date: Some(date(2025, 6, 23)),
            instrument_type: "EFFET".to_string(),
            client_code: Some("C1".to_string()),
            reference: Some("REM0001".to_string()),
            amount: 1_000_000,
        });
        statement.bounced_items.push(BouncedItemRecord {
            due_date: date(2025, 6, 20),
            return_date: None,
            client_code: "C3".to_string(),
            description: Some("PROVISION INSUFFISANTE".to_string()),
            amount: 2_000_000,
        });
        statement
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let conn = create_test_db();
        let statement = create_test_statement(BankId::Biat, date(2025, 6, 30), "text");

        let first = upsert_statement(&conn, &statement).unwrap();
        let second = upsert_statement(&conn, &statement).unwrap();

        assert!(first.is_inserted());
        assert_eq!(second, UpsertOutcome::Unchanged(first.id()));
        assert_eq!(statement_count(&conn).unwrap(), 1);

        let records: i64 = conn
            .query_row("SELECT COUNT(*) FROM statement_records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(records, 2);
    }

    #[test]
    fn test_changed_content_is_a_new_row() {
        let conn = create_test_db();
        upsert_statement(&conn, &create_test_statement(BankId::Biat, date(2025, 6, 30), "v1")).unwrap();
        let outcome =
            upsert_statement(&conn, &create_test_statement(BankId::Biat, date(2025, 6, 30), "v2")).unwrap();

        assert!(outcome.is_inserted());
        assert_eq!(statement_count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_statement_round_trip() {
        let conn = create_test_db();
        let statement = create_test_statement(BankId::AmenBank, date(2025, 6, 30), "amen");
        let id = upsert_statement(&conn, &statement).unwrap().id();

        assert_eq!(get_statement(&conn, id).unwrap(), Some(statement));
        assert_eq!(get_statement(&conn, id + 100).unwrap(), None);
    }

    #[test]
    fn test_period_queries() {
        let conn = create_test_db();
        upsert_statement(&conn, &create_test_statement(BankId::Stb, date(2025, 6, 30), "a")).unwrap();
        upsert_statement(&conn, &create_test_statement(BankId::Biat, date(2025, 6, 15), "b")).unwrap();
        upsert_statement(&conn, &create_test_statement(BankId::Biat, date(2025, 7, 31), "c")).unwrap();

        let june = get_statements_for_period(&conn, "2025-06").unwrap();
        assert_eq!(june.len(), 2);
        assert_eq!(june[0].statement_date, date(2025, 6, 15));

        let bounced = get_bounced_items_for_period(&conn, "2025-06").unwrap();
        assert_eq!(bounced.len(), 2);
        assert_eq!(bounced[0].bank, "BIAT");

        assert!(get_statements_for_period(&conn, "2025-13").is_err());
        assert!(get_statements_for_period(&conn, "june").is_err());
    }

    #[test]
    fn test_insert_logs_event() {
        let conn = create_test_db();
        let id = upsert_statement(&conn, &create_test_statement(BankId::Uib, date(2025, 6, 30), "uib"))
            .unwrap()
            .id();

        let events = get_events_for_entity(&conn, &id.to_string()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "statement_added");
        assert_eq!(events[0].data["bank"], "UIB");
    }

    #[test]
    fn test_collections_csv() {
        let data = "\
client_code,amount,bank_name,instrument_type,draft_due_date,check_number,statement_date
C1,2000000,BIAT,EFFET,2025-06-20,,2025-06-30
C2,500000,,CHQ,,0012345,2025-06-30
C3,750000,,,,,2025-06-30
";
        let collections = parse_collections_csv(data).unwrap();

        assert_eq!(collections.len(), 3);
        assert_eq!(collections[0].instrument_type, InstrumentType::Draft);
        assert_eq!(collections[0].draft_due_date, Some(date(2025, 6, 20)));
        assert_eq!(collections[1].bank_name, None);
        assert_eq!(collections[1].check_number.as_deref(), Some("0012345"));
        assert_eq!(collections[2].instrument_type, InstrumentType::Generic);

        assert!(parse_collections_csv("client_code,amount\nC1,abc\n").is_err());
    }
}
