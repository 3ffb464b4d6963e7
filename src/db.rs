// 🗄️ Expense Database - CSV import, SQLite schema and the SQLite store
//
// The source table keeps every cell as text exactly as exported; the
// pipeline does all parsing. Re-importing the same file is a no-op thanks
// to the UNIQUE idempotency hash.

use crate::entities::{
    Category, FiscalDocument, Legislator, LegislatorKey, Party, Region,
};
use crate::error::StorageResult;
use crate::pipeline::Stage;
use crate::store::ExpenseStore;
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

/// One row of the flat expense-quota export
/// Every cell is free text and may be empty
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawExpenseRecord {
    #[serde(rename = "txNomeParlamentar", default)]
    pub legislator_name: Option<String>,

    #[serde(rename = "ideCadastro", default)]
    pub registration_id: Option<String>,

    #[serde(rename = "sgUF", default)]
    pub region_code: Option<String>,

    #[serde(rename = "sgPartido", default)]
    pub party_code: Option<String>,

    #[serde(rename = "txtDescricao", default)]
    pub description: Option<String>,

    #[serde(rename = "txtDescricaoEspecificacao", default)]
    pub category_description: Option<String>,

    #[serde(rename = "txtFornecedor", default)]
    pub beneficiary: Option<String>,

    #[serde(rename = "txtCNPJCPF", default)]
    pub payer_id: Option<String>,

    #[serde(rename = "txtNumero", default)]
    pub document_number: Option<String>,

    #[serde(rename = "indTipoDocumento", default)]
    pub document_type: Option<String>,

    #[serde(rename = "datEmissao", default)]
    pub issue_date: Option<String>,

    #[serde(rename = "vlrDocumento", default)]
    pub document_value: Option<String>,

    #[serde(rename = "vlrGlosa", default)]
    pub disallowed_value: Option<String>,

    #[serde(rename = "vlrLiquido", default)]
    pub net_value: Option<String>,

    #[serde(rename = "numMes", default)]
    pub month: Option<String>,

    #[serde(rename = "numAno", default)]
    pub year: Option<String>,

    #[serde(rename = "numParcela", default)]
    pub installment: Option<String>,

    #[serde(rename = "txtPassageiro", default)]
    pub passenger_name: Option<String>,

    #[serde(rename = "txtTrecho", default)]
    pub travel_segment: Option<String>,
}

impl RawExpenseRecord {
    fn fields(&self) -> [&Option<String>; 19] {
        [
            &self.legislator_name,
            &self.registration_id,
            &self.region_code,
            &self.party_code,
            &self.description,
            &self.category_description,
            &self.beneficiary,
            &self.payer_id,
            &self.document_number,
            &self.document_type,
            &self.issue_date,
            &self.document_value,
            &self.disallowed_value,
            &self.net_value,
            &self.month,
            &self.year,
            &self.installment,
            &self.passenger_name,
            &self.travel_segment,
        ]
    }

    /// Hash over every cell, used to make re-imports idempotent
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for field in self.fields() {
            match field {
                Some(value) => hasher.update(value.as_bytes()),
                None => hasher.update([0u8]),
            }
            hasher.update([0x1f]);
        }
        format!("{:x}", hasher.finalize())
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawExpenseRecord {
            legislator_name: row.get(0)?,
            registration_id: row.get(1)?,
            region_code: row.get(2)?,
            party_code: row.get(3)?,
            description: row.get(4)?,
            category_description: row.get(5)?,
            beneficiary: row.get(6)?,
            payer_id: row.get(7)?,
            document_number: row.get(8)?,
            document_type: row.get(9)?,
            issue_date: row.get(10)?,
            document_value: row.get(11)?,
            disallowed_value: row.get(12)?,
            net_value: row.get(13)?,
            month: row.get(14)?,
            year: row.get(15)?,
            installment: row.get(16)?,
            passenger_name: row.get(17)?,
            travel_segment: row.get(18)?,
        })
    }
}

const EXPENSE_COLUMNS: &str = "legislator_name, registration_id, region_code, party_code,
    description, category_description, beneficiary, payer_id, document_number,
    document_type, issue_date, document_value, disallowed_value, net_value,
    month, year, installment, passenger_name, travel_segment";

/// Tables reported by `table_counts`, in pipeline order
pub const TABLES: [&str; 6] = [
    "expenses",
    "regions",
    "categories",
    "parties",
    "legislators",
    "fiscal_documents",
];

pub fn setup_database(conn: &Connection) -> StorageResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Source table (denormalized, read-only to the pipeline)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            legislator_name TEXT,
            registration_id TEXT,
            region_code TEXT,
            party_code TEXT,
            description TEXT,
            category_description TEXT,
            beneficiary TEXT,
            payer_id TEXT,
            document_number TEXT,
            document_type TEXT,
            issue_date TEXT,
            document_value TEXT,
            disallowed_value TEXT,
            net_value TEXT,
            month TEXT,
            year TEXT,
            installment TEXT,
            passenger_name TEXT,
            travel_segment TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Normalized tables
    // ==========================================================================
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS regions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS parties (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS legislators (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            registration_id INTEGER,
            party_code TEXT REFERENCES parties(code),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS fiscal_documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            issue_date TEXT,
            document_type INTEGER NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL,
            installment INTEGER NOT NULL,
            description TEXT,
            category_description TEXT,
            beneficiary TEXT,
            document_number TEXT,
            payer_id TEXT,
            passenger_name TEXT,
            travel_segment TEXT,
            document_value REAL NOT NULL,
            disallowed_value REAL NOT NULL,
            net_value REAL NOT NULL,
            region_code TEXT REFERENCES regions(code),
            legislator_id TEXT REFERENCES legislators(id),
            category_name TEXT REFERENCES categories(name),
            created_at TEXT NOT NULL
        );",
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_expenses_hash ON expenses(idempotency_hash);
         CREATE INDEX IF NOT EXISTS idx_documents_period ON fiscal_documents(year, month);
         CREATE INDEX IF NOT EXISTS idx_documents_legislator ON fiscal_documents(legislator_id);",
    )?;

    Ok(())
}

/// Read the expense export; the official files are `;`-separated
pub fn load_csv(csv_path: &Path, delimiter: u8) -> StorageResult<Vec<RawExpenseRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(csv_path)?;

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: RawExpenseRecord = result?;
        records.push(record);
    }

    info!("Loaded {} expense rows from {}", records.len(), csv_path.display());
    Ok(records)
}

/// Insert raw rows, skipping ones already imported. Returns rows inserted.
pub fn insert_expenses(conn: &Connection, records: &[RawExpenseRecord]) -> StorageResult<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;

    let mut stmt = conn.prepare(&format!(
        "INSERT OR IGNORE INTO expenses (idempotency_hash, {})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
        EXPENSE_COLUMNS
    ))?;

    for record in records {
        let hash = record.compute_idempotency_hash();
        let changed = stmt.execute(params![
            hash,
            record.legislator_name,
            record.registration_id,
            record.region_code,
            record.party_code,
            record.description,
            record.category_description,
            record.beneficiary,
            record.payer_id,
            record.document_number,
            record.document_type,
            record.issue_date,
            record.document_value,
            record.disallowed_value,
            record.net_value,
            record.month,
            record.year,
            record.installment,
            record.passenger_name,
            record.travel_segment,
        ])?;

        if changed == 0 {
            duplicates += 1;
        } else {
            inserted += 1;
        }
    }

    info!("Inserted {} expense rows, skipped {} duplicates", inserted, duplicates);
    Ok(inserted)
}

/// Row count for every table in `TABLES`
pub fn table_counts(conn: &Connection) -> StorageResult<Vec<(&'static str, i64)>> {
    let mut counts = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        counts.push((table, count));
    }
    Ok(counts)
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// SQLite-backed expense store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> StorageResult<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Distinct values of one source column, in first-seen order
    fn distinct_column(&self, column: &str) -> StorageResult<Vec<Option<String>>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {column} FROM expenses GROUP BY {column} ORDER BY MIN(id)"
        ))?;

        let values = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<Option<String>>, _>>()?;

        Ok(values)
    }

    fn exists(&self, table: &str, column: &str, value: &str) -> StorageResult<bool> {
        let found: bool = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {column} = ?1)"),
            [value],
            |row| row.get(0),
        )?;
        Ok(found)
    }
}

impl ExpenseStore for SqliteStore {
    fn list_expenses(&self) -> StorageResult<Vec<RawExpenseRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM expenses ORDER BY id", EXPENSE_COLUMNS))?;

        let records = stmt
            .query_map([], RawExpenseRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn list_distinct_region_codes(&self) -> StorageResult<Vec<Option<String>>> {
        self.distinct_column("region_code")
    }

    fn list_distinct_category_names(&self) -> StorageResult<Vec<Option<String>>> {
        self.distinct_column("description")
    }

    fn list_distinct_party_codes(&self) -> StorageResult<Vec<Option<String>>> {
        self.distinct_column("party_code")
    }

    fn list_distinct_legislators(&self) -> StorageResult<Vec<LegislatorKey>> {
        let mut stmt = self.conn.prepare(
            "SELECT legislator_name, party_code, registration_id
             FROM expenses
             GROUP BY legislator_name, party_code, registration_id
             ORDER BY MIN(id)",
        )?;

        let keys = stmt
            .query_map([], |row| {
                Ok(LegislatorKey {
                    name: row.get(0)?,
                    party_code: row.get(1)?,
                    registration_id: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(keys)
    }

    fn region_exists(&self, region: &Region) -> StorageResult<bool> {
        self.exists("regions", "code", &region.code)
    }

    fn category_exists(&self, category: &Category) -> StorageResult<bool> {
        self.exists("categories", "name", &category.name)
    }

    fn party_exists(&self, party: &Party) -> StorageResult<bool> {
        self.exists("parties", "code", &party.code)
    }

    fn save_region(&mut self, region: &Region) -> StorageResult<()> {
        self.conn
            .execute("INSERT INTO regions (code) VALUES (?1)", [&region.code])?;
        Ok(())
    }

    fn save_category(&mut self, category: &Category) -> StorageResult<()> {
        self.conn
            .execute("INSERT INTO categories (name) VALUES (?1)", [&category.name])?;
        Ok(())
    }

    fn save_party(&mut self, party: &Party) -> StorageResult<()> {
        self.conn
            .execute("INSERT INTO parties (code) VALUES (?1)", [&party.code])?;
        Ok(())
    }

    fn save_legislator(&mut self, legislator: &Legislator) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO legislators (id, name, registration_id, party_code)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                legislator.id,
                legislator.name,
                legislator.registration_id,
                legislator.party_code(),
            ],
        )?;
        Ok(())
    }

    fn save_fiscal_document(&mut self, document: &FiscalDocument<'_>) -> StorageResult<()> {
        let row = document.to_row();
        let created_at = row.created_at.unwrap_or_else(Utc::now);

        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO fiscal_documents (
                issue_date, document_type, year, month, installment,
                description, category_description, beneficiary, document_number,
                payer_id, passenger_name, travel_segment,
                document_value, disallowed_value, net_value,
                region_code, legislator_id, category_name, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        )?;

        stmt.execute(params![
            row.issue_date.map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string()),
            row.document_type,
            row.year,
            row.month,
            row.installment,
            row.description,
            row.category_description,
            row.beneficiary,
            row.document_number,
            row.payer_id,
            row.passenger_name,
            row.travel_segment,
            row.document_value,
            row.disallowed_value,
            row.net_value,
            row.region_code,
            row.legislator_id,
            row.category_name,
            created_at.to_rfc3339(),
        ])?;

        Ok(())
    }

    fn begin_stage(&mut self, stage: Stage) -> StorageResult<()> {
        debug!("BEGIN {}", stage);
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit_stage(&mut self, stage: Stage) -> StorageResult<()> {
        debug!("COMMIT {}", stage);
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback_stage(&mut self, stage: Stage) -> StorageResult<()> {
        debug!("ROLLBACK {}", stage);
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}
