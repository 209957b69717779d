// SQLite-backed repository
//
// One connection behind a mutex. Uniqueness is enforced by the schema, not by
// read-then-write in Rust: users.id and wallets.address are primary keys and
// wallets.user_id is UNIQUE. A violated constraint comes back as
// `StoreError::Conflict` so callers can re-read.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::debug;

use bovinext_core::model::{
    AnimalRecord, AnimalStatus, TransactionKind, TransactionRecord, TransactionStatus, UserRecord,
    WalletRecord,
};
use bovinext_core::ports::{
    AnimalRepository, StoreError, TransactionRepository, UserRepository, WalletRepository,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS wallets (
    address TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE REFERENCES users(id),
    balance TEXT NOT NULL DEFAULT '0',   -- decimal as text, exact
    nonce INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS animals (
    id TEXT PRIMARY KEY,
    tag TEXT NOT NULL,
    weight_kg TEXT NOT NULL,
    acquisition_cost TEXT,               -- NULL = unknown
    accumulated_cost TEXT NOT NULL DEFAULT '0',
    status TEXT NOT NULL,                -- ATIVO | VENDIDO | MORTO
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS animals_by_status ON animals(status);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    hash TEXT NOT NULL,
    from_address TEXT NOT NULL,
    to_address TEXT NOT NULL,
    amount TEXT NOT NULL,
    fee TEXT NOT NULL,
    status TEXT NOT NULL,
    kind TEXT NOT NULL,
    created_at TEXT NOT NULL             -- RFC 3339, fixed width, sorts lexically
);

CREATE INDEX IF NOT EXISTS transactions_from ON transactions(from_address, created_at);
CREATE INDEX IF NOT EXISTS transactions_to ON transactions(to_address, created_at);
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(backend)?;
        Self::init(conn)
    }

    /// Private in-memory database. Gone when the store is dropped.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().map_err(backend)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(backend)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(backend)?;
        conn.execute_batch(SCHEMA).map_err(backend)?;
        debug!("sqlite schema ready");
        Ok(Self { conn: Mutex::new(conn) })
    }
}

// ---------------------------------------------------------------------------
// Error + value conversion
// ---------------------------------------------------------------------------

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Map insert failures, turning uniqueness violations into `Conflict`.
fn insert_error(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref err, ref msg) = e {
        let unique = err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY;
        if unique {
            return StoreError::Conflict(msg.clone().unwrap_or_else(|| err.to_string()));
        }
    }
    backend(e)
}

fn decimal(column: &str, raw: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw).map_err(|e| StoreError::Corrupt(format!("{column} '{raw}': {e}")))
}

fn timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("created_at '{raw}': {e}")))
}

fn timestamp_text(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

struct RawWallet {
    address: String,
    user_id: String,
    balance: String,
    nonce: i64,
    created_at: String,
}

impl RawWallet {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            address: row.get(0)?,
            user_id: row.get(1)?,
            balance: row.get(2)?,
            nonce: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<WalletRecord, StoreError> {
        Ok(WalletRecord {
            balance: decimal("balance", &self.balance)?,
            nonce: u64::try_from(self.nonce)
                .map_err(|_| StoreError::Corrupt(format!("nonce {}", self.nonce)))?,
            created_at: timestamp(&self.created_at)?,
            address: self.address,
            user_id: self.user_id,
        })
    }
}

struct RawAnimal {
    id: String,
    tag: String,
    weight_kg: String,
    acquisition_cost: Option<String>,
    accumulated_cost: String,
    status: String,
    created_at: String,
}

const ANIMAL_COLUMNS: &str =
    "id, tag, weight_kg, acquisition_cost, accumulated_cost, status, created_at";

impl RawAnimal {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            tag: row.get(1)?,
            weight_kg: row.get(2)?,
            acquisition_cost: row.get(3)?,
            accumulated_cost: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_record(self) -> Result<AnimalRecord, StoreError> {
        let status = AnimalStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Corrupt(format!("animal status '{}'", self.status)))?;
        Ok(AnimalRecord {
            weight_kg: decimal("weight_kg", &self.weight_kg)?,
            acquisition_cost: self
                .acquisition_cost
                .as_deref()
                .map(|raw| decimal("acquisition_cost", raw))
                .transpose()?,
            accumulated_cost: decimal("accumulated_cost", &self.accumulated_cost)?,
            created_at: timestamp(&self.created_at)?,
            status,
            id: self.id,
            tag: self.tag,
        })
    }
}

struct RawTransaction {
    id: String,
    hash: String,
    from_address: String,
    to_address: String,
    amount: String,
    fee: String,
    status: String,
    kind: String,
    created_at: String,
}

impl RawTransaction {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            hash: row.get(1)?,
            from_address: row.get(2)?,
            to_address: row.get(3)?,
            amount: row.get(4)?,
            fee: row.get(5)?,
            status: row.get(6)?,
            kind: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<TransactionRecord, StoreError> {
        Ok(TransactionRecord {
            amount: decimal("amount", &self.amount)?,
            fee: decimal("fee", &self.fee)?,
            status: TransactionStatus::parse(&self.status)
                .ok_or_else(|| StoreError::Corrupt(format!("transaction status '{}'", self.status)))?,
            kind: TransactionKind::parse(&self.kind)
                .ok_or_else(|| StoreError::Corrupt(format!("transaction kind '{}'", self.kind)))?,
            created_at: timestamp(&self.created_at)?,
            id: self.id,
            hash: self.hash,
            from_address: self.from_address,
            to_address: self.to_address,
        })
    }
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

impl UserRepository for SqliteStore {
    fn find_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.conn
            .lock()
            .query_row(
                "SELECT id, email FROM users WHERE id = ?1",
                params![id],
                |row| Ok(UserRecord { id: row.get(0)?, email: row.get(1)? }),
            )
            .optional()
            .map_err(backend)
    }

    fn insert_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO users (id, email) VALUES (?1, ?2)",
                params![user.id, user.email],
            )
            .map(|_| ())
            .map_err(insert_error)
    }
}

const WALLET_COLUMNS: &str = "address, user_id, balance, nonce, created_at";

impl WalletRepository for SqliteStore {
    fn wallet_by_user(&self, user_id: &str) -> Result<Option<WalletRecord>, StoreError> {
        let raw = self
            .conn
            .lock()
            .query_row(
                &format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = ?1"),
                params![user_id],
                RawWallet::from_row,
            )
            .optional()
            .map_err(backend)?;
        raw.map(RawWallet::into_record).transpose()
    }

    fn wallet_by_address(&self, address: &str) -> Result<Option<WalletRecord>, StoreError> {
        let raw = self
            .conn
            .lock()
            .query_row(
                &format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE address = ?1"),
                params![address],
                RawWallet::from_row,
            )
            .optional()
            .map_err(backend)?;
        raw.map(RawWallet::into_record).transpose()
    }

    fn insert_wallet(&self, wallet: &WalletRecord) -> Result<(), StoreError> {
        let nonce = i64::try_from(wallet.nonce)
            .map_err(|_| StoreError::Backend(format!("nonce {} out of range", wallet.nonce)))?;
        self.conn
            .lock()
            .execute(
                "INSERT INTO wallets (address, user_id, balance, nonce, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    wallet.address,
                    wallet.user_id,
                    wallet.balance.to_string(),
                    nonce,
                    timestamp_text(&wallet.created_at),
                ],
            )
            .map(|_| ())
            .map_err(insert_error)
    }

    fn update_balance(&self, address: &str, balance: Decimal) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .lock()
            .execute(
                "UPDATE wallets SET balance = ?2 WHERE address = ?1",
                params![address, balance.to_string()],
            )
            .map_err(backend)?;
        Ok(changed > 0)
    }

    fn next_nonce(&self, address: &str) -> Result<Option<u64>, StoreError> {
        let previous: Option<i64> = self
            .conn
            .lock()
            .query_row(
                "UPDATE wallets SET nonce = nonce + 1 WHERE address = ?1 RETURNING nonce - 1",
                params![address],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        previous
            .map(|n| u64::try_from(n).map_err(|_| StoreError::Corrupt(format!("nonce {n}"))))
            .transpose()
    }
}

impl AnimalRepository for SqliteStore {
    fn insert_animal(&self, animal: &AnimalRecord) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute(
                &format!("INSERT INTO animals ({ANIMAL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    animal.id,
                    animal.tag,
                    animal.weight_kg.to_string(),
                    animal.acquisition_cost.map(|c| c.to_string()),
                    animal.accumulated_cost.to_string(),
                    animal.status.as_str(),
                    timestamp_text(&animal.created_at),
                ],
            )
            .map(|_| ())
            .map_err(insert_error)
    }

    fn animal(&self, id: &str) -> Result<Option<AnimalRecord>, StoreError> {
        let raw = self
            .conn
            .lock()
            .query_row(
                &format!("SELECT {ANIMAL_COLUMNS} FROM animals WHERE id = ?1"),
                params![id],
                RawAnimal::from_row,
            )
            .optional()
            .map_err(backend)?;
        raw.map(RawAnimal::into_record).transpose()
    }

    fn animals_by_ids(&self, ids: &[String]) -> Result<Vec<AnimalRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT {ANIMAL_COLUMNS} FROM animals WHERE id IN ({placeholders})");

        let raws = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&sql).map_err(backend)?;
            let rows = stmt
                .query_map(params_from_iter(ids.iter()), RawAnimal::from_row)
                .map_err(backend)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(backend)?
        };
        raws.into_iter().map(RawAnimal::into_record).collect()
    }

    fn animals_with_status(&self, status: AnimalStatus) -> Result<Vec<AnimalRecord>, StoreError> {
        let raws = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {ANIMAL_COLUMNS} FROM animals WHERE status = ?1 ORDER BY created_at DESC"
                ))
                .map_err(backend)?;
            let rows = stmt
                .query_map(params![status.as_str()], RawAnimal::from_row)
                .map_err(backend)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(backend)?
        };
        raws.into_iter().map(RawAnimal::into_record).collect()
    }

    fn animals(&self) -> Result<Vec<AnimalRecord>, StoreError> {
        let raws = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {ANIMAL_COLUMNS} FROM animals ORDER BY created_at DESC"
                ))
                .map_err(backend)?;
            let rows = stmt.query_map([], RawAnimal::from_row).map_err(backend)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(backend)?
        };
        raws.into_iter().map(RawAnimal::into_record).collect()
    }
}

impl TransactionRepository for SqliteStore {
    fn insert_transaction(&self, tx: &TransactionRecord) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO transactions (id, hash, from_address, to_address, amount, fee, status, kind, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    tx.id,
                    tx.hash,
                    tx.from_address,
                    tx.to_address,
                    tx.amount.to_string(),
                    tx.fee.to_string(),
                    tx.status.as_str(),
                    tx.kind.as_str(),
                    timestamp_text(&tx.created_at),
                ],
            )
            .map(|_| ())
            .map_err(insert_error)
    }

    fn transactions_for(
        &self,
        address: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let raws = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT id, hash, from_address, to_address, amount, fee, status, kind, created_at \
                     FROM transactions WHERE from_address = ?1 OR to_address = ?1 \
                     ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
                )
                .map_err(backend)?;
            let rows = stmt
                .query_map(params![address, limit, offset], RawTransaction::from_row)
                .map_err(backend)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(backend)?
        };
        raws.into_iter().map(RawTransaction::into_record).collect()
    }
}
