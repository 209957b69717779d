//! Collaborator seams. Everything the core talks to lives behind one of
//! these traits; implementations sit in `bovinext-store` and
//! `bovinext-gateway`.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::{AnimalRecord, AnimalStatus, Identity, TransactionRecord, UserRecord, WalletRecord};

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert hit a uniqueness constraint. Callers resolve by re-reading.
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("store backend error: {0}")]
    Backend(String),
    /// A stored row could not be decoded into a record.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub trait UserRepository {
    fn find_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError>;
    /// Fails with `Conflict` when a user with the same id exists.
    fn insert_user(&self, user: &UserRecord) -> Result<(), StoreError>;
}

pub trait WalletRepository {
    fn wallet_by_user(&self, user_id: &str) -> Result<Option<WalletRecord>, StoreError>;
    fn wallet_by_address(&self, address: &str) -> Result<Option<WalletRecord>, StoreError>;
    /// Fails with `Conflict` when the user already owns a wallet or the
    /// address is taken.
    fn insert_wallet(&self, wallet: &WalletRecord) -> Result<(), StoreError>;
    /// Returns false when no wallet has this address.
    fn update_balance(&self, address: &str, balance: Decimal) -> Result<bool, StoreError>;
    /// Atomically bumps the nonce and returns the value before the bump.
    fn next_nonce(&self, address: &str) -> Result<Option<u64>, StoreError>;
}

pub trait AnimalRepository {
    fn insert_animal(&self, animal: &AnimalRecord) -> Result<(), StoreError>;
    fn animal(&self, id: &str) -> Result<Option<AnimalRecord>, StoreError>;
    /// Unknown ids are skipped; order of the result is unspecified.
    fn animals_by_ids(&self, ids: &[String]) -> Result<Vec<AnimalRecord>, StoreError>;
    fn animals_with_status(&self, status: AnimalStatus) -> Result<Vec<AnimalRecord>, StoreError>;
    /// Every registered animal, newest first.
    fn animals(&self) -> Result<Vec<AnimalRecord>, StoreError>;
}

pub trait TransactionRepository {
    fn insert_transaction(&self, tx: &TransactionRecord) -> Result<(), StoreError>;
    /// Transactions where `address` is sender or receiver, newest first.
    fn transactions_for(
        &self,
        address: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StoreError>;
}

/// Everything the service needs from persistence.
pub trait Repository:
    UserRepository + WalletRepository + AnimalRepository + TransactionRepository + Send + Sync
{
}

impl<T> Repository for T where
    T: UserRepository + WalletRepository + AnimalRepository + TransactionRepository + Send + Sync
{
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider rejected the token.
    #[error("invalid token")]
    InvalidToken,
    /// The provider could not be reached or answered garbage.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Result<Identity, IdentityError>;
}

// ---------------------------------------------------------------------------
// Wallet addresses
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
#[error("address generation failed: {0}")]
pub struct AddressError(pub String);

pub trait AddressGenerator: Send + Sync {
    /// A fresh, collision-resistant wallet address.
    fn generate(&self) -> Result<String, AddressError>;
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("ledger rejected request: {0}")]
    Rejected(String),
    #[error("malformed ledger response: {0}")]
    Malformed(String),
    /// The client has no source of balances (offline mode).
    #[error("ledger balance source not configured")]
    NoBalanceSource,
}

/// Transfer as submitted to the ledger.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub nonce: u64,
    pub timestamp: i64,
}

/// Untrusted view of the ledger. Values coming back are reconciled against
/// the store, never taken as authoritative on their own.
pub trait LedgerClient: Send + Sync {
    fn balance(&self, address: &str) -> Result<Decimal, LedgerError>;
    /// Returns the transaction hash assigned by the ledger.
    fn submit_transfer(&self, request: &TransferRequest) -> Result<String, LedgerError>;
}
