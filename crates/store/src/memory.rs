//! In-memory repository with the same uniqueness contract as SQLite.
//!
//! Used by tests and by `bovinext serve --memory`. Supports one-shot failure
//! injection so partial-provisioning paths can be exercised.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use rust_decimal::Decimal;

use bovinext_core::model::{AnimalRecord, AnimalStatus, TransactionRecord, UserRecord, WalletRecord};
use bovinext_core::ports::{
    AnimalRepository, StoreError, TransactionRepository, UserRepository, WalletRepository,
};

/// Repository operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FindUser,
    InsertUser,
    WalletByUser,
    InsertWallet,
    InsertTransaction,
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    wallets: HashMap<String, WalletRecord>,
    wallet_by_user: HashMap<String, String>,
    animals: HashMap<String, AnimalRecord>,
    // Insertion order is the tiebreak for equal timestamps.
    transactions: Vec<TransactionRecord>,
    failures: HashSet<Operation>,
}

impl Tables {
    fn trip(&mut self, op: Operation) -> Result<(), StoreError> {
        if self.failures.remove(&op) {
            return Err(StoreError::Backend(format!("injected failure on {op:?}")));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with a backend error.
    pub fn fail_next(&self, op: Operation) {
        self.tables.lock().failures.insert(op);
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().users.len()
    }

    pub fn wallet_count(&self) -> usize {
        self.tables.lock().wallets.len()
    }
}

impl UserRepository for MemoryStore {
    fn find_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let mut t = self.tables.lock();
        t.trip(Operation::FindUser)?;
        Ok(t.users.get(id).cloned())
    }

    fn insert_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        t.trip(Operation::InsertUser)?;
        if t.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("users.id {}", user.id)));
        }
        t.users.insert(user.id.clone(), user.clone());
        Ok(())
    }
}

impl WalletRepository for MemoryStore {
    fn wallet_by_user(&self, user_id: &str) -> Result<Option<WalletRecord>, StoreError> {
        let mut t = self.tables.lock();
        t.trip(Operation::WalletByUser)?;
        Ok(t
            .wallet_by_user
            .get(user_id)
            .and_then(|address| t.wallets.get(address))
            .cloned())
    }

    fn wallet_by_address(&self, address: &str) -> Result<Option<WalletRecord>, StoreError> {
        Ok(self.tables.lock().wallets.get(address).cloned())
    }

    fn insert_wallet(&self, wallet: &WalletRecord) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        t.trip(Operation::InsertWallet)?;
        if !t.users.contains_key(&wallet.user_id) {
            return Err(StoreError::Backend(format!("no user {}", wallet.user_id)));
        }
        if t.wallets.contains_key(&wallet.address) {
            return Err(StoreError::Conflict(format!("wallets.address {}", wallet.address)));
        }
        if t.wallet_by_user.contains_key(&wallet.user_id) {
            return Err(StoreError::Conflict(format!("wallets.user_id {}", wallet.user_id)));
        }
        t.wallet_by_user
            .insert(wallet.user_id.clone(), wallet.address.clone());
        t.wallets.insert(wallet.address.clone(), wallet.clone());
        Ok(())
    }

    fn update_balance(&self, address: &str, balance: Decimal) -> Result<bool, StoreError> {
        match self.tables.lock().wallets.get_mut(address) {
            Some(w) => {
                w.balance = balance;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn next_nonce(&self, address: &str) -> Result<Option<u64>, StoreError> {
        Ok(self.tables.lock().wallets.get_mut(address).map(|w| {
            let previous = w.nonce;
            w.nonce += 1;
            previous
        }))
    }
}

impl AnimalRepository for MemoryStore {
    fn insert_animal(&self, animal: &AnimalRecord) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        if t.animals.contains_key(&animal.id) {
            return Err(StoreError::Conflict(format!("animals.id {}", animal.id)));
        }
        t.animals.insert(animal.id.clone(), animal.clone());
        Ok(())
    }

    fn animal(&self, id: &str) -> Result<Option<AnimalRecord>, StoreError> {
        Ok(self.tables.lock().animals.get(id).cloned())
    }

    fn animals_by_ids(&self, ids: &[String]) -> Result<Vec<AnimalRecord>, StoreError> {
        let t = self.tables.lock();
        Ok(ids.iter().filter_map(|id| t.animals.get(id)).cloned().collect())
    }

    fn animals_with_status(&self, status: AnimalStatus) -> Result<Vec<AnimalRecord>, StoreError> {
        let t = self.tables.lock();
        let mut out: Vec<_> = t
            .animals
            .values()
            .filter(|a| a.status == status)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    fn animals(&self) -> Result<Vec<AnimalRecord>, StoreError> {
        let mut out: Vec<_> = self.tables.lock().animals.values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

impl TransactionRepository for MemoryStore {
    fn insert_transaction(&self, tx: &TransactionRecord) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        t.trip(Operation::InsertTransaction)?;
        if t.transactions.iter().any(|existing| existing.id == tx.id) {
            return Err(StoreError::Conflict(format!("transactions.id {}", tx.id)));
        }
        t.transactions.push(tx.clone());
        Ok(())
    }

    fn transactions_for(
        &self,
        address: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let t = self.tables.lock();
        let mut matching: Vec<(usize, &TransactionRecord)> = t
            .transactions
            .iter()
            .enumerate()
            .filter(|(_, tx)| tx.from_address == address || tx.to_address == address)
            .collect();
        matching.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, tx)| tx.clone())
            .collect())
    }
}
