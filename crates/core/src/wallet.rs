//! Wallet balances, transfer fees, transfers and history.
//!
//! The ledger is an untrusted collaborator. Balances are read from it and
//! reconciled against the store: a ledger failure or an implausible value
//! leaves the stored balance in charge.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use uuid::Uuid;

use crate::address::is_valid_address;
use crate::error::CoreError;
use crate::model::{TransactionKind, TransactionRecord, TransactionStatus, WalletRecord};
use crate::ports::{LedgerClient, TransactionRepository, TransferRequest, WalletRepository};

/// Brokerage fee on transfers (0.25%).
pub const TRANSFER_FEE_RATE: Decimal = dec!(0.0025);

/// Ticker of the platform token.
pub const CURRENCY: &str = "FINA";

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSource {
    /// Ledger agreed with the store, or its value replaced the stored one.
    Ledger,
    /// Ledger was unavailable or implausible; the stored value stands.
    Store,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balance {
    pub address: String,
    pub balance: Decimal,
    pub source: BalanceSource,
    /// True when the stored balance was overwritten with the ledger's.
    pub updated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeQuote {
    pub amount: Decimal,
    pub fee: Decimal,
    pub total: Decimal,
}

/// Fee and total debit for transferring `amount`.
pub fn transfer_fee(amount: Decimal) -> Result<FeeQuote, CoreError> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::validation(format!(
            "amount must be positive (got {amount})"
        )));
    }
    let fee = amount
        .checked_mul(TRANSFER_FEE_RATE)
        .ok_or_else(|| CoreError::validation("amount out of range"))?;
    let total = amount
        .checked_add(fee)
        .ok_or_else(|| CoreError::validation("amount out of range"))?;
    Ok(FeeQuote { amount, fee, total })
}

/// Validate and normalize to the lower-case form addresses are stored in.
fn require_address(address: &str) -> Result<String, CoreError> {
    if is_valid_address(address) {
        Ok(address.to_ascii_lowercase())
    } else {
        Err(CoreError::validation(format!("invalid wallet address '{address}'")))
    }
}

fn load_wallet(
    repo: &(impl WalletRepository + ?Sized),
    address: &str,
) -> Result<WalletRecord, CoreError> {
    repo.wallet_by_address(address)
        .map_err(CoreError::store("failed to load wallet"))?
        .ok_or_else(|| CoreError::NotFound(format!("wallet {address} not found")))
}

/// The wallet owned by `user_id`. Callers that were never provisioned get
/// `NotFound`.
pub fn wallet_of_user(
    repo: &(impl WalletRepository + ?Sized),
    user_id: &str,
) -> Result<WalletRecord, CoreError> {
    repo.wallet_by_user(user_id)
        .map_err(CoreError::store("failed to load wallet"))?
        .ok_or_else(|| CoreError::NotFound("no wallet provisioned for this user".into()))
}

/// Balance of `address`, reconciled with the ledger.
pub fn wallet_balance(
    repo: &(impl WalletRepository + ?Sized),
    ledger: &dyn LedgerClient,
    address: &str,
) -> Result<Balance, CoreError> {
    let address = require_address(address)?;
    let wallet = load_wallet(repo, &address)?;

    let on_chain = match ledger.balance(&address) {
        Ok(b) if b >= Decimal::ZERO => b,
        _ => {
            return Ok(Balance {
                address: wallet.address,
                balance: wallet.balance,
                source: BalanceSource::Store,
                updated: false,
            })
        }
    };

    if on_chain == wallet.balance {
        return Ok(Balance {
            address: wallet.address,
            balance: on_chain,
            source: BalanceSource::Ledger,
            updated: false,
        });
    }

    let updated = repo
        .update_balance(&address, on_chain)
        .map_err(CoreError::store("failed to update wallet"))?;
    if !updated {
        return Err(CoreError::NotFound(format!("wallet {address} not found")));
    }

    Ok(Balance {
        address: wallet.address,
        balance: on_chain,
        source: BalanceSource::Ledger,
        updated: true,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReceipt {
    pub transaction_hash: String,
    pub status: TransactionStatus,
    pub fee: Decimal,
}

/// Move `amount` from `from` (the caller's wallet) to `to_address`.
///
/// The debit checked against the sender's balance is `amount + fee`. Local
/// balances are left untouched; the transaction is recorded as pending and
/// balances catch up through [`wallet_balance`].
pub fn transfer<R>(
    repo: &R,
    ledger: &dyn LedgerClient,
    from: &WalletRecord,
    to_address: &str,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<TransferReceipt, CoreError>
where
    R: WalletRepository + TransactionRepository + ?Sized,
{
    let to_address = require_address(to_address)?;
    if to_address == from.address {
        return Err(CoreError::validation("cannot transfer to the same wallet"));
    }
    let quote = transfer_fee(amount)?;

    load_wallet(repo, &to_address)?;

    if from.balance < quote.total {
        return Err(CoreError::validation(format!(
            "insufficient balance: need {}, have {}",
            quote.total, from.balance
        )));
    }

    let nonce = repo
        .next_nonce(&from.address)
        .map_err(CoreError::store("failed to reserve nonce"))?
        .ok_or_else(|| CoreError::NotFound(format!("wallet {} not found", from.address)))?;

    let request = TransferRequest {
        from: from.address.clone(),
        to: to_address,
        amount: quote.amount,
        fee: quote.fee,
        nonce,
        timestamp: now.timestamp_millis(),
    };
    let hash = ledger
        .submit_transfer(&request)
        .map_err(CoreError::ledger("failed to submit transfer"))?;

    let record = TransactionRecord {
        id: Uuid::new_v4().to_string(),
        hash: hash.clone(),
        from_address: request.from,
        to_address: request.to,
        amount: quote.amount,
        fee: quote.fee,
        status: TransactionStatus::Pending,
        kind: TransactionKind::Transfer,
        created_at: now,
    };
    repo.insert_transaction(&record)
        .map_err(CoreError::store("failed to record transaction"))?;

    Ok(TransferReceipt {
        transaction_hash: hash,
        status: TransactionStatus::Pending,
        fee: quote.fee,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub page: usize,
    pub limit: usize,
}

impl Page {
    /// Validate 1-based `page` and `limit`, applying defaults.
    pub fn new(page: Option<usize>, limit: Option<usize>) -> Result<Self, CoreError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if page == 0 {
            return Err(CoreError::validation("page starts at 1"));
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(CoreError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Transactions sent or received by `address`, newest first.
pub fn transactions(
    repo: &(impl TransactionRepository + ?Sized),
    address: &str,
    page: Page,
) -> Result<Vec<TransactionRecord>, CoreError> {
    let address = require_address(address)?;
    repo.transactions_for(&address, page.offset(), page.limit)
        .map_err(CoreError::store("failed to list transactions"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn fee_is_quarter_percent() {
        let q = transfer_fee(dec!(1000)).unwrap();
        assert_eq!(q.fee, dec!(2.5));
        assert_eq!(q.total, dec!(1002.5));
    }

    #[test]
    fn fee_rejects_non_positive_amounts() {
        assert_eq!(transfer_fee(Decimal::ZERO).unwrap_err().kind(), ErrorKind::Validation);
        assert!(transfer_fee(dec!(-3)).is_err());
    }

    #[test]
    fn page_defaults_and_bounds() {
        let p = Page::new(None, None).unwrap();
        assert_eq!((p.page, p.limit, p.offset()), (1, 10, 0));
        assert_eq!(Page::new(Some(3), Some(20)).unwrap().offset(), 40);
        assert!(Page::new(Some(0), None).is_err());
        assert!(Page::new(None, Some(0)).is_err());
        assert!(Page::new(None, Some(101)).is_err());
    }
}
