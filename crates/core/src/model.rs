use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity + accounts
// ---------------------------------------------------------------------------

/// Identity as reported by the managed auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub address: String,
    pub user_id: String,
    pub balance: Decimal,
    pub nonce: u64,
    pub created_at: DateTime<Utc>,
}

impl WalletRecord {
    /// A fresh wallet: zero balance, zero nonce.
    pub fn new(address: String, user_id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            address,
            user_id,
            balance: Decimal::ZERO,
            nonce: 0,
            created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Herd
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnimalStatus {
    Ativo,
    Vendido,
    Morto,
}

impl AnimalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ativo => "ATIVO",
            Self::Vendido => "VENDIDO",
            Self::Morto => "MORTO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ATIVO" => Some(Self::Ativo),
            "VENDIDO" => Some(Self::Vendido),
            "MORTO" => Some(Self::Morto),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnimalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalRecord {
    pub id: String,
    pub tag: String,
    pub weight_kg: Decimal,
    pub acquisition_cost: Option<Decimal>,
    pub accumulated_cost: Decimal,
    pub status: AnimalStatus,
    pub created_at: DateTime<Utc>,
}

/// Input to settlement. Borrowed view over whatever the caller holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalForSale {
    pub id: String,
    pub weight_kg: Decimal,
    #[serde(default)]
    pub acquisition_cost: Option<Decimal>,
    #[serde(default)]
    pub accumulated_cost: Decimal,
}

impl From<&AnimalRecord> for AnimalForSale {
    fn from(a: &AnimalRecord) -> Self {
        Self {
            id: a.id.clone(),
            weight_kg: a.weight_kg,
            acquisition_cost: a.acquisition_cost,
            accumulated_cost: a.accumulated_cost,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub hash: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: TransactionStatus,
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}
