//! BOVINEXT HTTP API: v1 Frozen Wire Format
//!
//! Request and response bodies for every route the server exposes. Field
//! names are the public contract that the web and mobile clients parse; the
//! domain types in `bovinext-core` stay free to change.
//!
//! # Protocol Version
//!
//! This is **API v1**. Renaming or removing a field requires:
//! 1. Version bump in API_VERSION
//! 2. New golden vectors in `crates/protocol/tests/golden/`
//!
//! Money and weights are JSON numbers. Settlement figures are rounded to two
//! decimal places for display.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use bovinext_core::herd::{HerdOverview, NewAnimal};
use bovinext_core::model::{AnimalRecord, AnimalStatus, TransactionRecord};
use bovinext_core::provision::Provisioned;
use bovinext_core::quote::PackerQuote;
use bovinext_core::wallet::{Balance, BalanceSource, Page, TransferReceipt, CURRENCY};
use bovinext_core::settlement::DISPLAY_DP;
use bovinext_core::{ErrorKind, SettlementResult};

/// Current API version. Increment for breaking changes.
pub const API_VERSION: u32 = 1;

fn iso8601(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// =============================================================================
// Health + errors
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub api_version: u32,
}

impl HealthResponse {
    pub fn ok(version: &str) -> Self {
        Self {
            status: "ok".into(),
            version: version.into(),
            api_version: API_VERSION,
        }
    }
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// One of `validation`, `unauthorized`, `not_found`, `dependency`.
    pub kind: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                kind: kind.as_str().to_string(),
                message: message.into(),
            },
        }
    }
}

// =============================================================================
// Provisioning
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionResponse {
    pub user_id: String,
    pub email: String,
    pub wallet_address: String,
    pub created: CreatedFlags,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CreatedFlags {
    pub user: bool,
    pub wallet: bool,
}

impl From<Provisioned> for ProvisionResponse {
    fn from(p: Provisioned) -> Self {
        Self {
            user_id: p.user_id,
            email: p.email,
            wallet_address: p.wallet_address,
            created: CreatedFlags {
                user: p.created.user,
                wallet: p.created.wallet,
            },
        }
    }
}

// =============================================================================
// Sales
// =============================================================================

/// `POST /vendas/simular`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateSaleRequest {
    /// Animal ids from the herd registry.
    pub animais: Vec<String>,
    pub preco_arroba: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxesBody {
    pub funrural: Decimal,
    pub icms: Decimal,
    pub outros: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    pub quantidade_animais: usize,
    pub peso_total: Decimal,
    pub arrobas: Decimal,
    pub valor_bruto: Decimal,
    pub impostos: TaxesBody,
    pub valor_liquido: Decimal,
    pub custo_total: Decimal,
    pub lucro_liquido: Decimal,
    pub margem_lucro: Decimal,
}

impl From<&SettlementResult> for SettlementResponse {
    fn from(result: &SettlementResult) -> Self {
        let r = result.rounded();
        Self {
            quantidade_animais: r.animal_count,
            peso_total: r.total_weight_kg,
            arrobas: r.arrobas,
            valor_bruto: r.gross_value,
            impostos: TaxesBody {
                funrural: r.taxes.funrural,
                icms: r.taxes.icms,
                outros: r.taxes.outros,
                total: r.taxes.total,
            },
            valor_liquido: r.net_value,
            custo_total: r.cost_basis,
            lucro_liquido: r.net_profit,
            margem_lucro: r.margin_percent,
        }
    }
}

/// `POST /vendas/frigorifico/cotacao`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub frigorifico: String,
    pub categoria: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub frigorifico: String,
    pub categoria: String,
    pub preco: Decimal,
    pub data_cotacao: String,
    pub validade: String,
}

impl From<&PackerQuote> for QuoteResponse {
    fn from(q: &PackerQuote) -> Self {
        Self {
            frigorifico: q.packer.as_str().to_string(),
            categoria: q.category.as_str().to_string(),
            preco: q.price_per_arroba,
            data_cotacao: iso8601(&q.quoted_at),
            validade: iso8601(&q.valid_until),
        }
    }
}

// =============================================================================
// Herd
// =============================================================================

/// `POST /rebanho`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimalRequest {
    pub brinco: String,
    pub peso: Decimal,
    #[serde(default)]
    pub valor_compra: Option<Decimal>,
    #[serde(default)]
    pub custo_acumulado: Decimal,
    #[serde(default)]
    pub status: Option<AnimalStatus>,
}

impl From<AnimalRequest> for NewAnimal {
    fn from(a: AnimalRequest) -> Self {
        Self {
            tag: a.brinco,
            weight_kg: a.peso,
            acquisition_cost: a.valor_compra,
            accumulated_cost: a.custo_acumulado,
            status: a.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimalResponse {
    pub id: String,
    pub brinco: String,
    pub peso: Decimal,
    pub valor_compra: Option<Decimal>,
    pub custo_acumulado: Decimal,
    pub status: AnimalStatus,
    pub created_at: String,
}

impl From<&AnimalRecord> for AnimalResponse {
    fn from(a: &AnimalRecord) -> Self {
        Self {
            id: a.id.clone(),
            brinco: a.tag.clone(),
            peso: a.weight_kg,
            valor_compra: a.acquisition_cost,
            custo_acumulado: a.accumulated_cost,
            status: a.status,
            created_at: iso8601(&a.created_at),
        }
    }
}

/// `GET /rebanho?status=ATIVO`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimalListQuery {
    pub status: Option<String>,
}

/// `GET /rebanho/stats/overview`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewResponse {
    pub total_animais: usize,
    pub peso_total: Decimal,
    pub valor_investido: Decimal,
    pub custo_acumulado: Decimal,
    pub peso_medio: Decimal,
    pub por_status: StatusCounts,
}

/// Every status is present, zero when no animal has it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StatusCounts {
    pub ativo: usize,
    pub vendido: usize,
    pub morto: usize,
}

impl From<&HerdOverview> for OverviewResponse {
    fn from(o: &HerdOverview) -> Self {
        let count = |s| o.by_status.get(&s).copied().unwrap_or(0);
        Self {
            total_animais: o.total_animals,
            peso_total: o.total_weight_kg,
            valor_investido: o.invested,
            custo_acumulado: o.accumulated_cost,
            peso_medio: o
                .average_weight_kg
                .round_dp_with_strategy(DISPLAY_DP, RoundingStrategy::MidpointAwayFromZero),
            por_status: StatusCounts {
                ativo: count(AnimalStatus::Ativo),
                vendido: count(AnimalStatus::Vendido),
                morto: count(AnimalStatus::Morto),
            },
        }
    }
}

// =============================================================================
// Wallet
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: Decimal,
    pub currency: String,
    /// `ledger` or `store`: where the reported value came from.
    pub source: String,
}

impl From<Balance> for BalanceResponse {
    fn from(b: Balance) -> Self {
        Self {
            address: b.address,
            balance: b.balance,
            currency: CURRENCY.to_string(),
            source: match b.source {
                BalanceSource::Ledger => "ledger",
                BalanceSource::Store => "store",
            }
            .to_string(),
        }
    }
}

/// `POST /wallet/transfer`. The sender is the authenticated caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub to_address: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub transaction_hash: String,
    pub status: String,
    pub fee: Decimal,
}

impl From<TransferReceipt> for TransferResponse {
    fn from(r: TransferReceipt) -> Self {
        Self {
            transaction_hash: r.transaction_hash,
            status: r.status.as_str().to_string(),
            fee: r.fee,
        }
    }
}

/// `GET /wallet/:address/transactions` query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionBody {
    pub id: String,
    pub hash: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: String,
}

impl From<&TransactionRecord> for TransactionBody {
    fn from(t: &TransactionRecord) -> Self {
        Self {
            id: t.id.clone(),
            hash: t.hash.clone(),
            from_address: t.from_address.clone(),
            to_address: t.to_address.clone(),
            amount: t.amount,
            fee: t.fee,
            status: t.status.as_str().to_string(),
            kind: t.kind.as_str().to_string(),
            created_at: iso8601(&t.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    /// Number of transactions on this page.
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<TransactionBody>,
    pub pagination: Pagination,
}

impl TransactionsResponse {
    pub fn new(records: &[TransactionRecord], page: Page) -> Self {
        Self {
            transactions: records.iter().map(TransactionBody::from).collect(),
            pagination: Pagination {
                page: page.page,
                limit: page.limit,
                total: records.len(),
            },
        }
    }
}
