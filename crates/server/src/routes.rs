//! Request handlers.
//!
//! Every collaborator is synchronous, so handlers hop onto the blocking pool
//! for anything that touches the store, the auth provider or the ledger.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use bovinext_core::herd::{self, NewAnimal};
use bovinext_core::ports::AnimalRepository;
use bovinext_core::provision::{authenticate, Provisioner};
use bovinext_core::quote::packer_quote;
use bovinext_core::wallet::{self, Page};
use bovinext_core::CoreError;
use bovinext_protocol::{
    AnimalListQuery, AnimalRequest, AnimalResponse, BalanceResponse, HealthResponse,
    OverviewResponse, PageQuery, ProvisionResponse, QuoteRequest, QuoteResponse,
    SettlementResponse, SimulateSaleRequest, TransactionsResponse, TransferRequest,
    TransferResponse,
};

use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Run a core operation on the blocking pool.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|e| ApiError::Malformed(e.body_text()))
}

// ── health ──

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok(env!("CARGO_PKG_VERSION")))
}

// ── provisioning ──

pub async fn provision_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ProvisionResponse>> {
    let auth = authorization(&headers);
    let provisioned = blocking(move || {
        Provisioner::new(
            state.identities.as_ref(),
            state.repo.as_ref(),
            state.addresses.as_ref(),
        )
        .provision(auth.as_deref(), Utc::now())
    })
    .await?;

    if provisioned.created.user || provisioned.created.wallet {
        info!(
            user_id = provisioned.user_id.as_str(),
            wallet = provisioned.wallet_address.as_str(),
            created_user = provisioned.created.user,
            created_wallet = provisioned.created.wallet,
            "provisioned"
        );
    }
    Ok(Json(provisioned.into()))
}

// ── sales ──

pub async fn simulate_handler(
    State(state): State<AppState>,
    payload: Result<Json<SimulateSaleRequest>, JsonRejection>,
) -> ApiResult<Json<SettlementResponse>> {
    let req = body(payload)?;
    let result = blocking(move || {
        herd::settle_animals(state.repo.as_ref(), &req.animais, req.preco_arroba)
    })
    .await?;
    Ok(Json(SettlementResponse::from(&result)))
}

pub async fn ready_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<AnimalResponse>>> {
    let animals = blocking(move || herd::ready_for_sale(state.repo.as_ref())).await?;
    Ok(Json(animals.iter().map(AnimalResponse::from).collect()))
}

pub async fn quote_handler(
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> ApiResult<Json<QuoteResponse>> {
    let req = body(payload)?;
    let quote = packer_quote(&req.frigorifico, &req.categoria, Utc::now())?;
    Ok(Json(QuoteResponse::from(&quote)))
}

// ── herd ──

pub async fn create_animal_handler(
    State(state): State<AppState>,
    payload: Result<Json<AnimalRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AnimalResponse>)> {
    let animal = NewAnimal::from(body(payload)?);
    animal.validate()?;
    let record = animal.into_record(Uuid::new_v4().to_string(), Utc::now());

    let stored = blocking(move || {
        state
            .repo
            .insert_animal(&record)
            .map_err(CoreError::store("failed to register animal"))?;
        Ok(record)
    })
    .await?;

    info!(id = stored.id.as_str(), tag = stored.tag.as_str(), "animal registered");
    Ok((StatusCode::CREATED, Json(AnimalResponse::from(&stored))))
}

pub async fn get_animal_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AnimalResponse>> {
    let animal = blocking(move || {
        state
            .repo
            .animal(&id)
            .map_err(CoreError::store("failed to load animal"))?
            .ok_or_else(|| CoreError::NotFound(format!("animal {id} not found")))
    })
    .await?;
    Ok(Json(AnimalResponse::from(&animal)))
}

pub async fn list_animals_handler(
    State(state): State<AppState>,
    query: Result<Query<AnimalListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<AnimalResponse>>> {
    let Query(q) = query.map_err(|e| ApiError::Malformed(e.body_text()))?;
    let status = q.status.as_deref().map(herd::parse_status).transpose()?;

    let animals = blocking(move || herd::list_animals(state.repo.as_ref(), status)).await?;
    Ok(Json(animals.iter().map(AnimalResponse::from).collect()))
}

pub async fn overview_handler(State(state): State<AppState>) -> ApiResult<Json<OverviewResponse>> {
    let overview = blocking(move || herd::overview(state.repo.as_ref())).await?;
    Ok(Json(OverviewResponse::from(&overview)))
}

// ── wallet ──

pub async fn balance_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<BalanceResponse>> {
    let balance = blocking(move || {
        wallet::wallet_balance(state.repo.as_ref(), state.ledger.as_ref(), &address)
    })
    .await?;

    if balance.updated {
        info!(address = balance.address.as_str(), "stored balance replaced by ledger value");
    }
    Ok(Json(balance.into()))
}

pub async fn transfer_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<Json<TransferResponse>> {
    let auth = authorization(&headers);
    let req = body(payload)?;

    let receipt = blocking(move || {
        let identity = authenticate(state.identities.as_ref(), auth.as_deref())?;
        let from = wallet::wallet_of_user(state.repo.as_ref(), &identity.id)?;
        wallet::transfer(
            state.repo.as_ref(),
            state.ledger.as_ref(),
            &from,
            &req.to_address,
            req.amount,
            Utc::now(),
        )
    })
    .await?;

    info!(hash = receipt.transaction_hash.as_str(), "transfer submitted");
    Ok(Json(receipt.into()))
}

pub async fn transactions_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<TransactionsResponse>> {
    let Query(q) = query.map_err(|e| ApiError::Malformed(e.body_text()))?;
    let page = Page::new(q.page, q.limit)?;

    let records = blocking(move || wallet::transactions(state.repo.as_ref(), &address, page)).await?;
    Ok(Json(TransactionsResponse::new(&records, page)))
}
