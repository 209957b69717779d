use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use bovinext_core::address::RandomAddressGenerator;
use bovinext_core::ports::{IdentityError, IdentityResolver, LedgerClient, LedgerError, TransferRequest};
use bovinext_core::Identity;
use bovinext_server::{build_router, AppState};
use bovinext_store::MemoryStore;

// ── fakes ──

struct Tokens;

impl IdentityResolver for Tokens {
    fn resolve(&self, token: &str) -> Result<Identity, IdentityError> {
        match token {
            "alice-token" => Ok(Identity { id: "user-alice".into(), email: Some("alice@fazenda.br".into()) }),
            "bob-token" => Ok(Identity { id: "user-bob".into(), email: None }),
            "down-token" => Err(IdentityError::Unavailable("connection refused".into())),
            _ => Err(IdentityError::InvalidToken),
        }
    }
}

#[derive(Default)]
struct Ledger {
    balances: Mutex<HashMap<String, Decimal>>,
    submitted: Mutex<Vec<TransferRequest>>,
}

impl LedgerClient for Ledger {
    fn balance(&self, address: &str) -> Result<Decimal, LedgerError> {
        self.balances
            .lock()
            .get(address)
            .copied()
            .ok_or(LedgerError::NoBalanceSource)
    }

    fn submit_transfer(&self, request: &TransferRequest) -> Result<String, LedgerError> {
        let mut submitted = self.submitted.lock();
        submitted.push(request.clone());
        Ok(format!("0xhash{}", submitted.len()))
    }
}

// ── harness ──

async fn spawn_app(ledger: Arc<Ledger>) -> SocketAddr {
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(Tokens),
        ledger,
        Arc::new(RandomAddressGenerator),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.expect("serve");
    });
    addr
}

struct Reply {
    status: u16,
    body: Value,
}

async fn send(
    addr: SocketAddr,
    method: &str,
    path: &str,
    token: Option<&str>,
    payload: Option<&str>,
) -> Reply {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    if let Some(token) = token {
        req.push_str(&format!("Authorization: Bearer {token}\r\n"));
    }
    let payload = payload.unwrap_or("");
    if !payload.is_empty() || method == "POST" {
        req.push_str("Content-Type: application/json\r\n");
        req.push_str(&format!("Content-Length: {}\r\n", payload.len()));
    }
    req.push_str("\r\n");
    req.push_str(payload);
    stream.write_all(req.as_bytes()).await.expect("write");

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.expect("read");
    let text = String::from_utf8(raw).expect("utf8");
    let (head, body) = text.split_once("\r\n\r\n").expect("http response");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .expect("status line");
    let body = if body.is_empty() { Value::Null } else { serde_json::from_str(body).expect("json body") };
    Reply { status, body }
}

async fn get(addr: SocketAddr, path: &str) -> Reply {
    send(addr, "GET", path, None, None).await
}

async fn post(addr: SocketAddr, path: &str, payload: Value) -> Reply {
    send(addr, "POST", path, None, Some(&payload.to_string())).await
}

async fn register(addr: SocketAddr, tag: &str, weight: u32, cost: u32, accumulated: u32) -> String {
    let reply = post(
        addr,
        "/rebanho",
        json!({ "brinco": tag, "peso": weight, "valor_compra": cost, "custo_acumulado": accumulated }),
    )
    .await;
    assert_eq!(reply.status, 201, "{:?}", reply.body);
    reply.body["id"].as_str().expect("id").to_string()
}

fn number(v: &Value) -> f64 {
    v.as_f64().unwrap_or_else(|| panic!("not a number: {v}"))
}

fn error_kind(reply: &Reply) -> &str {
    reply.body["error"]["kind"].as_str().expect("error kind")
}

// ── health + provisioning ──

#[tokio::test]
async fn test_health() {
    let addr = spawn_app(Arc::default()).await;
    let reply = get(addr, "/health").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["status"], "ok");
    assert_eq!(reply.body["api_version"], 1);
}

#[tokio::test]
async fn test_provision_is_idempotent() {
    let addr = spawn_app(Arc::default()).await;

    let first = send(addr, "POST", "/provision", Some("alice-token"), None).await;
    assert_eq!(first.status, 200, "{:?}", first.body);
    assert_eq!(first.body["userId"], "user-alice");
    assert_eq!(first.body["email"], "alice@fazenda.br");
    assert_eq!(first.body["created"], json!({ "user": true, "wallet": true }));

    let second = send(addr, "POST", "/provision", Some("alice-token"), None).await;
    assert_eq!(second.status, 200);
    assert_eq!(second.body["walletAddress"], first.body["walletAddress"]);
    assert_eq!(second.body["created"], json!({ "user": false, "wallet": false }));
}

#[tokio::test]
async fn test_provision_rejects_bad_credentials() {
    let addr = spawn_app(Arc::default()).await;

    let missing = send(addr, "POST", "/provision", None, None).await;
    assert_eq!(missing.status, 401);
    assert_eq!(error_kind(&missing), "unauthorized");

    let invalid = send(addr, "POST", "/provision", Some("forged"), None).await;
    assert_eq!(invalid.status, 401);
    assert_eq!(invalid.body, json!({ "error": { "kind": "unauthorized", "message": "invalid token" } }));

    let down = send(addr, "POST", "/provision", Some("down-token"), None).await;
    assert_eq!(down.status, 500);
    assert_eq!(error_kind(&down), "dependency");
    // Upstream detail stays in the log.
    assert!(!down.body.to_string().contains("connection refused"));
}

// ── herd + sales ──

#[tokio::test]
async fn test_register_and_fetch_animal() {
    let addr = spawn_app(Arc::default()).await;
    let id = register(addr, "BR-001", 520, 3000, 565).await;

    let reply = get(addr, &format!("/rebanho/{id}")).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["brinco"], "BR-001");
    assert_eq!(reply.body["status"], "ATIVO");
    assert_eq!(number(&reply.body["peso"]), 520.0);

    let missing = get(addr, "/rebanho/no-such-animal").await;
    assert_eq!(missing.status, 404);
    assert_eq!(error_kind(&missing), "not_found");
}

#[tokio::test]
async fn test_register_rejects_invalid_animals() {
    let addr = spawn_app(Arc::default()).await;

    let zero = post(addr, "/rebanho", json!({ "brinco": "BR-9", "peso": 0 })).await;
    assert_eq!(zero.status, 400);
    assert_eq!(error_kind(&zero), "validation");

    let malformed = send(addr, "POST", "/rebanho", None, Some("{\"brinco\":")).await;
    assert_eq!(malformed.status, 400);
    assert_eq!(error_kind(&malformed), "validation");
}

#[tokio::test]
async fn test_simulate_sale() {
    let addr = spawn_app(Arc::default()).await;
    let a1 = register(addr, "A1", 520, 3000, 565).await;
    let a2 = register(addr, "A2", 480, 3000, 565).await;

    let reply = post(addr, "/vendas/simular", json!({ "animais": [a1, a2], "preco_arroba": 285.50 })).await;
    assert_eq!(reply.status, 200, "{:?}", reply.body);
    let body = &reply.body;
    assert_eq!(body["quantidadeAnimais"], 2);
    assert!((number(&body["pesoTotal"]) - 1000.0).abs() < 1e-9);
    assert!((number(&body["arrobas"]) - 66.67).abs() < 1e-9);
    assert!((number(&body["valorBruto"]) - 19033.33).abs() < 1e-9);
    assert!((number(&body["custoTotal"]) - 7130.0).abs() < 1e-9);
    assert!((number(&body["lucroLiquido"]) - 9371.90).abs() < 1e-9);
    assert!((number(&body["margemLucro"]) - 131.44).abs() < 1e-9);
}

#[tokio::test]
async fn test_simulate_sale_errors() {
    let addr = spawn_app(Arc::default()).await;
    let a1 = register(addr, "A1", 520, 3000, 565).await;

    let unknown = post(addr, "/vendas/simular", json!({ "animais": [a1, "ghost"], "preco_arroba": 285.5 })).await;
    assert_eq!(unknown.status, 404);

    let empty = post(addr, "/vendas/simular", json!({ "animais": [], "preco_arroba": 285.5 })).await;
    assert_eq!(empty.status, 200);
    assert_eq!(empty.body["quantidadeAnimais"], 0);
    assert_eq!(number(&empty.body["margemLucro"]), 0.0);

    let no_price = post(addr, "/vendas/simular", json!({ "animais": [a1] })).await;
    assert_eq!(no_price.status, 400);
    assert_eq!(error_kind(&no_price), "validation");
}

#[tokio::test]
async fn test_ready_for_sale_list() {
    let addr = spawn_app(Arc::default()).await;
    register(addr, "LIGHT", 300, 1500, 100).await;
    register(addr, "MID", 480, 3000, 565).await;
    register(addr, "HEAVY", 520, 3000, 565).await;

    let reply = get(addr, "/vendas/animais/prontos").await;
    assert_eq!(reply.status, 200);
    let tags: Vec<&str> = reply
        .body
        .as_array()
        .expect("array")
        .iter()
        .map(|a| a["brinco"].as_str().expect("brinco"))
        .collect();
    assert_eq!(tags, ["HEAVY", "MID"]);
}

#[tokio::test]
async fn test_herd_list_with_status_filter() {
    let addr = spawn_app(Arc::default()).await;
    register(addr, "A1", 520, 3000, 565).await;
    let sold = post(
        addr,
        "/rebanho",
        json!({ "brinco": "S1", "peso": 600, "valor_compra": 3200, "status": "VENDIDO" }),
    )
    .await;
    assert_eq!(sold.status, 201, "{:?}", sold.body);

    let all = get(addr, "/rebanho").await;
    assert_eq!(all.status, 200);
    assert_eq!(all.body.as_array().expect("array").len(), 2);

    let active = get(addr, "/rebanho?status=ATIVO").await;
    assert_eq!(active.status, 200);
    let tags: Vec<&str> = active
        .body
        .as_array()
        .expect("array")
        .iter()
        .map(|a| a["brinco"].as_str().expect("brinco"))
        .collect();
    assert_eq!(tags, ["A1"]);

    let lower = get(addr, "/rebanho?status=vendido").await;
    assert_eq!(lower.body[0]["brinco"], "S1");

    let bogus = get(addr, "/rebanho?status=ABATIDO").await;
    assert_eq!(bogus.status, 400);
    assert_eq!(error_kind(&bogus), "validation");
}

#[tokio::test]
async fn test_herd_overview() {
    let addr = spawn_app(Arc::default()).await;

    let empty = get(addr, "/rebanho/stats/overview").await;
    assert_eq!(empty.status, 200, "{:?}", empty.body);
    assert_eq!(empty.body["totalAnimais"], 0);
    assert_eq!(number(&empty.body["pesoTotal"]), 0.0);
    assert_eq!(number(&empty.body["pesoMedio"]), 0.0);
    assert_eq!(empty.body["porStatus"]["ATIVO"], 0);

    register(addr, "A1", 520, 3000, 565).await;
    register(addr, "A2", 480, 2800, 600).await;
    let dead = post(addr, "/rebanho", json!({ "brinco": "M1", "peso": 300, "status": "MORTO" })).await;
    assert_eq!(dead.status, 201);

    let reply = get(addr, "/rebanho/stats/overview").await;
    assert_eq!(reply.status, 200);
    let body = &reply.body;
    assert_eq!(body["totalAnimais"], 3);
    assert!((number(&body["pesoTotal"]) - 1300.0).abs() < 1e-9);
    assert!((number(&body["valorInvestido"]) - 5800.0).abs() < 1e-9);
    assert!((number(&body["custoAcumulado"]) - 1165.0).abs() < 1e-9);
    assert!((number(&body["pesoMedio"]) - 433.33).abs() < 1e-9);
    assert_eq!(body["porStatus"]["ATIVO"], 2);
    assert_eq!(body["porStatus"]["MORTO"], 1);
    assert_eq!(body["porStatus"]["VENDIDO"], 0);
}

#[tokio::test]
async fn test_packer_quote() {
    let addr = spawn_app(Arc::default()).await;

    let reply = post(addr, "/vendas/frigorifico/cotacao", json!({ "frigorifico": "jbs", "categoria": "boi" })).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["frigorifico"], "JBS");
    assert_eq!(reply.body["categoria"], "BOI");
    assert!((number(&reply.body["preco"]) - 285.5).abs() < 1e-9);
    assert!(reply.body["validade"].as_str().expect("validade") > reply.body["data_cotacao"].as_str().expect("data"));

    let unknown = post(addr, "/vendas/frigorifico/cotacao", json!({ "frigorifico": "ACME", "categoria": "BOI" })).await;
    assert_eq!(unknown.status, 404);
}

// ── wallet ──

async fn provision(addr: SocketAddr, token: &str) -> String {
    let reply = send(addr, "POST", "/provision", Some(token), None).await;
    assert_eq!(reply.status, 200, "{:?}", reply.body);
    reply.body["walletAddress"].as_str().expect("wallet").to_string()
}

async fn transfer(addr: SocketAddr, token: Option<&str>, to: &str, amount: Value) -> Reply {
    let payload = json!({ "toAddress": to, "amount": amount }).to_string();
    send(addr, "POST", "/wallet/transfer", token, Some(&payload)).await
}

#[tokio::test]
async fn test_balance_reconciles_with_ledger() {
    let ledger = Arc::new(Ledger::default());
    let addr = spawn_app(ledger.clone()).await;
    let alice = provision(addr, "alice-token").await;

    let stored = get(addr, &format!("/wallet/{alice}/balance")).await;
    assert_eq!(stored.status, 200);
    assert_eq!(stored.body["source"], "store");
    assert_eq!(stored.body["currency"], "FINA");
    assert_eq!(number(&stored.body["balance"]), 0.0);

    ledger.balances.lock().insert(alice.clone(), dec!(1000));
    let synced = get(addr, &format!("/wallet/{alice}/balance")).await;
    assert_eq!(synced.body["source"], "ledger");
    assert_eq!(number(&synced.body["balance"]), 1000.0);

    let bad = get(addr, "/wallet/not-an-address/balance").await;
    assert_eq!(bad.status, 400);
    let unknown = get(addr, &format!("/wallet/0x{}/balance", "a".repeat(40))).await;
    assert_eq!(unknown.status, 404);
}

#[tokio::test]
async fn test_transfer_and_history() {
    let ledger = Arc::new(Ledger::default());
    let addr = spawn_app(ledger.clone()).await;
    let alice = provision(addr, "alice-token").await;
    let bob = provision(addr, "bob-token").await;

    let anonymous = transfer(addr, None, &bob, json!(10)).await;
    assert_eq!(anonymous.status, 401);

    let broke = transfer(addr, Some("alice-token"), &bob, json!(10)).await;
    assert_eq!(broke.status, 400, "{:?}", broke.body);
    assert!(ledger.submitted.lock().is_empty());

    ledger.balances.lock().insert(alice.clone(), dec!(1000));
    assert_eq!(get(addr, &format!("/wallet/{alice}/balance")).await.status, 200);

    for n in 1..=3 {
        let sent = transfer(addr, Some("alice-token"), &bob, json!(200)).await;
        assert_eq!(sent.status, 200, "{:?}", sent.body);
        assert_eq!(sent.body["transactionHash"], format!("0xhash{n}"));
        assert_eq!(sent.body["status"], "pending");
        assert!((number(&sent.body["fee"]) - 0.5).abs() < 1e-9);
    }
    let nonces: Vec<u64> = ledger.submitted.lock().iter().map(|r| r.nonce).collect();
    assert_eq!(nonces, [0, 1, 2]);

    let self_send = transfer(addr, Some("alice-token"), &alice, json!(1)).await;
    assert_eq!(self_send.status, 400);

    let page = get(addr, &format!("/wallet/{bob}/transactions?page=1&limit=2")).await;
    assert_eq!(page.status, 200);
    let rows = page.body["transactions"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["hash"], "0xhash3");
    assert_eq!(rows[0]["type"], "transfer");
    assert_eq!(rows[0]["from_address"], alice.as_str());
    assert_eq!(page.body["pagination"], json!({ "page": 1, "limit": 2, "total": 2 }));

    let rest = get(addr, &format!("/wallet/{bob}/transactions?page=2&limit=2")).await;
    assert_eq!(rest.body["transactions"].as_array().expect("rows").len(), 1);

    let zero = get(addr, &format!("/wallet/{bob}/transactions?page=0")).await;
    assert_eq!(zero.status, 400);
    let junk = get(addr, &format!("/wallet/{bob}/transactions?limit=many")).await;
    assert_eq!(junk.status, 400);
    assert_eq!(error_kind(&junk), "validation");
}
