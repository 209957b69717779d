use std::time::Duration;

use httpmock::prelude::*;
use rust_decimal_macros::dec;

use bovinext_core::ports::{IdentityError, IdentityResolver, LedgerClient, LedgerError, TransferRequest};
use bovinext_gateway::{HttpIdentityResolver, HttpLedgerClient};

const TIMEOUT: Duration = Duration::from_secs(5);

fn resolver(server: &MockServer) -> HttpIdentityResolver {
    HttpIdentityResolver::new(&server.base_url(), "anon-key", TIMEOUT).unwrap()
}

fn ledger(server: &MockServer) -> HttpLedgerClient {
    HttpLedgerClient::new(&server.base_url(), TIMEOUT).unwrap()
}

// ── identity ────────────────────────────────────────────────────────

#[test]
fn test_resolve_sends_token_and_api_key() {
    let server = MockServer::start();
    let user = server.mock(|when, then| {
        when.method(GET)
            .path("/auth/v1/user")
            .header("authorization", "Bearer good-token")
            .header("apikey", "anon-key");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(serde_json::json!({
                "id": "7c0f4d5e-1a2b-4c3d-9e8f-0a1b2c3d4e5f",
                "email": "produtor@fazenda.br",
                "aud": "authenticated",
                "role": "authenticated"
            }));
    });

    let identity = resolver(&server).resolve("good-token").unwrap();

    user.assert();
    assert_eq!(identity.id, "7c0f4d5e-1a2b-4c3d-9e8f-0a1b2c3d4e5f");
    assert_eq!(identity.email.as_deref(), Some("produtor@fazenda.br"));
}

#[test]
fn test_resolve_without_email() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/auth/v1/user");
        then.status(200)
            .json_body(serde_json::json!({ "id": "phone-user", "email": "" }));
    });

    let identity = resolver(&server).resolve("t").unwrap();
    assert_eq!(identity.email, None);
}

#[test]
fn test_rejected_token_is_invalid() {
    for status in [401, 403] {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/auth/v1/user");
            then.status(status)
                .json_body(serde_json::json!({ "msg": "invalid JWT" }));
        });

        let err = resolver(&server).resolve("expired").unwrap_err();
        assert!(matches!(err, IdentityError::InvalidToken), "status {status}: {err:?}");
    }
}

#[test]
fn test_provider_outage_is_unavailable() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/auth/v1/user");
        then.status(503).body("upstream down");
    });

    let err = resolver(&server).resolve("t").unwrap_err();
    match err {
        IdentityError::Unavailable(msg) => assert!(msg.contains("503"), "message: {msg}"),
        other => panic!("expected Unavailable, got {other:?}"),
    }
}

#[test]
fn test_garbage_user_payload_is_unavailable() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/auth/v1/user");
        then.status(200).json_body(serde_json::json!({ "user": null }));
    });

    let err = resolver(&server).resolve("t").unwrap_err();
    assert!(matches!(err, IdentityError::Unavailable(_)));
}

#[test]
fn test_unreachable_provider_is_unavailable() {
    // Nothing listens on port 9 (discard) in the test environment.
    let r = HttpIdentityResolver::new("http://127.0.0.1:9", "k", Duration::from_millis(500)).unwrap();
    assert!(matches!(r.resolve("t"), Err(IdentityError::Unavailable(_))));
}

// ── ledger ──────────────────────────────────────────────────────────

#[test]
fn test_balance_number_and_string() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/balances/0xaaa");
        then.status(200).json_body(serde_json::json!({ "balance": 1250.75 }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/balances/0xbbb");
        then.status(200).json_body(serde_json::json!({ "balance": "0.000000000000000001" }));
    });

    let client = ledger(&server);
    assert_eq!(client.balance("0xaaa").unwrap(), dec!(1250.75));
    assert_eq!(client.balance("0xbbb").unwrap(), dec!(0.000000000000000001));
}

#[test]
fn test_balance_errors() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/balances/0xdown");
        then.status(502);
    });
    server.mock(|when, then| {
        when.method(GET).path("/balances/0xodd");
        then.status(200).json_body(serde_json::json!({ "saldo": 1 }));
    });

    let client = ledger(&server);
    assert!(matches!(client.balance("0xdown"), Err(LedgerError::Unavailable(_))));
    assert!(matches!(client.balance("0xodd"), Err(LedgerError::Malformed(_))));
}

#[test]
fn test_submit_transfer_posts_request() {
    let server = MockServer::start();
    let submit = server.mock(|when, then| {
        when.method(POST)
            .path("/transfers")
            .json_body_includes(r#"{"from":"0xaaa","to":"0xbbb","nonce":3}"#);
        then.status(200)
            .json_body(serde_json::json!({ "hash": "0xfeed" }));
    });

    let request = TransferRequest {
        from: "0xaaa".into(),
        to: "0xbbb".into(),
        amount: dec!(200),
        fee: dec!(0.5),
        nonce: 3,
        timestamp: 1_760_000_000_000,
    };
    let hash = ledger(&server).submit_transfer(&request).unwrap();

    submit.assert();
    assert_eq!(hash, "0xfeed");
}

#[test]
fn test_submit_transfer_rejected_and_malformed() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/transfers").json_body_includes(r#"{"nonce":0}"#);
        then.status(409).body("nonce too low");
    });
    server.mock(|when, then| {
        when.method(POST).path("/transfers").json_body_includes(r#"{"nonce":1}"#);
        then.status(200).json_body(serde_json::json!({ "hash": "" }));
    });

    let client = ledger(&server);
    let mut request = TransferRequest {
        from: "0xaaa".into(),
        to: "0xbbb".into(),
        amount: dec!(1),
        fee: dec!(0.0025),
        nonce: 0,
        timestamp: 0,
    };
    match client.submit_transfer(&request).unwrap_err() {
        LedgerError::Rejected(msg) => assert!(msg.contains("nonce too low"), "message: {msg}"),
        other => panic!("expected Rejected, got {other:?}"),
    }

    request.nonce = 1;
    assert!(matches!(client.submit_transfer(&request), Err(LedgerError::Malformed(_))));
}
