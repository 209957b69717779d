//! Ledger node clients.
//!
//! Balances come back as JSON numbers or strings and are parsed from their
//! text so no value passes through a float.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use bovinext_config::LedgerSettings;
use bovinext_core::ports::{LedgerClient, LedgerError, TransferRequest};

use crate::GatewayError;

/// Ledger node client (blocking).
#[derive(Clone)]
pub struct HttpLedgerClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl HttpLedgerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("bovinext/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(ledger: &LedgerSettings) -> Result<Self, GatewayError> {
        let url = ledger
            .url
            .as_deref()
            .ok_or_else(|| GatewayError::Client("ledger.url is not set".into()))?;
        Self::new(url, Duration::from_secs(ledger.timeout_secs))
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn check(response: reqwest::blocking::Response) -> Result<serde_json::Value, LedgerError> {
        let status = response.status();
        if status.is_client_error() {
            let body = response.text().unwrap_or_default();
            return Err(LedgerError::Rejected(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "ledger error");
            return Err(LedgerError::Unavailable(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        response
            .json()
            .map_err(|e| LedgerError::Malformed(e.to_string()))
    }
}

fn decimal_field(json: &serde_json::Value, key: &str) -> Result<Decimal, LedgerError> {
    let raw = match &json[key] {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => return Err(LedgerError::Malformed(format!("missing {key} in response"))),
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|e| LedgerError::Malformed(format!("{key} '{raw}': {e}")))
}

impl LedgerClient for HttpLedgerClient {
    fn balance(&self, address: &str) -> Result<Decimal, LedgerError> {
        let url = format!("{}/balances/{}", self.base_url, address);
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        let json = Self::check(response)?;
        decimal_field(&json, "balance")
    }

    fn submit_transfer(&self, request: &TransferRequest) -> Result<String, LedgerError> {
        let url = format!("{}/transfers", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        let json = Self::check(response)?;
        let hash = json["hash"]
            .as_str()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| LedgerError::Malformed("missing hash in response".into()))?;
        debug!(hash, nonce = request.nonce, "transfer submitted");
        Ok(hash.to_string())
    }
}

/// Ledger stand-in when no node is configured.
///
/// Has no balances (callers fall back to stored values) and accepts every
/// transfer, answering with the SHA-256 of the request as its hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineLedger;

impl LedgerClient for OfflineLedger {
    fn balance(&self, _address: &str) -> Result<Decimal, LedgerError> {
        Err(LedgerError::NoBalanceSource)
    }

    fn submit_transfer(&self, request: &TransferRequest) -> Result<String, LedgerError> {
        let body = serde_json::to_vec(request).map_err(|e| LedgerError::Malformed(e.to_string()))?;
        Ok(format!("0x{:x}", Sha256::digest(&body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(nonce: u64) -> TransferRequest {
        TransferRequest {
            from: "0xa".into(),
            to: "0xb".into(),
            amount: dec!(10),
            fee: dec!(0.025),
            nonce,
            timestamp: 1_760_000_000_000,
        }
    }

    #[test]
    fn offline_hash_is_deterministic_per_request() {
        let a = OfflineLedger.submit_transfer(&request(0)).unwrap();
        let b = OfflineLedger.submit_transfer(&request(0)).unwrap();
        let c = OfflineLedger.submit_transfer(&request(1)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 2 + 64);
    }

    #[test]
    fn offline_has_no_balances() {
        assert!(matches!(OfflineLedger.balance("0xa"), Err(LedgerError::NoBalanceSource)));
    }

    #[test]
    fn decimal_field_parses_numbers_and_strings() {
        let json = serde_json::json!({ "a": 12.5, "b": "0.1", "c": 7, "d": null });
        assert_eq!(decimal_field(&json, "a").unwrap(), dec!(12.5));
        assert_eq!(decimal_field(&json, "b").unwrap(), dec!(0.1));
        assert_eq!(decimal_field(&json, "c").unwrap(), dec!(7));
        assert!(decimal_field(&json, "d").is_err());
        assert!(decimal_field(&json, "missing").is_err());
    }
}
