//! External collaborators: the managed auth provider and the ledger node.
//!
//! Blocking reqwest clients. The server calls them from `spawn_blocking`.

mod identity;
mod ledger;

pub use identity::{ChainedIdentityResolver, HttpIdentityResolver, StaticIdentityResolver};
pub use ledger::{HttpLedgerClient, OfflineLedger};

use std::sync::Arc;

use bovinext_config::LedgerSettings;
use bovinext_core::ports::LedgerClient;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("cannot build HTTP client: {0}")]
    Client(String),
}

/// The HTTP ledger when a URL is configured, otherwise [`OfflineLedger`].
pub fn ledger_from_settings(settings: &LedgerSettings) -> Result<Arc<dyn LedgerClient>, GatewayError> {
    Ok(match settings.url {
        Some(_) => Arc::new(HttpLedgerClient::from_settings(settings)?),
        None => Arc::new(OfflineLedger),
    })
}
