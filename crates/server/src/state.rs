use std::sync::Arc;

use bovinext_core::ports::{AddressGenerator, IdentityResolver, LedgerClient, Repository};

/// Shared handles for every request. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub identities: Arc<dyn IdentityResolver>,
    pub ledger: Arc<dyn LedgerClient>,
    pub addresses: Arc<dyn AddressGenerator>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        identities: Arc<dyn IdentityResolver>,
        ledger: Arc<dyn LedgerClient>,
        addresses: Arc<dyn AddressGenerator>,
    ) -> Self {
        Self {
            repo,
            identities,
            ledger,
            addresses,
        }
    }
}
