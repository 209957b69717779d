//! `bovinext-core`: settlement, provisioning and wallet rules.
//!
//! Pure domain crate: collaborators (persistence, identity provider, ledger,
//! address source) are traits in [`ports`]. No HTTP, no SQL, no logging.

pub mod address;
pub mod error;
pub mod herd;
pub mod model;
pub mod ports;
pub mod provision;
pub mod quote;
pub mod settlement;
pub mod wallet;

pub use error::{CoreError, ErrorKind};
pub use model::{AnimalForSale, AnimalRecord, AnimalStatus, Identity, TransactionRecord, UserRecord, WalletRecord};
pub use ports::Repository;
pub use provision::{Provisioned, Provisioner};
pub use settlement::{compute_settlement, SettlementResult};
