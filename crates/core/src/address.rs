//! Wallet addresses: `0x` followed by 40 lowercase hex digits.
//!
//! Addresses are derived from 32 random bytes hashed twice with SHA-256.
//! There is no key material behind them; they are unique identifiers, not
//! chain accounts.

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::ports::{AddressError, AddressGenerator};

pub const ADDRESS_PREFIX: &str = "0x";
pub const ADDRESS_HEX_LEN: usize = 40;

/// True for `0x` + 40 hex digits (either case).
pub fn is_valid_address(address: &str) -> bool {
    match address.strip_prefix(ADDRESS_PREFIX) {
        Some(hex) => hex.len() == ADDRESS_HEX_LEN && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Derive an address from seed bytes.
pub fn address_from_seed(seed: &[u8]) -> String {
    let first = Sha256::digest(seed);
    let second = Sha256::digest(format!("{:x}", first).as_bytes());
    let hex = format!("{:x}", second);
    format!("{ADDRESS_PREFIX}{}", &hex[..ADDRESS_HEX_LEN])
}

/// Random-seeded generator used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomAddressGenerator;

impl AddressGenerator for RandomAddressGenerator {
    fn generate(&self) -> Result<String, AddressError> {
        let mut seed = [0u8; 32];
        rand::thread_rng()
            .try_fill_bytes(&mut seed)
            .map_err(|e| AddressError(e.to_string()))?;
        Ok(address_from_seed(&seed))
    }
}
