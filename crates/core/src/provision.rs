//! Idempotent first-contact provisioning.
//!
//! Ensures one user record and one wallet record per identity. Safe to call
//! any number of times, including concurrently: uniqueness conflicts on
//! insert mean another caller got there first, and are resolved by reading
//! back what they created. There is no rollback; a call that fails after the
//! user insert leaves the user in place and the next call only creates the
//! wallet.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::model::{Identity, UserRecord, WalletRecord};
use crate::ports::{AddressGenerator, IdentityResolver, StoreError, UserRepository, WalletRepository};

/// Wallet inserts retried after an address collision before giving up.
pub const MAX_ADDRESS_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Created {
    pub user: bool,
    pub wallet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provisioned {
    pub user_id: String,
    pub email: String,
    pub wallet_address: String,
    pub created: Created,
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, CoreError> {
    let header = header.ok_or_else(|| CoreError::Unauthorized("missing bearer token".into()))?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .unwrap_or_default();
    if token.is_empty() {
        return Err(CoreError::Unauthorized("missing bearer token".into()));
    }
    Ok(token)
}

/// Resolve the caller behind an `Authorization` header value.
pub fn authenticate(
    identities: &dyn IdentityResolver,
    authorization: Option<&str>,
) -> Result<Identity, CoreError> {
    let token = bearer_token(authorization)?;
    Ok(identities.resolve(token)?)
}

pub struct Provisioner<'a, R: ?Sized> {
    identities: &'a dyn IdentityResolver,
    repo: &'a R,
    addresses: &'a dyn AddressGenerator,
}

impl<'a, R> Provisioner<'a, R>
where
    R: UserRepository + WalletRepository + ?Sized,
{
    pub fn new(
        identities: &'a dyn IdentityResolver,
        repo: &'a R,
        addresses: &'a dyn AddressGenerator,
    ) -> Self {
        Self { identities, repo, addresses }
    }

    /// Authenticate the caller and make sure their user and wallet exist.
    pub fn provision(&self, authorization: Option<&str>, now: DateTime<Utc>) -> Result<Provisioned, CoreError> {
        let identity = authenticate(self.identities, authorization)?;
        self.provision_identity(&identity, now)
    }

    /// Provisioning for an already-resolved identity.
    pub fn provision_identity(&self, identity: &Identity, now: DateTime<Utc>) -> Result<Provisioned, CoreError> {
        let email = identity.email.clone().unwrap_or_default();
        let created_user = self.ensure_user(&identity.id, &email)?;
        let (wallet, created_wallet) = self.ensure_wallet(&identity.id, now)?;

        Ok(Provisioned {
            user_id: identity.id.clone(),
            email,
            wallet_address: wallet.address,
            created: Created {
                user: created_user,
                wallet: created_wallet,
            },
        })
    }

    fn ensure_user(&self, user_id: &str, email: &str) -> Result<bool, CoreError> {
        let existing = self
            .repo
            .find_user(user_id)
            .map_err(CoreError::store("failed to check user"))?;
        if existing.is_some() {
            return Ok(false);
        }

        let user = UserRecord {
            id: user_id.to_string(),
            email: email.to_string(),
        };
        match self.repo.insert_user(&user) {
            Ok(()) => Ok(true),
            Err(StoreError::Conflict(_)) => {
                // Lost the race: the winner's row must be readable now.
                match self.repo.find_user(user_id) {
                    Ok(Some(_)) => Ok(false),
                    Ok(None) => Err(CoreError::dependency(
                        "failed to create user",
                        "conflict on insert but user not found on re-read",
                    )),
                    Err(e) => Err(CoreError::dependency("failed to check user", e)),
                }
            }
            Err(e) => Err(CoreError::dependency("failed to create user", e)),
        }
    }

    fn ensure_wallet(&self, user_id: &str, now: DateTime<Utc>) -> Result<(WalletRecord, bool), CoreError> {
        if let Some(wallet) = self.find_wallet(user_id)? {
            return Ok((wallet, false));
        }

        let mut last_conflict = String::new();
        for _ in 0..MAX_ADDRESS_ATTEMPTS {
            let address = self
                .addresses
                .generate()
                .map_err(|e| CoreError::dependency("failed to generate wallet", e))?;
            let wallet = WalletRecord::new(address, user_id.to_string(), now);

            match self.repo.insert_wallet(&wallet) {
                Ok(()) => return Ok((wallet, true)),
                Err(StoreError::Conflict(detail)) => {
                    if let Some(existing) = self.find_wallet(user_id)? {
                        return Ok((existing, false));
                    }
                    // No wallet for this user, so the address itself collided.
                    last_conflict = detail;
                }
                Err(e) => return Err(CoreError::dependency("failed to create wallet", e)),
            }
        }

        Err(CoreError::dependency(
            "failed to create wallet",
            format!("address collided {MAX_ADDRESS_ATTEMPTS} times: {last_conflict}"),
        ))
    }

    fn find_wallet(&self, user_id: &str) -> Result<Option<WalletRecord>, CoreError> {
        self.repo
            .wallet_by_user(user_id)
            .map_err(CoreError::store("failed to check wallet"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
        assert!(bearer_token(None).is_err());
        assert!(bearer_token(Some("")).is_err());
        assert!(bearer_token(Some("Bearer ")).is_err());
        assert!(bearer_token(Some("Basic dXNlcjpwdw==")).is_err());
        assert!(bearer_token(Some("abc.def")).is_err());
    }
}
