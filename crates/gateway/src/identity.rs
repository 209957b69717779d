//! Identity resolution against the managed auth provider.
//!
//! `GET {url}/auth/v1/user` with the caller's bearer token and the project's
//! anon key. A 4xx answer means the token is bad; anything else that is not
//! a usable user object means the provider is unavailable.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use bovinext_config::{AuthSettings, StaticToken};
use bovinext_core::model::Identity;
use bovinext_core::ports::{IdentityError, IdentityResolver};

use crate::GatewayError;

/// Auth provider client (blocking).
#[derive(Clone)]
pub struct HttpIdentityResolver {
    http: reqwest::blocking::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl HttpIdentityResolver {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("bovinext/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    pub fn from_settings(auth: &AuthSettings) -> Result<Self, GatewayError> {
        let url = auth
            .url
            .as_deref()
            .ok_or_else(|| GatewayError::Client("auth.url is not set".into()))?;
        Self::new(url, &auth.anon_key, Duration::from_secs(auth.timeout_secs))
    }
}

impl IdentityResolver for HttpIdentityResolver {
    fn resolve(&self, token: &str) -> Result<Identity, IdentityError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("apikey", &self.anon_key)
            .send()
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() && status.as_u16() != 408 && status.as_u16() != 429 {
            debug!(status = status.as_u16(), "auth provider rejected token");
            return Err(IdentityError::InvalidToken);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "auth provider error");
            return Err(IdentityError::Unavailable(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let user: UserPayload = response
            .json()
            .map_err(|e| IdentityError::Unavailable(format!("unreadable user payload: {e}")))?;
        if user.id.trim().is_empty() {
            return Err(IdentityError::Unavailable("user payload without id".into()));
        }
        Ok(Identity {
            id: user.id,
            email: user.email.filter(|e| !e.is_empty()),
        })
    }
}

/// Fixed token table from settings. For local development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentityResolver {
    pub fn new(tokens: &[StaticToken]) -> Self {
        Self {
            tokens: tokens
                .iter()
                .map(|t| {
                    (
                        t.token.clone(),
                        Identity { id: t.user_id.clone(), email: t.email.clone() },
                    )
                })
                .collect(),
        }
    }
}

impl IdentityResolver for StaticIdentityResolver {
    fn resolve(&self, token: &str) -> Result<Identity, IdentityError> {
        self.tokens.get(token).cloned().ok_or(IdentityError::InvalidToken)
    }
}

/// Tries the static table first, then the provider.
pub struct ChainedIdentityResolver {
    local: StaticIdentityResolver,
    remote: Option<HttpIdentityResolver>,
}

impl ChainedIdentityResolver {
    pub fn from_settings(auth: &AuthSettings) -> Result<Self, GatewayError> {
        let remote = match auth.url {
            Some(_) => Some(HttpIdentityResolver::from_settings(auth)?),
            None => None,
        };
        Ok(Self {
            local: StaticIdentityResolver::new(&auth.static_tokens),
            remote,
        })
    }
}

impl IdentityResolver for ChainedIdentityResolver {
    fn resolve(&self, token: &str) -> Result<Identity, IdentityError> {
        match self.local.resolve(token) {
            Ok(identity) => Ok(identity),
            Err(IdentityError::InvalidToken) => match &self.remote {
                Some(remote) => remote.resolve(token),
                None => Err(IdentityError::InvalidToken),
            },
            Err(e) => Err(e),
        }
    }
}
