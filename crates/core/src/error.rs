use thiserror::Error;

use crate::ports::{IdentityError, LedgerError, StoreError};

/// Error kind exposed to callers. Enough to tell "fix your request" from
/// "try again later" without leaking collaborator details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    NotFound,
    Dependency,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::Dependency => "dependency",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or out-of-range input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or rejected credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A required entity is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A collaborator (store, identity provider, ledger, address source) failed.
    /// `context` is safe to show to callers, `detail` is not.
    #[error("{context}: {detail}")]
    Dependency { context: &'static str, detail: String },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Dependency { .. } => ErrorKind::Dependency,
        }
    }

    /// Message suitable for a response body.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::Unauthorized(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Dependency { context, .. } => (*context).to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn dependency(context: &'static str, detail: impl std::fmt::Display) -> Self {
        Self::Dependency { context, detail: detail.to_string() }
    }

    /// Wrap a store failure with the operation that was attempted.
    pub fn store(context: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |e| Self::dependency(context, e)
    }

    pub fn ledger(context: &'static str) -> impl FnOnce(LedgerError) -> Self {
        move |e| Self::dependency(context, e)
    }
}

impl From<IdentityError> for CoreError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidToken => Self::Unauthorized("invalid token".into()),
            IdentityError::Unavailable(detail) => Self::Dependency {
                context: "failed to resolve identity",
                detail,
            },
        }
    }
}
