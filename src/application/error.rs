//! Application-level error type.

use thiserror::Error;

use super::auth::CredentialError;
use super::repos::RepoError;
use crate::infra::kv::KvError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("record not found")]
    NotFound,
    #[error("value already in use")]
    UniqueViolation,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("authentication failed")]
    Unauthorized,
    #[error("insufficient access")]
    Forbidden,
    #[error("backing store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound,
            RepoError::Duplicate { .. } => AppError::UniqueViolation,
            RepoError::Persistence(message) => AppError::StoreUnavailable(message),
            RepoError::Integrity { message } => AppError::Unexpected(message),
        }
    }
}

impl From<KvError> for AppError {
    fn from(err: KvError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        AppError::Validation(err.to_string())
    }
}
