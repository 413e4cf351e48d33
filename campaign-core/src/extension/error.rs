//! Campaign error types.

use thiserror::Error;

use crate::cache::CacheError;
use crate::network::NetworkError;
use crate::rules::RulesError;
use crate::storage::StorageError;

/// Unified error of the Campaign extension.
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Rules error: {0}")]
    Rules(#[from] RulesError),
}

/// Result type for Campaign operations.
pub type CampaignResult<T> = Result<T, CampaignError>;
