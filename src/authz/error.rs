use thiserror::Error;

use crate::filter::FilterError;
use crate::types::request::ValidationError;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid vector db policy: {0}")]
    Filter(#[from] FilterError),

    #[error("policy store: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl AuthzError {
    /// Whether the caller sent a bad request, as opposed to a server side or
    /// configuration failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
