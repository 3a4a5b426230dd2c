mod access;
mod chain;
mod policy;
mod union;

pub mod engine;
pub mod error;
pub mod service;

use std::collections::{BTreeMap, BTreeSet};

use crate::types::policy::{AiApplicationConfig, AiApplicationPolicy, RequestType};

pub use engine::{Decision, DecisionEngine};
pub use error::AuthzError;
pub use service::AuthzService;

/// One step of the decision chain.
pub trait Authorizer: Send + Sync {
    fn authorize_request(&self, ctx: &AuthzContext) -> AuthzDecision;
}

/// Everything a decision is computed from, already fetched from the store.
#[derive(Debug, Clone)]
pub struct AuthzContext<'a> {
    pub request_type: RequestType,
    pub user: &'a str,
    pub groups: &'a [String],
    pub traits: &'a [String],
    pub config: Option<&'a AiApplicationConfig>,
    /// Ordered by precedence, the first match wins.
    pub policies: &'a [AiApplicationPolicy],
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthzDecision {
    /// Defers the decision to the next authorizer in the chain
    Continue,
    Allow {
        masked_traits: BTreeMap<String, String>,
        policy_ids: BTreeSet<u64>,
    },
    Deny {
        reason: String,
        policy_ids: BTreeSet<u64>,
    },
}
