use std::collections::{BTreeMap, BTreeSet};

use super::access::AccessListAuthorizer;
use super::chain::ChainAuthorizer;
use super::policy::PolicyAuthorizer;
use super::union::UnionAuthorizer;
use super::{AuthzContext, AuthzDecision, Authorizer};

/// Outcome of one content authorization.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub authorized: bool,
    pub reason: String,
    /// Redacted traits, empty whenever `authorized` is false.
    pub masked_traits: BTreeMap<String, String>,
    pub policy_ids: BTreeSet<u64>,
}

/// Pure decision core: access lists first, then trait policies. A request
/// nothing objects to is allowed.
pub struct DecisionEngine {
    chain: ChainAuthorizer,
}

impl DecisionEngine {
    /// # Returns
    /// * An engine chaining the access list check before trait policies
    pub fn new() -> Self {
        let authorizers = vec![
            UnionAuthorizer::AccessList(AccessListAuthorizer::new()),
            UnionAuthorizer::Policy(PolicyAuthorizer::new()),
        ];
        Self {
            chain: ChainAuthorizer::new(authorizers),
        }
    }

    /// Runs the chain over one request context. Never fails: a context
    /// nothing objects to is allowed.
    pub fn decide(&self, ctx: &AuthzContext) -> Decision {
        match self.chain.authorize_request(ctx) {
            AuthzDecision::Continue => Decision {
                authorized: true,
                reason: String::from("allowed"),
                masked_traits: BTreeMap::new(),
                policy_ids: BTreeSet::new(),
            },
            AuthzDecision::Allow {
                masked_traits,
                policy_ids,
            } => {
                let reason = if masked_traits.is_empty() {
                    String::from("allowed")
                } else {
                    String::from("allowed with redacted traits")
                };
                Decision {
                    authorized: true,
                    reason,
                    masked_traits,
                    policy_ids,
                }
            }
            AuthzDecision::Deny { reason, policy_ids } => Decision {
                authorized: false,
                reason,
                masked_traits: BTreeMap::new(),
                policy_ids,
            },
        }
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}
