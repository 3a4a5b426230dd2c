use std::collections::BTreeSet;

use log::debug;

use super::{AuthzContext, AuthzDecision, Authorizer};

pub const EXPLICITLY_DENIED: &str = "explicitly denied";
pub const NOT_EXPLICITLY_ALLOWED: &str = "not explicitly allowed";

/// Applies the application level allow and deny lists.
///
/// Deny lists win. Populated allow lists are exclusive, empty ones do not
/// restrict anybody.
pub struct AccessListAuthorizer;

impl AccessListAuthorizer {
    pub fn new() -> Self {
        Self
    }
}

impl Authorizer for AccessListAuthorizer {
    fn authorize_request(&self, ctx: &AuthzContext) -> AuthzDecision {
        let Some(cfg) = ctx.config else {
            return AuthzDecision::Continue;
        };

        let in_groups = |list: &[String]| ctx.groups.iter().any(|g| list.contains(g));

        if cfg.denied_users.iter().any(|u| u == ctx.user) || in_groups(&cfg.denied_groups) {
            debug!("User '{}' is in the application deny list", ctx.user);
            return AuthzDecision::Deny {
                reason: String::from(EXPLICITLY_DENIED),
                policy_ids: BTreeSet::new(),
            };
        }

        if cfg.allowed_users.is_empty() && cfg.allowed_groups.is_empty() {
            return AuthzDecision::Continue;
        }
        if cfg.allowed_users.iter().any(|u| u == ctx.user) || in_groups(&cfg.allowed_groups) {
            return AuthzDecision::Continue;
        }

        debug!("User '{}' is not in the application allow list", ctx.user);
        AuthzDecision::Deny {
            reason: String::from(NOT_EXPLICITLY_ALLOWED),
            policy_ids: BTreeSet::new(),
        }
    }
}
