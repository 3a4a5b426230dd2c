use super::access::AccessListAuthorizer;
use super::policy::PolicyAuthorizer;
use super::{AuthzContext, AuthzDecision, Authorizer};

pub enum UnionAuthorizer {
    AccessList(AccessListAuthorizer),
    Policy(PolicyAuthorizer),
}

impl Authorizer for UnionAuthorizer {
    fn authorize_request(&self, ctx: &AuthzContext) -> AuthzDecision {
        match self {
            UnionAuthorizer::AccessList(a) => a.authorize_request(ctx),
            UnionAuthorizer::Policy(p) => p.authorize_request(ctx),
        }
    }
}
