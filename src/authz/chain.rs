use super::union::UnionAuthorizer;
use super::{AuthzContext, AuthzDecision, Authorizer};

pub struct ChainAuthorizer {
    authorizers: Vec<UnionAuthorizer>,
}

impl ChainAuthorizer {
    pub fn new(authorizers: Vec<UnionAuthorizer>) -> Self {
        Self { authorizers }
    }
}

impl Authorizer for ChainAuthorizer {
    fn authorize_request(&self, ctx: &AuthzContext) -> AuthzDecision {
        for authorizer in self.authorizers.iter() {
            match authorizer.authorize_request(ctx) {
                AuthzDecision::Continue => continue,
                decision => return decision,
            }
        }

        AuthzDecision::Continue
    }
}
