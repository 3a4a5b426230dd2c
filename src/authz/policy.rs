use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::types::policy::{AiApplicationPolicy, Permission};

use super::{AuthzContext, AuthzDecision, Authorizer};

/// Evaluates trait policies in list order: the first DENY wins, otherwise
/// each trait is redacted by its first REDACT policy.
pub struct PolicyAuthorizer;

impl PolicyAuthorizer {
    pub fn new() -> Self {
        Self
    }
}

impl Authorizer for PolicyAuthorizer {
    fn authorize_request(&self, ctx: &AuthzContext) -> AuthzDecision {
        let applicable: Vec<&AiApplicationPolicy> = ctx
            .policies
            .iter()
            .filter(|p| p.has_any_tag(ctx.traits) && p.applies_to(ctx.user, ctx.groups))
            .collect();

        let request_type = ctx.request_type;
        if let Some(policy) = applicable
            .iter()
            .find(|p| p.permission(request_type) == Permission::Deny)
        {
            debug!(
                "Policy {} denies {} for user '{}'",
                policy.id, ctx.request_type, ctx.user
            );
            return AuthzDecision::Deny {
                reason: format!("denied by policy {}", policy.id),
                policy_ids: BTreeSet::from([policy.id]),
            };
        }

        let mut masked_traits = BTreeMap::new();
        let mut policy_ids = BTreeSet::new();
        for name in ctx.traits {
            let redacted_by = applicable
                .iter()
                .find(|p| p.permission(request_type) == Permission::Redact && p.has_tag(name));
            if let Some(policy) = redacted_by {
                masked_traits.insert(name.clone(), mask(name));
                policy_ids.insert(policy.id);
                continue;
            }

            // Allowed traits only record the policy for the audit trail
            if let Some(policy) = applicable.iter().find(|p| p.has_tag(name)) {
                policy_ids.insert(policy.id);
            }
        }

        AuthzDecision::Allow {
            masked_traits,
            policy_ids,
        }
    }
}

fn mask(name: &str) -> String {
    format!("<<{name}>>")
}

#[cfg(test)]
mod tests {
    use crate::types::policy::RequestType;

    use super::*;

    fn policy(id: u64, tags: &[&str], prompt: Permission) -> AiApplicationPolicy {
        AiApplicationPolicy {
            id,
            application_id: 1,
            tags: tags.iter().map(|s| s.to_string()).collect(),
            users: vec![],
            groups: vec![],
            roles: vec![],
            prompt,
            reply: Permission::Allow,
            enriched_prompt: Permission::Allow,
        }
    }

    fn decide(policies: &[AiApplicationPolicy], traits: &[&str]) -> AuthzDecision {
        let traits: Vec<String> = traits.iter().map(|s| s.to_string()).collect();
        let ctx = AuthzContext {
            request_type: RequestType::Prompt,
            user: "bob",
            groups: &[],
            traits: &traits,
            config: None,
            policies,
        };
        PolicyAuthorizer::new().authorize_request(&ctx)
    }

    #[test]
    fn test_deny_precedence() {
        let policies = vec![
            policy(1, &["t1"], Permission::Allow),
            policy(2, &["t2"], Permission::Deny),
            policy(3, &["t1"], Permission::Redact),
        ];
        let decision = decide(&policies, &["t1", "t2"]);
        let AuthzDecision::Deny { policy_ids, .. } = &decision else {
            panic!("expected deny, got {decision:?}");
        };
        assert!(policy_ids.contains(&2));
    }

    #[test]
    fn test_redaction_first_match() {
        let policies = vec![
            policy(1, &["t"], Permission::Redact),
            policy(2, &["t"], Permission::Redact),
        ];
        let decision = decide(&policies, &["t"]);
        assert_eq!(
            decision,
            AuthzDecision::Allow {
                masked_traits: BTreeMap::from([(String::from("t"), String::from("<<t>>"))]),
                policy_ids: BTreeSet::from([1]),
            }
        );
    }

    #[test]
    fn test_allowed_traits_are_audited() {
        let policies = vec![
            policy(4, &["EMAIL"], Permission::Allow),
            policy(5, &["PHONE", "EMAIL"], Permission::Redact),
            policy(6, &["PHONE"], Permission::Allow),
        ];
        let decision = decide(&policies, &["EMAIL", "PHONE", "SSN"]);
        assert_eq!(
            decision,
            AuthzDecision::Allow {
                masked_traits: BTreeMap::from([
                    (String::from("EMAIL"), String::from("<<EMAIL>>")),
                    (String::from("PHONE"), String::from("<<PHONE>>")),
                ]),
                policy_ids: BTreeSet::from([5]),
            }
        );

        let policies = vec![policy(7, &["EMAIL"], Permission::Allow)];
        assert_eq!(
            decide(&policies, &["EMAIL"]),
            AuthzDecision::Allow {
                masked_traits: BTreeMap::new(),
                policy_ids: BTreeSet::from([7]),
            }
        );
    }

    #[test]
    fn test_request_type_selects_permission() {
        let mut p = policy(1, &["t"], Permission::Allow);
        p.reply = Permission::Deny;
        let traits = vec![String::from("t")];
        let policies = [p];
        let ctx = AuthzContext {
            request_type: RequestType::Reply,
            user: "bob",
            groups: &[],
            traits: &traits,
            config: None,
            policies: &policies,
        };
        assert!(matches!(
            PolicyAuthorizer::new().authorize_request(&ctx),
            AuthzDecision::Deny { .. }
        ));
    }

    #[test]
    fn test_role_scoped_policies_fail_closed() {
        let mut contractor_only = policy(8, &["SSN"], Permission::Deny);
        contractor_only.roles = vec![String::from("contractor")];
        let decision = decide(&[contractor_only], &["SSN"]);
        assert_eq!(
            decision,
            AuthzDecision::Deny {
                reason: String::from("denied by policy 8"),
                policy_ids: BTreeSet::from([8]),
            }
        );

        let mut redact = policy(9, &["EMAIL"], Permission::Redact);
        redact.users = vec![String::from("alice")];
        redact.roles = vec![String::from("support")];
        let AuthzDecision::Allow { masked_traits, .. } = decide(&[redact], &["EMAIL"]) else {
            panic!("expected allow");
        };
        assert_eq!(masked_traits["EMAIL"], "<<EMAIL>>");
    }

    #[test]
    fn test_inapplicable_policies_are_ignored() {
        let mut other_user = policy(1, &["t"], Permission::Deny);
        other_user.users = vec![String::from("alice")];
        let untagged = policy(2, &["x"], Permission::Deny);

        assert_eq!(
            decide(&[other_user, untagged], &["t"]),
            AuthzDecision::Allow {
                masked_traits: BTreeMap::new(),
                policy_ids: BTreeSet::new(),
            }
        );
    }
}
