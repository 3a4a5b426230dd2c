use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::filter::FilterExpression;

use super::policy::{VectorDbPolicy, VectorDbType};
use super::request::AuthzRequest;

pub const STATUS_OK: u16 = 200;
pub const STATUS_FORBIDDEN: u16 = 403;

pub const fn status_message(code: u16) -> &'static str {
    match code {
        STATUS_OK => "Access is allowed",
        STATUS_FORBIDDEN => "Access is denied",
        _ => "Unknown status",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthzResponse {
    pub authorized: bool,
    pub enforce: bool,
    pub request_id: String,
    pub request_date_time: DateTime<Utc>,
    pub user_id: String,
    pub application_name: String,

    /// Redacted trait -> replacement text. Always empty when denied.
    #[serde(default)]
    pub masked_traits: BTreeMap<String, String>,

    #[serde(default)]
    pub context: Map<String, Value>,

    pub status_code: u16,
    pub status_message: String,
    pub reason: String,

    /// Every policy that contributed to the decision, for the audit trail.
    #[serde(default)]
    pub policy_ids: BTreeSet<u64>,
}

impl AuthzResponse {
    pub fn allowed(
        req: &AuthzRequest,
        application_name: &str,
        reason: String,
        masked_traits: BTreeMap<String, String>,
        policy_ids: BTreeSet<u64>,
    ) -> Self {
        Self::build(req, application_name, true, reason, masked_traits, policy_ids)
    }

    pub fn denied(
        req: &AuthzRequest,
        application_name: &str,
        reason: String,
        policy_ids: BTreeSet<u64>,
    ) -> Self {
        Self::build(
            req,
            application_name,
            false,
            reason,
            BTreeMap::new(),
            policy_ids,
        )
    }

    fn build(
        req: &AuthzRequest,
        application_name: &str,
        authorized: bool,
        reason: String,
        masked_traits: BTreeMap<String, String>,
        policy_ids: BTreeSet<u64>,
    ) -> Self {
        let status_code = if authorized {
            STATUS_OK
        } else {
            STATUS_FORBIDDEN
        };
        Self {
            authorized,
            enforce: req.enforce,
            request_id: req.request_id.clone(),
            request_date_time: req.request_date_time,
            user_id: req.user_id.clone(),
            application_name: application_name.to_string(),
            masked_traits,
            context: req.context.clone(),
            status_code,
            status_message: status_message(status_code).to_string(),
            reason,
            policy_ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorDbPolicyInfo {
    pub id: u64,
    pub version: u32,
}

impl From<&VectorDbPolicy> for VectorDbPolicyInfo {
    fn from(policy: &VectorDbPolicy) -> Self {
        Self {
            id: policy.id,
            version: policy.version,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorDbAuthzResponse {
    pub authorized: bool,
    pub user_id: String,
    pub application_key: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_db_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_db_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_db_type: Option<VectorDbType>,

    #[serde(default)]
    pub user_enforcement: bool,
    #[serde(default)]
    pub group_enforcement: bool,

    #[serde(default, skip_serializing_if = "FilterExpression::is_empty")]
    pub filter_expression: FilterExpression,

    #[serde(default)]
    pub vector_db_policy_info: Vec<VectorDbPolicyInfo>,

    pub reason: String,
}

impl VectorDbAuthzResponse {
    /// A response carrying no vector db details and no filter.
    pub fn rejected(user_id: &str, application_key: &str, reason: impl Into<String>) -> Self {
        Self {
            authorized: false,
            user_id: user_id.to_string(),
            application_key: application_key.to_string(),
            vector_db_id: None,
            vector_db_name: None,
            vector_db_type: None,
            user_enforcement: false,
            group_enforcement: false,
            filter_expression: FilterExpression::Empty,
            vector_db_policy_info: vec![],
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_denied_wire_shape() {
        let req: AuthzRequest = serde_json::from_value(json!({
            "requestId": "r1",
            "threadId": "t1",
            "applicationKey": "app",
            "userId": "alice",
            "requestType": "prompt",
            "context": {"source": "test"},
        }))
        .unwrap();

        let resp = AuthzResponse::denied(&req, "Chat", String::from("nope"), BTreeSet::from([7]));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["authorized"], json!(false));
        assert_eq!(value["statusCode"], json!(403));
        assert_eq!(value["statusMessage"], json!("Access is denied"));
        assert_eq!(value["requestId"], json!("r1"));
        assert_eq!(value["applicationName"], json!("Chat"));
        assert_eq!(value["maskedTraits"], json!({}));
        assert_eq!(value["policyIds"], json!([7]));
        assert_eq!(value["context"], json!({"source": "test"}));
        assert_eq!(value["enforce"], json!(true));
    }

    #[test]
    fn test_rejected_vector_db_omits_filter() {
        let resp = VectorDbAuthzResponse::rejected("alice", "app", "Vector DB is disabled");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["authorized"], json!(false));
        assert_eq!(value["reason"], json!("Vector DB is disabled"));
        assert!(value.get("filterExpression").is_none());
        assert!(value.get("vectorDbId").is_none());
    }
}
