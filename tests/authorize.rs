use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use aigov_authz::authz::{AuthzError, AuthzService};
use aigov_authz::store::config::DbConfig;
use aigov_authz::store::factory::DbFactory;
use aigov_authz::store::seed::GovernanceData;
use aigov_authz::store::Database;
use aigov_authz::types::request::AuthzRequest;
use aigov_authz::types::response::{STATUS_FORBIDDEN, STATUS_OK};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

static GOVERNANCE: Lazy<GovernanceData> = Lazy::new(|| {
    serde_json::from_value(json!({
        "applications": [
            {
                "name": "support",
                "applicationKey": "support-key",
                "deniedUsers": ["mallory"],
                "deniedGroups": ["contractors"],
                "policies": [
                    {
                        "tags": ["EMAIL"],
                        "prompt": "REDACT",
                        "reply": "ALLOW",
                        "enrichedPrompt": "ALLOW"
                    },
                    {
                        "tags": ["SSN"],
                        "prompt": "DENY",
                        "reply": "DENY",
                        "enrichedPrompt": "DENY"
                    },
                    {
                        "tags": ["PHONE"],
                        "groups": ["sales"],
                        "prompt": "REDACT",
                        "reply": "REDACT",
                        "enrichedPrompt": "REDACT"
                    }
                ]
            },
            {
                "name": "hr",
                "applicationKey": "hr-key",
                "allowedGroups": ["hr"]
            },
            {
                "name": "legacy",
                "applicationKey": "legacy-key",
                "enabled": false
            }
        ],
        "userGroups": {
            "bob": ["sales"],
            "carol": ["contractors"],
            "dana": ["hr"]
        }
    }))
    .unwrap()
});

fn build_service() -> AuthzService<Database> {
    let mut cfg = DbConfig::default();
    cfg.sqlite.memory = true;
    let db = DbFactory::new().build_db(&cfg).unwrap();
    db.import(&GOVERNANCE).unwrap();
    AuthzService::new(db)
}

fn request(app: &str, user: &str, request_type: &str, traits: &[&str]) -> AuthzRequest {
    serde_json::from_value(json!({
        "requestId": "req-1",
        "threadId": "thread-1",
        "applicationKey": app,
        "userId": user,
        "requestType": request_type,
        "traits": traits,
    }))
    .unwrap()
}

#[tokio::test]
async fn test_redact_traits() {
    let service = build_service();

    let resp = service
        .authorize(&request("support-key", "bob", "prompt", &["EMAIL", "PHONE"]))
        .await
        .unwrap();
    assert!(resp.authorized);
    assert_eq!(resp.status_code, STATUS_OK);
    assert_eq!(resp.application_name, "support");
    assert_eq!(
        resp.masked_traits,
        BTreeMap::from([
            (String::from("EMAIL"), String::from("<<EMAIL>>")),
            (String::from("PHONE"), String::from("<<PHONE>>")),
        ])
    );
    assert_eq!(resp.policy_ids, BTreeSet::from([1, 3]));

    // The phone policy only applies to sales
    let resp = service
        .authorize(&request("support-key", "erin", "prompt", &["PHONE"]))
        .await
        .unwrap();
    assert!(resp.authorized);
    assert!(resp.masked_traits.is_empty());
    assert!(resp.policy_ids.is_empty());
}

#[tokio::test]
async fn test_deny_wins() {
    let service = build_service();

    let resp = service
        .authorize(&request("support-key", "bob", "prompt", &["EMAIL", "SSN"]))
        .await
        .unwrap();
    assert!(!resp.authorized);
    assert_eq!(resp.status_code, STATUS_FORBIDDEN);
    assert!(resp.masked_traits.is_empty());
    assert!(resp.policy_ids.contains(&2));
}

#[tokio::test]
async fn test_request_type() {
    let service = build_service();

    let resp = service
        .authorize(&request("support-key", "bob", "reply", &["EMAIL"]))
        .await
        .unwrap();
    assert!(resp.authorized);
    assert!(resp.masked_traits.is_empty());
    assert_eq!(resp.policy_ids, BTreeSet::from([1]));

    let err = service
        .authorize(&request("support-key", "bob", "summary", &["EMAIL"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::Validation(_)));
}

#[tokio::test]
async fn test_access_lists() {
    let service = build_service();

    for user in ["mallory", "carol"] {
        let resp = service
            .authorize(&request("support-key", user, "prompt", &["EMAIL"]))
            .await
            .unwrap();
        assert!(!resp.authorized, "{user} should be denied");
        assert_eq!(resp.reason, "explicitly denied");
        assert!(resp.policy_ids.is_empty());
    }

    let resp = service
        .authorize(&request("hr-key", "dana", "prompt", &[]))
        .await
        .unwrap();
    assert!(resp.authorized);

    let resp = service
        .authorize(&request("hr-key", "bob", "prompt", &[]))
        .await
        .unwrap();
    assert!(!resp.authorized);
    assert_eq!(resp.reason, "not explicitly allowed");
}

#[tokio::test]
async fn test_application_state() {
    let service = build_service();

    let resp = service
        .authorize(&request("missing-key", "bob", "prompt", &["EMAIL"]))
        .await
        .unwrap();
    assert!(!resp.authorized);
    assert_eq!(resp.status_code, STATUS_FORBIDDEN);
    assert!(resp.reason.contains("application not found"));

    let resp = service
        .authorize(&request("legacy-key", "bob", "prompt", &["EMAIL"]))
        .await
        .unwrap();
    assert!(!resp.authorized);
    assert_eq!(resp.reason, "Application is disabled");
    assert_eq!(resp.application_name, "legacy");
}

#[tokio::test]
async fn test_request_is_echoed() {
    let service = build_service();

    let mut req = request("support-key", "bob", "prompt", &[]);
    req.enforce = false;
    req.context.insert(String::from("session"), Value::from("s-42"));

    let resp = service.authorize(&req).await.unwrap();
    assert!(resp.authorized);
    assert!(!resp.enforce);
    assert_eq!(resp.request_id, "req-1");
    assert_eq!(resp.user_id, "bob");
    assert_eq!(resp.request_date_time, req.request_date_time);
    assert_eq!(resp.context["session"], "s-42");
}

#[tokio::test]
async fn test_concurrent_requests() {
    let service = Arc::new(build_service());

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let traits: &[&str] = if i % 2 == 0 { &["EMAIL"] } else { &["SSN"] };
            let resp = service
                .authorize(&request("support-key", "bob", "prompt", traits))
                .await
                .unwrap();
            (i, resp.authorized)
        }));
    }

    for handle in handles {
        let (i, authorized) = handle.await.unwrap();
        assert_eq!(authorized, i % 2 == 0);
    }
}
