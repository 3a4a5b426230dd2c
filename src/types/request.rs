use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::policy::RequestType;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("sequenceNumber must be a non-negative integer, found {0}")]
    NegativeSequenceNumber(i64),

    #[error("requestType must be one of prompt, reply, enriched_prompt, found '{0}'")]
    InvalidRequestType(String),
}

/// One content authorization event, built by the caller per prompt or reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthzRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    pub request_id: String,

    /// Parent request id for replies.
    pub thread_id: String,

    #[serde(default = "default_sequence_number")]
    pub sequence_number: i64,

    pub application_key: String,

    #[serde(default = "default_client_application_key")]
    pub client_application_key: String,

    #[serde(default = "default_enforce")]
    pub enforce: bool,

    pub user_id: String,

    pub request_type: String,

    #[serde(default)]
    pub traits: Vec<String>,

    #[serde(default)]
    pub context: Map<String, Value>,

    #[serde(default = "Utc::now")]
    pub request_date_time: DateTime<Utc>,
}

impl AuthzRequest {
    /// Checks the request shape and returns the parsed request type.
    pub fn validate(&self) -> Result<RequestType, ValidationError> {
        require("requestId", &self.request_id)?;
        require("threadId", &self.thread_id)?;
        require("applicationKey", &self.application_key)?;
        require("clientApplicationKey", &self.client_application_key)?;
        require("userId", &self.user_id)?;
        require("requestType", &self.request_type)?;

        if self.sequence_number < 0 {
            return Err(ValidationError::NegativeSequenceNumber(
                self.sequence_number,
            ));
        }

        self.request_type.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorDbAuthzRequest {
    pub user_id: String,
    pub application_key: String,
}

impl VectorDbAuthzRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("userId", &self.user_id)?;
        require("applicationKey", &self.application_key)?;
        Ok(())
    }
}

fn require(name: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(name));
    }
    Ok(())
}

fn default_sequence_number() -> i64 {
    1
}

fn default_client_application_key() -> String {
    String::from("unknown")
}

fn default_enforce() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> AuthzRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults() {
        let req = parse(json!({
            "requestId": "r1",
            "threadId": "t1",
            "applicationKey": "app",
            "userId": "alice",
            "requestType": "prompt",
        }));
        assert_eq!(req.client_application_key, "unknown");
        assert!(req.enforce);
        assert_eq!(req.sequence_number, 1);
        assert!(req.traits.is_empty());
        assert!(req.context.is_empty());
        assert!(req.conversation_id.is_none());
        assert_eq!(req.validate().unwrap(), RequestType::Prompt);
    }

    #[test]
    fn test_validate() {
        let base = json!({
            "conversationId": "c1",
            "requestId": "r1",
            "threadId": "t1",
            "sequenceNumber": 2,
            "applicationKey": "app",
            "clientApplicationKey": "client",
            "enforce": false,
            "userId": "alice",
            "requestType": "reply",
            "traits": ["EMAIL_ADDRESS"],
            "context": {"k": "v"},
            "requestDateTime": "2024-01-02T03:04:05Z",
        });
        let req = parse(base.clone());
        assert_eq!(req.validate().unwrap(), RequestType::Reply);
        assert!(!req.enforce);

        let mut req = parse(base.clone());
        req.user_id = String::from("  ");
        assert_eq!(
            req.validate().unwrap_err(),
            ValidationError::MissingField("userId")
        );

        let mut req = parse(base.clone());
        req.sequence_number = -1;
        assert_eq!(
            req.validate().unwrap_err(),
            ValidationError::NegativeSequenceNumber(-1)
        );

        let mut req = parse(base.clone());
        req.request_type = String::from("summary");
        assert_eq!(
            req.validate().unwrap_err(),
            ValidationError::InvalidRequestType(String::from("summary"))
        );

        let mut req = parse(base);
        req.client_application_key = String::new();
        assert_eq!(
            req.validate().unwrap_err(),
            ValidationError::MissingField("clientApplicationKey")
        );
    }

    #[test]
    fn test_missing_application_key_on_wire() {
        let result: Result<AuthzRequest, _> = serde_json::from_value(json!({
            "requestId": "r1",
            "threadId": "t1",
            "userId": "alice",
            "requestType": "prompt",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_vector_db_validate() {
        let req = VectorDbAuthzRequest {
            user_id: String::from("alice"),
            application_key: String::new(),
        };
        assert_eq!(
            req.validate().unwrap_err(),
            ValidationError::MissingField("applicationKey")
        );
    }
}
