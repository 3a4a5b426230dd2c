use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::request::ValidationError;

/// Group name that every user implicitly belongs to when matching policies.
pub const PUBLIC_GROUP: &str = "public";

/// The content flow stage a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Prompt,
    Reply,
    EnrichedPrompt,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Reply => "reply",
            Self::EnrichedPrompt => "enriched_prompt",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prompt" => Ok(Self::Prompt),
            "reply" => Ok(Self::Reply),
            "enriched_prompt" => Ok(Self::EnrichedPrompt),
            _ => Err(ValidationError::InvalidRequestType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    Allow,
    Deny,
    Redact,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
            Self::Redact => "REDACT",
        }
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALLOW" => Ok(Self::Allow),
            "DENY" => Ok(Self::Deny),
            "REDACT" => Ok(Self::Redact),
            _ => Err(format!("unknown permission '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiApplication {
    pub id: u64,
    pub name: String,
    pub application_key: String,
    pub enabled: bool,
}

/// Explicit per application access lists. Empty allow lists mean "no
/// restriction".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiApplicationConfig {
    pub application_id: u64,

    #[serde(default)]
    pub allowed_users: Vec<String>,
    #[serde(default)]
    pub allowed_groups: Vec<String>,
    #[serde(default)]
    pub denied_users: Vec<String>,
    #[serde(default)]
    pub denied_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiApplicationPolicy {
    pub id: u64,
    pub application_id: u64,

    /// Traits this policy governs, in the order the author listed them.
    pub tags: Vec<String>,

    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,

    pub prompt: Permission,
    pub reply: Permission,
    pub enriched_prompt: Permission,
}

impl AiApplicationPolicy {
    pub fn permission(&self, request_type: RequestType) -> Permission {
        match request_type {
            RequestType::Prompt => self.prompt,
            RequestType::Reply => self.reply,
            RequestType::EnrichedPrompt => self.enriched_prompt,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn has_any_tag(&self, traits: &[String]) -> bool {
        traits.iter().any(|t| self.has_tag(t))
    }

    /// A policy without any principal applies to everybody; otherwise it
    /// must name the user, one of the user's groups or the public group.
    ///
    /// Role membership cannot be resolved here, so a policy naming any role
    /// is assumed to apply: its DENY or REDACT is never skipped for a user
    /// who might hold the role.
    pub fn applies_to(&self, user: &str, groups: &[String]) -> bool {
        if self.users.is_empty() && self.groups.is_empty() {
            return true;
        }
        if !self.roles.is_empty() || self.users.iter().any(|u| u == user) {
            return true;
        }
        self.groups
            .iter()
            .any(|g| g == PUBLIC_GROUP || groups.contains(g))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VectorDbType {
    #[serde(rename = "opensearch")]
    OpenSearch,
    #[serde(rename = "milvus")]
    Milvus,
    #[serde(rename = "snowflake_cortex")]
    SnowflakeCortex,
}

impl VectorDbType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenSearch => "opensearch",
            Self::Milvus => "milvus",
            Self::SnowflakeCortex => "snowflake_cortex",
        }
    }
}

impl FromStr for VectorDbType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opensearch" => Ok(Self::OpenSearch),
            "milvus" => Ok(Self::Milvus),
            "snowflake_cortex" => Ok(Self::SnowflakeCortex),
            _ => Err(format!("unknown vector db type '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorDb {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub db_type: VectorDbType,
    pub user_enforcement: bool,
    pub group_enforcement: bool,
    pub enabled: bool,
}

/// A metadata based row level rule for one vector database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorDbPolicy {
    pub id: u64,
    #[serde(default)]
    pub version: u32,
    pub vector_db_id: u64,

    #[serde(default)]
    pub allowed_users: Vec<String>,
    #[serde(default)]
    pub allowed_groups: Vec<String>,
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    #[serde(default)]
    pub denied_users: Vec<String>,
    #[serde(default)]
    pub denied_groups: Vec<String>,
    #[serde(default)]
    pub denied_roles: Vec<String>,

    pub metadata_key: String,
    pub metadata_value: String,

    /// Raw comparison operator, `eq` or `ne`.
    pub operator: Option<String>,
}

impl VectorDbPolicy {
    pub fn is_allowed(&self, user: &str, groups: &[String]) -> bool {
        self.allowed_users.iter().any(|u| u == user)
            || groups.iter().any(|g| self.allowed_groups.contains(g))
    }

    pub fn is_denied(&self, user: &str, groups: &[String]) -> bool {
        self.denied_users.iter().any(|u| u == user)
            || groups.iter().any(|g| self.denied_groups.contains(g))
    }

    /// Whether the policy names the requester in any of its lists.
    pub fn mentions(&self, user: &str, groups: &[String]) -> bool {
        self.is_allowed(user, groups) || self.is_denied(user, groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(users: &[&str], groups: &[&str]) -> AiApplicationPolicy {
        AiApplicationPolicy {
            id: 1,
            application_id: 1,
            tags: vec!["EMAIL".to_string()],
            users: users.iter().map(|s| s.to_string()).collect(),
            groups: groups.iter().map(|s| s.to_string()).collect(),
            roles: vec![],
            prompt: Permission::Redact,
            reply: Permission::Allow,
            enriched_prompt: Permission::Deny,
        }
    }

    #[test]
    fn test_permission() {
        let p = policy(&[], &[]);
        assert_eq!(p.permission(RequestType::Prompt), Permission::Redact);
        assert_eq!(p.permission(RequestType::Reply), Permission::Allow);
        assert_eq!(p.permission(RequestType::EnrichedPrompt), Permission::Deny);
    }

    #[test]
    fn test_applies_to() {
        let groups = vec!["sales".to_string()];

        assert!(policy(&[], &[]).applies_to("bob", &[]));
        assert!(policy(&["bob"], &[]).applies_to("bob", &[]));
        assert!(!policy(&["alice"], &[]).applies_to("bob", &groups));
        assert!(policy(&["alice"], &["sales"]).applies_to("bob", &groups));
        assert!(policy(&[], &[PUBLIC_GROUP]).applies_to("bob", &[]));
        assert!(!policy(&[], &["hr"]).applies_to("bob", &groups));

        let mut roles_only = policy(&[], &[]);
        roles_only.roles = vec!["contractor".to_string()];
        assert!(roles_only.applies_to("bob", &[]));

        let mut scoped = policy(&["alice"], &["hr"]);
        scoped.roles = vec!["contractor".to_string()];
        assert!(scoped.applies_to("bob", &groups));
    }

    #[test]
    fn test_request_type_parse() {
        assert_eq!("prompt".parse::<RequestType>().unwrap(), RequestType::Prompt);
        assert_eq!(
            "enriched_prompt".parse::<RequestType>().unwrap(),
            RequestType::EnrichedPrompt
        );
        assert!("PROMPT".parse::<RequestType>().is_err());
        assert!("".parse::<RequestType>().is_err());
    }

    #[test]
    fn test_vector_db_policy_match() {
        let p = VectorDbPolicy {
            allowed_users: vec!["u1".to_string()],
            denied_groups: vec!["g2".to_string()],
            ..Default::default()
        };
        assert!(p.is_allowed("u1", &[]));
        assert!(!p.is_allowed("u2", &[]));
        assert!(p.is_denied("u2", &["g2".to_string()]));
        assert!(p.mentions("u2", &["g2".to_string()]));
        assert!(!p.mentions("u3", &["g3".to_string()]));
    }
}
