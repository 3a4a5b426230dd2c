use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use serde_json::{Number, Value};

use crate::types::policy::VectorDbPolicy;

use super::{Comparison, FilterError};

/// Metadata key -> criteria in sorted policy order.
pub type MetadataFilters = BTreeMap<String, Vec<MetadataFilterCriteria>>;

/// A policy value normalized into a literal a filter dialect can embed.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    /// Integer or finite float, kept in its original spelling.
    Number(String),
    Bool(bool),
    Text(String),
}

impl MetadataValue {
    /// Numbers and booleans are recognized after trimming surrounding
    /// whitespace. Anything else stays text, spelled exactly as stored.
    pub fn prepare(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.parse::<i64>().is_ok() {
            return Self::Number(trimmed.to_string());
        }
        if trimmed.parse::<f64>().is_ok_and(|f| f.is_finite()) {
            return Self::Number(trimmed.to_string());
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        Self::Text(raw.to_string())
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Number(raw) => {
                if let Ok(i) = raw.parse::<i64>() {
                    return Value::from(i);
                }
                raw.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(raw.clone()))
            }
            Self::Bool(b) => Value::Bool(*b),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(raw) => f.write_str(raw),
            Self::Bool(true) => f.write_str("TRUE"),
            Self::Bool(false) => f.write_str("FALSE"),
            Self::Text(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataFilterCriteria {
    pub metadata_key: String,
    pub value: MetadataValue,
    /// Comparison symbol, `==` or `!=`.
    pub operator: String,
}

/// Builds the per field criteria for the policies that name the requester.
///
/// Policies are sorted by lowercased key and value first, so the output does
/// not depend on the order the store returned them in. An allow match keeps
/// the policy operator, a deny match negates it.
///
/// # Arguments
/// * `policies` - Vector db policies of one vector db
/// * `user` - The requesting user id
/// * `groups` - Groups of the requesting user
///
/// # Returns
/// * Criteria keyed by metadata key, empty when no policy names the requester
/// * `FilterError::UnsupportedOperator` for operators other than `eq` and `ne`
pub fn build_metadata_filters(
    policies: &[VectorDbPolicy],
    user: &str,
    groups: &[String],
) -> Result<MetadataFilters, FilterError> {
    let mut sorted: Vec<&VectorDbPolicy> = policies.iter().collect();
    sorted.sort_by_cached_key(|p| {
        (
            p.metadata_key.to_lowercase(),
            p.metadata_value.to_lowercase(),
            p.id,
        )
    });

    let mut filters = MetadataFilters::new();
    for policy in sorted {
        let comparison = if policy.is_allowed(user, groups) {
            policy_comparison(policy)?
        } else if policy.is_denied(user, groups) {
            policy_comparison(policy)?.negate()
        } else {
            continue;
        };

        filters
            .entry(policy.metadata_key.clone())
            .or_default()
            .push(MetadataFilterCriteria {
                metadata_key: policy.metadata_key.clone(),
                value: MetadataValue::prepare(&policy.metadata_value),
                operator: comparison.symbol().to_string(),
            });
    }

    Ok(filters)
}

fn policy_comparison(policy: &VectorDbPolicy) -> Result<Comparison, FilterError> {
    match policy.operator.as_deref() {
        None => {
            debug!(
                "Vector db policy {} has no operator, treating it as eq",
                policy.id
            );
            Ok(Comparison::Eq)
        }
        Some("eq") => Ok(Comparison::Eq),
        Some("ne") => Ok(Comparison::Ne),
        Some(op) => Err(FilterError::UnsupportedOperator {
            operator: op.to_string(),
            dialect: "vector db policy",
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn vector_policy(
        id: u64,
        key: &str,
        value: &str,
        operator: Option<&str>,
        allowed_users: &[&str],
        denied_groups: &[&str],
    ) -> VectorDbPolicy {
        VectorDbPolicy {
            id,
            version: 1,
            vector_db_id: 1,
            allowed_users: allowed_users.iter().map(|s| s.to_string()).collect(),
            denied_groups: denied_groups.iter().map(|s| s.to_string()).collect(),
            metadata_key: key.to_string(),
            metadata_value: value.to_string(),
            operator: operator.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_prepare_value() {
        assert_eq!(MetadataValue::prepare("5").to_string(), "5");
        assert_eq!(MetadataValue::prepare("-12").to_string(), "-12");
        assert_eq!(MetadataValue::prepare("1.25").to_string(), "1.25");
        assert_eq!(MetadataValue::prepare("True").to_string(), "TRUE");
        assert_eq!(MetadataValue::prepare("false").to_string(), "FALSE");
        assert_eq!(MetadataValue::prepare("US").to_string(), "'US'");
        assert_eq!(MetadataValue::prepare("it's").to_string(), r"'it\'s'");
        assert_eq!(MetadataValue::prepare("nan").to_string(), "'nan'");
        assert_eq!(MetadataValue::prepare("inf").to_string(), "'inf'");

        // Stored values often carry stray whitespace around numbers
        assert_eq!(MetadataValue::prepare(" 5").to_string(), "5");
        assert_eq!(MetadataValue::prepare("5 ").to_string(), "5");
        assert_eq!(MetadataValue::prepare(" 2.5\t").to_json(), Value::from(2.5));
        assert_eq!(MetadataValue::prepare(" true ").to_string(), "TRUE");
        assert_eq!(MetadataValue::prepare(" US ").to_string(), "' US '");

        assert_eq!(MetadataValue::prepare("5").to_json(), Value::from(5));
        assert_eq!(MetadataValue::prepare("1.5").to_json(), Value::from(1.5));
        assert_eq!(MetadataValue::prepare("TRUE").to_json(), Value::Bool(true));
        assert_eq!(MetadataValue::prepare("US").to_json(), Value::from("US"));
    }

    #[test]
    fn test_allow_match() {
        let policies = vec![vector_policy(1, "k", "5", Some("eq"), &["u1"], &[])];
        let filters = build_metadata_filters(&policies, "u1", &[]).unwrap();

        assert_eq!(filters.len(), 1);
        let criteria = &filters["k"];
        assert_eq!(criteria.len(), 1);
        assert_eq!(criteria[0].metadata_key, "k");
        assert_eq!(criteria[0].value.to_string(), "5");
        assert_eq!(criteria[0].operator, "==");
    }

    #[test]
    fn test_deny_match_reverses_operator() {
        let groups = vec!["contractors".to_string()];
        let policies = vec![
            vector_policy(1, "dept", "finance", Some("eq"), &[], &["contractors"]),
            vector_policy(2, "level", "secret", Some("ne"), &[], &["contractors"]),
            vector_policy(3, "region", "EU", None, &[], &["contractors"]),
        ];
        let filters = build_metadata_filters(&policies, "bob", &groups).unwrap();

        assert_eq!(filters["dept"][0].operator, "!=");
        assert_eq!(filters["level"][0].operator, "==");
        assert_eq!(filters["region"][0].operator, "!=");
    }

    #[test]
    fn test_allow_wins_over_deny() {
        let groups = vec!["contractors".to_string()];
        let policies = vec![vector_policy(
            1,
            "dept",
            "finance",
            Some("eq"),
            &["bob"],
            &["contractors"],
        )];
        let filters = build_metadata_filters(&policies, "bob", &groups).unwrap();
        assert_eq!(filters["dept"][0].operator, "==");
    }

    #[test]
    fn test_unmatched_policies_are_skipped() {
        let policies = vec![
            vector_policy(1, "k", "v", Some("eq"), &["alice"], &[]),
            vector_policy(2, "k", "w", Some("eq"), &[], &["hr"]),
        ];
        let filters = build_metadata_filters(&policies, "bob", &["sales".to_string()]).unwrap();
        assert!(filters.is_empty());

        let filters = build_metadata_filters(&[], "bob", &[]).unwrap();
        assert!(filters.is_empty());
    }

    #[test]
    fn test_deterministic_order() {
        let policies = vec![
            vector_policy(3, "region", "US", Some("eq"), &["u1"], &[]),
            vector_policy(1, "Dept", "b", Some("eq"), &["u1"], &[]),
            vector_policy(2, "region", "eu", Some("ne"), &["u1"], &[]),
            vector_policy(4, "dept", "A", Some("eq"), &["u1"], &[]),
        ];
        let mut reversed = policies.clone();
        reversed.reverse();

        let a = build_metadata_filters(&policies, "u1", &[]).unwrap();
        let b = build_metadata_filters(&reversed, "u1", &[]).unwrap();
        assert_eq!(a, b);

        let region: Vec<String> = a["region"].iter().map(|c| c.value.to_string()).collect();
        assert_eq!(region, vec!["'eu'", "'US'"]);
    }

    #[test]
    fn test_unsupported_policy_operator() {
        let policies = vec![vector_policy(1, "k", "5", Some("gt"), &["u1"], &[])];
        let err = build_metadata_filters(&policies, "u1", &[]).unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedOperator { .. }));

        // Policies not naming the requester are never inspected
        let filters = build_metadata_filters(&policies, "u2", &[]).unwrap();
        assert!(filters.is_empty());
    }
}
