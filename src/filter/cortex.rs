use serde_json::{json, Value};

use crate::types::policy::VectorDb;

use super::{
    object, requires_all, Comparison, FilterError, FilterExpression, FilterExpressionSynthesizer,
    MetadataFilterCriteria, MetadataFilters,
};

const DIALECT: &str = "snowflake_cortex";

const USERS_ATTRIBUTE: &str = "users";
const GROUPS_ATTRIBUTE: &str = "groups";

/// Renders Snowflake Cortex Search tagged object filters.
///
/// Cortex has no existence operator, a missing attribute is matched with
/// `{"@eq": {attr: null}}`.
pub struct CortexSynthesizer;

impl FilterExpressionSynthesizer for CortexSynthesizer {
    fn create_filter_expression(
        &self,
        vector_db: &VectorDb,
        user: &str,
        groups: &[String],
        filters: &MetadataFilters,
    ) -> Result<FilterExpression, FilterError> {
        let enforcement = enforcement_clause(vector_db, user, groups);
        let metadata = metadata_clause(filters)?;

        let expr = match (enforcement, metadata) {
            (Some(enforcement), Some(metadata)) => json!({"@and": [enforcement, metadata]}),
            (Some(clause), None) | (None, Some(clause)) => clause,
            (None, None) => return Ok(FilterExpression::Empty),
        };
        Ok(FilterExpression::Json(expr))
    }
}

fn enforcement_clause(vector_db: &VectorDb, user: &str, groups: &[String]) -> Option<Value> {
    let mut clauses = Vec::with_capacity(2);
    if vector_db.user_enforcement {
        clauses.push(json!({"@contains": object(USERS_ATTRIBUTE, json!(user))}));
    }
    if vector_db.group_enforcement && !groups.is_empty() {
        let mut any_group: Vec<Value> = groups
            .iter()
            .map(|g| json!({"@contains": object(GROUPS_ATTRIBUTE, json!(g))}))
            .collect();
        if any_group.len() == 1 {
            clauses.extend(any_group.pop());
        } else {
            clauses.push(json!({"@or": any_group}));
        }
    }

    any_of(clauses)
}

fn metadata_clause(filters: &MetadataFilters) -> Result<Option<Value>, FilterError> {
    let mut fields = Vec::with_capacity(filters.len());
    for criteria in filters.values() {
        if criteria.is_empty() {
            continue;
        }

        let mut clauses = criteria
            .iter()
            .map(criterion_clause)
            .collect::<Result<Vec<_>, _>>()?;
        if clauses.len() == 1 {
            fields.extend(clauses.pop());
            continue;
        }

        let tag = if requires_all(criteria) { "@and" } else { "@or" };
        fields.push(object(tag, Value::Array(clauses)));
    }

    Ok(all_of(fields))
}

fn criterion_clause(criteria: &MetadataFilterCriteria) -> Result<Value, FilterError> {
    let op = Comparison::from_symbol(&criteria.operator, DIALECT)?;
    let tag = match op {
        Comparison::Eq => "@eq",
        Comparison::Ne => "@ne",
    };
    let key = criteria.metadata_key.as_str();

    Ok(json!({"@or": [
        object(tag, object(key, criteria.value.to_json())),
        {"@eq": object(key, Value::Null)}
    ]}))
}

fn any_of(mut clauses: Vec<Value>) -> Option<Value> {
    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(json!({"@or": clauses})),
    }
}

fn all_of(mut clauses: Vec<Value>) -> Option<Value> {
    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(json!({"@and": clauses})),
    }
}
