use serde_json::{json, Value};

use crate::types::policy::VectorDb;

use super::{
    object, requires_all, Comparison, FilterError, FilterExpression, FilterExpressionSynthesizer,
    MetadataFilterCriteria, MetadataFilters,
};

const DIALECT: &str = "opensearch";

const USERS_FIELD: &str = "metadata.users.keyword";
const GROUPS_FIELD: &str = "metadata.groups.keyword";

/// Renders OpenSearch bool queries.
pub struct OpenSearchSynthesizer;

impl FilterExpressionSynthesizer for OpenSearchSynthesizer {
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
            (Some(enforcement), Some(metadata)) => json!({"bool": {"must": [enforcement, metadata]}}),
            (Some(clause), None) | (None, Some(clause)) => clause,
            (None, None) => return Ok(FilterExpression::Empty),
        };
        Ok(FilterExpression::Json(expr))
    }
}

fn enforcement_clause(vector_db: &VectorDb, user: &str, groups: &[String]) -> Option<Value> {
    let mut should = Vec::with_capacity(2);
    if vector_db.user_enforcement {
        should.push(json!({"terms": object(USERS_FIELD, json!([user]))}));
    }
    if vector_db.group_enforcement && !groups.is_empty() {
        should.push(json!({"terms": object(GROUPS_FIELD, json!(groups))}));
    }

    match should.len() {
        0 => None,
        1 => should.pop(),
        _ => Some(json!({"bool": {"should": should}})),
    }
}

fn metadata_clause(filters: &MetadataFilters) -> Result<Option<Value>, FilterError> {
    let mut must = Vec::with_capacity(filters.len());
    for (key, criteria) in filters {
        if criteria.is_empty() {
            continue;
        }

        let field = keyword_field(key)?;
        let mut clauses = criteria
            .iter()
            .map(|c| criterion_clause(&field, c))
            .collect::<Result<Vec<_>, _>>()?;

        if clauses.len() == 1 {
            must.extend(clauses.pop());
            continue;
        }
        let combinator = if requires_all(criteria) {
            "must"
        } else {
            "should"
        };
        must.push(json!({"bool": object(combinator, Value::Array(clauses))}));
    }

    if must.is_empty() {
        return Ok(None);
    }
    Ok(Some(json!({"bool": {"must": must}})))
}

/// The key ends up inside a quoted painless string, so quotes and
/// backslashes are rejected instead of escaped.
fn keyword_field(key: &str) -> Result<String, FilterError> {
    if key.is_empty() || key.contains(['\'', '\\']) {
        return Err(FilterError::InvalidMetadataKey {
            key: key.to_string(),
            dialect: DIALECT,
        });
    }
    Ok(format!("metadata.metadata.{key}.keyword"))
}

/// `(field exists AND script matches) OR field does not exist`
fn criterion_clause(field: &str, criteria: &MetadataFilterCriteria) -> Result<Value, FilterError> {
    let op = Comparison::from_symbol(&criteria.operator, DIALECT)?;
    let source = format!("doc['{field}'].value {} {}", op.symbol(), criteria.value);

    Ok(json!({
        "bool": {
            "should": [
                {
                    "bool": {
                        "must": [
                            {"exists": {"field": field}},
                            {"script": {"script": {"source": source}}}
                        ]
                    }
                },
                {"bool": {"must_not": {"exists": {"field": field}}}}
            ]
        }
    }))
}
