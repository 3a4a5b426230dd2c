use crate::types::policy::VectorDb;

use super::{
    requires_all, Comparison, FilterError, FilterExpression, FilterExpressionSynthesizer,
    MetadataFilterCriteria, MetadataFilters,
};

const DIALECT: &str = "milvus";

/// Renders Milvus boolean expressions over the `metadata` JSON field.
pub struct MilvusSynthesizer;

impl FilterExpressionSynthesizer for MilvusSynthesizer {
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
            (Some(enforcement), Some(metadata)) => format!("{enforcement} && {metadata}"),
            (Some(clause), None) | (None, Some(clause)) => clause,
            (None, None) => return Ok(FilterExpression::Empty),
        };
        Ok(FilterExpression::Text(expr))
    }
}

fn enforcement_clause(vector_db: &VectorDb, user: &str, groups: &[String]) -> Option<String> {
    let mut clauses = Vec::with_capacity(2);
    if vector_db.user_enforcement {
        clauses.push(format!(
            "array_contains({}, {})",
            field("users"),
            quote(user)
        ));
    }
    if vector_db.group_enforcement && !groups.is_empty() {
        let groups: Vec<String> = groups.iter().map(|g| quote(g)).collect();
        clauses.push(format!(
            "array_contains_any({}, [{}])",
            field("groups"),
            groups.join(", ")
        ));
    }

    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(format!("({})", clauses.join(" || "))),
    }
}

fn metadata_clause(filters: &MetadataFilters) -> Result<Option<String>, FilterError> {
    let mut fields = Vec::with_capacity(filters.len());
    for criteria in filters.values() {
        if criteria.is_empty() {
            continue;
        }

        let clauses = criteria
            .iter()
            .map(criterion_clause)
            .collect::<Result<Vec<_>, _>>()?;
        if clauses.len() == 1 {
            fields.extend(clauses);
            continue;
        }

        let joiner = if requires_all(criteria) {
            " && "
        } else {
            " || "
        };
        fields.push(format!("({})", clauses.join(joiner)));
    }

    if fields.is_empty() {
        return Ok(None);
    }
    Ok(Some(fields.join(" && ")))
}

fn criterion_clause(criteria: &MetadataFilterCriteria) -> Result<String, FilterError> {
    let op = Comparison::from_symbol(&criteria.operator, DIALECT)?;
    let field = field(&criteria.metadata_key);
    Ok(format!(
        "(not exists {field} || {field} {} {})",
        op.symbol(),
        criteria.value
    ))
}

fn field(key: &str) -> String {
    format!("metadata[{}]", quote(key))
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
