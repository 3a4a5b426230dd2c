mod cortex;
mod milvus;
mod opensearch;

pub mod criteria;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::policy::{VectorDb, VectorDbType};

pub use cortex::CortexSynthesizer;
pub use criteria::{build_metadata_filters, MetadataFilterCriteria, MetadataFilters, MetadataValue};
pub use milvus::MilvusSynthesizer;
pub use opensearch::OpenSearchSynthesizer;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    #[error("unsupported operator '{operator}' in {dialect} filter")]
    UnsupportedOperator {
        operator: String,
        dialect: &'static str,
    },

    #[error("metadata key '{key}' cannot be used in a {dialect} filter")]
    InvalidMetadataKey { key: String, dialect: &'static str },
}

/// A dialect native predicate handed to a vector store. `Empty` means the
/// query is not restricted at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterExpression {
    #[default]
    Empty,
    Text(String),
    Json(Value),
}

impl FilterExpression {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            Self::Json(_) => false,
        }
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

/// Turns the requester plus normalized metadata criteria into a filter
/// expression for one vector store dialect.
///
/// Every implementation must be deterministic: equal input renders equal
/// output, byte for byte.
pub trait FilterExpressionSynthesizer: Send + Sync {
    /// # Arguments
    /// * `vector_db` - Target vector db, its enforcement flags add clauses
    /// * `user` - The requesting user id
    /// * `groups` - Groups of the requesting user
    /// * `filters` - Criteria from `build_metadata_filters`
    ///
    /// # Returns
    /// * The expression, empty when nothing restricts the requester
    fn create_filter_expression(
        &self,
        vector_db: &VectorDb,
        user: &str,
        groups: &[String],
        filters: &MetadataFilters,
    ) -> Result<FilterExpression, FilterError>;
}

/// The fixed set of supported dialects, selected by vector db type.
pub enum UnionSynthesizer {
    OpenSearch(OpenSearchSynthesizer),
    Milvus(MilvusSynthesizer),
    Cortex(CortexSynthesizer),
}

impl From<VectorDbType> for UnionSynthesizer {
    fn from(db_type: VectorDbType) -> Self {
        match db_type {
            VectorDbType::OpenSearch => Self::OpenSearch(OpenSearchSynthesizer),
            VectorDbType::Milvus => Self::Milvus(MilvusSynthesizer),
            VectorDbType::SnowflakeCortex => Self::Cortex(CortexSynthesizer),
        }
    }
}

impl FilterExpressionSynthesizer for UnionSynthesizer {
    fn create_filter_expression(
        &self,
        vector_db: &VectorDb,
        user: &str,
        groups: &[String],
        filters: &MetadataFilters,
    ) -> Result<FilterExpression, FilterError> {
        match self {
            Self::OpenSearch(s) => s.create_filter_expression(vector_db, user, groups, filters),
            Self::Milvus(s) => s.create_filter_expression(vector_db, user, groups, filters),
            Self::Cortex(s) => s.create_filter_expression(vector_db, user, groups, filters),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Comparison {
    Eq,
    Ne,
}

impl Comparison {
    pub(crate) fn from_symbol(symbol: &str, dialect: &'static str) -> Result<Self, FilterError> {
        match symbol {
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            _ => Err(FilterError::UnsupportedOperator {
                operator: symbol.to_string(),
                dialect,
            }),
        }
    }

    pub(crate) fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    pub(crate) fn negate(&self) -> Self {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
        }
    }
}

/// Criteria for one field are ANDed as soon as one of them is negative, so a
/// negative match cannot be overridden by a positive one.
pub(crate) fn requires_all(criteria: &[MetadataFilterCriteria]) -> bool {
    criteria.iter().any(|c| c.operator == Comparison::Ne.symbol())
}

pub(crate) fn object(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}
