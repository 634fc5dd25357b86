//! Builders for the serialized filter/sort/pagination expressions consumed by
//! the remote document store.
//!
//! Each builder returns a JSON-encoded `{method, attribute, values}` object.
//! Operator names are a wire contract and must match the backend exactly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single query operation in its wire form.
///
/// `values` is always list-shaped or absent: scalar inputs are wrapped in a
/// singleton list at build time, lists pass through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

impl Query {
    fn build(method: &str, attribute: Option<&str>, values: Option<Vec<Value>>) -> String {
        let query = Query {
            method: method.to_string(),
            attribute: attribute.map(str::to_string),
            values,
        };
        // Serializing a string/Value-only struct cannot fail.
        serde_json::to_string(&query).unwrap()
    }

    /// Decodes a serialized query back into its `(method, attribute, values)`
    /// triple. Round-trips anything produced by the builders below.
    pub fn parse(encoded: &str) -> Result<Query, serde_json::Error> {
        serde_json::from_str(encoded)
    }

    fn normalize(value: Value) -> Vec<Value> {
        match value {
            Value::Array(items) => items,
            other => vec![other],
        }
    }

    pub fn equal(attribute: &str, value: impl Into<Value>) -> String {
        Self::build("equal", Some(attribute), Some(Self::normalize(value.into())))
    }

    pub fn not_equal(attribute: &str, value: impl Into<Value>) -> String {
        Self::build("notEqual", Some(attribute), Some(Self::normalize(value.into())))
    }

    pub fn less_than(attribute: &str, value: impl Into<Value>) -> String {
        Self::build("lessThan", Some(attribute), Some(Self::normalize(value.into())))
    }

    pub fn less_than_equal(attribute: &str, value: impl Into<Value>) -> String {
        Self::build(
            "lessThanEqual",
            Some(attribute),
            Some(Self::normalize(value.into())),
        )
    }

    pub fn greater_than(attribute: &str, value: impl Into<Value>) -> String {
        Self::build(
            "greaterThan",
            Some(attribute),
            Some(Self::normalize(value.into())),
        )
    }

    pub fn greater_than_equal(attribute: &str, value: impl Into<Value>) -> String {
        Self::build(
            "greaterThanEqual",
            Some(attribute),
            Some(Self::normalize(value.into())),
        )
    }

    pub fn search(attribute: &str, value: impl Into<Value>) -> String {
        Self::build("search", Some(attribute), Some(Self::normalize(value.into())))
    }

    pub fn is_null(attribute: &str) -> String {
        Self::build("isNull", Some(attribute), None)
    }

    pub fn is_not_null(attribute: &str) -> String {
        Self::build("isNotNull", Some(attribute), None)
    }

    pub fn between(attribute: &str, start: impl Into<Value>, end: impl Into<Value>) -> String {
        Self::build("between", Some(attribute), Some(vec![start.into(), end.into()]))
    }

    pub fn starts_with(attribute: &str, value: impl Into<Value>) -> String {
        Self::build(
            "startsWith",
            Some(attribute),
            Some(Self::normalize(value.into())),
        )
    }

    pub fn ends_with(attribute: &str, value: impl Into<Value>) -> String {
        Self::build(
            "endsWith",
            Some(attribute),
            Some(Self::normalize(value.into())),
        )
    }

    pub fn contains(attribute: &str, value: impl Into<Value>) -> String {
        Self::build("contains", Some(attribute), Some(Self::normalize(value.into())))
    }

    pub fn select(attributes: &[&str]) -> String {
        let values = attributes
            .iter()
            .map(|a| Value::String((*a).to_string()))
            .collect();
        Self::build("select", None, Some(values))
    }

    pub fn order_asc(attribute: &str) -> String {
        Self::build("orderAsc", Some(attribute), None)
    }

    pub fn order_desc(attribute: &str) -> String {
        Self::build("orderDesc", Some(attribute), None)
    }

    pub fn cursor_before(document_id: &str) -> String {
        Self::build(
            "cursorBefore",
            None,
            Some(vec![Value::String(document_id.to_string())]),
        )
    }

    pub fn cursor_after(document_id: &str) -> String {
        Self::build(
            "cursorAfter",
            None,
            Some(vec![Value::String(document_id.to_string())]),
        )
    }

    pub fn limit(limit: u64) -> String {
        Self::build("limit", None, Some(vec![Value::from(limit)]))
    }

    pub fn offset(offset: u64) -> String {
        Self::build("offset", None, Some(vec![Value::from(offset)]))
    }

    /// Logical union of already-serialized queries. Queries are values of
    /// other queries here, which is what makes composition possible.
    pub fn or(queries: Vec<String>) -> String {
        Self::build("or", None, Some(queries.into_iter().map(Value::String).collect()))
    }

    /// Logical conjunction of already-serialized queries.
    pub fn and(queries: Vec<String>) -> String {
        Self::build("and", None, Some(queries.into_iter().map(Value::String).collect()))
    }
}
