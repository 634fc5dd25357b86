//! Request parameter union and its per-mode encodings.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// An in-memory file payload for uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InputFile {
    pub fn from_bytes(
        data: Vec<u8>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// Tagged request parameter. Each variant has a fixed encoding per transport
/// mode; encode sites match exhaustively so a new variant fails to compile
/// until every encoder handles it.
#[derive(Debug, Clone)]
pub enum Param {
    /// Binary payload; emitted only in multipart mode.
    File(InputFile),
    /// Repeated `key[]` entries in query mode, a JSON array in body mode.
    List(Vec<Value>),
    /// Scalar string value.
    String(String),
    /// Nested object; emitted only in JSON body mode.
    Map(Map<String, Value>),
}

impl Param {
    pub fn string(value: impl Into<String>) -> Self {
        Param::String(value.into())
    }

    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Param::List(values.into_iter().collect())
    }
}

/// Ordered parameter map; BTreeMap keeps request encodings deterministic.
pub type Params = BTreeMap<String, Param>;

pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flattens params into GET query pairs. List values become repeated `key[]`
/// entries; files and maps have no query representation and are skipped.
pub fn to_query_pairs(params: &Params) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, param) in params {
        match param {
            Param::String(value) => pairs.push((key.clone(), value.clone())),
            Param::List(values) => {
                for value in values {
                    pairs.push((format!("{key}[]"), scalar_to_string(value)));
                }
            }
            Param::File(_) | Param::Map(_) => {}
        }
    }
    pairs
}

/// Builds the JSON request body. Files are multipart-only and skipped here.
pub fn to_json_body(params: &Params) -> Map<String, Value> {
    let mut body = Map::new();
    for (key, param) in params {
        match param {
            Param::String(value) => {
                body.insert(key.clone(), Value::String(value.clone()));
            }
            Param::List(values) => {
                body.insert(key.clone(), Value::Array(values.clone()));
            }
            Param::Map(map) => {
                body.insert(key.clone(), Value::Object(map.clone()));
            }
            Param::File(_) => {}
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_params() -> Params {
        let mut params = Params::new();
        params.insert("name".to_string(), Param::string("abc"));
        params.insert(
            "queries".to_string(),
            Param::list([json!("q1"), json!("q2")]),
        );
        params.insert(
            "data".to_string(),
            Param::Map(json!({"uid": "u1"}).as_object().unwrap().clone()),
        );
        params.insert(
            "file".to_string(),
            Param::File(InputFile::from_bytes(vec![1, 2, 3], "a.bin", "application/octet-stream")),
        );
        params
    }

    #[test]
    fn test_query_pairs_repeat_list_keys() {
        let pairs = to_query_pairs(&sample_params());
        assert_eq!(
            pairs,
            vec![
                ("name".to_string(), "abc".to_string()),
                ("queries[]".to_string(), "q1".to_string()),
                ("queries[]".to_string(), "q2".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_pairs_stringify_non_string_scalars() {
        let mut params = Params::new();
        params.insert("ids".to_string(), Param::list([json!(7), json!(true)]));
        assert_eq!(
            to_query_pairs(&params),
            vec![
                ("ids[]".to_string(), "7".to_string()),
                ("ids[]".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_json_body_skips_files() {
        let body = to_json_body(&sample_params());
        assert_eq!(body.get("name"), Some(&json!("abc")));
        assert_eq!(body.get("queries"), Some(&json!(["q1", "q2"])));
        assert_eq!(body.get("data"), Some(&json!({"uid": "u1"})));
        assert!(!body.contains_key("file"));
    }
}
