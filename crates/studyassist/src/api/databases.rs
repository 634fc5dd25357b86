//! Document-store helpers layered over [`ApiClient::call`].

use super::client::ApiClient;
use super::error::ApiError;
use super::params::{Param, Params};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Paged list envelope returned by document list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentList<T> {
    #[serde(default)]
    pub total: u64,
    pub documents: Vec<T>,
}

const JSON_CONTENT_TYPE: (&str, &str) = ("content-type", "application/json");

fn json_headers() -> Vec<(String, String)> {
    vec![(JSON_CONTENT_TYPE.0.to_string(), JSON_CONTENT_TYPE.1.to_string())]
}

fn documents_path(database_id: &str, collection_id: &str) -> String {
    format!("/databases/{database_id}/collections/{collection_id}/documents")
}

fn document_path(database_id: &str, collection_id: &str, document_id: &str) -> String {
    format!("/databases/{database_id}/collections/{collection_id}/documents/{document_id}")
}

impl ApiClient {
    /// Lists documents matched by the serialized `queries`.
    pub async fn list_documents<T: DeserializeOwned>(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: Vec<String>,
    ) -> Result<DocumentList<T>, ApiError> {
        let mut params = Params::new();
        params.insert(
            "queries".to_string(),
            Param::List(queries.into_iter().map(Value::String).collect()),
        );
        self.call(
            Method::GET,
            &documents_path(database_id, collection_id),
            &params,
            &[],
        )
        .await
    }

    /// Fetches a single document by ID. A missing document surfaces as the
    /// remote not-found error.
    pub async fn get_document<T: DeserializeOwned>(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<T, ApiError> {
        self.call(
            Method::GET,
            &document_path(database_id, collection_id, document_id),
            &Params::new(),
            &[],
        )
        .await
    }

    /// Creates or replaces a document by ID.
    pub async fn upsert_document<T: DeserializeOwned>(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Map<String, Value>,
        permissions: Vec<String>,
    ) -> Result<T, ApiError> {
        let mut params = Params::new();
        params.insert("documentId".to_string(), Param::string(document_id));
        params.insert("data".to_string(), Param::Map(data));
        params.insert(
            "permissions".to_string(),
            Param::List(permissions.into_iter().map(Value::String).collect()),
        );
        self.call(
            Method::PUT,
            &document_path(database_id, collection_id, document_id),
            &params,
            &json_headers(),
        )
        .await
    }

    pub async fn delete_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<(), ApiError> {
        self.call(
            Method::DELETE,
            &document_path(database_id, collection_id, document_id),
            &Params::new(),
            &json_headers(),
        )
        .await
    }
}
