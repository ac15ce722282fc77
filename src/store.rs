use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::codec::Row;
use crate::error::StoreError;
use crate::token;

/// A hosted document database: named collections of schemaless documents
/// with server-assigned IDs and creation timestamps.
///
/// The store is constructed once at startup and passed explicitly to the
/// upload pipeline; there is no process-global connection. Implementations
/// attach the `createdAt` timestamp themselves so it reflects server time,
/// not the uploader's clock.
pub trait DocumentStore: Send + Sync {
    /// Insert one document into `collection`, returning its assigned ID.
    fn insert_one(
        &self,
        collection: &str,
        fields: &Row,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;
}

/// Cloud Firestore client over its REST API.
///
/// Each insert is a single `documents:commit` call carrying an `update`
/// write with a client-generated 20-character auto-ID plus a field
/// transform setting `createdAt` to the server's request time.
pub struct FirestoreStore {
    client: reqwest::Client,
    project_id: String,
    api_key: String,
}

impl FirestoreStore {
    pub fn new(project_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        FirestoreStore {
            client: reqwest::Client::new(),
            project_id: project_id.into(),
            api_key: api_key.into(),
        }
    }

    fn document_name(&self, collection: &str, doc_id: &str) -> String {
        format!(
            "projects/{}/databases/(default)/documents/{}/{}",
            self.project_id, collection, doc_id
        )
    }

    fn commit_url(&self) -> String {
        format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents:commit?key={}",
            self.project_id, self.api_key
        )
    }
}

impl DocumentStore for FirestoreStore {
    async fn insert_one(&self, collection: &str, fields: &Row) -> Result<String, StoreError> {
        let doc_id = token::generate(token::DOC_ID_LEN);
        let name = self.document_name(collection, &doc_id);

        let typed: Map<String, Value> = fields
            .iter()
            .map(|(key, value)| (key.clone(), firestore_value(value)))
            .collect();

        let body = json!({
            "writes": [
                {
                    "update": { "name": name, "fields": typed },
                    "currentDocument": { "exists": false }
                },
                {
                    "transform": {
                        "document": name,
                        "fieldTransforms": [
                            { "fieldPath": "createdAt", "setToServerValue": "REQUEST_TIME" }
                        ]
                    }
                }
            ]
        });

        let response = self.client.post(self.commit_url()).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected(format!("{status} {detail}")));
        }

        Ok(doc_id)
    }
}

/// Map a JSON cell value onto Firestore's typed value encoding.
fn firestore_value(value: &Value) -> Value {
    match value {
        Value::String(s) => json!({ "stringValue": s }),
        // Firestore carries 64-bit integers as decimal strings.
        Value::Number(n) if n.is_i64() => json!({ "integerValue": n.to_string() }),
        Value::Number(n) => json!({ "doubleValue": n.as_f64() }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Null => json!({ "nullValue": "NULL_VALUE" }),
        other => json!({ "stringValue": other.to_string() }),
    }
}

/// In-process store keeping documents in a mutex-guarded map.
///
/// Backs the test suite and offline dry runs; `createdAt` is stamped with
/// the current UTC time in RFC 3339.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Snapshot of every document inserted into `collection`, in insertion
    /// order.
    pub fn documents(&self, collection: &str) -> Vec<Row> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, fields: &Row) -> Result<String, StoreError> {
        let doc_id = token::generate(token::DOC_ID_LEN);

        let mut document = fields.clone();
        document.insert(
            "createdAt".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );

        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(document);

        Ok(doc_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn firestore_values_are_typed() {
        assert_eq!(
            firestore_value(&json!("Jane")),
            json!({ "stringValue": "Jane" })
        );
        assert_eq!(
            firestore_value(&json!(42)),
            json!({ "integerValue": "42" })
        );
        assert_eq!(
            firestore_value(&json!(1.5)),
            json!({ "doubleValue": 1.5 })
        );
        assert_eq!(
            firestore_value(&json!(true)),
            json!({ "booleanValue": true })
        );
    }

    #[tokio::test]
    async fn memory_store_records_documents_with_created_at() {
        let store = MemoryStore::new();

        let mut fields = Row::new();
        fields.insert("Intern ID".to_string(), json!("I1"));

        let id = store.insert_one("interns", &fields).await.unwrap();
        assert_eq!(id.len(), token::DOC_ID_LEN);

        let docs = store.documents("interns");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["Intern ID"], json!("I1"));
        assert!(docs[0].contains_key("createdAt"));
    }
}
