use log::{debug, warn};
use serde_json::Value;

use crate::codec::Row;
use crate::error::UploadError;
use crate::store::DocumentStore;
use crate::token;

/// Column whose value identifies a row across upload and export.
pub const IDENTITY_COLUMN: &str = "Intern ID";

/// One row's identity paired with the token generated for it. The token is
/// never re-derivable; losing this record before export loses the mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub identity: String,
    pub token: String,
}

/// Upload every row to the destination collection, one insert at a time.
///
/// Each row gets a freshly generated 24-character token attached before it
/// is submitted; the store adds the server-assigned `createdAt`. Inserts
/// are strictly sequential, each awaited before the next begins. The first
/// failed insert aborts the run: completed inserts stay in the store, no
/// further rows are attempted, and the store's error is returned. There is
/// no retry and no rollback.
///
/// # Arguments
/// * `store` - Destination document store
/// * `collection` - Destination collection name (must be non-empty)
/// * `base_url` - Verification base URL (must be non-empty; consumed later
///   by the export step)
/// * `rows` - Decoded spreadsheet rows (must be non-empty)
///
/// # Returns
/// * `Result<Vec<TokenRecord>, UploadError>` - One record per inserted row,
///   in original row order
pub async fn run<S: DocumentStore>(
    store: &S,
    collection: &str,
    base_url: &str,
    rows: &[Row],
) -> Result<Vec<TokenRecord>, UploadError> {
    if collection.trim().is_empty() {
        warn!("upload rejected: no collection name");
        return Err(UploadError::Validation("Please enter a collection name"));
    }
    if base_url.trim().is_empty() {
        warn!("upload rejected: no verification base URL");
        return Err(UploadError::Validation(
            "Please enter a verification base URL",
        ));
    }
    if rows.is_empty() {
        warn!("upload rejected: no rows");
        return Err(UploadError::Validation("No spreadsheet data to upload"));
    }

    let collection = collection.trim();
    let mut tokens = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let row_token = token::generate(token::ROW_TOKEN_LEN);

        let mut document = row.clone();
        document.insert("token".to_string(), Value::String(row_token.clone()));

        match store.insert_one(collection, &document).await {
            Ok(doc_id) => {
                debug!("inserted row {} into {collection} as {doc_id}", i + 1);
            }
            Err(err) => {
                warn!(
                    "insert for row {} of {} failed, aborting run: {err}",
                    i + 1,
                    rows.len()
                );
                return Err(err.into());
            }
        }

        tokens.push(TokenRecord {
            identity: row_identity(row),
            token: row_token,
        });
    }

    Ok(tokens)
}

/// The row's value under the identity column, as text. Missing column
/// yields an empty identity.
pub fn row_identity(row: &Row) -> String {
    match row.get(IDENTITY_COLUMN) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_rows(n: usize) -> Vec<Row> {
        (1..=n)
            .map(|i| {
                let mut row = Row::new();
                row.insert("Intern ID".to_string(), json!(format!("I{i}")));
                row.insert("Full Name".to_string(), json!(format!("Intern {i}")));
                row
            })
            .collect()
    }

    /// Store that fails every insert starting at `fail_from` (1-indexed).
    struct FlakyStore {
        inner: MemoryStore,
        fail_from: usize,
        calls: AtomicUsize,
    }

    impl FlakyStore {
        fn new(fail_from: usize) -> Self {
            FlakyStore {
                inner: MemoryStore::new(),
                fail_from,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl DocumentStore for FlakyStore {
        async fn insert_one(&self, collection: &str, fields: &Row) -> Result<String, StoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.fail_from {
                return Err(StoreError::Rejected("connection reset".to_string()));
            }
            self.inner.insert_one(collection, fields).await
        }
    }

    #[tokio::test]
    async fn uploads_every_row_in_order() {
        let store = MemoryStore::new();
        let rows = sample_rows(3);

        let tokens = run(&store, "interns_2024", "https://x.example/cert", &rows)
            .await
            .unwrap();

        assert_eq!(tokens.len(), 3);
        let ids: Vec<&str> = tokens.iter().map(|t| t.identity.as_str()).collect();
        assert_eq!(ids, ["I1", "I2", "I3"]);
        assert!(tokens.iter().all(|t| t.token.len() == 24));

        let docs = store.documents("interns_2024");
        assert_eq!(docs.len(), 3);
        for (doc, row) in docs.iter().zip(&rows) {
            assert_eq!(doc["Intern ID"], row["Intern ID"]);
            assert_eq!(doc["Full Name"], row["Full Name"]);
            assert_eq!(doc["token"].as_str().unwrap().len(), 24);
            assert!(doc.contains_key("createdAt"));
        }
    }

    #[tokio::test]
    async fn failure_midway_keeps_earlier_inserts_and_stops() {
        let store = FlakyStore::new(3);
        let rows = sample_rows(5);

        let err = run(&store, "interns", "https://x.example/cert", &rows)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Store(_)));
        // Rows 1 and 2 made it; row 3 failed; rows 4 and 5 never attempted.
        assert_eq!(store.inner.documents("interns").len(), 2);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn validation_runs_before_any_remote_call() {
        let store = FlakyStore::new(1);
        let rows = sample_rows(2);

        let err = run(&store, "  ", "https://x.example/cert", &rows)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploadError::Validation("Please enter a collection name")
        ));

        let err = run(&store, "interns", "", &rows).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::Validation("Please enter a verification base URL")
        ));

        let err = run(&store, "interns", "https://x.example/cert", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploadError::Validation("No spreadsheet data to upload")
        ));

        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn collection_name_is_trimmed_before_use() {
        let store = MemoryStore::new();
        let rows = sample_rows(1);

        run(&store, " interns ", "https://x.example/cert", &rows)
            .await
            .unwrap();

        assert_eq!(store.documents("interns").len(), 1);
    }

    #[test]
    fn identity_falls_back_to_empty() {
        let row = Row::new();
        assert_eq!(row_identity(&row), "");

        let mut row = Row::new();
        row.insert("Intern ID".to_string(), json!(42));
        assert_eq!(row_identity(&row), "42");
    }
}
