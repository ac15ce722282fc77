use std::collections::HashMap;

use log::warn;
use serde_json::Value;

use crate::codec::{self, Row};
use crate::error::CodecError;
use crate::pipeline::{self, TokenRecord};

/// Join original rows with their generated tokens and append the
/// verification columns.
///
/// The join is by row identity; when identities repeat the last token wins,
/// and a row with no matching token exports an empty `Token` and a
/// verification link with an empty `token` parameter. Both conditions are
/// logged loudly since they usually mean the identity column is missing or
/// duplicated in the source file.
pub fn assemble(rows: &[Row], tokens: &[TokenRecord], base_url: &str) -> Vec<Row> {
    let mut lookup: HashMap<&str, &str> = HashMap::with_capacity(tokens.len());
    for record in tokens {
        if record.identity.is_empty() {
            warn!("token record has an empty row identity; its token may export blank");
        }
        if lookup
            .insert(record.identity.as_str(), record.token.as_str())
            .is_some()
        {
            warn!(
                "duplicate row identity {:?}; keeping the last token generated for it",
                record.identity
            );
        }
    }

    let base_url = base_url.trim();

    rows.iter()
        .map(|row| {
            let identity = pipeline::row_identity(row);
            let token = lookup.get(identity.as_str()).copied().unwrap_or("");

            let mut export = row.clone();
            export.insert("Token".to_string(), Value::String(token.to_string()));
            export.insert(
                "Verification Link".to_string(),
                Value::String(format!("{base_url}?token={}", urlencoding::encode(token))),
            );
            export
        })
        .collect()
}

/// Assemble the export rows and encode them as a downloadable workbook.
pub fn to_xlsx(
    rows: &[Row],
    tokens: &[TokenRecord],
    base_url: &str,
) -> Result<Vec<u8>, CodecError> {
    codec::encode(&assemble(rows, tokens, base_url))
}

/// Download filename for a given destination collection.
pub fn filename(collection: &str) -> String {
    format!("Intern_Data_With_Tokens_{}.xlsx", collection.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: &str) -> Row {
        let mut row = Row::new();
        row.insert("Intern ID".to_string(), json!(id));
        row
    }

    fn record(identity: &str, token: &str) -> TokenRecord {
        TokenRecord {
            identity: identity.to_string(),
            token: token.to_string(),
        }
    }

    #[test]
    fn joins_tokens_by_identity() {
        let rows = vec![row("A1"), row("A2")];
        let tokens = vec![record("A1", "tok1")];

        let export = assemble(&rows, &tokens, "https://x.example/cert");

        assert_eq!(export[0]["Token"], json!("tok1"));
        assert_eq!(
            export[0]["Verification Link"],
            json!("https://x.example/cert?token=tok1")
        );
        // A2 never got a token: empty Token, empty token parameter.
        assert_eq!(export[1]["Token"], json!(""));
        assert_eq!(
            export[1]["Verification Link"],
            json!("https://x.example/cert?token=")
        );
    }

    #[test]
    fn duplicate_identities_keep_the_last_token() {
        let rows = vec![row("A1")];
        let tokens = vec![record("A1", "first"), record("A1", "second")];

        let export = assemble(&rows, &tokens, "https://x.example/cert");
        assert_eq!(export[0]["Token"], json!("second"));
    }

    #[test]
    fn original_columns_come_before_the_appended_ones() {
        let mut source = row("A1");
        source.insert("Full Name".to_string(), json!("Jane"));

        let export = assemble(&[source], &[record("A1", "t")], "https://x.example/cert");
        let keys: Vec<&str> = export[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["Intern ID", "Full Name", "Token", "Verification Link"]);
    }

    #[test]
    fn filename_embeds_the_collection() {
        assert_eq!(
            filename("interns_2024"),
            "Intern_Data_With_Tokens_interns_2024.xlsx"
        );
    }
}
