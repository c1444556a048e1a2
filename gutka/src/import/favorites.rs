//! Legacy format B: a JSON document holding a flat list of favorites.
//!
//! ```json
//! {"favorites": [{"text": "...", "uid": "abc", "createdAt": "2019-05-01T10:00:00Z"}]}
//! ```
//!
//! `gurmukhi` and `snippet` are accepted for `text`, `id` for `uid`, and `date` or
//! `created` for `createdAt`. Uids are translated through the favorites lookup table.
//! Favorites are saved directly under the import root.

use chrono::{DateTime, Utc};
use gurbani::source::ShabadSource;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{
    Result,
    error::BackupError,
    import::{ImportContext, LineHint, PendingItem, SkipReason},
    library::FolderId,
    lookup::LookupTables,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteRecord {
    #[serde(default, alias = "gurmukhi", alias = "snippet")]
    text: String,
    #[serde(alias = "id", deserialize_with = "uid_string")]
    uid: String,
    #[serde(default, alias = "date", alias = "created")]
    created_at: Option<DateTime<Utc>>,
}

fn uid_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

fn favorites_list(bytes: &[u8]) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_slice(bytes).map_err(|source| BackupError::Decode {
        what: "favorites".to_string(),
        path: String::new(),
        source,
    })?;
    match value {
        Value::Object(mut fields) => match fields.remove("favorites") {
            Some(Value::Array(records)) => Ok(records),
            _ => Err(BackupError::UnsupportedFormat {
                message: "favorites document has no 'favorites' array".to_string(),
            }),
        },
        _ => Err(BackupError::UnsupportedFormat {
            message: "favorites document must be a JSON object".to_string(),
        }),
    }
}

/// Imports a format B file under a new import root. Returns the root id.
pub async fn import<S: ShabadSource>(
    bytes: &[u8],
    tables: &LookupTables,
    ctx: &mut ImportContext<'_, S>,
) -> Result<FolderId> {
    let records = favorites_list(bytes)?;
    let root = ctx.create_import_root(Utc::now())?;
    let total = records.len();
    for (position, record) in records.into_iter().enumerate() {
        ctx.check_cancel()?;
        let location = format!("favorites/{position}");
        let record: FavoriteRecord = match serde_json::from_value(record) {
            Ok(record) => record,
            Err(err) => {
                ctx.skip(
                    location,
                    SkipReason::MalformedNode {
                        detail: err.to_string(),
                    },
                );
                continue;
            }
        };
        let Some(shabad_id) = tables.favorite_uid(&record.uid) else {
            ctx.skip(location, SkipReason::UnknownId { id: record.uid });
            continue;
        };
        let line = if record.text.trim().is_empty() {
            LineHint::Default
        } else {
            LineHint::Text(record.text)
        };
        ctx.import_item(
            root,
            PendingItem {
                location,
                shabad_id,
                line,
                sort_index: i64::try_from(total - position).unwrap_or(i64::MAX),
                added_at: record.created_at,
            },
        )
        .await?;
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use gurbani::test_util::{StaticShabads, sample_shabad};

    use super::*;
    use crate::{
        cancel::CancelState,
        library::{Library, LibraryStore},
        progress::NoProgress,
    };

    #[test]
    fn record_aliases() {
        let record: FavoriteRecord = serde_json::from_str(
            r#"{"gurmukhi": "ਸਤਿ ਨਾਮੁ", "id": 17, "date": "2019-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(record.uid, "17");
        assert_eq!(record.text, "ਸਤਿ ਨਾਮੁ");
        assert!(record.created_at.is_some());
    }

    #[test]
    fn top_level_shape() {
        assert!(matches!(
            favorites_list(br#"[1, 2]"#),
            Err(BackupError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            favorites_list(br#"{"bookmarks": []}"#),
            Err(BackupError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            favorites_list(b"{oops"),
            Err(BackupError::Decode { .. })
        ));
        assert_eq!(favorites_list(br#"{"favorites": []}"#).unwrap().len(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn import_favorites_with_partial_failures() {
        let source = StaticShabads::new()
            .with(sample_shabad(7, &["ik oankar", "sat naam"]))
            .with(sample_shabad(8, &["one line"]));
        let tables = LookupTables::default()
            .with_favorite_uid("a", "7")
            .with_favorite_uid("b", "8");
        let bytes = br#"{"favorites": [
            {"text": "sat nam", "uid": "a", "createdAt": "2020-01-02T03:04:05Z"},
            {"text": "x", "uid": "unknown"},
            {"text": 5},
            {"snippet": "", "id": "b"}
        ]}"#;

        let mut library = Library::new();
        let store = LibraryStore::in_memory();
        let mut cancel = CancelState::never();
        let mut ctx = ImportContext::new(&mut library, &store, &source, &NoProgress, &mut cancel);
        let root = import(bytes, &tables, &mut ctx).await.unwrap();
        let report = ctx.finish();

        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].location, "favorites/1");
        assert!(matches!(report.skipped[1].reason, SkipReason::MalformedNode { .. }));

        let items = library.items(root).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].shabad.id(), 7);
        assert_eq!(items[0].selected_line(), Some(1));
        assert_eq!(items[0].added_at.to_rfc3339(), "2020-01-02T03:04:05+00:00");
        assert_eq!(items[1].shabad.id(), 8);
        assert_eq!(items[1].selected_line(), None);
    }
}
