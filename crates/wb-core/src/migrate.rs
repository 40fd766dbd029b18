//! Forward-only schema migration.
//!
//! Version history:
//! - v0: no `version` field, only `blocks` and `cards`.
//! - v1: `version` added.
//! - v2: cards carry `lastModified`; `pinnedFiles` and `stashCards` added.
//!
//! Migration works on the raw JSON value so that each step can fill in the
//! fields its version introduced, then the result is read entry by entry:
//! a malformed block or card is dropped with a warning instead of failing
//! the whole document.

use crate::model::{Block, CURRENT_VERSION, Card, StashCard, WhiteboardDocument};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Migrate a raw persisted value to the current schema.
///
/// `None`, `null` and non-object values yield the empty document. Data
/// written by a newer version is read as if it were current.
pub fn migrate(raw: Option<Value>, now_ms: i64) -> WhiteboardDocument {
    let Some(Value::Object(mut state)) = raw else {
        return WhiteboardDocument::default();
    };

    let version = state.get("version").and_then(Value::as_u64).unwrap_or(0);

    if version < 1 {
        log::info!("migrating whiteboard data from v0 to v1");
        let mut v1 = Map::new();
        v1.insert("version".into(), Value::from(1));
        v1.insert("blocks".into(), take_array(&mut state, "blocks"));
        v1.insert("cards".into(), take_array(&mut state, "cards"));
        state = v1;
    }

    if version < 2 {
        log::info!("migrating whiteboard data from v1 to v2");
        if let Some(Value::Array(cards)) = state.get_mut("cards") {
            for card in cards.iter_mut() {
                if let Value::Object(card) = card {
                    let has_timestamp = card
                        .get("lastModified")
                        .and_then(Value::as_f64)
                        .is_some_and(|t| t != 0.0);
                    if !has_timestamp {
                        card.insert("lastModified".into(), Value::from(now_ms));
                    }
                }
            }
        }
        state
            .entry("pinnedFiles")
            .or_insert_with(|| Value::Array(Vec::new()));
        state
            .entry("stashCards")
            .or_insert_with(|| Value::Array(Vec::new()));
        state.insert("version".into(), Value::from(2));
    }

    if version > u64::from(CURRENT_VERSION) {
        log::warn!(
            "whiteboard data version {version} is newer than {CURRENT_VERSION}; reading known fields only"
        );
    }

    WhiteboardDocument {
        version: CURRENT_VERSION,
        blocks: entries::<Block>(state.get("blocks"), "block"),
        cards: entries::<Card>(state.get("cards"), "card"),
        pinned_files: state
            .get("pinnedFiles")
            .and_then(Value::as_array)
            .map(|paths| {
                paths
                    .iter()
                    .filter_map(|p| p.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        stash_cards: entries::<StashCard>(state.get("stashCards"), "stash card"),
    }
}

/// Parse document text and migrate it. Blank text is the empty document.
pub fn parse_document(text: &str, now_ms: i64) -> Result<WhiteboardDocument, serde_json::Error> {
    if text.trim().is_empty() {
        return Ok(WhiteboardDocument::default());
    }
    let raw: Value = serde_json::from_str(text)?;
    Ok(migrate(Some(raw), now_ms))
}

/// Render a document the way it is written to disk: pretty JSON, version
/// stamped to current.
pub fn to_pretty_json(doc: &WhiteboardDocument) -> Result<String, serde_json::Error> {
    if doc.version == CURRENT_VERSION {
        return serde_json::to_string_pretty(doc);
    }
    let stamped = WhiteboardDocument {
        version: CURRENT_VERSION,
        ..doc.clone()
    };
    serde_json::to_string_pretty(&stamped)
}

fn take_array(state: &mut Map<String, Value>, key: &str) -> Value {
    match state.remove(key) {
        Some(Value::Array(items)) => Value::Array(items),
        _ => Value::Array(Vec::new()),
    }
}

fn entries<T: DeserializeOwned>(value: Option<&Value>, what: &str) -> Vec<T> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("skipping malformed {what}: {err}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_state_is_empty_document() {
        assert_eq!(migrate(None, 1), WhiteboardDocument::default());
        assert_eq!(migrate(Some(Value::Null), 1), WhiteboardDocument::default());
        assert_eq!(migrate(Some(json!([1, 2])), 1), WhiteboardDocument::default());
    }

    #[test]
    fn blank_text_is_empty_document() {
        let doc = parse_document("  \n\t", 5).unwrap();
        assert_eq!(doc, WhiteboardDocument::default());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_document("{ not json", 5).is_err());
    }

    #[test]
    fn zero_timestamp_is_refreshed_below_v2() {
        let doc = migrate(
            Some(json!({
                "version": 1,
                "blocks": [],
                "cards": [{"id": "c", "x": 0, "y": 0, "filePath": "a.md", "lastModified": 0}]
            })),
            99,
        );
        assert_eq!(doc.cards[0].last_modified, 99);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let doc = migrate(
            Some(json!({
                "version": 2,
                "blocks": [{"x": 1}, {"id": "ok", "x": 1, "y": 2, "text": "hi", "linkedFile": null}],
                "cards": [],
                "pinnedFiles": ["a.md", 7],
                "stashCards": []
            })),
            0,
        );
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].text, "hi");
        assert_eq!(doc.pinned_files, vec!["a.md".to_string()]);
    }
}
