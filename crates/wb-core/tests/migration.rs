//! Integration tests: loading and migrating persisted whiteboard documents.

use pretty_assertions::assert_eq;
use wb_core::migrate::{migrate, parse_document, to_pretty_json};
use wb_core::model::*;
use wb_core::{EntityId, SceneModel};

const NOW: i64 = 1_750_000_000_000;

fn load(text: &str) -> WhiteboardDocument {
    parse_document(text, NOW).unwrap()
}

// ─── Version 0 ──────────────────────────────────────────────────────────

#[test]
fn v0_document_is_upgraded_to_current() {
    let doc = load(include_str!("fixtures/v0.json"));

    assert_eq!(doc.version, CURRENT_VERSION);
    assert_eq!(doc.version, 2);
    assert!(doc.pinned_files.is_empty());
    assert!(doc.stash_cards.is_empty());
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(doc.cards.len(), 1);
    assert!(doc.cards.iter().all(|c| c.last_modified == NOW));
}

#[test]
fn v0_keeps_entity_fields() {
    let doc = load(include_str!("fixtures/v0.json"));
    let card = &doc.cards[0];
    assert_eq!(card.id, EntityId::intern("card_1"));
    assert_eq!((card.x, card.y, card.width, card.height), (300.0, 40.0, 320.0, 240.0));
    assert_eq!(card.file_path, "notes/plan.md");
    assert_eq!(doc.blocks[0].text, "Ideas");
    assert_eq!(doc.blocks[0].color.as_deref(), Some("#2563eb"));
}

// ─── Version 1 ──────────────────────────────────────────────────────────

#[test]
fn v1_fills_only_missing_timestamps() {
    let doc = load(include_str!("fixtures/v1.json"));
    let stamps: Vec<i64> = doc.cards.iter().map(|c| c.last_modified).collect();
    assert_eq!(stamps, vec![NOW, 1_600_000_000_000]);
}

// ─── Current version ────────────────────────────────────────────────────

#[test]
fn current_version_passes_through_unchanged() {
    let text = include_str!("fixtures/v2.json");
    let doc = load(text);

    let raw: serde_json::Value = serde_json::from_str(text).unwrap();
    let direct: WhiteboardDocument = serde_json::from_value(raw).unwrap();
    assert_eq!(doc, direct);
}

#[test]
fn migrating_twice_is_idempotent() {
    let once = load(include_str!("fixtures/v0.json"));
    let again = migrate(Some(serde_json::to_value(&once).unwrap()), NOW + 1_000);
    assert_eq!(again, once);
}

#[test]
fn stash_geometry_survives_load() {
    let doc = load(include_str!("fixtures/v2.json"));
    let with_origin = &doc.stash_cards[0];
    let without = &doc.stash_cards[1];
    assert_eq!(
        with_origin.original_geometry(),
        Some(Rect::new(100.0, 50.0, 300.0, 200.0))
    );
    assert_eq!(without.original_geometry(), None);
}

// ─── Newer than current ─────────────────────────────────────────────────

#[test]
fn newer_version_reads_known_fields() {
    let doc = load(include_str!("fixtures/future.json"));
    assert_eq!(doc.version, CURRENT_VERSION);
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(doc.blocks[0].text, "from the future");
}

// ─── Writing ────────────────────────────────────────────────────────────

#[test]
fn written_document_reloads_identically() {
    let doc = load(include_str!("fixtures/v2.json"));
    let scene = SceneModel::from_document(doc.clone());
    let text = to_pretty_json(&scene.serialize()).unwrap();

    assert!(text.starts_with("{\n  \"version\": 2,"));
    assert_eq!(load(&text), doc);
}
