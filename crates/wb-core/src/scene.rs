//! In-memory scene model.
//!
//! Owns the authoritative block, card, stash and pinned collections for one
//! whiteboard. All mutation funnels through here; the persisted document is
//! only ever a snapshot taken by [`SceneModel::serialize`].
//!
//! Paint order is blocks first, then cards, each in insertion order, so the
//! last card is the topmost entity.

use crate::id::EntityId;
use crate::model::{
    Block, CURRENT_VERSION, Card, EntityKind, EntityRef, Point, Rect, StashCard,
    WhiteboardDocument,
};

#[derive(Debug, Clone, Default)]
pub struct SceneModel {
    blocks: Vec<Block>,
    cards: Vec<Card>,
    pinned_files: Vec<String>,
    stash: Vec<StashCard>,
}

impl SceneModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene from a loaded document. Card sizes are clamped and
    /// duplicate pinned paths and stash entries are dropped.
    pub fn from_document(doc: WhiteboardDocument) -> Self {
        let mut scene = Self::new();
        scene.replace(doc);
        scene
    }

    /// Replace every collection with the contents of `doc`.
    pub fn replace(&mut self, doc: WhiteboardDocument) {
        self.blocks = doc.blocks;
        self.cards = doc.cards;
        for card in &mut self.cards {
            card.clamp_size();
        }
        self.pinned_files.clear();
        for path in doc.pinned_files {
            self.pin(path);
        }
        self.stash.clear();
        for entry in doc.stash_cards {
            self.add_stash(entry);
        }
    }

    /// Snapshot the scene as a current-version document.
    pub fn serialize(&self) -> WhiteboardDocument {
        WhiteboardDocument {
            version: CURRENT_VERSION,
            blocks: self.blocks.clone(),
            cards: self.cards.clone(),
            pinned_files: self.pinned_files.clone(),
            stash_cards: self.stash.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.cards.is_empty()
    }

    // ─── Blocks ──────────────────────────────────────────────────────────

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: EntityId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn block_mut(&mut self, id: EntityId) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    pub fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn remove_block(&mut self, id: EntityId) -> Option<Block> {
        let idx = self.blocks.iter().position(|b| b.id == id)?;
        Some(self.blocks.remove(idx))
    }

    // ─── Cards ───────────────────────────────────────────────────────────

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card(&self, id: EntityId) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn card_mut(&mut self, id: EntityId) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.id == id)
    }

    pub fn add_card(&mut self, mut card: Card) {
        card.clamp_size();
        self.cards.push(card);
    }

    pub fn remove_card(&mut self, id: EntityId) -> Option<Card> {
        let idx = self.cards.iter().position(|c| c.id == id)?;
        Some(self.cards.remove(idx))
    }

    // ─── Stash ───────────────────────────────────────────────────────────

    pub fn stash(&self) -> &[StashCard] {
        &self.stash
    }

    pub fn stash_entry(&self, id: EntityId) -> Option<&StashCard> {
        self.stash.iter().find(|s| s.id == id)
    }

    pub fn stash_entry_mut(&mut self, id: EntityId) -> Option<&mut StashCard> {
        self.stash.iter_mut().find(|s| s.id == id)
    }

    pub fn stash_by_path(&self, file_path: &str) -> Option<&StashCard> {
        self.stash.iter().find(|s| s.file_path == file_path)
    }

    /// Add a stash entry. Returns `false` when the path is already stashed.
    pub fn add_stash(&mut self, entry: StashCard) -> bool {
        if self.stash_by_path(&entry.file_path).is_some() {
            return false;
        }
        self.stash.push(entry);
        true
    }

    pub fn remove_stash(&mut self, id: EntityId) -> Option<StashCard> {
        let idx = self.stash.iter().position(|s| s.id == id)?;
        Some(self.stash.remove(idx))
    }

    // ─── Pinned ──────────────────────────────────────────────────────────

    pub fn pinned_files(&self) -> &[String] {
        &self.pinned_files
    }

    /// Pin a path. Returns `false` if it was already pinned.
    pub fn pin(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if path.is_empty() || self.pinned_files.contains(&path) {
            return false;
        }
        self.pinned_files.push(path);
        true
    }

    pub fn unpin(&mut self, path: &str) -> bool {
        let before = self.pinned_files.len();
        self.pinned_files.retain(|p| p != path);
        self.pinned_files.len() != before
    }

    /// Replace a pinned path in place. Returns `false` if `old` was not
    /// pinned; if `new` is already pinned the old entry is just dropped.
    pub fn rename_pinned(&mut self, old: &str, new: &str) -> bool {
        if old == new {
            return self.pinned_files.iter().any(|p| p == old);
        }
        let Some(idx) = self.pinned_files.iter().position(|p| p == old) else {
            return false;
        };
        if self.pinned_files.iter().any(|p| p == new) {
            self.pinned_files.remove(idx);
        } else {
            self.pinned_files[idx] = new.to_string();
        }
        true
    }

    // ─── Spatial access ──────────────────────────────────────────────────

    pub fn contains(&self, entity: EntityRef) -> bool {
        match entity.kind {
            EntityKind::Block => self.block(entity.id).is_some(),
            EntityKind::Card => self.card(entity.id).is_some(),
        }
    }

    pub fn position(&self, entity: EntityRef) -> Option<Point> {
        match entity.kind {
            EntityKind::Block => self.block(entity.id).map(Block::position),
            EntityKind::Card => self.card(entity.id).map(Card::position),
        }
    }

    /// Move an entity. Returns `false` for unknown ids.
    pub fn set_position(&mut self, entity: EntityRef, to: Point) -> bool {
        if !to.x.is_finite() || !to.y.is_finite() {
            return false;
        }
        match entity.kind {
            EntityKind::Block => self.block_mut(entity.id).map(|b| {
                b.x = to.x;
                b.y = to.y;
            }),
            EntityKind::Card => self.card_mut(entity.id).map(|c| {
                c.x = to.x;
                c.y = to.y;
            }),
        }
        .is_some()
    }

    pub fn bounds(&self, entity: EntityRef) -> Option<Rect> {
        match entity.kind {
            EntityKind::Block => self.block(entity.id).map(Block::bounds),
            EntityKind::Card => self.card(entity.id).map(Card::bounds),
        }
    }

    /// Every on-canvas entity with its bounding box, in paint order.
    pub fn entity_bounds(&self) -> impl DoubleEndedIterator<Item = (EntityRef, Rect)> + '_ {
        self.blocks
            .iter()
            .map(|b| (EntityRef::block(b.id), b.bounds()))
            .chain(self.cards.iter().map(|c| (EntityRef::card(c.id), c.bounds())))
    }

    pub fn remove(&mut self, entity: EntityRef) -> bool {
        match entity.kind {
            EntityKind::Block => self.remove_block(entity.id).is_some(),
            EntityKind::Card => self.remove_card(entity.id).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CARD_MIN_HEIGHT, CARD_MIN_WIDTH};
    use pretty_assertions::assert_eq;

    fn card(id: &str, path: &str) -> Card {
        Card::new(
            EntityId::intern(id),
            path,
            Rect::new(10.0, 20.0, 300.0, 200.0),
            1,
        )
    }

    #[test]
    fn serialize_stamps_current_version() {
        let mut doc = WhiteboardDocument::default();
        doc.version = 1;
        let scene = SceneModel::from_document(doc);
        assert_eq!(scene.serialize().version, CURRENT_VERSION);
    }

    #[test]
    fn loaded_cards_are_clamped() {
        let mut small = card("scene_small", "a.md");
        small.width = 10.0;
        small.height = 10.0;
        let doc = WhiteboardDocument {
            cards: vec![small],
            ..WhiteboardDocument::default()
        };
        let scene = SceneModel::from_document(doc);
        let c = &scene.cards()[0];
        assert_eq!((c.width, c.height), (CARD_MIN_WIDTH, CARD_MIN_HEIGHT));
    }

    #[test]
    fn pinned_files_are_duplicate_free() {
        let mut scene = SceneModel::new();
        assert!(scene.pin("a.md"));
        assert!(!scene.pin("a.md"));
        assert!(scene.pin("b.md"));
        assert_eq!(scene.pinned_files(), &["a.md".to_string(), "b.md".to_string()]);
        assert!(scene.unpin("a.md"));
        assert!(!scene.unpin("a.md"));
    }

    #[test]
    fn stash_rejects_duplicate_paths() {
        let mut scene = SceneModel::new();
        assert!(scene.add_stash(StashCard::detached(EntityId::intern("s1"), "x.md", 0)));
        assert!(!scene.add_stash(StashCard::detached(EntityId::intern("s2"), "x.md", 0)));
        assert_eq!(scene.stash().len(), 1);
    }

    #[test]
    fn set_position_on_unknown_id_is_false() {
        let mut scene = SceneModel::new();
        let ghost = EntityRef::block(EntityId::intern("ghost"));
        assert!(!scene.set_position(ghost, Point::new(1.0, 1.0)));
        assert_eq!(scene.position(ghost), None);
    }

    #[test]
    fn paint_order_puts_cards_last() {
        let mut scene = SceneModel::new();
        scene.add_card(card("scene_c", "c.md"));
        scene.add_block(Block::new(EntityId::intern("scene_b"), 0.0, 0.0));
        let kinds: Vec<_> = scene.entity_bounds().map(|(r, _)| r.kind).collect();
        assert_eq!(kinds, vec![EntityKind::Block, EntityKind::Card]);
    }
}
