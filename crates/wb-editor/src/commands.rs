//! Undo/Redo history for spatial edits.
//!
//! Only positions are tracked. A drag gesture is bracketed by
//! `begin_batch`/`end_batch`: the start positions of the dragged entities
//! are captured up front, and on release one `MoveAction` holding every
//! entity that actually moved is pushed. Size, color, text, link and
//! content changes never enter the history, and neither do file paths.

use smallvec::SmallVec;
use wb_core::SceneModel;
use wb_core::model::{EntityRef, Point};

/// Default history depth.
pub const MAX_UNDO_HISTORY: usize = 50;

/// One entity's position change within an action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveItem {
    pub entity: EntityRef,
    pub before: Point,
    pub after: Point,
}

/// A reversible group of position changes from a single gesture.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MoveAction {
    pub items: SmallVec<[MoveItem; 4]>,
}

impl MoveAction {
    pub fn entities(&self) -> Vec<EntityRef> {
        self.items.iter().map(|i| i.entity).collect()
    }
}

/// Bounded linear history: oldest actions are evicted past `max_depth`, and
/// recording a new action clears the redo stack.
pub struct CommandStack {
    undo_stack: Vec<MoveAction>,
    redo_stack: Vec<MoveAction>,
    max_depth: usize,
    /// Positions captured when the current batch started.
    batch_start: Option<SmallVec<[(EntityRef, Point); 4]>>,
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth),
            redo_stack: Vec::new(),
            max_depth,
            batch_start: None,
        }
    }

    /// Capture start positions for a drag over `entities`.
    pub fn begin_batch(&mut self, scene: &SceneModel, entities: &[EntityRef]) {
        let captured = entities
            .iter()
            .filter_map(|e| scene.position(*e).map(|p| (*e, p)))
            .collect();
        self.batch_start = Some(captured);
    }

    /// Drop the current batch without recording anything.
    pub fn discard_batch(&mut self) {
        self.batch_start = None;
    }

    pub fn is_batching(&self) -> bool {
        self.batch_start.is_some()
    }

    /// Close the batch. Pushes an action only if some entity moved; returns
    /// whether one was recorded.
    pub fn end_batch(&mut self, scene: &SceneModel) -> bool {
        let Some(start) = self.batch_start.take() else {
            return false;
        };
        let items: SmallVec<[MoveItem; 4]> = start
            .into_iter()
            .filter_map(|(entity, before)| {
                let after = scene.position(entity)?;
                (after != before).then_some(MoveItem {
                    entity,
                    before,
                    after,
                })
            })
            .collect();
        if items.is_empty() {
            return false;
        }
        self.push(MoveAction { items });
        true
    }

    /// Record an already-completed action.
    pub fn push(&mut self, action: MoveAction) {
        if action.items.is_empty() {
            return;
        }
        self.undo_stack.push(action);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    /// Restore every item's `before` position. Returns the touched entities.
    pub fn undo(&mut self, scene: &mut SceneModel) -> Option<Vec<EntityRef>> {
        let action = self.undo_stack.pop()?;
        for item in &action.items {
            scene.set_position(item.entity, item.before);
        }
        let touched = action.entities();
        self.redo_stack.push(action);
        Some(touched)
    }

    /// Re-apply every item's `after` position. Returns the touched entities.
    pub fn redo(&mut self, scene: &mut SceneModel) -> Option<Vec<EntityRef>> {
        let action = self.redo_stack.pop()?;
        for item in &action.items {
            scene.set_position(item.entity, item.after);
        }
        let touched = action.entities();
        self.undo_stack.push(action);
        Some(touched)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Most recent undoable action.
    pub fn peek_undo(&self) -> Option<&MoveAction> {
        self.undo_stack.last()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch_start = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wb_core::EntityId;
    use wb_core::model::Block;

    fn scene_with(ids: &[&str]) -> SceneModel {
        let mut scene = SceneModel::new();
        for id in ids {
            scene.add_block(Block::new(EntityId::intern(id), 0.0, 0.0));
        }
        scene
    }

    fn block(id: &str) -> EntityRef {
        EntityRef::block(EntityId::intern(id))
    }

    #[test]
    fn unchanged_drag_records_nothing() {
        let scene = scene_with(&["cs_a"]);
        let mut stack = CommandStack::default();
        stack.begin_batch(&scene, &[block("cs_a")]);
        assert!(!stack.end_batch(&scene));
        assert!(!stack.can_undo());
    }

    #[test]
    fn only_moved_items_are_recorded() {
        let mut scene = scene_with(&["cs_b", "cs_c"]);
        let mut stack = CommandStack::default();
        stack.begin_batch(&scene, &[block("cs_b"), block("cs_c")]);
        scene.set_position(block("cs_b"), Point::new(5.0, 5.0));
        assert!(stack.end_batch(&scene));
        let action = stack.peek_undo().unwrap();
        assert_eq!(action.items.len(), 1);
        assert_eq!(action.items[0].entity, block("cs_b"));
    }

    #[test]
    fn history_is_bounded() {
        let mut scene = scene_with(&["cs_d"]);
        let mut stack = CommandStack::new(3);
        for i in 1..=5 {
            stack.begin_batch(&scene, &[block("cs_d")]);
            scene.set_position(block("cs_d"), Point::new(i as f64, 0.0));
            stack.end_batch(&scene);
        }
        assert_eq!(stack.undo_len(), 3);
        while stack.undo(&mut scene).is_some() {}
        // The two oldest moves were evicted, so undo bottoms out at x = 2.
        assert_eq!(scene.position(block("cs_d")), Some(Point::new(2.0, 0.0)));
    }

    #[test]
    fn new_action_clears_redo() {
        let mut scene = scene_with(&["cs_e"]);
        let mut stack = CommandStack::default();
        stack.begin_batch(&scene, &[block("cs_e")]);
        scene.set_position(block("cs_e"), Point::new(1.0, 1.0));
        stack.end_batch(&scene);
        stack.undo(&mut scene);
        assert!(stack.can_redo());

        stack.begin_batch(&scene, &[block("cs_e")]);
        scene.set_position(block("cs_e"), Point::new(9.0, 9.0));
        stack.end_batch(&scene);
        assert!(!stack.can_redo());
    }

    #[test]
    fn undo_skips_entities_that_no_longer_exist() {
        let mut scene = scene_with(&["cs_f"]);
        let mut stack = CommandStack::default();
        stack.begin_batch(&scene, &[block("cs_f")]);
        scene.set_position(block("cs_f"), Point::new(3.0, 3.0));
        stack.end_batch(&scene);
        scene.remove(block("cs_f"));
        assert_eq!(stack.undo(&mut scene), Some(vec![block("cs_f")]));
        assert!(!scene.contains(block("cs_f")));
    }
}
