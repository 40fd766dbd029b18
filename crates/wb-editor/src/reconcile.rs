//! View-side reconciliation of card viewers against their files.
//!
//! Each card has a small piece of transient view state: whether its file
//! has gone missing, whether its editor holds focus, and any external
//! change waiting for focus to be released. Content that arrives while the
//! editor is focused is buffered and applied on blur, so live input is
//! never overwritten. Content the editor itself emitted comes back from the
//! host as an ordinary change and is recognised and dropped.

use std::collections::{HashMap, VecDeque};
use wb_core::EntityId;

/// How many of a card's own recent edits are remembered to spot their echo.
const EDIT_ECHO_WINDOW: usize = 8;

/// The embedded markdown editors, one per card.
pub trait CardViewers {
    fn render(&mut self, card: EntityId, content: &str);
    fn destroy(&mut self, card: EntityId);
}

/// Viewers that draw nothing, for headless sessions.
#[derive(Debug, Default)]
pub struct NoViewers;

impl CardViewers for NoViewers {
    fn render(&mut self, _card: EntityId, _content: &str) {}
    fn destroy(&mut self, _card: EntityId) {}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardViewState {
    /// The file was deleted; content is frozen and edits are rejected.
    pub disconnected: bool,
    pub focused: bool,
    /// External content waiting for blur.
    pub pending: Option<String>,
    /// Recent content emitted by the card's editor, newest last.
    pub emitted: VecDeque<String>,
}

impl CardViewState {
    fn is_own_edit(&self, content: &str) -> bool {
        self.emitted.iter().any(|c| c == content)
    }
}

/// What happened to a piece of incoming content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentUpdate {
    Rendered,
    Deferred,
    /// The echo of the editor's own edit; nothing changed.
    Unchanged,
}

#[derive(Debug, Default)]
pub struct ViewReconciler {
    cards: HashMap<EntityId, CardViewState>,
}

impl ViewReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, card: EntityId) -> Option<&CardViewState> {
        self.cards.get(&card)
    }

    pub fn is_disconnected(&self, card: EntityId) -> bool {
        self.cards.get(&card).is_some_and(|s| s.disconnected)
    }

    pub fn is_focused(&self, card: EntityId) -> bool {
        self.cards.get(&card).is_some_and(|s| s.focused)
    }

    /// Whether any card editor holds focus.
    pub fn any_focused(&self) -> bool {
        self.cards.values().any(|s| s.focused)
    }

    pub fn can_edit(&self, card: EntityId) -> bool {
        !self.is_disconnected(card)
    }

    /// A successful read of the card's file. Clears the disconnected flag
    /// and renders, or buffers the content while the editor is focused.
    pub fn on_content(
        &mut self,
        card: EntityId,
        content: String,
        viewers: &mut dyn CardViewers,
    ) -> ContentUpdate {
        let state = self.cards.entry(card).or_default();
        state.disconnected = false;
        if state.is_own_edit(&content) {
            log::trace!("dropping echo of card {card}'s own edit");
            return ContentUpdate::Unchanged;
        }
        if state.focused {
            log::debug!("deferring external content for focused card {card}");
            state.pending = Some(content);
            ContentUpdate::Deferred
        } else {
            state.pending = None;
            state.emitted.clear();
            viewers.render(card, &content);
            ContentUpdate::Rendered
        }
    }

    /// The card's editor emitted `content`. Buffered external content is
    /// older than this edit and is discarded.
    pub fn edited(&mut self, card: EntityId, content: &str) {
        let state = self.cards.entry(card).or_default();
        if state.pending.take().is_some() {
            log::debug!("discarding buffered content for {card}: edited since");
        }
        state.emitted.push_back(content.to_string());
        if state.emitted.len() > EDIT_ECHO_WINDOW {
            state.emitted.pop_front();
        }
    }

    /// The card's file was deleted. Returns `true` if this newly
    /// disconnected the card.
    pub fn on_deleted(&mut self, card: EntityId) -> bool {
        let state = self.cards.entry(card).or_default();
        state.pending = None;
        !std::mem::replace(&mut state.disconnected, true)
    }

    pub fn focus(&mut self, card: EntityId) {
        self.cards.entry(card).or_default().focused = true;
    }

    /// Release focus and apply any buffered content. Returns whether
    /// something was applied.
    pub fn blur(&mut self, card: EntityId, viewers: &mut dyn CardViewers) -> bool {
        let Some(state) = self.cards.get_mut(&card) else {
            return false;
        };
        state.focused = false;
        match state.pending.take() {
            Some(content) => {
                state.emitted.clear();
                viewers.render(card, &content);
                true
            }
            None => false,
        }
    }

    /// Drop all state for a card leaving the canvas.
    pub fn forget(&mut self, card: EntityId, viewers: &mut dyn CardViewers) {
        self.cards.remove(&card);
        viewers.destroy(card);
    }

    pub fn clear(&mut self, viewers: &mut dyn CardViewers) {
        for (card, _) in self.cards.drain() {
            viewers.destroy(card);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        rendered: Vec<(EntityId, String)>,
        destroyed: Vec<EntityId>,
    }

    impl CardViewers for Recorder {
        fn render(&mut self, card: EntityId, content: &str) {
            self.rendered.push((card, content.to_string()));
        }

        fn destroy(&mut self, card: EntityId) {
            self.destroyed.push(card);
        }
    }

    #[test]
    fn focused_editor_is_not_clobbered() {
        let id = EntityId::intern("rc_focus");
        let mut viewers = Recorder::default();
        let mut rec = ViewReconciler::new();

        rec.focus(id);
        assert_eq!(
            rec.on_content(id, "external".into(), &mut viewers),
            ContentUpdate::Deferred
        );
        assert!(viewers.rendered.is_empty());

        assert!(rec.blur(id, &mut viewers));
        assert_eq!(viewers.rendered, vec![(id, "external".to_string())]);
        assert!(!rec.blur(id, &mut viewers));
    }

    #[test]
    fn later_change_replaces_buffered_one() {
        let id = EntityId::intern("rc_latest");
        let mut viewers = Recorder::default();
        let mut rec = ViewReconciler::new();
        rec.focus(id);
        rec.on_content(id, "first".into(), &mut viewers);
        rec.on_content(id, "second".into(), &mut viewers);
        rec.blur(id, &mut viewers);
        assert_eq!(viewers.rendered, vec![(id, "second".to_string())]);
    }

    #[test]
    fn echo_of_earlier_edit_does_not_replace_live_text() {
        let id = EntityId::intern("rc_echo");
        let mut viewers = Recorder::default();
        let mut rec = ViewReconciler::new();

        rec.focus(id);
        rec.edited(id, "abc");
        rec.edited(id, "abcd");
        assert_eq!(
            rec.on_content(id, "abc".into(), &mut viewers),
            ContentUpdate::Unchanged
        );
        assert!(!rec.blur(id, &mut viewers));
        assert!(viewers.rendered.is_empty());
    }

    #[test]
    fn edit_discards_older_buffered_change() {
        let id = EntityId::intern("rc_stale");
        let mut viewers = Recorder::default();
        let mut rec = ViewReconciler::new();

        rec.focus(id);
        rec.on_content(id, "external".into(), &mut viewers);
        rec.edited(id, "typed");
        assert!(!rec.blur(id, &mut viewers));
        assert!(viewers.rendered.is_empty());

        // A real change after the edit still lands.
        rec.on_content(id, "changed elsewhere".into(), &mut viewers);
        assert_eq!(viewers.rendered, vec![(id, "changed elsewhere".to_string())]);
    }

    #[test]
    fn delete_then_read_reconnects() {
        let id = EntityId::intern("rc_reconnect");
        let mut viewers = Recorder::default();
        let mut rec = ViewReconciler::new();

        assert!(rec.on_deleted(id));
        assert!(!rec.on_deleted(id));
        assert!(!rec.can_edit(id));

        rec.on_content(id, "back".into(), &mut viewers);
        assert!(rec.can_edit(id));
    }

    #[test]
    fn forget_destroys_viewer() {
        let id = EntityId::intern("rc_forget");
        let mut viewers = Recorder::default();
        let mut rec = ViewReconciler::new();
        rec.focus(id);
        rec.forget(id, &mut viewers);
        assert_eq!(rec.state(id), None);
        assert_eq!(viewers.destroyed, vec![id]);
    }
}
