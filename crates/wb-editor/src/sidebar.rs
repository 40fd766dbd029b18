//! Sidebar collections: pinned files, the card list and the stash.
//!
//! All three are views over the scene model. The card list is derived on
//! demand; pinned paths and stash entries live in the scene so they are
//! saved with the document.

use serde::{Deserialize, Serialize};
use wb_core::model::{Card, Point, Rect, STASH_RESTORE_HEIGHT, STASH_RESTORE_WIDTH, StashCard};
use wb_core::{EntityId, SceneModel, paths};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidebarTab {
    #[default]
    Pinned,
    Cards,
    Stash,
}

impl SidebarTab {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "pinned" => Some(SidebarTab::Pinned),
            "cards" => Some(SidebarTab::Cards),
            "stash" => Some(SidebarTab::Stash),
            _ => None,
        }
    }
}

/// One row of the card list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardListEntry {
    pub id: EntityId,
    pub title: String,
    pub file_path: String,
    pub color: Option<String>,
    pub last_modified: i64,
}

/// Outcome of adding a path to the stash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StashAdd {
    Added(EntityId),
    /// The path was already stashed; the existing entry is surfaced instead.
    Existing(EntityId),
}

/// Where a restored stash entry lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RestorePlacement {
    /// Back where it was stashed from, if that was recorded.
    Original,
    /// Centered on a canvas drop point.
    DropAt(Point),
    /// Centered on the given canvas point (the viewport center).
    Center(Point),
}

#[derive(Debug, Clone, Default)]
pub struct Sidebar {
    open: bool,
    tab: SidebarTab,
    current_pinned: Option<String>,
    color_filter: Option<String>,
}

impl Sidebar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn tab(&self) -> SidebarTab {
        self.tab
    }

    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    /// Switch tab, opening the sidebar if needed.
    pub fn show_tab(&mut self, tab: SidebarTab) {
        self.open = true;
        self.tab = tab;
    }

    /// Open on `tab`, or close if `tab` is already showing.
    pub fn toggle_tab(&mut self, tab: SidebarTab) {
        if self.open && self.tab == tab {
            self.open = false;
        } else {
            self.show_tab(tab);
        }
    }

    /// Cards can be dropped on the stash only while it is on screen.
    pub fn stash_visible(&self) -> bool {
        self.open && self.tab == SidebarTab::Stash
    }

    // ─── Pinned ──────────────────────────────────────────────────────────

    /// The displayed pinned file: the selected one while it stays pinned,
    /// otherwise the first pinned file.
    pub fn current_pinned<'a>(&'a self, scene: &'a SceneModel) -> Option<&'a str> {
        let pinned = scene.pinned_files();
        match &self.current_pinned {
            Some(path) if pinned.contains(path) => Some(path.as_str()),
            _ => pinned.first().map(String::as_str),
        }
    }

    /// Display a pinned file. Does not touch the canvas.
    pub fn select_pinned(&mut self, scene: &SceneModel, path: &str) -> bool {
        if !scene.pinned_files().iter().any(|p| p == path) {
            return false;
        }
        self.current_pinned = Some(path.to_string());
        true
    }

    /// Pin a path and display it. Returns whether the scene changed.
    pub fn pin(&mut self, scene: &mut SceneModel, path: &str) -> bool {
        let added = scene.pin(path);
        self.current_pinned = Some(path.to_string());
        added
    }

    pub fn unpin(&mut self, scene: &mut SceneModel, path: &str) -> bool {
        if self.current_pinned.as_deref() == Some(path) {
            self.current_pinned = None;
        }
        scene.unpin(path)
    }

    /// Follow a renamed pinned file.
    pub fn rename_pinned(&mut self, scene: &mut SceneModel, old: &str, new: &str) -> bool {
        if !scene.rename_pinned(old, new) {
            return false;
        }
        if self.current_pinned.as_deref() == Some(old) {
            self.current_pinned = Some(new.to_string());
        }
        true
    }

    // ─── Card list ───────────────────────────────────────────────────────

    pub fn color_filter(&self) -> Option<&str> {
        self.color_filter.as_deref()
    }

    pub fn set_color_filter(&mut self, color: Option<String>) {
        self.color_filter = color;
    }

    /// On-canvas cards matching the color filter, newest first.
    pub fn card_list(&self, scene: &SceneModel) -> Vec<CardListEntry> {
        let mut rows: Vec<CardListEntry> = scene
            .cards()
            .iter()
            .filter(|c| match &self.color_filter {
                Some(color) => c.color.as_deref() == Some(color.as_str()),
                None => true,
            })
            .map(|c| CardListEntry {
                id: c.id,
                title: paths::display_name(&c.file_path),
                file_path: c.file_path.clone(),
                color: c.color.clone(),
                last_modified: c.last_modified,
            })
            .collect();
        rows.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        rows
    }

    // ─── Stash ───────────────────────────────────────────────────────────

    /// Add a bare path to the stash and show the stash tab. A path that is
    /// already stashed is surfaced rather than duplicated.
    pub fn add_to_stash(&mut self, scene: &mut SceneModel, path: &str, now_ms: i64) -> StashAdd {
        self.show_tab(SidebarTab::Stash);
        if let Some(existing) = scene.stash_by_path(path) {
            return StashAdd::Existing(existing.id);
        }
        let id = EntityId::generate("card", now_ms);
        scene.add_stash(StashCard::detached(id, path, now_ms));
        StashAdd::Added(id)
    }

    /// Move a canvas card into the stash, remembering `geometry` (or its
    /// current bounds). The id is kept. `None` for an unknown card. When
    /// the card's path is already stashed the card stays put and the
    /// existing entry is surfaced, as with [`Sidebar::add_to_stash`].
    pub fn stash_card(
        &mut self,
        scene: &mut SceneModel,
        card: EntityId,
        geometry: Option<Rect>,
        now_ms: i64,
    ) -> Option<StashAdd> {
        let c = scene.card(card)?;
        if let Some(existing) = scene.stash_by_path(&c.file_path) {
            log::debug!("{} is already stashed; leaving card {card} on canvas", c.file_path);
            let existing = existing.id;
            self.show_tab(SidebarTab::Stash);
            return Some(StashAdd::Existing(existing));
        }
        let entry = StashCard::from_card(c, geometry.unwrap_or_else(|| c.bounds()), now_ms);
        scene.remove_card(card);
        scene.add_stash(entry).then_some(StashAdd::Added(card))
    }

    /// Put a stash entry back on the canvas under the same id.
    pub fn restore_from_stash(
        &mut self,
        scene: &mut SceneModel,
        stash_id: EntityId,
        placement: RestorePlacement,
        now_ms: i64,
    ) -> Option<EntityId> {
        let entry = scene.stash_entry(stash_id)?.clone();
        let size = (
            entry.original_width.unwrap_or(STASH_RESTORE_WIDTH),
            entry.original_height.unwrap_or(STASH_RESTORE_HEIGHT),
        );
        let half = (STASH_RESTORE_WIDTH / 2.0, STASH_RESTORE_HEIGHT / 2.0);
        let bounds = match (placement, entry.original_geometry()) {
            (RestorePlacement::Original, Some(original)) => original,
            (RestorePlacement::DropAt(p), _) => Rect::new(p.x - half.0, p.y - half.1, size.0, size.1),
            (RestorePlacement::Center(p), _) => Rect::new(
                p.x - half.0,
                p.y - half.1,
                STASH_RESTORE_WIDTH,
                STASH_RESTORE_HEIGHT,
            ),
            (RestorePlacement::Original, None) => return None,
        };
        let mut card = Card::new(entry.id, entry.file_path.clone(), bounds, now_ms);
        card.color = entry.color.clone();
        scene.remove_stash(stash_id);
        scene.add_card(card);
        Some(entry.id)
    }

    pub fn delete_from_stash(&mut self, scene: &mut SceneModel, stash_id: EntityId) -> bool {
        scene.remove_stash(stash_id).is_some()
    }
}
