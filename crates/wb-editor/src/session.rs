//! One open whiteboard: the scene plus every component that acts on it.
//!
//! `WhiteboardSession` is the single mutator of its [`SceneModel`]. The view
//! feeds it [`InputEvent`]s and [`HostEvent`]s; it answers with frame
//! requests (through the injected [`FrameScheduler`]), viewer updates
//! (through [`CardViewers`]) and outbound [`ViewCommand`]s collected in an
//! outbox that the owner drains with [`WhiteboardSession::take_outbound`].
//!
//! Timers fire back in through [`WhiteboardSession::on_timer`]. A save that
//! comes due mid-gesture is pushed back rather than taken, so no snapshot
//! ever holds a half-applied drag.

use crate::commands::CommandStack;
use crate::input::{InputEvent, Modifiers};
use crate::persist::{Clock, ManualScheduler, SaveCoordinator, Scheduler, TimerId};
use crate::reconcile::{CardViewers, ContentUpdate, NoViewers, ViewReconciler};
use crate::select::{DragEngine, DragState, Effects, Release, Selection, hit_test};
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use crate::sidebar::{CardListEntry, RestorePlacement, Sidebar, SidebarTab, StashAdd};
use crate::viewport::{FrameBatcher, FrameDamage, FrameScheduler, NoFrames, Viewport, ZOOM_STEP};
use wb_core::model::{
    BLOCK_HEIGHT, BLOCK_WIDTH, Block, CARD_NEW_HEIGHT, CARD_NEW_WIDTH, Card, EntityKind,
    EntityRef, PALETTE, Point, Rect,
};
use wb_core::protocol::{HostEvent, ViewCommand};
use wb_core::{EntityId, SceneModel, WhiteboardDocument};

/// New cards are placed this far up and left of the pending position.
const NEW_CARD_OFFSET: (f64, f64) = (150.0, 100.0);

const NEW_BLOCK_TEXT: &str = "New Block";

/// Capabilities the session borrows from its environment.
pub struct SessionServices {
    pub scheduler: Box<dyn Scheduler>,
    pub frames: Box<dyn FrameScheduler>,
    pub viewers: Box<dyn CardViewers>,
    pub clock: Box<dyn Clock>,
}

impl SessionServices {
    /// Virtual time from `timers`, with frames and viewers discarded.
    pub fn manual(timers: &ManualScheduler) -> Self {
        Self {
            scheduler: Box::new(timers.clone()),
            frames: Box::new(NoFrames),
            viewers: Box::new(NoViewers),
            clock: Box::new(timers.clone()),
        }
    }
}

pub struct WhiteboardSession {
    scene: SceneModel,
    viewport: Viewport,
    engine: DragEngine,
    history: CommandStack,
    saver: SaveCoordinator,
    batcher: FrameBatcher,
    reconciler: ViewReconciler,
    sidebar: Sidebar,
    services: SessionServices,
    outbox: Vec<ViewCommand>,
    /// Screen rect of the stash list while it is laid out.
    stash_zone: Option<Rect>,
    /// Canvas point of the last double click or context menu on empty canvas.
    pending_card_position: Option<Point>,
    pinned_content: Option<String>,
    /// A block's text field has focus.
    text_editing: bool,
    workspace_files: Vec<String>,
    workspace_folders: Vec<String>,
    card_folder_path: Option<String>,
    loaded: bool,
}

impl WhiteboardSession {
    pub fn new(width: f64, height: f64, services: SessionServices) -> Self {
        Self {
            scene: SceneModel::new(),
            viewport: Viewport::new(width, height),
            engine: DragEngine::new(),
            history: CommandStack::default(),
            saver: SaveCoordinator::default(),
            batcher: FrameBatcher::new(),
            reconciler: ViewReconciler::new(),
            sidebar: Sidebar::new(),
            services,
            outbox: Vec::new(),
            stash_zone: None,
            pending_card_position: None,
            pinned_content: None,
            text_editing: false,
            workspace_files: Vec::new(),
            workspace_folders: Vec::new(),
            card_folder_path: None,
            loaded: false,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn scene(&self) -> &SceneModel {
        &self.scene
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn selection(&self) -> &Selection {
        self.engine.selection()
    }

    pub fn drag_state(&self) -> &DragState {
        self.engine.state()
    }

    pub fn selection_box(&self) -> Option<Rect> {
        self.engine.selection_box()
    }

    pub fn history(&self) -> &CommandStack {
        &self.history
    }

    pub fn saver(&self) -> &SaveCoordinator {
        &self.saver
    }

    pub fn sidebar(&self) -> &Sidebar {
        &self.sidebar
    }

    pub fn reconciler(&self) -> &ViewReconciler {
        &self.reconciler
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn pending_card_position(&self) -> Option<Point> {
        self.pending_card_position
    }

    pub fn pinned_content(&self) -> Option<&str> {
        self.pinned_content.as_deref()
    }

    pub fn current_pinned(&self) -> Option<&str> {
        self.sidebar.current_pinned(&self.scene)
    }

    pub fn workspace_files(&self) -> &[String] {
        &self.workspace_files
    }

    pub fn workspace_folders(&self) -> &[String] {
        &self.workspace_folders
    }

    pub fn card_folder_path(&self) -> Option<&str> {
        self.card_folder_path.as_deref()
    }

    /// Drain the messages queued for the host.
    pub fn take_outbound(&mut self) -> Vec<ViewCommand> {
        std::mem::take(&mut self.outbox)
    }

    /// Called from the animation frame callback.
    pub fn animation_frame(&mut self) -> FrameDamage {
        self.batcher.take()
    }

    pub fn set_container_size(&mut self, width: f64, height: f64) {
        self.viewport.set_container_size(width, height);
        self.damage_transform();
    }

    /// Where the stash list sits on screen, or `None` when it is not laid out.
    pub fn set_stash_zone(&mut self, zone: Option<Rect>) {
        self.stash_zone = zone;
    }

    pub fn set_text_editing(&mut self, editing: bool) {
        self.text_editing = editing;
    }

    pub fn set_pending_card_position(&mut self, canvas: Point) {
        self.pending_card_position = Some(canvas);
    }

    fn is_editing(&self) -> bool {
        self.text_editing || self.reconciler.any_focused()
    }

    fn now(&self) -> i64 {
        self.services.clock.now_ms()
    }

    // ─── Damage and persistence plumbing ─────────────────────────────────

    fn damage_entity(&mut self, entity: EntityRef) {
        self.batcher.entity(entity, self.services.frames.as_mut());
    }

    fn damage_structure(&mut self) {
        self.batcher.structure(self.services.frames.as_mut());
    }

    fn damage_overlay(&mut self) {
        self.batcher.overlay(self.services.frames.as_mut());
    }

    fn damage_transform(&mut self) {
        self.batcher.transform(self.services.frames.as_mut());
    }

    fn mark_dirty(&mut self) {
        self.saver.mark_dirty(self.services.scheduler.as_mut());
    }

    fn emit_save(&mut self, doc: Option<WhiteboardDocument>) -> bool {
        match doc {
            Some(state) => {
                self.outbox.push(ViewCommand::SaveState { state });
                true
            }
            None => false,
        }
    }

    /// Cancel the debounce and save now if anything changed.
    pub fn force_save(&mut self) -> bool {
        let doc = self
            .saver
            .force_save(self.services.scheduler.as_mut(), &self.scene);
        self.emit_save(doc)
    }

    /// Record a destructive change and write it out immediately.
    fn commit_now(&mut self) {
        self.mark_dirty();
        self.force_save();
    }

    /// A timer handed out by the scheduler came due.
    pub fn on_timer(&mut self, id: TimerId) {
        if !self.saver.on_timer(id) {
            return;
        }
        if !self.engine.is_idle() {
            log::trace!("save deferred: gesture in progress");
            self.saver.defer(self.services.scheduler.as_mut());
            return;
        }
        let doc = self.saver.perform_save(&self.scene);
        self.emit_save(doc);
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Feed one input event. Returns whether the session consumed it, so
    /// the view can suppress the default browser behavior.
    pub fn handle_input(&mut self, event: &InputEvent) -> bool {
        match event {
            InputEvent::KeyDown { key, modifiers } => self.key_down(key, *modifiers),
            InputEvent::KeyUp { key } => {
                if key == " " {
                    self.engine.set_space_held(false);
                    true
                } else {
                    false
                }
            }
            InputEvent::Wheel {
                x,
                y,
                dx,
                dy,
                modifiers,
            } => {
                let changed = if modifiers.command() {
                    self.viewport.wheel_zoom(*dy, Point::new(*x, *y))
                } else {
                    self.viewport.pan_by(-*dx, -*dy)
                };
                if changed {
                    self.damage_transform();
                }
                true
            }
            InputEvent::DoubleClick { x, y } => {
                let canvas = self.viewport.screen_to_canvas(Point::new(*x, *y));
                if hit_test(&self.scene, canvas, 0.0).is_some() {
                    return false;
                }
                self.pending_card_position = Some(canvas);
                true
            }
            InputEvent::PointerDown { .. }
            | InputEvent::PointerMove { .. }
            | InputEvent::PointerUp { .. }
            | InputEvent::Cancel { .. } => {
                let zone = if self.sidebar.stash_visible() {
                    self.stash_zone
                } else {
                    None
                };
                self.engine.set_drop_zone(zone);
                let fx = self.engine.handle(
                    event,
                    &mut self.scene,
                    &mut self.viewport,
                    &mut self.history,
                );
                self.apply_effects(fx)
            }
        }
    }

    fn apply_effects(&mut self, fx: Effects) -> bool {
        let frames = self.services.frames.as_mut();
        for entity in &fx.moved {
            self.batcher.entity(*entity, frames);
        }
        if fx.selection_changed || fx.box_changed || fx.drop_hover.is_some() {
            self.batcher.overlay(frames);
        }
        if fx.panned {
            self.batcher.transform(frames);
        }

        let consumed = !fx.moved.is_empty()
            || fx.selection_changed
            || fx.box_changed
            || fx.panned
            || fx.released.is_some()
            || !self.engine.is_idle();
        match fx.released {
            Some(Release::Drag { recorded: true }) | Some(Release::Resize(_)) => self.mark_dirty(),
            Some(Release::StashTransfer(cards)) => self.transfer_to_stash(cards),
            _ => {}
        }
        consumed
    }

    fn key_down(&mut self, key: &str, modifiers: Modifiers) -> bool {
        let Some(action) = ShortcutMap::resolve(key, modifiers) else {
            return false;
        };
        if self.is_editing() && !action.allowed_while_editing() {
            return false;
        }
        match action {
            ShortcutAction::Undo => self.undo(),
            ShortcutAction::Redo => self.redo(),
            ShortcutAction::ZoomIn => self.zoom_by(ZOOM_STEP),
            ShortcutAction::ZoomOut => self.zoom_by(-ZOOM_STEP),
            ShortcutAction::ZoomReset => {
                self.reset_zoom();
                true
            }
            ShortcutAction::Delete => self.delete_selected() > 0,
            ShortcutAction::SelectAll => {
                if !self.engine.is_idle() {
                    return false;
                }
                let all: Vec<EntityRef> = self.scene.entity_bounds().map(|(e, _)| e).collect();
                self.engine.selection_mut().replace(all);
                self.damage_overlay();
                true
            }
            ShortcutAction::Deselect => {
                if self.engine.is_idle() && self.engine.selection_mut().clear() {
                    self.damage_overlay();
                }
                true
            }
            ShortcutAction::PanStart => {
                self.engine.set_space_held(true);
                true
            }
        }
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        if !self.engine.is_idle() {
            return false;
        }
        match self.history.undo(&mut self.scene) {
            Some(touched) => {
                self.after_history(touched);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        if !self.engine.is_idle() {
            return false;
        }
        match self.history.redo(&mut self.scene) {
            Some(touched) => {
                self.after_history(touched);
                true
            }
            None => false,
        }
    }

    fn after_history(&mut self, touched: Vec<EntityRef>) {
        for entity in touched {
            self.damage_entity(entity);
        }
        self.mark_dirty();
    }

    // ─── Viewport ────────────────────────────────────────────────────────

    pub fn zoom_by(&mut self, delta: f64) -> bool {
        let changed = self.viewport.zoom_by(delta);
        if changed {
            self.damage_transform();
        }
        changed
    }

    pub fn set_zoom(&mut self, level: f64, anchor: Option<Point>) -> bool {
        let changed = self.viewport.set_zoom(level, anchor);
        if changed {
            self.damage_transform();
        }
        changed
    }

    /// Back to 100%, centered on the cards.
    pub fn reset_zoom(&mut self) {
        self.set_zoom(1.0, None);
        self.center_view();
    }

    /// Center on the bounding box of every card, or the middle of the
    /// surface when there are none.
    pub fn center_view(&mut self) {
        let rects: Vec<Rect> = self.scene.cards().iter().map(Card::bounds).collect();
        if self.viewport.center_on(rects) {
            self.damage_transform();
        }
    }

    /// Bring a card to the middle of the screen and select it.
    pub fn navigate_to_card(&mut self, card: EntityId) -> bool {
        let Some(bounds) = self.scene.card(card).map(Card::bounds) else {
            return false;
        };
        if self.viewport.center_on_rect(bounds) {
            self.damage_transform();
        }
        if self.engine.is_idle() {
            self.engine.selection_mut().replace([EntityRef::card(card)]);
            self.damage_overlay();
        }
        true
    }

    // ─── Blocks ──────────────────────────────────────────────────────────

    /// Add a block with its top-left at `at`, or centered in the viewport.
    pub fn add_block(&mut self, at: Option<Point>) -> EntityId {
        let origin = at.unwrap_or_else(|| {
            let c = self.viewport.center_in_canvas();
            Point::new(c.x - BLOCK_WIDTH / 2.0, c.y - BLOCK_HEIGHT / 2.0)
        });
        let id = EntityId::generate("block", self.now());
        let mut block = Block::new(id, origin.x, origin.y);
        block.text = NEW_BLOCK_TEXT.to_string();
        block.color = Some(PALETTE[self.scene.blocks().len() % PALETTE.len()].to_string());
        self.scene.add_block(block);
        log::debug!("added block {id}");
        self.damage_structure();
        self.mark_dirty();
        id
    }

    pub fn set_block_text(&mut self, block: EntityId, text: &str) -> bool {
        let Some(b) = self.scene.block_mut(block) else {
            return false;
        };
        if b.text == text {
            return false;
        }
        b.text = text.to_string();
        self.damage_entity(EntityRef::block(block));
        self.mark_dirty();
        true
    }

    pub fn link_block(&mut self, block: EntityId, file_path: &str) -> bool {
        let Some(b) = self.scene.block_mut(block) else {
            return false;
        };
        b.linked_file = Some(file_path.to_string());
        self.damage_entity(EntityRef::block(block));
        self.mark_dirty();
        true
    }

    pub fn unlink_block(&mut self, block: EntityId) -> bool {
        let Some(b) = self.scene.block_mut(block) else {
            return false;
        };
        if b.linked_file.take().is_none() {
            return false;
        }
        self.damage_entity(EntityRef::block(block));
        self.mark_dirty();
        true
    }

    /// Set or reset the color of a block or card.
    pub fn set_color(&mut self, entity: EntityRef, color: Option<String>) -> bool {
        let slot = match entity.kind {
            EntityKind::Block => self.scene.block_mut(entity.id).map(|b| &mut b.color),
            EntityKind::Card => self.scene.card_mut(entity.id).map(|c| &mut c.color),
        };
        let Some(slot) = slot else {
            return false;
        };
        *slot = color;
        self.damage_entity(entity);
        self.mark_dirty();
        true
    }

    /// Remove one entity (context-menu delete). Written out immediately.
    pub fn delete_entity(&mut self, entity: EntityRef) -> bool {
        if !self.engine.is_idle() || !self.remove_entity(entity) {
            return false;
        }
        self.damage_structure();
        self.commit_now();
        true
    }

    /// Remove every selected entity. Written out immediately.
    pub fn delete_selected(&mut self) -> usize {
        if !self.engine.is_idle() {
            return 0;
        }
        let selected = self.engine.selection().to_vec();
        let removed = selected
            .into_iter()
            .filter(|e| self.remove_entity(*e))
            .count();
        if removed > 0 {
            log::debug!("deleted {removed} selected entities");
            self.damage_structure();
            self.commit_now();
        }
        removed
    }

    fn remove_entity(&mut self, entity: EntityRef) -> bool {
        if !self.scene.remove(entity) {
            return false;
        }
        if entity.kind == EntityKind::Card {
            self.reconciler
                .forget(entity.id, self.services.viewers.as_mut());
        }
        self.engine.selection_mut().retain(|e| *e != entity);
        true
    }

    // ─── Cards ───────────────────────────────────────────────────────────

    /// Place a card for `file_path` at the pending position (or the
    /// viewport center).
    pub fn add_card(&mut self, file_path: &str) -> EntityId {
        let at = self.new_card_origin();
        self.add_card_at(file_path, at)
    }

    pub fn add_card_at(&mut self, file_path: &str, at: Point) -> EntityId {
        let now = self.now();
        let id = EntityId::generate("card", now);
        let bounds = Rect::new(at.x, at.y, CARD_NEW_WIDTH, CARD_NEW_HEIGHT);
        self.scene.add_card(Card::new(id, file_path, bounds, now));
        self.outbox.push(ViewCommand::ReadCardContent {
            card_id: id,
            file_path: file_path.to_string(),
        });
        log::debug!("added card {id} for {file_path}");
        self.damage_structure();
        self.mark_dirty();
        id
    }

    fn new_card_origin(&self) -> Point {
        let anchor = self
            .pending_card_position
            .unwrap_or_else(|| self.viewport.center_in_canvas());
        Point::new(anchor.x - NEW_CARD_OFFSET.0, anchor.y - NEW_CARD_OFFSET.1)
    }

    pub fn toggle_collapsed(&mut self, card: EntityId) -> bool {
        let Some(c) = self.scene.card_mut(card) else {
            return false;
        };
        c.collapsed = !c.collapsed;
        self.damage_entity(EntityRef::card(card));
        self.mark_dirty();
        true
    }

    /// The card's editor produced new markdown. Rejected while the card is
    /// disconnected from its file.
    pub fn card_content_edited(&mut self, card: EntityId, markdown: String) -> bool {
        if !self.reconciler.can_edit(card) {
            log::debug!("ignoring edit to disconnected card {card}");
            return false;
        }
        let now = self.now();
        let Some(c) = self.scene.card_mut(card) else {
            return false;
        };
        c.last_modified = now;
        let file_path = c.file_path.clone();
        self.reconciler.edited(card, &markdown);
        self.outbox.push(ViewCommand::SaveCardContent {
            file_path,
            content: markdown,
        });
        if self.sidebar.is_open() && self.sidebar.tab() == SidebarTab::Cards {
            self.damage_structure();
        }
        self.mark_dirty();
        true
    }

    pub fn focus_card(&mut self, card: EntityId) {
        self.reconciler.focus(card);
    }

    /// Release focus; content that arrived meanwhile is applied now.
    pub fn blur_card(&mut self, card: EntityId) -> bool {
        let applied = self
            .reconciler
            .blur(card, self.services.viewers.as_mut());
        if applied {
            self.damage_entity(EntityRef::card(card));
        }
        applied
    }

    /// Manual reconnect: ask the host to read the card's file again.
    pub fn reconnect_card(&mut self, card: EntityId) -> bool {
        let Some(c) = self.scene.card(card) else {
            return false;
        };
        self.outbox.push(ViewCommand::ReadCardContent {
            card_id: card,
            file_path: c.file_path.clone(),
        });
        true
    }

    pub fn open_card_file(&mut self, card: EntityId, split_view: bool) -> bool {
        let Some(c) = self.scene.card(card) else {
            return false;
        };
        let file_path = c.file_path.clone();
        self.open_file(&file_path, split_view);
        true
    }

    // ─── Sidebar ─────────────────────────────────────────────────────────

    pub fn show_sidebar_tab(&mut self, tab: SidebarTab) {
        self.sidebar.show_tab(tab);
        if tab == SidebarTab::Pinned {
            self.request_current_pinned();
        }
        self.damage_structure();
    }

    pub fn toggle_sidebar_tab(&mut self, tab: SidebarTab) {
        self.sidebar.toggle_tab(tab);
        if self.sidebar.is_open() && tab == SidebarTab::Pinned {
            self.request_current_pinned();
        }
        self.damage_structure();
    }

    pub fn close_sidebar(&mut self) {
        self.sidebar.set_open(false);
        self.damage_structure();
    }

    pub fn set_color_filter(&mut self, color: Option<String>) {
        self.sidebar.set_color_filter(color);
        self.damage_structure();
    }

    pub fn card_list(&self) -> Vec<CardListEntry> {
        self.sidebar.card_list(&self.scene)
    }

    /// Click on a card-list row: ⌘ opens the file, Alt opens it beside the
    /// canvas, a plain click navigates to the card.
    pub fn activate_card_entry(&mut self, card: EntityId, modifiers: Modifiers) -> bool {
        if modifiers.meta {
            self.open_card_file(card, false)
        } else if modifiers.alt {
            self.open_card_file(card, true)
        } else {
            self.navigate_to_card(card)
        }
    }

    fn request_current_pinned(&mut self) {
        if let Some(path) = self.sidebar.current_pinned(&self.scene) {
            self.outbox.push(ViewCommand::ReadPinnedFileContent {
                file_path: path.to_string(),
            });
        }
    }

    pub fn pin_file(&mut self, file_path: &str) -> bool {
        let added = self.sidebar.pin(&mut self.scene, file_path);
        if added {
            self.mark_dirty();
        }
        self.pinned_content = None;
        self.request_current_pinned();
        self.damage_structure();
        added
    }

    pub fn unpin_file(&mut self, file_path: &str) -> bool {
        let was_current = self.current_pinned() == Some(file_path);
        if !self.sidebar.unpin(&mut self.scene, file_path) {
            return false;
        }
        if was_current {
            self.pinned_content = None;
            self.request_current_pinned();
        }
        self.damage_structure();
        self.mark_dirty();
        true
    }

    /// Show another pinned file. Canvas state is untouched.
    pub fn select_pinned(&mut self, file_path: &str) -> bool {
        if !self.sidebar.select_pinned(&self.scene, file_path) {
            return false;
        }
        self.pinned_content = None;
        self.request_current_pinned();
        self.damage_structure();
        true
    }

    pub fn pinned_content_edited(&mut self, content: String) -> bool {
        let Some(file_path) = self.current_pinned().map(str::to_string) else {
            return false;
        };
        self.pinned_content = Some(content.clone());
        self.outbox
            .push(ViewCommand::SavePinnedFileContent { file_path, content });
        true
    }

    /// Demote a canvas card to the stash at its current geometry.
    pub fn stash_card(&mut self, card: EntityId) -> bool {
        if !self.engine.is_idle() {
            return false;
        }
        self.transfer_to_stash_with(vec![(card, None)]) > 0
    }

    fn transfer_to_stash(&mut self, cards: Vec<(EntityId, Rect)>) {
        self.transfer_to_stash_with(cards.into_iter().map(|(id, r)| (id, Some(r))).collect());
    }

    fn transfer_to_stash_with(&mut self, cards: Vec<(EntityId, Option<Rect>)>) -> usize {
        let now = self.now();
        let mut moved = 0;
        let mut surfaced = false;
        for (card, geometry) in cards {
            match self.sidebar.stash_card(&mut self.scene, card, geometry, now) {
                Some(StashAdd::Added(_)) => {
                    self.reconciler.forget(card, self.services.viewers.as_mut());
                    self.engine.selection_mut().retain(|e| *e != EntityRef::card(card));
                    moved += 1;
                }
                Some(StashAdd::Existing(_)) => surfaced = true,
                None => {}
            }
        }
        if moved > 0 {
            log::debug!("moved {moved} card(s) to the stash");
            self.damage_overlay();
            self.mark_dirty();
        }
        if moved > 0 || surfaced {
            self.damage_structure();
        }
        moved
    }

    pub fn add_to_stash(&mut self, file_path: &str) -> StashAdd {
        let now = self.now();
        let outcome = self.sidebar.add_to_stash(&mut self.scene, file_path, now);
        if matches!(outcome, StashAdd::Added(_)) {
            self.mark_dirty();
        }
        self.damage_structure();
        outcome
    }

    /// Put a stash entry back on the canvas. `Original` without recorded
    /// geometry lands at the viewport center instead.
    pub fn restore_from_stash(
        &mut self,
        stash_id: EntityId,
        placement: RestorePlacement,
    ) -> Option<EntityId> {
        let has_origin = self
            .scene
            .stash_entry(stash_id)?
            .original_geometry()
            .is_some();
        let placement = match placement {
            RestorePlacement::Original if !has_origin => {
                RestorePlacement::Center(self.viewport.center_in_canvas())
            }
            other => other,
        };
        let now = self.now();
        let card = self
            .sidebar
            .restore_from_stash(&mut self.scene, stash_id, placement, now)?;
        if let Some(c) = self.scene.card(card) {
            self.outbox.push(ViewCommand::ReadCardContent {
                card_id: card,
                file_path: c.file_path.clone(),
            });
        }
        self.damage_structure();
        self.mark_dirty();
        if placement == RestorePlacement::Original {
            self.navigate_to_card(card);
        }
        Some(card)
    }

    /// Restore a stash entry dropped on the canvas at a screen point.
    pub fn restore_from_stash_at(&mut self, stash_id: EntityId, screen: Point) -> Option<EntityId> {
        let drop = self.viewport.screen_to_canvas(screen);
        self.restore_from_stash(stash_id, RestorePlacement::DropAt(drop))
    }

    pub fn delete_from_stash(&mut self, stash_id: EntityId) -> bool {
        if !self.sidebar.delete_from_stash(&mut self.scene, stash_id) {
            return false;
        }
        self.damage_structure();
        self.mark_dirty();
        true
    }

    // ─── Requests to the host ────────────────────────────────────────────

    pub fn request_state(&mut self) {
        self.outbox.push(ViewCommand::RequestState);
    }

    pub fn open_file(&mut self, file_path: &str, split_view: bool) {
        self.outbox.push(ViewCommand::OpenFile {
            file_path: file_path.to_string(),
            split_view,
        });
    }

    /// Ask the host to author a new markdown file. It comes back as
    /// `cardCreated` and lands on the canvas, in the stash, or as the link
    /// of `for_block`.
    pub fn create_new_card(
        &mut self,
        file_name: &str,
        for_block: Option<EntityId>,
        to_stash: bool,
    ) -> bool {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return false;
        }
        let at = match for_block {
            Some(_) => Point::ORIGIN,
            None => self.new_card_origin(),
        };
        self.outbox.push(ViewCommand::CreateNewCard {
            file_name: file_name.to_string(),
            x: at.x,
            y: at.y,
            for_block_id: for_block,
            add_to_stash: to_stash && for_block.is_none(),
        });
        true
    }

    pub fn rename_card(&mut self, card: EntityId, new_name: &str) -> bool {
        let new_name = new_name.trim();
        let Some(c) = self.scene.card(card) else {
            return false;
        };
        if new_name.is_empty() {
            return false;
        }
        self.outbox.push(ViewCommand::RenameCard {
            card_id: card,
            old_path: c.file_path.clone(),
            new_name: new_name.to_string(),
        });
        true
    }

    pub fn move_card(&mut self, card: EntityId, target_folder: &str) -> bool {
        let Some(c) = self.scene.card(card) else {
            return false;
        };
        self.outbox.push(ViewCommand::MoveCard {
            card_id: card,
            old_path: c.file_path.clone(),
            target_folder: target_folder.to_string(),
        });
        true
    }

    pub fn browse_file(&mut self, block: EntityId) -> bool {
        if self.scene.block(block).is_none() {
            return false;
        }
        self.outbox.push(ViewCommand::BrowseFile { block_id: block });
        true
    }

    pub fn request_workspace_files(&mut self) {
        self.outbox.push(ViewCommand::GetWorkspaceFiles);
    }

    pub fn request_workspace_folders(&mut self) {
        self.outbox.push(ViewCommand::GetWorkspaceFolders);
    }

    pub fn request_card_folder_path(&mut self) {
        self.outbox.push(ViewCommand::GetCardFolderPath);
    }

    // ─── Host events ─────────────────────────────────────────────────────

    pub fn handle_host_event(&mut self, event: HostEvent) {
        log::trace!("host event {}", event.name());
        match event {
            HostEvent::LoadState { state } => self.load(state),
            HostEvent::WorkspaceFiles { files } => {
                self.workspace_files = files;
                self.damage_structure();
            }
            HostEvent::FileSelected {
                block_id,
                file_path,
            } => {
                self.link_block(block_id, &file_path);
            }
            HostEvent::FileChanged {
                card_id, content, ..
            }
            | HostEvent::CardContent { card_id, content } => {
                if self.scene.card(card_id).is_none() {
                    log::debug!("content for unknown card {card_id}");
                    return;
                }
                let update =
                    self.reconciler
                        .on_content(card_id, content, self.services.viewers.as_mut());
                if update == ContentUpdate::Rendered {
                    self.damage_entity(EntityRef::card(card_id));
                }
            }
            HostEvent::FileDeleted { card_id, .. } => {
                if self.scene.card(card_id).is_some() && self.reconciler.on_deleted(card_id) {
                    log::debug!("card {card_id} disconnected");
                    self.damage_entity(EntityRef::card(card_id));
                }
            }
            HostEvent::CardCreated {
                file_path,
                x,
                y,
                for_block_id,
                add_to_stash,
            } => match for_block_id {
                Some(block) => {
                    if !self.link_block(block, &file_path) {
                        log::debug!("created {file_path} for missing block {block}");
                    }
                }
                None if add_to_stash => {
                    self.add_to_stash(&file_path);
                }
                None => {
                    self.add_card_at(&file_path, Point::new(x, y));
                }
            },
            HostEvent::FileRenamed {
                card_id, new_path, ..
            }
            | HostEvent::CardRenamed {
                card_id, new_path, ..
            }
            | HostEvent::CardMoved {
                card_id, new_path, ..
            } => {
                let Some(card) = self.scene.card_mut(card_id) else {
                    return;
                };
                card.file_path = new_path;
                self.damage_entity(EntityRef::card(card_id));
                self.mark_dirty();
            }
            HostEvent::BlockFileRenamed {
                block_id, new_path, ..
            } => {
                if let Some(block) = self.scene.block_mut(block_id) {
                    block.linked_file = Some(new_path);
                    self.damage_entity(EntityRef::block(block_id));
                    self.mark_dirty();
                }
            }
            HostEvent::StashCardFileRenamed {
                stash_card_id,
                new_path,
                ..
            } => {
                if let Some(entry) = self.scene.stash_entry_mut(stash_card_id) {
                    entry.file_path = new_path;
                    self.damage_structure();
                    self.mark_dirty();
                }
            }
            HostEvent::PinnedFileRenamed { old_path, new_path } => {
                if self.sidebar.rename_pinned(&mut self.scene, &old_path, &new_path) {
                    self.damage_structure();
                    self.mark_dirty();
                }
            }
            HostEvent::WorkspaceFolders { folders } => {
                self.workspace_folders = folders;
                self.damage_structure();
            }
            HostEvent::PinnedFileContent { file_path, content } => {
                if self.current_pinned() == Some(file_path.as_str()) {
                    self.pinned_content = Some(content);
                    self.damage_structure();
                }
            }
            HostEvent::CardFolderPath { path } => {
                self.card_folder_path = Some(path);
            }
            HostEvent::ToggleSidebarTab { tab_name } => match SidebarTab::parse(&tab_name) {
                Some(tab) => self.toggle_sidebar_tab(tab),
                None => log::warn!("unknown sidebar tab {tab_name:?}"),
            },
            HostEvent::SaveFailed => self.saver.save_failed(),
        }
    }

    /// Replace the scene with a freshly loaded document.
    fn load(&mut self, doc: WhiteboardDocument) {
        self.reconciler.clear(self.services.viewers.as_mut());
        self.scene.replace(doc);
        self.engine = DragEngine::new();
        self.history.clear();
        self.saver.reset(self.services.scheduler.as_mut());
        self.pinned_content = None;
        self.loaded = true;
        log::debug!(
            "loaded {} blocks, {} cards, {} stashed",
            self.scene.blocks().len(),
            self.scene.cards().len(),
            self.scene.stash().len()
        );

        for card in self.scene.cards() {
            self.outbox.push(ViewCommand::ReadCardContent {
                card_id: card.id,
                file_path: card.file_path.clone(),
            });
        }
        self.request_current_pinned();
        self.center_view();
        self.damage_structure();
        self.damage_overlay();
    }
}
