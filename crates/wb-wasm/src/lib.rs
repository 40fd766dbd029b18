//! WASM bridge for the whiteboard webview.
//!
//! Exposes a `WhiteboardCanvas` struct to JavaScript that owns one
//! [`WhiteboardSession`]. The webview forwards DOM input and host messages
//! as JSON strings; the canvas answers with JSON for outbound commands,
//! viewer updates and per-frame damage. Debounce timers run on a virtual
//! clock that JavaScript advances through [`WhiteboardCanvas::tick`].

use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wb_core::migrate::parse_document;
use wb_core::model::{EntityKind, EntityRef, Point, Rect};
use wb_core::protocol::HostEvent;
use wb_core::EntityId;
use wb_editor::input::{InputEvent, Modifiers};
use wb_editor::persist::ManualScheduler;
use wb_editor::reconcile::CardViewers;
use wb_editor::select::DragState;
use wb_editor::sidebar::{RestorePlacement, SidebarTab, StashAdd};
use wb_editor::viewport::{FrameDamage, FrameScheduler, ZOOM_STEP};
use wb_editor::{SessionServices, WhiteboardSession};

// ─── Collaborators ───────────────────────────────────────────────────────

/// A change to one embedded markdown viewer, applied by the webview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ViewerUpdate {
    Render { card_id: EntityId, content: String },
    Destroy { card_id: EntityId },
}

#[derive(Clone, Default)]
struct QueuedViewers {
    queue: Rc<RefCell<Vec<ViewerUpdate>>>,
}

impl CardViewers for QueuedViewers {
    fn render(&mut self, card: EntityId, content: &str) {
        self.queue.borrow_mut().push(ViewerUpdate::Render {
            card_id: card,
            content: content.to_string(),
        });
    }

    fn destroy(&mut self, card: EntityId) {
        self.queue
            .borrow_mut()
            .push(ViewerUpdate::Destroy { card_id: card });
    }
}

/// Records that a frame is wanted and pokes the JS `requestAnimationFrame`
/// shim when one is registered.
#[derive(Clone, Default)]
struct JsFrames {
    requested: Rc<Cell<bool>>,
    callback: Rc<RefCell<Option<js_sys::Function>>>,
}

impl FrameScheduler for JsFrames {
    fn request_frame(&mut self) {
        self.requested.set(true);
        if let Some(callback) = self.callback.borrow().as_ref()
            && let Err(err) = callback.call0(&JsValue::NULL)
        {
            log::warn!("frame callback failed: {err:?}");
        }
    }
}

// ─── Canvas ──────────────────────────────────────────────────────────────

#[wasm_bindgen]
pub struct WhiteboardCanvas {
    session: WhiteboardSession,
    timers: ManualScheduler,
    viewers: QueuedViewers,
    frames: JsFrames,
}

#[wasm_bindgen]
impl WhiteboardCanvas {
    /// Create a canvas with the container size and the current
    /// `Date.now()`.
    #[wasm_bindgen(constructor)]
    pub fn new(width: f64, height: f64, now_ms: f64) -> Self {
        console_error_panic_hook_setup();
        let timers = ManualScheduler::new(now_ms as i64);
        let viewers = QueuedViewers::default();
        let frames = JsFrames::default();
        let services = SessionServices {
            scheduler: Box::new(timers.clone()),
            frames: Box::new(frames.clone()),
            viewers: Box::new(viewers.clone()),
            clock: Box::new(timers.clone()),
        };
        Self {
            session: WhiteboardSession::new(width, height, services),
            timers,
            viewers,
            frames,
        }
    }

    /// Register a function called whenever a frame is wanted.
    pub fn set_frame_callback(&mut self, callback: js_sys::Function) {
        *self.frames.callback.borrow_mut() = Some(callback);
    }

    /// Advance the virtual clock and fire any timers that came due.
    /// Returns how many fired.
    pub fn tick(&mut self, now_ms: f64) -> usize {
        let due = self.timers.advance_to(now_ms as i64);
        let fired = due.len();
        for id in due {
            self.session.on_timer(id);
        }
        fired
    }

    pub fn needs_frame(&self) -> bool {
        self.frames.requested.get()
    }

    /// Take the damage accumulated since the last frame, as JSON.
    pub fn animation_frame(&mut self) -> String {
        self.frames.requested.set(false);
        let damage = self.session.animation_frame();
        damage_json(&damage).to_string()
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.session.set_container_size(width, height);
    }

    // ─── Messages ────────────────────────────────────────────────────────

    /// Feed one input event (JSON). Returns whether the session consumed it.
    pub fn handle_input(&mut self, json: &str) -> bool {
        match serde_json::from_str::<InputEvent>(json) {
            Ok(event) => self.session.handle_input(&event),
            Err(err) => {
                log::warn!("bad input event: {err}");
                false
            }
        }
    }

    /// Deliver one message from the host (JSON).
    pub fn handle_host_message(&mut self, json: &str) -> bool {
        match serde_json::from_str::<HostEvent>(json) {
            Ok(event) => {
                self.session.handle_host_event(event);
                true
            }
            Err(err) => {
                log::warn!("bad host message: {err}");
                false
            }
        }
    }

    /// Drain the commands for the host, as a JSON array.
    pub fn take_outbound(&mut self) -> String {
        to_json(&self.session.take_outbound())
    }

    /// Drain pending viewer renders and teardowns, as a JSON array.
    pub fn take_viewer_updates(&mut self) -> String {
        let updates = std::mem::take(&mut *self.viewers.queue.borrow_mut());
        to_json(&updates)
    }

    // ─── State queries ───────────────────────────────────────────────────

    /// The whole scene in document form.
    pub fn get_scene_json(&self) -> String {
        to_json(&self.session.scene().serialize())
    }

    /// Viewport, selection, sidebar and history state.
    pub fn get_view_json(&self) -> String {
        view_json(&self.session).to_string()
    }

    pub fn card_list_json(&self) -> String {
        to_json(&self.session.card_list())
    }

    pub fn workspace_files_json(&self) -> String {
        to_json(&self.session.workspace_files())
    }

    pub fn workspace_folders_json(&self) -> String {
        to_json(&self.session.workspace_folders())
    }

    pub fn card_folder_path(&self) -> Option<String> {
        self.session.card_folder_path().map(str::to_string)
    }

    pub fn pinned_content(&self) -> Option<String> {
        self.session.pinned_content().map(str::to_string)
    }

    pub fn is_disconnected(&self, card_id: &str) -> bool {
        self.session
            .reconciler()
            .is_disconnected(EntityId::intern(card_id))
    }

    // ─── View hooks ──────────────────────────────────────────────────────

    /// Screen rect of the stash list while it is laid out.
    pub fn set_stash_zone(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.session.set_stash_zone(Some(Rect {
            x,
            y,
            width,
            height,
        }));
    }

    pub fn clear_stash_zone(&mut self) {
        self.session.set_stash_zone(None);
    }

    pub fn set_text_editing(&mut self, editing: bool) {
        self.session.set_text_editing(editing);
    }

    // ─── Canvas actions ──────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        self.session.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.session.redo()
    }

    pub fn zoom_in(&mut self) -> bool {
        self.session.zoom_by(ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.session.zoom_by(-ZOOM_STEP)
    }

    pub fn reset_zoom(&mut self) {
        self.session.reset_zoom();
    }

    pub fn center_view(&mut self) {
        self.session.center_view();
    }

    pub fn navigate_to_card(&mut self, card_id: &str) -> bool {
        self.session.navigate_to_card(EntityId::intern(card_id))
    }

    /// Add a block at a canvas point. Returns the new id.
    pub fn add_block_at(&mut self, x: f64, y: f64) -> String {
        self.session
            .add_block(Some(Point { x, y }))
            .as_str()
            .to_string()
    }

    /// Add a block at the viewport center.
    pub fn add_block(&mut self) -> String {
        self.session.add_block(None).as_str().to_string()
    }

    pub fn set_block_text(&mut self, block_id: &str, text: &str) -> bool {
        self.session
            .set_block_text(EntityId::intern(block_id), text)
    }

    pub fn link_block(&mut self, block_id: &str, file_path: &str) -> bool {
        self.session
            .link_block(EntityId::intern(block_id), file_path)
    }

    pub fn unlink_block(&mut self, block_id: &str) -> bool {
        self.session.unlink_block(EntityId::intern(block_id))
    }

    /// `kind` is `"block"` or `"card"`; `None` clears the color.
    pub fn set_color(&mut self, kind: &str, id: &str, color: Option<String>) -> bool {
        match entity_ref(kind, id) {
            Some(entity) => self.session.set_color(entity, color),
            None => false,
        }
    }

    pub fn delete_entity(&mut self, kind: &str, id: &str) -> bool {
        match entity_ref(kind, id) {
            Some(entity) => self.session.delete_entity(entity),
            None => false,
        }
    }

    pub fn delete_selected(&mut self) -> usize {
        self.session.delete_selected()
    }

    // ─── Cards ───────────────────────────────────────────────────────────

    pub fn add_card(&mut self, file_path: &str) -> String {
        self.session.add_card(file_path).as_str().to_string()
    }

    pub fn toggle_collapsed(&mut self, card_id: &str) -> bool {
        self.session.toggle_collapsed(EntityId::intern(card_id))
    }

    pub fn card_content_edited(&mut self, card_id: &str, markdown: String) -> bool {
        self.session
            .card_content_edited(EntityId::intern(card_id), markdown)
    }

    pub fn focus_card(&mut self, card_id: &str) {
        self.session.focus_card(EntityId::intern(card_id));
    }

    pub fn blur_card(&mut self, card_id: &str) -> bool {
        self.session.blur_card(EntityId::intern(card_id))
    }

    pub fn reconnect_card(&mut self, card_id: &str) -> bool {
        self.session.reconnect_card(EntityId::intern(card_id))
    }

    pub fn open_card_file(&mut self, card_id: &str, split_view: bool) -> bool {
        self.session
            .open_card_file(EntityId::intern(card_id), split_view)
    }

    /// Ask the host to create a markdown file. An empty `for_block` means
    /// no block.
    pub fn create_new_card(&mut self, file_name: &str, for_block: &str, to_stash: bool) -> bool {
        let for_block = (!for_block.is_empty()).then(|| EntityId::intern(for_block));
        self.session.create_new_card(file_name, for_block, to_stash)
    }

    pub fn rename_card(&mut self, card_id: &str, new_name: &str) -> bool {
        self.session
            .rename_card(EntityId::intern(card_id), new_name)
    }

    pub fn move_card(&mut self, card_id: &str, target_folder: &str) -> bool {
        self.session
            .move_card(EntityId::intern(card_id), target_folder)
    }

    pub fn browse_file(&mut self, block_id: &str) -> bool {
        self.session.browse_file(EntityId::intern(block_id))
    }

    pub fn open_file(&mut self, file_path: &str, split_view: bool) {
        self.session.open_file(file_path, split_view);
    }

    pub fn request_state(&mut self) {
        self.session.request_state();
    }

    pub fn request_workspace_files(&mut self) {
        self.session.request_workspace_files();
    }

    pub fn request_workspace_folders(&mut self) {
        self.session.request_workspace_folders();
    }

    pub fn request_card_folder_path(&mut self) {
        self.session.request_card_folder_path();
    }

    // ─── Sidebar ─────────────────────────────────────────────────────────

    pub fn show_sidebar_tab(&mut self, tab: &str) -> bool {
        match SidebarTab::parse(tab) {
            Some(tab) => {
                self.session.show_sidebar_tab(tab);
                true
            }
            None => false,
        }
    }

    pub fn toggle_sidebar_tab(&mut self, tab: &str) -> bool {
        match SidebarTab::parse(tab) {
            Some(tab) => {
                self.session.toggle_sidebar_tab(tab);
                true
            }
            None => false,
        }
    }

    pub fn close_sidebar(&mut self) {
        self.session.close_sidebar();
    }

    pub fn set_color_filter(&mut self, color: Option<String>) {
        self.session.set_color_filter(color);
    }

    pub fn activate_card_entry(
        &mut self,
        card_id: &str,
        shift: bool,
        ctrl: bool,
        alt: bool,
        meta: bool,
    ) -> bool {
        let modifiers = Modifiers {
            shift,
            ctrl,
            alt,
            meta,
        };
        self.session
            .activate_card_entry(EntityId::intern(card_id), modifiers)
    }

    pub fn pin_file(&mut self, file_path: &str) -> bool {
        self.session.pin_file(file_path)
    }

    pub fn unpin_file(&mut self, file_path: &str) -> bool {
        self.session.unpin_file(file_path)
    }

    pub fn select_pinned(&mut self, file_path: &str) -> bool {
        self.session.select_pinned(file_path)
    }

    pub fn pinned_content_edited(&mut self, content: String) -> bool {
        self.session.pinned_content_edited(content)
    }

    pub fn stash_card(&mut self, card_id: &str) -> bool {
        self.session.stash_card(EntityId::intern(card_id))
    }

    /// Returns `{"id":..,"added":bool}`; `added` is false when the path was
    /// already stashed.
    pub fn add_to_stash(&mut self, file_path: &str) -> String {
        let (id, added) = match self.session.add_to_stash(file_path) {
            StashAdd::Added(id) => (id, true),
            StashAdd::Existing(id) => (id, false),
        };
        serde_json::json!({ "id": id, "added": added }).to_string()
    }

    /// Restore to the recorded position. Returns the card id, if any.
    pub fn restore_from_stash(&mut self, stash_id: &str) -> Option<String> {
        self.session
            .restore_from_stash(EntityId::intern(stash_id), RestorePlacement::Original)
            .map(|id| id.as_str().to_string())
    }

    /// Restore at a screen drop point.
    pub fn restore_from_stash_at(&mut self, stash_id: &str, x: f64, y: f64) -> Option<String> {
        self.session
            .restore_from_stash_at(EntityId::intern(stash_id), Point { x, y })
            .map(|id| id.as_str().to_string())
    }

    pub fn delete_from_stash(&mut self, stash_id: &str) -> bool {
        self.session.delete_from_stash(EntityId::intern(stash_id))
    }

    /// Flush unsaved changes now, e.g. on `visibilitychange`.
    pub fn force_save(&mut self) -> bool {
        self.session.force_save()
    }
}

// ─── JSON helpers ────────────────────────────────────────────────────────

fn view_json(session: &WhiteboardSession) -> serde_json::Value {
    let viewport = session.viewport();
    let sidebar = session.sidebar();
    serde_json::json!({
        "zoom": viewport.zoom(),
        "pan": viewport.pan(),
        "selection": session.selection().to_vec(),
        "selectionBox": session.selection_box(),
        "gesture": gesture_name(session.drag_state()),
        "canUndo": session.history().can_undo(),
        "canRedo": session.history().can_redo(),
        "dirty": session.saver().is_dirty(),
        "loaded": session.is_loaded(),
        "sidebar": {
            "open": sidebar.is_open(),
            "tab": sidebar.tab(),
            "stashVisible": sidebar.stash_visible(),
            "currentPinned": session.current_pinned(),
            "colorFilter": sidebar.color_filter(),
        },
    })
}

fn gesture_name(state: &DragState) -> &'static str {
    match state {
        DragState::Idle => "idle",
        DragState::SingleDragging(_) => "singleDragging",
        DragState::MultiDragging(_) => "multiDragging",
        DragState::BoxSelecting { .. } => "boxSelecting",
        DragState::Resizing { .. } => "resizing",
        DragState::Panning { .. } => "panning",
    }
}

fn damage_json(damage: &FrameDamage) -> serde_json::Value {
    let mut entities: Vec<EntityRef> = damage.entities.iter().copied().collect();
    entities.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
    serde_json::json!({
        "transform": damage.transform,
        "structure": damage.structure,
        "overlay": damage.overlay,
        "entities": entities,
    })
}

fn entity_ref(kind: &str, id: &str) -> Option<EntityRef> {
    let kind = match kind {
        "block" => EntityKind::Block,
        "card" => EntityKind::Card,
        _ => return None,
    };
    Some(EntityRef {
        id: EntityId::intern(id),
        kind,
    })
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        log::error!("serialization failed: {e}");
        "null".to_string()
    })
}

// ─── Panic hook for WASM debugging ───────────────────────────────────────

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("Whiteboard WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

// ─── Standalone validation (no canvas needed) ────────────────────────────

/// Check that a whiteboard file parses. Returns JSON `{"ok":true,"version":n}`
/// or `{"ok":false,"error":"..."}`.
#[wasm_bindgen]
pub fn validate_document(text: &str) -> String {
    match parse_document(text, 0) {
        Ok(doc) => serde_json::json!({ "ok": true, "version": doc.version }).to_string(),
        Err(e) => serde_json::json!({ "ok": false, "error": e.to_string() }).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    const DOC: &str = r#"{
        "command": "loadState",
        "state": {
            "version": 2,
            "blocks": [{"id": "wa_block", "x": 0, "y": 0, "text": "hi"}],
            "cards": [{"id": "wa_card", "x": 400, "y": 0, "filePath": "notes/a.md", "lastModified": 1}],
            "pinnedFiles": [],
            "stashCards": []
        }
    }"#;

    fn loaded() -> WhiteboardCanvas {
        let mut canvas = WhiteboardCanvas::new(1000.0, 800.0, 0.0);
        assert!(canvas.handle_host_message(DOC));
        canvas
    }

    fn json(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn load_requests_card_content() {
        let mut canvas = loaded();
        let outbound = json(&canvas.take_outbound());
        let commands: Vec<&str> = outbound
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["command"].as_str().unwrap())
            .collect();
        assert!(commands.contains(&"readCardContent"));
        assert!(canvas.needs_frame());

        let damage = json(&canvas.animation_frame());
        assert_eq!(damage["structure"], Value::Bool(true));
        assert!(!canvas.needs_frame());
    }

    #[test]
    fn card_content_reaches_the_viewer_queue() {
        let mut canvas = loaded();
        canvas.handle_host_message(
            r##"{"command": "cardContent", "cardId": "wa_card", "content": "# A"}"##,
        );
        let updates = json(&canvas.take_viewer_updates());
        assert_eq!(
            updates,
            json(r##"[{"type": "render", "cardId": "wa_card", "content": "# A"}]"##)
        );
        assert_eq!(json(&canvas.take_viewer_updates()), json("[]"));
    }

    #[test]
    fn edit_saves_after_the_debounce() {
        let mut canvas = loaded();
        canvas.take_outbound();
        assert!(canvas.set_block_text("wa_block", "changed"));
        assert_eq!(json(&canvas.get_view_json())["dirty"], Value::Bool(true));
        assert_eq!(json(&canvas.take_outbound()), json("[]"));

        assert_eq!(canvas.tick(10_000.0), 1);
        let outbound = json(&canvas.take_outbound());
        assert_eq!(outbound[0]["command"], "saveState");
        assert_eq!(outbound[0]["state"]["blocks"][0]["text"], "changed");
    }

    #[test]
    fn malformed_messages_are_rejected() {
        let mut canvas = loaded();
        assert!(!canvas.handle_input("{\"type\": \"nope\"}"));
        assert!(!canvas.handle_host_message("not json"));
    }

    #[test]
    fn sidebar_state_is_reported() {
        let mut canvas = loaded();
        assert!(canvas.show_sidebar_tab("stash"));
        assert!(!canvas.show_sidebar_tab("elsewhere"));
        let view = json(&canvas.get_view_json());
        assert_eq!(view["sidebar"]["open"], Value::Bool(true));
        assert_eq!(view["sidebar"]["tab"], "stash");
        assert_eq!(view["sidebar"]["stashVisible"], Value::Bool(true));
    }

    #[test]
    fn stash_and_restore_by_id() {
        let mut canvas = loaded();
        assert!(canvas.stash_card("wa_card"));
        let scene = json(&canvas.get_scene_json());
        assert_eq!(scene["cards"], json("[]"));
        let stash_id = scene["stashCards"][0]["id"].as_str().unwrap().to_string();

        let again = json(&canvas.add_to_stash("notes/a.md"));
        assert_eq!(again["added"], Value::Bool(false));
        assert_eq!(again["id"], stash_id.as_str());

        let card = canvas.restore_from_stash(&stash_id).unwrap();
        let scene = json(&canvas.get_scene_json());
        assert_eq!(scene["cards"][0]["id"], card.as_str());
        assert_eq!(scene["stashCards"], json("[]"));
    }

    #[test]
    fn validation_reports_parse_errors() {
        assert_eq!(
            json(&validate_document(r#"{"version": 2, "blocks": [], "cards": []}"#))["ok"],
            Value::Bool(true)
        );
        assert_eq!(json(&validate_document("{"))["ok"], Value::Bool(false));
    }
}
