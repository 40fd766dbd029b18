//! Integration tests: a whole session driven through its public surface,
//! with virtual time, counted frame requests and recorded card viewers.

use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;
use wb_core::model::{EntityRef, Point, WhiteboardDocument};
use wb_core::protocol::{HostEvent, ViewCommand};
use wb_core::EntityId;
use wb_editor::input::{CancelReason, InputEvent, Modifiers};
use wb_editor::persist::ManualScheduler;
use wb_editor::reconcile::CardViewers;
use wb_editor::select::DragState;
use wb_editor::viewport::FrameScheduler;
use wb_editor::{SessionServices, WhiteboardSession};

#[derive(Clone, Default)]
struct FrameCounter(Rc<RefCell<usize>>);

impl FrameScheduler for FrameCounter {
    fn request_frame(&mut self) {
        *self.0.borrow_mut() += 1;
    }
}

#[derive(Clone, Default)]
struct Viewers(Rc<RefCell<Vec<(EntityId, String)>>>);

impl CardViewers for Viewers {
    fn render(&mut self, card: EntityId, content: &str) {
        self.0.borrow_mut().push((card, content.to_string()));
    }

    fn destroy(&mut self, _card: EntityId) {}
}

struct Harness {
    session: WhiteboardSession,
    timers: ManualScheduler,
    frames: FrameCounter,
    viewers: Viewers,
}

impl Harness {
    fn new() -> Self {
        let timers = ManualScheduler::new(1_700_000_000_000);
        let frames = FrameCounter::default();
        let viewers = Viewers::default();
        let services = SessionServices {
            scheduler: Box::new(timers.clone()),
            frames: Box::new(frames.clone()),
            viewers: Box::new(viewers.clone()),
            clock: Box::new(timers.clone()),
        };
        let mut session = WhiteboardSession::new(800.0, 600.0, services);
        session.handle_host_event(HostEvent::LoadState {
            state: WhiteboardDocument::default(),
        });
        session.take_outbound();
        session.animation_frame();
        Self {
            session,
            timers,
            frames,
            viewers,
        }
    }

    fn advance(&mut self, ms: i64) {
        for id in self.timers.advance(ms) {
            self.session.on_timer(id);
        }
    }

    fn screen(&self, canvas: Point) -> Point {
        self.session.viewport().canvas_to_screen(canvas)
    }

    fn down(&mut self, canvas: Point) {
        let p = self.screen(canvas);
        self.session.handle_input(&InputEvent::pointer_down(p.x, p.y));
    }

    fn move_to(&mut self, canvas: Point) {
        let p = self.screen(canvas);
        self.session.handle_input(&InputEvent::pointer_move(p.x, p.y));
    }

    fn up(&mut self, canvas: Point) {
        let p = self.screen(canvas);
        self.session.handle_input(&InputEvent::pointer_up(p.x, p.y));
    }

    fn saved(&mut self) -> Vec<WhiteboardDocument> {
        self.session
            .take_outbound()
            .into_iter()
            .filter_map(|c| match c {
                ViewCommand::SaveState { state } => Some(state),
                _ => None,
            })
            .collect()
    }
}

// ─── End to end ─────────────────────────────────────────────────────────

#[test]
fn drag_undo_and_save_round_trip() {
    let mut h = Harness::new();
    let block = h.session.add_block(Some(Point::ORIGIN));
    let entity = EntityRef::block(block);

    h.down(Point::new(10.0, 10.0));
    h.move_to(Point::new(70.0, 50.0));
    h.up(Point::new(130.0, 90.0));

    assert_eq!(h.session.history().undo_len(), 1);
    let action = h.session.history().peek_undo().unwrap();
    assert_eq!(action.items.len(), 1);
    assert_eq!(action.items[0].entity, entity);
    assert_eq!(action.items[0].before, Point::new(0.0, 0.0));
    assert_eq!(action.items[0].after, Point::new(120.0, 80.0));

    assert!(h.session.undo());
    assert_eq!(h.session.scene().position(entity), Some(Point::new(0.0, 0.0)));

    h.advance(500);
    let saves = h.saved();
    assert_eq!(saves.len(), 1);
    assert_eq!((saves[0].blocks[0].x, saves[0].blocks[0].y), (0.0, 0.0));
}

// ─── Persistence ────────────────────────────────────────────────────────

#[test]
fn rapid_edits_coalesce_into_one_save_of_the_latest_state() {
    let mut h = Harness::new();
    let block = h.session.add_block(Some(Point::ORIGIN));
    for i in 0..20 {
        h.session.set_block_text(block, &format!("draft {i}"));
        h.advance(50);
    }
    assert!(h.saved().is_empty());

    h.advance(500);
    let saves = h.saved();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].blocks[0].text, "draft 19");

    // Nothing changed since, so a forced save writes nothing.
    assert!(!h.session.force_save());
}

// ─── Frame batching ─────────────────────────────────────────────────────

#[test]
fn many_moves_between_frames_request_one_frame() {
    let mut h = Harness::new();
    h.session.add_block(Some(Point::ORIGIN));
    h.session.animation_frame();
    let before = *h.frames.0.borrow();

    h.down(Point::new(10.0, 10.0));
    for i in 1..=50 {
        h.move_to(Point::new(10.0 + i as f64, 10.0));
    }
    assert_eq!(*h.frames.0.borrow() - before, 1);

    let damage = h.session.animation_frame();
    assert_eq!(damage.entities.len(), 1);
    h.move_to(Point::new(100.0, 10.0));
    assert_eq!(*h.frames.0.borrow() - before, 2);
    h.up(Point::new(100.0, 10.0));
}

// ─── Cancellation ───────────────────────────────────────────────────────

#[test]
fn blur_aborts_box_select_without_touching_selection() {
    let mut h = Harness::new();
    let block = h.session.add_block(Some(Point::ORIGIN));
    h.down(Point::new(10.0, 10.0));
    h.up(Point::new(10.0, 10.0));
    assert!(h.session.selection().contains(EntityRef::block(block)));

    h.down(Point::new(-500.0, -500.0));
    h.move_to(Point::new(500.0, 500.0));
    assert!(h.session.selection_box().is_some());
    h.session.handle_input(&InputEvent::Cancel {
        reason: CancelReason::WindowBlur,
    });

    assert_eq!(h.session.drag_state(), &DragState::Idle);
    assert_eq!(h.session.selection_box(), None);
    assert_eq!(h.session.selection().to_vec(), vec![EntityRef::block(block)]);
}

#[test]
fn box_select_picks_up_partial_overlaps() {
    let mut h = Harness::new();
    let inside = h.session.add_block(Some(Point::new(0.0, 0.0)));
    let straddling = h.session.add_block(Some(Point::new(250.0, 0.0)));
    let outside = h.session.add_block(Some(Point::new(1000.0, 0.0)));

    h.down(Point::new(-10.0, -10.0));
    h.move_to(Point::new(300.0, 50.0));
    h.up(Point::new(300.0, 50.0));

    let selected = h.session.selection();
    assert!(selected.contains(EntityRef::block(inside)));
    assert!(selected.contains(EntityRef::block(straddling)));
    assert!(!selected.contains(EntityRef::block(outside)));
}

// ─── External changes ───────────────────────────────────────────────────

#[test]
fn deleted_file_disconnects_until_read_succeeds() {
    let mut h = Harness::new();
    let card = h.session.add_card_at("notes/p.md", Point::new(40.0, 60.0));
    let geometry = h.session.scene().card(card).unwrap().bounds();

    h.session.handle_host_event(HostEvent::FileDeleted {
        card_id: card,
        file_path: "notes/p.md".into(),
    });
    assert!(h.session.reconciler().is_disconnected(card));
    assert!(!h.session.card_content_edited(card, "lost".into()));

    assert!(h.session.reconnect_card(card));
    h.session.handle_host_event(HostEvent::CardContent {
        card_id: card,
        content: "# back".into(),
    });

    assert!(!h.session.reconciler().is_disconnected(card));
    let restored = h.session.scene().card(card).unwrap();
    assert_eq!(restored.id, card);
    assert_eq!(restored.bounds(), geometry);
    assert!(h.session.card_content_edited(card, "# back again".into()));
}

#[test]
fn change_while_focused_waits_for_blur() {
    let mut h = Harness::new();
    let card = h.session.add_card_at("live.md", Point::ORIGIN);
    h.session.handle_host_event(HostEvent::CardContent {
        card_id: card,
        content: "v1".into(),
    });
    h.session.focus_card(card);
    h.session.handle_host_event(HostEvent::FileChanged {
        card_id: card,
        file_path: "live.md".into(),
        content: "v2".into(),
    });
    assert_eq!(h.viewers.0.borrow().last().unwrap().1, "v1");

    assert!(h.session.blur_card(card));
    assert_eq!(h.viewers.0.borrow().last().unwrap().1, "v2");
}

#[test]
fn own_save_echo_does_not_overwrite_newer_typing() {
    let mut h = Harness::new();
    let card = h.session.add_card_at("typing.md", Point::ORIGIN);
    h.session.handle_host_event(HostEvent::CardContent {
        card_id: card,
        content: "ab".into(),
    });
    let rendered = h.viewers.0.borrow().len();

    h.session.focus_card(card);
    assert!(h.session.card_content_edited(card, "abc".into()));
    assert!(h.session.card_content_edited(card, "abcd".into()));
    h.session.handle_host_event(HostEvent::FileChanged {
        card_id: card,
        file_path: "typing.md".into(),
        content: "abc".into(),
    });

    assert!(!h.session.blur_card(card));
    assert_eq!(h.viewers.0.borrow().len(), rendered);
}

#[test]
fn rename_events_rewrite_paths_and_persist() {
    let mut h = Harness::new();
    let card = h.session.add_card_at("old.md", Point::ORIGIN);
    let block = h.session.add_block(Some(Point::new(600.0, 0.0)));
    h.session.link_block(block, "old.md");
    h.session.pin_file("old.md");
    h.advance(500);
    h.saved();

    h.session.handle_host_event(HostEvent::FileRenamed {
        card_id: card,
        old_path: "old.md".into(),
        new_path: "archive/old.md".into(),
    });
    h.session.handle_host_event(HostEvent::BlockFileRenamed {
        block_id: block,
        old_path: "old.md".into(),
        new_path: "archive/old.md".into(),
    });
    h.session.handle_host_event(HostEvent::PinnedFileRenamed {
        old_path: "old.md".into(),
        new_path: "archive/old.md".into(),
    });
    h.advance(500);

    let saves = h.saved();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].cards[0].file_path, "archive/old.md");
    assert_eq!(saves[0].blocks[0].linked_file.as_deref(), Some("archive/old.md"));
    assert_eq!(saves[0].pinned_files, vec!["archive/old.md".to_string()]);
    assert_eq!(h.session.current_pinned(), Some("archive/old.md"));
}

// ─── Keyboard ───────────────────────────────────────────────────────────

#[test]
fn keyboard_undo_redo_and_zoom_reset() {
    let mut h = Harness::new();
    let block = h.session.add_block(Some(Point::ORIGIN));
    h.down(Point::new(10.0, 10.0));
    h.up(Point::new(60.0, 10.0));

    let cmd = Modifiers {
        meta: true,
        ..Modifiers::NONE
    };
    h.session.handle_input(&InputEvent::KeyDown {
        key: "z".into(),
        modifiers: cmd,
    });
    assert_eq!(
        h.session.scene().position(EntityRef::block(block)),
        Some(Point::new(0.0, 0.0))
    );
    h.session.handle_input(&InputEvent::KeyDown {
        key: "z".into(),
        modifiers: Modifiers { shift: true, ..cmd },
    });
    assert_eq!(
        h.session.scene().position(EntityRef::block(block)),
        Some(Point::new(50.0, 0.0))
    );

    h.session.handle_input(&InputEvent::KeyDown {
        key: "-".into(),
        modifiers: cmd,
    });
    assert!((h.session.viewport().zoom() - 0.9).abs() < 1e-9);
    h.session.handle_input(&InputEvent::KeyDown {
        key: "0".into(),
        modifiers: cmd,
    });
    assert_eq!(h.session.viewport().zoom(), 1.0);
}

#[test]
fn space_held_turns_primary_drag_into_pan() {
    let mut h = Harness::new();
    let block = h.session.add_block(Some(Point::ORIGIN));
    let pan = h.session.viewport().pan();
    h.session.handle_input(&InputEvent::KeyDown {
        key: " ".into(),
        modifiers: Modifiers::NONE,
    });

    let start = h.screen(Point::new(10.0, 10.0));
    h.session.handle_input(&InputEvent::pointer_down(start.x, start.y));
    h.session.handle_input(&InputEvent::pointer_move(start.x + 40.0, start.y + 30.0));
    h.session.handle_input(&InputEvent::pointer_up(start.x + 40.0, start.y + 30.0));
    h.session.handle_input(&InputEvent::KeyUp { key: " ".into() });

    assert_eq!(h.session.viewport().pan(), Point::new(pan.x + 40.0, pan.y + 30.0));
    assert_eq!(
        h.session.scene().position(EntityRef::block(block)),
        Some(Point::ORIGIN)
    );
    assert!(!h.session.history().can_undo());
}
