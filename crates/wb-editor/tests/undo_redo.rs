//! Integration tests: position history across the scene model and the
//! drag engine.

use pretty_assertions::assert_eq;
use wb_core::model::{Block, Card, EntityRef, Point, Rect};
use wb_core::{EntityId, SceneModel};
use wb_editor::commands::CommandStack;
use wb_editor::input::{InputEvent, Modifiers};
use wb_editor::select::DragEngine;
use wb_editor::viewport::Viewport;

struct Canvas {
    scene: SceneModel,
    viewport: Viewport,
    engine: DragEngine,
    history: CommandStack,
}

impl Canvas {
    fn new() -> Self {
        let mut scene = SceneModel::new();
        scene.add_block(Block::new(EntityId::intern("ur_a"), 0.0, 0.0));
        scene.add_block(Block::new(EntityId::intern("ur_b"), 400.0, 0.0));
        scene.add_card(Card::new(
            EntityId::intern("ur_c"),
            "c.md",
            Rect::new(0.0, 400.0, 300.0, 200.0),
            0,
        ));
        Self {
            scene,
            viewport: Viewport::new(1200.0, 900.0),
            engine: DragEngine::new(),
            history: CommandStack::default(),
        }
    }

    fn send(&mut self, event: InputEvent) {
        self.engine
            .handle(&event, &mut self.scene, &mut self.viewport, &mut self.history);
    }

    fn drag(&mut self, from: (f64, f64), to: (f64, f64), modifiers: Modifiers) {
        self.send(InputEvent::PointerDown {
            x: from.0,
            y: from.1,
            button: Default::default(),
            modifiers,
        });
        self.send(InputEvent::pointer_move(to.0, to.1));
        self.send(InputEvent::pointer_up(to.0, to.1));
    }

    fn pos(&self, id: &str, card: bool) -> Point {
        let id = EntityId::intern(id);
        let entity = if card {
            EntityRef::card(id)
        } else {
            EntityRef::block(id)
        };
        self.scene.position(entity).unwrap()
    }
}

#[test]
fn undo_all_then_redo_all_lands_on_final_positions() {
    let mut c = Canvas::new();
    c.drag((10.0, 10.0), (60.0, 10.0), Modifiers::NONE);
    c.drag((410.0, 10.0), (410.0, 110.0), Modifiers::NONE);
    c.drag((10.0, 410.0), (110.0, 510.0), Modifiers::NONE);
    let finals = (c.pos("ur_a", false), c.pos("ur_b", false), c.pos("ur_c", true));
    assert_eq!(c.history.undo_len(), 3);

    while c.history.undo(&mut c.scene).is_some() {}
    assert_eq!(c.pos("ur_a", false), Point::new(0.0, 0.0));
    assert_eq!(c.pos("ur_b", false), Point::new(400.0, 0.0));
    assert_eq!(c.pos("ur_c", true), Point::new(0.0, 400.0));

    while c.history.redo(&mut c.scene).is_some() {}
    assert_eq!(
        (c.pos("ur_a", false), c.pos("ur_b", false), c.pos("ur_c", true)),
        finals
    );
}

#[test]
fn single_undo_touches_only_its_own_items() {
    let mut c = Canvas::new();
    c.drag((10.0, 10.0), (60.0, 10.0), Modifiers::NONE);
    c.drag((410.0, 10.0), (410.0, 110.0), Modifiers::NONE);

    let touched = c.history.undo(&mut c.scene).unwrap();

    assert_eq!(touched, vec![EntityRef::block(EntityId::intern("ur_b"))]);
    assert_eq!(c.pos("ur_b", false), Point::new(400.0, 0.0));
    assert_eq!(c.pos("ur_a", false), Point::new(50.0, 0.0));
}

#[test]
fn multi_drag_is_one_action() {
    let mut c = Canvas::new();
    c.drag((10.0, 10.0), (10.0, 10.0), Modifiers::NONE);
    c.send(InputEvent::PointerDown {
        x: 410.0,
        y: 10.0,
        button: Default::default(),
        modifiers: Modifiers::SHIFT,
    });
    c.send(InputEvent::pointer_up(410.0, 10.0));
    assert_eq!(c.engine.selection().len(), 2);

    c.drag((20.0, 20.0), (40.0, 60.0), Modifiers::NONE);

    assert_eq!(c.history.undo_len(), 1);
    assert_eq!(c.history.peek_undo().unwrap().items.len(), 2);
    c.history.undo(&mut c.scene);
    assert_eq!(c.pos("ur_a", false), Point::new(0.0, 0.0));
    assert_eq!(c.pos("ur_b", false), Point::new(400.0, 0.0));
}

#[test]
fn resize_is_not_recorded() {
    let mut c = Canvas::new();
    // Bottom-right corner of the card.
    c.drag((300.0, 600.0), (400.0, 700.0), Modifiers::NONE);
    let card = c.scene.card(EntityId::intern("ur_c")).unwrap();
    assert_eq!((card.width, card.height), (400.0, 300.0));
    assert!(!c.history.can_undo());
}
