//! Selection & drag engine.
//!
//! A state machine over pointer input:
//!
//! | From | Trigger | To |
//! |------|---------|----|
//! | Idle | down on unselected entity | SingleDragging (selection replaced) |
//! | Idle | down on selected entity | MultiDragging (whole selection) |
//! | Idle | Shift + down on entity | Idle (membership toggled) |
//! | Idle | down on empty canvas | BoxSelecting |
//! | Idle | down on a card edge or corner | Resizing |
//! | Idle | middle button, Alt or Space + down | Panning |
//! | any gesture | up | Idle |
//! | BoxSelecting, Panning | blur / leave / hidden | Idle, nothing applied |
//!
//! Drags move entities live and bracket the gesture in the undo history.
//! Releasing a drag that carries cards over the stash drop zone turns it
//! into a stash transfer: everything snaps back to its pre-drag position,
//! the batch is discarded, and the caller moves the cards to the stash.

use crate::commands::CommandStack;
use crate::input::{CancelReason, InputEvent, Modifiers, PointerButton, ResizeDirection};
use crate::viewport::Viewport;
use wb_core::model::{CARD_MIN_HEIGHT, CARD_MIN_WIDTH, EntityKind, EntityRef, Point, Rect};
use wb_core::{EntityId, SceneModel};

/// Screen-space thickness of a card's resize handles.
pub const RESIZE_HANDLE_PX: f64 = 8.0;

// ─── Selection ───────────────────────────────────────────────────────────

/// Ordered, duplicate-free set of selected entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    items: Vec<EntityRef>,
}

impl Selection {
    pub fn contains(&self, entity: EntityRef) -> bool {
        self.items.contains(&entity)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.items.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<EntityRef> {
        self.items.clone()
    }

    pub fn cards(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.items
            .iter()
            .filter(|e| e.kind == EntityKind::Card)
            .map(|e| e.id)
    }

    pub fn insert(&mut self, entity: EntityRef) -> bool {
        if self.contains(entity) {
            return false;
        }
        self.items.push(entity);
        true
    }

    pub fn toggle(&mut self, entity: EntityRef) {
        if let Some(pos) = self.items.iter().position(|e| *e == entity) {
            self.items.remove(pos);
        } else {
            self.items.push(entity);
        }
    }

    pub fn replace(&mut self, entities: impl IntoIterator<Item = EntityRef>) {
        self.items.clear();
        for e in entities {
            self.insert(e);
        }
    }

    pub fn clear(&mut self) -> bool {
        let had = !self.items.is_empty();
        self.items.clear();
        had
    }

    pub fn retain(&mut self, keep: impl FnMut(&EntityRef) -> bool) {
        self.items.retain(keep);
    }
}

// ─── Hit testing ─────────────────────────────────────────────────────────

/// What lies under a canvas point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hit {
    Entity(EntityRef),
    ResizeHandle(EntityId, ResizeDirection),
}

/// Topmost entity or card handle under `p`. Handles extend `margin` canvas
/// units on either side of a card's edges.
pub fn hit_test(scene: &SceneModel, p: Point, margin: f64) -> Option<Hit> {
    for (entity, bounds) in scene.entity_bounds().rev() {
        if entity.kind == EntityKind::Card {
            let collapsed = scene.card(entity.id).is_some_and(|c| c.collapsed);
            if !collapsed && let Some(dir) = resize_direction(bounds, p, margin) {
                return Some(Hit::ResizeHandle(entity.id, dir));
            }
        }
        if bounds.contains(p) {
            return Some(Hit::Entity(entity));
        }
    }
    None
}

/// Every entity whose bounds intersect `rect`, in paint order.
pub fn hit_test_rect(scene: &SceneModel, rect: Rect) -> Vec<EntityRef> {
    scene
        .entity_bounds()
        .filter(|(_, bounds)| bounds.intersects(&rect))
        .map(|(entity, _)| entity)
        .collect()
}

fn resize_direction(card: Rect, p: Point, margin: f64) -> Option<ResizeDirection> {
    let outer = Rect::new(
        card.x - margin,
        card.y - margin,
        card.width + 2.0 * margin,
        card.height + 2.0 * margin,
    );
    if !outer.contains(p) {
        return None;
    }
    let n = (p.y - card.y).abs() <= margin;
    let s = (p.y - card.bottom()).abs() <= margin;
    let w = (p.x - card.x).abs() <= margin;
    let e = (p.x - card.right()).abs() <= margin;
    match (n, s, e, w) {
        (true, _, true, _) => Some(ResizeDirection::Ne),
        (true, _, _, true) => Some(ResizeDirection::Nw),
        (_, true, true, _) => Some(ResizeDirection::Se),
        (_, true, _, true) => Some(ResizeDirection::Sw),
        (true, ..) => Some(ResizeDirection::N),
        (_, true, ..) => Some(ResizeDirection::S),
        (_, _, true, _) => Some(ResizeDirection::E),
        (_, _, _, true) => Some(ResizeDirection::W),
        _ => None,
    }
}

/// New card geometry for a resize from `start` by a canvas-space delta.
/// North and west edges move the origin so the opposite edge stays put.
pub fn resized(start: Rect, dir: ResizeDirection, dx: f64, dy: f64) -> Rect {
    let mut r = start;
    if dir.east() {
        r.width = (start.width + dx).max(CARD_MIN_WIDTH);
    } else if dir.west() {
        r.width = (start.width - dx).max(CARD_MIN_WIDTH);
        r.x = start.x + (start.width - r.width);
    }
    if dir.south() {
        r.height = (start.height + dy).max(CARD_MIN_HEIGHT);
    } else if dir.north() {
        r.height = (start.height - dy).max(CARD_MIN_HEIGHT);
        r.y = start.y + (start.height - r.height);
    }
    r
}

// ─── Gesture state ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Drag {
    /// Canvas point under the pointer at pointer-down.
    origin: Point,
    start: Vec<(EntityRef, Point)>,
    over_drop_zone: bool,
}

impl Drag {
    fn carries_cards(&self) -> bool {
        self.start.iter().any(|(e, _)| e.kind == EntityKind::Card)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    SingleDragging(Drag),
    MultiDragging(Drag),
    BoxSelecting {
        start: Point,
        current: Point,
    },
    Resizing {
        card: EntityId,
        direction: ResizeDirection,
        /// Screen point at pointer-down.
        pointer: Point,
        start: Rect,
    },
    Panning {
        /// Pointer minus pan offset at grab time.
        grab: Point,
    },
}

/// How a gesture ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Release {
    /// A drag finished; `recorded` tells whether an undo action was pushed.
    Drag { recorded: bool },
    Resize(EntityId),
    BoxSelect,
    Pan,
    /// Cards dropped on the stash, with the geometry they had before the drag.
    StashTransfer(Vec<(EntityId, Rect)>),
}

/// Side effects of one input event, for the session to render and persist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects {
    pub moved: Vec<EntityRef>,
    pub selection_changed: bool,
    /// The selection rectangle appeared, changed or went away.
    pub box_changed: bool,
    pub panned: bool,
    /// Drop-zone highlight toggled.
    pub drop_hover: Option<bool>,
    pub released: Option<Release>,
}

#[derive(Debug)]
pub struct DragEngine {
    state: DragState,
    selection: Selection,
    /// Screen-space stash drop target; `None` while the stash is hidden.
    drop_zone: Option<Rect>,
    space_held: bool,
}

impl Default for DragEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DragEngine {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
            selection: Selection::default(),
            drop_zone: None,
            space_held: false,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DragState::Idle
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn set_drop_zone(&mut self, zone: Option<Rect>) {
        self.drop_zone = zone;
    }

    pub fn set_space_held(&mut self, held: bool) {
        self.space_held = held;
    }

    /// The live selection rectangle in canvas space.
    pub fn selection_box(&self) -> Option<Rect> {
        match self.state {
            DragState::BoxSelecting { start, current } => Some(Rect::from_corners(start, current)),
            _ => None,
        }
    }

    /// Feed one pointer or cancel event. Other events are ignored.
    pub fn handle(
        &mut self,
        event: &InputEvent,
        scene: &mut SceneModel,
        viewport: &mut Viewport,
        history: &mut CommandStack,
    ) -> Effects {
        match *event {
            InputEvent::PointerDown {
                x,
                y,
                button,
                modifiers,
            } => self.pointer_down(Point::new(x, y), button, modifiers, scene, viewport, history),
            InputEvent::PointerMove { x, y, .. } => {
                self.pointer_move(Point::new(x, y), scene, viewport)
            }
            InputEvent::PointerUp { x, y, modifiers } => {
                self.pointer_up(Point::new(x, y), modifiers, scene, viewport, history)
            }
            InputEvent::Cancel { reason } => self.cancel(reason),
            _ => Effects::default(),
        }
    }

    fn pointer_down(
        &mut self,
        screen: Point,
        button: PointerButton,
        modifiers: Modifiers,
        scene: &SceneModel,
        viewport: &Viewport,
        history: &mut CommandStack,
    ) -> Effects {
        let mut fx = Effects::default();
        if self.state != DragState::Idle {
            return fx;
        }

        let pan_gesture = button == PointerButton::Middle
            || (button == PointerButton::Primary && (modifiers.alt || self.space_held));
        if pan_gesture {
            let pan = viewport.pan();
            self.state = DragState::Panning {
                grab: Point::new(screen.x - pan.x, screen.y - pan.y),
            };
            return fx;
        }
        if button != PointerButton::Primary {
            return fx;
        }

        let canvas = viewport.screen_to_canvas(screen);
        let margin = viewport.screen_distance(RESIZE_HANDLE_PX / 2.0);
        match hit_test(scene, canvas, margin) {
            Some(Hit::ResizeHandle(card, direction)) => {
                if let Some(start) = scene.card(card).map(|c| c.bounds()) {
                    log::trace!("resize {card} from {}", direction.cursor());
                    self.state = DragState::Resizing {
                        card,
                        direction,
                        pointer: screen,
                        start,
                    };
                }
            }
            Some(Hit::Entity(entity)) if modifiers.additive() => {
                self.selection.toggle(entity);
                fx.selection_changed = true;
            }
            Some(Hit::Entity(entity)) if self.selection.contains(entity) => {
                let members = self.selection.to_vec();
                self.state = DragState::MultiDragging(self.start_drag(canvas, &members, scene, history));
            }
            Some(Hit::Entity(entity)) => {
                self.selection.replace([entity]);
                fx.selection_changed = true;
                self.state = DragState::SingleDragging(self.start_drag(canvas, &[entity], scene, history));
            }
            None => {
                self.state = DragState::BoxSelecting {
                    start: canvas,
                    current: canvas,
                };
                fx.box_changed = true;
            }
        }
        fx
    }

    fn start_drag(
        &self,
        origin: Point,
        members: &[EntityRef],
        scene: &SceneModel,
        history: &mut CommandStack,
    ) -> Drag {
        history.begin_batch(scene, members);
        Drag {
            origin,
            start: members
                .iter()
                .filter_map(|e| scene.position(*e).map(|p| (*e, p)))
                .collect(),
            over_drop_zone: false,
        }
    }

    fn pointer_move(&mut self, screen: Point, scene: &mut SceneModel, viewport: &mut Viewport) -> Effects {
        let mut fx = Effects::default();
        let canvas = viewport.screen_to_canvas(screen);
        let drop_zone = self.drop_zone;
        match &mut self.state {
            DragState::Idle => {}
            DragState::SingleDragging(drag) | DragState::MultiDragging(drag) => {
                fx.moved = apply_drag(drag, canvas, scene);
                let over = drag.carries_cards() && drop_zone.is_some_and(|z| z.contains(screen));
                if over != drag.over_drop_zone {
                    drag.over_drop_zone = over;
                    fx.drop_hover = Some(over);
                }
            }
            DragState::BoxSelecting { current, .. } => {
                *current = canvas;
                fx.box_changed = true;
            }
            DragState::Resizing {
                card,
                direction,
                pointer,
                start,
            } => {
                let dx = viewport.screen_distance(screen.x - pointer.x);
                let dy = viewport.screen_distance(screen.y - pointer.y);
                let r = resized(*start, *direction, dx, dy);
                if let Some(c) = scene.card_mut(*card) {
                    c.x = r.x;
                    c.y = r.y;
                    c.width = r.width;
                    c.height = r.height;
                    fx.moved.push(EntityRef::card(*card));
                }
            }
            DragState::Panning { grab } => {
                fx.panned = viewport.set_pan(Point::new(screen.x - grab.x, screen.y - grab.y));
            }
        }
        fx
    }

    fn pointer_up(
        &mut self,
        screen: Point,
        modifiers: Modifiers,
        scene: &mut SceneModel,
        viewport: &mut Viewport,
        history: &mut CommandStack,
    ) -> Effects {
        let mut fx = self.pointer_move(screen, scene, viewport);
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        match state {
            DragState::Idle => {}
            DragState::SingleDragging(drag) | DragState::MultiDragging(drag) => {
                if drag.over_drop_zone {
                    fx.drop_hover = Some(false);
                }
                let dropped_on_stash =
                    drag.carries_cards() && self.drop_zone.is_some_and(|z| z.contains(screen));
                if dropped_on_stash {
                    history.discard_batch();
                    let mut stashed = Vec::new();
                    for (entity, before) in &drag.start {
                        scene.set_position(*entity, *before);
                        fx.moved.push(*entity);
                        if entity.kind == EntityKind::Card
                            && let Some(bounds) = scene.bounds(*entity)
                        {
                            stashed.push((entity.id, bounds));
                        }
                    }
                    fx.released = Some(Release::StashTransfer(stashed));
                } else {
                    let recorded = history.end_batch(scene);
                    fx.released = Some(Release::Drag { recorded });
                }
            }
            DragState::BoxSelecting { start, .. } => {
                let rect = Rect::from_corners(start, viewport.screen_to_canvas(screen));
                let hits = hit_test_rect(scene, rect);
                if modifiers.additive() {
                    for e in hits {
                        self.selection.insert(e);
                    }
                } else {
                    self.selection.replace(hits);
                }
                fx.selection_changed = true;
                fx.box_changed = true;
                fx.released = Some(Release::BoxSelect);
            }
            DragState::Resizing { card, .. } => {
                fx.released = Some(Release::Resize(card));
            }
            DragState::Panning { .. } => {
                fx.released = Some(Release::Pan);
            }
        }
        fx
    }

    /// Abort a box-select or pan. Drags and resizes only end on release.
    fn cancel(&mut self, reason: CancelReason) -> Effects {
        let mut fx = Effects::default();
        match self.state {
            DragState::BoxSelecting { .. } => {
                log::debug!("box select cancelled: {reason:?}");
                self.state = DragState::Idle;
                fx.box_changed = true;
            }
            DragState::Panning { .. } => {
                log::debug!("pan cancelled: {reason:?}");
                self.state = DragState::Idle;
            }
            _ => {}
        }
        if reason == CancelReason::WindowBlur {
            self.space_held = false;
        }
        fx
    }
}

fn apply_drag(drag: &Drag, canvas: Point, scene: &mut SceneModel) -> Vec<EntityRef> {
    let dx = canvas.x - drag.origin.x;
    let dy = canvas.y - drag.origin.y;
    drag.start
        .iter()
        .filter(|(entity, start)| scene.set_position(*entity, Point::new(start.x + dx, start.y + dy)))
        .map(|(entity, _)| *entity)
        .collect()
}
