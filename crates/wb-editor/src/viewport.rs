//! Viewport: pan/zoom transform and frame batching.
//!
//! `canvas = (screen - pan) / zoom`. Zoom is anchor-preserving: the canvas
//! point under the anchor stays under it after the zoom changes.
//!
//! Visual updates are coalesced by [`FrameBatcher`]: any number of
//! invalidations between two animation frames produce a single frame
//! request.

use std::collections::HashSet;
use wb_core::model::{EntityRef, Point, Rect};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 5.0;
/// Keyboard and button zoom increment.
pub const ZOOM_STEP: f64 = 0.1;
/// Zoom change per wheel delta unit with ⌘/Ctrl held.
pub const WHEEL_ZOOM_SENSITIVITY: f64 = 0.004;
/// Size of the drawable surface, used when there is nothing to center on.
pub const CANVAS_WIDTH: f64 = 8000.0;
pub const CANVAS_HEIGHT: f64 = 6000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    zoom: f64,
    pan: Point,
    width: f64,
    height: f64,
}

impl Viewport {
    /// A viewport onto a container of `width` × `height` screen pixels.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            zoom: 1.0,
            pan: Point::ORIGIN,
            width,
            height,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn set_container_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.pan.x) / self.zoom,
            (screen.y - self.pan.y) / self.zoom,
        )
    }

    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        Point::new(
            canvas.x * self.zoom + self.pan.x,
            canvas.y * self.zoom + self.pan.y,
        )
    }

    /// Converts a screen-space distance to canvas units.
    pub fn screen_distance(&self, d: f64) -> f64 {
        d / self.zoom
    }

    /// Screen center of the container.
    pub fn screen_center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    /// Canvas point currently at the container center.
    pub fn center_in_canvas(&self) -> Point {
        self.screen_to_canvas(self.screen_center())
    }

    /// Set the zoom level, clamped to [`MIN_ZOOM`, `MAX_ZOOM`], keeping the
    /// canvas point under `anchor` (screen space, default container center)
    /// stationary. Returns whether the transform changed.
    pub fn set_zoom(&mut self, level: f64, anchor: Option<Point>) -> bool {
        if !level.is_finite() {
            return false;
        }
        let new_zoom = level.clamp(MIN_ZOOM, MAX_ZOOM);
        let anchor = anchor.unwrap_or_else(|| self.screen_center());
        let under = self.screen_to_canvas(anchor);
        let before = (self.zoom, self.pan);

        self.pan = Point::new(anchor.x - under.x * new_zoom, anchor.y - under.y * new_zoom);
        self.zoom = new_zoom;
        log::trace!("zoom {:.3} -> {:.3}", before.0, new_zoom);
        before != (self.zoom, self.pan)
    }

    /// Step the zoom by `delta` around the container center.
    pub fn zoom_by(&mut self, delta: f64) -> bool {
        self.set_zoom(self.zoom + delta, None)
    }

    /// ⌘/Ctrl + wheel: zoom at the pointer.
    pub fn wheel_zoom(&mut self, delta_y: f64, anchor: Point) -> bool {
        self.set_zoom(self.zoom - delta_y * WHEEL_ZOOM_SENSITIVITY, Some(anchor))
    }

    pub fn set_pan(&mut self, pan: Point) -> bool {
        if !pan.x.is_finite() || !pan.y.is_finite() || pan == self.pan {
            return false;
        }
        self.pan = pan;
        true
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) -> bool {
        self.set_pan(Point::new(self.pan.x + dx, self.pan.y + dy))
    }

    /// Pan so the center of `rect` sits at the container center.
    pub fn center_on_rect(&mut self, rect: Rect) -> bool {
        let c = rect.center();
        let screen = self.screen_center();
        self.set_pan(Point::new(
            screen.x - c.x * self.zoom,
            screen.y - c.y * self.zoom,
        ))
    }

    /// Center on the bounding box of `rects`. With nothing to center on,
    /// the middle of the drawable surface is shown instead.
    pub fn center_on<I>(&mut self, rects: I) -> bool
    where
        I: IntoIterator<Item = Rect>,
    {
        match rects.into_iter().reduce(|a, b| a.union(&b)) {
            Some(bounds) => self.center_on_rect(bounds),
            None => self.set_pan(Point::new(
                -(CANVAS_WIDTH - self.width) / 2.0,
                -(CANVAS_HEIGHT - self.height) / 2.0,
            )),
        }
    }
}

// ─── Frame batching ──────────────────────────────────────────────────────

/// Host capability that runs a callback on the next animation frame.
pub trait FrameScheduler {
    fn request_frame(&mut self);
}

/// Frame requests that go nowhere, for headless sessions.
#[derive(Debug, Default)]
pub struct NoFrames;

impl FrameScheduler for NoFrames {
    fn request_frame(&mut self) {}
}

/// What changed since the last frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameDamage {
    /// Pan or zoom changed.
    pub transform: bool,
    /// Entities were added or removed, or a sidebar list changed.
    pub structure: bool,
    /// The selection set or the selection box changed.
    pub overlay: bool,
    /// Entities whose geometry changed.
    pub entities: HashSet<EntityRef>,
}

impl FrameDamage {
    pub fn is_empty(&self) -> bool {
        !self.transform && !self.structure && !self.overlay && self.entities.is_empty()
    }
}

/// Coalesces invalidations into at most one pending frame request.
#[derive(Debug, Default)]
pub struct FrameBatcher {
    pending: bool,
    damage: FrameDamage,
}

impl FrameBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn transform(&mut self, frames: &mut dyn FrameScheduler) {
        self.damage.transform = true;
        self.request(frames);
    }

    pub fn structure(&mut self, frames: &mut dyn FrameScheduler) {
        self.damage.structure = true;
        self.request(frames);
    }

    pub fn overlay(&mut self, frames: &mut dyn FrameScheduler) {
        self.damage.overlay = true;
        self.request(frames);
    }

    pub fn entity(&mut self, entity: EntityRef, frames: &mut dyn FrameScheduler) {
        self.damage.entities.insert(entity);
        self.request(frames);
    }

    fn request(&mut self, frames: &mut dyn FrameScheduler) {
        if !self.pending {
            self.pending = true;
            frames.request_frame();
        }
    }

    /// Called from the animation frame callback. Takes the accumulated
    /// damage and re-arms for the next request.
    pub fn take(&mut self) -> FrameDamage {
        self.pending = false;
        std::mem::take(&mut self.damage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wb_core::EntityId;

    const EPS: f64 = 1e-9;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS
    }

    #[derive(Default)]
    struct CountingFrames(usize);

    impl FrameScheduler for CountingFrames {
        fn request_frame(&mut self) {
            self.0 += 1;
        }
    }

    #[test]
    fn zoom_keeps_anchor_point_fixed() {
        let anchors = [Point::new(0.0, 0.0), Point::new(123.0, 456.0), Point::new(799.0, 1.5)];
        let levels = [(1.0, 2.5), (0.3, 4.9), (3.2, 0.1), (1.7, 1.7)];
        for anchor in anchors {
            for (z1, z2) in levels {
                let mut vp = Viewport::new(800.0, 600.0);
                vp.set_pan(Point::new(-37.0, 91.0));
                vp.set_zoom(z1, None);
                let before = vp.screen_to_canvas(anchor);
                vp.set_zoom(z2, Some(anchor));
                let after = vp.screen_to_canvas(anchor);
                assert!(close(before, after), "{before:?} != {after:?} at z {z1}->{z2}");
            }
        }
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vp = Viewport::new(800.0, 600.0);
        vp.set_zoom(50.0, None);
        assert_eq!(vp.zoom(), MAX_ZOOM);
        vp.set_zoom(0.0001, None);
        assert_eq!(vp.zoom(), MIN_ZOOM);
        assert!(!vp.set_zoom(f64::NAN, None));
    }

    #[test]
    fn screen_canvas_roundtrip() {
        let mut vp = Viewport::new(800.0, 600.0);
        vp.set_zoom(2.0, Some(Point::new(10.0, 10.0)));
        vp.pan_by(15.0, -4.0);
        let p = Point::new(333.0, 222.0);
        assert!(close(vp.canvas_to_screen(vp.screen_to_canvas(p)), p));
    }

    #[test]
    fn center_on_entities() {
        let mut vp = Viewport::new(800.0, 600.0);
        vp.center_on([Rect::new(0.0, 0.0, 100.0, 100.0), Rect::new(200.0, 200.0, 100.0, 100.0)]);
        assert!(close(vp.center_in_canvas(), Point::new(150.0, 150.0)));
    }

    #[test]
    fn center_on_nothing_shows_middle_of_surface() {
        let mut vp = Viewport::new(800.0, 600.0);
        vp.center_on(std::iter::empty());
        assert!(close(vp.pan(), Point::new(-3600.0, -2700.0)));
        assert!(close(
            vp.center_in_canvas(),
            Point::new(CANVAS_WIDTH / 2.0, CANVAS_HEIGHT / 2.0)
        ));
    }

    #[test]
    fn one_frame_request_per_batch() {
        let mut frames = CountingFrames::default();
        let mut batcher = FrameBatcher::new();
        let id = EntityRef::block(EntityId::intern("vp_block"));
        for _ in 0..100 {
            batcher.entity(id, &mut frames);
            batcher.transform(&mut frames);
        }
        assert_eq!(frames.0, 1);
        let damage = batcher.take();
        assert!(damage.transform);
        assert_eq!(damage.entities.len(), 1);

        batcher.overlay(&mut frames);
        assert_eq!(frames.0, 2);
    }
}
