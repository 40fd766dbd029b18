//! Persisted data model.
//!
//! These types are both the in-memory entity records and the exact shape of
//! the `.whiteboard.json` document. Deserialization is lenient: `null` or
//! missing optional fields fall back to defaults, and non-finite coordinates
//! collapse to zero, so a hand-edited file never blocks loading.

use crate::id::EntityId;
use serde::{Deserialize, Deserializer, Serialize};

/// Schema version stamped on every write.
pub const CURRENT_VERSION: u32 = 2;

/// The fixed color palette offered for blocks and cards.
pub const PALETTE: [&str; 8] = [
    "#2563eb", "#dc2626", "#ea580c", "#16a34a", "#4b5563", "#7c3aed", "#db2777", "#92400e",
];

/// Blocks are hit-tested against a fixed nominal box.
pub const BLOCK_WIDTH: f64 = 200.0;
pub const BLOCK_HEIGHT: f64 = 100.0;

/// Size assumed for a card whose stored size is missing.
pub const CARD_DEFAULT_WIDTH: f64 = 300.0;
pub const CARD_DEFAULT_HEIGHT: f64 = 200.0;

/// Size given to freshly created cards.
pub const CARD_NEW_WIDTH: f64 = 400.0;
pub const CARD_NEW_HEIGHT: f64 = 300.0;

pub const CARD_MIN_WIDTH: f64 = 200.0;
pub const CARD_MIN_HEIGHT: f64 = 100.0;

/// Geometry used when a stash entry has no recorded placement.
pub const STASH_RESTORE_WIDTH: f64 = 280.0;
pub const STASH_RESTORE_HEIGHT: f64 = 200.0;

// ─── Geometry ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalized rect spanning two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Touching edges count as intersecting.
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.right() < other.x
            || self.x > other.right()
            || self.bottom() < other.y
            || self.y > other.bottom())
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }
}

// ─── Entities ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Block,
    Card,
}

/// A typed reference to an on-canvas entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
    pub kind: EntityKind,
}

impl EntityRef {
    pub fn block(id: EntityId) -> Self {
        Self {
            id,
            kind: EntityKind::Block,
        }
    }

    pub fn card(id: EntityId) -> Self {
        Self {
            id,
            kind: EntityKind::Card,
        }
    }
}

/// A free-floating text note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: EntityId,
    #[serde(default, deserialize_with = "finite_or_zero")]
    pub x: f64,
    #[serde(default, deserialize_with = "finite_or_zero")]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    /// May point at a file that no longer exists.
    #[serde(default)]
    pub linked_file: Option<String>,
}

impl Block {
    pub fn new(id: EntityId, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            color: None,
            text: String::new(),
            linked_file: None,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, BLOCK_WIDTH, BLOCK_HEIGHT)
    }
}

/// A positioned viewport onto a markdown file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: EntityId,
    #[serde(default, deserialize_with = "finite_or_zero")]
    pub x: f64,
    #[serde(default, deserialize_with = "finite_or_zero")]
    pub y: f64,
    #[serde(default = "default_card_width", deserialize_with = "card_width")]
    pub width: f64,
    #[serde(default = "default_card_height", deserialize_with = "card_height")]
    pub height: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Millisecond timestamp of the last content-affecting edit.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_modified: i64,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_false")]
    pub collapsed: bool,
}

impl Card {
    pub fn new(id: EntityId, file_path: impl Into<String>, bounds: Rect, now_ms: i64) -> Self {
        let mut card = Self {
            id,
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            file_path: file_path.into(),
            color: None,
            last_modified: now_ms,
            collapsed: false,
        };
        card.clamp_size();
        card
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn clamp_size(&mut self) {
        self.width = self.width.max(CARD_MIN_WIDTH);
        self.height = self.height.max(CARD_MIN_HEIGHT);
    }
}

/// A card held in the sidebar stash instead of on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StashCard {
    pub id: EntityId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_modified: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_height: Option<f64>,
}

impl StashCard {
    /// A stash entry with no recorded placement (dragged in from the card list).
    pub fn detached(id: EntityId, file_path: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id,
            file_path: file_path.into(),
            color: None,
            last_modified: now_ms,
            original_x: None,
            original_y: None,
            original_width: None,
            original_height: None,
        }
    }

    /// Dehydrate a card, remembering where it sat. `geometry` is the
    /// placement to restore to, which for a dragged card is its pre-drag
    /// geometry rather than where it was dropped.
    pub fn from_card(card: &Card, geometry: Rect, now_ms: i64) -> Self {
        Self {
            id: card.id,
            file_path: card.file_path.clone(),
            color: card.color.clone(),
            last_modified: now_ms,
            original_x: Some(geometry.x),
            original_y: Some(geometry.y),
            original_width: Some(geometry.width),
            original_height: Some(geometry.height),
        }
    }

    /// Recorded placement, if the entry came off the canvas.
    pub fn original_geometry(&self) -> Option<Rect> {
        let (x, y) = (self.original_x?, self.original_y?);
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        Some(Rect::new(
            x,
            y,
            self.original_width
                .filter(|w| w.is_finite())
                .unwrap_or(STASH_RESTORE_WIDTH),
            self.original_height
                .filter(|h| h.is_finite())
                .unwrap_or(STASH_RESTORE_HEIGHT),
        ))
    }
}

/// The persisted aggregate; the unit every save overwrites wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardDocument {
    #[serde(default)]
    pub version: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub blocks: Vec<Block>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cards: Vec<Card>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pinned_files: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stash_cards: Vec<StashCard>,
}

impl Default for WhiteboardDocument {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            blocks: Vec::new(),
            cards: Vec::new(),
            pinned_files: Vec::new(),
            stash_cards: Vec::new(),
        }
    }
}

// ─── Lenient field readers ───────────────────────────────────────────────

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn finite_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|n| n.is_finite()).unwrap_or(0.0))
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|n| n.is_finite()).map_or(0, |n| n as i64))
}

fn default_card_width() -> f64 {
    CARD_DEFAULT_WIDTH
}

fn default_card_height() -> f64 {
    CARD_DEFAULT_HEIGHT
}

fn card_width<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|n| n.is_finite() && *n > 0.0)
        .unwrap_or(CARD_DEFAULT_WIDTH))
}

fn card_height<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|n| n.is_finite() && *n > 0.0)
        .unwrap_or(CARD_DEFAULT_HEIGHT))
}

fn is_false(b: &bool) -> bool {
    !*b
}
