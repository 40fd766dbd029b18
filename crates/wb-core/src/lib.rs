//! Whiteboard core: entity ids, the persisted data model, schema migration,
//! the in-memory scene model, path helpers, and the view/host message
//! protocol.

pub mod id;
pub mod migrate;
pub mod model;
pub mod paths;
pub mod protocol;
pub mod scene;

pub use id::EntityId;
pub use model::{
    Block, Card, EntityKind, EntityRef, Point, Rect, StashCard, WhiteboardDocument,
    CURRENT_VERSION,
};
pub use scene::SceneModel;
