//! Whiteboard interaction engine.
//!
//! Everything here is a pure state-transition layer over
//! [`wb_core::SceneModel`]: input events go in, scene mutations and outbound
//! [`wb_core::protocol::ViewCommand`]s come out. Rendering, timers and card
//! viewers are injected collaborators, so the engine runs headless in tests.

pub mod commands;
pub mod input;
pub mod persist;
pub mod reconcile;
pub mod select;
pub mod session;
pub mod shortcuts;
pub mod sidebar;
pub mod viewport;

pub use session::{SessionServices, WhiteboardSession};
