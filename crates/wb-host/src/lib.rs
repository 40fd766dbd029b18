//! Whiteboard host: the side of the editor that owns the filesystem.
//!
//! It stores and migrates the document, answers the view's requests for
//! file contents, creates, renames and moves card files, and watches the
//! workspace so that renames and external edits reach the view.

pub mod commands;
pub mod config;
pub mod error;
pub mod filter;
pub mod memfs;
pub mod panel;
pub mod runtime;
pub mod store;
pub mod watch;
pub mod workspace;

pub use config::WhiteboardConfig;
pub use error::{HostError, HostResult};
pub use panel::WhiteboardHost;
pub use runtime::{SessionRuntime, TokioScheduler};
pub use store::DocumentStore;
pub use workspace::{FileIo, FsWorkspace, HostUi, LogUi, WatchEvent};
