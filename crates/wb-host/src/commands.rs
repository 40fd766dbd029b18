//! User-facing host commands: find, create and inspect whiteboard files.

use crate::error::{HostError, HostResult};
use crate::panel::DEPENDENCY_GLOB;
use crate::store::{DOCUMENT_SUFFIX, DocumentStore};
use crate::workspace::FileIo;
use std::fmt;
use std::path::{Path, PathBuf};
use wb_core::WhiteboardDocument;
use wb_core::migrate::to_pretty_json;

pub const DOCUMENT_GLOB: &str = "**/*.whiteboard.json";

/// Every whiteboard file in the workspace.
pub fn list_whiteboards(io: &dyn FileIo) -> Vec<PathBuf> {
    io.list_files(DOCUMENT_GLOB, Some(DEPENDENCY_GLOB), usize::MAX)
}

/// Names may only use ASCII letters, digits, `-` and `_`.
pub fn validate_name(name: &str) -> HostResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(HostError::InvalidName(name.to_string()))
    }
}

/// Create `<dir>/<name>.whiteboard.json` holding an empty document.
pub fn create_whiteboard(io: &mut dyn FileIo, dir: &Path, name: &str) -> HostResult<PathBuf> {
    validate_name(name)?;
    let path = dir.join(format!("{name}{DOCUMENT_SUFFIX}"));
    if io.exists(&path) {
        return Err(HostError::AlreadyExists(format!("{name}{DOCUMENT_SUFFIX}")));
    }
    let text = to_pretty_json(&WhiteboardDocument::default()).map_err(|source| HostError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    io.create_file(&path, &text)?;
    log::info!("created {}", path.display());
    Ok(path)
}

/// The raw file, for opening a whiteboard as plain text.
pub fn open_as_text(io: &dyn FileIo, path: &Path) -> HostResult<String> {
    io.read_text(path)
}

/// Counts shown by `whiteboard check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub title: String,
    pub version: u32,
    pub blocks: usize,
    pub linked_blocks: usize,
    pub cards: usize,
    pub pinned: usize,
    pub stashed: usize,
}

impl DocumentSummary {
    pub fn of(store: &DocumentStore, doc: &WhiteboardDocument) -> Self {
        Self {
            title: store.title(),
            version: doc.version,
            blocks: doc.blocks.len(),
            linked_blocks: doc.blocks.iter().filter(|b| b.linked_file.is_some()).count(),
            cards: doc.cards.len(),
            pinned: doc.pinned_files.len(),
            stashed: doc.stash_cards.len(),
        }
    }
}

impl fmt::Display for DocumentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (version {})", self.title, self.version)?;
        writeln!(f, "  blocks: {} ({} linked)", self.blocks, self.linked_blocks)?;
        writeln!(f, "  cards:  {}", self.cards)?;
        writeln!(f, "  pinned: {}", self.pinned)?;
        write!(f, "  stash:  {}", self.stashed)
    }
}
