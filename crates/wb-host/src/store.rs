//! Reading and writing the whiteboard document file.

use crate::error::{HostError, HostResult};
use crate::workspace::FileIo;
use std::path::{Path, PathBuf};
use wb_core::WhiteboardDocument;
use wb_core::migrate::{parse_document, to_pretty_json};

/// File suffix of whiteboard documents.
pub const DOCUMENT_SUFFIX: &str = ".whiteboard.json";

#[derive(Debug, Clone)]
pub struct DocumentStore {
    path: PathBuf,
}

impl DocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Title shown for the document: the file name without its suffix.
    pub fn title(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.strip_suffix(DOCUMENT_SUFFIX)
            .map(str::to_string)
            .unwrap_or(name)
    }

    /// Read and migrate the document, failing on unreadable or invalid
    /// JSON. A missing file is an empty document.
    pub fn try_load(&self, io: &dyn FileIo, now_ms: i64) -> HostResult<WhiteboardDocument> {
        let text = match io.read_text(&self.path) {
            Ok(text) => text,
            Err(HostError::NotFound(_)) => return Ok(WhiteboardDocument::default()),
            Err(err) => return Err(err),
        };
        parse_document(&text, now_ms).map_err(|source| HostError::Parse {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Like [`Self::try_load`], but a document that cannot be read is
    /// replaced by the empty one.
    pub fn load(&self, io: &dyn FileIo, now_ms: i64) -> WhiteboardDocument {
        self.try_load(io, now_ms).unwrap_or_else(|err| {
            log::warn!("{err}; starting from an empty whiteboard");
            WhiteboardDocument::default()
        })
    }

    /// Overwrite the file with the whole document, stamped current.
    pub fn save(&self, io: &mut dyn FileIo, doc: &WhiteboardDocument) -> HostResult<()> {
        let text = to_pretty_json(doc).map_err(|source| HostError::Parse {
            path: self.path.display().to_string(),
            source,
        })?;
        io.write_text(&self.path, &text)?;
        log::debug!(
            "saved {} ({} blocks, {} cards)",
            self.path.display(),
            doc.blocks.len(),
            doc.cards.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memfs::MemoryWorkspace;
    use pretty_assertions::assert_eq;
    use wb_core::CURRENT_VERSION;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn corrupt_file_loads_empty() {
        let ws = MemoryWorkspace::new("/w").with_file("plan.whiteboard.json", "{ not json");
        let store = DocumentStore::new("/w/plan.whiteboard.json");
        assert!(store.try_load(&ws, NOW).is_err());
        assert_eq!(store.load(&ws, NOW), WhiteboardDocument::default());
    }

    #[test]
    fn blank_and_missing_files_load_empty() {
        let ws = MemoryWorkspace::new("/w").with_file("blank.whiteboard.json", "  \n");
        let blank = DocumentStore::new("/w/blank.whiteboard.json");
        let missing = DocumentStore::new("/w/missing.whiteboard.json");
        assert_eq!(blank.try_load(&ws, NOW).unwrap(), WhiteboardDocument::default());
        assert_eq!(missing.try_load(&ws, NOW).unwrap(), WhiteboardDocument::default());
    }

    #[test]
    fn v0_document_is_migrated_on_load() {
        let ws = MemoryWorkspace::new("/w").with_file(
            "old.whiteboard.json",
            r#"{"blocks": [], "cards": [{"id": "card_1", "x": 1, "y": 2, "filePath": "a.md"}]}"#,
        );
        let doc = DocumentStore::new("/w/old.whiteboard.json").load(&ws, NOW);
        assert_eq!(doc.version, CURRENT_VERSION);
        assert_eq!(doc.cards[0].last_modified, NOW);
    }

    #[test]
    fn save_writes_pretty_json() {
        let mut ws = MemoryWorkspace::new("/w");
        let store = DocumentStore::new("/w/plan.whiteboard.json");
        store.save(&mut ws, &WhiteboardDocument::default()).unwrap();
        let text = ws.file("plan.whiteboard.json").unwrap();
        assert!(text.contains("\n  \"version\": 2"));
        assert_eq!(store.title(), "plan");
    }

    #[test]
    fn failed_write_is_reported() {
        let mut ws = MemoryWorkspace::new("/w");
        ws.fail_writes = true;
        let store = DocumentStore::new("/w/plan.whiteboard.json");
        let err = store.save(&mut ws, &WhiteboardDocument::default()).unwrap_err();
        assert_eq!(err.code(), "E_WRITE");
    }
}
