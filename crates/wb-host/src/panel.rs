//! The host side of one open whiteboard.
//!
//! `WhiteboardHost` answers [`ViewCommand`]s from the view with
//! [`HostEvent`]s, collected in an outbox the owner drains with
//! [`WhiteboardHost::take_events`]. Every file operation is fallible, and
//! every failure is reported through [`HostUi`] or the log right here; a
//! command never fails back to the caller.

use crate::config::WhiteboardConfig;
use crate::error::{HostError, HostResult};
use crate::store::DocumentStore;
use crate::workspace::{FileIo, HostUi};
use std::path::{Path, PathBuf};
use wb_core::paths;
use wb_core::protocol::{HostEvent, ViewCommand};
use wb_core::{EntityId, WhiteboardDocument};
use wb_editor::persist::{Clock, SystemClock};

/// `getWorkspaceFiles` lists at most this many files.
pub const WORKSPACE_FILE_LIMIT: usize = 100;
pub const MARKDOWN_GLOB: &str = "**/*.md";
pub const DEPENDENCY_GLOB: &str = "**/node_modules/**";

pub struct WhiteboardHost<F: FileIo, U: HostUi> {
    pub(crate) io: F,
    pub(crate) ui: U,
    pub(crate) store: DocumentStore,
    config: WhiteboardConfig,
    clock: Box<dyn Clock>,
    outbox: Vec<HostEvent>,
}

impl<F: FileIo, U: HostUi> WhiteboardHost<F, U> {
    pub fn new(io: F, ui: U, store: DocumentStore, config: WhiteboardConfig) -> Self {
        Self {
            io,
            ui,
            store,
            config,
            clock: Box::new(SystemClock),
            outbox: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn io(&self) -> &F {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut F {
        &mut self.io
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn config(&self) -> &WhiteboardConfig {
        &self.config
    }

    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn post(&mut self, event: HostEvent) {
        log::trace!("posting {}", event.name());
        self.outbox.push(event);
    }

    pub(crate) fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub(crate) fn load_document(&self) -> WhiteboardDocument {
        self.store.load(&self.io, self.now_ms())
    }

    pub(crate) fn save_document(&mut self, doc: &WhiteboardDocument) {
        if let Err(err) = self.store.save(&mut self.io, doc) {
            self.report("saving whiteboard", err);
            self.post(HostEvent::SaveFailed);
        }
    }

    fn workspace_root(&self) -> HostResult<PathBuf> {
        self.io
            .root()
            .map(Path::to_path_buf)
            .ok_or(HostError::NoWorkspace)
    }

    fn resolve(&self, stored: &str) -> PathBuf {
        paths::resolve(stored, self.io.root())
    }

    /// Surface an error to the user, or log it when it is not theirs to see.
    pub(crate) fn report(&mut self, action: &str, err: HostError) {
        match err {
            HostError::NotFound(_)
            | HostError::AlreadyExists(_)
            | HostError::NoWorkspace
            | HostError::InvalidName(_) => self.ui.show_error(&err.to_string()),
            err if err.is_user_facing() => self.ui.show_error(&format!("Error {action}: {err}")),
            err => log::warn!("{action}: {err}"),
        }
    }

    // ─── Commands ────────────────────────────────────────────────────────

    pub fn handle(&mut self, command: ViewCommand) {
        log::debug!("view command {}", command.name());
        let (action, result) = match command {
            ViewCommand::SaveState { state } => {
                self.save_document(&state);
                return;
            }
            ViewCommand::RequestState => {
                let state = self.load_document();
                self.post(HostEvent::LoadState { state });
                return;
            }
            ViewCommand::OpenFile {
                file_path,
                split_view,
            } => ("opening file", self.open_file(&file_path, split_view)),
            ViewCommand::BrowseFile { block_id } => {
                self.browse_file(block_id);
                return;
            }
            ViewCommand::ReadCardContent { card_id, file_path } => (
                "reading file",
                self.read_file(&file_path).map(|content| {
                    if let Some(content) = content {
                        self.post(HostEvent::CardContent { card_id, content });
                    }
                }),
            ),
            ViewCommand::SaveCardContent { file_path, content } => {
                ("saving file", self.write_file(&file_path, &content))
            }
            ViewCommand::CreateNewCard {
                file_name,
                x,
                y,
                for_block_id,
                add_to_stash,
            } => (
                "creating file",
                self.create_new_card(&file_name, x, y, for_block_id, add_to_stash),
            ),
            ViewCommand::RenameCard {
                card_id,
                old_path,
                new_name,
            } => ("renaming file", self.rename_card(card_id, &old_path, &new_name)),
            ViewCommand::MoveCard {
                card_id,
                old_path,
                target_folder,
            } => ("moving file", self.move_card(card_id, &old_path, &target_folder)),
            ViewCommand::GetWorkspaceFiles => {
                let files = self.markdown_files();
                self.post(HostEvent::WorkspaceFiles { files });
                return;
            }
            ViewCommand::GetWorkspaceFolders => {
                let folders = self.workspace_folders();
                self.post(HostEvent::WorkspaceFolders { folders });
                return;
            }
            ViewCommand::ReadPinnedFileContent { file_path } => (
                "reading pinned file",
                self.read_file(&file_path).map(|content| {
                    if let Some(content) = content {
                        self.post(HostEvent::PinnedFileContent { file_path, content });
                    }
                }),
            ),
            ViewCommand::SavePinnedFileContent { file_path, content } => {
                ("saving pinned file", self.write_file(&file_path, &content))
            }
            ViewCommand::GetCardFolderPath => {
                let path = self.config.card_folder_path.clone();
                self.post(HostEvent::CardFolderPath { path });
                return;
            }
        };
        if let Err(err) = result {
            self.report(action, err);
        }
    }

    fn open_file(&mut self, file_path: &str, split_view: bool) -> HostResult<()> {
        self.workspace_root()?;
        let full = self.resolve(file_path);
        if !self.io.exists(&full) {
            return Err(HostError::NotFound(file_path.to_string()));
        }
        self.io.open_in_editor(&full, split_view)
    }

    fn browse_file(&mut self, block_id: EntityId) {
        let Some(picked) = self.io.pick_file(&["md"]) else {
            log::debug!("file picker cancelled");
            return;
        };
        let file_path = paths::display_relative(&picked, self.io.root());
        self.post(HostEvent::FileSelected {
            block_id,
            file_path,
        });
    }

    /// Contents of a stored path, or `None` when there is no workspace or
    /// no such file.
    fn read_file(&self, file_path: &str) -> HostResult<Option<String>> {
        if self.io.root().is_none() {
            return Ok(None);
        }
        let full = self.resolve(file_path);
        if !self.io.exists(&full) {
            log::debug!("{file_path} does not exist; nothing to read");
            return Ok(None);
        }
        self.io.read_text(&full).map(Some)
    }

    fn write_file(&mut self, file_path: &str, content: &str) -> HostResult<()> {
        if self.io.root().is_none() {
            log::debug!("no workspace; dropping write to {file_path}");
            return Ok(());
        }
        let full = self.resolve(file_path);
        self.io.write_text(&full, content)
    }

    fn create_new_card(
        &mut self,
        file_name: &str,
        x: f64,
        y: f64,
        for_block_id: Option<EntityId>,
        add_to_stash: bool,
    ) -> HostResult<()> {
        let root = self.workspace_root()?;
        let final_name = paths::ensure_md_extension(file_name);
        let (target_dir, relative) = match self.config.card_folder() {
            Some(folder) => (root.join(folder), format!("{folder}/{final_name}")),
            None => (root.clone(), final_name.clone()),
        };
        if !self.io.exists(&target_dir) {
            self.io.create_dir_all(&target_dir)?;
        }
        let full = target_dir.join(&final_name);
        if self.io.exists(&full) {
            return Err(HostError::AlreadyExists(relative));
        }
        let title = file_name.strip_suffix(paths::MARKDOWN_EXT).unwrap_or(file_name);
        self.io.create_file(&full, &format!("# {title}\n\n"))?;
        log::info!("created card file {relative}");
        self.post(HostEvent::CardCreated {
            file_path: relative,
            x,
            y,
            for_block_id,
            add_to_stash,
        });
        Ok(())
    }

    fn rename_card(&mut self, card_id: EntityId, old_path: &str, new_name: &str) -> HostResult<()> {
        let root = self.workspace_root()?;
        let old_full = self.resolve(old_path);
        let final_name = paths::ensure_md_extension(new_name);
        let new_full = old_full
            .parent()
            .map(|dir| dir.join(&final_name))
            .unwrap_or_else(|| root.join(&final_name));
        let new_path = paths::display_relative(&new_full, Some(&root));

        if !self.io.exists(&old_full) {
            return Err(HostError::NotFound(old_path.to_string()));
        }
        if self.io.exists(&new_full) {
            return Err(HostError::AlreadyExists(new_path));
        }
        self.io.rename_or_move(&old_full, &new_full)?;
        self.post(HostEvent::CardRenamed {
            card_id,
            old_path: old_path.to_string(),
            new_path,
        });
        self.ui.show_info(&format!("Renamed to: {final_name}"));
        Ok(())
    }

    fn move_card(&mut self, card_id: EntityId, old_path: &str, target_folder: &str) -> HostResult<()> {
        let root = self.workspace_root()?;
        let old_full = self.resolve(old_path);
        let Some(file_name) = old_full.file_name().map(|n| n.to_string_lossy().into_owned())
        else {
            return Err(HostError::NotFound(old_path.to_string()));
        };
        let folder = target_folder.trim_matches('/');
        let target_dir = paths::resolve(folder, Some(&root));
        let new_full = target_dir.join(&file_name);
        let new_path = paths::display_relative(&new_full, Some(&root));

        if !self.io.exists(&old_full) {
            return Err(HostError::NotFound(old_path.to_string()));
        }
        if !self.io.exists(&target_dir) {
            self.io.create_dir_all(&target_dir)?;
        }
        if self.io.exists(&new_full) {
            return Err(HostError::AlreadyExists(new_path));
        }
        self.io.rename_or_move(&old_full, &new_full)?;
        self.post(HostEvent::CardMoved {
            card_id,
            old_path: old_path.to_string(),
            new_path,
        });
        let shown = if folder.is_empty() { "/ (root)" } else { folder };
        self.ui.show_info(&format!("Moved to: {shown}"));
        Ok(())
    }

    fn markdown_files(&self) -> Vec<String> {
        self.io
            .list_files(MARKDOWN_GLOB, Some(DEPENDENCY_GLOB), WORKSPACE_FILE_LIMIT)
            .iter()
            .map(|p| paths::display_relative(p, self.io.root()))
            .collect()
    }

    /// The root as `""` followed by every visible folder.
    fn workspace_folders(&self) -> Vec<String> {
        if self.io.root().is_none() {
            return Vec::new();
        }
        let mut folders = vec![String::new()];
        folders.extend(self.io.list_dirs());
        folders.sort();
        folders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memfs::{MemoryWorkspace, RecordingUi};
    use pretty_assertions::assert_eq;

    fn host(ws: MemoryWorkspace) -> WhiteboardHost<MemoryWorkspace, RecordingUi> {
        WhiteboardHost::new(
            ws,
            RecordingUi::default(),
            DocumentStore::new("/w/plan.whiteboard.json"),
            WhiteboardConfig::default(),
        )
    }

    #[test]
    fn read_card_content_answers_by_id() {
        let mut host = host(MemoryWorkspace::new("/w").with_file("notes/a.md", "# A"));
        let card_id = EntityId::intern("pn_read");
        host.handle(ViewCommand::ReadCardContent {
            card_id,
            file_path: "notes/a.md".into(),
        });
        host.handle(ViewCommand::ReadCardContent {
            card_id,
            file_path: "notes/missing.md".into(),
        });
        assert_eq!(
            host.take_events(),
            vec![HostEvent::CardContent {
                card_id,
                content: "# A".into()
            }]
        );
        assert!(host.ui().errors.is_empty());
    }

    #[test]
    fn open_missing_file_is_a_notice() {
        let mut host = host(MemoryWorkspace::new("/w"));
        host.handle(ViewCommand::OpenFile {
            file_path: "gone.md".into(),
            split_view: true,
        });
        assert_eq!(host.ui().errors, vec!["File not found: gone.md".to_string()]);
        assert!(host.io().opened.is_empty());
    }

    #[test]
    fn no_workspace_is_reported() {
        let mut host = host(MemoryWorkspace::without_root());
        host.handle(ViewCommand::OpenFile {
            file_path: "a.md".into(),
            split_view: false,
        });
        assert_eq!(host.ui().errors, vec!["No workspace folder open".to_string()]);
    }

    #[test]
    fn failed_card_save_keeps_session_alive() {
        let mut ws = MemoryWorkspace::new("/w").with_file("a.md", "old");
        ws.fail_writes = true;
        let mut host = host(ws);
        host.handle(ViewCommand::SaveCardContent {
            file_path: "a.md".into(),
            content: "new".into(),
        });
        assert_eq!(host.ui().errors.len(), 1);
        assert!(host.ui().errors[0].starts_with("Error saving file:"));
        assert_eq!(host.io().file("a.md"), Some("old"));
    }

    #[test]
    fn browse_relativizes_inside_root() {
        let mut ws = MemoryWorkspace::new("/w");
        ws.next_pick = Some("/w/notes/a.md".into());
        let mut host = host(ws);
        let block_id = EntityId::intern("pn_browse");
        host.handle(ViewCommand::BrowseFile { block_id });
        host.handle(ViewCommand::BrowseFile { block_id });
        assert_eq!(
            host.take_events(),
            vec![HostEvent::FileSelected {
                block_id,
                file_path: "notes/a.md".into()
            }]
        );
    }

    #[test]
    fn folders_start_with_root() {
        let mut host = host(
            MemoryWorkspace::new("/w")
                .with_file("b/x.md", "")
                .with_file("a/deep/y.md", ""),
        );
        host.handle(ViewCommand::GetWorkspaceFolders);
        assert_eq!(
            host.take_events(),
            vec![HostEvent::WorkspaceFolders {
                folders: vec!["".into(), "a".into(), "a/deep".into(), "b".into()]
            }]
        );
    }
}
