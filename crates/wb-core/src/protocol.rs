//! Messages exchanged between the interactive view and the host.
//!
//! Both directions are closed tagged enums serialized as
//! `{"command": "<name>", ...fields}`. Responses are correlated by the
//! embedded card or block id, never by request order, since several
//! requests can be in flight at once.

use crate::id::EntityId;
use crate::model::WhiteboardDocument;
use serde::{Deserialize, Serialize};

/// Requests the view sends to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ViewCommand {
    SaveState {
        state: WhiteboardDocument,
    },
    RequestState,
    OpenFile {
        file_path: String,
        #[serde(default = "default_split_view")]
        split_view: bool,
    },
    BrowseFile {
        block_id: EntityId,
    },
    ReadCardContent {
        card_id: EntityId,
        file_path: String,
    },
    SaveCardContent {
        file_path: String,
        content: String,
    },
    CreateNewCard {
        file_name: String,
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        for_block_id: Option<EntityId>,
        /// Put the new file in the stash instead of on the canvas.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        add_to_stash: bool,
    },
    RenameCard {
        card_id: EntityId,
        old_path: String,
        new_name: String,
    },
    MoveCard {
        card_id: EntityId,
        old_path: String,
        target_folder: String,
    },
    GetWorkspaceFiles,
    GetWorkspaceFolders,
    ReadPinnedFileContent {
        file_path: String,
    },
    SavePinnedFileContent {
        file_path: String,
        content: String,
    },
    GetCardFolderPath,
}

impl ViewCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ViewCommand::SaveState { .. } => "saveState",
            ViewCommand::RequestState => "requestState",
            ViewCommand::OpenFile { .. } => "openFile",
            ViewCommand::BrowseFile { .. } => "browseFile",
            ViewCommand::ReadCardContent { .. } => "readCardContent",
            ViewCommand::SaveCardContent { .. } => "saveCardContent",
            ViewCommand::CreateNewCard { .. } => "createNewCard",
            ViewCommand::RenameCard { .. } => "renameCard",
            ViewCommand::MoveCard { .. } => "moveCard",
            ViewCommand::GetWorkspaceFiles => "getWorkspaceFiles",
            ViewCommand::GetWorkspaceFolders => "getWorkspaceFolders",
            ViewCommand::ReadPinnedFileContent { .. } => "readPinnedFileContent",
            ViewCommand::SavePinnedFileContent { .. } => "savePinnedFileContent",
            ViewCommand::GetCardFolderPath => "getCardFolderPath",
        }
    }
}

fn default_split_view() -> bool {
    true
}

/// Responses and pushes the host sends to the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostEvent {
    LoadState {
        state: WhiteboardDocument,
    },
    WorkspaceFiles {
        files: Vec<String>,
    },
    FileSelected {
        block_id: EntityId,
        file_path: String,
    },
    FileChanged {
        card_id: EntityId,
        file_path: String,
        content: String,
    },
    FileDeleted {
        card_id: EntityId,
        file_path: String,
    },
    CardContent {
        card_id: EntityId,
        content: String,
    },
    CardCreated {
        file_path: String,
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        for_block_id: Option<EntityId>,
        /// Put the new file in the stash instead of on the canvas.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        add_to_stash: bool,
    },
    /// `new_path` keeps the convention the card's stored path used.
    FileRenamed {
        card_id: EntityId,
        old_path: String,
        new_path: String,
    },
    BlockFileRenamed {
        block_id: EntityId,
        old_path: String,
        new_path: String,
    },
    StashCardFileRenamed {
        stash_card_id: EntityId,
        old_path: String,
        new_path: String,
    },
    PinnedFileRenamed {
        old_path: String,
        new_path: String,
    },
    CardRenamed {
        card_id: EntityId,
        old_path: String,
        new_path: String,
    },
    CardMoved {
        card_id: EntityId,
        old_path: String,
        new_path: String,
    },
    WorkspaceFolders {
        folders: Vec<String>,
    },
    PinnedFileContent {
        file_path: String,
        content: String,
    },
    CardFolderPath {
        path: String,
    },
    /// Keyboard shortcut routed through the host: open the sidebar on
    /// `tab_name`, or close it if that tab is already showing.
    ToggleSidebarTab {
        tab_name: String,
    },
    /// The last `saveState` could not be written.
    SaveFailed,
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::LoadState { .. } => "loadState",
            HostEvent::WorkspaceFiles { .. } => "workspaceFiles",
            HostEvent::FileSelected { .. } => "fileSelected",
            HostEvent::FileChanged { .. } => "fileChanged",
            HostEvent::FileDeleted { .. } => "fileDeleted",
            HostEvent::CardContent { .. } => "cardContent",
            HostEvent::CardCreated { .. } => "cardCreated",
            HostEvent::FileRenamed { .. } => "fileRenamed",
            HostEvent::BlockFileRenamed { .. } => "blockFileRenamed",
            HostEvent::StashCardFileRenamed { .. } => "stashCardFileRenamed",
            HostEvent::PinnedFileRenamed { .. } => "pinnedFileRenamed",
            HostEvent::CardRenamed { .. } => "cardRenamed",
            HostEvent::CardMoved { .. } => "cardMoved",
            HostEvent::WorkspaceFolders { .. } => "workspaceFolders",
            HostEvent::PinnedFileContent { .. } => "pinnedFileContent",
            HostEvent::CardFolderPath { .. } => "cardFolderPath",
            HostEvent::ToggleSidebarTab { .. } => "toggleSidebarTab",
            HostEvent::SaveFailed => "saveFailed",
        }
    }
}
