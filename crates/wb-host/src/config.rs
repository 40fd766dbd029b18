//! Host settings.

use crate::error::{HostError, HostResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable that overrides `cardFolderPath`.
pub const CARD_FOLDER_ENV: &str = "WHITEBOARD_CARD_FOLDER_PATH";

/// Settings file looked up under the workspace root when none is given.
pub const DEFAULT_SETTINGS_PATH: &str = ".whiteboard/settings.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WhiteboardConfig {
    /// Folder, relative to the workspace root, where new card files are
    /// created. Empty means the root itself.
    pub card_folder_path: String,
}

impl WhiteboardConfig {
    pub fn from_json(text: &str, origin: &str) -> HostResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).map_err(|source| HostError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Read `settings` if it exists, then apply environment overrides.
    /// An unparsable settings file is logged and ignored.
    pub fn load(settings: &Path) -> Self {
        let base = match std::fs::read_to_string(settings) {
            Ok(text) => Self::from_json(&text, &settings.display().to_string())
                .unwrap_or_else(|err| {
                    log::warn!("{err}; using default settings");
                    Self::default()
                }),
            Err(_) => Self::default(),
        };
        base.with_overrides(std::env::var(CARD_FOLDER_ENV).ok())
    }

    pub fn with_overrides(mut self, card_folder: Option<String>) -> Self {
        if let Some(folder) = card_folder {
            log::debug!("{CARD_FOLDER_ENV} overrides cardFolderPath with {folder:?}");
            self.card_folder_path = folder;
        }
        self
    }

    /// The configured folder without surrounding slashes, or `None` for the
    /// workspace root.
    pub fn card_folder(&self) -> Option<&str> {
        let folder = self.card_folder_path.trim().trim_matches('/');
        (!folder.is_empty()).then_some(folder)
    }
}
