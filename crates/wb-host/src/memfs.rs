//! In-memory workspace for tests and dry runs.
//!
//! External edits are simulated with the `external_*` helpers, which update
//! the files and queue the watch event a real watcher would report.

use crate::error::{HostError, HostResult};
use crate::filter::FileFilter;
use crate::workspace::{FileIo, HostUi, WatchEvent, is_skipped_dir};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use wb_core::paths;

#[derive(Debug, Default)]
pub struct MemoryWorkspace {
    root: Option<PathBuf>,
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
    events: Vec<WatchEvent>,
    /// Files opened in the editor, with the side-by-side flag.
    pub opened: Vec<(PathBuf, bool)>,
    /// What the next `pick_file` returns.
    pub next_pick: Option<PathBuf>,
    /// Make every write fail, as a read-only disk would.
    pub fail_writes: bool,
    writes: usize,
}

impl MemoryWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(paths::normalize(&root.into())),
            ..Self::default()
        }
    }

    /// A workspace with no folder open.
    pub fn without_root() -> Self {
        Self::default()
    }

    /// Resolve a root-relative path.
    pub fn path(&self, rel: &str) -> PathBuf {
        paths::resolve(rel, self.root.as_deref())
    }

    /// Seed a file without reporting a watch event.
    pub fn with_file(mut self, rel: &str, content: &str) -> Self {
        let path = self.path(rel);
        self.insert(path, content.to_string());
        self
    }

    pub fn file(&self, rel: &str) -> Option<&str> {
        self.files.get(&self.path(rel)).map(String::as_str)
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn external_write(&mut self, rel: &str, content: &str) {
        let path = self.path(rel);
        self.insert(path.clone(), content.to_string());
        self.events.push(WatchEvent::Changed(path));
    }

    pub fn external_delete(&mut self, rel: &str) {
        let path = self.path(rel);
        self.files.remove(&path);
        self.events.push(WatchEvent::Deleted(path));
    }

    pub fn external_rename(&mut self, from: &str, to: &str) {
        let (from, to) = (self.path(from), self.path(to));
        if let Some(content) = self.files.remove(&from) {
            self.insert(to.clone(), content);
        }
        self.events.push(WatchEvent::Renamed { from, to });
    }

    fn insert(&mut self, path: PathBuf, content: String) {
        let mut parent = path.parent();
        while let Some(dir) = parent {
            if Some(dir) == self.root.as_deref() || dir.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(dir.to_path_buf());
            parent = dir.parent();
        }
        self.files.insert(path, content);
    }

    fn rel(&self, path: &Path) -> Option<String> {
        paths::relative_to(path, self.root.as_deref()?)
    }
}

impl FileIo for MemoryWorkspace {
    fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn read_text(&self, path: &Path) -> HostResult<String> {
        self.files
            .get(&paths::normalize(path))
            .cloned()
            .ok_or_else(|| HostError::NotFound(path.display().to_string()))
    }

    fn write_text(&mut self, path: &Path, content: &str) -> HostResult<()> {
        if self.fail_writes {
            return Err(HostError::Write {
                path: path.display().to_string(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only workspace"),
            });
        }
        self.insert(paths::normalize(path), content.to_string());
        self.writes += 1;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let path = paths::normalize(path);
        self.files.contains_key(&path) || self.dirs.contains(&path)
    }

    fn list_files(&self, pattern: &str, exclude: Option<&str>, limit: usize) -> Vec<PathBuf> {
        let filter = match FileFilter::new(pattern, exclude) {
            Ok(filter) => filter,
            Err(err) => {
                log::warn!("{err}");
                return Vec::new();
            }
        };
        self.files
            .keys()
            .filter(|path| {
                self.rel(path).is_some_and(|rel| {
                    !rel.split('/').any(is_skipped_dir) && filter.matches(&rel)
                })
            })
            .take(limit)
            .cloned()
            .collect()
    }

    fn list_dirs(&self) -> Vec<String> {
        self.dirs
            .iter()
            .filter_map(|dir| self.rel(dir))
            .filter(|rel| !rel.is_empty() && !rel.split('/').any(is_skipped_dir))
            .collect()
    }

    fn create_dir_all(&mut self, path: &Path) -> HostResult<()> {
        let mut dir = Some(paths::normalize(path));
        while let Some(d) = dir {
            if Some(d.as_path()) == self.root.as_deref() || d.as_os_str().is_empty() {
                break;
            }
            dir = d.parent().map(Path::to_path_buf);
            self.dirs.insert(d);
        }
        Ok(())
    }

    fn create_file(&mut self, path: &Path, content: &str) -> HostResult<()> {
        if self.exists(path) {
            return Err(HostError::AlreadyExists(path.display().to_string()));
        }
        self.write_text(path, content)
    }

    fn rename_or_move(&mut self, from: &Path, to: &Path) -> HostResult<()> {
        let from = paths::normalize(from);
        let to = paths::normalize(to);
        let content = self
            .files
            .remove(&from)
            .ok_or_else(|| HostError::NotFound(from.display().to_string()))?;
        self.insert(to.clone(), content);
        self.events.push(WatchEvent::Renamed { from, to });
        Ok(())
    }

    fn open_in_editor(&mut self, path: &Path, side_by_side: bool) -> HostResult<()> {
        self.opened.push((paths::normalize(path), side_by_side));
        Ok(())
    }

    fn pick_file(&mut self, _extensions: &[&str]) -> Option<PathBuf> {
        self.next_pick.take()
    }

    fn drain_events(&mut self) -> Vec<WatchEvent> {
        std::mem::take(&mut self.events)
    }
}

/// A [`HostUi`] that keeps every notice.
#[derive(Debug, Default)]
pub struct RecordingUi {
    pub errors: Vec<String>,
    pub infos: Vec<String>,
}

impl HostUi for RecordingUi {
    fn show_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn show_info(&mut self, message: &str) {
        self.infos.push(message.to_string());
    }
}
