//! The workspace the host reads and writes: file I/O, file watching, the
//! external editor and the user-notice surface.
//!
//! [`FileIo`] is the seam between the host handler and the filesystem.
//! [`FsWorkspace`] backs it with the real disk and `notify`;
//! [`crate::memfs::MemoryWorkspace`] keeps everything in memory for tests.
//! All paths crossing the trait are absolute.

use crate::error::{HostError, HostResult};
use crate::filter::FileFilter;
use ignore::{DirEntry, WalkBuilder};
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use wb_core::paths;

/// Directories never listed or watched.
pub const EXCLUDED_DIR: &str = "node_modules";

/// How long the watcher's echo of a rename the host performed itself is
/// waited for before the rename is forgotten.
const RENAME_ECHO_TTL: Duration = Duration::from_secs(2);

/// A change to a watched markdown file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Changed(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

impl WatchEvent {
    fn is_markdown(&self) -> bool {
        let md = |p: &Path| p.extension().is_some_and(|ext| ext == "md");
        match self {
            WatchEvent::Changed(p) | WatchEvent::Deleted(p) => md(p),
            WatchEvent::Renamed { from, to } => md(from) || md(to),
        }
    }
}

/// File capabilities the host handler needs.
pub trait FileIo {
    /// Workspace root, if a folder is open.
    fn root(&self) -> Option<&Path>;

    fn read_text(&self, path: &Path) -> HostResult<String>;
    fn write_text(&mut self, path: &Path, content: &str) -> HostResult<()>;
    fn exists(&self, path: &Path) -> bool;

    /// Files under the root matching `pattern` and not `exclude`, sorted,
    /// at most `limit` of them. Hidden and dependency directories are not
    /// searched.
    fn list_files(&self, pattern: &str, exclude: Option<&str>, limit: usize) -> Vec<PathBuf>;

    /// Directories under the root, relative, sorted. Hidden and dependency
    /// directories and everything below them are left out.
    fn list_dirs(&self) -> Vec<String>;

    fn create_dir_all(&mut self, path: &Path) -> HostResult<()>;

    /// Create a new file; fails with `AlreadyExists` instead of overwriting.
    fn create_file(&mut self, path: &Path, content: &str) -> HostResult<()>;

    /// Rename or move a file. Reports the same [`WatchEvent::Renamed`] an
    /// external rename would.
    fn rename_or_move(&mut self, from: &Path, to: &Path) -> HostResult<()>;

    fn open_in_editor(&mut self, path: &Path, side_by_side: bool) -> HostResult<()>;

    /// Ask the user for a file. `None` when cancelled.
    fn pick_file(&mut self, extensions: &[&str]) -> Option<PathBuf>;

    /// Watch events that arrived since the last call.
    fn drain_events(&mut self) -> Vec<WatchEvent>;
}

/// Where user-visible notices go.
pub trait HostUi {
    fn show_error(&mut self, message: &str);
    fn show_info(&mut self, message: &str);
}

/// Notices written to the log.
#[derive(Debug, Default)]
pub struct LogUi;

impl HostUi for LogUi {
    fn show_error(&mut self, message: &str) {
        log::error!("{message}");
    }

    fn show_info(&mut self, message: &str) {
        log::info!("{message}");
    }
}

pub(crate) fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.') || name == EXCLUDED_DIR
}

/// A sorted walk of `root` that never enters hidden or dependency
/// directories.
fn walk(root: &Path) -> impl Iterator<Item = DirEntry> {
    WalkBuilder::new(root)
        .hidden(true)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .require_git(false)
        .filter_entry(|entry| {
            entry.depth() == 0 || !is_skipped_dir(&entry.file_name().to_string_lossy())
        })
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::debug!("skipping unreadable entry: {err}");
                None
            }
        })
}

fn is_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_some_and(|t| t.is_dir())
}

// ─── Filesystem backend ──────────────────────────────────────────────────

pub struct FsWorkspace {
    root: Option<PathBuf>,
    events_tx: mpsc::Sender<WatchEvent>,
    events_rx: mpsc::Receiver<WatchEvent>,
    watcher: Option<RecommendedWatcher>,
    /// Renames performed through [`FileIo::rename_or_move`], already
    /// reported, whose watcher echo may still arrive.
    own_renames: Vec<(PathBuf, PathBuf, Instant)>,
    /// Events raised by the workspace itself, reported before watcher events.
    local_events: Vec<WatchEvent>,
}

impl FsWorkspace {
    pub fn new(root: Option<PathBuf>) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            root: root.map(|r| paths::normalize(&r)),
            events_tx,
            events_rx,
            watcher: None,
            own_renames: Vec::new(),
            local_events: Vec::new(),
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Start watching markdown files under the root.
    pub fn watch(&mut self) -> HostResult<()> {
        let Some(root) = self.root.clone() else {
            return Err(HostError::NoWorkspace);
        };
        let tx = self.events_tx.clone();
        let mut watcher = notify::recommended_watcher(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for ev in translate(event) {
                        let _ = tx.send(ev);
                    }
                }
                Err(err) => log::debug!("watch error ignored: {err}"),
            },
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        log::info!("watching {}", root.display());
        self.watcher = Some(watcher);
        Ok(())
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let rel = match &self.root {
            Some(root) => path.strip_prefix(root).unwrap_or(path),
            None => path,
        };
        rel.components()
            .any(|c| is_skipped_dir(&c.as_os_str().to_string_lossy()))
    }

    /// Whether a watcher rename is the echo of one of our own. Each own
    /// rename absorbs at most one echo.
    fn is_echo(&mut self, from: &Path, to: &Path) -> bool {
        match self
            .own_renames
            .iter()
            .position(|(f, t, _)| f == from && t == to)
        {
            Some(pos) => {
                self.own_renames.remove(pos);
                true
            }
            None => false,
        }
    }

    fn expire_own_renames(&mut self, now: Instant) {
        self.own_renames
            .retain(|(_, _, at)| now.duration_since(*at) < RENAME_ECHO_TTL);
    }
}

fn translate(event: notify::Event) -> Vec<WatchEvent> {
    let mut paths = event.paths.into_iter();
    let out = match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            match (paths.next(), paths.next()) {
                (Some(from), Some(to)) => vec![WatchEvent::Renamed { from, to }],
                _ => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => Vec::new(),
        EventKind::Create(_) | EventKind::Modify(_) => paths.map(WatchEvent::Changed).collect(),
        EventKind::Remove(_) => paths.map(WatchEvent::Deleted).collect(),
        _ => Vec::new(),
    };
    out.into_iter().filter(WatchEvent::is_markdown).collect()
}

impl FileIo for FsWorkspace {
    fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn read_text(&self, path: &Path) -> HostResult<String> {
        std::fs::read_to_string(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => HostError::NotFound(path.display().to_string()),
            _ => HostError::Io(err),
        })
    }

    fn write_text(&mut self, path: &Path, content: &str) -> HostResult<()> {
        std::fs::write(path, content).map_err(|source| HostError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_files(&self, pattern: &str, exclude: Option<&str>, limit: usize) -> Vec<PathBuf> {
        let Some(root) = &self.root else {
            return Vec::new();
        };
        let filter = match FileFilter::new(pattern, exclude) {
            Ok(filter) => filter,
            Err(err) => {
                log::warn!("{err}");
                return Vec::new();
            }
        };
        // The walk is in path order, so the first `limit` matches are the
        // sorted prefix.
        walk(root)
            .filter(|entry| !is_dir(entry))
            .filter(|entry| {
                paths::relative_to(entry.path(), root).is_some_and(|rel| filter.matches(&rel))
            })
            .take(limit)
            .map(DirEntry::into_path)
            .collect()
    }

    fn list_dirs(&self) -> Vec<String> {
        let Some(root) = &self.root else {
            return Vec::new();
        };
        walk(root)
            .filter(|entry| entry.depth() > 0 && is_dir(entry))
            .filter_map(|entry| paths::relative_to(entry.path(), root))
            .collect()
    }

    fn create_dir_all(&mut self, path: &Path) -> HostResult<()> {
        Ok(std::fs::create_dir_all(path)?)
    }

    fn create_file(&mut self, path: &Path, content: &str) -> HostResult<()> {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    HostError::AlreadyExists(path.display().to_string())
                }
                _ => HostError::Io(err),
            })?;
        file.write_all(content.as_bytes())
            .map_err(|source| HostError::Write {
                path: path.display().to_string(),
                source,
            })
    }

    fn rename_or_move(&mut self, from: &Path, to: &Path) -> HostResult<()> {
        std::fs::rename(from, to)?;
        self.own_renames
            .push((from.to_path_buf(), to.to_path_buf(), Instant::now()));
        self.local_events.push(WatchEvent::Renamed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(())
    }

    fn open_in_editor(&mut self, path: &Path, side_by_side: bool) -> HostResult<()> {
        let editor = std::env::var("VISUAL").or_else(|_| std::env::var("EDITOR"));
        match editor {
            Ok(editor) => {
                log::debug!("opening {} in {editor} (side by side: {side_by_side})", path.display());
                std::process::Command::new(editor).arg(path).spawn()?;
            }
            Err(_) => log::info!("no $VISUAL or $EDITOR set; not opening {}", path.display()),
        }
        Ok(())
    }

    fn pick_file(&mut self, extensions: &[&str]) -> Option<PathBuf> {
        log::info!("no file picker available for {extensions:?}");
        None
    }

    fn drain_events(&mut self) -> Vec<WatchEvent> {
        let mut out = std::mem::take(&mut self.local_events);
        while let Ok(event) = self.events_rx.try_recv() {
            match &event {
                WatchEvent::Changed(p) | WatchEvent::Deleted(p) if self.is_excluded(p) => continue,
                WatchEvent::Renamed { from, to } if self.is_echo(from, to) => continue,
                _ => out.push(event),
            }
        }
        self.expire_own_renames(Instant::now());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn translate_keeps_markdown_only() {
        let event = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/w/a.md"))
            .add_path(PathBuf::from("/w/b.txt"));
        assert_eq!(translate(event), vec![WatchEvent::Changed("/w/a.md".into())]);
    }

    #[test]
    fn translate_rename_and_remove() {
        let rename = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/w/a.md"))
            .add_path(PathBuf::from("/w/b.md"));
        assert_eq!(
            translate(rename),
            vec![WatchEvent::Renamed {
                from: "/w/a.md".into(),
                to: "/w/b.md".into()
            }]
        );
        let remove =
            notify::Event::new(EventKind::Remove(RemoveKind::File)).add_path("/w/a.md".into());
        assert_eq!(translate(remove), vec![WatchEvent::Deleted("/w/a.md".into())]);
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wb-host-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn renamed(from: &Path, to: &Path) -> WatchEvent {
        WatchEvent::Renamed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        }
    }

    #[test]
    fn own_rename_is_reported_once() {
        let root = scratch_dir("own-rename");
        std::fs::write(root.join("a.md"), "# A").unwrap();
        let mut ws = FsWorkspace::new(Some(root.clone()));
        let base = ws.root.clone().unwrap();
        let (from, to) = (base.join("a.md"), base.join("b.md"));

        ws.rename_or_move(&from, &to).unwrap();
        ws.events_tx.send(renamed(&from, &to)).unwrap();
        assert_eq!(ws.drain_events(), vec![renamed(&from, &to)]);
        assert!(ws.own_renames.is_empty());
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn external_renames_are_never_swallowed() {
        let mut ws = FsWorkspace::new(Some("/w".into()));
        let event = renamed(Path::new("/w/a.md"), Path::new("/w/b.md"));
        ws.events_tx.send(event.clone()).unwrap();
        ws.events_tx.send(event.clone()).unwrap();
        assert_eq!(ws.drain_events(), vec![event.clone(), event]);
    }

    #[test]
    fn unechoed_own_rename_expires() {
        let mut ws = FsWorkspace::new(Some("/w".into()));
        let (from, to) = (PathBuf::from("/w/a.md"), PathBuf::from("/w/b.md"));
        let long_ago = Instant::now().checked_sub(RENAME_ECHO_TTL * 2).unwrap();
        ws.own_renames.push((from.clone(), to.clone(), long_ago));
        assert!(ws.drain_events().is_empty());
        assert!(ws.own_renames.is_empty());

        ws.events_tx.send(renamed(&from, &to)).unwrap();
        assert_eq!(ws.drain_events(), vec![renamed(&from, &to)]);
    }

    #[test]
    fn listing_skips_hidden_and_dependency_dirs() {
        let root = scratch_dir("listing");
        for rel in ["b.md", "notes/a.md", "notes/z.txt", "node_modules/pkg/readme.md", ".git/x.md"] {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "").unwrap();
        }
        std::fs::create_dir_all(root.join("notes/deep")).unwrap();
        let ws = FsWorkspace::new(Some(root.clone()));
        let base = ws.root.clone().unwrap();

        assert_eq!(
            ws.list_files("**/*.md", Some("**/node_modules/**"), 100),
            vec![base.join("b.md"), base.join("notes/a.md")]
        );
        assert_eq!(ws.list_files("**/*.md", None, 1), vec![base.join("b.md")]);
        assert_eq!(ws.list_dirs(), vec!["notes".to_string(), "notes/deep".to_string()]);
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn changes_under_excluded_dirs_are_dropped() {
        let mut ws = FsWorkspace::new(Some("/w".into()));
        ws.events_tx
            .send(WatchEvent::Changed("/w/node_modules/x/readme.md".into()))
            .unwrap();
        ws.events_tx
            .send(WatchEvent::Changed("/w/.git/notes.md".into()))
            .unwrap();
        ws.events_tx.send(WatchEvent::Changed("/w/a.md".into())).unwrap();
        assert_eq!(ws.drain_events(), vec![WatchEvent::Changed("/w/a.md".into())]);
    }
}
