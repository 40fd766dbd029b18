//! Workspace path helpers.
//!
//! Card and block file references are stored either absolute or relative to
//! the workspace root. Matching always compares the resolved, lexically
//! normalized form; rewriting keeps whichever convention the stored value
//! used.

use std::path::{Component, Path, PathBuf};

pub const MARKDOWN_EXT: &str = ".md";

pub fn is_absolute(path: &str) -> bool {
    Path::new(path).is_absolute()
}

/// Resolve a stored reference against the workspace root.
pub fn resolve(path: &str, root: Option<&Path>) -> PathBuf {
    let p = Path::new(path);
    match root {
        Some(root) if !p.is_absolute() => normalize(&root.join(p)),
        _ => normalize(p),
    }
}

/// Lexical normalization: drops `.` and folds `..` without touching disk.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether a stored reference points at `target`.
pub fn refers_to(stored: &str, target: &Path, root: Option<&Path>) -> bool {
    !stored.is_empty() && resolve(stored, root) == normalize(target)
}

/// `path` relative to `root` with `/` separators, if it lies inside it.
pub fn relative_to(path: &Path, root: &Path) -> Option<String> {
    let rel = normalize(path)
        .strip_prefix(normalize(root))
        .ok()?
        .to_path_buf();
    Some(to_slash(&rel))
}

/// Relative form when inside the root, absolute otherwise.
pub fn display_relative(path: &Path, root: Option<&Path>) -> String {
    root.and_then(|root| relative_to(path, root))
        .unwrap_or_else(|| to_slash(&normalize(path)))
}

/// Re-express `new_path` in the convention `stored` used.
pub fn rewrite(stored: &str, new_path: &Path, root: Option<&Path>) -> String {
    if is_absolute(stored) {
        to_slash(&normalize(new_path))
    } else {
        display_relative(new_path, root)
    }
}

pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
        .replacen("//", "/", 1)
}

pub fn ensure_md_extension(name: &str) -> String {
    if name.ends_with(MARKDOWN_EXT) {
        name.to_string()
    } else {
        format!("{name}{MARKDOWN_EXT}")
    }
}

/// File name without the markdown extension, for titles and labels.
pub fn display_name(path: &str) -> String {
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    name.strip_suffix(MARKDOWN_EXT)
        .map(str::to_string)
        .unwrap_or(name)
}
