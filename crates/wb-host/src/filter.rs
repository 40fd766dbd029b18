//! Workspace file patterns.
//!
//! Patterns match `/`-separated paths relative to the workspace root, with
//! `*` confined to one path segment and `**` spanning directories.

use crate::error::HostResult;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// An include pattern plus an optional exclude pattern.
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl FileFilter {
    pub fn new(pattern: &str, exclude: Option<&str>) -> HostResult<Self> {
        Ok(Self {
            include: glob_set(pattern)?,
            exclude: exclude.map(glob_set).transpose()?,
        })
    }

    /// Whether a root-relative file path is selected.
    pub fn matches(&self, rel: &str) -> bool {
        self.include.is_match(rel) && !self.exclude.as_ref().is_some_and(|ex| ex.is_match(rel))
    }
}

fn glob_set(pattern: &str) -> HostResult<GlobSet> {
    let glob = GlobBuilder::new(pattern).literal_separator(true).build()?;
    Ok(GlobSetBuilder::new().add(glob).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use pretty_assertions::assert_eq;

    fn filter(pattern: &str, exclude: Option<&str>) -> FileFilter {
        FileFilter::new(pattern, exclude).unwrap()
    }

    #[test]
    fn double_star_spans_directories() {
        let md = filter("**/*.md", None);
        assert!(md.matches("a.md"));
        assert!(md.matches("notes/deep/a.md"));
        assert!(!md.matches("notes/a.txt"));
    }

    #[test]
    fn exclude_pattern() {
        let md = filter("**/*.md", Some("**/node_modules/**"));
        assert!(!md.matches("node_modules/pkg/readme.md"));
        assert!(!md.matches("web/node_modules/x.md"));
        assert!(md.matches("notes/modules.md"));
    }

    #[test]
    fn star_stays_in_segment() {
        assert!(filter("*.whiteboard.json", None).matches("plan.whiteboard.json"));
        assert!(!filter("*.whiteboard.json", None).matches("boards/plan.whiteboard.json"));
        assert!(filter("**/*.whiteboard.json", None).matches("boards/plan.whiteboard.json"));
        assert!(filter("n?tes/*", None).matches("notes/a.md"));
    }

    #[test]
    fn bad_pattern_is_an_error() {
        let err = FileFilter::new("notes/[a", None).unwrap_err();
        assert!(matches!(err, HostError::Pattern(_)));
        assert_eq!(err.code(), "E_PATTERN");
    }
}
