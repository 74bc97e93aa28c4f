//! Path-indexed projection of the sandbox tree.
//!
//! The editor surface reads files by path, not by shortid, so the session
//! keeps this `path -> entry` map in sync with the model. Sparse updates
//! cover the common cases; anything that can invalidate descendant paths
//! (directory renames, rollbacks) rebuilds the projection wholesale.

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::path;
use crate::sandbox::SandboxModel;
use crate::types::ShortId;

/// What a projected path points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionEntry {
    /// A module.
    File(ShortId),
    /// A directory.
    Dir(ShortId),
}

/// Derived `path -> entry` cache over a [`SandboxModel`].
#[derive(Debug, Default)]
pub struct FileProjection {
    entries: FxHashMap<String, ProjectionEntry>,
}

impl FileProjection {
    /// Creates an empty projection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Throws away the current index and re-derives every path from the
    /// model. Entities whose path cannot be derived are skipped.
    pub fn rebuild(&mut self, model: &SandboxModel) {
        self.entries.clear();

        for directory in model.directories() {
            match path::directory_path(model.directories(), &directory.id) {
                Ok(Some(dir_path)) => {
                    self.entries
                        .insert(dir_path, ProjectionEntry::Dir(directory.shortid.clone()));
                }
                Ok(None) => {}
                Err(err) => warn!("skipping directory {}: {err}", directory.shortid),
            }
        }

        for module in model.modules() {
            match path::module_path(model.modules(), model.directories(), &module.id) {
                Ok(Some(module_path)) => {
                    self.entries
                        .insert(module_path, ProjectionEntry::File(module.shortid.clone()));
                }
                Ok(None) => {}
                Err(err) => warn!("skipping module {}: {err}", module.shortid),
            }
        }
    }

    /// Registers or refreshes a single file entry.
    pub fn write_file(&mut self, module_path: impl Into<String>, shortid: ShortId) {
        self.entries
            .insert(module_path.into(), ProjectionEntry::File(shortid));
    }

    /// Registers a directory entry.
    pub fn mkdir(&mut self, dir_path: impl Into<String>, shortid: ShortId) {
        self.entries
            .insert(dir_path.into(), ProjectionEntry::Dir(shortid));
    }

    /// Moves an entry from `old_path` to `new_path`. A miss is a no-op.
    pub fn rename(&mut self, old_path: &str, new_path: impl Into<String>) {
        if let Some(entry) = self.entries.remove(old_path) {
            self.entries.insert(new_path.into(), entry);
        }
    }

    /// Removes an entry. A miss is a no-op.
    pub fn unlink(&mut self, entry_path: &str) {
        self.entries.remove(entry_path);
    }

    /// Resolves a path to the module it points at.
    #[must_use]
    pub fn resolve_file(&self, entry_path: &str) -> Option<&ShortId> {
        match self.entries.get(entry_path) {
            Some(ProjectionEntry::File(shortid)) => Some(shortid),
            _ => None,
        }
    }

    /// Resolves a path to any entry.
    #[must_use]
    pub fn resolve(&self, entry_path: &str) -> Option<&ProjectionEntry> {
        self.entries.get(entry_path)
    }

    /// Number of indexed paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over indexed paths, in arbitrary order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::tests::sandbox_fixture;

    #[test]
    fn rebuild_indexes_modules_and_directories() {
        let model = SandboxModel::new(sandbox_fixture());
        let mut projection = FileProjection::new();
        projection.rebuild(&model);

        assert_eq!(
            projection.resolve_file("/index.js"),
            Some(&ShortId::new("s-index"))
        );
        assert_eq!(
            projection.resolve_file("/src/app.js"),
            Some(&ShortId::new("s-app"))
        );
        assert!(matches!(
            projection.resolve("/src"),
            Some(ProjectionEntry::Dir(_))
        ));
        assert!(projection.resolve_file("/missing.js").is_none());
    }

    #[test]
    fn rename_moves_one_entry() {
        let model = SandboxModel::new(sandbox_fixture());
        let mut projection = FileProjection::new();
        projection.rebuild(&model);

        projection.rename("/index.js", "/main.js");
        assert!(projection.resolve_file("/index.js").is_none());
        assert_eq!(
            projection.resolve_file("/main.js"),
            Some(&ShortId::new("s-index"))
        );
    }

    #[test]
    fn unlink_and_write_file_are_sparse() {
        let model = SandboxModel::new(sandbox_fixture());
        let mut projection = FileProjection::new();
        projection.rebuild(&model);
        let before = projection.len();

        projection.unlink("/index.js");
        assert_eq!(projection.len(), before - 1);

        projection.write_file("/fresh.js", ShortId::new("s-fresh"));
        assert_eq!(
            projection.resolve_file("/fresh.js"),
            Some(&ShortId::new("s-fresh"))
        );
    }
}
