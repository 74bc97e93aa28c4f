//! Path derivation and resolution over the module/directory tree.
//!
//! Directories reference their parent by shortid; a path is computed by
//! walking the parent chain to the root. The walk tracks visited shortids so
//! a corrupt parent link surfaces as [`PathError::ParentCycle`] instead of
//! looping forever. Unknown parents terminate the walk at the root, which
//! keeps partially synced trees usable.

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::types::{Directory, EntityId, Module, ShortId};

/// Failure while deriving a path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// A directory's parent chain loops back on itself.
    #[error("directory `{0}` is part of a parent cycle")]
    ParentCycle(ShortId),
}

/// Computes the absolute path of a module, e.g. `/src/index.js`.
///
/// Returns `Ok(None)` when the module id is unknown.
pub fn module_path(
    modules: &[Module],
    directories: &[Directory],
    id: &EntityId,
) -> Result<Option<String>, PathError> {
    let Some(module) = modules.iter().find(|module| &module.id == id) else {
        return Ok(None);
    };
    let chain = parent_chain(directories, module.directory_shortid.as_ref())?;
    Ok(Some(join_path(&chain, module.title.as_str())))
}

/// Computes the absolute path of a directory, with a trailing name and no
/// trailing slash, e.g. `/src/components`.
///
/// Returns `Ok(None)` when the directory id is unknown.
pub fn directory_path(
    directories: &[Directory],
    id: &EntityId,
) -> Result<Option<String>, PathError> {
    let Some(directory) = directories.iter().find(|directory| &directory.id == id) else {
        return Ok(None);
    };
    let chain = parent_chain(directories, directory.directory_shortid.as_ref())?;
    Ok(Some(join_path(&chain, directory.title.as_str())))
}

/// Resolves a path to a module.
///
/// Returns `None` for anything outside the tracked tree (for example a
/// dependency typing file); callers treat that as a silent no-op.
pub fn resolve_module<'a>(
    path: &str,
    modules: &'a [Module],
    directories: &[Directory],
) -> Option<&'a Module> {
    let (dir_segments, title) = split_path(path)?;
    let parent = resolve_segments(&dir_segments, directories)?;
    modules.iter().find(|module| {
        module.title == title && module.directory_shortid == parent
    })
}

/// Resolves a path to a directory.
pub fn resolve_directory<'a>(
    path: &str,
    directories: &'a [Directory],
) -> Option<&'a Directory> {
    let (dir_segments, title) = split_path(path)?;
    let parent = resolve_segments(&dir_segments, directories)?;
    directories.iter().find(|directory| {
        directory.title == title && directory.directory_shortid == parent
    })
}

/// Collects every module and directory living under `directory`, including
/// nested ones. Used by directory deletes, which cascade.
pub fn modules_and_directories_in<'a>(
    directory: &Directory,
    modules: &'a [Module],
    directories: &'a [Directory],
) -> (Vec<&'a Module>, Vec<&'a Directory>) {
    let mut shortids = FxHashSet::default();
    shortids.insert(directory.shortid.clone());

    // Fixpoint over the parent links; the visited set doubles as the cycle
    // guard.
    loop {
        let mut grew = false;
        for child in directories {
            if let Some(parent) = &child.directory_shortid {
                if shortids.contains(parent) && shortids.insert(child.shortid.clone()) {
                    grew = true;
                }
            }
        }
        if !grew {
            break;
        }
    }

    let removed_directories = directories
        .iter()
        .filter(|child| shortids.contains(&child.shortid) && child.shortid != directory.shortid)
        .collect();
    let removed_modules = modules
        .iter()
        .filter(|module| {
            module
                .directory_shortid
                .as_ref()
                .is_some_and(|parent| shortids.contains(parent))
        })
        .collect();

    (removed_modules, removed_directories)
}

fn parent_chain<'a>(
    directories: &'a [Directory],
    start: Option<&ShortId>,
) -> Result<Vec<&'a Directory>, PathError> {
    let mut chain = Vec::new();
    let mut visited = FxHashSet::default();
    let mut cursor = start.cloned();

    while let Some(shortid) = cursor {
        if !visited.insert(shortid.clone()) {
            return Err(PathError::ParentCycle(shortid));
        }
        match directories
            .iter()
            .find(|directory| directory.shortid == shortid)
        {
            Some(directory) => {
                chain.push(directory);
                cursor = directory.directory_shortid.clone();
            }
            // Unknown parent: treat the chain as ending at the root.
            None => break,
        }
    }

    Ok(chain)
}

fn join_path(chain: &[&Directory], title: &str) -> String {
    let mut path = String::new();
    for directory in chain.iter().rev() {
        path.push('/');
        path.push_str(directory.title.as_str());
    }
    path.push('/');
    path.push_str(title);
    path
}

fn split_path(path: &str) -> Option<(Vec<&str>, &str)> {
    let mut segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    let title = segments.pop()?;
    Some((segments, title))
}

fn resolve_segments(segments: &[&str], directories: &[Directory]) -> Option<Option<ShortId>> {
    let mut parent: Option<ShortId> = None;
    for segment in segments {
        let directory = directories.iter().find(|directory| {
            directory.title == *segment && directory.directory_shortid == parent
        })?;
        parent = Some(directory.shortid.clone());
    }
    Some(parent)
}
