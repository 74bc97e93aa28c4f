//! The sandbox aggregate: single source of truth for the active project.
//!
//! All mutating operations are written so the caller can reverse them while
//! holding the pre-mutation value; every network-synchronized mutation in
//! the editor layer applies optimistically and restores on failure.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::warn;

use crate::path;
use crate::types::{
    Authorization, Directory, EntityId, Module, ModuleCorrection, ModuleError, Sandbox, ShortId,
};

/// Default entry file per environment template, used when `package.json`
/// does not name one.
static TEMPLATE_ENTRIES: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    FxHashMap::from_iter([
        ("react", "/src/index.js"),
        ("vue-cli", "/src/main.js"),
        ("angular-cli", "/src/main.ts"),
        ("svelte", "/index.js"),
        ("parcel", "/index.html"),
        ("static", "/index.html"),
        ("node", "/index.js"),
    ])
});

/// What a sparse change record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    /// A module.
    File,
    /// A directory.
    Directory,
}

/// Operation of a sparse change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOp {
    /// Created or modified.
    Update,
    /// Removed.
    Delete,
}

/// A sparse change notification, reconciled against a fresh snapshot by
/// [`SandboxModel::sync`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncUpdate {
    /// What happened.
    pub op: SyncOp,
    /// Path of the changed entity.
    pub path: String,
    /// Whether the path names a file or a directory.
    #[serde(rename = "type")]
    pub kind: SyncKind,
}

/// In-memory model of the active sandbox.
///
/// Exactly one model is current per session; switching sandboxes goes
/// through [`SandboxModel::replace`], which resets errors, corrections and
/// the current module.
#[derive(Debug)]
pub struct SandboxModel {
    sandbox: Sandbox,
    current_module_shortid: Option<ShortId>,
    errors: Vec<ModuleError>,
    corrections: Vec<ModuleCorrection>,
}

impl SandboxModel {
    /// Creates a model for a freshly fetched sandbox.
    #[must_use]
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            sandbox,
            current_module_shortid: None,
            errors: Vec::new(),
            corrections: Vec::new(),
        }
    }

    /// Replaces the tracked sandbox. Errors, corrections and the current
    /// module do not survive a sandbox switch.
    pub fn replace(&mut self, sandbox: Sandbox) {
        self.sandbox = sandbox;
        self.errors.clear();
        self.corrections.clear();
        self.current_module_shortid = None;
    }

    /// In-place fork transition: adopts the forked sandbox while carrying
    /// over the locally held content of every module that survives (same
    /// shortid), so unsaved edits are not lost across the fork.
    pub fn adopt_fork(&mut self, mut forked: Sandbox) {
        for module in &mut forked.modules {
            if let Some(existing) = self.module(&module.shortid) {
                module.code = existing.code.clone();
            }
        }
        self.replace(forked);
    }

    /// The tracked sandbox record.
    #[must_use]
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Sandbox id.
    #[must_use]
    pub fn id(&self) -> &crate::types::SandboxId {
        &self.sandbox.id
    }

    /// Display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.sandbox.title
    }

    /// Environment template.
    #[must_use]
    pub fn template(&self) -> &str {
        self.sandbox.template.as_str()
    }

    /// True when the current user owns the sandbox.
    #[must_use]
    pub fn owned(&self) -> bool {
        self.sandbox.owned
    }

    /// Overrides the ownership flag (used when a live session ends and the
    /// locally computed value is restored).
    pub fn set_owned(&mut self, owned: bool) {
        self.sandbox.owned = owned;
    }

    /// Frozen flag.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.sandbox.is_frozen
    }

    /// Sets the frozen flag.
    pub fn set_frozen(&mut self, frozen: bool) {
        self.sandbox.is_frozen = frozen;
    }

    /// True when the current user holds at least `required` access.
    #[must_use]
    pub fn has_permission(&self, required: Authorization) -> bool {
        self.sandbox.authorization.grants(required)
    }

    /// All modules.
    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.sandbox.modules
    }

    /// All directories.
    #[must_use]
    pub fn directories(&self) -> &[Directory] {
        &self.sandbox.directories
    }

    /// Looks up a module by its stable key.
    #[must_use]
    pub fn module(&self, shortid: &ShortId) -> Option<&Module> {
        self.sandbox
            .modules
            .iter()
            .find(|module| &module.shortid == shortid)
    }

    /// Mutable module lookup by stable key.
    pub fn module_mut(&mut self, shortid: &ShortId) -> Option<&mut Module> {
        self.sandbox
            .modules
            .iter_mut()
            .find(|module| &module.shortid == shortid)
    }

    /// Looks up a module by server id.
    #[must_use]
    pub fn module_by_id(&self, id: &EntityId) -> Option<&Module> {
        self.sandbox.modules.iter().find(|module| &module.id == id)
    }

    /// Resolves a module by path. Tolerates the editor surface's
    /// `/sandbox` mount prefix. Untracked paths resolve to `None`.
    #[must_use]
    pub fn module_by_path(&self, raw_path: &str) -> Option<&Module> {
        let stripped = raw_path.strip_prefix("/sandbox").unwrap_or(raw_path);
        path::resolve_module(stripped, &self.sandbox.modules, &self.sandbox.directories)
    }

    /// Looks up a directory by its stable key.
    #[must_use]
    pub fn directory(&self, shortid: &ShortId) -> Option<&Directory> {
        self.sandbox
            .directories
            .iter()
            .find(|directory| &directory.shortid == shortid)
    }

    /// Mutable directory lookup by stable key.
    pub fn directory_mut(&mut self, shortid: &ShortId) -> Option<&mut Directory> {
        self.sandbox
            .directories
            .iter_mut()
            .find(|directory| &directory.shortid == shortid)
    }

    /// Derives the absolute path of a module. Cycles in the directory tree
    /// are reported once and resolve to `None`.
    #[must_use]
    pub fn module_path(&self, shortid: &ShortId) -> Option<String> {
        let module = self.module(shortid)?;
        match path::module_path(&self.sandbox.modules, &self.sandbox.directories, &module.id) {
            Ok(module_path) => module_path,
            Err(err) => {
                warn!("cannot derive path for module {shortid}: {err}");
                None
            }
        }
    }

    /// Derives the absolute path of a directory.
    #[must_use]
    pub fn directory_path(&self, shortid: &ShortId) -> Option<String> {
        let directory = self.directory(shortid)?;
        match path::directory_path(&self.sandbox.directories, &directory.id) {
            Ok(dir_path) => dir_path,
            Err(err) => {
                warn!("cannot derive path for directory {shortid}: {err}");
                None
            }
        }
    }

    /// Currently open module, if any.
    #[must_use]
    pub fn current_module(&self) -> Option<&Module> {
        self.current_module_shortid
            .as_ref()
            .and_then(|shortid| self.module(shortid))
    }

    /// Stable key of the currently open module.
    #[must_use]
    pub fn current_module_shortid(&self) -> Option<&ShortId> {
        self.current_module_shortid.as_ref()
    }

    /// Marks a module as current. Content is untouched.
    pub fn set_current_module(&mut self, shortid: ShortId) {
        self.current_module_shortid = Some(shortid);
    }

    /// Clears the current module (e.g. after jumping to an untracked file).
    pub fn unset_current_module(&mut self) {
        self.current_module_shortid = None;
    }

    /// True when `shortid` names the currently open module.
    #[must_use]
    pub fn is_current_module(&self, shortid: &ShortId) -> bool {
        self.current_module_shortid.as_ref() == Some(shortid)
    }

    /// The root `package.json` module, if present.
    #[must_use]
    pub fn package_json(&self) -> Option<&Module> {
        self.sandbox
            .modules
            .iter()
            .find(|module| module.directory_shortid.is_none() && module.title == "package.json")
    }

    /// The sandbox's designated entry file: the `package.json` `main`
    /// field, else the template default, else the first root module.
    #[must_use]
    pub fn main_module(&self) -> Option<&Module> {
        if let Some(main) = self.package_json_main() {
            if let Some(module) =
                path::resolve_module(&main, &self.sandbox.modules, &self.sandbox.directories)
            {
                return Some(module);
            }
        }

        let entry = TEMPLATE_ENTRIES
            .get(self.sandbox.template.as_str())
            .copied()
            .unwrap_or("/index.js");
        path::resolve_module(entry, &self.sandbox.modules, &self.sandbox.directories)
            .or_else(|| {
                self.sandbox
                    .modules
                    .iter()
                    .find(|module| module.directory_shortid.is_none())
            })
            .or_else(|| self.sandbox.modules.first())
    }

    fn package_json_main(&self) -> Option<String> {
        let code = &self.package_json()?.code;
        let parsed: serde_json::Value = serde_json::from_str(code).ok()?;
        let main = parsed.get("main")?.as_str()?;
        if main.starts_with('/') {
            Some(main.to_string())
        } else {
            Some(format!("/{main}"))
        }
    }

    /// Appends a module.
    pub fn add_module(&mut self, module: Module) {
        self.sandbox.modules.push(module);
    }

    /// Appends several modules (mass create).
    pub fn add_modules(&mut self, modules: Vec<Module>) {
        self.sandbox.modules.extend(modules);
    }

    /// Removes a module by stable key, returning it so the caller can
    /// restore it when a network confirmation fails.
    pub fn remove_module(&mut self, shortid: &ShortId) -> Option<Module> {
        let index = self
            .sandbox
            .modules
            .iter()
            .position(|module| &module.shortid == shortid)?;
        Some(self.sandbox.modules.remove(index))
    }

    /// Appends a directory.
    pub fn add_directory(&mut self, directory: Directory) {
        self.sandbox.directories.push(directory);
    }

    /// Appends several directories.
    pub fn add_directories(&mut self, directories: Vec<Directory>) {
        self.sandbox.directories.extend(directories);
    }

    /// Rewrites parent links from `old` to `new`. Used when a server
    /// confirmation replaces an optimistic directory key that children
    /// already reference.
    pub fn reparent_children(&mut self, old: &ShortId, new: &ShortId) {
        for module in &mut self.sandbox.modules {
            if module.directory_shortid.as_ref() == Some(old) {
                module.directory_shortid = Some(new.clone());
            }
        }
        for directory in &mut self.sandbox.directories {
            if directory.directory_shortid.as_ref() == Some(old) {
                directory.directory_shortid = Some(new.clone());
            }
        }
    }

    /// Removes a directory by stable key, returning it for compensation.
    pub fn remove_directory(&mut self, shortid: &ShortId) -> Option<Directory> {
        let index = self
            .sandbox
            .directories
            .iter()
            .position(|directory| &directory.shortid == shortid)?;
        Some(self.sandbox.directories.remove(index))
    }

    /// Clones every module and directory living under `directory`,
    /// including nested ones. Delete flows hold these for rollback.
    #[must_use]
    pub fn subtree_of(&self, directory: &Directory) -> (Vec<Module>, Vec<Directory>) {
        let (modules, directories) = path::modules_and_directories_in(
            directory,
            &self.sandbox.modules,
            &self.sandbox.directories,
        );
        (
            modules.into_iter().cloned().collect(),
            directories.into_iter().cloned().collect(),
        )
    }

    /// Modules whose content diverges from the server baseline.
    #[must_use]
    pub fn changed_modules(&self) -> Vec<&Module> {
        self.sandbox
            .modules
            .iter()
            .filter(|module| module.saved_code.is_some())
            .collect()
    }

    /// True when every module is synced.
    #[must_use]
    pub fn is_all_synced(&self) -> bool {
        self.sandbox
            .modules
            .iter()
            .all(|module| module.saved_code.is_none())
    }

    /// Errors attached to the sandbox.
    #[must_use]
    pub fn errors(&self) -> &[ModuleError] {
        &self.errors
    }

    /// Corrections attached to the sandbox.
    #[must_use]
    pub fn corrections(&self) -> &[ModuleCorrection] {
        &self.corrections
    }

    /// Attaches an error to its module (resolved by path) and the sandbox
    /// aggregate. An unresolvable path makes the whole call a no-op.
    pub fn add_error(&mut self, error: ModuleError) {
        let Some(shortid) = self
            .module_by_path(&error.path)
            .map(|module| module.shortid.clone())
        else {
            warn!("ignoring error for untracked path {}", error.path);
            return;
        };
        if let Some(module) = self.module_mut(&shortid) {
            module.errors.push(error.clone());
        }
        self.errors.push(error);
    }

    /// Clears every error, both aggregate and per-module.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
        for module in &mut self.sandbox.modules {
            module.errors.clear();
        }
    }

    /// Attaches a correction like [`SandboxModel::add_error`].
    pub fn add_correction(&mut self, correction: ModuleCorrection) {
        let Some(shortid) = self
            .module_by_path(&correction.path)
            .map(|module| module.shortid.clone())
        else {
            warn!("ignoring correction for untracked path {}", correction.path);
            return;
        };
        if let Some(module) = self.module_mut(&shortid) {
            module.corrections.push(correction.clone());
        }
        self.corrections.push(correction);
    }

    /// Clears every correction.
    pub fn clear_corrections(&mut self) {
        self.corrections.clear();
        for module in &mut self.sandbox.modules {
            module.corrections.clear();
        }
    }

    /// Optimistically flips the like state and adjusts the counter. The
    /// caller reconciles with the server response.
    pub fn toggle_liked(&mut self) {
        if self.sandbox.user_liked {
            self.sandbox.like_count -= 1;
        } else {
            self.sandbox.like_count += 1;
        }
        self.sandbox.user_liked = !self.sandbox.user_liked;
    }

    /// Environment variables, insertion-ordered.
    #[must_use]
    pub fn environment_variables(&self) -> &IndexMap<SmolStr, String> {
        &self.sandbox.environment_variables
    }

    /// Replaces the environment variables wholesale (server responses are
    /// authoritative).
    pub fn set_environment_variables(&mut self, variables: IndexMap<SmolStr, String>) {
        self.sandbox.environment_variables = variables;
    }

    /// External resources injected into the preview.
    #[must_use]
    pub fn external_resources(&self) -> &[String] {
        &self.sandbox.external_resources
    }

    /// Replaces the external resources.
    pub fn set_external_resources(&mut self, resources: Vec<String>) {
        self.sandbox.external_resources = resources;
    }

    /// Applies sparse change records against a freshly fetched snapshot.
    ///
    /// For each update the entity is resolved by path in both the tracked
    /// and the new sandbox; existing entities are patched in place so any
    /// holder of the stable key keeps resolving, new ones are inserted and
    /// deleted ones removed. Unsaved local edits outside the changed set
    /// are untouched.
    pub fn sync(&mut self, new_sandbox: &Sandbox, updates: &[SyncUpdate]) {
        for update in updates {
            match update.kind {
                SyncKind::File => self.sync_file(new_sandbox, update),
                SyncKind::Directory => self.sync_directory(new_sandbox, update),
            }
        }
    }

    fn sync_file(&mut self, new_sandbox: &Sandbox, update: &SyncUpdate) {
        let old_shortid = path::resolve_module(
            &update.path,
            &self.sandbox.modules,
            &self.sandbox.directories,
        )
        .map(|module| module.shortid.clone());

        match update.op {
            SyncOp::Update => {
                let Some(new_module) = path::resolve_module(
                    &update.path,
                    &new_sandbox.modules,
                    &new_sandbox.directories,
                )
                .cloned() else {
                    return;
                };
                match old_shortid {
                    Some(shortid) => {
                        if let Some(existing) = self.module_mut(&shortid) {
                            *existing = new_module;
                        }
                    }
                    None => self.sandbox.modules.push(new_module),
                }
            }
            SyncOp::Delete => {
                if let Some(shortid) = old_shortid {
                    self.remove_module(&shortid);
                }
            }
        }
    }

    fn sync_directory(&mut self, new_sandbox: &Sandbox, update: &SyncUpdate) {
        match update.op {
            SyncOp::Update => {
                if let Some(new_directory) =
                    path::resolve_directory(&update.path, &new_sandbox.directories).cloned()
                {
                    if self.directory(&new_directory.shortid).is_none() {
                        self.sandbox.directories.push(new_directory);
                    }
                }
            }
            SyncOp::Delete => {
                let old_shortid = path::resolve_directory(&update.path, &self.sandbox.directories)
                    .map(|directory| directory.shortid.clone());
                if let Some(shortid) = old_shortid {
                    self.remove_directory(&shortid);
                }
            }
        }
    }
}
