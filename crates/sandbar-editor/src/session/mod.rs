//! The editor session: state plus the mutation actions operating on it.
//!
//! Every network-synchronized mutation follows the optimistic-update
//! pattern: apply to the local model, fire the request, and on failure
//! restore the previous local state, rebuild the path projection and
//! surface an error. No action retries on its own.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]

use std::sync::Arc;

use smol_str::SmolStr;
use tracing::warn;

use sandbar_model::{
    Authorization, Directory, EntityId, FileProjection, Module, Sandbox, SandboxModel, ShortId,
    SyncUpdate, Tab,
};

use crate::config::SessionConfig;
use crate::effects::{
    EditEvent, EditorSurface, Effects, Notifier, NotifyStatus,
};

mod code;
mod files;
mod meta;

/// How the UI refers to a module when selecting it: by server id (file
/// explorer) or by path (editor surface).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleRef {
    /// Server id, from the file explorer.
    Id(EntityId),
    /// Absolute path, from the editor surface.
    Path(String),
}

/// The session/context object passed to all operations: the sandbox model,
/// its derived projections, the open tabs and the collaborator bag.
pub struct EditorSession {
    model: SandboxModel,
    projection: FileProjection,
    tabs: Vec<Tab>,
    config: SessionConfig,
    effects: Effects,
    optimistic_counter: u64,
    /// Enforce the sandbox frozen flag for this session. Cleared by an
    /// explicit user override.
    session_frozen: bool,
    is_forking: bool,
}

impl EditorSession {
    /// Creates a session for a freshly fetched sandbox.
    #[must_use]
    pub fn new(sandbox: Sandbox, config: SessionConfig, effects: Effects) -> Self {
        let model = SandboxModel::new(sandbox);
        let mut projection = FileProjection::new();
        projection.rebuild(&model);
        Self {
            model,
            projection,
            tabs: Vec::new(),
            config,
            effects,
            optimistic_counter: 0,
            session_frozen: true,
            is_forking: false,
        }
    }

    /// The sandbox model.
    #[must_use]
    pub fn model(&self) -> &SandboxModel {
        &self.model
    }

    /// Mutable access to the sandbox model (used by the live handlers).
    pub fn model_mut(&mut self) -> &mut SandboxModel {
        &mut self.model
    }

    /// The path-indexed projection.
    #[must_use]
    pub fn projection(&self) -> &FileProjection {
        &self.projection
    }

    /// Mutable access to the projection (used by the live handlers).
    pub fn projection_mut(&mut self) -> &mut FileProjection {
        &mut self.projection
    }

    /// Re-derives the whole projection from the model. Used after rollbacks
    /// and any change that can invalidate descendant paths.
    pub fn rebuild_projection(&mut self) {
        self.projection.rebuild(&self.model);
    }

    /// Open tabs, in tab-bar order.
    #[must_use]
    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The editor surface collaborator.
    #[must_use]
    pub fn surface(&self) -> &dyn EditorSurface {
        self.effects.surface.as_ref()
    }

    /// The notification sink.
    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.effects.notifier
    }

    /// True while a fork transition is in flight.
    #[must_use]
    pub fn is_forking(&self) -> bool {
        self.is_forking
    }

    pub(crate) fn next_optimistic_id(&mut self) -> SmolStr {
        self.optimistic_counter += 1;
        SmolStr::new(format!("optimistic-{}", self.optimistic_counter))
    }

    fn can_write(&self) -> bool {
        self.model.has_permission(Authorization::WriteCode)
            && self.model.owned()
            && !(self.model.is_frozen() && self.session_frozen)
    }

    /// Capability gate in front of every mutating action. Unauthorized
    /// attempts are no-ops with a notice.
    pub(crate) fn guard_write(&self, action: &str) -> bool {
        if self.can_write() {
            return true;
        }
        if self.model.is_frozen() && self.session_frozen {
            warn!("{action} blocked: sandbox {} is frozen", self.model.id());
            self.effects
                .notifier
                .notify(NotifyStatus::Notice, "This sandbox is frozen");
        } else {
            warn!(
                "{action} blocked: no write access to sandbox {}",
                self.model.id()
            );
            self.effects.notifier.notify(
                NotifyStatus::Notice,
                "You need write access to change this sandbox",
            );
        }
        false
    }

    /// Marks a module as current, materializing a tab for it, and pushes
    /// it plus the current markers into the surface. Content is untouched.
    pub fn set_current_module(&mut self, shortid: &ShortId) {
        if self.model.module(shortid).is_none() {
            return;
        }
        if !self.tabs.iter().any(|tab| &tab.module_shortid == shortid) {
            let tab = Tab {
                module_shortid: shortid.clone(),
                dirty: true,
            };
            // A dirty tab is a preview tab: the next open reuses its slot.
            if let Some(dirty_index) = self.tabs.iter().position(|tab| tab.dirty) {
                self.tabs[dirty_index] = tab;
            } else {
                self.tabs.insert(0, tab);
            }
        }
        self.model.set_current_module(shortid.clone());
        if let Some(module) = self.model.module(shortid) {
            self.effects.surface.open_module(module);
        }
        self.effects.surface.set_errors(self.model.errors());
        self.effects.surface.set_corrections(self.model.corrections());
    }

    /// Switches the session to a different sandbox. Errors, corrections,
    /// tabs, the current module and any freeze override do not survive
    /// the switch.
    pub fn sandbox_changed(&mut self, sandbox: Sandbox) {
        self.model.replace(sandbox);
        self.tabs.clear();
        self.session_frozen = true;
        self.effects.surface.close_all_tabs();
        self.effects.surface.reset_layout();
        self.rebuild_projection();
        if let Some(main) = self.model.main_module().map(|module| module.shortid.clone()) {
            self.set_current_module(&main);
        }
    }

    /// Handles a user selecting a module by id or path.
    ///
    /// Paths outside the tracked tree (dependency typings and the like)
    /// unset the current module instead of failing.
    pub fn module_selected(&mut self, target: &ModuleRef) {
        let resolved = match target {
            ModuleRef::Id(id) => self.model.module_by_id(id),
            ModuleRef::Path(path) => self.model.module_by_path(path),
        };
        let Some(module) = resolved else {
            if matches!(target, ModuleRef::Path(_)) {
                self.model.unset_current_module();
            }
            return;
        };
        let shortid = module.shortid.clone();
        if self.model.is_current_module(&shortid) {
            return;
        }
        self.set_current_module(&shortid);
        if self.effects.live.is_live() {
            self.effects.live.send_user_current_module(&shortid);
        }
    }

    /// Closes a tab by index. The last tab stays open.
    pub fn tab_closed(&mut self, index: usize) {
        if self.tabs.len() > 1 && index < self.tabs.len() {
            self.tabs.remove(index);
        }
    }

    /// Reorders a tab (drag in the tab bar).
    pub fn tab_moved(&mut self, prev_index: usize, next_index: usize) {
        if prev_index >= self.tabs.len() || next_index >= self.tabs.len() {
            return;
        }
        let tab = self.tabs.remove(prev_index);
        self.tabs.insert(next_index, tab);
    }

    /// Pins the current module's tab (double click).
    pub fn module_double_clicked(&mut self) {
        self.effects.surface.keep_current_tab();
        let Some(shortid) = self.model.current_module_shortid().cloned() else {
            return;
        };
        if let Some(tab) = self
            .tabs
            .iter_mut()
            .find(|tab| tab.module_shortid == shortid)
        {
            tab.dirty = false;
        }
    }

    pub(crate) fn mark_tab_clean(&mut self, shortid: &ShortId) {
        if let Some(tab) = self
            .tabs
            .iter_mut()
            .find(|tab| &tab.module_shortid == shortid)
        {
            tab.dirty = false;
        }
    }

    /// Rebinds a confirmed server identity onto an optimistically created
    /// module, in place: tabs, the current-module marker and the projection
    /// keep resolving.
    pub(crate) fn replace_module_identity(
        &mut self,
        old_shortid: &ShortId,
        id: EntityId,
        shortid: ShortId,
    ) {
        let Some(module) = self.model.module_mut(old_shortid) else {
            return;
        };
        module.id = id;
        module.shortid = shortid.clone();

        for tab in &mut self.tabs {
            if &tab.module_shortid == old_shortid {
                tab.module_shortid = shortid.clone();
            }
        }
        if self.model.is_current_module(old_shortid) {
            self.model.set_current_module(shortid.clone());
        }
        if let Some(path) = self.model.module_path(&shortid) {
            self.projection.write_file(path, shortid);
        }
    }

    pub(crate) fn replace_directory_identity(
        &mut self,
        old_shortid: &ShortId,
        id: EntityId,
        shortid: ShortId,
    ) {
        let Some(directory) = self.model.directory_mut(old_shortid) else {
            return;
        };
        directory.id = id;
        directory.shortid = shortid.clone();

        // Rebind children that were optimistically parented under the old
        // key (mass creates can nest).
        self.model.reparent_children(old_shortid, &shortid);
        if let Some(path) = self.model.directory_path(&shortid) {
            self.projection.mkdir(path, shortid);
        }
    }

    // --- code actions -----------------------------------------------------

    /// Handles a local edit: converts it into a text operation and
    /// broadcasts it before applying when a live session is active.
    pub fn code_changed(&mut self, shortid: &ShortId, code: String, event: Option<EditEvent>) {
        code::code_changed(self, shortid, code, event);
    }

    /// Handles a remotely received operation that the live layer already
    /// applied to the module text.
    pub fn operation_applied(&mut self, shortid: &ShortId, code: String) {
        code::operation_applied(self, shortid, code);
    }

    /// Persists one module, reconciling the saved baseline with the server
    /// response.
    pub async fn save_module(&mut self, shortid: &ShortId, code: Option<String>) {
        code::save_module(self, shortid, code).await;
    }

    /// Persists every changed module.
    pub async fn save_all(&mut self) {
        code::save_all(self).await;
    }

    /// Reverts a module to its saved baseline.
    pub fn discard_module_changes(&mut self, shortid: &ShortId) {
        code::discard_module_changes(self, shortid);
    }

    // --- file-tree actions ------------------------------------------------

    /// Creates a module optimistically and confirms it with the server.
    pub async fn module_created(
        &mut self,
        title: &str,
        directory_shortid: Option<ShortId>,
        code: Option<String>,
        is_binary: bool,
    ) {
        files::module_created(self, title, directory_shortid, code, is_binary).await;
    }

    /// Renames a module.
    pub async fn module_renamed(&mut self, shortid: &ShortId, title: &str) {
        files::module_renamed(self, shortid, title).await;
    }

    /// Moves a module to another directory.
    pub async fn module_moved(&mut self, shortid: &ShortId, directory: Option<ShortId>) {
        files::module_moved(self, shortid, directory).await;
    }

    /// Deletes a module.
    pub async fn module_deleted(&mut self, shortid: &ShortId) {
        files::module_deleted(self, shortid).await;
    }

    /// Creates a directory optimistically and confirms it with the server.
    pub async fn directory_created(&mut self, title: &str, parent: Option<ShortId>) {
        files::directory_created(self, title, parent).await;
    }

    /// Renames a directory. Descendant paths change, so the projection is
    /// rebuilt wholesale.
    pub async fn directory_renamed(&mut self, shortid: &ShortId, title: &str) {
        files::directory_renamed(self, shortid, title).await;
    }

    /// Moves a directory under another parent.
    pub async fn directory_moved(&mut self, shortid: &ShortId, parent: Option<ShortId>) {
        files::directory_moved(self, shortid, parent).await;
    }

    /// Deletes a directory and everything under it.
    pub async fn directory_deleted(&mut self, shortid: &ShortId) {
        files::directory_deleted(self, shortid).await;
    }

    /// Creates many modules/directories in one server round trip.
    pub async fn mass_create_modules(
        &mut self,
        modules: Vec<Module>,
        directories: Vec<Directory>,
    ) {
        files::mass_create_modules(self, modules, directories).await;
    }

    /// Denormalizes a `path -> content` map into modules plus the directory
    /// chains they need, then mass-creates them.
    pub async fn create_modules_by_path(&mut self, entries: Vec<(String, String)>) {
        files::create_modules_by_path(self, entries).await;
    }

    /// Reconciles sparse change records against a freshly fetched snapshot.
    pub async fn sync_sandbox(&mut self, updates: Vec<SyncUpdate>) {
        files::sync_sandbox(self, updates).await;
    }

    // --- sandbox-level actions --------------------------------------------

    /// Forks the sandbox and transitions into the fork in place (no
    /// reload), carrying over unsaved local edits.
    pub async fn fork_transition(&mut self) {
        meta::fork_transition(self).await;
    }

    /// Optimistically toggles the like state.
    pub async fn toggle_like(&mut self) {
        meta::toggle_like(self).await;
    }

    /// Persists the frozen flag.
    pub async fn set_frozen(&mut self, frozen: bool) {
        meta::set_frozen(self, frozen).await;
    }

    /// Overrides frozen enforcement for this session only.
    pub fn session_freeze_override(&mut self, frozen: bool) {
        self.session_frozen = frozen;
    }

    /// Fetches environment variables from the server.
    pub async fn fetch_environment_variables(&mut self) {
        meta::fetch_environment_variables(self).await;
    }

    /// Upserts one environment variable.
    pub async fn update_environment_variable(&mut self, name: &str, value: &str) {
        meta::update_environment_variable(self, name, value).await;
    }

    /// Deletes one environment variable.
    pub async fn delete_environment_variable(&mut self, name: &str) {
        meta::delete_environment_variable(self, name).await;
    }

    /// Replaces the external resources and tells live collaborators.
    pub fn external_resources_changed(&mut self, resources: Vec<String>) {
        meta::external_resources_changed(self, resources);
    }
}
