//! Collaborator boundaries consumed by the editor session.
//!
//! The session never talks to a concrete backend, editor widget or live
//! channel; it goes through these traits. Production wires real adapters,
//! tests wire recorders.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::Arc;
use thiserror::Error;

use sandbar_model::{
    Directory, Module, ModuleCorrection, ModuleError, Sandbox, SandboxId, ShortId, TextOperation,
    UserSelection,
};

/// Failure from the persistence API.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("request failed with status {status}: {message}")]
    Status {
        /// HTTP-ish status code.
        status: u16,
        /// Server-provided message.
        message: String,
    },
    /// The request never reached the server.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ApiError {
    /// True for a 404 response.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

/// Shorthand for API call results.
pub type ApiResult<T> = Result<T, ApiError>;

/// Response of a mass-create call.
#[derive(Debug, Clone, Default)]
pub struct MassCreateResponse {
    /// Modules as persisted by the server.
    pub modules: Vec<Module>,
    /// Directories as persisted by the server.
    pub directories: Vec<Directory>,
}

/// The persistence API. All records use the model shapes; failures carry an
/// HTTP-ish error object.
#[async_trait]
pub trait SandboxApi: Send + Sync {
    /// Fetches a full sandbox snapshot.
    async fn get_sandbox(&self, id: &SandboxId) -> ApiResult<Sandbox>;

    /// Forks a sandbox, returning the fork.
    async fn fork_sandbox(&self, id: &SandboxId) -> ApiResult<Sandbox>;

    /// Persists one module's code, returning the stored module.
    async fn save_module_code(&self, sandbox: &SandboxId, module: &Module) -> ApiResult<Module>;

    /// Persists several modules at once, returning the stored records.
    async fn save_modules(&self, sandbox: &SandboxId, modules: &[Module])
        -> ApiResult<Vec<Module>>;

    /// Renames a module.
    async fn save_module_title(
        &self,
        sandbox: &SandboxId,
        module: &ShortId,
        title: &str,
    ) -> ApiResult<()>;

    /// Moves a module to another directory.
    async fn save_module_directory(
        &self,
        sandbox: &SandboxId,
        module: &ShortId,
        directory: Option<&ShortId>,
    ) -> ApiResult<()>;

    /// Creates a module, returning the record with server-assigned ids.
    async fn create_module(&self, sandbox: &SandboxId, module: &Module) -> ApiResult<Module>;

    /// Deletes a module.
    async fn delete_module(&self, sandbox: &SandboxId, module: &ShortId) -> ApiResult<()>;

    /// Creates many modules and directories in one round trip.
    async fn mass_create_modules(
        &self,
        sandbox: &SandboxId,
        modules: &[Module],
        directories: &[Directory],
    ) -> ApiResult<MassCreateResponse>;

    /// Creates a directory, returning the record with server-assigned ids.
    async fn create_directory(
        &self,
        sandbox: &SandboxId,
        parent: Option<&ShortId>,
        title: &str,
    ) -> ApiResult<Directory>;

    /// Renames a directory.
    async fn save_directory_title(
        &self,
        sandbox: &SandboxId,
        directory: &ShortId,
        title: &str,
    ) -> ApiResult<()>;

    /// Moves a directory under another parent.
    async fn save_directory_directory(
        &self,
        sandbox: &SandboxId,
        directory: &ShortId,
        parent: Option<&ShortId>,
    ) -> ApiResult<()>;

    /// Deletes a directory (the server cascades to its contents).
    async fn delete_directory(&self, sandbox: &SandboxId, directory: &ShortId) -> ApiResult<()>;

    /// Fetches the environment variables.
    async fn get_environment_variables(
        &self,
        sandbox: &SandboxId,
    ) -> ApiResult<IndexMap<SmolStr, String>>;

    /// Upserts one environment variable, returning the resulting set.
    async fn save_environment_variable(
        &self,
        sandbox: &SandboxId,
        name: &str,
        value: &str,
    ) -> ApiResult<IndexMap<SmolStr, String>>;

    /// Deletes one environment variable, returning the resulting set.
    async fn delete_environment_variable(
        &self,
        sandbox: &SandboxId,
        name: &str,
    ) -> ApiResult<IndexMap<SmolStr, String>>;

    /// Persists the frozen flag.
    async fn save_frozen(&self, sandbox: &SandboxId, frozen: bool) -> ApiResult<()>;

    /// Persists the like state.
    async fn set_sandbox_liked(&self, sandbox: &SandboxId, liked: bool) -> ApiResult<()>;
}

/// A collaborator's selection as rendered by the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSelectionView {
    /// Live user id.
    pub user_id: SmolStr,
    /// Display name.
    pub name: SmolStr,
    /// Cursor/selection color.
    pub color: [u8; 3],
    /// Cursor and ranges.
    pub selection: UserSelection,
}

/// The embedded text-editing widget. Opaque: the session only pushes state
/// at it and receives structured edit events back.
pub trait EditorSurface: Send + Sync {
    /// Opens (or focuses) a module.
    fn open_module(&self, module: &Module);

    /// Clears the unsaved indicator for a module without touching content.
    fn revert_module(&self, module: &Module);

    /// Replaces the rendered error markers.
    fn set_errors(&self, errors: &[ModuleError]);

    /// Replaces the rendered correction markers.
    fn set_corrections(&self, corrections: &[ModuleCorrection]);

    /// Renders remote cursors/selections for a module.
    fn update_user_selections(&self, module: &Module, selections: &[UserSelectionView]);

    /// Drops the cached selection overlay of one collaborator.
    fn remove_user_selections(&self, user_id: &SmolStr);

    /// Drops every collaborator overlay.
    fn clear_user_selections(&self);

    /// Rewrites open tab paths after a rename.
    fn update_tab_paths(&self, old_path: &str, new_path: &str);

    /// Closes all open tabs.
    fn close_all_tabs(&self);

    /// Restores the default layout.
    fn reset_layout(&self);

    /// Pins the current preview tab.
    fn keep_current_tab(&self);
}

/// Identifier of a posted notification, used to dismiss it later.
pub type NotificationId = u64;

/// Urgency of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyStatus {
    /// Confirmation of a completed action.
    Success,
    /// Neutral information.
    Notice,
    /// Something needs attention.
    Warning,
    /// An action failed.
    Error,
}

/// Transient toasts plus the one blocking modal (live-session termination).
pub trait Notifier: Send + Sync {
    /// Shows a transient toast and returns a handle for dismissal.
    fn notify(&self, status: NotifyStatus, message: &str) -> NotificationId;

    /// Removes a toast before it expires on its own.
    fn dismiss(&self, id: NotificationId);

    /// Shows a blocking modal. Reserved for session-ending conditions.
    fn modal(&self, title: &str, message: &str);
}

/// Fire-and-forget broadcasts into the live channel, plus the authorization
/// flags that decide whether local edits may be sent at all.
pub trait LiveBroadcast: Send + Sync {
    /// True while a live session is connected.
    fn is_live(&self) -> bool;

    /// True when this client is allowed to edit in the session.
    fn is_current_editor(&self) -> bool;

    /// Broadcasts a text operation for a module.
    fn send_code_update(&self, module: &ShortId, operation: &TextOperation);

    /// Broadcasts a successful module save.
    fn send_module_saved(&self, module: &Module);

    /// Broadcasts a created module.
    fn send_module_created(&self, module: &Module);

    /// Broadcasts module metadata changes (rename, move).
    fn send_module_updated(&self, module: &Module);

    /// Broadcasts a deleted module.
    fn send_module_deleted(&self, module: &ShortId);

    /// Broadcasts a created directory.
    fn send_directory_created(&self, directory: &Directory);

    /// Broadcasts directory metadata changes.
    fn send_directory_updated(&self, directory: &Directory);

    /// Broadcasts a deleted directory.
    fn send_directory_deleted(&self, directory: &ShortId);

    /// Broadcasts a mass create.
    fn send_mass_created(&self, modules: &[Module], directories: &[Directory]);

    /// Broadcasts which module this user has open.
    fn send_user_current_module(&self, module: &ShortId);

    /// Broadcasts the external resource list.
    fn send_external_resources(&self, resources: &[String]);
}

/// `LiveBroadcast` for a session that is not live: all sends are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedLive;

impl LiveBroadcast for DetachedLive {
    fn is_live(&self) -> bool {
        false
    }

    fn is_current_editor(&self) -> bool {
        false
    }

    fn send_code_update(&self, _module: &ShortId, _operation: &TextOperation) {}
    fn send_module_saved(&self, _module: &Module) {}
    fn send_module_created(&self, _module: &Module) {}
    fn send_module_updated(&self, _module: &Module) {}
    fn send_module_deleted(&self, _module: &ShortId) {}
    fn send_directory_created(&self, _directory: &Directory) {}
    fn send_directory_updated(&self, _directory: &Directory) {}
    fn send_directory_deleted(&self, _directory: &ShortId) {}
    fn send_mass_created(&self, _modules: &[Module], _directories: &[Directory]) {}
    fn send_user_current_module(&self, _module: &ShortId) {}
    fn send_external_resources(&self, _resources: &[String]) {}
}

/// A structured edit event reported by the surface: one contiguous change.
/// Offsets count characters against the content before the edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditEvent {
    /// Start of the changed region.
    pub offset: usize,
    /// Number of removed characters.
    pub removed: usize,
    /// Replacement text.
    pub inserted: String,
}

/// The collaborator bag handed to the session on construction.
pub struct Effects {
    /// Persistence API.
    pub api: Box<dyn SandboxApi>,
    /// Editor surface.
    pub surface: Box<dyn EditorSurface>,
    /// Toast/modal sink. Shared because the live layer's reconnect debounce
    /// holds onto it from a spawned task.
    pub notifier: Arc<dyn Notifier>,
    /// Live channel.
    pub live: Box<dyn LiveBroadcast>,
}
