//! Typed live-protocol messages.
//!
//! The wire shape is `{"event": ..., "data": {...}, "_isOwnMessage": bool}`.
//! Payloads are a closed set: every message the session server can deliver
//! has a variant here, and dispatch is an exhaustive match. Unknown events
//! fail deserialization at the transport boundary instead of leaking
//! shapeless data into the handlers.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use sandbar_editor::NotifyStatus;
use sandbar_model::{Directory, Module, ShortId, TextOperation, UserSelection};

use crate::room::{DisconnectReason, LiveSessionMode, LiveUser};

/// An inbound message: a typed event plus the echo marker.
///
/// `is_own` is true when this client originated the broadcast; mutation
/// handlers no-op in that case because the sender already applied the
/// change optimistically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMessage {
    /// The event payload.
    #[serde(flatten)]
    pub event: LiveEvent,
    /// True when this client sent the original broadcast.
    #[serde(default, rename = "_isOwnMessage")]
    pub is_own: bool,
}

impl LiveMessage {
    /// Wraps an event as a remote (non-echo) message.
    #[must_use]
    pub fn remote(event: LiveEvent) -> Self {
        Self {
            event,
            is_own: false,
        }
    }

    /// Wraps an event as this client's own echo.
    #[must_use]
    pub fn own(event: LiveEvent) -> Self {
        Self {
            event,
            is_own: true,
        }
    }
}

/// Per-module content state delivered by a full-state resync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStateEntry {
    /// Module the entry refers to.
    pub module_shortid: ShortId,
    /// Authoritative content, when it changed.
    #[serde(default)]
    pub code: Option<String>,
    /// Saved baseline, when one diverges from `code`.
    #[serde(default)]
    pub saved_code: Option<String>,
    /// Whether the module is saved server-side.
    #[serde(default)]
    pub synced: bool,
}

/// Every event the live channel can deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LiveEvent {
    /// This client joined (or re-joined) the session.
    Join {
        /// Identity assigned to this client.
        live_user_id: SmolStr,
    },
    /// Authoritative per-module state, answering a sync request.
    ModuleState {
        /// One entry per module.
        modules: Vec<ModuleStateEntry>,
    },
    /// External resource list changed.
    ExternalResources {
        /// Full resource list.
        resources: Vec<String>,
    },
    /// A user joined; carries the full roster.
    UserEntered {
        /// Complete roster after the join.
        users: Vec<LiveUser>,
        /// Users allowed to edit.
        editor_ids: Vec<SmolStr>,
        /// Session owners.
        owner_ids: Vec<SmolStr>,
        /// Who joined.
        joined_user_id: SmolStr,
    },
    /// A user left; carries the full roster.
    UserLeft {
        /// Complete roster after the leave.
        users: Vec<LiveUser>,
        /// Users allowed to edit.
        editor_ids: Vec<SmolStr>,
        /// Session owners.
        owner_ids: Vec<SmolStr>,
        /// Who left.
        left_user_id: SmolStr,
    },
    /// A module was saved.
    ModuleSaved {
        /// Which module.
        module_shortid: ShortId,
        /// The stored record.
        module: Module,
    },
    /// A module was created.
    ModuleCreated {
        /// The new module.
        module: Module,
    },
    /// Many modules/directories were created at once.
    ModuleMassCreated {
        /// New modules.
        modules: Vec<Module>,
        /// New directories.
        directories: Vec<Directory>,
    },
    /// Module metadata changed (rename, move).
    ModuleUpdated {
        /// Which module.
        module_shortid: ShortId,
        /// The updated record.
        module: Module,
    },
    /// A module was deleted.
    ModuleDeleted {
        /// Which module.
        module_shortid: ShortId,
    },
    /// A directory was created.
    DirectoryCreated {
        /// The new directory.
        directory: Directory,
    },
    /// Directory metadata changed.
    DirectoryUpdated {
        /// Which directory.
        directory_shortid: ShortId,
        /// The updated record.
        directory: Directory,
    },
    /// A directory (and its contents) was deleted.
    DirectoryDeleted {
        /// Which directory.
        directory_shortid: ShortId,
    },
    /// A collaborator moved their cursor/selection.
    UserSelection {
        /// Whose selection.
        live_user_id: SmolStr,
        /// In which module.
        module_shortid: ShortId,
        /// The selection.
        selection: UserSelection,
    },
    /// A collaborator switched modules.
    UserCurrentModule {
        /// Whose navigation.
        live_user_id: SmolStr,
        /// The module now open.
        module_shortid: ShortId,
    },
    /// Session mode changed (open/classroom).
    Mode {
        /// New mode.
        mode: LiveSessionMode,
    },
    /// Chat was enabled or disabled.
    ChatEnabled {
        /// New state.
        enabled: bool,
    },
    /// A user gained edit rights.
    AddEditor {
        /// The promoted user.
        editor_user_id: SmolStr,
    },
    /// A user lost edit rights.
    RemoveEditor {
        /// The demoted user.
        editor_user_id: SmolStr,
    },
    /// A text operation on one module.
    Operation {
        /// Target module.
        module_shortid: ShortId,
        /// The operation.
        operation: TextOperation,
    },
    /// A chat message.
    Chat {
        /// Sender.
        live_user_id: SmolStr,
        /// Message text.
        message: String,
        /// Epoch milliseconds.
        date: u64,
    },
    /// Server-pushed toast.
    Notification {
        /// Message text.
        message: String,
        /// Urgency.
        status: NotifyStatus,
    },
    /// The transport detected an outage.
    ConnectionLoss,
    /// The server ended the session.
    Disconnect {
        /// Why the session ended.
        reason: DisconnectReason,
    },
    /// The owner left the session.
    OwnerLeft,
}
