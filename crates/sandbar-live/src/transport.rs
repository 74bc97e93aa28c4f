//! Outbound side of the live channel.
//!
//! The transport itself (websocket, channel multiplexing, retries) lives
//! outside this crate; the session only needs fire-and-forget typed sends
//! and a way to ask per-module sync clients to re-handshake after a
//! reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sandbar_editor::LiveBroadcast;
use sandbar_model::{Directory, Module, ShortId, TextOperation, UserSelection};

/// Everything this client can broadcast into the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A text operation on one module.
    CodeUpdate {
        /// Target module.
        module_shortid: ShortId,
        /// The operation.
        operation: TextOperation,
    },
    /// This client saved a module.
    ModuleSaved {
        /// The stored record.
        module: Module,
    },
    /// This client created a module.
    ModuleCreated {
        /// The new module.
        module: Module,
    },
    /// Module metadata changed.
    ModuleUpdated {
        /// The updated record.
        module: Module,
    },
    /// This client deleted a module.
    ModuleDeleted {
        /// Which module.
        module_shortid: ShortId,
    },
    /// This client created a directory.
    DirectoryCreated {
        /// The new directory.
        directory: Directory,
    },
    /// Directory metadata changed.
    DirectoryUpdated {
        /// The updated record.
        directory: Directory,
    },
    /// This client deleted a directory.
    DirectoryDeleted {
        /// Which directory.
        directory_shortid: ShortId,
    },
    /// This client created many modules/directories at once.
    MassCreatedModules {
        /// New modules.
        modules: Vec<Module>,
        /// New directories.
        directories: Vec<Directory>,
    },
    /// Which module this user has open.
    UserCurrentModule {
        /// The open module.
        module_shortid: ShortId,
    },
    /// This user's cursor/selection.
    CurrentSelection {
        /// In which module.
        module_shortid: ShortId,
        /// The selection.
        selection: UserSelection,
    },
    /// Ask the server for authoritative module state (desync recovery).
    ModuleStateSyncRequest,
    /// External resource list changed.
    ExternalResources {
        /// Full resource list.
        resources: Vec<String>,
    },
    /// A chat message.
    Chat {
        /// Message text.
        message: String,
    },
}

/// The message channel. Sends are fire-and-forget; delivery is at most
/// once per logical send.
pub trait LiveTransport: Send + Sync {
    /// Broadcasts one message.
    fn send(&self, message: OutboundMessage);

    /// Asks every per-module sync client to redo its reconnect handshake.
    fn reconnect_clients(&self);
}

/// Session flags shared between the live session and the editor's
/// broadcast seam. Atomics because the reconnect debounce task reads them
/// off-turn.
#[derive(Debug, Default)]
pub struct LiveFlags {
    is_live: AtomicBool,
    is_current_editor: AtomicBool,
    is_owner: AtomicBool,
}

impl LiveFlags {
    /// Fresh flags, everything off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the session is connected.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.is_live.load(Ordering::Relaxed)
    }

    pub(crate) fn set_live(&self, live: bool) {
        self.is_live.store(live, Ordering::Relaxed);
    }

    /// True while this client may edit.
    #[must_use]
    pub fn is_current_editor(&self) -> bool {
        self.is_current_editor.load(Ordering::Relaxed)
    }

    pub(crate) fn set_current_editor(&self, editor: bool) {
        self.is_current_editor.store(editor, Ordering::Relaxed);
    }

    /// True when this client owns the session.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.is_owner.load(Ordering::Relaxed)
    }

    pub(crate) fn set_owner(&self, owner: bool) {
        self.is_owner.store(owner, Ordering::Relaxed);
    }
}

/// Bridges the editor's [`LiveBroadcast`] seam onto the transport. Drops
/// every send while the session is not live.
pub struct LiveBroadcaster {
    flags: Arc<LiveFlags>,
    transport: Arc<dyn LiveTransport>,
}

impl LiveBroadcaster {
    /// Creates a broadcaster over shared flags and a transport.
    #[must_use]
    pub fn new(flags: Arc<LiveFlags>, transport: Arc<dyn LiveTransport>) -> Self {
        Self { flags, transport }
    }

    fn send(&self, message: OutboundMessage) {
        if !self.flags.is_live() {
            return;
        }
        self.transport.send(message);
    }
}

impl LiveBroadcast for LiveBroadcaster {
    fn is_live(&self) -> bool {
        self.flags.is_live()
    }

    fn is_current_editor(&self) -> bool {
        self.flags.is_current_editor()
    }

    fn send_code_update(&self, module: &ShortId, operation: &TextOperation) {
        self.send(OutboundMessage::CodeUpdate {
            module_shortid: module.clone(),
            operation: operation.clone(),
        });
    }

    fn send_module_saved(&self, module: &Module) {
        self.send(OutboundMessage::ModuleSaved {
            module: module.clone(),
        });
    }

    fn send_module_created(&self, module: &Module) {
        self.send(OutboundMessage::ModuleCreated {
            module: module.clone(),
        });
    }

    fn send_module_updated(&self, module: &Module) {
        self.send(OutboundMessage::ModuleUpdated {
            module: module.clone(),
        });
    }

    fn send_module_deleted(&self, module: &ShortId) {
        self.send(OutboundMessage::ModuleDeleted {
            module_shortid: module.clone(),
        });
    }

    fn send_directory_created(&self, directory: &Directory) {
        self.send(OutboundMessage::DirectoryCreated {
            directory: directory.clone(),
        });
    }

    fn send_directory_updated(&self, directory: &Directory) {
        self.send(OutboundMessage::DirectoryUpdated {
            directory: directory.clone(),
        });
    }

    fn send_directory_deleted(&self, directory: &ShortId) {
        self.send(OutboundMessage::DirectoryDeleted {
            directory_shortid: directory.clone(),
        });
    }

    fn send_mass_created(&self, modules: &[Module], directories: &[Directory]) {
        self.send(OutboundMessage::MassCreatedModules {
            modules: modules.to_vec(),
            directories: directories.to_vec(),
        });
    }

    fn send_user_current_module(&self, module: &ShortId) {
        self.send(OutboundMessage::UserCurrentModule {
            module_shortid: module.clone(),
        });
    }

    fn send_external_resources(&self, resources: &[String]) {
        self.send(OutboundMessage::ExternalResources {
            resources: resources.to_vec(),
        });
    }
}
