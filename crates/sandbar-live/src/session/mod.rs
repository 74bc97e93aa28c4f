//! Live-session state and message dispatch.
//!
//! Session status follows `disconnected -> connecting -> connected <->
//! reconnecting -> disconnected`. `connected` is entered on a join,
//! `reconnecting` on a detected outage and only left by a new join; a
//! disconnect forces `disconnected` from any state.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]

use std::sync::Arc;
use std::time::Duration;

use smol_str::SmolStr;
use tokio::sync::watch;

use sandbar_editor::{EditorSession, ModuleRef, SessionConfig, UserSelectionView};
use sandbar_model::{Module, ShortId, UserSelection};

use crate::messages::{LiveEvent, LiveMessage};
use crate::room::RoomInfo;
use crate::transport::{LiveFlags, LiveTransport, OutboundMessage};

mod handlers;

/// Connection status of the live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// No session.
    #[default]
    Disconnected,
    /// Join in flight.
    Connecting,
    /// Joined and exchanging messages.
    Connected,
    /// Outage detected, waiting for a new join.
    Reconnecting,
}

/// State and handlers for one live session.
///
/// Inbound messages go through [`LiveSession::handle_message`], which
/// dispatches on the closed event enumeration and applies remote mutations
/// to the [`EditorSession`]. Handlers run to completion, one at a time.
pub struct LiveSession {
    status: SessionStatus,
    live_user_id: Option<SmolStr>,
    room_info: Option<RoomInfo>,
    following_user_id: Option<SmolStr>,
    current_selection: Option<(ShortId, UserSelection)>,
    flags: Arc<LiveFlags>,
    transport: Arc<dyn LiveTransport>,
    reconnecting: watch::Sender<bool>,
    hide_presence_notifications: bool,
    reconnect_notice_delay: Duration,
}

impl LiveSession {
    /// Creates a session over a transport. `flags` are shared with the
    /// editor's broadcast seam so its sends honor the session state.
    #[must_use]
    pub fn new(
        transport: Arc<dyn LiveTransport>,
        flags: Arc<LiveFlags>,
        config: &SessionConfig,
    ) -> Self {
        let (reconnecting, _) = watch::channel(false);
        Self {
            status: SessionStatus::Disconnected,
            live_user_id: None,
            room_info: None,
            following_user_id: None,
            current_selection: None,
            flags,
            transport,
            reconnecting,
            hide_presence_notifications: config.hide_presence_notifications,
            reconnect_notice_delay: config.reconnect_notice_delay,
        }
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// This client's identity in the session.
    #[must_use]
    pub fn live_user_id(&self) -> Option<&SmolStr> {
        self.live_user_id.as_ref()
    }

    /// The shared room view, while connected.
    #[must_use]
    pub fn room_info(&self) -> Option<&RoomInfo> {
        self.room_info.as_ref()
    }

    /// Whose navigation this client mirrors, if anyone's.
    #[must_use]
    pub fn following_user_id(&self) -> Option<&SmolStr> {
        self.following_user_id.as_ref()
    }

    /// Starts or stops following a user.
    pub fn set_following(&mut self, user_id: Option<SmolStr>) {
        self.following_user_id = user_id;
    }

    /// The shared session flags.
    #[must_use]
    pub fn flags(&self) -> &Arc<LiveFlags> {
        &self.flags
    }

    /// Watch handle for the reconnecting flag (used by UI wait loops and
    /// tests).
    #[must_use]
    pub fn reconnecting_watch(&self) -> watch::Receiver<bool> {
        self.reconnecting.subscribe()
    }

    /// Marks the join handshake as started.
    pub fn connect(&mut self) {
        self.status = SessionStatus::Connecting;
    }

    /// Adopts the room view returned by the join handshake.
    pub fn room_joined(&mut self, room: RoomInfo) {
        self.room_info = Some(room);
        self.status = SessionStatus::Connected;
        self.flags.set_live(true);
        self.recompute_flags();
    }

    /// Applies one inbound message.
    ///
    /// Mutation echoes (`is_own`) are no-ops; presence events merge
    /// unconditionally. Must run inside a tokio runtime: the
    /// connection-loss handler spawns the debounced outage notification.
    pub fn handle_message(&mut self, editor: &mut EditorSession, message: LiveMessage) {
        let LiveMessage { event, is_own } = message;
        match event {
            LiveEvent::Join { live_user_id } => handlers::on_join(self, editor, live_user_id),
            LiveEvent::ModuleState { modules } => handlers::on_module_state(self, editor, modules),
            LiveEvent::ExternalResources { resources } => {
                handlers::on_external_resources(editor, resources);
            }
            LiveEvent::UserEntered {
                users,
                editor_ids,
                owner_ids,
                joined_user_id,
            } => handlers::on_user_entered(
                self,
                editor,
                users,
                editor_ids,
                owner_ids,
                joined_user_id,
            ),
            LiveEvent::UserLeft {
                users,
                editor_ids,
                owner_ids,
                left_user_id,
            } => handlers::on_user_left(self, editor, users, editor_ids, owner_ids, left_user_id),
            LiveEvent::ModuleSaved {
                module_shortid,
                module,
            } => handlers::on_module_saved(editor, is_own, &module_shortid, module),
            LiveEvent::ModuleCreated { module } => {
                handlers::on_module_created(editor, is_own, module);
            }
            LiveEvent::ModuleMassCreated {
                modules,
                directories,
            } => handlers::on_module_mass_created(editor, is_own, modules, directories),
            LiveEvent::ModuleUpdated {
                module_shortid,
                module,
            } => handlers::on_module_updated(editor, is_own, &module_shortid, module),
            LiveEvent::ModuleDeleted { module_shortid } => {
                handlers::on_module_deleted(editor, is_own, &module_shortid);
            }
            LiveEvent::DirectoryCreated { directory } => {
                handlers::on_directory_created(editor, is_own, directory);
            }
            LiveEvent::DirectoryUpdated {
                directory_shortid,
                directory,
            } => handlers::on_directory_updated(editor, is_own, &directory_shortid, directory),
            LiveEvent::DirectoryDeleted { directory_shortid } => {
                handlers::on_directory_deleted(editor, is_own, &directory_shortid);
            }
            LiveEvent::UserSelection {
                live_user_id,
                module_shortid,
                selection,
            } => handlers::on_user_selection(
                self,
                editor,
                is_own,
                live_user_id,
                &module_shortid,
                selection,
            ),
            LiveEvent::UserCurrentModule {
                live_user_id,
                module_shortid,
            } => handlers::on_user_current_module(
                self,
                editor,
                is_own,
                live_user_id,
                &module_shortid,
            ),
            LiveEvent::Mode { mode } => handlers::on_mode(self, editor, is_own, mode),
            LiveEvent::ChatEnabled { enabled } => handlers::on_chat_enabled(self, is_own, enabled),
            LiveEvent::AddEditor { editor_user_id } => {
                handlers::on_add_editor(self, is_own, editor_user_id);
            }
            LiveEvent::RemoveEditor { editor_user_id } => {
                handlers::on_remove_editor(self, is_own, editor_user_id);
            }
            LiveEvent::Operation {
                module_shortid,
                operation,
            } => handlers::on_operation(self, editor, is_own, &module_shortid, &operation),
            LiveEvent::Chat {
                live_user_id,
                message,
                date,
            } => handlers::on_chat(self, live_user_id, message, date),
            LiveEvent::Notification { message, status } => {
                handlers::on_notification(editor, &message, status);
            }
            LiveEvent::ConnectionLoss => handlers::on_connection_loss(self, editor),
            LiveEvent::Disconnect { reason } => handlers::on_disconnect(self, editor, reason),
            LiveEvent::OwnerLeft => handlers::on_owner_left(editor),
        }
    }

    /// Records this user's cursor/selection and broadcasts it.
    pub fn selection_changed(
        &mut self,
        module_shortid: ShortId,
        selection: UserSelection,
    ) {
        if let (Some(own), Some(room)) = (self.live_user_id.clone(), self.room_info.as_mut()) {
            if let Some(user) = room.user_mut(&own) {
                user.current_module_shortid = Some(module_shortid.clone());
                user.selection = Some(selection.clone());
            }
        }
        self.current_selection = Some((module_shortid, selection));
        self.send_current_selection();
    }

    /// A user-driven module selection: forwards to the editor and drops
    /// the follow target when the user navigates away from it.
    pub fn user_selected_module(&mut self, editor: &mut EditorSession, target: &ModuleRef) {
        editor.module_selected(target);

        let Some(following) = self.following_user_id.clone() else {
            return;
        };
        let current = editor.model().current_module_shortid().cloned();
        let followed_module = self
            .room_info
            .as_ref()
            .and_then(|room| room.user(&following))
            .and_then(|user| user.current_module_shortid.clone());
        if followed_module != current {
            self.following_user_id = None;
        }
    }

    /// Remote selections to render inside `module`: every other editor
    /// whose cursor sits in it.
    #[must_use]
    pub fn selections_for_module(&self, module: &Module) -> Vec<UserSelectionView> {
        let Some(room) = &self.room_info else {
            return Vec::new();
        };
        room.users
            .iter()
            .filter(|user| Some(&user.id) != self.live_user_id.as_ref())
            .filter(|user| user.current_module_shortid.as_ref() == Some(&module.shortid))
            .filter(|user| room.can_edit(&user.id))
            .filter_map(|user| {
                Some(UserSelectionView {
                    user_id: user.id.clone(),
                    name: user.username.clone(),
                    color: user.color,
                    selection: user.selection.clone()?,
                })
            })
            .collect()
    }

    fn send_current_selection(&self) {
        if !self.flags.is_current_editor() {
            return;
        }
        if let Some((module_shortid, selection)) = &self.current_selection {
            self.transport.send(OutboundMessage::CurrentSelection {
                module_shortid: module_shortid.clone(),
                selection: selection.clone(),
            });
        }
    }

    fn recompute_flags(&self) {
        let own = self.live_user_id.as_deref();
        let (is_owner, can_edit) = match (&self.room_info, own) {
            (Some(room), Some(id)) => (room.is_owner(id), room.can_edit(id)),
            _ => (false, false),
        };
        self.flags.set_owner(is_owner);
        self.flags
            .set_current_editor(self.flags.is_live() && (is_owner || can_edit));
    }

    fn teardown(&mut self, editor: &mut EditorSession) {
        self.status = SessionStatus::Disconnected;
        self.flags.set_live(false);
        self.flags.set_current_editor(false);
        self.reconnecting.send_replace(false);
        self.room_info = None;
        self.live_user_id = None;
        self.following_user_id = None;
        self.current_selection = None;
        editor.surface().clear_user_selections();
    }
}
