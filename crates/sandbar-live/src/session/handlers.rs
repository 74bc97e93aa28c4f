//! One handler per inbound live event.
//!
//! Mutation-echo handlers (`ModuleSaved`, `ModuleCreated`, updates,
//! deletes, mass-create, `Operation`) no-op when the message is this
//! client's own echo: the sender applied the change optimistically before
//! broadcasting, and re-applying would double-process or clobber newer
//! local state. Presence and roster handlers process unconditionally.

use std::sync::Arc;

use smol_str::SmolStr;
use tracing::{error, info, warn};

use sandbar_editor::{EditorSession, ModuleRef, NotifyStatus, UserSelectionView};
use sandbar_model::{ot, Directory, Module, ShortId, TextOperation, UserSelection};

use crate::messages::ModuleStateEntry;
use crate::room::{DisconnectReason, LiveSessionMode, LiveUser};
use crate::transport::OutboundMessage;

use super::{LiveSession, SessionStatus};

pub(super) fn on_join(session: &mut LiveSession, editor: &mut EditorSession, live_user_id: SmolStr) {
    info!("joined live session as {live_user_id}");
    session.status = SessionStatus::Connected;
    session.live_user_id = Some(live_user_id);
    session.flags.set_live(true);
    session.recompute_flags();

    // Confirm the join to non-editing participants; the editor initiated
    // the session and needs no confirmation.
    if !session.flags.is_current_editor() {
        editor
            .notifier()
            .notify(NotifyStatus::Success, "Connected to the live session");
    }

    if *session.reconnecting.borrow() {
        session.transport.reconnect_clients();
    }
    session.reconnecting.send_replace(false);
}

pub(super) fn on_module_state(
    _session: &mut LiveSession,
    editor: &mut EditorSession,
    entries: Vec<ModuleStateEntry>,
) {
    for entry in entries {
        let shortid = entry.module_shortid.clone();
        let Some(module) = editor.model_mut().module_mut(&shortid) else {
            continue;
        };
        if let Some(code) = entry.code {
            module.code = code;
        }
        if entry.synced {
            module.saved_code = None;
        } else if let Some(saved) = entry.saved_code {
            module.saved_code = if saved == module.code {
                None
            } else {
                Some(saved)
            };
        }
        let synced = module.is_synced();

        if let Some(path) = editor.model().module_path(&shortid) {
            editor.projection_mut().write_file(path, shortid.clone());
        }
        if synced {
            if let Some(module) = editor.model().module(&shortid) {
                editor.surface().revert_module(module);
            }
        }
    }
}

pub(super) fn on_external_resources(editor: &mut EditorSession, resources: Vec<String>) {
    editor.model_mut().set_external_resources(resources);
}

pub(super) fn on_user_entered(
    session: &mut LiveSession,
    editor: &mut EditorSession,
    users: Vec<LiveUser>,
    editor_ids: Vec<SmolStr>,
    owner_ids: Vec<SmolStr>,
    joined_user_id: SmolStr,
) {
    if session.room_info.is_none() || !session.flags.is_live() {
        return;
    }
    if let Some(room) = &mut session.room_info {
        // The payload carries the complete roster; replace, don't merge.
        room.users = users;
        room.editor_ids = editor_ids;
        room.owner_ids = owner_ids;
    }
    session.recompute_flags();

    if let Some(module) = editor.model().current_module().cloned() {
        let selections = session.selections_for_module(&module);
        editor.surface().update_user_selections(&module, &selections);
    }

    // Let the newcomer know where we are.
    session.send_current_selection();

    if session.live_user_id.as_ref() == Some(&joined_user_id) {
        return;
    }
    if !session.hide_presence_notifications {
        if let Some(user) = session
            .room_info
            .as_ref()
            .and_then(|room| room.user(&joined_user_id))
        {
            editor.notifier().notify(
                NotifyStatus::Notice,
                &format!("{} joined the live session", user.username),
            );
        }
    }
}

pub(super) fn on_user_left(
    session: &mut LiveSession,
    editor: &mut EditorSession,
    users: Vec<LiveUser>,
    editor_ids: Vec<SmolStr>,
    owner_ids: Vec<SmolStr>,
    left_user_id: SmolStr,
) {
    let Some(room) = &mut session.room_info else {
        return;
    };

    if !session.hide_presence_notifications
        && session.live_user_id.as_ref() != Some(&left_user_id)
    {
        // Resolve the name against the roster as it was before the leave.
        if let Some(user) = room.user(&left_user_id) {
            editor.notifier().notify(
                NotifyStatus::Notice,
                &format!("{} left the live session", user.username),
            );
        }
    }

    editor.surface().remove_user_selections(&left_user_id);

    room.users = users;
    room.editor_ids = editor_ids;
    room.owner_ids = owner_ids;
    session.recompute_flags();
}

pub(super) fn on_module_saved(
    editor: &mut EditorSession,
    is_own: bool,
    module_shortid: &ShortId,
    module: Module,
) {
    if is_own {
        return;
    }
    let Some(local) = editor.model_mut().module_mut(module_shortid) else {
        return;
    };
    // The payload code is the new server baseline; local edits on top of
    // it stay marked as unsaved.
    local.saved_code = if module.code == local.code {
        None
    } else {
        Some(module.code.clone())
    };
    local.inserted_at = module.inserted_at;
    local.updated_at = module.updated_at;
    let synced = local.is_synced();

    if let Some(path) = editor.model().module_path(module_shortid) {
        editor
            .projection_mut()
            .write_file(path, module_shortid.clone());
    }
    if synced {
        if let Some(local) = editor.model().module(module_shortid) {
            editor.surface().revert_module(local);
        }
    }
}

pub(super) fn on_module_created(editor: &mut EditorSession, is_own: bool, module: Module) {
    if is_own {
        return;
    }
    let shortid = module.shortid.clone();
    editor.model_mut().add_module(module);
    if let Some(path) = editor.model().module_path(&shortid) {
        editor.projection_mut().write_file(path, shortid);
    }
}

pub(super) fn on_module_mass_created(
    editor: &mut EditorSession,
    is_own: bool,
    modules: Vec<Module>,
    directories: Vec<Directory>,
) {
    if is_own {
        return;
    }
    editor.model_mut().add_modules(modules);
    editor.model_mut().add_directories(directories);
    // Mass creates can nest directories; a full rebuild is the simple,
    // correct reconciliation.
    editor.rebuild_projection();
}

pub(super) fn on_module_updated(
    editor: &mut EditorSession,
    is_own: bool,
    module_shortid: &ShortId,
    module: Module,
) {
    if is_own {
        return;
    }
    let old_path = editor.model().module_path(module_shortid);
    {
        let Some(existing) = editor.model_mut().module_mut(module_shortid) else {
            return;
        };
        *existing = module;
    }
    let new_path = editor.model().module_path(module_shortid);

    if old_path != new_path {
        if let (Some(old), Some(new)) = (&old_path, &new_path) {
            editor.projection_mut().rename(old, new.clone());
        }
    }
    if let Some(new) = new_path {
        editor
            .projection_mut()
            .write_file(new, module_shortid.clone());
    }

    let reopen = editor.model().current_module_shortid().is_none()
        || editor.model().is_current_module(module_shortid);
    if reopen {
        if let Some(existing) = editor.model().module(module_shortid) {
            editor.surface().open_module(existing);
        }
    }
}

pub(super) fn on_module_deleted(
    editor: &mut EditorSession,
    is_own: bool,
    module_shortid: &ShortId,
) {
    if is_own {
        return;
    }
    let was_current = editor.model().is_current_module(module_shortid);
    let path = editor.model().module_path(module_shortid);
    if editor.model_mut().remove_module(module_shortid).is_none() {
        return;
    }
    if let Some(path) = &path {
        editor.projection_mut().unlink(path);
    }
    if was_current {
        open_main_module(editor);
    }
}

pub(super) fn on_directory_created(
    editor: &mut EditorSession,
    is_own: bool,
    directory: Directory,
) {
    if is_own {
        return;
    }
    let shortid = directory.shortid.clone();
    editor.model_mut().add_directory(directory);
    if let Some(path) = editor.model().directory_path(&shortid) {
        editor.projection_mut().mkdir(path, shortid);
    }
}

pub(super) fn on_directory_updated(
    editor: &mut EditorSession,
    is_own: bool,
    directory_shortid: &ShortId,
    directory: Directory,
) {
    if is_own {
        return;
    }
    let old_path = editor.model().directory_path(directory_shortid);
    {
        let Some(existing) = editor.model_mut().directory_mut(directory_shortid) else {
            return;
        };
        *existing = directory;
    }
    let new_path = editor.model().directory_path(directory_shortid);

    if old_path != new_path {
        // A directory rename invalidates every descendant path.
        editor.rebuild_projection();
        if let Some(current) = editor
            .model()
            .current_module_shortid()
            .cloned()
        {
            editor.set_current_module(&current);
        }
    }
}

pub(super) fn on_directory_deleted(
    editor: &mut EditorSession,
    is_own: bool,
    directory_shortid: &ShortId,
) {
    if is_own {
        return;
    }
    let Some(directory) = editor.model().directory(directory_shortid).cloned() else {
        return;
    };
    let (removed_modules, removed_directories) = editor.model().subtree_of(&directory);

    editor.model_mut().remove_directory(directory_shortid);
    for module in &removed_modules {
        editor.model_mut().remove_module(&module.shortid);
    }
    for child in &removed_directories {
        editor.model_mut().remove_directory(&child.shortid);
    }
    editor.rebuild_projection();

    // The open module may have lived anywhere under the deleted tree.
    open_main_module(editor);
}

pub(super) fn on_user_selection(
    session: &mut LiveSession,
    editor: &mut EditorSession,
    is_own: bool,
    live_user_id: SmolStr,
    module_shortid: &ShortId,
    selection: UserSelection,
) {
    if is_own {
        return;
    }
    let Some(room) = &mut session.room_info else {
        return;
    };
    if let Some(user) = room.user_mut(&live_user_id) {
        user.current_module_shortid = Some(module_shortid.clone());
        user.selection = Some(selection.clone());
    }

    if !room.can_edit(&live_user_id) {
        return;
    }
    let Some((name, color)) = room
        .user(&live_user_id)
        .map(|user| (user.username.clone(), user.color))
    else {
        return;
    };
    if let Some(module) = editor.model().module(module_shortid) {
        editor.surface().update_user_selections(
            module,
            &[UserSelectionView {
                user_id: live_user_id,
                name,
                color,
                selection,
            }],
        );
    }
}

pub(super) fn on_user_current_module(
    session: &mut LiveSession,
    editor: &mut EditorSession,
    is_own: bool,
    live_user_id: SmolStr,
    module_shortid: &ShortId,
) {
    if is_own {
        return;
    }
    let Some(room) = &mut session.room_info else {
        return;
    };
    if let Some(user) = room.user_mut(&live_user_id) {
        user.current_module_shortid = Some(module_shortid.clone());
        user.selection = None;
    }
    editor.surface().remove_user_selections(&live_user_id);

    // Mirror the followed user's navigation.
    if session.following_user_id.as_ref() == Some(&live_user_id)
        && editor.model().current_module_shortid() != Some(module_shortid)
    {
        let Some(id) = editor
            .model()
            .module(module_shortid)
            .map(|module| module.id.clone())
        else {
            return;
        };
        editor.module_selected(&ModuleRef::Id(id));
    }
}

pub(super) fn on_mode(
    session: &mut LiveSession,
    editor: &mut EditorSession,
    is_own: bool,
    mode: LiveSessionMode,
) {
    let Some(room) = &mut session.room_info else {
        return;
    };
    if !is_own {
        room.mode = mode;
    }
    session.recompute_flags();
    // Edit rights changed for everyone; redraw overlays from scratch.
    editor.surface().clear_user_selections();
}

pub(super) fn on_chat_enabled(session: &mut LiveSession, is_own: bool, enabled: bool) {
    if is_own {
        return;
    }
    if let Some(room) = &mut session.room_info {
        room.chat_enabled = enabled;
    }
}

pub(super) fn on_add_editor(session: &mut LiveSession, is_own: bool, editor_user_id: SmolStr) {
    if !is_own {
        if let Some(room) = &mut session.room_info {
            room.editor_ids.push(editor_user_id);
        }
    }
    session.recompute_flags();
}

pub(super) fn on_remove_editor(session: &mut LiveSession, is_own: bool, editor_user_id: SmolStr) {
    if !is_own {
        if let Some(room) = &mut session.room_info {
            room.editor_ids.retain(|id| id != &editor_user_id);
        }
    }
    session.recompute_flags();
}

pub(super) fn on_operation(
    session: &mut LiveSession,
    editor: &mut EditorSession,
    is_own: bool,
    module_shortid: &ShortId,
    operation: &TextOperation,
) {
    if !session.flags.is_live() {
        return;
    }
    if is_own {
        // Already applied when we sent it.
        return;
    }
    let Some(module) = editor.model().module(module_shortid) else {
        return;
    };
    match ot::apply(&module.code, operation) {
        Ok(code) => editor.operation_applied(module_shortid, code),
        Err(err) => {
            // Sync mismatch. Do not retry the operation; ask the server
            // for authoritative module state instead.
            error!("failed to apply remote operation on {module_shortid}: {err}");
            session.transport.send(OutboundMessage::ModuleStateSyncRequest);
        }
    }
}

pub(super) fn on_chat(
    session: &mut LiveSession,
    live_user_id: SmolStr,
    message: String,
    date: u64,
) {
    let Some(room) = &mut session.room_info else {
        return;
    };
    let username = match room.chat_users.get(&live_user_id) {
        Some(name) => name.clone(),
        None => {
            let name = room
                .user(&live_user_id)
                .map_or_else(|| SmolStr::new("Unknown User"), |user| user.username.clone());
            room.chat_users.insert(live_user_id.clone(), name.clone());
            name
        }
    };
    room.chat.push(crate::room::ChatMessage {
        user_id: live_user_id,
        username,
        message,
        date,
    });
}

pub(super) fn on_notification(editor: &mut EditorSession, message: &str, status: NotifyStatus) {
    editor.notifier().notify(status, message);
}

pub(super) fn on_connection_loss(session: &mut LiveSession, editor: &mut EditorSession) {
    if *session.reconnecting.borrow() {
        return;
    }
    warn!("live connection lost, waiting for rejoin");
    session.status = SessionStatus::Reconnecting;
    session.reconnecting.send_replace(true);

    // Show the outage toast only if the outage outlives the configured
    // delay, and clear it once a new join flips the flag back.
    let mut watch = session.reconnecting.subscribe();
    let notifier = Arc::clone(editor.notifier());
    let delay = session.reconnect_notice_delay;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if !*watch.borrow_and_update() {
            return;
        }
        let id = notifier.notify(
            NotifyStatus::Error,
            "We lost connection with the live server, reconnecting...",
        );
        loop {
            if watch.changed().await.is_err() {
                break;
            }
            if !*watch.borrow_and_update() {
                break;
            }
        }
        notifier.dismiss(id);
    });
}

pub(super) fn on_disconnect(
    session: &mut LiveSession,
    editor: &mut EditorSession,
    reason: DisconnectReason,
) {
    let was_owner = session.flags.is_owner();
    session.teardown(editor);
    // Ownership reverts to the locally computed value now that the live
    // session no longer grants anything.
    editor.model_mut().set_owned(was_owner);

    let message = match reason {
        DisconnectReason::Close => "The owner ended the session",
        DisconnectReason::Inactivity => "The session has ended due to inactivity",
    };
    editor.notifier().modal("Live session ended", message);
}

pub(super) fn on_owner_left(editor: &mut EditorSession) {
    editor
        .notifier()
        .modal("Live session ended", "The owner left the session");
}

fn open_main_module(editor: &mut EditorSession) {
    if let Some(main) = editor
        .model()
        .main_module()
        .map(|module| module.shortid.clone())
    {
        editor.set_current_module(&main);
    }
}
