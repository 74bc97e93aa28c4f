//! File-tree mutation actions: create, rename, move, delete, mass-create
//! and snapshot reconciliation.

use tracing::warn;

use sandbar_model::{ot, Directory, EntityId, Module, ShortId, SyncUpdate};

use crate::effects::NotifyStatus;

use super::EditorSession;

pub(super) async fn module_created(
    session: &mut EditorSession,
    title: &str,
    directory_shortid: Option<ShortId>,
    code: Option<String>,
    is_binary: bool,
) {
    if !session.guard_write("create file") {
        return;
    }

    let optimistic_id = EntityId::new(session.next_optimistic_id());
    let optimistic_shortid = ShortId::new(session.next_optimistic_id());
    let module = Module {
        id: optimistic_id,
        shortid: optimistic_shortid.clone(),
        title: title.into(),
        directory_shortid,
        code: code.unwrap_or_default(),
        // The server holds nothing for this module yet.
        saved_code: Some(String::new()),
        is_binary,
        inserted_at: None,
        updated_at: None,
        errors: Vec::new(),
        corrections: Vec::new(),
    };

    session.model.add_module(module);
    if let Some(path) = session.model.module_path(&optimistic_shortid) {
        session
            .projection
            .write_file(path, optimistic_shortid.clone());
    }
    session.set_current_module(&optimistic_shortid);

    let Some(snapshot) = session.model.module(&optimistic_shortid).cloned() else {
        return;
    };
    match session
        .effects
        .api
        .create_module(session.model.id(), &snapshot)
        .await
    {
        Ok(confirmed) => {
            session.replace_module_identity(
                &optimistic_shortid,
                confirmed.id.clone(),
                confirmed.shortid.clone(),
            );
            if let Some(module) = session.model.module_mut(&confirmed.shortid) {
                module.inserted_at = confirmed.inserted_at.clone();
                module.updated_at = confirmed.updated_at.clone();
                module.saved_code = None;
            }
            if session.effects.live.is_live() && session.effects.live.is_current_editor() {
                if let Some(module) = session.model.module(&confirmed.shortid) {
                    session.effects.live.send_module_created(module);
                    // Bring the session server up to date with the content.
                    session
                        .effects
                        .live
                        .send_code_update(&confirmed.shortid, &ot::diff("", &module.code));
                }
            }
        }
        Err(err) => {
            warn!("creating module {title} failed: {err}");
            session.model.remove_module(&optimistic_shortid);
            if let Some(main) = session
                .model
                .main_module()
                .map(|module| module.shortid.clone())
            {
                session.set_current_module(&main);
            }
            session.rebuild_projection();
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "Unable to save new file");
        }
    }
}

pub(super) async fn module_renamed(session: &mut EditorSession, shortid: &ShortId, title: &str) {
    if !session.guard_write("rename file") {
        return;
    }
    let Some(old_title) = session
        .model
        .module(shortid)
        .map(|module| module.title.clone())
    else {
        return;
    };
    let old_path = session.model.module_path(shortid);

    if let Some(module) = session.model.module_mut(shortid) {
        module.title = title.into();
    }
    let new_path = session.model.module_path(shortid);
    if let (Some(old), Some(new)) = (&old_path, &new_path) {
        session.projection.rename(old, new.clone());
        session.effects.surface.update_tab_paths(old, new);
    }
    reopen_if_current(session, shortid);

    match session
        .effects
        .api
        .save_module_title(session.model.id(), shortid, title)
        .await
    {
        Ok(()) => {
            if session.effects.live.is_live() && session.effects.live.is_current_editor() {
                if let Some(module) = session.model.module(shortid) {
                    session.effects.live.send_module_updated(module);
                }
            }
        }
        Err(err) => {
            warn!("renaming module {shortid} failed: {err}");
            if let Some(module) = session.model.module_mut(shortid) {
                module.title = old_title;
            }
            session.rebuild_projection();
            reopen_if_current(session, shortid);
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "Could not rename file");
        }
    }
}

pub(super) async fn module_moved(
    session: &mut EditorSession,
    shortid: &ShortId,
    directory: Option<ShortId>,
) {
    if !session.guard_write("move file") {
        return;
    }
    let Some(old_directory) = session
        .model
        .module(shortid)
        .map(|module| module.directory_shortid.clone())
    else {
        return;
    };
    let old_path = session.model.module_path(shortid);

    if let Some(module) = session.model.module_mut(shortid) {
        module.directory_shortid = directory.clone();
    }
    let new_path = session.model.module_path(shortid);
    if let (Some(old), Some(new)) = (&old_path, &new_path) {
        session.projection.rename(old, new.clone());
    }
    reopen_if_current(session, shortid);

    match session
        .effects
        .api
        .save_module_directory(session.model.id(), shortid, directory.as_ref())
        .await
    {
        Ok(()) => {
            if session.effects.live.is_live() && session.effects.live.is_current_editor() {
                if let Some(module) = session.model.module(shortid) {
                    session.effects.live.send_module_updated(module);
                }
            }
        }
        Err(err) => {
            warn!("moving module {shortid} failed: {err}");
            if let Some(module) = session.model.module_mut(shortid) {
                module.directory_shortid = old_directory;
            }
            session.rebuild_projection();
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "Could not save new module location");
        }
    }
}

pub(super) async fn module_deleted(session: &mut EditorSession, shortid: &ShortId) {
    if !session.guard_write("delete file") {
        return;
    }
    let was_current = session.model.is_current_module(shortid);
    let path = session.model.module_path(shortid);
    let Some(removed) = session.model.remove_module(shortid) else {
        return;
    };
    if let Some(path) = &path {
        session.projection.unlink(path);
    }
    if was_current {
        if let Some(main) = session
            .model
            .main_module()
            .map(|module| module.shortid.clone())
        {
            session.set_current_module(&main);
        }
    }

    match session
        .effects
        .api
        .delete_module(session.model.id(), shortid)
        .await
    {
        Ok(()) => {
            if session.effects.live.is_live() && session.effects.live.is_current_editor() {
                session.effects.live.send_module_deleted(shortid);
            }
        }
        Err(err) => {
            warn!("deleting module {shortid} failed: {err}");
            session.model.add_module(removed);
            session.rebuild_projection();
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "Could not delete file");
        }
    }
}

pub(super) async fn directory_created(
    session: &mut EditorSession,
    title: &str,
    parent: Option<ShortId>,
) {
    if !session.guard_write("create directory") {
        return;
    }

    let optimistic_shortid = ShortId::new(session.next_optimistic_id());
    let directory = Directory {
        id: EntityId::new(session.next_optimistic_id()),
        shortid: optimistic_shortid.clone(),
        title: title.into(),
        directory_shortid: parent.clone(),
    };
    session.model.add_directory(directory);
    if let Some(path) = session.model.directory_path(&optimistic_shortid) {
        session.projection.mkdir(path, optimistic_shortid.clone());
    }

    match session
        .effects
        .api
        .create_directory(session.model.id(), parent.as_ref(), title)
        .await
    {
        Ok(confirmed) => {
            session.replace_directory_identity(
                &optimistic_shortid,
                confirmed.id.clone(),
                confirmed.shortid.clone(),
            );
            if session.effects.live.is_live() && session.effects.live.is_current_editor() {
                if let Some(directory) = session.model.directory(&confirmed.shortid).cloned() {
                    session.effects.live.send_directory_created(&directory);
                }
            }
        }
        Err(err) => {
            warn!("creating directory {title} failed: {err}");
            session.model.remove_directory(&optimistic_shortid);
            session.rebuild_projection();
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "Unable to save new directory");
        }
    }
}

pub(super) async fn directory_renamed(
    session: &mut EditorSession,
    shortid: &ShortId,
    title: &str,
) {
    if !session.guard_write("rename directory") {
        return;
    }
    let Some(old_title) = session
        .model
        .directory(shortid)
        .map(|directory| directory.title.clone())
    else {
        return;
    };

    if let Some(directory) = session.model.directory_mut(shortid) {
        directory.title = title.into();
    }
    // Every descendant path changed.
    session.rebuild_projection();

    match session
        .effects
        .api
        .save_directory_title(session.model.id(), shortid, title)
        .await
    {
        Ok(()) => {
            if session.effects.live.is_live() && session.effects.live.is_current_editor() {
                if let Some(directory) = session.model.directory(shortid).cloned() {
                    session.effects.live.send_directory_updated(&directory);
                }
            }
        }
        Err(err) => {
            warn!("renaming directory {shortid} failed: {err}");
            if let Some(directory) = session.model.directory_mut(shortid) {
                directory.title = old_title;
            }
            session.rebuild_projection();
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "Could not rename directory");
        }
    }
}

pub(super) async fn directory_moved(
    session: &mut EditorSession,
    shortid: &ShortId,
    parent: Option<ShortId>,
) {
    if !session.guard_write("move directory") {
        return;
    }
    let Some(old_parent) = session
        .model
        .directory(shortid)
        .map(|directory| directory.directory_shortid.clone())
    else {
        return;
    };

    if let Some(directory) = session.model.directory_mut(shortid) {
        directory.directory_shortid = parent.clone();
    }
    session.rebuild_projection();

    match session
        .effects
        .api
        .save_directory_directory(session.model.id(), shortid, parent.as_ref())
        .await
    {
        Ok(()) => {
            if session.effects.live.is_live() && session.effects.live.is_current_editor() {
                if let Some(directory) = session.model.directory(shortid).cloned() {
                    session.effects.live.send_directory_updated(&directory);
                }
            }
        }
        Err(err) => {
            warn!("moving directory {shortid} failed: {err}");
            if let Some(directory) = session.model.directory_mut(shortid) {
                directory.directory_shortid = old_parent;
            }
            session.rebuild_projection();
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "Could not save new directory location");
        }
    }
}

pub(super) async fn directory_deleted(session: &mut EditorSession, shortid: &ShortId) {
    if !session.guard_write("delete directory") {
        return;
    }
    let Some(directory) = session.model.directory(shortid).cloned() else {
        return;
    };
    let (removed_modules, removed_directories) = session.model.subtree_of(&directory);

    let Some(removed_directory) = session.model.remove_directory(shortid) else {
        return;
    };
    for module in &removed_modules {
        session.model.remove_module(&module.shortid);
    }
    for child in &removed_directories {
        session.model.remove_directory(&child.shortid);
    }
    session.rebuild_projection();

    // The open module may have lived anywhere under this directory; opening
    // the main module is the simple, always-valid fallback.
    if let Some(main) = session
        .model
        .main_module()
        .map(|module| module.shortid.clone())
    {
        session.set_current_module(&main);
    }

    match session
        .effects
        .api
        .delete_directory(session.model.id(), shortid)
        .await
    {
        Ok(()) => {
            if session.effects.live.is_live() && session.effects.live.is_current_editor() {
                session.effects.live.send_directory_deleted(shortid);
            }
        }
        Err(err) => {
            warn!("deleting directory {shortid} failed: {err}");
            session.model.add_directory(removed_directory);
            session.model.add_modules(removed_modules);
            session.model.add_directories(removed_directories);
            session.rebuild_projection();
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "Could not delete directory");
        }
    }
}

pub(super) async fn mass_create_modules(
    session: &mut EditorSession,
    modules: Vec<Module>,
    directories: Vec<Directory>,
) {
    if !session.guard_write("mass create") {
        return;
    }

    match session
        .effects
        .api
        .mass_create_modules(session.model.id(), &modules, &directories)
        .await
    {
        Ok(response) => {
            session.model.add_modules(response.modules.clone());
            session.model.add_directories(response.directories.clone());
            // Mass creates can nest directories; patching incrementally is
            // not worth the risk.
            session.rebuild_projection();

            if session.model.current_module().is_none() {
                if let Some(last) = session
                    .model
                    .modules()
                    .last()
                    .map(|module| module.shortid.clone())
                {
                    session.set_current_module(&last);
                }
            }
            if session.effects.live.is_live() && session.effects.live.is_current_editor() {
                session
                    .effects
                    .live
                    .send_mass_created(&response.modules, &response.directories);
            }
        }
        Err(err) => {
            warn!("mass create failed: {err}");
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "Unable to create new files");
        }
    }
}

pub(super) async fn create_modules_by_path(
    session: &mut EditorSession,
    entries: Vec<(String, String)>,
) {
    let mut new_directories: Vec<Directory> = Vec::new();
    let mut new_modules: Vec<Module> = Vec::new();

    for (path, code) in entries {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((title, dirs)) = segments.split_last() else {
            continue;
        };

        let mut parent: Option<ShortId> = None;
        for segment in dirs {
            let existing = session
                .model
                .directories()
                .iter()
                .find(|d| d.title == *segment && d.directory_shortid == parent)
                .map(|d| d.shortid.clone());
            let pending = new_directories
                .iter()
                .find(|d| d.title == *segment && d.directory_shortid == parent)
                .map(|d| d.shortid.clone());

            parent = Some(match existing.or(pending) {
                Some(shortid) => shortid,
                None => {
                    let shortid = ShortId::new(session.next_optimistic_id());
                    new_directories.push(Directory {
                        id: EntityId::new(session.next_optimistic_id()),
                        shortid: shortid.clone(),
                        title: (*segment).into(),
                        directory_shortid: parent.clone(),
                    });
                    shortid
                }
            });
        }

        new_modules.push(Module {
            id: EntityId::new(session.next_optimistic_id()),
            shortid: ShortId::new(session.next_optimistic_id()),
            title: (*title).into(),
            directory_shortid: parent,
            code,
            saved_code: None,
            is_binary: false,
            inserted_at: None,
            updated_at: None,
            errors: Vec::new(),
            corrections: Vec::new(),
        });
    }

    mass_create_modules(session, new_modules, new_directories).await;
}

pub(super) async fn sync_sandbox(session: &mut EditorSession, updates: Vec<SyncUpdate>) {
    match session.effects.api.get_sandbox(session.model.id()).await {
        Ok(snapshot) => {
            session.model.sync(&snapshot, &updates);
            session.rebuild_projection();
        }
        Err(err) if err.is_not_found() => {
            // The sandbox is gone server-side; nothing to reconcile.
        }
        Err(err) => {
            warn!("sandbox sync failed: {err}");
            session.effects.notifier.notify(
                NotifyStatus::Error,
                "We weren't able to retrieve the latest files of the sandbox, please refresh",
            );
            session.rebuild_projection();
        }
    }
}

fn reopen_if_current(session: &mut EditorSession, shortid: &ShortId) {
    if session.model.is_current_module(shortid) {
        if let Some(module) = session.model.module(shortid) {
            session.effects.surface.open_module(module);
        }
    }
}
