//! Sandbox-level actions: fork, likes, frozen flag, environment variables
//! and external resources.

use tracing::{info, warn};

use crate::effects::NotifyStatus;

use super::EditorSession;

pub(super) async fn fork_transition(session: &mut EditorSession) {
    session.is_forking = true;
    let source = session.model.id().clone();
    info!("forking sandbox {source}");

    match session.effects.api.fork_sandbox(&source).await {
        Ok(forked) => {
            // Transition in place: same session, new sandbox, unsaved local
            // edits carried over.
            session.model.adopt_fork(forked);
            session.rebuild_projection();
            if let Some(main) = session
                .model
                .main_module()
                .map(|module| module.shortid.clone())
            {
                session.set_current_module(&main);
            }
            session
                .effects
                .notifier
                .notify(NotifyStatus::Success, "Forked sandbox!");
        }
        Err(err) => {
            warn!("forking sandbox {source} failed: {err}");
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "We were unable to fork the sandbox");
        }
    }
    session.is_forking = false;
}

pub(super) async fn toggle_like(session: &mut EditorSession) {
    session.model.toggle_liked();
    let liked = session.model.sandbox().user_liked;

    match session
        .effects
        .api
        .set_sandbox_liked(session.model.id(), liked)
        .await
    {
        Ok(()) => {}
        Err(err) => {
            warn!("updating like state failed: {err}");
            session.model.toggle_liked();
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "Unable to update like status");
        }
    }
}

pub(super) async fn set_frozen(session: &mut EditorSession, frozen: bool) {
    if !session
        .model
        .has_permission(sandbar_model::Authorization::WriteProject)
    {
        warn!("freeze toggle blocked: no project access");
        return;
    }
    let previous = session.model.is_frozen();
    session.model.set_frozen(frozen);

    match session
        .effects
        .api
        .save_frozen(session.model.id(), frozen)
        .await
    {
        Ok(()) => {}
        Err(err) => {
            warn!("persisting frozen flag failed: {err}");
            session.model.set_frozen(previous);
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "Unable to update frozen status");
        }
    }
}

pub(super) async fn fetch_environment_variables(session: &mut EditorSession) {
    match session
        .effects
        .api
        .get_environment_variables(session.model.id())
        .await
    {
        Ok(variables) => session.model.set_environment_variables(variables),
        Err(err) => {
            warn!("fetching environment variables failed: {err}");
            session.effects.notifier.notify(
                NotifyStatus::Error,
                "Unable to fetch environment variables",
            );
        }
    }
}

pub(super) async fn update_environment_variable(
    session: &mut EditorSession,
    name: &str,
    value: &str,
) {
    match session
        .effects
        .api
        .save_environment_variable(session.model.id(), name, value)
        .await
    {
        Ok(variables) => session.model.set_environment_variables(variables),
        Err(err) => {
            warn!("saving environment variable {name} failed: {err}");
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "Unable to save environment variable");
        }
    }
}

pub(super) async fn delete_environment_variable(session: &mut EditorSession, name: &str) {
    match session
        .effects
        .api
        .delete_environment_variable(session.model.id(), name)
        .await
    {
        Ok(variables) => session.model.set_environment_variables(variables),
        Err(err) => {
            warn!("deleting environment variable {name} failed: {err}");
            session
                .effects
                .notifier
                .notify(NotifyStatus::Error, "Unable to delete environment variable");
        }
    }
}

pub(super) fn external_resources_changed(session: &mut EditorSession, resources: Vec<String>) {
    if !session.guard_write("change external resources") {
        return;
    }
    session.model.set_external_resources(resources.clone());
    if session.effects.live.is_live() && session.effects.live.is_current_editor() {
        session.effects.live.send_external_resources(&resources);
    }
}
