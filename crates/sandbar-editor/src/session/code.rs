//! Code-change and save actions.

use tracing::warn;

use sandbar_model::ot::{self, OtComponent, TextOperation};
use sandbar_model::{Module, ShortId};

use crate::effects::{EditEvent, NotifyStatus};

use super::EditorSession;

pub(super) fn code_changed(
    session: &mut EditorSession,
    shortid: &ShortId,
    code: String,
    event: Option<EditEvent>,
) {
    let Some(module) = session.model.module(shortid) else {
        return;
    };

    // Broadcast before applying locally; receivers treat our echo as a
    // no-op, so ordering only matters for remote peers.
    if session.effects.live.is_live() {
        let operation = match &event {
            Some(edit) => operation_from_edit(&module.code, edit),
            None => ot::diff(&module.code, &code),
        };
        if session.effects.live.is_current_editor() {
            session.effects.live.send_code_update(shortid, &operation);
        }
    }

    set_module_code(session, shortid, code);
    revert_if_back_at_baseline(session, shortid);
}

pub(super) fn operation_applied(session: &mut EditorSession, shortid: &ShortId, code: String) {
    if session.model.module(shortid).is_none() {
        return;
    }
    set_module_code(session, shortid, code);
    revert_if_back_at_baseline(session, shortid);
}

pub(super) async fn save_module(
    session: &mut EditorSession,
    shortid: &ShortId,
    code: Option<String>,
) {
    if !session.guard_write("save") {
        return;
    }
    let Some(module) = session.model.module(shortid) else {
        return;
    };
    if let Some(code) = code {
        if module.code != code {
            code_changed(session, shortid, code, None);
        }
    }
    let Some(snapshot) = session.model.module(shortid).cloned() else {
        return;
    };

    match session
        .effects
        .api
        .save_module_code(session.model.id(), &snapshot)
        .await
    {
        Ok(updated) => {
            apply_saved_module(session, shortid, &updated);
            if session.effects.live.is_live() && session.effects.live.is_current_editor() {
                if let Some(module) = session.model.module(shortid) {
                    session.effects.live.send_module_saved(module);
                }
            }
        }
        Err(err) => {
            warn!("saving module {shortid} failed: {err}");
            session.effects.notifier.notify(
                NotifyStatus::Error,
                "There was a problem with saving the code, please try again",
            );
        }
    }
}

pub(super) async fn save_all(session: &mut EditorSession) {
    if !session.guard_write("save all") {
        return;
    }
    let changed: Vec<Module> = session
        .model
        .changed_modules()
        .into_iter()
        .cloned()
        .collect();
    if changed.is_empty() {
        return;
    }

    match session
        .effects
        .api
        .save_modules(session.model.id(), &changed)
        .await
    {
        Ok(updated_modules) => {
            for updated in updated_modules {
                let shortid = updated.shortid.clone();
                apply_saved_module(session, &shortid, &updated);
            }
        }
        Err(err) => {
            warn!("mass save failed: {err}");
            session.effects.notifier.notify(
                NotifyStatus::Error,
                "There was a problem with saving the files, please try again",
            );
        }
    }
}

pub(super) fn discard_module_changes(session: &mut EditorSession, shortid: &ShortId) {
    let Some(baseline) = session
        .model
        .module(shortid)
        .and_then(|module| module.saved_code.clone())
    else {
        return;
    };
    code_changed(session, shortid, baseline, None);
}

/// Reconciles a module with the server's answer to a save.
///
/// Server code equal to local code means nothing is outstanding
/// (`saved_code` drops to `None`); anything else becomes the new baseline,
/// so edits made while the save was in flight stay marked as unsaved
/// instead of being silently considered clean.
pub(super) fn apply_saved_module(session: &mut EditorSession, shortid: &ShortId, updated: &Module) {
    if let Some(module) = session.model.module_mut(shortid) {
        module.inserted_at = updated.inserted_at.clone();
        module.updated_at = updated.updated_at.clone();
        module.saved_code = if updated.code == module.code {
            None
        } else {
            Some(updated.code.clone())
        };
    } else {
        // The server can answer with a module we no longer hold (created
        // server-side, or deleted locally while the save was in flight).
        session.model.add_module(updated.clone());
    }
    if let Some(path) = session.model.module_path(shortid) {
        session.projection.write_file(path, shortid.clone());
    }
    session.mark_tab_clean(shortid);
    if let Some(module) = session.model.module(shortid) {
        if module.is_synced() {
            session.effects.surface.revert_module(module);
        }
    }
}

fn set_module_code(session: &mut EditorSession, shortid: &ShortId, code: String) {
    if let Some(module) = session.model.module_mut(shortid) {
        // First divergence starts tracking the baseline.
        if module.saved_code.is_none() {
            module.saved_code = Some(module.code.clone());
        }
        module.code = code;
    }
    session.effects.surface.keep_current_tab();
    session.mark_tab_clean(shortid);
}

fn revert_if_back_at_baseline(session: &mut EditorSession, shortid: &ShortId) {
    let Some(module) = session.model.module(shortid) else {
        return;
    };
    if module.saved_code.as_deref() == Some(module.code.as_str()) {
        session.effects.surface.revert_module(module);
    }
}

fn operation_from_edit(code: &str, edit: &EditEvent) -> TextOperation {
    let total = code.chars().count();
    let mut components = Vec::new();
    if edit.offset > 0 {
        components.push(OtComponent::Retain(edit.offset));
    }
    if edit.removed > 0 {
        components.push(OtComponent::Delete(edit.removed));
    }
    if !edit.inserted.is_empty() {
        components.push(OtComponent::Insert(edit.inserted.clone()));
    }
    let rest = total.saturating_sub(edit.offset + edit.removed);
    if rest > 0 {
        components.push(OtComponent::Retain(rest));
    }
    TextOperation { components }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_event_becomes_a_positioned_operation() {
        let operation = operation_from_edit(
            "hello world",
            &EditEvent {
                offset: 6,
                removed: 5,
                inserted: "there".into(),
            },
        );
        assert_eq!(
            operation.components,
            vec![
                OtComponent::Retain(6),
                OtComponent::Delete(5),
                OtComponent::Insert("there".into()),
            ]
        );
        assert_eq!(ot::apply("hello world", &operation).unwrap(), "hello there");
    }

    #[test]
    fn edit_event_at_document_start() {
        let operation = operation_from_edit(
            "abc",
            &EditEvent {
                offset: 0,
                removed: 0,
                inserted: "x".into(),
            },
        );
        assert_eq!(ot::apply("abc", &operation).unwrap(), "xabc");
    }
}
