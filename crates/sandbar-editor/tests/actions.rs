//! Action-level tests: optimistic apply, server reconciliation, rollback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use smol_str::SmolStr;

use sandbar_editor::{
    ApiError, ApiResult, EditorSession, EditorSurface, Effects, LiveBroadcast, MassCreateResponse,
    ModuleRef, NotificationId, Notifier, NotifyStatus, SandboxApi, SessionConfig,
    UserSelectionView,
};
use sandbar_model::{
    Authorization, Directory, EntityId, Module, ModuleCorrection, ModuleError, Sandbox, SandboxId,
    ShortId, TextOperation,
};

// --- fixtures --------------------------------------------------------------

fn module(id: &str, title: &str, dir: Option<&str>, code: &str) -> Module {
    Module {
        id: EntityId::new(id),
        shortid: ShortId::new(format!("s-{id}")),
        title: title.into(),
        directory_shortid: dir.map(ShortId::new),
        code: code.into(),
        saved_code: None,
        is_binary: false,
        inserted_at: None,
        updated_at: None,
        errors: Vec::new(),
        corrections: Vec::new(),
    }
}

fn sandbox() -> Sandbox {
    Sandbox {
        id: SandboxId::new("sb1"),
        version: 1,
        title: "fixture".into(),
        description: String::new(),
        alias: None,
        template: "node".into(),
        modules: vec![
            module("index", "index.js", None, "a"),
            module("pkg", "package.json", None, r#"{"name":"fixture"}"#),
            module("app", "app.js", Some("src"), "export default 1;"),
        ],
        directories: vec![Directory {
            id: EntityId::new("dir-src"),
            shortid: ShortId::new("src"),
            title: "src".into(),
            directory_shortid: None,
        }],
        environment_variables: IndexMap::new(),
        external_resources: Vec::new(),
        is_frozen: false,
        owned: true,
        authorization: Authorization::Owner,
        like_count: 0,
        user_liked: false,
        room_id: None,
    }
}

// --- mocks -----------------------------------------------------------------

#[derive(Default)]
struct MockApi {
    calls: Mutex<Vec<String>>,
    failing: Mutex<Vec<&'static str>>,
    /// When set, saved modules come back with this code instead of an echo.
    normalize_to: Mutex<Option<String>>,
    snapshot: Mutex<Option<Sandbox>>,
    not_found: Mutex<Vec<&'static str>>,
    counter: AtomicU64,
}

impl MockApi {
    fn fail_on(&self, method: &'static str) {
        self.failing.lock().push(method);
    }

    fn not_found_on(&self, method: &'static str) {
        self.not_found.lock().push(method);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn check(&self, method: &'static str) -> ApiResult<()> {
        self.calls.lock().push(method.to_string());
        if self.failing.lock().contains(&method) {
            return Err(ApiError::Transport("injected failure".into()));
        }
        if self.not_found.lock().contains(&method) {
            return Err(ApiError::Status {
                status: 404,
                message: "not found".into(),
            });
        }
        Ok(())
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl SandboxApi for MockApi {
    async fn get_sandbox(&self, _id: &SandboxId) -> ApiResult<Sandbox> {
        self.check("get_sandbox")?;
        Ok(self.snapshot.lock().clone().unwrap_or_else(sandbox))
    }

    async fn fork_sandbox(&self, _id: &SandboxId) -> ApiResult<Sandbox> {
        self.check("fork_sandbox")?;
        let mut forked = self.snapshot.lock().clone().unwrap_or_else(sandbox);
        forked.id = SandboxId::new("sb-fork");
        Ok(forked)
    }

    async fn save_module_code(&self, _id: &SandboxId, module: &Module) -> ApiResult<Module> {
        self.check("save_module_code")?;
        let mut stored = module.clone();
        if let Some(normalized) = self.normalize_to.lock().clone() {
            stored.code = normalized;
        }
        stored.updated_at = Some("now".into());
        Ok(stored)
    }

    async fn save_modules(&self, id: &SandboxId, modules: &[Module]) -> ApiResult<Vec<Module>> {
        self.check("save_modules")?;
        let mut stored = Vec::new();
        for module in modules {
            stored.push(self.save_module_code(id, module).await?);
        }
        Ok(stored)
    }

    async fn save_module_title(
        &self,
        _id: &SandboxId,
        _module: &ShortId,
        _title: &str,
    ) -> ApiResult<()> {
        self.check("save_module_title")
    }

    async fn save_module_directory(
        &self,
        _id: &SandboxId,
        _module: &ShortId,
        _directory: Option<&ShortId>,
    ) -> ApiResult<()> {
        self.check("save_module_directory")
    }

    async fn create_module(&self, _id: &SandboxId, module: &Module) -> ApiResult<Module> {
        self.check("create_module")?;
        let n = self.next();
        let mut confirmed = module.clone();
        confirmed.id = EntityId::new(format!("srv-id-{n}"));
        confirmed.shortid = ShortId::new(format!("srv-{n}"));
        confirmed.inserted_at = Some("now".into());
        Ok(confirmed)
    }

    async fn delete_module(&self, _id: &SandboxId, _module: &ShortId) -> ApiResult<()> {
        self.check("delete_module")
    }

    async fn mass_create_modules(
        &self,
        _id: &SandboxId,
        modules: &[Module],
        directories: &[Directory],
    ) -> ApiResult<MassCreateResponse> {
        self.check("mass_create_modules")?;
        Ok(MassCreateResponse {
            modules: modules.to_vec(),
            directories: directories.to_vec(),
        })
    }

    async fn create_directory(
        &self,
        _id: &SandboxId,
        parent: Option<&ShortId>,
        title: &str,
    ) -> ApiResult<Directory> {
        self.check("create_directory")?;
        let n = self.next();
        Ok(Directory {
            id: EntityId::new(format!("srv-id-{n}")),
            shortid: ShortId::new(format!("srv-{n}")),
            title: title.into(),
            directory_shortid: parent.cloned(),
        })
    }

    async fn save_directory_title(
        &self,
        _id: &SandboxId,
        _directory: &ShortId,
        _title: &str,
    ) -> ApiResult<()> {
        self.check("save_directory_title")
    }

    async fn save_directory_directory(
        &self,
        _id: &SandboxId,
        _directory: &ShortId,
        _parent: Option<&ShortId>,
    ) -> ApiResult<()> {
        self.check("save_directory_directory")
    }

    async fn delete_directory(&self, _id: &SandboxId, _directory: &ShortId) -> ApiResult<()> {
        self.check("delete_directory")
    }

    async fn get_environment_variables(
        &self,
        _id: &SandboxId,
    ) -> ApiResult<IndexMap<SmolStr, String>> {
        self.check("get_environment_variables")?;
        Ok(IndexMap::from_iter([(SmolStr::new("NODE_ENV"), "test".to_string())]))
    }

    async fn save_environment_variable(
        &self,
        _id: &SandboxId,
        name: &str,
        value: &str,
    ) -> ApiResult<IndexMap<SmolStr, String>> {
        self.check("save_environment_variable")?;
        Ok(IndexMap::from_iter([(SmolStr::new(name), value.to_string())]))
    }

    async fn delete_environment_variable(
        &self,
        _id: &SandboxId,
        _name: &str,
    ) -> ApiResult<IndexMap<SmolStr, String>> {
        self.check("delete_environment_variable")?;
        Ok(IndexMap::new())
    }

    async fn save_frozen(&self, _id: &SandboxId, _frozen: bool) -> ApiResult<()> {
        self.check("save_frozen")
    }

    async fn set_sandbox_liked(&self, _id: &SandboxId, _liked: bool) -> ApiResult<()> {
        self.check("set_sandbox_liked")
    }
}

#[derive(Default)]
struct MockSurface {
    events: Mutex<Vec<String>>,
}

impl MockSurface {
    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl EditorSurface for MockSurface {
    fn open_module(&self, module: &Module) {
        self.push(format!("open:{}", module.title));
    }
    fn revert_module(&self, module: &Module) {
        self.push(format!("revert:{}", module.title));
    }
    fn set_errors(&self, errors: &[ModuleError]) {
        self.push(format!("errors:{}", errors.len()));
    }
    fn set_corrections(&self, corrections: &[ModuleCorrection]) {
        self.push(format!("corrections:{}", corrections.len()));
    }
    fn update_user_selections(&self, module: &Module, selections: &[UserSelectionView]) {
        self.push(format!("selections:{}:{}", module.title, selections.len()));
    }
    fn remove_user_selections(&self, user_id: &SmolStr) {
        self.push(format!("remove_selections:{user_id}"));
    }
    fn clear_user_selections(&self) {
        self.push("clear_selections".into());
    }
    fn update_tab_paths(&self, old_path: &str, new_path: &str) {
        self.push(format!("tabs:{old_path}->{new_path}"));
    }
    fn close_all_tabs(&self) {
        self.push("close_all".into());
    }
    fn reset_layout(&self) {
        self.push("reset_layout".into());
    }
    fn keep_current_tab(&self) {
        self.push("keep_tab".into());
    }
}

#[derive(Default)]
struct MockNotifier {
    toasts: Mutex<Vec<(NotifyStatus, String)>>,
    modals: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl MockNotifier {
    fn toasts(&self) -> Vec<(NotifyStatus, String)> {
        self.toasts.lock().clone()
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, status: NotifyStatus, message: &str) -> NotificationId {
        self.toasts.lock().push((status, message.to_string()));
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
    fn dismiss(&self, _id: NotificationId) {}
    fn modal(&self, title: &str, message: &str) {
        self.modals.lock().push(format!("{title}: {message}"));
    }
}

#[derive(Default)]
struct MockLive {
    live: bool,
    editor: bool,
    sends: Mutex<Vec<String>>,
}

impl MockLive {
    fn active() -> Self {
        Self {
            live: true,
            editor: true,
            sends: Mutex::default(),
        }
    }

    fn sends(&self) -> Vec<String> {
        self.sends.lock().clone()
    }
}

impl LiveBroadcast for MockLive {
    fn is_live(&self) -> bool {
        self.live
    }
    fn is_current_editor(&self) -> bool {
        self.editor
    }
    fn send_code_update(&self, module: &ShortId, _operation: &TextOperation) {
        self.sends.lock().push(format!("code_update:{module}"));
    }
    fn send_module_saved(&self, module: &Module) {
        self.sends.lock().push(format!("module_saved:{}", module.shortid));
    }
    fn send_module_created(&self, module: &Module) {
        self.sends.lock().push(format!("module_created:{}", module.shortid));
    }
    fn send_module_updated(&self, module: &Module) {
        self.sends.lock().push(format!("module_updated:{}", module.shortid));
    }
    fn send_module_deleted(&self, module: &ShortId) {
        self.sends.lock().push(format!("module_deleted:{module}"));
    }
    fn send_directory_created(&self, directory: &Directory) {
        self.sends
            .lock()
            .push(format!("directory_created:{}", directory.shortid));
    }
    fn send_directory_updated(&self, directory: &Directory) {
        self.sends
            .lock()
            .push(format!("directory_updated:{}", directory.shortid));
    }
    fn send_directory_deleted(&self, directory: &ShortId) {
        self.sends.lock().push(format!("directory_deleted:{directory}"));
    }
    fn send_mass_created(&self, modules: &[Module], directories: &[Directory]) {
        self.sends
            .lock()
            .push(format!("mass_created:{}:{}", modules.len(), directories.len()));
    }
    fn send_user_current_module(&self, module: &ShortId) {
        self.sends.lock().push(format!("current_module:{module}"));
    }
    fn send_external_resources(&self, resources: &[String]) {
        self.sends
            .lock()
            .push(format!("external_resources:{}", resources.len()));
    }
}

struct Harness {
    api: Arc<MockApi>,
    surface: Arc<MockSurface>,
    notifier: Arc<MockNotifier>,
    live: Arc<MockLive>,
    session: EditorSession,
}

/// Boxed adapters so the Arc-held mocks stay inspectable from the test.
struct ApiHandle(Arc<MockApi>);
struct SurfaceHandle(Arc<MockSurface>);
struct LiveHandle(Arc<MockLive>);

#[async_trait]
impl SandboxApi for ApiHandle {
    async fn get_sandbox(&self, id: &SandboxId) -> ApiResult<Sandbox> {
        self.0.get_sandbox(id).await
    }
    async fn fork_sandbox(&self, id: &SandboxId) -> ApiResult<Sandbox> {
        self.0.fork_sandbox(id).await
    }
    async fn save_module_code(&self, id: &SandboxId, module: &Module) -> ApiResult<Module> {
        self.0.save_module_code(id, module).await
    }
    async fn save_modules(&self, id: &SandboxId, modules: &[Module]) -> ApiResult<Vec<Module>> {
        self.0.save_modules(id, modules).await
    }
    async fn save_module_title(
        &self,
        id: &SandboxId,
        module: &ShortId,
        title: &str,
    ) -> ApiResult<()> {
        self.0.save_module_title(id, module, title).await
    }
    async fn save_module_directory(
        &self,
        id: &SandboxId,
        module: &ShortId,
        directory: Option<&ShortId>,
    ) -> ApiResult<()> {
        self.0.save_module_directory(id, module, directory).await
    }
    async fn create_module(&self, id: &SandboxId, module: &Module) -> ApiResult<Module> {
        self.0.create_module(id, module).await
    }
    async fn delete_module(&self, id: &SandboxId, module: &ShortId) -> ApiResult<()> {
        self.0.delete_module(id, module).await
    }
    async fn mass_create_modules(
        &self,
        id: &SandboxId,
        modules: &[Module],
        directories: &[Directory],
    ) -> ApiResult<MassCreateResponse> {
        self.0.mass_create_modules(id, modules, directories).await
    }
    async fn create_directory(
        &self,
        id: &SandboxId,
        parent: Option<&ShortId>,
        title: &str,
    ) -> ApiResult<Directory> {
        self.0.create_directory(id, parent, title).await
    }
    async fn save_directory_title(
        &self,
        id: &SandboxId,
        directory: &ShortId,
        title: &str,
    ) -> ApiResult<()> {
        self.0.save_directory_title(id, directory, title).await
    }
    async fn save_directory_directory(
        &self,
        id: &SandboxId,
        directory: &ShortId,
        parent: Option<&ShortId>,
    ) -> ApiResult<()> {
        self.0.save_directory_directory(id, directory, parent).await
    }
    async fn delete_directory(&self, id: &SandboxId, directory: &ShortId) -> ApiResult<()> {
        self.0.delete_directory(id, directory).await
    }
    async fn get_environment_variables(
        &self,
        id: &SandboxId,
    ) -> ApiResult<IndexMap<SmolStr, String>> {
        self.0.get_environment_variables(id).await
    }
    async fn save_environment_variable(
        &self,
        id: &SandboxId,
        name: &str,
        value: &str,
    ) -> ApiResult<IndexMap<SmolStr, String>> {
        self.0.save_environment_variable(id, name, value).await
    }
    async fn delete_environment_variable(
        &self,
        id: &SandboxId,
        name: &str,
    ) -> ApiResult<IndexMap<SmolStr, String>> {
        self.0.delete_environment_variable(id, name).await
    }
    async fn save_frozen(&self, id: &SandboxId, frozen: bool) -> ApiResult<()> {
        self.0.save_frozen(id, frozen).await
    }
    async fn set_sandbox_liked(&self, id: &SandboxId, liked: bool) -> ApiResult<()> {
        self.0.set_sandbox_liked(id, liked).await
    }
}

impl EditorSurface for SurfaceHandle {
    fn open_module(&self, module: &Module) {
        self.0.open_module(module);
    }
    fn revert_module(&self, module: &Module) {
        self.0.revert_module(module);
    }
    fn set_errors(&self, errors: &[ModuleError]) {
        self.0.set_errors(errors);
    }
    fn set_corrections(&self, corrections: &[ModuleCorrection]) {
        self.0.set_corrections(corrections);
    }
    fn update_user_selections(&self, module: &Module, selections: &[UserSelectionView]) {
        self.0.update_user_selections(module, selections);
    }
    fn remove_user_selections(&self, user_id: &SmolStr) {
        self.0.remove_user_selections(user_id);
    }
    fn clear_user_selections(&self) {
        self.0.clear_user_selections();
    }
    fn update_tab_paths(&self, old_path: &str, new_path: &str) {
        self.0.update_tab_paths(old_path, new_path);
    }
    fn close_all_tabs(&self) {
        self.0.close_all_tabs();
    }
    fn reset_layout(&self) {
        self.0.reset_layout();
    }
    fn keep_current_tab(&self) {
        self.0.keep_current_tab();
    }
}

impl LiveBroadcast for LiveHandle {
    fn is_live(&self) -> bool {
        self.0.is_live()
    }
    fn is_current_editor(&self) -> bool {
        self.0.is_current_editor()
    }
    fn send_code_update(&self, module: &ShortId, operation: &TextOperation) {
        self.0.send_code_update(module, operation);
    }
    fn send_module_saved(&self, module: &Module) {
        self.0.send_module_saved(module);
    }
    fn send_module_created(&self, module: &Module) {
        self.0.send_module_created(module);
    }
    fn send_module_updated(&self, module: &Module) {
        self.0.send_module_updated(module);
    }
    fn send_module_deleted(&self, module: &ShortId) {
        self.0.send_module_deleted(module);
    }
    fn send_directory_created(&self, directory: &Directory) {
        self.0.send_directory_created(directory);
    }
    fn send_directory_updated(&self, directory: &Directory) {
        self.0.send_directory_updated(directory);
    }
    fn send_directory_deleted(&self, directory: &ShortId) {
        self.0.send_directory_deleted(directory);
    }
    fn send_mass_created(&self, modules: &[Module], directories: &[Directory]) {
        self.0.send_mass_created(modules, directories);
    }
    fn send_user_current_module(&self, module: &ShortId) {
        self.0.send_user_current_module(module);
    }
    fn send_external_resources(&self, resources: &[String]) {
        self.0.send_external_resources(resources);
    }
}

fn harness_with(sandbox: Sandbox, live: MockLive) -> Harness {
    let api = Arc::new(MockApi::default());
    let surface = Arc::new(MockSurface::default());
    let notifier = Arc::new(MockNotifier::default());
    let live = Arc::new(live);
    let effects = Effects {
        api: Box::new(ApiHandle(Arc::clone(&api))),
        surface: Box::new(SurfaceHandle(Arc::clone(&surface))),
        notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
        live: Box::new(LiveHandle(Arc::clone(&live))),
    };
    let session = EditorSession::new(sandbox, SessionConfig::default(), effects);
    Harness {
        api,
        surface,
        notifier,
        live,
        session,
    }
}

fn harness() -> Harness {
    harness_with(sandbox(), MockLive::default())
}

fn index() -> ShortId {
    ShortId::new("s-index")
}

// --- code actions ----------------------------------------------------------

#[test]
fn code_changed_tracks_the_saved_baseline() {
    let mut h = harness();
    h.session.code_changed(&index(), "b".into(), None);

    let module = h.session.model().module(&index()).expect("module");
    assert_eq!(module.code, "b");
    assert_eq!(module.saved_code.as_deref(), Some("a"));
}

#[test]
fn editing_back_to_baseline_reverts_the_unsaved_indicator() {
    let mut h = harness();
    h.session.code_changed(&index(), "b".into(), None);
    h.session.code_changed(&index(), "a".into(), None);

    assert!(h.surface.events().contains(&"revert:index.js".to_string()));
}

#[tokio::test]
async fn save_reconciles_an_echoed_baseline_to_none() {
    let mut h = harness();
    h.session.code_changed(&index(), "b".into(), None);
    h.session.save_module(&index(), None).await;

    let module = h.session.model().module(&index()).expect("module");
    assert_eq!(module.code, "b");
    assert!(module.saved_code.is_none(), "echoed save clears the baseline");

    // Saving again without changes stays clean.
    h.session.save_module(&index(), None).await;
    let module = h.session.model().module(&index()).expect("module");
    assert!(module.saved_code.is_none());
}

#[tokio::test]
async fn save_keeps_server_normalized_code_as_new_baseline() {
    let mut h = harness();
    *h.api.normalize_to.lock() = Some("b;\n".to_string());
    h.session.code_changed(&index(), "b".into(), None);
    h.session.save_module(&index(), None).await;

    let module = h.session.model().module(&index()).expect("module");
    assert_eq!(module.code, "b", "local content is preserved");
    assert_eq!(
        module.saved_code.as_deref(),
        Some("b;\n"),
        "the server's normalized content becomes the baseline"
    );
}

#[tokio::test]
async fn failed_save_keeps_the_local_edit_and_unsaved_marker() {
    let mut h = harness();
    h.api.fail_on("save_module_code");
    h.session.code_changed(&index(), "b".into(), None);
    h.session.save_module(&index(), None).await;

    let module = h.session.model().module(&index()).expect("module");
    assert_eq!(module.code, "b");
    assert_eq!(module.saved_code.as_deref(), Some("a"));
    assert!(h
        .notifier
        .toasts()
        .iter()
        .any(|(status, _)| *status == NotifyStatus::Error));
}

#[tokio::test]
async fn save_all_persists_every_changed_module() {
    let mut h = harness();
    h.session.code_changed(&index(), "b".into(), None);
    h.session
        .code_changed(&ShortId::new("s-app"), "export default 2;".into(), None);
    h.session.save_all().await;

    assert!(h.session.model().is_all_synced());
    assert_eq!(h.api.calls().iter().filter(|c| *c == "save_modules").count(), 1);
}

#[test]
fn discard_module_changes_returns_to_the_baseline() {
    let mut h = harness();
    h.session.code_changed(&index(), "b".into(), None);
    h.session.discard_module_changes(&index());

    let module = h.session.model().module(&index()).expect("module");
    assert_eq!(module.code, "a");
}

#[test]
fn live_edits_broadcast_before_applying() {
    let mut h = harness_with(sandbox(), MockLive::active());
    h.session.code_changed(&index(), "ab".into(), None);

    assert_eq!(h.live.sends(), vec!["code_update:s-index".to_string()]);
    assert_eq!(
        h.session.model().module(&index()).expect("module").code,
        "ab"
    );
}

// --- create / rename / move / delete --------------------------------------

#[tokio::test]
async fn created_module_adopts_the_server_identity_in_place() {
    let mut h = harness();
    h.session
        .module_created("fresh.js", None, Some("let x = 1;".into()), false)
        .await;

    let module = h
        .session
        .model()
        .module_by_path("/fresh.js")
        .expect("created module");
    assert_eq!(module.shortid, ShortId::new("srv-1"));
    assert!(module.saved_code.is_none());

    // The tab created for the optimistic module follows the new identity.
    assert!(h
        .session
        .tabs()
        .iter()
        .any(|tab| tab.module_shortid == ShortId::new("srv-1")));
    assert!(h.session.model().is_current_module(&ShortId::new("srv-1")));
    assert_eq!(
        h.session.projection().resolve_file("/fresh.js"),
        Some(&ShortId::new("srv-1"))
    );
}

#[tokio::test]
async fn failed_create_rolls_back_model_and_projection() {
    let mut h = harness();
    h.api.fail_on("create_module");
    h.session
        .module_created("fresh.js", None, Some("let x = 1;".into()), false)
        .await;

    assert!(h.session.model().module_by_path("/fresh.js").is_none());
    assert!(h.session.projection().resolve_file("/fresh.js").is_none());
    assert!(h
        .notifier
        .toasts()
        .iter()
        .any(|(_, message)| message == "Unable to save new file"));
}

#[tokio::test]
async fn rename_updates_path_and_rolls_back_on_failure() {
    let mut h = harness();
    h.session.module_renamed(&index(), "main.js").await;
    assert!(h.session.model().module_by_path("/main.js").is_some());
    assert_eq!(
        h.session.projection().resolve_file("/main.js"),
        Some(&index())
    );

    h.api.fail_on("save_module_title");
    h.session.module_renamed(&index(), "other.js").await;

    let module = h.session.model().module(&index()).expect("module");
    assert_eq!(module.title, "main.js", "title restored after failure");
    assert_eq!(
        h.session.projection().resolve_file("/main.js"),
        Some(&index()),
        "projection rebuilt from the restored model"
    );
    assert!(h.session.projection().resolve_file("/other.js").is_none());
}

#[tokio::test]
async fn rename_broadcasts_to_live_editors() {
    let mut h = harness_with(sandbox(), MockLive::active());
    h.session.module_renamed(&index(), "main.js").await;
    assert!(h
        .live
        .sends()
        .contains(&"module_updated:s-index".to_string()));
}

#[tokio::test]
async fn move_failure_restores_the_previous_directory() {
    let mut h = harness();
    h.api.fail_on("save_module_directory");
    h.session
        .module_moved(&index(), Some(ShortId::new("src")))
        .await;

    let module = h.session.model().module(&index()).expect("module");
    assert_eq!(module.directory_shortid, None);
    assert_eq!(
        h.session.projection().resolve_file("/index.js"),
        Some(&index())
    );
}

#[tokio::test]
async fn deleting_the_open_module_falls_back_to_main() {
    let mut h = harness();
    h.session.set_current_module(&index());
    h.session.module_deleted(&index()).await;

    assert!(h.session.model().module(&index()).is_none());
    // /index.js is gone; the node template entry resolves to the first
    // root module instead.
    let current = h.session.model().current_module().expect("current module");
    assert_eq!(current.title, "package.json");
}

#[tokio::test]
async fn failed_delete_restores_the_module() {
    let mut h = harness();
    h.api.fail_on("delete_module");
    h.session.module_deleted(&index()).await;

    assert!(h.session.model().module(&index()).is_some());
    assert_eq!(
        h.session.projection().resolve_file("/index.js"),
        Some(&index())
    );
}

#[tokio::test]
async fn directory_delete_failure_restores_the_whole_subtree() {
    let mut h = harness();
    h.api.fail_on("delete_directory");
    h.session.directory_deleted(&ShortId::new("src")).await;

    assert!(h.session.model().directory(&ShortId::new("src")).is_some());
    assert!(h.session.model().module_by_path("/src/app.js").is_some());
    assert_eq!(
        h.session.projection().resolve_file("/src/app.js"),
        Some(&ShortId::new("s-app"))
    );
}

#[tokio::test]
async fn create_modules_by_path_builds_directory_chains() {
    let mut h = harness();
    h.session
        .create_modules_by_path(vec![
            ("/lib/util/format.js".to_string(), "export {};".to_string()),
            ("/lib/index.js".to_string(), "export {};".to_string()),
        ])
        .await;

    assert!(h.session.model().module_by_path("/lib/util/format.js").is_some());
    assert!(h.session.model().module_by_path("/lib/index.js").is_some());
    assert!(h.session.projection().resolve_file("/lib/index.js").is_some());
}

// --- gating and selection ---------------------------------------------------

#[tokio::test]
async fn writes_are_gated_without_write_permission() {
    let mut sb = sandbox();
    sb.authorization = Authorization::Read;
    sb.owned = false;
    let mut h = harness_with(sb, MockLive::default());

    h.session.module_renamed(&index(), "hacked.js").await;

    assert!(h.api.calls().is_empty(), "no request leaves the client");
    assert_eq!(
        h.session.model().module(&index()).expect("module").title,
        "index.js"
    );
    assert!(!h.notifier.toasts().is_empty());
}

#[tokio::test]
async fn frozen_sandboxes_block_writes_until_overridden() {
    let mut sb = sandbox();
    sb.is_frozen = true;
    let mut h = harness_with(sb, MockLive::default());

    h.session.module_renamed(&index(), "main.js").await;
    assert!(h.api.calls().is_empty());

    h.session.session_freeze_override(false);
    h.session.module_renamed(&index(), "main.js").await;
    assert_eq!(h.api.calls(), vec!["save_module_title".to_string()]);
}

#[test]
fn selecting_an_untracked_path_unsets_the_current_module() {
    let mut h = harness();
    h.session.set_current_module(&index());
    h.session
        .module_selected(&ModuleRef::Path("/node_modules/react/index.d.ts".into()));

    assert!(h.session.model().current_module().is_none());
}

#[test]
fn selecting_by_path_tolerates_the_sandbox_prefix() {
    let mut h = harness();
    h.session
        .module_selected(&ModuleRef::Path("/sandbox/src/app.js".into()));
    assert!(h.session.model().is_current_module(&ShortId::new("s-app")));
}

// --- sandbox-level actions --------------------------------------------------

#[test]
fn switching_sandboxes_resets_session_scoped_state() {
    let mut h = harness();
    h.session.set_current_module(&index());
    h.session.code_changed(&index(), "b".into(), None);

    let mut next = sandbox();
    next.id = SandboxId::new("sb2");
    h.session.sandbox_changed(next);

    assert_eq!(h.session.model().id(), &SandboxId::new("sb2"));
    assert!(h.session.model().errors().is_empty());
    assert!(h.surface.events().contains(&"close_all".to_string()));
    assert!(h.surface.events().contains(&"reset_layout".to_string()));
    // The fresh sandbox opens at its main module.
    assert!(h.session.model().is_current_module(&index()));
}

#[tokio::test]
async fn sync_swallows_a_missing_sandbox() {
    let mut h = harness();
    h.api.not_found_on("get_sandbox");
    h.session.sync_sandbox(Vec::new()).await;
    assert!(h.notifier.toasts().is_empty());
}

#[tokio::test]
async fn fork_transition_keeps_unsaved_code() {
    let mut h = harness();
    h.session.code_changed(&index(), "edited".into(), None);
    h.session.fork_transition().await;

    assert_eq!(h.session.model().id(), &SandboxId::new("sb-fork"));
    assert_eq!(
        h.session.model().module(&index()).expect("module").code,
        "edited"
    );
    assert!(h
        .notifier
        .toasts()
        .iter()
        .any(|(status, _)| *status == NotifyStatus::Success));
}

#[tokio::test]
async fn like_toggle_rolls_back_on_failure() {
    let mut h = harness();
    h.api.fail_on("set_sandbox_liked");
    h.session.toggle_like().await;

    assert!(!h.session.model().sandbox().user_liked);
    assert_eq!(h.session.model().sandbox().like_count, 0);
}

#[tokio::test]
async fn environment_variables_follow_the_server_response() {
    let mut h = harness();
    h.session.fetch_environment_variables().await;
    assert_eq!(
        h.session
            .model()
            .environment_variables()
            .get("NODE_ENV")
            .map(String::as_str),
        Some("test")
    );

    h.session.update_environment_variable("API_KEY", "secret").await;
    assert_eq!(
        h.session
            .model()
            .environment_variables()
            .get("API_KEY")
            .map(String::as_str),
        Some("secret")
    );
}
