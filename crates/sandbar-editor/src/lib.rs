//! `sandbar-editor` - Editor session and mutation actions for the Sandbar
//! core.
//!
//! The session owns the sandbox model and orchestrates every logical
//! file-system mutation as: derive new state, apply optimistically to the
//! model and the editor surface, issue the network request, then merge the
//! server confirmation or roll back and surface the error. External
//! collaborators (persistence API, editor surface, notifications, live
//! channel) are traits in [`effects`].

pub mod config;
pub mod effects;
pub mod session;

pub use config::SessionConfig;
pub use effects::{
    ApiError, ApiResult, DetachedLive, EditEvent, EditorSurface, Effects, LiveBroadcast,
    MassCreateResponse, NotificationId, Notifier, NotifyStatus, SandboxApi, UserSelectionView,
};
pub use session::{EditorSession, ModuleRef};
