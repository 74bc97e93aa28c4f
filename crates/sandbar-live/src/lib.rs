//! `sandbar-live` - Real-time collaboration for the Sandbar editor core.
//!
//! A live session applies a stream of typed remote events to the local
//! [`sandbar_editor::EditorSession`] so all participants converge on the
//! same file tree and content. Self-originated echoes are suppressed for
//! mutation events; desynchronized text operations recover through a full
//! module-state resync rather than operation-level conflict resolution.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod messages;
pub mod room;
pub mod session;
pub mod transport;

pub use messages::{LiveEvent, LiveMessage, ModuleStateEntry};
pub use room::{ChatMessage, DisconnectReason, LiveSessionMode, LiveUser, RoomInfo};
pub use session::{LiveSession, SessionStatus};
pub use transport::{LiveBroadcaster, LiveFlags, LiveTransport, OutboundMessage};
