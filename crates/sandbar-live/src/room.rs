//! Room and roster state for a live session.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use sandbar_model::{ShortId, UserSelection};

/// How the session distributes edit rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LiveSessionMode {
    /// Everyone may edit.
    #[default]
    Open,
    /// Only designated editors may edit.
    Classroom,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The owner closed the session.
    Close,
    /// The session timed out from inactivity.
    Inactivity,
}

/// One connected collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveUser {
    /// Live-session identity.
    pub id: SmolStr,
    /// Display name.
    pub username: SmolStr,
    /// Cursor color.
    #[serde(default)]
    pub color: [u8; 3],
    /// Module the user currently has open.
    #[serde(default)]
    pub current_module_shortid: Option<ShortId>,
    /// Cursor/selection inside that module.
    #[serde(default)]
    pub selection: Option<UserSelection>,
}

/// A chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender's live-user id.
    pub user_id: SmolStr,
    /// Resolved sender name at receive time.
    pub username: SmolStr,
    /// Message text.
    pub message: String,
    /// Epoch milliseconds.
    pub date: u64,
}

/// Shared view of the live room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomInfo {
    /// Room identifier.
    pub room_id: SmolStr,
    /// Edit-rights mode.
    pub mode: LiveSessionMode,
    /// Whether chat is enabled.
    pub chat_enabled: bool,
    /// Roster, replaced wholesale on join/leave events.
    pub users: Vec<LiveUser>,
    /// Users with edit rights.
    pub editor_ids: Vec<SmolStr>,
    /// Session owners.
    pub owner_ids: Vec<SmolStr>,
    /// Chat log.
    pub chat: Vec<ChatMessage>,
    /// Sender names by live-user id, so chat lines keep their name after
    /// the sender leaves the roster.
    pub chat_users: FxHashMap<SmolStr, SmolStr>,
}

impl RoomInfo {
    /// Looks up a user by id.
    #[must_use]
    pub fn user(&self, id: &str) -> Option<&LiveUser> {
        self.users.iter().find(|user| user.id == id)
    }

    /// Mutable user lookup.
    pub fn user_mut(&mut self, id: &str) -> Option<&mut LiveUser> {
        self.users.iter_mut().find(|user| user.id == id)
    }

    /// True when `id` may edit: owners always can, plus anyone in the
    /// editor list while in classroom mode (in open mode everyone can).
    #[must_use]
    pub fn can_edit(&self, id: &str) -> bool {
        match self.mode {
            LiveSessionMode::Open => true,
            LiveSessionMode::Classroom => {
                self.owner_ids.iter().any(|owner| owner == id)
                    || self.editor_ids.iter().any(|editor| editor == id)
            }
        }
    }

    /// True when `id` owns the session.
    #[must_use]
    pub fn is_owner(&self, id: &str) -> bool {
        self.owner_ids.iter().any(|owner| owner == id)
    }
}
