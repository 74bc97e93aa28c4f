//! Core entity records for the sandbox model.
//!
//! Everything here is a plain data record that crosses the persistence API
//! or the live wire, so all types carry serde derives.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Identifier of a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SandboxId(SmolStr);

/// Server-assigned identifier of a module or directory.
///
/// Replaced in place when a server confirmation lands on an optimistically
/// created entity; never use it as a cross-session reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(SmolStr);

/// Stable short identifier of a module or directory.
///
/// This is the reference key used by tabs, the live protocol and the
/// path projection. It survives optimistic-id replacement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortId(SmolStr);

macro_rules! id_impls {
    ($name:ident) => {
        impl $name {
            /// Creates an identifier from anything string-like.
            pub fn new(value: impl Into<SmolStr>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.0.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

id_impls!(SandboxId);
id_impls!(EntityId);
id_impls!(ShortId);

/// Access level a user holds on a sandbox.
///
/// Levels are ordered; a capability check passes when the held level is at
/// least the required one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Authorization {
    /// Read-only access.
    #[default]
    Read,
    /// May comment but not edit.
    Comment,
    /// May edit code.
    WriteCode,
    /// May edit code and project settings.
    WriteProject,
    /// Full control.
    Owner,
}

impl Authorization {
    /// Returns true if this level grants the `required` capability.
    #[must_use]
    pub fn grants(self, required: Authorization) -> bool {
        self >= required
    }
}

/// A compiler/runtime error attached to a module by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleError {
    /// Path of the module the error belongs to.
    pub path: String,
    /// Human-readable message.
    pub message: String,
    /// One-based line.
    pub line: u32,
    /// One-based column.
    pub column: u32,
    /// Error severity.
    #[serde(default)]
    pub severity: Severity,
}

/// A quick-fix style correction attached to a module by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleCorrection {
    /// Path of the module the correction belongs to.
    pub path: String,
    /// Human-readable message.
    pub message: String,
    /// One-based line.
    pub line: u32,
    /// One-based column.
    pub column: u32,
    /// Tool that produced the correction, if known.
    #[serde(default)]
    pub source: Option<String>,
    /// Correction severity.
    #[serde(default)]
    pub severity: Severity,
}

/// Severity of an error or correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocking problem.
    #[default]
    Error,
    /// Non-blocking problem.
    Warning,
    /// Informational hint.
    Notice,
}

/// A single file in a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Server-assigned identifier.
    pub id: EntityId,
    /// Stable reference key.
    pub shortid: ShortId,
    /// File name without its directory.
    pub title: SmolStr,
    /// Parent directory, `None` for the sandbox root.
    #[serde(default)]
    pub directory_shortid: Option<ShortId>,
    /// Current content.
    #[serde(default)]
    pub code: String,
    /// Last-saved server baseline when local edits diverge from it.
    ///
    /// `None` means the module is synced: `code` equals the last state the
    /// server confirmed.
    #[serde(default)]
    pub saved_code: Option<String>,
    /// True for binary assets (content is a URL, not source text).
    #[serde(default)]
    pub is_binary: bool,
    /// Server-side creation timestamp.
    #[serde(default)]
    pub inserted_at: Option<String>,
    /// Server-side update timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Errors currently attached to this module.
    #[serde(default)]
    pub errors: Vec<ModuleError>,
    /// Corrections currently attached to this module.
    #[serde(default)]
    pub corrections: Vec<ModuleCorrection>,
}

impl Module {
    /// Returns true when no unsaved diff exists against the server baseline.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.saved_code.is_none()
    }
}

/// A directory in a sandbox. Directories form a tree via parent links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    /// Server-assigned identifier.
    pub id: EntityId,
    /// Stable reference key.
    pub shortid: ShortId,
    /// Directory name.
    pub title: SmolStr,
    /// Parent directory, `None` for the sandbox root.
    #[serde(default)]
    pub directory_shortid: Option<ShortId>,
}

/// The root aggregate: a project workspace as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sandbox {
    /// Sandbox identifier.
    pub id: SandboxId,
    /// Server-side version counter.
    #[serde(default)]
    pub version: u64,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// URL alias, if one is assigned.
    #[serde(default)]
    pub alias: Option<SmolStr>,
    /// Environment identifier (decides the default entry file).
    pub template: SmolStr,
    /// All files.
    #[serde(default)]
    pub modules: Vec<Module>,
    /// All directories.
    #[serde(default)]
    pub directories: Vec<Directory>,
    /// Environment variables, insertion-ordered.
    #[serde(default)]
    pub environment_variables: IndexMap<SmolStr, String>,
    /// External resources (script/style URLs) injected into the preview.
    #[serde(default)]
    pub external_resources: Vec<String>,
    /// Frozen sandboxes refuse edits until explicitly overridden.
    #[serde(default)]
    pub is_frozen: bool,
    /// True when the current user owns this sandbox.
    #[serde(default)]
    pub owned: bool,
    /// Access level of the current user.
    #[serde(default)]
    pub authorization: Authorization,
    /// Number of likes.
    #[serde(default)]
    pub like_count: i64,
    /// Whether the current user liked this sandbox.
    #[serde(default)]
    pub user_liked: bool,
    /// Live room this sandbox is attached to, if any.
    #[serde(default)]
    pub room_id: Option<SmolStr>,
}

/// An open editor tab referencing a module by its stable key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    /// Module shown in this tab.
    pub module_shortid: ShortId,
    /// Dirty tabs are preview tabs: reused by the next open.
    pub dirty: bool,
}

/// A collaborator's cursor and selection inside one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserSelection {
    /// Cursor offset in characters.
    pub cursor_position: u64,
    /// Flattened selection ranges as `[start, end, start, end, ..]` offsets.
    #[serde(default)]
    pub selection: Vec<u64>,
}
