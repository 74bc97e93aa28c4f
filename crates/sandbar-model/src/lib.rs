//! `sandbar-model` - In-memory sandbox state for the Sandbar editor core.
//!
//! This crate owns the data side of the editor: the sandbox aggregate with
//! its modules and directories, path derivation over the directory tree,
//! the path-indexed projection consumed by the editor surface, and the
//! text-operation primitives that travel on the live wire.
//!
//! # Architecture
//!
//! Entities are looked up through stable keys ([`ShortId`]) rather than
//! held references; "mutate in place" is "update the store entry behind
//! the key", which keeps every holder of a key valid across optimistic-id
//! replacement and server reconciliation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod ot;
pub mod path;
pub mod projection;
pub mod sandbox;
pub mod types;

pub use ot::{apply as apply_operation, diff as text_diff, OtComponent, OtError, TextOperation};
pub use path::PathError;
pub use projection::{FileProjection, ProjectionEntry};
pub use sandbox::{SandboxModel, SyncKind, SyncOp, SyncUpdate};
pub use types::{
    Authorization, Directory, EntityId, Module, ModuleCorrection, ModuleError, Sandbox, SandboxId,
    Severity, ShortId, Tab, UserSelection,
};
