//! Text-operation primitives used on the live wire.
//!
//! An operation is the usual retain/insert/delete component list. The wire
//! format matches the common OT encoding: positive numbers retain, negative
//! numbers delete, strings insert. Applying an operation against a document
//! it was not produced for fails with [`OtError`]; the live layer reacts to
//! that with a full module-state resync rather than operation-level repair.
//! Transforming an operation against concurrent edits is out of scope here
//! and lives with the session server.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// One component of a text operation. Offsets count characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtComponent {
    /// Keep the next `n` characters.
    Retain(usize),
    /// Insert text at the current position.
    Insert(String),
    /// Delete the next `n` characters.
    Delete(usize),
}

impl Serialize for OtComponent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OtComponent::Retain(n) => serializer.serialize_i64(i64::try_from(*n).unwrap_or(i64::MAX)),
            OtComponent::Delete(n) => {
                serializer.serialize_i64(-i64::try_from(*n).unwrap_or(i64::MAX))
            }
            OtComponent::Insert(text) => serializer.serialize_str(text),
        }
    }
}

impl<'de> Deserialize<'de> for OtComponent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Number(i64),
            Text(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Text(text) => Ok(OtComponent::Insert(text)),
            Wire::Number(n) if n > 0 => Ok(OtComponent::Retain(n.unsigned_abs() as usize)),
            Wire::Number(n) if n < 0 => Ok(OtComponent::Delete(n.unsigned_abs() as usize)),
            Wire::Number(_) => Err(serde::de::Error::custom(
                "zero-length operation component",
            )),
        }
    }
}

/// A structured text diff: an ordered list of components.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextOperation {
    /// Components in application order.
    pub components: Vec<OtComponent>,
}

impl TextOperation {
    /// Length of the document this operation applies to, in characters.
    #[must_use]
    pub fn base_len(&self) -> usize {
        self.components
            .iter()
            .map(|component| match component {
                OtComponent::Retain(n) | OtComponent::Delete(n) => *n,
                OtComponent::Insert(_) => 0,
            })
            .sum()
    }

    /// True when the operation changes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.components
            .iter()
            .all(|component| matches!(component, OtComponent::Retain(_)))
    }
}

/// Failure applying an operation: the operation was produced against a
/// different document baseline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtError {
    /// A retain or delete runs past the end of the document.
    #[error("operation runs past the end of the document")]
    PastEnd,
    /// The operation consumed less input than the document holds.
    #[error("operation leaves {0} characters unconsumed")]
    TrailingInput(usize),
}

/// Applies `operation` to `code`, producing the new document content.
pub fn apply(code: &str, operation: &TextOperation) -> Result<String, OtError> {
    let chars: Vec<char> = code.chars().collect();
    let mut output = String::with_capacity(code.len());
    let mut cursor = 0usize;

    for component in &operation.components {
        match component {
            OtComponent::Retain(n) => {
                let end = cursor.checked_add(*n).ok_or(OtError::PastEnd)?;
                if end > chars.len() {
                    return Err(OtError::PastEnd);
                }
                output.extend(&chars[cursor..end]);
                cursor = end;
            }
            OtComponent::Delete(n) => {
                let end = cursor.checked_add(*n).ok_or(OtError::PastEnd)?;
                if end > chars.len() {
                    return Err(OtError::PastEnd);
                }
                cursor = end;
            }
            OtComponent::Insert(text) => output.push_str(text),
        }
    }

    if cursor != chars.len() {
        return Err(OtError::TrailingInput(chars.len() - cursor));
    }

    Ok(output)
}

/// Computes the operation turning `before` into `after` as a single
/// retain/delete/insert/retain sequence around the changed region.
#[must_use]
pub fn diff(before: &str, after: &str) -> TextOperation {
    let old: Vec<char> = before.chars().collect();
    let new: Vec<char> = after.chars().collect();

    let mut prefix = 0;
    while prefix < old.len() && prefix < new.len() && old[prefix] == new[prefix] {
        prefix += 1;
    }

    let mut suffix = 0;
    while suffix < old.len() - prefix
        && suffix < new.len() - prefix
        && old[old.len() - 1 - suffix] == new[new.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let mut components = Vec::new();
    if prefix > 0 {
        components.push(OtComponent::Retain(prefix));
    }
    let deleted = old.len() - prefix - suffix;
    if deleted > 0 {
        components.push(OtComponent::Delete(deleted));
    }
    if new.len() > prefix + suffix {
        components.push(OtComponent::Insert(new[prefix..new.len() - suffix].iter().collect()));
    }
    if suffix > 0 {
        components.push(OtComponent::Retain(suffix));
    }

    TextOperation { components }
}
