//! Core shared types for Grove.
//!
//! This crate is intentionally small: identifiers, text positions, diagnostics and path
//! normalization that every other crate speaks.

mod diagnostic;
mod edit;
mod path;
mod text;

pub use diagnostic::{Diagnostic, Severity};
pub use edit::TextEdit;
pub use path::{is_within, normalize_path};
pub use text::{LineIndex, Position, Range, TextRange, TextSize};

/// Stable identifier for a source file known to the workspace.
///
/// Ids are allocated by the VFS registry and never reused for a different path.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct FileId(u32);

impl FileId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn to_raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "file#{}", self.0)
    }
}
