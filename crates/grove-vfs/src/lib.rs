//! Virtual file system layer for Grove.
//!
//! Editors own the truth for open documents; everything else comes from disk through a
//! short-lived cache. [`OpenDocumentTracker`] stitches the two together and records which files
//! changed since the last compile.

mod change;
mod document;
mod file_id;
mod fs;
mod tracker;

pub use change::{FileChange, FileChangeKind};
pub use document::{ContentChange, Document, DocumentError};
pub use file_id::FileIdRegistry;
pub use fs::{FileSystem, LocalFs};
pub use tracker::OpenDocumentTracker;
