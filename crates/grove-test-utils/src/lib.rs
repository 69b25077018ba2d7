//! Utilities shared by Grove tests.
//!
//! - [`FakeCompiler`]: a deterministic stand-in for the Groovy compiler over a tiny line-based
//!   declaration language.
//! - [`FakeResolver`]: scripted classpath resolution.
//! - Fixture helpers for on-disk projects and cursor markers.

mod fake_compiler;
mod fake_resolver;
mod fixtures;

pub use fake_compiler::{FakeCompiler, UNRESOLVED_CLASS_CODE};
pub use fake_resolver::FakeResolver;
pub use fixtures::{extract_caret, test_config, TestProject, CARET};
