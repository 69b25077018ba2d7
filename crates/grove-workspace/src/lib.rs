//! Compilation state management for Grove workspaces.
//!
//! A [`Workspace`] owns one [`ProjectScope`] per build-tool project. Each scope keeps a
//! compilation unit, an AST index and a file dependency graph, and brings them up to date on
//! demand: small edits recompile a handful of files in isolation, everything else recompiles
//! the project. The language's compiler is plugged in through the [`Compiler`] trait.

mod ast;
mod compiler;
mod events;
mod orchestrator;
mod pool;
mod scope;
mod signature;
mod unit;
mod workspace;

pub use ast::{AstIndex, AstSymbol, FileAst, SymbolKind};
pub use compiler::{
    CompileEnvironment, CompileError, CompileOutput, Compiler, SourceFile, SourceSet,
};
pub use events::WorkspaceEvent;
pub use orchestrator::{CompileContext, CompileOutcome, CompileReport, FullCompileReason};
pub use scope::{ProjectScope, ScopeState};
pub use signature::{
    modifiers, signature_drift, ClassSignature, FieldSignature, MethodSignature, SignatureDrift,
};
pub use unit::{CompilationUnit, UnitUpdate};
pub use workspace::Workspace;
