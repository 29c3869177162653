//! Gaupel core compilation pipeline
//!
//! This crate implements the three tightly coupled subsystems that sit
//! between name resolution and code emission:
//!
//! - [`types`]: the type pool, interning builtins, arrays, optionals,
//!   borrows, escapes, pointers, named types and function signatures.
//! - [`symbols`]: the lexically scoped symbol table.
//! - [`tyck`]: the two-pass type checker (deferred integer inference,
//!   overload resolution, acts dispatch, borrow/optional/null rules).
//! - [`sir`]: lowers a resolved AST + [`tyck::TyckResult`] into an
//!   arena-based Structured IR.
//! - [`oir`]: the SSA-form Optimization IR module, its verifier, and the
//!   guarded pass manager.
//!
//! The lexer/parser, name resolver, diagnostic rendering, source manager
//! and code-emission backend are external collaborators; this crate only
//! declares the narrow interfaces it needs from them (see [`ast`],
//! [`diagnostics`], [`source`], [`resolve`]).
//!
//! # Pipeline
//!
//! ```text
//! AstArena + NameResolveResult
//!     -> tyck::TypeChecker::check_program   -> TyckResult
//!     -> sir::build_sir_module              -> sir::Module
//!     -> [external: lower SIR to OIR]
//!     -> oir::pass_manager::run_passes      -> optimized oir::Module
//! ```
//!
//! Each compilation unit owns its own [`types::TypePool`], [`symbols::SymbolTable`]
//! and arenas; nothing here is process-global, and nothing inside the core
//! suspends or spawns work (see the crate-level concurrency note in
//! [`mod@config`]).

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod ids;
pub mod oir;
pub mod resolve;
pub mod sir;
pub mod source;
pub mod symbols;
pub mod tyck;
pub mod types;

pub use diagnostics::{DiagnosticBag, DiagnosticCode, Severity};
pub use oir::Module as OirModule;
pub use sir::Module as SirModule;
pub use symbols::SymbolTable;
pub use tyck::{TyckResult, TypeChecker};
pub use types::TypePool;
