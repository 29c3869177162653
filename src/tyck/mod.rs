//! Two-pass type checker (§4.3). [`check_program`] is the public entry
//! point; everything else is organized the way the original
//! `typechecker.rs`/`type_check_expr_core.cpp` split its concerns: state,
//! per-feature helper modules, then the two passes themselves.

mod acts;
mod expr;
mod helpers;
mod integer;
mod overload;
mod pass1;
mod state;
mod stmt;
mod typenode;

pub use state::{TyckResult, TypeChecker};

use crate::ast::AstArena;
use crate::config::TyckOptions;
use crate::diagnostics::DiagnosticBag;
use crate::resolve::NameResolveResult;
use crate::symbols::SymbolTable;
use crate::types::TypePool;

/// Runs both passes over `program` (expected to be a `Block` statement,
/// per §7's "top-level policy" diagnostic) and returns the accumulated
/// result. All of `types`/`sym` are mutated in place; `ast`/`nres` are
/// read-only collaborators (§3.7).
#[tracing::instrument(skip_all)]
pub fn check_program(
    ast: &AstArena,
    program: crate::ids::StmtId,
    nres: &NameResolveResult,
    types: &mut TypePool,
    sym: &mut SymbolTable,
    diags: &mut dyn DiagnosticBag,
    opts: TyckOptions,
) -> TyckResult {
    let mut tc = TypeChecker::new(ast, nres, types, sym, diags, opts);
    tc.run_pass1(program);

    let children = tc.ast.block_children(tc.ast.stmt(program)).to_vec();
    for c in children {
        tc.check_stmt(c);
    }

    tc.finalize_pending_integers();
    tracing::debug!(errors = tc.error_count, "check_program finished");
    tc.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprKind, StmtKind};
    use crate::diagnostics::VecDiagnosticBag;
    use crate::resolve::NameResolveResult;
    use crate::source::Span;

    #[test]
    fn empty_program_is_ok() {
        let mut ast = AstArena::new();
        let program = ast.push_block(vec![], Span::DUMMY);
        let nres = NameResolveResult::new();
        let mut types = TypePool::new();
        let mut sym = SymbolTable::new();
        let mut diags = VecDiagnosticBag::default();

        let result = check_program(
            &ast,
            program,
            &nres,
            &mut types,
            &mut sym,
            &mut diags,
            TyckOptions::default(),
        );
        assert!(result.ok);
        assert_eq!(result.errors, 0);
    }

    #[test]
    fn top_level_non_block_is_diagnosed() {
        let mut ast = AstArena::new();
        let program = ast.push_stmt(StmtKind::Continue, Span::DUMMY);
        let nres = NameResolveResult::new();
        let mut types = TypePool::new();
        let mut sym = SymbolTable::new();
        let mut diags = VecDiagnosticBag::default();

        let result = check_program(
            &ast,
            program,
            &nres,
            &mut types,
            &mut sym,
            &mut diags,
            TyckOptions::default(),
        );
        assert!(!result.ok);
    }

    #[test]
    fn unsuffixed_literal_finalizes_to_smallest_signed_int() {
        let mut ast = AstArena::new();
        let lit = ast.push_expr(ExprKind::IntLiteral { text: "1".into() }, Span::DUMMY);
        let stmt = ast.push_stmt(StmtKind::ExprStmt(lit), Span::DUMMY);
        let program = ast.push_block(vec![stmt], Span::DUMMY);
        let nres = NameResolveResult::new();
        let mut types = TypePool::new();
        let mut sym = SymbolTable::new();
        let mut diags = VecDiagnosticBag::default();

        let result = check_program(
            &ast,
            program,
            &nres,
            &mut types,
            &mut sym,
            &mut diags,
            TyckOptions::default(),
        );
        assert!(result.ok);
        let ty = result.expr_types[lit.index()];
        assert!(ty.is_valid());
        assert_eq!(types.to_string(ty), "i8");
    }
}
