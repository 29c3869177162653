//! End-to-end Tyck fixtures (§8.3) for the scenarios that have no
//! coverage elsewhere: overload resolution by positional argument type,
//! deferred integer finalization anchored on a symbol (not a bare
//! literal expression), and a null-coalescing rhs type mismatch.

use gaupel_core::ast::{Arg, ArgKind, ExprKind, Param, StmtKind, TypeNodeKind};
use gaupel_core::config::TyckOptions;
use gaupel_core::diagnostics::{DiagnosticCode, VecDiagnosticBag};
use gaupel_core::resolve::NameResolveResult;
use gaupel_core::source::Span;
use gaupel_core::symbols::SymbolTable;
use gaupel_core::tyck::check_program;
use gaupel_core::types::TypePool;

/// Two `f` declarations taking a single `i32` and a single `i64`
/// parameter respectively, called with one unsuffixed positional integer
/// literal: the literal must resolve against the first declaration tried
/// (§4.3.4's two-stage match finalizes the literal to `i32` on the first
/// successful candidate, so the second candidate can never match it).
#[test]
fn overload_resolves_by_positional_argument_type() {
    let mut ast = gaupel_core::ast::AstArena::new();

    let i32_node = ast.push_type_node(TypeNodeKind::Builtin("i32".into()), Span::DUMMY);
    let i64_node = ast.push_type_node(TypeNodeKind::Builtin("i64".into()), Span::DUMMY);

    let (param_begin_i32, param_count_i32) = ast.push_params(vec![Param {
        name: "x".into(),
        type_node: Some(i32_node),
        is_self: false,
        has_default: false,
        default: None,
        label: None,
        span: Span::DUMMY,
    }]);
    let fn_i32 = ast.push_stmt(
        StmtKind::FnDecl {
            name: "f".into(),
            generic_begin: 0,
            generic_count: 0,
            constraint_begin: 0,
            constraint_count: 0,
            param_begin: param_begin_i32,
            param_count: param_count_i32,
            ret_type: None,
            body: None,
            attrs: vec![],
            is_pure: false,
            is_comptime: false,
        },
        Span::DUMMY,
    );

    let (param_begin_i64, param_count_i64) = ast.push_params(vec![Param {
        name: "x".into(),
        type_node: Some(i64_node),
        is_self: false,
        has_default: false,
        default: None,
        label: None,
        span: Span::DUMMY,
    }]);
    let fn_i64 = ast.push_stmt(
        StmtKind::FnDecl {
            name: "f".into(),
            generic_begin: 0,
            generic_count: 0,
            constraint_begin: 0,
            constraint_count: 0,
            param_begin: param_begin_i64,
            param_count: param_count_i64,
            ret_type: None,
            body: None,
            attrs: vec![],
            is_pure: false,
            is_comptime: false,
        },
        Span::DUMMY,
    );

    let lit = ast.push_expr(ExprKind::IntLiteral { text: "5".into() }, Span::DUMMY);
    let (arg_begin, arg_count) = ast.push_args(vec![Arg {
        kind: ArgKind::Positional,
        label: None,
        expr: Some(lit),
        child_begin: 0,
        child_count: 0,
        span: Span::DUMMY,
    }]);
    let callee = ast.push_expr(ExprKind::Ident("f".into()), Span::DUMMY);
    let call = ast.push_expr(ExprKind::Call { callee, arg_begin, arg_count }, Span::DUMMY);
    let call_stmt = ast.push_stmt(StmtKind::ExprStmt(call), Span::DUMMY);

    let program = ast.push_block(vec![fn_i32, fn_i64, call_stmt], Span::DUMMY);

    let nres = NameResolveResult::new();
    let mut types = TypePool::new();
    let mut sym = SymbolTable::new();
    let mut diags = VecDiagnosticBag::default();

    let result = check_program(&ast, program, &nres, &mut types, &mut sym, &mut diags, TyckOptions::default());

    assert!(result.ok, "expected no diagnostics, got {:?}", diags.diagnostics);
    assert_eq!(result.expr_overload_target[call.index()], fn_i32, "the `i32` overload should win");
    let call_ty = result.expr_types[call.index()];
    assert_eq!(types.to_string(call_ty), "i32");
}

/// A top-level `set x = 1000000;` with no declared type anchors its
/// pending finalization on `x`'s symbol (`pending_int_sym`), not on the
/// literal expression itself (`pending_int_expr`) — the path a bare
/// top-level literal expression exercises instead. Declaring `x` without
/// an explicit type and never constraining it further should still
/// finalize it to the smallest signed integer type the value fits in.
#[test]
fn symbol_bound_pending_integer_finalizes_to_smallest_signed_int() {
    let mut ast = gaupel_core::ast::AstArena::new();

    let init = ast.push_expr(ExprKind::IntLiteral { text: "1000000".into() }, Span::DUMMY);
    let decl = ast.push_stmt(
        StmtKind::GlobalVarDecl { name: "x".into(), is_mut: false, type_node: None, init: Some(init), attrs: vec![] },
        Span::DUMMY,
    );
    let program = ast.push_block(vec![decl], Span::DUMMY);

    let nres = NameResolveResult::new();
    let mut types = TypePool::new();
    let mut sym = SymbolTable::new();
    let mut diags = VecDiagnosticBag::default();

    let result = check_program(&ast, program, &nres, &mut types, &mut sym, &mut diags, TyckOptions::default());

    assert!(result.ok, "expected no diagnostics, got {:?}", diags.diagnostics);
    let sym_id = sym.lookup("x").expect("x should be declared");
    let declared = sym.symbol(sym_id).declared_type;
    assert_eq!(types.to_string(declared), "i32");
}

/// `let a: i32? = null; let b: i64 = a ?? y;` where `y` is a concrete
/// `i64`: the rhs of `??` must assign to the optional's element type
/// (`i32`), not the outer declared type of the `let`, so this should
/// raise `TypeNullCoalesceRhsMismatch` rather than silently widening.
#[test]
fn null_coalesce_rhs_type_mismatch_is_diagnosed() {
    let mut ast = gaupel_core::ast::AstArena::new();

    let i32_node = ast.push_type_node(TypeNodeKind::Builtin("i32".into()), Span::DUMMY);
    let optional_i32_node = ast.push_type_node(TypeNodeKind::Optional(i32_node), Span::DUMMY);
    let i64_node_y = ast.push_type_node(TypeNodeKind::Builtin("i64".into()), Span::DUMMY);
    let i64_node_b = ast.push_type_node(TypeNodeKind::Builtin("i64".into()), Span::DUMMY);

    let zero = ast.push_expr(ExprKind::IntLiteral { text: "0".into() }, Span::DUMMY);
    let decl_y = ast.push_stmt(
        StmtKind::VarDecl { name: "y".into(), is_mut: false, type_node: Some(i64_node_y), init: Some(zero) },
        Span::DUMMY,
    );

    let null_lit = ast.push_expr(ExprKind::NullLiteral, Span::DUMMY);
    let decl_a = ast.push_stmt(
        StmtKind::VarDecl { name: "a".into(), is_mut: false, type_node: Some(optional_i32_node), init: Some(null_lit) },
        Span::DUMMY,
    );

    let a_ref = ast.push_expr(ExprKind::Ident("a".into()), Span::DUMMY);
    let y_ref = ast.push_expr(ExprKind::Ident("y".into()), Span::DUMMY);
    let coalesce = ast.push_expr(ExprKind::NullCoalesce { lhs: a_ref, rhs: y_ref }, Span::DUMMY);
    let decl_b = ast.push_stmt(
        StmtKind::VarDecl { name: "b".into(), is_mut: false, type_node: Some(i64_node_b), init: Some(coalesce) },
        Span::DUMMY,
    );

    let body = ast.push_block(vec![decl_y, decl_a, decl_b], Span::DUMMY);
    let main_fn = ast.push_stmt(
        StmtKind::FnDecl {
            name: "main".into(),
            generic_begin: 0,
            generic_count: 0,
            constraint_begin: 0,
            constraint_count: 0,
            param_begin: 0,
            param_count: 0,
            ret_type: None,
            body: Some(body),
            attrs: vec![],
            is_pure: false,
            is_comptime: false,
        },
        Span::DUMMY,
    );
    let program = ast.push_block(vec![main_fn], Span::DUMMY);

    let nres = NameResolveResult::new();
    let mut types = TypePool::new();
    let mut sym = SymbolTable::new();
    let mut diags = VecDiagnosticBag::default();

    let result = check_program(&ast, program, &nres, &mut types, &mut sym, &mut diags, TyckOptions::default());

    assert!(!result.ok);
    assert!(
        diags.diagnostics.iter().any(|d| d.code == DiagnosticCode::TypeNullCoalesceRhsMismatch),
        "expected a TypeNullCoalesceRhsMismatch diagnostic, got {:?}",
        diags.diagnostics
    );
}
