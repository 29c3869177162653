//! Checker state (§3.4). Every table here is reset at the start of
//! `check_program`; nothing survives across calls, and nothing is shared
//! across compilation units (§5, §9 "Global state").

use std::collections::HashMap;

use num_bigint::BigInt;

use crate::ast::{AstArena, Op};
use crate::diagnostics::DiagnosticBag;
use crate::ids::{ExprId, StmtId, SymbolId, TypeId};
use crate::resolve::NameResolveResult;
use crate::source::Span;
use crate::symbols::SymbolTable;
use crate::types::TypePool;
use crate::config::TyckOptions;

/// An unresolved `infer-integer` literal, anchored either at the symbol it
/// initializes or at the expression it was parsed from (§3.4, §4.3.3).
#[derive(Debug, Clone)]
pub struct PendingInt {
    pub value: BigInt,
    pub resolved: bool,
    pub resolved_type: TypeId,
}

impl PendingInt {
    pub fn new(value: BigInt) -> Self {
        PendingInt { value, resolved: false, resolved_type: TypeId::INVALID }
    }
}

/// Per-active-loop bookkeeping for `loop-expr` result typing (§3.4, §4.3.7).
#[derive(Debug, Clone, Default)]
pub struct LoopFrame {
    pub may_natural_end: bool,
    pub has_any_break: bool,
    pub has_value_break: bool,
    pub has_null_break: bool,
    pub joined_value_type: TypeId,
}

/// The function currently being checked, if any (§3.4).
#[derive(Debug, Clone, Copy)]
pub struct FnContext {
    pub in_fn: bool,
    pub ret_type: TypeId,
    pub is_pure: bool,
    pub is_comptime: bool,
}

impl Default for FnContext {
    fn default() -> Self {
        FnContext { in_fn: false, ret_type: TypeId::INVALID, is_pure: false, is_comptime: false }
    }
}

/// A lexically scoped `use T with acts(...)` override (§3.4, §4.3.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActsSelection {
    DefaultOnly,
    Named(String),
}

/// Declared field layout metadata, keyed by the field's own named type
/// (§3.4 "Field ABI meta"; consulted by the C-ABI FFI-safety walk in pass 1
/// and by dot-field member lookup in pass 2).
#[derive(Debug, Clone, Copy)]
pub struct FieldAbiMeta {
    pub stmt_id: StmtId,
    pub layout: crate::ast::FieldLayout,
    pub align: u32,
}

/// Which value-context a block-expression was checked under. Only
/// block-expressions are slot-sensitive (§4.3.2, §9): their diagnostics
/// differ when their tail is discarded vs. used as a value, so the cache
/// must be invalidated across a context switch instead of blindly reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Value,
    Discard,
}

/// The result of [`TypeChecker::check_program`] (§4.3.1).
#[derive(Debug, Clone)]
pub struct TyckResult {
    pub ok: bool,
    pub errors: usize,
    pub expr_types: Vec<TypeId>,
    pub expr_overload_target: Vec<StmtId>,
    pub expr_ctor_owner_type: Vec<TypeId>,
    pub fn_qualified_names: HashMap<StmtId, String>,
}

/// Two-pass type checker over one compilation unit's program AST.
///
/// Owns nothing long-lived beyond the call: `types` and `sym` are borrowed
/// from the driver for the duration of `check_program` (§3.7), `ast` and
/// `nres` are read-only collaborators, and every field below this doc
/// comment is scratch state hard-reset by [`TypeChecker::new`].
pub struct TypeChecker<'a> {
    pub(crate) ast: &'a AstArena,
    pub(crate) nres: &'a NameResolveResult,
    pub(crate) types: &'a mut TypePool,
    pub(crate) sym: &'a mut SymbolTable,
    pub(crate) diags: &'a mut dyn DiagnosticBag,
    pub(crate) opts: TyckOptions,

    // expression caches (§3.4)
    pub(crate) expr_types: Vec<TypeId>,
    pub(crate) expr_type_cached_in_value_ctx: Vec<bool>,
    pub(crate) expr_overload_target: Vec<StmtId>,
    pub(crate) expr_ctor_owner_type: Vec<TypeId>,

    // deferred integers (§4.3.3)
    pub(crate) pending_int_sym: HashMap<SymbolId, PendingInt>,
    pub(crate) pending_int_expr: HashMap<ExprId, PendingInt>,

    // control flow (§4.3.7)
    pub(crate) loop_stack: Vec<LoopFrame>,
    pub(crate) fn_ctx: FnContext,

    // acts dispatch (§4.3.5)
    pub(crate) acts_selection_stack: Vec<HashMap<TypeId, ActsSelection>>,
    pub(crate) acts_operator_map: HashMap<(TypeId, Op, bool), Vec<StmtId>>,
    pub(crate) acts_method_map: HashMap<TypeId, HashMap<String, Vec<StmtId>>>,
    /// Maps each acts-member `FnDecl` stmt to the name of the `ActsDecl` set
    /// it was declared under (`None` for the unnamed/default set).
    pub(crate) acts_decl_set_name: HashMap<StmtId, Option<String>>,

    // C-ABI / field layout (pass 1)
    pub(crate) field_abi_meta: HashMap<TypeId, FieldAbiMeta>,

    // namespace / import lexical stacks (pass 1)
    pub(crate) namespace_stack: Vec<String>,
    pub(crate) import_alias_stack: Vec<HashMap<String, String>>,

    // class / proto member sets (pass 1)
    pub(crate) class_member_sets: HashMap<TypeId, Vec<StmtId>>,
    pub(crate) proto_member_sets: HashMap<TypeId, Vec<StmtId>>,

    // overload sets and qualified names (pass 1)
    pub(crate) fn_decl_by_name: HashMap<String, Vec<StmtId>>,
    pub(crate) fn_qualified_names: HashMap<StmtId, String>,
    /// Each `FnDecl` stmt's synthesized `Fn` type, recorded in pass 1 and
    /// consulted by overload candidate construction in pass 2 (§4.3.2, §4.3.4).
    pub(crate) fn_decl_type: HashMap<StmtId, TypeId>,

    pub(crate) ok: bool,
    pub(crate) error_count: usize,
}

impl<'a> TypeChecker<'a> {
    pub fn new(
        ast: &'a AstArena,
        nres: &'a NameResolveResult,
        types: &'a mut TypePool,
        sym: &'a mut SymbolTable,
        diags: &'a mut dyn DiagnosticBag,
        opts: TyckOptions,
    ) -> Self {
        let expr_count = ast.expr_count();
        TypeChecker {
            ast,
            nres,
            types,
            sym,
            diags,
            opts,
            expr_types: vec![TypeId::INVALID; expr_count],
            expr_type_cached_in_value_ctx: vec![false; expr_count],
            expr_overload_target: vec![StmtId::INVALID; expr_count],
            expr_ctor_owner_type: vec![TypeId::INVALID; expr_count],
            pending_int_sym: HashMap::new(),
            pending_int_expr: HashMap::new(),
            loop_stack: Vec::new(),
            fn_ctx: FnContext::default(),
            acts_selection_stack: vec![HashMap::new()],
            acts_operator_map: HashMap::new(),
            acts_method_map: HashMap::new(),
            acts_decl_set_name: HashMap::new(),
            field_abi_meta: HashMap::new(),
            namespace_stack: Vec::new(),
            import_alias_stack: vec![HashMap::new()],
            class_member_sets: HashMap::new(),
            proto_member_sets: HashMap::new(),
            fn_decl_by_name: HashMap::new(),
            fn_qualified_names: HashMap::new(),
            fn_decl_type: HashMap::new(),
            ok: true,
            error_count: 0,
        }
    }

    /// Builds the current namespace-qualified form of `name`, e.g. under
    /// `nest a::b`, `qualify("f")` is `"a::b::f"` (§4.3.2 pass 1).
    pub(crate) fn qualify(&self, name: &str) -> String {
        if self.namespace_stack.is_empty() {
            name.to_string()
        } else {
            format!("{}::{}", self.namespace_stack.join("::"), name)
        }
    }

    pub(crate) fn err(&mut self, code: crate::diagnostics::DiagnosticCode, span: Span, args: Vec<String>) {
        self.ok = false;
        self.error_count += 1;
        self.diags.push(crate::diagnostics::Diagnostic::error(code, span, args));
    }

    pub(crate) fn set_expr_type(&mut self, e: ExprId, ty: TypeId) {
        self.expr_types[e.index()] = ty;
    }

    pub(crate) fn expr_type(&self, e: ExprId) -> TypeId {
        self.expr_types[e.index()]
    }

    pub(crate) fn set_overload_target(&mut self, e: ExprId, target: StmtId) {
        self.expr_overload_target[e.index()] = target;
    }

    pub(crate) fn set_ctor_owner(&mut self, e: ExprId, owner: TypeId) {
        self.expr_ctor_owner_type[e.index()] = owner;
    }

    pub(crate) fn current_acts_selection(&self, owner: TypeId) -> Option<&ActsSelection> {
        self.acts_selection_stack.iter().rev().find_map(|scope| scope.get(&owner))
    }

    pub(crate) fn into_result(self) -> TyckResult {
        TyckResult {
            ok: self.ok,
            errors: self.error_count,
            expr_types: self.expr_types,
            expr_overload_target: self.expr_overload_target,
            expr_ctor_owner_type: self.expr_ctor_owner_type,
            fn_qualified_names: self.fn_qualified_names,
        }
    }
}
