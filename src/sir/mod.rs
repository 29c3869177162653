//! The Structured IR (§3.5): an arena of lowered values/statements/blocks,
//! still shaped like the surface language (`if`, `while`, `switch`, nested
//! blocks) rather than a control-flow graph. [`build_sir_module`] is the
//! sole entry point; everything else here is the data model it populates.

mod build;
mod effect;
mod lower;

pub use build::build_sir_module;
pub use effect::{EffectClass, PlaceClass};

use std::collections::HashMap;

use crate::ast::Op;
use crate::ids::{
    SirActId, SirArgId, SirAttrId, SirBlockId, SirFieldId, SirFieldMemberId, SirFuncId,
    SirGlobalId, SirParamId, SirStmtId, SirSwitchCaseId, SirValueId, StmtId, SymbolId, TypeId,
};
use crate::source::Span;

/// One lowered expression (§3.5). Every AST expression produces exactly one
/// [`Value`]; the sprawling field list mirrors the original's single
/// variant-per-op-code `value` record rather than a Rust enum per kind, so
/// that downstream OIR lowering can match on `kind` without re-threading an
/// enum-of-structs payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    IntLiteral,
    FloatLiteral,
    BoolLiteral,
    StringLiteral,
    NullLiteral,
    Local,
    Unary,
    Binary,
    Assign,
    PostfixInc,
    Borrow,
    Escape,
    If,
    Block,
    Loop,
    Call,
    ArrayLit,
    FieldInit,
    Index,
    Field,
    Cast,
    NullCoalesce,
    NullCoalesceAssign,
    Error,
}

#[derive(Debug, Clone)]
pub struct Value {
    pub kind: ValueKind,
    pub ty: TypeId,
    pub place_class: PlaceClass,
    pub effect_class: EffectClass,
    pub span: Span,
    pub op: Option<Op>,
    pub text: String,
    pub sym: Option<SymbolId>,
    /// For a `Local` read/write, the symbol the *name* originally bound to
    /// before any shadowing; same as `sym` except where the builder is
    /// threading a synthesized temporary (§4.4.2).
    pub origin_sym: Option<SymbolId>,
    pub cast_to: TypeId,
    pub borrow_is_mut: bool,
    pub callee_sym: Option<SymbolId>,
    pub callee_decl_stmt: StmtId,
    /// Set only for an indirect call (callee has no resolved overload
    /// target): the lowered value of the callee expression itself.
    pub callee_value: Option<SirValueId>,
    pub ctor_owner_type: TypeId,
    pub call_is_ctor: bool,
    pub a: SirValueId,
    pub b: SirValueId,
    pub c: SirValueId,
    pub arg_begin: u32,
    pub arg_count: u32,
    /// `If`/`Loop`/`BlockExpr` nest a statement-shaped body; these don't fit
    /// the generic `a`/`b`/`c` value-child slots since a block is a
    /// statement range, not a value (§3.5, §4.4.2).
    pub then_block: Option<SirBlockId>,
    pub else_block: Option<SirBlockId>,
    pub body_block: Option<SirBlockId>,
    /// The trailing expression-statement value a `BlockExpr`'s body ends
    /// with, if any (§4.3.7).
    pub tail_value: Option<SirValueId>,
}

impl Value {
    fn new(kind: ValueKind, ty: TypeId, span: Span) -> Self {
        Value {
            kind,
            ty,
            place_class: PlaceClass::NotPlace,
            effect_class: EffectClass::Pure,
            span,
            op: None,
            text: String::new(),
            sym: None,
            origin_sym: None,
            cast_to: TypeId::INVALID,
            borrow_is_mut: false,
            callee_sym: None,
            callee_decl_stmt: StmtId::INVALID,
            callee_value: None,
            ctor_owner_type: TypeId::INVALID,
            call_is_ctor: false,
            a: SirValueId::INVALID,
            b: SirValueId::INVALID,
            c: SirValueId::INVALID,
            arg_begin: 0,
            arg_count: 0,
            then_block: None,
            else_block: None,
            body_block: None,
            tail_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    ExprStmt(SirValueId),
    VarDecl { sym: SymbolId, init: Option<SirValueId> },
    If { cond: SirValueId, then_block: SirBlockId, else_block: Option<SirBlockId> },
    While { cond: SirValueId, body: SirBlockId },
    DoScope { body: SirBlockId },
    DoWhile { body: SirBlockId, cond: SirValueId },
    Manual { body: SirBlockId },
    Return(Option<SirValueId>),
    Break(Option<SirValueId>),
    Continue,
    Block(SirBlockId),
    Switch { scrutinee: SirValueId, case_begin: u32, case_count: u32 },
    Commit(SirValueId),
    Recast { operand: SirValueId, target: TypeId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchCase {
    pub pattern: Option<SirValueId>,
    pub body: SirBlockId,
    pub span: Span,
}

/// A contiguous slice into the stmt arena (§3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub stmt_begin: u32,
    pub stmt_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub sym: SymbolId,
    pub name: String,
    pub ty: TypeId,
    pub is_self: bool,
    pub label: Option<String>,
    pub has_default: bool,
    pub default: Option<SirValueId>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Positional,
    Labeled,
    NamedGroup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub kind: ArgKind,
    pub label: Option<String>,
    pub value: Option<SirValueId>,
    pub child_begin: u32,
    pub child_count: u32,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Func {
    pub name: String,
    pub qualified_name: String,
    pub param_begin: u32,
    pub param_count: u32,
    pub attr_begin: u32,
    pub attr_count: u32,
    pub ret_type: TypeId,
    pub entry_block: Option<SirBlockId>,
    pub is_pure: bool,
    pub is_comptime: bool,
    /// Rolled up from every value in the body (§4.4.2, §9(a)).
    pub has_any_write: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMember {
    pub name: String,
    pub ty: TypeId,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub qualified_name: String,
    pub member_begin: u32,
    pub member_count: u32,
    pub attr_begin: u32,
    pub attr_count: u32,
    pub layout: crate::ast::FieldLayout,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub name: String,
    pub qualified_name: String,
    pub ty: TypeId,
    pub is_mut: bool,
    pub attr_begin: u32,
    pub attr_count: u32,
    pub init: Option<SirValueId>,
    pub span: Span,
}

/// One `acts for T [name] { ... }` block, its members already lowered into
/// the `Func` arena (§3.5, §4.3.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Act {
    pub target_type: TypeId,
    pub name: Option<String>,
    pub member_begin: u32,
    pub member_count: u32,
    pub span: Span,
}

/// The arena-of-arenas a compilation unit's lowered program (§3.5). Built
/// once by [`build_sir_module`] and handed, read-only, to an external SIR
/// -> OIR lowering stage.
#[derive(Debug, Default)]
pub struct Module {
    values: Vec<Value>,
    stmts: Vec<Stmt>,
    blocks: Vec<Block>,
    funcs: Vec<Func>,
    fields: Vec<Field>,
    field_members: Vec<FieldMember>,
    params: Vec<Param>,
    attrs: Vec<Attr>,
    args: Vec<Arg>,
    globals: Vec<Global>,
    acts: Vec<Act>,
    switch_cases: Vec<SwitchCase>,

    stmt_children: Vec<SirStmtId>,
    func_children: Vec<SirFuncId>,

    pub top_level_funcs: Vec<SirFuncId>,
    pub top_level_fields: Vec<SirFieldId>,
    pub top_level_globals: Vec<SirGlobalId>,
    pub top_level_acts: Vec<SirActId>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- accessors ---------------------------------------------------

    pub fn value(&self, id: SirValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn stmt(&self, id: SirStmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn block(&self, id: SirBlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn func(&self, id: SirFuncId) -> &Func {
        &self.funcs[id.index()]
    }

    pub fn field(&self, id: SirFieldId) -> &Field {
        &self.fields[id.index()]
    }

    pub fn field_member(&self, id: SirFieldMemberId) -> &FieldMember {
        &self.field_members[id.index()]
    }

    pub fn param(&self, id: SirParamId) -> &Param {
        &self.params[id.index()]
    }

    pub fn attr(&self, id: SirAttrId) -> &Attr {
        &self.attrs[id.index()]
    }

    pub fn arg(&self, id: SirArgId) -> &Arg {
        &self.args[id.index()]
    }

    pub fn global(&self, id: SirGlobalId) -> &Global {
        &self.globals[id.index()]
    }

    pub fn act(&self, id: SirActId) -> &Act {
        &self.acts[id.index()]
    }

    pub fn switch_case(&self, id: SirSwitchCaseId) -> &SwitchCase {
        &self.switch_cases[id.index()]
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// The statements directly nested under `block`, by id.
    pub fn block_children(&self, block: SirBlockId) -> Vec<SirStmtId> {
        let b = self.block(block);
        self.stmt_children[b.stmt_begin as usize..(b.stmt_begin + b.stmt_count) as usize].to_vec()
    }

    pub fn func_params(&self, f: &Func) -> &[Param] {
        &self.params[f.param_begin as usize..(f.param_begin + f.param_count) as usize]
    }

    pub fn func_attrs(&self, f: &Func) -> &[Attr] {
        &self.attrs[f.attr_begin as usize..(f.attr_begin + f.attr_count) as usize]
    }

    pub fn field_members_of(&self, f: &Field) -> &[FieldMember] {
        &self.field_members[f.member_begin as usize..(f.member_begin + f.member_count) as usize]
    }

    pub fn field_attrs(&self, f: &Field) -> &[Attr] {
        &self.attrs[f.attr_begin as usize..(f.attr_begin + f.attr_count) as usize]
    }

    pub fn act_members(&self, a: &Act) -> Vec<SirFuncId> {
        self.func_children[a.member_begin as usize..(a.member_begin + a.member_count) as usize]
            .to_vec()
    }

    pub fn call_args(&self, v: &Value) -> &[Arg] {
        &self.args[v.arg_begin as usize..(v.arg_begin + v.arg_count) as usize]
    }

    pub fn named_group_children(&self, arg: &Arg) -> &[Arg] {
        debug_assert!(matches!(arg.kind, ArgKind::NamedGroup));
        &self.args[arg.child_begin as usize..(arg.child_begin + arg.child_count) as usize]
    }

    pub fn switch_cases_of(&self, begin: u32, count: u32) -> &[SwitchCase] {
        &self.switch_cases[begin as usize..(begin + count) as usize]
    }

    // ---- builders (used only by this module's own `build`/`lower`) ----

    pub(crate) fn push_value(&mut self, v: Value) -> SirValueId {
        let id = SirValueId::from_index(self.values.len());
        self.values.push(v);
        id
    }

    pub(crate) fn push_stmt(&mut self, kind: StmtKind, span: Span) -> SirStmtId {
        let id = SirStmtId::from_index(self.stmts.len());
        self.stmts.push(Stmt { kind, span });
        id
    }

    pub(crate) fn push_stmt_children(&mut self, ids: Vec<SirStmtId>) -> (u32, u32) {
        let begin = self.stmt_children.len() as u32;
        let n = ids.len() as u32;
        self.stmt_children.extend(ids);
        (begin, n)
    }

    pub(crate) fn push_block(&mut self, children: Vec<SirStmtId>) -> SirBlockId {
        let (stmt_begin, stmt_count) = self.push_stmt_children(children);
        let id = SirBlockId::from_index(self.blocks.len());
        self.blocks.push(Block { stmt_begin, stmt_count });
        id
    }

    pub(crate) fn push_func_children(&mut self, ids: Vec<SirFuncId>) -> (u32, u32) {
        let begin = self.func_children.len() as u32;
        let n = ids.len() as u32;
        self.func_children.extend(ids);
        (begin, n)
    }

    pub(crate) fn push_func(&mut self, f: Func) -> SirFuncId {
        let id = SirFuncId::from_index(self.funcs.len());
        self.funcs.push(f);
        id
    }

    pub(crate) fn push_field(&mut self, f: Field) -> SirFieldId {
        let id = SirFieldId::from_index(self.fields.len());
        self.fields.push(f);
        id
    }

    pub(crate) fn push_field_members(&mut self, members: Vec<FieldMember>) -> (u32, u32) {
        let begin = self.field_members.len() as u32;
        let n = members.len() as u32;
        self.field_members.extend(members);
        (begin, n)
    }

    pub(crate) fn push_params(&mut self, params: Vec<Param>) -> (u32, u32) {
        let begin = self.params.len() as u32;
        let n = params.len() as u32;
        self.params.extend(params);
        (begin, n)
    }

    pub(crate) fn push_attrs(&mut self, attrs: Vec<Attr>) -> (u32, u32) {
        let begin = self.attrs.len() as u32;
        let n = attrs.len() as u32;
        self.attrs.extend(attrs);
        (begin, n)
    }

    pub(crate) fn push_args(&mut self, args: Vec<Arg>) -> (u32, u32) {
        let begin = self.args.len() as u32;
        let n = args.len() as u32;
        self.args.extend(args);
        (begin, n)
    }

    pub(crate) fn push_global(&mut self, g: Global) -> SirGlobalId {
        let id = SirGlobalId::from_index(self.globals.len());
        self.globals.push(g);
        id
    }

    pub(crate) fn push_act(&mut self, a: Act) -> SirActId {
        let id = SirActId::from_index(self.acts.len());
        self.acts.push(a);
        id
    }

    pub(crate) fn push_switch_cases(&mut self, cases: Vec<SwitchCase>) -> (u32, u32) {
        let begin = self.switch_cases.len() as u32;
        let n = cases.len() as u32;
        self.switch_cases.extend(cases);
        (begin, n)
    }
}

/// Per-type-node interning cache the builder keeps while re-resolving
/// syntactic type annotations (§4.4.1: the builder is a pure function of
/// its inputs, but `TypePool` interning is still `&mut`, same contract as
/// `tyck::check_program`).
pub(crate) type TypeNodeCache = HashMap<crate::ids::TypeNodeId, TypeId>;
