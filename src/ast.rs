//! The read-only AST data model consumed from the front end (§6.1).
//!
//! The lexer, parser and name resolver are external collaborators (§1);
//! this module only declares the stable schema those components hand to
//! the core. [`AstArena`] is an arena of flat, index-addressed tables —
//! statements, expressions, syntactic type nodes, parameters, etc — built
//! once by the parser and never mutated by Tyck, the SIR builder or the
//! OIR passes. A small builder API (`AstArena::push_*`) is provided so the
//! core's own tests can construct fixtures without a real parser.

use crate::ids::{ExprId, StmtId, SymbolId, TypeNodeId};
use crate::source::Span;

/// Operator tokens shared by unary, binary and postfix expressions. This is
/// a minimal lexical alphabet, not a full token kind enum (lexing is out of
/// scope, §1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Plus,
    Not,
    BitNot,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Inc,
    Dec,
    /// `..` range operator (used to detect slice-view index expressions).
    DotDot,
    /// `..:` inclusive range operator.
    DotDotColon,
}

/// `e as T` / `e as? T` / `e as! T` (§4.3.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    Strict,
    Optional,
    Forced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    IntLiteral { text: String },
    FloatLiteral { text: String },
    BoolLiteral(bool),
    StringLiteral(String),
    NullLiteral,
    /// A bare identifier; name resolution binds it via [`crate::resolve::NameResolveResult`].
    Ident(String),
    /// A qualified path `a::b::c`, segments in `path_segs()[path_begin..path_begin+path_count]`.
    Path { path_begin: u32, path_count: u32 },
    Unary { op: Op, operand: ExprId },
    Binary { op: Op, lhs: ExprId, rhs: ExprId },
    Assign { lhs: ExprId, rhs: ExprId },
    PostfixInc { op: Op, operand: ExprId },
    Borrow { is_mut: bool, operand: ExprId },
    /// `&&x`, the escape-move operator (§4.3.6, glossary).
    Escape { operand: ExprId },
    If { cond: ExprId, then_block: StmtId, else_block: Option<StmtId> },
    /// Wraps a `Block` statement as a value-producing expression (§4.3.7).
    BlockExpr { block: StmtId },
    Loop { body: StmtId },
    Call { callee: ExprId, arg_begin: u32, arg_count: u32 },
    ArrayLit { elem_begin: u32, elem_count: u32 },
    /// Struct/record literal: `Type { name: expr, ... }`.
    FieldInit { type_node: Option<TypeNodeId>, entry_begin: u32, entry_count: u32 },
    Index { base: ExprId, index: ExprId },
    Field { base: ExprId, name: String },
    Cast { kind: CastKind, operand: Option<ExprId>, target: Option<TypeNodeId> },
    NullCoalesce { lhs: ExprId, rhs: ExprId },
    NullCoalesceAssign { lhs: ExprId, rhs: ExprId },
    /// A syntactically malformed region the parser still produced a node for.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// How a call argument was written at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Positional,
    Labeled,
    /// Trailing `{ label: value, ... }` block; its entries are the flat
    /// `child_begin/child_count` slice of this same arg arena (§3.5: "named-group
    /// children inline into a flat arg stream").
    NamedGroup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub kind: ArgKind,
    pub label: Option<String>,
    /// Present for `Positional`/`Labeled`; absent for `NamedGroup` (which
    /// instead owns a child range).
    pub expr: Option<ExprId>,
    pub child_begin: u32,
    pub child_count: u32,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInitEntry {
    pub name: String,
    pub expr: ExprId,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCase {
    pub pattern: Option<ExprId>,
    pub body: StmtId,
    pub span: Span,
}

/// A function/method parameter. `is_self` marks the receiver parameter
/// acts-method bodies declare explicitly (§4.3.5); the SIR builder injects
/// the actual receiver argument at this parameter's declared index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub type_node: Option<TypeNodeId>,
    pub is_self: bool,
    pub has_default: bool,
    pub default: Option<ExprId>,
    pub label: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMember {
    pub name: String,
    pub type_node: TypeNodeId,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParamDecl {
    pub name: String,
    pub bound: Option<TypeNodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintDecl {
    pub subject: TypeNodeId,
    pub bound: TypeNodeId,
}

/// Field layout declared via a C-ABI attribute; see §4.3.2 pass 1's
/// FFI-safety walk and §3.4 "Field ABI meta".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLayout {
    Default,
    C,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    ExprStmt(ExprId),
    VarDecl {
        name: String,
        is_mut: bool,
        type_node: Option<TypeNodeId>,
        init: Option<ExprId>,
    },
    If {
        cond: ExprId,
        then_block: StmtId,
        else_block: Option<StmtId>,
    },
    While {
        cond: ExprId,
        body: StmtId,
    },
    /// A bare `do { ... }` scope with no looping or condition.
    DoScope {
        body: StmtId,
    },
    DoWhile {
        body: StmtId,
        cond: ExprId,
    },
    /// An explicit manual-lifetime scope (`manual { ... }`); lowered like a
    /// scope but flagged for the downstream borrow/capability pass.
    Manual {
        body: StmtId,
    },
    Return(Option<ExprId>),
    Break(Option<ExprId>),
    Continue,
    Block {
        stmt_begin: u32,
        stmt_count: u32,
    },
    Switch {
        scrutinee: ExprId,
        case_begin: u32,
        case_count: u32,
    },
    /// Commits a pending manual-resource transaction; opaque to Tyck/SIR
    /// beyond its operand.
    Commit(ExprId),
    /// Statement-level reinterpretation, lowered like a cast but at
    /// statement granularity.
    Recast { operand: ExprId, target: TypeNodeId },
    FnDecl {
        name: String,
        generic_begin: u32,
        generic_count: u32,
        constraint_begin: u32,
        constraint_count: u32,
        param_begin: u32,
        param_count: u32,
        ret_type: Option<TypeNodeId>,
        body: Option<StmtId>,
        attrs: Vec<String>,
        is_pure: bool,
        is_comptime: bool,
    },
    FieldDecl {
        name: String,
        member_begin: u32,
        member_count: u32,
        layout: FieldLayout,
        attrs: Vec<String>,
    },
    /// `acts for T [name] { fn ... }` / operator declarations; `member_begin`
    /// indexes into `stmt_children()` for the member `FnDecl`s.
    ActsDecl {
        target_type: TypeNodeId,
        name: Option<String>,
        member_begin: u32,
        member_count: u32,
    },
    ClassDecl {
        name: String,
        member_begin: u32,
        member_count: u32,
        proto_begin: u32,
        proto_count: u32,
    },
    ProtoDecl {
        name: String,
        member_begin: u32,
        member_count: u32,
    },
    GlobalVarDecl {
        name: String,
        is_mut: bool,
        type_node: Option<TypeNodeId>,
        init: Option<ExprId>,
        attrs: Vec<String>,
    },
    /// `nest a::b { ... }` (block form) or a file-level `nest a::b;`
    /// directive (`body = None`, extends to the rest of the file) (§4.3.2).
    Nest {
        path_segs: Vec<String>,
        body: Option<StmtId>,
    },
    /// `use T with acts(Name)` lexical scoping directive (§3.4, §4.3.5).
    UseActsSelection {
        target_type: TypeNodeId,
        selected: Option<String>,
        body: StmtId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeNodeKind {
    Builtin(String),
    Named { path_begin: u32, path_count: u32 },
    Optional(TypeNodeId),
    Array { elem: TypeNodeId, size: Option<u64> },
    Ptr { pointee: TypeNodeId, is_mut: bool },
    Borrow { pointee: TypeNodeId, is_mut: bool },
    Escape { pointee: TypeNodeId },
    Fn {
        param_begin: u32,
        param_count: u32,
        positional_count: u32,
        labels: Vec<String>,
        ret: TypeNodeId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNode {
    pub kind: TypeNodeKind,
    pub span: Span,
}

/// The arena the parser hands to Tyck/SIR: flat, index-addressed tables for
/// every node kind, plus the "spine" tables (`stmt_children`, `path_segs`,
/// ...) that back range-valued fields on the node structs (§6.1).
#[derive(Debug, Default)]
pub struct AstArena {
    stmts: Vec<Stmt>,
    exprs: Vec<Expr>,
    type_nodes: Vec<TypeNode>,
    params: Vec<Param>,
    field_members: Vec<FieldMember>,
    args: Vec<Arg>,
    stmt_children: Vec<StmtId>,
    expr_lists: Vec<ExprId>,
    path_segs: Vec<String>,
    path_refs: Vec<Option<SymbolId>>,
    switch_cases: Vec<SwitchCase>,
    field_init_entries: Vec<FieldInitEntry>,
    fn_constraint_decls: Vec<ConstraintDecl>,
    generic_param_decls: Vec<GenericParamDecl>,
}

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- accessors (§6.1) -------------------------------------------------

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn type_node(&self, id: TypeNodeId) -> &TypeNode {
        &self.type_nodes[id.index()]
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn field_members(&self) -> &[FieldMember] {
        &self.field_members
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn stmt_children(&self) -> &[StmtId] {
        &self.stmt_children
    }

    pub fn expr_lists(&self) -> &[ExprId] {
        &self.expr_lists
    }

    pub fn path_segs(&self) -> &[String] {
        &self.path_segs
    }

    pub fn path_refs(&self) -> &[Option<SymbolId>] {
        &self.path_refs
    }

    pub fn switch_cases(&self) -> &[SwitchCase] {
        &self.switch_cases
    }

    pub fn field_init_entries(&self) -> &[FieldInitEntry] {
        &self.field_init_entries
    }

    pub fn fn_constraint_decls(&self) -> &[ConstraintDecl] {
        &self.fn_constraint_decls
    }

    pub fn generic_param_decls(&self) -> &[GenericParamDecl] {
        &self.generic_param_decls
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }

    /// The statement ids directly nested under a `Block` statement.
    pub fn block_children(&self, block: &Stmt) -> &[StmtId] {
        match &block.kind {
            StmtKind::Block { stmt_begin, stmt_count } => {
                &self.stmt_children[*stmt_begin as usize..(*stmt_begin + *stmt_count) as usize]
            }
            _ => &[],
        }
    }

    pub fn call_args(&self, arg_begin: u32, arg_count: u32) -> &[Arg] {
        &self.args[arg_begin as usize..(arg_begin + arg_count) as usize]
    }

    pub fn named_group_children(&self, arg: &Arg) -> &[Arg] {
        debug_assert!(matches!(arg.kind, ArgKind::NamedGroup));
        &self.args[arg.child_begin as usize..(arg.child_begin + arg.child_count) as usize]
    }

    pub fn expr_list(&self, begin: u32, count: u32) -> &[ExprId] {
        &self.expr_lists[begin as usize..(begin + count) as usize]
    }

    pub fn switch_case_slice(&self, begin: u32, count: u32) -> &[SwitchCase] {
        &self.switch_cases[begin as usize..(begin + count) as usize]
    }

    pub fn field_init_entry_slice(&self, begin: u32, count: u32) -> &[FieldInitEntry] {
        &self.field_init_entries[begin as usize..(begin + count) as usize]
    }

    pub fn param_slice(&self, begin: u32, count: u32) -> &[Param] {
        &self.params[begin as usize..(begin + count) as usize]
    }

    pub fn field_member_slice(&self, begin: u32, count: u32) -> &[FieldMember] {
        &self.field_members[begin as usize..(begin + count) as usize]
    }

    pub fn generic_param_slice(&self, begin: u32, count: u32) -> &[GenericParamDecl] {
        &self.generic_param_decls[begin as usize..(begin + count) as usize]
    }

    pub fn constraint_slice(&self, begin: u32, count: u32) -> &[ConstraintDecl] {
        &self.fn_constraint_decls[begin as usize..(begin + count) as usize]
    }

    pub fn path_slice(&self, begin: u32, count: u32) -> &[String] {
        &self.path_segs[begin as usize..(begin + count) as usize]
    }

    // ---- builders (used by the parser, and by this crate's own tests) ----

    pub fn push_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId::from_index(self.exprs.len());
        self.exprs.push(Expr { kind, span });
        id
    }

    pub fn push_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        let id = StmtId::from_index(self.stmts.len());
        self.stmts.push(Stmt { kind, span });
        id
    }

    pub fn push_type_node(&mut self, kind: TypeNodeKind, span: Span) -> TypeNodeId {
        let id = TypeNodeId::from_index(self.type_nodes.len());
        self.type_nodes.push(TypeNode { kind, span });
        id
    }

    pub fn push_stmt_children(&mut self, ids: impl IntoIterator<Item = StmtId>) -> (u32, u32) {
        let begin = self.stmt_children.len() as u32;
        self.stmt_children.extend(ids);
        (begin, self.stmt_children.len() as u32 - begin)
    }

    /// Convenience: builds a `Block` statement from a list of child statements.
    pub fn push_block(&mut self, children: Vec<StmtId>, span: Span) -> StmtId {
        let (stmt_begin, stmt_count) = self.push_stmt_children(children);
        self.push_stmt(StmtKind::Block { stmt_begin, stmt_count }, span)
    }

    pub fn push_expr_list(&mut self, ids: impl IntoIterator<Item = ExprId>) -> (u32, u32) {
        let begin = self.expr_lists.len() as u32;
        self.expr_lists.extend(ids);
        (begin, self.expr_lists.len() as u32 - begin)
    }

    pub fn push_path(&mut self, segs: impl IntoIterator<Item = String>) -> (u32, u32) {
        let begin = self.path_segs.len() as u32;
        let before = self.path_segs.len();
        self.path_segs.extend(segs);
        self.path_refs.resize(self.path_segs.len(), None);
        let _ = before;
        (begin, self.path_segs.len() as u32 - begin)
    }

    pub fn push_args(&mut self, args: impl IntoIterator<Item = Arg>) -> (u32, u32) {
        let begin = self.args.len() as u32;
        self.args.extend(args);
        (begin, self.args.len() as u32 - begin)
    }

    pub fn push_switch_cases(&mut self, cases: impl IntoIterator<Item = SwitchCase>) -> (u32, u32) {
        let begin = self.switch_cases.len() as u32;
        self.switch_cases.extend(cases);
        (begin, self.switch_cases.len() as u32 - begin)
    }

    pub fn push_field_init_entries(
        &mut self,
        entries: impl IntoIterator<Item = FieldInitEntry>,
    ) -> (u32, u32) {
        let begin = self.field_init_entries.len() as u32;
        self.field_init_entries.extend(entries);
        (begin, self.field_init_entries.len() as u32 - begin)
    }

    pub fn push_params(&mut self, params: impl IntoIterator<Item = Param>) -> (u32, u32) {
        let begin = self.params.len() as u32;
        self.params.extend(params);
        (begin, self.params.len() as u32 - begin)
    }

    pub fn push_field_members(&mut self, members: impl IntoIterator<Item = FieldMember>) -> (u32, u32) {
        let begin = self.field_members.len() as u32;
        self.field_members.extend(members);
        (begin, self.field_members.len() as u32 - begin)
    }

    pub fn push_generic_params(
        &mut self,
        decls: impl IntoIterator<Item = GenericParamDecl>,
    ) -> (u32, u32) {
        let begin = self.generic_param_decls.len() as u32;
        self.generic_param_decls.extend(decls);
        (begin, self.generic_param_decls.len() as u32 - begin)
    }

    pub fn push_constraints(&mut self, decls: impl IntoIterator<Item = ConstraintDecl>) -> (u32, u32) {
        let begin = self.fn_constraint_decls.len() as u32;
        self.fn_constraint_decls.extend(decls);
        (begin, self.fn_constraint_decls.len() as u32 - begin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_children_round_trip() {
        let mut ast = AstArena::new();
        let a = ast.push_stmt(StmtKind::Continue, Span::DUMMY);
        let b = ast.push_stmt(StmtKind::Continue, Span::DUMMY);
        let block = ast.push_block(vec![a, b], Span::DUMMY);
        assert_eq!(ast.block_children(ast.stmt(block)), &[a, b]);
    }

    #[test]
    fn named_group_children_flatten_into_arg_arena() {
        let mut ast = AstArena::new();
        let e1 = ast.push_expr(ExprKind::IntLiteral { text: "1".into() }, Span::DUMMY);
        let (child_begin, child_count) = ast.push_args(vec![Arg {
            kind: ArgKind::Labeled,
            label: Some("x".into()),
            expr: Some(e1),
            child_begin: 0,
            child_count: 0,
            span: Span::DUMMY,
        }]);
        let group = Arg {
            kind: ArgKind::NamedGroup,
            label: None,
            expr: None,
            child_begin,
            child_count,
            span: Span::DUMMY,
        };
        let children = ast.named_group_children(&group);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].label.as_deref(), Some("x"));
    }
}
