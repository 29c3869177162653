//! Lowers a resolved AST + [`TyckResult`] into a [`Module`] (§4.4.1, §4.4.2).
//!
//! The builder never diagnoses and never fails: every input here already
//! passed type checking, so a missing candidate or absent default only
//! happens on a malformed fixture and is lowered as an `Error` value rather
//! than panicking.

use std::collections::{HashMap, VecDeque};

use crate::ast::{self, ArgKind as AstArgKind, AstArena, CastKind, ExprKind, Op, StmtKind as AstStmtKind};
use crate::config::SirBuilderOptions;
use crate::ids::{ExprId, SirArgId, SirBlockId, SirStmtId, SirValueId, StmtId, SymbolId, TypeId};
use crate::resolve::NameResolveResult;
use crate::source::Span;
use crate::symbols::SymbolTable;
use crate::tyck::TyckResult;
use crate::types::{Builtin, TypePool};

use super::effect::EffectClass;
use super::{lower, Act, Arg, ArgKind, Field, FieldMember, Func, Global, Module, Param, StmtKind, SwitchCase, TypeNodeCache, Value, ValueKind};

struct Builder<'a> {
    ast: &'a AstArena,
    nres: &'a NameResolveResult,
    tyck: &'a TyckResult,
    types: &'a mut TypePool,
    symbols: &'a SymbolTable,
    opts: SirBuilderOptions,
    type_cache: TypeNodeCache,
    m: Module,
}

/// Lowers `program` (a top-level `Block` statement) into a [`Module`].
/// Pure over its inputs except `types`, which is interned through the same
/// way `tyck::check_program` is (§4.4.1).
#[tracing::instrument(skip_all)]
pub fn build_sir_module(
    ast: &AstArena,
    program_root: StmtId,
    symbols: &SymbolTable,
    name_resolve: &NameResolveResult,
    tyck: &TyckResult,
    types: &mut TypePool,
    opts: SirBuilderOptions,
) -> Module {
    let mut b = Builder {
        ast,
        nres: name_resolve,
        tyck,
        types,
        symbols,
        opts,
        type_cache: HashMap::new(),
        m: Module::new(),
    };
    b.descend_top_level(program_root);
    tracing::debug!(
        funcs = b.m.top_level_funcs.len(),
        fields = b.m.top_level_fields.len(),
        acts = b.m.top_level_acts.len(),
        globals = b.m.top_level_globals.len(),
        "build_sir_module finished"
    );
    b.m
}

impl<'a> Builder<'a> {
    fn resolve_type(&mut self, tn: crate::ids::TypeNodeId) -> TypeId {
        lower::resolve_type_node(self.ast, self.types, &mut self.type_cache, tn)
    }

    // ---- top-level traversal (§4.4.2) --------------------------------

    fn descend_top_level(&mut self, sid: StmtId) {
        match &self.ast.stmt(sid).kind {
            AstStmtKind::Block { .. } => {
                for c in self.ast.block_children(self.ast.stmt(sid)).to_vec() {
                    self.lower_top_level_stmt(c);
                }
            }
            _ => self.lower_top_level_stmt(sid),
        }
    }

    fn lower_top_level_stmt(&mut self, sid: StmtId) {
        match self.ast.stmt(sid).kind.clone() {
            AstStmtKind::FnDecl { .. } => {
                let f = self.lower_fn_decl(sid);
                self.m.top_level_funcs.push(f);
            }
            AstStmtKind::FieldDecl { .. } => {
                let f = self.lower_field_decl(sid);
                self.m.top_level_fields.push(f);
            }
            AstStmtKind::ActsDecl { .. } => {
                let a = self.lower_acts_decl(sid);
                self.m.top_level_acts.push(a);
            }
            AstStmtKind::GlobalVarDecl { .. } => {
                let g = self.lower_global(sid);
                self.m.top_level_globals.push(g);
            }
            AstStmtKind::ClassDecl { member_begin, member_count, .. }
            | AstStmtKind::ProtoDecl { member_begin, member_count, .. } => {
                let members =
                    self.ast.stmt_children()[member_begin as usize..(member_begin + member_count) as usize]
                        .to_vec();
                for m in members {
                    self.lower_top_level_stmt(m);
                }
            }
            AstStmtKind::Block { .. } => self.descend_top_level(sid),
            AstStmtKind::Nest { body: Some(b), .. } => self.descend_top_level(b),
            AstStmtKind::UseActsSelection { body, .. } => self.descend_top_level(body),
            _ => {}
        }
    }

    // ---- declarations --------------------------------------------------

    fn lower_fn_decl(&mut self, sid: StmtId) -> crate::ids::SirFuncId {
        let (name, param_begin, param_count, ret_type, body, attrs, is_pure, is_comptime, span) =
            match self.ast.stmt(sid).kind.clone() {
                AstStmtKind::FnDecl {
                    name,
                    param_begin,
                    param_count,
                    ret_type,
                    body,
                    attrs,
                    is_pure,
                    is_comptime,
                    ..
                } => (name, param_begin, param_count, ret_type, body, attrs, is_pure, is_comptime, self.ast.stmt(sid).span),
                _ => unreachable!("lower_fn_decl called on a non-FnDecl stmt"),
            };

        let qualified_name = self.tyck.fn_qualified_names.get(&sid).cloned().unwrap_or_else(|| name.clone());
        let ret_ty = match ret_type {
            Some(tn) => self.resolve_type(tn),
            None => self.types.builtin(Builtin::Unit),
        };

        let sir_params = self.lower_params(param_begin, param_count);
        let (pb, pc) = self.m.push_params(sir_params);
        let sir_attrs: Vec<super::Attr> = attrs.into_iter().map(|name| super::Attr { name }).collect();
        let (ab, ac) = self.m.push_attrs(sir_attrs);

        let entry_block = body.map(|b| self.lower_stmt_as_sir_block(b));
        let has_any_write = entry_block.map(|b| self.block_effect(b) != EffectClass::Pure).unwrap_or(false);
        if self.opts.verbose_effect_summary {
            tracing::debug!(func = %qualified_name, has_any_write, "effect summary");
        }

        self.m.push_func(Func {
            name,
            qualified_name,
            param_begin: pb,
            param_count: pc,
            attr_begin: ab,
            attr_count: ac,
            ret_type: ret_ty,
            entry_block,
            is_pure,
            is_comptime,
            has_any_write,
            span,
        })
    }

    fn lower_params(&mut self, param_begin: u32, param_count: u32) -> Vec<Param> {
        let mut out = Vec::with_capacity(param_count as usize);
        for (i, p) in self.ast.param_slice(param_begin, param_count).to_vec().iter().enumerate() {
            let ty = match p.type_node {
                Some(tn) => self.resolve_type(tn),
                None => self.types.error(),
            };
            let default = p.default.map(|d| self.lower_expr(d));
            let sym = self.nres.symbol_for_param((param_begin as usize) + i).unwrap_or(SymbolId::INVALID);
            out.push(Param {
                sym,
                name: p.name.clone(),
                ty,
                is_self: p.is_self,
                label: p.label.clone(),
                has_default: p.has_default,
                default,
                span: p.span,
            });
        }
        out
    }

    fn lower_field_decl(&mut self, sid: StmtId) -> crate::ids::SirFieldId {
        let (name, member_begin, member_count, layout, attrs, span) = match self.ast.stmt(sid).kind.clone() {
            AstStmtKind::FieldDecl { name, member_begin, member_count, layout, attrs } => {
                (name, member_begin, member_count, layout, attrs, self.ast.stmt(sid).span)
            }
            _ => unreachable!("lower_field_decl called on a non-FieldDecl stmt"),
        };

        let members = self.ast.field_member_slice(member_begin, member_count).to_vec();
        let sir_members: Vec<FieldMember> = members
            .into_iter()
            .map(|m| FieldMember { name: m.name, ty: self.resolve_type(m.type_node), span: m.span })
            .collect();
        let (mb, mc) = self.m.push_field_members(sir_members);
        let sir_attrs: Vec<super::Attr> = attrs.into_iter().map(|name| super::Attr { name }).collect();
        let (ab, ac) = self.m.push_attrs(sir_attrs);

        self.m.push_field(Field {
            name: name.clone(),
            qualified_name: name,
            member_begin: mb,
            member_count: mc,
            attr_begin: ab,
            attr_count: ac,
            layout,
            span,
        })
    }

    fn lower_acts_decl(&mut self, sid: StmtId) -> crate::ids::SirActId {
        let (target_type, name, member_begin, member_count, span) = match self.ast.stmt(sid).kind.clone() {
            AstStmtKind::ActsDecl { target_type, name, member_begin, member_count } => {
                (target_type, name, member_begin, member_count, self.ast.stmt(sid).span)
            }
            _ => unreachable!("lower_acts_decl called on a non-ActsDecl stmt"),
        };
        let tgt = self.resolve_type(target_type);
        let members =
            self.ast.stmt_children()[member_begin as usize..(member_begin + member_count) as usize].to_vec();
        let sir_funcs: Vec<crate::ids::SirFuncId> = members.into_iter().map(|m| self.lower_fn_decl(m)).collect();
        let (mb, mc) = self.m.push_func_children(sir_funcs);
        self.m.push_act(Act { target_type: tgt, name, member_begin: mb, member_count: mc, span })
    }

    fn lower_global(&mut self, sid: StmtId) -> crate::ids::SirGlobalId {
        let (name, is_mut, type_node, init, attrs, span) = match self.ast.stmt(sid).kind.clone() {
            AstStmtKind::GlobalVarDecl { name, is_mut, type_node, init, attrs } => {
                (name, is_mut, type_node, init, attrs, self.ast.stmt(sid).span)
            }
            _ => unreachable!("lower_global called on a non-GlobalVarDecl stmt"),
        };
        let init_v = init.map(|e| self.lower_expr(e));
        let ty = match type_node {
            Some(tn) => self.resolve_type(tn),
            None => init.map(|e| self.expr_type(e)).unwrap_or_else(|| self.types.error()),
        };
        let sir_attrs: Vec<super::Attr> = attrs.into_iter().map(|name| super::Attr { name }).collect();
        let (ab, ac) = self.m.push_attrs(sir_attrs);
        self.m.push_global(Global {
            name: name.clone(),
            qualified_name: name,
            ty,
            is_mut,
            attr_begin: ab,
            attr_count: ac,
            init: init_v,
            span,
        })
    }

    // ---- statements ------------------------------------------------------

    fn lower_stmt_as_sir_block(&mut self, sid: StmtId) -> SirBlockId {
        match self.ast.stmt(sid).kind.clone() {
            AstStmtKind::Block { .. } => {
                let children = self.ast.block_children(self.ast.stmt(sid)).to_vec();
                let sir_children: Vec<SirStmtId> = children.into_iter().map(|c| self.lower_stmt(c)).collect();
                self.m.push_block(sir_children)
            }
            _ => {
                let single = self.lower_stmt(sid);
                self.m.push_block(vec![single])
            }
        }
    }

    fn lower_stmt(&mut self, sid: StmtId) -> SirStmtId {
        let span = self.ast.stmt(sid).span;
        let kind = self.ast.stmt(sid).kind.clone();
        let sir_kind = match kind {
            AstStmtKind::ExprStmt(e) => StmtKind::ExprStmt(self.lower_expr(e)),
            AstStmtKind::VarDecl { init, .. } => {
                let sym = self.nres.symbol_for_stmt(sid.index()).unwrap_or(SymbolId::INVALID);
                let init = init.map(|e| self.lower_expr(e));
                StmtKind::VarDecl { sym, init }
            }
            AstStmtKind::If { cond, then_block, else_block } => {
                let c = self.lower_expr(cond);
                let t = self.lower_stmt_as_sir_block(then_block);
                let e = else_block.map(|b| self.lower_stmt_as_sir_block(b));
                StmtKind::If { cond: c, then_block: t, else_block: e }
            }
            AstStmtKind::While { cond, body } => {
                let c = self.lower_expr(cond);
                let b = self.lower_stmt_as_sir_block(body);
                StmtKind::While { cond: c, body: b }
            }
            AstStmtKind::DoScope { body } => StmtKind::DoScope { body: self.lower_stmt_as_sir_block(body) },
            AstStmtKind::DoWhile { body, cond } => {
                let b = self.lower_stmt_as_sir_block(body);
                let c = self.lower_expr(cond);
                StmtKind::DoWhile { body: b, cond: c }
            }
            AstStmtKind::Manual { body } => StmtKind::Manual { body: self.lower_stmt_as_sir_block(body) },
            AstStmtKind::Return(e) => StmtKind::Return(e.map(|x| self.lower_expr(x))),
            AstStmtKind::Break(e) => StmtKind::Break(e.map(|x| self.lower_expr(x))),
            AstStmtKind::Continue => StmtKind::Continue,
            AstStmtKind::Block { .. } => StmtKind::Block(self.lower_stmt_as_sir_block(sid)),
            AstStmtKind::Switch { scrutinee, case_begin, case_count } => {
                let scr = self.lower_expr(scrutinee);
                let cases = self.ast.switch_case_slice(case_begin, case_count).to_vec();
                let mut sir_cases = Vec::with_capacity(cases.len());
                for c in cases {
                    let pattern = c.pattern.map(|p| self.lower_expr(p));
                    let body = self.lower_stmt_as_sir_block(c.body);
                    sir_cases.push(SwitchCase { pattern, body, span: c.span });
                }
                let (cb, cc) = self.m.push_switch_cases(sir_cases);
                StmtKind::Switch { scrutinee: scr, case_begin: cb, case_count: cc }
            }
            AstStmtKind::Commit(e) => StmtKind::Commit(self.lower_expr(e)),
            AstStmtKind::Recast { operand, target_type } => {
                let o = self.lower_expr(operand);
                let t = self.resolve_type(target_type);
                StmtKind::Recast { operand: o, target: t }
            }
            // A lexical acts-selection window has no runtime effect of its
            // own by the time Tyck has already resolved every call inside
            // it; lower it as a transparent scope (§3.4, §4.3.5).
            AstStmtKind::UseActsSelection { body, .. } => {
                StmtKind::DoScope { body: self.lower_stmt_as_sir_block(body) }
            }
            AstStmtKind::Nest { body: Some(b), .. } => StmtKind::DoScope { body: self.lower_stmt_as_sir_block(b) },
            AstStmtKind::Nest { body: None, .. } => StmtKind::Continue,
            // Declarations don't nest inside executable bodies in this
            // language profile; lower to an empty scope rather than panic
            // on a malformed fixture.
            AstStmtKind::FnDecl { .. }
            | AstStmtKind::FieldDecl { .. }
            | AstStmtKind::ActsDecl { .. }
            | AstStmtKind::ClassDecl { .. }
            | AstStmtKind::ProtoDecl { .. }
            | AstStmtKind::GlobalVarDecl { .. } => StmtKind::DoScope { body: self.m.push_block(vec![]) },
        };
        self.m.push_stmt(sir_kind, span)
    }

    // ---- expressions -------------------------------------------------

    fn expr_type(&self, id: ExprId) -> TypeId {
        self.tyck.expr_types.get(id.index()).copied().unwrap_or(TypeId::INVALID)
    }

    fn overload_target(&self, id: ExprId) -> StmtId {
        self.tyck.expr_overload_target.get(id.index()).copied().unwrap_or(StmtId::INVALID)
    }

    fn ctor_owner(&self, id: ExprId) -> TypeId {
        self.tyck.expr_ctor_owner_type.get(id.index()).copied().unwrap_or(TypeId::INVALID)
    }

    fn lower_expr(&mut self, id: ExprId) -> SirValueId {
        let span = self.ast.expr(id).span;
        let ty = self.expr_type(id);
        let place = lower::place_class_of(self.ast, &self.ast.expr(id).kind);
        let kind = self.ast.expr(id).kind.clone();

        let mut v = match kind {
            ExprKind::IntLiteral { text } => {
                let mut v = Value::new(ValueKind::IntLiteral, ty, span);
                v.text = text;
                v
            }
            ExprKind::FloatLiteral { text } => {
                let mut v = Value::new(ValueKind::FloatLiteral, ty, span);
                v.text = text;
                v
            }
            ExprKind::BoolLiteral(b) => {
                let mut v = Value::new(ValueKind::BoolLiteral, ty, span);
                v.text = b.to_string();
                v
            }
            ExprKind::StringLiteral(s) => {
                let mut v = Value::new(ValueKind::StringLiteral, ty, span);
                v.text = s;
                v
            }
            ExprKind::NullLiteral => Value::new(ValueKind::NullLiteral, ty, span),
            ExprKind::Ident(name) => {
                let mut v = Value::new(ValueKind::Local, ty, span);
                v.sym = self.nres.symbol_for_expr(id.index());
                v.origin_sym = v.sym;
                v.text = v.sym.map(|s| self.symbols.symbol(s).name.clone()).unwrap_or(name);
                v
            }
            ExprKind::Path { path_begin, path_count } => {
                let segs = self.ast.path_slice(path_begin, path_count).to_vec();
                let mut v = Value::new(ValueKind::Local, ty, span);
                v.sym = self.nres.symbol_for_expr(id.index());
                v.origin_sym = v.sym;
                v.text = v.sym.map(|s| self.symbols.symbol(s).name.clone()).unwrap_or_else(|| segs.join("::"));
                v
            }
            ExprKind::Unary { op, operand } => {
                let a = self.lower_expr(operand);
                let mut v = Value::new(ValueKind::Unary, ty, span);
                v.op = Some(op);
                v.a = a;
                v
            }
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(id, op, lhs, rhs, ty, span),
            ExprKind::Assign { lhs, rhs } => {
                let a = self.lower_expr(lhs);
                let b = self.lower_expr(rhs);
                let mut v = Value::new(ValueKind::Assign, ty, span);
                v.a = a;
                v.b = b;
                v
            }
            ExprKind::PostfixInc { op, operand } => self.lower_postfix(id, op, operand, ty, span),
            ExprKind::Borrow { is_mut, operand } => {
                let a = self.lower_expr(operand);
                let mut v = Value::new(ValueKind::Borrow, ty, span);
                v.a = a;
                v.borrow_is_mut = is_mut;
                v
            }
            ExprKind::Escape { operand } => {
                let a = self.lower_expr(operand);
                let mut v = Value::new(ValueKind::Escape, ty, span);
                v.a = a;
                v
            }
            ExprKind::If { cond, then_block, else_block } => {
                let c = self.lower_expr(cond);
                let t = self.lower_stmt_as_sir_block(then_block);
                let e = else_block.map(|b| self.lower_stmt_as_sir_block(b));
                let mut v = Value::new(ValueKind::If, ty, span);
                v.a = c;
                v.then_block = Some(t);
                v.else_block = e;
                v
            }
            ExprKind::BlockExpr { block } => {
                let b = self.lower_stmt_as_sir_block(block);
                let tail = self.tail_value_of(b);
                let mut v = Value::new(ValueKind::Block, ty, span);
                v.body_block = Some(b);
                v.tail_value = tail;
                v
            }
            ExprKind::Loop { body } => {
                let b = self.lower_stmt_as_sir_block(body);
                let mut v = Value::new(ValueKind::Loop, ty, span);
                v.body_block = Some(b);
                v
            }
            ExprKind::Call { callee, arg_begin, arg_count } => {
                self.lower_call(id, callee, arg_begin, arg_count, ty, span)
            }
            ExprKind::ArrayLit { elem_begin, elem_count } => {
                let elems = self.ast.expr_list(elem_begin, elem_count).to_vec();
                let args: Vec<Arg> = elems
                    .into_iter()
                    .map(|e| {
                        let val = self.lower_expr(e);
                        let sp = self.ast.expr(e).span;
                        Arg { kind: ArgKind::Positional, label: None, value: Some(val), child_begin: 0, child_count: 0, span: sp }
                    })
                    .collect();
                let (ab, ac) = self.m.push_args(args);
                let mut v = Value::new(ValueKind::ArrayLit, ty, span);
                v.arg_begin = ab;
                v.arg_count = ac;
                v
            }
            ExprKind::FieldInit { type_node, entry_begin, entry_count } => {
                let entries = self.ast.field_init_entry_slice(entry_begin, entry_count).to_vec();
                let args: Vec<Arg> = entries
                    .into_iter()
                    .map(|e| {
                        let val = self.lower_expr(e.expr);
                        Arg { kind: ArgKind::Labeled, label: Some(e.name), value: Some(val), child_begin: 0, child_count: 0, span: e.span }
                    })
                    .collect();
                let (ab, ac) = self.m.push_args(args);
                let mut v = Value::new(ValueKind::FieldInit, ty, span);
                v.arg_begin = ab;
                v.arg_count = ac;
                if let Some(tn) = type_node {
                    v.cast_to = self.resolve_type(tn);
                }
                let owner = self.ctor_owner(id);
                v.ctor_owner_type = owner;
                v.call_is_ctor = owner.is_valid();
                v
            }
            ExprKind::Index { base, index } => {
                let a = self.lower_expr(base);
                let b = self.lower_expr(index);
                let mut v = Value::new(ValueKind::Index, ty, span);
                v.a = a;
                v.b = b;
                v
            }
            ExprKind::Field { base, name } => {
                let a = self.lower_expr(base);
                let mut v = Value::new(ValueKind::Field, ty, span);
                v.a = a;
                v.text = name;
                v
            }
            ExprKind::Cast { kind: ck, operand, target } => {
                let a = operand.map(|o| self.lower_expr(o));
                let mut v = Value::new(ValueKind::Cast, ty, span);
                if let Some(av) = a {
                    v.a = av;
                }
                v.cast_to = match target {
                    Some(tn) => self.resolve_type(tn),
                    None => self.types.error(),
                };
                v.text = match ck {
                    CastKind::Strict => "as",
                    CastKind::Optional => "as?",
                    CastKind::Forced => "as!",
                }
                .to_string();
                v
            }
            ExprKind::NullCoalesce { lhs, rhs } => {
                let a = self.lower_expr(lhs);
                let b = self.lower_expr(rhs);
                let mut v = Value::new(ValueKind::NullCoalesce, ty, span);
                v.a = a;
                v.b = b;
                v
            }
            ExprKind::NullCoalesceAssign { lhs, rhs } => {
                let a = self.lower_expr(lhs);
                let b = self.lower_expr(rhs);
                let mut v = Value::new(ValueKind::NullCoalesceAssign, ty, span);
                v.a = a;
                v.b = b;
                v
            }
            ExprKind::Error => Value::new(ValueKind::Error, ty, span),
        };

        v.place_class = place;
        v.effect_class = self.compute_effect(&v);
        self.m.push_value(v)
    }

    fn compute_effect(&self, v: &Value) -> EffectClass {
        let mut eff = lower::own_effect_class(v.kind);
        if v.a.is_valid() {
            eff = eff.join(self.effect_of(v.a));
        }
        if v.b.is_valid() {
            eff = eff.join(self.effect_of(v.b));
        }
        if v.c.is_valid() {
            eff = eff.join(self.effect_of(v.c));
        }
        for i in v.arg_begin..v.arg_begin + v.arg_count {
            let arg = self.m.arg(SirArgId::from_index(i as usize));
            if let Some(val) = arg.value {
                eff = eff.join(self.effect_of(val));
            }
            if matches!(arg.kind, ArgKind::NamedGroup) {
                for child in self.m.named_group_children(arg) {
                    if let Some(cv) = child.value {
                        eff = eff.join(self.effect_of(cv));
                    }
                }
            }
        }
        if let Some(t) = v.then_block {
            eff = eff.join(self.block_effect(t));
        }
        if let Some(e) = v.else_block {
            eff = eff.join(self.block_effect(e));
        }
        if let Some(b) = v.body_block {
            eff = eff.join(self.block_effect(b));
        }
        eff
    }

    fn effect_of(&self, id: SirValueId) -> EffectClass {
        self.m.value(id).effect_class
    }

    fn block_effect(&self, b: SirBlockId) -> EffectClass {
        let mut eff = EffectClass::Pure;
        for sid in self.m.block_children(b) {
            eff = eff.join(self.stmt_effect(sid));
        }
        eff
    }

    fn stmt_effect(&self, sid: SirStmtId) -> EffectClass {
        match &self.m.stmt(sid).kind {
            StmtKind::ExprStmt(v) => self.effect_of(*v),
            StmtKind::VarDecl { init, .. } => (*init).map(|v| self.effect_of(v)).unwrap_or(EffectClass::Pure),
            StmtKind::If { cond, then_block, else_block } => {
                let mut e = self.effect_of(*cond).join(self.block_effect(*then_block));
                if let Some(eb) = else_block {
                    e = e.join(self.block_effect(*eb));
                }
                e
            }
            StmtKind::While { cond, body } => self.effect_of(*cond).join(self.block_effect(*body)),
            StmtKind::DoScope { body } | StmtKind::Manual { body } => self.block_effect(*body),
            StmtKind::DoWhile { body, cond } => self.block_effect(*body).join(self.effect_of(*cond)),
            StmtKind::Return(v) | StmtKind::Break(v) => (*v).map(|x| self.effect_of(x)).unwrap_or(EffectClass::Pure),
            StmtKind::Continue => EffectClass::Pure,
            StmtKind::Block(b) => self.block_effect(*b),
            StmtKind::Switch { scrutinee, case_begin, case_count } => {
                let mut e = self.effect_of(*scrutinee);
                for c in self.m.switch_cases_of(*case_begin, *case_count) {
                    if let Some(p) = c.pattern {
                        e = e.join(self.effect_of(p));
                    }
                    e = e.join(self.block_effect(c.body));
                }
                e
            }
            StmtKind::Commit(v) => self.effect_of(*v).join(EffectClass::MayWrite),
            StmtKind::Recast { operand, .. } => self.effect_of(*operand),
        }
    }

    fn tail_value_of(&self, b: SirBlockId) -> Option<SirValueId> {
        let children = self.m.block_children(b);
        let last = *children.last()?;
        match self.m.stmt(last).kind {
            StmtKind::ExprStmt(v) => Some(v),
            _ => None,
        }
    }

    // ---- calls, operators (§4.3.5, §4.4.2) ----------------------------

    fn lower_binary(&mut self, id: ExprId, op: Op, lhs: ExprId, rhs: ExprId, ty: TypeId, span: Span) -> Value {
        let target = self.overload_target(id);
        if target.is_valid() {
            let mut v = self.lower_operator_call(target, lhs, &[rhs], ty, span);
            v.op = Some(op);
            v
        } else {
            let a = self.lower_expr(lhs);
            let b = self.lower_expr(rhs);
            let mut v = Value::new(ValueKind::Binary, ty, span);
            v.op = Some(op);
            v.a = a;
            v.b = b;
            v
        }
    }

    fn lower_postfix(&mut self, id: ExprId, op: Op, operand: ExprId, ty: TypeId, span: Span) -> Value {
        let target = self.overload_target(id);
        if target.is_valid() {
            let mut v = self.lower_operator_call(target, operand, &[], ty, span);
            v.op = Some(op);
            v
        } else {
            let a = self.lower_expr(operand);
            let mut v = Value::new(ValueKind::PostfixInc, ty, span);
            v.op = Some(op);
            v.a = a;
            v
        }
    }

    /// Lowers an acts-dispatched operator as a `Call` value: walks the
    /// candidate's declared params in order, filling the `self` slot from
    /// `receiver` and the rest positionally from `extra_operands`
    /// (§4.3.5, §4.4.2).
    fn lower_operator_call(&mut self, target: StmtId, receiver: ExprId, extra_operands: &[ExprId], ty: TypeId, span: Span) -> Value {
        let params = self.candidate_params(target);
        let mut operand_iter = extra_operands.iter();
        let mut args = Vec::with_capacity(params.len());
        for p in &params {
            let (val, arg_span) = if p.is_self {
                (self.lower_expr(receiver), self.ast.expr(receiver).span)
            } else if let Some(&opd) = operand_iter.next() {
                (self.lower_expr(opd), self.ast.expr(opd).span)
            } else if let Some(d) = p.default {
                (self.lower_expr(d), p.span)
            } else {
                (self.m.push_value(Value::new(ValueKind::Error, self.types.error(), p.span)), p.span)
            };
            args.push(Arg { kind: ArgKind::Positional, label: p.label.clone(), value: Some(val), child_begin: 0, child_count: 0, span: arg_span });
        }
        let (ab, ac) = self.m.push_args(args);
        let mut v = Value::new(ValueKind::Call, ty, span);
        v.arg_begin = ab;
        v.arg_count = ac;
        v.callee_decl_stmt = target;
        v
    }

    fn lower_call(&mut self, id: ExprId, callee: ExprId, arg_begin: u32, arg_count: u32, ty: TypeId, span: Span) -> Value {
        let target = self.overload_target(id);
        let ctor_owner = self.ctor_owner(id);
        let call_args = self.ast.call_args(arg_begin, arg_count).to_vec();

        if target.is_valid() {
            let receiver = match &self.ast.expr(callee).kind {
                ExprKind::Field { base, .. } => Some(*base),
                _ => None,
            };
            let sir_args = self.reorder_candidate_args(target, receiver, &call_args);
            let (ab, ac) = self.m.push_args(sir_args);
            let mut v = Value::new(ValueKind::Call, ty, span);
            v.arg_begin = ab;
            v.arg_count = ac;
            v.callee_decl_stmt = target;
            v.ctor_owner_type = ctor_owner;
            v.call_is_ctor = ctor_owner.is_valid();
            v
        } else {
            let callee_v = self.lower_expr(callee);
            let sir_args = self.lower_plain_call_args(&call_args);
            let (ab, ac) = self.m.push_args(sir_args);
            let mut v = Value::new(ValueKind::Call, ty, span);
            v.arg_begin = ab;
            v.arg_count = ac;
            v.callee_value = Some(callee_v);
            v.callee_sym = self.nres.symbol_for_expr(callee.index());
            v.ctor_owner_type = ctor_owner;
            v.call_is_ctor = ctor_owner.is_valid();
            v
        }
    }

    fn candidate_params(&self, target: StmtId) -> Vec<ast::Param> {
        match &self.ast.stmt(target).kind {
            AstStmtKind::FnDecl { param_begin, param_count, .. } => {
                self.ast.param_slice(*param_begin, *param_count).to_vec()
            }
            _ => Vec::new(),
        }
    }

    /// Reorders a call's labeled/positional/named-group args into the
    /// resolved candidate's declared parameter order, injecting `receiver`
    /// at the declared `self` parameter's position (§4.3.5, §4.4.2). Any
    /// parameter left unfilled by the call falls back to its declared
    /// default, matching the "allow defaults" stage that overload
    /// resolution already committed to.
    fn reorder_candidate_args(&mut self, target: StmtId, receiver: Option<ExprId>, call_args: &[ast::Arg]) -> Vec<Arg> {
        let params = self.candidate_params(target);

        let mut positional_q: VecDeque<(ExprId, Span)> = VecDeque::new();
        let mut labeled: HashMap<String, (ExprId, Span)> = HashMap::new();
        for a in call_args {
            match a.kind {
                AstArgKind::Positional => {
                    if let Some(e) = a.expr {
                        positional_q.push_back((e, a.span));
                    }
                }
                AstArgKind::Labeled => {
                    if let (Some(label), Some(e)) = (&a.label, a.expr) {
                        labeled.insert(label.clone(), (e, a.span));
                    }
                }
                AstArgKind::NamedGroup => {
                    for child in self.ast.named_group_children(a) {
                        if let (Some(label), Some(e)) = (&child.label, child.expr) {
                            labeled.insert(label.clone(), (e, child.span));
                        }
                    }
                }
            }
        }

        let mut args = Vec::with_capacity(params.len());
        for p in &params {
            if p.is_self {
                if let Some(r) = receiver {
                    let v = self.lower_expr(r);
                    let sp = self.ast.expr(r).span;
                    args.push(Arg { kind: ArgKind::Positional, label: None, value: Some(v), child_begin: 0, child_count: 0, span: sp });
                }
                continue;
            }
            let has_label = p.label.as_deref().map(|l| !l.is_empty()).unwrap_or(false);
            let found = if has_label { labeled.get(p.label.as_ref().unwrap()).copied() } else { positional_q.pop_front() };
            let (val, sp) = match found {
                Some((e, sp)) => (self.lower_expr(e), sp),
                None => match p.default {
                    Some(d) => (self.lower_expr(d), p.span),
                    None => (self.m.push_value(Value::new(ValueKind::Error, self.types.error(), p.span)), p.span),
                },
            };
            args.push(Arg {
                kind: if has_label { ArgKind::Labeled } else { ArgKind::Positional },
                label: p.label.clone(),
                value: Some(val),
                child_begin: 0,
                child_count: 0,
                span: sp,
            });
        }
        args
    }

    /// Lowers a call's args as written, with no reordering: the indirect-call
    /// path (no resolved overload target) has no declared parameter list to
    /// normalize against (§4.4.2).
    fn lower_plain_call_args(&mut self, call_args: &[ast::Arg]) -> Vec<Arg> {
        let mut result = Vec::with_capacity(call_args.len());
        for a in call_args {
            match a.kind {
                AstArgKind::Positional => {
                    let v = a.expr.map(|e| self.lower_expr(e));
                    result.push(Arg { kind: ArgKind::Positional, label: None, value: v, child_begin: 0, child_count: 0, span: a.span });
                }
                AstArgKind::Labeled => {
                    let v = a.expr.map(|e| self.lower_expr(e));
                    result.push(Arg { kind: ArgKind::Labeled, label: a.label.clone(), value: v, child_begin: 0, child_count: 0, span: a.span });
                }
                AstArgKind::NamedGroup => {
                    let children = self.ast.named_group_children(a).to_vec();
                    let mut child_sir = Vec::with_capacity(children.len());
                    for c in &children {
                        let v = c.expr.map(|e| self.lower_expr(e));
                        let kind = match c.kind {
                            AstArgKind::Labeled => ArgKind::Labeled,
                            _ => ArgKind::Positional,
                        };
                        child_sir.push(Arg { kind, label: c.label.clone(), value: v, child_begin: 0, child_count: 0, span: c.span });
                    }
                    let (cb, cc) = self.m.push_args(child_sir);
                    result.push(Arg { kind: ArgKind::NamedGroup, label: None, value: None, child_begin: cb, child_count: cc, span: a.span });
                }
            }
        }
        result
    }
}
