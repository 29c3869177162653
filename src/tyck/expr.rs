//! Pass 2 expression checking (§4.3.2, §4.3.6, §4.3.7), grounded in
//! `type_check_expr_core.cpp` / `type_check_expr_call_cast.cpp`'s dispatch
//! over `ExprKind`.

use crate::ast::{Arg, CastKind, ExprKind, Op};
use crate::diagnostics::DiagnosticCode;
use crate::ids::{ExprId, TypeId};
use crate::types::{Builtin, Type};

use super::overload::FlatArg;
use super::state::{Slot, TypeChecker};

impl<'a> TypeChecker<'a> {
    /// Entry point used by every caller that doesn't care about
    /// value/discard context; defaults to value context (§4.3.2).
    pub(crate) fn check_expr(&mut self, id: ExprId) -> TypeId {
        self.check_expr_in(id, Slot::Value)
    }

    /// The slot-sensitive entry point (§4.3.2, §9): only block-expressions
    /// re-check under a changed context, everything else reuses its cache
    /// unconditionally once visited.
    pub(crate) fn check_expr_in(&mut self, id: ExprId, slot: Slot) -> TypeId {
        let is_block_expr = matches!(self.ast.expr(id).kind, ExprKind::BlockExpr { .. });
        if is_block_expr {
            let cached_in_value = self.expr_type_cached_in_value_ctx[id.index()];
            let already = self.expr_type(id).is_valid();
            if already && cached_in_value == (slot == Slot::Value) {
                return self.expr_type(id);
            }
        } else if self.expr_type(id).is_valid() {
            return self.expr_type(id);
        }

        let ty = self.dispatch_expr(id, slot);
        self.set_expr_type(id, ty);
        if is_block_expr {
            self.expr_type_cached_in_value_ctx[id.index()] = slot == Slot::Value;
        }
        ty
    }

    fn dispatch_expr(&mut self, id: ExprId, slot: Slot) -> TypeId {
        let kind = self.ast.expr(id).kind.clone();
        match kind {
            ExprKind::IntLiteral { text } => match self.parse_int_literal(&text) {
                Some(v) => self.record_pending_int_expr(id, v),
                None => {
                    self.err(DiagnosticCode::IntLiteralInvalid, self.ast.expr(id).span, vec![text]);
                    self.types.error()
                }
            },
            ExprKind::FloatLiteral { .. } => self.types.builtin(Builtin::F64),
            ExprKind::BoolLiteral(_) => self.types.builtin(Builtin::Bool),
            ExprKind::StringLiteral(_) => self.types.builtin(Builtin::Text),
            ExprKind::NullLiteral => self.types.builtin(Builtin::Null),
            ExprKind::Ident(name) => self.check_ident(id, &name),
            ExprKind::Path { path_begin, path_count } => {
                let segs = self.ast.path_slice(path_begin, path_count).to_vec();
                let refs: Vec<&str> = segs.iter().map(String::as_str).collect();
                let ty = self.types.intern_path(&refs);
                if let Some(sym) = self.sym.lookup(&segs.join("::")) {
                    self.sym.symbol(sym).declared_type
                } else {
                    ty
                }
            }
            ExprKind::Unary { op, operand } => self.check_unary(id, op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(id, op, lhs, rhs),
            ExprKind::Assign { lhs, rhs } => self.check_assign(id, lhs, rhs),
            ExprKind::PostfixInc { op, operand } => self.check_postfix(id, op, operand),
            ExprKind::Borrow { is_mut, operand } => self.check_borrow(id, is_mut, operand),
            ExprKind::Escape { operand } => self.check_escape(id, operand),
            ExprKind::If { cond, then_block, else_block } => self.check_if_expr(cond, then_block, else_block),
            ExprKind::BlockExpr { block } => self.check_block_expr(block, slot),
            ExprKind::Loop { body } => self.check_loop_expr(body),
            ExprKind::Call { callee, arg_begin, arg_count } => self.check_call(id, callee, arg_begin, arg_count),
            ExprKind::ArrayLit { elem_begin, elem_count } => self.check_array_lit(elem_begin, elem_count),
            ExprKind::FieldInit { type_node, entry_begin, entry_count } => {
                self.check_field_init(type_node, entry_begin, entry_count)
            }
            ExprKind::Index { base, index } => self.check_index(base, index),
            ExprKind::Field { base, name } => self.check_field_access(id, base, &name),
            ExprKind::Cast { kind, operand, target } => self.check_cast(id, kind, operand, target),
            ExprKind::NullCoalesce { lhs, rhs } => self.check_null_coalesce(id, lhs, rhs),
            ExprKind::NullCoalesceAssign { lhs, rhs } => self.check_null_coalesce_assign(id, lhs, rhs),
            ExprKind::Error => self.types.error(),
        }
    }

    fn check_ident(&mut self, id: ExprId, name: &str) -> TypeId {
        let sym = self.nres.symbol_for_expr(id.index()).or_else(|| self.sym.lookup(name));
        match sym {
            Some(s) => {
                if let Some(p) = self.pending_int_sym.get(&s) {
                    if !p.resolved {
                        return self.types.builtin(Builtin::InferInteger);
                    }
                    return p.resolved_type;
                }
                self.sym.symbol(s).declared_type
            }
            None => {
                self.err(DiagnosticCode::NameNotFound, self.ast.expr(id).span, vec![name.to_string()]);
                self.types.error()
            }
        }
    }

    fn check_unary(&mut self, _id: ExprId, op: Op, operand: ExprId) -> TypeId {
        let t = self.check_expr(operand);
        let t = self.read_decay_borrow(t);
        match op {
            Op::Not => self.types.builtin(Builtin::Bool),
            Op::Neg | Op::Plus | Op::BitNot => {
                if self.is_infer_int(t) || self.is_int_builtin(t) || self.is_float_builtin(t) {
                    t
                } else if self.is_error(t) {
                    self.types.error()
                } else {
                    self.err(DiagnosticCode::TypeErrorGeneric, self.ast.expr(operand).span, vec![
                        format!("unary operator on non-numeric type {}", self.types.to_string(t))
                    ]);
                    self.types.error()
                }
            }
            _ => self.types.error(),
        }
    }

    fn check_binary(&mut self, id: ExprId, op: Op, lhs: ExprId, rhs: ExprId) -> TypeId {
        if matches!(op, Op::DotDot | Op::DotDotColon) {
            let lt = self.check_expr(lhs);
            let rt = self.check_expr(rhs);
            if !self.is_error(lt) && !self.is_error(rt) && !self.can_assign(lt, rt) && !self.can_assign(rt, lt) {
                self.err(DiagnosticCode::TypeErrorGeneric, self.ast.expr(id).span, vec![
                    format!("range endpoints of types {} and {} do not match", self.types.to_string(lt), self.types.to_string(rt))
                ]);
            }
            return self.types.make_array(lt, false, None);
        }

        let mut lt = self.check_expr(lhs);
        let mut rt = self.check_expr(rhs);
        lt = self.read_decay_borrow(lt);
        rt = self.read_decay_borrow(rt);

        // acts overload takes priority whenever any operator set is registered.
        if !self.acts_operator_map.is_empty() {
            if let Some(target) = self.resolve_binary_operator_overload(op, lt, rt) {
                self.set_overload_target(id, target);
                let ret = match self.fn_decl_type.get(&target) {
                    Some(ty) => match self.types.get(*ty) {
                        Type::Fn(sig) => sig.ret,
                        _ => self.types.error(),
                    },
                    None => self.types.error(),
                };
                return ret;
            }
        }

        match op {
            Op::Eq | Op::Ne => self.check_equality(id, op, lt, rt, lhs),
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Rem => self.check_arithmetic(id, lt, rt, lhs, rhs),
            Op::Lt | Op::Le | Op::Gt | Op::Ge => self.check_comparison(id, lt, rt, lhs, rhs),
            Op::And | Op::Or => {
                let bool_t = self.types.builtin(Builtin::Bool);
                if !self.is_error(lt) && lt != bool_t {
                    self.err(DiagnosticCode::TypeMismatch, self.ast.expr(lhs).span, vec![
                        "bool".to_string(),
                        self.types.to_string(lt),
                    ]);
                }
                if !self.is_error(rt) && rt != bool_t {
                    self.err(DiagnosticCode::TypeMismatch, self.ast.expr(rhs).span, vec![
                        "bool".to_string(),
                        self.types.to_string(rt),
                    ]);
                }
                bool_t
            }
            Op::BitAnd | Op::BitOr | Op::BitXor | Op::Shl | Op::Shr => {
                if self.is_int_builtin(lt) && lt == rt {
                    lt
                } else {
                    self.err(DiagnosticCode::TypeErrorGeneric, self.ast.expr(id).span, vec![
                        "no matching operator overload for bitwise operator".to_string()
                    ]);
                    self.types.error()
                }
            }
            _ => {
                self.err(DiagnosticCode::TypeErrorGeneric, self.ast.expr(id).span, vec![
                    "no matching operator overload".to_string()
                ]);
                self.types.error()
            }
        }
    }

    fn check_equality(&mut self, id: ExprId, _op: Op, lt: TypeId, rt: TypeId, _lhs: ExprId) -> TypeId {
        let bool_t = self.types.builtin(Builtin::Bool);
        let both_builtin = matches!(self.types.get(lt), Type::Builtin(_)) && matches!(self.types.get(rt), Type::Builtin(_));
        if !both_builtin && !self.is_null(lt) && !self.is_null(rt) {
            self.err(DiagnosticCode::TypeErrorGeneric, self.ast.expr(id).span, vec![
                "no matching operator overload for equality".to_string()
            ]);
            return self.types.error();
        }
        if self.is_null(lt) && !self.is_optional(rt) && !self.is_null(rt) {
            self.err(DiagnosticCode::TypeMismatch, self.ast.expr(id).span, vec![
                self.types.to_string(lt),
                self.types.to_string(rt),
            ]);
        }
        if self.is_null(rt) && !self.is_optional(lt) && !self.is_null(lt) {
            self.err(DiagnosticCode::TypeMismatch, self.ast.expr(id).span, vec![
                self.types.to_string(lt),
                self.types.to_string(rt),
            ]);
        }
        bool_t
    }

    fn check_arithmetic(&mut self, id: ExprId, lt: TypeId, rt: TypeId, lhs: ExprId, rhs: ExprId) -> TypeId {
        let both_builtin = matches!(self.types.get(lt), Type::Builtin(_)) && matches!(self.types.get(rt), Type::Builtin(_));
        if !both_builtin {
            self.err(DiagnosticCode::TypeErrorGeneric, self.ast.expr(id).span, vec![
                "no matching operator overload for arithmetic".to_string()
            ]);
            return self.types.error();
        }
        if (self.is_float_builtin(lt) && self.is_infer_int(rt)) || (self.is_float_builtin(rt) && self.is_infer_int(lt)) {
            self.err(DiagnosticCode::IntToFloatNotImplicit, self.ast.expr(id).span, vec![
                "{integer}".to_string(),
                "float".to_string(),
            ]);
            return self.types.error();
        }
        if self.is_infer_int(lt) && self.is_int_builtin(rt) {
            if !self.resolve_infer_int_in_context(lhs, rt) {
                return self.types.error();
            }
            return rt;
        }
        if self.is_infer_int(rt) && self.is_int_builtin(lt) {
            if !self.resolve_infer_int_in_context(rhs, lt) {
                return self.types.error();
            }
            return lt;
        }
        if self.is_infer_int(lt) && self.is_infer_int(rt) {
            return self.types.builtin(Builtin::InferInteger);
        }
        if lt != rt && !self.is_error(lt) && !self.is_error(rt) {
            self.err(DiagnosticCode::TypeMismatch, self.ast.expr(id).span, vec![
                self.types.to_string(lt),
                self.types.to_string(rt),
            ]);
            return self.types.error();
        }
        if self.is_error(lt) { rt } else { lt }
    }

    fn check_comparison(&mut self, id: ExprId, mut lt: TypeId, mut rt: TypeId, lhs: ExprId, rhs: ExprId) -> TypeId {
        let bool_t = self.types.builtin(Builtin::Bool);
        let both_builtin = matches!(self.types.get(lt), Type::Builtin(_)) && matches!(self.types.get(rt), Type::Builtin(_));
        if !both_builtin {
            self.err(DiagnosticCode::TypeErrorGeneric, self.ast.expr(id).span, vec![
                "no matching operator overload for comparison".to_string()
            ]);
            return self.types.error();
        }
        if self.is_infer_int(lt) && self.is_int_builtin(rt) {
            if !self.resolve_infer_int_in_context(lhs, rt) {
                return bool_t;
            }
            lt = rt;
        } else if self.is_infer_int(rt) && self.is_int_builtin(lt) {
            if !self.resolve_infer_int_in_context(rhs, lt) {
                return bool_t;
            }
            rt = lt;
        } else if self.is_infer_int(lt) || self.is_infer_int(rt) {
            self.err(DiagnosticCode::IntNeedsContext, self.ast.expr(id).span, vec![]);
            return bool_t;
        }
        if lt != rt && !self.is_error(lt) && !self.is_error(rt) {
            self.err(DiagnosticCode::TypeMismatch, self.ast.expr(id).span, vec![
                self.types.to_string(lt),
                self.types.to_string(rt),
            ]);
        }
        bool_t
    }

    fn check_assign(&mut self, id: ExprId, lhs: ExprId, rhs: ExprId) -> TypeId {
        if !self.is_place_expr(lhs) {
            self.err(DiagnosticCode::LhsMustBePlace, self.ast.expr(lhs).span, vec![]);
            self.check_expr(rhs);
            return self.types.error();
        }
        if !self.is_mutable_symbol(lhs) {
            if let Some(sym) = self.root_place_symbol(lhs) {
                let name = self.sym.symbol(sym).name.clone();
                self.err(DiagnosticCode::WriteToImmutable, self.ast.expr(lhs).span, vec![name]);
            }
        }
        let expected = self.check_expr(lhs);
        let mut actual = self.check_expr(rhs);
        if self.is_infer_int(actual) && self.is_int_builtin(expected) {
            self.resolve_infer_int_in_context(rhs, expected);
            actual = self.check_expr(rhs);
        }
        if !self.can_assign(expected, actual) {
            self.err(DiagnosticCode::TypeMismatch, self.ast.expr(id).span, vec![
                self.types.to_string(expected),
                self.types.to_string(actual),
            ]);
        }
        if let Some(sym) = self.root_place_symbol(lhs) {
            self.resolve_infer_int_for_symbol(sym, expected);
        }
        expected
    }

    fn check_postfix(&mut self, id: ExprId, op: Op, operand: ExprId) -> TypeId {
        let t = self.check_expr(operand);
        if !self.is_place_expr(operand) {
            self.err(DiagnosticCode::LhsMustBePlace, self.ast.expr(operand).span, vec![]);
            return self.types.error();
        }
        if !self.acts_operator_map.is_empty() {
            if let Some(target) = self.resolve_postfix_operator_overload(op, t) {
                self.set_overload_target(id, target);
                return match self.fn_decl_type.get(&target) {
                    Some(ty) => match self.types.get(*ty) {
                        Type::Fn(sig) => sig.ret,
                        _ => self.types.error(),
                    },
                    None => self.types.error(),
                };
            }
        }
        if self.is_int_builtin(t) || self.is_float_builtin(t) {
            t
        } else {
            self.err(DiagnosticCode::TypeErrorGeneric, self.ast.expr(id).span, vec![
                "no matching operator overload for postfix operator".to_string()
            ]);
            self.types.error()
        }
    }

    fn check_borrow(&mut self, id: ExprId, is_mut: bool, operand: ExprId) -> TypeId {
        let t = self.check_expr(operand);
        if !self.is_place_expr(operand) {
            self.err(DiagnosticCode::LhsMustBePlace, self.ast.expr(id).span, vec![]);
            return self.types.error();
        }
        if is_mut && !self.is_mutable_symbol(operand) {
            if let Some(sym) = self.root_place_symbol(operand) {
                let name = self.sym.symbol(sym).name.clone();
                self.err(DiagnosticCode::WriteToImmutable, self.ast.expr(id).span, vec![name]);
            }
        }
        self.types.make_borrow(t, is_mut)
    }

    fn check_escape(&mut self, id: ExprId, operand: ExprId) -> TypeId {
        let t = self.check_expr(operand);
        if !self.is_place_expr(operand) {
            self.err(DiagnosticCode::LhsMustBePlace, self.ast.expr(id).span, vec![]);
            return self.types.error();
        }
        self.types.make_escape(t)
    }

    fn check_if_expr(&mut self, cond: ExprId, then_block: crate::ids::StmtId, else_block: Option<crate::ids::StmtId>) -> TypeId {
        let ct = self.check_expr(cond);
        let bool_t = self.types.builtin(Builtin::Bool);
        if !self.is_error(ct) && ct != bool_t {
            self.err(DiagnosticCode::TypeMismatch, self.ast.expr(cond).span, vec![
                "bool".to_string(),
                self.types.to_string(ct),
            ]);
        }
        let then_t = self.check_block_as_value(then_block);
        match else_block {
            Some(else_stmt) => {
                let else_t = self.check_block_as_value(else_stmt);
                self.unify(then_t, else_t)
            }
            None => self.types.builtin(Builtin::Null),
        }
    }

    /// Checks a `Block`/`DoScope` statement as if it produced a value
    /// (its tail expression in value context, or `null` without one) —
    /// used by both `if-expr` branches and `block-expr` (§4.3.7).
    pub(crate) fn check_block_as_value(&mut self, block: crate::ids::StmtId) -> TypeId {
        let children = self.ast.block_children(self.ast.stmt(block)).to_vec();
        let Some((last, rest)) = children.split_last() else {
            return self.types.builtin(Builtin::Null);
        };
        for s in rest {
            self.check_stmt(*s);
        }
        match &self.ast.stmt(*last).kind {
            crate::ast::StmtKind::ExprStmt(e) => self.check_expr_in(*e, Slot::Value),
            _ => {
                self.check_stmt(*last);
                self.types.builtin(Builtin::Null)
            }
        }
    }

    fn check_block_expr(&mut self, block: crate::ids::StmtId, slot: Slot) -> TypeId {
        if slot == Slot::Value {
            self.check_block_as_value(block)
        } else {
            let children = self.ast.block_children(self.ast.stmt(block)).to_vec();
            for s in children {
                self.check_stmt(s);
            }
            self.types.builtin(Builtin::Null)
        }
    }

    fn check_loop_expr(&mut self, body: crate::ids::StmtId) -> TypeId {
        // This AST shape only ever represents the headerless `loop { .. }`
        // form (no condition to fall out of), so it can never end
        // naturally — only a `break` ends it (§4.3.7, spec.md:143).
        self.loop_stack.push(super::state::LoopFrame {
            may_natural_end: false,
            ..Default::default()
        });
        let children = self.ast.block_children(self.ast.stmt(body)).to_vec();
        for s in children {
            self.check_stmt(s);
        }
        let frame = self.loop_stack.pop().unwrap();
        if !frame.has_any_break {
            return if frame.may_natural_end { self.types.builtin(Builtin::Null) } else { self.types.builtin(Builtin::Never) };
        }
        if frame.has_value_break && !frame.has_null_break && !frame.may_natural_end {
            return frame.joined_value_type;
        }
        if frame.has_value_break {
            return self.types.make_optional(frame.joined_value_type);
        }
        self.types.builtin(Builtin::Null)
    }

    fn check_array_lit(&mut self, elem_begin: u32, elem_count: u32) -> TypeId {
        let elems = self.ast.expr_list(elem_begin, elem_count).to_vec();
        if elems.is_empty() {
            let err = self.types.error();
            return self.types.make_array(err, true, Some(0));
        }
        let mut elem_ty = self.check_expr(elems[0]);
        for e in &elems[1..] {
            let t = self.check_expr(*e);
            elem_ty = self.unify(elem_ty, t);
        }
        self.types.make_array(elem_ty, true, Some(elems.len() as u64))
    }

    fn check_field_init(&mut self, type_node: Option<crate::ids::TypeNodeId>, entry_begin: u32, entry_count: u32) -> TypeId {
        let owner = match type_node {
            Some(tn) => self.resolve_type_node(tn),
            None => return self.types.error(),
        };
        let entries = self.ast.field_init_entry_slice(entry_begin, entry_count).to_vec();
        let meta = self.field_abi_meta.get(&owner).copied();
        let members = meta.and_then(|m| match &self.ast.stmt(m.stmt_id).kind {
            crate::ast::StmtKind::FieldDecl { member_begin, member_count, .. } => Some((*member_begin, *member_count)),
            _ => None,
        });
        for entry in &entries {
            let actual = self.check_expr(entry.expr);
            if let Some((begin, count)) = members {
                let found = self.ast.field_member_slice(begin, count).iter().find(|m| m.name == entry.name).cloned();
                match found {
                    Some(m) => {
                        let expected = self.resolve_type_node(m.type_node);
                        if self.is_infer_int(actual) && self.is_int_builtin(expected) {
                            self.resolve_infer_int_in_context(entry.expr, expected);
                        } else if !self.can_assign(expected, actual) {
                            self.err(DiagnosticCode::TypeArgTypeMismatch, entry.span, vec![
                                entry.name.clone(),
                                self.types.to_string(expected),
                                self.types.to_string(actual),
                            ]);
                        }
                    }
                    None => {
                        self.err(DiagnosticCode::TypeErrorGeneric, entry.span, vec![
                            format!("unknown field member '{}'", entry.name)
                        ]);
                    }
                }
            }
        }
        owner
    }

    fn check_index(&mut self, base: ExprId, index: ExprId) -> TypeId {
        let base_t = self.check_expr(base);
        let base_t = self.read_decay_borrow(base_t);
        let index_t = self.check_expr(index);
        if self.is_range_expr(index) {
            return base_t; // slice view of the same element type, non-place (§3.5(d))
        }
        if !self.is_index_int_type(index_t) && !self.is_infer_int(index_t) && !self.is_error(index_t) {
            self.err(DiagnosticCode::TypeMismatch, self.ast.expr(index).span, vec![
                "integer".to_string(),
                self.types.to_string(index_t),
            ]);
        }
        if self.is_infer_int(index_t) {
            let usize_t = self.types.builtin(Builtin::USize);
            self.resolve_infer_int_in_context(index, usize_t);
        }
        match self.types.get(base_t).clone() {
            Type::Array { elem, .. } => elem,
            Type::Error => self.types.error(),
            _ => {
                self.err(DiagnosticCode::TypeErrorGeneric, self.ast.expr(base).span, vec![
                    format!("cannot index into {}", self.types.to_string(base_t))
                ]);
                self.types.error()
            }
        }
    }

    fn check_field_access(&mut self, id: ExprId, base: ExprId, name: &str) -> TypeId {
        let mut base_t = self.check_expr(base);
        base_t = self.read_decay_borrow(base_t);
        if self.is_error(base_t) {
            return self.types.error();
        }
        let Some(meta) = self.field_abi_meta.get(&base_t).copied() else {
            self.err(DiagnosticCode::TypeErrorGeneric, self.ast.expr(id).span, vec![
                format!("member access is only available on field values in v0, got {}", self.types.to_string(base_t))
            ]);
            return self.types.error();
        };
        let (begin, count) = match &self.ast.stmt(meta.stmt_id).kind {
            crate::ast::StmtKind::FieldDecl { member_begin, member_count, .. } => (*member_begin, *member_count),
            _ => {
                self.err(DiagnosticCode::TypeErrorGeneric, self.ast.expr(id).span, vec!["invalid field metadata".to_string()]);
                return self.types.error();
            }
        };
        match self.ast.field_member_slice(begin, count).iter().find(|m| m.name == name).cloned() {
            Some(m) => self.resolve_type_node(m.type_node),
            None => {
                self.err(DiagnosticCode::TypeErrorGeneric, self.ast.expr(id).span, vec![
                    format!("unknown field member '{}'", name)
                ]);
                self.types.error()
            }
        }
    }

    fn check_cast(&mut self, id: ExprId, kind: CastKind, operand: Option<ExprId>, target: Option<crate::ids::TypeNodeId>) -> TypeId {
        let Some(operand) = operand else {
            self.err(DiagnosticCode::CastMissingOperand, self.ast.expr(id).span, vec![]);
            return self.types.error();
        };
        let Some(target) = target else {
            self.err(DiagnosticCode::CastMissingTarget, self.ast.expr(id).span, vec![]);
            return self.types.error();
        };
        let src = self.check_expr(operand);
        let target_ty = self.resolve_type_node(target);

        if self.is_null(src) {
            if !self.is_optional(target_ty) && !matches!(kind, CastKind::Optional | CastKind::Forced) {
                self.err(DiagnosticCode::CastNullToNonOptional, self.ast.expr(id).span, vec![self.types.to_string(target_ty)]);
                return self.types.error();
            }
        } else if src != target_ty {
            // Open Question (b): v0 permits only numeric scalar-to-scalar
            // casts beyond the identity/null cases above.
            let numeric = |t: TypeId, tc: &Self| tc.is_int_builtin(t) || tc.is_float_builtin(t);
            if !(numeric(src, self) && numeric(target_ty, self)) {
                self.err(DiagnosticCode::CastNotAllowed, self.ast.expr(id).span, vec![
                    self.types.to_string(src),
                    self.types.to_string(target_ty),
                ]);
                return self.types.error();
            }
        }

        match kind {
            CastKind::Strict | CastKind::Forced => target_ty,
            CastKind::Optional => self.types.make_optional(target_ty),
        }
    }

    fn check_null_coalesce(&mut self, id: ExprId, lhs: ExprId, rhs: ExprId) -> TypeId {
        let lt = self.check_expr(lhs);
        let mut rt = self.check_expr(rhs);
        if self.is_error(lt) || self.is_error(rt) {
            return self.types.error();
        }
        if self.is_null(lt) {
            return rt;
        }
        if !self.is_optional(lt) {
            self.err(DiagnosticCode::TypeMismatch, self.ast.expr(id).span, vec!["optional".to_string(), self.types.to_string(lt)]);
            return self.types.error();
        }
        let elem = self.optional_elem(lt);
        if self.is_infer_int(rt) {
            self.resolve_infer_int_in_context(rhs, elem);
            rt = self.check_expr(rhs);
        }
        if !self.can_assign(elem, rt) {
            self.err(DiagnosticCode::TypeNullCoalesceRhsMismatch, self.ast.expr(id).span, vec![
                self.types.to_string(elem),
                self.types.to_string(rt),
            ]);
            return self.types.error();
        }
        elem
    }

    fn check_null_coalesce_assign(&mut self, id: ExprId, lhs: ExprId, rhs: ExprId) -> TypeId {
        if !self.is_place_expr(lhs) {
            self.err(DiagnosticCode::LhsMustBePlace, self.ast.expr(lhs).span, vec![]);
            return self.types.error();
        }
        if !self.is_mutable_symbol(lhs) {
            if let Some(sym) = self.root_place_symbol(lhs) {
                let name = self.sym.symbol(sym).name.clone();
                self.err(DiagnosticCode::WriteToImmutable, self.ast.expr(lhs).span, vec![name]);
            }
        }
        let lt = self.check_expr(lhs);
        if !self.is_optional(lt) {
            self.err(DiagnosticCode::TypeMismatch, self.ast.expr(id).span, vec!["optional".to_string(), self.types.to_string(lt)]);
            return self.types.error();
        }
        let elem = self.optional_elem(lt);
        let mut rt = self.check_expr(rhs);
        if self.is_infer_int(rt) {
            self.resolve_infer_int_in_context(rhs, elem);
            rt = self.check_expr(rhs);
        }
        if !self.can_assign(elem, rt) {
            self.err(DiagnosticCode::TypeNullCoalesceRhsMismatch, self.ast.expr(id).span, vec![
                self.types.to_string(elem),
                self.types.to_string(rt),
            ]);
        }
        lt
    }

    fn check_call(&mut self, id: ExprId, callee: ExprId, arg_begin: u32, arg_count: u32) -> TypeId {
        let args = self.ast.call_args(arg_begin, arg_count).to_vec();

        if let ExprKind::Field { base, name } = self.ast.expr(callee).kind.clone() {
            if let Some(ty) = self.check_method_call(id, callee, base, &name, &args) {
                return ty;
            }
        }

        let callee_t = self.check_expr(callee);

        let Type::Fn(sig) = self.types.get(callee_t).clone() else {
            if !self.is_error(callee_t) {
                self.err(DiagnosticCode::TypeNotCallable, self.ast.expr(id).span, vec![self.types.to_string(callee_t)]);
            }
            for a in &args {
                if let Some(e) = a.expr {
                    self.check_expr(e);
                }
                if matches!(a.kind, crate::ast::ArgKind::NamedGroup) {
                    for c in self.ast.named_group_children(a).to_vec() {
                        if let Some(e) = c.expr {
                            self.check_expr(e);
                        }
                    }
                }
            }
            return self.types.error();
        };

        let callee_name = match &self.ast.expr(callee).kind {
            ExprKind::Ident(n) => n.clone(),
            _ => String::new(),
        };
        let overload_decls = if callee_name.is_empty() {
            Vec::new()
        } else if self.is_fn_symbol(self.ast.expr(callee)).is_some() {
            self.fn_decl_by_name.get(&callee_name).cloned().unwrap_or_default()
        } else {
            Vec::new()
        };

        let classified = self.classify_call(&args);

        if let Some(span) = classified.duplicate_group_span {
            self.err(DiagnosticCode::CallOnlyOneNamedGroupAllowed, span, vec![]);
            return sig.ret;
        }
        if matches!(classified.form, super::overload::CallForm::MixedInvalid) {
            self.err(DiagnosticCode::CallArgMixNotAllowed, self.ast.expr(id).span, vec![]);
            return sig.ret;
        }
        if self.find_duplicate_label(&classified.labeled) || self.find_duplicate_label(&classified.group) {
            return sig.ret;
        }

        if overload_decls.is_empty() {
            return self.check_call_single_signature(id, &sig, &classified);
        }

        let target = self.resolve_overload(&callee_name, self.ast.expr(id).span, &classified, &overload_decls, |tc, e, expected| {
            let mut actual = tc.check_expr(e);
            if tc.is_infer_int(actual) && tc.is_int_builtin(expected) {
                tc.resolve_infer_int_in_context(e, expected);
                actual = tc.check_expr(e);
            }
            actual
        });

        match target {
            Some(sid) => {
                self.set_overload_target(id, sid);
                match self.fn_decl_type.get(&sid) {
                    Some(ty) => match self.types.get(*ty) {
                        Type::Fn(sig) => sig.ret,
                        _ => self.types.error(),
                    },
                    None => self.types.error(),
                }
            }
            None => self.types.error(),
        }
    }

    /// Tries `callee`'s `base.name(...)` shape as a dot-method call against
    /// the acts method map before falling back to ordinary field access
    /// (§4.3.5). Returns `None` when `name` isn't registered on `base`'s
    /// type at all, so the caller can fall through to treating `base.name`
    /// as a plain (possibly function-valued) field read.
    fn check_method_call(
        &mut self,
        id: ExprId,
        field_expr: ExprId,
        base: ExprId,
        name: &str,
        args: &[Arg],
    ) -> Option<TypeId> {
        let mut base_t = self.check_expr(base);
        base_t = self.read_decay_borrow(base_t);
        if self.is_error(base_t) {
            return None;
        }
        let candidates = self.resolve_method_overload(base_t, name);
        if candidates.is_empty() {
            return None;
        }
        // The `base.name` sub-expression never gets its own dispatch (it
        // isn't a standalone field read here); cache the receiver's type
        // on it so a repeat visit short-circuits instead of re-erroring.
        self.set_expr_type(field_expr, base_t);

        let classified = self.classify_call(args);
        if let Some(span) = classified.duplicate_group_span {
            self.err(DiagnosticCode::CallOnlyOneNamedGroupAllowed, span, vec![]);
            return Some(self.types.error());
        }
        if matches!(classified.form, super::overload::CallForm::MixedInvalid) {
            self.err(DiagnosticCode::CallArgMixNotAllowed, self.ast.expr(id).span, vec![]);
            return Some(self.types.error());
        }
        if self.find_duplicate_label(&classified.labeled) || self.find_duplicate_label(&classified.group) {
            return Some(self.types.error());
        }

        let span = self.ast.expr(id).span;
        let target = self.resolve_method_overload_call(name, span, &classified, &candidates, |tc, e, expected| {
            let mut actual = tc.check_expr(e);
            if tc.is_infer_int(actual) && tc.is_int_builtin(expected) {
                tc.resolve_infer_int_in_context(e, expected);
                actual = tc.check_expr(e);
            }
            actual
        });

        Some(match target {
            Some(sid) => {
                self.set_overload_target(id, sid);
                match self.fn_decl_type.get(&sid) {
                    Some(ty) => match self.types.get(*ty) {
                        Type::Fn(sig) => sig.ret,
                        _ => self.types.error(),
                    },
                    None => self.types.error(),
                }
            }
            None => self.types.error(),
        })
    }

    fn check_call_single_signature(
        &mut self,
        id: ExprId,
        sig: &crate::types::FnSig,
        classified: &super::overload::ClassifiedCall<'_>,
    ) -> TypeId {
        let provided = classified.positional.len() + classified.labeled.len();
        if provided != sig.params.len() {
            self.err(DiagnosticCode::TypeArgCountMismatch, self.ast.expr(id).span, vec![
                sig.params.len().to_string(),
                provided.to_string(),
            ]);
        }
        let args: Vec<FlatArg> = classified.positional.iter().chain(classified.labeled.iter()).copied().collect();
        for (i, a) in args.iter().enumerate() {
            if i >= sig.params.len() {
                break;
            }
            let expected = sig.params[i];
            let Some(expr) = a.expr else { continue };
            let mut actual = self.check_expr(expr);
            if self.is_infer_int(actual) && self.is_int_builtin(expected) {
                self.resolve_infer_int_in_context(expr, expected);
                actual = self.check_expr(expr);
            }
            if !self.can_assign(expected, actual) {
                self.err(DiagnosticCode::TypeArgTypeMismatch, a.span, vec![
                    i.to_string(),
                    self.types.to_string(expected),
                    self.types.to_string(actual),
                ]);
            }
        }
        for a in &classified.group {
            if let Some(e) = a.expr {
                self.check_expr(e);
            }
        }
        sig.ret
    }
}
