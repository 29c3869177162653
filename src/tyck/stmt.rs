//! Pass 2 statement checking (§4.3.2, §4.3.7).

use crate::ast::StmtKind;
use crate::diagnostics::DiagnosticCode;
use crate::ids::StmtId;
use crate::symbols::SymbolKind;
use crate::types::Builtin;

use super::state::{ActsSelection, FnContext, TypeChecker};

impl<'a> TypeChecker<'a> {
    pub(crate) fn check_stmt(&mut self, id: StmtId) {
        let kind = self.ast.stmt(id).kind.clone();
        match kind {
            StmtKind::ExprStmt(e) => {
                self.check_expr_in(e, super::state::Slot::Discard);
            }
            StmtKind::VarDecl { name, is_mut, type_node, init } => self.check_var_decl(id, &name, is_mut, type_node, init),
            StmtKind::If { cond, then_block, else_block } => self.check_if_stmt(cond, then_block, else_block),
            StmtKind::While { cond, body } => self.check_while(cond, body),
            StmtKind::DoScope { body } => self.check_scope_body(body),
            StmtKind::DoWhile { body, cond } => self.check_do_while(body, cond),
            StmtKind::Manual { body } => self.check_scope_body(body),
            StmtKind::Return(val) => self.check_return(id, val),
            StmtKind::Break(val) => self.check_break(id, val),
            StmtKind::Continue => self.check_continue(id),
            StmtKind::Block { stmt_begin, stmt_count } => {
                let children = self.ast.stmt_children()[stmt_begin as usize..(stmt_begin + stmt_count) as usize].to_vec();
                self.sym.push_scope();
                for c in children {
                    self.check_stmt(c);
                }
                self.sym.pop_scope();
            }
            StmtKind::Switch { scrutinee, case_begin, case_count } => self.check_switch(scrutinee, case_begin, case_count),
            StmtKind::Commit(e) => {
                self.check_expr(e);
            }
            StmtKind::Recast { operand, target } => self.check_recast(id, operand, target),
            StmtKind::FnDecl { .. } => self.check_fn_decl_body(id),
            StmtKind::FieldDecl { .. } => {
                // Field member type nodes were already validated via
                // resolve_type_node during pass 1's precollect; nothing
                // further to check at statement granularity.
            }
            StmtKind::ActsDecl { member_begin, member_count, .. } => {
                let members = self.ast.stmt_children()[member_begin as usize..(member_begin + member_count) as usize].to_vec();
                for m in members {
                    self.check_fn_decl_body(m);
                }
            }
            StmtKind::ClassDecl { member_begin, member_count, .. } => {
                let members = self.ast.stmt_children()[member_begin as usize..(member_begin + member_count) as usize].to_vec();
                for m in members {
                    self.check_stmt(m);
                }
            }
            StmtKind::ProtoDecl { .. } => {
                // Protocol declarations carry no bodies to check in v0; a
                // proto's conformance is verified where a class claims it.
            }
            StmtKind::GlobalVarDecl { name, is_mut, type_node, init, .. } => {
                self.check_global_var(&name, is_mut, type_node, init);
            }
            StmtKind::Nest { path_segs, body } => {
                let depth_before = self.namespace_stack.len();
                self.namespace_stack.extend(path_segs);
                // A block-form `nest a::b { ... }` pops back to the
                // enclosing namespace afterward; a file-level `nest a::b;`
                // directive (no body) extends to the rest of the file.
                match body {
                    Some(b) => {
                        self.check_scope_body(b);
                        self.namespace_stack.truncate(depth_before);
                    }
                    None => {}
                }
            }
            StmtKind::UseActsSelection { target_type, selected, body } => {
                self.check_use_acts_selection(target_type, selected, body);
            }
        }
    }

    fn check_scope_body(&mut self, body: StmtId) {
        self.sym.push_scope();
        let children = self.ast.block_children(self.ast.stmt(body)).to_vec();
        for c in children {
            self.check_stmt(c);
        }
        self.sym.pop_scope();
    }

    fn check_var_decl(
        &mut self,
        stmt_id: StmtId,
        name: &str,
        is_mut: bool,
        type_node: Option<crate::ids::TypeNodeId>,
        init: Option<crate::ids::ExprId>,
    ) {
        let span = self.ast.stmt(stmt_id).span;
        let declared = type_node.map(|tn| self.resolve_type_node(tn));

        let res = self.sym.insert_mut(
            SymbolKind::Var,
            name,
            declared.unwrap_or_else(|| self.types.builtin(Builtin::InferInteger)),
            span,
            is_mut,
        );
        if res.is_duplicate() {
            self.err(DiagnosticCode::DuplicateDecl, span, vec![name.to_string()]);
            return;
        }
        if res.is_shadowing() {
            self.diags.push(crate::diagnostics::Diagnostic::new(
                crate::diagnostics::Severity::Warning,
                DiagnosticCode::Shadowing,
                span,
                vec![name.to_string()],
            ));
        }

        let Some(init_expr) = init else {
            if declared.is_none() {
                self.err(DiagnosticCode::IntNeedsContext, span, vec![]);
            }
            return;
        };

        match declared {
            Some(expected) => {
                let mut actual = self.check_expr(init_expr);
                if self.is_infer_int(actual) && self.is_int_builtin(expected) {
                    self.resolve_infer_int_in_context(init_expr, expected);
                    actual = self.check_expr(init_expr);
                }
                if !self.can_assign(expected, actual) {
                    self.err(DiagnosticCode::TypeMismatch, span, vec![
                        self.types.to_string(expected),
                        self.types.to_string(actual),
                    ]);
                }
                self.sym.update_declared_type(res.symbol_id, expected);
            }
            None => {
                let actual = self.check_expr(init_expr);
                if self.is_infer_int(actual) {
                    if let crate::ast::ExprKind::IntLiteral { text } = &self.ast.expr(init_expr).kind {
                        if let Some(v) = self.parse_int_literal(text) {
                            self.pending_int_sym.insert(res.symbol_id, super::state::PendingInt::new(v));
                        }
                    }
                } else {
                    self.sym.update_declared_type(res.symbol_id, actual);
                }
            }
        }
    }

    fn check_if_stmt(&mut self, cond: crate::ids::ExprId, then_block: StmtId, else_block: Option<StmtId>) {
        let ct = self.check_expr(cond);
        let bool_t = self.types.builtin(Builtin::Bool);
        if !self.is_error(ct) && ct != bool_t {
            self.err(DiagnosticCode::TypeMismatch, self.ast.expr(cond).span, vec![
                "bool".to_string(),
                self.types.to_string(ct),
            ]);
        }
        self.check_scope_body(then_block);
        if let Some(e) = else_block {
            self.check_scope_body(e);
        }
    }

    fn check_while(&mut self, cond: crate::ids::ExprId, body: StmtId) {
        let ct = self.check_expr(cond);
        let bool_t = self.types.builtin(Builtin::Bool);
        if !self.is_error(ct) && ct != bool_t {
            self.err(DiagnosticCode::TypeMismatch, self.ast.expr(cond).span, vec![
                "bool".to_string(),
                self.types.to_string(ct),
            ]);
        }
        self.loop_stack.push(super::state::LoopFrame { may_natural_end: true, ..Default::default() });
        self.check_scope_body(body);
        self.loop_stack.pop();
    }

    fn check_do_while(&mut self, body: StmtId, cond: crate::ids::ExprId) {
        self.loop_stack.push(super::state::LoopFrame { may_natural_end: true, ..Default::default() });
        self.check_scope_body(body);
        self.loop_stack.pop();
        let ct = self.check_expr(cond);
        let bool_t = self.types.builtin(Builtin::Bool);
        if !self.is_error(ct) && ct != bool_t {
            self.err(DiagnosticCode::TypeMismatch, self.ast.expr(cond).span, vec![
                "bool".to_string(),
                self.types.to_string(ct),
            ]);
        }
    }

    fn check_return(&mut self, id: StmtId, val: Option<crate::ids::ExprId>) {
        if !self.fn_ctx.in_fn {
            self.err(DiagnosticCode::ReturnOutsideFn, self.ast.stmt(id).span, vec![]);
            if let Some(e) = val {
                self.check_expr(e);
            }
            return;
        }
        let expected = self.fn_ctx.ret_type;
        match val {
            Some(e) => {
                let mut actual = self.check_expr(e);
                if self.is_infer_int(actual) && self.is_int_builtin(expected) {
                    self.resolve_infer_int_in_context(e, expected);
                    actual = self.check_expr(e);
                }
                if !self.can_assign(expected, actual) {
                    self.err(DiagnosticCode::ReturnTypeMismatch, self.ast.stmt(id).span, vec![
                        self.types.to_string(expected),
                        self.types.to_string(actual),
                    ]);
                }
            }
            None => {
                let unit_t = self.types.builtin(Builtin::Unit);
                if !self.is_error(expected) && expected != unit_t {
                    self.err(DiagnosticCode::ReturnTypeMismatch, self.ast.stmt(id).span, vec![
                        self.types.to_string(expected),
                        "unit".to_string(),
                    ]);
                }
            }
        }
    }

    fn check_break(&mut self, id: StmtId, val: Option<crate::ids::ExprId>) {
        if self.loop_stack.is_empty() {
            self.err(DiagnosticCode::BreakOutsideLoop, self.ast.stmt(id).span, vec![]);
            if let Some(e) = val {
                self.check_expr(e);
            }
            return;
        }
        match val {
            Some(e) => {
                let t = self.check_expr(e);
                self.note_break(Some(t));
            }
            None => self.note_break(None),
        }
    }

    fn check_continue(&mut self, id: StmtId) {
        if self.loop_stack.is_empty() {
            self.err(DiagnosticCode::ContinueOutsideLoop, self.ast.stmt(id).span, vec![]);
        }
    }

    fn check_switch(&mut self, scrutinee: crate::ids::ExprId, case_begin: u32, case_count: u32) {
        let st = self.check_expr(scrutinee);
        let cases = self.ast.switch_case_slice(case_begin, case_count).to_vec();
        for case in &cases {
            if let Some(pattern) = case.pattern {
                let mut pt = self.check_expr(pattern);
                if self.is_infer_int(pt) && self.is_int_builtin(st) {
                    self.resolve_infer_int_in_context(pattern, st);
                    pt = self.check_expr(pattern);
                }
                if !self.can_assign(st, pt) {
                    self.err(DiagnosticCode::TypeMismatch, case.span, vec![
                        self.types.to_string(st),
                        self.types.to_string(pt),
                    ]);
                }
            }
            self.check_scope_body(case.body);
        }
    }

    fn check_recast(&mut self, id: StmtId, operand: crate::ids::ExprId, target: crate::ids::TypeNodeId) {
        let src = self.check_expr(operand);
        let target_ty = self.resolve_type_node(target);
        if !self.is_place_expr(operand) {
            self.err(DiagnosticCode::LhsMustBePlace, self.ast.stmt(id).span, vec![]);
            return;
        }
        let numeric = |t: crate::ids::TypeId, tc: &Self| tc.is_int_builtin(t) || tc.is_float_builtin(t);
        if src != target_ty && !(numeric(src, self) && numeric(target_ty, self)) {
            self.err(DiagnosticCode::CastNotAllowed, self.ast.stmt(id).span, vec![
                self.types.to_string(src),
                self.types.to_string(target_ty),
            ]);
        }
    }

    fn check_fn_decl_body(&mut self, sid: StmtId) {
        let StmtKind::FnDecl { param_begin, param_count, body, is_pure, is_comptime, .. } = self.ast.stmt(sid).kind.clone() else {
            return;
        };
        let Some(body) = body else { return };

        let fn_ty = self.fn_decl_type.get(&sid).copied();
        let ret_type = match fn_ty {
            Some(ty) => match self.types.get(ty) {
                crate::types::Type::Fn(sig) => sig.ret,
                _ => self.types.error(),
            },
            None => self.types.error(),
        };

        let saved_ctx = self.fn_ctx;
        self.fn_ctx = FnContext { in_fn: true, ret_type, is_pure, is_comptime };

        self.sym.push_scope();
        for p in self.ast.param_slice(param_begin, param_count).to_vec() {
            let pty = match p.type_node {
                Some(tn) => self.resolve_type_node(tn),
                None => self.types.error(),
            };
            self.sym.insert(SymbolKind::Var, &p.name, pty, p.span);
        }
        let children = self.ast.block_children(self.ast.stmt(body)).to_vec();
        for c in children {
            self.check_stmt(c);
        }
        self.sym.pop_scope();

        self.fn_ctx = saved_ctx;
    }

    fn check_global_var(
        &mut self,
        name: &str,
        _is_mut: bool,
        type_node: Option<crate::ids::TypeNodeId>,
        init: Option<crate::ids::ExprId>,
    ) {
        let Some(sym) = self.sym.lookup(&self.qualify(name)) else { return };
        let Some(init_expr) = init else { return };
        let expected = type_node.map(|tn| self.resolve_type_node(tn));
        let mut actual = self.check_expr(init_expr);
        match expected {
            Some(expected) => {
                if self.is_infer_int(actual) && self.is_int_builtin(expected) {
                    self.resolve_infer_int_in_context(init_expr, expected);
                    actual = self.check_expr(init_expr);
                }
                if !self.can_assign(expected, actual) {
                    self.err(DiagnosticCode::TypeMismatch, self.ast.expr(init_expr).span, vec![
                        self.types.to_string(expected),
                        self.types.to_string(actual),
                    ]);
                }
            }
            None => {
                self.resolve_infer_int_for_symbol(sym, actual);
            }
        }
    }

    fn check_use_acts_selection(&mut self, target_type: crate::ids::TypeNodeId, selected: Option<String>, body: StmtId) {
        let owner = self.resolve_type_node(target_type);
        let selection = match selected {
            Some(name) => ActsSelection::Named(name),
            None => ActsSelection::DefaultOnly,
        };
        let mut scope = std::collections::HashMap::new();
        scope.insert(owner, selection);
        self.acts_selection_stack.push(scope);
        self.check_scope_body(body);
        self.acts_selection_stack.pop();
    }
}
