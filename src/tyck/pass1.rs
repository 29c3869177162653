//! Pass 1 — top-level precollect (§4.3.2).
//!
//! Walks the program's top-level block (recursing through `nest`
//! namespace directives), qualifies every function/field/class/proto/acts/
//! global-variable name, synthesizes function types, indexes acts
//! operator/method declarations, and runs the C-ABI FFI-safety walk for
//! items marked `c_abi`.

use std::collections::HashSet;

use crate::ast::{FieldLayout, Op, Param, StmtKind};
use crate::diagnostics::DiagnosticCode;
use crate::ids::{StmtId, TypeId};
use crate::source::Span;
use crate::symbols::SymbolKind;
use crate::types::{Builtin, Type};

use super::state::{FieldAbiMeta, TypeChecker};

/// Parses a `FnDecl.attrs` operator marker of the form `operator:<name>` or
/// `postfix_operator:<name>` into an `(Op, is_postfix)` pair. This crate's
/// own convention for the attrs vector every decl statement already
/// carries (`FieldDecl`, `GlobalVarDecl`) — not a parser-level token.
fn parse_operator_attr(attr: &str) -> Option<(Op, bool)> {
    let (postfix, rest) = if let Some(r) = attr.strip_prefix("postfix_operator:") {
        (true, r)
    } else if let Some(r) = attr.strip_prefix("operator:") {
        (false, r)
    } else {
        return None;
    };
    let op = match rest {
        "+" => Op::Add,
        "-" => Op::Sub,
        "*" => Op::Mul,
        "/" => Op::Div,
        "%" => Op::Rem,
        "==" => Op::Eq,
        "!=" => Op::Ne,
        "<" => Op::Lt,
        "<=" => Op::Le,
        ">" => Op::Gt,
        ">=" => Op::Ge,
        "++" => Op::Inc,
        "--" => Op::Dec,
        _ => return None,
    };
    Some((op, postfix))
}

impl<'a> TypeChecker<'a> {
    pub(crate) fn run_pass1(&mut self, program: StmtId) {
        let top = self.ast.stmt(program);
        if !matches!(top.kind, StmtKind::Block { .. }) {
            self.err(DiagnosticCode::TopLevelMustBeBlock, top.span, vec![]);
            return;
        }
        let children = self.ast.block_children(top).to_vec();
        self.precollect_stmts(&children);
        self.check_overload_set_uniqueness();
    }

    fn precollect_stmts(&mut self, stmts: &[StmtId]) {
        for sid in stmts.iter().copied() {
            self.precollect_stmt(sid);
        }
    }

    fn precollect_stmt(&mut self, sid: StmtId) {
        let span = self.ast.stmt(sid).span;
        match self.ast.stmt(sid).kind.clone() {
            StmtKind::Nest { path_segs, body } => {
                let pushed = path_segs.len();
                self.namespace_stack.extend(path_segs);
                if let Some(b) = body {
                    let children = self.ast.block_children(self.ast.stmt(b)).to_vec();
                    self.precollect_stmts(&children);
                    // Block form pops back to the enclosing namespace; a
                    // file-level `nest a::b;` directive (no body) leaves
                    // the namespace pushed for the rest of the file.
                    for _ in 0..pushed {
                        self.namespace_stack.pop();
                    }
                }
            }
            StmtKind::FnDecl { name, param_begin, param_count, ret_type, is_pure, .. } => {
                self.precollect_fn_decl(sid, &name, param_begin, param_count, ret_type, is_pure, span);
            }
            StmtKind::FieldDecl { name, member_begin, member_count, layout, attrs } => {
                self.precollect_field_decl(sid, &name, member_begin, member_count, layout, &attrs, span);
            }
            StmtKind::ActsDecl { target_type, name, member_begin, member_count } => {
                self.precollect_acts_decl(target_type, name, member_begin, member_count);
            }
            StmtKind::ClassDecl { name, member_begin, member_count, .. } => {
                let qualified = self.qualify(&name);
                let ty = self.types.intern_ident(&qualified);
                let res = self.sym.insert(SymbolKind::Type, &qualified, ty, span);
                if res.is_duplicate() {
                    self.err(DiagnosticCode::DuplicateDecl, span, vec![qualified.clone()]);
                }
                let members = self.ast.stmt_children()
                    [member_begin as usize..(member_begin + member_count) as usize]
                    .to_vec();
                self.class_member_sets.insert(ty, members.clone());
                self.precollect_stmts(&members);
            }
            StmtKind::ProtoDecl { name, member_begin, member_count } => {
                let qualified = self.qualify(&name);
                let ty = self.types.intern_ident(&qualified);
                let res = self.sym.insert(SymbolKind::Type, &qualified, ty, span);
                if res.is_duplicate() {
                    self.err(DiagnosticCode::DuplicateDecl, span, vec![qualified.clone()]);
                }
                let members = self.ast.stmt_children()
                    [member_begin as usize..(member_begin + member_count) as usize]
                    .to_vec();
                self.proto_member_sets.insert(ty, members);
            }
            StmtKind::GlobalVarDecl { name, is_mut, type_node, init, attrs } => {
                self.precollect_global_var(sid, &name, is_mut, type_node, init, &attrs, span);
            }
            StmtKind::Block { stmt_begin, stmt_count } => {
                let children =
                    self.ast.stmt_children()[stmt_begin as usize..(stmt_begin + stmt_count) as usize].to_vec();
                self.precollect_stmts(&children);
            }
            _ => {
                // Non-declarative top-level statements are pass-2 only.
            }
        }
    }

    fn param_types(&mut self, params: &[Param]) -> (Vec<TypeId>, u32, Vec<String>, Vec<bool>) {
        let positional_count = params.iter().take_while(|p| p.label.is_none()).count() as u32;
        let mut types = Vec::with_capacity(params.len());
        let mut labels = Vec::with_capacity(params.len());
        let mut has_default = Vec::with_capacity(params.len());
        for p in params {
            let ty = match p.type_node {
                Some(tn) => self.resolve_type_node(tn),
                None => self.types.error(),
            };
            types.push(ty);
            labels.push(p.label.clone().unwrap_or_default());
            has_default.push(p.has_default);
        }
        (types, positional_count, labels, has_default)
    }

    fn precollect_fn_decl(
        &mut self,
        sid: StmtId,
        name: &str,
        param_begin: u32,
        param_count: u32,
        ret_type: Option<crate::ids::TypeNodeId>,
        _is_pure: bool,
        span: Span,
    ) {
        let params = self.ast.param_slice(param_begin, param_count).to_vec();
        let (param_types, positional_count, labels, has_default) = self.param_types(&params);
        let ret = match ret_type {
            Some(tn) => self.resolve_type_node(tn),
            None => self.types.builtin(Builtin::Unit),
        };
        let fn_ty = self.types.make_fn(ret, param_types, positional_count, labels, has_default);

        let qualified = self.qualify(name);
        if !self.fn_decl_by_name.contains_key(&qualified) {
            let res = self.sym.insert(SymbolKind::Fn, &qualified, fn_ty, span);
            // Duplicate-in-scope for the *first* sighting of a name can
            // only happen if some other kind already claimed it; that is
            // a real conflict, not an intentional overload.
            if res.is_duplicate() && self.sym.symbol(res.symbol_id).kind != SymbolKind::Fn {
                self.err(DiagnosticCode::DuplicateDecl, span, vec![qualified.clone()]);
            }
        }
        self.fn_decl_by_name.entry(qualified.clone()).or_default().push(sid);
        self.fn_qualified_names.insert(sid, qualified);
        self.fn_decl_type.insert(sid, fn_ty);
    }

    fn precollect_field_decl(
        &mut self,
        sid: StmtId,
        name: &str,
        member_begin: u32,
        member_count: u32,
        layout: FieldLayout,
        attrs: &[String],
        span: Span,
    ) {
        let qualified = self.qualify(name);
        let field_ty = self.types.intern_ident(&qualified);
        let res = self.sym.insert(SymbolKind::Field, &qualified, field_ty, span);
        if res.is_duplicate() {
            self.err(DiagnosticCode::DuplicateDecl, span, vec![qualified.clone()]);
        }
        self.field_abi_meta.insert(field_ty, FieldAbiMeta { stmt_id: sid, layout, align: 0 });

        if attrs.iter().any(|a| a == "c_abi") {
            self.check_field_ffi_safety(field_ty, member_begin, member_count, span, &mut HashSet::new());
        }
    }

    fn check_field_ffi_safety(
        &mut self,
        owner: TypeId,
        member_begin: u32,
        member_count: u32,
        span: Span,
        visiting: &mut HashSet<TypeId>,
    ) -> bool {
        if visiting.contains(&owner) {
            // Open Question (c): assume safety once already in the
            // visiting set, matching the source's cycle-tolerant walk.
            return true;
        }
        visiting.insert(owner);
        let members = self.ast.field_member_slice(member_begin, member_count).to_vec();
        let mut safe = true;
        for m in &members {
            let ty = self.resolve_type_node(m.type_node);
            if !self.is_ffi_safe(ty, visiting) {
                safe = false;
            }
        }
        visiting.remove(&owner);
        if !safe {
            self.err(DiagnosticCode::CAbiNotFfiSafe, span, vec![self.types.to_string(owner)]);
        }
        safe
    }

    fn is_ffi_safe(&mut self, ty: TypeId, visiting: &mut HashSet<TypeId>) -> bool {
        if self.is_error(ty) {
            return true;
        }
        match self.types.get(ty).clone() {
            Type::Builtin(Builtin::Unit) => true, // only disallowed as a non-return param, checked by caller
            Type::Builtin(_) => true,
            Type::Ptr { .. } => true,
            Type::Named(_) => {
                if let Some(meta) = self.field_abi_meta.get(&ty).copied() {
                    if meta.layout != FieldLayout::C {
                        return false;
                    }
                    let decl = self.ast.stmt(meta.stmt_id).kind.clone();
                    let decl_span = self.ast.stmt(meta.stmt_id).span;
                    if let StmtKind::FieldDecl { member_begin, member_count, .. } = decl {
                        return self.check_field_ffi_safety(ty, member_begin, member_count, decl_span, visiting);
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn precollect_acts_decl(
        &mut self,
        target_type: crate::ids::TypeNodeId,
        name: Option<String>,
        member_begin: u32,
        member_count: u32,
    ) {
        let owner = self.resolve_type_node(target_type);
        let members =
            self.ast.stmt_children()[member_begin as usize..(member_begin + member_count) as usize].to_vec();
        for msid in members {
            let StmtKind::FnDecl { name: fn_name, attrs, .. } = self.ast.stmt(msid).kind.clone() else { continue };
            self.acts_decl_set_name.insert(msid, name.clone());

            let mut registered_operator = false;
            for attr in &attrs {
                if let Some((op, is_postfix)) = parse_operator_attr(attr) {
                    self.acts_operator_map.entry((owner, op, is_postfix)).or_default().push(msid);
                    registered_operator = true;
                }
            }
            if !registered_operator {
                self.acts_method_map.entry(owner).or_default().entry(fn_name).or_default().push(msid);
            }

            // Each acts member is itself a precollected fn declaration, so
            // overload resolution can find it by its own qualified name too.
            if let StmtKind::FnDecl { param_begin, param_count, ret_type, is_pure, .. } = self.ast.stmt(msid).kind.clone() {
                let span = self.ast.stmt(msid).span;
                self.precollect_fn_decl(msid, &format!("{}::{}", self.types.to_string(owner), self.ast_fn_name(msid)), param_begin, param_count, ret_type, is_pure, span);
            }
        }
    }

    fn ast_fn_name(&self, sid: StmtId) -> String {
        match &self.ast.stmt(sid).kind {
            StmtKind::FnDecl { name, .. } => name.clone(),
            _ => String::new(),
        }
    }

    fn precollect_global_var(
        &mut self,
        _sid: StmtId,
        name: &str,
        is_mut: bool,
        type_node: Option<crate::ids::TypeNodeId>,
        init: Option<crate::ids::ExprId>,
        attrs: &[String],
        span: Span,
    ) {
        let qualified = self.qualify(name);
        let declared = match type_node {
            Some(tn) => self.resolve_type_node(tn),
            None => self.types.builtin(Builtin::InferInteger),
        };
        let res = self.sym.insert_mut(SymbolKind::Var, &qualified, declared, span, is_mut);
        if res.is_duplicate() {
            self.err(DiagnosticCode::DuplicateDecl, span, vec![qualified.clone()]);
        } else if res.is_shadowing() {
            self.diags.push(crate::diagnostics::Diagnostic::new(
                crate::diagnostics::Severity::Warning,
                DiagnosticCode::Shadowing,
                span,
                vec![qualified.clone()],
            ));
        }
        if type_node.is_none() {
            if let Some(init_expr) = init {
                if let crate::ast::ExprKind::IntLiteral { text } = &self.ast.expr(init_expr).kind {
                    if let Some(v) = self.parse_int_literal(text) {
                        self.pending_int_sym.insert(res.symbol_id, super::state::PendingInt::new(v));
                    }
                }
            }
        }

        if attrs.iter().any(|a| a == "c_abi") && !is_mut {
            self.err(DiagnosticCode::CAbiGlobalNotStatic, span, vec![qualified]);
        }
    }

    /// Declaration-time uniqueness checks across each overload set
    /// (§4.3.4): no two decls may share the full signature shape; two
    /// positional-only decls must differ by their positional-type vector.
    fn check_overload_set_uniqueness(&mut self) {
        let sets: Vec<(String, Vec<StmtId>)> =
            self.fn_decl_by_name.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for (name, decls) in sets {
            if decls.len() < 2 {
                continue;
            }
            let mut seen_shapes: Vec<(Vec<TypeId>, Vec<(String, TypeId, bool)>, TypeId)> = Vec::new();
            for sid in &decls {
                let Some(ty) = self.fn_decl_type.get(sid).copied() else { continue };
                let Type::Fn(sig) = self.types.get(ty).clone() else { continue };
                let pos: Vec<TypeId> = sig.params[..sig.positional_param_count as usize].to_vec();
                let named: Vec<(String, TypeId, bool)> = (sig.positional_param_count as usize..sig.params.len())
                    .map(|i| (sig.labels[i].clone(), sig.params[i], sig.has_default[i]))
                    .collect();
                let shape = (pos, named, sig.ret);
                if seen_shapes.iter().any(|s| s.0 == shape.0 && s.1 == shape.1) {
                    self.err(DiagnosticCode::OverloadDeclConflict, self.ast.stmt(*sid).span, vec![name.clone()]);
                }
                seen_shapes.push(shape);
            }
        }
    }
}
