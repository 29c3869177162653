//! Assignability, unification, and place/mutability predicates (§4.3.6,
//! §4.3.7, §4.3.9). Grounded directly in the original `can_assign_` /
//! `unify_` / `is_place_expr_` family (`type_check_expr_core.cpp`).

use crate::ast::{Expr, ExprKind, Op};
use crate::ids::{ExprId, SymbolId};
use crate::symbols::SymbolKind;
use crate::types::{Builtin, Type, TypeId};

use super::state::TypeChecker;

impl<'a> TypeChecker<'a> {
    pub(crate) fn is_error(&self, t: TypeId) -> bool {
        self.types.is_error(t)
    }

    pub(crate) fn is_null(&self, t: TypeId) -> bool {
        !self.is_error(t) && matches!(self.types.get(t), Type::Builtin(Builtin::Null))
    }

    pub(crate) fn is_optional(&self, t: TypeId) -> bool {
        !self.is_error(t) && matches!(self.types.get(t), Type::Optional { .. })
    }

    pub(crate) fn optional_elem(&self, t: TypeId) -> TypeId {
        match self.types.get(t) {
            Type::Optional { inner } => *inner,
            _ => TypeId::INVALID,
        }
    }

    pub(crate) fn is_infer_int(&self, t: TypeId) -> bool {
        !self.is_error(t) && matches!(self.types.get(t), Type::Builtin(Builtin::InferInteger))
    }

    pub(crate) fn is_int_builtin(&self, t: TypeId) -> bool {
        match self.types.get(t) {
            Type::Builtin(b) => b.is_integer(),
            _ => false,
        }
    }

    pub(crate) fn is_float_builtin(&self, t: TypeId) -> bool {
        match self.types.get(t) {
            Type::Builtin(b) => b.is_float(),
            _ => false,
        }
    }

    /// Reading through a borrow decays to its pointee for expression-type
    /// purposes (§4.3.6).
    pub(crate) fn read_decay_borrow(&self, t: TypeId) -> TypeId {
        match self.types.get(t) {
            Type::Borrow { pointee, .. } => *pointee,
            _ => t,
        }
    }

    /// Full assignability matrix (§4.3.6, §4.3.9): error absorption,
    /// identity, `never` source, `null -> T?`, array size/has_size match,
    /// and `infer-integer -> any integer` (subject to a later fit check at
    /// the literal's own resolution site, not here).
    pub(crate) fn can_assign(&self, expected: TypeId, actual: TypeId) -> bool {
        if self.is_error(expected) || self.is_error(actual) {
            return true;
        }
        if expected == actual {
            return true;
        }
        if matches!(self.types.get(actual), Type::Builtin(Builtin::Never)) {
            return true;
        }
        if matches!(self.types.get(expected), Type::Builtin(Builtin::Never)) {
            return false;
        }
        if self.is_null(actual) {
            return self.is_optional(expected);
        }
        if self.is_infer_int(actual) {
            return self.is_int_builtin(expected);
        }
        if let (Type::Array { elem: ee, has_size: ehs, size: es }, Type::Array { elem: ae, has_size: ahs, size: asz }) =
            (self.types.get(expected), self.types.get(actual))
        {
            if ee != ae {
                return false;
            }
            if *ehs && *ahs {
                return es == asz;
            }
            return true;
        }
        false
    }

    /// Branch-unification rule used by if-expr and loop-expr typing
    /// (§4.3.7): identity, `never` absorption on either side, and
    /// `null`/`T?` promotion. Falls back to `error` when nothing unifies.
    pub(crate) fn unify(&mut self, a: TypeId, b: TypeId) -> TypeId {
        if self.is_error(a) || self.is_error(b) {
            return self.types.error();
        }
        if a == b {
            return a;
        }
        if matches!(self.types.get(a), Type::Builtin(Builtin::Never)) {
            return b;
        }
        if matches!(self.types.get(b), Type::Builtin(Builtin::Never)) {
            return a;
        }
        if self.is_null(a) {
            return if self.is_optional(b) { b } else { self.types.make_optional(b) };
        }
        if self.is_null(b) {
            return if self.is_optional(a) { a } else { self.types.make_optional(a) };
        }
        self.types.error()
    }

    /// Records a `break` against the innermost loop frame, folding it into
    /// the frame's eventual result-type join (§3.4, §4.3.7).
    pub(crate) fn note_break(&mut self, value_type: Option<TypeId>) {
        if self.loop_stack.is_empty() {
            return;
        }
        let existing = self.loop_stack.last().unwrap().joined_value_type;
        let top = self.loop_stack.last_mut().unwrap();
        top.has_any_break = true;
        let Some(vt) = value_type else {
            top.has_null_break = true;
            return;
        };
        top.has_value_break = true;
        let joined = if existing.is_valid() { self.unify(existing, vt) } else { vt };
        self.loop_stack.last_mut().unwrap().joined_value_type = joined;
    }

    pub(crate) fn is_range_expr(&self, id: ExprId) -> bool {
        matches!(
            self.ast.expr(id).kind,
            ExprKind::Binary { op: Op::DotDot, .. } | ExprKind::Binary { op: Op::DotDotColon, .. }
        )
    }

    pub(crate) fn is_index_int_type(&self, t: TypeId) -> bool {
        self.is_int_builtin(t)
    }

    /// A place expression is: an identifier, an index into a non-range
    /// base (recursing into the base), or a dot-field access whose root
    /// resolves through a place (§4.3.6, §3.5(d)).
    pub(crate) fn is_place_expr(&self, id: ExprId) -> bool {
        match &self.ast.expr(id).kind {
            ExprKind::Ident(_) => true,
            ExprKind::Index { base, index } => {
                if self.is_range_expr(*index) {
                    false
                } else {
                    self.is_place_expr(*base)
                }
            }
            ExprKind::Field { base, .. } => self.is_place_expr(*base),
            _ => false,
        }
    }

    /// Finds the root symbol a place expression ultimately writes through,
    /// e.g. `a[i].b` roots at `a`'s symbol (§4.3.6 mutability check).
    pub(crate) fn root_place_symbol(&self, id: ExprId) -> Option<SymbolId> {
        match &self.ast.expr(id).kind {
            ExprKind::Ident(_) => self.nres.symbol_for_expr(id.index()),
            ExprKind::Index { base, .. } => self.root_place_symbol(*base),
            ExprKind::Field { base, .. } => self.root_place_symbol(*base),
            _ => None,
        }
    }

    pub(crate) fn is_mutable_symbol(&self, id: ExprId) -> bool {
        match self.root_place_symbol(id) {
            Some(sym) => self.sym.is_mutable(sym),
            None => false,
        }
    }

    pub(crate) fn is_fn_symbol(&self, e: &Expr) -> Option<SymbolId> {
        if let ExprKind::Ident(name) = &e.kind {
            if let Some(sym) = self.sym.lookup(name) {
                if self.sym.symbol(sym).kind == SymbolKind::Fn {
                    return Some(sym);
                }
            }
        }
        None
    }
}
