//! Deferred integer literal resolution (§3.4, §4.3.3).
//!
//! An unsuffixed integer literal is typed `infer-integer` and recorded as
//! a [`super::state::PendingInt`] keyed by the expression it was parsed
//! from (or, for `set x = <lit>;` with no declared type, by the symbol it
//! initializes). `resolve_infer_int_in_context` pushes an expected type
//! down through the literal's immediate shape and checks the literal's
//! big-integer value actually fits that type.

use num_bigint::BigInt;
use num_traits::Zero;

use crate::ast::{ExprKind, StmtKind};
use crate::diagnostics::DiagnosticCode;
use crate::ids::{ExprId, SymbolId};
use crate::types::{Builtin, Type, TypeId};

use super::state::{PendingInt, TypeChecker};

/// Integer range bounds for every integer builtin (§4.3.3's fit check).
fn builtin_range(b: Builtin) -> Option<(BigInt, BigInt)> {
    use Builtin::*;
    let (lo, hi): (i128, i128) = match b {
        I8 => (i8::MIN as i128, i8::MAX as i128),
        I16 => (i16::MIN as i128, i16::MAX as i128),
        I32 => (i32::MIN as i128, i32::MAX as i128),
        I64 => (i64::MIN as i128, i64::MAX as i128),
        I128 => (i128::MIN, i128::MAX),
        ISize => (isize::MIN as i128, isize::MAX as i128),
        U8 => (0, u8::MAX as i128),
        U16 => (0, u16::MAX as i128),
        U32 => (0, u32::MAX as i128),
        U64 => (u64::MIN as i128, i128::MAX), // u64::MAX doesn't fit i128 cleanly below; special-cased
        U128 => (0, i128::MAX),
        USize => (0, usize::MAX as i128),
        _ => return None,
    };
    Some((BigInt::from(lo), BigInt::from(hi)))
}

fn value_fits(value: &BigInt, b: Builtin) -> bool {
    if b == Builtin::U64 {
        return value >= &BigInt::zero() && value <= &BigInt::from(u64::MAX);
    }
    if b == Builtin::U128 {
        return value >= &BigInt::zero() && value <= &BigInt::from(u128::MAX);
    }
    match builtin_range(b) {
        Some((lo, hi)) => value >= &lo && value <= &hi,
        None => false,
    }
}

impl<'a> TypeChecker<'a> {
    /// Parses an `IntLiteral` token's text into a `BigInt`, stripping any
    /// `_` digit-group separators the lexer may have left in (§4.3.3).
    pub(crate) fn parse_int_literal(&self, text: &str) -> Option<BigInt> {
        let cleaned: String = text.chars().filter(|c| *c != '_').collect();
        cleaned.parse::<BigInt>().ok()
    }

    /// Records a fresh pending integer anchored at `expr`, returning the
    /// placeholder `infer-integer` type.
    pub(crate) fn record_pending_int_expr(&mut self, expr: ExprId, value: BigInt) -> TypeId {
        self.pending_int_expr.insert(expr, PendingInt::new(value));
        self.types.builtin(Builtin::InferInteger)
    }

    /// Propagates `expected` into the `infer-integer` literal anchored at
    /// `expr`, recursing through if/block-tail composite shapes the way
    /// the literal's value could be produced at runtime (§4.3.3).
    pub(crate) fn resolve_infer_int_in_context(&mut self, expr: ExprId, expected: TypeId) -> bool {
        if self.is_error(expected) {
            return true;
        }
        if self.is_float_builtin(expected) {
            self.err(DiagnosticCode::IntToFloatNotImplicit, self.ast.expr(expr).span, vec![
                "{integer}".to_string(),
                self.types.to_string(expected),
            ]);
            return false;
        }

        match &self.ast.expr(expr).kind {
            ExprKind::IntLiteral { .. } => self.finalize_one_pending(expr, expected),
            ExprKind::If { then_block, else_block, .. } => {
                let mut ok = true;
                if let Some(tail) = self.block_tail_expr(*then_block) {
                    ok &= self.resolve_infer_int_in_context(tail, expected);
                }
                if let Some(else_stmt) = else_block {
                    if let Some(tail) = self.block_tail_expr(*else_stmt) {
                        ok &= self.resolve_infer_int_in_context(tail, expected);
                    }
                }
                self.set_expr_type(expr, expected);
                ok
            }
            ExprKind::BlockExpr { block } => {
                let ok = match self.block_tail_expr(*block) {
                    Some(tail) => self.resolve_infer_int_in_context(tail, expected),
                    None => true,
                };
                self.set_expr_type(expr, expected);
                ok
            }
            _ => {
                // Not a literal shape we can push context through further;
                // re-check under the new expectation by re-typing directly.
                self.set_expr_type(expr, expected);
                true
            }
        }
    }

    fn block_tail_expr(&self, block: crate::ids::StmtId) -> Option<ExprId> {
        let stmt = self.ast.stmt(block);
        let children = self.ast.block_children(stmt);
        let last = children.last()?;
        match &self.ast.stmt(*last).kind {
            StmtKind::ExprStmt(e) => Some(*e),
            _ => None,
        }
    }

    fn finalize_one_pending(&mut self, expr: ExprId, expected: TypeId) -> bool {
        let b = match self.types.get(expected) {
            Type::Builtin(b) => *b,
            _ => {
                self.err(DiagnosticCode::IntNeedsContext, self.ast.expr(expr).span, vec![]);
                return false;
            }
        };
        let value = match self.pending_int_expr.get(&expr) {
            Some(p) => p.value.clone(),
            None => return true, // already resolved or not a pending literal
        };
        if !value_fits(&value, b) {
            self.err(
                DiagnosticCode::IntDoesNotFit,
                self.ast.expr(expr).span,
                vec![value.to_string(), self.types.to_string(expected)],
            );
            self.set_expr_type(expr, self.types.error());
            return false;
        }
        if let Some(p) = self.pending_int_expr.get_mut(&expr) {
            p.resolved = true;
            p.resolved_type = expected;
        }
        self.set_expr_type(expr, expected);
        true
    }

    /// Also updates a symbol-bound pending entry's declared type, per
    /// §3.4's "resolution ... updates ... the symbol's declared type".
    pub(crate) fn resolve_infer_int_for_symbol(&mut self, sym: SymbolId, expected: TypeId) {
        if let Some(p) = self.pending_int_sym.get_mut(&sym) {
            if let Type::Builtin(b) = self.types.get(expected) {
                if value_fits(&p.value, *b) {
                    p.resolved = true;
                    p.resolved_type = expected;
                    self.sym.update_declared_type(sym, expected);
                }
            }
        }
    }

    /// Finalizes every still-unresolved pending integer to the smallest
    /// signed builtin that fits its value (§4.3.3), run strictly after the
    /// full second pass (§5 "Ordering").
    pub(crate) fn finalize_pending_integers(&mut self) {
        let expr_ids: Vec<ExprId> = self.pending_int_expr.keys().copied().collect();
        for eid in expr_ids {
            if self.pending_int_expr[&eid].resolved {
                continue;
            }
            let value = self.pending_int_expr[&eid].value.clone();
            let mut chosen = None;
            for b in Builtin::SIGNED_LADDER {
                if value_fits(&value, b) {
                    chosen = Some(b);
                    break;
                }
            }
            let ty = match chosen {
                Some(b) => self.types.builtin(b),
                None => {
                    self.err(DiagnosticCode::IntLiteralOverflow, self.ast.expr(eid).span, vec![
                        value.to_string(),
                        "i128".to_string(),
                    ]);
                    self.types.error()
                }
            };
            self.pending_int_expr.get_mut(&eid).unwrap().resolved = true;
            self.pending_int_expr.get_mut(&eid).unwrap().resolved_type = ty;
            self.set_expr_type(eid, ty);
        }

        let sym_ids: Vec<SymbolId> = self.pending_int_sym.keys().copied().collect();
        for sid in sym_ids {
            if self.pending_int_sym[&sid].resolved {
                continue;
            }
            let value = self.pending_int_sym[&sid].value.clone();
            let mut chosen = None;
            for b in Builtin::SIGNED_LADDER {
                if value_fits(&value, b) {
                    chosen = Some(b);
                    break;
                }
            }
            let ty = match chosen {
                Some(b) => self.types.builtin(b),
                None => self.types.error(),
            };
            self.pending_int_sym.get_mut(&sid).unwrap().resolved = true;
            self.pending_int_sym.get_mut(&sid).unwrap().resolved_type = ty;
            self.sym.update_declared_type(sid, ty);
        }
    }
}
