//! Shared lowering helpers: syntactic `TypeNode` resolution (independent of
//! `tyck::typenode`, since the builder only borrows `TypePool` the same way
//! `check_program` does, not through `TypeChecker`) and place/effect
//! classification from raw AST shape (§4.4.2).

use crate::ast::{AstArena, ExprKind, Op, TypeNodeKind};
use crate::ids::TypeNodeId;
use crate::types::{Builtin, TypePool};

use super::effect::{EffectClass, PlaceClass};
use super::{TypeNodeCache, ValueKind};

fn builtin_from_name(name: &str) -> Option<Builtin> {
    use Builtin::*;
    Some(match name {
        "i8" => I8,
        "i16" => I16,
        "i32" => I32,
        "i64" => I64,
        "i128" => I128,
        "u8" => U8,
        "u16" => U16,
        "u32" => U32,
        "u64" => U64,
        "u128" => U128,
        "isize" => ISize,
        "usize" => USize,
        "f32" => F32,
        "f64" => F64,
        "f128" => F128,
        "bool" => Bool,
        "char" => Char,
        "text" => Text,
        "unit" => Unit,
        "never" => Never,
        _ => return None,
    })
}

/// Re-resolves a syntactic `TypeNode` into a `TypeId`, caching per node so a
/// parameter/field list referencing the same node repeatedly only interns
/// once. Every type this touches was already interned once by Tyck; this
/// never diagnoses (the SIR builder never fails, §4.4.1) and falls back to
/// `types.error()` for a bare unqualified name it can't classify as a
/// builtin, mirroring `tyck::typenode`'s own `intern_ident` fallback.
pub(crate) fn resolve_type_node(
    ast: &AstArena,
    types: &mut TypePool,
    cache: &mut TypeNodeCache,
    id: TypeNodeId,
) -> crate::ids::TypeId {
    if let Some(&ty) = cache.get(&id) {
        return ty;
    }
    let node = ast.type_node(id).kind.clone();
    let ty = match node {
        TypeNodeKind::Builtin(name) => match builtin_from_name(&name) {
            Some(b) => types.builtin(b),
            None => types.intern_ident(&name),
        },
        TypeNodeKind::Named { path_begin, path_count } => {
            let segs = ast.path_slice(path_begin, path_count).to_vec();
            let refs: Vec<&str> = segs.iter().map(String::as_str).collect();
            types.intern_path(&refs)
        }
        TypeNodeKind::Optional(inner) => {
            let t = resolve_type_node(ast, types, cache, inner);
            types.make_optional(t)
        }
        TypeNodeKind::Array { elem, size } => {
            let t = resolve_type_node(ast, types, cache, elem);
            types.make_array(t, size.is_some(), size)
        }
        TypeNodeKind::Ptr { pointee, is_mut } => {
            let t = resolve_type_node(ast, types, cache, pointee);
            types.make_ptr(t, is_mut)
        }
        TypeNodeKind::Borrow { pointee, is_mut } => {
            let t = resolve_type_node(ast, types, cache, pointee);
            types.make_borrow(t, is_mut)
        }
        TypeNodeKind::Escape { pointee } => {
            let t = resolve_type_node(ast, types, cache, pointee);
            types.make_escape(t)
        }
        TypeNodeKind::Fn { param_begin, param_count, positional_count, labels, ret } => {
            let ret_ty = resolve_type_node(ast, types, cache, ret);
            let mut params = Vec::with_capacity(param_count as usize);
            for p in ast.param_slice(param_begin, param_count).to_vec() {
                let pt = match p.type_node {
                    Some(tn) => resolve_type_node(ast, types, cache, tn),
                    None => types.error(),
                };
                params.push(pt);
            }
            let has_default: Vec<bool> =
                ast.param_slice(param_begin, param_count).iter().map(|p| p.has_default).collect();
            types.make_fn(ret_ty, params, positional_count, labels, has_default)
        }
    };
    cache.insert(id, ty);
    ty
}

/// Place classification from raw AST shape (§4.4.2): a bare ident is
/// `Local`, `base[i]` with a non-range index is `Index`, `base.name` is
/// `Field`, everything else (including a range-indexed slice view) is
/// `NotPlace`.
pub(crate) fn place_class_of(ast: &AstArena, kind: &ExprKind) -> PlaceClass {
    match kind {
        ExprKind::Ident(_) => PlaceClass::Local,
        ExprKind::Index { index, .. } => {
            if is_range_expr(ast, *index) {
                PlaceClass::NotPlace
            } else {
                PlaceClass::Index
            }
        }
        ExprKind::Field { .. } => PlaceClass::Field,
        _ => PlaceClass::NotPlace,
    }
}

fn is_range_expr(ast: &AstArena, id: crate::ids::ExprId) -> bool {
    matches!(
        ast.expr(id).kind,
        ExprKind::Binary { op: Op::DotDot, .. } | ExprKind::Binary { op: Op::DotDotColon, .. }
    )
}

/// Effect classification from a value's own kind, before joining children
/// (§4.4.2): assignment, postfix increment and an escape-move always write;
/// a call is conservatively `Unknown` (§9(a)); everything else starts `Pure`
/// and only escalates by joining its children.
pub(crate) fn own_effect_class(kind: ValueKind) -> EffectClass {
    match kind {
        ValueKind::Assign | ValueKind::PostfixInc | ValueKind::Escape | ValueKind::NullCoalesceAssign => {
            EffectClass::MayWrite
        }
        ValueKind::Call => EffectClass::Unknown,
        _ => EffectClass::Pure,
    }
}
