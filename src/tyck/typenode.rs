//! Resolves syntactic `TypeNode`s (the parser's pre-resolution type
//! annotations, §3.8) into interned [`TypeId`]s. Named paths resolve via
//! the symbol table / namespace stack; everything else maps straight onto
//! a `TypePool` constructor.

use crate::ast::TypeNodeKind;
use crate::ids::TypeNodeId;
use crate::types::{Builtin, TypeId};

use super::state::TypeChecker;

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

impl<'a> TypeChecker<'a> {
    pub(crate) fn resolve_type_node(&mut self, id: TypeNodeId) -> TypeId {
        let node = self.ast.type_node(id).kind.clone();
        match node {
            TypeNodeKind::Builtin(name) => match builtin_from_name(&name) {
                Some(b) => self.types.builtin(b),
                None => self.types.intern_ident(&self.qualify(&name)),
            },
            TypeNodeKind::Named { path_begin, path_count } => {
                let segs = self.ast.path_slice(path_begin, path_count).to_vec();
                let refs: Vec<&str> = segs.iter().map(String::as_str).collect();
                self.types.intern_path(&refs)
            }
            TypeNodeKind::Optional(inner) => {
                let t = self.resolve_type_node(inner);
                self.types.make_optional(t)
            }
            TypeNodeKind::Array { elem, size } => {
                let t = self.resolve_type_node(elem);
                self.types.make_array(t, size.is_some(), size)
            }
            TypeNodeKind::Ptr { pointee, is_mut } => {
                let t = self.resolve_type_node(pointee);
                self.types.make_ptr(t, is_mut)
            }
            TypeNodeKind::Borrow { pointee, is_mut } => {
                let t = self.resolve_type_node(pointee);
                self.types.make_borrow(t, is_mut)
            }
            TypeNodeKind::Escape { pointee } => {
                let t = self.resolve_type_node(pointee);
                self.types.make_escape(t)
            }
            TypeNodeKind::Fn { param_begin, param_count, positional_count, labels, ret } => {
                let ret_ty = self.resolve_type_node(ret);
                let mut params = Vec::with_capacity(param_count as usize);
                // Fn type nodes reuse the param arena's type_node field for
                // each listed parameter's declared type.
                for p in self.ast.param_slice(param_begin, param_count).to_vec() {
                    let pt = match p.type_node {
                        Some(tn) => self.resolve_type_node(tn),
                        None => self.types.error(),
                    };
                    params.push(pt);
                }
                let has_default: Vec<bool> =
                    self.ast.param_slice(param_begin, param_count).iter().map(|p| p.has_default).collect();
                self.types.make_fn(ret_ty, params, positional_count, labels, has_default)
            }
        }
    }
}
