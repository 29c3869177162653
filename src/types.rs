//! The type pool (§3.2, §4.1).
//!
//! Every [`Type`] reachable from the checker is interned here by structural
//! identity: two sequences of pool operations that build the same
//! structural type always produce the same [`TypeId`]. Named-user types
//! intern by canonical qualified name instead of structure, and `error`
//! absorbs propagation so that any type-producing operation over an
//! `error` input yields `error` rather than panicking.

use std::collections::HashMap;

use crate::ids::TypeId;

/// Builtin scalar/unit/bottom types. `InferInteger` is the placeholder type
/// assigned to an integer literal before its context resolves it (§3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    ISize,
    USize,
    F32,
    F64,
    F128,
    Bool,
    Char,
    Text,
    Unit,
    Never,
    Null,
    InferInteger,
}

impl Builtin {
    pub fn is_integer(self) -> bool {
        use Builtin::*;
        matches!(
            self,
            I8 | I16 | I32 | I64 | I128 | U8 | U16 | U32 | U64 | U128 | ISize | USize
        )
    }

    pub fn is_signed_integer(self) -> bool {
        use Builtin::*;
        matches!(self, I8 | I16 | I32 | I64 | I128 | ISize)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Builtin::F32 | Builtin::F64 | Builtin::F128)
    }

    pub fn name(self) -> &'static str {
        use Builtin::*;
        match self {
            I8 => "i8",
            I16 => "i16",
            I32 => "i32",
            I64 => "i64",
            I128 => "i128",
            U8 => "u8",
            U16 => "u16",
            U32 => "u32",
            U64 => "u64",
            U128 => "u128",
            ISize => "isize",
            USize => "usize",
            F32 => "f32",
            F64 => "f64",
            F128 => "f128",
            Bool => "bool",
            Char => "char",
            Text => "text",
            Unit => "unit",
            Never => "never",
            Null => "null",
            InferInteger => "{integer}",
        }
    }

    /// The smallest-to-largest signed integer ladder used by deferred
    /// integer finalization (§4.3.3).
    pub const SIGNED_LADDER: [Builtin; 5] =
        [Builtin::I8, Builtin::I16, Builtin::I32, Builtin::I64, Builtin::I128];
}

/// A function signature: `fn(params[0..positional_param_count]) -> ret`,
/// plus a trailing named group `params[positional_param_count..]` carrying
/// per-parameter labels and default-availability flags (§4.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FnSig {
    pub ret: TypeId,
    pub params: Vec<TypeId>,
    pub positional_param_count: u32,
    /// Labels for every param, including positional ones (empty string for
    /// unlabeled positional params); same length as `params`.
    pub labels: Vec<String>,
    /// Per-param default-availability; same length as `params`.
    pub has_default: Vec<bool>,
}

impl FnSig {
    pub fn named_params(&self) -> &[TypeId] {
        &self.params[self.positional_param_count as usize..]
    }

    pub fn named_labels(&self) -> &[String] {
        &self.labels[self.positional_param_count as usize..]
    }
}

/// The structural shape of a type; `Type::Named` carries identity by
/// qualified name rather than structure (invariant (b), §3.2).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Error,
    Builtin(Builtin),
    /// A user-declared nominal type (class/proto/union), identified by its
    /// fully-qualified name.
    Named(String),
    Ptr { pointee: TypeId, is_mut: bool },
    Borrow { pointee: TypeId, is_mut: bool },
    Escape { pointee: TypeId },
    Optional { inner: TypeId },
    Array { elem: TypeId, has_size: bool, size: Option<u64> },
    Fn(FnSig),
}

/// Interns [`Type`] values behind stable [`TypeId`]s.
///
/// Structural types (everything except `Named`) are deduplicated by
/// structural equality; named types are deduplicated by qualified name.
/// `error` is interned once and is returned by every fallible pool
/// operation instead of panicking, so the checker can keep the "errors
/// absorb" invariant without special-casing every call site.
#[derive(Debug)]
pub struct TypePool {
    records: Vec<Type>,
    structural_index: HashMap<Type, TypeId>,
    named_index: HashMap<String, TypeId>,
    builtin_ids: HashMap<Builtin, TypeId>,
    error_id: TypeId,
}

impl TypePool {
    pub fn new() -> Self {
        let mut pool = TypePool {
            records: Vec::new(),
            structural_index: HashMap::new(),
            named_index: HashMap::new(),
            builtin_ids: HashMap::new(),
            error_id: TypeId::INVALID,
        };
        pool.error_id = pool.intern_structural(Type::Error);
        pool
    }

    fn intern_structural(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.structural_index.get(&ty) {
            return id;
        }
        let id = TypeId::from_index(self.records.len());
        self.structural_index.insert(ty.clone(), id);
        self.records.push(ty);
        id
    }

    pub fn error(&self) -> TypeId {
        self.error_id
    }

    pub fn is_error(&self, id: TypeId) -> bool {
        id == self.error_id || !id.is_valid()
    }

    pub fn builtin(&mut self, kind: Builtin) -> TypeId {
        if let Some(&id) = self.builtin_ids.get(&kind) {
            return id;
        }
        let id = self.intern_structural(Type::Builtin(kind));
        self.builtin_ids.insert(kind, id);
        id
    }

    /// `T??` collapses to `T?` (no double-optional, §4.1).
    pub fn make_optional(&mut self, inner: TypeId) -> TypeId {
        if self.is_error(inner) {
            return self.error();
        }
        if let Type::Optional { .. } = self.get(inner) {
            return inner;
        }
        self.intern_structural(Type::Optional { inner })
    }

    pub fn make_array(&mut self, elem: TypeId, has_size: bool, size: Option<u64>) -> TypeId {
        if self.is_error(elem) {
            return self.error();
        }
        self.intern_structural(Type::Array { elem, has_size, size: if has_size { size } else { None } })
    }

    pub fn make_borrow(&mut self, pointee: TypeId, is_mut: bool) -> TypeId {
        if self.is_error(pointee) {
            return self.error();
        }
        self.intern_structural(Type::Borrow { pointee, is_mut })
    }

    pub fn make_escape(&mut self, pointee: TypeId) -> TypeId {
        if self.is_error(pointee) {
            return self.error();
        }
        self.intern_structural(Type::Escape { pointee })
    }

    pub fn make_ptr(&mut self, pointee: TypeId, is_mut: bool) -> TypeId {
        if self.is_error(pointee) {
            return self.error();
        }
        self.intern_structural(Type::Ptr { pointee, is_mut })
    }

    /// `positional_count` records how many of `params` are positional; the
    /// rest form a single trailing named group (§4.1).
    pub fn make_fn(
        &mut self,
        ret: TypeId,
        params: Vec<TypeId>,
        positional_count: u32,
        labels: Vec<String>,
        has_default: Vec<bool>,
    ) -> TypeId {
        debug_assert!(positional_count as usize <= params.len());
        debug_assert_eq!(params.len(), labels.len());
        debug_assert_eq!(params.len(), has_default.len());
        if self.is_error(ret) || params.iter().any(|&p| self.is_error(p)) {
            return self.error();
        }
        self.intern_structural(Type::Fn(FnSig {
            ret,
            params,
            positional_param_count: positional_count,
            labels,
            has_default,
        }))
    }

    /// Interns a named-user type by its canonical qualified path, e.g.
    /// `["ns", "Widget"]` -> `ns::Widget` (invariant (b), §3.2).
    pub fn intern_path(&mut self, segs: &[&str]) -> TypeId {
        self.intern_ident(&segs.join("::"))
    }

    pub fn intern_ident(&mut self, qualified_name: &str) -> TypeId {
        if let Some(&id) = self.named_index.get(qualified_name) {
            return id;
        }
        let id = TypeId::from_index(self.records.len());
        self.records.push(Type::Named(qualified_name.to_string()));
        self.named_index.insert(qualified_name.to_string(), id);
        id
    }

    /// Fetches the structural record for `id`. Undefined (debug-asserts)
    /// on `invalid`; callers must always check validity first (§4.1).
    pub fn get(&self, id: TypeId) -> &Type {
        debug_assert!(id.is_valid(), "TypePool::get on an invalid TypeId");
        &self.records[id.index()]
    }

    pub fn to_string(&self, id: TypeId) -> String {
        if !id.is_valid() {
            return "<invalid>".to_string();
        }
        self.render(id, &mut Vec::new())
    }

    fn render(&self, id: TypeId, seen: &mut Vec<TypeId>) -> String {
        if seen.contains(&id) {
            return "<cycle>".to_string();
        }
        seen.push(id);
        let s = match self.get(id) {
            Type::Error => "<error>".to_string(),
            Type::Builtin(b) => b.name().to_string(),
            Type::Named(name) => name.clone(),
            Type::Ptr { pointee, is_mut } => {
                format!("*{}{}", if *is_mut { "mut " } else { "" }, self.render(*pointee, seen))
            }
            Type::Borrow { pointee, is_mut } => {
                format!("&{}{}", if *is_mut { "mut " } else { "" }, self.render(*pointee, seen))
            }
            Type::Escape { pointee } => format!("&&{}", self.render(*pointee, seen)),
            Type::Optional { inner } => format!("{}?", self.render(*inner, seen)),
            Type::Array { elem, has_size, size } => match (has_size, size) {
                (true, Some(n)) => format!("[{}; {}]", self.render(*elem, seen), n),
                _ => format!("[{}]", self.render(*elem, seen)),
            },
            Type::Fn(sig) => {
                let mut parts = Vec::new();
                for i in 0..sig.positional_param_count as usize {
                    parts.push(self.render(sig.params[i], seen));
                }
                if sig.positional_param_count as usize != sig.params.len() {
                    let mut named = Vec::new();
                    for i in sig.positional_param_count as usize..sig.params.len() {
                        named.push(format!("{}: {}", sig.labels[i], self.render(sig.params[i], seen)));
                    }
                    parts.push(format!("{{ {} }}", named.join(", ")));
                }
                format!("fn({}) -> {}", parts.join(", "), self.render(sig.ret, seen))
            }
        };
        seen.pop();
        s
    }
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_interning_is_order_independent() {
        let mut pool = TypePool::new();
        let i32_a = pool.builtin(Builtin::I32);
        let opt_a = pool.make_optional(i32_a);

        let i32_b = pool.builtin(Builtin::I32);
        let opt_b = pool.make_optional(i32_b);

        assert_eq!(i32_a, i32_b);
        assert_eq!(opt_a, opt_b);
    }

    #[test]
    fn double_optional_collapses() {
        let mut pool = TypePool::new();
        let i32_t = pool.builtin(Builtin::I32);
        let opt1 = pool.make_optional(i32_t);
        let opt2 = pool.make_optional(opt1);
        assert_eq!(opt1, opt2);
    }

    #[test]
    fn named_types_intern_by_qualified_name() {
        let mut pool = TypePool::new();
        let a = pool.intern_path(&["app", "Widget"]);
        let b = pool.intern_ident("app::Widget");
        assert_eq!(a, b);
    }

    #[test]
    fn error_absorbs_through_constructors() {
        let mut pool = TypePool::new();
        let err = pool.error();
        assert_eq!(pool.make_optional(err), err);
        assert_eq!(pool.make_array(err, false, None), err);
        assert_eq!(pool.make_borrow(err, true), err);
    }

    #[test]
    fn fn_sig_separates_positional_from_named_group() {
        let mut pool = TypePool::new();
        let i32_t = pool.builtin(Builtin::I32);
        let bool_t = pool.builtin(Builtin::Bool);
        let unit = pool.builtin(Builtin::Unit);
        let fn_t = pool.make_fn(
            unit,
            vec![i32_t, bool_t],
            1,
            vec![String::new(), "flag".to_string()],
            vec![false, true],
        );
        match pool.get(fn_t) {
            Type::Fn(sig) => {
                assert_eq!(sig.positional_param_count, 1);
                assert_eq!(sig.named_labels(), &["flag".to_string()]);
            }
            _ => panic!("expected Fn"),
        }
    }
}
