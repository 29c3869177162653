//! Dense, arena-local index types shared by the type pool, the SIR arenas
//! and the OIR module.
//!
//! Every entity reference in this crate is an opaque index into its owning
//! arena (§3.1). No id carries meaning outside the arena that produced it,
//! and a single per-type sentinel stands in for "no value" instead of
//! `Option<Id>` so that arrays of ids can be filled with a default and
//! compared cheaply.

/// Defines a dense arena index type with an `INVALID` sentinel.
macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Sentinel value meaning "no entity". `get` on this id is a logic error.
            pub const INVALID: $name = $name(u32::MAX);

            #[inline]
            pub fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub fn from_index(i: usize) -> Self {
                $name(i as u32)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::INVALID
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                if self.is_valid() {
                    write!(f, "{}#{}", stringify!($name), self.0)
                } else {
                    write!(f, "{}#invalid", stringify!($name))
                }
            }
        }
    };
}

arena_id!(
    /// Index into [`crate::types::TypePool`].
    TypeId
);
arena_id!(
    /// Index into an [`crate::ast::AstArena`]'s expression table.
    ExprId
);
arena_id!(
    /// Index into an [`crate::ast::AstArena`]'s statement table.
    StmtId
);
arena_id!(
    /// Index into [`crate::symbols::SymbolTable`].
    SymbolId
);
arena_id!(
    /// Index into an [`crate::ast::AstArena`]'s type-node table (syntactic,
    /// pre-resolution type annotations).
    TypeNodeId
);

arena_id!(
    /// Index into [`crate::sir::Module`]'s value arena.
    SirValueId
);
arena_id!(
    /// Index into [`crate::sir::Module`]'s statement arena.
    SirStmtId
);
arena_id!(
    /// Index into [`crate::sir::Module`]'s block arena.
    SirBlockId
);
arena_id!(
    /// Index into [`crate::sir::Module`]'s function arena.
    SirFuncId
);
arena_id!(
    /// Index into [`crate::sir::Module`]'s field arena.
    SirFieldId
);
arena_id!(
    /// Index into [`crate::sir::Module`]'s field-member arena.
    SirFieldMemberId
);
arena_id!(
    /// Index into [`crate::sir::Module`]'s param arena.
    SirParamId
);
arena_id!(
    /// Index into [`crate::sir::Module`]'s attr arena.
    SirAttrId
);
arena_id!(
    /// Index into [`crate::sir::Module`]'s arg arena.
    SirArgId
);
arena_id!(
    /// Index into [`crate::sir::Module`]'s global arena.
    SirGlobalId
);
arena_id!(
    /// Index into [`crate::sir::Module`]'s acts arena.
    SirActId
);
arena_id!(
    /// Index into [`crate::sir::Module`]'s switch-case arena.
    SirSwitchCaseId
);

arena_id!(
    /// Index into [`crate::oir::Module`]'s value arena.
    ValueId
);
arena_id!(
    /// Index into [`crate::oir::Module`]'s instruction arena.
    InstId
);
arena_id!(
    /// Index into [`crate::oir::Module`]'s block arena.
    BlockId
);
arena_id!(
    /// Index into [`crate::oir::Module`]'s function arena.
    FuncId
);
