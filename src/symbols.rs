//! Lexically scoped symbol table (§3.3, §4.2).

use std::collections::HashMap;

use crate::ids::{SymbolId, TypeId};
use crate::source::Span;

/// What a [`Symbol`] denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Var,
    Fn,
    Type,
    Act,
    Field,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub declared_type: TypeId,
    pub decl_span: Span,
}

/// Outcome of [`SymbolTable::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Ok,
    IsDuplicate,
    IsShadowing,
}

#[derive(Debug, Clone)]
pub struct InsertResult {
    pub outcome: InsertOutcome,
    pub symbol_id: SymbolId,
}

impl InsertResult {
    pub fn ok(&self) -> bool {
        matches!(self.outcome, InsertOutcome::Ok | InsertOutcome::IsShadowing)
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self.outcome, InsertOutcome::IsDuplicate)
    }

    pub fn is_shadowing(&self) -> bool {
        matches!(self.outcome, InsertOutcome::IsShadowing)
    }
}

/// One lexical scope: a name -> symbol-id map local to this nesting level.
#[derive(Debug, Default)]
struct Scope {
    names: HashMap<String, SymbolId>,
}

/// Lexically scoped, name -> symbol-id mapping with a side-table mapping
/// symbol-id -> mutability bit (§3.3).
///
/// Scopes form a stack; [`lookup`](SymbolTable::lookup) walks from the
/// innermost scope outward and the first match wins. Qualified names
/// (`a::b::c`) are the caller's (Tyck's) responsibility: this table only
/// stores whatever string key it is given.
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    is_mutable: Vec<bool>,
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            symbols: Vec::new(),
            is_mutable: Vec::new(),
            // the table always has at least one (global) scope
            scopes: vec![Scope::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "popped the global scope");
        self.scopes.pop();
    }

    /// Inserts `name` into the current (innermost) scope. Fails with
    /// `IsDuplicate` if `name` already exists in the *current* scope;
    /// reports `IsShadowing` (but still inserts) if `name` exists only in
    /// an enclosing scope.
    pub fn insert(
        &mut self,
        kind: SymbolKind,
        name: &str,
        declared_type: TypeId,
        decl_span: Span,
    ) -> InsertResult {
        if self.scopes.last().unwrap().names.contains_key(name) {
            let symbol_id = self.scopes.last().unwrap().names[name];
            return InsertResult { outcome: InsertOutcome::IsDuplicate, symbol_id };
        }

        let is_shadowing = self.lookup(name).is_some();

        let symbol_id = SymbolId::from_index(self.symbols.len());
        self.symbols.push(Symbol {
            kind,
            name: name.to_string(),
            declared_type,
            decl_span,
        });
        self.is_mutable.push(false);
        self.scopes.last_mut().unwrap().names.insert(name.to_string(), symbol_id);

        InsertResult {
            outcome: if is_shadowing { InsertOutcome::IsShadowing } else { InsertOutcome::Ok },
            symbol_id,
        }
    }

    /// Like [`insert`](Self::insert) but also records the mutability bit.
    pub fn insert_mut(
        &mut self,
        kind: SymbolKind,
        name: &str,
        declared_type: TypeId,
        decl_span: Span,
        is_mutable: bool,
    ) -> InsertResult {
        let res = self.insert(kind, name, declared_type, decl_span);
        if res.ok() {
            self.is_mutable[res.symbol_id.index()] = is_mutable;
        }
        res
    }

    /// Walks scopes innermost-to-outermost; first match wins.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        for scope in self.scopes.iter().rev() {
            if let Some(&id) = scope.names.get(name) {
                return Some(id);
            }
        }
        None
    }

    pub fn lookup_in_current(&self, name: &str) -> Option<SymbolId> {
        self.scopes.last().unwrap().names.get(name).copied()
    }

    pub fn update_declared_type(&mut self, sym: SymbolId, ty: TypeId) {
        self.symbols[sym.index()].declared_type = ty;
    }

    pub fn symbol(&self, sym: SymbolId) -> &Symbol {
        &self.symbols[sym.index()]
    }

    pub fn is_mutable(&self, sym: SymbolId) -> bool {
        self.is_mutable[sym.index()]
    }

    pub fn set_mutable(&mut self, sym: SymbolId, is_mutable: bool) {
        self.is_mutable[sym.index()] = is_mutable;
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Builtin, TypePool};

    #[test]
    fn lookup_walks_innermost_to_outermost() {
        let mut pool = TypePool::new();
        let i32_t = pool.builtin(Builtin::I32);
        let mut sym = SymbolTable::new();
        let outer = sym.insert(SymbolKind::Var, "x", i32_t, Span::DUMMY);
        assert!(matches!(outer.outcome, InsertOutcome::Ok));

        sym.push_scope();
        assert_eq!(sym.lookup("x"), Some(outer.symbol_id));

        let bool_t = pool.builtin(Builtin::Bool);
        let inner = sym.insert(SymbolKind::Var, "x", bool_t, Span::DUMMY);
        assert!(matches!(inner.outcome, InsertOutcome::IsShadowing));
        assert_eq!(sym.lookup("x"), Some(inner.symbol_id));

        sym.pop_scope();
        assert_eq!(sym.lookup("x"), Some(outer.symbol_id));
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut pool = TypePool::new();
        let i32_t = pool.builtin(Builtin::I32);
        let mut sym = SymbolTable::new();
        let first = sym.insert(SymbolKind::Var, "x", i32_t, Span::DUMMY);
        assert!(first.ok());
        let second = sym.insert(SymbolKind::Var, "x", i32_t, Span::DUMMY);
        assert!(second.is_duplicate());
        assert_eq!(second.symbol_id, first.symbol_id);
    }

    #[test]
    fn mutability_side_table() {
        let mut pool = TypePool::new();
        let i32_t = pool.builtin(Builtin::I32);
        let mut sym = SymbolTable::new();
        let r = sym.insert_mut(SymbolKind::Var, "x", i32_t, Span::DUMMY, true);
        assert!(sym.is_mutable(r.symbol_id));
        sym.set_mutable(r.symbol_id, false);
        assert!(!sym.is_mutable(r.symbol_id));
    }
}
