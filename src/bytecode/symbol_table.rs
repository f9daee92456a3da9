//! Lexical scope tracking for the compiler.

use std::collections::HashMap;

/// Which opcode family accesses a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Stdlib,
}

/// A resolved name: its scope and its dense index within that scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// A chain of scopes. The outermost table is the global scope; each function
/// body compiles against an enclosed table. Lookup walks outward; definition
/// only ever touches the current scope.
#[derive(Debug, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    definitions_count: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new table enclosed by `outer`. The compiler takes ownership of the
    /// outer table while the inner scope is live and gets it back from
    /// `into_outer` when the scope ends.
    pub fn enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            store: HashMap::new(),
            definitions_count: 0,
        }
    }

    /// Discard this scope and return the enclosing one.
    pub fn into_outer(self) -> SymbolTable {
        match self.outer {
            Some(outer) => *outer,
            None => SymbolTable::new(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    /// Bind a name in the current scope. Re-defining a name that already
    /// lives in this scope returns the existing symbol, so the index a
    /// function body resolved stays the index its `let` stores into.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.is_global() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };

        if let Some(existing) = self.store.get(name) {
            if existing.scope == scope {
                return existing.clone();
            }
        }

        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.definitions_count,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.definitions_count += 1;

        symbol
    }

    /// Register a built-in under an externally chosen index.
    pub fn define_stdlib(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Stdlib,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());

        symbol
    }

    /// Find a name here or in any enclosing scope.
    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        match self.store.get(name) {
            Some(symbol) => Some(symbol.clone()),
            None => self.outer.as_ref().and_then(|outer| outer.resolve(name)),
        }
    }

    /// How many names this scope has defined; a function's local slot count.
    pub fn definitions_count(&self) -> usize {
        self.definitions_count
    }
}
