//! Keyword interning for O(1) identity comparison.
//!
//! Descriptor keywords are compared constantly during lexing (is this span a
//! keyword in scope?), symbol-table construction (sibling uniqueness), and
//! lookup (abbreviation matching). Interning each keyword once and comparing
//! integer handles avoids re-hashing/re-comparing the same strings on every
//! lookup.
//!
//! ```
//! use clp::intern::Interner;
//!
//! let mut interner = Interner::new();
//! let a = interner.intern("NUM08");
//! let b = interner.intern("NUM08");
//! assert_eq!(a, b);
//! assert_eq!(interner.resolve(a), "NUM08");
//! ```

use std::collections::HashMap;

/// A lightweight handle to an interned keyword string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Kw(u32);

impl Kw {
    /// The empty-string handle, always at index 0.
    pub const EMPTY: Kw = Kw(0);

    /// The interner-internal index, useful for dense `Vec` storage.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for Kw {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Interns keyword strings, case-sensitively; case-insensitive comparison is
/// layered on top by [`Interner::intern_ci`], which interns the lower-cased
/// form for lookup while [`Interner::resolve`] always returns the original
/// spelling from the first insertion.
pub struct Interner {
    map: HashMap<String, Kw>,
    vec: Vec<String>,
}

impl Interner {
    /// Creates an interner with only the empty string pre-interned.
    pub fn new() -> Self {
        let mut interner = Interner {
            map: HashMap::new(),
            vec: Vec::new(),
        };
        interner.vec.push(String::new());
        interner
    }

    /// Interns `s` as-is, returning its handle.
    pub fn intern(&mut self, s: &str) -> Kw {
        if let Some(&sym) = self.map.get(s) {
            return sym;
        }
        let sym = Kw(self.vec.len() as u32);
        self.vec.push(s.to_string());
        self.map.insert(s.to_string(), sym);
        sym
    }

    /// Interns the case-folded form of `s` (used for case-insensitive
    /// keyword comparison when the handle was opened with `case_sensitive =
    /// false`).
    pub fn intern_ci(&mut self, s: &str) -> Kw {
        self.intern(&s.to_ascii_uppercase())
    }

    /// Resolves a handle back to its string.
    ///
    /// # Panics
    /// Panics if `sym` was not produced by this interner.
    pub fn resolve(&self, sym: Kw) -> &str {
        &self.vec[sym.0 as usize]
    }

    /// Looks up an already-interned string without inserting it.
    pub fn lookup(&self, s: &str) -> Option<Kw> {
        self.map.get(s).copied()
    }

    /// Number of interned strings, including the empty string.
    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.len() <= 1
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_returns_same_handle_for_same_string() {
        let mut interner = Interner::new();
        assert_eq!(interner.intern("hello"), interner.intern("hello"));
    }

    #[test]
    fn intern_distinguishes_different_strings() {
        let mut interner = Interner::new();
        assert_ne!(interner.intern("hello"), interner.intern("world"));
    }

    #[test]
    fn intern_ci_folds_case() {
        let mut interner = Interner::new();
        let a = interner.intern_ci("Keyword");
        let b = interner.intern_ci("KEYWORD");
        assert_eq!(a, b);
        assert_eq!(interner.resolve(a), "KEYWORD");
    }

    #[test]
    fn resolve_roundtrips() {
        let mut interner = Interner::new();
        let sym = interner.intern("ARR");
        assert_eq!(interner.resolve(sym), "ARR");
    }

    #[test]
    fn lookup_misses_uninterned_string() {
        let interner = Interner::new();
        assert_eq!(interner.lookup("nope"), None);
    }
}
