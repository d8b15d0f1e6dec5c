//! String interning for names and literal values.
//!
//! Class names, alias names, parameter names and literal payloads are compared
//! far more often than they are printed, so they are stored once and handed out
//! as [`Atom`] handles. Comparing or hashing an `Atom` is a `u32` operation.
//!
//! The interner is shared across threads: lookups go through a `DashMap`, and
//! the id -> string table sits behind an `RwLock` that is only written when a
//! new string is seen.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rustc_hash::FxBuildHasher;
use std::sync::{Arc, PoisonError, RwLock};

/// An interned string handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub u32);

impl Atom {
    /// The empty string. Always present in every [`Interner`].
    pub const EMPTY: Atom = Atom(0);

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Thread-safe string interner.
pub struct Interner {
    map: DashMap<Arc<str>, Atom, FxBuildHasher>,
    strings: RwLock<Vec<Arc<str>>>,
}

impl Interner {
    pub fn new() -> Self {
        let empty: Arc<str> = Arc::from("");
        let map = DashMap::with_hasher(FxBuildHasher);
        map.insert(empty.clone(), Atom::EMPTY);
        Interner {
            map,
            strings: RwLock::new(vec![empty]),
        }
    }

    /// Intern `text`, returning the existing atom if it was seen before.
    pub fn intern(&self, text: &str) -> Atom {
        if let Some(atom) = self.map.get(text) {
            return *atom;
        }

        let key: Arc<str> = Arc::from(text);
        match self.map.entry(key.clone()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let mut strings = self.strings.write().unwrap_or_else(PoisonError::into_inner);
                let atom = Atom(strings.len() as u32);
                strings.push(key);
                entry.insert(atom);
                atom
            }
        }
    }

    /// Look up an already interned string without inserting it.
    pub fn get(&self, text: &str) -> Option<Atom> {
        self.map.get(text).map(|atom| *atom)
    }

    /// Resolve an atom back to its text. Unknown atoms resolve to `""`.
    pub fn resolve(&self, atom: Atom) -> Arc<str> {
        let strings = self.strings.read().unwrap_or_else(PoisonError::into_inner);
        strings
            .get(atom.0 as usize)
            .cloned()
            .unwrap_or_else(|| strings[0].clone())
    }

    pub fn len(&self) -> usize {
        self.strings.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}
