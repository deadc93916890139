// src/symbol.rs
//! Symbol interner: maps byte-string identities to compact, stable
//! handles. Grounded in the original lexer's mutex-guarded symbol table
//! (predefined entries, intern-by-hash, grow-by-doubling), ported to an
//! idiomatic Rust substitute that replaces the hand-rolled FNV-1a linear
//! scan with a `HashMap`.

use std::collections::HashMap;
use std::sync::Mutex;

/// Predefined symbol ids, interned at [`SymbolTable::new`] time, matching
/// the kind of identifiers a lexer always needs before it reads a single
/// byte of source.
pub mod predefined {
    pub const EMPTY: u32 = 0;
    pub const KW_FN: u32 = 1;
    pub const KW_LET: u32 = 2;
    pub const KW_IF: u32 = 3;
    pub const KW_ELSE: u32 = 4;
    pub const KW_RETURN: u32 = 5;
    pub const KW_STRUCT: u32 = 6;
    pub const KW_ENUM: u32 = 7;
    pub const KW_IMPL: u32 = 8;
    pub const KW_PUB: u32 = 9;
    pub const KW_USE: u32 = 10;
    /// One past the last predefined id; the first id `intern` can assign
    /// to a novel string.
    pub const COUNT: u32 = 11;

    pub(crate) const STRS: [&str; COUNT as usize] = [
        "", "fn", "let", "if", "else", "return", "struct", "enum", "impl", "pub", "use",
    ];
}

bitflags::bitflags! {
    /// Flag bits describing how a [`SymbolHandle`] was produced; the token
    /// layer treats these as opaque.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SymbolFlags: u8 {
        const PREDEFINED = 0x01;
        const INTERNED   = 0x02;
        const LIFETIME   = 0x04;
    }
}

/// A compact, copyable handle to an interned byte string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolHandle {
    pub id: u32,
    pub flags: u8,
}

impl SymbolHandle {
    pub fn new(id: u32, flags: u8) -> Self {
        Self { id, flags }
    }

    pub fn is_predefined(&self) -> bool {
        self.flags & SymbolFlags::PREDEFINED.bits() != 0
    }

    pub fn is_interned(&self) -> bool {
        self.flags & SymbolFlags::INTERNED.bits() != 0
    }

    pub fn is_lifetime(&self) -> bool {
        self.flags & SymbolFlags::LIFETIME.bits() != 0
    }
}

struct Inner {
    /// Interned strings in id order; index `i` is the string for id `i`.
    strings: Vec<Box<[u8]>>,
    /// Reverse lookup from string bytes to id.
    by_bytes: HashMap<Box<[u8]>, u32>,
}

/// Thread-safe, process-lifetime symbol interner.
///
/// A single `Mutex` guards the table; the hot path a lexer exercises
/// (intern an identifier, look one up to render a diagnostic) is not
/// contended enough to justify a lock-free table, and the original's own
/// design uses one mutex for the same operations.
pub struct SymbolTable {
    inner: Mutex<Inner>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut strings = Vec::with_capacity(predefined::COUNT as usize);
        let mut by_bytes = HashMap::with_capacity(predefined::COUNT as usize);
        for (id, s) in predefined::STRS.iter().enumerate() {
            let bytes: Box<[u8]> = s.as_bytes().into();
            by_bytes.insert(bytes.clone(), id as u32);
            strings.push(bytes);
        }
        Self {
            inner: Mutex::new(Inner { strings, by_bytes }),
        }
    }

    /// Interns `bytes`, returning a stable handle. Idempotent: byte-equal
    /// inputs always return an equal handle. The empty string always maps
    /// to the predefined empty symbol.
    pub fn intern(&self, bytes: &[u8]) -> SymbolHandle {
        if bytes.is_empty() {
            return SymbolHandle::new(predefined::EMPTY, SymbolFlags::PREDEFINED.bits());
        }
        let mut inner = self.inner.lock().expect("symbol table mutex poisoned");
        if let Some(&id) = inner.by_bytes.get(bytes) {
            let flags = if id < predefined::COUNT {
                SymbolFlags::PREDEFINED.bits()
            } else {
                SymbolFlags::INTERNED.bits()
            };
            return SymbolHandle::new(id, flags);
        }
        let id = inner.strings.len() as u32;
        let owned: Box<[u8]> = bytes.into();
        inner.by_bytes.insert(owned.clone(), id);
        inner.strings.push(owned);
        SymbolHandle::new(id, SymbolFlags::INTERNED.bits())
    }

    /// Interns a symbol explicitly flagged as a lifetime (`'a`-style)
    /// identifier. Lifetimes intern through the same table as any other
    /// identifier; only the flag differs.
    pub fn intern_lifetime(&self, bytes: &[u8]) -> SymbolHandle {
        let mut handle = self.intern(bytes);
        handle.flags |= SymbolFlags::LIFETIME.bits();
        handle
    }

    /// Looks up the bytes behind `handle`. Stable for the table's
    /// lifetime: ids are never reused or reassigned.
    pub fn lookup(&self, handle: SymbolHandle) -> Box<[u8]> {
        let inner = self.inner.lock().expect("symbol table mutex poisoned");
        inner
            .strings
            .get(handle.id as usize)
            .cloned()
            .unwrap_or_else(|| Box::from(&b""[..]))
    }

    /// Number of interned entries, including predefined ones.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("symbol table mutex poisoned").strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_is_predefined_empty() {
        let table = SymbolTable::new();
        let h = table.intern(b"");
        assert_eq!(h.id, predefined::EMPTY);
        assert!(h.is_predefined());
    }

    #[test]
    fn test_intern_is_idempotent() {
        let table = SymbolTable::new();
        let a = table.intern(b"hello_world");
        let b = table.intern(b"hello_world");
        assert_eq!(a, b);
    }

    #[test]
    fn test_intern_then_lookup_roundtrips() {
        let table = SymbolTable::new();
        let h = table.intern(b"my_identifier");
        assert_eq!(&*table.lookup(h), b"my_identifier");
    }

    #[test]
    fn test_predefined_keyword_is_flagged() {
        let table = SymbolTable::new();
        let h = table.intern(b"fn");
        assert_eq!(h.id, predefined::KW_FN);
        assert!(h.is_predefined());
    }

    #[test]
    fn test_distinct_strings_get_distinct_ids() {
        let table = SymbolTable::new();
        let a = table.intern(b"alpha");
        let b = table.intern(b"beta");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_lifetime_flag() {
        let table = SymbolTable::new();
        let h = table.intern_lifetime(b"a");
        assert!(h.is_lifetime());
    }
}
