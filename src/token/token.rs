// src/token/token.rs
//! The `Token` record itself: a cache-line aligned value whose first field
//! doubles as the free-list link when the token is released, exactly as
//! the generic pool's slots do, but inlined into the type rather than
//! computed from a raw byte layout — `Token` is the allocator's only
//! object kind, so there is no payload-size parameter to abstract over.

use portable_atomic::Ordering;

use super::kinds::{DocComment, Ident, Literal, Span, TokenKind};
use crate::symbol::SymbolHandle;
use crate::tagged_ptr::{AtomicTaggedPtr, TaggedPtr};

/// Payload carried by a token, discriminated by `Token::kind`.
#[derive(Debug, Clone, Copy)]
pub enum TokenPayload {
    None,
    Literal(Literal),
    Ident(Ident),
    /// Doc comment body: attribute style plus the interned comment text.
    Doc(DocComment),
    /// Lex error diagnostic, interned.
    Error(SymbolHandle),
}

/// A single token slot.
///
/// `link` is only meaningful while the token sits on the allocator's
/// free-list; once handed to a caller it is dead storage until the token
/// is freed again, matching the C original's choice to alias the
/// next-free field with the token's own first field rather than carry a
/// separate header.
#[repr(align(64))]
pub struct Token {
    pub(crate) link: AtomicTaggedPtr,
    pub kind: TokenKind,
    pub span: Span,
    pub payload: TokenPayload,
}

impl Token {
    pub(crate) fn blank_with_span(kind: TokenKind, span: Span, payload: TokenPayload) -> Self {
        Self {
            link: AtomicTaggedPtr::new(TaggedPtr::NULL),
            kind,
            span,
            payload,
        }
    }

    /// Wipes this token's body back to an inert state. Rust enums cannot
    /// be `memset` safely the way the C original zeroes a `Token`'s raw
    /// bytes on free, so this substitutes an explicit reset to the same
    /// effect: stale payload data does not survive into the next use of
    /// the slot, and a lingering read through a dangling handle observes
    /// an inert token rather than whatever the previous owner wrote.
    pub(crate) fn wipe(&mut self) {
        self.kind = TokenKind::Eof;
        self.span = Span::default();
        self.payload = TokenPayload::None;
    }

    #[inline]
    pub(crate) fn link(&self) -> &AtomicTaggedPtr {
        &self.link
    }
}
