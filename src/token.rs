//! The token definition for the predicate language.

use std::borrow::Cow;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Keywords
    Null,     // "null"
    True,     // "true"
    False,    // "false"
    Nullable, // "nullable"
    Cast,     // "cast"
    Enum,     // "enum"

    // Literals
    Identifier(&'a str),
    String(Cow<'a, str>),   // Unescaped content, without quotes
    DateTime(Cow<'a, str>), // @"..." content, without quotes
    Number(&'a str),        // Source text; integer or float

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    Comma,     // ,
    Dot,       // .
    Semicolon, // ;
    Question,  // ?
    Colon,     // :
    Arrow,     // =>

    // Operators
    Eq,      // ==
    NotEq,   // !=
    Gt,      // >
    Lt,      // <
    Gte,     // >=
    Lte,     // <=
    AndAnd,  // &&
    OrOr,    // ||
    Bang,    // !
    Amp,     // &
    Pipe,    // |
    Caret,   // ^
    Shl,     // <<
    Shr,     // >>
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %
    Assign,  // =

    // Special
    UnterminatedString, // A string literal without its closing quote
    Illegal,            // An illegal/unknown character
}

impl<'a> TokenKind<'a> {
    /// Identifier text, or the spelling of a keyword. Member names may be
    /// keywords (`r.null` is a field called `null`).
    pub fn as_word(&self) -> Option<&'a str> {
        match self {
            TokenKind::Identifier(name) => Some(name),
            TokenKind::Null => Some("null"),
            TokenKind::True => Some("true"),
            TokenKind::False => Some("false"),
            TokenKind::Nullable => Some("nullable"),
            TokenKind::Cast => Some("cast"),
            TokenKind::Enum => Some("enum"),
            _ => None,
        }
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
