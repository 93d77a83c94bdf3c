//! Expression Tokens and Lexer
//!
//! The input grammar is deliberately tiny: non-negative integer literals,
//! the recurrence variable `n` (or `N`), the four binary operators, and
//! parentheses. Anything else is a syntax error.

use std::fmt;

use crate::{RecurError, Result};

/// Kind of a lexed token.
///
/// The four operator kinds form a contiguous block so they can be matched
/// as a group (see [`TokenKind::is_operator`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Plus,
    Minus,
    Times,
    Div,
    /// The recurrence variable `n`.
    Var,
    /// An integer literal; the value rides in [`Token::value`].
    Val,
    LPar,
    RPar,
}

impl TokenKind {
    /// True for the four arithmetic operator kinds.
    #[inline]
    pub fn is_operator(self) -> bool {
        matches!(
            self,
            TokenKind::Plus | TokenKind::Minus | TokenKind::Times | TokenKind::Div
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Times => "*",
            TokenKind::Div => "/",
            TokenKind::Var => "n",
            TokenKind::Val => "<val>",
            TokenKind::LPar => "(",
            TokenKind::RPar => ")",
        };
        write!(f, "{}", s)
    }
}

/// A lexed token: a kind plus a numeric payload.
///
/// The payload is meaningful only for `Val` tokens, where it holds the
/// literal's value. It is carried as an `f64` because that is how it is
/// ultimately consumed by the interpreter and the code generators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: f64,
}

impl Token {
    /// A payload-free token of the given kind.
    pub fn new(kind: TokenKind) -> Self {
        Self { kind, value: 0.0 }
    }

    /// A `Val` token carrying `value`.
    pub fn val(value: f64) -> Self {
        Self {
            kind: TokenKind::Val,
            value,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Val => write!(f, "{}", self.value),
            kind => write!(f, "{}", kind),
        }
    }
}

/// Lex `input` into its infix token sequence.
///
/// ASCII spaces are skipped. A maximal run of decimal digits becomes one
/// `Val` token (base 10, no sign, no decimal point, no exponent). Any byte
/// outside the grammar aborts with a syntax error naming the symbol.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let kind = match bytes[i] {
            b' ' => {
                i += 1;
                continue;
            }
            b'(' => TokenKind::LPar,
            b')' => TokenKind::RPar,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Times,
            b'/' => TokenKind::Div,
            b'n' | b'N' => TokenKind::Var,
            b'0'..=b'9' => {
                // Accumulating in f64 keeps arbitrarily long digit runs
                // well-defined; the payload is consumed as a double anyway.
                let mut value = 0.0_f64;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    value = value * 10.0 + f64::from(bytes[i] - b'0');
                    i += 1;
                }
                tokens.push(Token::val(value));
                continue;
            }
            other => {
                return Err(RecurError::LexError {
                    symbol: other as char,
                    offset: i,
                })
            }
        };
        tokens.push(Token::new(kind));
        i += 1;
    }

    Ok(tokens)
}
