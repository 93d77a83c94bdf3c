//! Infix to Postfix Conversion
//!
//! The input grammar requires every binary application to carry its own
//! pair of parentheses, so no precedence table is involved: parentheses
//! alone encode grouping. A closing parenthesis therefore commits exactly
//! one operator to the output.

use crate::token::{Token, TokenKind};
use crate::{RecurError, Result};

/// Convert an infix token sequence to reverse-Polish form.
///
/// Operands are appended to the output as they appear; operators wait on a
/// stack until their closing parenthesis commits them. One operator may be
/// left over at the end when the outermost application is unwrapped (e.g.
/// `5 + 3`); more than one means the expression chained operators without
/// parentheses, which the grammar forbids.
pub fn to_postfix(tokens: &[Token]) -> Result<Vec<Token>> {
    let mut ops: Vec<TokenKind> = Vec::new();
    let mut postfix = Vec::with_capacity(tokens.len());
    let mut depth: i32 = 0;

    for tok in tokens {
        match tok.kind {
            TokenKind::Plus | TokenKind::Minus | TokenKind::Times | TokenKind::Div => {
                ops.push(tok.kind)
            }
            TokenKind::LPar => depth += 1,
            TokenKind::RPar => {
                depth -= 1;
                if depth < 0 {
                    return Err(parse_error("mismatched parenthesis"));
                }
                let op = ops
                    .pop()
                    .ok_or_else(|| parse_error("parentheses enclose no operator"))?;
                postfix.push(Token::new(op));
            }
            TokenKind::Var | TokenKind::Val => postfix.push(*tok),
        }
    }

    if depth != 0 {
        return Err(parse_error("unmatched '('"));
    }

    if let Some(op) = ops.pop() {
        postfix.push(Token::new(op));
    }
    if !ops.is_empty() {
        return Err(parse_error(
            "chained operators require parentheses around each application",
        ));
    }

    validate(&postfix)?;
    Ok(postfix)
}

/// Check the stack-machine shape invariant: a non-empty postfix sequence
/// has exactly one operator fewer than operands, and never underflows when
/// consumed left to right.
fn validate(postfix: &[Token]) -> Result<()> {
    if postfix.is_empty() {
        return Ok(());
    }
    let mut pending: i64 = 0;
    for tok in postfix {
        if tok.kind.is_operator() {
            pending -= 1; // pops two, pushes one
        } else {
            pending += 1;
        }
        if pending < 1 {
            return Err(parse_error("malformed expression"));
        }
    }
    if pending != 1 {
        return Err(parse_error("malformed expression"));
    }
    Ok(())
}

fn parse_error(message: &str) -> RecurError {
    RecurError::ParseError {
        message: message.to_string(),
    }
}
