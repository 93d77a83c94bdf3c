//! # recjit — a tiny recurrence JIT
//!
//! Evaluates scalar recurrences N_{k+1} = f(N_k), where f is an arithmetic
//! expression over one variable `n` and non-negative integer literals, and
//! returns N_M in IEEE-754 double precision.
//!
//! The interesting part is how it gets there: a single-pass
//! expression-to-machine-code compiler targeting x86_64 and AArch64 by
//! direct opcode emission — no assembler, no linker. A stack-based
//! interpreter provides the reference semantics and the fallback for other
//! architectures; the JIT is correct iff it matches the interpreter bit
//! for bit.
//!
//! ## Pipeline
//!
//! ```text
//! source → tokens → postfix → interpreter
//!                           ↘ x64/arm64 codegen → executable mapping → native call
//! ```
//!
//! ## Example
//!
//! ```
//! use recjit::Recurrence;
//!
//! let r = Recurrence::new("(n + n)", 1.0)?;
//! assert_eq!(r.compute(10, false)?, 1024.0);
//! # Ok::<(), recjit::RecurError>(())
//! ```
//!
//! The input grammar is fully parenthesized: every binary application
//! carries its own pair of parentheses, so no precedence rules apply.

pub mod arm64;
pub mod exec;
pub mod interp;
pub mod postfix;
pub mod recurrence;
pub mod token;
pub mod x64;

use thiserror::Error;

pub use recurrence::Recurrence;
pub use token::{Token, TokenKind};

/// Recurrence evaluation error types
#[derive(Error, Debug)]
pub enum RecurError {
    #[error("Syntax error: unknown symbol '{symbol}' at byte {offset}")]
    LexError { symbol: char, offset: usize },

    #[error("Parse error: {message}")]
    ParseError { message: String },

    #[error("Evaluation error: {message}")]
    EvalError { message: String },

    #[error("Codegen error: {message}")]
    CodegenError { message: String },

    #[error("JIT error: {message}: {source}")]
    JitError {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for recurrence operations
pub type Result<T> = std::result::Result<T, RecurError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RecurError::LexError {
            symbol: '?',
            offset: 4,
        };
        assert_eq!(err.to_string(), "Syntax error: unknown symbol '?' at byte 4");

        let err = RecurError::ParseError {
            message: "mismatched parenthesis".to_string(),
        };
        assert!(err.to_string().starts_with("Parse error:"));
    }

    #[test]
    fn test_public_pipeline() {
        let tokens = token::tokenize("(7 - 3)").unwrap();
        let pf = postfix::to_postfix(&tokens).unwrap();
        assert_eq!(interp::evaluate(&pf, 0.0, 1).unwrap(), 4.0);
    }
}
