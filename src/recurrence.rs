//! The Recurrence Façade
//!
//! Owns an expression's source, token stream, postfix form, and initial
//! value, plus the lazily compiled native kernel. `compute` dispatches
//! between the reference interpreter and the JIT driver.

use std::sync::OnceLock;

use crate::exec::ExecutableCode;
use crate::token::{self, Token};
use crate::{interp, postfix, Result};

/// A scalar recurrence N_{k+1} = f(N_k).
///
/// Construction lexes and converts the formula; compilation happens on the
/// first JIT-backed `compute` and is cached for the lifetime of the value.
/// The kernel mapping is released when the `Recurrence` is dropped.
pub struct Recurrence {
    eqn: String,
    tokens: Vec<Token>,
    postfix: Vec<Token>,
    n0: f64,
    kernel: OnceLock<ExecutableCode>,
}

impl Recurrence {
    /// Parse `formula` with initial value `n0`.
    pub fn new(formula: impl Into<String>, n0: f64) -> Result<Self> {
        let eqn = formula.into();
        let tokens = token::tokenize(&eqn)?;
        let postfix = postfix::to_postfix(&tokens)?;
        Ok(Self {
            eqn,
            tokens,
            postfix,
            n0,
            kernel: OnceLock::new(),
        })
    }

    /// The source formula.
    pub fn formula(&self) -> &str {
        &self.eqn
    }

    /// The lexed infix token stream (kept for diagnostics).
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// The postfix form the interpreter and code generators consume.
    pub fn postfix(&self) -> &[Token] {
        &self.postfix
    }

    /// The initial value N_0.
    pub fn initial(&self) -> f64 {
        self.n0
    }

    /// Replace the initial value N_0.
    pub fn set_initial(&mut self, n0: f64) {
        self.n0 = n0;
    }

    /// Apply the recurrence `iters` times starting from N_0.
    ///
    /// With `use_jit`, the first call compiles the expression to native
    /// code and caches the mapping; architectures without a back end fall
    /// back to the interpreter. Both paths produce bit-identical results.
    pub fn compute(&self, iters: usize, use_jit: bool) -> Result<f64> {
        if self.postfix.is_empty() {
            return Ok(self.n0);
        }
        if use_jit {
            #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
            return self.compute_jit(iters);
        }
        interp::evaluate(&self.postfix, self.n0, iters)
    }

    /// Size in bytes of the compiled kernel, if one has been compiled.
    pub fn kernel_size(&self) -> Option<usize> {
        self.kernel.get().map(ExecutableCode::len)
    }

    #[cfg(target_arch = "x86_64")]
    fn compute_jit(&self, iters: usize) -> Result<f64> {
        let kernel = self.compiled()?;
        // The x86_64 kernel computes one application per call; iterate here.
        let f: crate::x64::Kernel = unsafe { std::mem::transmute(kernel.entry()) };
        let mut n_last = self.n0;
        for _ in 0..iters {
            n_last = unsafe { f(n_last) };
        }
        Ok(n_last)
    }

    #[cfg(target_arch = "aarch64")]
    fn compute_jit(&self, iters: usize) -> Result<f64> {
        let kernel = self.compiled()?;
        // The AArch64 kernel loops internally; one call does it all.
        let f: crate::arm64::Kernel = unsafe { std::mem::transmute(kernel.entry()) };
        Ok(unsafe { f(self.n0, iters) })
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    fn compiled(&self) -> Result<&ExecutableCode> {
        if let Some(kernel) = self.kernel.get() {
            return Ok(kernel);
        }
        let code = Self::emit(&self.postfix)?;
        let mapped = ExecutableCode::new(&code)?;
        // A concurrent first compile may have won the race; its mapping is
        // the one that stays, ours is dropped.
        Ok(self.kernel.get_or_init(|| mapped))
    }

    #[cfg(target_arch = "x86_64")]
    fn emit(postfix: &[Token]) -> Result<Vec<u8>> {
        crate::x64::X64Codegen::new().compile(postfix)
    }

    #[cfg(target_arch = "aarch64")]
    fn emit(postfix: &[Token]) -> Result<Vec<u8>> {
        crate::arm64::Arm64Codegen::new().compile(postfix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = "(((54 + 3) / 8) - (4 * 2)) + n";

    #[test]
    fn test_construction_keeps_both_forms() {
        let r = Recurrence::new(REFERENCE, 0.0).unwrap();
        assert_eq!(r.formula(), REFERENCE);
        assert_eq!(r.tokens().len(), 19);
        assert_eq!(r.postfix().len(), 11);
        assert_eq!(r.initial(), 0.0);
    }

    #[test]
    fn test_construction_rejects_bad_input() {
        assert!(Recurrence::new("(n + x)", 0.0).is_err());
        assert!(Recurrence::new("(", 0.0).is_err());
        assert!(Recurrence::new("(5 + 3))", 0.0).is_err());
    }

    #[test]
    fn test_interpreted_compute() {
        let r = Recurrence::new(REFERENCE, 0.0).unwrap();
        assert_eq!(r.compute(1, false).unwrap(), -0.875);
        assert_eq!(r.compute(2, false).unwrap(), -1.75);
    }

    #[test]
    fn test_zero_iterations_identity() {
        let r = Recurrence::new(REFERENCE, 2.5).unwrap();
        assert_eq!(r.compute(0, false).unwrap(), 2.5);
        assert_eq!(r.compute(0, true).unwrap(), 2.5);
    }

    #[test]
    fn test_empty_formula_returns_n0() {
        let r = Recurrence::new("", 9.25).unwrap();
        assert_eq!(r.compute(100, false).unwrap(), 9.25);
        assert_eq!(r.compute(100, true).unwrap(), 9.25);
        // Nothing to compile for an empty postfix.
        assert_eq!(r.kernel_size(), None);
    }

    #[test]
    fn test_set_initial() {
        let mut r = Recurrence::new("(n + n)", 1.0).unwrap();
        assert_eq!(r.compute(10, false).unwrap(), 1024.0);
        r.set_initial(3.0);
        assert_eq!(r.compute(1, false).unwrap(), 6.0);
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    #[test]
    fn test_kernel_compiled_once_and_cached() {
        let r = Recurrence::new(REFERENCE, 0.0).unwrap();
        assert_eq!(r.kernel_size(), None);
        let first = r.compute(1, true).unwrap();
        let size = r.kernel_size().expect("kernel cached after first compute");
        assert!(size > 0);
        let second = r.compute(1, true).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(r.kernel_size(), Some(size));
    }
}
