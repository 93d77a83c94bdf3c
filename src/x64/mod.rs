//! x86_64 Recurrence Kernel Back End
//!
//! Direct x64 machine code generation without runtime dependencies.
//!
//! ## Architecture
//!
//! ```text
//! Postfix → X64Codegen → MachineCode → ExecutableCode → native call
//! ```
//!
//! The emitted kernel computes one application of the recurrence per call;
//! the recurrence façade drives the iteration loop from Rust.
//!
//! ## Modules
//!
//! - `registers`: x64 register definitions (GP and SSE)
//! - `encoding`: x64 instruction encoding (REX/ModR/M/SIB)
//! - `codegen`: postfix to x64 translation

pub mod codegen;
pub mod encoding;
pub mod registers;

pub use codegen::X64Codegen;

/// Signature of the emitted kernel: one recurrence application per call.
pub type Kernel = unsafe extern "C" fn(f64) -> f64;
