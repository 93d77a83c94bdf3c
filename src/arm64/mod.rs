//! AArch64 Recurrence Kernel Back End
//!
//! Direct ARM64 machine code generation without runtime dependencies.
//!
//! ## Architecture
//!
//! ```text
//! Postfix → Arm64Codegen → MachineCode → ExecutableCode → native call
//! ```
//!
//! Unlike the x86_64 back end, the emitted kernel contains the whole
//! iteration loop; the caller makes a single call passing the count.
//!
//! ## Modules
//!
//! - `registers`: ARM64 register definitions (X0-X30, D0-D31)
//! - `encoding`: ARM64 instruction encoding (fixed 32-bit)
//! - `codegen`: postfix to ARM64 translation

pub mod codegen;
pub mod encoding;
pub mod registers;

pub use codegen::Arm64Codegen;

/// Signature of the emitted kernel: runs the full loop internally.
pub type Kernel = unsafe extern "C" fn(f64, usize) -> f64;
