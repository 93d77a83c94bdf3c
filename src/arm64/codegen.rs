//! Recurrence Kernel Generation for AArch64
//!
//! Emits an AAPCS64 `double(double, usize)` function that runs the WHOLE
//! iteration loop natively: `d0` carries N_0 in and N_M out, `x0` is the
//! iteration count. Each evaluation-stack value occupies one 16-byte slot
//! so SP keeps the alignment AArch64 macOS faults on.
//!
//! Register roles inside the kernel: `x9` loop counter, `x10` literal
//! staging, `d1`/`d2` operand scratch (saved around the loop).

use crate::token::{Token, TokenKind};
use crate::{RecurError, Result};

use super::encoding;
use super::registers::{FReg, Reg64};

/// ARM64 recurrence kernel generator
pub struct Arm64Codegen {
    code: Vec<u8>,
}

impl Arm64Codegen {
    pub fn new() -> Self {
        Self { code: Vec::new() }
    }

    /// Compile a postfix sequence to a self-looping kernel.
    pub fn compile(mut self, postfix: &[Token]) -> Result<Vec<u8>> {
        self.emit_prologue();

        // The loop body re-evaluates the postfix once per iteration; the
        // branch at the tail needs the body's byte extent.
        let loop_start = self.code.len();
        for tok in postfix {
            match tok.kind {
                TokenKind::Var => self.emit_var(),
                TokenKind::Val => self.emit_val(tok.value),
                kind if kind.is_operator() => self.emit_op(kind),
                kind => {
                    return Err(RecurError::CodegenError {
                        message: format!("'{}' has no place in a postfix sequence", kind),
                    })
                }
            }
        }
        self.emit_loop_tail(loop_start);

        self.emit_epilogue();
        Ok(self.code)
    }

    /// Frame save, zero-iteration early return, scratch save, counter setup.
    fn emit_prologue(&mut self) {
        encoding::stp_pre_x(&mut self.code, Reg64::X29, Reg64::X30, -16);
        // Zero iterations: restore and return the input unchanged.
        encoding::cbnz_x(&mut self.code, Reg64::X0, 12);
        encoding::ldp_post_x(&mut self.code, Reg64::X29, Reg64::X30, 16);
        encoding::ret(&mut self.code);

        encoding::stp_pre_d(&mut self.code, FReg::D1, FReg::D2, -16);
        encoding::mov_x(&mut self.code, Reg64::X9, Reg64::X0);
    }

    /// Push the running value onto the evaluation stack.
    fn emit_var(&mut self) {
        encoding::str_d_pre(&mut self.code, FReg::D0, -16);
    }

    /// Push the literal's IEEE-754 bit pattern.
    ///
    /// A zero pattern stores XZR directly; anything else is staged in `x10`
    /// through movz/movk chunk loads.
    fn emit_val(&mut self, value: f64) {
        let bits = value.to_bits();
        if bits == 0 {
            encoding::str_xzr_pre(&mut self.code, -16);
            return;
        }
        encoding::load_imm64(&mut self.code, Reg64::X10, bits);
        encoding::str_x_pre(&mut self.code, Reg64::X10, -16);
    }

    /// Pop both operands with one pair load, compute, push the result.
    ///
    /// The pair load lands the later push (at `[sp]`) in `q2` and the
    /// earlier push (at `[sp + 16]`) in `q1`, so the earlier push is the
    /// left operand: `d1 := d1 ⊕ d2`.
    fn emit_op(&mut self, kind: TokenKind) {
        encoding::ldp_post_q(&mut self.code, FReg::D2, FReg::D1, 32);
        match kind {
            TokenKind::Plus => encoding::fadd_d(&mut self.code, FReg::D1, FReg::D1, FReg::D2),
            TokenKind::Minus => encoding::fsub_d(&mut self.code, FReg::D1, FReg::D1, FReg::D2),
            TokenKind::Times => encoding::fmul_d(&mut self.code, FReg::D1, FReg::D1, FReg::D2),
            TokenKind::Div => encoding::fdiv_d(&mut self.code, FReg::D1, FReg::D1, FReg::D2),
            _ => unreachable!("guarded by is_operator"),
        }
        encoding::str_d_pre(&mut self.code, FReg::D1, -16);
    }

    /// Pop the iteration result into d0, decrement the counter, branch back.
    fn emit_loop_tail(&mut self, loop_start: usize) {
        encoding::ldr_d_post(&mut self.code, FReg::D0, 16);
        encoding::sub_imm_x(&mut self.code, Reg64::X9, Reg64::X9, 1);
        let displacement = loop_start as i64 - self.code.len() as i64;
        encoding::cbnz_x(&mut self.code, Reg64::X9, displacement as i32);
    }

    /// Restore scratch and frame registers, return.
    fn emit_epilogue(&mut self) {
        encoding::ldp_post_d(&mut self.code, FReg::D1, FReg::D2, 16);
        encoding::ldp_post_x(&mut self.code, Reg64::X29, Reg64::X30, 16);
        encoding::ret(&mut self.code);
    }
}

impl Default for Arm64Codegen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postfix::to_postfix;
    use crate::token::tokenize;

    fn compile(expr: &str) -> Vec<u8> {
        let pf = to_postfix(&tokenize(expr).unwrap()).unwrap();
        Arm64Codegen::new().compile(&pf).unwrap()
    }

    fn words(code: &[u8]) -> Vec<u32> {
        code.chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    const PROLOGUE: [u32; 6] = [
        0xA9BF7BFD, // stp fp, lr, [sp, #-16]!
        0xB5000060, // cbnz x0, past the early return
        0xA8C17BFD, // ldp fp, lr, [sp], #16
        0xD65F03C0, // ret
        0x6DBF0BE1, // stp d1, d2, [sp, #-16]!
        0xAA0003E9, // mov x9, x0
    ];

    const EPILOGUE: [u32; 3] = [
        0x6CC10BE1, // ldp d1, d2, [sp], #16
        0xA8C17BFD, // ldp fp, lr, [sp], #16
        0xD65F03C0, // ret
    ];

    #[test]
    fn test_var_plus_literal_kernel() {
        // postfix: n 1 +
        let got = words(&compile("(n + 1)"));
        let mut expected: Vec<u32> = PROLOGUE.to_vec();
        expected.extend([
            0xFC1F0FE0, // str d0, [sp, #-16]!
            // 1.0 = 0x3FF0000000000000: single movz at shift 48
            0xD2800000 | (3 << 21) | (0x3FF0 << 5) | 10,
            0xF81F0FEA, // str x10, [sp, #-16]!
            0xACC107E2, // ldp q2, q1, [sp], #32
            0x1E622821, // fadd d1, d1, d2
            0xFC1F0FE1, // str d1, [sp, #-16]!
            0xFC4107E0, // ldr d0, [sp], #16
            0xD1000529, // sub x9, x9, #1
            // 8 instructions back to the body start
            0xB5000000 | (((-32i32 >> 2) as u32 & 0x7FFFF) << 5) | 9,
        ]);
        expected.extend(EPILOGUE);
        assert_eq!(got, expected);
    }

    #[test]
    fn test_zero_literal_stores_xzr() {
        let got = words(&compile("(n + 0)"));
        assert!(got.contains(&0xF81F0FFF)); // str xzr, [sp, #-16]!
        assert!(!got.contains(&0xF81F0FEA)); // no x10 staging emitted
    }

    #[test]
    fn test_operator_selection() {
        for (expr, insn) in [
            ("(n + 1)", 0x1E622821u32), // fadd d1, d1, d2
            ("(n - 1)", 0x1E623821),    // fsub d1, d1, d2
            ("(n * 1)", 0x1E620821),    // fmul d1, d1, d2
            ("(n / 1)", 0x1E621821),    // fdiv d1, d1, d2
        ] {
            assert!(words(&compile(expr)).contains(&insn), "{}", expr);
        }
    }

    #[test]
    fn test_branch_displacement_spans_body() {
        // The back branch must land on the first body instruction whatever
        // the body size, so the displacement tracks literal chunk counts.
        for expr in ["(n + n)", "(n + 1)", "(n / 305419896)", "5 + 3"] {
            let got = words(&compile(expr));
            let cbnz_index = got.len() - EPILOGUE.len() - 1;
            let insn = got[cbnz_index];
            assert_eq!(insn & 0xFF00001F, 0xB5000009, "{}: cbnz x9", expr);
            let imm19 = (insn >> 5) & 0x7FFFF;
            // Sign-extend the 19-bit field and convert to instructions.
            let offset = ((imm19 << 13) as i32) >> 13;
            let body_len = cbnz_index as i32 - PROLOGUE.len() as i32;
            assert_eq!(offset, -body_len, "{}", expr);
        }
    }

    #[test]
    fn test_multi_chunk_literal() {
        // 305419896 = 0x12345678 → 0x41B2345678000000 as a double: three
        // nonzero chunks → movz + 2 movk.
        let got = words(&compile("(n / 305419896)"));
        let movz_count = got
            .iter()
            .filter(|w| (**w & 0xFF800000) == 0xD2800000)
            .count();
        let movk_count = got
            .iter()
            .filter(|w| (**w & 0xFF800000) == 0xF2800000)
            .count();
        assert_eq!(movz_count, 1);
        assert_eq!(movk_count, 2);
    }

    #[test]
    fn test_parenthesis_token_rejected() {
        let err = Arm64Codegen::new()
            .compile(&[Token::new(TokenKind::RPar)])
            .unwrap_err();
        assert!(matches!(err, RecurError::CodegenError { .. }));
    }
}
