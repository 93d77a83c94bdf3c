//! Recurrence Kernel Generation for x86_64
//!
//! Emits a System V `double(double)` function computing ONE application of
//! the recurrence; the caller drives the iteration loop. The evaluation
//! stack lives on the native stack below the frame pointer, one 8-byte slot
//! per value, and `xmm2` carries the live recurrence value through the body.

use crate::token::{Token, TokenKind};
use crate::{RecurError, Result};

use super::encoding::CodeBuffer;
use super::registers::{Reg64, Xmm};

/// x64 recurrence kernel generator
pub struct X64Codegen {
    code: CodeBuffer,
}

impl X64Codegen {
    pub fn new() -> Self {
        Self {
            code: CodeBuffer::with_capacity(256),
        }
    }

    /// Compile a postfix sequence to a one-iteration kernel.
    pub fn compile(mut self, postfix: &[Token]) -> Result<Vec<u8>> {
        self.emit_prologue();
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
        // Every operator leaves its result in xmm0 as well as on the
        // evaluation stack, and a lone `n` is already the argument. A lone
        // literal reaches neither, so fetch it into the return register.
        if let [tok] = postfix {
            if tok.kind == TokenKind::Val {
                self.code.movsd_load(Xmm::XMM0, Reg64::RSP, 0);
            }
        }
        self.emit_epilogue();
        Ok(self.code.into_code())
    }

    /// push rbp; mov rbp, rsp; movsd xmm2, xmm0
    fn emit_prologue(&mut self) {
        self.code.push_r64(Reg64::RBP);
        self.code.mov_r64_r64(Reg64::RBP, Reg64::RSP);
        self.code.movsd_xmm_xmm(Xmm::XMM2, Xmm::XMM0);
    }

    /// Materialize the running value onto the evaluation stack.
    fn emit_var(&mut self) {
        self.code.movsd_store(Reg64::RSP, -8, Xmm::XMM2);
        self.code.sub_r64_imm8(Reg64::RSP, 8);
    }

    /// Load the literal's IEEE-754 bit pattern via movabs and push it.
    fn emit_val(&mut self, value: f64) {
        self.code.mov_r64_imm64(Reg64::RAX, value.to_bits());
        self.code.push_r64(Reg64::RAX);
    }

    /// Pop two slots, compute, push the result back.
    ///
    /// `[rsp + 8]` is the earlier push and becomes the left operand in
    /// `xmm0`; `[rsp]` is the later push and becomes the right operand in
    /// `xmm1`.
    fn emit_op(&mut self, kind: TokenKind) {
        self.code.movsd_load(Xmm::XMM1, Reg64::RSP, 0);
        self.code.movsd_load(Xmm::XMM0, Reg64::RSP, 8);
        match kind {
            TokenKind::Plus => self.code.addsd(Xmm::XMM0, Xmm::XMM1),
            TokenKind::Minus => self.code.subsd(Xmm::XMM0, Xmm::XMM1),
            TokenKind::Times => self.code.mulsd(Xmm::XMM0, Xmm::XMM1),
            TokenKind::Div => self.code.divsd(Xmm::XMM0, Xmm::XMM1),
            _ => unreachable!("guarded by is_operator"),
        }
        self.code.add_r64_imm8(Reg64::RSP, 8);
        self.code.movsd_store(Reg64::RSP, 0, Xmm::XMM0);
    }

    /// movq xmm0 → rax → xmm0, restore rsp from rbp, pop rbp, ret.
    fn emit_epilogue(&mut self) {
        self.code.movq_r64_xmm(Reg64::RAX, Xmm::XMM0);
        self.code.movq_xmm_r64(Xmm::XMM0, Reg64::RAX);
        self.code.mov_r64_r64(Reg64::RSP, Reg64::RBP);
        self.code.pop_r64(Reg64::RBP);
        self.code.ret();
    }
}

impl Default for X64Codegen {
    fn default() -> Self {
        Self::new()
    }
}
