//! x64 Instruction Encoding
//!
//! Direct machine code generation for x64 instructions.
//! No external assembler dependency.
//!
//! ## Instruction Format
//!
//! ```text
//! [Legacy Prefix] [REX] [Opcode] [ModR/M] [SIB] [Disp] [Imm]
//! ```
//!
//! The SSE2 scalar-double forms here keep the `F2` prefix before REX, as
//! the architecture requires.

use super::registers::{Reg64, Xmm};

/// Machine code buffer for emitting instructions
#[derive(Debug, Default)]
pub struct CodeBuffer {
    code: Vec<u8>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self { code: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            code: Vec::with_capacity(capacity),
        }
    }

    /// Get current code offset
    #[inline]
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Emit a single byte
    #[inline]
    pub fn emit(&mut self, byte: u8) {
        self.code.push(byte);
    }

    /// Emit multiple bytes
    #[inline]
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
    }

    /// Emit a 64-bit little-endian value
    #[inline]
    pub fn emit_u64(&mut self, value: u64) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// Get the generated code
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Take ownership of the generated code
    pub fn into_code(self) -> Vec<u8> {
        self.code
    }
}

/// REX prefix builder
#[derive(Debug, Clone, Copy, Default)]
pub struct Rex {
    w: bool, // 64-bit operand size
    r: bool, // ModR/M reg extension
    x: bool, // SIB index extension
    b: bool, // ModR/M r/m or SIB base extension
}

impl Rex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set W bit (64-bit operand size)
    pub fn w(mut self) -> Self {
        self.w = true;
        self
    }

    /// Set R bit (reg field extension for the upper register bank)
    pub fn r(mut self) -> Self {
        self.r = true;
        self
    }

    /// Set B bit (r/m or base field extension for the upper register bank)
    pub fn b(mut self) -> Self {
        self.b = true;
        self
    }

    /// Check if REX prefix is needed
    pub fn is_needed(&self) -> bool {
        self.w || self.r || self.x || self.b
    }

    /// Encode to byte (0x40-0x4F)
    pub fn encode(&self) -> u8 {
        0x40 | ((self.w as u8) << 3)
            | ((self.r as u8) << 2)
            | ((self.x as u8) << 1)
            | (self.b as u8)
    }
}

/// ModR/M byte builder
#[derive(Debug, Clone, Copy)]
pub struct ModRM {
    mod_: u8, // 2 bits: addressing mode
    reg: u8,  // 3 bits: register or opcode extension
    rm: u8,   // 3 bits: register or memory operand
}

impl ModRM {
    /// Create ModR/M for register-to-register (mod=11)
    pub fn reg_reg(reg: u8, rm: u8) -> Self {
        Self {
            mod_: 0b11,
            reg: reg & 0x07,
            rm: rm & 0x07,
        }
    }

    /// Create ModR/M for register with opcode extension (mod=11)
    pub fn reg_opext(opext: u8, rm: u8) -> Self {
        Self {
            mod_: 0b11,
            reg: opext & 0x07,
            rm: rm & 0x07,
        }
    }

    /// Create ModR/M for a memory operand with no displacement (mod=00)
    pub fn mem(reg: u8, rm: u8) -> Self {
        Self {
            mod_: 0b00,
            reg: reg & 0x07,
            rm: rm & 0x07,
        }
    }

    /// Create ModR/M for a memory operand with an 8-bit displacement (mod=01)
    pub fn mem_disp8(reg: u8, rm: u8) -> Self {
        Self {
            mod_: 0b01,
            reg: reg & 0x07,
            rm: rm & 0x07,
        }
    }

    /// Encode to byte
    pub fn encode(&self) -> u8 {
        (self.mod_ << 6) | (self.reg << 3) | self.rm
    }
}

/// x64 instruction emitter
impl CodeBuffer {
    // ==================== Data Movement ====================

    /// MOV r64, imm64 (movabs)
    pub fn mov_r64_imm64(&mut self, dst: Reg64, imm: u64) {
        let mut rex = Rex::new().w();
        if dst.needs_rex_ext() {
            rex = rex.b();
        }
        self.emit(rex.encode());
        self.emit(0xB8 + dst.encoding()); // B8+rd
        self.emit_u64(imm);
    }

    /// MOV r64, r64
    pub fn mov_r64_r64(&mut self, dst: Reg64, src: Reg64) {
        let mut rex = Rex::new().w();
        if src.needs_rex_ext() {
            rex = rex.r();
        }
        if dst.needs_rex_ext() {
            rex = rex.b();
        }
        self.emit(rex.encode());
        self.emit(0x89); // 89 /r
        self.emit(ModRM::reg_reg(src.encoding(), dst.encoding()).encode());
    }

    // ==================== Arithmetic ====================

    /// ADD r64, imm8 (sign-extended)
    pub fn add_r64_imm8(&mut self, dst: Reg64, imm: i8) {
        let mut rex = Rex::new().w();
        if dst.needs_rex_ext() {
            rex = rex.b();
        }
        self.emit(rex.encode());
        self.emit(0x83); // 83 /0 ib
        self.emit(ModRM::reg_opext(0, dst.encoding()).encode());
        self.emit(imm as u8);
    }

    /// SUB r64, imm8 (sign-extended)
    pub fn sub_r64_imm8(&mut self, dst: Reg64, imm: i8) {
        let mut rex = Rex::new().w();
        if dst.needs_rex_ext() {
            rex = rex.b();
        }
        self.emit(rex.encode());
        self.emit(0x83); // 83 /5 ib
        self.emit(ModRM::reg_opext(5, dst.encoding()).encode());
        self.emit(imm as u8);
    }

    // ==================== Stack Operations ====================

    /// PUSH r64
    pub fn push_r64(&mut self, reg: Reg64) {
        if reg.needs_rex_ext() {
            self.emit(Rex::new().b().encode());
        }
        self.emit(0x50 + reg.encoding()); // 50+rd
    }

    /// POP r64
    pub fn pop_r64(&mut self, reg: Reg64) {
        if reg.needs_rex_ext() {
            self.emit(Rex::new().b().encode());
        }
        self.emit(0x58 + reg.encoding()); // 58+rd
    }

    // ==================== Control Flow ====================

    /// RET
    pub fn ret(&mut self) {
        self.emit(0xC3);
    }

    // ==================== SSE2 Scalar Double ====================

    /// MOVSD xmm, xmm
    pub fn movsd_xmm_xmm(&mut self, dst: Xmm, src: Xmm) {
        self.emit(0xF2);
        let mut rex = Rex::new();
        if dst.needs_rex_ext() {
            rex = rex.r();
        }
        if src.needs_rex_ext() {
            rex = rex.b();
        }
        if rex.is_needed() {
            self.emit(rex.encode());
        }
        self.emit(0x0F);
        self.emit(0x10); // F2 0F 10 /r
        self.emit(ModRM::reg_reg(dst.encoding(), src.encoding()).encode());
    }

    /// MOVSD xmm, [base + disp8]
    pub fn movsd_load(&mut self, dst: Xmm, base: Reg64, disp: i8) {
        self.emit(0xF2);
        let mut rex = Rex::new();
        if dst.needs_rex_ext() {
            rex = rex.r();
        }
        if base.needs_rex_ext() {
            rex = rex.b();
        }
        if rex.is_needed() {
            self.emit(rex.encode());
        }
        self.emit(0x0F);
        self.emit(0x10); // F2 0F 10 /r
        self.emit_mem_operand(dst.encoding(), base, disp);
    }

    /// MOVSD [base + disp8], xmm
    pub fn movsd_store(&mut self, base: Reg64, disp: i8, src: Xmm) {
        self.emit(0xF2);
        let mut rex = Rex::new();
        if src.needs_rex_ext() {
            rex = rex.r();
        }
        if base.needs_rex_ext() {
            rex = rex.b();
        }
        if rex.is_needed() {
            self.emit(rex.encode());
        }
        self.emit(0x0F);
        self.emit(0x11); // F2 0F 11 /r
        self.emit_mem_operand(src.encoding(), base, disp);
    }

    /// ADDSD xmm, xmm
    pub fn addsd(&mut self, dst: Xmm, src: Xmm) {
        self.sse2_arith(0x58, dst, src);
    }

    /// SUBSD xmm, xmm
    pub fn subsd(&mut self, dst: Xmm, src: Xmm) {
        self.sse2_arith(0x5C, dst, src);
    }

    /// MULSD xmm, xmm
    pub fn mulsd(&mut self, dst: Xmm, src: Xmm) {
        self.sse2_arith(0x59, dst, src);
    }

    /// DIVSD xmm, xmm
    pub fn divsd(&mut self, dst: Xmm, src: Xmm) {
        self.sse2_arith(0x5E, dst, src);
    }

    /// MOVQ r64, xmm
    pub fn movq_r64_xmm(&mut self, dst: Reg64, src: Xmm) {
        self.emit(0x66);
        let mut rex = Rex::new().w();
        if src.needs_rex_ext() {
            rex = rex.r();
        }
        if dst.needs_rex_ext() {
            rex = rex.b();
        }
        self.emit(rex.encode());
        self.emit(0x0F);
        self.emit(0x7E); // 66 REX.W 0F 7E /r
        self.emit(ModRM::reg_reg(src.encoding(), dst.encoding()).encode());
    }

    /// MOVQ xmm, r64
    pub fn movq_xmm_r64(&mut self, dst: Xmm, src: Reg64) {
        self.emit(0x66);
        let mut rex = Rex::new().w();
        if dst.needs_rex_ext() {
            rex = rex.r();
        }
        if src.needs_rex_ext() {
            rex = rex.b();
        }
        self.emit(rex.encode());
        self.emit(0x0F);
        self.emit(0x6E); // 66 REX.W 0F 6E /r
        self.emit(ModRM::reg_reg(dst.encoding(), src.encoding()).encode());
    }

    // ==================== Helpers ====================

    /// F2 0F <op> /r with both operands in registers
    fn sse2_arith(&mut self, opcode: u8, dst: Xmm, src: Xmm) {
        self.emit(0xF2);
        let mut rex = Rex::new();
        if dst.needs_rex_ext() {
            rex = rex.r();
        }
        if src.needs_rex_ext() {
            rex = rex.b();
        }
        if rex.is_needed() {
            self.emit(rex.encode());
        }
        self.emit(0x0F);
        self.emit(opcode);
        self.emit(ModRM::reg_reg(dst.encoding(), src.encoding()).encode());
    }

    /// Emit ModR/M (plus SIB and displacement) for a `[base + disp]` operand.
    ///
    /// rm=100 selects a SIB byte, so RSP/R12 bases carry the 0x24 SIB
    /// (base-only, no index); rm=101 with mod=00 would mean RIP-relative,
    /// so RBP/R13 bases always take the disp8 form.
    fn emit_mem_operand(&mut self, reg: u8, base: Reg64, disp: i8) {
        let rm = base.encoding();
        if disp == 0 && rm != 0b101 {
            self.emit(ModRM::mem(reg, rm).encode());
            if rm == 0b100 {
                self.emit(0x24);
            }
        } else {
            self.emit(ModRM::mem_disp8(reg, rm).encode());
            if rm == 0b100 {
                self.emit(0x24);
            }
            self.emit(disp as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mov_r64_imm64() {
        let mut buf = CodeBuffer::new();
        buf.mov_r64_imm64(Reg64::RAX, 42);
        // REX.W + B8 + imm64
        assert_eq!(&buf.code()[0..2], &[0x48, 0xB8]);
        assert_eq!(&buf.code()[2..10], &42u64.to_le_bytes());
    }

    #[test]
    fn test_mov_r64_r64() {
        let mut buf = CodeBuffer::new();
        // mov rbp, rsp
        buf.mov_r64_r64(Reg64::RBP, Reg64::RSP);
        assert_eq!(buf.code(), &[0x48, 0x89, 0xE5]);

        let mut buf = CodeBuffer::new();
        // mov rsp, rbp
        buf.mov_r64_r64(Reg64::RSP, Reg64::RBP);
        assert_eq!(buf.code(), &[0x48, 0x89, 0xEC]);
    }

    #[test]
    fn test_stack_adjustment() {
        let mut buf = CodeBuffer::new();
        buf.sub_r64_imm8(Reg64::RSP, 8);
        assert_eq!(buf.code(), &[0x48, 0x83, 0xEC, 0x08]);

        let mut buf = CodeBuffer::new();
        buf.add_r64_imm8(Reg64::RSP, 8);
        assert_eq!(buf.code(), &[0x48, 0x83, 0xC4, 0x08]);
    }

    #[test]
    fn test_push_pop() {
        let mut buf = CodeBuffer::new();
        buf.push_r64(Reg64::RBP);
        buf.push_r64(Reg64::RAX);
        buf.pop_r64(Reg64::RBP);
        assert_eq!(buf.code(), &[0x55, 0x50, 0x5D]);
    }

    #[test]
    fn test_ret() {
        let mut buf = CodeBuffer::new();
        buf.ret();
        assert_eq!(buf.code(), &[0xC3]);
    }

    #[test]
    fn test_movsd_xmm_xmm() {
        let mut buf = CodeBuffer::new();
        // movsd xmm2, xmm0
        buf.movsd_xmm_xmm(Xmm::XMM2, Xmm::XMM0);
        assert_eq!(buf.code(), &[0xF2, 0x0F, 0x10, 0xD0]);
    }

    #[test]
    fn test_movsd_store_negative_disp() {
        let mut buf = CodeBuffer::new();
        // movsd [rsp - 8], xmm2
        buf.movsd_store(Reg64::RSP, -8, Xmm::XMM2);
        assert_eq!(buf.code(), &[0xF2, 0x0F, 0x11, 0x54, 0x24, 0xF8]);
    }

    #[test]
    fn test_movsd_store_no_disp() {
        let mut buf = CodeBuffer::new();
        // movsd [rsp], xmm0
        buf.movsd_store(Reg64::RSP, 0, Xmm::XMM0);
        assert_eq!(buf.code(), &[0xF2, 0x0F, 0x11, 0x04, 0x24]);
    }

    #[test]
    fn test_movsd_loads() {
        let mut buf = CodeBuffer::new();
        // movsd xmm1, [rsp]
        buf.movsd_load(Xmm::XMM1, Reg64::RSP, 0);
        assert_eq!(buf.code(), &[0xF2, 0x0F, 0x10, 0x0C, 0x24]);

        let mut buf = CodeBuffer::new();
        // movsd xmm0, [rsp + 8]
        buf.movsd_load(Xmm::XMM0, Reg64::RSP, 8);
        assert_eq!(buf.code(), &[0xF2, 0x0F, 0x10, 0x44, 0x24, 0x08]);
    }

    #[test]
    fn test_sse2_arithmetic() {
        let mut buf = CodeBuffer::new();
        buf.addsd(Xmm::XMM0, Xmm::XMM1);
        buf.subsd(Xmm::XMM0, Xmm::XMM1);
        buf.mulsd(Xmm::XMM0, Xmm::XMM1);
        buf.divsd(Xmm::XMM0, Xmm::XMM1);
        assert_eq!(
            buf.code(),
            &[
                0xF2, 0x0F, 0x58, 0xC1, // addsd xmm0, xmm1
                0xF2, 0x0F, 0x5C, 0xC1, // subsd xmm0, xmm1
                0xF2, 0x0F, 0x59, 0xC1, // mulsd xmm0, xmm1
                0xF2, 0x0F, 0x5E, 0xC1, // divsd xmm0, xmm1
            ]
        );
    }

    #[test]
    fn test_movq_round_trip() {
        let mut buf = CodeBuffer::new();
        buf.movq_r64_xmm(Reg64::RAX, Xmm::XMM0);
        buf.movq_xmm_r64(Xmm::XMM0, Reg64::RAX);
        assert_eq!(
            buf.code(),
            &[0x66, 0x48, 0x0F, 0x7E, 0xC0, 0x66, 0x48, 0x0F, 0x6E, 0xC0]
        );
    }

    #[test]
    fn test_extended_registers_take_rex() {
        let mut buf = CodeBuffer::new();
        buf.movsd_xmm_xmm(Xmm::XMM8, Xmm::XMM1);
        // F2 + REX.R + 0F 10 /r
        assert_eq!(buf.code(), &[0xF2, 0x44, 0x0F, 0x10, 0xC1]);
    }
}
