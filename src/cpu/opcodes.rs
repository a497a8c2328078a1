//! Opcode table and instruction semantics.
//!
//! Every one of the 256 opcodes is defined, including the unofficial ones. Cycle counts are
//! base costs; page-cross penalties and branch costs are added at execution time.
//!
//! Reference: https://www.nesdev.org/wiki/CPU_unofficial_opcodes

use log::warn;

use crate::{
    bus::Bus,
    cpu::{cpu::CPU, flags::Status},
};

use self::Dummy::{Always, OnCarry};
use self::Mode::*;

/// When an indexed mode performs its dummy read at the un-carried address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dummy {
    /// Only when the index carries into the next page (reads).
    OnCarry,
    /// Every time (stores and read-modify-write).
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Imp,
    Imm,
    Zp,
    ZpX,
    ZpY,
    Abs,
    AbsX(Dummy),
    AbsY(Dummy),
    Ind,
    IndX,
    IndY(Dummy),
    Rel,
}

impl Mode {
    /// Reads through an indexed mode cost one more cycle when the page crosses.
    pub fn page_penalty(self) -> bool {
        matches!(
            self,
            Mode::AbsX(Dummy::OnCarry) | Mode::AbsY(Dummy::OnCarry) | Mode::IndY(Dummy::OnCarry)
        )
    }
}

pub struct Op<B: Bus> {
    pub mnemonic: &'static str,
    pub mode: Mode,
    pub cycles: u8,
    pub exec: fn(&mut CPU<B>, u16),
}

impl<B: Bus> Clone for Op<B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: Bus> Copy for Op<B> {}

const fn op<B: Bus>(
    mnemonic: &'static str,
    mode: Mode,
    cycles: u8,
    exec: fn(&mut CPU<B>, u16),
) -> Op<B> {
    Op {
        mnemonic,
        mode,
        cycles,
        exec,
    }
}

impl<B: Bus> CPU<B> {
    /// Placeholder overwritten below; every one of the 256 slots is a real opcode.
    const UNASSIGNED: Op<B> = op("", Imp, 2, Self::nop);

    pub(crate) const OPCODES: [Op<B>; 256] = {
        let mut t = [Self::UNASSIGNED; 256];
        t[0x00] = op("BRK", Imp, 7, Self::brk);
        t[0x01] = op("ORA", IndX, 6, Self::ora);
        t[0x02] = op("KIL", Imp, 2, Self::kil);
        t[0x03] = op("SLO", IndX, 8, Self::slo);
        t[0x04] = op("NOP", Zp, 3, Self::nop);
        t[0x05] = op("ORA", Zp, 3, Self::ora);
        t[0x06] = op("ASL", Zp, 5, Self::asl);
        t[0x07] = op("SLO", Zp, 5, Self::slo);
        t[0x08] = op("PHP", Imp, 3, Self::php);
        t[0x09] = op("ORA", Imm, 2, Self::ora);
        t[0x0A] = op("ASL", Imp, 2, Self::asl_acc);
        t[0x0B] = op("ANC", Imm, 2, Self::anc);
        t[0x0C] = op("NOP", Abs, 4, Self::nop);
        t[0x0D] = op("ORA", Abs, 4, Self::ora);
        t[0x0E] = op("ASL", Abs, 6, Self::asl);
        t[0x0F] = op("SLO", Abs, 6, Self::slo);
        t[0x10] = op("BPL", Rel, 2, Self::bpl);
        t[0x11] = op("ORA", IndY(OnCarry), 5, Self::ora);
        t[0x12] = op("KIL", Imp, 2, Self::kil);
        t[0x13] = op("SLO", IndY(Always), 8, Self::slo);
        t[0x14] = op("NOP", ZpX, 4, Self::nop);
        t[0x15] = op("ORA", ZpX, 4, Self::ora);
        t[0x16] = op("ASL", ZpX, 6, Self::asl);
        t[0x17] = op("SLO", ZpX, 6, Self::slo);
        t[0x18] = op("CLC", Imp, 2, Self::clc);
        t[0x19] = op("ORA", AbsY(OnCarry), 4, Self::ora);
        t[0x1A] = op("NOP", Imp, 2, Self::nop);
        t[0x1B] = op("SLO", AbsY(Always), 7, Self::slo);
        t[0x1C] = op("NOP", AbsX(OnCarry), 4, Self::nop);
        t[0x1D] = op("ORA", AbsX(OnCarry), 4, Self::ora);
        t[0x1E] = op("ASL", AbsX(Always), 7, Self::asl);
        t[0x1F] = op("SLO", AbsX(Always), 7, Self::slo);
        t[0x20] = op("JSR", Abs, 6, Self::jsr);
        t[0x21] = op("AND", IndX, 6, Self::and);
        t[0x22] = op("KIL", Imp, 2, Self::kil);
        t[0x23] = op("RLA", IndX, 8, Self::rla);
        t[0x24] = op("BIT", Zp, 3, Self::bit);
        t[0x25] = op("AND", Zp, 3, Self::and);
        t[0x26] = op("ROL", Zp, 5, Self::rol);
        t[0x27] = op("RLA", Zp, 5, Self::rla);
        t[0x28] = op("PLP", Imp, 4, Self::plp);
        t[0x29] = op("AND", Imm, 2, Self::and);
        t[0x2A] = op("ROL", Imp, 2, Self::rol_acc);
        t[0x2B] = op("ANC", Imm, 2, Self::anc);
        t[0x2C] = op("BIT", Abs, 4, Self::bit);
        t[0x2D] = op("AND", Abs, 4, Self::and);
        t[0x2E] = op("ROL", Abs, 6, Self::rol);
        t[0x2F] = op("RLA", Abs, 6, Self::rla);
        t[0x30] = op("BMI", Rel, 2, Self::bmi);
        t[0x31] = op("AND", IndY(OnCarry), 5, Self::and);
        t[0x32] = op("KIL", Imp, 2, Self::kil);
        t[0x33] = op("RLA", IndY(Always), 8, Self::rla);
        t[0x34] = op("NOP", ZpX, 4, Self::nop);
        t[0x35] = op("AND", ZpX, 4, Self::and);
        t[0x36] = op("ROL", ZpX, 6, Self::rol);
        t[0x37] = op("RLA", ZpX, 6, Self::rla);
        t[0x38] = op("SEC", Imp, 2, Self::sec);
        t[0x39] = op("AND", AbsY(OnCarry), 4, Self::and);
        t[0x3A] = op("NOP", Imp, 2, Self::nop);
        t[0x3B] = op("RLA", AbsY(Always), 7, Self::rla);
        t[0x3C] = op("NOP", AbsX(OnCarry), 4, Self::nop);
        t[0x3D] = op("AND", AbsX(OnCarry), 4, Self::and);
        t[0x3E] = op("ROL", AbsX(Always), 7, Self::rol);
        t[0x3F] = op("RLA", AbsX(Always), 7, Self::rla);
        t[0x40] = op("RTI", Imp, 6, Self::rti);
        t[0x41] = op("EOR", IndX, 6, Self::eor);
        t[0x42] = op("KIL", Imp, 2, Self::kil);
        t[0x43] = op("SRE", IndX, 8, Self::sre);
        t[0x44] = op("NOP", Zp, 3, Self::nop);
        t[0x45] = op("EOR", Zp, 3, Self::eor);
        t[0x46] = op("LSR", Zp, 5, Self::lsr);
        t[0x47] = op("SRE", Zp, 5, Self::sre);
        t[0x48] = op("PHA", Imp, 3, Self::pha);
        t[0x49] = op("EOR", Imm, 2, Self::eor);
        t[0x4A] = op("LSR", Imp, 2, Self::lsr_acc);
        t[0x4B] = op("ALR", Imm, 2, Self::alr);
        t[0x4C] = op("JMP", Abs, 3, Self::jmp);
        t[0x4D] = op("EOR", Abs, 4, Self::eor);
        t[0x4E] = op("LSR", Abs, 6, Self::lsr);
        t[0x4F] = op("SRE", Abs, 6, Self::sre);
        t[0x50] = op("BVC", Rel, 2, Self::bvc);
        t[0x51] = op("EOR", IndY(OnCarry), 5, Self::eor);
        t[0x52] = op("KIL", Imp, 2, Self::kil);
        t[0x53] = op("SRE", IndY(Always), 8, Self::sre);
        t[0x54] = op("NOP", ZpX, 4, Self::nop);
        t[0x55] = op("EOR", ZpX, 4, Self::eor);
        t[0x56] = op("LSR", ZpX, 6, Self::lsr);
        t[0x57] = op("SRE", ZpX, 6, Self::sre);
        t[0x58] = op("CLI", Imp, 2, Self::cli);
        t[0x59] = op("EOR", AbsY(OnCarry), 4, Self::eor);
        t[0x5A] = op("NOP", Imp, 2, Self::nop);
        t[0x5B] = op("SRE", AbsY(Always), 7, Self::sre);
        t[0x5C] = op("NOP", AbsX(OnCarry), 4, Self::nop);
        t[0x5D] = op("EOR", AbsX(OnCarry), 4, Self::eor);
        t[0x5E] = op("LSR", AbsX(Always), 7, Self::lsr);
        t[0x5F] = op("SRE", AbsX(Always), 7, Self::sre);
        t[0x60] = op("RTS", Imp, 6, Self::rts);
        t[0x61] = op("ADC", IndX, 6, Self::adc);
        t[0x62] = op("KIL", Imp, 2, Self::kil);
        t[0x63] = op("RRA", IndX, 8, Self::rra);
        t[0x64] = op("NOP", Zp, 3, Self::nop);
        t[0x65] = op("ADC", Zp, 3, Self::adc);
        t[0x66] = op("ROR", Zp, 5, Self::ror);
        t[0x67] = op("RRA", Zp, 5, Self::rra);
        t[0x68] = op("PLA", Imp, 4, Self::pla);
        t[0x69] = op("ADC", Imm, 2, Self::adc);
        t[0x6A] = op("ROR", Imp, 2, Self::ror_acc);
        t[0x6B] = op("ARR", Imm, 2, Self::arr);
        t[0x6C] = op("JMP", Ind, 5, Self::jmp);
        t[0x6D] = op("ADC", Abs, 4, Self::adc);
        t[0x6E] = op("ROR", Abs, 6, Self::ror);
        t[0x6F] = op("RRA", Abs, 6, Self::rra);
        t[0x70] = op("BVS", Rel, 2, Self::bvs);
        t[0x71] = op("ADC", IndY(OnCarry), 5, Self::adc);
        t[0x72] = op("KIL", Imp, 2, Self::kil);
        t[0x73] = op("RRA", IndY(Always), 8, Self::rra);
        t[0x74] = op("NOP", ZpX, 4, Self::nop);
        t[0x75] = op("ADC", ZpX, 4, Self::adc);
        t[0x76] = op("ROR", ZpX, 6, Self::ror);
        t[0x77] = op("RRA", ZpX, 6, Self::rra);
        t[0x78] = op("SEI", Imp, 2, Self::sei);
        t[0x79] = op("ADC", AbsY(OnCarry), 4, Self::adc);
        t[0x7A] = op("NOP", Imp, 2, Self::nop);
        t[0x7B] = op("RRA", AbsY(Always), 7, Self::rra);
        t[0x7C] = op("NOP", AbsX(OnCarry), 4, Self::nop);
        t[0x7D] = op("ADC", AbsX(OnCarry), 4, Self::adc);
        t[0x7E] = op("ROR", AbsX(Always), 7, Self::ror);
        t[0x7F] = op("RRA", AbsX(Always), 7, Self::rra);
        t[0x80] = op("NOP", Imm, 2, Self::nop);
        t[0x81] = op("STA", IndX, 6, Self::sta);
        t[0x82] = op("NOP", Imm, 2, Self::nop);
        t[0x83] = op("SAX", IndX, 6, Self::sax);
        t[0x84] = op("STY", Zp, 3, Self::sty);
        t[0x85] = op("STA", Zp, 3, Self::sta);
        t[0x86] = op("STX", Zp, 3, Self::stx);
        t[0x87] = op("SAX", Zp, 3, Self::sax);
        t[0x88] = op("DEY", Imp, 2, Self::dey);
        t[0x89] = op("NOP", Imm, 2, Self::nop);
        t[0x8A] = op("TXA", Imp, 2, Self::txa);
        t[0x8B] = op("XAA", Imm, 2, Self::xaa);
        t[0x8C] = op("STY", Abs, 4, Self::sty);
        t[0x8D] = op("STA", Abs, 4, Self::sta);
        t[0x8E] = op("STX", Abs, 4, Self::stx);
        t[0x8F] = op("SAX", Abs, 4, Self::sax);
        t[0x90] = op("BCC", Rel, 2, Self::bcc);
        t[0x91] = op("STA", IndY(Always), 6, Self::sta);
        t[0x92] = op("KIL", Imp, 2, Self::kil);
        t[0x93] = op("AHX", IndY(Always), 6, Self::ahx);
        t[0x94] = op("STY", ZpX, 4, Self::sty);
        t[0x95] = op("STA", ZpX, 4, Self::sta);
        t[0x96] = op("STX", ZpY, 4, Self::stx);
        t[0x97] = op("SAX", ZpY, 4, Self::sax);
        t[0x98] = op("TYA", Imp, 2, Self::tya);
        t[0x99] = op("STA", AbsY(Always), 5, Self::sta);
        t[0x9A] = op("TXS", Imp, 2, Self::txs);
        t[0x9B] = op("TAS", AbsY(Always), 5, Self::tas);
        t[0x9C] = op("SHY", AbsX(Always), 5, Self::shy);
        t[0x9D] = op("STA", AbsX(Always), 5, Self::sta);
        t[0x9E] = op("SHX", AbsY(Always), 5, Self::shx);
        t[0x9F] = op("AHX", AbsY(Always), 5, Self::ahx);
        t[0xA0] = op("LDY", Imm, 2, Self::ldy);
        t[0xA1] = op("LDA", IndX, 6, Self::lda);
        t[0xA2] = op("LDX", Imm, 2, Self::ldx);
        t[0xA3] = op("LAX", IndX, 6, Self::lax);
        t[0xA4] = op("LDY", Zp, 3, Self::ldy);
        t[0xA5] = op("LDA", Zp, 3, Self::lda);
        t[0xA6] = op("LDX", Zp, 3, Self::ldx);
        t[0xA7] = op("LAX", Zp, 3, Self::lax);
        t[0xA8] = op("TAY", Imp, 2, Self::tay);
        t[0xA9] = op("LDA", Imm, 2, Self::lda);
        t[0xAA] = op("TAX", Imp, 2, Self::tax);
        t[0xAB] = op("LAX", Imm, 2, Self::lax);
        t[0xAC] = op("LDY", Abs, 4, Self::ldy);
        t[0xAD] = op("LDA", Abs, 4, Self::lda);
        t[0xAE] = op("LDX", Abs, 4, Self::ldx);
        t[0xAF] = op("LAX", Abs, 4, Self::lax);
        t[0xB0] = op("BCS", Rel, 2, Self::bcs);
        t[0xB1] = op("LDA", IndY(OnCarry), 5, Self::lda);
        t[0xB2] = op("KIL", Imp, 2, Self::kil);
        t[0xB3] = op("LAX", IndY(OnCarry), 5, Self::lax);
        t[0xB4] = op("LDY", ZpX, 4, Self::ldy);
        t[0xB5] = op("LDA", ZpX, 4, Self::lda);
        t[0xB6] = op("LDX", ZpY, 4, Self::ldx);
        t[0xB7] = op("LAX", ZpY, 4, Self::lax);
        t[0xB8] = op("CLV", Imp, 2, Self::clv);
        t[0xB9] = op("LDA", AbsY(OnCarry), 4, Self::lda);
        t[0xBA] = op("TSX", Imp, 2, Self::tsx);
        t[0xBB] = op("LAS", AbsY(OnCarry), 4, Self::las);
        t[0xBC] = op("LDY", AbsX(OnCarry), 4, Self::ldy);
        t[0xBD] = op("LDA", AbsX(OnCarry), 4, Self::lda);
        t[0xBE] = op("LDX", AbsY(OnCarry), 4, Self::ldx);
        t[0xBF] = op("LAX", AbsY(OnCarry), 4, Self::lax);
        t[0xC0] = op("CPY", Imm, 2, Self::cpy);
        t[0xC1] = op("CMP", IndX, 6, Self::cmp);
        t[0xC2] = op("NOP", Imm, 2, Self::nop);
        t[0xC3] = op("DCP", IndX, 8, Self::dcp);
        t[0xC4] = op("CPY", Zp, 3, Self::cpy);
        t[0xC5] = op("CMP", Zp, 3, Self::cmp);
        t[0xC6] = op("DEC", Zp, 5, Self::dec);
        t[0xC7] = op("DCP", Zp, 5, Self::dcp);
        t[0xC8] = op("INY", Imp, 2, Self::iny);
        t[0xC9] = op("CMP", Imm, 2, Self::cmp);
        t[0xCA] = op("DEX", Imp, 2, Self::dex);
        t[0xCB] = op("AXS", Imm, 2, Self::axs);
        t[0xCC] = op("CPY", Abs, 4, Self::cpy);
        t[0xCD] = op("CMP", Abs, 4, Self::cmp);
        t[0xCE] = op("DEC", Abs, 6, Self::dec);
        t[0xCF] = op("DCP", Abs, 6, Self::dcp);
        t[0xD0] = op("BNE", Rel, 2, Self::bne);
        t[0xD1] = op("CMP", IndY(OnCarry), 5, Self::cmp);
        t[0xD2] = op("KIL", Imp, 2, Self::kil);
        t[0xD3] = op("DCP", IndY(Always), 8, Self::dcp);
        t[0xD4] = op("NOP", ZpX, 4, Self::nop);
        t[0xD5] = op("CMP", ZpX, 4, Self::cmp);
        t[0xD6] = op("DEC", ZpX, 6, Self::dec);
        t[0xD7] = op("DCP", ZpX, 6, Self::dcp);
        t[0xD8] = op("CLD", Imp, 2, Self::cld);
        t[0xD9] = op("CMP", AbsY(OnCarry), 4, Self::cmp);
        t[0xDA] = op("NOP", Imp, 2, Self::nop);
        t[0xDB] = op("DCP", AbsY(Always), 7, Self::dcp);
        t[0xDC] = op("NOP", AbsX(OnCarry), 4, Self::nop);
        t[0xDD] = op("CMP", AbsX(OnCarry), 4, Self::cmp);
        t[0xDE] = op("DEC", AbsX(Always), 7, Self::dec);
        t[0xDF] = op("DCP", AbsX(Always), 7, Self::dcp);
        t[0xE0] = op("CPX", Imm, 2, Self::cpx);
        t[0xE1] = op("SBC", IndX, 6, Self::sbc);
        t[0xE2] = op("NOP", Imm, 2, Self::nop);
        t[0xE3] = op("ISC", IndX, 8, Self::isc);
        t[0xE4] = op("CPX", Zp, 3, Self::cpx);
        t[0xE5] = op("SBC", Zp, 3, Self::sbc);
        t[0xE6] = op("INC", Zp, 5, Self::inc);
        t[0xE7] = op("ISC", Zp, 5, Self::isc);
        t[0xE8] = op("INX", Imp, 2, Self::inx);
        t[0xE9] = op("SBC", Imm, 2, Self::sbc);
        t[0xEA] = op("NOP", Imp, 2, Self::nop);
        t[0xEB] = op("SBC", Imm, 2, Self::sbc);
        t[0xEC] = op("CPX", Abs, 4, Self::cpx);
        t[0xED] = op("SBC", Abs, 4, Self::sbc);
        t[0xEE] = op("INC", Abs, 6, Self::inc);
        t[0xEF] = op("ISC", Abs, 6, Self::isc);
        t[0xF0] = op("BEQ", Rel, 2, Self::beq);
        t[0xF1] = op("SBC", IndY(OnCarry), 5, Self::sbc);
        t[0xF2] = op("KIL", Imp, 2, Self::kil);
        t[0xF3] = op("ISC", IndY(Always), 8, Self::isc);
        t[0xF4] = op("NOP", ZpX, 4, Self::nop);
        t[0xF5] = op("SBC", ZpX, 4, Self::sbc);
        t[0xF6] = op("INC", ZpX, 6, Self::inc);
        t[0xF7] = op("ISC", ZpX, 6, Self::isc);
        t[0xF8] = op("SED", Imp, 2, Self::sed);
        t[0xF9] = op("SBC", AbsY(OnCarry), 4, Self::sbc);
        t[0xFA] = op("NOP", Imp, 2, Self::nop);
        t[0xFB] = op("ISC", AbsY(Always), 7, Self::isc);
        t[0xFC] = op("NOP", AbsX(OnCarry), 4, Self::nop);
        t[0xFD] = op("SBC", AbsX(OnCarry), 4, Self::sbc);
        t[0xFE] = op("INC", AbsX(Always), 7, Self::inc);
        t[0xFF] = op("ISC", AbsX(Always), 7, Self::isc);

        let mut i = 0;
        while i < t.len() {
            assert!(!t[i].mnemonic.is_empty(), "unassigned opcode slot");
            i += 1;
        }
        t
    };

    fn kil(&mut self, _addr: u16) {
        warn!("KIL at ${:04X}, CPU halted", self.op_pc);
        self.halted = true;
    }

    fn nop(&mut self, _addr: u16) {}

    // Loads and stores

    fn lda(&mut self, addr: u16) {
        self.a = self.bus.read(addr);
        self.update_zero_and_negative_flags(self.a);
    }

    fn ldx(&mut self, addr: u16) {
        self.x = self.bus.read(addr);
        self.update_zero_and_negative_flags(self.x);
    }

    fn ldy(&mut self, addr: u16) {
        self.y = self.bus.read(addr);
        self.update_zero_and_negative_flags(self.y);
    }

    fn lax(&mut self, addr: u16) {
        self.a = self.bus.read(addr);
        self.x = self.a;
        self.update_zero_and_negative_flags(self.a);
    }

    fn las(&mut self, addr: u16) {
        self.sp &= self.bus.read(addr);
        self.a = self.sp;
        self.x = self.sp;
        self.update_zero_and_negative_flags(self.sp);
    }

    fn sta(&mut self, addr: u16) {
        self.bus.write(addr, self.a);
    }

    fn stx(&mut self, addr: u16) {
        self.bus.write(addr, self.x);
    }

    fn sty(&mut self, addr: u16) {
        self.bus.write(addr, self.y);
    }

    fn sax(&mut self, addr: u16) {
        self.bus.write(addr, self.a & self.x);
    }

    /// Shared tail of AHX/SHX/SHY/TAS: stores `value & (H + 1)`. When indexing carried
    /// into the high byte, the byte already at the address is written back instead.
    fn store_high_and(&mut self, addr: u16, value: u8, index: u8) {
        let data = value & ((addr >> 8) as u8).wrapping_add(1);
        let low = addr.wrapping_sub(index as u16) & 0xFF;
        if index as u16 + low <= 0xFF {
            self.bus.write(addr, data);
        } else {
            let current = self.bus.read(addr);
            self.bus.write(addr, current);
        }
    }

    fn ahx(&mut self, addr: u16) {
        self.store_high_and(addr, self.a & self.x, self.y);
    }

    fn shx(&mut self, addr: u16) {
        self.store_high_and(addr, self.x, self.y);
    }

    fn shy(&mut self, addr: u16) {
        self.store_high_and(addr, self.y, self.x);
    }

    fn tas(&mut self, addr: u16) {
        self.sp = self.a & self.x;
        self.store_high_and(addr, self.sp, self.y);
    }

    // Register transfers

    fn tax(&mut self, _addr: u16) {
        self.x = self.a;
        self.update_zero_and_negative_flags(self.x);
    }

    fn tay(&mut self, _addr: u16) {
        self.y = self.a;
        self.update_zero_and_negative_flags(self.y);
    }

    fn txa(&mut self, _addr: u16) {
        self.a = self.x;
        self.update_zero_and_negative_flags(self.a);
    }

    fn tya(&mut self, _addr: u16) {
        self.a = self.y;
        self.update_zero_and_negative_flags(self.a);
    }

    fn tsx(&mut self, _addr: u16) {
        self.x = self.sp;
        self.update_zero_and_negative_flags(self.x);
    }

    fn txs(&mut self, _addr: u16) {
        self.sp = self.x;
    }

    // Stack

    fn pha(&mut self, _addr: u16) {
        self.bus.read(self.pc.wrapping_add(1));
        self.push(self.a);
    }

    fn php(&mut self, _addr: u16) {
        self.bus.read(self.pc.wrapping_add(1));
        self.push((self.status | Status::BREAK | Status::UNUSED).bits());
    }

    fn pla(&mut self, _addr: u16) {
        self.bus.read(self.pc.wrapping_add(1));
        self.a = self.pop();
        self.update_zero_and_negative_flags(self.a);
    }

    fn plp(&mut self, _addr: u16) {
        self.delay_interrupt();
        self.bus.read(self.pc.wrapping_add(1));
        let value = self.pop();
        self.status = Status::from_stack(value);
    }

    // Arithmetic and logic

    fn add_with_carry(&mut self, value: u8) {
        let carry_in = self.status.contains(Status::CARRY) as u16;
        let sum = self.a as u16 + value as u16 + carry_in;
        let result = sum as u8;

        self.status.set(Status::CARRY, sum > 0xFF);
        self.status.set(
            Status::OVERFLOW,
            (!(self.a ^ value) & (self.a ^ result)) & 0x80 != 0,
        );

        self.a = result;
        self.update_zero_and_negative_flags(self.a);
    }

    fn adc(&mut self, addr: u16) {
        let value = self.bus.read(addr);
        self.add_with_carry(value);
    }

    fn sbc(&mut self, addr: u16) {
        let value = self.bus.read(addr);
        self.add_with_carry(!value);
    }

    fn and(&mut self, addr: u16) {
        self.a &= self.bus.read(addr);
        self.update_zero_and_negative_flags(self.a);
    }

    fn ora(&mut self, addr: u16) {
        self.a |= self.bus.read(addr);
        self.update_zero_and_negative_flags(self.a);
    }

    fn eor(&mut self, addr: u16) {
        self.a ^= self.bus.read(addr);
        self.update_zero_and_negative_flags(self.a);
    }

    fn bit(&mut self, addr: u16) {
        let value = self.bus.read(addr);
        self.status.set(Status::ZERO, value & self.a == 0);
        self.status.set(Status::NEGATIVE, value & 0x80 != 0);
        self.status.set(Status::OVERFLOW, value & 0x40 != 0);
    }

    fn compare(&mut self, register: u8, addr: u16) {
        let value = self.bus.read(addr);
        self.status.set(Status::CARRY, register >= value);
        self.update_zero_and_negative_flags(register.wrapping_sub(value));
    }

    fn cmp(&mut self, addr: u16) {
        self.compare(self.a, addr);
    }

    fn cpx(&mut self, addr: u16) {
        self.compare(self.x, addr);
    }

    fn cpy(&mut self, addr: u16) {
        self.compare(self.y, addr);
    }

    fn anc(&mut self, addr: u16) {
        self.and(addr);
        let negative = self.status.contains(Status::NEGATIVE);
        self.status.set(Status::CARRY, negative);
    }

    fn alr(&mut self, addr: u16) {
        self.and(addr);
        self.lsr_acc(addr);
    }

    fn arr(&mut self, addr: u16) {
        let value = self.bus.read(addr);
        let carry = self.status.contains(Status::CARRY) as u8;
        self.a = ((value & self.a) >> 1) | (carry << 7);
        self.update_zero_and_negative_flags(self.a);

        let bit6 = self.a & 0x40 != 0;
        let bit5 = self.a & 0x20 != 0;
        self.status.set(Status::CARRY, bit6);
        self.status.set(Status::OVERFLOW, bit6 ^ bit5);
    }

    fn axs(&mut self, addr: u16) {
        let value = self.bus.read(addr);
        let masked = self.a & self.x;
        self.status.set(Status::CARRY, masked >= value);
        self.x = masked.wrapping_sub(value);
        self.update_zero_and_negative_flags(self.x);
    }

    fn xaa(&mut self, addr: u16) {
        self.a = self.x & self.bus.read(addr);
        self.update_zero_and_negative_flags(self.a);
    }

    // Increments and decrements

    fn inx(&mut self, _addr: u16) {
        self.x = self.x.wrapping_add(1);
        self.update_zero_and_negative_flags(self.x);
    }

    fn iny(&mut self, _addr: u16) {
        self.y = self.y.wrapping_add(1);
        self.update_zero_and_negative_flags(self.y);
    }

    fn dex(&mut self, _addr: u16) {
        self.x = self.x.wrapping_sub(1);
        self.update_zero_and_negative_flags(self.x);
    }

    fn dey(&mut self, _addr: u16) {
        self.y = self.y.wrapping_sub(1);
        self.update_zero_and_negative_flags(self.y);
    }

    /// Read-modify-write: the unmodified value is written back before the result.
    fn modify(&mut self, addr: u16, f: impl FnOnce(&mut Self, u8) -> u8) -> u8 {
        let value = self.bus.read(addr);
        self.bus.write(addr, value);
        let result = f(self, value);
        self.bus.write(addr, result);
        result
    }

    fn inc(&mut self, addr: u16) {
        let result = self.modify(addr, |_, v| v.wrapping_add(1));
        self.update_zero_and_negative_flags(result);
    }

    fn dec(&mut self, addr: u16) {
        let result = self.modify(addr, |_, v| v.wrapping_sub(1));
        self.update_zero_and_negative_flags(result);
    }

    fn dcp(&mut self, addr: u16) {
        self.dec(addr);
        self.cmp(addr);
    }

    fn isc(&mut self, addr: u16) {
        self.inc(addr);
        self.sbc(addr);
    }

    // Shifts and rotates

    fn shift_left(&mut self, value: u8, carry_in: bool) -> u8 {
        self.status.set(Status::CARRY, value & 0x80 != 0);
        let result = (value << 1) | carry_in as u8;
        self.update_zero_and_negative_flags(result);
        result
    }

    fn shift_right(&mut self, value: u8, carry_in: bool) -> u8 {
        self.status.set(Status::CARRY, value & 0x01 != 0);
        let result = (value >> 1) | ((carry_in as u8) << 7);
        self.update_zero_and_negative_flags(result);
        result
    }

    fn asl(&mut self, addr: u16) {
        self.modify(addr, |cpu, v| cpu.shift_left(v, false));
    }

    fn asl_acc(&mut self, _addr: u16) {
        self.a = self.shift_left(self.a, false);
    }

    fn lsr(&mut self, addr: u16) {
        self.modify(addr, |cpu, v| cpu.shift_right(v, false));
    }

    fn lsr_acc(&mut self, _addr: u16) {
        self.a = self.shift_right(self.a, false);
    }

    fn rol(&mut self, addr: u16) {
        let carry = self.status.contains(Status::CARRY);
        self.modify(addr, |cpu, v| cpu.shift_left(v, carry));
    }

    fn rol_acc(&mut self, _addr: u16) {
        let carry = self.status.contains(Status::CARRY);
        self.a = self.shift_left(self.a, carry);
    }

    fn ror(&mut self, addr: u16) {
        let carry = self.status.contains(Status::CARRY);
        self.modify(addr, |cpu, v| cpu.shift_right(v, carry));
    }

    fn ror_acc(&mut self, _addr: u16) {
        let carry = self.status.contains(Status::CARRY);
        self.a = self.shift_right(self.a, carry);
    }

    fn slo(&mut self, addr: u16) {
        let result = self.modify(addr, |cpu, v| cpu.shift_left(v, false));
        self.a |= result;
        self.update_zero_and_negative_flags(self.a);
    }

    fn sre(&mut self, addr: u16) {
        let result = self.modify(addr, |cpu, v| cpu.shift_right(v, false));
        self.a ^= result;
        self.update_zero_and_negative_flags(self.a);
    }

    fn rla(&mut self, addr: u16) {
        let carry = self.status.contains(Status::CARRY);
        let result = self.modify(addr, |cpu, v| cpu.shift_left(v, carry));
        self.a &= result;
        self.update_zero_and_negative_flags(self.a);
    }

    fn rra(&mut self, addr: u16) {
        let carry = self.status.contains(Status::CARRY);
        let result = self.modify(addr, |cpu, v| cpu.shift_right(v, carry));
        self.add_with_carry(result);
    }

    // Flags

    fn clc(&mut self, _addr: u16) {
        self.status.remove(Status::CARRY);
    }

    fn sec(&mut self, _addr: u16) {
        self.status.insert(Status::CARRY);
    }

    fn cld(&mut self, _addr: u16) {
        self.status.remove(Status::DECIMAL);
    }

    fn sed(&mut self, _addr: u16) {
        self.status.insert(Status::DECIMAL);
    }

    fn clv(&mut self, _addr: u16) {
        self.status.remove(Status::OVERFLOW);
    }

    fn cli(&mut self, _addr: u16) {
        self.delay_interrupt();
        self.status.remove(Status::INTERRUPT_DISABLE);
    }

    fn sei(&mut self, _addr: u16) {
        self.delay_interrupt();
        self.status.insert(Status::INTERRUPT_DISABLE);
    }

    // Control flow

    /// Taken branches cost one extra cycle, two if the target is on another page than the
    /// following instruction. A branch onto itself parks the CPU as idle.
    fn branch(&mut self, condition: bool, target: u16) {
        if !condition {
            return;
        }

        self.extra_cycles += 1;
        if (self.pc & 0xFF00) != (target & 0xFF00) {
            self.extra_cycles += 1;
        }
        if target == self.op_pc {
            self.idle = true;
        }
        self.pc = target;
    }

    fn bpl(&mut self, addr: u16) {
        self.branch(!self.status.contains(Status::NEGATIVE), addr);
    }

    fn bmi(&mut self, addr: u16) {
        self.branch(self.status.contains(Status::NEGATIVE), addr);
    }

    fn bvc(&mut self, addr: u16) {
        self.branch(!self.status.contains(Status::OVERFLOW), addr);
    }

    fn bvs(&mut self, addr: u16) {
        self.branch(self.status.contains(Status::OVERFLOW), addr);
    }

    fn bcc(&mut self, addr: u16) {
        self.branch(!self.status.contains(Status::CARRY), addr);
    }

    fn bcs(&mut self, addr: u16) {
        self.branch(self.status.contains(Status::CARRY), addr);
    }

    fn bne(&mut self, addr: u16) {
        self.branch(!self.status.contains(Status::ZERO), addr);
    }

    fn beq(&mut self, addr: u16) {
        self.branch(self.status.contains(Status::ZERO), addr);
    }

    fn jmp(&mut self, addr: u16) {
        if addr == self.op_pc {
            self.idle = true;
        }
        self.pc = addr;
    }

    fn jsr(&mut self, addr: u16) {
        self.pc = self.pc.wrapping_sub(1);
        self.bus.read(self.pc);
        self.push((self.pc >> 8) as u8);
        self.push(self.pc as u8);
        self.pc = addr;
    }

    fn rts(&mut self, _addr: u16) {
        self.bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        let lo = self.pop() as u16;
        let hi = self.pop() as u16;
        self.pc = ((hi << 8) | lo).wrapping_add(1);
    }

    fn rti(&mut self, _addr: u16) {
        self.bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        let flags = self.pop();
        self.status = Status::from_stack(flags);
        let lo = self.pop() as u16;
        let hi = self.pop() as u16;
        self.pc = (hi << 8) | lo;
    }

    fn brk(&mut self, _addr: u16) {
        self.bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        self.push((self.pc >> 8) as u8);
        self.push(self.pc as u8);
        self.push((self.status | Status::BREAK | Status::UNUSED).bits());
        self.status.insert(Status::INTERRUPT_DISABLE);
        self.pc = self.read_word(0xFFFE);
    }
}
