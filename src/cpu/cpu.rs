//! Cycle-driven 6502 interpreter.
//!
//! Each call to [`CPU::run_cycle`] is one CPU clock. An instruction executes in full on the
//! clock that decodes it and then charges its cost as stolen cycles, so every bus access of
//! the instruction lands on that first clock.

use log::{Level, debug, log_enabled, trace};

use crate::{
    bus::Bus,
    cpu::{
        flags::Status,
        opcodes::{Dummy, Mode, Op},
    },
};

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Cost of an NMI/IRQ entry sequence.
const INTERRUPT_CYCLES: u32 = 7;

pub struct CPU<B: Bus> {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: Status,
    /// Clocks seen since power-up, including stolen ones.
    pub cycles: u64,
    pub bus: B,
    /// Set by a lock-up (KIL) opcode. Cleared only by [`CPU::power_up`].
    pub halted: bool,
    /// Fast-forward branch-to-self / jump-to-self loops.
    pub idle_loop_skip: bool,
    stall: u32,
    nmi_line: bool,
    /// Rising edge seen on /NMI since the last instruction boundary.
    nmi_edge: bool,
    nmi_pending: bool,
    irq_delay: bool,
    prev_irq_disable: bool,
    pub(super) idle: bool,
    /// Full cost of the instruction that parked the CPU, burnt per skipped iteration.
    idle_cost: u32,
    pub(super) page_crossed: bool,
    pub(super) extra_cycles: u32,
    /// Address of the opcode being executed.
    pub(super) op_pc: u16,
}

impl<B: Bus> CPU<B> {
    pub fn new(bus: B) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
            status: Status::INTERRUPT_DISABLE,
            cycles: 0,
            bus,
            halted: false,
            idle_loop_skip: true,
            stall: 0,
            nmi_line: false,
            nmi_edge: false,
            nmi_pending: false,
            irq_delay: false,
            prev_irq_disable: true,
            idle: false,
            idle_cost: 0,
            page_crossed: false,
            extra_cycles: 0,
            op_pc: 0,
        }
    }

    /// Power-on state: registers cleared, S = $FD, interrupts disabled, PC from the reset vector.
    pub fn power_up(&mut self) {
        for addr in 0x4000..=0x400F {
            self.bus.write(addr, 0x00);
        }

        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0xFD;
        self.status = Status::INTERRUPT_DISABLE;
        self.halted = false;
        self.idle = false;
        self.stall = 0;
        self.nmi_line = false;
        self.nmi_edge = false;
        self.nmi_pending = false;
        self.irq_delay = false;

        self.pc = self.read_word(RESET_VECTOR);
        debug!("power-up, PC = ${:04X}", self.pc);
    }

    /// Soft reset: reload PC, drop S by three, mask IRQs, silence the APU.
    pub fn reset(&mut self) {
        self.pc = self.read_word(RESET_VECTOR);
        self.bus.write(0x4015, 0);
        let frame_counter = self.bus.read(0x4017);
        self.bus.write(0x4017, frame_counter);

        self.sp = self.sp.wrapping_sub(3);
        self.status.insert(Status::INTERRUPT_DISABLE);
        self.idle = false;
        self.stall = 0;
        debug!("reset, PC = ${:04X}", self.pc);
    }

    /// Drive the NMI input. Only a low-to-high transition queues an interrupt.
    pub fn set_nmi(&mut self, level: bool) {
        if level && !self.nmi_line {
            self.nmi_edge = true;
        }
        self.nmi_line = level;
    }

    /// Redirect execution; leaves any idle loop.
    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
        self.idle = false;
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    /// Add externally stolen cycles (e.g. DMA).
    pub fn steal_cycles(&mut self, cycles: u32) {
        self.stall += cycles;
    }

    /// Advance one CPU clock.
    pub fn run_cycle(&mut self) {
        self.cycles += 1;

        if self.stall > 0 {
            self.stall -= 1;
            return;
        }
        if self.halted {
            return;
        }

        // Instruction boundary. An edge taken up on the previous boundary is serviced now.
        let nmi_now = self.nmi_pending;
        self.nmi_pending = std::mem::take(&mut self.nmi_edge);
        if nmi_now {
            self.interrupt(NMI_VECTOR);
            return;
        }

        if self.bus.irq_line() {
            if !self.status.contains(Status::INTERRUPT_DISABLE) && !self.irq_delay {
                self.interrupt(IRQ_VECTOR);
                return;
            } else if self.irq_delay {
                self.irq_delay = false;
                if !self.prev_irq_disable {
                    self.interrupt(IRQ_VECTOR);
                    return;
                }
            }
        } else {
            self.irq_delay = false;
        }

        if self.idle && self.idle_loop_skip {
            self.stall += self.idle_cost - 1;
            return;
        }

        self.execute();
    }

    /// Run clocks up to and including the next instruction boundary's work (an instruction
    /// or interrupt entry) and its stolen cycles. Returns the clocks spent.
    pub fn step(&mut self) -> u64 {
        let start = self.cycles;
        self.run_cycle();
        while self.stall > 0 {
            self.run_cycle();
        }
        self.cycles - start
    }

    fn execute(&mut self) {
        self.page_crossed = false;
        self.extra_cycles = 0;
        self.op_pc = self.pc;

        let opcode = self.fetch_byte();
        let op: &Op<B> = &Self::OPCODES[opcode as usize];
        let (exec, mode, base) = (op.exec, op.mode, op.cycles);
        if log_enabled!(Level::Trace) {
            self.trace(opcode, op.mnemonic);
        }

        let addr = self.operand(mode);
        exec(self, addr);

        let mut cost = u32::from(base) + self.extra_cycles;
        if mode.page_penalty() && self.page_crossed {
            cost += 1;
        }
        if self.idle {
            self.idle_cost = cost;
        }
        self.stall += cost - 1 + self.bus.take_stall_cycles();
    }

    fn trace(&self, opcode: u8, mnemonic: &str) {
        trace!(
            "{:04X}  {:02X}  {:<4} A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
            self.op_pc,
            opcode,
            mnemonic,
            self.a,
            self.x,
            self.y,
            self.status.to_byte(),
            self.sp,
            self.cycles
        );
    }

    /// Push PC and P (B clear), mask IRQs and jump through `vector`.
    fn interrupt(&mut self, vector: u16) {
        self.idle = false;
        self.push((self.pc >> 8) as u8);
        self.push(self.pc as u8);
        self.push(self.status.to_byte() & !Status::BREAK.bits());
        self.status.insert(Status::INTERRUPT_DISABLE);
        self.pc = self.read_word(vector);
        self.stall += INTERRUPT_CYCLES - 1;
        debug!(
            "{} -> ${:04X}",
            if vector == NMI_VECTOR { "NMI" } else { "IRQ" },
            self.pc
        );
    }

    /// Resolve the effective address for `mode`, performing the bus accesses the hardware
    /// makes along the way. Immediate mode yields the operand's own address.
    pub(super) fn operand(&mut self, mode: Mode) -> u16 {
        match mode {
            Mode::Imp => 0,
            Mode::Imm => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                addr
            }
            Mode::Zp => self.fetch_byte() as u16,
            Mode::ZpX => self.fetch_byte().wrapping_add(self.x) as u16,
            Mode::ZpY => self.fetch_byte().wrapping_add(self.y) as u16,
            Mode::Abs => self.fetch_word(),
            Mode::AbsX(dummy) => {
                let base = self.fetch_word();
                self.indexed(base, self.x, dummy)
            }
            Mode::AbsY(dummy) => {
                let base = self.fetch_word();
                self.indexed(base, self.y, dummy)
            }
            Mode::Ind => {
                // The high byte never carries into the next page.
                let ptr = self.fetch_word();
                let lo = self.bus.read(ptr) as u16;
                let hi_addr = (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF);
                let hi = self.bus.read(hi_addr) as u16;
                (hi << 8) | lo
            }
            Mode::IndX => {
                let ptr = self.fetch_byte().wrapping_add(self.x);
                let lo = self.bus.read(ptr as u16) as u16;
                let hi = self.bus.read(ptr.wrapping_add(1) as u16) as u16;
                (hi << 8) | lo
            }
            Mode::IndY(dummy) => {
                let ptr = self.fetch_byte();
                let lo = self.bus.read(ptr as u16) as u16;
                let hi = self.bus.read(ptr.wrapping_add(1) as u16) as u16;
                self.indexed((hi << 8) | lo, self.y, dummy)
            }
            Mode::Rel => {
                let offset = self.fetch_byte() as i8;
                self.pc.wrapping_add(offset as u16)
            }
        }
    }

    /// Add an index register to `base`. The unfixed address (old high byte, new low byte)
    /// is read when the page crosses, or always for `Dummy::Always`.
    fn indexed(&mut self, base: u16, index: u8, dummy: Dummy) -> u16 {
        let addr = base.wrapping_add(index as u16);
        self.page_crossed = (base ^ addr) & 0xFF00 != 0;
        if self.page_crossed || dummy == Dummy::Always {
            self.bus.read((base & 0xFF00) | (addr & 0x00FF));
        }
        addr
    }

    pub(super) fn fetch_byte(&mut self) -> u8 {
        let byte = self.bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch_byte() as u16;
        let hi = self.fetch_byte() as u16;
        (hi << 8) | lo
    }

    pub(super) fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.bus.read(addr) as u16;
        let hi = self.bus.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    pub(super) fn push(&mut self, value: u8) {
        self.bus.write(0x0100 | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    pub(super) fn pop(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.bus.read(0x0100 | self.sp as u16)
    }

    pub(super) fn update_zero_and_negative_flags(&mut self, value: u8) {
        self.status.set(Status::ZERO, value == 0);
        self.status.set(Status::NEGATIVE, value & 0x80 != 0);
    }

    /// CLI, SEI and PLP defer a pending IRQ decision by one instruction.
    pub(super) fn delay_interrupt(&mut self) {
        self.irq_delay = true;
        self.prev_irq_disable = self.status.contains(Status::INTERRUPT_DISABLE);
    }
}
