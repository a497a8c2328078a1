use crate::{
    bus::Bus,
    cpu::{cpu::CPU, flags::Status},
};

const NMI_HANDLER: u16 = 0x9000;
const IRQ_HANDLER: u16 = 0x9100;

struct TestBus {
    mem: [u8; 65536],
    irq: bool,
    stall: u32,
    reads: Vec<u16>,
    writes: Vec<(u16, u8)>,
}

impl TestBus {
    fn new() -> Self {
        let mut mem = [0; 65536];
        mem[0xFFFA] = NMI_HANDLER as u8;
        mem[0xFFFB] = (NMI_HANDLER >> 8) as u8;
        mem[0xFFFC] = 0x00;
        mem[0xFFFD] = 0x80;
        mem[0xFFFE] = IRQ_HANDLER as u8;
        mem[0xFFFF] = (IRQ_HANDLER >> 8) as u8;
        Self {
            mem,
            irq: false,
            stall: 0,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }
}

impl Bus for TestBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.reads.push(addr);
        self.mem[addr as usize]
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.writes.push((addr, data));
        if addr == 0x4014 {
            self.stall += 513;
        }
        self.mem[addr as usize] = data;
    }

    fn irq_line(&mut self) -> bool {
        self.irq
    }

    fn take_stall_cycles(&mut self) -> u32 {
        std::mem::take(&mut self.stall)
    }
}

/// CPU powered up with `program` at $8000 and empty access logs.
fn cpu_with(program: &[u8]) -> CPU<TestBus> {
    let mut bus = TestBus::new();
    bus.mem[0x8000..0x8000 + program.len()].copy_from_slice(program);
    let mut cpu = CPU::new(bus);
    cpu.power_up();
    cpu.bus.reads.clear();
    cpu.bus.writes.clear();
    cpu
}

fn stacked_return_address(cpu: &CPU<TestBus>) -> u16 {
    let lo = cpu.bus.mem[0x0100 + cpu.sp as usize + 2] as u16;
    let hi = cpu.bus.mem[0x0100 + cpu.sp as usize + 3] as u16;
    (hi << 8) | lo
}

#[test]
fn power_up_state() {
    let cpu = cpu_with(&[]);
    assert_eq!(cpu.pc, 0x8000);
    assert_eq!(cpu.sp, 0xFD);
    assert_eq!(cpu.status, Status::INTERRUPT_DISABLE);
    assert!(!cpu.halted);
}

#[test]
fn lda_immediate_loads_value() {
    // LDA #$42
    let mut cpu = cpu_with(&[0xA9, 0x42]);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.a, 0x42);
    assert_eq!(cpu.pc, 0x8002);
}

#[test]
fn lda_sets_zero_flag() {
    // LDA #$00
    let mut cpu = cpu_with(&[0xA9, 0x00]);
    cpu.step();
    assert!(cpu.status.contains(Status::ZERO));
    assert!(!cpu.status.contains(Status::NEGATIVE));
}

#[test]
fn lda_sets_negative_flag() {
    // LDA #$80
    let mut cpu = cpu_with(&[0xA9, 0x80]);
    cpu.step();
    assert!(cpu.status.contains(Status::NEGATIVE));
    assert!(!cpu.status.contains(Status::ZERO));
}

#[test]
fn every_opcode_is_defined() {
    for (opcode, op) in CPU::<TestBus>::OPCODES.iter().enumerate() {
        assert!(!op.mnemonic.is_empty(), "opcode ${opcode:02X}");
        assert!(op.cycles >= 2, "opcode ${opcode:02X}");
    }
}

/// Run one branch at `at` with `flag` forced to `set`. Returns cycles spent and the new PC.
fn run_branch(opcode: u8, flag: Status, set: bool, at: u16, offset: u8) -> (u64, u16) {
    let mut cpu = cpu_with(&[]);
    cpu.bus.mem[at as usize] = opcode;
    cpu.bus.mem[at as usize + 1] = offset;
    cpu.set_pc(at);
    cpu.status.set(flag, set);
    let cycles = cpu.step();
    (cycles, cpu.pc)
}

#[test]
fn branch_timing_for_every_condition() {
    // (opcode, flag tested, flag value that takes the branch)
    let branches = [
        (0x10, Status::NEGATIVE, false), // BPL
        (0x30, Status::NEGATIVE, true),  // BMI
        (0x50, Status::OVERFLOW, false), // BVC
        (0x70, Status::OVERFLOW, true),  // BVS
        (0x90, Status::CARRY, false),    // BCC
        (0xB0, Status::CARRY, true),     // BCS
        (0xD0, Status::ZERO, false),     // BNE
        (0xF0, Status::ZERO, true),      // BEQ
    ];

    for (opcode, flag, taken) in branches {
        assert_eq!(
            run_branch(opcode, flag, !taken, 0x8000, 0x10),
            (2, 0x8002),
            "${opcode:02X} not taken"
        );
        assert_eq!(
            run_branch(opcode, flag, taken, 0x8000, 0x10),
            (3, 0x8012),
            "${opcode:02X} taken"
        );
        assert_eq!(
            run_branch(opcode, flag, taken, 0x80F0, 0x20),
            (4, 0x8112),
            "${opcode:02X} taken forward across a page"
        );
        assert_eq!(
            run_branch(opcode, flag, taken, 0x8000, 0xF0),
            (4, 0x7FF2),
            "${opcode:02X} taken backward across a page"
        );
    }
}

#[test]
fn branch_onto_itself_parks_the_cpu() {
    // BNE -2
    let mut cpu = cpu_with(&[0xD0, 0xFE]);
    cpu.step();
    assert!(cpu.is_idle());
    assert_eq!(cpu.pc, 0x8000);

    cpu.bus.reads.clear();
    assert_eq!(cpu.step(), 3);
    assert_eq!(cpu.pc, 0x8000);
    // Skipped iterations make no bus accesses
    assert!(cpu.bus.reads.is_empty());

    cpu.set_pc(0x8000);
    assert!(!cpu.is_idle());
}

#[test]
fn parked_branch_across_a_page_keeps_its_cost() {
    // BNE -2 at $80FE: the operand ends on the next page
    let mut cpu = cpu_with(&[]);
    cpu.bus.mem[0x80FE] = 0xD0;
    cpu.bus.mem[0x80FF] = 0xFE;
    cpu.set_pc(0x80FE);
    cpu.status.remove(Status::ZERO);

    assert_eq!(cpu.step(), 4);
    assert!(cpu.is_idle());
    for _ in 0..3 {
        assert_eq!(cpu.step(), 4);
        assert_eq!(cpu.pc, 0x80FE);
    }
}

#[test]
fn parked_indirect_jump_keeps_its_cost() {
    // JMP ($0200) with the pointer aimed back at itself
    let mut cpu = cpu_with(&[0x6C, 0x00, 0x02]);
    cpu.bus.mem[0x0200] = 0x00;
    cpu.bus.mem[0x0201] = 0x80;

    assert_eq!(cpu.step(), 5);
    assert!(cpu.is_idle());
    cpu.bus.reads.clear();
    for _ in 0..3 {
        assert_eq!(cpu.step(), 5);
    }
    assert!(cpu.bus.reads.is_empty());
}

#[test]
fn idle_loop_runs_normally_when_skip_is_off() {
    // JMP $8000
    let mut cpu = cpu_with(&[0x4C, 0x00, 0x80]);
    cpu.idle_loop_skip = false;
    for _ in 0..4 {
        assert_eq!(cpu.step(), 3);
        assert_eq!(cpu.pc, 0x8000);
    }
    assert!(!cpu.bus.reads.is_empty());
}

#[test]
fn indexed_reads_pay_for_page_crossing() {
    // LDA $80F0,X
    let mut cpu = cpu_with(&[0xBD, 0xF0, 0x80]);
    cpu.x = 0x01;
    assert_eq!(cpu.step(), 4);

    let mut cpu = cpu_with(&[0xBD, 0xF0, 0x80]);
    cpu.x = 0x20;
    assert_eq!(cpu.step(), 5);

    // LDA ($10),Y
    let mut cpu = cpu_with(&[0xB1, 0x10]);
    cpu.bus.mem[0x10] = 0xFF;
    cpu.bus.mem[0x11] = 0x02;
    cpu.y = 0x01;
    assert_eq!(cpu.step(), 6);
}

#[test]
fn indexed_stores_cost_the_same_either_way() {
    // STA $0300,X
    let mut cpu = cpu_with(&[0x9D, 0x00, 0x03]);
    cpu.x = 0x01;
    assert_eq!(cpu.step(), 5);

    let mut cpu = cpu_with(&[0x9D, 0xFF, 0x03]);
    cpu.x = 0x01;
    assert_eq!(cpu.step(), 5);
}

#[test]
fn page_crossing_reads_the_uncarried_address() {
    // LDA $00F0,X
    let mut cpu = cpu_with(&[0xBD, 0xF0, 0x00]);
    cpu.x = 0x20;
    cpu.step();
    assert_eq!(cpu.bus.reads, [0x8000, 0x8001, 0x8002, 0x0010, 0x0110]);

    // STA $0300,X reads before writing even without a carry
    let mut cpu = cpu_with(&[0x9D, 0x00, 0x03]);
    cpu.x = 0x01;
    cpu.a = 0x77;
    cpu.step();
    assert_eq!(cpu.bus.reads.last(), Some(&0x0301));
    assert_eq!(cpu.bus.writes, [(0x0301, 0x77)]);
}

#[test]
fn read_modify_write_writes_old_value_first() {
    // INC $0200
    let mut cpu = cpu_with(&[0xEE, 0x00, 0x02]);
    cpu.bus.mem[0x0200] = 0x41;
    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.bus.writes, [(0x0200, 0x41), (0x0200, 0x42)]);
}

#[test]
fn unofficial_nop_skips_operand_without_reading_it() {
    // NOP $0300
    let mut cpu = cpu_with(&[0x0C, 0x00, 0x03]);
    assert_eq!(cpu.step(), 4);
    assert_eq!(cpu.pc, 0x8003);
    assert!(!cpu.bus.reads.contains(&0x0300));
}

#[test]
fn jmp_indirect_wraps_within_page() {
    // JMP ($02FF)
    let mut cpu = cpu_with(&[0x6C, 0xFF, 0x02]);
    cpu.bus.mem[0x02FF] = 0x34;
    cpu.bus.mem[0x0200] = 0x12;
    cpu.bus.mem[0x0300] = 0x56;
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.pc, 0x1234);
}

#[test]
fn jsr_and_rts() {
    // JSR $9000
    let mut cpu = cpu_with(&[0x20, 0x00, 0x90]);
    cpu.bus.mem[0x9000] = 0x60; // RTS

    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.pc, 0x9000);
    assert_eq!(cpu.sp, 0xFB);
    assert_eq!(cpu.bus.mem[0x01FD], 0x80);
    assert_eq!(cpu.bus.mem[0x01FC], 0x02);

    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.pc, 0x8003);
    assert_eq!(cpu.sp, 0xFD);
}

#[test]
fn brk_pushes_break_flag_and_rti_returns() {
    // BRK
    let mut cpu = cpu_with(&[0x00, 0xFF]);
    cpu.status = Status::CARRY;
    cpu.bus.mem[IRQ_HANDLER as usize] = 0x40; // RTI

    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, IRQ_HANDLER);
    assert!(cpu.status.contains(Status::INTERRUPT_DISABLE));
    let pushed = cpu.bus.mem[0x0100 + cpu.sp as usize + 1];
    assert_eq!(pushed, (Status::CARRY | Status::BREAK | Status::UNUSED).bits());
    assert_eq!(stacked_return_address(&cpu), 0x8002);

    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.pc, 0x8002);
    assert_eq!(cpu.status, Status::CARRY);
}

#[test]
fn php_sets_b_and_plp_drops_it() {
    // PHP; PLA; PHA; PLP
    let mut cpu = cpu_with(&[0x08, 0x68, 0x48, 0x28]);
    cpu.status = Status::ZERO;

    assert_eq!(cpu.step(), 3);
    cpu.step();
    assert_eq!(cpu.a, 0x32);

    cpu.a = 0xFF;
    cpu.step();
    assert_eq!(cpu.step(), 4);
    assert_eq!(cpu.status, Status::all() - Status::BREAK - Status::UNUSED);
}

#[test]
fn adc_and_sbc_overflow() {
    // ADC #$50
    let mut cpu = cpu_with(&[0x69, 0x50]);
    cpu.a = 0x50;
    cpu.step();
    assert_eq!(cpu.a, 0xA0);
    assert!(cpu.status.contains(Status::OVERFLOW));
    assert!(!cpu.status.contains(Status::CARRY));

    // ADC #$01 with carry in
    let mut cpu = cpu_with(&[0x69, 0x01]);
    cpu.a = 0xFE;
    cpu.status.insert(Status::CARRY);
    cpu.step();
    assert_eq!(cpu.a, 0x00);
    assert!(cpu.status.contains(Status::CARRY | Status::ZERO));
    assert!(!cpu.status.contains(Status::OVERFLOW));

    // SBC #$B0
    let mut cpu = cpu_with(&[0xE9, 0xB0]);
    cpu.a = 0x50;
    cpu.status.insert(Status::CARRY);
    cpu.step();
    assert_eq!(cpu.a, 0xA0);
    assert!(cpu.status.contains(Status::OVERFLOW));
    assert!(!cpu.status.contains(Status::CARRY));
}

#[test]
fn decimal_flag_does_not_change_arithmetic() {
    // SED; ADC #$09
    let mut cpu = cpu_with(&[0xF8, 0x69, 0x09]);
    cpu.a = 0x09;
    cpu.step();
    cpu.step();
    assert_eq!(cpu.a, 0x12);
    assert!(cpu.status.contains(Status::DECIMAL));
}

#[test]
fn compare_sets_carry_and_zero() {
    // CMP #$10; CPX #$20; CPY #$05
    let mut cpu = cpu_with(&[0xC9, 0x10, 0xE0, 0x20, 0xC0, 0x05]);
    cpu.a = 0x10;
    cpu.x = 0x10;
    cpu.y = 0x10;

    cpu.step();
    assert!(cpu.status.contains(Status::CARRY | Status::ZERO));
    cpu.step();
    assert!(!cpu.status.contains(Status::CARRY));
    assert!(cpu.status.contains(Status::NEGATIVE));
    cpu.step();
    assert!(cpu.status.contains(Status::CARRY));
    assert!(!cpu.status.contains(Status::ZERO));
}

#[test]
fn unofficial_opcodes() {
    // LAX $10
    let mut cpu = cpu_with(&[0xA7, 0x10]);
    cpu.bus.mem[0x10] = 0x8F;
    cpu.step();
    assert_eq!((cpu.a, cpu.x), (0x8F, 0x8F));
    assert!(cpu.status.contains(Status::NEGATIVE));

    // SAX $10
    let mut cpu = cpu_with(&[0x87, 0x10]);
    cpu.a = 0xF0;
    cpu.x = 0x3C;
    cpu.step();
    assert_eq!(cpu.bus.mem[0x10], 0x30);

    // DCP $10
    let mut cpu = cpu_with(&[0xC7, 0x10]);
    cpu.bus.mem[0x10] = 0x05;
    cpu.a = 0x04;
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.bus.mem[0x10], 0x04);
    assert!(cpu.status.contains(Status::ZERO | Status::CARRY));

    // ISC $10
    let mut cpu = cpu_with(&[0xE7, 0x10]);
    cpu.bus.mem[0x10] = 0x0F;
    cpu.a = 0x20;
    cpu.status.insert(Status::CARRY);
    cpu.step();
    assert_eq!(cpu.bus.mem[0x10], 0x10);
    assert_eq!(cpu.a, 0x10);
    assert!(cpu.status.contains(Status::CARRY));

    // AXS #$02
    let mut cpu = cpu_with(&[0xCB, 0x02]);
    cpu.a = 0x0F;
    cpu.x = 0xF3;
    cpu.step();
    assert_eq!(cpu.x, 0x01);
    assert!(cpu.status.contains(Status::CARRY));

    // SLO $10
    let mut cpu = cpu_with(&[0x07, 0x10]);
    cpu.bus.mem[0x10] = 0x81;
    cpu.a = 0x01;
    cpu.step();
    assert_eq!(cpu.bus.mem[0x10], 0x02);
    assert_eq!(cpu.a, 0x03);
    assert!(cpu.status.contains(Status::CARRY));

    // ARR #$FF with carry in
    let mut cpu = cpu_with(&[0x6B, 0xFF]);
    cpu.a = 0xC0;
    cpu.status.insert(Status::CARRY);
    cpu.step();
    assert_eq!(cpu.a, 0xE0);
    assert!(cpu.status.contains(Status::CARRY | Status::NEGATIVE));
    assert!(!cpu.status.contains(Status::OVERFLOW));
}

#[test]
fn shx_stores_x_and_high_byte_plus_one() {
    // SHX $0200,Y
    let mut cpu = cpu_with(&[0x9E, 0x00, 0x02]);
    cpu.x = 0xFF;
    cpu.y = 0x01;
    cpu.step();
    assert_eq!(cpu.bus.mem[0x0201], 0x03);
}

#[test]
fn kil_halts_until_power_up() {
    let mut cpu = cpu_with(&[0x02]);
    cpu.step();
    assert!(cpu.halted);

    for _ in 0..10 {
        cpu.run_cycle();
    }
    assert_eq!(cpu.pc, 0x8001);
    assert_eq!(cpu.cycles, 12);

    cpu.power_up();
    assert!(!cpu.halted);
    assert_eq!(cpu.pc, 0x8000);
}

#[test]
fn bus_stall_cycles_are_charged_to_the_instruction() {
    // STA $4014
    let mut cpu = cpu_with(&[0x8D, 0x14, 0x40]);
    assert_eq!(cpu.step(), 4 + 513);
}

#[test]
fn stolen_cycles_delay_the_next_instruction() {
    // LDA #$01
    let mut cpu = cpu_with(&[0xA9, 0x01]);
    cpu.steal_cycles(10);
    for _ in 0..10 {
        cpu.run_cycle();
    }
    assert_eq!(cpu.pc, 0x8000);
    cpu.run_cycle();
    assert_eq!(cpu.a, 0x01);
}

#[test]
fn nmi_is_serviced_after_the_next_instruction() {
    // LDA #$01; LDA #$02
    let mut cpu = cpu_with(&[0xA9, 0x01, 0xA9, 0x02]);
    cpu.set_nmi(true);

    cpu.step();
    assert_eq!(cpu.a, 0x01);

    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, NMI_HANDLER);
    assert_eq!(stacked_return_address(&cpu), 0x8002);
    assert!(cpu.status.contains(Status::INTERRUPT_DISABLE));
    let pushed = cpu.bus.mem[0x0100 + cpu.sp as usize + 1];
    assert_eq!(pushed & Status::BREAK.bits(), 0);
}

/// JMP-to-self main loop with an NMI handler that counts into $10.
fn nmi_counter() -> CPU<TestBus> {
    // JMP $8000
    let mut cpu = cpu_with(&[0x4C, 0x00, 0x80]);
    let handler = NMI_HANDLER as usize;
    cpu.bus.mem[handler..handler + 3].copy_from_slice(&[
        0xE6, 0x10, // INC $10
        0x40, // RTI
    ]);
    cpu
}

#[test]
fn each_nmi_rising_edge_is_serviced_once() {
    let mut cpu = nmi_counter();
    for pulse in 0..10 {
        cpu.set_nmi(true);
        // Short pulses, some of them landing inside stolen cycles
        for _ in 0..pulse % 3 {
            cpu.run_cycle();
        }
        cpu.set_nmi(false);
        for _ in 0..40 {
            cpu.run_cycle();
        }
    }
    assert_eq!(cpu.bus.mem[0x10], 10);
}

#[test]
fn held_nmi_line_fires_once() {
    let mut cpu = nmi_counter();
    for _ in 0..300 {
        cpu.set_nmi(true);
        cpu.run_cycle();
    }
    assert_eq!(cpu.bus.mem[0x10], 1);

    cpu.set_nmi(false);
    cpu.set_nmi(true);
    for _ in 0..40 {
        cpu.run_cycle();
    }
    assert_eq!(cpu.bus.mem[0x10], 2);
}

#[test]
fn nmi_wakes_an_idle_loop() {
    let mut cpu = nmi_counter();
    cpu.step();
    assert!(cpu.is_idle());

    cpu.set_nmi(true);
    cpu.step();
    cpu.step();
    assert!(!cpu.is_idle());
    assert_eq!(cpu.pc, NMI_HANDLER);
}

#[test]
fn irq_is_level_triggered_and_masked_by_i() {
    // NOP; NOP
    let mut cpu = cpu_with(&[0xEA, 0xEA]);
    cpu.bus.irq = true;
    cpu.step();
    assert_eq!(cpu.pc, 0x8001);

    cpu.status.remove(Status::INTERRUPT_DISABLE);
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, IRQ_HANDLER);
    assert_eq!(stacked_return_address(&cpu), 0x8001);
    assert!(cpu.status.contains(Status::INTERRUPT_DISABLE));
}

#[test]
fn cli_lets_one_more_instruction_run_before_irq() {
    // CLI; NOP; NOP
    let mut cpu = cpu_with(&[0x58, 0xEA, 0xEA]);
    cpu.bus.irq = true;

    cpu.step();
    assert!(!cpu.status.contains(Status::INTERRUPT_DISABLE));
    cpu.step();
    assert_eq!(cpu.pc, 0x8002);

    cpu.step();
    assert_eq!(cpu.pc, IRQ_HANDLER);
    assert_eq!(stacked_return_address(&cpu), 0x8002);
}

#[test]
fn irq_raised_just_after_sei_is_still_taken() {
    // SEI; NOP
    let mut cpu = cpu_with(&[0x78, 0xEA]);
    cpu.status.remove(Status::INTERRUPT_DISABLE);

    cpu.step();
    assert!(cpu.status.contains(Status::INTERRUPT_DISABLE));
    cpu.bus.irq = true;

    // I was clear when SEI started, so the IRQ slips in before the NOP
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, IRQ_HANDLER);
    assert_eq!(stacked_return_address(&cpu), 0x8001);
}

#[test]
fn plp_clearing_i_defers_irq_by_one_instruction() {
    // PLP; NOP; NOP with a cleared P on the stack
    let mut cpu = cpu_with(&[0x28, 0xEA, 0xEA]);
    cpu.bus.mem[0x01FE] = 0x00;
    cpu.bus.irq = true;

    cpu.step();
    assert!(!cpu.status.contains(Status::INTERRUPT_DISABLE));
    cpu.step();
    assert_eq!(cpu.pc, 0x8002);

    cpu.step();
    assert_eq!(cpu.pc, IRQ_HANDLER);
    assert_eq!(stacked_return_address(&cpu), 0x8002);
}

#[test]
fn reset_keeps_registers_and_drops_stack() {
    let mut cpu = cpu_with(&[0xA9, 0x42]);
    cpu.step();
    cpu.status.remove(Status::INTERRUPT_DISABLE);
    cpu.bus.writes.clear();

    cpu.reset();
    assert_eq!(cpu.pc, 0x8000);
    assert_eq!(cpu.sp, 0xFA);
    assert_eq!(cpu.a, 0x42);
    assert!(cpu.status.contains(Status::INTERRUPT_DISABLE));
    assert!(cpu.bus.writes.contains(&(0x4015, 0x00)));
}
