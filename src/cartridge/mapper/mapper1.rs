//! [MMC1](https://www.nesdev.org/wiki/MMC1), iNES mapper 1.
//!
//! The CPU talks to the board one bit at a time: five serial writes to $8000–$FFFF fill a
//! register, and address bits 13–14 of the fifth write pick which one (control, CHR 0, CHR 1
//! or PRG). Setting bit 7 on any write clears the serial buffer and forces PRG mode 3.
//! Of two writes landing on the same CPU clock, only the first counts.
//!
//! SUROM-style boards with 512 KiB of PRG use CHR 0 bit 4 as the outer PRG bank.

use log::debug;

use crate::cartridge::mapper::{
    Mirroring,
    mapper::{Mapper, MapperBase},
};

const OUTER_BANK: usize = 256 * 1024;

pub struct Mapper1 {
    base: MapperBase,
    shift_reg: u8,
    shift_count: u8,
    control: u8,
    chr0: u8,
    chr1: u8,
    prg_bank: u8,
    outer_bank: bool,
    /// CPU clocks seen so far.
    clock: u64,
    /// Clock of the last accepted register write.
    last_write: Option<u64>,
}

impl Mapper1 {
    /// Control defaults to $0C (PRG mode 3: $8000 switchable, $C000 fixed last).
    pub fn new(prg_rom: Vec<u8>, chr: Vec<u8>, mirroring: Mirroring) -> Self {
        let mut mapper = Self {
            base: MapperBase::new(prg_rom, chr, mirroring),
            shift_reg: 0,
            shift_count: 0,
            control: 0x0C,
            chr0: 0,
            chr1: 0,
            prg_bank: 0,
            outer_bank: false,
            clock: 0,
            last_write: None,
        };
        mapper.recompute_banks();
        mapper
    }

    fn large_prg(&self) -> bool {
        self.base.prg.len() > OUTER_BANK
    }

    fn latch(&mut self, addr: u16) {
        let value = self.shift_reg;
        match addr {
            0x8000..=0x9FFF => {
                self.control = value & 0x1F;
                let mirroring = match self.control & 0b11 {
                    0 => Mirroring::SingleScreenLower,
                    1 => Mirroring::SingleScreenUpper,
                    2 => Mirroring::Vertical,
                    _ => Mirroring::Horizontal,
                };
                self.base.set_mirroring(mirroring);
            }
            0xA000..=0xBFFF => {
                self.chr0 = value & 0x1F;
                if self.large_prg() {
                    self.chr0 &= 0x0F;
                    self.outer_bank = value & 0x10 != 0;
                }
            }
            0xC000..=0xDFFF => {
                self.chr1 = value & 0x1F;
                if self.large_prg() {
                    self.chr1 &= 0x0F;
                }
            }
            _ => self.prg_bank = value & 0x0F,
        }
        debug!(
            "MMC1 ${:04X} <- {:05b} (ctrl={:02X} chr0={:02X} chr1={:02X} prg={:X})",
            addr, value, self.control, self.chr0, self.chr1, self.prg_bank
        );
    }
}

impl Mapper for Mapper1 {
    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    fn cart_write(&mut self, addr: u16, data: u8) {
        if addr < 0x8000 {
            self.base.cart_write(addr, data);
            return;
        }

        // Two writes on the same CPU clock (the dummy write of a read-modify-write
        // instruction) only register the first. Bill & Ted's Excellent Adventure relies on it.
        if self.last_write == Some(self.clock) {
            return;
        }
        self.last_write = Some(self.clock);

        if data & 0x80 != 0 {
            self.shift_reg = 0;
            self.shift_count = 0;
            self.control |= 0x0C;
            self.recompute_banks();
            return;
        }

        self.shift_reg = (self.shift_reg >> 1) | ((data & 1) << 4);
        self.shift_count += 1;

        if self.shift_count < 5 {
            return;
        }

        self.latch(addr);
        self.recompute_banks();
        self.shift_reg = 0;
        self.shift_count = 0;
    }

    fn cpu_cycle(&mut self) {
        self.clock += 1;
    }

    fn recompute_banks(&mut self) {
        let chr_len = self.base.chr.len();
        let prg_len = self.base.prg.len();
        let chr0 = self.chr0 as usize;
        let chr1 = self.chr1 as usize;
        let prg = self.prg_bank as usize;

        if self.control & 0x10 != 0 {
            // Two 4 KiB CHR banks
            for i in 0..4 {
                self.base.chr_map[i] = (1024 * (i + 4 * chr0)) % chr_len;
                self.base.chr_map[i + 4] = (1024 * (i + 4 * chr1)) % chr_len;
            }
        } else {
            // One 8 KiB CHR bank, low bit ignored
            for i in 0..8 {
                self.base.chr_map[i] = (1024 * (i + 8 * (chr0 >> 1))) % chr_len;
            }
        }

        if self.control & 0x08 == 0 {
            // 32 KiB switch, low bank bit ignored
            for i in 0..32 {
                self.base.prg_map[i] = (1024 * i + 32768 * (prg >> 1)) % prg_len;
            }
        } else if self.control & 0x04 == 0 {
            // First bank fixed at $8000, 16 KiB switch at $C000
            for i in 0..16 {
                self.base.prg_map[i] = (1024 * i) % prg_len;
                self.base.prg_map[i + 16] = (1024 * i + 16384 * prg) % prg_len;
            }
        } else {
            // 16 KiB switch at $8000, last bank fixed at $C000
            for i in 0..16 {
                self.base.prg_map[i] = (1024 * i + 16384 * prg) % prg_len;
            }
            for i in 1..=16 {
                let mut offset = prg_len.saturating_sub(1024 * i);
                if offset > OUTER_BANK {
                    offset -= OUTER_BANK;
                }
                self.base.prg_map[32 - i] = offset;
            }
        }

        if self.outer_bank && self.large_prg() {
            for entry in self.base.prg_map.iter_mut() {
                *entry = (*entry + OUTER_BANK) % prg_len;
            }
        }
    }
}
