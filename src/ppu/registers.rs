//! CPU-facing PPU registers $2000–$2007 (mirrored every 8 bytes through $3FFF).
//!
//! See [PPU registers](https://www.nesdev.org/wiki/PPU_registers). Reads of write-only
//! registers return the PPU's open-bus latch: the last value written to any register.

use crate::{
    cartridge::mapper::mapper::Mapper,
    config::Region,
    ppu::ppu::{Ctrl, Mask, PPU},
};

impl PPU {
    /// Read register `reg` (0–7), with its side effects.
    pub fn read_register(&mut self, reg: u16, mapper: &mut dyn Mapper) -> u8 {
        match reg & 7 {
            2 => {
                self.first_write = true;
                // Reading on the very dot vblank rises suppresses the flag.
                if self.scanline == 241 && self.cycle == 1 {
                    self.vblank = false;
                }
                self.open_bus = (self.vblank as u8) << 7
                    | (self.sprite_0_hit as u8) << 6
                    | (self.sprite_overflow as u8) << 5
                    | (self.open_bus & 0x1F);
                self.vblank = false;
            }
            4 => {
                self.open_bus = self.oam[self.oam_addr as usize];
                if self.rendering_on() && self.scanline <= 240 {
                    // Micro Machines reads OAMDATA mid-frame and expects these.
                    return match self.cycle {
                        0..=63 => 0xFF,
                        64..=256 => 0x00,
                        257..=319 => 0xFF,
                        _ => self.secondary_oam[0],
                    };
                }
            }
            7 => {
                let addr = self.v & 0x3FFF;
                let value = if addr < 0x3F00 {
                    let buffered = self.read_buffer;
                    self.read_buffer = mapper.ppu_read(addr);
                    buffered
                } else {
                    // Palette reads are immediate; the buffer takes the nametable byte beneath.
                    self.read_buffer = mapper.ppu_read(addr - 0x1000);
                    mapper.ppu_read(addr)
                };
                self.advance_data_address();
                self.open_bus = value;
            }
            _ => {}
        }
        self.open_bus
    }

    /// Write `data` to register `reg` (0–7).
    pub fn write_register(&mut self, reg: u16, data: u8, mapper: &mut dyn Mapper) {
        self.open_bus = data;
        match reg & 7 {
            0 => {
                self.ctrl = Ctrl::from_bits_retain(data);
                self.t = (self.t & !0x0C00) | ((data as u16 & 3) << 10);
            }
            1 => {
                self.mask = Mask::from_bits_retain(data);
                let mut emphasis = (data as u16 & 0xE0) << 1;
                if self.region == Region::Pal {
                    // Red and green emphasis lines are swapped on the 2C07
                    let red = (emphasis >> 6) & 1;
                    let green = (emphasis >> 7) & 1;
                    emphasis &= !0x00C0;
                    emphasis |= (red << 7) | (green << 6);
                }
                self.emphasis = emphasis;
            }
            3 => self.oam_addr = data,
            4 => {
                // Bits 2–4 of the attribute byte do not exist
                let value = if self.oam_addr & 3 == 2 { data & 0xE3 } else { data };
                self.oam[self.oam_addr as usize] = value;
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            5 => {
                if self.first_write {
                    self.t = (self.t & !0x001F) | (data as u16 >> 3);
                    self.fine_x = data & 7;
                } else {
                    self.t = (self.t & !0x7000) | ((data as u16 & 7) << 12);
                    self.t = (self.t & !0x03E0) | ((data as u16 & 0xF8) << 2);
                }
                self.first_write = !self.first_write;
            }
            6 => {
                if self.first_write {
                    self.t = (self.t & 0xC0FF) | ((data as u16 & 0x3F) << 8);
                    self.t &= 0x3FFF;
                } else {
                    self.t = (self.t & 0xFF00) | data as u16;
                    self.v = self.t;
                }
                self.first_write = !self.first_write;
            }
            7 => {
                mapper.ppu_write(self.v & 0x3FFF, data);
                if !self.rendering_on() || self.in_vblank_lines() {
                    self.v = self.v.wrapping_add(self.vram_increment()) & 0x7FFF;
                } else if self.v & 0x7000 == 0x7000 {
                    let coarse_y = self.v & 0x03E0;
                    self.v &= 0x0FFF;
                    match coarse_y {
                        0x03A0 => self.v ^= 0x0BA0,
                        0x03E0 => self.v ^= 0x03E0,
                        _ => self.v += 0x20,
                    }
                } else {
                    // Writes during rendering drop v by one line
                    self.v += 0x1000;
                }
            }
            _ => {}
        }
    }

    fn vram_increment(&self) -> u16 {
        if self.ctrl.contains(Ctrl::VRAM_INCREMENT_32) {
            32
        } else {
            1
        }
    }

    /// $2007 read increment. During rendering both scroll counters glitch forward instead.
    fn advance_data_address(&mut self) {
        if !self.rendering_on() || self.in_vblank_lines() {
            self.v = self.v.wrapping_add(self.vram_increment()) & 0x7FFF;
        } else {
            self.increment_horizontal();
            self.increment_vertical();
        }
    }
}
