//! Memory bus and address decoding for the NES.
//!
//! Maps CPU addresses to RAM, PPU registers, the APU/IO window, controllers and the
//! cartridge. See [CPU memory map](https://www.nesdev.org/wiki/CPU_memory_map).

use crate::{
    cartridge::mapper::mapper::Mapper,
    config::Region,
    controller::Controller,
    host::AudioPort,
    ppu::ppu::PPU,
};

/// Trait for memory-mapped I/O and bus access used by the CPU.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, data: u8);

    /// Level of the shared /IRQ line.
    fn irq_line(&mut self) -> bool {
        false
    }

    /// Cycles the CPU must give up for bus activity (DMA) since the last call.
    fn take_stall_cycles(&mut self) -> u32 {
        0
    }
}

pub const RAM_SIZE: usize = 2048;

/// CPU cycles lost to an OAM DMA transfer.
pub const OAM_DMA_CYCLES: u32 = 513;

/// Main NES bus: RAM, PPU, cartridge, controllers and the audio port.
pub struct NesBus {
    pub ram: [u8; RAM_SIZE],
    pub ppu: PPU,
    pub mapper: Box<dyn Mapper>,
    pub controllers: [Controller; 2],
    pub audio: Box<dyn AudioPort>,
    stall: u32,
}

impl NesBus {
    pub fn new(mapper: Box<dyn Mapper>, audio: Box<dyn AudioPort>, region: Region) -> Self {
        Self {
            ram: [0xFF; RAM_SIZE],
            ppu: PPU::new(region),
            mapper,
            controllers: [Controller::new(), Controller::new()],
            audio,
            stall: 0,
        }
    }

    /// $4014: copy page `page` into OAM through $2004.
    fn oam_dma(&mut self, page: u8) {
        let base = (page as u16) << 8;
        for offset in 0..256 {
            let value = self.read(base + offset);
            self.ppu.write_register(4, value, self.mapper.as_mut());
        }
        self.stall += OAM_DMA_CYCLES;
    }
}

impl Bus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            // Internal RAM (mirrored 4x in 0x0000-0x1FFF)
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            // PPU registers $2000-$3FFF (mirrored every 8 bytes)
            0x2000..=0x3FFF => self.ppu.read_register(addr & 7, self.mapper.as_mut()),
            0x4016 => self.controllers[0].read() | 0x40,
            0x4017 => self.controllers[1].read() | 0x40,
            0x4000..=0x4018 => self.audio.read(addr - 0x4000),
            // Expansion, PRG RAM, PRG ROM
            _ => self.mapper.cart_read(addr),
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize] = data,
            0x2000..=0x3FFF => self.ppu.write_register(addr & 7, data, self.mapper.as_mut()),
            0x4014 => self.oam_dma(data),
            0x4016 => {
                for pad in &mut self.controllers {
                    pad.latch();
                }
            }
            0x4000..=0x4018 => self.audio.write(addr - 0x4000, data),
            _ => self.mapper.cart_write(addr, data),
        }
    }

    fn irq_line(&mut self) -> bool {
        self.mapper.irq_line() || self.audio.irq_line()
    }

    fn take_stall_cycles(&mut self) -> u32 {
        std::mem::take(&mut self.stall)
    }
}
