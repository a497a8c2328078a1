//! Mapper trait and the shared bank-table implementation behind it.
//!
//! CPU space: PRG ROM through 32 × 1 KiB windows at $8000–$FFFF, PRG RAM at $6000–$7FFF.
//! PPU space: CHR through 8 × 1 KiB windows at $0000–$1FFF, nametables at $2000–$3EFF,
//! palette RAM at $3F00–$3FFF. See [PPU memory map](https://www.nesdev.org/wiki/PPU_memory_map).

use crate::cartridge::mapper::Mirroring;

pub const PRG_RAM_SIZE: usize = 8 * 1024;
const WINDOW: usize = 1024;

/// Storage and mapping tables owned by every mapper.
pub struct MapperBase {
    pub prg: Vec<u8>,
    pub chr: Vec<u8>,
    /// Offset into `prg` for each 1 KiB window of $8000–$FFFF.
    pub prg_map: [usize; 32],
    /// Offset into `chr` for each 1 KiB window of $0000–$1FFF.
    pub chr_map: [usize; 8],
    pub prg_ram: Vec<u8>,
    nametables: [[u8; 0x400]; 4],
    /// Physical nametable behind each logical one.
    nt: [usize; 4],
    pub palette: [u8; 32],
    mirroring: Mirroring,
}

impl MapperBase {
    /// Build identity bank tables over `prg`/`chr`. Both are padded to a whole number of
    /// 1 KiB windows so every table entry plus its window stays in bounds.
    pub fn new(mut prg: Vec<u8>, mut chr: Vec<u8>, mirroring: Mirroring) -> Self {
        pad_to_window(&mut prg);
        pad_to_window(&mut chr);

        let mut prg_map = [0; 32];
        for (i, entry) in prg_map.iter_mut().enumerate() {
            *entry = (WINDOW * i) % prg.len();
        }
        let mut chr_map = [0; 8];
        for (i, entry) in chr_map.iter_mut().enumerate() {
            *entry = (WINDOW * i) % chr.len();
        }

        let mut palette = [0; 32];
        for (i, entry) in palette.iter_mut().enumerate() {
            *entry = i as u8;
        }

        Self {
            prg,
            chr,
            prg_map,
            chr_map,
            prg_ram: vec![0; PRG_RAM_SIZE],
            nametables: [[0xA0; 0x400], [0xB0; 0x400], [0xC0; 0x400], [0xD0; 0x400]],
            nt: mirroring.layout(),
            palette,
            mirroring,
        }
    }

    /// Swap the whole nametable alias table.
    pub fn set_mirroring(&mut self, mirroring: Mirroring) {
        self.mirroring = mirroring;
        self.nt = mirroring.layout();
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub fn cart_read(&self, addr: u16) -> u8 {
        match addr {
            0x8000..=0xFFFF => {
                let window = ((addr & 0x7FFF) >> 10) as usize;
                self.prg[self.prg_map[window] + (addr as usize & (WINDOW - 1))]
            }
            0x6000..=0x7FFF => self.prg_ram[addr as usize & 0x1FFF],
            // Open bus: the high address byte is still on the data lines.
            _ => (addr >> 8) as u8,
        }
    }

    pub fn cart_write(&mut self, addr: u16, data: u8) {
        if let 0x6000..=0x7FFF = addr {
            self.prg_ram[addr as usize & 0x1FFF] = data;
        }
    }

    pub fn ppu_read(&self, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => {
                self.chr[self.chr_map[(addr >> 10) as usize] + (addr as usize & 0x3FF)]
            }
            0x3F00..=0x3FFF => self.palette[palette_index(addr)],
            _ => {
                let table = self.nt[((addr & 0xC00) >> 10) as usize];
                self.nametables[table][addr as usize & 0x3FF]
            }
        }
    }

    pub fn ppu_write(&mut self, addr: u16, data: u8) {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => {
                let offset = self.chr_map[(addr >> 10) as usize] + (addr as usize & 0x3FF);
                self.chr[offset] = data;
            }
            0x3F00..=0x3FFF => self.palette[palette_index(addr)] = data & 0x3F,
            _ => {
                let table = self.nt[((addr & 0xC00) >> 10) as usize];
                self.nametables[table][addr as usize & 0x3FF] = data;
            }
        }
    }
}

/// $3F10/$3F14/$3F18/$3F1C mirror the background entries below them.
fn palette_index(addr: u16) -> usize {
    let mut index = (addr & 0x1F) as usize;
    if index >= 0x10 && index & 3 == 0 {
        index -= 0x10;
    }
    index
}

fn pad_to_window(buf: &mut Vec<u8>) {
    let len = buf.len().max(WINDOW).div_ceil(WINDOW) * WINDOW;
    buf.resize(len, 0);
}

/// Capability interface for cartridge boards. CPU and PPU reach all cartridge space
/// through it; the defaults delegate to the shared [`MapperBase`].
pub trait Mapper {
    fn base(&self) -> &MapperBase;
    fn base_mut(&mut self) -> &mut MapperBase;

    /// CPU read from $4019–$FFFF.
    fn cart_read(&mut self, addr: u16) -> u8 {
        self.base().cart_read(addr)
    }

    /// CPU write to $4019–$FFFF: PRG RAM or mapper registers.
    fn cart_write(&mut self, addr: u16, data: u8) {
        self.base_mut().cart_write(addr, data);
    }

    /// PPU read from $0000–$3FFF.
    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.base().ppu_read(addr)
    }

    fn ppu_write(&mut self, addr: u16, data: u8) {
        self.base_mut().ppu_write(addr, data);
    }

    /// Called once per scanline at dot 257.
    fn notify_scanline(&mut self, _scanline: u16) {}

    /// PPU address bus activity outside rendering fetches (A12 watchers).
    fn check_a12(&mut self, _addr: u16) {}

    /// Called after every CPU clock.
    fn cpu_cycle(&mut self) {}

    /// Rebuild the bank tables from the latched registers.
    fn recompute_banks(&mut self) {}

    /// Runs once after CPU power-up.
    fn init(&mut self) {}

    /// Level of the cartridge IRQ output.
    fn irq_line(&self) -> bool {
        false
    }

    fn mirroring(&self) -> Mirroring {
        self.base().mirroring()
    }

    /// Copy of PRG RAM, safe to hand to another thread.
    fn prg_ram_snapshot(&self) -> Vec<u8> {
        self.base().prg_ram.clone()
    }

    /// Replace PRG RAM with a copy of `data`, truncated or zero-padded to 8 KiB.
    fn restore_prg_ram(&mut self, data: &[u8]) {
        let mut ram = data.to_vec();
        ram.resize(PRG_RAM_SIZE, 0);
        self.base_mut().prg_ram = ram;
    }
}
