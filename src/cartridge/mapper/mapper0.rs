//! Mapper 0 (NROM): no bank switching, 16/32 KiB PRG, 8 KiB CHR.
//!
//! [NROM](https://www.nesdev.org/wiki/NROM): a 16 KiB image appears at both $8000 and $C000.

use crate::cartridge::mapper::{
    Mirroring,
    mapper::{Mapper, MapperBase},
};

const PRG_WINDOW: usize = 32 * 1024;
const HALF_WINDOW: usize = 16 * 1024;

pub struct Mapper0 {
    base: MapperBase,
}

impl Mapper0 {
    /// Lay PRG out over the full 32 KiB window once, doubling a 16 KiB image.
    pub fn new(prg_rom: Vec<u8>, chr: Vec<u8>, mirroring: Mirroring) -> Self {
        let mut image = vec![0; PRG_WINDOW];
        let len = prg_rom.len().min(PRG_WINDOW);
        image[..len].copy_from_slice(&prg_rom[..len]);
        if prg_rom.len() <= HALF_WINDOW {
            image[HALF_WINDOW..HALF_WINDOW + len].copy_from_slice(&prg_rom[..len]);
        }

        Self {
            base: MapperBase::new(image, chr, mirroring),
        }
    }
}

impl Mapper for Mapper0 {
    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }
}
