//! PPU (Picture Processing Unit) emulation for the NES.
//!
//! See [PPU](https://www.nesdev.org/wiki/PPU),
//! [PPU registers](https://www.nesdev.org/wiki/PPU_registers),
//! [PPU memory map](https://www.nesdev.org/wiki/PPU_memory_map). Handles 341-dot scanlines, 262
//! (NTSC) or 312 (PAL) scanlines per frame, vblank NMI, background and sprite pipelines and OAM.
//! Pattern, nametable and palette memory live behind the cartridge mapper.

pub mod ppu;
mod registers;
