//! 6502 CPU emulation for the NES.
//!
//! Full instruction set including undocumented opcodes, dispatched through a 256-entry table.
//! Clocked one cycle at a time by the PPU; NMI is edge-triggered, IRQ level-triggered.
//! Bus trait used for memory and I/O (PPU, APU, cartridge, controller).

pub mod cpu;
pub mod flags;
mod opcodes;

#[cfg(test)]
mod tests;
