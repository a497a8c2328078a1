//! nescore: an embeddable, cycle-accurate NES core.
//!
//! Implements the NES chipset as documented on the
//! [NESdev Wiki](https://www.nesdev.org/wiki/NES_reference_guide): the Ricoh 2A03 CPU,
//! the 2C02 PPU, cartridge mappers and controller I/O. Audio, presentation and storage
//! are left to the host through the traits in [`host`].
//!
//! ## Modules (NESdev references)
//!
//! - **bus** – [CPU memory map](https://www.nesdev.org/wiki/CPU_memory_map): RAM, PPU
//!   registers, I/O window, controllers, cartridge; OAM DMA
//! - **cartridge** – [iNES](https://www.nesdev.org/wiki/INES) /
//!   [NES 2.0](https://www.nesdev.org/wiki/NES_2.0) loading;
//!   [Mapper](https://www.nesdev.org/wiki/Mapper) NROM (0), MMC1 (1)
//! - **config** – region and session settings
//! - **controller** – [Controller reading](https://www.nesdev.org/wiki/Controller_reading):
//!   $4016 latch, shift-out
//! - **cpu** – [6502](https://www.nesdev.org/wiki/CPU) / 2A03: full + undocumented opcodes,
//!   [NMI](https://www.nesdev.org/wiki/NMI)
//! - **host** – audio port, frame sink and save storage
//! - **nes** – the frame driver; the PPU clocks the CPU 3:1
//! - **ppu** – [PPU](https://www.nesdev.org/wiki/PPU),
//!   [PPU registers](https://www.nesdev.org/wiki/PPU_registers), OAM, nametables, 256×240

pub mod bus;
pub mod cartridge;
pub mod config;
pub mod controller;
pub mod cpu;
pub mod host;
pub mod nes;
pub mod ppu;

pub use cartridge::cartridge::{LoadError, Rom};
pub use config::{Config, Region};
pub use nes::Nes;
