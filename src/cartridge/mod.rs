//! NES cartridge loading and mapper support.
//!
//! - **cartridge**: Parses iNES / NES 2.0 images into a [`cartridge::Rom`] and builds its mapper.
//! - **mapper**: NROM (0), MMC1 (1); PRG/CHR bank tables and nametable mirroring.

pub mod cartridge;
pub mod mapper;
