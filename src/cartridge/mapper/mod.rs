//! NES mappers for PRG/CHR memory mapping.
//!
//! [`mapper::MapperBase`] holds the banked storage and nametables every board shares;
//! Mapper0 (NROM) and Mapper1 (MMC1) layer their register logic on top of it.

/// Nametable mirroring: which physical 1 KiB buffer each of the four logical nametables uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    SingleScreenLower,
    SingleScreenUpper,
    FourScreen,
}

impl Mirroring {
    /// Physical buffer index for logical nametables 0..=3.
    pub fn layout(self) -> [usize; 4] {
        match self {
            Mirroring::Horizontal => [0, 0, 1, 1],
            Mirroring::Vertical => [0, 1, 0, 1],
            Mirroring::SingleScreenLower => [0, 0, 0, 0],
            Mirroring::SingleScreenUpper => [1, 1, 1, 1],
            Mirroring::FourScreen => [0, 1, 2, 3],
        }
    }
}

pub mod mapper;

pub mod mapper0;
pub mod mapper1;
