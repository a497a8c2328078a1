//! NES cartridge loading from iNES format (.nes files).
//!
//! Implements the [iNES](https://www.nesdev.org/wiki/INES) format: 16-byte header (magic "NES\x1A",
//! PRG size in 16 KiB units, CHR size in 8 KiB units, flags 6–7 for mapper, etc.), then PRG ROM,
//! then CHR ROM. [NES 2.0](https://www.nesdev.org/wiki/NES_2.0) headers extend the mapper number
//! and the size fields. CHR size 0 means the board carries 8 KiB of CHR RAM instead.

use std::fs;
use std::path::Path;

use log::info;
use thiserror::Error;

use crate::cartridge::mapper::{Mirroring, mapper::Mapper, mapper0::Mapper0, mapper1::Mapper1};

const HEADER_LEN: usize = 16;
const PRG_UNIT: usize = 16 * 1024;
const CHR_UNIT: usize = 8 * 1024;

/// Why a ROM image could not be loaded. A failed load leaves any running session untouched.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("not an iNES image (bad header signature)")]
    BadMagic,
    #[error("ROM image is shorter than its 16-byte header")]
    Truncated,
    #[error("header declares no PRG ROM")]
    NoProgramRom,
    #[error("mapper {0} is not supported")]
    UnsupportedMapper(u16),
    #[error("could not read ROM: {0}")]
    Io(#[from] std::io::Error),
}

/// A parsed cartridge image.
#[derive(Debug, Clone)]
pub struct Rom {
    pub mapper_id: u16,
    pub prg: Vec<u8>,
    /// CHR ROM, or 8 KiB of zeroed CHR RAM.
    pub chr: Vec<u8>,
    pub chr_ram: bool,
    pub mirroring: Mirroring,
}

impl Rom {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let data = fs::read(path)?;
        Self::parse(&data)
    }

    /// Parse an in-memory image. Declared sizes are clamped to the bytes actually present.
    pub fn parse(data: &[u8]) -> Result<Self, LoadError> {
        if data.len() < HEADER_LEN {
            return Err(LoadError::Truncated);
        }
        let header = &data[..HEADER_LEN];
        if &header[..4] != b"NES\x1A" {
            return Err(LoadError::BadMagic);
        }

        let flags6 = header[6];
        let flags7 = header[7];
        let mirroring = if flags6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let mut mapper_id = (flags6 >> 4) as u16;
        let (prg_units, chr_units) = if (flags7 >> 2) & 3 == 2 {
            mapper_id |= (flags7 & 0xF0) as u16;
            mapper_id |= ((header[8] & 0x0F) as u16) << 8;
            (
                header[4] as usize | ((header[9] & 0x0F) as usize) << 8,
                header[5] as usize | ((header[9] >> 4) as usize) << 8,
            )
        } else {
            // Old dumps carry junk ("DiskDude!") in bytes 7–15. Flags 7 is trusted only when
            // the tail is clean.
            if header[11..16].iter().all(|&b| b == 0) {
                mapper_id |= (flags7 & 0xF0) as u16;
            }
            (header[4] as usize, header[5] as usize)
        };

        let body = &data[HEADER_LEN..];
        let prg_len = (prg_units * PRG_UNIT).min(body.len());
        if prg_len == 0 {
            return Err(LoadError::NoProgramRom);
        }
        let chr_len = (chr_units * CHR_UNIT).min(body.len() - prg_len);

        let prg = body[..prg_len].to_vec();
        let (chr, chr_ram) = if chr_len == 0 {
            (vec![0; CHR_UNIT], true)
        } else {
            (body[prg_len..prg_len + chr_len].to_vec(), false)
        };

        Ok(Self {
            mapper_id,
            prg,
            chr,
            chr_ram,
            mirroring,
        })
    }

    /// Build the board for this image. Unsupported mapper ids create no mapper state.
    pub fn into_mapper(self) -> Result<Box<dyn Mapper>, LoadError> {
        info!(
            "mapper {}, PRG {} KiB, CHR {} KiB{}, {:?} mirroring",
            self.mapper_id,
            self.prg.len() / 1024,
            self.chr.len() / 1024,
            if self.chr_ram { " RAM" } else { "" },
            self.mirroring
        );

        let mapper: Box<dyn Mapper> = match self.mapper_id {
            0 => Box::new(Mapper0::new(self.prg, self.chr, self.mirroring)),
            1 => Box::new(Mapper1::new(self.prg, self.chr, self.mirroring)),
            id => return Err(LoadError::UnsupportedMapper(id)),
        };
        Ok(mapper)
    }
}

/// Assemble an iNES image in memory.
#[cfg(test)]
pub(crate) fn build_ines(mapper: u8, prg: &[u8], chr: &[u8], flags6: u8) -> Vec<u8> {
    let mut image = vec![
        b'N',
        b'E',
        b'S',
        0x1A,
        (prg.len() / PRG_UNIT) as u8,
        (chr.len() / CHR_UNIT) as u8,
        (mapper << 4) | (flags6 & 0x0F),
        mapper & 0xF0,
    ];
    image.resize(HEADER_LEN, 0);
    image.extend_from_slice(prg);
    image.extend_from_slice(chr);
    image
}
