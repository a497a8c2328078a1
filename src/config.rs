//! Session configuration, passed explicitly to the components that need it.

use std::str::FromStr;
use std::time::Duration;

/// Video region: frame length, odd-frame dot skip and emphasis wiring.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// 262 scanlines, one dot skipped on odd frames while rendering.
    #[default]
    Ntsc,
    /// 312 scanlines, no skipped dot, red/green emphasis swapped.
    Pal,
}

impl Region {
    /// Total scanlines per frame (including pre-render and vblank).
    pub const fn scanlines(self) -> u16 {
        match self {
            Self::Ntsc => 262,
            Self::Pal => 312,
        }
    }

    /// Pre-render scanline number (last scanline of the frame).
    pub const fn pre_render_line(self) -> u16 {
        self.scanlines() - 1
    }

    /// Wall-clock length of one frame.
    pub const fn frame_duration(self) -> Duration {
        match self {
            Self::Ntsc => Duration::from_nanos(16_639_267),
            Self::Pal => Duration::from_nanos(20_007_010),
        }
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ntsc" => Ok(Self::Ntsc),
            "pal" => Ok(Self::Pal),
            other => Err(format!("unknown region `{other}` (expected ntsc or pal)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub region: Region,
    /// Fast-forward branch-to-self and jump-to-self loops.
    pub idle_loop_skip: bool,
    /// Persist PRG RAM every this many frames.
    pub sram_save_interval: u64,
    /// Slot name handed to the save store.
    pub save_slot: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: Region::Ntsc,
            idle_loop_skip: true,
            sram_save_interval: 2048,
            save_slot: "default".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_parses_case_insensitively() {
        assert_eq!("PAL".parse::<Region>(), Ok(Region::Pal));
        assert_eq!("ntsc".parse::<Region>(), Ok(Region::Ntsc));
        assert!("secam".parse::<Region>().is_err());
    }

    #[test]
    fn region_line_counts() {
        assert_eq!(Region::Ntsc.pre_render_line(), 261);
        assert_eq!(Region::Pal.scanlines(), 312);
    }
}
