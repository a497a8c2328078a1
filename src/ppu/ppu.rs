//! NES PPU (Picture Processing Unit) implementation.
//!
//! A dot-by-dot state machine: each [`PPU::clock`] produces at most one pixel, runs the
//! background fetch pipeline, evaluates sprites for the next scanline and raises vblank.
//! Output is a 256×240 buffer of colour indices (palette colour in bits 0–5, emphasis in
//! bits 6–8), converted to RGB by the front-end.
//!
//! See [PPU rendering](https://www.nesdev.org/wiki/PPU_rendering) and
//! [PPU scrolling](https://www.nesdev.org/wiki/PPU_scrolling) for the v/t/x register model.

use bitflags::bitflags;

use crate::{cartridge::mapper::mapper::Mapper, config::Region};

/// OAM (Object Attribute Memory): 64 sprites × 4 bytes. Each entry: Y, tile, attr, X.
pub const OAM_LEN: usize = 256;
pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 240;

/// Dots per scanline.
pub const DOTS_PER_LINE: u16 = 341;
pub const VBLANK_LINE: u16 = 241;

bitflags! {
    /// $2000 PPUCTRL.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Ctrl: u8 {
        const NAMETABLE = 0b0000_0011;
        const VRAM_INCREMENT_32 = 1 << 2;
        const SPRITE_PATTERN_HIGH = 1 << 3;
        const BG_PATTERN_HIGH = 1 << 4;
        const SPRITE_SIZE_16 = 1 << 5;
        const MASTER_SLAVE = 1 << 6;
        const NMI_ENABLE = 1 << 7;
    }
}

bitflags! {
    /// $2001 PPUMASK.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Mask: u8 {
        const GRAYSCALE = 1 << 0;
        const SHOW_BG_LEFT = 1 << 1;
        const SHOW_SPRITES_LEFT = 1 << 2;
        const SHOW_BG = 1 << 3;
        const SHOW_SPRITES = 1 << 4;
        const EMPHASIZE_RED = 1 << 5;
        const EMPHASIZE_GREEN = 1 << 6;
        const EMPHASIZE_BLUE = 1 << 7;
    }
}

/// PPU state: timing, loopy registers, OAM, pixel pipelines and the output buffers.
pub struct PPU {
    pub region: Region,
    pub scanline: u16,
    pub cycle: u16,
    /// Frames started since power-up.
    pub frame_count: u64,
    pub(super) odd_frame: bool,
    /// PPU-to-CPU clock divider; the CPU runs when it wraps to 0.
    pub(super) div: u8,

    pub ctrl: Ctrl,
    pub mask: Mask,
    /// Current VRAM address ("loopy v"): fine y, nametable, coarse y, coarse x.
    pub v: u16,
    /// Temporary VRAM address ("loopy t").
    pub t: u16,
    pub fine_x: u8,
    /// Shared $2005/$2006 write toggle; true when the next write is the first.
    pub(super) first_write: bool,
    pub(super) read_buffer: u8,
    pub(super) open_bus: u8,
    /// PPUMASK emphasis bits moved to pixel bits 6–8.
    pub(super) emphasis: u16,

    pub vblank: bool,
    pub sprite_0_hit: bool,
    pub sprite_overflow: bool,

    pub oam: [u8; OAM_LEN],
    pub oam_addr: u8,
    pub(super) oam_start: u8,
    /// Secondary OAM: Y bytes of the sprites picked for the next line.
    pub(super) secondary_oam: [u8; 32],

    pub(super) tile_addr: u16,
    pub(super) low_bits: u8,
    pub(super) high_bits: u8,
    pub(super) next_attr: u8,
    pub(super) penultimate_attr: u8,
    pub(super) bg_shift_lo: u32,
    pub(super) bg_shift_hi: u32,
    pub(super) attr_shift_lo: u32,
    pub(super) attr_shift_hi: u32,

    /// Sprites selected for the current line.
    pub(super) found: usize,
    pub(super) sprite_0_here: bool,
    pub(super) sprite_shift_lo: [u8; 8],
    pub(super) sprite_shift_hi: [u8; 8],
    pub(super) sprite_x: [u8; 8],
    pub(super) sprite_palette: [u8; 8],
    pub(super) sprite_behind: [bool; 8],

    /// 256×240 colour indices, row-major.
    pub bitmap: Vec<u16>,
    /// Backdrop colour at the start of each visible line.
    pub bg_colors: [u8; SCREEN_HEIGHT],
    /// Rendering was on at the start of the frame (composite dot-crawl hint).
    pub dot_crawl: bool,
}

impl PPU {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            scanline: 0,
            cycle: 0,
            frame_count: 0,
            odd_frame: false,
            div: 2,
            ctrl: Ctrl::empty(),
            mask: Mask::empty(),
            v: 0,
            t: 0,
            fine_x: 0,
            first_write: true,
            read_buffer: 0,
            open_bus: 0,
            emphasis: 0,
            vblank: false,
            sprite_0_hit: false,
            sprite_overflow: false,
            oam: [0xFF; OAM_LEN],
            oam_addr: 0,
            oam_start: 0,
            secondary_oam: [0xFF; 32],
            tile_addr: 0,
            low_bits: 0,
            high_bits: 0,
            next_attr: 0,
            penultimate_attr: 0,
            bg_shift_lo: 0,
            bg_shift_hi: 0,
            attr_shift_lo: 0,
            attr_shift_hi: 0,
            found: 0,
            sprite_0_here: false,
            sprite_shift_lo: [0; 8],
            sprite_shift_hi: [0; 8],
            sprite_x: [0; 8],
            sprite_palette: [0; 8],
            sprite_behind: [false; 8],
            bitmap: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            bg_colors: [0; SCREEN_HEIGHT],
            dot_crawl: true,
        }
    }

    pub fn rendering_on(&self) -> bool {
        self.mask.intersects(Mask::SHOW_BG | Mask::SHOW_SPRITES)
    }

    fn pre_render_line(&self) -> u16 {
        self.region.pre_render_line()
    }

    /// Lines where the PPU is idle on the bus (post-render and vblank).
    pub(super) fn in_vblank_lines(&self) -> bool {
        self.scanline > 240 && self.scanline < self.pre_render_line()
    }

    /// Level of the /NMI output.
    pub fn nmi_line(&self) -> bool {
        self.vblank && self.ctrl.contains(Ctrl::NMI_ENABLE)
    }

    /// Position the dot counter for a new scanline. NTSC skips dot 0 of line 0 on odd
    /// frames while rendering.
    pub fn begin_line(&mut self) {
        let skip = self.region == Region::Ntsc
            && self.scanline == 0
            && self.rendering_on()
            && self.odd_frame;
        self.cycle = if skip { 1 } else { 0 };
    }

    /// True while the current line has dots left.
    pub fn line_in_progress(&self) -> bool {
        self.cycle < DOTS_PER_LINE
    }

    /// First half of a dot: fetches, flag changes and pixel output.
    pub fn clock(&mut self, mapper: &mut dyn Mapper) {
        let line = self.scanline;
        let cycle = self.cycle;
        let pre_render = self.pre_render_line();
        let rendering = self.rendering_on();

        if cycle == 1 {
            if line == 0 {
                self.dot_crawl = rendering;
            }
            if (line as usize) < SCREEN_HEIGHT {
                self.bg_colors[line as usize] = backdrop(mapper);
            }
        }

        if line < 240 || line == pre_render {
            if rendering && ((1..=256).contains(&cycle) || (321..=336).contains(&cycle)) {
                self.bg_fetch(mapper);
            } else if cycle == 257 && rendering {
                // Horizontal bits of v come back from t
                self.v = (self.v & !0x041F) | (self.t & 0x041F);
            } else if cycle > 257 && rendering {
                self.oam_addr = 0;
            }
            if cycle == 340 && rendering {
                // Two throwaway nametable reads end every line
                self.fetch_nametable_byte(mapper);
                self.fetch_nametable_byte(mapper);
            }
            if cycle == 65 && rendering {
                self.oam_start = self.oam_addr;
            }
            if cycle == 260 && rendering {
                self.evaluate_sprites(mapper);
            }
            if line == pre_render {
                if cycle == 0 {
                    self.vblank = false;
                    self.sprite_0_hit = false;
                    self.sprite_overflow = false;
                } else if (280..=304).contains(&cycle) && rendering {
                    self.v = self.t;
                }
            }
        } else if line == VBLANK_LINE && cycle == 1 {
            self.vblank = true;
        }

        if !rendering || self.in_vblank_lines() {
            mapper.check_a12(self.v & 0x3FFF);
        }

        if line < 240 && (1..=256).contains(&cycle) {
            self.output_pixel(mapper, line as usize, (cycle - 1) as usize);
        }
    }

    /// Advance the 3:1 divider. True when the CPU owes a clock on this dot.
    pub fn cpu_due(&mut self) -> bool {
        self.div = (self.div + 1) % 3;
        self.div == 0
    }

    /// Second half of a dot: scanline notification, then the dot/line counters move on.
    pub fn finish_dot(&mut self, mapper: &mut dyn Mapper) {
        if self.cycle == 257 {
            mapper.notify_scanline(self.scanline);
        } else if self.cycle == 340 {
            self.scanline = (self.scanline + 1) % self.region.scanlines();
            if self.scanline == 0 {
                self.frame_count += 1;
                self.odd_frame = !self.odd_frame;
            }
        }
        self.cycle += 1;
    }

    fn output_pixel(&mut self, mapper: &mut dyn Mapper, line: usize, x: usize) {
        let offset = line * SCREEN_WIDTH + x;

        if self.mask.contains(Mask::SHOW_BG) {
            let is_bg = self.draw_bg_pixel(mapper, offset);
            self.draw_sprites(mapper, line, x, is_bg);
        } else {
            // With rendering off, a v pointing into palette RAM shows that colour.
            let color = if self.v > 0x3F00 && self.v < 0x3FFF {
                mapper.ppu_read(self.v)
            } else {
                backdrop(mapper)
            };
            self.bitmap[offset] = color as u16;
            if self.mask.contains(Mask::SHOW_SPRITES) {
                self.draw_sprites(mapper, line, x, true);
            }
        }

        if self.mask.contains(Mask::GRAYSCALE) {
            self.bitmap[offset] &= 0x30;
        }
        self.bitmap[offset] = (self.bitmap[offset] & 0x3F) | self.emphasis;
    }

    fn bg_fetch(&mut self, mapper: &mut dyn Mapper) {
        self.attr_shift_hi |= ((self.next_attr >> 1) & 1) as u32;
        self.attr_shift_lo |= (self.next_attr & 1) as u32;

        let fine_y = (self.v & 0x7000) >> 12;
        match (self.cycle - 1) & 7 {
            1 => self.fetch_nametable_byte(mapper),
            3 => {
                self.penultimate_attr = attribute(
                    mapper,
                    (self.v & 0x0C00) + 0x23C0,
                    self.v & 0x1F,
                    (self.v & 0x03E0) >> 5,
                );
            }
            5 => self.low_bits = mapper.ppu_read(self.tile_addr + fine_y),
            7 => {
                self.high_bits = mapper.ppu_read(self.tile_addr + 8 + fine_y);
                self.bg_shift_lo |= self.low_bits as u32;
                self.bg_shift_hi |= self.high_bits as u32;
                self.next_attr = self.penultimate_attr;
                if self.cycle != 256 {
                    self.increment_horizontal();
                } else {
                    self.increment_vertical();
                }
            }
            _ => {}
        }

        if (321..=336).contains(&self.cycle) {
            self.shift_background();
        }
    }

    fn fetch_nametable_byte(&mut self, mapper: &mut dyn Mapper) {
        let addr = ((self.v & 0x0C00) | 0x2000) + (self.v & 0x03FF);
        let pattern_base = if self.ctrl.contains(Ctrl::BG_PATTERN_HIGH) {
            0x1000
        } else {
            0
        };
        self.tile_addr = mapper.ppu_read(addr) as u16 * 16 + pattern_base;
    }

    /// Coarse X += 1, wrapping into the neighbouring horizontal nametable.
    pub(super) fn increment_horizontal(&mut self) {
        if self.v & 0x001F == 31 {
            self.v &= !0x001F;
            self.v ^= 0x0400;
        } else {
            self.v += 1;
        }
    }

    /// Fine Y += 1, carrying into coarse Y. Row 29 wraps to the next vertical nametable;
    /// rows 30 and 31 (attribute memory) wrap without switching.
    pub(super) fn increment_vertical(&mut self) {
        if self.v & 0x7000 != 0x7000 {
            self.v += 0x1000;
            return;
        }

        self.v &= !0x7000;
        let mut y = (self.v & 0x03E0) >> 5;
        if y == 29 {
            y = 0;
            self.v ^= 0x0800;
        } else {
            y = (y + 1) & 31;
        }
        self.v = (self.v & !0x03E0) | (y << 5);
    }

    fn shift_background(&mut self) {
        self.bg_shift_hi <<= 1;
        self.bg_shift_lo <<= 1;
        self.attr_shift_hi <<= 1;
        self.attr_shift_lo <<= 1;
    }

    /// Returns true when the background is transparent at this dot.
    fn draw_bg_pixel(&mut self, mapper: &dyn Mapper, offset: usize) -> bool {
        let x = offset & 0xFF;
        let is_bg;
        if !self.mask.contains(Mask::SHOW_BG_LEFT) && x < 8 {
            self.bitmap[offset] = backdrop(mapper) as u16;
            is_bg = true;
        } else {
            let bit = 16 - self.fine_x as u32;
            let pixel = (((self.bg_shift_hi >> bit) & 1) << 1) | ((self.bg_shift_lo >> bit) & 1);
            let bit = 8 - self.fine_x as u32;
            let palette =
                (((self.attr_shift_hi >> bit) & 1) << 1) | ((self.attr_shift_lo >> bit) & 1);

            is_bg = pixel == 0;
            self.bitmap[offset] = if is_bg {
                backdrop(mapper) as u16
            } else {
                mapper.base().palette[((palette << 2) + pixel) as usize] as u16
            };
        }
        self.shift_background();
        is_bg
    }

    /// Select up to eight sprites from OAM for the next line and fetch their pattern rows.
    /// On the pre-render line no sprite is selected and overflow is left alone.
    pub(super) fn evaluate_sprites(&mut self, mapper: &mut dyn Mapper) {
        let height: i32 = if self.ctrl.contains(Ctrl::SPRITE_SIZE_16) { 16 } else { 8 };
        self.sprite_0_here = false;
        self.found = 0;
        self.secondary_oam = [0xFF; 32];

        // The pre-render line selects nothing; only the dummy fetches below happen.
        let mut index = if (self.scanline as usize) < SCREEN_HEIGHT {
            self.oam_start as usize
        } else {
            OAM_LEN
        };
        while index < 255 {
            let entry = |k: usize| self.oam[(index + k) & 0xFF];
            let y = entry(0);
            let tile = entry(1);
            let attr = entry(2);
            let x = entry(3);

            let mut offset = self.scanline as i32 - y as i32;
            if offset < 0 || offset >= height {
                index += 4;
                continue;
            }
            if index == 0 {
                self.sprite_0_here = true;
            }
            if self.found >= 8 {
                self.sprite_overflow = true;
                break;
            }

            let slot = self.found;
            self.secondary_oam[slot * 4] = y;
            self.sprite_behind[slot] = attr & 0x20 != 0;
            self.sprite_x[slot] = x;
            self.sprite_palette[slot] = ((attr & 3) + 4) * 4;
            if attr & 0x80 != 0 {
                offset = height - 1 - offset;
            }
            // 8×16 sprites are two stacked tiles
            if offset > 7 {
                offset += 8;
            }
            let (lo, hi) = self.fetch_sprite_row(mapper, tile, offset as u16, attr);
            self.sprite_shift_lo[slot] = lo;
            self.sprite_shift_hi[slot] = hi;
            self.found += 1;
            index += 4;
        }

        // The hardware always performs eight fetches; unused slots read tile $FF.
        for slot in self.found..8 {
            self.fetch_sprite_row(mapper, 0xFF, 0, 0);
            self.sprite_shift_lo[slot] = 0;
            self.sprite_shift_hi[slot] = 0;
        }
    }

    /// Pattern bytes for one sprite row, bit-reversed so bit 0 is the leftmost pixel
    /// (unless flipped horizontally).
    fn fetch_sprite_row(
        &self,
        mapper: &mut dyn Mapper,
        tile: u8,
        offset: u16,
        attr: u8,
    ) -> (u8, u8) {
        let tile = tile as u16;
        let base = if self.ctrl.contains(Ctrl::SPRITE_SIZE_16) {
            (tile & 1) * 0x1000 + (tile & 0xFE) * 16
        } else {
            let table = if self.ctrl.contains(Ctrl::SPRITE_PATTERN_HIGH) {
                0x1000
            } else {
                0
            };
            tile * 16 + table
        };
        let addr = base + offset;

        let lo = mapper.ppu_read(addr);
        let hi = mapper.ppu_read(addr + 8);
        if attr & 0x40 != 0 {
            (lo, hi)
        } else {
            (lo.reverse_bits(), hi.reverse_bits())
        }
    }

    fn draw_sprites(&mut self, mapper: &dyn Mapper, line: usize, x: usize, bg_transparent: bool) {
        let start = if self.mask.contains(Mask::SHOW_SPRITES_LEFT) {
            0
        } else {
            8
        };

        let mut pixel = 0;
        let mut index = 7;
        for slot in (0..self.found).rev() {
            let offset = x as i32 - self.sprite_x[slot] as i32;
            if (0..=8).contains(&offset) {
                let bits =
                    ((self.sprite_shift_hi[slot] & 1) << 1) | (self.sprite_shift_lo[slot] & 1);
                if bits != 0 {
                    index = slot;
                    pixel = bits;
                }
                self.sprite_shift_hi[slot] >>= 1;
                self.sprite_shift_lo[slot] >>= 1;
            }
        }

        if pixel == 0 || x < start || !self.mask.contains(Mask::SHOW_SPRITES) {
            return;
        }

        if self.sprite_0_here && index == 0 && !bg_transparent && x < 255 {
            self.sprite_0_hit = true;
        }
        if !self.sprite_behind[index] || bg_transparent {
            let color = mapper.base().palette[(self.sprite_palette[index] + pixel) as usize];
            self.bitmap[line * SCREEN_WIDTH + x] = color as u16;
        }
    }
}

/// Universal background colour ($3F00).
fn backdrop(mapper: &dyn Mapper) -> u8 {
    mapper.base().palette[0]
}

/// Two-bit palette for tile (`tile_x`, `tile_y`) from the attribute table at `table`.
fn attribute(mapper: &mut dyn Mapper, table: u16, tile_x: u16, tile_y: u16) -> u8 {
    let byte = mapper.ppu_read(table + (tile_x >> 2) + 8 * (tile_y >> 2));
    let shift = match (tile_y & 2 != 0, tile_x & 2 != 0) {
        (false, false) => 0,
        (false, true) => 2,
        (true, false) => 4,
        (true, true) => 6,
    };
    (byte >> shift) & 3
}
