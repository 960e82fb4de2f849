use bitfield::bitfield;

use super::aswan::{planar_2bpp_pixel, TILE_BASE_2BPP, TILE_SIZE_2BPP};
use super::registers::{DisplayRegisters, MapEntry};
use super::{gray, rgb12, vram_word, DisplayState, DisplayVariant, Layer, Rgb};

pub const PORT_DISPLAY_MODE: u16 = 0x60;
/// Start of the 4bpp tile area
pub const TILE_BASE_4BPP: usize = 0x4000;
pub const TILE_SIZE_4BPP: usize = 32;
/// Sixteen palettes of sixteen 12-bit colors
pub const PALETTE_RAM: usize = 0xFE00;
const BANK_TILES: u16 = 512;

bitfield! {
  /// 60h - DISP_MODE - Display Mode (R/W)
  #[derive(Clone, Copy, Default, PartialEq, Eq)]
  pub struct DisplayMode(u8);
  impl Debug;
  /// Tile rows are stored as consecutive pixels instead of bit planes
  pub packed, _: 5;
  pub four_bpp, _: 6;
  /// Palettes come from palette RAM instead of the shade pool
  pub color, _: 7;
}

/// The color display. Boots into a monochrome mode equivalent to `Aswan`
#[derive(Clone, Copy, Debug, Default)]
pub struct Sphinx {
    mode: DisplayMode,
}

impl Sphinx {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    fn palette_color(vram: &[u8], index: usize) -> Rgb {
        rgb12(vram_word(vram, PALETTE_RAM + index * 2))
    }

    fn packed_4bpp_pixel(vram: &[u8], tile: u16, x: u8, y: u8) -> u8 {
        let addr =
            TILE_BASE_4BPP + tile as usize * TILE_SIZE_4BPP + y as usize * 4 + x as usize / 2;
        let byte = vram.get(addr).copied().unwrap_or(0);
        if x & 1 == 0 {
            byte >> 4
        } else {
            byte & 0x0F
        }
    }

    fn planar_4bpp_pixel(vram: &[u8], tile: u16, x: u8, y: u8) -> u8 {
        let row = TILE_BASE_4BPP + tile as usize * TILE_SIZE_4BPP + y as usize * 4;
        let bit = 7 - x;
        (0..4).fold(0, |color, plane| {
            let byte = vram.get(row + plane).copied().unwrap_or(0);
            color | (((byte >> bit) & 1) << plane)
        })
    }

    fn packed_2bpp_pixel(vram: &[u8], tile: u16, x: u8, y: u8) -> u8 {
        let addr =
            TILE_BASE_2BPP + tile as usize * TILE_SIZE_2BPP + y as usize * 2 + x as usize / 4;
        let byte = vram.get(addr).copied().unwrap_or(0);
        (byte >> (6 - 2 * (x & 3))) & 0x03
    }
}

impl DisplayVariant for Sphinx {
    fn name(&self) -> &'static str {
        "Sphinx"
    }

    fn reset(&mut self) {
        self.mode = DisplayMode::default();
    }

    fn read_register(&self, port: u16) -> Option<u8> {
        (port == PORT_DISPLAY_MODE).then_some(self.mode.0)
    }

    fn write_register(&mut self, port: u16, data: u8) -> bool {
        if port != PORT_DISPLAY_MODE {
            return false;
        }
        self.mode = DisplayMode(data);
        log::debug!("Display mode {:?}", self.mode);
        true
    }

    fn four_bpp(&self) -> bool {
        self.mode.color() && self.mode.four_bpp()
    }

    fn sprite_table_address(&self, regs: &DisplayRegisters) -> usize {
        let mask = if self.mode.color() { 0x3F } else { 0x1F };
        ((regs.sprite_base & mask) as usize) << 9
    }

    fn map_address(&self, regs: &DisplayRegisters, layer: Layer) -> usize {
        let nibble = match layer {
            Layer::Scr1 => regs.map_base.scr1(),
            Layer::Scr2 => regs.map_base.scr2(),
        };
        let mask = if self.mode.color() { 0x0F } else { 0x07 };
        ((nibble & mask) as usize) << 11
    }

    fn resolve_tile_number(&self, entry: MapEntry) -> u16 {
        if self.four_bpp() && entry.bank() {
            entry.tile() + BANK_TILES
        } else {
            entry.tile()
        }
    }

    fn tile_pixel(&self, vram: &[u8], tile: u16, x: u8, y: u8) -> u8 {
        match (self.four_bpp(), self.mode.packed()) {
            (true, true) => Self::packed_4bpp_pixel(vram, tile, x, y),
            (true, false) => Self::planar_4bpp_pixel(vram, tile, x, y),
            (false, true) => Self::packed_2bpp_pixel(vram, tile, x, y),
            (false, false) => planar_2bpp_pixel(vram, tile, x, y),
        }
    }

    fn resolve_pixel_color(
        &self,
        state: &DisplayState,
        vram: &[u8],
        palette: u8,
        color: u8,
    ) -> Rgb {
        if self.mode.color() {
            Self::palette_color(vram, (palette as usize & 0x0F) * 16 + (color as usize & 0x0F))
        } else {
            state.mono_color(palette, color)
        }
    }

    fn back_color(&self, state: &DisplayState, vram: &[u8]) -> Rgb {
        if self.mode.color() {
            Self::palette_color(vram, state.regs.back_color as usize)
        } else {
            gray(state.regs.shade(state.regs.back_color & 0x07))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::OPEN_BUS;
    use crate::display::{DisplayController, LINE_WIDTH};

    const COLOR_RAM: usize = 0x10000;

    fn color_sphinx(mode: u8) -> Sphinx {
        let mut sphinx = Sphinx::new();
        sphinx.write_register(PORT_DISPLAY_MODE, mode);
        sphinx
    }

    #[test]
    fn mode_register() {
        let mut sphinx = Sphinx::new();
        assert_eq!(sphinx.read_register(PORT_DISPLAY_MODE), Some(0));
        assert!(sphinx.write_register(PORT_DISPLAY_MODE, 0xE0));
        assert!(sphinx.mode().color() && sphinx.mode().four_bpp() && sphinx.mode().packed());
        assert!(!sphinx.write_register(0x61, 0));
        assert_eq!(sphinx.read_register(0x61), None);
        sphinx.reset();
        assert_eq!(sphinx.mode(), DisplayMode(0));
    }

    #[test]
    fn four_bpp_needs_color() {
        assert!(!color_sphinx(0x40).four_bpp());
        assert!(color_sphinx(0xC0).four_bpp());
    }

    #[test]
    fn tile_formats() {
        let mut vram = vec![0; COLOR_RAM];
        // Tile 2, row 1 in each layout
        let row4 = TILE_BASE_4BPP + 2 * TILE_SIZE_4BPP + 4;
        vram[row4..row4 + 4].copy_from_slice(&[0xA5, 0x80, 0x80, 0x01]);
        let row2 = TILE_BASE_2BPP + 2 * TILE_SIZE_2BPP + 2;
        vram[row2..row2 + 2].copy_from_slice(&[0x1B, 0xC0]);

        let packed4 = color_sphinx(0xE0);
        assert_eq!(packed4.tile_pixel(&vram, 2, 0, 1), 0xA);
        assert_eq!(packed4.tile_pixel(&vram, 2, 1, 1), 0x5);
        assert_eq!(packed4.tile_pixel(&vram, 2, 2, 1), 0x8);

        let planar4 = color_sphinx(0xC0);
        assert_eq!(planar4.tile_pixel(&vram, 2, 0, 1), 0b0111);
        assert_eq!(planar4.tile_pixel(&vram, 2, 7, 1), 0b1001);

        let packed2 = color_sphinx(0xA0);
        assert_eq!(packed2.tile_pixel(&vram, 2, 0, 1), 0);
        assert_eq!(packed2.tile_pixel(&vram, 2, 1, 1), 1);
        assert_eq!(packed2.tile_pixel(&vram, 2, 2, 1), 2);
        assert_eq!(packed2.tile_pixel(&vram, 2, 3, 1), 3);
        assert_eq!(packed2.tile_pixel(&vram, 2, 4, 1), 3);

        let planar2 = Sphinx::new();
        assert_eq!(planar2.tile_pixel(&vram, 2, 0, 1), 2);
        assert_eq!(planar2.tile_pixel(&vram, 2, 3, 1), 1);
    }

    #[test]
    fn bank_bit_only_in_four_bpp() {
        let entry = MapEntry(0x2000 | 0x0010);
        assert_eq!(color_sphinx(0xC0).resolve_tile_number(entry), 0x210);
        assert_eq!(color_sphinx(0x80).resolve_tile_number(entry), 0x010);
    }

    #[test]
    fn color_address_masks() {
        let mut regs = DisplayRegisters::new();
        regs.sprite_base = 0x3F;
        regs.map_base.0 = 0xF9;
        let color = color_sphinx(0x80);
        assert_eq!(color.sprite_table_address(&regs), 0x3F << 9);
        assert_eq!(color.map_address(&regs, Layer::Scr1), 9 << 11);
        assert_eq!(color.map_address(&regs, Layer::Scr2), 15 << 11);
        let mono = Sphinx::new();
        assert_eq!(mono.sprite_table_address(&regs), 0x1F << 9);
        assert_eq!(mono.map_address(&regs, Layer::Scr2), 7 << 11);
    }

    #[test]
    fn four_bpp_index_zero_is_transparent() {
        let sphinx = color_sphinx(0xC0);
        assert!(!sphinx.is_color_opaque(0, 0));
        let two_bpp = color_sphinx(0x80);
        assert!(two_bpp.is_color_opaque(0, 0));
        assert!(!two_bpp.is_color_opaque(4, 0));
        assert!(!two_bpp.is_color_opaque(12, 0));
        assert!(two_bpp.is_color_opaque(12, 1));
    }

    #[test]
    fn color_line_uses_palette_ram() {
        let mut vram = vec![0; COLOR_RAM];
        // Back color is palette RAM entry 0x21
        vram[PALETTE_RAM + 0x42] = 0x34;
        vram[PALETTE_RAM + 0x43] = 0x02;
        // Tile 1 packed 4bpp, every pixel color 5
        let tile = TILE_BASE_4BPP + TILE_SIZE_4BPP;
        vram[tile..tile + TILE_SIZE_4BPP].fill(0x55);
        // SCR1 map at 0x0000, cell (1, 0): tile 1, palette 3
        vram[2] = 0x01;
        vram[3] = 3 << 1;
        // Palette 3, color 5
        let entry = PALETTE_RAM + (3 * 16 + 5) * 2;
        vram[entry] = 0xF0;
        vram[entry + 1] = 0x0F;

        let mut display = DisplayController::new(Box::new(Sphinx::new()));
        display.write_register(PORT_DISPLAY_MODE, 0xE0);
        display.write_register(0x00, 0x01);
        display.write_register(0x01, 0x21);
        assert_eq!(display.read_register(PORT_DISPLAY_MODE), 0xE0);
        display.step(LINE_WIDTH as u32, &vram);

        let row = display.frame()[0];
        assert_eq!(row[0], [0x22, 0x33, 0x44]);
        assert_eq!(row[8], [0xFF, 0xFF, 0x00]);
        assert_eq!(row[15], [0xFF, 0xFF, 0x00]);
        assert_eq!(row[16], [0x22, 0x33, 0x44]);
    }

    #[test]
    fn mono_display_has_no_mode_register() {
        let display = DisplayController::new(Box::new(crate::display::Aswan::new()));
        assert_eq!(display.read_register(PORT_DISPLAY_MODE), OPEN_BUS);
    }
}
