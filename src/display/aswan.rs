use super::registers::{DisplayRegisters, MapEntry};
use super::{gray, DisplayState, DisplayVariant, Layer, Rgb};

/// Start of the 2bpp tile area
pub const TILE_BASE_2BPP: usize = 0x2000;
pub const TILE_SIZE_2BPP: usize = 16;

/// Two bit planes per row, plane 0 first, leftmost pixel in bit 7
pub(super) fn planar_2bpp_pixel(vram: &[u8], tile: u16, x: u8, y: u8) -> u8 {
    let row = TILE_BASE_2BPP + tile as usize * TILE_SIZE_2BPP + y as usize * 2;
    let bit = 7 - x;
    let plane = |offset: usize| (vram.get(row + offset).copied().unwrap_or(0) >> bit) & 1;
    plane(0) | (plane(1) << 1)
}

/// The monochrome display: 512 2bpp tiles, colors through the shade pool
#[derive(Clone, Copy, Debug, Default)]
pub struct Aswan;

impl Aswan {
    pub fn new() -> Self {
        Self
    }
}

impl DisplayVariant for Aswan {
    fn name(&self) -> &'static str {
        "Aswan"
    }

    fn sprite_table_address(&self, regs: &DisplayRegisters) -> usize {
        ((regs.sprite_base & 0x1F) as usize) << 9
    }

    fn map_address(&self, regs: &DisplayRegisters, layer: Layer) -> usize {
        let nibble = match layer {
            Layer::Scr1 => regs.map_base.scr1(),
            Layer::Scr2 => regs.map_base.scr2(),
        };
        ((nibble & 0x07) as usize) << 11
    }

    fn resolve_tile_number(&self, entry: MapEntry) -> u16 {
        entry.tile()
    }

    fn tile_pixel(&self, vram: &[u8], tile: u16, x: u8, y: u8) -> u8 {
        planar_2bpp_pixel(vram, tile, x, y)
    }

    fn resolve_pixel_color(
        &self,
        state: &DisplayState,
        _vram: &[u8],
        palette: u8,
        color: u8,
    ) -> Rgb {
        state.mono_color(palette, color)
    }

    fn back_color(&self, state: &DisplayState, _vram: &[u8]) -> Rgb {
        gray(state.regs.shade(state.regs.back_color & 0x07))
    }
}
