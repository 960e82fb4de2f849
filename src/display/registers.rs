use bitfield::bitfield;

bitfield! {
  /// 00h - DISP_CTRL - Display Control (R/W)
  #[derive(Clone, Copy, Default, PartialEq, Eq)]
  pub struct DisplayControl(u8);
  impl Debug;
  pub scr1_enable, _: 0;
  pub scr2_enable, _: 1;
  pub sprite_enable, _: 2;
  pub sprite_window_enable, _: 3;
  /// 0: SCR2 shows only inside its window; 1: only outside
  pub scr2_window_outside, _: 4;
  pub scr2_window_enable, _: 5;
}

bitfield! {
  /// 07h - MAP_BASE - Screen map bases, in 2 KiB steps (R/W).
  /// Monochrome modes only decode the low 3 bits of each nibble.
  #[derive(Clone, Copy, Default, PartialEq, Eq)]
  pub struct MapBase(u8);
  impl Debug;
  pub scr1, _: 3, 0;
  pub scr2, _: 7, 4;
}

bitfield! {
  /// 14h - LCD_CTRL - LCD Control (R/W)
  #[derive(Clone, Copy, Default, PartialEq, Eq)]
  pub struct LcdControl(u8);
  impl Debug;
  /// Clear puts the panel to sleep and blanks the output
  pub active, _: 0;
}

bitfield! {
  /// A2h - TMR_CTRL - Timer Control (R/W)
  #[derive(Clone, Copy, Default, PartialEq, Eq)]
  pub struct TimerControl(u8);
  impl Debug;
  pub hblank_enable, _: 0;
  pub hblank_repeat, _: 1;
  pub vblank_enable, _: 2;
  pub vblank_repeat, _: 3;
}

bitfield! {
  /// One screen map entry
  #[derive(Clone, Copy, Default, PartialEq, Eq)]
  pub struct MapEntry(u16);
  impl Debug;
  pub u16, tile, _: 8, 0;
  pub u8, palette, _: 12, 9;
  /// Selects the second 512-tile bank in 4bpp color modes
  pub bank, _: 13;
  pub hflip, _: 14;
  pub vflip, _: 15;
}

/// A screen window. Corners are kept exactly as written; the hardware
/// accepts them in either order, so tests sort each axis first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Window {
    pub x0: u8,
    pub y0: u8,
    pub x1: u8,
    pub y1: u8,
}

impl Window {
    pub fn contains(&self, x: u8, y: u8) -> bool {
        let (left, right) = (self.x0.min(self.x1), self.x0.max(self.x1));
        let (top, bottom) = (self.y0.min(self.y1), self.y0.max(self.y1));
        (left..=right).contains(&x) && (top..=bottom).contains(&y)
    }

    pub fn outside(&self, x: u8, y: u8) -> bool {
        !self.contains(x, y)
    }

    /// Corner byte by register order: X0, Y0, X1, Y1
    pub fn get(&self, index: u16) -> u8 {
        match index & 3 {
            0 => self.x0,
            1 => self.y0,
            2 => self.x1,
            _ => self.y1,
        }
    }

    pub fn set(&mut self, index: u16, data: u8) {
        match index & 3 {
            0 => self.x0 = data,
            1 => self.y0 = data,
            2 => self.x1 = data,
            _ => self.y1 = data,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Scroll {
    pub x: u8,
    pub y: u8,
}

/// The register file shared by both display variants
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayRegisters {
    pub control: DisplayControl,
    pub back_color: u8,
    pub line_compare: u8,
    pub sprite_base: u8,
    pub sprite_first: u8,
    pub sprite_count: u8,
    pub map_base: MapBase,
    pub scr2_window: Window,
    pub sprite_window: Window,
    pub scr1_scroll: Scroll,
    pub scr2_scroll: Scroll,
    pub lcd_control: LcdControl,
    pub lcd_icons: u8,
    pub vtotal: u8,
    pub vsync: u8,
    // 1Ch-1Fh: eight 4-bit shade levels, two per byte
    pub shade_pool: [u8; 4],
    // 20h-3Fh: sixteen palettes of four 3-bit pool indices, two per byte
    pub mono_palettes: [u8; 32],
    pub timer_control: TimerControl,
}

impl DisplayRegisters {
    pub const BOOT_VTOTAL: u8 = 158;
    pub const BOOT_VSYNC: u8 = 155;

    pub fn new() -> Self {
        Self {
            control: Default::default(),
            back_color: 0,
            line_compare: 0,
            sprite_base: 0,
            sprite_first: 0,
            sprite_count: 0,
            map_base: Default::default(),
            scr2_window: Default::default(),
            sprite_window: Default::default(),
            scr1_scroll: Default::default(),
            scr2_scroll: Default::default(),
            lcd_control: LcdControl(0x01),
            lcd_icons: 0,
            vtotal: Self::BOOT_VTOTAL,
            vsync: Self::BOOT_VSYNC,
            shade_pool: [0; 4],
            mono_palettes: [0; 32],
            timer_control: Default::default(),
        }
    }

    /// Shade level (0 = lightest) of one of the eight pool entries
    pub fn shade(&self, pool_index: u8) -> u8 {
        let byte = self.shade_pool[(pool_index as usize >> 1) & 3];
        if pool_index & 1 == 0 {
            byte & 0x0F
        } else {
            byte >> 4
        }
    }

    /// Pool index a monochrome palette assigns to a 2-bit color
    pub fn mono_palette_entry(&self, palette: u8, color: u8) -> u8 {
        let index = ((palette as usize & 0x0F) << 1) | ((color as usize >> 1) & 1);
        let byte = self.mono_palettes[index];
        if color & 1 == 0 {
            byte & 0x07
        } else {
            (byte >> 4) & 0x07
        }
    }
}

impl Default for DisplayRegisters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_corners_are_sorted_for_tests() {
        let window = Window {
            x0: 100,
            y0: 80,
            x1: 20,
            y1: 10,
        };
        assert!(window.contains(20, 10));
        assert!(window.contains(100, 80));
        assert!(window.contains(50, 50));
        assert!(window.outside(19, 50));
        assert!(window.outside(50, 81));
        assert_eq!(window.get(0), 100);
    }

    #[test]
    fn map_entry_fields() {
        let entry = MapEntry(0b1110_0011_0000_0101 | 0x0100);
        assert_eq!(entry.tile(), 0x105);
        assert_eq!(entry.palette(), 0b0001);
        assert!(entry.bank() && entry.hflip() && entry.vflip());
    }

    #[test]
    fn palette_and_pool_lookup() {
        let mut regs = DisplayRegisters::new();
        regs.shade_pool = [0x10, 0x32, 0x54, 0xF6];
        regs.mono_palettes[2] = 0x75;
        regs.mono_palettes[3] = 0x21;
        assert_eq!(regs.shade(0), 0x0);
        assert_eq!(regs.shade(7), 0xF);
        assert_eq!(regs.mono_palette_entry(1, 0), 5);
        assert_eq!(regs.mono_palette_entry(1, 1), 7);
        assert_eq!(regs.mono_palette_entry(1, 2), 1);
        assert_eq!(regs.mono_palette_entry(1, 3), 2);
    }
}
