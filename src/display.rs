//! The scanline-driven display controller.
//!
//! `DisplayController` owns the shared state (registers, scan counter,
//! timers, sprite table, usage mask, framebuffer) and delegates tile and
//! color decoding to a `DisplayVariant`: `Aswan` for the monochrome system,
//! `Sphinx` for the color one.

pub mod aswan;
pub mod counter;
pub mod registers;
pub mod sphinx;
pub mod sprite;
pub mod timer;

pub use aswan::Aswan;
pub use counter::ScanCounter;
pub use registers::{DisplayRegisters, MapEntry, Window};
pub use sphinx::Sphinx;
pub use sprite::{Sprite, SpriteTable};
pub use timer::Timer;

use crate::bus::OPEN_BUS;
use crate::interrupt::InterruptBits;

pub const SCREEN_WIDTH: usize = 224;
pub const SCREEN_HEIGHT: usize = 144;
/// Pixels (display cycles) per line, including horizontal blanking
pub const LINE_WIDTH: u16 = 256;
/// The line at which the next frame's sprite table is fetched
pub const SPRITE_FETCH_LINE: u8 = SCREEN_HEIGHT as u8 - 2;
/// The line at which v-blank begins and the frame is published
pub const VBLANK_LINE: u8 = SCREEN_HEIGHT as u8;

pub type Rgb = [u8; 3];
pub type Frame = [[Rgb; SCREEN_WIDTH]; SCREEN_HEIGHT];

// Screen usage mask bits
pub const USAGE_SCR1: u8 = 1 << 0;
pub const USAGE_SCR2: u8 = 1 << 1;
pub const USAGE_SPRITE: u8 = 1 << 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    Scr1,
    Scr2,
}

/// How a layer's visibility depends on a window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowTest {
    Inside(Window),
    Outside(Window),
}

impl WindowTest {
    fn visible(&self, x: u8, y: u8) -> bool {
        match self {
            WindowTest::Inside(window) => window.contains(x, y),
            WindowTest::Outside(window) => window.outside(x, y),
        }
    }
}

/// A 4-bit-per-channel color expanded to 8 bits
pub fn rgb12(color: u16) -> Rgb {
    let channel = |shift: u16| ((color >> shift) & 0x0F) as u8 * 17;
    [channel(8), channel(4), channel(0)]
}

/// A monochrome shade (0 lightest, 15 darkest) as a gray
pub fn gray(shade: u8) -> Rgb {
    let intensity = (15 - (shade & 0x0F)) * 17;
    [intensity; 3]
}

fn vram_byte(vram: &[u8], addr: usize) -> u8 {
    vram.get(addr).copied().unwrap_or(0)
}

pub(crate) fn vram_word(vram: &[u8], addr: usize) -> u16 {
    u16::from_le_bytes([vram_byte(vram, addr), vram_byte(vram, addr + 1)])
}

/// State shared by both display variants
pub struct DisplayState {
    pub regs: DisplayRegisters,
    pub counter: ScanCounter,
    pub hblank_timer: Timer,
    pub vblank_timer: Timer,
    pub sprites: SpriteTable,
    /// Which layers have drawn each pixel this frame
    pub usage: Vec<u8>,
}

impl DisplayState {
    pub fn new() -> Self {
        Self {
            regs: DisplayRegisters::new(),
            counter: ScanCounter::new(),
            hblank_timer: Timer::default(),
            vblank_timer: Timer::default(),
            sprites: SpriteTable::new(),
            usage: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
        }
    }

    pub fn total_lines(&self) -> u16 {
        ScanCounter::total_lines(self.regs.vtotal)
    }

    /// Monochrome palette lookup through the shade pool
    pub fn mono_color(&self, palette: u8, color: u8) -> Rgb {
        gray(self.regs.shade(self.regs.mono_palette_entry(palette, color)))
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::new()
    }
}

/// Tile and color decoding for one display generation. The render steps are
/// provided here and shared; implementors describe tile storage and palettes.
pub trait DisplayVariant {
    fn name(&self) -> &'static str;

    fn reset(&mut self) {}

    /// Variant-only registers; `None` if `port` is not one of them
    fn read_register(&self, _port: u16) -> Option<u8> {
        None
    }

    /// Returns false if `port` is not a variant-only register
    fn write_register(&mut self, _port: u16, _data: u8) -> bool {
        false
    }

    /// Whether tiles currently hold 4 bits per pixel
    fn four_bpp(&self) -> bool {
        false
    }

    fn sprite_table_address(&self, regs: &DisplayRegisters) -> usize;

    fn map_address(&self, regs: &DisplayRegisters, layer: Layer) -> usize;

    fn resolve_tile_number(&self, entry: MapEntry) -> u16;

    /// The color index of pixel (`x`, `y`) within `tile`
    fn tile_pixel(&self, vram: &[u8], tile: u16, x: u8, y: u8) -> u8;

    fn resolve_pixel_color(
        &self,
        state: &DisplayState,
        vram: &[u8],
        palette: u8,
        color: u8,
    ) -> Rgb;

    fn back_color(&self, state: &DisplayState, vram: &[u8]) -> Rgb;

    /// Index 0 is transparent, except in 2bpp modes for palettes 0-3 and 8-11
    fn is_color_opaque(&self, palette: u8, color: u8) -> bool {
        color != 0 || (!self.four_bpp() && palette & 0x04 == 0)
    }

    fn render_back_color(&self, state: &DisplayState, vram: &[u8], pixels: &mut [Rgb]) {
        pixels.fill(self.back_color(state, vram));
    }

    fn render_layer1(
        &self,
        state: &DisplayState,
        vram: &[u8],
        y: u8,
        pixels: &mut [Rgb],
        usage: &mut [u8],
    ) {
        if state.regs.control.scr1_enable() {
            self.render_layer(state, vram, Layer::Scr1, y, pixels, usage, None);
        }
    }

    fn render_layer2(
        &self,
        state: &DisplayState,
        vram: &[u8],
        y: u8,
        pixels: &mut [Rgb],
        usage: &mut [u8],
    ) {
        let control = state.regs.control;
        if !control.scr2_enable() {
            return;
        }
        let window = control.scr2_window_enable().then(|| {
            if control.scr2_window_outside() {
                WindowTest::Outside(state.regs.scr2_window)
            } else {
                WindowTest::Inside(state.regs.scr2_window)
            }
        });
        self.render_layer(state, vram, Layer::Scr2, y, pixels, usage, window);
    }

    #[allow(clippy::too_many_arguments)]
    fn render_layer(
        &self,
        state: &DisplayState,
        vram: &[u8],
        layer: Layer,
        y: u8,
        pixels: &mut [Rgb],
        usage: &mut [u8],
        window: Option<WindowTest>,
    ) {
        let (scroll, usage_bit) = match layer {
            Layer::Scr1 => (state.regs.scr1_scroll, USAGE_SCR1),
            Layer::Scr2 => (state.regs.scr2_scroll, USAGE_SCR2),
        };
        let map = self.map_address(&state.regs, layer);
        let map_y = y.wrapping_add(scroll.y);

        for (x, (pixel, used)) in pixels.iter_mut().zip(usage.iter_mut()).enumerate() {
            let x = x as u8;
            if window.map_or(false, |test| !test.visible(x, y)) {
                continue;
            }
            let map_x = x.wrapping_add(scroll.x);
            let cell = (map_y as usize / 8) * 32 + map_x as usize / 8;
            let entry = MapEntry(vram_word(vram, map + cell * 2));

            let mut column = map_x % 8;
            let mut row = map_y % 8;
            if entry.hflip() {
                column = 7 - column;
            }
            if entry.vflip() {
                row = 7 - row;
            }
            let color = self.tile_pixel(vram, self.resolve_tile_number(entry), column, row);
            let palette = entry.palette();
            if self.is_color_opaque(palette, color) {
                *pixel = self.resolve_pixel_color(state, vram, palette, color);
                *used |= usage_bit;
            }
        }
    }

    /// Per pixel, the lowest-indexed opaque sprite on the line wins; it is
    /// then hidden behind SCR2 unless its priority bit is set
    fn render_sprites(
        &self,
        state: &DisplayState,
        vram: &[u8],
        y: u8,
        pixels: &mut [Rgb],
        usage: &mut [u8],
    ) {
        let control = state.regs.control;
        if !control.sprite_enable() {
            return;
        }
        let sprites = state.sprites.line_sprites(y);
        if sprites.is_empty() {
            return;
        }

        for (x, (pixel, used)) in pixels.iter_mut().zip(usage.iter_mut()).enumerate() {
            let x = x as u8;
            let inside_window = state.regs.sprite_window.contains(x, y);
            for sprite in &sprites {
                let Some(mut column) = sprite.column(x) else {
                    continue;
                };
                let Some(mut row) = sprite.row(y) else {
                    continue;
                };
                if control.sprite_window_enable() && inside_window == sprite.attr.outside_window() {
                    continue;
                }
                if sprite.attr.hflip() {
                    column = 7 - column;
                }
                if sprite.attr.vflip() {
                    row = 7 - row;
                }
                let color = self.tile_pixel(vram, sprite.attr.tile(), column, row);
                let palette = sprite.palette();
                if !self.is_color_opaque(palette, color) {
                    continue;
                }
                if sprite.attr.priority() || *used & USAGE_SCR2 == 0 {
                    *pixel = self.resolve_pixel_color(state, vram, palette, color);
                    *used |= USAGE_SPRITE;
                }
                break;
            }
        }
    }
}

/// The display controller shared by both systems
pub struct DisplayController {
    state: DisplayState,
    variant: Box<dyn DisplayVariant>,
    frame: Box<Frame>,
    on_frame: Option<Box<dyn FnMut(&Frame)>>,
    frames_published: u64,
}

impl DisplayController {
    pub fn new(variant: Box<dyn DisplayVariant>) -> Self {
        log::debug!("Display controller: {}", variant.name());
        Self {
            state: DisplayState::new(),
            variant,
            frame: Box::new([[[0; 3]; SCREEN_WIDTH]; SCREEN_HEIGHT]),
            on_frame: None,
            frames_published: 0,
        }
    }

    pub fn reset(&mut self) {
        self.state = DisplayState::new();
        self.variant.reset();
        for row in self.frame.iter_mut() {
            row.fill([0; 3]);
        }
        self.frames_published = 0;
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn variant(&self) -> &dyn DisplayVariant {
        self.variant.as_ref()
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn frames_published(&self) -> u64 {
        self.frames_published
    }

    pub fn sprite_swaps(&self) -> u64 {
        self.state.sprites.swaps()
    }

    /// Display cycles in one frame at the current vertical total
    pub fn cycles_per_frame(&self) -> u64 {
        LINE_WIDTH as u64 * self.state.total_lines() as u64
    }

    pub fn set_frame_callback(&mut self, callback: Option<Box<dyn FnMut(&Frame)>>) {
        self.on_frame = callback;
    }

    /// Advances the scan by `cycles` display cycles, reading tiles, maps,
    /// palettes and the sprite table from `vram`. Returns the interrupts
    /// asserted along the way.
    pub fn step(&mut self, cycles: u32, vram: &[u8]) -> InterruptBits {
        let mut bits = InterruptBits::default();
        let mut remaining = cycles;
        while remaining > 0 {
            let pixel = self.state.counter.pixel;
            match pixel {
                0 => self.start_line(vram, &mut bits),
                p if p == SCREEN_WIDTH as u16 => self.end_active_display(vram, &mut bits),
                _ => {}
            }
            let next_event = if pixel < SCREEN_WIDTH as u16 {
                SCREEN_WIDTH as u16
            } else {
                LINE_WIDTH
            };
            let run = (next_event - pixel).min(remaining.min(LINE_WIDTH as u32) as u16);
            let total_lines = self.state.total_lines();
            self.state.counter.tick(run, total_lines);
            remaining -= run as u32;
        }
        bits
    }

    fn start_line(&mut self, vram: &[u8], bits: &mut InterruptBits) {
        let line = self.state.counter.line;
        if line == 0 {
            self.state.usage.fill(0);
        }
        if line == self.state.regs.line_compare {
            bits.set_line_compare(true);
        }
        if line == SPRITE_FETCH_LINE {
            let regs = &self.state.regs;
            let base = self.variant.sprite_table_address(regs);
            let (first, count) = (regs.sprite_first, regs.sprite_count);
            self.state.sprites.latch(vram, base, first, count);
        }
        if line == VBLANK_LINE {
            bits.set_vblank(true);
            if self.state.vblank_timer.tick() {
                bits.set_vblank_timer(true);
            }
            self.publish_frame();
            self.state.sprites.swap();
        }
    }

    fn end_active_display(&mut self, vram: &[u8], bits: &mut InterruptBits) {
        let line = self.state.counter.line;
        if (line as usize) < SCREEN_HEIGHT {
            self.render_line(line, vram);
        }
        if self.state.hblank_timer.tick() {
            bits.set_hblank_timer(true);
        }
    }

    fn render_line(&mut self, y: u8, vram: &[u8]) {
        let row: &mut [Rgb] = &mut self.frame[y as usize];
        if !self.state.regs.lcd_control.active() {
            row.fill([0; 3]);
            return;
        }

        let start = y as usize * SCREEN_WIDTH;
        let mut usage = [0u8; SCREEN_WIDTH];
        usage.copy_from_slice(&self.state.usage[start..start + SCREEN_WIDTH]);

        let state = &self.state;
        let variant = self.variant.as_ref();
        variant.render_back_color(state, vram, row);
        variant.render_layer1(state, vram, y, row, &mut usage);
        variant.render_layer2(state, vram, y, row, &mut usage);
        variant.render_sprites(state, vram, y, row, &mut usage);

        self.state.usage[start..start + SCREEN_WIDTH].copy_from_slice(&usage);
    }

    fn publish_frame(&mut self) {
        self.frames_published += 1;
        if let Some(callback) = self.on_frame.as_mut() {
            callback(&*self.frame);
        }
    }

    pub fn read_register(&self, port: u16) -> u8 {
        let regs = &self.state.regs;
        match port {
            0x00 => regs.control.0,
            0x01 => regs.back_color,
            0x02 => self.state.counter.line,
            0x03 => regs.line_compare,
            0x04 => regs.sprite_base,
            0x05 => regs.sprite_first,
            0x06 => regs.sprite_count,
            0x07 => regs.map_base.0,
            0x08..=0x0B => regs.scr2_window.get(port - 0x08),
            0x0C..=0x0F => regs.sprite_window.get(port - 0x0C),
            0x10 => regs.scr1_scroll.x,
            0x11 => regs.scr1_scroll.y,
            0x12 => regs.scr2_scroll.x,
            0x13 => regs.scr2_scroll.y,
            0x14 => regs.lcd_control.0,
            0x15 => regs.lcd_icons,
            0x16 => regs.vtotal,
            0x17 => regs.vsync,
            0x1C..=0x1F => regs.shade_pool[(port - 0x1C) as usize],
            0x20..=0x3F => regs.mono_palettes[(port - 0x20) as usize],
            0xA2 => regs.timer_control.0,
            0xA4 => self.state.hblank_timer.frequency() as u8,
            0xA5 => (self.state.hblank_timer.frequency() >> 8) as u8,
            0xA6 => self.state.vblank_timer.frequency() as u8,
            0xA7 => (self.state.vblank_timer.frequency() >> 8) as u8,
            0xA8 => self.state.hblank_timer.counter() as u8,
            0xA9 => (self.state.hblank_timer.counter() >> 8) as u8,
            0xAA => self.state.vblank_timer.counter() as u8,
            0xAB => (self.state.vblank_timer.counter() >> 8) as u8,
            _ => self.variant.read_register(port).unwrap_or(OPEN_BUS),
        }
    }

    pub fn write_register(&mut self, port: u16, data: u8) {
        let state = &mut self.state;
        let regs = &mut state.regs;
        match port {
            0x00 => regs.control.0 = data,
            0x01 => regs.back_color = data,
            0x03 => regs.line_compare = data,
            0x04 => regs.sprite_base = data,
            0x05 => regs.sprite_first = data & 0x7F,
            0x06 => regs.sprite_count = data,
            0x07 => regs.map_base.0 = data,
            0x08..=0x0B => regs.scr2_window.set(port - 0x08, data),
            0x0C..=0x0F => regs.sprite_window.set(port - 0x0C, data),
            0x10 => regs.scr1_scroll.x = data,
            0x11 => regs.scr1_scroll.y = data,
            0x12 => regs.scr2_scroll.x = data,
            0x13 => regs.scr2_scroll.y = data,
            0x14 => regs.lcd_control.0 = data,
            0x15 => regs.lcd_icons = data,
            0x16 => regs.vtotal = data,
            0x17 => regs.vsync = data,
            0x1C..=0x1F => regs.shade_pool[(port - 0x1C) as usize] = data,
            0x20..=0x3F => regs.mono_palettes[(port - 0x20) as usize] = data & 0x77,
            0xA2 => {
                regs.timer_control.0 = data;
                let control = regs.timer_control;
                state.hblank_timer.enable = control.hblank_enable();
                state.hblank_timer.repeat = control.hblank_repeat();
                state.vblank_timer.enable = control.vblank_enable();
                state.vblank_timer.repeat = control.vblank_repeat();
            }
            0xA4 => state.hblank_timer.set_frequency_lo(data),
            0xA5 => state.hblank_timer.set_frequency_hi(data),
            0xA6 => state.vblank_timer.set_frequency_lo(data),
            0xA7 => state.vblank_timer.set_frequency_hi(data),
            _ => {
                if !self.variant.write_register(port, data) {
                    log::trace!("Ignored display register write {port:#04X}: {data:02X}");
                }
            }
        }
    }

    /// Whether `port` is decoded by this controller
    pub fn claims_port(&self, port: u16) -> bool {
        matches!(port, 0x00..=0x17 | 0x1C..=0x3F | 0xA2 | 0xA4..=0xAB)
            || self.variant.read_register(port).is_some()
    }
}
