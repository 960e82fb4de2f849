use super::{LINE_WIDTH, SCREEN_HEIGHT};

/// Tracks the position of the display scan: one cycle per pixel, 256 pixels
/// per line (224 active), and a vertical total taken from VTOTAL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanCounter {
    pub pixel: u16,
    pub line: u8,
}

impl ScanCounter {
    pub fn new() -> Self {
        Default::default()
    }

    /// Lines per frame for a VTOTAL value; never fewer than the active
    /// height plus the v-blank line
    pub fn total_lines(vtotal: u8) -> u16 {
        (vtotal as u16 + 1).max(SCREEN_HEIGHT as u16 + 1)
    }

    /// Advances by `ticks` pixels, which must not cross the end of the line
    /// more than once. Returns true if a new line has started.
    pub fn tick(&mut self, ticks: u16, total_lines: u16) -> bool {
        self.pixel += ticks;
        if self.pixel < LINE_WIDTH {
            return false;
        }
        self.pixel -= LINE_WIDTH;
        let next = self.line as u16 + 1;
        self.line = if next >= total_lines { 0 } else { next as u8 };
        true
    }
}
