use arrayvec::ArrayVec;
use bitfield::bitfield;

pub const MAX_SPRITES: usize = 128;
/// Sprites beyond this many on one line are not drawn
pub const MAX_SPRITES_PER_LINE: usize = 32;
pub const SPRITE_SIZE: u8 = 8;

bitfield! {
  // The attribute word of a sprite table entry
  #[derive(Clone, Copy, Default, PartialEq, Eq)]
  pub struct SpriteAttributes(u16);
  impl Debug;
  pub u16, tile, _: 8, 0;
  pub u8, palette_n, _: 11, 9;
  /// Shown outside the sprite window instead of inside it
  pub outside_window, _: 12;
  /// Drawn above SCR2 regardless of the usage mask
  pub priority, _: 13;
  pub hflip, _: 14;
  pub vflip, _: 15;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sprite {
    pub attr: SpriteAttributes,
    pub y: u8,
    pub x: u8,
}

impl Sprite {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            attr: SpriteAttributes(u16::from_le_bytes([bytes[0], bytes[1]])),
            y: bytes[2],
            x: bytes[3],
        }
    }

    /// Sprites use palettes 8-15
    pub fn palette(&self) -> u8 {
        self.attr.palette_n() + 8
    }

    /// The sprite's row for screen line `line`, wrapping at 256
    pub fn row(&self, line: u8) -> Option<u8> {
        let row = line.wrapping_sub(self.y);
        (row < SPRITE_SIZE).then_some(row)
    }

    pub fn column(&self, x: u8) -> Option<u8> {
        let column = x.wrapping_sub(self.x);
        (column < SPRITE_SIZE).then_some(column)
    }
}

/// The live sprite table and the copy fetched for the next frame.
/// The copy is taken two lines before the end of active display and only
/// becomes visible once swapped in at v-blank.
#[derive(Clone, Debug, Default)]
pub struct SpriteTable {
    live: ArrayVec<Sprite, MAX_SPRITES>,
    next: ArrayVec<Sprite, MAX_SPRITES>,
    swaps: u64,
}

impl SpriteTable {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn live(&self) -> &[Sprite] {
        &self.live
    }

    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Copies `count` entries starting at entry `first` of the table at `base`.
    /// Entry indices wrap within the 128-entry table.
    pub fn latch(&mut self, vram: &[u8], base: usize, first: u8, count: u8) {
        self.next.clear();
        let count = (count as usize).min(MAX_SPRITES);
        for i in 0..count {
            let index = (first as usize + i) % MAX_SPRITES;
            let addr = base + index * 4;
            let byte = |offset: usize| vram.get(addr + offset).copied().unwrap_or(0);
            self.next
                .push(Sprite::from_bytes([byte(0), byte(1), byte(2), byte(3)]));
        }
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.live, &mut self.next);
        self.swaps += 1;
    }

    /// Live sprites touching `line`, in table order, up to the per-line limit
    pub fn line_sprites(&self, line: u8) -> ArrayVec<Sprite, MAX_SPRITES_PER_LINE> {
        self.live
            .iter()
            .filter(|sprite| sprite.row(line).is_some())
            .take(MAX_SPRITES_PER_LINE)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(sprites: &[[u8; 4]]) -> Vec<u8> {
        sprites.iter().flatten().copied().collect()
    }

    #[test]
    fn attributes_decode() {
        let sprite = Sprite::from_bytes([0x05, 0b1011_0111, 40, 200]);
        assert_eq!(sprite.attr.tile(), 0x105);
        assert_eq!(sprite.palette(), 8 + 3);
        assert!(sprite.attr.outside_window());
        assert!(sprite.attr.priority());
        assert!(!sprite.attr.hflip());
        assert!(sprite.attr.vflip());
        assert_eq!((sprite.y, sprite.x), (40, 200));
    }

    #[test]
    fn rows_wrap_around_the_top() {
        let sprite = Sprite::from_bytes([0, 0, 252, 0]);
        assert_eq!(sprite.row(252), Some(0));
        assert_eq!(sprite.row(3), Some(7));
        assert_eq!(sprite.row(4), None);
    }

    #[test]
    fn latched_table_is_invisible_until_swapped() {
        let vram = table_with(&[[1, 0, 10, 10], [2, 0, 10, 20]]);
        let mut table = SpriteTable::new();
        table.latch(&vram, 0, 0, 2);
        assert!(table.live().is_empty());
        table.swap();
        assert_eq!(table.live().len(), 2);
        assert_eq!(table.live()[1].x, 20);
        assert_eq!(table.swaps(), 1);
    }

    #[test]
    fn per_line_limit() {
        let vram: Vec<u8> = (0..MAX_SPRITES as u8)
            .flat_map(|i| [i, 0, 50, i])
            .collect();
        let mut table = SpriteTable::new();
        table.latch(&vram, 0, 0, 128);
        table.swap();
        let line = table.line_sprites(52);
        assert_eq!(line.len(), MAX_SPRITES_PER_LINE);
        assert_eq!(line[0].x, 0);
        assert_eq!(line[31].x, 31);
        assert!(table.line_sprites(60).is_empty());
    }
}
