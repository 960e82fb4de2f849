/// One of the two display-clocked down counters (h-blank and v-blank)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timer {
    pub enable: bool,
    pub repeat: bool,
    frequency: u16,
    counter: u16,
}

impl Timer {
    pub fn frequency(&self) -> u16 {
        self.frequency
    }

    pub fn counter(&self) -> u16 {
        self.counter
    }

    /// Writing either frequency byte also reloads the counter
    pub fn set_frequency_lo(&mut self, data: u8) {
        self.frequency = (self.frequency & 0xFF00) | data as u16;
        self.counter = self.frequency;
    }

    pub fn set_frequency_hi(&mut self, data: u8) {
        self.frequency = (self.frequency & 0x00FF) | ((data as u16) << 8);
        self.counter = self.frequency;
    }

    /// Advances by one period; returns true when the counter expires
    pub fn tick(&mut self) -> bool {
        if !self.enable || self.counter == 0 {
            return false;
        }
        self.counter -= 1;
        if self.counter != 0 {
            return false;
        }
        if self.repeat {
            self.counter = self.frequency;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(frequency: u16, repeat: bool) -> Timer {
        let mut timer = Timer {
            enable: true,
            repeat,
            ..Default::default()
        };
        timer.set_frequency_lo(frequency as u8);
        timer.set_frequency_hi((frequency >> 8) as u8);
        timer
    }

    #[test]
    fn one_shot_fires_once() {
        let mut timer = timer(3, false);
        let fired: Vec<bool> = (0..6).map(|_| timer.tick()).collect();
        assert_eq!(fired, [false, false, true, false, false, false]);
        assert_eq!(timer.counter(), 0);
    }

    #[test]
    fn repeating_timer_reloads() {
        let mut timer = timer(2, true);
        let fired: Vec<bool> = (0..6).map(|_| timer.tick()).collect();
        assert_eq!(fired, [false, true, false, true, false, true]);
    }

    #[test]
    fn disabled_timer_holds() {
        let mut timer = timer(1, true);
        timer.enable = false;
        assert!(!timer.tick());
        assert_eq!(timer.counter(), 1);
    }
}
