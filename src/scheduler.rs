mod relative_clock;

pub use relative_clock::RelativeClock;

pub const CPU_FREQ: u64 = 3_072_000;
pub const DISPLAY_FREQ: u64 = CPU_FREQ;

/// Keeps the display in step with the CPU and counts CPU cycles toward the
/// end of the current frame.
#[derive(Clone, Debug)]
pub struct Scheduler {
    cpu_display_clock: RelativeClock,
    /// CPU cycles already spent that the display has not seen yet
    deferred: u64,
    frame_cycles: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            cpu_display_clock: RelativeClock::new(CPU_FREQ, DISPLAY_FREQ),
            deferred: 0,
            frame_cycles: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Accounts for `cycles` CPU cycles plus anything deferred, and returns
    /// the number of display cycles to run for them
    pub fn cpu_ran(&mut self, cycles: u32) -> u32 {
        let cycles = cycles as u64 + std::mem::take(&mut self.deferred);
        self.frame_cycles += cycles;
        self.cpu_display_clock.tick_a(cycles) as u32
    }

    /// CPU cycles spent outside an instruction (interrupt delivery); the
    /// display catches up on the next step
    pub fn defer(&mut self, cycles: u32) {
        self.deferred += cycles as u64;
    }

    pub fn frame_cycles(&self) -> u64 {
        self.frame_cycles
    }

    pub fn frame_complete(&self, cycles_per_frame: u64) -> bool {
        self.frame_cycles >= cycles_per_frame
    }

    /// Ends a frame, keeping the overshoot for the next one
    pub fn end_frame(&mut self, cycles_per_frame: u64) {
        self.frame_cycles = self.frame_cycles.saturating_sub(cycles_per_frame);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_cycles_reach_the_display_next_step() {
        let mut scheduler = Scheduler::new();
        assert_eq!(scheduler.cpu_ran(3), 3);
        scheduler.defer(32);
        assert_eq!(scheduler.cpu_ran(1), 33);
        assert_eq!(scheduler.cpu_ran(1), 1);
        assert_eq!(scheduler.frame_cycles(), 37);
    }

    #[test]
    fn overshoot_carries_into_the_next_frame() {
        let mut scheduler = Scheduler::new();
        let frame = 256 * 159;
        while !scheduler.frame_complete(frame) {
            scheduler.cpu_ran(7);
        }
        let overshoot = scheduler.frame_cycles() - frame;
        assert!(overshoot < 7);
        scheduler.end_frame(frame);
        assert_eq!(scheduler.frame_cycles(), overshoot);
    }
}
