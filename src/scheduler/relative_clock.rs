/// Converts ticks of clock A into ticks of clock B.
/// Both frequencies are reduced by their gcd; the part of a B tick that has
/// not completed yet is carried in `counter` so nothing is lost between calls.
/// https://near.sh/articles/design/schedulers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelativeClock {
    counter: u64,
    scalar_a: u64,
    scalar_b: u64,
}

impl RelativeClock {
    pub fn new(frequency_a: u64, frequency_b: u64) -> Self {
        assert!(frequency_a > 0 && frequency_b > 0, "clock frequencies must be nonzero");
        let factor = gcd::binary_u64(frequency_a, frequency_b);
        Self {
            counter: 0,
            scalar_a: frequency_a / factor,
            scalar_b: frequency_b / factor,
        }
    }

    /// Advances clock A by `n_ticks` and returns how many whole B ticks elapsed.
    /// Note that each A tick moves the counter in proportion to B's frequency.
    pub fn tick_a(&mut self, n_ticks: u64) -> u64 {
        self.counter += n_ticks * self.scalar_b;
        let ticks_b = self.counter / self.scalar_a;
        self.counter %= self.scalar_a;
        ticks_b
    }

    /// The fraction of a B tick carried over, in units of 1/scalar_a
    pub fn remainder(&self) -> u64 {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_frequencies_pass_through() {
        let mut clock = RelativeClock::new(3_072_000, 3_072_000);
        assert_eq!(clock.tick_a(7), 7);
        assert_eq!(clock.remainder(), 0);
    }

    #[test]
    fn remainder_is_carried() {
        // B runs at two thirds of A
        let mut clock = RelativeClock::new(3_000, 2_000);
        assert_eq!(clock.tick_a(1), 0);
        assert_eq!(clock.tick_a(1), 1);
        assert_eq!(clock.tick_a(1), 1);
        assert_eq!(clock.remainder(), 0);
        let total: u64 = (0..300).map(|_| clock.tick_a(1)).sum();
        assert_eq!(total, 200);
    }
}
