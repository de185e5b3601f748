//! Additive sequence fed to the transmitter.

use crate::port::Port;
use crate::transmit::Transmitter;
use crate::wait::{Spin, Wait};

/// Any emitted term at or above this value restarts the sequence.
pub const RESET_THRESHOLD: u32 = 0xE9;

/// Seed state, `(a0, a1)`.
pub const SEED: (u32, u32) = (0, 1);

/// The last two terms of the sequence.
///
/// Each step emits `a0 + a1` and shifts the window. Once an emitted term
/// reaches [`RESET_THRESHOLD`] the window goes back to [`SEED`], so from the
/// seed the stream cycles through the twelve terms `1, 2, 3, 5, 8, 13, 21,
/// 34, 55, 89, 144, 233`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    a0: u32,
    a1: u32,
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequence {
    pub const fn new() -> Self {
        Self::from_state(SEED.0, SEED.1)
    }

    pub const fn from_state(a0: u32, a1: u32) -> Self {
        Self { a0, a1 }
    }

    pub const fn state(&self) -> (u32, u32) {
        (self.a0, self.a1)
    }

    /// Compute and return the next term.
    pub fn step(&mut self) -> u32 {
        let a2 = self.a0.wrapping_add(self.a1);
        self.a0 = self.a1;
        self.a1 = a2;
        if a2 >= RESET_THRESHOLD {
            *self = Self::new();
        }
        a2
    }

    /// Emit `steps` terms through `tx`. Returns the number of terms sent.
    ///
    /// A failed acknowledgement stops the run; the term that failed is not
    /// retried and the sequence has already advanced past it.
    pub fn drive<P: Port, W: Wait>(
        &mut self,
        tx: &mut Transmitter<P, W>,
        steps: u64,
    ) -> Result<u64, W::Error> {
        for _ in 0..steps {
            let term = self.step();
            if let Err(e) = tx.transmit(term as u8) {
                trace_event!(term, "sequence stopped");
                return Err(e);
            }
        }
        Ok(steps)
    }

    /// Emit terms through `tx` forever.
    pub fn run<P: Port>(&mut self, tx: &mut Transmitter<P, Spin>) -> ! {
        loop {
            let term = self.step();
            tx.putc(term as u8);
        }
    }
}

impl Iterator for Sequence {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        Some(self.step())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CYCLE: [u32; 12] = [1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233];

    #[test]
    fn test_first_cycle() {
        let terms: Vec<u32> = Sequence::new().take(12).collect();
        assert_eq!(terms, CYCLE);
    }

    #[test]
    fn test_stream_has_single_leading_one() {
        let terms: Vec<u32> = Sequence::new().take(14).collect();
        assert_eq!(terms, [1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233, 1, 2]);
    }

    #[test]
    fn test_restarts_after_threshold() {
        let mut seq = Sequence::new();
        for _ in 0..11 {
            seq.step();
        }
        assert_eq!(seq.state(), (89, 144));
        assert_eq!(seq.step(), 233);
        assert_eq!(seq.state(), SEED);
        assert_eq!(seq.step(), 1);
        assert_eq!(seq.step(), 2);
    }

    #[test]
    fn test_cycle_repeats() {
        let terms: Vec<u32> = Sequence::new().take(12 * 4).collect();
        for chunk in terms.chunks(12) {
            assert_eq!(chunk, CYCLE);
        }
    }

    #[test]
    fn test_reset_guard_is_inclusive_and_unbounded() {
        for (a0, a1) in [(0, 233), (100, 133), (144, 233), (1000, 5000), (u32::MAX, 0)] {
            let mut seq = Sequence::from_state(a0, a1);
            let term = seq.step();
            assert!(term >= RESET_THRESHOLD);
            assert_eq!(seq.state(), SEED, "term {term} must reset");
        }
    }

    #[test]
    fn test_below_threshold_keeps_window() {
        let mut seq = Sequence::from_state(100, 132);
        assert_eq!(seq.step(), 232);
        assert_eq!(seq.state(), (132, 232));
    }

    #[test]
    fn test_wrapping_state_does_not_panic() {
        let mut seq = Sequence::from_state(u32::MAX, 2);
        assert_eq!(seq.step(), 1);
        assert_eq!(seq.state(), (2, 1));
    }
}
