//! Blocking primitives for device completion polls.

use core::convert::Infallible;
use core::fmt;

/// A policy for waiting on a device condition.
///
/// `ready` is evaluated at least once. The wait ends as soon as it returns
/// `true`, or when the policy gives up.
pub trait Wait {
    type Error;

    fn wait_until<F: FnMut() -> bool>(&mut self, ready: F) -> Result<(), Self::Error>;
}

impl<W: Wait + ?Sized> Wait for &mut W {
    type Error = W::Error;

    fn wait_until<F: FnMut() -> bool>(&mut self, ready: F) -> Result<(), Self::Error> {
        (**self).wait_until(ready)
    }
}

/// Spin until the condition holds, for as long as it takes.
///
/// This is the production policy. There is no bound: a device that never
/// answers keeps the hart here forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spin;

impl Wait for Spin {
    type Error = Infallible;

    #[inline]
    fn wait_until<F: FnMut() -> bool>(&mut self, mut ready: F) -> Result<(), Infallible> {
        while !ready() {
            core::hint::spin_loop();
        }
        Ok(())
    }
}

/// Give up after a fixed number of unsuccessful polls.
#[derive(Debug, Clone, Copy)]
pub struct Bounded {
    max_polls: u32,
    last_polls: u32,
}

impl Bounded {
    pub const fn new(max_polls: u32) -> Self {
        Self {
            max_polls,
            last_polls: 0,
        }
    }

    pub fn max_polls(&self) -> u32 {
        self.max_polls
    }

    /// Number of predicate evaluations performed by the most recent wait.
    pub fn last_polls(&self) -> u32 {
        self.last_polls
    }
}

impl Wait for Bounded {
    type Error = PollTimeout;

    fn wait_until<F: FnMut() -> bool>(&mut self, mut ready: F) -> Result<(), PollTimeout> {
        let mut polls = 0;
        loop {
            polls += 1;
            if ready() {
                self.last_polls = polls;
                return Ok(());
            }
            if polls >= self.max_polls.max(1) {
                self.last_polls = polls;
                return Err(PollTimeout { polls });
            }
        }
    }
}

/// The device did not signal completion within the poll budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimeout {
    pub polls: u32,
}

impl fmt::Display for PollTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device did not acknowledge after {} polls", self.polls)
    }
}

impl core::error::Error for PollTimeout {}
