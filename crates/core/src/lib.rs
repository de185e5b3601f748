//! Polled transmit driver and additive sequence generator for a bare-metal
//! RISC-V image.
//!
//! The crate is `no_std`. Everything that touches hardware goes through the
//! [`Port`] capability, so the same [`Transmitter`] runs against the real
//! register in the firmware and against a device model on the host.

#![cfg_attr(not(test), no_std)]

/// Trace a driver event when the `tracing` feature is on; compiles to nothing
/// otherwise.
macro_rules! trace_event {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        tracing::trace!($($arg)*);
    };
}

pub mod layout;
pub mod port;
pub mod sequence;
pub mod transmit;
pub mod wait;

pub use layout::{LayoutError, MemoryLayout};
pub use port::{MmioPort, Port};
pub use sequence::Sequence;
pub use transmit::{TxControl, Transmitter};
pub use wait::{Bounded, PollTimeout, Spin, Wait};
