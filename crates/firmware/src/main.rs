//! Emits the additive sequence over the polled transmit register, forever.
//!
//! riscv-rt zeroes every general-purpose register except the stack pointer
//! before `main` runs, so a conformance harness that expects cleared
//! registers at entry sees them. Harness conventions (`gp` as the test
//! number, `pass_test`/`fail_test` as exits) are untouched: this image never
//! returns.

#![no_std]
#![no_main]

use panic_halt as _;
use riscv_rt::entry;
use rvtx_core::{layout, MmioPort, Sequence, Transmitter};

#[entry]
fn main() -> ! {
    // SAFETY: TX_REGISTER is the word the device decodes directly above the
    // RAM this image was linked into, and main is the only code touching it.
    let port = unsafe { MmioPort::new(layout::TX_REGISTER as usize) };
    let mut tx = Transmitter::new(port);

    Sequence::new().run(&mut tx)
}
