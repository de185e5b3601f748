//! Two-phase transmit protocol.
//!
//! A byte goes out as two 32-bit writes to the transmit register, both with
//! the byte in bits 15:8:
//!
//! 1. strobe: bit 0 set, announcing a new byte;
//! 2. data: bit 0 clear, the frame the device latches.
//!
//! The driver then polls the register's low byte until the device reports a
//! non-zero status.

use core::fmt;

use bitflags::bitflags;

use crate::port::Port;
use crate::wait::{Spin, Wait};

bitflags! {
    /// Control bits in the low byte of a transmit word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxControl: u32 {
        const STROBE = 0x01;
    }
}

/// Bit position of the payload byte in a transmit word.
pub const DATA_SHIFT: u32 = 8;

/// First-phase word for `byte`.
#[inline]
pub const fn strobe_word(byte: u8) -> u32 {
    ((byte as u32) << DATA_SHIFT) | TxControl::STROBE.bits()
}

/// Second-phase word for `byte`.
#[inline]
pub const fn data_word(byte: u8) -> u32 {
    (byte as u32) << DATA_SHIFT
}

/// Payload byte carried by a transmit word.
#[inline]
pub const fn payload(word: u32) -> u8 {
    (word >> DATA_SHIFT) as u8
}

/// Sends bytes through a [`Port`], waiting on each with a [`Wait`] policy.
#[derive(Debug)]
pub struct Transmitter<P, W = Spin> {
    port: P,
    wait: W,
}

impl<P: Port> Transmitter<P, Spin> {
    pub const fn new(port: P) -> Self {
        Self { port, wait: Spin }
    }

    /// Send one byte, spinning until the device takes it.
    pub fn putc(&mut self, byte: u8) {
        match self.transmit(byte) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }
}

impl<P: Port, W: Wait> Transmitter<P, W> {
    pub const fn with_wait(port: P, wait: W) -> Self {
        Self { port, wait }
    }

    /// Deliver `byte` and block until the device acknowledges it.
    pub fn transmit(&mut self, byte: u8) -> Result<(), W::Error> {
        trace_event!(byte, "tx strobe");
        self.port.write32(strobe_word(byte));
        self.port.write32(data_word(byte));

        let port = &mut self.port;
        self.wait.wait_until(|| port.read8() != 0)?;
        trace_event!(byte, "tx acknowledged");
        Ok(())
    }

    /// Send every byte in order, stopping at the first failed acknowledgement.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), W::Error> {
        for &byte in bytes {
            self.transmit(byte)?;
        }
        Ok(())
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn wait(&self) -> &W {
        &self.wait
    }

    pub fn into_inner(self) -> (P, W) {
        (self.port, self.wait)
    }
}

impl<P: Port, W: Wait> fmt::Write for Transmitter<P, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_encoding() {
        assert_eq!(strobe_word(b'A'), 0x4101);
        assert_eq!(data_word(b'A'), 0x4100);
        assert_eq!(strobe_word(0x00), 0x0001);
        assert_eq!(data_word(0x00), 0x0000);
        assert_eq!(strobe_word(0xFF), 0xFF01);
        assert_eq!(data_word(0xFF), 0xFF00);
    }

    #[test]
    fn test_payload_extraction() {
        for byte in 0..=u8::MAX {
            assert_eq!(payload(strobe_word(byte)), byte);
            assert_eq!(payload(data_word(byte)), byte);
            assert!(TxControl::from_bits_truncate(strobe_word(byte)).contains(TxControl::STROBE));
            assert!(TxControl::from_bits_truncate(data_word(byte)).is_empty());
        }
    }
}
