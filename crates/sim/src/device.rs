use rvtx_core::transmit::{payload, TxControl};
use rvtx_core::{MemoryLayout, Port};
use serde::Serialize;

use crate::{ProtocolViolation, SimResult, SimulationError};

/// Status byte the device reports once a frame has been taken.
pub const STATUS_DONE: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HandshakeState {
    /// No frame in flight; status holds the last acknowledgement, if any.
    Idle,
    /// Strobe seen, waiting for the data word.
    Armed { byte: u8 },
    /// Frame latched; `remaining` polls until acknowledgement, or never.
    Latched { byte: u8, remaining: Option<u32> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteRecord {
    pub word: u32,
    pub strobe: bool,
    pub byte: u8,
}

impl WriteRecord {
    fn decode(word: u32) -> Self {
        Self {
            word,
            strobe: TxControl::from_bits_truncate(word).contains(TxControl::STROBE),
            byte: payload(word),
        }
    }
}

/// Model of the memory-mapped transmit register.
///
/// A strobe arms the device and clears the status byte. The following data
/// word latches the frame. After `ack_latency` zero-status polls the device
/// reports [`STATUS_DONE`]; with no latency configured it never does.
#[derive(Debug)]
pub struct TxDevice {
    layout: MemoryLayout,
    ack_latency: Option<u32>,
    state: HandshakeState,
    status: u8,
    reads: u64,
    writes: Vec<WriteRecord>,
    output: Vec<u8>,
    violations: Vec<ProtocolViolation>,
}

impl TxDevice {
    pub fn new(layout: MemoryLayout, ack_latency: Option<u32>) -> Self {
        Self {
            layout,
            ack_latency,
            state: HandshakeState::Idle,
            status: 0,
            reads: 0,
            writes: Vec::new(),
            output: Vec::new(),
            violations: Vec::new(),
        }
    }

    /// A device at the default layout that acknowledges on the first poll.
    pub fn immediate() -> Self {
        Self::new(MemoryLayout::default(), Some(0))
    }

    /// A device that never acknowledges.
    pub fn silent(layout: MemoryLayout) -> Self {
        Self::new(layout, None)
    }

    pub fn layout(&self) -> MemoryLayout {
        self.layout
    }

    /// Bind a port to `addr`, as firmware would bind to its fixed address.
    pub fn map(&mut self, addr: u32) -> SimResult<DevicePort<'_>> {
        if addr != self.layout.tx_register() {
            return Err(SimulationError::Unmapped(addr));
        }
        Ok(DevicePort { device: self })
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }

    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    /// Bytes latched by completed handshakes, in order.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn violations(&self) -> &[ProtocolViolation] {
        &self.violations
    }

    /// First protocol violation seen, if any.
    pub fn check(&self) -> Result<(), ProtocolViolation> {
        match self.violations.first() {
            Some(v) => Err(v.clone()),
            None => Ok(()),
        }
    }

    fn violation(&mut self, v: ProtocolViolation) {
        tracing::warn!("{}", v);
        self.violations.push(v);
    }

    pub fn write_word(&mut self, word: u32) {
        let record = WriteRecord::decode(word);
        tracing::trace!(word, strobe = record.strobe, "tx register write");
        self.writes.push(record);

        if record.strobe {
            if let HandshakeState::Latched { byte: pending, .. } = self.state {
                self.violation(ProtocolViolation::StrobeWhilePending {
                    byte: record.byte,
                    pending,
                });
            }
            self.status = 0;
            self.state = HandshakeState::Armed { byte: record.byte };
            return;
        }

        match self.state {
            HandshakeState::Armed { byte } => {
                if byte != record.byte {
                    self.violation(ProtocolViolation::ByteMismatch {
                        strobe: byte,
                        data: record.byte,
                    });
                }
                tracing::debug!(byte = record.byte, "frame latched");
                self.output.push(record.byte);
                self.state = HandshakeState::Latched {
                    byte: record.byte,
                    remaining: self.ack_latency,
                };
            }
            _ => self.violation(ProtocolViolation::DataWithoutStrobe { word }),
        }
    }

    pub fn read_status(&mut self) -> u8 {
        self.reads += 1;
        if let HandshakeState::Latched { byte, remaining } = self.state {
            match remaining {
                Some(0) => {
                    tracing::trace!(byte, "frame acknowledged");
                    self.status = STATUS_DONE;
                    self.state = HandshakeState::Idle;
                }
                Some(n) => {
                    self.state = HandshakeState::Latched {
                        byte,
                        remaining: Some(n - 1),
                    }
                }
                None => {}
            }
        }
        self.status
    }
}

impl Port for TxDevice {
    fn write32(&mut self, value: u32) {
        self.write_word(value)
    }

    fn read8(&mut self) -> u8 {
        self.read_status()
    }
}

/// A [`Port`] bound to the device's transmit register address.
#[derive(Debug)]
pub struct DevicePort<'a> {
    device: &'a mut TxDevice,
}

impl DevicePort<'_> {
    pub fn device(&self) -> &TxDevice {
        self.device
    }
}

impl Port for DevicePort<'_> {
    fn write32(&mut self, value: u32) {
        self.device.write_word(value)
    }

    fn read8(&mut self) -> u8 {
        self.device.read_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvtx_core::transmit::{data_word, strobe_word};
    use rvtx_core::{Bounded, PollTimeout, Transmitter};

    fn layout() -> MemoryLayout {
        MemoryLayout::new(0x2000).unwrap()
    }

    #[test]
    fn test_handshake_latches_byte() {
        let mut dev = TxDevice::new(layout(), Some(2));
        dev.write_word(strobe_word(b'Z'));
        assert_eq!(dev.state(), HandshakeState::Armed { byte: b'Z' });
        dev.write_word(data_word(b'Z'));
        assert_eq!(dev.output(), b"Z");

        assert_eq!(dev.read_status(), 0);
        assert_eq!(dev.read_status(), 0);
        assert_eq!(dev.read_status(), STATUS_DONE);
        assert_eq!(dev.state(), HandshakeState::Idle);
        assert!(dev.check().is_ok());
    }

    #[test]
    fn test_status_stays_done_until_next_strobe() {
        let mut dev = TxDevice::new(layout(), Some(0));
        dev.write_word(strobe_word(1));
        dev.write_word(data_word(1));
        assert_eq!(dev.read_status(), STATUS_DONE);
        assert_eq!(dev.read_status(), STATUS_DONE);

        dev.write_word(strobe_word(2));
        assert_eq!(dev.read_status(), 0);
    }

    #[test]
    fn test_data_without_strobe_is_flagged() {
        let mut dev = TxDevice::new(layout(), Some(0));
        dev.write_word(data_word(9));
        assert!(dev.output().is_empty());
        assert_eq!(
            dev.check(),
            Err(ProtocolViolation::DataWithoutStrobe { word: 0x0900 })
        );
    }

    #[test]
    fn test_byte_mismatch_is_flagged() {
        let mut dev = TxDevice::new(layout(), Some(0));
        dev.write_word(strobe_word(1));
        dev.write_word(data_word(2));
        assert_eq!(
            dev.violations(),
            &[ProtocolViolation::ByteMismatch { strobe: 1, data: 2 }]
        );
        // The data phase wins.
        assert_eq!(dev.output(), &[2]);
    }

    #[test]
    fn test_strobe_while_pending_is_flagged() {
        let mut dev = TxDevice::new(layout(), Some(5));
        dev.write_word(strobe_word(1));
        dev.write_word(data_word(1));
        dev.write_word(strobe_word(2));
        assert_eq!(
            dev.check(),
            Err(ProtocolViolation::StrobeWhilePending { byte: 2, pending: 1 })
        );
    }

    #[test]
    fn test_map_only_at_tx_register() {
        let mut dev = TxDevice::new(layout(), Some(0));
        assert!(dev.map(0x2004).is_ok());
        assert_eq!(dev.map(0x2000).unwrap_err(), SimulationError::Unmapped(0x2000));
        assert_eq!(dev.map(0x0804).unwrap_err(), SimulationError::Unmapped(0x0804));
    }

    #[test]
    fn test_transmitter_against_device() {
        let mut dev = TxDevice::new(layout(), Some(3));
        {
            let port = dev.map(layout().tx_register()).unwrap();
            let mut tx = Transmitter::new(port);
            tx.putc(0x00);
            tx.putc(0xFF);
        }
        assert_eq!(dev.output(), &[0x00, 0xFF]);
        assert_eq!(dev.reads(), 8);
        let strobes: Vec<bool> = dev.writes().iter().map(|w| w.strobe).collect();
        assert_eq!(strobes, vec![true, false, true, false]);
        assert!(dev.check().is_ok());
    }

    #[test]
    fn test_device_visible_through_bound_port() {
        let mut dev = TxDevice::new(layout(), Some(1));
        let mut tx = Transmitter::new(dev.map(0x2004).unwrap());
        tx.putc(b'q');

        let seen = tx.port().device();
        assert_eq!(seen.output(), b"q");
        assert_eq!(seen.reads(), 2);
        assert_eq!(seen.state(), HandshakeState::Idle);
        assert_eq!(seen.layout().tx_register(), 0x2004);
    }

    #[test]
    fn test_silent_device_times_out() {
        let mut dev = TxDevice::silent(layout());
        let mut tx = Transmitter::with_wait(&mut dev, Bounded::new(100));
        assert_eq!(tx.transmit(b'a'), Err(PollTimeout { polls: 100 }));
        assert_eq!(dev.output(), b"a");
        assert_eq!(dev.reads(), 100);
    }
}
