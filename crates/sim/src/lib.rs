pub mod device;

pub use device::{DevicePort, HandshakeState, TxDevice, WriteRecord};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("no device register at {0:#x}")]
    Unmapped(u32),
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// A write sequence the transmit register does not accept.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProtocolViolation {
    #[error("data word {word:#06x} without a preceding strobe")]
    DataWithoutStrobe { word: u32 },
    #[error("strobe carried {strobe:#04x} but data carried {data:#04x}")]
    ByteMismatch { strobe: u8, data: u8 },
    #[error("strobe for {byte:#04x} while frame {pending:#04x} awaits acknowledgement")]
    StrobeWhilePending { byte: u8, pending: u8 },
}
