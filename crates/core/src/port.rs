/// Access to the transmit register.
///
/// The driver only ever needs two operations: a full-word write and a
/// low-byte read of the same cell. Every call must reach the device; an
/// implementation may not cache or merge accesses.
pub trait Port {
    fn write32(&mut self, value: u32);
    fn read8(&mut self) -> u8;
}

impl<P: Port + ?Sized> Port for &mut P {
    fn write32(&mut self, value: u32) {
        (**self).write32(value)
    }

    fn read8(&mut self) -> u8 {
        (**self).read8()
    }
}

/// A [`Port`] bound to a fixed physical address.
#[derive(Debug)]
pub struct MmioPort {
    reg: *mut u32,
}

impl MmioPort {
    /// # Safety
    ///
    /// `addr` must be the 4-byte aligned address of a device register that is
    /// valid for volatile 32-bit writes and 8-bit reads for as long as the
    /// returned port lives, and nothing else may access it concurrently.
    pub const unsafe fn new(addr: usize) -> Self {
        Self {
            reg: addr as *mut u32,
        }
    }

    pub fn addr(&self) -> usize {
        self.reg as usize
    }
}

impl Port for MmioPort {
    #[inline]
    fn write32(&mut self, value: u32) {
        // SAFETY: validity of `reg` is the constructor's contract.
        unsafe { core::ptr::write_volatile(self.reg, value) }
    }

    #[inline]
    fn read8(&mut self) -> u8 {
        // Little-endian target: the low byte of the word sits at the word's
        // own address.
        // SAFETY: see `write32`.
        unsafe { core::ptr::read_volatile(self.reg as *const u8) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mmio_port_roundtrip_on_ram_cell() {
        let mut cell: u32 = 0;
        let mut port = unsafe { MmioPort::new(&mut cell as *mut u32 as usize) };

        port.write32(0x0000_4101);
        assert_eq!(port.read8(), 0x01);

        port.write32(0x0000_4100);
        assert_eq!(port.read8(), 0x00);
        assert_eq!(cell, 0x0000_4100);
    }

    #[test]
    fn test_mut_ref_is_a_port() {
        let mut cell: u32 = 0;
        let mut port = unsafe { MmioPort::new(&mut cell as *mut u32 as usize) };
        fn send<P: Port>(mut port: P) {
            port.write32(0xFF);
        }
        send(&mut port);
        assert_eq!(port.read8(), 0xFF);
    }
}
