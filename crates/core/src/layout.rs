//! Where the transmit register lives.
//!
//! The device sits directly above RAM: its window starts at `MEMSIZE` and the
//! transmit register is the second word of that window. `MEMSIZE` is fixed
//! when the image is built (`RVTX_MEMSIZE`, decimal or `0x` hex) and falls
//! back to [`DEFAULT_MEMSIZE`].

use core::fmt;

/// Offset of the transmit register from the device window base.
pub const TX_OFFSET: u32 = 4;

/// RAM size assumed when the build does not provide one.
pub const DEFAULT_MEMSIZE: u32 = 0x2000;

/// Memory size this image was built for.
pub const MEMSIZE: u32 = match option_env!("RVTX_MEMSIZE") {
    Some(raw) => match parse_memsize(raw) {
        Some(size) => size,
        None => panic!("RVTX_MEMSIZE must be a decimal or 0x-prefixed hex u32"),
    },
    None => DEFAULT_MEMSIZE,
};

/// Layout this image was built for.
pub const LAYOUT: MemoryLayout = match MemoryLayout::new(MEMSIZE) {
    Ok(layout) => layout,
    Err(_) => panic!("RVTX_MEMSIZE leaves no aligned room for the transmit register"),
};

/// Absolute address of the transmit register in this image.
pub const TX_REGISTER: u32 = LAYOUT.tx_register();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// `memsize + TX_OFFSET` does not fit the 32-bit address space.
    Overflow(u32),
    /// The register would not be word aligned.
    Misaligned(u32),
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::Overflow(size) => {
                write!(f, "memsize {size:#x} leaves no room for the transmit register")
            }
            LayoutError::Misaligned(size) => {
                write!(f, "memsize {size:#x} is not a multiple of 4")
            }
        }
    }
}

impl core::error::Error for LayoutError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    memsize: u32,
}

impl MemoryLayout {
    pub const fn new(memsize: u32) -> Result<Self, LayoutError> {
        if memsize % 4 != 0 {
            return Err(LayoutError::Misaligned(memsize));
        }
        // The register occupies four bytes starting at memsize + 4.
        if memsize > u32::MAX - TX_OFFSET - 3 {
            return Err(LayoutError::Overflow(memsize));
        }
        Ok(Self { memsize })
    }

    pub const fn memsize(&self) -> u32 {
        self.memsize
    }

    pub const fn tx_register(&self) -> u32 {
        self.memsize + TX_OFFSET
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        LAYOUT
    }
}

/// Parse a build-time memory size: decimal, or hex with a `0x`/`0X` prefix.
/// Underscores are accepted as digit separators.
pub const fn parse_memsize(raw: &str) -> Option<u32> {
    let bytes = raw.as_bytes();
    let (radix, mut i) = if bytes.len() > 2 && bytes[0] == b'0' && (bytes[1] == b'x' || bytes[1] == b'X') {
        (16u32, 2)
    } else {
        (10u32, 0)
    };

    let mut value: u32 = 0;
    let mut digits = 0;
    while i < bytes.len() {
        let c = bytes[i];
        i += 1;
        if c == b'_' {
            continue;
        }
        let digit = match c {
            b'0'..=b'9' => (c - b'0') as u32,
            b'a'..=b'f' if radix == 16 => (c - b'a' + 10) as u32,
            b'A'..=b'F' if radix == 16 => (c - b'A' + 10) as u32,
            _ => return None,
        };
        value = match value.checked_mul(radix) {
            Some(v) => match v.checked_add(digit) {
                Some(v) => v,
                None => return None,
            },
            None => return None,
        };
        digits += 1;
    }

    if digits == 0 {
        None
    } else {
        Some(value)
    }
}
