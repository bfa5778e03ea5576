//! Command byte framing
//!
//! Every exchange with the concentrator starts with a single command byte:
//! the register address in bits 0..=6 and the access direction in bit 7.
//!
//! ```text
//!   7   6   5   4   3   2   1   0
//! +---+---------------------------+
//! |R/W|      register address     |
//! +---+---------------------------+
//! ```

use log::warn;

/// Mask selecting the 7 address bits of a command byte.
pub const ADDRESS_MASK: u8 = 0x7F;

/// Access direction encoded in bit 7 of the command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Register read, bit 7 clear
    Read,
    /// Register write, bit 7 set
    Write,
}

impl Direction {
    /// Bit pattern OR-ed into the command byte.
    pub const fn tag(self) -> u8 {
        match self {
            Direction::Read => 0x00,
            Direction::Write => 0x80,
        }
    }

    /// Builds the command byte addressing `address` in this direction.
    ///
    /// Bit 7 of `address` is reserved for the direction tag. If the caller
    /// sets it, the bit is dropped and a warning is logged; the access still
    /// goes out to `address & 0x7F`.
    pub fn command(self, address: u8) -> u8 {
        if address & !ADDRESS_MASK != 0 {
            warn!(
                "register address 0x{:02X} > 127, using 0x{:02X}",
                address,
                address & ADDRESS_MASK
            );
        }
        self.tag() | (address & ADDRESS_MASK)
    }
}
