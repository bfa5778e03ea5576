//! Bus transaction primitive
//!
//! The register transport does not talk to hardware directly. It describes
//! each exchange as a list of [`Transfer`] descriptors and hands the list to
//! an [`SpiBus`], which clocks all of them as one message. Two backends ship
//! with the crate:
//!
//! - [`crate::hal::HalBus`] for any `embedded-hal` SPI device
//! - [`crate::spidev::Spidev`] for Linux `/dev/spidevB.C` nodes

use bitflags::bitflags;

/// Word width used for every transfer. Other widths are not supported.
pub const BITS_PER_WORD: u8 = 8;

bitflags! {
    /// SPI mode bits as reported by the Linux `SPI_IOC_RD_MODE` ioctl.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpiModeFlags: u8 {
        /// Clock phase
        const CPHA = 0x01;
        /// Clock polarity
        const CPOL = 0x02;
        /// Chip select active high
        const CS_HIGH = 0x04;
        /// Least significant bit first
        const LSB_FIRST = 0x08;
        /// Shared SI/SO signal
        const THREE_WIRE = 0x10;
        /// Loopback mode
        const LOOP = 0x20;
        /// No chip select
        const NO_CS = 0x40;
        /// Slave pulls low to pause
        const READY = 0x80;
    }
}

impl SpiModeFlags {
    /// CPOL = 0, CPHA = 0
    pub const MODE_0: Self = Self::empty();
    /// CPOL = 0, CPHA = 1
    pub const MODE_1: Self = Self::CPHA;
    /// CPOL = 1, CPHA = 0
    pub const MODE_2: Self = Self::CPOL;
    /// CPOL = 1, CPHA = 1
    pub const MODE_3: Self = Self::CPOL.union(Self::CPHA);

    /// Clock polarity and phase only, with every other flag cleared.
    pub fn clock_mode(self) -> Self {
        self.intersection(Self::CPOL.union(Self::CPHA))
    }
}

/// One phase of a bus message.
///
/// Descriptors are built fresh for every exchange and borrow the caller's
/// buffers for exactly that exchange.
#[derive(Debug)]
pub struct Transfer<'a> {
    /// Bytes clocked out, or zeros when `None`
    pub tx: Option<&'a [u8]>,
    /// Storage for the bytes clocked in, discarded when `None`
    pub rx: Option<&'a mut [u8]>,
    /// Number of bytes in this phase
    pub len: usize,
    /// Clock speed for this phase, 0 keeps the bus default
    pub speed_hz: u32,
    /// Always [`BITS_PER_WORD`]
    pub bits_per_word: u8,
    /// Deassert chip select once this phase completes
    pub cs_change: bool,
}

impl<'a> Transfer<'a> {
    /// Transmit-only phase.
    pub fn write(tx: &'a [u8]) -> Self {
        Self {
            len: tx.len(),
            tx: Some(tx),
            rx: None,
            speed_hz: 0,
            bits_per_word: BITS_PER_WORD,
            cs_change: false,
        }
    }

    /// Receive-only phase.
    pub fn read(rx: &'a mut [u8]) -> Self {
        Self {
            len: rx.len(),
            tx: None,
            rx: Some(rx),
            speed_hz: 0,
            bits_per_word: BITS_PER_WORD,
            cs_change: false,
        }
    }

    /// Full-duplex phase. Both buffers must have the same length.
    pub fn duplex(tx: &'a [u8], rx: &'a mut [u8]) -> Self {
        debug_assert_eq!(tx.len(), rx.len());
        Self {
            len: tx.len(),
            tx: Some(tx),
            rx: Some(rx),
            speed_hz: 0,
            bits_per_word: BITS_PER_WORD,
            cs_change: false,
        }
    }

    /// Sets the clock speed of this phase.
    ///
    /// # Arguments
    /// * `speed_hz` - Clock in Hz, 0 keeps the speed negotiated on open
    pub fn speed_hz(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Sets the chip-select-release flag of this phase.
    ///
    /// # Arguments
    /// * `cs_change` - Deassert chip select once this phase completes
    pub fn cs_change(mut self, cs_change: bool) -> Self {
        self.cs_change = cs_change;
        self
    }
}

/// A bus endpoint able to run a multi-phase message.
pub trait SpiBus {
    type Error: core::fmt::Debug;

    /// Runs `transfers` back to back as one message and returns the total
    /// number of bytes clocked over all phases.
    fn transfer(&mut self, transfers: &mut [Transfer<'_>]) -> Result<usize, Self::Error>;

    /// Releases the endpoint.
    fn close(self) -> Result<(), Self::Error>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Bus parameters negotiated when a device is opened.
///
/// Each setter is followed by the matching getter so the caller can check
/// that the controller actually took the value.
pub trait SpiConfigure: SpiBus {
    /// Requests clock polarity/phase and the other mode flags.
    fn set_mode(&mut self, mode: SpiModeFlags) -> Result<(), Self::Error>;
    /// Mode flags currently in effect. May carry flags beyond CPOL/CPHA.
    fn mode(&mut self) -> Result<SpiModeFlags, Self::Error>;

    /// Requests the maximum clock speed in Hz.
    fn set_max_speed_hz(&mut self, speed_hz: u32) -> Result<(), Self::Error>;
    /// Maximum clock speed in Hz currently in effect.
    fn max_speed_hz(&mut self) -> Result<u32, Self::Error>;

    /// Requests LSB-first (`true`) or MSB-first (`false`) bit ordering.
    fn set_lsb_first(&mut self, lsb_first: bool) -> Result<(), Self::Error>;
    /// Bit ordering currently in effect, `true` for LSB first.
    fn lsb_first(&mut self) -> Result<bool, Self::Error>;

    /// Requests the word width in bits.
    fn set_bits_per_word(&mut self, bits: u8) -> Result<(), Self::Error>;
    /// Word width currently in effect. Linux reports the 8-bit default as 0.
    fn bits_per_word(&mut self) -> Result<u8, Self::Error>;
}
