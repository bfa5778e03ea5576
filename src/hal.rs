//! `embedded-hal` bus backend
//!
//! [`HalBus`] lets a [`crate::Device`] run on top of any
//! [`embedded_hal::spi::SpiDevice`]. A descriptor list becomes a single
//! `SpiDevice::transaction`, so chip select stays asserted across all phases
//! and is released when the list ends. The per-descriptor clock speed and
//! chip-select flags cannot be expressed through `SpiDevice` and are left to
//! the device implementation.

use embedded_hal::spi::{Operation, SpiDevice};

use crate::bus::{SpiBus, Transfer};

/// [`SpiBus`] over an `embedded-hal` SPI device.
pub struct HalBus<SPI> {
    spi: SPI,
}

impl<SPI> HalBus<SPI> {
    /// Wraps an SPI device.
    ///
    /// # Arguments
    /// * `spi` - An SPI device implementing the embedded-hal `SpiDevice` trait
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Releases the underlying SPI device.
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> SpiBus for HalBus<SPI> {
    type Error = SPI::Error;

    /// Reports the sum of all descriptor lengths, since `SpiDevice` either
    /// completes the whole transaction or fails it.
    fn transfer(&mut self, transfers: &mut [Transfer<'_>]) -> Result<usize, Self::Error> {
        let total = transfers.iter().map(|t| t.len).sum();

        let mut operations: Vec<Operation<'_, u8>> = transfers
            .iter_mut()
            .filter_map(|t| match (t.tx, t.rx.as_deref_mut()) {
                (Some(tx), Some(rx)) => Some(Operation::Transfer(rx, tx)),
                (Some(tx), None) => Some(Operation::Write(tx)),
                (None, Some(rx)) => Some(Operation::Read(rx)),
                (None, None) => None,
            })
            .collect();

        self.spi.transaction(&mut operations)?;
        Ok(total)
    }
}
