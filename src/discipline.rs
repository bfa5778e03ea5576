//! Single-register read wire disciplines
//!
//! A register read is a 2-byte frame: the command byte followed by one
//! don't-care byte during which the chip shifts out the register value.
//! Most boards clock both bytes in one full-duplex phase. Some controllers
//! can only transmit or receive within a phase, so the frame is split into a
//! 1-byte command phase and a 1-byte receive phase under the same chip
//! select.
//!
//! The discipline is a property of the board, so it is chosen once as a type
//! parameter of [`crate::Device`].

use crate::bus::{SpiBus, Transfer};
use crate::config::TransferSettings;

/// Strategy for clocking a single-register read.
pub trait WireDiscipline {
    /// Sends `command` followed by one dummy byte and returns the byte count
    /// reported by the bus together with the register value.
    fn read<B: SpiBus>(
        bus: &mut B,
        command: u8,
        settings: &TransferSettings,
    ) -> Result<(usize, u8), B::Error>;
}

/// Command and data clocked in one 2-byte phase; the value is the second
/// byte received.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullDuplex;

/// Command phase then receive phase, chip select held in between; the value
/// is the first byte of the receive phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfDuplex;

impl WireDiscipline for FullDuplex {
    fn read<B: SpiBus>(
        bus: &mut B,
        command: u8,
        settings: &TransferSettings,
    ) -> Result<(usize, u8), B::Error> {
        let out_buf = [command, 0x00];
        let mut in_buf = [0u8; 2];

        let count = bus.transfer(&mut [Transfer::duplex(&out_buf, &mut in_buf)
            .speed_hz(settings.speed_hz)
            .cs_change(settings.cs_change)])?;

        Ok((count, in_buf[1]))
    }
}

impl WireDiscipline for HalfDuplex {
    fn read<B: SpiBus>(
        bus: &mut B,
        command: u8,
        settings: &TransferSettings,
    ) -> Result<(usize, u8), B::Error> {
        let out_buf = [command];
        let mut in_buf = [0u8; 1];

        let count = bus.transfer(&mut [
            Transfer::write(&out_buf).speed_hz(settings.speed_hz),
            Transfer::read(&mut in_buf)
                .speed_hz(settings.speed_hz)
                .cs_change(settings.cs_change),
        ])?;

        Ok((count, in_buf[0]))
    }
}
