//! Concentrator register transport
//!
//! This module provides the [`Device`] handle used to reach the registers of
//! a LoRa concentrator over SPI. It supports:
//! - Opening and negotiating a bus endpoint, and releasing it
//! - Single-byte register reads and writes
//! - Burst reads and writes of up to 65535 bytes, split into bus-sized chunks
//! - Typed register access through `regiface`
//!
//! # Example
//! ```no_run
//! use loragw_spi::{Device, PlatformConfig};
//!
//! # fn main() -> Result<(), loragw_spi::Error<std::io::Error>> {
//! let mut device: Device<_> = Device::open(&PlatformConfig::default())?;
//!
//! // Read a register
//! let version = device.read(0x01)?;
//!
//! // Write a block through the auto-incrementing register pointer
//! device.write_burst(0x00, &[0x01, 0x02, 0x03])?;
//!
//! device.close()?;
//! # Ok(())
//! # }
//! ```

use core::marker::PhantomData;

use log::{debug, trace};
use regiface::{ByteArray, ReadableRegister, WritableRegister};

use crate::bus::{SpiBus, SpiConfigure, SpiModeFlags, Transfer, BITS_PER_WORD};
use crate::command::Direction;
use crate::config::{PlatformConfig, TransferSettings};
use crate::discipline::{FullDuplex, WireDiscipline};
use crate::error::{Error, Setting};

/// Bytes in a single-register frame: command plus data.
const FRAME_LEN: usize = 2;

/// Largest burst the transport accepts.
pub const MAX_BURST_LEN: usize = u16::MAX as usize;

/// Open handle to one concentrator bus endpoint.
///
/// `B` is the bus backend and `D` the read discipline of the board. A handle
/// owns its bus exclusively; every operation takes `&mut self`, so one burst
/// can never interleave with another call on the same handle.
pub struct Device<B, D = FullDuplex> {
    bus: Option<B>,
    settings: TransferSettings,
    _discipline: PhantomData<D>,
}

impl<B, D> Device<B, D>
where
    B: SpiBus,
    D: WireDiscipline,
{
    /// Wraps a bus that is already configured.
    pub fn new(bus: B, config: &PlatformConfig) -> Self {
        Self {
            bus: Some(bus),
            settings: config.transfer_settings(),
            _discipline: PhantomData,
        }
    }

    /// Negotiates mode 0, `config.max_speed_hz`, MSB first and 8-bit words on
    /// `bus`, reading each value back.
    ///
    /// On failure the bus is closed before the error is returned.
    pub fn configure(mut bus: B, config: &PlatformConfig) -> Result<Self, Error<B::Error>>
    where
        B: SpiConfigure,
    {
        match negotiate(&mut bus, config) {
            Ok(()) => {
                debug!("SPI port configured at {} Hz", config.max_speed_hz);
                Ok(Self::new(bus, config))
            }
            Err(err) => {
                debug!("SPI configuration failed: {}", err);
                if let Err(close_err) = bus.close() {
                    debug!("closing unconfigured SPI port failed: {:?}", close_err);
                }
                Err(err)
            }
        }
    }

    /// Releases the bus. The handle is unusable afterwards; closing it again
    /// returns [`Error::InvalidHandle`].
    pub fn close(&mut self) -> Result<(), Error<B::Error>> {
        let bus = self.bus.take().ok_or(Error::InvalidHandle)?;
        bus.close().map_err(|err| {
            debug!("SPI port failed to close: {:?}", err);
            Error::Close(err)
        })?;
        debug!("SPI port closed");
        Ok(())
    }

    /// Hands the bus back without closing it.
    pub fn release(mut self) -> Result<B, Error<B::Error>> {
        self.bus.take().ok_or(Error::InvalidHandle)
    }

    /// Returns `false` once the handle has been closed.
    pub fn is_open(&self) -> bool {
        self.bus.is_some()
    }

    /// Speed, chip-select flag and chunk ceiling applied to every message.
    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    fn bus_mut(&mut self) -> Result<&mut B, Error<B::Error>> {
        self.bus.as_mut().ok_or(Error::InvalidHandle)
    }

    /// Writes `value` to the register at `address`.
    ///
    /// Sends `[0x80 | address, value]` in one message.
    ///
    /// # Errors
    /// * `Error::InvalidHandle` - handle closed
    /// * `Error::Bus` - the bus refused the message
    /// * `Error::Transfer` - the bus moved anything other than 2 bytes
    pub fn write(&mut self, address: u8, value: u8) -> Result<(), Error<B::Error>> {
        let settings = self.settings;
        let bus = self.bus_mut()?;

        let out_buf = [Direction::Write.command(address), value];
        let count = bus
            .transfer(&mut [Transfer::write(&out_buf)
                .speed_hz(settings.speed_hz)
                .cs_change(settings.cs_change)])
            .map_err(Error::bus)?;

        check_frame(count)
    }

    /// Reads the register at `address`.
    ///
    /// Sends `[address, 0x00]`; the value comes back during the second byte.
    ///
    /// # Errors
    /// * `Error::InvalidHandle` - handle closed
    /// * `Error::Bus` - the bus refused the message
    /// * `Error::Transfer` - the bus moved anything other than 2 bytes
    pub fn read(&mut self, address: u8) -> Result<u8, Error<B::Error>> {
        let settings = self.settings;
        let bus = self.bus_mut()?;

        let command = Direction::Read.command(address);
        let (count, value) = D::read(bus, command, &settings).map_err(Error::bus)?;

        check_frame(count)?;
        Ok(value)
    }

    /// Writes `data` starting at `address`, relying on the chip's
    /// auto-incrementing register pointer.
    ///
    /// The data is sent in chunks of at most `burst_chunk` bytes, each in its
    /// own message behind the command byte. Chunks already sent are not
    /// rolled back when a later one fails.
    ///
    /// # Arguments
    /// * `address` - First register of the range, bit 7 is ignored
    /// * `data` - Data to write, 1 to 65535 bytes
    ///
    /// # Errors
    /// * `Error::InvalidHandle` - handle closed
    /// * `Error::ZeroLengthBurst` / `Error::BurstTooLong` - bad `data` length
    /// * `Error::Bus` - the bus refused a chunk
    /// * `Error::Transfer` - a chunk moved fewer bytes than it carried
    pub fn write_burst(&mut self, address: u8, data: &[u8]) -> Result<(), Error<B::Error>> {
        check_burst_len(data.len())?;
        let chunk_len = self.settings.burst_chunk.get();
        let phases = data.chunks(chunk_len).map(Transfer::write);
        self.burst(Direction::Write, address, data.len(), phases)
    }

    /// Reads `data.len()` bytes starting at `address` into `data`.
    ///
    /// Chunked the same way as [`Device::write_burst`]. On failure `data`
    /// holds whatever the completed chunks delivered.
    ///
    /// # Arguments
    /// * `address` - First register of the range, bit 7 is ignored
    /// * `data` - Buffer to store read data, 1 to 65535 bytes
    ///
    /// # Errors
    /// * `Error::InvalidHandle` - handle closed
    /// * `Error::ZeroLengthBurst` / `Error::BurstTooLong` - bad `data` length
    /// * `Error::Bus` - the bus refused a chunk
    /// * `Error::Transfer` - a chunk moved fewer bytes than it carried
    pub fn read_burst(&mut self, address: u8, data: &mut [u8]) -> Result<(), Error<B::Error>> {
        check_burst_len(data.len())?;
        let size = data.len();
        let chunk_len = self.settings.burst_chunk.get();
        let phases = data.chunks_mut(chunk_len).map(Transfer::read);
        self.burst(Direction::Read, address, size, phases)
    }

    fn burst<'d>(
        &mut self,
        direction: Direction,
        address: u8,
        size: usize,
        phases: impl Iterator<Item = Transfer<'d>>,
    ) -> Result<(), Error<B::Error>> {
        let settings = self.settings;
        let bus = self.bus_mut()?;

        let command = [direction.command(address)];
        let mut remaining = size;
        let mut transferred = 0;

        for (index, phase) in phases.enumerate() {
            let chunk_len = phase.len;
            let count = bus
                .transfer(&mut [
                    Transfer::write(&command).speed_hz(settings.speed_hz),
                    phase
                        .speed_hz(settings.speed_hz)
                        .cs_change(settings.cs_change),
                ])
                .map_err(|cause| {
                    debug!("SPI burst {:?} failed on chunk {}: {:?}", direction, index, cause);
                    Error::Bus {
                        chunk: Some(index),
                        cause,
                    }
                })?;

            // the bus counts the command byte of every chunk
            let moved = count.saturating_sub(1);
            transferred += moved;
            remaining -= chunk_len;
            trace!(
                "burst {:?}: chunk {} # len {} # to do {} # transferred {}",
                direction,
                index,
                chunk_len,
                remaining,
                transferred
            );

            if count == 0 || moved != chunk_len {
                debug!(
                    "SPI burst {:?} failure: chunk {} reported {} bytes for {}",
                    direction, index, count, chunk_len
                );
                return Err(Error::Transfer {
                    expected: size,
                    actual: transferred,
                    chunk: Some(index),
                });
            }
        }

        debug_assert_eq!(transferred, size);
        Ok(())
    }

    /// Reads a typed register.
    ///
    /// One-byte registers use [`Device::read`], wider ones a burst starting at
    /// the register address.
    ///
    /// # Type Parameters
    /// * `R` - Register type implementing ReadableRegister with u8 ID
    pub fn read_register<R>(&mut self) -> Result<R, Error<B::Error>>
    where
        R: ReadableRegister<IdType = u8>,
    {
        let mut raw_value = R::Array::new();

        match raw_value.as_mut() {
            [single] => *single = self.read(R::id())?,
            bytes => self.read_burst(R::id(), bytes)?,
        }

        R::from_bytes(raw_value).map_err(|_| Error::Decode)
    }

    /// Writes a typed register.
    ///
    /// # Type Parameters
    /// * `R` - Register type implementing WritableRegister with u8 ID
    pub fn write_register<R>(&mut self, register: R) -> Result<(), Error<B::Error>>
    where
        R: WritableRegister<IdType = u8>,
    {
        let raw_value = register.to_bytes().map_err(|_| Error::Encode)?;

        match raw_value.as_ref() {
            [single] => self.write(R::id(), *single),
            bytes => self.write_burst(R::id(), bytes),
        }
    }
}

fn check_frame<E>(count: usize) -> Result<(), Error<E>> {
    if count == FRAME_LEN {
        Ok(())
    } else {
        debug!("SPI single access moved {} bytes", count);
        Err(Error::Transfer {
            expected: FRAME_LEN,
            actual: count,
            chunk: None,
        })
    }
}

fn check_burst_len<E>(len: usize) -> Result<(), Error<E>> {
    match len {
        0 => {
            debug!("burst of null length");
            Err(Error::ZeroLengthBurst)
        }
        len if len > MAX_BURST_LEN => Err(Error::BurstTooLong { len }),
        _ => Ok(()),
    }
}

fn negotiate<B: SpiConfigure>(bus: &mut B, config: &PlatformConfig) -> Result<(), Error<B::Error>> {
    let mode = SpiModeFlags::MODE_0;
    bus.set_mode(mode).map_err(failed(Setting::Mode))?;
    let actual = bus.mode().map_err(failed(Setting::Mode))?;
    verify(Setting::Mode, mode.bits().into(), actual.clock_mode().bits().into())?;

    bus.set_max_speed_hz(config.max_speed_hz)
        .map_err(failed(Setting::MaxSpeed))?;
    let actual = bus.max_speed_hz().map_err(failed(Setting::MaxSpeed))?;
    verify(Setting::MaxSpeed, config.max_speed_hz, actual)?;

    bus.set_lsb_first(false).map_err(failed(Setting::BitOrder))?;
    let actual = bus.lsb_first().map_err(failed(Setting::BitOrder))?;
    verify(Setting::BitOrder, 0, actual.into())?;

    bus.set_bits_per_word(BITS_PER_WORD)
        .map_err(failed(Setting::WordWidth))?;
    // 0 is how spidev spells the 8-bit default
    let actual = match bus.bits_per_word().map_err(failed(Setting::WordWidth))? {
        0 => BITS_PER_WORD,
        bits => bits,
    };
    verify(Setting::WordWidth, BITS_PER_WORD.into(), actual.into())
}

fn failed<E>(setting: Setting) -> impl FnOnce(E) -> Error<E> {
    move |cause| Error::Configuration { setting, cause }
}

fn verify<E>(setting: Setting, requested: u32, actual: u32) -> Result<(), Error<E>> {
    if requested == actual {
        Ok(())
    } else {
        Err(Error::Readback {
            setting,
            requested,
            actual,
        })
    }
}

#[cfg(all(feature = "spidev", target_os = "linux"))]
impl<D: WireDiscipline> Device<crate::spidev::Spidev, D> {
    /// Opens `config.device_path` and negotiates the bus parameters.
    pub fn open(config: &PlatformConfig) -> Result<Self, Error<std::io::Error>> {
        let bus = crate::spidev::Spidev::open(&config.device_path).map_err(|cause| {
            debug!(
                "failed to open SPI device {}",
                config.device_path.display()
            );
            Error::DeviceOpen {
                path: config.device_path.display().to_string(),
                cause,
            }
        })?;
        Self::configure(bus, config)
    }
}
