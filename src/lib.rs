//! LoRa Concentrator SPI Register Transport
//!
//! This crate gives a host processor register-level access to a Semtech LoRa
//! concentrator (SX1301 family) sitting on an SPI bus. It provides four
//! primitives on top of an owned bus handle:
//!
//! - single-byte register read and write
//! - burst read and write through the chip's auto-incrementing register
//!   pointer, split into messages no larger than the bus allows
//!
//! # Architecture
//! - [`device`]: the [`Device`] handle, lifecycle and register access
//! - [`command`]: command byte framing (direction bit + 7-bit address)
//! - [`bus`]: transfer descriptors and the [`bus::SpiBus`] trait backends implement
//! - [`discipline`]: full-duplex and half-duplex single-read framing
//! - [`config`]: platform parameters ([`PlatformConfig`])
//! - [`hal`]: backend for any `embedded-hal` SPI device
//! - `spidev`: backend for Linux `/dev/spidevB.C` nodes (feature `spidev`)
//!
//! # Wire format
//! Every message starts with `direction | (address & 0x7F)`, where the
//! direction is `0x80` for writes and `0x00` for reads. Single accesses are
//! 2-byte frames. A burst is sent as one message per chunk, each chunk
//! preceded by the same command byte.
//!
//! # Important Notes
//! - A handle must not be shared between threads during a call. Bursts
//!   depend on the chip's register pointer advancing chunk after chunk.
//! - Chunks of a failed burst that already went out are not rolled back.
//! - Diagnostics go through the `log` crate and cost nothing until a logger
//!   is installed.
//!
//! # Example
//! ```no_run
//! use loragw_spi::{hal::HalBus, Device, Error, PlatformConfig};
//! use embedded_hal::spi::SpiDevice;
//!
//! fn dump_fifo<SPI: SpiDevice>(spi: SPI) -> Result<Vec<u8>, Error<SPI::Error>> {
//!     let mut device: Device<_> = Device::new(HalBus::new(spi), &PlatformConfig::default());
//!
//!     let mut fifo = vec![0u8; 300];
//!     device.read_burst(0x00, &mut fifo)?;
//!
//!     Ok(fifo)
//! }
//! ```

pub use regiface;

pub mod bus;
pub mod command;
pub mod config;
pub mod device;
pub mod discipline;
pub mod error;
pub mod hal;
#[cfg(all(feature = "spidev", target_os = "linux"))]
pub mod spidev;

pub use bus::{SpiBus, SpiConfigure, Transfer};
pub use command::Direction;
pub use config::PlatformConfig;
pub use device::Device;
pub use discipline::{FullDuplex, HalfDuplex, WireDiscipline};
pub use error::{Error, ErrorKind};
