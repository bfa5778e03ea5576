//! Transport errors
//!
//! [`Error`] carries the structured context of a failure (which setting,
//! which chunk, how many bytes moved). [`Error::kind`] collapses it to the
//! coarse category callers usually branch on.

use core::fmt;

/// Bus parameter negotiated on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Setting {
    /// Clock polarity and phase
    Mode,
    /// Maximum clock speed
    MaxSpeed,
    /// MSB-first bit ordering
    BitOrder,
    /// 8-bit words
    WordWidth,
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Setting::Mode => "SPI mode",
            Setting::MaxSpeed => "max speed",
            Setting::BitOrder => "bit order",
            Setting::WordWidth => "bits per word",
        })
    }
}

/// Coarse failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// Handle closed or released
    InvalidHandle,
    /// Empty or oversized burst buffer
    InvalidArgument,
    /// Bus device node could not be opened
    DeviceOpen,
    /// A bus parameter could not be set or did not read back
    Configuration,
    /// A message failed or moved the wrong number of bytes
    Transfer,
    /// Releasing the bus failed
    Close,
    /// Typed register value could not be encoded or decoded
    Register,
}

/// Transport error, generic over the bus error `E`.
#[derive(Debug, thiserror::Error)]
pub enum Error<E> {
    /// The device was closed or released.
    #[error("SPI handle is closed")]
    InvalidHandle,

    /// A burst was requested with an empty buffer.
    #[error("burst of zero length")]
    ZeroLengthBurst,

    /// A burst buffer was longer than 65535 bytes.
    #[error("burst of {len} bytes exceeds 65535")]
    BurstTooLong { len: usize },

    /// The bus device node could not be opened.
    #[error("failed to open SPI device {path}: {cause:?}")]
    DeviceOpen { path: String, cause: E },

    /// Setting or reading back a bus parameter failed.
    #[error("failed to configure {setting}: {cause:?}")]
    Configuration { setting: Setting, cause: E },

    /// A bus parameter read back differently from what was requested.
    #[error("{setting} read back as {actual}, requested {requested}")]
    Readback {
        setting: Setting,
        requested: u32,
        actual: u32,
    },

    /// The bus reported a byte count other than the one requested.
    ///
    /// For bursts `actual` counts data bytes moved before the failing chunk
    /// plus whatever that chunk reported.
    #[error("SPI transfer moved {actual} of {expected} bytes (chunk {chunk:?})")]
    Transfer {
        expected: usize,
        actual: usize,
        chunk: Option<usize>,
    },

    /// The bus refused a message. `chunk` is set for bursts.
    #[error("SPI bus error (chunk {chunk:?}): {cause:?}")]
    Bus { chunk: Option<usize>, cause: E },

    /// Releasing the bus failed.
    #[error("failed to close SPI device: {0:?}")]
    Close(E),

    /// A typed register value did not fit its byte image.
    #[error("register value could not be encoded")]
    Encode,

    /// Register bytes did not form a valid typed value.
    #[error("register value could not be decoded")]
    Decode,
}

impl<E> Error<E> {
    /// Coarse category of this error, without the bus error payload.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidHandle => ErrorKind::InvalidHandle,
            Error::ZeroLengthBurst | Error::BurstTooLong { .. } => ErrorKind::InvalidArgument,
            Error::DeviceOpen { .. } => ErrorKind::DeviceOpen,
            Error::Configuration { .. } | Error::Readback { .. } => ErrorKind::Configuration,
            Error::Transfer { .. } | Error::Bus { .. } => ErrorKind::Transfer,
            Error::Close(_) => ErrorKind::Close,
            Error::Encode | Error::Decode => ErrorKind::Register,
        }
    }

    pub(crate) fn bus(cause: E) -> Self {
        Error::Bus { chunk: None, cause }
    }
}
