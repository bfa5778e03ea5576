//! Platform parameters
//!
//! Everything the transport needs to know about the board it runs on: which
//! bus node the concentrator sits behind, how fast to clock it, how chip
//! select behaves between messages, and how large a single message may be.

use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Largest payload the reference gateway puts in one bus message.
pub const DEFAULT_BURST_CHUNK: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(n) => n,
    None => unreachable!(),
};

/// Default SPI clock, 8 MHz.
pub const DEFAULT_SPEED_HZ: u32 = 8_000_000;

/// Default bus node.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/spidev0.0";

/// Static description of one concentrator bus endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlatformConfig {
    /// Bus device node
    pub device_path: PathBuf,
    /// Maximum clock speed in Hz, negotiated on open and used per transfer
    pub max_speed_hz: u32,
    /// Chip-select-release flag placed on the last phase of every message
    pub cs_change: bool,
    /// Maximum data bytes per bus message during a burst
    pub burst_chunk: NonZeroUsize,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            max_speed_hz: DEFAULT_SPEED_HZ,
            cs_change: false,
            burst_chunk: DEFAULT_BURST_CHUNK,
        }
    }
}

impl PlatformConfig {
    /// MTK based gateway boards.
    pub fn mtk() -> Self {
        Self {
            device_path: PathBuf::from("/dev/spidev32766.1"),
            ..Self::default()
        }
    }

    /// Sets the bus device node, e.g. `/dev/spidev1.0`.
    pub fn with_device_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.device_path = path.into();
        self
    }

    /// Sets the maximum clock speed in Hz.
    pub fn with_max_speed_hz(mut self, speed_hz: u32) -> Self {
        self.max_speed_hz = speed_hz;
        self
    }

    /// Sets the chip-select-release flag of the last phase of every message.
    pub fn with_cs_change(mut self, cs_change: bool) -> Self {
        self.cs_change = cs_change;
        self
    }

    /// Sets the largest number of data bytes sent in one bus message.
    pub fn with_burst_chunk(mut self, burst_chunk: NonZeroUsize) -> Self {
        self.burst_chunk = burst_chunk;
        self
    }

    /// Per-transfer settings a [`crate::Device`] keeps after opening.
    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            speed_hz: self.max_speed_hz,
            cs_change: self.cs_change,
            burst_chunk: self.burst_chunk,
        }
    }
}

/// The subset of [`PlatformConfig`] applied to every bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
    /// Clock speed placed on every descriptor
    pub speed_hz: u32,
    /// Chip-select-release flag of the last phase
    pub cs_change: bool,
    /// Maximum data bytes per burst message
    pub burst_chunk: NonZeroUsize,
}
