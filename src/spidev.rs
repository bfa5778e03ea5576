//! Linux `spidev` bus backend
//!
//! Drives a `/dev/spidevB.C` character device through the kernel's spidev
//! ioctl interface. `SPI_IOC_MESSAGE(n)` returns the number of bytes clocked
//! over all `n` transfers, which is exactly the [`SpiBus::transfer`]
//! contract.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::{AsRawFd, IntoRawFd};
use std::path::Path;

use nix::errno::Errno;

use crate::bus::{SpiBus, SpiConfigure, SpiModeFlags, Transfer};

const SPI_IOC_MAGIC: u8 = b'k';

mod ioctl {
    use super::{SpiIocTransfer, SPI_IOC_MAGIC};

    nix::ioctl_read!(rd_mode, SPI_IOC_MAGIC, 1, u8);
    nix::ioctl_write_ptr!(wr_mode, SPI_IOC_MAGIC, 1, u8);
    nix::ioctl_read!(rd_lsb_first, SPI_IOC_MAGIC, 2, u8);
    nix::ioctl_write_ptr!(wr_lsb_first, SPI_IOC_MAGIC, 2, u8);
    nix::ioctl_read!(rd_bits_per_word, SPI_IOC_MAGIC, 3, u8);
    nix::ioctl_write_ptr!(wr_bits_per_word, SPI_IOC_MAGIC, 3, u8);
    nix::ioctl_read!(rd_max_speed_hz, SPI_IOC_MAGIC, 4, u32);
    nix::ioctl_write_ptr!(wr_max_speed_hz, SPI_IOC_MAGIC, 4, u32);
    nix::ioctl_write_buf!(message, SPI_IOC_MAGIC, 0, SpiIocTransfer);
}

/// `struct spi_ioc_transfer` from `<linux/spi/spidev.h>`.
#[repr(C)]
#[derive(Debug, Default)]
pub(crate) struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    pad: u8,
}

impl SpiIocTransfer {
    fn from_transfer(transfer: &mut Transfer<'_>) -> Self {
        Self {
            tx_buf: transfer.tx.map_or(0, |tx| tx.as_ptr() as u64),
            rx_buf: transfer
                .rx
                .as_deref_mut()
                .map_or(0, |rx| rx.as_mut_ptr() as u64),
            len: transfer.len as u32,
            speed_hz: transfer.speed_hz,
            bits_per_word: transfer.bits_per_word,
            cs_change: transfer.cs_change.into(),
            ..Self::default()
        }
    }
}

/// An opened spidev node.
#[derive(Debug)]
pub struct Spidev {
    file: File,
}

impl Spidev {
    /// Opens the node read/write without touching any bus parameter.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }
}

impl AsRawFd for Spidev {
    fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
        self.file.as_raw_fd()
    }
}

impl SpiBus for Spidev {
    type Error = io::Error;

    fn transfer(&mut self, transfers: &mut [Transfer<'_>]) -> io::Result<usize> {
        let messages: Vec<SpiIocTransfer> = transfers
            .iter_mut()
            .map(SpiIocTransfer::from_transfer)
            .collect();

        // SAFETY: every tx/rx pointer borrows from `transfers`, which outlives
        // the call, and each buffer is at least `len` bytes long.
        let count = unsafe { ioctl::message(self.file.as_raw_fd(), &messages) }?;
        Ok(count as usize)
    }

    fn close(self) -> io::Result<()> {
        let fd = self.file.into_raw_fd();
        // SAFETY: `fd` was just taken out of the `File` and is closed once.
        let res = unsafe { nix::libc::close(fd) };
        Errno::result(res)?;
        Ok(())
    }
}

impl SpiConfigure for Spidev {
    fn set_mode(&mut self, mode: SpiModeFlags) -> io::Result<()> {
        let bits = mode.bits();
        unsafe { ioctl::wr_mode(self.file.as_raw_fd(), &bits) }?;
        Ok(())
    }

    fn mode(&mut self) -> io::Result<SpiModeFlags> {
        let mut bits = 0u8;
        unsafe { ioctl::rd_mode(self.file.as_raw_fd(), &mut bits) }?;
        Ok(SpiModeFlags::from_bits_retain(bits))
    }

    fn set_max_speed_hz(&mut self, speed_hz: u32) -> io::Result<()> {
        unsafe { ioctl::wr_max_speed_hz(self.file.as_raw_fd(), &speed_hz) }?;
        Ok(())
    }

    fn max_speed_hz(&mut self) -> io::Result<u32> {
        let mut speed_hz = 0u32;
        unsafe { ioctl::rd_max_speed_hz(self.file.as_raw_fd(), &mut speed_hz) }?;
        Ok(speed_hz)
    }

    fn set_lsb_first(&mut self, lsb_first: bool) -> io::Result<()> {
        let value = u8::from(lsb_first);
        unsafe { ioctl::wr_lsb_first(self.file.as_raw_fd(), &value) }?;
        Ok(())
    }

    fn lsb_first(&mut self) -> io::Result<bool> {
        let mut value = 0u8;
        unsafe { ioctl::rd_lsb_first(self.file.as_raw_fd(), &mut value) }?;
        Ok(value != 0)
    }

    fn set_bits_per_word(&mut self, bits: u8) -> io::Result<()> {
        unsafe { ioctl::wr_bits_per_word(self.file.as_raw_fd(), &bits) }?;
        Ok(())
    }

    fn bits_per_word(&mut self) -> io::Result<u8> {
        let mut bits = 0u8;
        unsafe { ioctl::rd_bits_per_word(self.file.as_raw_fd(), &mut bits) }?;
        Ok(bits)
    }
}
