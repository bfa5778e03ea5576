//! Mock concentrator bus for the integration tests
//!
//! Simulates a chip behind an SPI bus: the first byte of every message is a
//! command byte, the following bytes read or write a register file through
//! an auto-incrementing pointer. When a message repeats the command of a
//! previous message that carried a full chunk, the pointer carries on where
//! that message stopped, the way the concentrator walks a register range
//! during a burst.

#![allow(dead_code)]

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use loragw_spi::bus::{SpiModeFlags, Transfer};
use loragw_spi::error::Setting;
use loragw_spi::{PlatformConfig, SpiBus, SpiConfigure};

pub const MEMORY_SIZE: usize = 0x80 + 0x1_0000;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn config(burst_chunk: usize) -> PlatformConfig {
    PlatformConfig::default()
        .with_burst_chunk(NonZeroUsize::new(burst_chunk).expect("non-zero chunk"))
}

/// Snapshot of one descriptor as the bus saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub tx: Option<Vec<u8>>,
    pub rx: bool,
    pub len: usize,
    pub speed_hz: u32,
    pub bits_per_word: u8,
    pub cs_change: bool,
}

impl Recorded {
    fn from_transfer(transfer: &Transfer<'_>) -> Self {
        Self {
            tx: transfer.tx.map(|tx| tx.to_vec()),
            rx: transfer.rx.is_some(),
            len: transfer.len,
            speed_hz: transfer.speed_hz,
            bits_per_word: transfer.bits_per_word,
            cs_change: transfer.cs_change,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

#[derive(Debug, Clone, Copy)]
enum Fault {
    Error,
    Short(usize),
}

struct State {
    memory: Vec<u8>,
    burst_chunk: usize,
    last: Option<(u8, usize, usize)>,
    messages: Vec<Vec<Recorded>>,
    faults: HashMap<usize, Fault>,
    mode: SpiModeFlags,
    max_speed_hz: u32,
    lsb_first: bool,
    bits_per_word: u8,
    reject: Option<Setting>,
    skew: Option<Setting>,
    closed: bool,
    fail_close: bool,
}

impl State {
    fn start_pointer(&self, command: u8) -> usize {
        match self.last {
            Some((last, len, next)) if last == command && len == self.burst_chunk => next,
            _ => (command & 0x7F) as usize,
        }
    }

    fn check(&self, setting: Setting) -> Result<(), MockError> {
        match self.reject {
            Some(rejected) if rejected == setting => Err(MockError),
            _ => Ok(()),
        }
    }

    fn skewed(&self, setting: Setting) -> bool {
        self.skew == Some(setting)
    }
}

/// Cloneable handle: keep one clone in the test, give the other to the device.
#[derive(Clone)]
pub struct MockBus {
    state: Arc<Mutex<State>>,
}

impl MockBus {
    pub fn new(burst_chunk: usize) -> Self {
        MockBus {
            state: Arc::new(Mutex::new(State {
                memory: vec![0; MEMORY_SIZE],
                burst_chunk,
                last: None,
                messages: Vec::new(),
                faults: HashMap::new(),
                mode: SpiModeFlags::MODE_3,
                max_speed_hz: 500_000,
                lsb_first: true,
                bits_per_word: 16,
                reject: None,
                skew: None,
                closed: false,
                fail_close: false,
            })),
        }
    }

    /// Every message seen so far, one `Vec` of descriptors per message.
    pub fn messages(&self) -> Vec<Vec<Recorded>> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn memory(&self, start: usize, len: usize) -> Vec<u8> {
        self.state.lock().unwrap().memory[start..start + len].to_vec()
    }

    pub fn set_memory(&self, start: usize, bytes: &[u8]) {
        self.state.lock().unwrap().memory[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Makes the `index`-th message (0-based) fail with a bus error.
    pub fn fail_message(&self, index: usize) {
        self.state.lock().unwrap().faults.insert(index, Fault::Error);
    }

    /// Makes the `index`-th message report `by` bytes fewer than it clocked.
    pub fn short_message(&self, index: usize, by: usize) {
        self.state
            .lock()
            .unwrap()
            .faults
            .insert(index, Fault::Short(by));
    }

    /// Setter and getter for `setting` fail.
    pub fn reject(&self, setting: Setting) {
        self.state.lock().unwrap().reject = Some(setting);
    }

    /// Getter for `setting` reports something other than what was set.
    pub fn skew(&self, setting: Setting) {
        self.state.lock().unwrap().skew = Some(setting);
    }

    pub fn fail_close(&self) {
        self.state.lock().unwrap().fail_close = true;
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn negotiated(&self) -> (SpiModeFlags, u32, bool, u8) {
        let state = self.state.lock().unwrap();
        (
            state.mode,
            state.max_speed_hz,
            state.lsb_first,
            state.bits_per_word,
        )
    }
}

impl SpiBus for MockBus {
    type Error = MockError;

    fn transfer(&mut self, transfers: &mut [Transfer<'_>]) -> Result<usize, MockError> {
        let mut state = self.state.lock().unwrap();
        assert!(!state.closed, "transfer on a closed bus");

        let index = state.messages.len();
        state
            .messages
            .push(transfers.iter().map(Recorded::from_transfer).collect());

        let fault = state.faults.remove(&index);
        if let Some(Fault::Error) = fault {
            return Err(MockError);
        }

        let mut command = None;
        let mut pointer = 0;
        let mut data_len = 0;
        for transfer in transfers.iter_mut() {
            for i in 0..transfer.len {
                let mosi = transfer.tx.map_or(0, |tx| tx[i]);
                let miso = match command {
                    None => {
                        pointer = state.start_pointer(mosi);
                        command = Some(mosi);
                        0
                    }
                    Some(cmd) => {
                        let at = pointer;
                        pointer += 1;
                        data_len += 1;
                        if cmd & 0x80 != 0 {
                            state.memory[at] = mosi;
                            0
                        } else {
                            state.memory[at]
                        }
                    }
                };
                if let Some(rx) = transfer.rx.as_deref_mut() {
                    rx[i] = miso;
                }
            }
        }
        state.last = command.map(|cmd| (cmd, data_len, pointer));

        let total: usize = transfers.iter().map(|t| t.len).sum();
        match fault {
            Some(Fault::Short(by)) => Ok(total.saturating_sub(by)),
            _ => Ok(total),
        }
    }

    fn close(self) -> Result<(), MockError> {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        if state.fail_close {
            Err(MockError)
        } else {
            Ok(())
        }
    }
}

impl SpiConfigure for MockBus {
    fn set_mode(&mut self, mode: SpiModeFlags) -> Result<(), MockError> {
        let mut state = self.state.lock().unwrap();
        state.check(Setting::Mode)?;
        state.mode = mode;
        Ok(())
    }

    fn mode(&mut self) -> Result<SpiModeFlags, MockError> {
        let state = self.state.lock().unwrap();
        state.check(Setting::Mode)?;
        if state.skewed(Setting::Mode) {
            Ok(state.mode | SpiModeFlags::CPHA)
        } else {
            // spidev reports more than the clock bits
            Ok(state.mode | SpiModeFlags::CS_HIGH)
        }
    }

    fn set_max_speed_hz(&mut self, speed_hz: u32) -> Result<(), MockError> {
        let mut state = self.state.lock().unwrap();
        state.check(Setting::MaxSpeed)?;
        state.max_speed_hz = speed_hz;
        Ok(())
    }

    fn max_speed_hz(&mut self) -> Result<u32, MockError> {
        let state = self.state.lock().unwrap();
        state.check(Setting::MaxSpeed)?;
        if state.skewed(Setting::MaxSpeed) {
            Ok(state.max_speed_hz / 2)
        } else {
            Ok(state.max_speed_hz)
        }
    }

    fn set_lsb_first(&mut self, lsb_first: bool) -> Result<(), MockError> {
        let mut state = self.state.lock().unwrap();
        state.check(Setting::BitOrder)?;
        state.lsb_first = lsb_first;
        Ok(())
    }

    fn lsb_first(&mut self) -> Result<bool, MockError> {
        let state = self.state.lock().unwrap();
        state.check(Setting::BitOrder)?;
        Ok(state.lsb_first ^ state.skewed(Setting::BitOrder))
    }

    fn set_bits_per_word(&mut self, bits: u8) -> Result<(), MockError> {
        let mut state = self.state.lock().unwrap();
        state.check(Setting::WordWidth)?;
        state.bits_per_word = bits;
        Ok(())
    }

    fn bits_per_word(&mut self) -> Result<u8, MockError> {
        let state = self.state.lock().unwrap();
        state.check(Setting::WordWidth)?;
        if state.skewed(Setting::WordWidth) {
            Ok(16)
        } else {
            Ok(state.bits_per_word)
        }
    }
}
