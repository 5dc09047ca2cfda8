//! Fake driver for tests and headless runs.
//!
//! In manual mode nothing happens until a [`FakeClock`] is ticked, one
//! block per tick. In free-running mode a thread ticks the clock at the
//! nominal block rate until the callback halts or the driver disconnects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::traits::{
    AudioOutput, DriverError, DriverKind, ProcessBlock, ProcessCallback, ProcessStatus, Result,
};
use crate::transport::TransportHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FakeMode {
    Manual,
    FreeRunning,
}

struct ClockState {
    callback: Option<ProcessCallback>,
    left: Vec<f32>,
    right: Vec<f32>,
    halted: bool,
    blocks: u64,
}

/// Drives a [`FakeDriver`]'s callback by hand.
#[derive(Clone)]
pub struct FakeClock {
    state: Arc<Mutex<ClockState>>,
    sample_rate: u32,
}

impl FakeClock {
    /// Run one block. `None` when not connected or already halted.
    pub fn tick(&self) -> Option<ProcessStatus> {
        let mut guard = self.state.lock();
        let ClockState {
            callback,
            left,
            right,
            halted,
            blocks,
        } = &mut *guard;
        if *halted {
            return None;
        }
        let callback = callback.as_mut()?;
        let mut block = ProcessBlock::new(left, right, self.sample_rate);
        let status = callback(&mut block);
        *blocks += 1;
        if status == ProcessStatus::Halt {
            *halted = true;
        }
        Some(status)
    }

    /// Run up to `blocks` blocks, stopping early on halt. Returns how many ran.
    pub fn run(&self, blocks: usize) -> usize {
        let mut ran = 0;
        while ran < blocks {
            match self.tick() {
                Some(ProcessStatus::Continue) => ran += 1,
                Some(ProcessStatus::Halt) => return ran + 1,
                None => break,
            }
        }
        ran
    }

    /// Copy of the last block written by the callback.
    pub fn last_output(&self) -> (Vec<f32>, Vec<f32>) {
        let state = self.state.lock();
        (state.left.clone(), state.right.clone())
    }

    pub fn is_halted(&self) -> bool {
        self.state.lock().halted
    }

    /// Blocks processed since the last connect.
    pub fn blocks(&self) -> u64 {
        self.state.lock().blocks
    }
}

pub struct FakeDriver {
    sample_rate: u32,
    buffer_size: usize,
    mode: FakeMode,
    transport: TransportHandle,
    clock: FakeClock,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FakeDriver {
    /// Manually clocked driver.
    pub fn new(sample_rate: u32) -> Self {
        Self::with_mode(sample_rate, FakeMode::Manual)
    }

    pub fn with_mode(sample_rate: u32, mode: FakeMode) -> Self {
        let state = ClockState {
            callback: None,
            left: Vec::new(),
            right: Vec::new(),
            halted: false,
            blocks: 0,
        };
        Self {
            sample_rate,
            buffer_size: 0,
            mode,
            transport: TransportHandle::new(),
            clock: FakeClock {
                state: Arc::new(Mutex::new(state)),
                sample_rate,
            },
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Handle for ticking the callback from a test.
    pub fn clock(&self) -> FakeClock {
        self.clock.clone()
    }

    pub fn mode(&self) -> FakeMode {
        self.mode
    }

    fn block_period(&self) -> Duration {
        Duration::from_secs_f64(self.buffer_size as f64 / self.sample_rate.max(1) as f64)
    }
}

impl AudioOutput for FakeDriver {
    fn name(&self) -> &'static str {
        "Fake"
    }

    fn kind(&self) -> DriverKind {
        DriverKind::Fake
    }

    fn init(&mut self, buffer_size: usize) -> Result<()> {
        if buffer_size == 0 {
            return Err(DriverError::InvalidBufferSize(buffer_size));
        }
        self.buffer_size = buffer_size;
        let mut state = self.clock.state.lock();
        state.left = vec![0.0; buffer_size];
        state.right = vec![0.0; buffer_size];
        Ok(())
    }

    fn connect(&mut self, callback: ProcessCallback) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(DriverError::NotInitialized);
        }
        {
            let mut state = self.clock.state.lock();
            if state.callback.is_some() {
                return Err(DriverError::AlreadyConnected);
            }
            state.callback = Some(callback);
            state.halted = false;
            state.blocks = 0;
        }

        if self.mode == FakeMode::FreeRunning {
            let clock = self.clock.clone();
            let running = self.running.clone();
            let period = self.block_period();
            running.store(true, Ordering::Release);
            self.thread = Some(std::thread::spawn(move || {
                while running.load(Ordering::Acquire) {
                    match clock.tick() {
                        Some(ProcessStatus::Continue) => std::thread::sleep(period),
                        _ => break,
                    }
                }
                debug!("fake driver thread finished");
            }));
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        self.clock.state.lock().callback = None;
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn transport(&self) -> &TransportHandle {
        &self.transport
    }
}

impl Drop for FakeDriver {
    fn drop(&mut self) {
        self.disconnect();
    }
}
