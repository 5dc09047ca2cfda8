//! Transport state shared between a driver and the engine.
//!
//! Control threads request play, stop, relocation and tempo changes; the
//! audio callback polls the handle once per block.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

const NO_LOCATE: u64 = u64::MAX;
const DEFAULT_BPM: f32 = 120.0;

#[derive(Debug)]
struct Inner {
    rolling: AtomicBool,
    locate: AtomicU64,
    bpm: AtomicU32,
}

/// Cloneable handle to a driver's transport.
#[derive(Clone, Debug)]
pub struct TransportHandle {
    inner: Arc<Inner>,
}

/// What the callback sees when it polls the transport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransportSnapshot {
    pub rolling: bool,
    /// Frame to relocate to, consumed by the poll that returned it.
    pub locate: Option<u64>,
    pub bpm: f32,
}

impl Default for TransportHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                rolling: AtomicBool::new(false),
                locate: AtomicU64::new(NO_LOCATE),
                bpm: AtomicU32::new(DEFAULT_BPM.to_bits()),
            }),
        }
    }

    pub fn start(&self) {
        self.inner.rolling.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.inner.rolling.store(false, Ordering::Release);
    }

    pub fn is_rolling(&self) -> bool {
        self.inner.rolling.load(Ordering::Acquire)
    }

    /// Ask the callback to move to `frame` on its next block.
    pub fn locate(&self, frame: u64) {
        self.inner.locate.store(frame.min(NO_LOCATE - 1), Ordering::Release);
    }

    /// Non-finite or non-positive values are ignored.
    pub fn set_bpm(&self, bpm: f32) {
        if bpm.is_finite() && bpm > 0.0 {
            self.inner.bpm.store(bpm.to_bits(), Ordering::Release);
        }
    }

    pub fn bpm(&self) -> f32 {
        f32::from_bits(self.inner.bpm.load(Ordering::Acquire))
    }

    /// Read the transport and take any pending relocation.
    pub fn poll(&self) -> TransportSnapshot {
        let locate = self.inner.locate.swap(NO_LOCATE, Ordering::AcqRel);
        TransportSnapshot {
            rolling: self.is_rolling(),
            locate: (locate != NO_LOCATE).then_some(locate),
            bpm: self.bpm(),
        }
    }
}
