//! Audio output trait, process block and error types.

use crate::transport::TransportHandle;

/// Error type for driver operations.
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    /// No audio device available
    #[error("no audio device available")]
    NoDevice,

    /// Failed to initialize audio device
    #[error("device init error: {0}")]
    DeviceInit(String),

    /// Failed to create audio stream
    #[error("stream create error: {0}")]
    StreamCreate(String),

    /// Playback error
    #[error("playback error: {0}")]
    Playback(String),

    /// `connect` called before `init`
    #[error("driver not initialized")]
    NotInitialized,

    /// `connect` called twice without `disconnect`
    #[error("driver already connected")]
    AlreadyConnected,

    #[error("invalid buffer size {0}")]
    InvalidBufferSize(usize),

    /// Driver name not recognized
    #[error("unknown driver: {0}")]
    UnknownDriver(String),

    /// Backend known but not usable in this build or without extra setup
    #[error("driver unavailable: {0}")]
    Unavailable(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

/// Broad class of a backend, which decides how the engine reacts to the end of a song.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverKind {
    /// Hardware output driven by the device clock.
    Realtime,
    /// Offline render thread writing to a file.
    Offline,
    /// Test clock.
    Fake,
    /// Never calls back.
    Null,
}

impl DriverKind {
    /// Whether the callback should stop the driver once the song is over.
    pub fn halts_at_end_of_song(self) -> bool {
        matches!(self, DriverKind::Offline | DriverKind::Fake)
    }
}

/// Return value of the process callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessStatus {
    Continue,
    /// Stop calling back. Only offline and test drivers honour this.
    Halt,
}

/// Output buffers lent to the process callback for one block.
pub struct ProcessBlock<'a> {
    left: &'a mut [f32],
    right: &'a mut [f32],
    sample_rate: u32,
}

impl<'a> ProcessBlock<'a> {
    /// Both slices are cut to the shorter length.
    pub fn new(left: &'a mut [f32], right: &'a mut [f32], sample_rate: u32) -> Self {
        let frames = left.len().min(right.len());
        Self {
            left: &mut left[..frames],
            right: &mut right[..frames],
            sample_rate,
        }
    }

    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn left(&mut self) -> &mut [f32] {
        self.left
    }

    pub fn right(&mut self) -> &mut [f32] {
        self.right
    }

    /// Both channels at once.
    pub fn outputs(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut *self.left, &mut *self.right)
    }

    pub fn silence(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }
}

/// Callback invoked once per block on the driver's thread.
pub type ProcessCallback = Box<dyn FnMut(&mut ProcessBlock<'_>) -> ProcessStatus + Send + 'static>;

/// Trait for audio output backends.
///
/// Implementations own their output thread or device stream. The engine keeps
/// the driver on the control thread and only ever reaches it from there.
pub trait AudioOutput {
    fn name(&self) -> &'static str;

    fn kind(&self) -> DriverKind;

    /// Prepare the device for blocks of `buffer_size` frames.
    fn init(&mut self, buffer_size: usize) -> Result<()>;

    /// Start calling `callback` once per block.
    fn connect(&mut self, callback: ProcessCallback) -> Result<()>;

    /// Stop calling back and release the callback. Blocks until the driver
    /// thread has let go of it.
    fn disconnect(&mut self);

    fn sample_rate(&self) -> u32;

    /// Frames per block.
    fn buffer_size(&self) -> usize;

    /// Shared transport controls.
    fn transport(&self) -> &TransportHandle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_slices_are_cut_to_common_length() {
        let mut l = [1.0f32; 8];
        let mut r = [1.0f32; 6];
        let mut block = ProcessBlock::new(&mut l, &mut r, 48000);
        assert_eq!(block.frames(), 6);
        block.silence();
        assert_eq!(block.left(), &[0.0; 6]);
        assert_eq!(l[6..], [1.0, 1.0]);
    }

    #[test]
    fn only_offline_and_fake_halt() {
        assert!(DriverKind::Offline.halts_at_end_of_song());
        assert!(DriverKind::Fake.halts_at_end_of_song());
        assert!(!DriverKind::Realtime.halts_at_end_of_song());
        assert!(!DriverKind::Null.halts_at_end_of_song());
    }
}
