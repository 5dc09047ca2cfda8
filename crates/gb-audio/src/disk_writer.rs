//! Offline driver rendering the callback into a WAV file.
//!
//! A render thread calls back as fast as it can and writes each block as
//! 16-bit stereo PCM until the callback halts or the driver disconnects.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{error, info};

use crate::traits::{
    AudioOutput, DriverError, DriverKind, ProcessBlock, ProcessCallback, ProcessStatus, Result,
};
use crate::transport::TransportHandle;

type Writer = hound::WavWriter<BufWriter<File>>;

/// Progress of a render, readable from any thread.
#[derive(Clone, Debug, Default)]
pub struct RenderProgress {
    frames: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
}

impl RenderProgress {
    pub fn frames_written(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// True once the render thread has finalized the file.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

pub struct DiskWriterDriver {
    path: PathBuf,
    sample_rate: u32,
    buffer_size: usize,
    transport: TransportHandle,
    progress: RenderProgress,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DiskWriterDriver {
    pub fn new(path: impl AsRef<Path>, sample_rate: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sample_rate,
            buffer_size: 0,
            transport: TransportHandle::new(),
            progress: RenderProgress::default(),
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn progress(&self) -> RenderProgress {
        self.progress.clone()
    }

    pub fn frames_written(&self) -> u64 {
        self.progress.frames_written()
    }

    /// Block until the render thread finishes on its own.
    pub fn wait(&mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    fn spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: 2,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn write_block(writer: &mut Writer, left: &[f32], right: &[f32]) -> hound::Result<()> {
    for (&l, &r) in left.iter().zip(right) {
        writer.write_sample(to_i16(l))?;
        writer.write_sample(to_i16(r))?;
    }
    Ok(())
}

fn render_loop(
    mut writer: Writer,
    mut callback: ProcessCallback,
    buffer_size: usize,
    sample_rate: u32,
    running: Arc<AtomicBool>,
    progress: RenderProgress,
) {
    let mut left = vec![0.0f32; buffer_size];
    let mut right = vec![0.0f32; buffer_size];

    while running.load(Ordering::Acquire) {
        let status = {
            let mut block = ProcessBlock::new(&mut left, &mut right, sample_rate);
            callback(&mut block)
        };
        if status == ProcessStatus::Halt {
            break;
        }
        if let Err(e) = write_block(&mut writer, &left, &right) {
            error!("disk writer failed: {e}");
            break;
        }
        progress.frames.fetch_add(buffer_size as u64, Ordering::AcqRel);
    }

    if let Err(e) = writer.finalize() {
        error!("failed to finalize WAV file: {e}");
    }
    info!(frames = progress.frames_written(), "render finished");
    progress.finished.store(true, Ordering::Release);
}

impl AudioOutput for DiskWriterDriver {
    fn name(&self) -> &'static str {
        "DiskWriter"
    }

    fn kind(&self) -> DriverKind {
        DriverKind::Offline
    }

    fn init(&mut self, buffer_size: usize) -> Result<()> {
        if buffer_size == 0 {
            return Err(DriverError::InvalidBufferSize(buffer_size));
        }
        self.buffer_size = buffer_size;
        Ok(())
    }

    /// Opens the file and starts rendering. The transport rolls from here on.
    fn connect(&mut self, callback: ProcessCallback) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(DriverError::NotInitialized);
        }
        if self.thread.is_some() {
            return Err(DriverError::AlreadyConnected);
        }
        let writer = hound::WavWriter::create(&self.path, self.spec())?;
        info!(path = %self.path.display(), sample_rate = self.sample_rate, "rendering to disk");

        self.progress = RenderProgress::default();
        self.running.store(true, Ordering::Release);
        self.transport.start();

        let running = self.running.clone();
        let progress = self.progress.clone();
        let (buffer_size, sample_rate) = (self.buffer_size, self.sample_rate);
        self.thread = Some(std::thread::spawn(move || {
            render_loop(writer, callback, buffer_size, sample_rate, running, progress);
        }));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.running.store(false, Ordering::Release);
        self.wait();
        self.transport.stop();
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

impl Drop for DiskWriterDriver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_until_halt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut d = DiskWriterDriver::new(&path, 22050);
        d.init(100).unwrap();
        let mut n = 0;
        d.connect(Box::new(move |block| {
            n += 1;
            block.left().fill(0.5);
            block.right().fill(-0.5);
            if n > 4 {
                ProcessStatus::Halt
            } else {
                ProcessStatus::Continue
            }
        }))
        .unwrap();
        assert!(d.transport().is_rolling());
        d.wait();
        assert!(d.progress().is_finished());
        assert_eq!(d.frames_written(), 400);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 22050);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 800);
        assert_eq!(samples[0], to_i16(0.5));
        assert_eq!(samples[1], to_i16(-0.5));
    }

    #[test]
    fn connect_fails_for_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = DiskWriterDriver::new(dir.path().join("missing").join("out.wav"), 48000);
        d.init(64).unwrap();
        let err = d.connect(Box::new(|_| ProcessStatus::Continue)).unwrap_err();
        assert!(matches!(err, DriverError::Wav(_)));
    }

    #[test]
    fn samples_are_clamped() {
        assert_eq!(to_i16(2.0), i16::MAX);
        assert_eq!(to_i16(-2.0), -i16::MAX);
        assert_eq!(to_i16(0.0), 0);
    }
}
