//! CPAL-based hardware output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use tracing::{error, info};

use crate::traits::{
    AudioOutput, DriverError, DriverKind, ProcessBlock, ProcessCallback, ProcessStatus, Result,
};
use crate::transport::TransportHandle;

/// Default output device of the default host.
pub struct CpalDriver {
    device: Option<Device>,
    config: Option<StreamConfig>,
    stream: Option<Stream>,
    buffer_size: usize,
    transport: TransportHandle,
}

impl Default for CpalDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalDriver {
    pub fn new() -> Self {
        Self {
            device: None,
            config: None,
            stream: None,
            buffer_size: 0,
            transport: TransportHandle::new(),
        }
    }
}

/// Feeds a device callback of any length from fixed-size engine blocks.
struct BlockSlicer {
    callback: ProcessCallback,
    left: Vec<f32>,
    right: Vec<f32>,
    cursor: usize,
    sample_rate: u32,
    halted: bool,
}

impl BlockSlicer {
    fn new(callback: ProcessCallback, buffer_size: usize, sample_rate: u32) -> Self {
        Self {
            callback,
            left: vec![0.0; buffer_size],
            right: vec![0.0; buffer_size],
            // Empty, so the first device frame pulls a block.
            cursor: buffer_size,
            sample_rate,
            halted: false,
        }
    }

    fn fill(&mut self, data: &mut [f32], channels: usize) {
        for chunk in data.chunks_mut(channels) {
            if self.cursor == self.left.len() {
                self.refill();
            }
            let (l, r) = (self.left[self.cursor], self.right[self.cursor]);
            self.cursor += 1;
            // Write stereo pair; zero-fill any extra channels
            for (i, sample) in chunk.iter_mut().enumerate() {
                *sample = match i {
                    0 => l,
                    1 => r,
                    _ => 0.0,
                };
            }
        }
    }

    fn refill(&mut self) {
        self.cursor = 0;
        if self.halted {
            self.left.fill(0.0);
            self.right.fill(0.0);
            return;
        }
        let mut block = ProcessBlock::new(&mut self.left, &mut self.right, self.sample_rate);
        if (self.callback)(&mut block) == ProcessStatus::Halt {
            self.halted = true;
        }
    }
}

impl AudioOutput for CpalDriver {
    fn name(&self) -> &'static str {
        "Cpal"
    }

    fn kind(&self) -> DriverKind {
        DriverKind::Realtime
    }

    fn init(&mut self, buffer_size: usize) -> Result<()> {
        if buffer_size == 0 {
            return Err(DriverError::InvalidBufferSize(buffer_size));
        }
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(DriverError::NoDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| DriverError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = config.into();
        // Force stereo output; the slicer assumes 2-channel interleaving
        config.channels = 2;

        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            buffer_size,
            "cpal output opened"
        );
        self.device = Some(device);
        self.config = Some(config);
        self.buffer_size = buffer_size;
        Ok(())
    }

    fn connect(&mut self, callback: ProcessCallback) -> Result<()> {
        if self.stream.is_some() {
            return Err(DriverError::AlreadyConnected);
        }
        let (Some(device), Some(config)) = (self.device.as_ref(), self.config.as_ref()) else {
            return Err(DriverError::NotInitialized);
        };
        let channels = config.channels as usize;
        let mut slicer = BlockSlicer::new(callback, self.buffer_size, config.sample_rate.0);

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| slicer.fill(data, channels),
                |err| error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| DriverError::StreamCreate(e.to_string()))?;

        stream.play().map_err(|e| DriverError::Playback(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                error!("failed to pause stream: {e}");
            }
        }
    }

    fn sample_rate(&self) -> u32 {
        self.config.as_ref().map_or(0, |c| c.sample_rate.0)
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn transport(&self) -> &TransportHandle {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slicer_spans_device_callbacks() {
        let mut n = 0.0;
        let callback: ProcessCallback = Box::new(move |block| {
            n += 1.0;
            block.left().fill(n);
            block.right().fill(-n);
            ProcessStatus::Continue
        });
        let mut slicer = BlockSlicer::new(callback, 4, 48000);

        let mut data = [0.0f32; 12];
        slicer.fill(&mut data, 2);
        assert_eq!(data, [1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 2.0, -2.0, 2.0, -2.0]);

        let mut data = [0.0f32; 6];
        slicer.fill(&mut data, 3);
        assert_eq!(data, [2.0, -2.0, 0.0, 2.0, -2.0, 0.0]);
    }

    #[test]
    fn slicer_outputs_silence_after_halt() {
        let callback: ProcessCallback = Box::new(|block| {
            block.left().fill(1.0);
            ProcessStatus::Halt
        });
        let mut slicer = BlockSlicer::new(callback, 2, 48000);
        let mut data = [0.0f32; 8];
        slicer.fill(&mut data, 2);
        assert_eq!(data, [1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }
}
