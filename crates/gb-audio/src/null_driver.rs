//! Driver that never calls back. Used when nothing else can be opened.

use crate::traits::{AudioOutput, DriverKind, ProcessCallback, Result};
use crate::transport::TransportHandle;

pub struct NullDriver {
    sample_rate: u32,
    buffer_size: usize,
    transport: TransportHandle,
    callback: Option<ProcessCallback>,
}

impl NullDriver {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            buffer_size: 0,
            transport: TransportHandle::new(),
            callback: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.callback.is_some()
    }
}

impl AudioOutput for NullDriver {
    fn name(&self) -> &'static str {
        "Null"
    }

    fn kind(&self) -> DriverKind {
        DriverKind::Null
    }

    fn init(&mut self, buffer_size: usize) -> Result<()> {
        self.buffer_size = buffer_size;
        Ok(())
    }

    fn connect(&mut self, callback: ProcessCallback) -> Result<()> {
        self.callback = Some(callback);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.callback = None;
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
