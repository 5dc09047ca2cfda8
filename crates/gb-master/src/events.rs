//! Engine notifications.
//!
//! Events go through a bounded channel. Pushing never blocks: when the
//! queue is full the event is dropped, so the audio callback can notify
//! freely.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use gb_ir::InstrumentRef;

use crate::state::EngineState;

/// Error codes carried by [`EngineEvent::Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// The configured audio driver name is not known.
    UnknownDriver,
    /// No audio driver could be started; the null driver is in use.
    ErrorStartingDriver,
}

/// Notification pushed to front ends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EngineEvent {
    State(EngineState),
    PatternChanged,
    /// Realtime recording changed a pattern.
    PatternModified,
    SelectedPatternChanged(usize),
    SelectedInstrumentChanged(usize),
    NoteOn { instrument: InstrumentRef, velocity: f32 },
    Error(ErrorCode),
    /// A block took longer to render than it lasts.
    Xrun,
    Metronome { downbeat: bool },
    /// Export progress in percent.
    Progress(u8),
}

/// Bounded multi-consumer event queue.
#[derive(Clone, Debug)]
pub struct EventQueue {
    tx: Sender<EngineEvent>,
    rx: Receiver<EngineEvent>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx }
    }

    /// Push without blocking. Returns false if the event was dropped.
    pub fn push(&self, event: EngineEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// A receiver sharing this queue. Each event reaches one receiver.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.rx.clone()
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.rx.try_recv().ok()
    }

    /// Take every pending event.
    pub fn drain(&self) -> Vec<EngineEvent> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_drops_instead_of_blocking() {
        let q = EventQueue::new(2);
        assert!(q.push(EngineEvent::Xrun));
        assert!(q.push(EngineEvent::PatternChanged));
        assert!(!q.push(EngineEvent::PatternModified));
        assert_eq!(q.drain(), vec![EngineEvent::Xrun, EngineEvent::PatternChanged]);
        assert!(q.is_empty());
    }

    #[test]
    fn subscribers_share_the_queue() {
        let q = EventQueue::new(8);
        let rx = q.subscribe();
        q.push(EngineEvent::Progress(50));
        assert_eq!(rx.try_recv().ok(), Some(EngineEvent::Progress(50)));
        assert_eq!(q.try_recv(), None);
    }
}
