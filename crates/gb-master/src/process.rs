//! The audio process callback.
//!
//! One call renders one block: poll the driver transport, schedule the
//! ticks the block covers, start due notes, then mix sampler, synth and
//! effects into the main buffer and copy it out.

use std::sync::Arc;
use std::time::Instant;

use gb_audio::{DriverKind, ProcessBlock, ProcessCallback, ProcessStatus, TransportHandle};
use gb_engine::{pitch_offset, BlockClock, Metronome, ScheduleResult, SchedulerEvent};
use gb_ir::InstrumentRef;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::engine_core::EngineCore;
use crate::events::{EngineEvent, EventQueue};
use crate::state::EngineState;

/// Build the driver callback for `core`.
///
/// The callback never waits for the engine lock: on contention it outputs
/// silence and tries again next block.
pub(crate) fn callback(
    core: Arc<Mutex<EngineCore>>,
    transport: TransportHandle,
    kind: DriverKind,
    events: EventQueue,
) -> ProcessCallback {
    Box::new(move |block: &mut ProcessBlock<'_>| {
        let Some(mut guard) = core.try_lock() else {
            block.silence();
            return ProcessStatus::Continue;
        };
        let (status, pattern_changed) = guard.process_block(block, &transport, kind);
        drop(guard);
        if pattern_changed {
            events.push(EngineEvent::PatternChanged);
        }
        status
    })
}

impl EngineCore {
    /// Render one block into `block`. Returns the driver status and
    /// whether a pattern boundary was crossed.
    pub(crate) fn process_block(
        &mut self,
        block: &mut ProcessBlock<'_>,
        driver: &TransportHandle,
        kind: DriverKind,
    ) -> (ProcessStatus, bool) {
        let started = Instant::now();
        self.block_started = Some(started);
        let frames = block.frames();

        if self.halt_pending {
            self.halt_pending = false;
            block.silence();
            return (ProcessStatus::Halt, false);
        }

        if frames != self.main.frames() {
            info!(frames, "buffer size changed");
            self.main.resize(frames);
            self.fx.resize(frames);
        }
        self.main.silence();
        self.fx.silence();

        // Driver transport
        let snapshot = driver.poll();
        if let Some(frame) = snapshot.locate {
            self.seek(frame);
        }
        if snapshot.rolling {
            if self.state == EngineState::Ready {
                let _ = self.start();
            }
            self.realtime_frames = self.transport.frames();
        } else {
            if self.state == EngineState::Playing {
                let _ = self.stop();
            }
            self.realtime_frames += frames as u64;
        }
        if let Some(song) = self.song.as_mut() {
            if snapshot.bpm != song.bpm && snapshot.bpm > 0.0 {
                song.bpm = snapshot.bpm;
            }
            self.transport.set_bpm(song.bpm);
            self.transport.update_tempo(self.sample_rate, song.bpm, song.resolution);
        }

        // Schedule
        let playing = self.state == EngineState::Playing;
        let base_frame = if playing {
            self.transport.frames()
        } else {
            self.realtime_frames
        };
        let tick_size = self.transport.tick_size();
        let mut result = ScheduleResult::Continue;
        if let (Some(song), Some(metronome)) = (self.song.as_ref(), self.metronome.as_ref()) {
            let clock = BlockClock {
                frame: base_frame,
                frames,
                tick_size,
                playing,
            };
            let events = &self.events;
            result = self
                .scheduler
                .update(song, &clock, &mut self.queues, metronome, |event| match event {
                    SchedulerEvent::Metronome { downbeat } => {
                        events.push(EngineEvent::Metronome { downbeat });
                    }
                });
        }
        // Start due notes
        let end_frame = base_frame + frames as u64;
        while let Some(mut note) = self.queues.pop_due(end_frame, tick_size) {
            let instrument = match note.instrument {
                InstrumentRef::Song(i) => self.song.as_ref().and_then(|s| s.instruments.get(i)),
                InstrumentRef::Metronome => self.metronome.as_ref().map(Metronome::instrument),
            };
            let Some(instrument) = instrument else {
                continue;
            };
            note.pitch += pitch_offset(self.scheduler.rng(), instrument.random_pitch_factor);
            self.sampler.note_on(&note, instrument, tick_size, base_frame);
            self.events.push(EngineEvent::NoteOn {
                instrument: note.instrument,
                velocity: note.velocity,
            });
        }

        // Mix
        self.sampler.render(&mut self.main);
        self.synth.process(&mut self.main);
        self.fx.process(&mut self.main);

        if self.state.has_song() {
            self.master_peak.0 = self.main.peak(0, self.master_peak.0);
            self.master_peak.1 = self.main.peak(1, self.master_peak.1);
        }

        if self.state == EngineState::Playing {
            self.transport.advance(frames);
        }

        let (left, right) = block.outputs();
        left.copy_from_slice(self.main.channel(0));
        right.copy_from_slice(self.main.channel(1));

        // The block reaching the end tick is still heard.
        if result == ScheduleResult::EndOfSong {
            info!(frames = self.transport.frames(), "end of song");
            let _ = self.stop();
            driver.stop();
            driver.locate(0);
            self.halt_pending = kind.halts_at_end_of_song();
        }

        let elapsed_ms = started.elapsed().as_secs_f32() * 1000.0;
        let budget_ms = 1000.0 / (self.sample_rate as f32 / frames as f32);
        self.process_time_ms = elapsed_ms;
        self.max_process_time_ms = budget_ms;
        if elapsed_ms > budget_ms {
            warn!(elapsed_ms, budget_ms, "xrun");
            self.events.push(EngineEvent::Xrun);
        }

        (ProcessStatus::Continue, result == ScheduleResult::PatternChanged)
    }
}
