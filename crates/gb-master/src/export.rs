//! Offline song export through the disk writer driver.

use std::path::Path;
use std::time::Duration;

use gb_audio::{AudioOutput, DiskWriterDriver, DriverKind, RenderProgress, TransportHandle};
use gb_engine::TransportStatus;
use gb_ir::SongMode;
use tracing::{error, info};

use crate::engine_core::EngineCore;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::events::EngineEvent;
use crate::process;
use crate::state::EngineState;

/// Interval between progress checks while waiting for an export.
const PROGRESS_POLL: Duration = Duration::from_millis(10);

/// An export in progress, with what it changed on the song.
pub(crate) struct ExportSession {
    pub(crate) driver: DiskWriterDriver,
    progress: RenderProgress,
    old_mode: SongMode,
    old_loop: bool,
    total_frames: u64,
}

impl EngineCore {
    /// Reset the engine for a render from frame 0 and enter `Playing`.
    /// Returns the song length in frames.
    fn prepare_export(&mut self, transport: TransportHandle, sample_rate: u32, frames: usize) -> Result<u64> {
        self.require("export_song", &[EngineState::Initialized])?;
        let song = self.song.as_ref().ok_or(EngineError::NoSong)?;

        self.sampler.stop_playing_notes();
        self.queues.flush();
        self.main.resize(frames);
        self.fx.resize(frames);
        self.fx.reset();
        self.sample_rate = sample_rate;
        self.sampler.set_sample_rate(sample_rate);
        self.fx.set_sample_rate(sample_rate);

        self.transport.reset_tick_size(sample_rate, song.bpm, song.resolution);
        self.transport.set_bpm(song.bpm);
        self.transport.set_frames(0);
        self.transport.set_status(TransportStatus::Rolling);
        self.scheduler.reset_for_start();
        self.scheduler.relocate(song, 0, false);
        self.realtime_frames = 0;
        let total = self.transport.tick_to_frame(song.total_ticks());

        transport.set_bpm(song.bpm);
        self.driver = Some(transport);
        self.set_state(EngineState::Playing);
        Ok(total)
    }

    /// Leave export: back to `Initialized` with the song's mode and loop flag restored.
    fn finish_export(&mut self, old_mode: SongMode, old_loop: bool) {
        self.sampler.stop_playing_notes();
        self.queues.flush();
        self.transport.set_status(TransportStatus::Stopped);
        self.driver = None;
        if let Some(song) = self.song.as_mut() {
            song.mode = old_mode;
            song.loop_enabled = old_loop;
        }
        self.set_state(EngineState::Initialized);
    }
}

impl Engine {
    /// Render the attached song into a WAV file at `path`.
    ///
    /// Playback stops, the song plays once through in Song mode with looping
    /// off, and the normal drivers are stopped until [`stop_export_song`].
    ///
    /// [`stop_export_song`]: Engine::stop_export_song
    pub fn export_song(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let (old_mode, old_loop, sample_rate, buffer_size) = {
            let mut guard = self.handle.lock();
            let core = &mut *guard;
            let song = core.song.as_mut().ok_or(EngineError::NoSong)?;
            let old = (song.mode, song.loop_enabled);
            song.mode = SongMode::Song;
            song.loop_enabled = false;
            if core.state == EngineState::Playing {
                core.sequencer_stop();
            }
            core.sampler.stop_playing_notes();
            (old.0, old.1, core.sample_rate, core.prefs.buffer_size)
        };

        if self.driver.is_some() {
            self.stop_audio_drivers()?;
        }

        let mut driver = DiskWriterDriver::new(path.as_ref(), sample_rate);
        let started = driver.init(buffer_size).map_err(EngineError::from).and_then(|()| {
            let total = self.handle.lock().prepare_export(
                driver.transport().clone(),
                sample_rate,
                driver.buffer_size(),
            )?;
            let callback = process::callback(
                self.handle.core.clone(),
                driver.transport().clone(),
                DriverKind::Offline,
                self.handle.events.clone(),
            );
            driver.connect(callback)?;
            Ok(total)
        });

        match started {
            Ok(total_frames) => {
                info!(path = %path.as_ref().display(), total_frames, "export started");
                self.export = Some(ExportSession {
                    progress: driver.progress(),
                    driver,
                    old_mode,
                    old_loop,
                    total_frames,
                });
                Ok(())
            }
            Err(e) => {
                error!(path = %path.as_ref().display(), error = %e, "export failed to start");
                {
                    let mut core = self.handle.lock();
                    if core.state() != EngineState::Initialized {
                        core.finish_export(old_mode, old_loop);
                    } else if let Some(song) = core.song_mut() {
                        song.mode = old_mode;
                        song.loop_enabled = old_loop;
                    }
                }
                self.start_audio_drivers()?;
                Err(e)
            }
        }
    }

    /// Block until the running export has rendered the whole song, pushing
    /// [`EngineEvent::Progress`] as it goes. Returns the frames written.
    pub fn wait_export(&mut self) -> Result<u64> {
        let session = self.export.as_mut().ok_or(EngineError::NoExport)?;
        let total = session.total_frames.max(1);
        let mut last = None;
        loop {
            let finished = session.progress.is_finished();
            let percent = if finished {
                100
            } else {
                (session.progress.frames_written() * 100 / total).min(99) as u8
            };
            if last != Some(percent) {
                self.handle.events.push(EngineEvent::Progress(percent));
                last = Some(percent);
            }
            if finished {
                break;
            }
            std::thread::sleep(PROGRESS_POLL);
        }
        session.driver.wait();
        Ok(session.progress.frames_written())
    }

    /// Whether an export session is open.
    pub fn is_exporting(&self) -> bool {
        self.export.is_some()
    }

    /// End the export session and bring the normal drivers back.
    pub fn stop_export_song(&mut self) -> Result<()> {
        let mut session = self.export.take().ok_or(EngineError::NoExport)?;
        self.handle.lock().sampler.stop_playing_notes();
        session.driver.disconnect();
        info!(frames = session.progress.frames_written(), "export stopped");

        self.handle.lock().finish_export(session.old_mode, session.old_loop);
        self.start_audio_drivers()
    }
}
