//! Engine preferences, stored as JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Error type for loading and saving preferences.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value parsed but makes no sense
    #[error("invalid preference {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Runtime configuration of the engine. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// `Auto`, `Cpal`, `Fake` or `Null`
    pub audio_driver: String,
    /// `None`, `Channel` or `Midir`
    pub midi_driver: String,
    /// Substring of the hardware MIDI port to open; first port if unset
    pub midi_port: Option<String>,
    /// Frames per block
    pub buffer_size: usize,
    /// Output rate for drivers that do not impose one
    pub sample_rate: u32,
    pub metronome_enabled: bool,
    pub metronome_volume: f32,
    /// Snap realtime notes to the editor grid
    pub quantize_events: bool,
    /// Insert realtime notes into the selected pattern while playing
    pub record_events: bool,
    /// Audition realtime notes
    pub hear_new_notes: bool,
    /// Editor grid, in notes per whole note (4 = quarters, 16 = sixteenths)
    pub grid_resolution: u32,
    pub use_triplets: bool,
    pub event_queue_capacity: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            audio_driver: String::from("Auto"),
            midi_driver: String::from("None"),
            midi_port: None,
            buffer_size: 1024,
            sample_rate: 44100,
            metronome_enabled: false,
            metronome_volume: 0.5,
            quantize_events: true,
            record_events: false,
            hear_new_notes: true,
            grid_resolution: 8,
            use_triplets: false,
            event_queue_capacity: 1024,
        }
    }
}

impl Preferences {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let prefs: Preferences = serde_json::from_str(json)?;
        prefs.validate()?;
        Ok(prefs)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Write the preferences, creating parent directories if needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(invalid("buffer_size", "must be positive"));
        }
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate", "must be positive"));
        }
        if self.grid_resolution == 0 {
            return Err(invalid("grid_resolution", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.metronome_volume) {
            return Err(invalid("metronome_volume", format!("{} is outside 0..=1", self.metronome_volume)));
        }
        Ok(())
    }

    /// Tick spacing of the quantize grid.
    pub fn quantize_scalar(&self) -> u32 {
        let base = if self.use_triplets { 3 } else { 4 };
        (4 * gb_ir::MAX_NOTES / (self.grid_resolution.max(1) * base)).max(1)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
