//! Engine error type.

use gb_audio::DriverError;

use crate::config::ConfigError;
use crate::state::EngineState;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// Operation not legal in the current state. Nothing was changed.
    #[error("{op} needs state {expected:?}, engine is {actual}")]
    InvalidState {
        op: &'static str,
        expected: &'static [EngineState],
        actual: EngineState,
    },

    #[error("a song is already set")]
    SongAlreadySet,

    #[error("no song set")]
    NoSong,

    #[error("invalid tempo {0}")]
    InvalidBpm(f32),

    #[error("no export in progress")]
    NoExport,

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
