//! Engine lifecycle states.

use std::fmt;

/// Where the engine is in its lifecycle.
///
/// `Uninitialized → Initialized → Prepared → Ready → Playing`. `Prepared`
/// means drivers are running without a song; `Ready` means a song is
/// attached and the transport is idle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EngineState {
    #[default]
    Uninitialized,
    Initialized,
    Prepared,
    Ready,
    Playing,
}

impl EngineState {
    /// Drivers are up (with or without a song).
    pub fn drivers_running(self) -> bool {
        matches!(self, EngineState::Prepared | EngineState::Ready | EngineState::Playing)
    }

    /// A song is attached and the mixer tracks peaks.
    pub fn has_song(self) -> bool {
        matches!(self, EngineState::Ready | EngineState::Playing)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Uninitialized => "Uninitialized",
            EngineState::Initialized => "Initialized",
            EngineState::Prepared => "Prepared",
            EngineState::Ready => "Ready",
            EngineState::Playing => "Playing",
        };
        f.write_str(name)
    }
}
