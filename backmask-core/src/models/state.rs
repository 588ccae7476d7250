use std::fmt;

/// Recorder state machine.
///
/// ```text
/// stopped → record() → recording → stop() / write failure → stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Stopped,
    Recording,
}

impl RecorderState {
    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }
}

/// Player state machine.
///
/// ```text
/// stopped → play() → playing → stop() / end of stream → stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
}

impl PlayerState {
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// The session's single busy gate. At most one non-idle activity at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    #[default]
    Idle,
    Recording,
    Playing,
    Reversing,
}

impl Activity {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Playing => "playing",
            Self::Reversing => "reversing",
        };
        f.write_str(name)
    }
}

/// Which file the player reads on the next `start_playback()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackTarget {
    #[default]
    Original,
    Reversed,
}
