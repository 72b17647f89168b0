use serde::{Deserialize, Serialize};

/// The reader's user-facing control set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReaderCommand {
    TogglePlay,
    SkipForward,
    SkipBackward,
    WpmUp,
    WpmDown,
    /// Stop and rewind to the first unit.
    Restart,
    /// Stop playback and attention tracking.
    Close,
    ToggleSmartPacer,
    Summarize,
}

impl ReaderCommand {
    /// Maps a keyboard `code` (e.g. `ArrowUp`, `KeyR`). Restart is ignored
    /// when a command modifier is held so platform shortcuts keep working.
    pub fn from_key(code: &str, command_modifier: bool) -> Option<Self> {
        match code {
            "Space" => Some(Self::TogglePlay),
            "ArrowLeft" => Some(Self::SkipBackward),
            "ArrowRight" => Some(Self::SkipForward),
            "ArrowUp" => Some(Self::WpmUp),
            "ArrowDown" => Some(Self::WpmDown),
            "Escape" => Some(Self::Close),
            "KeyR" if !command_modifier => Some(Self::Restart),
            _ => None,
        }
    }
}
