use core::fmt;

use serde::{Deserialize, Serialize};

/// Which capabilities a mute takes away.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ModerationConfig {
    /// Also server-mute the member in voice channels.
    pub mute_voice: bool,
    /// Deny text-to-speech messages together with regular messages.
    pub deny_tts: bool,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            mute_voice: true,
            deny_tts: true,
        }
    }
}

impl fmt::Display for ModerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mute Voice: {}", self.mute_voice)?;
        writeln!(f, "Deny TTS: {}", self.deny_tts)
    }
}
