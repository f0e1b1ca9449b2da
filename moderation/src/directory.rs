//! What the scheduler needs from the chat platform: looking servers and members up, and
//! writing permission overwrites.

use core::fmt;

use tenacity_db::db::{MemberId, SpaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
}

impl Channel {
    pub fn new(id: u64, name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            id: ChannelId(id),
            name: name.into(),
            kind,
        }
    }

    pub fn text(id: u64, name: impl Into<String>) -> Self {
        Self::new(id, name, ChannelKind::Text)
    }

    pub fn is_text(&self) -> bool {
        self.kind == ChannelKind::Text
    }
}

/// A server with its channel list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    pub id: SpaceId,
    pub name: String,
    pub channels: Vec<Channel>,
}

impl Space {
    pub fn text_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.is_text())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
}

impl Member {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: MemberId(id),
            name: name.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    async fn space(&self, space: SpaceId) -> Option<Space>;

    /// `None` when the member is not (or no longer) in the server.
    async fn member(&self, space: SpaceId, member: MemberId) -> Option<Member>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    #[error("Missing permissions")]
    PermissionDenied,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Deny,
    /// No overwrite, the member falls back to its roles.
    Inherit,
}

/// Per-member channel overwrite for the text capabilities a mute controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityOverwrite {
    pub send_messages: PermissionState,
    pub send_tts_messages: PermissionState,
    pub add_reactions: PermissionState,
}

impl CapabilityOverwrite {
    pub fn deny(include_tts: bool) -> Self {
        Self {
            send_messages: PermissionState::Deny,
            send_tts_messages: if include_tts {
                PermissionState::Deny
            } else {
                PermissionState::Inherit
            },
            add_reactions: PermissionState::Deny,
        }
    }

    pub fn clear() -> Self {
        Self {
            send_messages: PermissionState::Inherit,
            send_tts_messages: PermissionState::Inherit,
            add_reactions: PermissionState::Inherit,
        }
    }

    pub fn is_clear(&self) -> bool {
        *self == Self::clear()
    }
}

#[async_trait::async_trait]
pub trait CapabilitySink: Send + Sync {
    async fn set_channel_overwrite(
        &self,
        space: SpaceId,
        channel: ChannelId,
        member: MemberId,
        overwrite: CapabilityOverwrite,
    ) -> Result<(), SinkError>;

    async fn set_voice_muted(
        &self,
        space: SpaceId,
        member: MemberId,
        muted: bool,
    ) -> Result<(), SinkError>;
}
