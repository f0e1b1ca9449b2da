pub mod mute;

pub use mute::{MemberId, MuteKey, MuteRecord, MuteRow, SpaceId};
