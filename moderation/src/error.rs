use tenacity_db::db::{MemberId, SpaceId};
use tenacity_db::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("Member {member} is already muted in server {space}")]
    AlreadyMuted { space: SpaceId, member: MemberId },
    #[error("Invalid amount of time, {0}")]
    InvalidDuration(String),
    #[error("Unknown server {0}")]
    UnknownSpace(SpaceId),
    #[error("Member {member} not found in server {space}")]
    UnknownMember { space: SpaceId, member: MemberId },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ModerationResult<T> = Result<T, ModerationError>;
