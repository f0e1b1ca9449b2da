use crate::db::{MemberId, SpaceId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Mute already stored for member {member} in server {space}")]
    Conflict { space: SpaceId, member: MemberId },
    #[error("Database error, {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid mute row, {0}")]
    InvalidRow(String),
    #[error("Error, db is not available!")]
    Unavailable,
}
