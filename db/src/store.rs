use chrono::{DateTime, Utc};

use crate::db::{MemberId, MuteRecord, SpaceId};
use crate::StoreError;

/// Durable storage of timed mutes.
///
/// Every write is visible to the next read; nothing is buffered. `insert` is the
/// only write that can fail on existing state, deletes on missing rows are no-ops.
#[async_trait::async_trait]
pub trait MuteStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<MuteRecord>, StoreError>;

    /// Mutes whose expiry is strictly before `now`.
    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<MuteRecord>, StoreError>;

    /// Fails with [`StoreError::Conflict`] if the member already has a row in that server.
    async fn insert(&self, record: &MuteRecord) -> Result<(), StoreError>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn delete(&self, space: SpaceId, member: MemberId) -> Result<bool, StoreError>;

    async fn get(&self, space: SpaceId, member: MemberId)
        -> Result<Option<MuteRecord>, StoreError>;
}
