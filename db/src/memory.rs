use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::db::{MemberId, MuteKey, MuteRecord, SpaceId};
use crate::{MuteStore, StoreError};

/// Process-local [`MuteStore`], nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<MuteKey, MuteRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    fn rows(&self) -> MutexGuard<'_, HashMap<MuteKey, MuteRecord>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl MuteStore for MemoryStore {
    async fn list_all(&self) -> Result<Vec<MuteRecord>, StoreError> {
        Ok(self.rows().values().cloned().collect())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<MuteRecord>, StoreError> {
        Ok(self
            .rows()
            .values()
            .filter(|record| record.is_expired(now))
            .cloned()
            .collect())
    }

    async fn insert(&self, record: &MuteRecord) -> Result<(), StoreError> {
        let mut rows = self.rows();
        if rows.contains_key(&record.key()) {
            return Err(StoreError::Conflict {
                space: record.space_id,
                member: record.member_id,
            });
        }
        rows.insert(record.key(), record.clone());
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut rows = self.rows();
        let before = rows.len();
        rows.retain(|_, record| !record.is_expired(now));
        Ok((before - rows.len()) as u64)
    }

    async fn delete(&self, space: SpaceId, member: MemberId) -> Result<bool, StoreError> {
        Ok(self.rows().remove(&(space, member)).is_some())
    }

    async fn get(
        &self,
        space: SpaceId,
        member: MemberId,
    ) -> Result<Option<MuteRecord>, StoreError> {
        Ok(self.rows().get(&(space, member)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_insert_conflict() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let record = MuteRecord::new(SpaceId(1), MemberId(2), "Nelly", Utc::now());
        store.insert(&record).await?;
        let err = store.insert(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_rows() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert(&MuteRecord::new(SpaceId(1), MemberId(2), "old", now - Duration::seconds(3)))
            .await?;
        store
            .insert(&MuteRecord::new(SpaceId(1), MemberId(3), "new", now + Duration::seconds(3)))
            .await?;

        let expired = store.list_expired(now).await?;
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].member_id, MemberId(2));

        assert_eq!(store.delete_expired(now).await?, 1);
        assert_eq!(store.list_all().await?.len(), 1);
        assert!(!store.delete(SpaceId(1), MemberId(2)).await?);
        assert!(store.delete(SpaceId(1), MemberId(3)).await?);
        assert!(store.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_expiry_within_the_same_second() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let second = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        store
            .insert(&MuteRecord::new(SpaceId(1), MemberId(2), "Nelly", second + Duration::milliseconds(200)))
            .await?;

        let now = second + Duration::milliseconds(800);
        assert!(store.list_expired(now).await?.is_empty());
        assert_eq!(store.delete_expired(now).await?, 0);
        assert_eq!(store.list_expired(second + Duration::seconds(1)).await?.len(), 1);
        Ok(())
    }
}
