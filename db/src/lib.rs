pub mod db;
pub mod error;
pub mod memory;
pub mod store;

use chrono::{DateTime, Utc};
use db::{MemberId, MuteRecord, MuteRow, SpaceId};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::MuteStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS mutes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    member_id TEXT NOT NULL,
    member_name TEXT NOT NULL,
    mute_time INTEGER NOT NULL,
    server_id TEXT NOT NULL,
    UNIQUE (member_id, server_id)
)";

#[derive(Debug, Default)]
pub struct TenacityDB {
    pub db: Option<SqlitePool>,
}

impl TenacityDB {
    pub async fn new_memory() -> anyhow::Result<Self> {
        // Every connection to `sqlite::memory:` is its own database
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(db).await
    }

    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        if url.contains(":memory:") {
            return Self::new_memory().await;
        }
        let db = SqlitePoolOptions::new().connect(url).await?;
        Self::with_pool(db).await
    }

    async fn with_pool(db: SqlitePool) -> anyhow::Result<Self> {
        sqlx::query(SCHEMA).execute(&db).await?;
        info!(target: "DbMutes", "Mutes table ready");
        Ok(Self { db: Some(db) })
    }

    fn db(&self) -> Result<&SqlitePool, StoreError> {
        self.db.as_ref().ok_or(StoreError::Unavailable)
    }

    async fn fetch(&self, query: &str, now: Option<i64>) -> Result<Vec<MuteRecord>, StoreError> {
        let mut query = sqlx::query_as::<_, MuteRow>(query);
        if let Some(now) = now {
            query = query.bind(now);
        }
        query
            .fetch_all(self.db()?)
            .await?
            .into_iter()
            .map(MuteRecord::try_from)
            .collect()
    }
}

#[async_trait::async_trait]
impl MuteStore for TenacityDB {
    async fn list_all(&self) -> Result<Vec<MuteRecord>, StoreError> {
        self.fetch("SELECT * FROM mutes", None).await
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<MuteRecord>, StoreError> {
        self.fetch("SELECT * FROM mutes WHERE mute_time < ?", Some(now.timestamp()))
            .await
    }

    async fn insert(&self, record: &MuteRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO mutes(member_id, member_name, mute_time, server_id) VALUES (?, ?, ?, ?)",
        )
        .bind(record.member_id.to_string())
        .bind(&record.member_name)
        .bind(record.expires_at.timestamp())
        .bind(record.space_id.to_string())
        .execute(self.db()?)
        .await;

        match result {
            Ok(_) => {
                debug!(target: "DbMutes", "Stored mute for {} until {}", record.member_name, record.expires_at);
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StoreError::Conflict {
                space: record.space_id,
                member: record.member_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let done = sqlx::query("DELETE FROM mutes WHERE mute_time < ?")
            .bind(now.timestamp())
            .execute(self.db()?)
            .await?;
        Ok(done.rows_affected())
    }

    async fn delete(&self, space: SpaceId, member: MemberId) -> Result<bool, StoreError> {
        let done = sqlx::query("DELETE FROM mutes WHERE member_id = ? AND server_id = ?")
            .bind(member.to_string())
            .bind(space.to_string())
            .execute(self.db()?)
            .await?;
        if done.rows_affected() == 0 {
            info!(target: "DbUnmute", "Member {member} not in database for server {space}");
        }
        Ok(done.rows_affected() > 0)
    }

    async fn get(
        &self,
        space: SpaceId,
        member: MemberId,
    ) -> Result<Option<MuteRecord>, StoreError> {
        sqlx::query_as::<_, MuteRow>("SELECT * FROM mutes WHERE member_id = ? AND server_id = ?")
            .bind(member.to_string())
            .bind(space.to_string())
            .fetch_optional(self.db()?)
            .await?
            .map(MuteRecord::try_from)
            .transpose()
    }
}
