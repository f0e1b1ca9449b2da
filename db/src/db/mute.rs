use core::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};

use crate::StoreError;

/// Identifier of a server (guild).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpaceId(pub u64);

/// Identifier of a member, unique across servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub u64);

/// A member inside a server. At most one mute exists per key.
pub type MuteKey = (SpaceId, MemberId);

/// A timed mute waiting to be lifted. Expiry is kept in whole seconds, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuteRecord {
    pub member_id: MemberId,
    pub member_name: String,
    pub space_id: SpaceId,
    pub expires_at: DateTime<Utc>,
}

/// Raw row of the `mutes` table.
#[derive(Debug, sqlx::FromRow)]
pub struct MuteRow {
    pub id: i64,
    pub member_id: String,
    pub member_name: String,
    pub mute_time: i64,
    pub server_id: String,
}

impl MuteRecord {
    pub fn new(
        space_id: SpaceId,
        member_id: MemberId,
        member_name: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            member_id,
            member_name: member_name.into(),
            space_id,
            expires_at: expires_at.trunc_subsecs(0),
        }
    }

    pub fn key(&self) -> MuteKey {
        (self.space_id, self.member_id)
    }

    /// Compared at second precision, like the `mute_time < ?` query.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.timestamp() < now.timestamp()
    }
}

impl TryFrom<MuteRow> for MuteRecord {
    type Error = StoreError;

    fn try_from(row: MuteRow) -> Result<Self, Self::Error> {
        let expires_at = DateTime::from_timestamp(row.mute_time, 0).ok_or_else(|| {
            StoreError::InvalidRow(format!("row {} has mute_time {}", row.id, row.mute_time))
        })?;
        Ok(Self {
            member_id: row.member_id.parse()?,
            member_name: row.member_name,
            space_id: row.server_id.parse()?,
            expires_at,
        })
    }
}

macro_rules! snowflake {
    ($name:ident) => {
        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map(Self).map_err(|e| {
                    StoreError::InvalidRow(format!("{} `{s}` is not an id, {e}", stringify!($name)))
                })
            }
        }
    };
}

snowflake!(SpaceId);
snowflake!(MemberId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_into_record() -> anyhow::Result<()> {
        let row = MuteRow {
            id: 1,
            member_id: "80351110224678912".into(),
            member_name: "Nelly".into(),
            mute_time: 1_700_000_000,
            server_id: "41771983423143937".into(),
        };
        let record = MuteRecord::try_from(row)?;
        assert_eq!(record.member_id, MemberId(80351110224678912));
        assert_eq!(record.space_id, SpaceId(41771983423143937));
        assert_eq!(record.expires_at.timestamp(), 1_700_000_000);
        Ok(())
    }

    #[test]
    fn test_expiry_in_whole_seconds() -> anyhow::Result<()> {
        let at = DateTime::from_timestamp(1_700_000_000, 750_000_000).unwrap();
        let record = MuteRecord::new(SpaceId(1), MemberId(2), "Nelly", at);
        assert_eq!(record.expires_at.timestamp_subsec_nanos(), 0);

        // Same second is not expired yet, whatever the fraction
        let later = DateTime::from_timestamp(1_700_000_000, 900_000_000).unwrap();
        assert!(!record.is_expired(later));
        let next = DateTime::from_timestamp(1_700_000_001, 0).unwrap();
        assert!(record.is_expired(next));

        let row = MuteRow {
            id: 3,
            member_id: "2".into(),
            member_name: "Nelly".into(),
            mute_time: record.expires_at.timestamp(),
            server_id: "1".into(),
        };
        assert_eq!(MuteRecord::try_from(row)?, record);
        Ok(())
    }

    #[test]
    fn test_row_with_bad_id() {
        let row = MuteRow {
            id: 2,
            member_id: "not-a-snowflake".into(),
            member_name: "Nelly".into(),
            mute_time: 0,
            server_id: "1".into(),
        };
        assert!(matches!(
            MuteRecord::try_from(row),
            Err(StoreError::InvalidRow(_))
        ));
    }
}
