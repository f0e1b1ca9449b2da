use core::fmt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tenacity_db::db::{MemberId, MuteKey, MuteRecord, SpaceId};
use tenacity_db::MuteStore;
use tenacity_utils::config::ModerationConfig;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::applier::PermissionApplier;
use crate::directory::{CapabilitySink, Directory, Member, Space};
use crate::duration::MuteDuration;
use crate::error::{ModerationError, ModerationResult};
use crate::reconcile::Reconciler;
use crate::timers::TimerRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteOutcome {
    Permanent,
    Timed(Duration),
}

impl fmt::Display for MuteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent => write!(f, "{}", MuteDuration::Permanent),
            Self::Timed(duration) => write!(f, "{}", MuteDuration::Timed(*duration)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unmuted {
    /// A pending automatic unmute was cancelled.
    Scheduled,
    /// Nothing was scheduled (permanent mute, already expired or never muted).
    Untracked,
}

/// Serializes commands for the same member. Idle entries are pruned on the next lock.
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<MuteKey, Arc<TokioMutex<()>>>>,
}

impl KeyLocks {
    async fn lock(&self, key: MuteKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(key).or_default())
        };
        lock.lock_owned().await
    }
}

pub(crate) struct Shared {
    pub(crate) store: Arc<dyn MuteStore>,
    pub(crate) directory: Arc<dyn Directory>,
    pub(crate) applier: PermissionApplier,
    pub(crate) timers: TimerRegistry,
    locks: KeyLocks,
}

/// Mutes and unmutes members, keeping the store and the pending timers in step.
#[derive(Clone)]
pub struct MuteScheduler {
    pub(crate) shared: Arc<Shared>,
}

impl MuteScheduler {
    pub fn new(
        store: Arc<dyn MuteStore>,
        directory: Arc<dyn Directory>,
        sink: Arc<dyn CapabilitySink>,
        config: ModerationConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                directory,
                applier: PermissionApplier::new(sink, config),
                timers: TimerRegistry::new(),
                locks: KeyLocks::default(),
            }),
        }
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.shared.timers
    }

    pub fn store(&self) -> &Arc<dyn MuteStore> {
        &self.shared.store
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.clone())
    }

    /// Whether the member is waiting for an automatic unmute.
    pub fn is_muted(&self, space: SpaceId, member: MemberId) -> bool {
        self.shared.timers.has(space, member)
    }

    pub async fn mute_str(
        &self,
        space: SpaceId,
        member: MemberId,
        duration: &str,
    ) -> ModerationResult<MuteOutcome> {
        let duration = MuteDuration::parse(duration)?;
        self.mute(space, member, duration).await
    }

    pub async fn mute(
        &self,
        space_id: SpaceId,
        member_id: MemberId,
        duration: MuteDuration,
    ) -> ModerationResult<MuteOutcome> {
        let (space, member) = self.resolve(space_id, member_id).await?;
        let _guard = self.shared.locks.lock((space_id, member_id)).await;

        if self.shared.timers.has(space_id, member_id) {
            return Err(ModerationError::AlreadyMuted {
                space: space_id,
                member: member_id,
            });
        }
        let expiry = match duration {
            MuteDuration::Permanent => None,
            MuteDuration::Timed(delay) => Some((delay, expires_at(Utc::now(), delay)?)),
        };

        let applied = self.shared.applier.apply(&space, &member, true).await;
        if !applied.is_complete() {
            warn!(target: "MuteScheduler", "Mute of {} in {} only partially applied", member.name, space.name);
        }

        let Some((delay, expires_at)) = expiry else {
            info!(target: "MuteScheduler", "Member {} has been muted permanently", member.name);
            return Ok(MuteOutcome::Permanent);
        };

        let record = MuteRecord::new(space_id, member_id, member.name.clone(), expires_at);
        let name = member.name.clone();
        self.schedule(space, member, delay);
        if let Err(e) = self.shared.store.insert(&record).await {
            error!(target: "MuteScheduler", "Failed to store mute of {name}, {e}");
            self.shared.timers.cancel(space_id, member_id);
            return Err(e.into());
        }

        info!(target: "MuteScheduler", "Member {name} has been muted {duration}");
        Ok(MuteOutcome::Timed(delay))
    }

    /// Lifts the mute now. Members without a pending unmute are cleared as well.
    pub async fn unmute(&self, space_id: SpaceId, member_id: MemberId) -> ModerationResult<Unmuted> {
        let (space, member) = self.resolve(space_id, member_id).await?;
        let _guard = self.shared.locks.lock((space_id, member_id)).await;

        let applied = self.shared.applier.apply(&space, &member, false).await;
        if !applied.is_complete() {
            warn!(target: "MuteScheduler", "Unmute of {} in {} only partially applied", member.name, space.name);
        }

        let outcome = if self.shared.timers.has(space_id, member_id) {
            self.shared.timers.cancel(space_id, member_id);
            Unmuted::Scheduled
        } else {
            Unmuted::Untracked
        };
        self.shared.store.delete(space_id, member_id).await?;

        info!(target: "MuteScheduler", "Member {} has been unmuted by command", member.name);
        Ok(outcome)
    }

    /// Cancels all pending unmutes. Their rows stay, the next reconciliation picks them up.
    pub fn shutdown(&self) -> usize {
        let stopped = self.shared.timers.shutdown();
        info!(target: "MuteScheduler", "Stopped {stopped} unmute timers");
        stopped
    }

    pub(crate) async fn lock(&self, key: MuteKey) -> OwnedMutexGuard<()> {
        self.shared.locks.lock(key).await
    }

    pub(crate) async fn try_resolve(
        &self,
        space: SpaceId,
        member: MemberId,
    ) -> Option<(Space, Member)> {
        let space = self.shared.directory.space(space).await?;
        let member = self.shared.directory.member(space.id, member).await?;
        Some((space, member))
    }

    async fn resolve(&self, space_id: SpaceId, member_id: MemberId) -> ModerationResult<(Space, Member)> {
        let space = self
            .shared
            .directory
            .space(space_id)
            .await
            .ok_or(ModerationError::UnknownSpace(space_id))?;
        let member = self
            .shared
            .directory
            .member(space_id, member_id)
            .await
            .ok_or(ModerationError::UnknownMember {
                space: space_id,
                member: member_id,
            })?;
        Ok((space, member))
    }

    /// Registers a timer for the member and spawns the job that unmutes it after `delay`.
    pub(crate) fn schedule(&self, space: Space, member: Member, delay: Duration) {
        let handle = self.shared.timers.handle();
        let (generation, token) = (handle.generation(), handle.token());
        self.shared.timers.set(space.id, member.id, handle);
        debug!(target: "MuteScheduler", "Unmute of {} in {:?}", member.name, delay);
        tokio::spawn(expire(
            Arc::clone(&self.shared),
            space,
            member,
            delay,
            generation,
            token,
        ));
    }
}

fn expires_at(now: DateTime<Utc>, delay: Duration) -> ModerationResult<DateTime<Utc>> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| ModerationError::InvalidDuration(format!("{delay:?} is too long")))
}

async fn expire(
    shared: Arc<Shared>,
    space: Space,
    member: Member,
    delay: Duration,
    generation: u64,
    token: CancellationToken,
) {
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!(target: "MuteJob", "Unmute timer of {} cancelled", member.name);
            return;
        }
        _ = tokio::time::sleep(delay) => {}
    }

    // Held until the row is gone, so commands for this member wait for the restore
    let _guard = shared.locks.lock((space.id, member.id)).await;
    if !shared.timers.claim(space.id, member.id, generation) {
        debug!(target: "MuteJob", "Unmute timer of {} lost the race to a command", member.name);
        return;
    }

    // Channels may have changed while the member was muted
    let space = shared.directory.space(space.id).await.unwrap_or(space);
    let applied = shared.applier.apply(&space, &member, false).await;
    if !applied.is_complete() {
        warn!(target: "MuteJob", "Unmute of {} in {} only partially applied", member.name, space.name);
    }

    if shared.timers.finish(space.id, member.id, generation) {
        if let Err(e) = shared.store.delete(space.id, member.id).await {
            error!(target: "MuteJob", "Failed to remove mute of {} from database, {e}", member.name);
        }
    }
    info!(target: "MuteJob", "Member {} has been unmuted.", member.name);
}
