use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tenacity_db::db::{MemberId, SpaceId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One scheduled unmute. The generation tells a job apart from a later job for the same
/// member, so a stale job never touches its successor.
#[derive(Debug)]
pub struct TimerHandle {
    generation: u64,
    token: CancellationToken,
    started: bool,
}

impl TimerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

type Timers = HashMap<SpaceId, HashMap<MemberId, TimerHandle>>;

/// Pending unmute jobs per server and member.
///
/// A member is scheduled for an automatic unmute iff it has an entry here. Cancellation and
/// the job firing race for the same entry: whichever takes the lock first wins. [`cancel`]
/// only stops a job that has not [`claim`]ed its entry yet, a claimed job runs to the end.
///
/// [`cancel`]: TimerRegistry::cancel
/// [`claim`]: TimerRegistry::claim
#[derive(Debug, Default)]
pub struct TimerRegistry {
    timers: Mutex<Timers>,
    generations: AtomicU64,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn timers(&self) -> MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A fresh, unregistered handle.
    pub fn handle(&self) -> TimerHandle {
        TimerHandle {
            generation: self.generations.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
            started: false,
        }
    }

    pub fn has(&self, space: SpaceId, member: MemberId) -> bool {
        self.timers()
            .get(&space)
            .is_some_and(|members| members.contains_key(&member))
    }

    /// Registers `handle`. A replaced handle is cancelled if its job has not started.
    pub fn set(&self, space: SpaceId, member: MemberId, handle: TimerHandle) {
        let replaced = self.timers().entry(space).or_default().insert(member, handle);
        if let Some(old) = replaced {
            debug!(target: "Timers", "Replacing timer {} of {member} in {space}", old.generation);
            if !old.started {
                old.token.cancel();
            }
        }
    }

    /// Drops the entry without cancelling anything. Missing entries are fine.
    pub fn remove(&self, space: SpaceId, member: MemberId) {
        let mut timers = self.timers();
        Self::remove_entry(&mut timers, space, member);
    }

    /// Removes the entry and stops its job if it has not started.
    /// Returns `true` when a pending job was suppressed.
    pub fn cancel(&self, space: SpaceId, member: MemberId) -> bool {
        let mut timers = self.timers();
        match Self::remove_entry(&mut timers, space, member) {
            Some(handle) if !handle.started => {
                handle.token.cancel();
                true
            }
            Some(_) => {
                debug!(target: "Timers", "Unmute job of {member} in {space} already running");
                false
            }
            None => false,
        }
    }

    /// Called by a job once its delay elapsed. Succeeds only if the entry is still the job's
    /// own and was not cancelled; from then on [`cancel`](Self::cancel) no longer stops it.
    pub fn claim(&self, space: SpaceId, member: MemberId, generation: u64) -> bool {
        let mut timers = self.timers();
        match timers.get_mut(&space).and_then(|m| m.get_mut(&member)) {
            Some(handle) if handle.generation == generation && !handle.token.is_cancelled() => {
                handle.started = true;
                true
            }
            _ => false,
        }
    }

    /// Called by a job when it is done. Removes its own entry and returns `false` only when
    /// a newer timer took the member's place, in which case the entry is left alone.
    pub fn finish(&self, space: SpaceId, member: MemberId, generation: u64) -> bool {
        let mut timers = self.timers();
        match timers.get(&space).and_then(|m| m.get(&member)) {
            Some(handle) if handle.generation != generation => false,
            _ => {
                Self::remove_entry(&mut timers, space, member);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.timers().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancels every pending job, returns how many were stopped.
    pub fn shutdown(&self) -> usize {
        let timers = std::mem::take(&mut *self.timers());
        let mut stopped = 0;
        for handle in timers.into_values().flat_map(HashMap::into_values) {
            if !handle.started {
                handle.token.cancel();
                stopped += 1;
            }
        }
        stopped
    }

    fn remove_entry(timers: &mut Timers, space: SpaceId, member: MemberId) -> Option<TimerHandle> {
        let members = timers.get_mut(&space)?;
        let handle = members.remove(&member);
        if members.is_empty() {
            timers.remove(&space);
        }
        handle
    }
}
