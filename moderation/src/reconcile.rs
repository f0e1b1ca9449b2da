use core::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::scheduler::MuteScheduler;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Expired mutes lifted right away.
    pub restored: usize,
    /// Pending mutes that got a new timer.
    pub scheduled: usize,
    /// Rows whose server or member could not be found, kept for the next pass.
    pub skipped: usize,
    pub already_scheduled: usize,
    pub store_errors: usize,
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "restored {}, scheduled {}, skipped {}, already scheduled {}, store errors {}",
            self.restored, self.scheduled, self.skipped, self.already_scheduled, self.store_errors
        )
    }
}

/// Rebuilds the unmute timers from the database on startup.
pub struct Reconciler {
    scheduler: MuteScheduler,
}

impl Reconciler {
    pub fn new(scheduler: MuteScheduler) -> Self {
        Self { scheduler }
    }

    /// Lifts every mute that expired before `now` and schedules the rest.
    ///
    /// Never fails: rows that cannot be resolved stay in the database for the next run and
    /// store errors are logged and counted. Running it again does not duplicate timers.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        self.restore_expired(now, &mut report).await;
        self.schedule_pending(now, &mut report).await;
        info!(target: "Reconcile", "Mutes reconciled: {report}");
        report
    }

    async fn restore_expired(&self, now: DateTime<Utc>, report: &mut ReconcileReport) {
        let shared = &self.scheduler.shared;
        let expired = match shared.store.list_expired(now).await {
            Ok(expired) => expired,
            Err(e) => {
                error!(target: "Reconcile", "Failed to fetch expired mutes, {e}");
                report.store_errors += 1;
                return;
            }
        };
        if expired.is_empty() {
            return;
        }
        info!(target: "Reconcile", "Members with expired mute found. Removing mutes...");

        let total = expired.len();
        let mut restored = Vec::new();
        for record in expired {
            let _guard = self.scheduler.lock(record.key()).await;
            // Left to the running timer, counted by the second step
            if shared.timers.has(record.space_id, record.member_id) {
                continue;
            }
            let Some((space, member)) = self
                .scheduler
                .try_resolve(record.space_id, record.member_id)
                .await
            else {
                debug!(target: "Reconcile", "Skipping expired mute of {}, not found", record.member_name);
                report.skipped += 1;
                continue;
            };
            shared.applier.apply(&space, &member, false).await;
            restored.push(record.key());
        }
        report.restored = restored.len();

        if report.restored == total {
            if let Err(e) = shared.store.delete_expired(now).await {
                error!(target: "Reconcile", "Failed to remove expired mutes, {e}");
                report.store_errors += 1;
            }
            return;
        }
        for key in restored {
            let _guard = self.scheduler.lock(key).await;
            let (space, member) = key;
            if shared.timers.has(space, member) {
                continue;
            }
            if let Err(e) = shared.store.delete(space, member).await {
                error!(target: "Reconcile", "Failed to remove expired mute of {member}, {e}");
                report.store_errors += 1;
            }
        }
    }

    async fn schedule_pending(&self, now: DateTime<Utc>, report: &mut ReconcileReport) {
        let shared = &self.scheduler.shared;
        let pending = match shared.store.list_all().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(target: "Reconcile", "Failed to fetch pending mutes, {e}");
                report.store_errors += 1;
                return;
            }
        };

        for record in pending {
            let _guard = self.scheduler.lock(record.key()).await;
            if shared.timers.has(record.space_id, record.member_id) {
                report.already_scheduled += 1;
                continue;
            }
            let Some((space, member)) = self
                .scheduler
                .try_resolve(record.space_id, record.member_id)
                .await
            else {
                debug!(target: "Reconcile", "Skipping mute of {}, not found", record.member_name);
                // Expired rows were already counted by the first step
                if !record.is_expired(now) {
                    report.skipped += 1;
                }
                continue;
            };
            let delay = (record.expires_at - now).to_std().unwrap_or(Duration::ZERO);
            self.scheduler.schedule(space, member, delay);
            report.scheduled += 1;
        }
    }
}
