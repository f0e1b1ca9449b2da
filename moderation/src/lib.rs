//! Timed mutes for chat servers.
//!
//! A mute denies a member sending messages and reactions on every text channel and mutes it
//! in voice. Timed mutes are stored in the database and lifted by a per-member timer; on
//! startup the [`Reconciler`] rebuilds those timers from the stored rows.

pub mod applier;
pub mod directory;
pub mod duration;
pub mod error;
pub mod reconcile;
pub mod scheduler;
pub mod timers;

#[cfg(test)]
mod test_support;

pub use applier::{AppliedResult, PermissionApplier, ResourceOutcome};
pub use directory::{
    CapabilityOverwrite, CapabilitySink, Channel, ChannelId, ChannelKind, Directory, Member,
    PermissionState, SinkError, Space,
};
pub use duration::{humanize, MuteDuration, TimeUnit};
pub use error::{ModerationError, ModerationResult};
pub use reconcile::{ReconcileReport, Reconciler};
pub use scheduler::{MuteOutcome, MuteScheduler, Unmuted};
pub use timers::{TimerHandle, TimerRegistry};

pub use tenacity_db::db::{MemberId, MuteRecord, SpaceId};
