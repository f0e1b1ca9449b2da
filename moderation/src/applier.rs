use std::sync::Arc;

use tenacity_utils::config::ModerationConfig;
use tracing::{debug, warn};

use crate::directory::{CapabilityOverwrite, CapabilitySink, ChannelId, Member, SinkError, Space};

#[derive(Debug, Clone)]
pub enum ResourceOutcome {
    Applied,
    Failed(SinkError),
    /// Not attempted because the configuration leaves it alone.
    Skipped,
}

impl ResourceOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    fn from_result(result: Result<(), SinkError>) -> Self {
        match result {
            Ok(()) => Self::Applied,
            Err(e) => Self::Failed(e),
        }
    }
}

/// What happened to every resource touched by one [`PermissionApplier::apply`] call.
#[derive(Debug, Clone)]
pub struct AppliedResult {
    pub deny: bool,
    pub voice: ResourceOutcome,
    pub channels: Vec<(ChannelId, ResourceOutcome)>,
}

impl AppliedResult {
    pub fn failed_channels(&self) -> Vec<ChannelId> {
        self.channels
            .iter()
            .filter(|(_, outcome)| outcome.is_failed())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        !self.voice.is_failed() && self.channels.iter().all(|(_, o)| !o.is_failed())
    }
}

/// Writes or clears a member's mute on every text channel of a server and on voice.
///
/// Each resource is its own failure domain: a rejected call is logged and recorded, the
/// remaining resources are still attempted. Applying the same state twice leaves the same
/// overwrites in place.
pub struct PermissionApplier {
    sink: Arc<dyn CapabilitySink>,
    config: ModerationConfig,
}

impl PermissionApplier {
    pub fn new(sink: Arc<dyn CapabilitySink>, config: ModerationConfig) -> Self {
        Self { sink, config }
    }

    pub async fn apply(&self, space: &Space, member: &Member, deny: bool) -> AppliedResult {
        let voice = if self.config.mute_voice {
            let outcome =
                ResourceOutcome::from_result(self.sink.set_voice_muted(space.id, member.id, deny).await);
            if let ResourceOutcome::Failed(e) = &outcome {
                warn!(target: "Applier", "Failed to set voice state of {} in {}. Reason: {e}", member.name, space.name);
            }
            outcome
        } else {
            ResourceOutcome::Skipped
        };

        let overwrite = if deny {
            CapabilityOverwrite::deny(self.config.deny_tts)
        } else {
            CapabilityOverwrite::clear()
        };
        debug!(target: "Applier", "Setting permissions for {} to: {overwrite:?}", member.name);

        let mut channels = Vec::new();
        for channel in space.text_channels() {
            let result = self
                .sink
                .set_channel_overwrite(space.id, channel.id, member.id, overwrite)
                .await;
            if let Err(e) = &result {
                warn!(target: "Applier", "Failed to change permissions in {} channel. Reason: {e}", channel.name);
            }
            channels.push((channel.id, ResourceOutcome::from_result(result)));
        }

        AppliedResult {
            deny,
            voice,
            channels,
        }
    }
}
