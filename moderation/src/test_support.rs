//! In-process fakes of the platform used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tenacity_db::db::{MemberId, SpaceId};
use tenacity_db::{MemoryStore, MuteStore};
use tenacity_utils::config::ModerationConfig;
use tokio::sync::Notify;

use crate::directory::{
    CapabilityOverwrite, CapabilitySink, Channel, ChannelId, Directory, Member, SinkError, Space,
};
use crate::scheduler::MuteScheduler;

pub const SPACE: SpaceId = SpaceId(1);

pub fn space(id: u64, channels: &[u64]) -> Space {
    Space {
        id: SpaceId(id),
        name: format!("server-{id}"),
        channels: channels
            .iter()
            .map(|c| Channel::text(*c, format!("channel-{c}")))
            .collect(),
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    spaces: Mutex<HashMap<SpaceId, Space>>,
    members: Mutex<HashMap<(SpaceId, MemberId), Member>>,
}

impl FakeDirectory {
    pub fn add_space(&self, space: Space) {
        self.spaces.lock().unwrap().insert(space.id, space);
    }

    pub fn add_member(&self, space: SpaceId, member: Member) {
        self.members.lock().unwrap().insert((space, member.id), member);
    }

    pub fn remove_member(&self, space: SpaceId, member: MemberId) {
        self.members.lock().unwrap().remove(&(space, member));
    }
}

#[async_trait::async_trait]
impl Directory for FakeDirectory {
    async fn space(&self, space: SpaceId) -> Option<Space> {
        self.spaces.lock().unwrap().get(&space).cloned()
    }

    async fn member(&self, space: SpaceId, member: MemberId) -> Option<Member> {
        self.members.lock().unwrap().get(&(space, member)).cloned()
    }
}

type Overwrites = HashMap<(ChannelId, MemberId), CapabilityOverwrite>;
type VoiceStates = HashMap<(SpaceId, MemberId), bool>;

/// Keeps the resulting permission state and every call made.
#[derive(Default)]
pub struct RecordingSink {
    overwrites: Mutex<Overwrites>,
    voice: Mutex<VoiceStates>,
    overwrite_calls: Mutex<usize>,
    voice_calls: Mutex<Vec<(MemberId, bool)>>,
    failing: HashSet<ChannelId>,
    voice_denied: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl RecordingSink {
    pub fn failing_on(channels: &[u64]) -> Self {
        Self {
            failing: channels.iter().copied().map(ChannelId).collect(),
            ..Self::default()
        }
    }

    pub fn deny_voice(&self) {
        self.voice_denied.store(true, Ordering::SeqCst);
    }

    /// The next voice unmute waits until the returned notify is triggered.
    pub fn hold_next_restore(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    pub fn overwrite(&self, channel: ChannelId, member: MemberId) -> Option<CapabilityOverwrite> {
        self.overwrites.lock().unwrap().get(&(channel, member)).copied()
    }

    pub fn voice(&self, space: SpaceId, member: MemberId) -> Option<bool> {
        self.voice.lock().unwrap().get(&(space, member)).copied()
    }

    pub fn snapshot(&self) -> (Overwrites, VoiceStates) {
        (
            self.overwrites.lock().unwrap().clone(),
            self.voice.lock().unwrap().clone(),
        )
    }

    pub fn overwrite_attempts(&self) -> usize {
        *self.overwrite_calls.lock().unwrap()
    }

    /// Number of `apply(.., false)` calls that reached the voice step for `member`.
    pub fn restores(&self, member: MemberId) -> usize {
        self.voice_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, muted)| *m == member && !muted)
            .count()
    }

    /// Whether `member` currently has the mute overwrite on `channel`.
    pub fn is_denied(&self, channel: ChannelId, member: MemberId) -> bool {
        self.overwrite(channel, member)
            .is_some_and(|overwrite| !overwrite.is_clear())
    }
}

#[async_trait::async_trait]
impl CapabilitySink for RecordingSink {
    async fn set_channel_overwrite(
        &self,
        _space: SpaceId,
        channel: ChannelId,
        member: MemberId,
        overwrite: CapabilityOverwrite,
    ) -> Result<(), SinkError> {
        *self.overwrite_calls.lock().unwrap() += 1;
        if self.failing.contains(&channel) {
            return Err(SinkError::PermissionDenied);
        }
        self.overwrites
            .lock()
            .unwrap()
            .insert((channel, member), overwrite);
        Ok(())
    }

    async fn set_voice_muted(
        &self,
        space: SpaceId,
        member: MemberId,
        muted: bool,
    ) -> Result<(), SinkError> {
        self.voice_calls.lock().unwrap().push((member, muted));
        if !muted {
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
        }
        if self.voice_denied.load(Ordering::SeqCst) {
            return Err(SinkError::PermissionDenied);
        }
        self.voice.lock().unwrap().insert((space, member), muted);
        Ok(())
    }
}

/// A scheduler over one server (`SPACE`, channels 10 to 12, members 5 to 7).
pub struct Harness {
    pub scheduler: MuteScheduler,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub directory: Arc<FakeDirectory>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        let directory = Arc::new(FakeDirectory::default());
        directory.add_space(space(SPACE.0, &[10, 11, 12]));
        for (id, name) in [(5, "Nelly"), (6, "Marcus"), (7, "Ada")] {
            directory.add_member(SPACE, Member::new(id, name));
        }
        let sink = Arc::new(RecordingSink::default());
        let scheduler = MuteScheduler::new(
            Arc::clone(&store) as Arc<dyn MuteStore>,
            Arc::clone(&directory) as Arc<dyn Directory>,
            Arc::clone(&sink) as Arc<dyn CapabilitySink>,
            ModerationConfig::default(),
        );
        Self {
            scheduler,
            store,
            sink,
            directory,
        }
    }

    pub async fn has_row(&self, member: MemberId) -> bool {
        self.store.get(SPACE, member).await.unwrap().is_some()
    }
}
