//! Deferred playback requests.
//!
//! The worker-thread phase may decide to play or stop slot animations, but
//! playback mutates the animation player and must happen with exclusive
//! access. Each character therefore queues requests on its own component
//! during the worker-thread phase; [`drain_playback_requests`](crate::systems::drain_playback_requests)
//! moves them into the shared [`SlotPlaybackQueue`] afterwards, where the
//! game's playback integration consumes them.

use bevy::{animation::AnimationClip, asset::prelude::*, prelude::*, reflect::Reflect};

use crate::state::SlotName;

/// A one-shot clip to play on a slot, fire and forget.
#[derive(Reflect, Clone, Debug)]
pub struct PlaySlotAnimation {
    pub clip: Handle<AnimationClip>,
    pub slot: SlotName,
    pub blend_in_time: f32,
    pub blend_out_time: f32,
    pub play_rate: f32,
    pub start_time: f32,
}

#[derive(Reflect, Clone, Debug)]
pub enum PlaybackRequest {
    Play(PlaySlotAnimation),
    Stop { slot: SlotName, blend_out_time: f32 },
    /// The ragdoll blend-out finished; the owning character should tear down
    /// its ragdoll physics state.
    FinalizeRagdolling,
}

/// Requests from all characters, tagged with the character entity. Drained
/// (and expected to be consumed) every tick.
#[derive(Resource, Default, Debug)]
pub struct SlotPlaybackQueue {
    requests: Vec<(Entity, PlaybackRequest)>,
}

impl SlotPlaybackQueue {
    pub fn push(&mut self, entity: Entity, request: PlaybackRequest) {
        self.requests.push((entity, request));
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (Entity, PlaybackRequest)> + '_ {
        self.requests.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
