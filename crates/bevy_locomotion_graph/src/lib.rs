//! # Bevy Locomotion Graph
//!
//! A per-frame procedural locomotion layer for humanoid characters in
//! [Bevy](https://bevyengine.org/). Every simulation tick it turns the
//! character's movement state into the blend parameters a locomotion blend
//! graph consumes: velocity and lean blends, stride and play rates, look-at
//! and spine angles, foot locking and IK offsets, turn-in-place and
//! transition clip selection.
//!
//! The layer is split into three phases:
//!
//! - An **exclusive** phase consumes the per-tick [`CharacterFrame`] the game
//!   writes (movement state, sampled graph curves, one-shot requests) and
//!   folds it into an immutable snapshot.
//! - A **worker-thread** phase derives all blend parameters from the
//!   snapshot, in parallel across characters. World-geometry queries go
//!   through the [`SurfaceProbe`] trait, backed either by a game-provided
//!   implementation or by Avian with the `physics_avian` feature.
//! - A **post-evaluation** phase drains queued one-shot clip playback into
//!   the [`SlotPlaybackQueue`] resource for the game's animation player to
//!   consume.
//!
//! Tuning lives in a [`LocomotionSettings`] asset loaded from a
//! `*.locomotion.ron` file and shared between characters.
//!
//! [`CharacterFrame`]: crate::snapshot::CharacterFrame
//! [`SurfaceProbe`]: crate::queries::SurfaceProbe
//! [`SlotPlaybackQueue`]: crate::requests::SlotPlaybackQueue
//! [`LocomotionSettings`]: crate::settings::LocomotionSettings

pub mod curves;
pub mod drawing;
pub mod feet;
pub mod float_curve;
pub mod grounded;
pub mod in_air;
pub mod instance;
pub mod math;
#[cfg(feature = "physics_avian")]
pub mod physics_avian;
pub mod plugin;
pub mod pose;
pub mod queries;
pub mod requests;
pub mod settings;
pub mod snapshot;
pub mod state;
pub mod systems;
pub mod transitions;
pub mod view;

pub mod prelude {
    #[cfg(feature = "physics_avian")]
    pub use super::physics_avian::AvianSurfaceProbe;
    pub use super::{
        float_curve::FloatCurve,
        instance::{LocomotionInstance, LocomotionSettingsHandle},
        math::Rotator,
        plugin::LocomotionGraphPlugin,
        queries::{SurfaceHit, SurfaceProbe, SurfaceProbeHandle},
        requests::{PlaySlotAnimation, PlaybackRequest, SlotPlaybackQueue},
        settings::LocomotionSettings,
        snapshot::{CharacterFrame, FootTargets, MovementBaseInput, TransitionRequest},
        state::{
            Foot, Gait, GroundedEntryMode, LocomotionAction, LocomotionMode, RotationMode,
            SlotName, Stance, ViewMode,
        },
    };
}
