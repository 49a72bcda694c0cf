use bevy::{prelude::*, transform::TransformSystems};

use crate::{
    drawing::DebugTraces,
    instance::{LocomotionInstance, LocomotionSettingsHandle},
    math::Rotator,
    queries::SurfaceProbeHandle,
    requests::SlotPlaybackQueue,
    settings::{LocomotionSettings, LocomotionSettingsLoader},
    snapshot::{CharacterFrame, FootTargets, MovementBaseInput, TransitionRequest},
    state::{
        FeetState, FootState, Gait, GroundedEntryMode, GroundedState, InAirState, LayeringState,
        LeanState, LocomotionAction, LocomotionMode, LocomotionState, MovementDirection, PoseState,
        RagdollingState, RotateInPlaceState, RotationMode, SlotName, Stance, TransitionsState,
        TurnInPlaceState, ViewMode, ViewState,
    },
    systems::{
        apply_debug_traces, drain_playback_requests, update_locomotion,
        update_locomotion_exclusive,
    },
};

/// Adds the procedural locomotion layer to an app.
#[derive(Default)]
pub struct LocomotionGraphPlugin;

impl Plugin for LocomotionGraphPlugin {
    fn build(&self, app: &mut App) {
        self.register_types(app);
        app //
            .init_asset::<LocomotionSettings>()
            .init_asset_loader::<LocomotionSettingsLoader>()
            .init_resource::<SlotPlaybackQueue>()
            .init_resource::<SurfaceProbeHandle>()
            .add_systems(
                PostUpdate,
                (
                    update_locomotion_exclusive,
                    update_locomotion,
                    drain_playback_requests,
                    apply_debug_traces,
                )
                    .chain()
                    .before(TransformSystems::Propagate),
            );
    }
}

impl LocomotionGraphPlugin {
    fn register_types(&self, app: &mut App) {
        app //
            .register_type::<LocomotionSettings>()
            .register_asset_reflect::<LocomotionSettings>()
            .register_type::<LocomotionSettingsHandle>()
            .register_type::<LocomotionInstance>()
            .register_type::<CharacterFrame>()
            .register_type::<MovementBaseInput>()
            .register_type::<FootTargets>()
            .register_type::<TransitionRequest>()
            .register_type::<Rotator>()
            .register_type::<LocomotionMode>()
            .register_type::<Stance>()
            .register_type::<Gait>()
            .register_type::<RotationMode>()
            .register_type::<ViewMode>()
            .register_type::<LocomotionAction>()
            .register_type::<GroundedEntryMode>()
            .register_type::<MovementDirection>()
            .register_type::<SlotName>()
            .register_type::<LocomotionState>()
            .register_type::<LayeringState>()
            .register_type::<PoseState>()
            .register_type::<ViewState>()
            .register_type::<GroundedState>()
            .register_type::<InAirState>()
            .register_type::<LeanState>()
            .register_type::<FeetState>()
            .register_type::<FootState>()
            .register_type::<TransitionsState>()
            .register_type::<RotateInPlaceState>()
            .register_type::<TurnInPlaceState>()
            .register_type::<RagdollingState>()
            .register_type::<DebugTraces>();
    }
}
