//! Exclusive-phase frame snapshot.
//!
//! The game fills a [`CharacterFrame`] for each character every simulation
//! tick, before the locomotion update runs. During the exclusive phase the
//! frame is folded into [`LocomotionState`] together with the derived fields
//! (smoothed moving flag, yaw speed, movement base change detection); the
//! worker-thread phase then only ever reads the snapshot.

use bevy::{
    math::{Quat, Vec3},
    prelude::{Component, Entity, Transform},
    reflect::Reflect,
};

use crate::{
    curves::SampledCurves,
    math::{Rotator, direction_to_angle, normalize_angle},
    settings::LocomotionSettings,
    state::{
        BasedMovementState, Foot, Gait, GroundedEntryMode, LocomotionAction, LocomotionMode,
        LocomotionState, PoseSnapshot, RotationMode, Stance, ViewMode,
    },
};

/// Minimum horizontal speed at which the character counts as having speed.
const HAS_SPEED_THRESHOLD: f32 = 1.0;

/// The movement base reported by the game's movement component.
#[derive(Reflect, Clone, Debug, Default, PartialEq)]
pub struct MovementBaseInput {
    pub primitive: Option<Entity>,
    pub bone_name: Option<String>,
    /// True when the base moves and carries the character with it, so
    /// base-relative encodings must be maintained.
    pub has_relative_location: bool,
    pub location: Vec3,
    pub rotation: Quat,
}

/// A game-requested one-shot transition on the transition slot.
#[derive(Reflect, Clone, Debug)]
pub struct TransitionRequest {
    pub foot: Foot,
    pub blend_in_time: f32,
    pub blend_out_time: f32,
    pub play_rate: f32,
    pub start_time: f32,
    /// Ignore the request unless the character is standing still.
    pub from_standing_idle_only: bool,
}

impl Default for TransitionRequest {
    fn default() -> Self {
        Self {
            foot: Foot::Left,
            blend_in_time: 0.2,
            blend_out_time: 0.2,
            play_rate: 1.0,
            start_time: 0.0,
            from_standing_idle_only: false,
        }
    }
}

/// World transforms of the two foot IK sockets, read from the evaluated
/// skeleton during the exclusive phase.
#[derive(Reflect, Clone, Debug)]
pub struct FootTargets {
    pub left_location: Vec3,
    pub left_rotation: Quat,
    pub right_location: Vec3,
    pub right_rotation: Quat,
}

impl Default for FootTargets {
    fn default() -> Self {
        Self {
            left_location: Vec3::ZERO,
            left_rotation: Quat::IDENTITY,
            right_location: Vec3::ZERO,
            right_rotation: Quat::IDENTITY,
        }
    }
}

/// Per-tick character input, written by the game before the locomotion
/// update.
///
/// Mode, stance and gait fields are authoritative game state copied verbatim.
/// The one-tick flags (`teleported`, `jump_requested`...) are set through the
/// request methods and cleared by the update itself once consumed.
#[derive(Component, Reflect, Clone, Debug, Default)]
pub struct CharacterFrame {
    pub locomotion_mode: LocomotionMode,
    pub stance: Stance,
    pub gait: Gait,
    pub rotation_mode: RotationMode,
    pub view_mode: ViewMode,
    pub locomotion_action: LocomotionAction,
    pub grounded_entry_mode: GroundedEntryMode,

    pub view_rotation: Rotator,

    pub has_input: bool,
    pub input_yaw_angle: f32,
    pub target_yaw_angle: f32,
    pub moving: bool,

    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub max_acceleration: f32,
    pub max_braking_deceleration: f32,
    pub walkable_floor_z: f32,

    pub location: Vec3,
    pub rotation: Rotator,
    pub scale: f32,
    pub capsule_radius: f32,
    pub capsule_half_height: f32,
    pub component_transform: Transform,

    pub movement_base: MovementBaseInput,
    pub foot_targets: FootTargets,

    /// Speed of the root bone's physics body, consumed by the ragdoll flail.
    pub root_bone_speed: f32,

    pub curves: SampledCurves,
    /// False when only slot playback is active and the blend graph's curves
    /// carry stale values; curve-driven passes then keep their prior output.
    pub curves_relevant: bool,

    /// This tick replays state already simulated elsewhere (network
    /// correction). Filters snap instead of interpolating.
    pub pending_update: bool,
    pub teleported: bool,
    pub jump_requested: bool,
    pub pivot_requested: bool,
    pub quick_stop_requested: bool,
    pub transition_requested: Option<TransitionRequest>,
    /// Blend-out time for stopping whatever occupies the transition and
    /// turn-in-place slots.
    pub stop_transitions_requested: Option<f32>,
    /// Pose captured by the game when its ragdoll simulation ends, used to
    /// blend back into animation.
    pub final_ragdoll_pose: Option<PoseSnapshot>,
}

impl CharacterFrame {
    pub fn mark_teleported(&mut self) {
        self.teleported = true;
    }

    pub fn mark_pending_update(&mut self) {
        self.pending_update = true;
    }

    pub fn request_jump(&mut self) {
        self.jump_requested = true;
    }

    pub fn request_pivot(&mut self) {
        self.pivot_requested = true;
    }

    pub fn request_quick_stop(&mut self) {
        self.quick_stop_requested = true;
    }

    pub fn request_transition(&mut self, request: TransitionRequest) {
        self.transition_requested = Some(request);
    }

    pub fn request_stop_transitions(&mut self, blend_out_time: f32) {
        self.stop_transitions_requested = Some(blend_out_time);
    }

    pub fn stop_ragdolling(&mut self, final_pose: PoseSnapshot) {
        self.final_ragdoll_pose = Some(final_pose);
    }
}

/// Folds the frame input into the locomotion snapshot. Must run with
/// exclusive access to the frame, once per tick.
pub fn refresh_locomotion_state(
    state: &mut LocomotionState,
    frame: &CharacterFrame,
    settings: &LocomotionSettings,
    delta_time: f32,
) {
    state.has_input = frame.has_input;
    state.input_yaw_angle = frame.input_yaw_angle;
    state.target_yaw_angle = frame.target_yaw_angle;

    state.velocity = frame.velocity;
    state.speed = frame.velocity.truncate().length();
    if state.speed >= HAS_SPEED_THRESHOLD {
        state.velocity_yaw_angle = direction_to_angle(frame.velocity.truncate());
    }
    state.acceleration = frame.acceleration;

    state.max_acceleration = frame.max_acceleration;
    state.max_braking_deceleration = frame.max_braking_deceleration;
    state.walkable_floor_z = frame.walkable_floor_z;

    state.moving = frame.moving;
    state.moving_smooth = (frame.has_input && state.speed >= HAS_SPEED_THRESHOLD)
        || state.speed > settings.general.moving_smooth_speed_threshold;

    state.location = frame.location;
    state.yaw_speed = if delta_time > f32::EPSILON {
        normalize_angle(frame.rotation.yaw - state.rotation.yaw) / delta_time
    } else {
        0.0
    };
    state.rotation = frame.rotation.normalized();
    state.rotation_quat = state.rotation.yaw_quat();

    state.scale = frame.scale;
    state.capsule_radius = frame.capsule_radius;
    state.capsule_half_height = frame.capsule_half_height;
    state.component_transform = frame.component_transform;

    refresh_based_movement(&mut state.based_movement, &frame.movement_base);
}

/// Detects a movement base identity change by comparing (primitive, bone)
/// against the previous tick. `base_changed` holds for exactly one tick.
fn refresh_based_movement(state: &mut BasedMovementState, base: &MovementBaseInput) {
    state.base_changed =
        base.primitive != state.primitive || base.bone_name != state.bone_name;
    if state.base_changed {
        state.primitive = base.primitive;
        state.bone_name = base.bone_name.clone();
    }

    state.has_relative_location = base.has_relative_location;
    state.location = base.location;
    state.rotation = base.rotation;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_moving_at(speed: f32) -> CharacterFrame {
        CharacterFrame {
            velocity: Vec3::new(speed, 0.0, 0.0),
            max_acceleration: 1.0,
            max_braking_deceleration: 1.0,
            scale: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn moving_smooth_requires_input_or_high_speed() {
        let settings = LocomotionSettings::default();
        let mut state = LocomotionState::default();

        let mut frame = frame_moving_at(100.0);
        refresh_locomotion_state(&mut state, &frame, &settings, 1.0 / 60.0);
        assert!(!state.moving_smooth);

        frame.has_input = true;
        refresh_locomotion_state(&mut state, &frame, &settings, 1.0 / 60.0);
        assert!(state.moving_smooth);

        frame.has_input = false;
        frame.velocity.x = settings.general.moving_smooth_speed_threshold + 1.0;
        refresh_locomotion_state(&mut state, &frame, &settings, 1.0 / 60.0);
        assert!(state.moving_smooth);
    }

    #[test]
    fn velocity_yaw_angle_held_while_stationary() {
        let settings = LocomotionSettings::default();
        let mut state = LocomotionState::default();

        let mut frame = frame_moving_at(200.0);
        frame.velocity = Vec3::new(0.0, 200.0, 0.0);
        refresh_locomotion_state(&mut state, &frame, &settings, 1.0 / 60.0);
        assert!((state.velocity_yaw_angle - 90.0).abs() < 1.0e-4);

        frame.velocity = Vec3::ZERO;
        refresh_locomotion_state(&mut state, &frame, &settings, 1.0 / 60.0);
        assert!((state.velocity_yaw_angle - 90.0).abs() < 1.0e-4);
    }

    #[test]
    fn base_change_flag_holds_for_one_tick() {
        let settings = LocomotionSettings::default();
        let mut state = LocomotionState::default();
        let mut frame = CharacterFrame::default();

        frame.movement_base.primitive = Some(Entity::PLACEHOLDER);
        refresh_locomotion_state(&mut state, &frame, &settings, 1.0 / 60.0);
        assert!(state.based_movement.base_changed);

        refresh_locomotion_state(&mut state, &frame, &settings, 1.0 / 60.0);
        assert!(!state.based_movement.base_changed);
    }
}
