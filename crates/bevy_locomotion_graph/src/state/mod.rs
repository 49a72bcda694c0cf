//! Persistent per-character state records.
//!
//! Every record lives for the character's entire animated lifetime and is
//! mutated in place each tick. The animation blend graph reads them as
//! read-only blend parameters; no other consumer exists. Fields documented as
//! amounts are normalized to `[0, 1]` unless stated otherwise.

use bevy::{
    animation::AnimationClip,
    asset::prelude::*,
    math::{Quat, Vec2, Vec3},
    prelude::{Entity, Transform},
    reflect::Reflect,
};

use crate::{
    math::{Rotator, SpringState},
    settings::TurnInPlaceClip,
};

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LocomotionMode {
    #[default]
    Grounded,
    InAir,
    /// A mode this layer does not animate (swimming, flying, custom movement).
    Other,
}

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Stance {
    #[default]
    Standing,
    Crouching,
}

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Gait {
    #[default]
    Walking,
    Running,
    Sprinting,
}

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RotationMode {
    VelocityDirection,
    #[default]
    LookingDirection,
    Aiming,
}

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewMode {
    FirstPerson,
    #[default]
    ThirdPerson,
}

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LocomotionAction {
    #[default]
    None,
    Ragdolling,
    /// An action owned by other systems (mantling, rolling...). Procedural
    /// view and look-at updates are suppressed while one is active.
    Other,
}

impl LocomotionAction {
    pub fn is_active(self) -> bool {
        self != Self::None
    }
}

/// How the grounded locomotion cycle entered its state, set by the game when
/// it knows a special entry animation should play.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GroundedEntryMode {
    #[default]
    None,
    FromAir,
    FromRagdoll,
}

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MovementDirection {
    #[default]
    Forward,
    Backward,
    Left,
    Right,
}

#[derive(Reflect, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Foot {
    Left,
    Right,
}

/// Slots one-shot clips can be played on.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotName {
    #[default]
    Transition,
    TurnInPlaceStanding,
    TurnInPlaceCrouching,
}

/// The platform the character is standing on, if any.
#[derive(Reflect, Clone, Debug, Default, PartialEq)]
pub struct BasedMovementState {
    pub primitive: Option<Entity>,
    pub bone_name: Option<String>,
    /// True for exactly one tick after the (primitive, bone) identity changed.
    pub base_changed: bool,
    /// True when the base moves and locks must be tracked relative to it.
    pub has_relative_location: bool,
    pub location: Vec3,
    pub rotation: Quat,
}

/// Immutable-for-this-tick snapshot of the character's movement state, built
/// during the exclusive-access phase.
#[derive(Reflect, Clone, Debug)]
pub struct LocomotionState {
    pub has_input: bool,
    pub input_yaw_angle: f32,
    pub target_yaw_angle: f32,
    pub speed: f32,
    pub velocity: Vec3,
    pub velocity_yaw_angle: f32,
    pub acceleration: Vec3,
    pub max_acceleration: f32,
    pub max_braking_deceleration: f32,
    /// Cosine of the steepest walkable slope; impact normals below it are not
    /// ground.
    pub walkable_floor_z: f32,
    pub moving: bool,
    /// Moving with hysteresis: input plus speed, or speed alone above the
    /// configured threshold.
    pub moving_smooth: bool,
    pub location: Vec3,
    pub rotation: Rotator,
    pub rotation_quat: Quat,
    pub yaw_speed: f32,
    pub scale: f32,
    pub capsule_radius: f32,
    pub capsule_half_height: f32,
    /// World transform of the animated mesh component.
    pub component_transform: Transform,
    pub based_movement: BasedMovementState,
}

impl Default for LocomotionState {
    fn default() -> Self {
        Self {
            has_input: false,
            input_yaw_angle: 0.0,
            target_yaw_angle: 0.0,
            speed: 0.0,
            velocity: Vec3::ZERO,
            velocity_yaw_angle: 0.0,
            acceleration: Vec3::ZERO,
            max_acceleration: 1.0,
            max_braking_deceleration: 1.0,
            walkable_floor_z: 0.71,
            moving: false,
            moving_smooth: false,
            location: Vec3::ZERO,
            rotation: Rotator::default(),
            rotation_quat: Quat::IDENTITY,
            yaw_speed: 0.0,
            scale: 1.0,
            capsule_radius: 30.0,
            capsule_half_height: 90.0,
            component_transform: Transform::IDENTITY,
            based_movement: BasedMovementState::default(),
        }
    }
}

#[derive(Reflect, Clone, Debug)]
pub struct LookTowardsInputState {
    /// World-space yaw the head aims at, clamped to ±90° from the body.
    pub yaw_angle: f32,
    /// Body-relative yaw remapped from [-90°, 90°] to [0, 1].
    pub yaw_amount: f32,
    pub reinitialization_required: bool,
}

impl Default for LookTowardsInputState {
    fn default() -> Self {
        Self {
            yaw_angle: 0.0,
            yaw_amount: 0.5,
            reinitialization_required: true,
        }
    }
}

#[derive(Reflect, Clone, Debug)]
pub struct LookTowardsCameraState {
    /// Smoothed copy of the raw view rotation. The rotation itself is
    /// filtered, not the derived angles, so fast body rotation does not bleed
    /// into the look-at.
    pub rotation: Rotator,
    pub yaw_angle: f32,
    pub pitch_angle: f32,
    pub yaw_forward_amount: f32,
    pub yaw_left_amount: f32,
    pub yaw_right_amount: f32,
    pub reinitialization_required: bool,
}

impl Default for LookTowardsCameraState {
    fn default() -> Self {
        Self {
            rotation: Rotator::default(),
            yaw_angle: 0.0,
            pitch_angle: 0.0,
            yaw_forward_amount: 0.5,
            yaw_left_amount: 0.5,
            yaw_right_amount: 0.5,
            reinitialization_required: true,
        }
    }
}

#[derive(Reflect, Clone, Debug, Default)]
pub struct ViewState {
    pub rotation: Rotator,
    pub yaw_speed: f32,
    /// View yaw relative to the body, degrees in (-180, 180].
    pub yaw_angle: f32,
    pub pitch_angle: f32,
    /// Pitch remapped to [0, 1] for the aim blend space.
    pub pitch_amount: f32,
    /// How much procedural look-at is allowed this tick.
    pub look_amount: f32,
    pub target_spine_yaw_angle: f32,
    pub spine_yaw_angle: f32,
    pub look_towards_input: LookTowardsInputState,
    pub look_towards_camera: LookTowardsCameraState,
}

#[derive(Reflect, Clone, Debug)]
pub struct VelocityBlendState {
    pub forward_amount: f32,
    pub backward_amount: f32,
    pub left_amount: f32,
    pub right_amount: f32,
    pub reinitialization_required: bool,
}

impl Default for VelocityBlendState {
    fn default() -> Self {
        Self {
            forward_amount: 0.0,
            backward_amount: 0.0,
            left_amount: 0.0,
            right_amount: 0.0,
            reinitialization_required: true,
        }
    }
}

#[derive(Reflect, Clone, Debug, Default)]
pub struct RotationYawOffsetsState {
    pub forward_angle: f32,
    pub backward_angle: f32,
    pub left_angle: f32,
    pub right_angle: f32,
}

#[derive(Reflect, Clone, Debug)]
pub struct GroundedState {
    pub movement_direction: MovementDirection,
    pub velocity_blend: VelocityBlendState,
    pub rotation_yaw_offsets: RotationYawOffsetsState,
    pub sprint_time: f32,
    /// Forward acceleration passed through during the sprint attack
    /// transient, zero once sprinting stabilizes.
    pub sprint_acceleration_amount: f32,
    pub sprint_block_amount: f32,
    /// In [-1, 1]; sign selects which hip direction the graph locks.
    pub hips_direction_lock_amount: f32,
    pub stride_blend_amount: f32,
    pub walk_run_blend_amount: f32,
    pub standing_play_rate: f32,
    pub crouching_play_rate: f32,
    pub pivot_activation_requested: bool,
    pub pivot_active: bool,
    pub entry_mode: GroundedEntryMode,
}

impl Default for GroundedState {
    fn default() -> Self {
        Self {
            movement_direction: MovementDirection::default(),
            velocity_blend: VelocityBlendState::default(),
            rotation_yaw_offsets: RotationYawOffsetsState::default(),
            sprint_time: 0.0,
            sprint_acceleration_amount: 0.0,
            sprint_block_amount: 0.0,
            hips_direction_lock_amount: 0.0,
            stride_blend_amount: 1.0,
            walk_run_blend_amount: 0.0,
            standing_play_rate: 1.0,
            crouching_play_rate: 1.0,
            pivot_activation_requested: false,
            pivot_active: false,
            entry_mode: GroundedEntryMode::None,
        }
    }
}

#[derive(Reflect, Clone, Debug)]
pub struct InAirState {
    /// Latched on jump request, cleared on landing.
    pub jumped: bool,
    pub jump_requested: bool,
    pub jump_play_rate: f32,
    pub vertical_velocity: f32,
    pub ground_prediction_amount: f32,
}

impl Default for InAirState {
    fn default() -> Self {
        Self {
            jumped: false,
            jump_requested: false,
            jump_play_rate: 1.0,
            vertical_velocity: 0.0,
            ground_prediction_amount: 0.0,
        }
    }
}

/// Per-foot IK and locking state. All world-space transforms also carry
/// component-relative and movement-base-relative encodings so they survive
/// teleports and moving platforms.
#[derive(Reflect, Clone, Debug)]
pub struct FootState {
    pub ik_amount: f32,
    /// May only decrease, or jump to exactly 1. Never blends upward.
    pub lock_amount: f32,
    pub target_location: Vec3,
    pub target_rotation: Quat,
    pub lock_location: Vec3,
    pub lock_rotation: Quat,
    pub lock_component_relative_location: Vec3,
    pub lock_component_relative_rotation: Quat,
    pub lock_movement_base_relative_location: Vec3,
    pub lock_movement_base_relative_rotation: Quat,
    pub offset_target_location: Vec3,
    pub offset_target_rotation: Quat,
    pub offset_location: Vec3,
    pub offset_rotation: Quat,
    pub offset_spring: SpringState,
    pub ik_location: Vec3,
    pub ik_rotation: Quat,
}

impl Default for FootState {
    fn default() -> Self {
        Self {
            ik_amount: 0.0,
            lock_amount: 0.0,
            target_location: Vec3::ZERO,
            target_rotation: Quat::IDENTITY,
            lock_location: Vec3::ZERO,
            lock_rotation: Quat::IDENTITY,
            lock_component_relative_location: Vec3::ZERO,
            lock_component_relative_rotation: Quat::IDENTITY,
            lock_movement_base_relative_location: Vec3::ZERO,
            lock_movement_base_relative_rotation: Quat::IDENTITY,
            offset_target_location: Vec3::ZERO,
            offset_target_rotation: Quat::IDENTITY,
            offset_location: Vec3::ZERO,
            offset_rotation: Quat::IDENTITY,
            offset_spring: SpringState::default(),
            ik_location: Vec3::ZERO,
            ik_rotation: Quat::IDENTITY,
        }
    }
}

#[derive(Reflect, Clone, Debug)]
pub struct FeetState {
    pub reinitialization_required: bool,
    /// In [-1, 1]; sign selects the planted foot.
    pub foot_planted_amount: f32,
    pub feet_crossing_amount: f32,
    pub left: FootState,
    pub right: FootState,
    /// Min and max surface offset Z across both feet, used by the graph to
    /// shift the pelvis and avoid leg over-extension.
    pub min_max_pelvis_offset_z: Vec2,
}

impl Default for FeetState {
    fn default() -> Self {
        Self {
            reinitialization_required: true,
            foot_planted_amount: 0.0,
            feet_crossing_amount: 0.0,
            left: FootState::default(),
            right: FootState::default(),
            min_max_pelvis_offset_z: Vec2::ZERO,
        }
    }
}

impl FeetState {
    pub fn foot(&self, foot: Foot) -> &FootState {
        match foot {
            Foot::Left => &self.left,
            Foot::Right => &self.right,
        }
    }

    pub fn foot_mut(&mut self, foot: Foot) -> &mut FootState {
        match foot {
            Foot::Left => &mut self.left,
            Foot::Right => &mut self.right,
        }
    }
}

#[derive(Reflect, Clone, Debug, Default)]
pub struct TransitionsState {
    pub transitions_allowed: bool,
    /// Ticks to wait before another dynamic transition may fire.
    pub dynamic_transition_frame_delay: u8,
    pub queued_dynamic_transition: Option<Handle<AnimationClip>>,
}

#[derive(Reflect, Clone, Debug)]
pub struct RotateInPlaceState {
    pub rotating_left: bool,
    pub rotating_right: bool,
    pub play_rate: f32,
    pub foot_lock_block_amount: f32,
}

impl Default for RotateInPlaceState {
    fn default() -> Self {
        Self {
            rotating_left: false,
            rotating_right: false,
            play_rate: 1.0,
            foot_lock_block_amount: 0.0,
        }
    }
}

#[derive(Reflect, Clone, Debug)]
pub struct TurnInPlaceState {
    pub activation_delay: f32,
    pub play_rate: f32,
    pub foot_lock_disabled: bool,
    pub queued_clip: Option<TurnInPlaceClip>,
    pub queued_slot: SlotName,
    pub queued_turn_yaw_angle: f32,
}

impl Default for TurnInPlaceState {
    fn default() -> Self {
        Self {
            activation_delay: 0.0,
            play_rate: 1.0,
            foot_lock_disabled: false,
            queued_clip: None,
            queued_slot: SlotName::TurnInPlaceStanding,
            queued_turn_yaw_angle: 0.0,
        }
    }
}

/// Lean amounts in [-1, 1], shared between the grounded and aerial
/// subsystems. Exactly one of them writes it per tick.
#[derive(Reflect, Clone, Debug, Default)]
pub struct LeanState {
    pub forward_amount: f32,
    pub right_amount: f32,
}

/// One bone of a captured pose snapshot.
#[derive(Reflect, Clone, Debug, Default)]
pub struct BonePose {
    pub bone_name: String,
    pub transform: Transform,
}

/// A pose captured from the evaluated skeleton, used to blend out of ragdoll.
#[derive(Reflect, Clone, Debug, Default)]
pub struct PoseSnapshot {
    pub bones: Vec<BonePose>,
}

#[derive(Reflect, Clone, Debug, Default)]
pub struct RagdollingState {
    /// Flail play rate tracks normalized root bone physics speed.
    pub flail_play_rate: f32,
    pub final_ragdoll_pose: PoseSnapshot,
}

/// Per-region layering weights extracted from the graph's layering curves.
#[derive(Reflect, Clone, Debug, Default)]
pub struct LayeringState {
    pub head_blend_amount: f32,
    pub head_additive_blend_amount: f32,
    pub head_slot_blend_amount: f32,
    pub arm_left_blend_amount: f32,
    pub arm_left_additive_blend_amount: f32,
    pub arm_left_slot_blend_amount: f32,
    pub arm_left_local_space_blend_amount: f32,
    pub arm_left_mesh_space_blend_amount: f32,
    pub arm_right_blend_amount: f32,
    pub arm_right_additive_blend_amount: f32,
    pub arm_right_slot_blend_amount: f32,
    pub arm_right_local_space_blend_amount: f32,
    pub arm_right_mesh_space_blend_amount: f32,
    pub hand_left_blend_amount: f32,
    pub hand_right_blend_amount: f32,
    pub spine_blend_amount: f32,
    pub spine_additive_blend_amount: f32,
    pub spine_slot_blend_amount: f32,
    pub pelvis_blend_amount: f32,
    pub pelvis_slot_blend_amount: f32,
    pub legs_blend_amount: f32,
    pub legs_slot_blend_amount: f32,
}

/// Continuous pose descriptors extracted from the graph's pose curves.
#[derive(Reflect, Clone, Debug, Default)]
pub struct PoseState {
    /// In [0, 3]: 0 stopped, 1 walking, 2 running, 3 sprinting.
    pub gait_amount: f32,
    pub gait_walking_amount: f32,
    pub gait_running_amount: f32,
    pub gait_sprinting_amount: f32,
    pub moving_amount: f32,
    pub standing_amount: f32,
    pub crouching_amount: f32,
    pub grounded_amount: f32,
    pub in_air_amount: f32,
}
