//! The designer-authored settings asset.
//!
//! One [`LocomotionSettings`] asset is shared by every character using the
//! same rig; it is loaded from a `*.locomotion.ron` file and never mutated at
//! runtime. Defaults match the reference humanoid rig so a default-constructed
//! asset produces sensible motion.

mod loader;

pub use loader::*;

use bevy::{animation::AnimationClip, asset::prelude::*, reflect::Reflect};
use serde::{Deserialize, Serialize};

use crate::float_curve::FloatCurve;

#[derive(Asset, Reflect, Clone, Debug, Default)]
pub struct LocomotionSettings {
    pub general: GeneralSettings,
    pub view: ViewSettings,
    pub grounded: GroundedSettings,
    pub in_air: InAirSettings,
    pub feet: FeetSettings,
    pub transitions: TransitionSettings,
    pub rotate_in_place: RotateInPlaceSettings,
    pub turn_in_place: TurnInPlaceSettings,
}

#[derive(Reflect, Serialize, Deserialize, Clone, Debug)]
pub struct GeneralSettings {
    /// Speed above which the character counts as moving even without input.
    pub moving_smooth_speed_threshold: f32,
    pub lean_interpolation_speed: f32,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            moving_smooth_speed_threshold: 150.0,
            lean_interpolation_speed: 4.0,
        }
    }
}

#[derive(Reflect, Serialize, Deserialize, Clone, Debug)]
pub struct ViewSettings {
    pub look_towards_camera_rotation_interpolation_speed: f32,
    pub look_towards_input_yaw_angle_interpolation_speed: f32,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            look_towards_camera_rotation_interpolation_speed: 8.0,
            look_towards_input_yaw_angle_interpolation_speed: 8.0,
        }
    }
}

#[derive(Reflect, Serialize, Deserialize, Clone, Debug)]
pub struct GroundedSettings {
    pub velocity_blend_interpolation_speed: f32,
    pub pivot_activation_speed_threshold: f32,
    /// Movement speeds the locomotion cycle animations were authored at.
    pub animated_walk_speed: f32,
    pub animated_run_speed: f32,
    pub animated_sprint_speed: f32,
    pub animated_crouch_speed: f32,
    /// Rotation yaw offset curves, keyed on velocity yaw relative to the view.
    pub rotation_yaw_offset_forward_curve: FloatCurve,
    pub rotation_yaw_offset_backward_curve: FloatCurve,
    pub rotation_yaw_offset_left_curve: FloatCurve,
    pub rotation_yaw_offset_right_curve: FloatCurve,
    /// Stride blend curves, keyed on scale-normalized speed.
    pub stride_blend_amount_walk_curve: FloatCurve,
    pub stride_blend_amount_run_curve: FloatCurve,
}

impl Default for GroundedSettings {
    fn default() -> Self {
        Self {
            velocity_blend_interpolation_speed: 12.0,
            pivot_activation_speed_threshold: 200.0,
            animated_walk_speed: 150.0,
            animated_run_speed: 350.0,
            animated_sprint_speed: 600.0,
            animated_crouch_speed: 150.0,
            rotation_yaw_offset_forward_curve: FloatCurve::constant(0.0),
            rotation_yaw_offset_backward_curve: FloatCurve::constant(0.0),
            rotation_yaw_offset_left_curve: FloatCurve::constant(0.0),
            rotation_yaw_offset_right_curve: FloatCurve::constant(0.0),
            stride_blend_amount_walk_curve: FloatCurve::from_pairs(&[(0.0, 0.2), (150.0, 1.0)]),
            stride_blend_amount_run_curve: FloatCurve::from_pairs(&[(0.0, 0.2), (350.0, 1.0)]),
        }
    }
}

#[derive(Reflect, Serialize, Deserialize, Clone, Debug)]
pub struct InAirSettings {
    /// Lean multiplier keyed on vertical velocity. Crossing zero flips the
    /// lean direction between rising and falling.
    pub lean_amount_curve: FloatCurve,
    /// Maps normalized sweep hit time to the ground prediction amount.
    pub ground_prediction_amount_curve: FloatCurve,
}

impl Default for InAirSettings {
    fn default() -> Self {
        Self {
            lean_amount_curve: FloatCurve::from_pairs(&[
                (-1000.0, 1.0),
                (0.0, 0.5),
                (1000.0, -1.0),
            ]),
            ground_prediction_amount_curve: FloatCurve::from_pairs(&[
                (0.0, 1.0),
                (0.2, 1.0),
                (1.0, 0.0),
            ]),
        }
    }
}

#[derive(Reflect, Serialize, Deserialize, Clone, Debug)]
pub struct FeetSettings {
    pub disable_foot_lock: bool,
    /// Distance from the foot bone to the sole, used to keep the foot flush
    /// with the surface instead of buried in it.
    pub foot_height: f32,
    pub ik_trace_distance_upward: f32,
    pub ik_trace_distance_downward: f32,
    /// Lock amounts above this skip re-capturing the lock point when the lock
    /// weight snaps back to full, avoiding a one-frame foot teleport.
    pub lock_recapture_threshold: f32,
}

impl Default for FeetSettings {
    fn default() -> Self {
        Self {
            disable_foot_lock: false,
            foot_height: 13.5,
            ik_trace_distance_upward: 50.0,
            ik_trace_distance_downward: 45.0,
            lock_recapture_threshold: 0.9,
        }
    }
}

#[derive(Reflect, Clone, Debug)]
pub struct TransitionSettings {
    pub quick_stop_blend_in_time: f32,
    pub quick_stop_blend_out_time: f32,
    /// Play rate range; the far end is reached for a 180° stop rotation.
    pub quick_stop_play_rate: (f32, f32),
    pub quick_stop_start_time: f32,
    pub dynamic_transition_foot_lock_distance_threshold: f32,
    pub dynamic_transition_blend_time: f32,
    pub dynamic_transition_play_rate: f32,
    pub standing_transition_left: Option<Handle<AnimationClip>>,
    pub standing_transition_right: Option<Handle<AnimationClip>>,
    pub crouching_transition_left: Option<Handle<AnimationClip>>,
    pub crouching_transition_right: Option<Handle<AnimationClip>>,
    pub standing_dynamic_transition_left: Option<Handle<AnimationClip>>,
    pub standing_dynamic_transition_right: Option<Handle<AnimationClip>>,
    pub crouching_dynamic_transition_left: Option<Handle<AnimationClip>>,
    pub crouching_dynamic_transition_right: Option<Handle<AnimationClip>>,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            quick_stop_blend_in_time: 0.1,
            quick_stop_blend_out_time: 0.2,
            quick_stop_play_rate: (1.75, 3.0),
            quick_stop_start_time: 0.3,
            dynamic_transition_foot_lock_distance_threshold: 8.0,
            dynamic_transition_blend_time: 0.2,
            dynamic_transition_play_rate: 1.5,
            standing_transition_left: None,
            standing_transition_right: None,
            crouching_transition_left: None,
            crouching_transition_right: None,
            standing_dynamic_transition_left: None,
            standing_dynamic_transition_right: None,
            crouching_dynamic_transition_left: None,
            crouching_dynamic_transition_right: None,
        }
    }
}

#[derive(Reflect, Serialize, Deserialize, Clone, Debug)]
pub struct RotateInPlaceSettings {
    pub view_yaw_angle_threshold: f32,
    /// View yaw speed range mapped into the play rate range.
    pub reference_view_yaw_speed: (f32, f32),
    pub play_rate: (f32, f32),
    pub disable_foot_lock: bool,
    pub foot_lock_block_view_yaw_angle_threshold: f32,
    pub foot_lock_block_view_yaw_speed_threshold: f32,
}

impl Default for RotateInPlaceSettings {
    fn default() -> Self {
        Self {
            view_yaw_angle_threshold: 50.0,
            reference_view_yaw_speed: (180.0, 460.0),
            play_rate: (1.15, 3.0),
            disable_foot_lock: false,
            foot_lock_block_view_yaw_angle_threshold: 120.0,
            foot_lock_block_view_yaw_speed_threshold: 620.0,
        }
    }
}

/// A turn-in-place animation clip together with its authoring metadata.
#[derive(Reflect, Clone, Debug)]
pub struct TurnInPlaceClip {
    pub clip: Handle<AnimationClip>,
    pub play_rate: f32,
    /// Yaw angle the clip was authored to rotate through.
    pub animated_turn_angle: f32,
    /// Scale the play rate by the actual turn angle so the visual rotation
    /// speed stays consistent regardless of how far the character turns.
    pub scale_play_rate_by_animated_turn_angle: bool,
}

#[derive(Reflect, Clone, Debug)]
pub struct TurnInPlaceSettings {
    pub view_yaw_angle_threshold: f32,
    pub view_yaw_speed_threshold: f32,
    /// Activation delay range, mapped from the view yaw angle between the
    /// angle threshold and 180°. Bigger misalignment triggers sooner.
    pub view_yaw_angle_to_activation_delay: (f32, f32),
    pub turn_180_angle_threshold: f32,
    pub blend_time: f32,
    pub disable_foot_lock: bool,
    pub standing_turn_90_left: Option<TurnInPlaceClip>,
    pub standing_turn_90_right: Option<TurnInPlaceClip>,
    pub standing_turn_180_left: Option<TurnInPlaceClip>,
    pub standing_turn_180_right: Option<TurnInPlaceClip>,
    pub crouching_turn_90_left: Option<TurnInPlaceClip>,
    pub crouching_turn_90_right: Option<TurnInPlaceClip>,
    pub crouching_turn_180_left: Option<TurnInPlaceClip>,
    pub crouching_turn_180_right: Option<TurnInPlaceClip>,
}

impl Default for TurnInPlaceSettings {
    fn default() -> Self {
        Self {
            view_yaw_angle_threshold: 45.0,
            view_yaw_speed_threshold: 50.0,
            view_yaw_angle_to_activation_delay: (0.75, 0.1),
            turn_180_angle_threshold: 130.0,
            blend_time: 0.2,
            disable_foot_lock: false,
            standing_turn_90_left: None,
            standing_turn_90_right: None,
            standing_turn_180_left: None,
            standing_turn_180_right: None,
            crouching_turn_90_left: None,
            crouching_turn_90_right: None,
            crouching_turn_180_left: None,
            crouching_turn_180_right: None,
        }
    }
}
