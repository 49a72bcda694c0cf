//! Layering and pose curve extraction.
//!
//! Both passes just mirror curve values into state records, with two wrinkles:
//! the mesh-space arm weights are the complement of full local-space weight,
//! and the gait amount is split into three overlapping unit ramps so gait
//! changes blend continuously instead of popping.

use crate::{
    curves::{self, SampledCurves},
    math::{clamp01, is_full_weight},
    state::{LayeringState, PoseState},
};

/// Skipped when curves are not relevant this tick; the previous values stay.
pub fn refresh_layering(state: &mut LayeringState, curves: &SampledCurves, curves_relevant: bool) {
    if !curves_relevant {
        return;
    }

    state.head_blend_amount = curves.value_clamped_01(curves::LAYER_HEAD);
    state.head_additive_blend_amount = curves.value_clamped_01(curves::LAYER_HEAD_ADDITIVE);
    state.head_slot_blend_amount = curves.value_clamped_01(curves::LAYER_HEAD_SLOT);

    // The mesh space blend is always 1 unless the local space blend is 1.

    state.arm_left_blend_amount = curves.value_clamped_01(curves::LAYER_ARM_LEFT);
    state.arm_left_additive_blend_amount = curves.value_clamped_01(curves::LAYER_ARM_LEFT_ADDITIVE);
    state.arm_left_slot_blend_amount = curves.value_clamped_01(curves::LAYER_ARM_LEFT_SLOT);
    state.arm_left_local_space_blend_amount =
        curves.value_clamped_01(curves::LAYER_ARM_LEFT_LOCAL_SPACE);
    state.arm_left_mesh_space_blend_amount =
        if is_full_weight(state.arm_left_local_space_blend_amount) {
            0.0
        } else {
            1.0
        };

    state.arm_right_blend_amount = curves.value_clamped_01(curves::LAYER_ARM_RIGHT);
    state.arm_right_additive_blend_amount =
        curves.value_clamped_01(curves::LAYER_ARM_RIGHT_ADDITIVE);
    state.arm_right_slot_blend_amount = curves.value_clamped_01(curves::LAYER_ARM_RIGHT_SLOT);
    state.arm_right_local_space_blend_amount =
        curves.value_clamped_01(curves::LAYER_ARM_RIGHT_LOCAL_SPACE);
    state.arm_right_mesh_space_blend_amount =
        if is_full_weight(state.arm_right_local_space_blend_amount) {
            0.0
        } else {
            1.0
        };

    state.hand_left_blend_amount = curves.value_clamped_01(curves::LAYER_HAND_LEFT);
    state.hand_right_blend_amount = curves.value_clamped_01(curves::LAYER_HAND_RIGHT);

    state.spine_blend_amount = curves.value_clamped_01(curves::LAYER_SPINE);
    state.spine_additive_blend_amount = curves.value_clamped_01(curves::LAYER_SPINE_ADDITIVE);
    state.spine_slot_blend_amount = curves.value_clamped_01(curves::LAYER_SPINE_SLOT);

    state.pelvis_blend_amount = curves.value_clamped_01(curves::LAYER_PELVIS);
    state.pelvis_slot_blend_amount = curves.value_clamped_01(curves::LAYER_PELVIS_SLOT);

    state.legs_blend_amount = curves.value_clamped_01(curves::LAYER_LEGS);
    state.legs_slot_blend_amount = curves.value_clamped_01(curves::LAYER_LEGS_SLOT);
}

pub fn refresh_pose(state: &mut PoseState, curves: &SampledCurves, curves_relevant: bool) {
    if !curves_relevant {
        return;
    }

    state.gait_amount = curves.value(curves::POSE_GAIT).clamp(0.0, 3.0);
    state.gait_walking_amount = clamp01(state.gait_amount);
    state.gait_running_amount = clamp01(state.gait_amount - 1.0);
    state.gait_sprinting_amount = clamp01(state.gait_amount - 2.0);

    state.moving_amount = curves.value_clamped_01(curves::POSE_MOVING);

    state.standing_amount = curves.value_clamped_01(curves::POSE_STANDING);
    state.crouching_amount = curves.value_clamped_01(curves::POSE_CROUCHING);

    state.grounded_amount = curves.value_clamped_01(curves::POSE_GROUNDED);
    state.in_air_amount = curves.value_clamped_01(curves::POSE_IN_AIR);
}
