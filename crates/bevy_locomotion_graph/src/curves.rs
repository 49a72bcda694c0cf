//! Named scalar curves sampled from the animation blend graph.
//!
//! The graph authors a fixed set of float curves on its clips; the game
//! samples them once per tick into a [`SampledCurves`] table that travels
//! with the frame snapshot, so the worker-thread phase never touches live
//! animation data.

use bevy::{platform::collections::HashMap, reflect::Reflect};

use crate::math::clamp01;

pub const LAYER_HEAD: &str = "LayerHead";
pub const LAYER_HEAD_ADDITIVE: &str = "LayerHeadAdditive";
pub const LAYER_HEAD_SLOT: &str = "LayerHeadSlot";
pub const LAYER_ARM_LEFT: &str = "LayerArmLeft";
pub const LAYER_ARM_LEFT_ADDITIVE: &str = "LayerArmLeftAdditive";
pub const LAYER_ARM_LEFT_LOCAL_SPACE: &str = "LayerArmLeftLocalSpace";
pub const LAYER_ARM_LEFT_SLOT: &str = "LayerArmLeftSlot";
pub const LAYER_ARM_RIGHT: &str = "LayerArmRight";
pub const LAYER_ARM_RIGHT_ADDITIVE: &str = "LayerArmRightAdditive";
pub const LAYER_ARM_RIGHT_LOCAL_SPACE: &str = "LayerArmRightLocalSpace";
pub const LAYER_ARM_RIGHT_SLOT: &str = "LayerArmRightSlot";
pub const LAYER_HAND_LEFT: &str = "LayerHandLeft";
pub const LAYER_HAND_RIGHT: &str = "LayerHandRight";
pub const LAYER_SPINE: &str = "LayerSpine";
pub const LAYER_SPINE_ADDITIVE: &str = "LayerSpineAdditive";
pub const LAYER_SPINE_SLOT: &str = "LayerSpineSlot";
pub const LAYER_PELVIS: &str = "LayerPelvis";
pub const LAYER_PELVIS_SLOT: &str = "LayerPelvisSlot";
pub const LAYER_LEGS: &str = "LayerLegs";
pub const LAYER_LEGS_SLOT: &str = "LayerLegsSlot";

pub const POSE_GAIT: &str = "PoseGait";
pub const POSE_MOVING: &str = "PoseMoving";
pub const POSE_STANDING: &str = "PoseStanding";
pub const POSE_CROUCHING: &str = "PoseCrouching";
pub const POSE_GROUNDED: &str = "PoseGrounded";
pub const POSE_IN_AIR: &str = "PoseInAir";

pub const FOOT_LEFT_IK: &str = "FootLeftIk";
pub const FOOT_LEFT_LOCK: &str = "FootLeftLock";
pub const FOOT_RIGHT_IK: &str = "FootRightIk";
pub const FOOT_RIGHT_LOCK: &str = "FootRightLock";
pub const FOOT_PLANTED: &str = "FootPlanted";
pub const FEET_CROSSING: &str = "FeetCrossing";

pub const ALLOW_TRANSITIONS: &str = "AllowTransitions";
pub const SPRINT_BLOCK: &str = "SprintBlock";
pub const GROUND_PREDICTION_BLOCK: &str = "GroundPredictionBlock";
pub const HIPS_DIRECTION_LOCK: &str = "HipsDirectionLock";
pub const AIM_BLOCK: &str = "AimBlock";
pub const AIM_MANUAL: &str = "AimManual";

/// Per-tick snapshot of the named curve values. Missing curves read as zero,
/// matching the blend graph's behavior for curves absent from the active
/// clips.
#[derive(Reflect, Clone, Debug, Default)]
pub struct SampledCurves {
    values: HashMap<String, f32>,
}

impl SampledCurves {
    pub fn set(&mut self, name: impl Into<String>, value: f32) {
        self.values.insert(name.into(), value);
    }

    pub fn value(&self, name: &str) -> f32 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    pub fn value_clamped_01(&self, name: &str) -> f32 {
        clamp01(self.value(name))
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_curves_read_as_zero() {
        let curves = SampledCurves::default();
        assert_eq!(curves.value(POSE_GAIT), 0.0);
    }

    #[test]
    fn clamped_read_stays_in_unit_range() {
        let mut curves = SampledCurves::default();
        curves.set(LAYER_HEAD, 4.2);
        curves.set(LAYER_LEGS, -0.5);
        assert_eq!(curves.value_clamped_01(LAYER_HEAD), 1.0);
        assert_eq!(curves.value_clamped_01(LAYER_LEGS), 0.0);
        assert_eq!(curves.value(LAYER_HEAD), 4.2);
    }
}
