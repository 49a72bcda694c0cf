//! Grounded locomotion blending.
//!
//! Everything here is a per-tick refresh over the frame snapshot: directional
//! velocity weights, movement direction classification, the sprint attack
//! transient, stride and play rates, and acceleration-driven lean. When the
//! character is grounded but stationary only the lean decay runs.

use bevy::math::Vec3;

use crate::{
    curves::{self, SampledCurves},
    math::{clamp01, clamp_magnitude_01, interp_to, normalize_angle},
    settings::{GeneralSettings, GroundedSettings},
    state::{
        Gait, GroundedState, LeanState, LocomotionMode, LocomotionState, MovementDirection,
        PoseState, RotationMode, VelocityBlendState, ViewState,
    },
};

/// Angular half-width of the forward sector.
const FORWARD_HALF_ANGLE: f32 = 70.0;

/// Hysteresis band around the sector boundaries.
const DIRECTION_ANGLE_THRESHOLD: f32 = 5.0;

/// Seconds after sprint start during which the acceleration transient passes
/// through.
const SPRINT_TIME_THRESHOLD: f32 = 0.5;

/// Exclusive-phase half: latches the pivot flag requested by the game. The
/// pivot only activates once the character has actually slowed down, and
/// never on a replay tick.
pub fn refresh_grounded_exclusive(
    grounded: &mut GroundedState,
    snapshot: &LocomotionState,
    settings: &GroundedSettings,
    pending_update: bool,
) {
    grounded.pivot_active = grounded.pivot_activation_requested
        && !pending_update
        && snapshot.speed < settings.pivot_activation_speed_threshold;

    grounded.pivot_activation_requested = false;
}

pub fn refresh_grounded(
    grounded: &mut GroundedState,
    lean: &mut LeanState,
    snapshot: &LocomotionState,
    view: &ViewState,
    pose: &PoseState,
    locomotion_mode: LocomotionMode,
    rotation_mode: RotationMode,
    gait: Gait,
    curves: &SampledCurves,
    general: &GeneralSettings,
    settings: &GroundedSettings,
    delta_time: f32,
    pending_update: bool,
) {
    // Sampled even when not grounded, otherwise inertial blending may pick up
    // stale values.
    grounded.sprint_block_amount = curves.value_clamped_01(curves::SPRINT_BLOCK);
    grounded.hips_direction_lock_amount =
        curves.value(curves::HIPS_DIRECTION_LOCK).clamp(-1.0, 1.0);

    if locomotion_mode != LocomotionMode::Grounded {
        grounded.velocity_blend.reinitialization_required = true;
        grounded.sprint_time = 0.0;
        return;
    }

    if !snapshot.moving {
        reset_grounded_lean(lean, general, delta_time);
        return;
    }

    // Acceleration in body space, normalized so -1 is max braking and 1 is
    // max acceleration, independent of gait.
    let acceleration_body = snapshot.rotation_quat.inverse() * snapshot.acceleration;
    let relative_acceleration_amount =
        if snapshot.acceleration.dot(snapshot.velocity) >= 0.0 {
            clamp_magnitude_01(acceleration_body / snapshot.max_acceleration.max(f32::EPSILON))
        } else {
            clamp_magnitude_01(
                acceleration_body / snapshot.max_braking_deceleration.max(f32::EPSILON),
            )
        };

    refresh_movement_direction(grounded, snapshot, view, rotation_mode, gait);
    refresh_velocity_blend(grounded, snapshot, settings, delta_time, pending_update);
    refresh_rotation_yaw_offsets(grounded, snapshot, view, settings);

    refresh_sprint(
        grounded,
        relative_acceleration_amount,
        gait,
        delta_time,
        pending_update,
    );

    refresh_stride_blend_amount(grounded, snapshot, pose, settings);
    grounded.walk_run_blend_amount = if gait == Gait::Walking { 0.0 } else { 1.0 };

    refresh_standing_play_rate(grounded, snapshot, pose, settings);
    refresh_crouching_play_rate(grounded, snapshot, settings);

    refresh_grounded_lean(
        lean,
        relative_acceleration_amount,
        general,
        delta_time,
        pending_update,
    );
}

fn refresh_movement_direction(
    grounded: &mut GroundedState,
    snapshot: &LocomotionState,
    view: &ViewState,
    rotation_mode: RotationMode,
    gait: Gait,
) {
    // Sprinting and velocity-direction rotation always animate forward.
    if gait == Gait::Sprinting || rotation_mode == RotationMode::VelocityDirection {
        grounded.movement_direction = MovementDirection::Forward;
        return;
    }

    grounded.movement_direction = classify_movement_direction(
        normalize_angle(snapshot.velocity_yaw_angle - view.rotation.yaw),
        grounded.movement_direction,
    );
}

/// Angular sector classifier with hysteresis: while the angle stays within
/// the previous sector widened by the threshold, the previous direction is
/// kept, so oscillation right at a boundary does not flicker.
fn classify_movement_direction(
    angle: f32,
    previous: MovementDirection,
) -> MovementDirection {
    let backward_half_angle = 180.0 - FORWARD_HALF_ANGLE;

    let within_widened_previous = match previous {
        MovementDirection::Forward => {
            angle.abs() <= FORWARD_HALF_ANGLE + DIRECTION_ANGLE_THRESHOLD
        }
        MovementDirection::Backward => {
            angle.abs() >= backward_half_angle - DIRECTION_ANGLE_THRESHOLD
        }
        MovementDirection::Right => {
            angle >= FORWARD_HALF_ANGLE - DIRECTION_ANGLE_THRESHOLD
                && angle <= backward_half_angle + DIRECTION_ANGLE_THRESHOLD
        }
        MovementDirection::Left => {
            angle <= -(FORWARD_HALF_ANGLE - DIRECTION_ANGLE_THRESHOLD)
                && angle >= -(backward_half_angle + DIRECTION_ANGLE_THRESHOLD)
        }
    };

    if within_widened_previous {
        return previous;
    }

    if angle.abs() <= FORWARD_HALF_ANGLE {
        MovementDirection::Forward
    } else if angle.abs() >= backward_half_angle {
        MovementDirection::Backward
    } else if angle > 0.0 {
        MovementDirection::Right
    } else {
        MovementDirection::Left
    }
}

fn refresh_velocity_blend(
    grounded: &mut GroundedState,
    snapshot: &LocomotionState,
    settings: &GroundedSettings,
    delta_time: f32,
    pending_update: bool,
) {
    let blend = &mut grounded.velocity_blend;
    blend.reinitialization_required |= pending_update;

    // Velocity direction in body space, L1-normalized so a perfect diagonal
    // yields 0.5 in each of the two contributing directions.
    let relative_velocity_direction =
        (snapshot.rotation_quat.inverse() * snapshot.velocity).normalize_or_zero();

    let l1_norm = relative_velocity_direction.x.abs()
        + relative_velocity_direction.y.abs()
        + relative_velocity_direction.z.abs();

    let relative_direction = if l1_norm > f32::EPSILON {
        relative_velocity_direction / l1_norm
    } else {
        Vec3::ZERO
    };

    let target_forward = clamp01(relative_direction.x);
    let target_backward = relative_direction.x.clamp(-1.0, 0.0).abs();
    let target_left = relative_direction.y.clamp(-1.0, 0.0).abs();
    let target_right = clamp01(relative_direction.y);

    if blend.reinitialization_required {
        blend.reinitialization_required = false;

        blend.forward_amount = target_forward;
        blend.backward_amount = target_backward;
        blend.left_amount = target_left;
        blend.right_amount = target_right;
    } else {
        let speed = settings.velocity_blend_interpolation_speed;

        blend.forward_amount = interp_to(blend.forward_amount, target_forward, delta_time, speed);
        blend.backward_amount =
            interp_to(blend.backward_amount, target_backward, delta_time, speed);
        blend.left_amount = interp_to(blend.left_amount, target_left, delta_time, speed);
        blend.right_amount = interp_to(blend.right_amount, target_right, delta_time, speed);
    }
}

fn refresh_rotation_yaw_offsets(
    grounded: &mut GroundedState,
    snapshot: &LocomotionState,
    view: &ViewState,
    settings: &GroundedSettings,
) {
    // Secondary per-direction body offsets, each under its own designer
    // curve keyed on the view-relative velocity yaw.
    let rotation_yaw_offset = normalize_angle(snapshot.velocity_yaw_angle - view.rotation.yaw);

    let offsets = &mut grounded.rotation_yaw_offsets;
    offsets.forward_angle = settings
        .rotation_yaw_offset_forward_curve
        .sample(rotation_yaw_offset);
    offsets.backward_angle = settings
        .rotation_yaw_offset_backward_curve
        .sample(rotation_yaw_offset);
    offsets.left_angle = settings
        .rotation_yaw_offset_left_curve
        .sample(rotation_yaw_offset);
    offsets.right_angle = settings
        .rotation_yaw_offset_right_curve
        .sample(rotation_yaw_offset);
}

fn refresh_sprint(
    grounded: &mut GroundedState,
    relative_acceleration_amount: Vec3,
    gait: Gait,
    delta_time: f32,
    pending_update: bool,
) {
    if gait != Gait::Sprinting {
        grounded.sprint_time = 0.0;
        grounded.sprint_acceleration_amount = 0.0;
        return;
    }

    // The forward acceleration passes through only for the first half second
    // of the sprint, as an attack transient. A replay tick jumps straight to
    // the threshold so the transient is not re-triggered.
    grounded.sprint_time = if pending_update {
        SPRINT_TIME_THRESHOLD
    } else {
        grounded.sprint_time + delta_time
    };

    grounded.sprint_acceleration_amount = if grounded.sprint_time >= SPRINT_TIME_THRESHOLD {
        0.0
    } else {
        relative_acceleration_amount.x
    };
}

fn refresh_stride_blend_amount(
    grounded: &mut GroundedState,
    snapshot: &LocomotionState,
    pose: &PoseState,
    settings: &GroundedSettings,
) {
    let speed = snapshot.speed / snapshot.scale.max(f32::EPSILON);

    let standing_stride_blend = crate::math::lerp_clamped(
        settings.stride_blend_amount_walk_curve.sample(speed),
        settings.stride_blend_amount_run_curve.sample(speed),
        pose.gait_running_amount,
    );

    grounded.stride_blend_amount = crate::math::lerp_clamped(
        standing_stride_blend,
        settings.stride_blend_amount_walk_curve.sample(speed),
        pose.crouching_amount,
    );
}

fn refresh_standing_play_rate(
    grounded: &mut GroundedState,
    snapshot: &LocomotionState,
    pose: &PoseState,
    settings: &GroundedSettings,
) {
    // The play rate follows the gait ramps so it stays in sync with whatever
    // blend of cycles is currently playing, and is divided by stride and
    // scale so shorter strides play faster.
    let walk_run_speed_amount = crate::math::lerp_clamped(
        snapshot.speed / settings.animated_walk_speed,
        snapshot.speed / settings.animated_run_speed,
        pose.gait_running_amount,
    );

    let walk_run_sprint_speed_amount = crate::math::lerp_clamped(
        walk_run_speed_amount,
        snapshot.speed / settings.animated_sprint_speed,
        pose.gait_sprinting_amount,
    );

    grounded.standing_play_rate = (walk_run_sprint_speed_amount
        / (grounded.stride_blend_amount * snapshot.scale).max(f32::EPSILON))
    .clamp(0.0, 3.0);
}

fn refresh_crouching_play_rate(
    grounded: &mut GroundedState,
    snapshot: &LocomotionState,
    settings: &GroundedSettings,
) {
    // Kept separate from the standing play rate so the crouch blend does not
    // pop in play rate mid-transition.
    grounded.crouching_play_rate = (snapshot.speed
        / (settings.animated_crouch_speed * grounded.stride_blend_amount * snapshot.scale)
            .max(f32::EPSILON))
    .clamp(0.0, 2.0);
}

fn refresh_grounded_lean(
    lean: &mut LeanState,
    relative_acceleration_amount: Vec3,
    general: &GeneralSettings,
    delta_time: f32,
    pending_update: bool,
) {
    if pending_update {
        lean.right_amount = relative_acceleration_amount.y;
        lean.forward_amount = relative_acceleration_amount.x;
    } else {
        lean.right_amount = interp_to(
            lean.right_amount,
            relative_acceleration_amount.y,
            delta_time,
            general.lean_interpolation_speed,
        );
        lean.forward_amount = interp_to(
            lean.forward_amount,
            relative_acceleration_amount.x,
            delta_time,
            general.lean_interpolation_speed,
        );
    }
}

pub fn reset_grounded_lean(lean: &mut LeanState, general: &GeneralSettings, delta_time: f32) {
    lean.right_amount = interp_to(
        lean.right_amount,
        0.0,
        delta_time,
        general.lean_interpolation_speed,
    );
    lean.forward_amount = interp_to(
        lean.forward_amount,
        0.0,
        delta_time,
        general.lean_interpolation_speed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving_snapshot(velocity: Vec3) -> LocomotionState {
        LocomotionState {
            velocity,
            speed: velocity.truncate().length(),
            moving: true,
            max_acceleration: 800.0,
            max_braking_deceleration: 800.0,
            ..Default::default()
        }
    }

    fn refresh(
        grounded: &mut GroundedState,
        lean: &mut LeanState,
        snapshot: &LocomotionState,
        gait: Gait,
        pending_update: bool,
    ) {
        refresh_grounded(
            grounded,
            lean,
            snapshot,
            &ViewState::default(),
            &PoseState::default(),
            LocomotionMode::Grounded,
            RotationMode::LookingDirection,
            gait,
            &SampledCurves::default(),
            &GeneralSettings::default(),
            &GroundedSettings::default(),
            1.0 / 60.0,
            pending_update,
        );
    }

    #[test]
    fn velocity_blend_weights_are_exclusive_per_axis() {
        let mut grounded = GroundedState::default();
        let mut lean = LeanState::default();

        let snapshot = moving_snapshot(Vec3::new(300.0, 0.0, 0.0));
        refresh(&mut grounded, &mut lean, &snapshot, Gait::Running, false);

        let blend = &grounded.velocity_blend;
        assert_eq!(blend.forward_amount, 1.0);
        assert_eq!(blend.backward_amount, 0.0);
        assert_eq!(blend.left_amount, 0.0);
        assert_eq!(blend.right_amount, 0.0);
    }

    #[test]
    fn diagonal_velocity_splits_evenly() {
        let mut grounded = GroundedState::default();
        let mut lean = LeanState::default();

        let snapshot = moving_snapshot(Vec3::new(300.0, 300.0, 0.0));
        refresh(&mut grounded, &mut lean, &snapshot, Gait::Running, false);

        let blend = &grounded.velocity_blend;
        assert!((blend.forward_amount - 0.5).abs() < 1.0e-5);
        assert!((blend.right_amount - 0.5).abs() < 1.0e-5);
        assert_eq!(blend.backward_amount, 0.0);
        assert_eq!(blend.left_amount, 0.0);
    }

    #[test]
    fn velocity_blend_reinitialization_snaps() {
        let mut grounded = GroundedState::default();
        grounded.velocity_blend.reinitialization_required = false;
        grounded.velocity_blend.backward_amount = 1.0;
        let mut lean = LeanState::default();

        let snapshot = moving_snapshot(Vec3::new(300.0, 0.0, 0.0));
        refresh(&mut grounded, &mut lean, &snapshot, Gait::Running, true);

        assert_eq!(grounded.velocity_blend.forward_amount, 1.0);
        assert_eq!(grounded.velocity_blend.backward_amount, 0.0);
    }

    #[test]
    fn direction_classifier_has_boundary_hysteresis() {
        let forward = MovementDirection::Forward;
        let right = MovementDirection::Right;

        assert_eq!(classify_movement_direction(72.0, forward), forward);
        assert_eq!(classify_movement_direction(68.0, right), right);
        assert_eq!(classify_movement_direction(80.0, forward), right);
        assert_eq!(classify_movement_direction(40.0, right), forward);
        assert_eq!(
            classify_movement_direction(170.0, forward),
            MovementDirection::Backward
        );
    }

    #[test]
    fn sprint_transient_freezes_on_replay() {
        let mut grounded = GroundedState::default();
        let mut lean = LeanState::default();

        let mut snapshot = moving_snapshot(Vec3::new(600.0, 0.0, 0.0));
        snapshot.acceleration = Vec3::new(800.0, 0.0, 0.0);

        refresh(&mut grounded, &mut lean, &snapshot, Gait::Sprinting, false);
        assert!(grounded.sprint_acceleration_amount > 0.0);

        refresh(&mut grounded, &mut lean, &snapshot, Gait::Sprinting, true);
        assert_eq!(grounded.sprint_time, SPRINT_TIME_THRESHOLD);
        assert_eq!(grounded.sprint_acceleration_amount, 0.0);
    }

    #[test]
    fn lean_decays_to_zero_when_stationary() {
        let mut grounded = GroundedState::default();
        let mut lean = LeanState {
            forward_amount: 1.0,
            right_amount: -1.0,
        };

        let snapshot = LocomotionState {
            moving: false,
            ..Default::default()
        };

        let general = GeneralSettings::default();
        let mut time = 0.0;
        while time < 5.0 / general.lean_interpolation_speed {
            refresh(&mut grounded, &mut lean, &snapshot, Gait::Walking, false);
            time += 1.0 / 60.0;
        }

        assert!(lean.forward_amount.abs() < 0.01);
        assert!(lean.right_amount.abs() < 0.01);
    }

    #[test]
    fn leaving_the_ground_requests_velocity_blend_reinitialization() {
        let mut grounded = GroundedState::default();
        grounded.velocity_blend.reinitialization_required = false;
        grounded.sprint_time = 0.3;
        let mut lean = LeanState::default();

        refresh_grounded(
            &mut grounded,
            &mut lean,
            &moving_snapshot(Vec3::ZERO),
            &ViewState::default(),
            &PoseState::default(),
            LocomotionMode::InAir,
            RotationMode::LookingDirection,
            Gait::Running,
            &SampledCurves::default(),
            &GeneralSettings::default(),
            &GroundedSettings::default(),
            1.0 / 60.0,
            false,
        );

        assert!(grounded.velocity_blend.reinitialization_required);
        assert_eq!(grounded.sprint_time, 0.0);
    }

    #[test]
    fn pivot_latch_requires_low_speed_and_live_tick() {
        let settings = GroundedSettings::default();
        let mut grounded = GroundedState::default();
        grounded.pivot_activation_requested = true;

        let fast = moving_snapshot(Vec3::new(500.0, 0.0, 0.0));
        refresh_grounded_exclusive(&mut grounded, &fast, &settings, false);
        assert!(!grounded.pivot_active);
        assert!(!grounded.pivot_activation_requested);

        grounded.pivot_activation_requested = true;
        let slow = moving_snapshot(Vec3::new(100.0, 0.0, 0.0));
        refresh_grounded_exclusive(&mut grounded, &slow, &settings, false);
        assert!(grounded.pivot_active);

        grounded.pivot_activation_requested = true;
        refresh_grounded_exclusive(&mut grounded, &slow, &settings, true);
        assert!(!grounded.pivot_active);
    }

    #[test]
    fn lean_follows_acceleration_ratio() {
        let mut grounded = GroundedState::default();
        let mut lean = LeanState::default();

        let mut snapshot = moving_snapshot(Vec3::new(300.0, 0.0, 0.0));
        snapshot.acceleration = Vec3::new(400.0, 0.0, 0.0);

        refresh(&mut grounded, &mut lean, &snapshot, Gait::Running, true);

        // Replay snaps straight to acceleration / max acceleration.
        assert!((lean.forward_amount - 0.5).abs() < 1.0e-5);
        assert_eq!(lean.right_amount, 0.0);
    }
}
