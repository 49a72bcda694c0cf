//! View and look-at smoothing.
//!
//! Exactly one of the two look-at sub-states runs per tick: looking towards
//! the movement input while in velocity-direction rotation, towards the
//! camera otherwise. The inactive one is flagged for reinitialization so it
//! resumes from a clean slate instead of interpolating from stale history.

use crate::{
    curves::{self, SampledCurves},
    math::{
        CCW_ROTATION_ANGLE_THRESHOLD, Rotator, exponential_decay, is_relevant_weight,
        normalize_angle,
    },
    settings::ViewSettings,
    state::{LocomotionAction, LocomotionState, RotationMode, ViewState},
};

/// Exclusive-phase half: copies the raw view rotation and derives its yaw
/// speed from the previous tick's value.
pub fn refresh_view_exclusive(view: &mut ViewState, view_rotation: Rotator, delta_time: f32) {
    view.yaw_speed = if delta_time > f32::EPSILON {
        normalize_angle(view_rotation.yaw - view.rotation.yaw) / delta_time
    } else {
        0.0
    };
    view.rotation = view_rotation.normalized();
}

fn is_spine_rotation_allowed(rotation_mode: RotationMode) -> bool {
    rotation_mode == RotationMode::Aiming
}

pub fn refresh_view(
    view: &mut ViewState,
    snapshot: &LocomotionState,
    locomotion_action: LocomotionAction,
    rotation_mode: RotationMode,
    curves: &SampledCurves,
    settings: &ViewSettings,
    delta_time: f32,
    pending_update: bool,
) {
    // While an action drives the body procedurally the derived angles would
    // fight it, so they are frozen.
    if !locomotion_action.is_active() {
        view.yaw_angle = normalize_angle(view.rotation.yaw - snapshot.rotation.yaw);
        view.pitch_angle = normalize_angle(view.rotation.pitch - snapshot.rotation.pitch);

        view.pitch_amount = 0.5 - view.pitch_angle / 180.0;
    }

    let aiming_allowed_amount = 1.0 - curves.value_clamped_01(curves::AIM_BLOCK);
    let aiming_manual_amount = curves.value_clamped_01(curves::AIM_MANUAL);

    view.look_amount = aiming_allowed_amount * (1.0 - aiming_manual_amount);

    if is_spine_rotation_allowed(rotation_mode) {
        // Angles near the discontinuity are expressed as negative so a small
        // further rotation does not spin the spine the long way around.
        view.target_spine_yaw_angle = if view.yaw_angle > 180.0 - CCW_ROTATION_ANGLE_THRESHOLD {
            view.yaw_angle - 360.0
        } else {
            view.yaw_angle
        };
    }

    view.spine_yaw_angle =
        normalize_angle(view.target_spine_yaw_angle * aiming_allowed_amount * aiming_manual_amount);

    if !is_relevant_weight(view.look_amount) {
        view.look_towards_input.reinitialization_required = true;
        view.look_towards_camera.reinitialization_required = true;
        return;
    }

    if rotation_mode == RotationMode::VelocityDirection {
        view.look_towards_camera.reinitialization_required = true;

        refresh_look_towards_input(view, snapshot, settings, delta_time, pending_update);
    } else {
        view.look_towards_input.reinitialization_required = true;

        refresh_look_towards_camera(view, snapshot, settings, delta_time, pending_update);
    }
}

fn refresh_look_towards_input(
    view: &mut ViewState,
    snapshot: &LocomotionState,
    settings: &ViewSettings,
    delta_time: f32,
    pending_update: bool,
) {
    let look = &mut view.look_towards_input;
    look.reinitialization_required |= pending_update;

    let mut target_yaw_angle = normalize_angle(
        if snapshot.has_input {
            snapshot.input_yaw_angle
        } else {
            snapshot.target_yaw_angle
        } - snapshot.rotation.yaw,
    );

    let interpolation_speed = settings.look_towards_input_yaw_angle_interpolation_speed;

    let yaw_angle = if look.reinitialization_required || interpolation_speed <= 0.0 {
        target_yaw_angle
    } else {
        if target_yaw_angle > 180.0 - CCW_ROTATION_ANGLE_THRESHOLD {
            target_yaw_angle -= 360.0;
        }

        let yaw_angle = normalize_angle(look.yaw_angle - snapshot.rotation.yaw);

        let mut delta_yaw_angle = (target_yaw_angle - yaw_angle).clamp(-90.0, 90.0);

        // Favor the body's rotation direction over the shortest path so the
        // head stays visually synchronized with the turning body.
        if snapshot.yaw_speed.abs() > f32::EPSILON
            && target_yaw_angle.abs() > 90.0
            && target_yaw_angle.abs() < 180.0 - CCW_ROTATION_ANGLE_THRESHOLD
        {
            delta_yaw_angle = if snapshot.yaw_speed > 0.0 {
                delta_yaw_angle.abs()
            } else {
                -delta_yaw_angle.abs()
            };
        }

        normalize_angle(
            yaw_angle + delta_yaw_angle * exponential_decay(delta_time, interpolation_speed),
        )
    };

    look.yaw_angle = normalize_angle(snapshot.rotation.yaw + yaw_angle.clamp(-90.0, 90.0));

    // [-90, 90] remapped to [0, 1].
    look.yaw_amount = yaw_angle / 180.0 + 0.5;

    look.reinitialization_required = false;
}

fn refresh_look_towards_camera(
    view: &mut ViewState,
    snapshot: &LocomotionState,
    settings: &ViewSettings,
    delta_time: f32,
    pending_update: bool,
) {
    let view_rotation = view.rotation;
    let look = &mut view.look_towards_camera;
    look.reinitialization_required |= pending_update;

    // The rotation itself is smoothed before any angle is derived, so fast
    // body rotation does not leak into a slowly settling look-at.
    look.rotation = if look.reinitialization_required {
        view_rotation
    } else {
        look.rotation.exponential_decay(
            view_rotation,
            delta_time,
            settings.look_towards_camera_rotation_interpolation_speed,
        )
    };

    look.yaw_angle = normalize_angle(look.rotation.yaw - snapshot.rotation.yaw);
    look.pitch_angle = normalize_angle(look.rotation.pitch - snapshot.rotation.pitch);

    // The yaw is split into three weights so the graph can blend smoothly
    // through a full rotation around the character.
    look.yaw_forward_amount = look.yaw_angle / 360.0 + 0.5;
    look.yaw_left_amount = 0.5 - (look.yaw_forward_amount - 0.5).abs();
    look.yaw_right_amount = 0.5 + (look.yaw_forward_amount - 0.5).abs();

    look.reinitialization_required = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aiming_curves(manual: f32) -> SampledCurves {
        let mut curves = SampledCurves::default();
        curves.set(curves::AIM_MANUAL, manual);
        curves
    }

    #[test]
    fn spine_target_wraps_at_the_yaw_discontinuity() {
        let mut view = ViewState::default();
        view.rotation = Rotator::new(0.0, 190.0).normalized();

        let snapshot = LocomotionState::default();
        refresh_view(
            &mut view,
            &snapshot,
            LocomotionAction::None,
            RotationMode::Aiming,
            &aiming_curves(0.0),
            &ViewSettings::default(),
            1.0 / 60.0,
            false,
        );

        assert!((view.target_spine_yaw_angle - -170.0).abs() < 1.0e-4);
    }

    #[test]
    fn partial_spine_rotation_goes_through_the_back() {
        let mut view = ViewState::default();
        view.rotation = Rotator::new(0.0, 178.0);

        let snapshot = LocomotionState::default();
        refresh_view(
            &mut view,
            &snapshot,
            LocomotionAction::None,
            RotationMode::Aiming,
            &aiming_curves(0.5),
            &ViewSettings::default(),
            1.0 / 60.0,
            false,
        );

        // 178° is past the wrap threshold, so the target is -182° and half
        // of it is -91°, not +89°.
        assert!((view.spine_yaw_angle - -91.0).abs() < 1.0e-3);
    }

    #[test]
    fn inactive_look_at_is_flagged_for_reinitialization() {
        let mut view = ViewState::default();
        view.look_towards_camera.reinitialization_required = false;
        view.look_towards_input.reinitialization_required = false;

        let snapshot = LocomotionState::default();
        refresh_view(
            &mut view,
            &snapshot,
            LocomotionAction::None,
            RotationMode::VelocityDirection,
            &aiming_curves(0.0),
            &ViewSettings::default(),
            1.0 / 60.0,
            false,
        );

        assert!(view.look_towards_camera.reinitialization_required);
        assert!(!view.look_towards_input.reinitialization_required);
    }

    #[test]
    fn camera_look_weights_cover_a_full_turn() {
        let mut view = ViewState::default();
        view.rotation = Rotator::new(0.0, 120.0);

        let snapshot = LocomotionState::default();
        refresh_view(
            &mut view,
            &snapshot,
            LocomotionAction::None,
            RotationMode::LookingDirection,
            &aiming_curves(0.0),
            &ViewSettings::default(),
            1.0 / 60.0,
            true,
        );

        let look = &view.look_towards_camera;
        assert!((look.yaw_forward_amount - (120.0 / 360.0 + 0.5)).abs() < 1.0e-5);
        assert!((look.yaw_left_amount + look.yaw_right_amount - 1.0).abs() < 1.0e-5);
        assert!(look.yaw_left_amount >= 0.0 && look.yaw_left_amount <= 0.5);
    }

    #[test]
    fn pitch_amount_remaps_pitch_angle() {
        let mut view = ViewState::default();
        view.rotation = Rotator::new(45.0, 0.0);

        let snapshot = LocomotionState::default();
        refresh_view(
            &mut view,
            &snapshot,
            LocomotionAction::None,
            RotationMode::LookingDirection,
            &aiming_curves(0.0),
            &ViewSettings::default(),
            1.0 / 60.0,
            false,
        );

        assert!((view.pitch_amount - 0.25).abs() < 1.0e-5);
    }
}
