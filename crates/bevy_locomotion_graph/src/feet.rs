//! Foot locking and surface adaptation.
//!
//! Each foot runs four passes in a fixed order: teleport correction, base
//! change correction, the lock blend, and the spring-damped surface offset.
//! The lock weight obeys a strict discipline: it may decrease, or jump to
//! exactly 1, but never blend upward through intermediate values, which would
//! drag the foot toward a stale lock point.

use bevy::{
    color::LinearRgba,
    math::{Affine3A, Quat, Vec2, Vec3},
    prelude::Entity,
};

use crate::{
    curves::{self, SampledCurves},
    drawing::DebugTraces,
    math::{interp_quat_to, interp_vector_to, is_full_weight, is_relevant_weight, spring_damp},
    queries::SurfaceProbe,
    settings::FeetSettings,
    snapshot::FootTargets,
    state::{FeetState, FootState, LocomotionMode, LocomotionState},
};

/// Lock decay rate while the character moves on the ground.
const LOCK_MOVING_DECREASE_SPEED: f32 = 5.0;
/// Lock decay rate while airborne, slow enough to keep the feet planted
/// through the jump takeoff.
const LOCK_NOT_GROUNDED_DECREASE_SPEED: f32 = 0.6;

const OFFSET_SPRING_FREQUENCY: f32 = 0.4;
const OFFSET_SPRING_DAMPING_RATIO: f32 = 4.0;
const OFFSET_SPRING_TARGET_VELOCITY_AMOUNT: f32 = 1.0;
const OFFSET_ROTATION_INTERPOLATION_SPEED: f32 = 30.0;
const OFFSET_IN_AIR_DECAY_SPEED: f32 = 15.0;

const TRACE_MISS_COLOR: LinearRgba = LinearRgba::rgb(0.0, 0.25, 1.0);
const TRACE_HIT_COLOR: LinearRgba = LinearRgba::rgb(0.0, 0.75, 1.0);

/// Exclusive-phase half: copies the evaluated skeleton's foot socket
/// transforms into the per-foot targets.
pub fn refresh_feet_exclusive(feet: &mut FeetState, targets: &FootTargets) {
    feet.left.target_location = targets.left_location;
    feet.left.target_rotation = targets.left_rotation;
    feet.right.target_location = targets.right_location;
    feet.right.target_rotation = targets.right_rotation;
}

pub struct FeetContext<'a> {
    pub snapshot: &'a LocomotionState,
    pub locomotion_mode: LocomotionMode,
    pub curves: &'a SampledCurves,
    pub settings: &'a FeetSettings,
    pub probe: &'a dyn SurfaceProbe,
    pub owner: Option<Entity>,
    pub delta_time: f32,
    pub teleported: bool,
}

#[allow(clippy::too_many_arguments)]
pub fn refresh_feet(
    feet: &mut FeetState,
    ctx: &FeetContext<'_>,
    debug: &mut DebugTraces,
    curves_relevant: bool,
    pending_update: bool,
) {
    feet.reinitialization_required |= pending_update || !curves_relevant;

    // Without live curves the lock and IK weights would be stale, so the
    // whole update is skipped and flagged for reinitialization.
    if !curves_relevant {
        return;
    }

    feet.foot_planted_amount = ctx.curves.value(curves::FOOT_PLANTED).clamp(-1.0, 1.0);
    feet.feet_crossing_amount = ctx.curves.value_clamped_01(curves::FEET_CROSSING);

    feet.min_max_pelvis_offset_z = Vec2::ZERO;

    let component_transform_inverse = ctx.snapshot.component_transform.compute_affine().inverse();
    let reinitialization_required = feet.reinitialization_required;

    refresh_foot(
        &mut feet.left,
        curves::FOOT_LEFT_IK,
        curves::FOOT_LEFT_LOCK,
        ctx,
        &component_transform_inverse,
        debug,
        reinitialization_required,
    );

    refresh_foot(
        &mut feet.right,
        curves::FOOT_RIGHT_IK,
        curves::FOOT_RIGHT_LOCK,
        ctx,
        &component_transform_inverse,
        debug,
        reinitialization_required,
    );

    feet.min_max_pelvis_offset_z.x = feet
        .left
        .offset_target_location
        .z
        .min(feet.right.offset_target_location.z);
    feet.min_max_pelvis_offset_z.y = feet
        .left
        .offset_target_location
        .z
        .max(feet.right.offset_target_location.z);

    feet.reinitialization_required = false;
}

fn refresh_foot(
    foot: &mut FootState,
    ik_curve_name: &str,
    lock_curve_name: &str,
    ctx: &FeetContext<'_>,
    component_transform_inverse: &Affine3A,
    debug: &mut DebugTraces,
    reinitialization_required: bool,
) {
    foot.ik_amount = ctx.curves.value_clamped_01(ik_curve_name);

    process_foot_lock_teleport(foot, ctx, reinitialization_required);
    process_foot_lock_base_change(foot, ctx, component_transform_inverse, reinitialization_required);

    let mut final_location = foot.target_location;
    let mut final_rotation = foot.target_rotation;

    refresh_foot_lock(
        foot,
        lock_curve_name,
        ctx,
        component_transform_inverse,
        reinitialization_required,
        &mut final_location,
        &mut final_rotation,
    );

    refresh_foot_offset(
        foot,
        ctx,
        debug,
        reinitialization_required,
        &mut final_location,
        &mut final_rotation,
    );

    foot.ik_location = component_transform_inverse.transform_point3(final_location);
    foot.ik_rotation = ctx.snapshot.component_transform.rotation.inverse() * final_rotation;
}

/// A teleport moved the component without moving the lock. The lock was also
/// stored component-relative, so its world transform is re-derived from the
/// post-teleport component transform.
fn process_foot_lock_teleport(
    foot: &mut FootState,
    ctx: &FeetContext<'_>,
    reinitialization_required: bool,
) {
    if !ctx.teleported
        || reinitialization_required
        || !is_relevant_weight(foot.ik_amount * foot.lock_amount)
    {
        return;
    }

    let component_transform = &ctx.snapshot.component_transform;
    foot.lock_location = component_transform.transform_point(foot.lock_component_relative_location);
    foot.lock_rotation = component_transform.rotation * foot.lock_component_relative_rotation;

    if ctx.snapshot.based_movement.has_relative_location {
        let base_rotation_inverse = ctx.snapshot.based_movement.rotation.inverse();

        foot.lock_movement_base_relative_location =
            base_rotation_inverse * (foot.lock_location - ctx.snapshot.based_movement.location);
        foot.lock_movement_base_relative_rotation = base_rotation_inverse * foot.lock_rotation;
    }
}

/// Standing on a different base invalidates the relative encodings; they are
/// recomputed from the lock's world transform.
fn process_foot_lock_base_change(
    foot: &mut FootState,
    ctx: &FeetContext<'_>,
    component_transform_inverse: &Affine3A,
    reinitialization_required: bool,
) {
    if (!ctx.snapshot.based_movement.base_changed && !reinitialization_required)
        || !is_relevant_weight(foot.ik_amount * foot.lock_amount)
    {
        return;
    }

    if reinitialization_required {
        foot.lock_location = foot.target_location;
        foot.lock_rotation = foot.target_rotation;
    }

    foot.lock_component_relative_location =
        component_transform_inverse.transform_point3(foot.lock_location);
    foot.lock_component_relative_rotation =
        ctx.snapshot.component_transform.rotation.inverse() * foot.lock_rotation;

    if ctx.snapshot.based_movement.has_relative_location {
        let base_rotation_inverse = ctx.snapshot.based_movement.rotation.inverse();

        foot.lock_movement_base_relative_location =
            base_rotation_inverse * (foot.lock_location - ctx.snapshot.based_movement.location);
        foot.lock_movement_base_relative_rotation = base_rotation_inverse * foot.lock_rotation;
    } else {
        foot.lock_movement_base_relative_location = Vec3::ZERO;
        foot.lock_movement_base_relative_rotation = Quat::IDENTITY;
    }
}

fn refresh_foot_lock(
    foot: &mut FootState,
    lock_curve_name: &str,
    ctx: &FeetContext<'_>,
    component_transform_inverse: &Affine3A,
    reinitialization_required: bool,
    final_location: &mut Vec3,
    final_rotation: &mut Quat,
) {
    let mut new_lock_amount = ctx.curves.value_clamped_01(lock_curve_name);

    if ctx.snapshot.moving_smooth || ctx.locomotion_mode != LocomotionMode::Grounded {
        // The curve may lag the true movement state, so once the character
        // moves or leaves the ground the lock is forced down at a fixed rate
        // instead of trusting the curve.
        let decrease_speed = if ctx.snapshot.moving_smooth {
            LOCK_MOVING_DECREASE_SPEED
        } else {
            LOCK_NOT_GROUNDED_DECREASE_SPEED
        };

        new_lock_amount = if reinitialization_required {
            0.0
        } else {
            new_lock_amount
                .min(foot.lock_amount - ctx.delta_time * decrease_speed)
                .max(0.0)
        };
    }

    if ctx.settings.disable_foot_lock || !is_relevant_weight(foot.ik_amount * new_lock_amount) {
        if foot.lock_amount > 0.0 {
            foot.lock_amount = 0.0;

            foot.lock_location = Vec3::ZERO;
            foot.lock_rotation = Quat::IDENTITY;

            foot.lock_component_relative_location = Vec3::ZERO;
            foot.lock_component_relative_rotation = Quat::IDENTITY;

            foot.lock_movement_base_relative_location = Vec3::ZERO;
            foot.lock_movement_base_relative_rotation = Quat::IDENTITY;
        }

        return;
    }

    let new_amount_equal_one = is_full_weight(new_lock_amount);
    let new_amount_greater_than_previous = new_lock_amount > foot.lock_amount;

    // The lock weight may only decrease or jump straight to 1. Blending
    // upward would slide the foot toward a lock point captured ticks ago.
    if new_amount_equal_one {
        if new_amount_greater_than_previous {
            if foot.lock_amount <= ctx.settings.lock_recapture_threshold {
                foot.lock_location = *final_location;
                foot.lock_rotation = *final_rotation;
            }
            // Near-full previous weight keeps the old lock point, otherwise
            // the capture itself teleports the foot for one frame.

            if ctx.snapshot.based_movement.has_relative_location {
                let base_rotation_inverse = ctx.snapshot.based_movement.rotation.inverse();

                foot.lock_movement_base_relative_location = base_rotation_inverse
                    * (*final_location - ctx.snapshot.based_movement.location);
                foot.lock_movement_base_relative_rotation = base_rotation_inverse * *final_rotation;
            } else {
                foot.lock_movement_base_relative_location = Vec3::ZERO;
                foot.lock_movement_base_relative_rotation = Quat::IDENTITY;
            }
        }

        foot.lock_amount = 1.0;
    } else if !new_amount_greater_than_previous {
        foot.lock_amount = new_lock_amount;
    }

    // On a moving base the lock rides along via its base-relative encoding.
    if ctx.snapshot.based_movement.has_relative_location {
        foot.lock_location = ctx.snapshot.based_movement.location
            + ctx.snapshot.based_movement.rotation * foot.lock_movement_base_relative_location;
        foot.lock_rotation =
            ctx.snapshot.based_movement.rotation * foot.lock_movement_base_relative_rotation;
    }

    foot.lock_component_relative_location =
        component_transform_inverse.transform_point3(foot.lock_location);
    foot.lock_component_relative_rotation =
        ctx.snapshot.component_transform.rotation.inverse() * foot.lock_rotation;

    *final_location = final_location.lerp(foot.lock_location, foot.lock_amount);
    *final_rotation = final_rotation.slerp(foot.lock_rotation, foot.lock_amount);
}

fn refresh_foot_offset(
    foot: &mut FootState,
    ctx: &FeetContext<'_>,
    debug: &mut DebugTraces,
    reinitialization_required: bool,
    final_location: &mut Vec3,
    final_rotation: &mut Quat,
) {
    if !is_relevant_weight(foot.ik_amount) {
        foot.offset_target_location = Vec3::ZERO;
        foot.offset_target_rotation = Quat::IDENTITY;
        foot.offset_spring.reset();
        return;
    }

    if ctx.locomotion_mode == LocomotionMode::InAir {
        // Airborne feet relax back to the animated pose.
        foot.offset_target_location = Vec3::ZERO;
        foot.offset_target_rotation = Quat::IDENTITY;
        foot.offset_spring.reset();

        if reinitialization_required {
            foot.offset_location = Vec3::ZERO;
            foot.offset_rotation = Quat::IDENTITY;
        } else {
            foot.offset_location = interp_vector_to(
                foot.offset_location,
                Vec3::ZERO,
                ctx.delta_time,
                OFFSET_IN_AIR_DECAY_SPEED,
            );
            foot.offset_rotation = interp_quat_to(
                foot.offset_rotation,
                Quat::IDENTITY,
                ctx.delta_time,
                OFFSET_IN_AIR_DECAY_SPEED,
            );

            *final_location += foot.offset_location;
            *final_rotation = foot.offset_rotation * *final_rotation;
        }

        return;
    }

    // Ray down through the foot's planar position, starting at the
    // component's height.
    let mut foot_location = *final_location;
    foot_location.z = ctx.snapshot.component_transform.translation.z;

    let trace_start = foot_location
        + Vec3::new(
            0.0,
            0.0,
            ctx.settings.ik_trace_distance_upward * ctx.snapshot.scale,
        );
    let trace_end = foot_location
        - Vec3::new(
            0.0,
            0.0,
            ctx.settings.ik_trace_distance_downward * ctx.snapshot.scale,
        );

    let hit = ctx
        .probe
        .ray_cast(trace_start, trace_end - trace_start, ctx.owner);
    let ground = hit.filter(|hit| hit.is_walkable(ctx.snapshot.walkable_floor_z));

    debug.trace(
        trace_start,
        trace_end,
        ground.as_ref(),
        TRACE_MISS_COLOR,
        TRACE_HIT_COLOR,
    );

    if let Some(hit) = ground {
        let foot_height = ctx.settings.foot_height * ctx.snapshot.scale;

        // Offset from the expected flat floor position, pushed out along the
        // impact normal by the foot height so angled surfaces behave.
        foot.offset_target_location = hit.location - foot_location + hit.normal * foot_height;
        foot.offset_target_location.z -= foot_height;

        // Two independent tilts aligning the foot's up axis with the normal.
        let pitch = hit.normal.x.atan2(hit.normal.z);
        let roll = -hit.normal.y.atan2(hit.normal.z);
        foot.offset_target_rotation =
            Quat::from_rotation_y(pitch) * Quat::from_rotation_x(roll);
    }

    if reinitialization_required {
        foot.offset_spring.reset();

        foot.offset_location = foot.offset_target_location;
        foot.offset_rotation = foot.offset_target_rotation;
    } else {
        foot.offset_location = spring_damp(
            foot.offset_location,
            foot.offset_target_location,
            &mut foot.offset_spring,
            ctx.delta_time,
            OFFSET_SPRING_FREQUENCY,
            OFFSET_SPRING_DAMPING_RATIO,
            OFFSET_SPRING_TARGET_VELOCITY_AMOUNT,
        );

        foot.offset_rotation = interp_quat_to(
            foot.offset_rotation,
            foot.offset_target_rotation,
            ctx.delta_time,
            OFFSET_ROTATION_INTERPOLATION_SPEED,
        );
    }

    *final_location += foot.offset_location;
    *final_rotation = foot.offset_rotation * *final_rotation;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{NoSurfaceProbe, test_probe::FlatGroundProbe};
    use crate::state::BasedMovementState;

    const DT: f32 = 1.0 / 60.0;

    fn grounded_snapshot() -> LocomotionState {
        LocomotionState::default()
    }

    fn full_curves(lock: f32) -> SampledCurves {
        let mut curves = SampledCurves::default();
        curves.set(curves::FOOT_LEFT_IK, 1.0);
        curves.set(curves::FOOT_LEFT_LOCK, lock);
        curves.set(curves::FOOT_RIGHT_IK, 1.0);
        curves.set(curves::FOOT_RIGHT_LOCK, lock);
        curves
    }

    fn refresh(
        feet: &mut FeetState,
        snapshot: &LocomotionState,
        curves: &SampledCurves,
        probe: &dyn SurfaceProbe,
        pending_update: bool,
    ) {
        let ctx = FeetContext {
            snapshot,
            locomotion_mode: LocomotionMode::Grounded,
            curves,
            settings: &FeetSettings::default(),
            probe,
            owner: None,
            delta_time: DT,
            teleported: false,
        };
        refresh_feet(feet, &ctx, &mut DebugTraces::default(), true, pending_update);
    }

    #[test]
    fn lock_amount_never_blends_upward() {
        let snapshot = grounded_snapshot();
        let mut feet = FeetState::default();
        feet.left.target_location = Vec3::new(10.0, 5.0, 0.0);

        refresh(&mut feet, &snapshot, &full_curves(1.0), &NoSurfaceProbe, false);
        assert_eq!(feet.left.lock_amount, 1.0);
        assert_eq!(feet.left.lock_location, Vec3::new(10.0, 5.0, 0.0));

        refresh(&mut feet, &snapshot, &full_curves(0.5), &NoSurfaceProbe, false);
        assert_eq!(feet.left.lock_amount, 0.5);

        // An intermediate increase is ignored.
        refresh(&mut feet, &snapshot, &full_curves(0.8), &NoSurfaceProbe, false);
        assert_eq!(feet.left.lock_amount, 0.5);

        // Only the jump to exactly 1 is allowed, re-capturing the lock point.
        feet.left.target_location = Vec3::new(20.0, 5.0, 0.0);
        refresh(&mut feet, &snapshot, &full_curves(1.0), &NoSurfaceProbe, false);
        assert_eq!(feet.left.lock_amount, 1.0);
        assert_eq!(feet.left.lock_location, Vec3::new(20.0, 5.0, 0.0));
    }

    #[test]
    fn near_full_weight_skips_lock_recapture() {
        let snapshot = grounded_snapshot();
        let mut feet = FeetState::default();
        feet.left.target_location = Vec3::new(10.0, 0.0, 0.0);

        refresh(&mut feet, &snapshot, &full_curves(1.0), &NoSurfaceProbe, false);
        let captured = feet.left.lock_location;

        feet.left.lock_amount = 0.95;
        feet.left.target_location = Vec3::new(30.0, 0.0, 0.0);
        refresh(&mut feet, &snapshot, &full_curves(1.0), &NoSurfaceProbe, false);

        assert_eq!(feet.left.lock_amount, 1.0);
        assert_eq!(feet.left.lock_location, captured);
    }

    #[test]
    fn negligible_weight_hard_resets_the_lock() {
        let snapshot = grounded_snapshot();
        let mut feet = FeetState::default();
        feet.left.target_location = Vec3::new(10.0, 0.0, 0.0);

        refresh(&mut feet, &snapshot, &full_curves(1.0), &NoSurfaceProbe, false);
        assert_eq!(feet.left.lock_amount, 1.0);

        refresh(&mut feet, &snapshot, &full_curves(0.0), &NoSurfaceProbe, false);
        assert_eq!(feet.left.lock_amount, 0.0);
        assert_eq!(feet.left.lock_location, Vec3::ZERO);
        assert_eq!(feet.left.lock_rotation, Quat::IDENTITY);
    }

    #[test]
    fn moving_forces_lock_decay_despite_the_curve() {
        let mut snapshot = grounded_snapshot();
        let mut feet = FeetState::default();

        refresh(&mut feet, &snapshot, &full_curves(1.0), &NoSurfaceProbe, false);
        assert_eq!(feet.left.lock_amount, 1.0);

        snapshot.moving_smooth = true;
        refresh(&mut feet, &snapshot, &full_curves(1.0), &NoSurfaceProbe, false);
        let expected = 1.0 - DT * LOCK_MOVING_DECREASE_SPEED;
        assert!((feet.left.lock_amount - expected).abs() < 1.0e-5);

        refresh(&mut feet, &snapshot, &full_curves(1.0), &NoSurfaceProbe, false);
        assert!(feet.left.lock_amount < expected);
    }

    #[test]
    fn lock_rides_a_moving_base() {
        let mut snapshot = grounded_snapshot();
        snapshot.based_movement = BasedMovementState {
            primitive: Some(Entity::PLACEHOLDER),
            has_relative_location: true,
            location: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            ..Default::default()
        };

        let mut feet = FeetState::default();
        feet.left.target_location = Vec3::new(10.0, 0.0, 0.0);
        refresh(&mut feet, &snapshot, &full_curves(1.0), &NoSurfaceProbe, false);
        assert_eq!(feet.left.lock_location, Vec3::new(10.0, 0.0, 0.0));

        // The platform moves; the locked foot moves with it.
        snapshot.based_movement.location = Vec3::new(0.0, 0.0, 5.0);
        refresh(&mut feet, &snapshot, &full_curves(1.0), &NoSurfaceProbe, false);
        assert_eq!(feet.left.lock_location, Vec3::new(10.0, 0.0, 5.0));
    }

    #[test]
    fn base_relative_encoding_survives_reinitialization_round_trip() {
        let mut snapshot = grounded_snapshot();
        snapshot.based_movement = BasedMovementState {
            primitive: Some(Entity::PLACEHOLDER),
            has_relative_location: true,
            location: Vec3::new(100.0, 0.0, 0.0),
            rotation: Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            ..Default::default()
        };

        let mut feet = FeetState::default();
        feet.left.target_location = Vec3::new(100.0, 25.0, 0.0);
        refresh(&mut feet, &snapshot, &full_curves(1.0), &NoSurfaceProbe, false);
        let relative = feet.left.lock_movement_base_relative_location;

        // Reinitialize with the same target; the relative encoding must come
        // out the same.
        feet.left.target_location = Vec3::new(100.0, 25.0, 0.0);
        refresh(&mut feet, &snapshot, &full_curves(1.0), &NoSurfaceProbe, true);

        assert!(
            (feet.left.lock_movement_base_relative_location - relative).length() < 1.0e-3,
            "got {relative} vs {}",
            feet.left.lock_movement_base_relative_location
        );
    }

    #[test]
    fn surface_offset_tracks_walkable_ground() {
        let probe = FlatGroundProbe { ground_z: -2.0 };
        let snapshot = grounded_snapshot();

        let mut feet = FeetState::default();
        feet.left.target_location = Vec3::new(5.0, 0.0, 10.0);
        feet.right.target_location = Vec3::new(-5.0, 0.0, 10.0);

        // Reinitialization snaps the offset straight to the target.
        refresh(&mut feet, &snapshot, &full_curves(0.0), &probe, true);

        assert!((feet.left.offset_target_location.z - -2.0).abs() < 1.0e-4);
        assert_eq!(feet.left.offset_location, feet.left.offset_target_location);
        assert_eq!(feet.left.offset_target_rotation, Quat::IDENTITY);

        // Both feet found the same plane, so the pelvis offset range is flat.
        assert!((feet.min_max_pelvis_offset_z.x - feet.min_max_pelvis_offset_z.y).abs() < 1.0e-6);
    }

    #[test]
    fn irrelevant_ik_weight_resets_the_offset_spring() {
        let probe = FlatGroundProbe { ground_z: -2.0 };
        let snapshot = grounded_snapshot();

        let mut feet = FeetState::default();
        refresh(&mut feet, &snapshot, &full_curves(0.0), &probe, true);
        assert!(feet.left.offset_spring.valid || feet.left.offset_location != Vec3::ZERO);

        let mut curves = full_curves(0.0);
        curves.set(curves::FOOT_LEFT_IK, 0.0);
        refresh(&mut feet, &snapshot, &curves, &probe, false);

        assert_eq!(feet.left.offset_target_location, Vec3::ZERO);
        assert!(!feet.left.offset_spring.valid);
    }

    #[test]
    fn teleport_rederives_lock_from_component_relative_encoding() {
        let mut snapshot = grounded_snapshot();
        let mut feet = FeetState::default();
        feet.left.target_location = Vec3::new(10.0, 0.0, 0.0);
        refresh(&mut feet, &snapshot, &full_curves(1.0), &NoSurfaceProbe, false);

        // Teleport the component 1000 units away; the lock follows it via
        // the component-relative encoding.
        snapshot.component_transform.translation = Vec3::new(1000.0, 0.0, 0.0);
        let ctx = FeetContext {
            snapshot: &snapshot,
            locomotion_mode: LocomotionMode::Grounded,
            curves: &full_curves(1.0),
            settings: &FeetSettings::default(),
            probe: &NoSurfaceProbe,
            owner: None,
            delta_time: DT,
            teleported: true,
        };
        refresh_feet(&mut feet, &ctx, &mut DebugTraces::default(), true, false);

        assert_eq!(feet.left.lock_location, Vec3::new(1010.0, 0.0, 0.0));
    }
}
