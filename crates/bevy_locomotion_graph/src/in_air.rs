//! Aerial locomotion: jump play rate, ground prediction and in-air lean.

use bevy::{color::LinearRgba, prelude::Entity};

use crate::{
    curves::{self, SampledCurves},
    drawing::DebugTraces,
    math::{clamp01, interp_to, lerp_clamped, map_range_clamped},
    queries::SurfaceProbe,
    settings::{GeneralSettings, InAirSettings},
    state::{InAirState, LeanState, LocomotionMode, LocomotionState},
};

/// Horizontal speed at which the jump play rate reaches its maximum.
const JUMP_REFERENCE_SPEED: f32 = 600.0;
const JUMP_MIN_PLAY_RATE: f32 = 1.2;
const JUMP_MAX_PLAY_RATE: f32 = 1.5;

/// Ground prediction is skipped near the jump apex.
const PREDICTION_VERTICAL_VELOCITY_THRESHOLD: f32 = -200.0;

const PREDICTION_MIN_VERTICAL_VELOCITY: f32 = -4000.0;
const PREDICTION_MAX_VERTICAL_VELOCITY: f32 = -200.0;
const PREDICTION_MIN_SWEEP_DISTANCE: f32 = 150.0;
const PREDICTION_MAX_SWEEP_DISTANCE: f32 = 2000.0;

/// Scales body-space velocity into the lean amount.
const LEAN_REFERENCE_SPEED: f32 = 350.0;

const SWEEP_MISS_COLOR: LinearRgba = LinearRgba::rgb(0.25, 0.0, 1.0);
const SWEEP_HIT_COLOR: LinearRgba = LinearRgba::rgb(0.75, 0.0, 1.0);

/// Exclusive-phase half: latches the jump flag. The latch survives until
/// landing clears it, but never across a replay tick.
pub fn refresh_in_air_exclusive(
    in_air: &mut InAirState,
    jump_requested: bool,
    pending_update: bool,
) {
    in_air.jump_requested |= jump_requested;
    in_air.jumped = !pending_update && (in_air.jumped || in_air.jump_requested);
    in_air.jump_requested = false;
}

#[allow(clippy::too_many_arguments)]
pub fn refresh_in_air(
    in_air: &mut InAirState,
    lean: &mut LeanState,
    snapshot: &LocomotionState,
    locomotion_mode: LocomotionMode,
    owner: Option<Entity>,
    probe: &dyn SurfaceProbe,
    curves: &SampledCurves,
    general: &GeneralSettings,
    settings: &InAirSettings,
    debug: &mut DebugTraces,
    delta_time: f32,
    pending_update: bool,
) {
    if in_air.jumped {
        in_air.jump_play_rate = lerp_clamped(
            JUMP_MIN_PLAY_RATE,
            JUMP_MAX_PLAY_RATE,
            snapshot.speed / JUMP_REFERENCE_SPEED,
        );
    }

    if locomotion_mode != LocomotionMode::InAir {
        return;
    }

    // Kept separately so the landing reaction can read the impact speed.
    in_air.vertical_velocity = snapshot.velocity.z;

    refresh_ground_prediction(in_air, snapshot, owner, probe, curves, settings, debug);
    refresh_in_air_lean(lean, in_air, snapshot, general, settings, delta_time, pending_update);
}

/// Sweeps a capsule along the fall direction to estimate time-to-landing.
/// The result is the blend graph's cue to start the landing pose early.
fn refresh_ground_prediction(
    in_air: &mut InAirState,
    snapshot: &LocomotionState,
    owner: Option<Entity>,
    probe: &dyn SurfaceProbe,
    curves: &SampledCurves,
    settings: &InAirSettings,
    debug: &mut DebugTraces,
) {
    if in_air.vertical_velocity > PREDICTION_VERTICAL_VELOCITY_THRESHOLD {
        in_air.ground_prediction_amount = 0.0;
        return;
    }

    let allowance_amount = 1.0 - curves.value_clamped_01(curves::GROUND_PREDICTION_BLOCK);
    if allowance_amount <= 1.0e-4 {
        in_air.ground_prediction_amount = 0.0;
        return;
    }

    let mut velocity_direction = snapshot.velocity;
    velocity_direction.z = velocity_direction.z.clamp(
        PREDICTION_MIN_VERTICAL_VELOCITY,
        PREDICTION_MAX_VERTICAL_VELOCITY,
    );
    let Some(velocity_direction) = velocity_direction.try_normalize() else {
        in_air.ground_prediction_amount = 0.0;
        return;
    };

    // Faster falls look further ahead.
    let sweep_vector = velocity_direction
        * map_range_clamped(
            (PREDICTION_MAX_VERTICAL_VELOCITY, PREDICTION_MIN_VERTICAL_VELOCITY),
            (PREDICTION_MIN_SWEEP_DISTANCE, PREDICTION_MAX_SWEEP_DISTANCE),
            in_air.vertical_velocity,
        )
        * snapshot.scale;

    let hit = probe.sweep_capsule(
        snapshot.location,
        sweep_vector,
        snapshot.capsule_radius,
        snapshot.capsule_half_height,
        owner,
    );

    let ground = hit.filter(|hit| hit.is_walkable(snapshot.walkable_floor_z));

    debug.trace(
        snapshot.location,
        snapshot.location + sweep_vector,
        ground.as_ref(),
        SWEEP_MISS_COLOR,
        SWEEP_HIT_COLOR,
    );

    in_air.ground_prediction_amount = match ground {
        Some(hit) => {
            clamp01(settings.ground_prediction_amount_curve.sample(hit.time)) * allowance_amount
        }
        None => 0.0,
    };
}

/// Lean follows body-space velocity, with a curve on vertical velocity
/// flipping the lean direction between rising and falling.
fn refresh_in_air_lean(
    lean: &mut LeanState,
    in_air: &InAirState,
    snapshot: &LocomotionState,
    general: &GeneralSettings,
    settings: &InAirSettings,
    delta_time: f32,
    pending_update: bool,
) {
    let relative_velocity = (snapshot.rotation_quat.inverse() * snapshot.velocity)
        / LEAN_REFERENCE_SPEED
        * settings.lean_amount_curve.sample(in_air.vertical_velocity);

    if pending_update {
        lean.right_amount = relative_velocity.y;
        lean.forward_amount = relative_velocity.x;
    } else {
        lean.right_amount = interp_to(
            lean.right_amount,
            relative_velocity.y,
            delta_time,
            general.lean_interpolation_speed,
        );
        lean.forward_amount = interp_to(
            lean.forward_amount,
            relative_velocity.x,
            delta_time,
            general.lean_interpolation_speed,
        );
    }
}
