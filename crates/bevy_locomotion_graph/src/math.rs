//! Scalar, vector and angle helpers shared by the locomotion subsystems.
//!
//! All angles are in degrees and normalized to the `(-180, 180]` range unless
//! stated otherwise. The crate operates in a Z-up, X-forward character space,
//! with yaw measured counter-clockwise about +Z.

use bevy::{
    math::{Quat, Vec2, Vec3},
    reflect::Reflect,
};
use serde::{Deserialize, Serialize};

/// Angles closer than this to the 180° discontinuity are treated as
/// counter-clockwise rotations, so interpolation does not take the long way
/// around when the target sits right on the boundary.
pub const CCW_ROTATION_ANGLE_THRESHOLD: f32 = 5.0;

/// Weights below this are considered irrelevant for blending purposes.
pub const MIN_RELEVANT_WEIGHT: f32 = 0.0001;

/// Weights above this are considered full weight.
pub const FULL_WEIGHT: f32 = 0.9999;

pub fn is_relevant_weight(weight: f32) -> bool {
    weight > MIN_RELEVANT_WEIGHT
}

pub fn is_full_weight(weight: f32) -> bool {
    weight >= FULL_WEIGHT
}

pub fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

pub fn lerp_clamped(a: f32, b: f32, alpha: f32) -> f32 {
    a + (b - a) * clamp01(alpha)
}

/// Remaps `value` from the input range to the output range, clamping to the
/// output range. The input range may be reversed (e.g. `(-200, -4000)`).
pub fn map_range_clamped(input: (f32, f32), output: (f32, f32), value: f32) -> f32 {
    let (in_min, in_max) = input;
    let (out_min, out_max) = output;

    let range = in_max - in_min;
    if range.abs() <= f32::EPSILON {
        return out_min;
    }

    let alpha = clamp01((value - in_min) / range);
    out_min + (out_max - out_min) * alpha
}

/// Wraps an angle in degrees to `(-180, 180]`.
pub fn normalize_angle(angle: f32) -> f32 {
    let mut wrapped = angle % 360.0;
    if wrapped <= -180.0 {
        wrapped += 360.0;
    } else if wrapped > 180.0 {
        wrapped -= 360.0;
    }
    wrapped
}

/// Angle in degrees of a direction vector, measured from the +X axis.
pub fn direction_to_angle(direction: Vec2) -> f32 {
    direction.y.atan2(direction.x).to_degrees()
}

/// Clamps a vector to the unit ball, preserving direction.
pub fn clamp_magnitude_01(vector: Vec3) -> Vec3 {
    let length_squared = vector.length_squared();
    if length_squared > 1.0 {
        vector / length_squared.sqrt()
    } else {
        vector
    }
}

/// Frame-rate independent interpolation step toward a target. Matches the
/// classic `interp to` behavior: the step is proportional to the remaining
/// distance, and a non-positive speed snaps to the target.
pub fn interp_to(current: f32, target: f32, delta_time: f32, speed: f32) -> f32 {
    if speed <= 0.0 {
        return target;
    }

    let delta = target - current;
    if delta * delta < f32::EPSILON {
        return target;
    }

    current + delta * clamp01(delta_time * speed)
}

/// Same as [`interp_to`], but over wrapped degrees so interpolation always
/// takes the short way around.
pub fn interp_angle_to(current: f32, target: f32, delta_time: f32, speed: f32) -> f32 {
    if speed <= 0.0 {
        return target;
    }

    let delta = normalize_angle(target - current);
    if delta * delta < f32::EPSILON {
        return target;
    }

    normalize_angle(current + delta * clamp01(delta_time * speed))
}

pub fn interp_vector_to(current: Vec3, target: Vec3, delta_time: f32, speed: f32) -> Vec3 {
    if speed <= 0.0 {
        return target;
    }

    let delta = target - current;
    if delta.length_squared() < f32::EPSILON {
        return target;
    }

    current + delta * clamp01(delta_time * speed)
}

pub fn interp_quat_to(current: Quat, target: Quat, delta_time: f32, speed: f32) -> Quat {
    if speed <= 0.0 {
        return target;
    }

    current.slerp(target, clamp01(delta_time * speed)).normalize()
}

/// Fraction of the remaining distance covered after `delta_time` for an
/// exponential decay with rate `lambda`.
pub fn exponential_decay(delta_time: f32, lambda: f32) -> f32 {
    if lambda <= 0.0 {
        return 1.0;
    }

    1.0 - (-lambda * delta_time).exp()
}

pub fn exponential_decay_value(current: f32, target: f32, delta_time: f32, lambda: f32) -> f32 {
    current + (target - current) * exponential_decay(delta_time, lambda)
}

pub fn exponential_decay_angle(current: f32, target: f32, delta_time: f32, lambda: f32) -> f32 {
    normalize_angle(current + normalize_angle(target - current) * exponential_decay(delta_time, lambda))
}

/// A pitch/yaw rotation in degrees, in the crate's Z-up character space.
///
/// This is intentionally not a full orientation: roll never participates in
/// the view and body math, so carrying it around would only invite drift.
#[derive(Reflect, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Rotator {
    pub pitch: f32,
    pub yaw: f32,
}

impl Rotator {
    pub fn new(pitch: f32, yaw: f32) -> Self {
        Self { pitch, yaw }
    }

    pub fn normalized(self) -> Self {
        Self {
            pitch: normalize_angle(self.pitch),
            yaw: normalize_angle(self.yaw),
        }
    }

    /// Yaw-only quaternion about +Z.
    pub fn yaw_quat(self) -> Quat {
        Quat::from_rotation_z(self.yaw.to_radians())
    }

    pub fn exponential_decay(self, target: Self, delta_time: f32, lambda: f32) -> Self {
        Self {
            pitch: exponential_decay_angle(self.pitch, target.pitch, delta_time, lambda),
            yaw: exponential_decay_angle(self.yaw, target.yaw, delta_time, lambda),
        }
    }
}

/// Persistent state of a [`spring_damp`] filter.
#[derive(Reflect, Clone, Copy, Debug, Default)]
pub struct SpringState {
    pub velocity: Vec3,
    pub previous_target: Vec3,
    pub valid: bool,
}

impl SpringState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Second-order damped spring toward a possibly moving target.
///
/// `frequency` is the undamped natural frequency in Hz, `damping_ratio` is 1
/// for critical damping, above 1 for over-damped and below 1 for under-damped
/// behavior. `target_velocity_amount` scales how much of the target's own
/// velocity (estimated by finite differences) the spring tracks.
///
/// The integration is semi-analytic per damping branch, so it stays stable
/// for any positive time step.
pub fn spring_damp(
    current: Vec3,
    target: Vec3,
    spring: &mut SpringState,
    delta_time: f32,
    frequency: f32,
    damping_ratio: f32,
    target_velocity_amount: f32,
) -> Vec3 {
    if delta_time <= f32::EPSILON || frequency <= 0.0 {
        return current;
    }

    if !spring.valid {
        spring.velocity = Vec3::ZERO;
        spring.previous_target = target;
        spring.valid = true;
        return current;
    }

    let target_velocity =
        (target - spring.previous_target) * (clamp01(target_velocity_amount) / delta_time);
    spring.previous_target = target;

    let omega = frequency * core::f32::consts::TAU;
    let zeta = damping_ratio.max(0.0);

    // Solve on the error term so a moving target is handled exactly.
    let error = current - target;
    let error_velocity = spring.velocity - target_velocity;

    let (new_error, new_error_velocity) = if (zeta - 1.0).abs() < 1.0e-4 {
        // Critically damped.
        let exp = (-omega * delta_time).exp();
        let c = error_velocity + omega * error;
        (
            (error + c * delta_time) * exp,
            (error_velocity - c * (omega * delta_time)) * exp,
        )
    } else if zeta > 1.0 {
        // Over-damped: two real roots.
        let root = (zeta * zeta - 1.0).sqrt();
        let r1 = -omega * (zeta - root);
        let r2 = -omega * (zeta + root);
        let c2 = (error_velocity - error * r1) / (r2 - r1);
        let c1 = error - c2;
        let e1 = (r1 * delta_time).exp();
        let e2 = (r2 * delta_time).exp();
        (c1 * e1 + c2 * e2, c1 * (r1 * e1) + c2 * (r2 * e2))
    } else {
        // Under-damped: oscillatory.
        let omega_d = omega * (1.0 - zeta * zeta).sqrt();
        let decay = (-zeta * omega * delta_time).exp();
        let (sin, cos) = (omega_d * delta_time).sin_cos();
        let c2 = (error_velocity + error * (zeta * omega)) / omega_d;
        let position = (error * cos + c2 * sin) * decay;
        let velocity = (c2 * cos - error * sin) * (decay * omega_d) - position * (zeta * omega);
        (position, velocity)
    };

    spring.velocity = new_error_velocity + target_velocity;
    target + new_error
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_angle_wraps_to_half_open_range() {
        assert_eq!(normalize_angle(190.0), -170.0);
        assert_eq!(normalize_angle(-190.0), 170.0);
        assert_eq!(normalize_angle(360.0), 0.0);
        assert_eq!(normalize_angle(180.0), 180.0);
        assert_eq!(normalize_angle(540.0), 180.0);
    }

    #[test]
    fn map_range_clamped_supports_reversed_input_ranges() {
        // The ground prediction sweep distance mapping from the aerial subsystem.
        let map = |vertical_velocity: f32| {
            map_range_clamped((-200.0, -4000.0), (150.0, 2000.0), vertical_velocity)
        };

        assert_eq!(map(-200.0), 150.0);
        assert_eq!(map(-4000.0), 2000.0);
        assert_eq!(map(0.0), 150.0);
        assert_eq!(map(-10000.0), 2000.0);

        let expected = 150.0 + (2000.0 - 150.0) * ((-3000.0 + 200.0) / (-4000.0 + 200.0));
        assert!((map(-3000.0) - expected).abs() < 1.0e-3);
    }

    #[test]
    fn clamp_magnitude_01_preserves_short_vectors() {
        let short = Vec3::new(0.3, 0.4, 0.0);
        assert_eq!(clamp_magnitude_01(short), short);

        let long = Vec3::new(3.0, 4.0, 0.0);
        let clamped = clamp_magnitude_01(long);
        assert!((clamped.length() - 1.0).abs() < 1.0e-6);
        assert!(clamped.normalize().abs_diff_eq(long.normalize(), 1.0e-6));
    }

    #[test]
    fn interp_to_snaps_with_non_positive_speed() {
        assert_eq!(interp_to(0.0, 10.0, 0.016, 0.0), 10.0);
        assert_eq!(interp_to(0.0, 10.0, 0.016, -1.0), 10.0);
    }

    #[test]
    fn interp_angle_to_takes_short_way_around() {
        let result = interp_angle_to(170.0, -170.0, 0.1, 5.0);
        assert!(result > 170.0 || result < -170.0, "got {result}");
    }

    #[test]
    fn exponential_decay_converges() {
        let lambda = 4.0;
        let mut value = 1.0;
        let dt = 0.016;
        let mut time = 0.0;
        while time < 5.0 / lambda {
            value = exponential_decay_value(value, 0.0, dt, lambda);
            time += dt;
        }
        assert!(value.abs() < 0.01, "lean-style decay left {value}");
    }

    #[test]
    fn spring_damp_converges_without_overshoot_when_over_damped() {
        let mut spring = SpringState::default();
        let mut position = Vec3::ZERO;
        let target = Vec3::new(0.0, 0.0, 10.0);
        let dt = 1.0 / 60.0;

        for _ in 0..600 {
            position = spring_damp(position, target, &mut spring, dt, 0.4, 4.0, 1.0);
            assert!(position.is_finite());
            assert!(position.z <= target.z + 1.0e-3);
        }

        assert!((position.z - target.z).abs() < 0.05, "ended at {position}");
    }

    #[test]
    fn spring_damp_first_call_only_seeds_state() {
        let mut spring = SpringState::default();
        let position = Vec3::splat(3.0);
        let result = spring_damp(position, Vec3::ZERO, &mut spring, 0.016, 1.0, 1.0, 1.0);
        assert_eq!(result, position);
        assert!(spring.valid);
    }
}
