//! Designer-authored scalar curves used by the settings asset.

use bevy::reflect::Reflect;
use serde::{Deserialize, Serialize};

#[derive(Reflect, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
}

impl CurveKey {
    pub fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// A piecewise-linear float curve keyed on an arbitrary input axis (speed,
/// vertical velocity, hit time...). Keys are kept sorted by time; evaluation
/// clamps outside the keyed range.
#[derive(Reflect, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FloatCurve {
    keys: Vec<CurveKey>,
}

impl Default for FloatCurve {
    fn default() -> Self {
        Self::constant(0.0)
    }
}

impl FloatCurve {
    pub fn new(mut keys: Vec<CurveKey>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    pub fn constant(value: f32) -> Self {
        Self {
            keys: vec![CurveKey::new(0.0, value)],
        }
    }

    pub fn from_pairs(pairs: &[(f32, f32)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|&(time, value)| CurveKey::new(time, value))
                .collect(),
        )
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    pub fn sample(&self, time: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return 0.0;
        };
        let last = self.keys.last().unwrap();

        if time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        let next_index = self
            .keys
            .partition_point(|key| key.time <= time)
            .min(self.keys.len() - 1);
        let previous = self.keys[next_index - 1];
        let next = self.keys[next_index];

        let span = next.time - previous.time;
        if span <= f32::EPSILON {
            return next.value;
        }

        let alpha = (time - previous.time) / span;
        previous.value + (next.value - previous.value) * alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_clamps_outside_keyed_range() {
        let curve = FloatCurve::from_pairs(&[(0.0, 0.2), (150.0, 1.0)]);
        assert_eq!(curve.sample(-10.0), 0.2);
        assert_eq!(curve.sample(500.0), 1.0);
    }

    #[test]
    fn sample_interpolates_linearly() {
        let curve = FloatCurve::from_pairs(&[(0.0, 0.0), (10.0, 1.0), (20.0, 0.0)]);
        assert!((curve.sample(5.0) - 0.5).abs() < 1.0e-6);
        assert!((curve.sample(15.0) - 0.5).abs() < 1.0e-6);
    }

    #[test]
    fn keys_are_sorted_on_construction() {
        let curve = FloatCurve::from_pairs(&[(10.0, 1.0), (0.0, 0.0)]);
        assert_eq!(curve.keys()[0].time, 0.0);
        assert!((curve.sample(5.0) - 0.5).abs() < 1.0e-6);
    }
}
