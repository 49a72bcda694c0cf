//! World-geometry query abstraction.
//!
//! The worker-thread phase needs two read-only queries: a capsule sweep for
//! ground prediction and a vertical ray for foot placement. Both go through
//! [`SurfaceProbe`] so the crate stays independent of any particular physics
//! backend; the `physics_avian` feature provides an implementation on top of
//! avian3d, and tests substitute fixed-geometry probes.

use std::sync::Arc;

use bevy::{
    math::Vec3,
    prelude::{Entity, Resource},
};

/// Result of a sweep or ray query against world geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceHit {
    pub location: Vec3,
    pub normal: Vec3,
    /// Normalized distance along the query at which the hit occurred, 0 at
    /// the start and 1 at the end.
    pub time: f32,
}

impl SurfaceHit {
    /// Whether the hit surface counts as ground the character could stand on.
    pub fn is_walkable(&self, walkable_floor_z: f32) -> bool {
        self.normal.z >= walkable_floor_z
    }
}

/// Read-only world-geometry queries, safe to call concurrently from multiple
/// characters' worker-thread updates.
pub trait SurfaceProbe: Send + Sync {
    /// Sweeps a vertical capsule from `start` to `start + offset`, ignoring
    /// `exclude` (the querying character's own body). Returns the first
    /// blocking hit.
    fn sweep_capsule(
        &self,
        start: Vec3,
        offset: Vec3,
        radius: f32,
        half_height: f32,
        exclude: Option<Entity>,
    ) -> Option<SurfaceHit>;

    /// Casts a ray from `start` to `start + offset`, ignoring `exclude`.
    fn ray_cast(&self, start: Vec3, offset: Vec3, exclude: Option<Entity>) -> Option<SurfaceHit>;
}

/// Probe that never hits anything. Characters simply find no ground, which
/// every consumer already treats as a normal branch outcome.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSurfaceProbe;

impl SurfaceProbe for NoSurfaceProbe {
    fn sweep_capsule(
        &self,
        _start: Vec3,
        _offset: Vec3,
        _radius: f32,
        _half_height: f32,
        _exclude: Option<Entity>,
    ) -> Option<SurfaceHit> {
        None
    }

    fn ray_cast(&self, _start: Vec3, _offset: Vec3, _exclude: Option<Entity>) -> Option<SurfaceHit> {
        None
    }
}

/// The probe shared by every character's update.
#[derive(Resource, Clone)]
pub struct SurfaceProbeHandle(pub Arc<dyn SurfaceProbe>);

impl Default for SurfaceProbeHandle {
    fn default() -> Self {
        Self(Arc::new(NoSurfaceProbe))
    }
}

impl SurfaceProbeHandle {
    pub fn new(probe: impl SurfaceProbe + 'static) -> Self {
        Self(Arc::new(probe))
    }

    pub fn probe(&self) -> &dyn SurfaceProbe {
        self.0.as_ref()
    }
}

#[cfg(test)]
pub(crate) mod test_probe {
    use super::*;

    /// A probe backed by a single horizontal plane at a fixed height.
    pub struct FlatGroundProbe {
        pub ground_z: f32,
    }

    impl SurfaceProbe for FlatGroundProbe {
        fn sweep_capsule(
            &self,
            start: Vec3,
            offset: Vec3,
            _radius: f32,
            half_height: f32,
            _exclude: Option<Entity>,
        ) -> Option<SurfaceHit> {
            let bottom_start = start.z - half_height;
            let bottom_end = bottom_start + offset.z;
            if bottom_start < self.ground_z || bottom_end >= self.ground_z {
                return None;
            }

            let time = (bottom_start - self.ground_z) / (bottom_start - bottom_end);
            Some(SurfaceHit {
                location: start + offset * time - Vec3::new(0.0, 0.0, half_height),
                normal: Vec3::Z,
                time,
            })
        }

        fn ray_cast(
            &self,
            start: Vec3,
            offset: Vec3,
            _exclude: Option<Entity>,
        ) -> Option<SurfaceHit> {
            let end = start + offset;
            if start.z < self.ground_z || end.z >= self.ground_z {
                return None;
            }

            let time = (start.z - self.ground_z) / (start.z - end.z);
            Some(SurfaceHit {
                location: start + offset * time,
                normal: Vec3::Z,
                time,
            })
        }
    }
}
