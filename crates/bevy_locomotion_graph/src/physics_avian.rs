//! Surface probe backed by Avian's spatial query pipeline.

use avian3d::prelude::{
    Collider, ShapeCastConfig, SpatialQueryFilter, SpatialQueryPipeline,
};
use bevy::math::{Dir3, Quat, Vec3};
use bevy::prelude::Entity;

use crate::queries::{SurfaceHit, SurfaceProbe};

pub struct AvianSurfaceProbe<'a> {
    pipeline: &'a SpatialQueryPipeline,
}

impl<'a> AvianSurfaceProbe<'a> {
    pub fn new(pipeline: &'a SpatialQueryPipeline) -> Self {
        Self { pipeline }
    }
}

fn filter_for(exclude: Option<Entity>) -> SpatialQueryFilter {
    match exclude {
        Some(entity) => SpatialQueryFilter::default().with_excluded_entities([entity]),
        None => SpatialQueryFilter::default(),
    }
}

impl SurfaceProbe for AvianSurfaceProbe<'_> {
    fn sweep_capsule(
        &self,
        start: Vec3,
        offset: Vec3,
        radius: f32,
        half_height: f32,
        exclude: Option<Entity>,
    ) -> Option<SurfaceHit> {
        let max_distance = offset.length();
        let direction = Dir3::new(offset).ok()?;

        let capsule = Collider::capsule(radius, ((half_height - radius) * 2.0).max(0.0));

        let hit = self.pipeline.cast_shape(
            &capsule,
            start,
            Quat::IDENTITY,
            direction,
            &ShapeCastConfig::from_max_distance(max_distance),
            &filter_for(exclude),
        )?;

        // point2/normal2 lie on the hit geometry; normal2 points out of the
        // ground, which is what the walkability check expects.
        Some(SurfaceHit {
            location: hit.point2,
            normal: hit.normal2,
            time: hit.distance / max_distance,
        })
    }

    fn ray_cast(
        &self,
        start: Vec3,
        offset: Vec3,
        exclude: Option<Entity>,
    ) -> Option<SurfaceHit> {
        let max_distance = offset.length();
        let direction = Dir3::new(offset).ok()?;

        let hit = self.pipeline.cast_ray(
            start,
            direction,
            max_distance,
            true,
            &filter_for(exclude),
        )?;

        Some(SurfaceHit {
            location: start + *direction * hit.distance,
            normal: hit.normal,
            time: hit.distance / max_distance,
        })
    }
}
