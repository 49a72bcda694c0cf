//! The per-tick system chain.
//!
//! The systems run in [`PostUpdate`](bevy::app::PostUpdate), chained, before
//! transform propagation:
//!
//! 1. [`update_locomotion_exclusive`] consumes each [`CharacterFrame`].
//! 2. [`update_locomotion`] runs the pure per-character derivation in
//!    parallel. World-geometry queries go through the configured
//!    [`SurfaceProbeHandle`](crate::queries::SurfaceProbeHandle) (or the
//!    physics engine directly, with the `physics_avian` feature).
//! 3. [`drain_playback_requests`] collects queued clip playback into the
//!    [`SlotPlaybackQueue`] resource.
//! 4. [`apply_debug_traces`] flushes deferred debug gizmos.

use bevy::{
    asset::Assets,
    ecs::prelude::*,
    gizmos::gizmos::Gizmos,
    log::warn_once,
    time::Time,
};

#[cfg(not(feature = "physics_avian"))]
use crate::queries::SurfaceProbeHandle;
use crate::{
    instance::{LocomotionInstance, LocomotionSettingsHandle},
    requests::SlotPlaybackQueue,
    settings::LocomotionSettings,
    snapshot::CharacterFrame,
};

pub fn update_locomotion_exclusive(
    time: Res<Time>,
    settings_assets: Res<Assets<LocomotionSettings>>,
    mut characters: Query<(
        &mut CharacterFrame,
        &mut LocomotionInstance,
        &LocomotionSettingsHandle,
    )>,
) {
    let delta_time = time.delta_secs();

    for (mut frame, mut instance, settings) in &mut characters {
        let Some(settings) = settings_assets.get(&settings.0) else {
            warn_once!("Locomotion settings not loaded yet, skipping update");
            continue;
        };

        instance.update_exclusive(&mut frame, settings, delta_time);
    }
}

#[cfg(not(feature = "physics_avian"))]
pub fn update_locomotion(
    time: Res<Time>,
    settings_assets: Res<Assets<LocomotionSettings>>,
    probe: Res<SurfaceProbeHandle>,
    mut characters: Query<(
        Entity,
        &CharacterFrame,
        &mut LocomotionInstance,
        &LocomotionSettingsHandle,
    )>,
) {
    let delta_time = time.delta_secs();
    let probe = probe.0.as_ref();

    characters
        .par_iter_mut()
        .for_each(|(entity, frame, mut instance, settings)| {
            let Some(settings) = settings_assets.get(&settings.0) else {
                return;
            };

            instance.update_threadsafe(frame, settings, probe, Some(entity), delta_time);
        });
}

#[cfg(feature = "physics_avian")]
pub fn update_locomotion(
    time: Res<Time>,
    settings_assets: Res<Assets<LocomotionSettings>>,
    pipeline: Res<avian3d::prelude::SpatialQueryPipeline>,
    mut characters: Query<(
        Entity,
        &CharacterFrame,
        &mut LocomotionInstance,
        &LocomotionSettingsHandle,
    )>,
) {
    let delta_time = time.delta_secs();
    let probe = crate::physics_avian::AvianSurfaceProbe::new(&pipeline);

    characters
        .par_iter_mut()
        .for_each(|(entity, frame, mut instance, settings)| {
            let Some(settings) = settings_assets.get(&settings.0) else {
                return;
            };

            instance.update_threadsafe(frame, settings, &probe, Some(entity), delta_time);
        });
}

pub fn drain_playback_requests(
    settings_assets: Res<Assets<LocomotionSettings>>,
    mut queue: ResMut<SlotPlaybackQueue>,
    mut characters: Query<(Entity, &mut LocomotionInstance, &LocomotionSettingsHandle)>,
) {
    let mut requests = Vec::new();

    for (entity, mut instance, settings) in &mut characters {
        let Some(settings) = settings_assets.get(&settings.0) else {
            continue;
        };

        instance.post_evaluate(settings, &mut requests);
        for request in requests.drain(..) {
            queue.push(entity, request);
        }
    }
}

pub fn apply_debug_traces(
    mut characters: Query<&mut LocomotionInstance>,
    mut gizmos: Gizmos,
) {
    for mut instance in &mut characters {
        instance.debug.apply(&mut gizmos);
    }
}
