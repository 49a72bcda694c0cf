//! Deferred debug drawing for world-geometry queries.
//!
//! Gizmos cannot be drawn from the worker-thread phase, so trace shapes are
//! queued per character and applied later by
//! [`apply_debug_traces`](crate::systems::apply_debug_traces). Replay ticks
//! discard the queue instead of drawing it twice.

use bevy::{color::LinearRgba, gizmos::gizmos::Gizmos, math::Vec3, reflect::Reflect};

use crate::queries::SurfaceHit;

const HIT_MARKER_RADIUS: f32 = 4.0;

#[derive(Clone, Debug, Reflect, Default)]
pub struct DebugTraces {
    pub enabled: bool,
    commands: Vec<DebugTraceCommand>,
}

#[derive(Clone, Debug, Reflect)]
pub enum DebugTraceCommand {
    Line(Vec3, Vec3, LinearRgba),
    Sphere(Vec3, f32, LinearRgba),
}

impl DebugTraces {
    /// Queues a trace from `start` to `end`, colored by whether it found
    /// walkable ground, with a marker sphere at the hit point.
    pub fn trace(
        &mut self,
        start: Vec3,
        end: Vec3,
        hit: Option<&SurfaceHit>,
        miss_color: LinearRgba,
        hit_color: LinearRgba,
    ) {
        if !self.enabled {
            return;
        }

        let color = if hit.is_some() { hit_color } else { miss_color };
        self.commands.push(DebugTraceCommand::Line(start, end, color));

        if let Some(hit) = hit {
            self.commands
                .push(DebugTraceCommand::Sphere(hit.location, HIT_MARKER_RADIUS, color));
        }
    }

    pub fn apply(&mut self, gizmos: &mut Gizmos) {
        for command in self.commands.drain(..) {
            match command {
                DebugTraceCommand::Line(start, end, color) => {
                    gizmos.line(start, end, color);
                }
                DebugTraceCommand::Sphere(position, radius, color) => {
                    gizmos.sphere(position, radius, color);
                }
            }
        }
    }

    pub fn discard(&mut self) {
        self.commands.clear();
    }
}
