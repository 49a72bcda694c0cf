//! The per-character locomotion instance.
//!
//! [`LocomotionInstance`] owns every persistent state record and runs the
//! three update phases:
//!
//! 1. [`update_exclusive`](LocomotionInstance::update_exclusive) consumes the
//!    [`CharacterFrame`], folds it into the snapshot and resolves everything
//!    that latches across ticks or must observe request flags exactly once.
//! 2. [`update_threadsafe`](LocomotionInstance::update_threadsafe) derives all
//!    blend parameters from the snapshot. It takes no exclusive resources and
//!    is safe to run for many characters in parallel.
//! 3. [`post_evaluate`](LocomotionInstance::post_evaluate) drains queued clip
//!    playback and clears the per-tick flags.

use bevy::asset::prelude::*;
use bevy::prelude::{Component, Entity};
use bevy::reflect::Reflect;

use crate::{
    drawing::DebugTraces,
    feet::{self, FeetContext},
    grounded, in_air, pose,
    queries::SurfaceProbe,
    requests::PlaybackRequest,
    settings::LocomotionSettings,
    snapshot::{self, CharacterFrame},
    state::{
        FeetState, Gait, GroundedEntryMode, GroundedState, InAirState, LayeringState, LeanState,
        LocomotionAction, LocomotionMode, LocomotionState, PoseState, RagdollingState,
        RotateInPlaceState, RotationMode, SlotName, Stance, TransitionsState, TurnInPlaceState,
        ViewMode, ViewState,
    },
    transitions, view,
};

/// The settings asset driving a character's locomotion instance.
#[derive(Component, Reflect, Clone, Debug, Default)]
pub struct LocomotionSettingsHandle(pub Handle<LocomotionSettings>);

#[derive(Component, Reflect, Clone, Debug, Default)]
pub struct LocomotionInstance {
    pub locomotion_mode: LocomotionMode,
    pub stance: Stance,
    pub gait: Gait,
    pub rotation_mode: RotationMode,
    pub view_mode: ViewMode,
    pub locomotion_action: LocomotionAction,

    pub snapshot: LocomotionState,
    pub layering: LayeringState,
    pub pose: PoseState,
    pub view: ViewState,
    pub grounded: GroundedState,
    pub in_air: InAirState,
    pub lean: LeanState,
    pub feet: FeetState,
    pub transitions: TransitionsState,
    pub rotate_in_place: RotateInPlaceState,
    pub turn_in_place: TurnInPlaceState,
    pub ragdolling: RagdollingState,

    pub debug: DebugTraces,

    pending_update: bool,
    teleported: bool,
    previous_locomotion_mode: LocomotionMode,
    pending_playback: Vec<PlaybackRequest>,
}

impl LocomotionInstance {
    /// True when this tick replays already-simulated state and filters must
    /// snap instead of interpolating.
    pub fn pending_update(&self) -> bool {
        self.pending_update
    }

    pub fn teleported(&self) -> bool {
        self.teleported
    }

    /// Exclusive phase. Consumes the frame's request flags, so it must run
    /// exactly once per simulation tick.
    pub fn update_exclusive(
        &mut self,
        frame: &mut CharacterFrame,
        settings: &LocomotionSettings,
        delta_time: f32,
    ) {
        self.pending_update |= frame.pending_update;
        self.teleported |= frame.teleported;
        frame.pending_update = false;
        frame.teleported = false;

        self.refresh_mode_changes(frame);

        self.stance = frame.stance;
        self.gait = frame.gait;
        self.rotation_mode = frame.rotation_mode;
        self.view_mode = frame.view_mode;
        self.locomotion_action = frame.locomotion_action;

        snapshot::refresh_locomotion_state(&mut self.snapshot, frame, settings, delta_time);

        view::refresh_view_exclusive(&mut self.view, frame.view_rotation, delta_time);

        self.grounded.pivot_activation_requested |= frame.pivot_requested;
        frame.pivot_requested = false;
        grounded::refresh_grounded_exclusive(
            &mut self.grounded,
            &self.snapshot,
            &settings.grounded,
            self.pending_update,
        );

        in_air::refresh_in_air_exclusive(
            &mut self.in_air,
            frame.jump_requested,
            self.pending_update,
        );
        frame.jump_requested = false;

        feet::refresh_feet_exclusive(&mut self.feet, &frame.foot_targets);

        transitions::refresh_ragdolling_exclusive(
            &mut self.ragdolling,
            self.locomotion_action,
            frame.root_bone_speed,
        );

        if let Some(final_pose) = frame.final_ragdoll_pose.take() {
            self.ragdolling.final_ragdoll_pose = final_pose;
            self.pending_playback.push(PlaybackRequest::FinalizeRagdolling);
        }

        if frame.quick_stop_requested {
            frame.quick_stop_requested = false;

            if let Some(request) = transitions::play_quick_stop(
                &self.snapshot,
                self.stance,
                self.rotation_mode,
                &settings.transitions,
            ) {
                self.pending_playback.push(PlaybackRequest::Play(request));
            }
        }

        if let Some(request) = frame.transition_requested.take()
            && !(request.from_standing_idle_only
                && (self.snapshot.moving || self.stance != Stance::Standing))
            && let Some(play) = transitions::play_transition(
                &settings.transitions,
                self.stance,
                request.foot,
                request.blend_in_time,
                request.blend_out_time,
                request.play_rate,
                request.start_time,
            )
        {
            self.pending_playback.push(PlaybackRequest::Play(play));
        }

        if let Some(blend_out_time) = frame.stop_transitions_requested.take() {
            self.transitions.queued_dynamic_transition = None;
            self.turn_in_place.queued_clip = None;

            for slot in [
                SlotName::Transition,
                SlotName::TurnInPlaceStanding,
                SlotName::TurnInPlaceCrouching,
            ] {
                self.pending_playback.push(PlaybackRequest::Stop {
                    slot,
                    blend_out_time,
                });
            }
        }
    }

    fn refresh_mode_changes(&mut self, frame: &mut CharacterFrame) {
        if frame.locomotion_mode != self.locomotion_mode {
            self.previous_locomotion_mode = self.locomotion_mode;
            self.locomotion_mode = frame.locomotion_mode;

            // Landing ends the jump; the latch must not leak into the next
            // aerial phase.
            if self.locomotion_mode == LocomotionMode::Grounded {
                self.in_air.jumped = false;
                self.in_air.jump_play_rate = 1.0;
            }
        }

        // An action starting or ending interrupts the grounded entry
        // animation. The frame's field is cleared too, since it is re-read
        // every tick.
        if frame.locomotion_action != self.locomotion_action {
            frame.grounded_entry_mode = GroundedEntryMode::None;
        }

        self.grounded.entry_mode = frame.grounded_entry_mode;
    }

    /// The grounded entry animation finished; called by the game once the
    /// blend graph has left the entry state.
    pub fn reset_grounded_entry_mode(&mut self) {
        self.grounded.entry_mode = GroundedEntryMode::None;
    }

    /// Worker-thread phase. Only reads the snapshot, the frame's sampled
    /// curves and the shared settings asset.
    #[allow(clippy::too_many_arguments)]
    pub fn update_threadsafe(
        &mut self,
        frame: &CharacterFrame,
        settings: &LocomotionSettings,
        probe: &dyn SurfaceProbe,
        owner: Option<Entity>,
        delta_time: f32,
    ) {
        let curves = &frame.curves;
        let curves_relevant = frame.curves_relevant;

        pose::refresh_layering(&mut self.layering, curves, curves_relevant);
        pose::refresh_pose(&mut self.pose, curves, curves_relevant);

        view::refresh_view(
            &mut self.view,
            &self.snapshot,
            self.locomotion_action,
            self.rotation_mode,
            curves,
            &settings.view,
            delta_time,
            self.pending_update,
        );

        grounded::refresh_grounded(
            &mut self.grounded,
            &mut self.lean,
            &self.snapshot,
            &self.view,
            &self.pose,
            self.locomotion_mode,
            self.rotation_mode,
            self.gait,
            curves,
            &settings.general,
            &settings.grounded,
            delta_time,
            self.pending_update,
        );

        in_air::refresh_in_air(
            &mut self.in_air,
            &mut self.lean,
            &self.snapshot,
            self.locomotion_mode,
            owner,
            probe,
            curves,
            &settings.general,
            &settings.in_air,
            &mut self.debug,
            delta_time,
            self.pending_update,
        );

        feet::refresh_feet(
            &mut self.feet,
            &FeetContext {
                snapshot: &self.snapshot,
                locomotion_mode: self.locomotion_mode,
                curves,
                settings: &settings.feet,
                probe,
                owner,
                delta_time,
                teleported: self.teleported,
            },
            &mut self.debug,
            curves_relevant,
            self.pending_update,
        );

        transitions::refresh_transitions(
            &mut self.transitions,
            &self.feet,
            &self.snapshot,
            self.locomotion_mode,
            self.stance,
            curves,
            &settings.transitions,
            curves_relevant,
        );

        transitions::refresh_rotate_in_place(
            &mut self.rotate_in_place,
            &self.view,
            &self.snapshot,
            self.locomotion_mode,
            self.rotation_mode,
            self.view_mode,
            &settings.rotate_in_place,
            delta_time,
            self.pending_update,
        );

        transitions::refresh_turn_in_place(
            &mut self.turn_in_place,
            &self.view,
            &self.snapshot,
            &self.transitions,
            self.locomotion_mode,
            self.stance,
            self.rotation_mode,
            self.view_mode,
            &settings.turn_in_place,
            delta_time,
            self.pending_update,
        );
    }

    /// Post-evaluation phase. Emits queued clip playback into `out` and
    /// clears the per-tick flags. Replay ticks drop their playback and debug
    /// output, since the authoritative tick already produced both.
    pub fn post_evaluate(
        &mut self,
        settings: &LocomotionSettings,
        out: &mut Vec<PlaybackRequest>,
    ) {
        if self.pending_update {
            self.transitions.queued_dynamic_transition = None;
            self.turn_in_place.queued_clip = None;
            self.pending_playback.clear();
            self.debug.discard();
        } else {
            out.append(&mut self.pending_playback);

            if let Some(request) = transitions::play_queued_dynamic_transition(
                &mut self.transitions,
                &settings.transitions,
            ) {
                out.push(PlaybackRequest::Play(request));
            }

            if let Some(request) = transitions::play_queued_turn_in_place(
                &mut self.turn_in_place,
                &settings.turn_in_place,
            ) {
                // A turn pre-empts whatever one-shot still occupies the
                // transition slot.
                out.push(PlaybackRequest::Stop {
                    slot: SlotName::Transition,
                    blend_out_time: settings.turn_in_place.blend_time,
                });
                out.push(PlaybackRequest::Play(request));
            }
        }

        self.pending_update = false;
        self.teleported = false;
    }
}
