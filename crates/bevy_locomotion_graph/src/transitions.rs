//! Transition and turn state machines.
//!
//! All of these are level-triggered: recomputed from the current predicates
//! every tick, with the explicitly latched exceptions (the dynamic transition
//! frame delay and the turn-in-place activation timer). Clip playback cannot
//! happen on the worker thread, so selected clips are queued on the state and
//! turned into [`PlaybackRequest`]s during the exclusive drain.

use crate::{
    curves::{self, SampledCurves},
    math::{
        CCW_ROTATION_ANGLE_THRESHOLD, clamp01, interp_to, is_full_weight, is_relevant_weight,
        lerp_clamped, map_range_clamped, normalize_angle,
    },
    requests::PlaySlotAnimation,
    settings::{RotateInPlaceSettings, TransitionSettings, TurnInPlaceSettings},
    state::{
        FeetState, Foot, LocomotionAction, LocomotionMode, LocomotionState, RagdollingState,
        RotateInPlaceState, RotationMode, SlotName, Stance, TransitionsState, TurnInPlaceState,
        ViewMode, ViewState,
    },
};

const ROTATE_PLAY_RATE_INTERPOLATION_SPEED: f32 = 5.0;
const ROTATE_BLOCK_INTERPOLATION_SPEED: f32 = 5.0;

/// Root bone speed at which the ragdoll flail plays at full rate.
const FLAIL_REFERENCE_SPEED: f32 = 1000.0;

pub fn refresh_transitions(
    transitions: &mut TransitionsState,
    feet: &FeetState,
    snapshot: &LocomotionState,
    locomotion_mode: LocomotionMode,
    stance: Stance,
    curves: &SampledCurves,
    settings: &TransitionSettings,
    curves_relevant: bool,
) {
    // The graph holds this curve at full weight in states where transitions
    // are welcome.
    transitions.transitions_allowed = is_full_weight(curves.value(curves::ALLOW_TRANSITIONS));

    refresh_dynamic_transition(
        transitions,
        feet,
        snapshot,
        locomotion_mode,
        stance,
        settings,
        curves_relevant,
    );
}

/// Queues a corrective one-shot when a locked foot has drifted too far from
/// its animated target while standing still.
fn refresh_dynamic_transition(
    transitions: &mut TransitionsState,
    feet: &FeetState,
    snapshot: &LocomotionState,
    locomotion_mode: LocomotionMode,
    stance: Stance,
    settings: &TransitionSettings,
    curves_relevant: bool,
) {
    if transitions.dynamic_transition_frame_delay > 0 {
        transitions.dynamic_transition_frame_delay -= 1;
        return;
    }

    if !curves_relevant
        || !transitions.transitions_allowed
        || snapshot.moving
        || locomotion_mode != LocomotionMode::Grounded
    {
        return;
    }

    let threshold_squared =
        (settings.dynamic_transition_foot_lock_distance_threshold * snapshot.scale).powi(2);

    let left_distance_squared = feet
        .left
        .target_location
        .distance_squared(feet.left.lock_location);
    let right_distance_squared = feet
        .right
        .target_location
        .distance_squared(feet.right.lock_location);

    let left_allowed = is_relevant_weight(feet.left.lock_amount)
        && left_distance_squared > threshold_squared;
    let right_allowed = is_relevant_weight(feet.right.lock_amount)
        && right_distance_squared > threshold_squared;

    if !left_allowed && !right_allowed {
        return;
    }

    // When both feet qualify, correct the one with the larger discrepancy.
    // The clip plays the second half of a two-foot transition, so only a
    // single foot moves.
    let foot = if !left_allowed {
        Foot::Right
    } else if !right_allowed {
        Foot::Left
    } else if left_distance_squared >= right_distance_squared {
        Foot::Left
    } else {
        Foot::Right
    };

    let clip = match (stance, foot) {
        (Stance::Crouching, Foot::Left) => &settings.crouching_dynamic_transition_left,
        (Stance::Crouching, Foot::Right) => &settings.crouching_dynamic_transition_right,
        (Stance::Standing, Foot::Left) => &settings.standing_dynamic_transition_left,
        (Stance::Standing, Foot::Right) => &settings.standing_dynamic_transition_right,
    };

    if let Some(clip) = clip {
        // Give the graph a couple of ticks to react before re-triggering.
        transitions.dynamic_transition_frame_delay = 2;
        transitions.queued_dynamic_transition = Some(clip.clone());
    }
}

/// Turns the queued dynamic transition into a playback request. Exclusive
/// phase only.
pub fn play_queued_dynamic_transition(
    transitions: &mut TransitionsState,
    settings: &TransitionSettings,
) -> Option<PlaySlotAnimation> {
    let clip = transitions.queued_dynamic_transition.take()?;

    Some(PlaySlotAnimation {
        clip,
        slot: SlotName::Transition,
        blend_in_time: settings.dynamic_transition_blend_time,
        blend_out_time: settings.dynamic_transition_blend_time,
        play_rate: settings.dynamic_transition_play_rate,
        start_time: 0.0,
    })
}

/// Builds the quick stop request. In velocity-direction rotation the play
/// rate scales with how far the character is about to rotate, maxing out at
/// a 180° stop.
pub fn play_quick_stop(
    snapshot: &LocomotionState,
    stance: Stance,
    rotation_mode: RotationMode,
    settings: &TransitionSettings,
) -> Option<PlaySlotAnimation> {
    let (min_play_rate, max_play_rate) = settings.quick_stop_play_rate;

    if rotation_mode != RotationMode::VelocityDirection {
        return play_transition(
            settings,
            stance,
            Foot::Left,
            settings.quick_stop_blend_in_time,
            settings.quick_stop_blend_out_time,
            min_play_rate,
            settings.quick_stop_start_time,
        );
    }

    let mut rotation_yaw_angle = normalize_angle(
        if snapshot.has_input {
            snapshot.input_yaw_angle
        } else {
            snapshot.target_yaw_angle
        } - snapshot.rotation.yaw,
    );

    if rotation_yaw_angle > 180.0 - CCW_ROTATION_ANGLE_THRESHOLD {
        rotation_yaw_angle -= 360.0;
    }

    let play_rate = lerp_clamped(
        min_play_rate,
        max_play_rate,
        rotation_yaw_angle.abs() / 180.0,
    );
    let foot = if rotation_yaw_angle <= 0.0 {
        Foot::Left
    } else {
        Foot::Right
    };

    play_transition(
        settings,
        stance,
        foot,
        settings.quick_stop_blend_in_time,
        settings.quick_stop_blend_out_time,
        play_rate,
        settings.quick_stop_start_time,
    )
}

/// Builds a one-shot request for the stance-appropriate left or right
/// transition clip. Returns `None` when no clip is configured for the
/// combination.
pub fn play_transition(
    settings: &TransitionSettings,
    stance: Stance,
    foot: Foot,
    blend_in_time: f32,
    blend_out_time: f32,
    play_rate: f32,
    start_time: f32,
) -> Option<PlaySlotAnimation> {
    let clip = match (stance, foot) {
        (Stance::Crouching, Foot::Left) => &settings.crouching_transition_left,
        (Stance::Crouching, Foot::Right) => &settings.crouching_transition_right,
        (Stance::Standing, Foot::Left) => &settings.standing_transition_left,
        (Stance::Standing, Foot::Right) => &settings.standing_transition_right,
    };

    Some(PlaySlotAnimation {
        clip: clip.clone()?,
        slot: SlotName::Transition,
        blend_in_time,
        blend_out_time,
        play_rate,
        start_time,
    })
}

fn is_rotate_in_place_allowed(rotation_mode: RotationMode, view_mode: ViewMode) -> bool {
    rotation_mode == RotationMode::Aiming || view_mode == ViewMode::FirstPerson
}

#[allow(clippy::too_many_arguments)]
pub fn refresh_rotate_in_place(
    rotate: &mut RotateInPlaceState,
    view: &ViewState,
    snapshot: &LocomotionState,
    locomotion_mode: LocomotionMode,
    rotation_mode: RotationMode,
    view_mode: ViewMode,
    settings: &RotateInPlaceSettings,
    delta_time: f32,
    pending_update: bool,
) {
    let min_play_rate = settings.play_rate.0;

    let settle_play_rate = |rotate: &mut RotateInPlaceState| {
        rotate.play_rate = if pending_update {
            min_play_rate
        } else {
            interp_to(
                rotate.play_rate,
                min_play_rate,
                delta_time,
                ROTATE_PLAY_RATE_INTERPOLATION_SPEED,
            )
        };
    };

    if snapshot.moving
        || locomotion_mode != LocomotionMode::Grounded
        || !is_rotate_in_place_allowed(rotation_mode, view_mode)
    {
        rotate.rotating_left = false;
        rotate.rotating_right = false;
        settle_play_rate(rotate);
        rotate.foot_lock_block_amount = 0.0;
        return;
    }

    rotate.rotating_left = view.yaw_angle < -settings.view_yaw_angle_threshold;
    rotate.rotating_right = view.yaw_angle > settings.view_yaw_angle_threshold;

    if !rotate.rotating_left && !rotate.rotating_right {
        settle_play_rate(rotate);
        rotate.foot_lock_block_amount = 0.0;
        return;
    }

    // Faster camera turns play the rotation animation faster.
    let target_play_rate = map_range_clamped(
        settings.reference_view_yaw_speed,
        settings.play_rate,
        view.yaw_speed,
    );

    rotate.play_rate = if pending_update {
        target_play_rate
    } else {
        interp_to(
            rotate.play_rate,
            target_play_rate,
            delta_time,
            ROTATE_PLAY_RATE_INTERPOLATION_SPEED,
        )
    };

    // Foot locking is blocked while rotating far or fast, otherwise the legs
    // twist into a spiral.
    rotate.foot_lock_block_amount = if settings.disable_foot_lock {
        0.0
    } else if view.yaw_angle.abs() > settings.foot_lock_block_view_yaw_angle_threshold {
        1.0
    } else if view.yaw_speed <= settings.foot_lock_block_view_yaw_speed_threshold {
        0.0
    } else if pending_update {
        1.0
    } else {
        interp_to(
            rotate.foot_lock_block_amount,
            1.0,
            delta_time,
            ROTATE_BLOCK_INTERPOLATION_SPEED,
        )
    };
}

fn is_turn_in_place_allowed(rotation_mode: RotationMode, view_mode: ViewMode) -> bool {
    rotation_mode == RotationMode::LookingDirection && view_mode != ViewMode::FirstPerson
}

#[allow(clippy::too_many_arguments)]
pub fn refresh_turn_in_place(
    turn: &mut TurnInPlaceState,
    view: &ViewState,
    snapshot: &LocomotionState,
    transitions: &TransitionsState,
    locomotion_mode: LocomotionMode,
    stance: Stance,
    rotation_mode: RotationMode,
    view_mode: ViewMode,
    settings: &TurnInPlaceSettings,
    delta_time: f32,
    pending_update: bool,
) {
    if snapshot.moving
        || locomotion_mode != LocomotionMode::Grounded
        || !is_turn_in_place_allowed(rotation_mode, view_mode)
    {
        turn.activation_delay = 0.0;
        turn.foot_lock_disabled = false;
        return;
    }

    if !transitions.transitions_allowed {
        turn.activation_delay = 0.0;
        return;
    }

    // The misalignment must hold steady for a while before the turn starts:
    // a fast-panning camera or a small angle resets the timer.
    if view.yaw_speed >= settings.view_yaw_speed_threshold
        || view.yaw_angle.abs() <= settings.view_yaw_angle_threshold
    {
        turn.activation_delay = 0.0;
        turn.foot_lock_disabled = false;
        return;
    }

    turn.activation_delay = if pending_update {
        0.0
    } else {
        turn.activation_delay + delta_time
    };

    // Bigger misalignment triggers sooner.
    let activation_delay = map_range_clamped(
        (settings.view_yaw_angle_threshold, 180.0),
        settings.view_yaw_angle_to_activation_delay,
        view.yaw_angle.abs(),
    );

    if turn.activation_delay <= activation_delay {
        return;
    }

    let turning_left = view.yaw_angle <= 0.0
        || view.yaw_angle > 180.0 - CCW_ROTATION_ANGLE_THRESHOLD;
    let turn_180 = view.yaw_angle.abs() >= settings.turn_180_angle_threshold;

    let (clip, slot) = match stance {
        Stance::Standing => (
            match (turn_180, turning_left) {
                (false, true) => &settings.standing_turn_90_left,
                (false, false) => &settings.standing_turn_90_right,
                (true, true) => &settings.standing_turn_180_left,
                (true, false) => &settings.standing_turn_180_right,
            },
            SlotName::TurnInPlaceStanding,
        ),
        Stance::Crouching => (
            match (turn_180, turning_left) {
                (false, true) => &settings.crouching_turn_90_left,
                (false, false) => &settings.crouching_turn_90_right,
                (true, true) => &settings.crouching_turn_180_left,
                (true, false) => &settings.crouching_turn_180_right,
            },
            SlotName::TurnInPlaceCrouching,
        ),
    };

    if let Some(clip) = clip {
        turn.queued_clip = Some(clip.clone());
        turn.queued_slot = slot;
        turn.queued_turn_yaw_angle = view.yaw_angle;
    }
}

/// Turns the queued turn-in-place clip into a playback request and derives
/// the graph-facing play rate. Exclusive phase only.
pub fn play_queued_turn_in_place(
    turn: &mut TurnInPlaceState,
    settings: &TurnInPlaceSettings,
) -> Option<PlaySlotAnimation> {
    let clip = turn.queued_clip.take()?;

    // The yaw delta gets scaled in the blend graph, so the play rate must
    // compensate for how far this particular turn actually rotates.
    turn.play_rate = if clip.scale_play_rate_by_animated_turn_angle {
        clip.play_rate * (turn.queued_turn_yaw_angle / clip.animated_turn_angle).abs()
    } else {
        clip.play_rate
    };

    turn.foot_lock_disabled = settings.disable_foot_lock;

    let request = PlaySlotAnimation {
        clip: clip.clip,
        slot: turn.queued_slot,
        blend_in_time: settings.blend_time,
        blend_out_time: settings.blend_time,
        play_rate: clip.play_rate,
        start_time: 0.0,
    };

    turn.queued_slot = SlotName::TurnInPlaceStanding;
    turn.queued_turn_yaw_angle = 0.0;

    Some(request)
}

/// Exclusive-phase ragdoll update: the flail cycle plays faster the faster
/// the physics bodies move.
pub fn refresh_ragdolling_exclusive(
    ragdolling: &mut RagdollingState,
    locomotion_action: LocomotionAction,
    root_bone_speed: f32,
) {
    if locomotion_action != LocomotionAction::Ragdolling {
        return;
    }

    ragdolling.flail_play_rate = clamp01(root_bone_speed / FLAIL_REFERENCE_SPEED);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TurnInPlaceClip;
    use bevy::asset::Handle;
    use bevy::math::Vec3;

    fn stationary_snapshot() -> LocomotionState {
        LocomotionState {
            scale: 1.0,
            ..Default::default()
        }
    }

    fn allowed_curves() -> SampledCurves {
        let mut curves = SampledCurves::default();
        curves.set(curves::ALLOW_TRANSITIONS, 1.0);
        curves
    }

    fn transition_settings_with_clips() -> TransitionSettings {
        TransitionSettings {
            standing_dynamic_transition_left: Some(Handle::default()),
            standing_dynamic_transition_right: Some(Handle::default()),
            ..Default::default()
        }
    }

    fn drifted_feet(left_drift: f32, right_drift: f32) -> FeetState {
        let mut feet = FeetState::default();
        feet.left.lock_amount = 1.0;
        feet.left.target_location = Vec3::new(left_drift, 0.0, 0.0);
        feet.right.lock_amount = 1.0;
        feet.right.target_location = Vec3::new(right_drift, 0.0, 0.0);
        feet
    }

    #[test]
    fn dynamic_transition_picks_the_larger_discrepancy() {
        let settings = transition_settings_with_clips();
        let mut transitions = TransitionsState::default();

        refresh_transitions(
            &mut transitions,
            &drifted_feet(10.0, 20.0),
            &stationary_snapshot(),
            LocomotionMode::Grounded,
            Stance::Standing,
            &allowed_curves(),
            &settings,
            true,
        );

        assert!(transitions.queued_dynamic_transition.is_some());
        assert_eq!(transitions.dynamic_transition_frame_delay, 2);
    }

    #[test]
    fn dynamic_transition_respects_the_frame_delay() {
        let settings = transition_settings_with_clips();
        let mut transitions = TransitionsState {
            dynamic_transition_frame_delay: 2,
            ..Default::default()
        };

        for remaining in [1, 0] {
            refresh_transitions(
                &mut transitions,
                &drifted_feet(20.0, 0.0),
                &stationary_snapshot(),
                LocomotionMode::Grounded,
                Stance::Standing,
                &allowed_curves(),
                &settings,
                true,
            );
            assert!(transitions.queued_dynamic_transition.is_none());
            assert_eq!(transitions.dynamic_transition_frame_delay, remaining);
        }

        refresh_transitions(
            &mut transitions,
            &drifted_feet(20.0, 0.0),
            &stationary_snapshot(),
            LocomotionMode::Grounded,
            Stance::Standing,
            &allowed_curves(),
            &settings,
            true,
        );
        assert!(transitions.queued_dynamic_transition.is_some());
    }

    #[test]
    fn small_drift_does_not_transition() {
        let settings = transition_settings_with_clips();
        let mut transitions = TransitionsState::default();

        refresh_transitions(
            &mut transitions,
            &drifted_feet(2.0, 0.0),
            &stationary_snapshot(),
            LocomotionMode::Grounded,
            Stance::Standing,
            &allowed_curves(),
            &settings,
            true,
        );

        assert!(transitions.queued_dynamic_transition.is_none());
    }

    #[test]
    fn rotate_in_place_requires_the_angle_threshold() {
        let settings = RotateInPlaceSettings::default();
        let snapshot = stationary_snapshot();

        let mut view = ViewState::default();
        view.yaw_angle = 30.0;

        let mut rotate = RotateInPlaceState::default();
        refresh_rotate_in_place(
            &mut rotate,
            &view,
            &snapshot,
            LocomotionMode::Grounded,
            RotationMode::Aiming,
            ViewMode::ThirdPerson,
            &settings,
            1.0 / 60.0,
            false,
        );
        assert!(!rotate.rotating_left && !rotate.rotating_right);

        view.yaw_angle = -60.0;
        refresh_rotate_in_place(
            &mut rotate,
            &view,
            &snapshot,
            LocomotionMode::Grounded,
            RotationMode::Aiming,
            ViewMode::ThirdPerson,
            &settings,
            1.0 / 60.0,
            false,
        );
        assert!(rotate.rotating_left);
        assert!(!rotate.rotating_right);
    }

    #[test]
    fn rotate_play_rate_snaps_on_replay() {
        let settings = RotateInPlaceSettings::default();
        let snapshot = stationary_snapshot();

        let mut view = ViewState::default();
        view.yaw_angle = 60.0;
        view.yaw_speed = settings.reference_view_yaw_speed.1;

        let mut rotate = RotateInPlaceState::default();
        refresh_rotate_in_place(
            &mut rotate,
            &view,
            &snapshot,
            LocomotionMode::Grounded,
            RotationMode::Aiming,
            ViewMode::ThirdPerson,
            &settings,
            1.0 / 60.0,
            true,
        );

        assert_eq!(rotate.play_rate, settings.play_rate.1);
    }

    #[test]
    fn rotate_blocks_foot_lock_past_the_angle_threshold() {
        let settings = RotateInPlaceSettings::default();
        let snapshot = stationary_snapshot();

        let mut view = ViewState::default();
        view.yaw_angle = settings.foot_lock_block_view_yaw_angle_threshold + 10.0;

        let mut rotate = RotateInPlaceState::default();
        refresh_rotate_in_place(
            &mut rotate,
            &view,
            &snapshot,
            LocomotionMode::Grounded,
            RotationMode::Aiming,
            ViewMode::ThirdPerson,
            &settings,
            1.0 / 60.0,
            false,
        );

        assert_eq!(rotate.foot_lock_block_amount, 1.0);
    }

    fn turn_settings() -> TurnInPlaceSettings {
        let clip = |angle: f32| TurnInPlaceClip {
            clip: Handle::default(),
            play_rate: 1.2,
            animated_turn_angle: angle,
            scale_play_rate_by_animated_turn_angle: true,
        };

        TurnInPlaceSettings {
            standing_turn_90_left: Some(clip(-90.0)),
            standing_turn_90_right: Some(clip(90.0)),
            standing_turn_180_left: Some(clip(-180.0)),
            standing_turn_180_right: Some(clip(180.0)),
            ..Default::default()
        }
    }

    fn run_turn(view_yaw_angle: f32, ticks: usize) -> TurnInPlaceState {
        let settings = turn_settings();
        let snapshot = stationary_snapshot();
        let transitions = TransitionsState {
            transitions_allowed: true,
            ..Default::default()
        };

        let mut view = ViewState::default();
        view.yaw_angle = view_yaw_angle;

        let mut turn = TurnInPlaceState::default();
        for _ in 0..ticks {
            refresh_turn_in_place(
                &mut turn,
                &view,
                &snapshot,
                &transitions,
                LocomotionMode::Grounded,
                Stance::Standing,
                RotationMode::LookingDirection,
                ViewMode::ThirdPerson,
                &settings,
                1.0 / 60.0,
                false,
            );
        }
        turn
    }

    #[test]
    fn turn_requires_a_sustained_misalignment() {
        let turn = run_turn(90.0, 5);
        assert!(turn.queued_clip.is_none());

        let turn = run_turn(90.0, 60);
        assert!(turn.queued_clip.is_some());
    }

    #[test]
    fn turn_selects_by_magnitude_and_direction() {
        let turn = run_turn(90.0, 60);
        let clip = turn.queued_clip.unwrap();
        assert_eq!(clip.animated_turn_angle, 90.0);

        let turn = run_turn(-90.0, 60);
        let clip = turn.queued_clip.unwrap();
        assert_eq!(clip.animated_turn_angle, -90.0);

        let turn = run_turn(150.0, 60);
        let clip = turn.queued_clip.unwrap();
        assert_eq!(clip.animated_turn_angle, 180.0);

        // Angles just under the discontinuity count as counter-clockwise.
        let turn = run_turn(178.0, 60);
        let clip = turn.queued_clip.unwrap();
        assert_eq!(clip.animated_turn_angle, -180.0);
    }

    #[test]
    fn queued_turn_play_rate_scales_with_the_actual_angle() {
        let settings = turn_settings();
        let mut turn = run_turn(90.0, 60);
        let request = play_queued_turn_in_place(&mut turn, &settings).unwrap();

        assert_eq!(request.slot, SlotName::TurnInPlaceStanding);
        assert!((turn.play_rate - 1.2).abs() < 1.0e-5);

        let mut turn = run_turn(135.0, 60);
        turn.queued_clip.as_mut().unwrap().animated_turn_angle = 90.0;
        play_queued_turn_in_place(&mut turn, &settings).unwrap();
        assert!((turn.play_rate - 1.2 * 1.5).abs() < 1.0e-5);
    }

    #[test]
    fn flail_play_rate_tracks_normalized_root_speed() {
        let mut ragdolling = RagdollingState::default();

        refresh_ragdolling_exclusive(&mut ragdolling, LocomotionAction::Ragdolling, 500.0);
        assert_eq!(ragdolling.flail_play_rate, 0.5);

        refresh_ragdolling_exclusive(&mut ragdolling, LocomotionAction::Ragdolling, 5000.0);
        assert_eq!(ragdolling.flail_play_rate, 1.0);

        refresh_ragdolling_exclusive(&mut ragdolling, LocomotionAction::None, 0.0);
        assert_eq!(ragdolling.flail_play_rate, 1.0);
    }
}
