use bevy::asset::{AssetLoader, AssetPath, LoadContext, io::Reader};
use bevy::reflect::TypePath;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    FeetSettings, GeneralSettings, GroundedSettings, InAirSettings, LocomotionSettings,
    RotateInPlaceSettings, TransitionSettings, TurnInPlaceClip, TurnInPlaceSettings, ViewSettings,
};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SettingsLoaderError {
    #[error("Could not load asset: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse RON: {0}")]
    RonSpanned(#[from] ron::error::SpannedError),
}

/// Serialized form of a [`TurnInPlaceClip`]: the clip is referenced by asset
/// path and resolved to a handle at load time.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TurnInPlaceClipSerial {
    pub clip: AssetPath<'static>,
    #[serde(default = "default_play_rate")]
    pub play_rate: f32,
    pub animated_turn_angle: f32,
    #[serde(default)]
    pub scale_play_rate_by_animated_turn_angle: bool,
}

fn default_play_rate() -> f32 {
    1.0
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TransitionClipsSerial {
    #[serde(default)]
    pub standing_transition_left: Option<AssetPath<'static>>,
    #[serde(default)]
    pub standing_transition_right: Option<AssetPath<'static>>,
    #[serde(default)]
    pub crouching_transition_left: Option<AssetPath<'static>>,
    #[serde(default)]
    pub crouching_transition_right: Option<AssetPath<'static>>,
    #[serde(default)]
    pub standing_dynamic_transition_left: Option<AssetPath<'static>>,
    #[serde(default)]
    pub standing_dynamic_transition_right: Option<AssetPath<'static>>,
    #[serde(default)]
    pub crouching_dynamic_transition_left: Option<AssetPath<'static>>,
    #[serde(default)]
    pub crouching_dynamic_transition_right: Option<AssetPath<'static>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TurnInPlaceClipsSerial {
    #[serde(default)]
    pub standing_turn_90_left: Option<TurnInPlaceClipSerial>,
    #[serde(default)]
    pub standing_turn_90_right: Option<TurnInPlaceClipSerial>,
    #[serde(default)]
    pub standing_turn_180_left: Option<TurnInPlaceClipSerial>,
    #[serde(default)]
    pub standing_turn_180_right: Option<TurnInPlaceClipSerial>,
    #[serde(default)]
    pub crouching_turn_90_left: Option<TurnInPlaceClipSerial>,
    #[serde(default)]
    pub crouching_turn_90_right: Option<TurnInPlaceClipSerial>,
    #[serde(default)]
    pub crouching_turn_180_left: Option<TurnInPlaceClipSerial>,
    #[serde(default)]
    pub crouching_turn_180_right: Option<TurnInPlaceClipSerial>,
}

/// On-disk (`*.locomotion.ron`) form of [`LocomotionSettings`]. Every section
/// is optional and falls back to the built-in defaults.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LocomotionSettingsSerial {
    #[serde(default)]
    pub general: SerialSection<GeneralSettings>,
    #[serde(default)]
    pub view: SerialSection<ViewSettings>,
    #[serde(default)]
    pub grounded: SerialSection<GroundedSettings>,
    #[serde(default)]
    pub in_air: SerialSection<InAirSettings>,
    #[serde(default)]
    pub feet: SerialSection<FeetSettings>,
    #[serde(default)]
    pub transitions: SerialSection<TransitionNumericSettings>,
    #[serde(default)]
    pub transition_clips: TransitionClipsSerial,
    #[serde(default)]
    pub rotate_in_place: SerialSection<RotateInPlaceSettings>,
    #[serde(default)]
    pub turn_in_place: SerialSection<TurnInPlaceNumericSettings>,
    #[serde(default)]
    pub turn_in_place_clips: TurnInPlaceClipsSerial,
}

/// A settings section that may be omitted from the RON file entirely.
pub type SerialSection<T> = Option<T>;

/// The clip-free part of [`TransitionSettings`], so the numeric tunables can
/// be deserialized directly while clips go through path resolution.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TransitionNumericSettings {
    pub quick_stop_blend_in_time: f32,
    pub quick_stop_blend_out_time: f32,
    pub quick_stop_play_rate: (f32, f32),
    pub quick_stop_start_time: f32,
    pub dynamic_transition_foot_lock_distance_threshold: f32,
    pub dynamic_transition_blend_time: f32,
    pub dynamic_transition_play_rate: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TurnInPlaceNumericSettings {
    pub view_yaw_angle_threshold: f32,
    pub view_yaw_speed_threshold: f32,
    pub view_yaw_angle_to_activation_delay: (f32, f32),
    pub turn_180_angle_threshold: f32,
    pub blend_time: f32,
    pub disable_foot_lock: bool,
}

#[derive(Default, TypePath)]
pub struct LocomotionSettingsLoader;

impl AssetLoader for LocomotionSettingsLoader {
    type Asset = LocomotionSettings;
    type Settings = ();
    type Error = SettingsLoaderError;

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = vec![];
        reader.read_to_end(&mut bytes).await?;
        let serial: LocomotionSettingsSerial = ron::de::from_bytes(&bytes)?;

        Ok(build_settings(serial, load_context))
    }

    fn extensions(&self) -> &[&str] {
        &["locomotion.ron"]
    }
}

fn build_settings(
    serial: LocomotionSettingsSerial,
    load_context: &mut LoadContext<'_>,
) -> LocomotionSettings {
    let mut load_clip = |path: Option<AssetPath<'static>>| path.map(|path| load_context.load(path));

    let numeric = serial.transitions.unwrap_or(TransitionNumericSettings {
        quick_stop_blend_in_time: TransitionSettings::default().quick_stop_blend_in_time,
        quick_stop_blend_out_time: TransitionSettings::default().quick_stop_blend_out_time,
        quick_stop_play_rate: TransitionSettings::default().quick_stop_play_rate,
        quick_stop_start_time: TransitionSettings::default().quick_stop_start_time,
        dynamic_transition_foot_lock_distance_threshold: TransitionSettings::default()
            .dynamic_transition_foot_lock_distance_threshold,
        dynamic_transition_blend_time: TransitionSettings::default().dynamic_transition_blend_time,
        dynamic_transition_play_rate: TransitionSettings::default().dynamic_transition_play_rate,
    });

    let clips = serial.transition_clips;
    let transitions = TransitionSettings {
        quick_stop_blend_in_time: numeric.quick_stop_blend_in_time,
        quick_stop_blend_out_time: numeric.quick_stop_blend_out_time,
        quick_stop_play_rate: numeric.quick_stop_play_rate,
        quick_stop_start_time: numeric.quick_stop_start_time,
        dynamic_transition_foot_lock_distance_threshold: numeric
            .dynamic_transition_foot_lock_distance_threshold,
        dynamic_transition_blend_time: numeric.dynamic_transition_blend_time,
        dynamic_transition_play_rate: numeric.dynamic_transition_play_rate,
        standing_transition_left: load_clip(clips.standing_transition_left),
        standing_transition_right: load_clip(clips.standing_transition_right),
        crouching_transition_left: load_clip(clips.crouching_transition_left),
        crouching_transition_right: load_clip(clips.crouching_transition_right),
        standing_dynamic_transition_left: load_clip(clips.standing_dynamic_transition_left),
        standing_dynamic_transition_right: load_clip(clips.standing_dynamic_transition_right),
        crouching_dynamic_transition_left: load_clip(clips.crouching_dynamic_transition_left),
        crouching_dynamic_transition_right: load_clip(clips.crouching_dynamic_transition_right),
    };

    let mut load_turn = |serial: Option<TurnInPlaceClipSerial>| {
        serial.map(|serial| TurnInPlaceClip {
            clip: load_context.load(serial.clip),
            play_rate: serial.play_rate,
            animated_turn_angle: serial.animated_turn_angle,
            scale_play_rate_by_animated_turn_angle: serial.scale_play_rate_by_animated_turn_angle,
        })
    };

    let turn_defaults = TurnInPlaceSettings::default();
    let turn_numeric = serial.turn_in_place.unwrap_or(TurnInPlaceNumericSettings {
        view_yaw_angle_threshold: turn_defaults.view_yaw_angle_threshold,
        view_yaw_speed_threshold: turn_defaults.view_yaw_speed_threshold,
        view_yaw_angle_to_activation_delay: turn_defaults.view_yaw_angle_to_activation_delay,
        turn_180_angle_threshold: turn_defaults.turn_180_angle_threshold,
        blend_time: turn_defaults.blend_time,
        disable_foot_lock: turn_defaults.disable_foot_lock,
    });

    let turn_clips = serial.turn_in_place_clips;
    let turn_in_place = TurnInPlaceSettings {
        view_yaw_angle_threshold: turn_numeric.view_yaw_angle_threshold,
        view_yaw_speed_threshold: turn_numeric.view_yaw_speed_threshold,
        view_yaw_angle_to_activation_delay: turn_numeric.view_yaw_angle_to_activation_delay,
        turn_180_angle_threshold: turn_numeric.turn_180_angle_threshold,
        blend_time: turn_numeric.blend_time,
        disable_foot_lock: turn_numeric.disable_foot_lock,
        standing_turn_90_left: load_turn(turn_clips.standing_turn_90_left),
        standing_turn_90_right: load_turn(turn_clips.standing_turn_90_right),
        standing_turn_180_left: load_turn(turn_clips.standing_turn_180_left),
        standing_turn_180_right: load_turn(turn_clips.standing_turn_180_right),
        crouching_turn_90_left: load_turn(turn_clips.crouching_turn_90_left),
        crouching_turn_90_right: load_turn(turn_clips.crouching_turn_90_right),
        crouching_turn_180_left: load_turn(turn_clips.crouching_turn_180_left),
        crouching_turn_180_right: load_turn(turn_clips.crouching_turn_180_right),
    };

    LocomotionSettings {
        general: serial.general.unwrap_or_default(),
        view: serial.view.unwrap_or_default(),
        grounded: serial.grounded.unwrap_or_default(),
        in_air: serial.in_air.unwrap_or_default(),
        feet: serial.feet.unwrap_or_default(),
        transitions,
        rotate_in_place: serial.rotate_in_place.unwrap_or_default(),
        turn_in_place,
    }
}
