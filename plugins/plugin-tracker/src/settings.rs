//! Tracker settings table and how it maps onto render parameters.

use playdeck_plugin_api::SettingsReader;
use playdeck_runtime::{IntChoice, SettingDescriptor, SettingsSchema, StringChoice};
use serde::Serialize;

/// Schema owner name, shared with the plugin name.
pub const OWNER: &str = "tracker";

pub const ID_AMIGA_RESAMPLING: &str = "AmigaModResampling";
pub const ID_AMIGA_FILTER: &str = "AmigaModResamplerFilter";
pub const ID_SAMPLE_RATE: &str = "SampleRate";
pub const ID_CHANNELS: &str = "Channels";
pub const ID_MASTER_GAIN: &str = "MasterGain";
pub const ID_STEREO_SEPARATION: &str = "StereoSeparation";
pub const ID_VOLUME_RAMPING: &str = "VolumeRamping";
pub const ID_INTERPOLATION_FILTER: &str = "InterpolationFilter";
pub const ID_TEMPO_FACTOR: &str = "TempoFactor";
pub const ID_PITCH_FACTOR: &str = "PitchFactor";

static AMIGA_FILTERS: [StringChoice; 4] = [
    StringChoice::new("Default filter", "auto"),
    StringChoice::new("Amiga A500 filter", "a500"),
    StringChoice::new("Amiga A1200 filter", "a1200"),
    StringChoice::new("Unfiltered", "unfiltered"),
];

static SAMPLE_RATES: [IntChoice; 10] = [
    IntChoice::new("Default", 0),
    IntChoice::new("6000", 6000),
    IntChoice::new("8000", 8000),
    IntChoice::new("11025", 11025),
    IntChoice::new("22050", 22050),
    IntChoice::new("32000", 32000),
    IntChoice::new("44100", 44100),
    IntChoice::new("48000", 48000),
    IntChoice::new("88200", 88200),
    IntChoice::new("96000", 96000),
];

static CHANNELS: [IntChoice; 4] = [
    IntChoice::new("Default", 0),
    IntChoice::new("Mono", 1),
    IntChoice::new("Stereo", 2),
    IntChoice::new("Quad", 3),
];

static VOLUME_RAMPING: [IntChoice; 7] = [
    IntChoice::new("Default", -1),
    IntChoice::new("Off", 0),
    IntChoice::new("1 ms", 1),
    IntChoice::new("2 ms", 2),
    IntChoice::new("3 ms", 3),
    IntChoice::new("5 ms", 5),
    IntChoice::new("10 ms", 10),
];

static INTERPOLATION_FILTERS: [IntChoice; 5] = [
    IntChoice::new("Default", 0),
    IntChoice::new("No interpolation (zero order hold)", 1),
    IntChoice::new("Linear interpolation", 2),
    IntChoice::new("Cubic interpolation", 4),
    IntChoice::new("Windowed sinc with 8 taps", 8),
];

static DESCRIPTORS: [SettingDescriptor; 10] = [
    SettingDescriptor::bool(
        ID_AMIGA_RESAMPLING,
        "Use Amiga resampler for Amiga modules",
        concat!(
            "Emulates the Paula chip for Amiga module formats and overrides the ",
            "interpolation filter. Other formats are not affected."
        ),
        false,
    ),
    SettingDescriptor::string_choice(
        ID_AMIGA_FILTER,
        "Amiga resampler filter",
        "Filter type used when the Amiga resampler is enabled",
        "auto",
        &AMIGA_FILTERS,
    ),
    SettingDescriptor::int_choice(
        ID_SAMPLE_RATE,
        "Sample rate",
        "Default (recommended) uses the sample rate of the output device",
        0,
        &SAMPLE_RATES,
    ),
    SettingDescriptor::int_choice(
        ID_CHANNELS,
        "Channels",
        "Default (recommended) renders stereo",
        0,
        &CHANNELS,
    ),
    SettingDescriptor::float_range(
        ID_MASTER_GAIN,
        "Master gain",
        "Relative gain in decibels",
        0.0,
        -12.0,
        12.0,
    ),
    SettingDescriptor::int_range(
        ID_STEREO_SEPARATION,
        "Stereo separation",
        "Stereo separation of the mixer in percent",
        100,
        0,
        200,
    ),
    SettingDescriptor::int_choice(
        ID_VOLUME_RAMPING,
        "Volume ramping strength",
        "Off disables volume ramping and may cause clicks. Higher values give softer ramps.",
        -1,
        &VOLUME_RAMPING,
    ),
    SettingDescriptor::int_choice(
        ID_INTERPOLATION_FILTER,
        "Interpolation filter",
        "Interpolation filter length used by the mixer",
        0,
        &INTERPOLATION_FILTERS,
    ),
    SettingDescriptor::float_range(
        ID_TEMPO_FACTOR,
        "Tempo factor",
        "Playback tempo multiplier",
        1.0,
        0.01,
        2.0,
    ),
    SettingDescriptor::float_range(
        ID_PITCH_FACTOR,
        "Pitch factor",
        "Playback pitch multiplier",
        1.0,
        0.01,
        2.0,
    ),
];

/// The tracker plugin's settings table.
pub static SCHEMA: SettingsSchema = SettingsSchema::new(OWNER, &DESCRIPTORS);

/// Output channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
    #[default]
    Default,
    Mono,
    Stereo,
    Quad,
}

impl ChannelLayout {
    fn from_setting(value: i32) -> Option<Self> {
        match value {
            0 => Some(ChannelLayout::Default),
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            3 => Some(ChannelLayout::Quad),
            _ => None,
        }
    }

    /// Channels actually rendered. Default renders stereo.
    pub fn channel_count(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Default | ChannelLayout::Stereo => 2,
            ChannelLayout::Quad => 4,
        }
    }
}

/// Amiga resampler filter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmigaFilter {
    #[default]
    Auto,
    A500,
    A1200,
    Unfiltered,
}

impl AmigaFilter {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(AmigaFilter::Auto),
            "a500" => Some(AmigaFilter::A500),
            "a1200" => Some(AmigaFilter::A1200),
            "unfiltered" => Some(AmigaFilter::Unfiltered),
            _ => None,
        }
    }
}

/// Render parameters of one session.
///
/// Defaults equal the schema defaults. `sample_rate == 0` means the host
/// native rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSettings {
    pub amiga_resampling: bool,
    pub amiga_filter: AmigaFilter,
    pub sample_rate: u32,
    pub channels: ChannelLayout,
    pub master_gain_db: f32,
    pub stereo_separation: i32,
    /// Ramping strength in ms, -1 for the engine default.
    pub volume_ramping: i32,
    /// Filter taps, 0 for the engine default.
    pub interpolation_filter: i32,
    pub tempo_factor: f32,
    pub pitch_factor: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            amiga_resampling: false,
            amiga_filter: AmigaFilter::Auto,
            sample_rate: 0,
            channels: ChannelLayout::Default,
            master_gain_db: 0.0,
            stereo_separation: 100,
            volume_ramping: -1,
            interpolation_filter: 0,
            tempo_factor: 1.0,
            pitch_factor: 1.0,
        }
    }
}

/// Fallback when neither a configured nor a host rate is known.
pub const FALLBACK_SAMPLE_RATE: u32 = 48_000;

impl RenderSettings {
    /// Sample rate to render at.
    pub fn effective_sample_rate(&self, native_sample_rate: u32) -> u32 {
        match (self.sample_rate, native_sample_rate) {
            (0, 0) => FALLBACK_SAMPLE_RATE,
            (0, native) => native,
            (configured, _) => configured,
        }
    }

    /// Check if moving from `current` to `self` needs the session reopened.
    pub fn requires_restart(&self, current: &RenderSettings) -> bool {
        self.sample_rate != current.sample_rate || self.amiga_resampling != current.amiga_resampling
    }

    /// Copy the restart-only parameters from `current`.
    pub fn keep_restart_only(&mut self, current: &RenderSettings) {
        self.sample_rate = current.sample_rate;
        self.amiga_resampling = current.amiga_resampling;
    }
}

/// Apply stored settings to `settings`.
///
/// Every value is absolute, so applying the same store twice gives the same
/// result as applying it once. Settings without a usable stored value keep
/// their current value.
pub fn apply(settings: &mut RenderSettings, reader: &SettingsReader<'_>) {
    if let Some(v) = reader.bool(ID_AMIGA_RESAMPLING) {
        settings.amiga_resampling = v;
    }
    if let Some(v) = reader.string(ID_AMIGA_FILTER).as_deref().and_then(AmigaFilter::parse) {
        settings.amiga_filter = v;
    }
    if let Some(v) = reader.int(ID_SAMPLE_RATE) {
        settings.sample_rate = u32::try_from(v).unwrap_or(0);
    }
    if let Some(v) = reader.int(ID_CHANNELS).and_then(ChannelLayout::from_setting) {
        settings.channels = v;
    }
    if let Some(v) = reader.float(ID_MASTER_GAIN) {
        settings.master_gain_db = v;
    }
    if let Some(v) = reader.int(ID_STEREO_SEPARATION) {
        settings.stereo_separation = v;
    }
    if let Some(v) = reader.int(ID_VOLUME_RAMPING) {
        settings.volume_ramping = v;
    }
    if let Some(v) = reader.int(ID_INTERPOLATION_FILTER) {
        settings.interpolation_filter = v;
    }
    if let Some(v) = reader.float(ID_TEMPO_FACTOR) {
        settings.tempo_factor = v;
    }
    if let Some(v) = reader.float(ID_PITCH_FACTOR) {
        settings.pitch_factor = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playdeck_plugin_api::{SettingsStore, WILDCARD};
    use playdeck_runtime::SettingValue;
    use std::sync::Arc;

    fn store() -> Arc<SettingsStore> {
        let store = Arc::new(SettingsStore::new());
        store.register(SCHEMA).unwrap();
        store
    }

    fn applied(store: &Arc<SettingsStore>, ext: &str, start: RenderSettings) -> RenderSettings {
        let scoped = store.scoped(OWNER);
        let reader = SettingsReader::new(&SCHEMA, &scoped, ext);
        let mut settings = start;
        apply(&mut settings, &reader);
        settings
    }

    #[test]
    fn test_schema_is_valid() {
        assert!(SCHEMA.validate().is_ok());
        assert_eq!(SCHEMA.len(), 10);
    }

    #[test]
    fn test_defaults_match_schema() {
        let defaults = RenderSettings::default();
        let from_schema = applied(&store(), "mod", RenderSettings::default());
        assert_eq!(defaults, from_schema);

        for descriptor in SCHEMA.iter() {
            assert!(descriptor.validate().is_ok(), "{}", descriptor.id);
        }
        assert_eq!(
            SCHEMA.get(ID_STEREO_SEPARATION).map(|d| d.default_value()),
            Some(SettingValue::Int(defaults.stereo_separation))
        );
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let store = store();
        store
            .set(OWNER, WILDCARD, ID_STEREO_SEPARATION, SettingValue::Int(1000))
            .unwrap();
        store
            .set(OWNER, WILDCARD, ID_MASTER_GAIN, SettingValue::Float(-40.0))
            .unwrap();
        store
            .set(OWNER, WILDCARD, ID_TEMPO_FACTOR, SettingValue::Float(0.0))
            .unwrap();

        let settings = applied(&store, "mod", RenderSettings::default());
        assert_eq!(settings.stereo_separation, 200);
        assert_eq!(settings.master_gain_db, -12.0);
        assert_eq!(settings.tempo_factor, 0.01);
    }

    #[test]
    fn test_unlisted_choice_keeps_previous_value() {
        let store = store();
        store
            .set(OWNER, WILDCARD, ID_SAMPLE_RATE, SettingValue::Int(12345))
            .unwrap();
        store
            .set(OWNER, WILDCARD, ID_AMIGA_FILTER, SettingValue::String("a2000".into()))
            .unwrap();

        let start = RenderSettings {
            sample_rate: 44100,
            amiga_filter: AmigaFilter::A500,
            ..Default::default()
        };
        let settings = applied(&store, "mod", start.clone());
        assert_eq!(settings, start);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let store = store();
        store
            .set(OWNER, WILDCARD, ID_MASTER_GAIN, SettingValue::Float(3.5))
            .unwrap();
        store
            .set(OWNER, "xm", ID_CHANNELS, SettingValue::Int(3))
            .unwrap();

        let once = applied(&store, "xm", RenderSettings::default());
        let twice = applied(&store, "xm", once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.channels, ChannelLayout::Quad);
        assert_eq!(once.master_gain_db, 3.5);
    }

    #[test]
    fn test_not_found_retains_value() {
        let start = RenderSettings {
            stereo_separation: 42,
            channels: ChannelLayout::Mono,
            ..Default::default()
        };
        let settings = applied(&store(), "mod", start.clone());
        assert_eq!(settings, start);
    }

    #[test]
    fn test_effective_sample_rate() {
        let mut settings = RenderSettings::default();
        assert_eq!(settings.effective_sample_rate(44100), 44100);
        assert_eq!(settings.effective_sample_rate(0), FALLBACK_SAMPLE_RATE);

        settings.sample_rate = 22050;
        assert_eq!(settings.effective_sample_rate(44100), 22050);
    }

    #[test]
    fn test_restart_policy() {
        let current = RenderSettings::default();

        let gain_only = RenderSettings {
            master_gain_db: 6.0,
            ..Default::default()
        };
        assert!(!gain_only.requires_restart(&current));

        let mut rate = RenderSettings {
            sample_rate: 48000,
            master_gain_db: 6.0,
            ..Default::default()
        };
        assert!(rate.requires_restart(&current));

        rate.keep_restart_only(&current);
        assert_eq!(rate.sample_rate, 0);
        assert_eq!(rate.master_gain_db, 6.0);
    }
}
