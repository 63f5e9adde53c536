//! The playback plugin contract.
//!
//! A plugin is a factory: the host binds it once, runs [`PlaybackPlugin::static_init`]
//! once, then creates any number of [`PlaybackInstance`]s. Each instance owns
//! one decoding session and is driven through open, read, seek and close by
//! the host.
//!
//! Instances may be driven from more than one host thread (a playback thread
//! calling `read`, a UI thread calling `settings_changed`), so every instance
//! method takes `&self` and implementations serialize internally.

use crate::host::{LogSink, ServiceApi, SettingsApi};
use crate::lifecycle::LifecycleState;
use playdeck_runtime::{ExtensionList, PluginDescriptor, RuntimeResult, SettingsSchema};
use serde::Serialize;
use std::sync::Arc;

/// Result of inspecting a resource header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeResult {
    Supported,
    Unsupported,
    /// The prefix was too short to decide; offer a larger one.
    NeedMoreData,
}

/// PCM sample encoding of a read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum OutputFormat {
    U8 = 1,
    S16 = 2,
    S24 = 3,
    S32 = 4,
    F32 = 5,
}

impl OutputFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            OutputFormat::U8 => 1,
            OutputFormat::S16 => 2,
            OutputFormat::S24 => 3,
            OutputFormat::S32 | OutputFormat::F32 => 4,
        }
    }
}

/// Description of the audio written by one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadInfo {
    pub sample_rate: u32,
    /// Frames written, one sample per channel each.
    pub frame_count: u16,
    pub channel_count: u8,
    pub format: OutputFormat,
}

impl ReadInfo {
    /// A read that produced nothing. Signals end of stream.
    pub fn empty(sample_rate: u32, format: OutputFormat) -> Self {
        Self {
            sample_rate,
            frame_count: 0,
            channel_count: 0,
            format,
        }
    }

    pub fn is_end(&self) -> bool {
        self.frame_count == 0
    }

    /// Bytes of the destination buffer that hold audio.
    pub fn byte_len(&self) -> usize {
        self.frame_count as usize * self.channel_count as usize * self.format.bytes_per_sample()
    }
}

/// Result of a seek request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SeekOutcome {
    /// Playback continues from this position.
    Seeked { position_ms: u64 },
    /// The decoder cannot seek. Playback continues where it was.
    Unsupported,
}

/// What the host must do after a settings change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsUpdate {
    /// New values took effect on the open session.
    ApplyNow,
    /// A value can only take effect after the session is reopened.
    RequireRestart,
}

/// A playback plugin: identity, probing, metadata and instance creation.
pub trait PlaybackPlugin: Send + Sync {
    fn descriptor(&self) -> &PluginDescriptor;

    /// Extensions the plugin handles.
    fn supported_extensions(&self) -> &ExtensionList;

    /// Settings table, if the plugin has one.
    fn settings_schema(&self) -> Option<SettingsSchema> {
        None
    }

    /// Classify a resource from a prefix of its data.
    ///
    /// `total_size` is the size of the whole resource. Must not panic on any
    /// input, including an empty prefix.
    fn probe(&self, header: &[u8], filename: &str, total_size: u64) -> ProbeResult;

    /// One-time initialization. Called exactly once before any instance is
    /// created; registers the settings schema and keeps the log sink.
    fn static_init(&self, log: Arc<dyn LogSink>, services: &dyn ServiceApi) -> RuntimeResult<()>;

    /// Create a playback instance bound to the given services.
    fn create(&self, services: &dyn ServiceApi) -> RuntimeResult<Arc<dyn PlaybackInstance>>;

    /// Publish tags, subsongs, samples and instruments for a resource.
    fn metadata(&self, url: &str, services: &dyn ServiceApi) -> RuntimeResult<()>;
}

/// One decoding session.
pub trait PlaybackInstance: Send + Sync {
    /// Load and decode `url`, select `subsong` and apply current settings.
    ///
    /// On failure the instance is left closed.
    fn open(&self, url: &str, subsong: usize, settings: &dyn SettingsApi) -> RuntimeResult<()>;

    /// Render into `dest`. Never writes past `dest.len()`.
    ///
    /// `native_sample_rate` is used when no sample rate is configured. A
    /// zero frame count means end of stream, or no open resource.
    fn read(&self, dest: &mut [u8], native_sample_rate: u32) -> ReadInfo;

    fn seek(&self, ms: u64) -> RuntimeResult<SeekOutcome>;

    /// Re-read settings into the open session.
    fn settings_changed(&self, settings: &dyn SettingsApi) -> SettingsUpdate;

    /// Release the session. Safe to call in any state but destroyed.
    fn close(&self);

    /// Release the instance. Rejected while a resource is open.
    fn destroy(&self) -> RuntimeResult<()>;

    fn state(&self) -> LifecycleState;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_info_byte_len() {
        let info = ReadInfo {
            sample_rate: 48000,
            frame_count: 512,
            channel_count: 2,
            format: OutputFormat::F32,
        };
        assert_eq!(info.byte_len(), 4096);
        assert!(!info.is_end());

        assert!(ReadInfo::empty(48000, OutputFormat::S16).is_end());
    }

    #[test]
    fn test_output_format_discriminants() {
        assert_eq!(OutputFormat::U8 as u8, 1);
        assert_eq!(OutputFormat::F32 as u8, 5);
        assert_eq!(OutputFormat::S24.bytes_per_sample(), 3);
    }

    #[test]
    fn test_seek_outcome_json() {
        let json = serde_json::to_value(SeekOutcome::Seeked { position_ms: 1500 }).unwrap();
        assert_eq!(json["outcome"], "seeked");
        assert_eq!(json["position_ms"], 1500);
    }
}
