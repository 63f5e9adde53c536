//! Decoding engine abstraction.
//!
//! The plugin never parses module formats itself. A [`ModuleEngine`] probes and
//! loads resources; the resulting [`Module`] renders audio and answers
//! metadata queries. Engines report failures as [`EngineError`]; the plugin
//! converts those (and any panic) at its boundary.

pub mod synth;

use crate::settings::RenderSettings;
use playdeck_plugin_api::ProbeResult;
use thiserror::Error;

pub use synth::SynthEngine;

/// Errors raised by a decoding engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("unrecognized format")]
    UnknownFormat,

    #[error("truncated data: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("malformed header: {0}")]
    Malformed(String),

    #[error("subsong {index} out of range ({count} available)")]
    NoSuchSubsong { index: usize, count: usize },
}

/// A decoding engine for one family of module formats.
pub trait ModuleEngine: Send + Sync + 'static {
    type Module: Module + 'static;

    /// Engine name and version, reported as the wrapped library version.
    fn library_version(&self) -> String;

    /// File extensions the engine handles, in any case.
    fn extensions(&self) -> Vec<String>;

    /// Classify a resource prefix. `total_size` is the full resource size.
    fn probe(&self, header: &[u8], total_size: u64) -> ProbeResult;

    /// Decode a whole resource.
    fn load(&self, data: &[u8]) -> Result<Self::Module, EngineError>;
}

/// A decoded module.
///
/// Render calls write interleaved `f32` frames into `out` and return the
/// number of frames written; zero means the subsong ended.
pub trait Module: Send {
    fn subsong_count(&self) -> usize;

    fn subsong_names(&self) -> Vec<String>;

    fn select_subsong(&mut self, index: usize) -> Result<(), EngineError>;

    /// Duration of the selected subsong.
    fn duration_seconds(&self) -> f64;

    fn position_seconds(&self) -> f64;

    /// Move playback to `seconds`, returning the position reached.
    ///
    /// Engines that cannot seek return `None`.
    fn set_position_seconds(&mut self, seconds: f64) -> Option<f64>;

    /// Metadata value for a key such as `title`, `artist` or `tracker`.
    fn metadata(&self, key: &str) -> Option<String>;

    fn sample_names(&self) -> Vec<String>;

    fn instrument_names(&self) -> Vec<String>;

    /// Push render parameters into the engine. Values are absolute.
    fn configure(&mut self, settings: &RenderSettings);

    fn render_mono(&mut self, sample_rate: u32, out: &mut [f32]) -> usize;

    fn render_stereo(&mut self, sample_rate: u32, out: &mut [f32]) -> usize;

    fn render_quad(&mut self, sample_rate: u32, out: &mut [f32]) -> usize;
}
