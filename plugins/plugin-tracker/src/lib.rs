//! # plugin-tracker
//!
//! Playback plugin for tracker-style module formats.
//!
//! Decoding is delegated to a [`ModuleEngine`]. The plugin owns everything
//! around it: the settings table and how stored values become render
//! parameters, the instance lifecycle, channel layout selection on read,
//! position messages, and metadata publishing.
//!
//! The built-in [`SynthEngine`] plays the small `PDSYNTH1` tone-sequence
//! format, which keeps the plugin usable without a native module library.

pub mod engine;
mod guard;
pub mod instance;
pub mod metadata;
pub mod plugin;
pub mod settings;

pub use engine::{EngineError, Module, ModuleEngine, SynthEngine};
pub use instance::{PositionMessage, TrackerInstance, MAX_FRAMES_PER_READ};
pub use plugin::TrackerPlugin;
pub use settings::{apply, AmigaFilter, ChannelLayout, RenderSettings, SCHEMA};
