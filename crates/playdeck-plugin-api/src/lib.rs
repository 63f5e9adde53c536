//! # playdeck-plugin-api
//!
//! The playback plugin contract and the host side of it.
//!
//! This crate provides:
//!
//! - The [`PlaybackPlugin`] and [`PlaybackInstance`] traits plugins implement
//! - Host service traits (I/O, log, metadata, messages, settings) and the
//!   [`ServiceApi`] handle plugins resolve them through
//! - Default host implementations: [`HostServices`], [`SettingsStore`],
//!   [`MetadataStore`]
//! - The [`PluginRegistry`], which binds plugins and drives probing
//!
//! ## Plugin Development
//!
//! A plugin implements [`PlaybackPlugin`], declares a static settings table,
//! registers it from `static_init`, and reads it back through a
//! [`SettingsReader`] whenever a session opens or settings change.

pub mod host;
pub mod lifecycle;
pub mod metadata;
pub mod plugin;
pub mod reader;
pub mod registry;
pub mod store;

pub use host::{
    Capability, ChannelMessages, FsIo, HostServices, IoApi, LogLevel, LogSink, MemoryIo,
    MessageApi, MetadataId, MetadataSink, ServiceApi, SettingsApi, TracingLog,
};
pub use lifecycle::{LifecycleState, Operation};
pub use metadata::{MetadataEntry, MetadataStore, SubsongEntry, TagValue};
pub use plugin::{
    OutputFormat, PlaybackInstance, PlaybackPlugin, ProbeResult, ReadInfo, SeekOutcome,
    SettingsUpdate,
};
pub use reader::SettingsReader;
pub use registry::{try_bind, PluginInfo, PluginRegistry, ProbeDriver, ProbeReport};
pub use store::{ScopedSettings, SettingsStore, WILDCARD};
