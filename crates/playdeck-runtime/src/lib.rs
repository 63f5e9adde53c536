//! # playdeck-runtime
//!
//! Contract types shared by Playdeck hosts and playback plugins.
//!
//! This crate provides:
//! - Capability names and API versions for the host services a plugin may request
//! - The settings schema: typed, self-describing configuration descriptors
//! - Plugin descriptors (name, semantic version, supported extensions)
//! - The error taxonomy used across the plugin/host boundary
//!
//! ## Boundary Model
//!
//! A host hands every plugin an explicit service handle. Plugins resolve the
//! capabilities they need by name and version; an absent capability means the
//! feature is unavailable, never a best-effort substitute.

pub mod capability;
pub mod descriptor;
pub mod error;
pub mod settings;

pub use capability::{CapabilityKind, VersionRange};
pub use descriptor::{
    extension_of, file_name_of, ExtensionList, PluginDescriptor, PLAYBACK_PLUGIN_API_VERSION,
};
pub use error::{RuntimeError, RuntimeResult};
pub use settings::{
    IntChoice, SchemaError, SettingDescriptor, SettingKind, SettingValue, SettingsError,
    SettingsResult, SettingsSchema, StringChoice,
};
