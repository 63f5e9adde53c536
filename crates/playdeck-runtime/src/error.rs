//! Error types for the Playdeck plugin boundary.

use crate::settings::{SchemaError, SettingsError};
use thiserror::Error;

/// Errors that can cross the plugin/host boundary.
///
/// Probe outcomes and settings lookup misses are deliberately absent: they are
/// classification results, not failures.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A mandatory capability could not be resolved at the requested version.
    #[error("Capability unavailable: {name} v{version}")]
    CapabilityUnavailable { name: String, version: u32 },

    /// The resource could not be read by the I/O capability.
    #[error("Unable to read {url}: {reason}")]
    ResourceUnreadable { url: String, reason: String },

    /// The decoder rejected the resource data.
    #[error("Decoder rejected {url}: {reason}")]
    DecodeRejected { url: String, reason: String },

    /// An entry point was called in a lifecycle state that does not allow it.
    #[error("Invalid lifecycle transition: cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },

    /// `static_init` was called more than once for the same plugin.
    #[error("Plugin already initialized: {0}")]
    AlreadyInitialized(String),

    /// A plugin descriptor failed validation.
    #[error("Invalid plugin descriptor: {0}")]
    InvalidDescriptor(String),

    /// A plugin with the same name is already loaded.
    #[error("Duplicate plugin name: {0}")]
    DuplicatePlugin(String),

    /// No plugin with that name is loaded.
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// The plugin was built against a different playback API version.
    #[error("Plugin {name} targets API v{found}, host supports v{expected}")]
    ApiVersionMismatch {
        name: String,
        found: u64,
        expected: u64,
    },

    /// The metadata sink refused to create an entry for the resource.
    #[error("Metadata sink refused entry for {0}")]
    MetadataRefused(String),

    /// The requested subsong does not exist in the resource.
    #[error("Subsong {index} out of range ({count} available)")]
    SubsongOutOfRange { index: usize, count: usize },

    /// The settings schema is malformed.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A settings store operation failed.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for plugin boundary operations.
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
