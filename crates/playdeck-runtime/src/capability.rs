//! Capability names and versions for host services.
//!
//! A plugin requests a capability by kind and exact API version. The host either
//! supports that version and returns a handle, or returns nothing; versions are
//! never negotiated down.

use serde::{Deserialize, Serialize};
use std::fmt;

/// API version of the file I/O service.
pub const IO_API_VERSION: u32 = 1;
/// API version of the log service.
pub const LOG_API_VERSION: u32 = 1;
/// API version of the metadata sink.
pub const METADATA_API_VERSION: u32 = 1;
/// API version of the message channel.
pub const MESSAGE_API_VERSION: u32 = 1;
/// API version of the settings store.
pub const SETTINGS_API_VERSION: u32 = 1;

/// A host service a plugin can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// Resource loading (files, archives, network streams).
    Io,

    /// Log output.
    Log,

    /// Metadata sink for tags, subsongs, samples and instruments.
    Metadata,

    /// Message channel back to the host frontend.
    Message,

    /// Settings registration and lookup.
    Settings,
}

impl CapabilityKind {
    /// All capability kinds, in declaration order.
    pub const ALL: [CapabilityKind; 5] = [
        CapabilityKind::Io,
        CapabilityKind::Log,
        CapabilityKind::Metadata,
        CapabilityKind::Message,
        CapabilityKind::Settings,
    ];

    /// Parse a capability from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "io" => Some(CapabilityKind::Io),
            "log" => Some(CapabilityKind::Log),
            "metadata" => Some(CapabilityKind::Metadata),
            "message" => Some(CapabilityKind::Message),
            "settings" => Some(CapabilityKind::Settings),
            _ => None,
        }
    }

    /// Convert capability to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Io => "io",
            CapabilityKind::Log => "log",
            CapabilityKind::Metadata => "metadata",
            CapabilityKind::Message => "message",
            CapabilityKind::Settings => "settings",
        }
    }

    /// The API version this crate was built against.
    pub fn current_version(&self) -> u32 {
        match self {
            CapabilityKind::Io => IO_API_VERSION,
            CapabilityKind::Log => LOG_API_VERSION,
            CapabilityKind::Metadata => METADATA_API_VERSION,
            CapabilityKind::Message => MESSAGE_API_VERSION,
            CapabilityKind::Settings => SETTINGS_API_VERSION,
        }
    }

    /// Whether a plugin cannot operate without this capability.
    ///
    /// Only I/O is mandatory; everything else degrades to "feature unavailable".
    pub fn is_mandatory(&self) -> bool {
        matches!(self, CapabilityKind::Io)
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive range of API versions a host implementation can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: u32,
    pub max: u32,
}

impl VersionRange {
    /// A range containing exactly one version.
    pub const fn exact(version: u32) -> Self {
        Self {
            min: version,
            max: version,
        }
    }

    /// Create a range, swapping the bounds if given in reverse.
    pub fn new(min: u32, max: u32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Check if a requested version can be served.
    pub fn contains(&self, version: u32) -> bool {
        (self.min..=self.max).contains(&version)
    }
}
