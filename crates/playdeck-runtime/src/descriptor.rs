//! Plugin descriptors.
//!
//! Every playback plugin exposes a descriptor naming itself, its semantic
//! version, the version of any wrapped decoding library, and the playback API
//! version it targets. Hosts validate the descriptor before binding the plugin.

use crate::error::{RuntimeError, RuntimeResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Current playback plugin API version.
pub const PLAYBACK_PLUGIN_API_VERSION: u64 = 1;

/// Identity of a playback plugin as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Playback API version the plugin was built against.
    pub api_version: u64,

    /// Unique plugin name. Loading fails if another plugin already uses it.
    pub name: String,

    /// Semantic version of the plugin.
    pub version: String,

    /// Version of the wrapped decoding library, empty if none.
    #[serde(default)]
    pub library_version: String,
}

impl PluginDescriptor {
    /// Create a descriptor targeting the current API version.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        library_version: impl Into<String>,
    ) -> Self {
        Self {
            api_version: PLAYBACK_PLUGIN_API_VERSION,
            name: name.into(),
            version: version.into(),
            library_version: library_version.into(),
        }
    }

    /// Validate the descriptor.
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.name.trim().is_empty() {
            return Err(RuntimeError::InvalidDescriptor(
                "Plugin name cannot be empty".to_string(),
            ));
        }

        semver::Version::parse(&self.version).map_err(|e| {
            RuntimeError::InvalidDescriptor(format!(
                "Plugin {} has invalid version '{}': {}",
                self.name, self.version, e
            ))
        })?;

        Ok(())
    }

    /// Check the descriptor targets the given host API version.
    pub fn check_api_version(&self, host_version: u64) -> RuntimeResult<()> {
        if self.api_version == host_version {
            Ok(())
        } else {
            Err(RuntimeError::ApiVersionMismatch {
                name: self.name.clone(),
                found: self.api_version,
                expected: host_version,
            })
        }
    }
}

impl fmt::Display for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)?;
        if !self.library_version.is_empty() {
            write!(f, " ({})", self.library_version)?;
        }
        Ok(())
    }
}

/// The set of file extensions a plugin handles.
///
/// Built once from the decoder's extension list: lower-cased, without leading
/// dots, de-duplicated in first-seen order. The joined form is a comma
/// separated string with no trailing comma.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionList {
    items: Vec<String>,
    joined: String,
}

impl ExtensionList {
    pub fn as_str(&self) -> &str {
        &self.joined
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check if an extension (any case, optional leading dot) is listed.
    pub fn contains(&self, ext: &str) -> bool {
        let ext = normalize_extension(ext);
        self.items.iter().any(|e| *e == ext)
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExtensionList {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut seen = HashSet::new();
        let items: Vec<String> = iter
            .into_iter()
            .map(|s| normalize_extension(s.as_ref()))
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.clone()))
            .collect();
        let joined = items.join(",");
        Self { items, joined }
    }
}

/// Lower-case an extension and strip any leading dots and whitespace.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Extension of a resource locator, lower-cased, without the dot.
///
/// Returns an empty string when the final path segment has no extension.
pub fn extension_of(url: &str) -> String {
    let file = file_name_of(url);
    match file.rfind('.') {
        Some(pos) if pos + 1 < file.len() => file[pos + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Final path segment of a resource locator.
///
/// Both `/` and `\` separate segments. A locator ending in a separator yields
/// the locator unchanged.
pub fn file_name_of(url: &str) -> &str {
    match url.rfind(|c: char| c == '/' || c == '\\') {
        Some(pos) if pos + 1 < url.len() => &url[pos + 1..],
        _ => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_validation() {
        let descriptor = PluginDescriptor::new("tracker", "0.1.0", "synth 1.0");
        assert!(descriptor.validate().is_ok());
        assert_eq!(descriptor.to_string(), "tracker v0.1.0 (synth 1.0)");

        let bad_version = PluginDescriptor::new("tracker", "0.1", "");
        assert!(matches!(
            bad_version.validate(),
            Err(RuntimeError::InvalidDescriptor(_))
        ));

        let no_name = PluginDescriptor::new("  ", "1.0.0", "");
        assert!(no_name.validate().is_err());
    }

    #[test]
    fn test_api_version_check() {
        let mut descriptor = PluginDescriptor::new("tracker", "1.0.0-beta.1", "");
        assert!(descriptor.check_api_version(PLAYBACK_PLUGIN_API_VERSION).is_ok());

        descriptor.api_version = 99;
        assert!(matches!(
            descriptor.check_api_version(PLAYBACK_PLUGIN_API_VERSION),
            Err(RuntimeError::ApiVersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn test_extension_list() {
        let list: ExtensionList = ["MOD", ".xm", "it", "mod", "", "s3m"].into_iter().collect();
        assert_eq!(list.as_str(), "mod,xm,it,s3m");
        assert_eq!(list.len(), 4);
        assert!(list.contains(".XM"));
        assert!(!list.contains("mp3"));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("/music/Song.MOD"), "mod");
        assert_eq!(extension_of("archive.zip/inner/tune.xm"), "xm");
        assert_eq!(extension_of("C:\\music\\tune.it"), "it");
        assert_eq!(extension_of("/music/README"), "");
        assert_eq!(extension_of("trailing."), "");
    }

    #[test]
    fn test_file_name_of() {
        assert_eq!(file_name_of("/music/chip/tune.mod"), "tune.mod");
        assert_eq!(file_name_of("tune.mod"), "tune.mod");
        assert_eq!(file_name_of("/music/"), "/music/");
    }
}
