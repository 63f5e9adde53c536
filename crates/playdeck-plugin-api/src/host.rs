//! Host services exposed to plugins.
//!
//! Plugins reach every host service through a [`ServiceApi`] handle, resolving
//! each capability by kind and API version. The host decides which services
//! and versions it offers; [`HostServices`] is the default registry.

use parking_lot::RwLock;
use playdeck_runtime::capability::CapabilityKind;
use playdeck_runtime::{RuntimeError, RuntimeResult, SettingsResult, SettingsSchema, VersionRange};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle of an entry created in a metadata sink.
pub type MetadataId = u64;

/// Resource loading.
pub trait IoApi: Send + Sync {
    /// Check if a resource exists.
    fn exists(&self, url: &str) -> bool;

    /// Load a whole resource into memory.
    ///
    /// The returned buffer is owned by the caller and released on drop.
    fn read_to_memory(&self, url: &str) -> RuntimeResult<Vec<u8>>;
}

/// Log output for a plugin.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Metadata sink. All calls are fire-and-forget except entry creation.
pub trait MetadataSink: Send + Sync {
    /// Create (or reset) the entry for a resource.
    fn create_url(&self, url: &str) -> Option<MetadataId>;

    fn set_tag(&self, id: MetadataId, tag: &str, value: &str);

    fn set_tag_f64(&self, id: MetadataId, tag: &str, value: f64);

    fn add_subsong(&self, id: MetadataId, index: usize, name: &str, length: f32);

    fn add_sample(&self, id: MetadataId, text: &str);

    fn add_instrument(&self, id: MetadataId, text: &str);
}

/// Message channel back to the host frontend.
pub trait MessageApi: Send + Sync {
    fn send(&self, payload: &[u8]);
}

/// Settings registration and typed lookup, scoped to one schema owner.
///
/// Lookups are keyed by file extension and setting id. A miss is reported as
/// [`SettingsError::NotFound`](playdeck_runtime::SettingsError::NotFound) and
/// must be read as "keep the current value".
pub trait SettingsApi: Send + Sync {
    fn register(&self, schema: SettingsSchema) -> SettingsResult<()>;

    fn get_string(&self, ext: &str, id: &str) -> SettingsResult<String>;

    fn get_int(&self, ext: &str, id: &str) -> SettingsResult<i32>;

    fn get_float(&self, ext: &str, id: &str) -> SettingsResult<f32>;

    fn get_bool(&self, ext: &str, id: &str) -> SettingsResult<bool>;
}

/// Log level for plugin logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// A resolved capability handle.
#[derive(Clone)]
pub enum Capability {
    Io(Arc<dyn IoApi>),
    Log(Arc<dyn LogSink>),
    Metadata(Arc<dyn MetadataSink>),
    Message(Arc<dyn MessageApi>),
    Settings(Arc<dyn SettingsApi>),
}

impl Capability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::Io(_) => CapabilityKind::Io,
            Capability::Log(_) => CapabilityKind::Log,
            Capability::Metadata(_) => CapabilityKind::Metadata,
            Capability::Message(_) => CapabilityKind::Message,
            Capability::Settings(_) => CapabilityKind::Settings,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self.kind())
    }
}

/// Opaque service handle given to plugins.
///
/// `resolve` is a pure lookup. The typed accessors return `None` when the
/// capability is missing or the requested version is not served.
pub trait ServiceApi: Send + Sync {
    fn resolve(&self, kind: CapabilityKind, version: u32) -> Option<Capability>;

    fn io(&self, version: u32) -> Option<Arc<dyn IoApi>> {
        match self.resolve(CapabilityKind::Io, version) {
            Some(Capability::Io(api)) => Some(api),
            _ => None,
        }
    }

    fn log(&self, version: u32) -> Option<Arc<dyn LogSink>> {
        match self.resolve(CapabilityKind::Log, version) {
            Some(Capability::Log(api)) => Some(api),
            _ => None,
        }
    }

    fn metadata(&self, version: u32) -> Option<Arc<dyn MetadataSink>> {
        match self.resolve(CapabilityKind::Metadata, version) {
            Some(Capability::Metadata(api)) => Some(api),
            _ => None,
        }
    }

    fn message(&self, version: u32) -> Option<Arc<dyn MessageApi>> {
        match self.resolve(CapabilityKind::Message, version) {
            Some(Capability::Message(api)) => Some(api),
            _ => None,
        }
    }

    fn settings(&self, version: u32) -> Option<Arc<dyn SettingsApi>> {
        match self.resolve(CapabilityKind::Settings, version) {
            Some(Capability::Settings(api)) => Some(api),
            _ => None,
        }
    }

    /// Resolve the I/O capability, failing if it is unavailable.
    fn require_io(&self, version: u32) -> RuntimeResult<Arc<dyn IoApi>> {
        self.io(version)
            .ok_or_else(|| RuntimeError::CapabilityUnavailable {
                name: CapabilityKind::Io.to_string(),
                version,
            })
    }
}

/// Default service registry handed to one plugin.
pub struct HostServices {
    /// Plugin the services are scoped to, for logging.
    plugin_name: String,

    entries: HashMap<CapabilityKind, (VersionRange, Capability)>,
}

impl HostServices {
    /// Create an empty registry for a plugin.
    pub fn new(plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            entries: HashMap::new(),
        }
    }

    /// Offer a capability at exactly its current API version.
    pub fn with(self, capability: Capability) -> Self {
        let range = VersionRange::exact(capability.kind().current_version());
        self.with_versions(capability, range)
    }

    /// Offer a capability for a range of API versions.
    pub fn with_versions(mut self, capability: Capability, versions: VersionRange) -> Self {
        self.entries.insert(capability.kind(), (versions, capability));
        self
    }

    pub fn with_io(self, api: Arc<dyn IoApi>) -> Self {
        self.with(Capability::Io(api))
    }

    pub fn with_log(self, api: Arc<dyn LogSink>) -> Self {
        self.with(Capability::Log(api))
    }

    pub fn with_metadata(self, api: Arc<dyn MetadataSink>) -> Self {
        self.with(Capability::Metadata(api))
    }

    pub fn with_message(self, api: Arc<dyn MessageApi>) -> Self {
        self.with(Capability::Message(api))
    }

    pub fn with_settings(self, api: Arc<dyn SettingsApi>) -> Self {
        self.with(Capability::Settings(api))
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Check if a capability kind is offered at any version.
    pub fn offers(&self, kind: CapabilityKind) -> bool {
        self.entries.contains_key(&kind)
    }
}

impl ServiceApi for HostServices {
    fn resolve(&self, kind: CapabilityKind, version: u32) -> Option<Capability> {
        match self.entries.get(&kind) {
            Some((range, capability)) if range.contains(version) => Some(capability.clone()),
            Some((range, _)) => {
                tracing::debug!(
                    plugin = %self.plugin_name,
                    capability = %kind,
                    requested = version,
                    min = range.min,
                    max = range.max,
                    "Capability version not served"
                );
                None
            }
            None => {
                tracing::debug!(
                    plugin = %self.plugin_name,
                    capability = %kind,
                    "Capability not offered"
                );
                None
            }
        }
    }
}

/// Log sink that forwards to `tracing`, tagged with the plugin name.
pub struct TracingLog {
    plugin_id: String,
}

impl TracingLog {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
        }
    }
}

impl LogSink for TracingLog {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(plugin = %self.plugin_id, "{}", message),
            LogLevel::Debug => tracing::debug!(plugin = %self.plugin_id, "{}", message),
            LogLevel::Info => tracing::info!(plugin = %self.plugin_id, "{}", message),
            LogLevel::Warn => tracing::warn!(plugin = %self.plugin_id, "{}", message),
            LogLevel::Error | LogLevel::Fatal => {
                tracing::error!(
                    plugin = %self.plugin_id,
                    fatal = level == LogLevel::Fatal,
                    "{}",
                    message
                )
            }
        }
    }
}

/// File system I/O, optionally confined to a root directory.
#[derive(Debug, Clone, Default)]
pub struct FsIo {
    root: Option<PathBuf>,
}

impl FsIo {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Resolve relative locators against `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: Some(root.as_ref().to_path_buf()),
        }
    }

    fn path_for(&self, url: &str) -> PathBuf {
        let path = Path::new(url);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl IoApi for FsIo {
    fn exists(&self, url: &str) -> bool {
        self.path_for(url).is_file()
    }

    fn read_to_memory(&self, url: &str) -> RuntimeResult<Vec<u8>> {
        std::fs::read(self.path_for(url)).map_err(|e| RuntimeError::ResourceUnreadable {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// In-memory resources keyed by locator.
#[derive(Default)]
pub struct MemoryIo {
    files: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemoryIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.write().insert(url.into(), Arc::from(data.into()));
    }

    pub fn remove(&self, url: &str) -> bool {
        self.files.write().remove(url).is_some()
    }
}

impl IoApi for MemoryIo {
    fn exists(&self, url: &str) -> bool {
        self.files.read().contains_key(url)
    }

    fn read_to_memory(&self, url: &str) -> RuntimeResult<Vec<u8>> {
        self.files
            .read()
            .get(url)
            .map(|data| data.to_vec())
            .ok_or_else(|| RuntimeError::ResourceUnreadable {
                url: url.to_string(),
                reason: "no such resource".to_string(),
            })
    }
}

/// Message channel backed by an unbounded tokio channel.
pub struct ChannelMessages {
    sender: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelMessages {
    /// Create the channel and return the host's receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl MessageApi for ChannelMessages {
    fn send(&self, payload: &[u8]) {
        if self.sender.send(payload.to_vec()).is_err() {
            tracing::trace!("Message receiver dropped, discarding payload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_exact_version() {
        let services = HostServices::new("test").with_io(Arc::new(MemoryIo::new()));

        assert!(services.io(1).is_some());
        // Newer or older versions are not negotiated down
        assert!(services.io(2).is_none());
        assert!(services.io(0).is_none());
    }

    #[test]
    fn test_missing_capability_is_absent() {
        let services = HostServices::new("test").with_io(Arc::new(MemoryIo::new()));

        assert!(services.metadata(1).is_none());
        assert!(services.log(1).is_none());
        assert!(services.require_io(1).is_ok());

        let empty = HostServices::new("test");
        assert!(matches!(
            empty.require_io(1),
            Err(RuntimeError::CapabilityUnavailable { .. })
        ));
    }

    #[test]
    fn test_version_range_offer() {
        let services = HostServices::new("test").with_versions(
            Capability::Io(Arc::new(MemoryIo::new())),
            VersionRange::new(1, 3),
        );

        assert!(services.io(2).is_some());
        assert!(services.io(4).is_none());
        assert!(services.offers(CapabilityKind::Io));
        assert!(!services.offers(CapabilityKind::Message));
    }

    #[test]
    fn test_memory_io() {
        let io = MemoryIo::new();
        io.insert("song.mod", vec![1, 2, 3]);

        assert!(io.exists("song.mod"));
        assert_eq!(io.read_to_memory("song.mod").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            io.read_to_memory("missing.mod"),
            Err(RuntimeError::ResourceUnreadable { .. })
        ));
    }

    #[test]
    fn test_fs_io_with_root() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("tune.mod"), b"data").unwrap();

        let io = FsIo::with_root(dir.path());
        assert!(io.exists("tune.mod"));
        assert_eq!(io.read_to_memory("tune.mod").unwrap(), b"data");
        assert!(io.read_to_memory("other.mod").is_err());
    }

    #[tokio::test]
    async fn test_channel_messages() {
        let (channel, mut receiver) = ChannelMessages::new();
        channel.send(b"position");

        assert_eq!(receiver.recv().await, Some(b"position".to_vec()));

        drop(receiver);
        // Sending after the receiver is gone is silently discarded
        channel.send(b"late");
    }
}
