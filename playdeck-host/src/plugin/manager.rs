//! Plugin manager for loading playback plugins and serving their host side.

use playdeck_plugin_api::{
    HostServices, IoApi, LogSink, MetadataEntry, MetadataStore, PlaybackPlugin, PluginInfo,
    PluginRegistry, ProbeDriver, ProbeResult, SettingsStore, TracingLog,
};
use playdeck_runtime::{
    RuntimeError, RuntimeResult, SettingKind, SettingValue, SettingsError, SettingsSchema,
};
use plugin_tracker::TrackerPlugin;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Probe verdict of one plugin for one resource.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeEntry {
    pub plugin: String,
    pub result: ProbeResult,
    pub bytes_offered: usize,
    pub attempts: usize,
}

/// Manager for playback plugins.
///
/// Owns the plugin registry together with the host collaborators every plugin
/// is served: the I/O backend, the settings store and the metadata store.
pub struct PluginManager {
    registry: PluginRegistry,
    probe: ProbeDriver,
    io: Arc<dyn IoApi>,
    settings: Arc<SettingsStore>,
    metadata: Arc<MetadataStore>,
}

impl PluginManager {
    /// Create a manager with no plugins loaded.
    pub fn new(io: Arc<dyn IoApi>, probe_bytes: usize) -> Self {
        let probe = ProbeDriver::new(probe_bytes);
        Self {
            registry: PluginRegistry::new().with_probe_driver(probe),
            probe,
            io,
            settings: Arc::new(SettingsStore::new()),
            metadata: Arc::new(MetadataStore::new()),
        }
    }

    /// Register a plugin and run its one-time initialization.
    pub fn load(&mut self, plugin: Arc<dyn PlaybackPlugin>) -> RuntimeResult<String> {
        let name = self.registry.register(plugin)?;
        let log: Arc<dyn LogSink> = Arc::new(TracingLog::new(name.as_str()));
        let services = self.services_for(&name);

        if let Err(e) = self.registry.static_init(&name, log, &services) {
            warn!(plugin = %name, "Static init failed, unloading: {}", e);
            if let Err(unload) = self.registry.unload(&name) {
                warn!(plugin = %name, "Unload after failed init failed: {}", unload);
            }
            return Err(e);
        }

        if self.settings.schema(&name).is_none() {
            debug!(plugin = %name, "Plugin registered no settings");
        }
        Ok(name)
    }

    /// Load the plugins compiled into the host.
    ///
    /// Returns the number of successfully loaded plugins.
    pub fn load_builtin(&mut self) -> usize {
        let builtin: Vec<Arc<dyn PlaybackPlugin>> = vec![Arc::new(TrackerPlugin::synth())];

        let mut loaded = 0;
        for plugin in builtin {
            match self.load(plugin) {
                Ok(_) => loaded += 1,
                Err(e) => warn!("Failed to load built-in plugin: {}", e),
            }
        }

        info!("Loaded {} built-in plugins", loaded);
        loaded
    }

    /// Service handle scoped to one plugin.
    pub fn services_for(&self, name: &str) -> HostServices {
        HostServices::new(name)
            .with_io(Arc::clone(&self.io))
            .with_log(Arc::new(TracingLog::new(name)))
            .with_metadata(self.metadata.clone())
            .with_settings(Arc::new(self.settings.scoped(name)))
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn metadata_store(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    pub fn plugin_count(&self) -> usize {
        self.registry.plugin_count()
    }

    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        self.registry.list_plugins()
    }

    /// Registered settings schemas, ordered by owner.
    pub fn schemas(&self) -> Vec<SettingsSchema> {
        self.settings
            .owners()
            .iter()
            .filter_map(|owner| self.settings.schema(owner))
            .collect()
    }

    /// Ask every initialized plugin about a resource.
    pub fn probe(&self, url: &str) -> RuntimeResult<Vec<ProbeEntry>> {
        let data = self.io.read_to_memory(url)?;

        Ok(self
            .registry
            .plugins()
            .filter(|p| self.registry.is_initialized(&p.descriptor().name))
            .map(|p| {
                let report = self.probe.drive(p.as_ref(), &data, url);
                ProbeEntry {
                    plugin: p.descriptor().name.clone(),
                    result: report.result,
                    bytes_offered: report.bytes_offered,
                    attempts: report.attempts,
                }
            })
            .collect())
    }

    /// First plugin accepting the resource, if any.
    pub fn find_decoder(&self, url: &str) -> RuntimeResult<Option<Arc<dyn PlaybackPlugin>>> {
        let data = self.io.read_to_memory(url)?;
        Ok(self.registry.find_decoder(&data, url))
    }

    /// Extract metadata for a resource into the metadata store.
    ///
    /// Returns `None` when no plugin accepts the resource.
    pub fn read_metadata(&self, url: &str) -> RuntimeResult<Option<MetadataEntry>> {
        let Some(plugin) = self.find_decoder(url)? else {
            return Ok(None);
        };

        let name = plugin.descriptor().name.clone();
        plugin.metadata(url, &self.services_for(&name))?;

        self.metadata
            .get(url)
            .map(Some)
            .ok_or(RuntimeError::MetadataRefused(url.to_string()))
    }

    /// Store a value given as text, typed after the owner's schema.
    ///
    /// Integer enumerations also accept a choice label.
    pub fn set_override(&self, owner: &str, ext: &str, id: &str, raw: &str) -> RuntimeResult<()> {
        let schema = self
            .settings
            .schema(owner)
            .ok_or_else(|| RuntimeError::PluginNotFound(owner.to_string()))?;
        let descriptor = schema.get(id).ok_or(SettingsError::NotFound)?;

        let rejected = || SettingsError::Rejected(format!("invalid value for {}: {}", id, raw));
        let value = match descriptor.kind {
            SettingKind::Bool { .. } => SettingValue::Bool(raw.parse().map_err(|_| rejected())?),
            SettingKind::IntRange { .. } => SettingValue::Int(raw.parse().map_err(|_| rejected())?),
            SettingKind::IntChoices { choices, .. } => match raw.parse() {
                Ok(v) => SettingValue::Int(v),
                Err(_) => choices
                    .iter()
                    .find(|c| c.label.eq_ignore_ascii_case(raw))
                    .map(|c| SettingValue::Int(c.value))
                    .ok_or_else(rejected)?,
            },
            SettingKind::FloatRange { .. } => {
                SettingValue::Float(raw.parse().map_err(|_| rejected())?)
            }
            SettingKind::StringChoices { .. } => SettingValue::String(raw.to_string()),
        };

        self.settings.set(owner, ext, id, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playdeck_plugin_api::MemoryIo;
    use plugin_tracker::engine::synth::{encode, Note, SynthHeader, SynthSubsong};

    fn song() -> Vec<u8> {
        encode(&SynthHeader {
            title: "Probe".into(),
            subsongs: vec![SynthSubsong {
                name: String::new(),
                notes: vec![Note::new(440.0, 250)],
            }],
            ..Default::default()
        })
        .unwrap()
    }

    fn manager() -> (PluginManager, Arc<MemoryIo>) {
        let io = Arc::new(MemoryIo::new());
        let mut manager = PluginManager::new(io.clone(), 2048);
        assert_eq!(manager.load_builtin(), 1);
        (manager, io)
    }

    #[test]
    fn test_new_plugin_manager() {
        let manager = PluginManager::new(Arc::new(MemoryIo::new()), 2048);
        assert_eq!(manager.plugin_count(), 0);
        assert!(manager.schemas().is_empty());
    }

    #[test]
    fn test_load_builtin_registers_schema() {
        let (manager, _) = manager();
        assert_eq!(manager.plugin_count(), 1);
        assert!(manager.registry().is_initialized("tracker"));

        let schemas = manager.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].owner, "tracker");
    }

    #[test]
    fn test_load_twice_is_duplicate() {
        let (mut manager, _) = manager();
        assert!(matches!(
            manager.load(Arc::new(TrackerPlugin::synth())),
            Err(RuntimeError::DuplicatePlugin(_))
        ));
        assert_eq!(manager.plugin_count(), 1);
    }

    #[test]
    fn test_failed_init_unloads_plugin() {
        let mut manager = PluginManager::new(Arc::new(MemoryIo::new()), 2048);

        // A plugin that was already initialized elsewhere refuses a second init
        let plugin = TrackerPlugin::synth();
        plugin
            .static_init(
                Arc::new(TracingLog::new("tracker")),
                &HostServices::new("tracker"),
            )
            .unwrap();

        assert!(matches!(
            manager.load(Arc::new(plugin)),
            Err(RuntimeError::AlreadyInitialized(_))
        ));
        assert_eq!(manager.plugin_count(), 0);
        assert!(!manager.registry().is_initialized("tracker"));

        // The name is free again
        assert_eq!(manager.load(Arc::new(TrackerPlugin::synth())).unwrap(), "tracker");
        assert_eq!(manager.plugin_count(), 1);
    }

    #[test]
    fn test_probe_and_find_decoder() {
        let (manager, io) = manager();
        io.insert("a.pds", song());
        io.insert("b.txt", b"plain text".to_vec());

        let entries = manager.probe("a.pds").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].result, ProbeResult::Supported);

        assert!(manager.find_decoder("a.pds").unwrap().is_some());
        assert!(manager.find_decoder("b.txt").unwrap().is_none());
        assert!(matches!(
            manager.probe("missing.pds"),
            Err(RuntimeError::ResourceUnreadable { .. })
        ));
    }

    #[test]
    fn test_read_metadata() {
        let (manager, io) = manager();
        io.insert("a.pds", song());

        let entry = manager.read_metadata("a.pds").unwrap().unwrap();
        assert_eq!(entry.text("title"), Some("Probe"));
        assert!(entry.subsongs.is_empty());

        io.insert("b.txt", b"plain text".to_vec());
        assert!(manager.read_metadata("b.txt").unwrap().is_none());
    }

    #[test]
    fn test_set_override_parses_by_kind() {
        let (manager, _) = manager();
        let store = manager.settings();

        manager.set_override("tracker", "*", "StereoSeparation", "150").unwrap();
        manager.set_override("tracker", "pds", "AmigaModResampling", "true").unwrap();
        manager.set_override("tracker", "pds", "MasterGain", "-3.5").unwrap();
        manager.set_override("tracker", "pds", "Channels", "mono").unwrap();

        assert_eq!(store.get("tracker", "xm", "StereoSeparation"), Ok(SettingValue::Int(150)));
        assert_eq!(store.get("tracker", "pds", "AmigaModResampling"), Ok(SettingValue::Bool(true)));
        assert_eq!(store.get("tracker", "pds", "MasterGain"), Ok(SettingValue::Float(-3.5)));
        assert_eq!(store.get("tracker", "pds", "Channels"), Ok(SettingValue::Int(1)));
    }

    #[test]
    fn test_set_override_errors() {
        let (manager, _) = manager();

        assert!(matches!(
            manager.set_override("nobody", "*", "MasterGain", "1"),
            Err(RuntimeError::PluginNotFound(_))
        ));
        assert!(matches!(
            manager.set_override("tracker", "*", "Missing", "1"),
            Err(RuntimeError::Settings(SettingsError::NotFound))
        ));
        assert!(matches!(
            manager.set_override("tracker", "*", "StereoSeparation", "wide"),
            Err(RuntimeError::Settings(SettingsError::Rejected(_)))
        ));
    }
}
