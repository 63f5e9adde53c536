//! Plugin registry for managing bound playback plugins.
//!
//! The registry binds plugins after checking their descriptor and API version,
//! runs static initialization once per plugin, and picks a decoder for a
//! resource by probing with progressively larger prefixes.

use crate::host::{LogSink, ServiceApi};
use crate::plugin::{PlaybackPlugin, ProbeResult};
use playdeck_runtime::{extension_of, RuntimeError, RuntimeResult, PLAYBACK_PLUGIN_API_VERSION};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefix size offered on the first probe.
pub const INITIAL_PROBE_BYTES: usize = 2048;

/// Bind a plugin if it targets the host's API version.
///
/// Returns `None` for a plugin built against another version or carrying an
/// invalid descriptor.
pub fn try_bind(
    plugin: Arc<dyn PlaybackPlugin>,
    host_version: u64,
) -> Option<Arc<dyn PlaybackPlugin>> {
    let descriptor = plugin.descriptor();
    if let Err(e) = descriptor
        .validate()
        .and_then(|_| descriptor.check_api_version(host_version))
    {
        warn!("Not binding plugin: {}", e);
        return None;
    }
    Some(plugin)
}

struct LoadedPlugin {
    plugin: Arc<dyn PlaybackPlugin>,
    initialized: bool,
}

/// Registry of playback plugins, in registration order.
pub struct PluginRegistry {
    plugins: HashMap<String, LoadedPlugin>,
    order: Vec<String>,
    probe: ProbeDriver,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
            order: Vec::new(),
            probe: ProbeDriver::default(),
        }
    }

    pub fn with_probe_driver(mut self, probe: ProbeDriver) -> Self {
        self.probe = probe;
        self
    }

    /// Register a plugin. Names must be unique.
    pub fn register(&mut self, plugin: Arc<dyn PlaybackPlugin>) -> RuntimeResult<String> {
        let descriptor = plugin.descriptor();
        descriptor.validate()?;
        descriptor.check_api_version(PLAYBACK_PLUGIN_API_VERSION)?;

        let name = descriptor.name.clone();
        if self.plugins.contains_key(&name) {
            return Err(RuntimeError::DuplicatePlugin(name));
        }

        info!(
            "Registered plugin: {} [{}]",
            descriptor,
            plugin.supported_extensions().as_str()
        );

        self.order.push(name.clone());
        self.plugins.insert(
            name.clone(),
            LoadedPlugin {
                plugin,
                initialized: false,
            },
        );
        Ok(name)
    }

    /// Run a plugin's one-time initialization.
    pub fn static_init(
        &mut self,
        name: &str,
        log: Arc<dyn LogSink>,
        services: &dyn ServiceApi,
    ) -> RuntimeResult<()> {
        let loaded = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| RuntimeError::PluginNotFound(name.to_string()))?;

        if loaded.initialized {
            return Err(RuntimeError::AlreadyInitialized(name.to_string()));
        }

        loaded.plugin.static_init(log, services)?;
        loaded.initialized = true;
        debug!(plugin = name, "Static init complete");
        Ok(())
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.plugins.get(name).is_some_and(|p| p.initialized)
    }

    /// Unload a plugin by name.
    pub fn unload(&mut self, name: &str) -> RuntimeResult<()> {
        if self.plugins.remove(name).is_some() {
            self.order.retain(|n| n != name);
            info!("Unloaded plugin: {}", name);
            Ok(())
        } else {
            Err(RuntimeError::PluginNotFound(name.to_string()))
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn PlaybackPlugin>> {
        self.plugins.get(name).map(|p| &p.plugin)
    }

    /// Plugins in registration order.
    pub fn plugins(&self) -> impl Iterator<Item = &Arc<dyn PlaybackPlugin>> {
        self.order
            .iter()
            .filter_map(|name| self.plugins.get(name))
            .map(|p| &p.plugin)
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Plugins that list the resource's extension.
    pub fn plugins_for(&self, url: &str) -> Vec<Arc<dyn PlaybackPlugin>> {
        let ext = extension_of(url);
        self.plugins()
            .filter(|p| p.supported_extensions().contains(&ext))
            .cloned()
            .collect()
    }

    /// Pick the first initialized plugin that accepts the resource.
    ///
    /// Plugins listing the extension are probed first.
    pub fn find_decoder(&self, data: &[u8], url: &str) -> Option<Arc<dyn PlaybackPlugin>> {
        let ext = extension_of(url);
        let (preferred, others): (Vec<_>, Vec<_>) = self
            .order
            .iter()
            .filter_map(|name| self.plugins.get(name))
            .filter(|p| p.initialized)
            .partition(|p| p.plugin.supported_extensions().contains(&ext));

        preferred
            .into_iter()
            .chain(others)
            .find(|p| {
                self.probe.drive(p.plugin.as_ref(), data, url).result == ProbeResult::Supported
            })
            .map(|p| Arc::clone(&p.plugin))
    }

    /// List plugin information.
    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        self.order
            .iter()
            .filter_map(|name| self.plugins.get(name))
            .map(|p| {
                let descriptor = p.plugin.descriptor();
                PluginInfo {
                    name: descriptor.name.clone(),
                    version: descriptor.version.clone(),
                    library_version: descriptor.library_version.clone(),
                    extensions: p.plugin.supported_extensions().as_str().to_string(),
                    initialized: p.initialized,
                }
            })
            .collect()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a registered plugin.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub library_version: String,
    pub extensions: String,
    pub initialized: bool,
}

/// Host probing policy.
///
/// Offers `initial` bytes (or the whole resource if smaller) and doubles the
/// prefix while the plugin answers [`ProbeResult::NeedMoreData`]. A plugin
/// still asking for more once it has seen everything is treated as not
/// supporting the resource.
#[derive(Debug, Clone, Copy)]
pub struct ProbeDriver {
    pub initial: usize,
}

impl Default for ProbeDriver {
    fn default() -> Self {
        Self {
            initial: INITIAL_PROBE_BYTES,
        }
    }
}

/// Outcome of driving a probe to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub result: ProbeResult,
    /// Prefix length of the final probe call.
    pub bytes_offered: usize,
    pub attempts: usize,
}

impl ProbeDriver {
    pub fn new(initial: usize) -> Self {
        Self {
            initial: initial.max(1),
        }
    }

    pub fn drive(&self, plugin: &dyn PlaybackPlugin, data: &[u8], filename: &str) -> ProbeReport {
        let total = data.len();
        let mut len = self.initial.min(total);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result = plugin.probe(&data[..len], filename, total as u64);

            match result {
                ProbeResult::NeedMoreData if len < total => {
                    len = len.saturating_mul(2).max(1).min(total);
                    debug!(
                        plugin = %plugin.descriptor().name,
                        filename,
                        len,
                        "Probe needs more data"
                    );
                }
                ProbeResult::NeedMoreData => {
                    debug!(
                        plugin = %plugin.descriptor().name,
                        filename,
                        "Probe undecided on whole resource"
                    );
                    return ProbeReport {
                        result: ProbeResult::Unsupported,
                        bytes_offered: len,
                        attempts,
                    };
                }
                result => {
                    return ProbeReport {
                        result,
                        bytes_offered: len,
                        attempts,
                    }
                }
            }
        }
    }
}
