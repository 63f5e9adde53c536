//! The tracker playback plugin.

use crate::engine::{EngineError, ModuleEngine, SynthEngine};
use crate::guard::guarded;
use crate::instance::TrackerInstance;
use crate::metadata;
use crate::settings::{OWNER, SCHEMA};
use playdeck_plugin_api::{
    LogLevel, LogSink, PlaybackInstance, PlaybackPlugin, ProbeResult, ServiceApi,
};
use playdeck_runtime::capability::{
    IO_API_VERSION, MESSAGE_API_VERSION, METADATA_API_VERSION, SETTINGS_API_VERSION,
};
use playdeck_runtime::{
    ExtensionList, PluginDescriptor, RuntimeError, RuntimeResult, SettingsSchema,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

/// Playback plugin for tracker modules, generic over the decoding engine.
pub struct TrackerPlugin<E: ModuleEngine = SynthEngine> {
    engine: Arc<E>,
    descriptor: PluginDescriptor,
    extensions: ExtensionList,
    log: OnceLock<Arc<dyn LogSink>>,
}

impl TrackerPlugin<SynthEngine> {
    /// Tracker plugin backed by the built-in synth engine.
    pub fn synth() -> Self {
        Self::new(SynthEngine::new())
    }
}

impl<E: ModuleEngine> TrackerPlugin<E> {
    pub fn new(engine: E) -> Self {
        let descriptor =
            PluginDescriptor::new(OWNER, env!("CARGO_PKG_VERSION"), engine.library_version());
        let extensions = engine.extensions().into_iter().collect();
        Self {
            engine: Arc::new(engine),
            descriptor,
            extensions,
            log: OnceLock::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn log(&self, level: LogLevel, message: &str) {
        match self.log.get() {
            Some(sink) => sink.log(level, message),
            None => match level {
                LogLevel::Error | LogLevel::Fatal => tracing::error!(plugin = OWNER, "{}", message),
                LogLevel::Warn => tracing::warn!(plugin = OWNER, "{}", message),
                LogLevel::Info => tracing::info!(plugin = OWNER, "{}", message),
                _ => tracing::debug!(plugin = OWNER, "{}", message),
            },
        }
    }
}

impl<E: ModuleEngine> PlaybackPlugin for TrackerPlugin<E> {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn supported_extensions(&self) -> &ExtensionList {
        &self.extensions
    }

    fn settings_schema(&self) -> Option<SettingsSchema> {
        Some(SCHEMA)
    }

    fn probe(&self, header: &[u8], filename: &str, total_size: u64) -> ProbeResult {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.engine.probe(header, total_size)))
            .unwrap_or(ProbeResult::Unsupported);

        match result {
            ProbeResult::Supported => self.log(LogLevel::Info, &format!("Supported: {}", filename)),
            ProbeResult::Unsupported => {
                self.log(LogLevel::Debug, &format!("Unsupported: {}", filename))
            }
            ProbeResult::NeedMoreData => self.log(
                LogLevel::Debug,
                &format!("Need more than {} bytes to probe {}", header.len(), filename),
            ),
        }
        result
    }

    fn static_init(&self, log: Arc<dyn LogSink>, services: &dyn ServiceApi) -> RuntimeResult<()> {
        self.log
            .set(log)
            .map_err(|_| RuntimeError::AlreadyInitialized(self.descriptor.name.clone()))?;

        // A schema failure disables configuration only; decoding still works.
        match services.settings(SETTINGS_API_VERSION) {
            Some(settings) => {
                if let Err(e) = settings.register(SCHEMA) {
                    self.log(LogLevel::Error, &format!("Unable to register settings: {}", e));
                }
            }
            None => self.log(LogLevel::Debug, "No settings store, using defaults"),
        }
        Ok(())
    }

    fn create(&self, services: &dyn ServiceApi) -> RuntimeResult<Arc<dyn PlaybackInstance>> {
        let io = services.require_io(IO_API_VERSION)?;
        let messages = services.message(MESSAGE_API_VERSION);

        Ok(Arc::new(TrackerInstance::new(
            Arc::clone(&self.engine),
            io,
            messages,
            self.log.get().cloned(),
        )))
    }

    fn metadata(&self, url: &str, services: &dyn ServiceApi) -> RuntimeResult<()> {
        let io = services.require_io(IO_API_VERSION)?;
        let Some(sink) = services.metadata(METADATA_API_VERSION) else {
            self.log(LogLevel::Debug, "No metadata sink, skipping metadata");
            return Ok(());
        };

        let data = io.read_to_memory(url).inspect_err(|e| {
            self.log(LogLevel::Error, &format!("Failed to load {}: {}", url, e));
        })?;

        // The loaded module is private to this call and dropped on every path.
        let mut module = guarded(url, || self.engine.load(&data)).inspect_err(|e| {
            self.log(LogLevel::Error, &format!("Failed to decode {}: {}", url, e));
        })?;
        guarded(url, || {
            Ok::<_, EngineError>(metadata::publish(sink.as_ref(), url, &mut module))
        })
        .and_then(|published| published)
        .inspect_err(|e| {
            self.log(LogLevel::Error, &format!("Failed to read metadata of {}: {}", url, e));
        })
    }
}
