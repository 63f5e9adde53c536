//! Tracker playback instance.

use crate::engine::{EngineError, Module, ModuleEngine};
use crate::guard::guarded;
use crate::settings::{self, ChannelLayout, RenderSettings, SCHEMA};
use parking_lot::Mutex;
use playdeck_plugin_api::{
    IoApi, LifecycleState, LogLevel, LogSink, MessageApi, Operation, OutputFormat, PlaybackInstance,
    ReadInfo, SeekOutcome, SettingsApi, SettingsReader, SettingsUpdate,
};
use playdeck_runtime::{extension_of, RuntimeResult};
use serde::Serialize;
use std::sync::Arc;

/// Upper bound on frames produced by one read.
pub const MAX_FRAMES_PER_READ: usize = 512;

const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

/// Position update published after each read that produced audio.
#[derive(Debug, Clone, Serialize)]
pub struct PositionMessage {
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub subsong: usize,
}

struct Session<M> {
    module: M,
    url: String,
    ext: String,
    subsong: usize,
    settings: RenderSettings,
    scratch: Vec<f32>,
}

struct Inner<M> {
    state: LifecycleState,
    session: Option<Session<M>>,
}

/// One decoding session over a tracker module.
///
/// All state sits behind one mutex, so a settings change arriving from a UI
/// thread is applied between two reads, never during one.
pub struct TrackerInstance<E: ModuleEngine> {
    engine: Arc<E>,
    io: Arc<dyn IoApi>,
    messages: Option<Arc<dyn MessageApi>>,
    log: Option<Arc<dyn LogSink>>,
    inner: Mutex<Inner<E::Module>>,
}

impl<E: ModuleEngine> TrackerInstance<E> {
    pub fn new(
        engine: Arc<E>,
        io: Arc<dyn IoApi>,
        messages: Option<Arc<dyn MessageApi>>,
        log: Option<Arc<dyn LogSink>>,
    ) -> Self {
        Self {
            engine,
            io,
            messages,
            log,
            inner: Mutex::new(Inner {
                state: LifecycleState::Created,
                session: None,
            }),
        }
    }

    /// Render parameters of the open session.
    pub fn render_settings(&self) -> Option<RenderSettings> {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.settings.clone())
    }

    fn log(&self, level: LogLevel, message: &str) {
        match &self.log {
            Some(sink) => sink.log(level, message),
            None => match level {
                LogLevel::Error | LogLevel::Fatal => tracing::error!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                _ => tracing::debug!("{}", message),
            },
        }
    }

    fn load_session(
        &self,
        url: &str,
        subsong: usize,
        settings: &dyn SettingsApi,
    ) -> RuntimeResult<Session<E::Module>> {
        let data = self.io.read_to_memory(url)?;

        let engine = Arc::clone(&self.engine);
        let mut module = guarded(url, move || {
            let mut module = engine.load(&data)?;
            module.select_subsong(subsong)?;
            Ok(module)
        })?;

        let ext = extension_of(url);
        let mut render = RenderSettings::default();
        settings::apply(&mut render, &SettingsReader::new(&SCHEMA, settings, &ext));
        module.configure(&render);

        Ok(Session {
            module,
            url: url.to_string(),
            ext,
            subsong,
            settings: render,
            scratch: Vec::new(),
        })
    }

    fn publish_position(&self, session: &Session<E::Module>) {
        let Some(messages) = &self.messages else {
            return;
        };

        let message = PositionMessage {
            position_seconds: session.module.position_seconds(),
            duration_seconds: session.module.duration_seconds(),
            subsong: session.subsong,
        };
        match serde_json::to_vec(&message) {
            Ok(payload) => messages.send(&payload),
            Err(e) => tracing::debug!(error = %e, "Failed to encode position message"),
        }
    }
}

impl<E: ModuleEngine> PlaybackInstance for TrackerInstance<E> {
    fn open(&self, url: &str, subsong: usize, settings: &dyn SettingsApi) -> RuntimeResult<()> {
        let mut inner = self.inner.lock();
        let next = inner.state.transition(Operation::Open)?;

        match self.load_session(url, subsong, settings) {
            Ok(session) => {
                self.log(
                    LogLevel::Info,
                    &format!("Started to play {} (subsong {})", url, subsong),
                );
                inner.session = Some(session);
                inner.state = next;
                Ok(())
            }
            Err(e) => {
                self.log(LogLevel::Error, &format!("Failed to open {}: {}", url, e));
                inner.session = None;
                inner.state = LifecycleState::Closed;
                Err(e)
            }
        }
    }

    fn read(&self, dest: &mut [u8], native_sample_rate: u32) -> ReadInfo {
        let mut inner = self.inner.lock();
        let open = inner.state.is_open();
        let Some(session) = inner.session.as_mut().filter(|_| open) else {
            return ReadInfo::empty(native_sample_rate, OutputFormat::F32);
        };

        let sample_rate = session.settings.effective_sample_rate(native_sample_rate);
        let layout = session.settings.channels;
        let channels = layout.channel_count();
        let frames = (dest.len() / (channels * SAMPLE_BYTES)).min(MAX_FRAMES_PER_READ);
        if frames == 0 {
            return ReadInfo::empty(sample_rate, OutputFormat::F32);
        }

        session.scratch.clear();
        session.scratch.resize(frames * channels, 0.0);

        let Session {
            module, scratch, url, ..
        } = &mut *session;
        let rendered = guarded(url, || {
            Ok::<_, EngineError>(match layout {
                ChannelLayout::Mono => module.render_mono(sample_rate, scratch),
                ChannelLayout::Default | ChannelLayout::Stereo => {
                    module.render_stereo(sample_rate, scratch)
                }
                ChannelLayout::Quad => module.render_quad(sample_rate, scratch),
            })
        });

        let produced = match rendered {
            Ok(n) => n.min(frames),
            Err(e) => {
                self.log(LogLevel::Error, &format!("Render failed: {}", e));
                0
            }
        };

        let samples = &session.scratch[..produced * channels];
        for (bytes, sample) in dest.chunks_exact_mut(SAMPLE_BYTES).zip(samples) {
            bytes.copy_from_slice(&sample.to_ne_bytes());
        }

        if produced > 0 {
            self.publish_position(session);
        }

        ReadInfo {
            sample_rate,
            frame_count: produced as u16,
            channel_count: channels as u8,
            format: OutputFormat::F32,
        }
    }

    fn seek(&self, ms: u64) -> RuntimeResult<SeekOutcome> {
        let mut inner = self.inner.lock();
        inner.state.transition(Operation::Seek)?;
        let Some(session) = inner.session.as_mut() else {
            return Ok(SeekOutcome::Unsupported);
        };

        match session.module.set_position_seconds(ms as f64 / 1000.0) {
            Some(reached) => Ok(SeekOutcome::Seeked {
                position_ms: (reached * 1000.0).round() as u64,
            }),
            None => {
                self.log(LogLevel::Debug, "Engine cannot seek, position unchanged");
                Ok(SeekOutcome::Unsupported)
            }
        }
    }

    fn settings_changed(&self, settings: &dyn SettingsApi) -> SettingsUpdate {
        let mut inner = self.inner.lock();
        if !inner.state.allows(Operation::SettingsChanged) {
            return SettingsUpdate::ApplyNow;
        }
        let Some(session) = inner.session.as_mut() else {
            return SettingsUpdate::ApplyNow;
        };

        let mut next = session.settings.clone();
        settings::apply(&mut next, &SettingsReader::new(&SCHEMA, settings, &session.ext));

        let update = if next.requires_restart(&session.settings) {
            next.keep_restart_only(&session.settings);
            SettingsUpdate::RequireRestart
        } else {
            SettingsUpdate::ApplyNow
        };

        if next != session.settings {
            session.module.configure(&next);
            session.settings = next;
        }
        update
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        match inner.state.transition(Operation::Close) {
            Ok(next) => {
                inner.session = None;
                inner.state = next;
            }
            Err(e) => self.log(LogLevel::Warn, &e.to_string()),
        }
    }

    fn destroy(&self) -> RuntimeResult<()> {
        let mut inner = self.inner.lock();
        inner.state = inner.state.transition(Operation::Destroy)?;
        inner.session = None;
        Ok(())
    }

    fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }
}
