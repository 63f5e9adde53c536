//! Drives one playback session through the instance lifecycle.
//!
//! The host side of the read loop: create an instance with a message channel,
//! open the resource, optionally seek, read until the end of the subsong (or a
//! frame limit), then close and destroy.

use crate::plugin::PluginManager;
use anyhow::{Context, Result};
use playdeck_plugin_api::{ChannelMessages, PlaybackInstance, ReadInfo, SeekOutcome};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Session parameters.
#[derive(Debug, Clone)]
pub struct PlayOptions {
    pub subsong: usize,
    pub seek_ms: Option<u64>,
    /// Stop after this much rendered audio.
    pub max_seconds: Option<f64>,
    pub buffer_bytes: usize,
    pub native_sample_rate: u32,
}

/// What a session produced.
#[derive(Debug, Clone, Serialize)]
pub struct PlaySummary {
    pub plugin: String,
    pub url: String,
    pub subsong: usize,
    pub sample_rate: u32,
    pub channels: u8,
    pub frames: u64,
    pub seconds: f64,
    pub reads: usize,
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seek: Option<SeekOutcome>,
    /// Last position message published by the plugin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_position: Option<serde_json::Value>,
}

/// Play `url` with the first plugin that accepts it.
///
/// Rendered bytes are written to `out` when given.
pub fn play(
    manager: &PluginManager,
    url: &str,
    options: &PlayOptions,
    out: Option<&mut dyn Write>,
) -> Result<PlaySummary> {
    let plugin = manager
        .find_decoder(url)?
        .with_context(|| format!("No plugin accepts {}", url))?;
    let name = plugin.descriptor().name.clone();

    let (messages, receiver) = ChannelMessages::new();
    let mut positions = PositionFeed::new(receiver);
    let services = manager.services_for(&name).with_message(Arc::new(messages));
    let settings = manager.settings().scoped(name.as_str());

    let instance = plugin
        .create(&services)
        .with_context(|| format!("Plugin {} could not create an instance", name))?;

    if let Err(e) = instance.open(url, options.subsong, &settings) {
        if let Err(destroy) = instance.destroy() {
            warn!(plugin = %name, "Instance destroy failed: {}", destroy);
        }
        return Err(e).with_context(|| format!("Failed to open {}", url));
    }
    info!(plugin = %name, url = %url, subsong = options.subsong, "Opened");

    let rendered = render(instance.as_ref(), options, out, &mut positions);

    instance.close();
    if let Err(e) = instance.destroy() {
        warn!(plugin = %name, "Instance destroy failed: {}", e);
    }

    let mut summary = rendered?;
    summary.plugin = name;
    summary.url = url.to_string();
    positions.drain();
    summary.last_position = positions.last.take();

    Ok(summary)
}

/// Host end of the plugin's message channel, drained as the session runs.
struct PositionFeed {
    receiver: UnboundedReceiver<Vec<u8>>,
    last: Option<serde_json::Value>,
    received: usize,
    /// Most messages found waiting by a single drain.
    peak_backlog: usize,
}

impl PositionFeed {
    fn new(receiver: UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            receiver,
            last: None,
            received: 0,
            peak_backlog: 0,
        }
    }

    fn drain(&mut self) {
        let mut pending = 0;
        while let Ok(payload) = self.receiver.try_recv() {
            pending += 1;
            match serde_json::from_slice(&payload) {
                Ok(position) => self.last = Some(position),
                Err(e) => debug!("Ignoring non-JSON message: {}", e),
            }
        }
        self.received += pending;
        self.peak_backlog = self.peak_backlog.max(pending);
    }
}

fn render(
    instance: &dyn PlaybackInstance,
    options: &PlayOptions,
    mut out: Option<&mut dyn Write>,
    positions: &mut PositionFeed,
) -> Result<PlaySummary> {
    let seek = options
        .seek_ms
        .map(|ms| instance.seek(ms))
        .transpose()
        .context("Seek failed")?;

    let mut buffer = vec![0u8; options.buffer_bytes];
    let mut summary = PlaySummary {
        plugin: String::new(),
        url: String::new(),
        subsong: options.subsong,
        sample_rate: options.native_sample_rate,
        channels: 0,
        frames: 0,
        seconds: 0.0,
        reads: 0,
        bytes: 0,
        seek,
        last_position: None,
    };

    loop {
        let info: ReadInfo = instance.read(&mut buffer, options.native_sample_rate);
        summary.reads += 1;
        positions.drain();
        if info.is_end() {
            break;
        }

        summary.sample_rate = info.sample_rate;
        summary.channels = info.channel_count;
        summary.frames += u64::from(info.frame_count);

        let len = info.byte_len().min(buffer.len());
        summary.bytes += len as u64;
        if let Some(out) = out.as_mut() {
            out.write_all(&buffer[..len]).context("Failed to write output")?;
        }

        if let Some(limit) = options.max_seconds {
            if summary.frames as f64 >= limit * f64::from(summary.sample_rate) {
                debug!(frames = summary.frames, "Frame limit reached");
                break;
            }
        }
    }

    if summary.sample_rate > 0 {
        summary.seconds = summary.frames as f64 / f64::from(summary.sample_rate);
    }
    if let Some(out) = out {
        out.flush().context("Failed to flush output")?;
    }

    Ok(summary)
}
