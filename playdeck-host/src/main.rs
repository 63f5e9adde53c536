//! # playdeck-host
//!
//! The Playdeck host.
//!
//! The host is responsible for:
//! - Loading playback plugins and running their one-time initialization
//! - Serving plugins their capabilities (file I/O, logging, metadata, settings)
//! - Owning the settings store, seeded from the configuration file
//! - Probing resources and driving playback sessions
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       playdeck-host                          │
//! │                                                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │   Plugin     │  │   Settings   │  │   Metadata   │      │
//! │  │   Registry   │  │   Store      │  │   Store      │      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────┐    │
//! │  │        CLI: probe / play / metadata / schema / scan │    │
//! │  └────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!           ┌──────────────────┼──────────────────┐
//!           ▼                  ▼                  ▼
//!      ┌─────────┐      ┌─────────────┐    ┌──────────┐
//!      │ Tracker │      │   Future    │    │  Other   │
//!      │ Plugin  │      │   Plugins   │    │ Engines  │
//!      └─────────┘      └─────────────┘    └──────────┘
//! ```
//!
//! ## Configuration
//!
//! The host reads configuration from `$XDG_CONFIG_HOME/playdeck/config.toml`,
//! or from the file given with `--config`.
//!
//! ## Running
//!
//! ```bash
//! # Render a module and report what was played
//! cargo run --bin playdeck-host -- play song.pds --output song.f32
//!
//! # Export the settings tables for UI rendering
//! cargo run --bin playdeck-host -- schema
//!
//! # With debug logging
//! RUST_LOG=debug cargo run --bin playdeck-host -- scan ~/music
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use playdeck_host::config::Config;
use playdeck_host::playback::{self, PlayOptions};
use playdeck_host::plugin::PluginManager;
use playdeck_host::scan;
use playdeck_plugin_api::FsIo;
use playdeck_runtime::extension_of;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Playdeck playback host", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List loaded plugins
    Plugins,

    /// Ask every plugin whether it can decode a file
    Probe { file: PathBuf },

    /// Decode a file through the playback lifecycle
    Play {
        file: PathBuf,

        #[arg(short, long, default_value_t = 0)]
        subsong: usize,

        /// Start position in milliseconds
        #[arg(long)]
        seek_ms: Option<u64>,

        /// Stop after this many seconds of audio
        #[arg(long)]
        seconds: Option<f64>,

        /// Write raw interleaved samples to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Setting override for this file's extension, as ID=VALUE
        #[arg(long = "set", value_name = "ID=VALUE")]
        overrides: Vec<String>,
    },

    /// Extract tags, subsongs, samples and instruments
    Metadata { file: PathBuf },

    /// Print settings schemas as JSON
    Schema {
        /// Only this plugin's schema
        plugin: Option<String>,
    },

    /// Probe and read metadata for every file under a directory
    Scan { dir: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration before logging so its level can seed the filter
    let loaded = match &args.config {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    };
    let level = match &loaded {
        Ok(cfg) => cfg.host.log_level.clone(),
        Err(_) => Config::default().host.log_level,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting playdeck-host v{}", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(cfg) => {
            info!("Loaded configuration");
            cfg
        }
        Err(e) => {
            warn!("Failed to load config, using defaults: {:#}", e);
            Config::default()
        }
    };

    let mut manager = PluginManager::new(Arc::new(FsIo::new()), config.host.probe_bytes);
    manager.load_builtin();
    for plugin in manager.list_plugins() {
        info!(
            "Plugin: {} v{} ({}) - extensions: {}",
            plugin.name, plugin.version, plugin.library_version, plugin.extensions
        );
    }

    let seeded = config.seed_store(manager.settings());
    info!("Seeded {} setting(s) from configuration", seeded);

    match args.command {
        Command::Plugins => print_json(&manager.list_plugins()),
        Command::Probe { file } => {
            let url = url_of(&file);
            print_json(&manager.probe(&url)?)
        }
        Command::Play {
            file,
            subsong,
            seek_ms,
            seconds,
            output,
            overrides,
        } => {
            let url = url_of(&file);
            apply_overrides(&manager, &url, &overrides)?;

            let options = PlayOptions {
                subsong,
                seek_ms,
                max_seconds: seconds,
                buffer_bytes: config.host.buffer_bytes,
                native_sample_rate: config.host.native_sample_rate,
            };

            let summary = match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    let mut writer = BufWriter::new(file);
                    playback::play(&manager, &url, &options, Some(&mut writer))?
                }
                None => playback::play(&manager, &url, &options, None)?,
            };
            print_json(&summary)
        }
        Command::Metadata { file } => {
            let url = url_of(&file);
            let entry = manager
                .read_metadata(&url)?
                .with_context(|| format!("No plugin accepts {}", url))?;
            print_json(&entry)
        }
        Command::Schema { plugin } => {
            let mut schemas = serde_json::Map::new();
            for schema in manager.schemas() {
                if plugin.as_deref().is_some_and(|p| p != schema.owner) {
                    continue;
                }
                schemas.insert(schema.owner.to_string(), schema.to_json()?);
            }
            if let Some(name) = plugin.filter(|p| !schemas.contains_key(p)) {
                anyhow::bail!("No settings schema registered for plugin: {}", name);
            }
            print_json(&schemas)
        }
        Command::Scan { dir } => {
            let entries = scan::scan(Arc::new(manager), &dir).await?;
            let playable = entries.iter().filter(|e| e.is_playable()).count();
            info!("Scan complete: {} of {} files playable", playable, entries.len());
            print_json(&entries)
        }
    }
}

/// Store `ID=VALUE` overrides under the decoder's schema for the file's extension.
fn apply_overrides(manager: &PluginManager, url: &str, overrides: &[String]) -> Result<()> {
    if overrides.is_empty() {
        return Ok(());
    }

    let plugin = manager
        .find_decoder(url)?
        .with_context(|| format!("No plugin accepts {}", url))?;
    let owner = plugin.descriptor().name.clone();
    let ext = extension_of(url);

    for raw in overrides {
        let (id, value) = raw
            .split_once('=')
            .with_context(|| format!("Expected ID=VALUE, got: {}", raw))?;
        manager
            .set_override(&owner, &ext, id.trim(), value.trim())
            .with_context(|| format!("Invalid override: {}", raw))?;
    }
    Ok(())
}

fn url_of(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
