//! Integration tests for playdeck-host.
//!
//! These tests verify that:
//! - Configuration overrides reach plugins through the settings store
//! - Files on disk go through probe, playback and metadata end to end
//! - Library scans keep going past files no plugin accepts
//!
//! Tests use temporary directories and the built-in tracker plugin.

use anyhow::Result;
use playdeck_host::config::Config;
use playdeck_host::playback::{play, PlayOptions};
use playdeck_host::plugin::PluginManager;
use playdeck_host::scan::scan;
use playdeck_plugin_api::{FsIo, ProbeResult};
use plugin_tracker::engine::synth::{encode, Note, SynthHeader, SynthSubsong};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};

// ============================================================================
// Test Utilities
// ============================================================================

/// Writes a two-subsong module to `dir/name`.
fn write_module(dir: &Path, name: &str) -> Result<PathBuf> {
    let data = encode(&SynthHeader {
        title: "Disk Song".into(),
        artist: "Tester".into(),
        subsongs: vec![
            SynthSubsong {
                name: "Intro".into(),
                notes: vec![Note::new(440.0, 250), Note::new(550.0, 250)],
            },
            SynthSubsong {
                name: String::new(),
                notes: vec![Note::new(330.0, 1000)],
            },
        ],
        samples: vec!["kick".into()],
        ..Default::default()
    })?;

    let path = dir.join(name);
    std::fs::write(&path, data)?;
    Ok(path)
}

/// Loads the config text, then builds a manager seeded from it.
fn setup_host(config_text: &str) -> Result<(Config, PluginManager)> {
    let mut file = NamedTempFile::new()?;
    file.write_all(config_text.as_bytes())?;
    let config = Config::load(file.path())?;

    let mut manager = PluginManager::new(Arc::new(FsIo::new()), config.host.probe_bytes);
    manager.load_builtin();
    config.seed_store(manager.settings());
    Ok((config, manager))
}

fn options(config: &Config) -> PlayOptions {
    PlayOptions {
        subsong: 0,
        seek_ms: None,
        max_seconds: None,
        buffer_bytes: config.host.buffer_bytes,
        native_sample_rate: config.host.native_sample_rate,
    }
}

fn url(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ============================================================================
// Configuration -> Settings Store
// ============================================================================

#[test]
fn test_config_overrides_reach_playback() -> Result<()> {
    let dir = TempDir::new()?;
    let song = write_module(dir.path(), "song.pds")?;

    let (config, manager) = setup_host(
        r#"
[host]
native_sample_rate = 44100
buffer_bytes = 2048

[settings.tracker."*"]
Channels = 1

[settings.tracker.pds]
SampleRate = 8000
"#,
    )?;

    let summary = play(&manager, &url(&song), &options(&config), None)?;
    assert_eq!(summary.channels, 1);
    assert_eq!(summary.sample_rate, 8000);
    assert!((summary.seconds - 0.5).abs() < 0.01);
    Ok(())
}

#[test]
fn test_defaults_use_native_rate() -> Result<()> {
    let dir = TempDir::new()?;
    let song = write_module(dir.path(), "song.pds")?;

    let (config, manager) = setup_host("[host]\nnative_sample_rate = 22050\n")?;

    let summary = play(&manager, &url(&song), &options(&config), None)?;
    assert_eq!(summary.sample_rate, 22050);
    assert_eq!(summary.channels, 2);
    Ok(())
}

#[test]
fn test_invalid_overrides_are_skipped() -> Result<()> {
    let (_, manager) = setup_host(
        r#"
[host]

[settings.tracker."*"]
Channels = "mono"
NoSuchSetting = 1

[settings.nobody."*"]
Anything = true
"#,
    )?;

    assert!(manager.settings().get("tracker", "pds", "Channels").is_err());
    Ok(())
}

// ============================================================================
// End-to-end playback and metadata
// ============================================================================

#[test]
fn test_probe_play_metadata_from_disk() -> Result<()> {
    let dir = TempDir::new()?;
    let song = write_module(dir.path(), "song.pds")?;
    let (config, manager) = setup_host("[host]\n")?;

    let probes = manager.probe(&url(&song))?;
    assert_eq!(probes.len(), 1);
    assert_eq!(probes[0].result, ProbeResult::Supported);

    let mut out = Vec::new();
    let options = PlayOptions {
        subsong: 1,
        ..options(&config)
    };
    let summary = play(&manager, &url(&song), &options, Some(&mut out))?;
    assert_eq!(summary.subsong, 1);
    assert!((summary.seconds - 1.0).abs() < 0.01);
    assert_eq!(out.len() as u64, summary.bytes);

    let entry = manager.read_metadata(&url(&song))?.unwrap();
    assert_eq!(entry.text("title"), Some("Disk Song"));
    assert_eq!(entry.text("artist"), Some("Tester"));
    assert_eq!(entry.subsongs.len(), 2);
    assert_eq!(entry.subsongs[0].name, "Disk Song - Intro (1/2)");
    assert_eq!(entry.samples, vec!["kick".to_string()]);
    Ok(())
}

#[test]
fn test_renamed_file_still_decodes() -> Result<()> {
    let dir = TempDir::new()?;
    let song = write_module(dir.path(), "song.bin")?;
    let (config, manager) = setup_host("[host]\n")?;

    // Extension does not match, but the probe accepts the content
    let summary = play(&manager, &url(&song), &options(&config), None)?;
    assert_eq!(summary.plugin, "tracker");
    Ok(())
}

// ============================================================================
// Library scan
// ============================================================================

#[tokio::test]
async fn test_scan_directory() -> Result<()> {
    let dir = TempDir::new()?;
    write_module(dir.path(), "a.pds")?;
    std::fs::create_dir(dir.path().join("nested"))?;
    write_module(&dir.path().join("nested"), "b.pds")?;
    std::fs::write(dir.path().join("cover.jpg"), [0xFFu8, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0])?;
    std::fs::write(dir.path().join("empty.pds"), [])?;

    let (_, manager) = setup_host("[host]\n")?;
    let entries = scan(Arc::new(manager), dir.path()).await?;

    assert_eq!(entries.len(), 4);
    assert_eq!(entries.iter().filter(|e| e.is_playable()).count(), 2);
    assert!(entries
        .iter()
        .filter(|e| e.is_playable())
        .all(|e| e.subsongs == 2 && e.title.as_deref() == Some("Disk Song")));
    Ok(())
}
