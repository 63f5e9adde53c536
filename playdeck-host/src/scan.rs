//! Library scan: probe and read metadata for every file under a directory.
//!
//! Each file is handled on tokio's blocking pool, since probing and metadata
//! extraction read whole resources synchronously.

use crate::plugin::PluginManager;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Scan result for one file.
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub path: PathBuf,
    /// Plugin that accepted the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    pub subsongs: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanEntry {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            plugin: None,
            title: None,
            length: None,
            subsongs: 0,
            error: None,
        }
    }

    pub fn is_playable(&self) -> bool {
        self.plugin.is_some() && self.error.is_none()
    }
}

/// Recursively list regular files under `dir`, sorted.
pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current)
            .with_context(|| format!("Failed to read directory: {}", current.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Scan every file under `dir`. One file failing never stops the scan.
pub async fn scan(manager: Arc<PluginManager>, dir: &Path) -> Result<Vec<ScanEntry>> {
    let files = collect_files(dir)?;
    info!("Scanning {} files under {}", files.len(), dir.display());

    let mut tasks = JoinSet::new();
    for (index, path) in files.into_iter().enumerate() {
        let manager = Arc::clone(&manager);
        tasks.spawn_blocking(move || (index, scan_file(&manager, path)));
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => warn!("Scan task failed: {}", e),
        }
    }

    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, entry)| entry).collect())
}

fn scan_file(manager: &PluginManager, path: PathBuf) -> ScanEntry {
    let url = path.to_string_lossy().into_owned();
    let mut entry = ScanEntry::new(path);

    let plugin = match manager.find_decoder(&url) {
        Ok(Some(plugin)) => plugin,
        Ok(None) => {
            debug!(url = %url, "No plugin accepts file");
            return entry;
        }
        Err(e) => {
            entry.error = Some(e.to_string());
            return entry;
        }
    };
    entry.plugin = Some(plugin.descriptor().name.clone());

    match manager.read_metadata(&url) {
        Ok(Some(metadata)) => {
            entry.title = metadata.text("title").map(str::to_string);
            entry.length = metadata.number("length");
            entry.subsongs = metadata.subsongs.len();
        }
        Ok(None) => {}
        Err(e) => {
            warn!(url = %url, "Metadata failed: {}", e);
            entry.error = Some(e.to_string());
        }
    }

    entry
}
