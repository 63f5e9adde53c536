//! # Plugin Management
//!
//! Owns the playback plugins loaded by the host.
//!
//! This module provides:
//! - Plugin registration and one-time initialization
//! - The per-plugin service handles (I/O, log, metadata, settings)
//! - Probing and metadata extraction on behalf of the CLI commands

mod manager;

pub use manager::{PluginManager, ProbeEntry};
