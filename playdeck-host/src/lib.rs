//! Playdeck host library
//!
//! This module exports the internal components of the host for testing purposes.

pub mod config;
pub mod playback;
pub mod plugin;
pub mod scan;
