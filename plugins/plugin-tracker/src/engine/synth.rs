//! Reference engine for the `PDSYNTH1` tone-sequence format.
//!
//! Layout:
//!
//! ```text
//! +----------+----------------+----------------------+
//! | PDSYNTH1 | u32 LE length  | JSON header (length) |
//! +----------+----------------+----------------------+
//! ```
//!
//! The header carries tags, sample and instrument names, and one or more
//! subsongs made of sine notes (`hz`, `ms`; `hz == 0` is a rest).

use super::{EngineError, Module, ModuleEngine};
use crate::settings::RenderSettings;
use playdeck_plugin_api::ProbeResult;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

pub const MAGIC: &[u8; 8] = b"PDSYNTH1";

const PREAMBLE_LEN: usize = MAGIC.len() + 4;
const AMPLITUDE: f32 = 0.25;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthHeader {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub date: String,
    pub genre: String,
    pub message: String,
    pub samples: Vec<String>,
    pub instruments: Vec<String>,
    pub subsongs: Vec<SynthSubsong>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthSubsong {
    pub name: String,
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub hz: f32,
    pub ms: u32,
}

impl Note {
    pub fn new(hz: f32, ms: u32) -> Self {
        Self { hz, ms }
    }
}

/// Serialize a header into a complete `PDSYNTH1` resource.
pub fn encode(header: &SynthHeader) -> serde_json::Result<Vec<u8>> {
    let json = serde_json::to_vec(header)?;
    let mut data = Vec::with_capacity(PREAMBLE_LEN + json.len());
    data.extend_from_slice(MAGIC);
    data.extend_from_slice(&(json.len() as u32).to_le_bytes());
    data.extend_from_slice(&json);
    Ok(data)
}

/// Total resource length declared by the preamble.
fn declared_len(data: &[u8]) -> Option<usize> {
    let len = data.get(MAGIC.len()..PREAMBLE_LEN)?;
    let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
    Some(PREAMBLE_LEN + len)
}

/// Engine for `PDSYNTH1` resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthEngine;

impl SynthEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleEngine for SynthEngine {
    type Module = SynthModule;

    fn library_version(&self) -> String {
        format!("synth {}", env!("CARGO_PKG_VERSION"))
    }

    fn extensions(&self) -> Vec<String> {
        vec!["pdsynth".to_string(), "pds".to_string()]
    }

    fn probe(&self, header: &[u8], total_size: u64) -> ProbeResult {
        let seen = header.len().min(MAGIC.len());
        if header[..seen] != MAGIC[..seen] {
            return ProbeResult::Unsupported;
        }

        let more_available = (header.len() as u64) < total_size;
        let Some(needed) = declared_len(header) else {
            return if more_available {
                ProbeResult::NeedMoreData
            } else {
                ProbeResult::Unsupported
            };
        };

        if needed as u64 > total_size {
            return ProbeResult::Unsupported;
        }
        if header.len() < needed {
            return ProbeResult::NeedMoreData;
        }

        match serde_json::from_slice::<SynthHeader>(&header[PREAMBLE_LEN..needed]) {
            Ok(_) => ProbeResult::Supported,
            Err(_) => ProbeResult::Unsupported,
        }
    }

    fn load(&self, data: &[u8]) -> Result<SynthModule, EngineError> {
        if !data.starts_with(MAGIC) {
            return Err(EngineError::UnknownFormat);
        }
        let needed = declared_len(data).ok_or(EngineError::Truncated {
            needed: PREAMBLE_LEN,
            available: data.len(),
        })?;
        if data.len() < needed {
            return Err(EngineError::Truncated {
                needed,
                available: data.len(),
            });
        }

        let header: SynthHeader = serde_json::from_slice(&data[PREAMBLE_LEN..needed])
            .map_err(|e| EngineError::Malformed(e.to_string()))?;
        if header.subsongs.is_empty() {
            return Err(EngineError::Malformed("no subsongs".to_string()));
        }

        Ok(SynthModule::new(header))
    }
}

/// Note spans of one subsong, in song seconds.
#[derive(Debug, Clone)]
struct Timeline {
    /// (end, hz), sorted by end.
    spans: Vec<(f64, f32)>,
    duration: f64,
}

impl Timeline {
    fn new(subsong: &SynthSubsong) -> Self {
        let mut end = 0.0;
        let spans = subsong
            .notes
            .iter()
            .map(|note| {
                end += f64::from(note.ms) / 1000.0;
                (end, note.hz)
            })
            .collect();
        Self {
            spans,
            duration: end,
        }
    }

    /// Index and frequency of the note sounding at `t`.
    fn note_at(&self, t: f64) -> Option<(usize, f32)> {
        let index = self.spans.partition_point(|(end, _)| *end <= t);
        self.spans.get(index).map(|(_, hz)| (index, *hz))
    }
}

/// A loaded `PDSYNTH1` module.
#[derive(Debug, Clone)]
pub struct SynthModule {
    header: SynthHeader,
    subsong: usize,
    timeline: Timeline,
    position: f64,
    phase: f32,
    gain: f32,
    separation: f32,
    tempo: f32,
    pitch: f32,
}

impl SynthModule {
    fn new(header: SynthHeader) -> Self {
        let timeline = Timeline::new(&header.subsongs[0]);
        Self {
            header,
            subsong: 0,
            timeline,
            position: 0.0,
            phase: 0.0,
            gain: 1.0,
            separation: 1.0,
            tempo: 1.0,
            pitch: 1.0,
        }
    }

    pub fn header(&self) -> &SynthHeader {
        &self.header
    }

    /// Next frame as (sample, pan) with pan in `[-1, 1]`, or `None` at the end.
    fn next_frame(&mut self, sample_rate: u32) -> Option<(f32, f32)> {
        let (index, hz) = self.timeline.note_at(self.position)?;
        let rate = sample_rate.max(1) as f32;

        let sample = if hz > 0.0 {
            self.phase = (self.phase + hz * self.pitch / rate).fract();
            (self.phase * TAU).sin() * AMPLITUDE * self.gain
        } else {
            0.0
        };
        self.position += f64::from(self.tempo) / f64::from(rate);

        let side = if index % 2 == 0 { -0.5 } else { 0.5 };
        Some((sample, side * self.separation))
    }

    fn render(&mut self, sample_rate: u32, out: &mut [f32], channels: usize) -> usize {
        let mut frames = 0;
        for frame in out.chunks_exact_mut(channels) {
            let Some((sample, pan)) = self.next_frame(sample_rate) else {
                break;
            };
            let left = sample * (1.0 - pan).min(1.0);
            let right = sample * (1.0 + pan).min(1.0);
            match frame {
                [mono] => *mono = sample,
                [l, r] => {
                    *l = left;
                    *r = right;
                }
                [fl, fr, rl, rr] => {
                    *fl = left;
                    *fr = right;
                    *rl = left * 0.5;
                    *rr = right * 0.5;
                }
                _ => break,
            }
            frames += 1;
        }
        frames
    }
}

impl Module for SynthModule {
    fn subsong_count(&self) -> usize {
        self.header.subsongs.len()
    }

    fn subsong_names(&self) -> Vec<String> {
        self.header.subsongs.iter().map(|s| s.name.clone()).collect()
    }

    fn select_subsong(&mut self, index: usize) -> Result<(), EngineError> {
        let subsong = self
            .header
            .subsongs
            .get(index)
            .ok_or(EngineError::NoSuchSubsong {
                index,
                count: self.header.subsongs.len(),
            })?;
        self.timeline = Timeline::new(subsong);
        self.subsong = index;
        self.position = 0.0;
        self.phase = 0.0;
        Ok(())
    }

    fn duration_seconds(&self) -> f64 {
        self.timeline.duration
    }

    fn position_seconds(&self) -> f64 {
        self.position
    }

    fn set_position_seconds(&mut self, seconds: f64) -> Option<f64> {
        self.position = seconds.max(0.0).min(self.timeline.duration);
        Some(self.position)
    }

    fn metadata(&self, key: &str) -> Option<String> {
        let value = match key {
            "title" => self.header.title.as_str(),
            "artist" => self.header.artist.as_str(),
            "album" => self.header.album.as_str(),
            "date" => self.header.date.as_str(),
            "genre" => self.header.genre.as_str(),
            "message" => self.header.message.as_str(),
            "type_long" => "Playdeck synth module",
            "tracker" => "playdeck-synth",
            _ => return None,
        };
        (!value.is_empty()).then(|| value.to_string())
    }

    fn sample_names(&self) -> Vec<String> {
        self.header.samples.clone()
    }

    fn instrument_names(&self) -> Vec<String> {
        self.header.instruments.clone()
    }

    fn configure(&mut self, settings: &RenderSettings) {
        self.gain = 10f32.powf(settings.master_gain_db / 20.0);
        self.separation = settings.stereo_separation as f32 / 100.0;
        self.tempo = settings.tempo_factor;
        self.pitch = settings.pitch_factor;
    }

    fn render_mono(&mut self, sample_rate: u32, out: &mut [f32]) -> usize {
        self.render(sample_rate, out, 1)
    }

    fn render_stereo(&mut self, sample_rate: u32, out: &mut [f32]) -> usize {
        self.render(sample_rate, out, 2)
    }

    fn render_quad(&mut self, sample_rate: u32, out: &mut [f32]) -> usize {
        self.render(sample_rate, out, 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song() -> SynthHeader {
        SynthHeader {
            title: "Test Song".to_string(),
            samples: vec!["sine".to_string()],
            subsongs: vec![
                SynthSubsong {
                    name: "Intro".to_string(),
                    notes: vec![Note::new(440.0, 500), Note::new(0.0, 250), Note::new(660.0, 250)],
                },
                SynthSubsong {
                    name: String::new(),
                    notes: vec![Note::new(220.0, 2000)],
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_probe_prefixes() {
        let data = encode(&song()).unwrap();
        let total = data.len() as u64;
        let engine = SynthEngine::new();

        assert_eq!(engine.probe(&data, total), ProbeResult::Supported);
        assert_eq!(engine.probe(&data[..4], total), ProbeResult::NeedMoreData);
        assert_eq!(engine.probe(&data[..20], total), ProbeResult::NeedMoreData);
        assert_eq!(engine.probe(&[], total), ProbeResult::NeedMoreData);
        assert_eq!(engine.probe(b"RIFF....WAVE", 1000), ProbeResult::Unsupported);

        // Declared header longer than the whole resource
        assert_eq!(engine.probe(&data[..20], 20), ProbeResult::Unsupported);
    }

    #[test]
    fn test_load_rejects_bad_data() {
        let engine = SynthEngine::new();
        assert_eq!(engine.load(b"nope").unwrap_err(), EngineError::UnknownFormat);

        let data = encode(&song()).unwrap();
        assert!(matches!(
            engine.load(&data[..data.len() - 1]),
            Err(EngineError::Truncated { .. })
        ));

        let empty = encode(&SynthHeader::default()).unwrap();
        assert!(matches!(engine.load(&empty), Err(EngineError::Malformed(_))));
    }

    #[test]
    fn test_render_until_end() {
        let mut module = SynthEngine::new().load(&encode(&song()).unwrap()).unwrap();
        assert_eq!(module.duration_seconds(), 1.0);

        let mut out = vec![0.0; 2 * 1000];
        let mut total = 0;
        loop {
            let frames = module.render_stereo(1000, &mut out);
            if frames == 0 {
                break;
            }
            total += frames;
        }
        // One second at 1 kHz, give or take the last frame's rounding
        assert!((999..=1001).contains(&total), "rendered {total} frames");
    }

    #[test]
    fn test_subsong_and_seek() {
        let mut module = SynthEngine::new().load(&encode(&song()).unwrap()).unwrap();
        module.select_subsong(1).unwrap();
        assert_eq!(module.duration_seconds(), 2.0);
        assert_eq!(module.set_position_seconds(5.0), Some(2.0));
        assert!(matches!(
            module.select_subsong(2),
            Err(EngineError::NoSuchSubsong { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_metadata_keys() {
        let module = SynthEngine::new().load(&encode(&song()).unwrap()).unwrap();
        assert_eq!(module.metadata("title").as_deref(), Some("Test Song"));
        assert_eq!(module.metadata("artist"), None);
        assert_eq!(module.metadata("tracker").as_deref(), Some("playdeck-synth"));
        assert_eq!(module.subsong_names(), vec!["Intro", ""]);
    }

    #[test]
    fn test_quad_layout() {
        let mut module = SynthEngine::new().load(&encode(&song()).unwrap()).unwrap();
        let mut out = vec![0.0; 4 * 8];
        assert_eq!(module.render_quad(8000, &mut out), 8);

        for frame in out.chunks_exact(4) {
            assert_eq!(frame[2], frame[0] * 0.5);
            assert_eq!(frame[3], frame[1] * 0.5);
        }
    }
}
