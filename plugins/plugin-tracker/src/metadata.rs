//! Publishing module metadata into a host metadata sink.

use crate::engine::{EngineError, Module};
use playdeck_plugin_api::MetadataSink;
use playdeck_runtime::{file_name_of, RuntimeError, RuntimeResult};

/// String tags and the module keys they are read from.
const TEXT_TAGS: [(&str, &str); 7] = [
    ("song_type", "type_long"),
    ("authoring_tool", "tracker"),
    ("artist", "artist"),
    ("album", "album"),
    ("date", "date"),
    ("genre", "genre"),
    ("message", "message"),
];

/// Title of a module, falling back to the resource's file name.
pub fn title_of<M: Module>(module: &M, url: &str) -> String {
    module
        .metadata("title")
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| file_name_of(url).to_string())
}

/// Display name of subsong `index` (zero based) out of `count`.
pub fn subsong_title(title: &str, name: &str, index: usize, count: usize) -> String {
    if name.is_empty() {
        format!("{} ({}/{})", title, index + 1, count)
    } else {
        format!("{} - {} ({}/{})", title, name, index + 1, count)
    }
}

/// Write everything known about `module` into the sink.
///
/// Subsongs are listed only when there is more than one. Selecting each
/// subsong to measure it leaves the module on the last one.
pub fn publish<M: Module>(
    sink: &dyn MetadataSink,
    url: &str,
    module: &mut M,
) -> RuntimeResult<()> {
    let id = sink
        .create_url(url)
        .ok_or_else(|| RuntimeError::MetadataRefused(url.to_string()))?;

    let title = title_of(module, url);
    sink.set_tag(id, "title", &title);
    for (tag, key) in TEXT_TAGS {
        if let Some(value) = module.metadata(key) {
            sink.set_tag(id, tag, &value);
        }
    }
    sink.set_tag_f64(id, "length", module.duration_seconds());

    for sample in module.sample_names() {
        sink.add_sample(id, &sample);
    }
    for instrument in module.instrument_names() {
        sink.add_instrument(id, &instrument);
    }

    let count = module.subsong_count();
    if count > 1 {
        for (index, name) in module.subsong_names().into_iter().enumerate() {
            module.select_subsong(index).map_err(|e| match e {
                EngineError::NoSuchSubsong { index, count } => {
                    RuntimeError::SubsongOutOfRange { index, count }
                }
                other => RuntimeError::DecodeRejected {
                    url: url.to_string(),
                    reason: other.to_string(),
                },
            })?;
            sink.add_subsong(
                id,
                index,
                &subsong_title(&title, &name, index, count),
                module.duration_seconds() as f32,
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::synth::{encode, Note, SynthHeader, SynthSubsong};
    use crate::engine::{ModuleEngine, SynthEngine};
    use playdeck_plugin_api::MetadataStore;

    fn module(header: SynthHeader) -> crate::engine::synth::SynthModule {
        SynthEngine::new().load(&encode(&header).unwrap()).unwrap()
    }

    fn subsong(name: &str, ms: u32) -> SynthSubsong {
        SynthSubsong {
            name: name.to_string(),
            notes: vec![Note::new(440.0, ms)],
        }
    }

    #[test]
    fn test_subsong_title() {
        assert_eq!(subsong_title("Song", "Intro", 0, 3), "Song - Intro (1/3)");
        assert_eq!(subsong_title("Song", "", 2, 3), "Song (3/3)");
    }

    #[test]
    fn test_title_falls_back_to_file_name() {
        let m = module(SynthHeader {
            subsongs: vec![subsong("", 100)],
            ..Default::default()
        });
        assert_eq!(title_of(&m, "/music/chip/tune.pds"), "tune.pds");
    }

    #[test]
    fn test_publish_lists_subsongs_only_when_several() {
        let sink = MetadataStore::new();

        let mut single = module(SynthHeader {
            title: "Solo".to_string(),
            subsongs: vec![subsong("Only", 1000)],
            ..Default::default()
        });
        publish(&sink, "solo.pds", &mut single).unwrap();
        let entry = sink.get("solo.pds").unwrap();
        assert!(entry.subsongs.is_empty());
        assert_eq!(entry.number("length"), Some(1.0));
        assert_eq!(entry.text("authoring_tool"), Some("playdeck-synth"));
        assert_eq!(entry.text("artist"), None);

        let mut multi = module(SynthHeader {
            title: "Multi".to_string(),
            artist: "Someone".to_string(),
            subsongs: vec![subsong("A", 1000), subsong("", 500)],
            ..Default::default()
        });
        publish(&sink, "multi.pds", &mut multi).unwrap();
        let entry = sink.get("multi.pds").unwrap();
        let names: Vec<_> = entry.subsongs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Multi - A (1/2)", "Multi (2/2)"]);
        assert_eq!(entry.subsongs[1].length, 0.5);
        assert_eq!(entry.text("artist"), Some("Someone"));
    }
}
