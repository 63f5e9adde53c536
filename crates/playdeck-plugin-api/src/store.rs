//! Host-side settings store.
//!
//! Values are keyed by schema owner, file extension and setting id. A lookup
//! for an extension falls back to the owner-wide [`WILDCARD`] entry. Stored
//! values are type-checked against the owner's schema; range conformance is
//! left to the reader.

use crate::host::SettingsApi;
use parking_lot::RwLock;
use playdeck_runtime::{
    SchemaError, SettingDescriptor, SettingKind, SettingValue, SettingsError, SettingsResult,
    SettingsSchema,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Extension key for values that apply to every extension.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ValueKey {
    owner: String,
    ext: String,
    id: String,
}

impl ValueKey {
    fn new(owner: &str, ext: &str, id: &str) -> Self {
        Self {
            owner: owner.to_string(),
            ext: ext.to_ascii_lowercase(),
            id: id.to_string(),
        }
    }
}

#[derive(Default)]
struct Inner {
    schemas: HashMap<String, SettingsSchema>,
    values: HashMap<ValueKey, SettingValue>,
}

/// Shared settings store for all plugins.
#[derive(Default)]
pub struct SettingsStore {
    inner: RwLock<Inner>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema.
    ///
    /// Each owner registers once. A schema repeating an id, or declaring an id
    /// the owner already registered, fails with [`SettingsError::DuplicatedId`].
    /// Any other second registration fails with
    /// [`SettingsError::AlreadyRegistered`]. The first schema stays in place.
    pub fn register(&self, schema: SettingsSchema) -> SettingsResult<()> {
        schema.validate().map_err(|e| match e {
            SchemaError::DuplicatedId(id) => SettingsError::DuplicatedId(id),
            other => SettingsError::Rejected(other.to_string()),
        })?;

        let mut inner = self.inner.write();
        if let Some(existing) = inner.schemas.get(schema.owner) {
            return Err(match schema.iter().find(|d| existing.get(d.id).is_some()) {
                Some(clash) => SettingsError::DuplicatedId(clash.id.to_string()),
                None => SettingsError::AlreadyRegistered(schema.owner.to_string()),
            });
        }

        info!(owner = schema.owner, settings = schema.len(), "Registered settings schema");
        inner.schemas.insert(schema.owner.to_string(), schema);
        Ok(())
    }

    /// Schema registered by an owner.
    pub fn schema(&self, owner: &str) -> Option<SettingsSchema> {
        self.inner.read().schemas.get(owner).copied()
    }

    /// Owners with a registered schema.
    pub fn owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = self.inner.read().schemas.keys().cloned().collect();
        owners.sort();
        owners
    }

    /// Store a value for an owner's setting.
    ///
    /// `ext` is a file extension or [`WILDCARD`]. The value must match the
    /// declared type; integers are accepted for float settings.
    pub fn set(&self, owner: &str, ext: &str, id: &str, value: SettingValue) -> SettingsResult<()> {
        let descriptor = self.descriptor(owner, id)?;
        check_type(descriptor, &value)?;

        debug!(owner, ext, id, %value, "Stored setting");
        self.inner
            .write()
            .values
            .insert(ValueKey::new(owner, ext, id), value);
        Ok(())
    }

    /// Remove a stored value, returning it if present.
    pub fn remove(&self, owner: &str, ext: &str, id: &str) -> Option<SettingValue> {
        self.inner
            .write()
            .values
            .remove(&ValueKey::new(owner, ext, id))
    }

    /// Look up a value for an extension, falling back to the wildcard entry.
    pub fn get(&self, owner: &str, ext: &str, id: &str) -> SettingsResult<SettingValue> {
        let inner = self.inner.read();
        inner
            .values
            .get(&ValueKey::new(owner, ext, id))
            .or_else(|| inner.values.get(&ValueKey::new(owner, WILDCARD, id)))
            .cloned()
            .ok_or(SettingsError::NotFound)
    }

    /// A settings handle scoped to one owner, as handed to a plugin.
    pub fn scoped(self: &Arc<Self>, owner: impl Into<String>) -> ScopedSettings {
        ScopedSettings {
            store: Arc::clone(self),
            owner: owner.into(),
        }
    }

    fn descriptor(&self, owner: &str, id: &str) -> SettingsResult<&'static SettingDescriptor> {
        self.inner
            .read()
            .schemas
            .get(owner)
            .and_then(|schema| schema.get(id))
            .ok_or(SettingsError::NotFound)
    }
}

fn check_type(descriptor: &SettingDescriptor, value: &SettingValue) -> SettingsResult<()> {
    let matches = match descriptor.kind {
        SettingKind::Bool { .. } => value.as_bool().is_some(),
        SettingKind::IntRange { .. } | SettingKind::IntChoices { .. } => value.as_int().is_some(),
        SettingKind::FloatRange { .. } => value.as_float().is_some(),
        SettingKind::StringChoices { .. } => value.as_str().is_some(),
    };

    if matches {
        Ok(())
    } else {
        Err(SettingsError::WrongType {
            expected: descriptor.kind.value_type(),
            found: value.type_name(),
        })
    }
}

/// [`SettingsApi`] implementation bound to one schema owner.
#[derive(Clone)]
pub struct ScopedSettings {
    store: Arc<SettingsStore>,
    owner: String,
}

impl ScopedSettings {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn lookup<T>(
        &self,
        ext: &str,
        id: &str,
        expected: &'static str,
        extract: impl FnOnce(&SettingValue) -> Option<T>,
    ) -> SettingsResult<T> {
        let value = self.store.get(&self.owner, ext, id)?;
        extract(&value).ok_or(SettingsError::WrongType {
            expected,
            found: value.type_name(),
        })
    }
}

impl SettingsApi for ScopedSettings {
    fn register(&self, schema: SettingsSchema) -> SettingsResult<()> {
        if schema.owner != self.owner {
            return Err(SettingsError::Rejected(format!(
                "schema owner '{}' does not match '{}'",
                schema.owner, self.owner
            )));
        }
        self.store.register(schema)
    }

    fn get_string(&self, ext: &str, id: &str) -> SettingsResult<String> {
        self.lookup(ext, id, "string", |v| v.as_str().map(str::to_string))
    }

    fn get_int(&self, ext: &str, id: &str) -> SettingsResult<i32> {
        self.lookup(ext, id, "int", SettingValue::as_int)
    }

    fn get_float(&self, ext: &str, id: &str) -> SettingsResult<f32> {
        self.lookup(ext, id, "float", SettingValue::as_float)
    }

    fn get_bool(&self, ext: &str, id: &str) -> SettingsResult<bool> {
        self.lookup(ext, id, "bool", SettingValue::as_bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static DESCRIPTORS: [SettingDescriptor; 3] = [
        SettingDescriptor::int_range("StereoSeparation", "Stereo separation", "", 100, 0, 200),
        SettingDescriptor::float_range("MasterGain", "Master gain", "", 0.0, -12.0, 12.0),
        SettingDescriptor::bool("VolumeRamping", "Volume ramping", "", true),
    ];

    static EXTRA: [SettingDescriptor; 1] = [SettingDescriptor::bool(
        "VolumeRamping",
        "Volume ramping again",
        "",
        false,
    )];

    static LOOPING: [SettingDescriptor; 1] =
        [SettingDescriptor::bool("Loop", "Loop forever", "", false)];

    fn store() -> Arc<SettingsStore> {
        let store = Arc::new(SettingsStore::new());
        store
            .register(SettingsSchema::new("tracker", &DESCRIPTORS))
            .unwrap();
        store
    }

    #[test]
    fn test_register_rejects_colliding_ids() {
        let store = store();
        assert_eq!(
            store.register(SettingsSchema::new("tracker", &EXTRA)),
            Err(SettingsError::DuplicatedId("VolumeRamping".to_string()))
        );

        // Another owner may reuse the id
        assert!(store.register(SettingsSchema::new("other", &EXTRA)).is_ok());
        assert_eq!(store.owners(), vec!["other", "tracker"]);
    }

    #[test]
    fn test_second_schema_for_owner_keeps_first() {
        let store = store();
        store
            .set("tracker", WILDCARD, "StereoSeparation", SettingValue::Int(50))
            .unwrap();

        assert_eq!(
            store.register(SettingsSchema::new("tracker", &LOOPING)),
            Err(SettingsError::AlreadyRegistered("tracker".to_string()))
        );

        // The first schema still governs writes and reads
        assert_eq!(store.schema("tracker").map(|s| s.len()), Some(3));
        assert!(store.schema("tracker").and_then(|s| s.get("Loop")).is_none());
        store
            .set("tracker", WILDCARD, "StereoSeparation", SettingValue::Int(60))
            .unwrap();
        assert_eq!(
            store.set("tracker", WILDCARD, "Loop", SettingValue::Bool(true)),
            Err(SettingsError::NotFound)
        );
        assert_eq!(
            store.scoped("tracker").get_int("mod", "StereoSeparation"),
            Ok(60)
        );
    }

    #[test]
    fn test_lookup_falls_back_to_wildcard() {
        let store = store();
        let settings = store.scoped("tracker");

        assert_eq!(settings.get_int("mod", "StereoSeparation"), Err(SettingsError::NotFound));

        store
            .set("tracker", WILDCARD, "StereoSeparation", SettingValue::Int(50))
            .unwrap();
        store
            .set("tracker", "xm", "StereoSeparation", SettingValue::Int(150))
            .unwrap();

        assert_eq!(settings.get_int("mod", "StereoSeparation"), Ok(50));
        assert_eq!(settings.get_int("XM", "StereoSeparation"), Ok(150));
    }

    #[test]
    fn test_set_checks_declared_type() {
        let store = store();

        assert_eq!(
            store.set("tracker", WILDCARD, "VolumeRamping", SettingValue::Int(1)),
            Err(SettingsError::WrongType {
                expected: "bool",
                found: "int"
            })
        );
        assert_eq!(
            store.set("tracker", WILDCARD, "Unknown", SettingValue::Int(1)),
            Err(SettingsError::NotFound)
        );

        // Integers widen into float settings
        store
            .set("tracker", WILDCARD, "MasterGain", SettingValue::Int(3))
            .unwrap();
        assert_eq!(store.scoped("tracker").get_float("mod", "MasterGain"), Ok(3.0));
    }

    #[test]
    fn test_typed_getter_reports_wrong_type() {
        let store = store();
        store
            .set("tracker", WILDCARD, "VolumeRamping", SettingValue::Bool(false))
            .unwrap();

        let settings = store.scoped("tracker");
        assert_eq!(settings.get_bool("mod", "VolumeRamping"), Ok(false));
        assert!(matches!(
            settings.get_int("mod", "VolumeRamping"),
            Err(SettingsError::WrongType { .. })
        ));
    }

    #[test]
    fn test_scoped_register_checks_owner() {
        let store = Arc::new(SettingsStore::new());
        let settings = store.scoped("tracker");

        assert!(matches!(
            settings.register(SettingsSchema::new("other", &DESCRIPTORS)),
            Err(SettingsError::Rejected(_))
        ));
        assert!(settings
            .register(SettingsSchema::new("tracker", &DESCRIPTORS))
            .is_ok());
        assert_eq!(store.schema("tracker").map(|s| s.len()), Some(3));
    }

    #[test]
    fn test_remove() {
        let store = store();
        store
            .set("tracker", "mod", "StereoSeparation", SettingValue::Int(10))
            .unwrap();

        assert_eq!(
            store.remove("tracker", "mod", "StereoSeparation"),
            Some(SettingValue::Int(10))
        );
        assert_eq!(
            store.get("tracker", "mod", "StereoSeparation"),
            Err(SettingsError::NotFound)
        );
    }
}
