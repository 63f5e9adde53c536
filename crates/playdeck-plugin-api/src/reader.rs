//! Typed settings reads through a schema.

use crate::host::SettingsApi;
use playdeck_runtime::{SettingKind, SettingValue, SettingsError, SettingsSchema};

/// Reads settings for one extension, conforming each value to its descriptor.
///
/// A value that is missing, of the wrong type, or rejected by its descriptor
/// reads as `None`: the caller keeps whatever it had.
pub struct SettingsReader<'a> {
    schema: &'a SettingsSchema,
    settings: &'a dyn SettingsApi,
    ext: &'a str,
}

impl<'a> SettingsReader<'a> {
    pub fn new(schema: &'a SettingsSchema, settings: &'a dyn SettingsApi, ext: &'a str) -> Self {
        Self {
            schema,
            settings,
            ext,
        }
    }

    /// Conformed value of a declared setting.
    pub fn value(&self, id: &str) -> Option<SettingValue> {
        let Some(descriptor) = self.schema.get(id) else {
            tracing::warn!(owner = self.schema.owner, id, "Read of undeclared setting");
            return None;
        };

        let raw = match descriptor.kind {
            SettingKind::Bool { .. } => {
                self.settings.get_bool(self.ext, id).map(SettingValue::Bool)
            }
            SettingKind::IntRange { .. } | SettingKind::IntChoices { .. } => {
                self.settings.get_int(self.ext, id).map(SettingValue::Int)
            }
            SettingKind::FloatRange { .. } => {
                self.settings.get_float(self.ext, id).map(SettingValue::Float)
            }
            SettingKind::StringChoices { .. } => {
                self.settings.get_string(self.ext, id).map(SettingValue::String)
            }
        };

        match raw.and_then(|v| descriptor.conform(&v)) {
            Ok(value) => Some(value),
            Err(SettingsError::NotFound) => None,
            Err(e) => {
                tracing::debug!(
                    owner = self.schema.owner,
                    id,
                    ext = self.ext,
                    error = %e,
                    "Ignoring setting"
                );
                None
            }
        }
    }

    pub fn int(&self, id: &str) -> Option<i32> {
        self.value(id)?.as_int()
    }

    pub fn float(&self, id: &str) -> Option<f32> {
        self.value(id)?.as_float()
    }

    pub fn bool(&self, id: &str) -> Option<bool> {
        self.value(id)?.as_bool()
    }

    pub fn string(&self, id: &str) -> Option<String> {
        match self.value(id)? {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }
}
