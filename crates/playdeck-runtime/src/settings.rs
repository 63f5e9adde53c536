//! Settings schema: typed configuration descriptors.
//!
//! A plugin declares its configuration once, as a static table of
//! [`SettingDescriptor`]s grouped in a [`SettingsSchema`]. Hosts render UI from
//! the table and validate stored values against it; plugins read values back
//! through the same table so nothing is parsed outside the schema.
//!
//! ```
//! use playdeck_runtime::settings::{IntChoice, SettingDescriptor, SettingsSchema};
//!
//! static RATES: [IntChoice; 3] = [
//!     IntChoice::new("Default", 0),
//!     IntChoice::new("44100", 44100),
//!     IntChoice::new("48000", 48000),
//! ];
//!
//! static DESCRIPTORS: [SettingDescriptor; 1] = [SettingDescriptor::int_choice(
//!     "SampleRate",
//!     "Sample rate",
//!     "Default uses the output device rate",
//!     0,
//!     &RATES,
//! )];
//!
//! let schema = SettingsSchema::new("example", &DESCRIPTORS);
//! assert!(schema.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Outcome of a settings registration or lookup that did not produce a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// No value is stored for the id, or the id is not declared.
    #[error("setting not found")]
    NotFound,

    /// Registration collided with an identifier already registered.
    #[error("duplicated setting id: {0}")]
    DuplicatedId(String),

    /// A value exists but has a different type than requested.
    #[error("wrong type: expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },

    /// The owner already registered a schema.
    #[error("settings already registered for owner: {0}")]
    AlreadyRegistered(String),

    /// The host refused the operation for another reason.
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Result type for settings accessors.
pub type SettingsResult<T> = std::result::Result<T, SettingsError>;

/// Schema authoring mistakes caught at registration time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema owner name is empty")]
    EmptyOwner,

    #[error("setting id is empty")]
    EmptyId,

    #[error("duplicated setting id: {0}")]
    DuplicatedId(String),

    #[error("{id}: range start is greater than range end")]
    InvertedRange { id: String },

    #[error("{id}: range bounds must be finite")]
    NonFiniteBound { id: String },

    #[error("{id}: default value lies outside its range")]
    DefaultOutOfRange { id: String },

    #[error("{id}: enumeration has no values")]
    EmptyChoices { id: String },

    #[error("{id}: enumeration value listed more than once")]
    DuplicateChoice { id: String },

    #[error("{id}: default value is not one of the enumerated values")]
    DefaultNotAChoice { id: String },
}

/// A labelled integer value in an enumeration descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntChoice {
    pub label: &'static str,
    pub value: i32,
}

impl IntChoice {
    pub const fn new(label: &'static str, value: i32) -> Self {
        Self { label, value }
    }
}

/// A labelled string value in an enumeration descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StringChoice {
    pub label: &'static str,
    pub value: &'static str,
}

impl StringChoice {
    pub const fn new(label: &'static str, value: &'static str) -> Self {
        Self { label, value }
    }
}

/// The typed part of a descriptor.
///
/// By convention the first entry of an enumeration means "use the host or
/// engine default" (for example `0` for sample rate).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettingKind {
    Bool {
        default: bool,
    },
    IntRange {
        default: i32,
        start: i32,
        end: i32,
    },
    IntChoices {
        default: i32,
        choices: &'static [IntChoice],
    },
    FloatRange {
        default: f32,
        start: f32,
        end: f32,
    },
    StringChoices {
        default: &'static str,
        choices: &'static [StringChoice],
    },
}

impl SettingKind {
    /// Name of the value type this kind stores.
    pub fn value_type(&self) -> &'static str {
        match self {
            SettingKind::Bool { .. } => "bool",
            SettingKind::IntRange { .. } | SettingKind::IntChoices { .. } => "int",
            SettingKind::FloatRange { .. } => "float",
            SettingKind::StringChoices { .. } => "string",
        }
    }
}

/// A self-describing configuration item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SettingDescriptor {
    /// Stable identifier, unique within the schema.
    pub id: &'static str,

    /// Display name for host UI.
    pub name: &'static str,

    /// Longer description for host UI.
    pub description: &'static str,

    #[serde(flatten)]
    pub kind: SettingKind,
}

impl SettingDescriptor {
    pub const fn bool(
        id: &'static str,
        name: &'static str,
        description: &'static str,
        default: bool,
    ) -> Self {
        Self {
            id,
            name,
            description,
            kind: SettingKind::Bool { default },
        }
    }

    pub const fn int_range(
        id: &'static str,
        name: &'static str,
        description: &'static str,
        default: i32,
        start: i32,
        end: i32,
    ) -> Self {
        Self {
            id,
            name,
            description,
            kind: SettingKind::IntRange {
                default,
                start,
                end,
            },
        }
    }

    pub const fn int_choice(
        id: &'static str,
        name: &'static str,
        description: &'static str,
        default: i32,
        choices: &'static [IntChoice],
    ) -> Self {
        Self {
            id,
            name,
            description,
            kind: SettingKind::IntChoices { default, choices },
        }
    }

    pub const fn float_range(
        id: &'static str,
        name: &'static str,
        description: &'static str,
        default: f32,
        start: f32,
        end: f32,
    ) -> Self {
        Self {
            id,
            name,
            description,
            kind: SettingKind::FloatRange {
                default,
                start,
                end,
            },
        }
    }

    pub const fn string_choice(
        id: &'static str,
        name: &'static str,
        description: &'static str,
        default: &'static str,
        choices: &'static [StringChoice],
    ) -> Self {
        Self {
            id,
            name,
            description,
            kind: SettingKind::StringChoices { default, choices },
        }
    }

    /// The declared default as a value.
    pub fn default_value(&self) -> SettingValue {
        match self.kind {
            SettingKind::Bool { default } => SettingValue::Bool(default),
            SettingKind::IntRange { default, .. } | SettingKind::IntChoices { default, .. } => {
                SettingValue::Int(default)
            }
            SettingKind::FloatRange { default, .. } => SettingValue::Float(default),
            SettingKind::StringChoices { default, .. } => SettingValue::String(default.to_string()),
        }
    }

    /// Check the descriptor's own invariants.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let id = || self.id.to_string();

        if self.id.is_empty() {
            return Err(SchemaError::EmptyId);
        }

        match self.kind {
            SettingKind::Bool { .. } => Ok(()),
            SettingKind::IntRange {
                default,
                start,
                end,
            } => {
                if start > end {
                    return Err(SchemaError::InvertedRange { id: id() });
                }
                if !(start..=end).contains(&default) {
                    return Err(SchemaError::DefaultOutOfRange { id: id() });
                }
                Ok(())
            }
            SettingKind::FloatRange {
                default,
                start,
                end,
            } => {
                if !start.is_finite() || !end.is_finite() || !default.is_finite() {
                    return Err(SchemaError::NonFiniteBound { id: id() });
                }
                if start > end {
                    return Err(SchemaError::InvertedRange { id: id() });
                }
                if !(start..=end).contains(&default) {
                    return Err(SchemaError::DefaultOutOfRange { id: id() });
                }
                Ok(())
            }
            SettingKind::IntChoices { default, choices } => {
                if choices.is_empty() {
                    return Err(SchemaError::EmptyChoices { id: id() });
                }
                let mut seen = HashSet::new();
                if !choices.iter().all(|c| seen.insert(c.value)) {
                    return Err(SchemaError::DuplicateChoice { id: id() });
                }
                if !seen.contains(&default) {
                    return Err(SchemaError::DefaultNotAChoice { id: id() });
                }
                Ok(())
            }
            SettingKind::StringChoices { default, choices } => {
                if choices.is_empty() {
                    return Err(SchemaError::EmptyChoices { id: id() });
                }
                let mut seen = HashSet::new();
                if !choices.iter().all(|c| seen.insert(c.value)) {
                    return Err(SchemaError::DuplicateChoice { id: id() });
                }
                if !seen.contains(default) {
                    return Err(SchemaError::DefaultNotAChoice { id: id() });
                }
                Ok(())
            }
        }
    }

    /// Bring a stored value into this descriptor's domain.
    ///
    /// Range values are clamped into `[start, end]`. Enumeration values that are
    /// not listed are rejected. Integers are accepted where a float is declared.
    pub fn conform(&self, value: &SettingValue) -> SettingsResult<SettingValue> {
        let wrong_type = || SettingsError::WrongType {
            expected: self.kind.value_type(),
            found: value.type_name(),
        };

        match self.kind {
            SettingKind::Bool { .. } => value
                .as_bool()
                .map(SettingValue::Bool)
                .ok_or_else(wrong_type),
            SettingKind::IntRange { start, end, .. } => {
                let v = value.as_int().ok_or_else(wrong_type)?;
                let clamped = v.max(start).min(end);
                if clamped != v {
                    tracing::debug!(
                        id = self.id,
                        value = v,
                        clamped,
                        "Clamped setting into range"
                    );
                }
                Ok(SettingValue::Int(clamped))
            }
            SettingKind::FloatRange { start, end, .. } => {
                let v = value.as_float().ok_or_else(wrong_type)?;
                if v.is_nan() {
                    return Err(SettingsError::Rejected(format!(
                        "{}: NaN is not a valid value",
                        self.id
                    )));
                }
                let clamped = v.max(start).min(end);
                if clamped != v {
                    tracing::debug!(
                        id = self.id,
                        value = v,
                        clamped,
                        "Clamped setting into range"
                    );
                }
                Ok(SettingValue::Float(clamped))
            }
            SettingKind::IntChoices { choices, .. } => {
                let v = value.as_int().ok_or_else(wrong_type)?;
                if choices.iter().any(|c| c.value == v) {
                    Ok(SettingValue::Int(v))
                } else {
                    Err(SettingsError::Rejected(format!(
                        "{}: {} is not an allowed value",
                        self.id, v
                    )))
                }
            }
            SettingKind::StringChoices { choices, .. } => {
                let v = value.as_str().ok_or_else(wrong_type)?;
                if choices.iter().any(|c| c.value == v) {
                    Ok(SettingValue::String(v.to_string()))
                } else {
                    Err(SettingsError::Rejected(format!(
                        "{}: '{}' is not an allowed value",
                        self.id, v
                    )))
                }
            }
        }
    }
}

/// A concrete setting value held by a settings store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
}

impl SettingValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "bool",
            SettingValue::Int(_) => "int",
            SettingValue::Float(_) => "float",
            SettingValue::String(_) => "string",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and integers widened to float.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            SettingValue::Float(f) => Some(*f),
            SettingValue::Int(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{b}"),
            SettingValue::Int(i) => write!(f, "{i}"),
            SettingValue::Float(v) => write!(f, "{v}"),
            SettingValue::String(s) => f.write_str(s),
        }
    }
}

/// A plugin's complete, immutable settings table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SettingsSchema {
    /// Name the table is registered under (normally the plugin name).
    pub owner: &'static str,

    pub descriptors: &'static [SettingDescriptor],
}

impl SettingsSchema {
    pub const fn new(owner: &'static str, descriptors: &'static [SettingDescriptor]) -> Self {
        Self { owner, descriptors }
    }

    /// Validate every descriptor and check id uniqueness.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.owner.is_empty() {
            return Err(SchemaError::EmptyOwner);
        }

        let mut ids = HashSet::new();
        for descriptor in self.descriptors {
            descriptor.validate()?;
            if !ids.insert(descriptor.id) {
                return Err(SchemaError::DuplicatedId(descriptor.id.to_string()));
            }
        }

        Ok(())
    }

    /// Look up a descriptor by id.
    pub fn get(&self, id: &str) -> Option<&'static SettingDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static SettingDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Render the schema as JSON for host UI.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
