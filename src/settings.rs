//! Settings value type.
//!
//! [`Settings`] is an ordered mapping of string keys to scalar values
//! (string, number, bool, null). The authoritative copy lives in a
//! [`SettingsStore`](crate::storage::SettingsStore); everything in this
//! crate works on clones.
//!
//! # Example
//!
//! ```
//! use settings_sync::Settings;
//! use serde_json::json;
//!
//! let mut settings = Settings::from_value(json!({"menu_background": "#23282d"})).unwrap();
//! settings.merge(&Settings::from_value(json!({"menu_text_color": "#ffffff"})).unwrap());
//! assert_eq!(settings.len(), 2);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;

/// Deserializing goes through [`Settings::from_value`], so nested values
/// are rejected there too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Settings(Map<String, Value>);

impl Settings {
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build settings from a JSON value, rejecting anything that is not a
    /// flat object of scalars. Every problem is reported, not just the first.
    pub fn from_value(value: Value) -> Result<Self, SyncError> {
        let problems = structural_problems(&value);
        if !problems.is_empty() {
            return Err(SyncError::validation(problems));
        }
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(SyncError::validation(vec!["settings must be an object".into()])),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert a scalar value. Nested arrays/objects are rejected.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<Option<Value>, SyncError> {
        let key = key.into();
        if !is_scalar(&value) {
            return Err(SyncError::validation(vec![format!("{key}: value must be a scalar")]));
        }
        Ok(self.0.insert(key, value))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Apply a partial patch: every key in `patch` overwrites the local value.
    pub fn merge(&mut self, patch: &Settings) {
        for (k, v) in &patch.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// String-valued entries whose key names a color.
    pub fn color_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().filter_map(|(k, v)| match v {
            Value::String(s) if is_color_key(k) => Some((k.as_str(), s.as_str())),
            _ => None,
        })
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl TryFrom<Value> for Settings {
    type Error = SyncError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Settings> for Value {
    fn from(settings: Settings) -> Self {
        settings.into_value()
    }
}

impl FromIterator<(String, Value)> for Settings {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|(_, v)| is_scalar(v)).collect())
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn is_color_key(key: &str) -> bool {
    key.ends_with("_color") || key.ends_with("_background") || key.ends_with("_bg")
}

/// Structural problems with a settings document. Empty means well-formed.
#[must_use]
pub fn structural_problems(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !is_scalar(v))
            .map(|(k, _)| format!("{k}: value must be a scalar"))
            .collect(),
        Value::Null => vec!["settings are missing".into()],
        other => vec![format!("settings must be an object, got {}", type_name(other))],
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
