//! Key-value access to host configuration.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{AcquisitionError, AcquisitionResult};

/// Read-only configuration lookup by dotted key (e.g. `java.path`).
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
}

/// Configuration backed by a JSON object.
///
/// Keys are looked up verbatim first (`{"java.path": ...}`), then as a path
/// through nested objects (`{"java": {"path": ...}}`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonConfigStore {
    values: Map<String, Value>,
}

impl JsonConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON value; anything but an object yields an empty store.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            other => {
                tracing::warn!(value = %other, "Settings must be a JSON object, ignoring");
                Self::default()
            }
        }
    }

    /// Loads a JSON settings file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `Config` if it is not valid JSON.
    pub fn from_file(path: &Path) -> AcquisitionResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AcquisitionError::io(path, e))?;
        let value: Value = serde_json::from_str(&text).map_err(|e| {
            AcquisitionError::Config(format!("Invalid settings file {}: {}", path.display(), e))
        })?;
        Ok(Self::from_value(value))
    }

    /// Sets a top-level key.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }
}

impl ConfigStore for JsonConfigStore {
    fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.values.get(key) {
            return Some(value.clone());
        }

        let mut parts = key.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current.clone())
    }
}
