//! Settings that influence acquisition and launch of ltex-ls.
//!
//! Settings are read key by key from a [`ConfigStore`]; a missing or
//! mistyped key falls back to its default.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::store::ConfigStore;

// =============================================================================
// Keys
// =============================================================================

pub const KEY_LTEX_LS_PATH: &str = "ltex-ls.path";
pub const KEY_JAVA_PATH: &str = "java.path";
pub const KEY_INITIAL_HEAP_SIZE: &str = "java.initialHeapSize";
pub const KEY_MAXIMUM_HEAP_SIZE: &str = "java.maximumHeapSize";
pub const KEY_ENABLED: &str = "enabled";

/// Language ids checked when `enabled` is `true`.
pub const DEFAULT_LANGUAGE_IDS: &[&str] = &[
    "bibtex",
    "context",
    "context.tex",
    "html",
    "latex",
    "markdown",
    "mdx",
    "typst",
    "org",
    "quarto",
    "restructuredtext",
    "rsweave",
];

// =============================================================================
// Enabled Languages
// =============================================================================

/// Either a global switch or an explicit list of language ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Enabled {
    All(bool),
    Languages(Vec<String>),
}

impl Default for Enabled {
    fn default() -> Self {
        Self::All(true)
    }
}

impl Enabled {
    /// Expands the setting into the list of language ids to check.
    pub fn language_ids(&self) -> Vec<String> {
        match self {
            Self::All(true) => DEFAULT_LANGUAGE_IDS.iter().map(|id| id.to_string()).collect(),
            Self::All(false) => Vec::new(),
            Self::Languages(ids) => ids.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.language_ids().is_empty()
    }
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Explicit ltex-ls directory; skips the bundled search when set.
    pub ltex_ls_path: Option<String>,

    /// Java home used instead of the bundled runtime.
    pub java_path: Option<String>,

    /// `-Xms` in megabytes.
    pub initial_heap_size: Option<u32>,

    /// `-Xmx` in megabytes.
    pub maximum_heap_size: Option<u32>,

    pub enabled: Enabled,
}

impl Settings {
    /// Load settings from a store, using defaults for missing values.
    pub fn load(store: &dyn ConfigStore) -> Self {
        let mut settings = Self {
            ltex_ls_path: read_key(store, KEY_LTEX_LS_PATH),
            java_path: read_key(store, KEY_JAVA_PATH),
            initial_heap_size: read_key(store, KEY_INITIAL_HEAP_SIZE),
            maximum_heap_size: read_key(store, KEY_MAXIMUM_HEAP_SIZE),
            enabled: read_key(store, KEY_ENABLED).unwrap_or_default(),
        };
        settings.validate();
        settings
    }

    /// Normalizes empty strings to `None` and clamps heap sizes.
    pub fn validate(&mut self) {
        for path in [&mut self.ltex_ls_path, &mut self.java_path] {
            if path.as_deref().map(str::trim).is_some_and(str::is_empty) {
                *path = None;
            }
        }

        for size in [&mut self.initial_heap_size, &mut self.maximum_heap_size] {
            if *size == Some(0) {
                *size = None;
            }
        }

        // A maximum below the initial size would keep the JVM from starting
        if let (Some(initial), Some(maximum)) = (self.initial_heap_size, self.maximum_heap_size) {
            if maximum < initial {
                tracing::warn!(
                    initial,
                    maximum,
                    "java.maximumHeapSize is smaller than java.initialHeapSize, raising it"
                );
                self.maximum_heap_size = Some(initial);
            }
        }
    }

    /// Value for `JAVA_OPTS`, e.g. `-Xms64m -Xmx512m`.
    pub fn java_opts(&self) -> String {
        let mut opts = Vec::new();
        if let Some(size) = self.initial_heap_size {
            opts.push(format!("-Xms{}m", size));
        }
        if let Some(size) = self.maximum_heap_size {
            opts.push(format!("-Xmx{}m", size));
        }
        opts.join(" ")
    }
}

fn read_key<T: DeserializeOwned>(store: &dyn ConfigStore, key: &str) -> Option<T> {
    let value = store.get(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring invalid setting, using default");
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonConfigStore;
    use serde_json::json;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert!(settings.ltex_ls_path.is_none());
        assert!(settings.java_path.is_none());
        assert_eq!(settings.enabled, Enabled::All(true));
        assert_eq!(settings.java_opts(), "");
    }

    #[test]
    fn test_load_from_store() {
        let store = JsonConfigStore::from_value(json!({
            "ltex-ls.path": "/opt/ltex-ls",
            "java": { "path": "/usr/lib/jvm/java-21", "maximumHeapSize": 512 },
            "java.initialHeapSize": 64,
            "enabled": ["latex", "markdown"],
        }));

        let settings = Settings::load(&store);
        assert_eq!(settings.ltex_ls_path.as_deref(), Some("/opt/ltex-ls"));
        assert_eq!(settings.java_path.as_deref(), Some("/usr/lib/jvm/java-21"));
        assert_eq!(settings.java_opts(), "-Xms64m -Xmx512m");
        assert_eq!(settings.enabled.language_ids(), vec!["latex", "markdown"]);
    }

    #[test]
    fn test_mistyped_keys_fall_back_to_defaults() {
        let store = JsonConfigStore::from_value(json!({
            "ltex-ls.path": 42,
            "java.maximumHeapSize": "lots",
            "enabled": "yes",
        }));

        let settings = Settings::load(&store);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_validate_clears_empty_paths() {
        let mut settings = Settings {
            ltex_ls_path: Some("  ".to_string()),
            java_path: Some(String::new()),
            ..Settings::default()
        };
        settings.validate();
        assert!(settings.ltex_ls_path.is_none());
        assert!(settings.java_path.is_none());
    }

    #[test]
    fn test_validate_raises_maximum_heap() {
        let mut settings = Settings {
            initial_heap_size: Some(256),
            maximum_heap_size: Some(128),
            ..Settings::default()
        };
        settings.validate();
        assert_eq!(settings.maximum_heap_size, Some(256));
        assert_eq!(settings.java_opts(), "-Xms256m -Xmx256m");
    }

    #[test]
    fn test_java_opts_single_value() {
        let settings = Settings {
            maximum_heap_size: Some(1024),
            ..Settings::default()
        };
        assert_eq!(settings.java_opts(), "-Xmx1024m");
    }

    #[test]
    fn test_enabled_language_ids() {
        assert_eq!(Enabled::All(true).language_ids().len(), DEFAULT_LANGUAGE_IDS.len());
        assert!(Enabled::All(true).language_ids().contains(&"typst".to_string()));
        assert!(!Enabled::All(false).is_enabled());
        assert!(!Enabled::Languages(Vec::new()).is_enabled());
    }

    #[test]
    fn test_enabled_deserialization() {
        let parsed: Enabled = serde_json::from_value(json!(false)).unwrap();
        assert_eq!(parsed, Enabled::All(false));
        let parsed: Enabled = serde_json::from_value(json!(["org"])).unwrap();
        assert_eq!(parsed, Enabled::Languages(vec!["org".to_string()]));
    }
}
