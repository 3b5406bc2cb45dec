//! Configuration for dependency acquisition.
//!
//! Settings are read through the [`ConfigStore`] trait so hosts can back them
//! with whatever settings system they have; [`JsonConfigStore`] covers files.

mod settings;
mod store;

pub use settings::{
    Enabled, Settings, DEFAULT_LANGUAGE_IDS, KEY_ENABLED, KEY_INITIAL_HEAP_SIZE, KEY_JAVA_PATH,
    KEY_LTEX_LS_PATH, KEY_MAXIMUM_HEAP_SIZE,
};
pub use store::{ConfigStore, JsonConfigStore};
