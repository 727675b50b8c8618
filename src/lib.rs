// plugsync - Load order persistence adapter for Bethesda game plugin files
//
// Keeps an in-memory ordered collection of plugin entries synchronized with
// the plugin list files on disk, in either of the two on-disk formats the
// supported engines use. Consumers talk to it through the key/value store
// contract in `store`; everything else is internal machinery.

pub mod config;
pub mod format;
pub mod logging;
pub mod models;
pub mod services;
pub mod store;

// Re-export commonly used types for convenience
pub use config::SyncConfig;
pub use models::{GameDiscovery, GameSpec, PluginEntry, PluginFormat, PluginMap, StaticDiscovery};
pub use services::{ReloadState, WatchError};
pub use store::{PluginStore, STORE_KEY, StoreError, SyncEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
