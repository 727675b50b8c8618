//! Data models for the plugsync adapter.
//!
//! This module contains the core data structures:
//! - [`PluginEntry`] / [`PluginMap`]: the in-memory plugin collection the
//!   adapter keeps synchronized with disk
//! - [`PluginFormat`]: the two on-disk layouts (`Original`, `AlternateOrdered`)
//! - [`GameSpec`] / [`GameDiscovery`]: per-game path/format/native-set
//!   resolution, with [`StaticDiscovery`] as a built-in registry
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: `PluginEntry` round-trips through the JSON store contract
//! - **Cloneable**: the map is snapshotted freely; shared access is mediated by
//!   [`PluginStore`](crate::store::PluginStore)
//! - **Passive**: all mutation goes through the store contract, never through
//!   the models directly

pub mod entry;
pub mod game;

pub use entry::{PluginEntry, PluginMap, entries_by_load_order};
pub use game::{GameDiscovery, GameSpec, PluginFormat, StaticDiscovery};
