//! In-memory representation of plugin entries.
//!
//! The plugin map is the single source of truth for reads and writes while a
//! game is bound; the on-disk files only ever hold snapshots of it. An
//! [`IndexMap`] keeps insertion order, which matters because `load_order`
//! assignment follows the order names are discovered.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One plugin's activation state and position in the load sequence.
///
/// Serialized over the store contract as `{"enabled": ..., "loadOrder": ...}`.
/// Unknown fields are rejected so malformed payloads fail at the boundary
/// instead of deep inside a write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginEntry {
    /// Whether the plugin is active in the game.
    pub enabled: bool,

    /// Position in the load sequence. Unique within a map; monotonically
    /// assigned, not necessarily contiguous after removals.
    #[serde(rename = "loadOrder")]
    pub load_order: usize,
}

/// Mapping from plugin name to its entry, in discovery order.
///
/// Keys are case-sensitive; comparison against the native plugin set is
/// case-insensitive and happens in the format adapter.
pub type PluginMap = IndexMap<String, PluginEntry>;

/// Return the map's entries sorted ascending by `load_order`.
///
/// Rendering walks this ordering so file line order always reflects the load
/// sequence, even if the map's insertion order has drifted from it.
pub fn entries_by_load_order(map: &PluginMap) -> Vec<(&str, &PluginEntry)> {
    let mut entries: Vec<(&str, &PluginEntry)> =
        map.iter().map(|(name, entry)| (name.as_str(), entry)).collect();
    entries.sort_by_key(|(_, entry)| entry.load_order);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_json_shape() {
        let entry = PluginEntry {
            enabled: true,
            load_order: 3,
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"enabled":true,"loadOrder":3}"#);

        let back: PluginEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_entry_rejects_unknown_fields() {
        let result: Result<PluginEntry, _> =
            serde_json::from_str(r#"{"enabled":true,"loadOrder":0,"extra":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_entries_by_load_order() {
        let mut map = PluginMap::new();
        map.insert(
            "B.esp".to_string(),
            PluginEntry {
                enabled: false,
                load_order: 1,
            },
        );
        map.insert(
            "A.esp".to_string(),
            PluginEntry {
                enabled: true,
                load_order: 0,
            },
        );
        map.insert(
            "C.esp".to_string(),
            PluginEntry {
                enabled: true,
                load_order: 2,
            },
        );

        let ordered: Vec<&str> = entries_by_load_order(&map)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(ordered, vec!["A.esp", "B.esp", "C.esp"]);
    }
}
