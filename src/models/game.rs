//! Per-game knowledge: on-disk format variant, file locations and the native
//! plugin set that is never written to or read from the managed files.
//!
//! Path/format/native-set resolution is supplied through the [`GameDiscovery`]
//! trait so embedders can plug in their own game registry. A built-in registry
//! covering the common Bethesda titles is provided for convenience.

use std::collections::{HashMap, HashSet};

use camino::{Utf8Path, Utf8PathBuf};

/// The two mutually exclusive on-disk layouts for plugin state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginFormat {
    /// Two files: `loadorder.txt` (UTF-8) lists all non-native plugins in
    /// load order, `plugins.txt` (Latin-1) lists the enabled subset.
    /// Used by Oblivion through Skyrim LE.
    Original,

    /// Single authoritative `plugins.txt` (Latin-1) whose line order is the
    /// load order; a leading `*` marks a plugin enabled.
    /// Used by Skyrim SE and Fallout 4.
    AlternateOrdered,
}

impl PluginFormat {
    /// The file names this format reads and writes inside the bound directory.
    pub fn file_names(&self) -> &'static [&'static str] {
        match self {
            PluginFormat::Original => &["loadorder.txt", "plugins.txt"],
            PluginFormat::AlternateOrdered => &["plugins.txt"],
        }
    }
}

/// Everything the adapter needs to know about one game's plugin files.
#[derive(Debug, Clone)]
pub struct GameSpec {
    /// Directory holding the plugin list files.
    pub data_path: Utf8PathBuf,

    /// Which on-disk layout this game uses.
    pub format: PluginFormat,

    /// Lower-cased names of plugins shipped with the game itself. These are
    /// dropped wherever file content is produced or consumed.
    pub native_plugins: HashSet<String>,
}

impl GameSpec {
    pub fn new(data_path: impl Into<Utf8PathBuf>, format: PluginFormat) -> Self {
        Self {
            data_path: data_path.into(),
            format,
            native_plugins: HashSet::new(),
        }
    }

    /// Add native plugins, lower-casing them on the way in.
    pub fn with_native_plugins<I, S>(mut self, plugins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.native_plugins
            .extend(plugins.into_iter().map(|p| p.as_ref().to_lowercase()));
        self
    }

    /// Case-insensitive membership test against the native set.
    pub fn is_native(&self, name: &str) -> bool {
        self.native_plugins.contains(&name.to_lowercase())
    }
}

/// Resolves a game identifier to its plugin-file layout.
///
/// Implementations must be pure lookups; the store calls `resolve` once per
/// `bind` and caches the result in the active binding.
pub trait GameDiscovery: Send + Sync {
    fn resolve(&self, game_id: &str) -> Option<GameSpec>;
}

/// Map-backed [`GameDiscovery`] used by tests and simple embedders.
#[derive(Debug, Default)]
pub struct StaticDiscovery {
    games: HashMap<String, GameSpec>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a game.
    pub fn insert(&mut self, game_id: impl Into<String>, spec: GameSpec) {
        self.games.insert(game_id.into(), spec);
    }

    /// Registry of the common Bethesda titles, rooted at `root` with one
    /// subdirectory per game id (mirroring the per-game appdata layout).
    pub fn builtin(root: &Utf8Path) -> Self {
        let mut discovery = Self::new();

        for game_id in ["oblivion", "fallout3", "falloutnv", "skyrim"] {
            discovery.insert(
                game_id,
                GameSpec::new(root.join(game_id), PluginFormat::Original),
            );
        }

        discovery.insert(
            "skyrimse",
            GameSpec::new(root.join("skyrimse"), PluginFormat::AlternateOrdered)
                .with_native_plugins([
                    "Skyrim.esm",
                    "Update.esm",
                    "Dawnguard.esm",
                    "HearthFires.esm",
                    "Dragonborn.esm",
                ]),
        );

        discovery.insert(
            "fallout4",
            GameSpec::new(root.join("fallout4"), PluginFormat::AlternateOrdered)
                .with_native_plugins([
                    "Fallout4.esm",
                    "DLCRobot.esm",
                    "DLCworkshop01.esm",
                    "DLCCoast.esm",
                    "DLCworkshop02.esm",
                    "DLCworkshop03.esm",
                    "DLCNukaWorld.esm",
                    "DLCUltraHighResolution.esm",
                ]),
        );

        discovery
    }
}

impl GameDiscovery for StaticDiscovery {
    fn resolve(&self, game_id: &str) -> Option<GameSpec> {
        self.games.get(game_id).cloned()
    }
}
