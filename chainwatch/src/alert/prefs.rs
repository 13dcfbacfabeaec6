//! Alert preferences
//!
//! Which (source, chain) pairs should ring an alert on change. The set
//! survives restarts through a `PrefStore`; the store contract is
//! forgiving on purpose: absent or corrupt storage reads as an empty
//! set, and write failures are swallowed. Preferences are never worth
//! failing the dashboard over.
//!
//! Keys referring to sources or chains that later disappear from the
//! catalog are harmless: they miss every lookup and are kept across
//! saves rather than purged.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

/// Separator inside a persisted preference key. Source ids never
/// contain it.
pub static PREF_KEY_DELIMITER: char = ':';

/// Persistence behind the preference set. Both methods are best-effort
/// and must never fail toward the caller.
pub trait PrefStore {
    /// Load the persisted mapping. Missing or unparsable storage yields
    /// an empty mapping.
    fn get(&self) -> HashMap<String, bool>;
    /// Persist the full mapping, replacing whatever was stored.
    fn set(&self, prefs: &HashMap<String, bool>);
}

impl<S: PrefStore + ?Sized> PrefStore for &S {
    fn get(&self) -> HashMap<String, bool> {
        (**self).get()
    }

    fn set(&self, prefs: &HashMap<String, bool>) {
        (**self).set(prefs)
    }
}

/// Preference storage in a JSON file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> FileStore {
        FileStore { path: path.into() }
    }

    /// `$HOME/.chainwatch-alerts.json`, or the current directory when
    /// HOME is unset.
    pub fn default_path() -> PathBuf {
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(".chainwatch-alerts.json"),
            None => PathBuf::from(".chainwatch-alerts.json"),
        }
    }
}

impl PrefStore for FileStore {
    fn get(&self) -> HashMap<String, bool> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(_) => return HashMap::new(),
        };
        serde_json::from_str(&data).unwrap_or_default()
    }

    fn set(&self, prefs: &HashMap<String, bool>) {
        if let Ok(data) = serde_json::to_string_pretty(prefs) {
            let _ = fs::write(&self.path, data);
        }
    }
}

/// In-memory store, for tests and ephemeral runs.
#[derive(Default)]
pub struct MemStore {
    prefs: RefCell<HashMap<String, bool>>,
}

impl MemStore {
    pub fn new() -> MemStore {
        MemStore::default()
    }
}

impl PrefStore for MemStore {
    fn get(&self) -> HashMap<String, bool> {
        self.prefs.borrow().clone()
    }

    fn set(&self, prefs: &HashMap<String, bool>) {
        *self.prefs.borrow_mut() = prefs.clone();
    }
}

/// The set of alert-enabled pairs, backed by a store. Every toggle is
/// persisted immediately.
pub struct PreferenceSet<S> {
    store: S,
    enabled: HashSet<String>,
}

fn key(source: &str, chain: &str) -> String {
    format!("{}{}{}", source, PREF_KEY_DELIMITER, chain)
}

impl<S: PrefStore> PreferenceSet<S> {
    /// Load the persisted set. Keys are kept whatever their stored
    /// value; presence is the marker.
    pub fn load(store: S) -> PreferenceSet<S> {
        let enabled = store.get().into_keys().collect();
        PreferenceSet { store, enabled }
    }

    pub fn contains(&self, source: &str, chain: &str) -> bool {
        self.enabled.contains(&key(source, chain))
    }

    /// Flip the pair and persist. Returns whether alerts are now
    /// enabled for it.
    pub fn toggle(&mut self, source: &str, chain: &str) -> bool {
        let key = key(source, chain);
        let now_enabled = if self.enabled.remove(&key) {
            false
        } else {
            self.enabled.insert(key);
            true
        };
        self.save();
        now_enabled
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    fn save(&self) {
        let prefs = self
            .enabled
            .iter()
            .map(|key| (key.clone(), true))
            .collect();
        self.store.set(&prefs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_and_persists() {
        let mut set = PreferenceSet::load(MemStore::new());
        assert!(!set.contains("a", "x"));

        assert!(set.toggle("a", "x"));
        assert!(set.contains("a", "x"));
        assert!(!set.contains("a", "y"));

        assert!(!set.toggle("a", "x"));
        assert!(!set.contains("a", "x"));
    }

    #[test]
    fn survives_reload_from_same_store() {
        let store = MemStore::new();
        {
            let mut set = PreferenceSet::load(&store);
            set.toggle("a", "x");
            set.toggle("b", "x");
            set.toggle("a", "x");
        }
        let reloaded = PreferenceSet::load(&store);
        assert!(!reloaded.contains("a", "x"));
        assert!(reloaded.contains("b", "x"));
    }

    #[test]
    fn orphaned_keys_are_kept_across_saves() {
        let store = MemStore::new();
        store.set(&HashMap::from([("gone:chain".to_string(), true)]));

        let mut set = PreferenceSet::load(&store);
        set.toggle("a", "x");

        let persisted = store.get();
        assert!(persisted.contains_key("gone:chain"));
        assert!(persisted.contains_key("a:x"));
    }

    #[test]
    fn file_store_tolerates_missing_and_corrupt_files() {
        let dir = std::env::temp_dir();
        let missing = FileStore::new(dir.join(format!("cw-prefs-none-{}.json", std::process::id())));
        assert!(missing.get().is_empty());

        let corrupt_path = dir.join(format!("cw-prefs-bad-{}.json", std::process::id()));
        fs::write(&corrupt_path, "{not json").unwrap();
        let corrupt = FileStore::new(&corrupt_path);
        assert!(corrupt.get().is_empty());
        let _ = fs::remove_file(&corrupt_path);
    }

    #[test]
    fn file_store_round_trip() {
        let path = std::env::temp_dir().join(format!("cw-prefs-rt-{}.json", std::process::id()));
        {
            let mut set = PreferenceSet::load(FileStore::new(&path));
            set.toggle("a", "x");
        }
        // Simulated restart: a fresh set loaded from the same path.
        let reloaded = PreferenceSet::load(FileStore::new(&path));
        assert!(reloaded.contains("a", "x"));
        let _ = fs::remove_file(&path);
    }
}
