mod notify;
mod prefs;

pub use notify::{should_alert, Bell, Notifier, Silent};
pub use prefs::{FileStore, MemStore, PrefStore, PreferenceSet, PREF_KEY_DELIMITER};

#[cfg(test)]
pub(crate) use notify::testutil;
