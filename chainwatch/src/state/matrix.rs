//! State matrix
//!
//! The latest observation for every (source, chain) pair, plus the best
//! height seen per chain this session. Updates are applied one at a time
//! by a single owner; the `changed`/`first_seen_ts` semantics below are
//! only well-defined under that ordering.

use std::collections::{HashMap, HashSet};

use crate::feed::proto::{BlockHash, ChainId, Height, SourceId};

use super::registry::Registry;

/// Latest known state for one (source, chain) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub height: Height,
    pub hash: BlockHash,
    /// When this height/hash value was first reported. Carried over
    /// unchanged across re-deliveries of the same value.
    pub first_seen_ts: u64,
    /// When the pair was last reported, changed or not.
    pub last_checked_ts: u64,
}

/// Before/after comparison produced by applying one update.
#[derive(Debug, Clone)]
pub struct Delta {
    pub previous: Option<Observation>,
    pub current: Observation,
    /// True when the pair had no observation, or height or hash differs
    /// from the previous one.
    pub changed: bool,
    /// True when this update raised the chain's best height.
    pub best_height_changed: bool,
}

/// An update naming an id the current registry does not know. The frame
/// is stale or out of order relative to the last init; nothing changes.
#[derive(Debug)]
pub enum ApplyError {
    UnknownSource(SourceId),
    UnknownChain(ChainId),
}

#[derive(Default)]
pub struct StateMatrix {
    observations: HashMap<(SourceId, ChainId), Observation>,
    best_height: HashMap<ChainId, Height>,
    sources: HashSet<SourceId>,
}

impl StateMatrix {
    pub fn new() -> StateMatrix {
        StateMatrix::default()
    }

    /// Clear everything and size the matrix to the given registry. Every
    /// registry chain starts at best height 0.
    pub fn reset(&mut self, registry: &Registry) {
        self.observations.clear();
        self.best_height = registry
            .chains()
            .iter()
            .map(|chain| (chain.id.clone(), 0))
            .collect();
        self.sources = registry
            .sources()
            .iter()
            .map(|source| source.id.clone())
            .collect();
    }

    /// Apply one update. The best height is raised before the delta is
    /// returned, so downstream classification never sees a pair ahead of
    /// its chain's best.
    pub fn apply(
        &mut self,
        source: &str,
        chain: &str,
        height: Height,
        hash: &str,
        observed_at: u64,
    ) -> Result<Delta, ApplyError> {
        if !self.sources.contains(source) {
            return Err(ApplyError::UnknownSource(source.to_string()));
        }
        let best = match self.best_height.get_mut(chain) {
            Some(best) => best,
            None => return Err(ApplyError::UnknownChain(chain.to_string())),
        };

        let mut best_height_changed = false;
        if height > *best {
            *best = height;
            best_height_changed = true;
        }

        let key = (source.to_string(), chain.to_string());
        let previous = self.observations.get(&key).cloned();
        let changed = match &previous {
            None => true,
            Some(prev) => prev.height != height || prev.hash != hash,
        };
        let first_seen_ts = match (&previous, changed) {
            (Some(prev), false) => prev.first_seen_ts,
            _ => observed_at,
        };
        let current = Observation {
            height,
            hash: hash.to_string(),
            first_seen_ts,
            last_checked_ts: observed_at,
        };
        self.observations.insert(key, current.clone());

        Ok(Delta {
            previous,
            current,
            changed,
            best_height_changed,
        })
    }

    pub fn observation(&self, source: &str, chain: &str) -> Option<&Observation> {
        self.observations
            .get(&(source.to_string(), chain.to_string()))
    }

    /// Best height seen for the chain this session. None for a chain the
    /// current registry does not track.
    pub fn best_height(&self, chain: &str) -> Option<Height> {
        self.best_height.get(chain).copied()
    }

    pub fn best_heights(&self) -> &HashMap<ChainId, Height> {
        &self.best_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testutil::{chain, source};

    fn matrix(sources: &[&str], chains: &[&str]) -> StateMatrix {
        let mut registry = Registry::new();
        registry.reset(
            sources.iter().map(|id| source(id)).collect(),
            chains.iter().map(|id| chain(id, 600)).collect(),
        );
        let mut matrix = StateMatrix::new();
        matrix.reset(&registry);
        matrix
    }

    #[test]
    fn best_height_is_max_and_monotonic() {
        let mut m = matrix(&["a", "b"], &["x"]);
        assert_eq!(m.best_height("x"), Some(0));

        let heights = [100, 99, 105, 101, 105];
        let mut max = 0;
        for (i, h) in heights.iter().enumerate() {
            let delta = m.apply("a", "x", *h, &format!("h{}", i), i as u64).unwrap();
            assert_eq!(delta.best_height_changed, *h > max);
            max = max.max(*h);
            assert_eq!(m.best_height("x"), Some(max));
        }
    }

    #[test]
    fn redelivery_keeps_first_seen_and_advances_last_checked() {
        let mut m = matrix(&["a"], &["x"]);
        let first = m.apply("a", "x", 10, "aa", 1000).unwrap();
        assert!(first.changed);
        assert_eq!(first.current.first_seen_ts, 1000);

        let again = m.apply("a", "x", 10, "aa", 1060).unwrap();
        assert!(!again.changed);
        assert_eq!(again.current.first_seen_ts, 1000);
        assert_eq!(again.current.last_checked_ts, 1060);
    }

    #[test]
    fn change_means_height_or_hash_differs() {
        let mut m = matrix(&["a"], &["x"]);
        m.apply("a", "x", 10, "aa", 1).unwrap();

        // Same height, new hash: a change (e.g. the source switched to a
        // different block at the same height).
        let rehash = m.apply("a", "x", 10, "bb", 2).unwrap();
        assert!(rehash.changed);
        assert_eq!(rehash.current.first_seen_ts, 2);

        // New height, same hash string: also a change.
        let reheight = m.apply("a", "x", 11, "bb", 3).unwrap();
        assert!(reheight.changed);
        assert_eq!(reheight.current.first_seen_ts, 3);
    }

    #[test]
    fn unknown_ids_are_rejected_without_mutation() {
        let mut m = matrix(&["a"], &["x"]);
        m.apply("a", "x", 10, "aa", 1).unwrap();

        assert!(matches!(
            m.apply("ghost", "x", 99, "zz", 2),
            Err(ApplyError::UnknownSource(_))
        ));
        assert!(matches!(
            m.apply("a", "ghost", 99, "zz", 2),
            Err(ApplyError::UnknownChain(_))
        ));
        assert_eq!(m.observation("a", "x").unwrap().height, 10);
        assert_eq!(m.best_height("x"), Some(10));
        assert!(m.observation("ghost", "x").is_none());
    }

    #[test]
    fn reset_clears_observations_and_reseeds_best() {
        let mut m = matrix(&["a"], &["x"]);
        m.apply("a", "x", 10, "aa", 1).unwrap();

        let mut registry = Registry::new();
        registry.reset(vec![source("a")], vec![chain("x", 600), chain("y", 15)]);
        m.reset(&registry);

        assert!(m.observation("a", "x").is_none());
        assert_eq!(m.best_height("x"), Some(0));
        assert_eq!(m.best_height("y"), Some(0));
        assert_eq!(m.best_height("gone"), None);
    }
}
