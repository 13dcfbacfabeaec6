//! Health classification
//!
//! Pure derivation of display attributes from an observation, the
//! chain's best height, and the clock. No state, no side effects; the
//! caller guarantees the best height was updated before classifying.

use super::matrix::Observation;
use crate::feed::proto::Height;

/// An observation newer than this is emphasized as just-updated.
pub static FRESH_SECS: u64 = 25;

/// The backend re-checks every source at least this often, so an
/// observation is never flagged stale before this much time has passed,
/// even on fast chains.
pub static MIN_RECHECK_SECS: u64 = 60;

/// Display/health attributes for one (source, chain) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// No observation for this pair yet. A normal display state.
    Missing,
    Known {
        /// Height relative to the chain's best; never positive when the
        /// best height was updated before classification.
        diff: i64,
        /// Within one block of the best height.
        at_head: bool,
        /// Seconds since the observed value last changed (not since the
        /// last re-check).
        staleness_secs: u64,
        fresh: bool,
        stale: bool,
    },
}

impl Health {
    pub fn is_missing(&self) -> bool {
        matches!(self, Health::Missing)
    }
}

pub fn classify(
    observation: Option<&Observation>,
    best_height: Height,
    block_time_secs: u32,
    now: u64,
) -> Health {
    let observation = match observation {
        Some(observation) => observation,
        None => return Health::Missing,
    };

    let diff = observation.height as i64 - best_height as i64;
    let staleness_secs = now.saturating_sub(observation.first_seen_ts);
    let stale_after = (block_time_secs as u64 * 3).max(MIN_RECHECK_SECS);

    Health::Known {
        diff,
        at_head: diff >= -1,
        staleness_secs,
        fresh: staleness_secs < FRESH_SECS,
        stale: staleness_secs > stale_after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(height: Height, first_seen_ts: u64) -> Observation {
        Observation {
            height,
            hash: "aa".to_string(),
            first_seen_ts,
            last_checked_ts: first_seen_ts,
        }
    }

    #[test]
    fn missing_when_no_observation() {
        assert!(classify(None, 100, 600, 0).is_missing());
    }

    #[test]
    fn at_head_tolerates_one_block() {
        let best = 100;
        for (height, expect_at_head) in [(100, true), (99, true), (98, false), (80, false)] {
            match classify(Some(&obs(height, 0)), best, 600, 0) {
                Health::Known { diff, at_head, .. } => {
                    assert_eq!(diff, height as i64 - best as i64);
                    assert_eq!(at_head, expect_at_head, "height {}", height);
                }
                Health::Missing => panic!("observation present"),
            }
        }
    }

    #[test]
    fn fresh_boundary() {
        let classified = |age| classify(Some(&obs(1, 1000)), 1, 600, 1000 + age);
        for (age, expect_fresh) in [(0, true), (24, true), (25, false), (26, false)] {
            match classified(age) {
                Health::Known { fresh, staleness_secs, .. } => {
                    assert_eq!(staleness_secs, age);
                    assert_eq!(fresh, expect_fresh, "age {}", age);
                }
                Health::Missing => panic!("observation present"),
            }
        }
    }

    #[test]
    fn stale_threshold_scales_with_block_time() {
        // 600s blocks: stale only after 1800s.
        let slow = |age| classify(Some(&obs(1, 0)), 1, 600, age);
        assert!(matches!(slow(1800), Health::Known { stale: false, .. }));
        assert!(matches!(slow(1801), Health::Known { stale: true, .. }));

        // 5s blocks: the 60s re-check floor applies.
        let fast = |age| classify(Some(&obs(1, 0)), 1, 5, age);
        assert!(matches!(fast(60), Health::Known { stale: false, .. }));
        assert!(matches!(fast(61), Health::Known { stale: true, .. }));
    }

    #[test]
    fn staleness_counts_from_first_seen() {
        // A value re-checked recently but unchanged for a long time is
        // still stale: staleness follows first_seen_ts.
        let mut observation = obs(1, 0);
        observation.last_checked_ts = 5000;
        assert!(matches!(
            classify(Some(&observation), 1, 600, 5000),
            Health::Known { stale: true, .. }
        ));
    }

    #[test]
    fn clock_skew_saturates() {
        match classify(Some(&obs(1, 2000)), 1, 600, 1000) {
            Health::Known { staleness_secs, fresh, .. } => {
                assert_eq!(staleness_secs, 0);
                assert!(fresh);
            }
            Health::Missing => panic!("observation present"),
        }
    }
}
