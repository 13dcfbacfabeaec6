//! Dashboard engine
//!
//! The context object tying the pieces together: catalog, state matrix,
//! alert preferences, notifier. One instance is owned by whoever drains
//! the feed, and frames are handed to it one at a time in receipt
//! order. Matrix mutation, the alert decision, and playback all happen
//! synchronously inside `handle_frame`, which is what keeps the
//! `changed`/best-height semantics well-defined.

use std::collections::HashMap;

use crate::alert::{should_alert, Notifier, PrefStore, PreferenceSet};
use crate::feed::proto::{ChainId, ChainInfo, Frame, Height, SourceId, SourceInfo};
use crate::state::{classify, ApplyError, Delta, Health, Observation, Registry, StateMatrix};

pub struct Dashboard<S, N> {
    registry: Registry,
    matrix: StateMatrix,
    prefs: PreferenceSet<S>,
    notifier: N,
}

/// Render-ready state for one (source, chain) cell.
#[derive(Debug, Clone)]
pub struct Cell {
    pub observation: Option<Observation>,
    pub health: Health,
    pub alerts_enabled: bool,
}

/// Read-only view of the full matrix for a View to render. Holds no
/// references into the engine, so rendering can happen while the engine
/// keeps applying frames.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub sources: Vec<SourceInfo>,
    pub chains: Vec<ChainInfo>,
    pub best_height: HashMap<ChainId, Height>,
    cells: HashMap<(SourceId, ChainId), Cell>,
}

impl Snapshot {
    pub fn cell(&self, source: &str, chain: &str) -> Option<&Cell> {
        self.cells.get(&(source.to_string(), chain.to_string()))
    }

    /// How many blocks the pair trails its chain's best height. A pair
    /// with no observation counts from zero, like the original tracker
    /// reported it.
    pub fn behind(&self, source: &str, chain: &str) -> Height {
        let best = self.best_height.get(chain).copied().unwrap_or(0);
        let height = self
            .cell(source, chain)
            .and_then(|cell| cell.observation.as_ref())
            .map(|observation| observation.height)
            .unwrap_or(0);
        best.saturating_sub(height)
    }

    /// For each chain with any data, one observation matching the best
    /// height. Which source it comes from is unspecified when several
    /// are at head.
    pub fn best_observations(&self) -> HashMap<ChainId, Observation> {
        let mut best = HashMap::new();
        for chain in &self.chains {
            let best_height = match self.best_height.get(&chain.id) {
                Some(best) => *best,
                None => continue,
            };
            for source in &self.sources {
                if let Some(cell) = self.cell(&source.id, &chain.id) {
                    if let Some(observation) = &cell.observation {
                        if observation.height == best_height {
                            best.insert(chain.id.clone(), observation.clone());
                            break;
                        }
                    }
                }
            }
        }
        best
    }
}

impl<S: PrefStore, N: Notifier> Dashboard<S, N> {
    pub fn new(prefs: PreferenceSet<S>, notifier: N) -> Dashboard<S, N> {
        Dashboard {
            registry: Registry::new(),
            matrix: StateMatrix::new(),
            prefs,
            notifier,
        }
    }

    /// Apply one decoded frame. Init resets catalog and matrix as a
    /// unit; updates produce a delta and, when the delta qualifies and
    /// the pair is alert-enabled, exactly one notifier play. Unknown
    /// frames are skipped.
    ///
    /// An update naming ids outside the current catalog returns the
    /// `ApplyError` for the caller to report; nothing changes.
    pub fn handle_frame(&mut self, frame: Frame) -> Result<Option<Delta>, ApplyError> {
        match frame {
            Frame::Init { sources, chains } => {
                self.registry.reset(sources, chains);
                self.matrix.reset(&self.registry);
                Ok(None)
            }
            Frame::Update(update) => {
                let delta = self.matrix.apply(
                    &update.source,
                    &update.chain,
                    update.height,
                    &update.hash,
                    update.ts,
                )?;
                if should_alert(&delta, self.prefs.contains(&update.source, &update.chain)) {
                    self.notifier.play();
                }
                Ok(Some(delta))
            }
            Frame::Unknown(_) => Ok(None),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn matrix(&self) -> &StateMatrix {
        &self.matrix
    }

    pub fn alerts_enabled(&self, source: &str, chain: &str) -> bool {
        self.prefs.contains(source, chain)
    }

    /// Flip alerts for a pair and persist immediately. Returns the new
    /// enablement.
    pub fn toggle_alert(&mut self, source: &str, chain: &str) -> bool {
        self.prefs.toggle(source, chain)
    }

    /// Build the render-ready view, classifying every catalog pair
    /// against the clock. Pairs without observations classify missing.
    pub fn snapshot(&self, now: u64) -> Snapshot {
        let mut cells = HashMap::new();
        for chain in self.registry.chains() {
            let best = self.matrix.best_height(&chain.id).unwrap_or(0);
            for source in self.registry.sources() {
                let observation = self.matrix.observation(&source.id, &chain.id);
                let health = classify(observation, best, chain.block_time_secs, now);
                cells.insert(
                    (source.id.clone(), chain.id.clone()),
                    Cell {
                        observation: observation.cloned(),
                        health,
                        alerts_enabled: self.prefs.contains(&source.id, &chain.id),
                    },
                );
            }
        }
        Snapshot {
            sources: self.registry.sources().to_vec(),
            chains: self.registry.chains().to_vec(),
            best_height: self.matrix.best_heights().clone(),
            cells,
        }
    }
}
