//! Source/chain catalog
//!
//! The registry is fixed for a session: it is replaced wholesale by each
//! `init` frame and never patched incrementally. Lookups by id go through
//! maps built at reset time, so resolving a (source, chain) pair is O(1)
//! regardless of catalog size.

use std::collections::HashMap;

use crate::feed::proto::{ChainInfo, SourceInfo};

#[derive(Default)]
pub struct Registry {
    sources: Vec<SourceInfo>,
    chains: Vec<ChainInfo>,
    source_index: HashMap<String, usize>,
    chain_index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Replace both catalogs. Any previous contents are gone; callers
    /// that hold per-pair state must reset it alongside.
    pub fn reset(&mut self, sources: Vec<SourceInfo>, chains: Vec<ChainInfo>) {
        self.source_index = sources
            .iter()
            .enumerate()
            .map(|(index, info)| (info.id.clone(), index))
            .collect();
        self.chain_index = chains
            .iter()
            .enumerate()
            .map(|(index, info)| (info.id.clone(), index))
            .collect();
        self.sources = sources;
        self.chains = chains;
    }

    /// Sources in catalog order.
    pub fn sources(&self) -> &[SourceInfo] {
        &self.sources
    }

    /// Chains in catalog order.
    pub fn chains(&self) -> &[ChainInfo] {
        &self.chains
    }

    pub fn source(&self, id: &str) -> Option<&SourceInfo> {
        self.source_index.get(id).map(|&index| &self.sources[index])
    }

    pub fn chain(&self, id: &str) -> Option<&ChainInfo> {
        self.chain_index.get(id).map(|&index| &self.chains[index])
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.source_index.contains_key(id)
    }

    pub fn has_chain(&self, id: &str) -> bool {
        self.chain_index.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testutil::{chain, source};

    #[test]
    fn reset_replaces_wholesale() {
        let mut registry = Registry::new();
        registry.reset(vec![source("a"), source("b")], vec![chain("x", 600)]);
        assert_eq!(registry.sources().len(), 2);
        assert!(registry.has_source("a"));
        assert_eq!(registry.chain("x").unwrap().block_time_secs, 600);

        registry.reset(vec![source("c")], vec![chain("y", 15)]);
        assert!(!registry.has_source("a"), "old catalog must be gone");
        assert!(!registry.has_chain("x"));
        assert!(registry.has_source("c"));
        assert_eq!(registry.sources()[0].id, "c");
    }

    #[test]
    fn lookup_misses() {
        let registry = Registry::new();
        assert!(registry.source("nope").is_none());
        assert!(registry.chain("nope").is_none());
    }
}
