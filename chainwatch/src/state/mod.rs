mod classify;
mod matrix;
mod registry;

pub use classify::{classify, Health, FRESH_SECS, MIN_RECHECK_SECS};
pub use matrix::{ApplyError, Delta, Observation, StateMatrix};
pub use registry::Registry;

#[cfg(test)]
pub(crate) mod testutil {
    use crate::feed::proto::{ChainInfo, SourceInfo};

    pub fn source(id: &str) -> SourceInfo {
        SourceInfo {
            id: id.to_string(),
            short_name: id.to_uppercase(),
            full_name: format!("Source {}", id),
        }
    }

    pub fn chain(id: &str, block_time_secs: u32) -> ChainInfo {
        ChainInfo {
            id: id.to_string(),
            full_name: format!("Chain {}", id),
            block_time_secs,
        }
    }
}
