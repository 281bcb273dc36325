//! Block sizing and position assignment for record interleaving.

use std::str::FromStr;

use blender_core::config::BlendingConfig;
use blender_core::{Error, Result};

/// `"from-to:size"`: use `size` when the combined hit count is within
/// `from..=to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveBlockSize {
    pub from: u64,
    pub to: u64,
    pub size: usize,
}

impl FromStr for AdaptiveBlockSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidConfig(format!("Invalid adaptive block size: {s}"));
        let (range, size) = s.split_once(':').ok_or_else(invalid)?;
        let size: usize = size.trim().parse().map_err(|_| invalid())?;
        let (from, to) = range.split_once('-').ok_or_else(invalid)?;
        let from: u64 = from.trim().parse().map_err(|_| invalid())?;
        let to: u64 = to.trim().parse().map_err(|_| invalid())?;
        if size == 0 || from > to {
            return Err(invalid());
        }
        Ok(Self { from, to, size })
    }
}

/// Validated interleaving settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPlan {
    pub initial_results: Vec<String>,
    pub block_size: usize,
    pub adaptive: Vec<AdaptiveBlockSize>,
}

impl BlockPlan {
    pub fn from_config(config: &BlendingConfig) -> Result<Self> {
        if config.block_size == 0 {
            return Err(Error::InvalidConfig("Block size must be positive".to_string()));
        }
        let adaptive = config
            .adaptive_block_sizes
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            initial_results: config.initial_results.clone(),
            block_size: config.block_size,
            adaptive,
        })
    }

    /// First adaptive range containing `total`, else the fixed block size.
    pub fn block_size_for(&self, total: u64) -> usize {
        self.adaptive
            .iter()
            .find(|a| a.from <= total && total <= a.to)
            .map_or(self.block_size, |a| a.size)
    }
}

/// Backend supplying the record at `position`: a boosted initial slot if one
/// exists, otherwise the owner of the block containing the position.
pub fn backend_at_position<'a>(
    position: usize,
    block_size: usize,
    backend_ids: &[&'a str],
    initial_results: &[&'a str],
) -> Option<&'a str> {
    if let Some(id) = initial_results.get(position).copied() {
        return Some(id);
    }
    if backend_ids.is_empty() {
        return None;
    }
    let block = position / block_size.max(1);
    Some(backend_ids[block % backend_ids.len()])
}
