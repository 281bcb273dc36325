//! blender-aggregate
//!
//! In-process aggregating backend: queries every active source catalog,
//! interleaves their records in blocks and merges their facets into the
//! canonical schema.
pub mod backend;
pub mod blocks;
pub mod facets;

pub use backend::{BlenderBackend, PARTIAL_FAILURE};
pub use blocks::{AdaptiveBlockSize, BlockPlan};
pub use facets::merge_facets;
