//! blender-mapping
//!
//! The cross-backend mapping table and the field translator built on it.
pub mod mapping;
pub mod raw;
pub mod translate;

pub use mapping::{BackendFacetMapping, FacetFieldMapping, FacetType, IgnoreRule, MappingTable, RegexRewrite};
pub use raw::RawMappings;
pub use translate::{coerce_bool, TranslatedFilter};
