//! blender-results
//!
//! Executes a blended search and shapes the unified response.
pub mod merger;
pub mod sanitize;
pub mod spelling;

pub use merger::{BlendedResponse, ResultMerger, BLENDER_BACKEND_ID};
pub use sanitize::EscapeColons;
pub use spelling::{DefaultSpellingProcessor, SpellingSettings};
