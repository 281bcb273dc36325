//! blender-core
//!
//! Shared vocabulary of the federated blending engine: filter and query value
//! types, the parameter bag handed to the aggregating backend, collaborator
//! traits, errors and layered configuration.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
