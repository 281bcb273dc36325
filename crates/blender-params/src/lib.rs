pub mod builder;
pub mod gate;
pub mod standard;

pub use builder::BlendedParams;
pub use gate::CapabilityGate;
pub use standard::{FacetRequest, StandardParams};
