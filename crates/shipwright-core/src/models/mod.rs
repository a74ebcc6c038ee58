//! Domain models for the packaging pipeline.

pub mod artifact;
pub mod manifest;
pub mod variant;

pub use artifact::*;
pub use manifest::*;
pub use variant::*;
