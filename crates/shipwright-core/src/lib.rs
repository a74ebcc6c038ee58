//! Shipwright Core Library
//!
//! Signed application packaging: signing credentials, build variant
//! resolution, manifest composition and the package builder.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod signing;
pub mod toolchain;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{BuildError, ConfigError, CredentialError, Result, ShipwrightError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
