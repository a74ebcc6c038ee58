//! Error types for the Shipwright core library.
//!
//! Each pipeline stage has its own error enum so callers can match on the
//! failure kind. [`ShipwrightError`] unifies them for the pipeline driver and
//! carries the process exit code for each kind.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading signing credentials.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Signing properties file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Signing properties are malformed: '{key}' is missing or empty")]
    Malformed { key: &'static str },

    #[error("Keystore file referenced by storeFile does not exist: {}", .0.display())]
    KeystoreMissing(PathBuf),

    #[error("Failed to read signing properties from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while resolving or composing the build configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Invalid SDK bounds: minSdk ({min_sdk}) <= targetSdk ({target_sdk}) <= compileSdk ({compile_sdk}) must hold"
    )]
    InvalidBounds {
        min_sdk: u32,
        target_sdk: u32,
        compile_sdk: u32,
    },

    #[error("Release builds require a signing configuration")]
    MissingSigning,

    #[error("Unknown build variant '{0}' (expected 'debug' or 'release')")]
    UnknownVariant(String),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Invalid {field} '{value}': expected a reverse-domain name such as com.example.app")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("Toolchain descriptor error: {0}")]
    Descriptor(String),

    #[error("Project configuration error: {0}")]
    ProjectFile(String),
}

/// Failures while producing the artifact.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Compilation failed: {0}")]
    CompilationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error type for the packaging pipeline.
#[derive(Error, Debug)]
pub enum ShipwrightError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

impl ShipwrightError {
    /// Process exit code for this failure kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            ShipwrightError::Credential(CredentialError::NotFound(_)) => 10,
            ShipwrightError::Credential(CredentialError::Malformed { .. }) => 11,
            ShipwrightError::Credential(CredentialError::KeystoreMissing(_)) => 12,
            ShipwrightError::Credential(CredentialError::Read { .. }) => 1,
            ShipwrightError::Config(ConfigError::InvalidBounds { .. }) => 20,
            ShipwrightError::Config(ConfigError::MissingSigning) => 21,
            ShipwrightError::Config(_) => 22,
            ShipwrightError::Build(BuildError::SigningFailed(_)) => 30,
            ShipwrightError::Build(BuildError::CompilationFailed(_)) => 31,
            ShipwrightError::Build(BuildError::Io(_)) => 1,
        }
    }
}

/// Result type alias for Shipwright operations.
pub type Result<T> = std::result::Result<T, ShipwrightError>;
