//! Packaging pipeline.
//!
//! Stages run in a fixed order: credentials, SDK bounds, variant
//! resolution, manifest composition, then compile/sign/publish. Credentials
//! are loaded first so a missing or malformed `key.properties` fails before
//! any compilation work starts.

pub mod builder;
pub mod compiler;
pub mod composer;
pub mod resolver;

pub use builder::PackageBuilder;
pub use compiler::{ArchiveCompiler, CommandCompiler, Compiler, MANIFEST_ENTRY, manifest_env};
pub use composer::compose;
pub use resolver::{resolve, resolve_variant};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::models::{Artifact, BuildVariant};
use crate::signing::{self, SigningConfig};
use crate::toolchain;

/// Inputs for one packaging run.
#[derive(Debug, Clone)]
pub struct PackageRequest {
    /// Project root, used to find `pubspec.yaml`.
    pub project_root: PathBuf,
    /// Variant name as given by the user (`debug` or `release`).
    pub variant: String,
    pub application_id: String,
    /// Defaults to `application_id`.
    pub namespace: Option<String>,
    /// Location of `key.properties`. Required for release builds; a relative
    /// `storeFile` inside it resolves against its directory.
    pub key_properties: Option<PathBuf>,
    /// Toolchain descriptor supplying SDK bounds.
    pub toolchain: PathBuf,
    /// Source tree handed to the compiler.
    pub sources: PathBuf,
    /// Also sign debug builds when credentials are available.
    pub sign_debug: bool,
}

impl PackageRequest {
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(&self.application_id)
    }
}

/// Runs the full pipeline and returns the published artifact.
pub async fn run(request: &PackageRequest, builder: &PackageBuilder) -> Result<Artifact> {
    let variant: BuildVariant = request
        .variant
        .parse()
        .map_err(|_| ConfigError::UnknownVariant(request.variant.clone()))?;

    tracing::info!(
        "Packaging {} ({}) from {}",
        request.application_id,
        variant,
        request.project_root.display()
    );

    let signing = load_signing(request, variant)?;
    let secrets = secret_paths(request, signing.as_ref());

    let bounds = toolchain::read_sdk_bounds(&request.toolchain, &request.project_root)?;
    tracing::debug!(
        "SDK bounds: min={} target={} compile={} version={} ({})",
        bounds.min_sdk,
        bounds.target_sdk,
        bounds.compile_sdk,
        bounds.version_name,
        bounds.version_code
    );

    let config = resolve_variant(variant, &bounds)?;
    let manifest = compose(&request.application_id, request.namespace(), config, signing)?;

    let artifact = builder.build(&request.sources, &manifest, &secrets).await?;
    Ok(artifact)
}

/// Loads signing for release builds, and for debug builds when requested.
///
/// A release build without a `key.properties` path is reported by the
/// composer as missing signing.
fn load_signing(request: &PackageRequest, variant: BuildVariant) -> Result<Option<SigningConfig>> {
    let wanted = match variant {
        BuildVariant::Release => true,
        BuildVariant::Debug => request.sign_debug,
    };

    match (&request.key_properties, wanted) {
        (Some(path), true) => {
            let credentials = signing::load(path)?;
            tracing::info!("Loaded signing credentials for key '{}'", credentials.alias());
            Ok(Some(credentials.into()))
        }
        _ => Ok(None),
    }
}

/// Files holding signing material that must stay out of the artifact.
///
/// Unsigned builds never load credentials, so the keystore is looked up on a
/// best-effort basis from a readable `key.properties`.
fn secret_paths(request: &PackageRequest, signing: Option<&SigningConfig>) -> Vec<PathBuf> {
    let Some(properties) = &request.key_properties else {
        return Vec::new();
    };

    let store_file = match signing {
        Some(signing) => Some(signing.credentials().store_file().to_path_buf()),
        None => signing::load(properties)
            .ok()
            .map(|credentials| credentials.store_file().to_path_buf()),
    };

    std::iter::once(properties.clone()).chain(store_file).collect()
}
