//! `shipwright check`: validate a variant without compiling anything.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use shipwright_core::models::BuildVariant;
use shipwright_core::pipeline::{compose, resolve_variant};
use shipwright_core::signing::{self, KeystoreType, SigningConfig, detect_keystore_type};
use shipwright_core::{ConfigError, ShipwrightError, toolchain};

use super::ProjectFlags;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Build variant (debug or release)
    #[arg(default_value = "release")]
    pub variant: String,

    #[command(flatten)]
    pub project: ProjectFlags,
}

pub async fn handle_check_command(project_root: &Path, args: CheckArgs) -> Result<()> {
    let resolved = args.project.resolve(project_root)?;
    let application_id = resolved.application_id()?;

    let variant: BuildVariant = args
        .variant
        .parse()
        .map_err(|_| ShipwrightError::from(ConfigError::UnknownVariant(args.variant.clone())))?;

    let wants_signing = variant == BuildVariant::Release || resolved.sign_debug;
    let signing = if wants_signing {
        let credentials = signing::load(&resolved.key_properties).map_err(ShipwrightError::from)?;
        check_file_permissions(&resolved.key_properties);

        println!("Signing:");
        println!("  Properties: {}", resolved.key_properties.display());
        println!("  Alias:      {}", credentials.alias());
        println!("  Keystore:   {}", credentials.store_file().display());

        let keystore = tokio::fs::read(credentials.store_file())
            .await
            .with_context(|| format!("Failed to read {}", credentials.store_file().display()))?;
        match detect_keystore_type(&keystore) {
            KeystoreType::Jks => {
                signing::unlock_private_key(&credentials)
                    .await
                    .map_err(ShipwrightError::from)?;
                println!("  Format:     JKS (passwords and alias verified)");
            }
            KeystoreType::Pkcs12 => {
                println!("  Format:     PKCS12 (verified by apksigner at signing time)");
            }
        }
        println!();

        Some(SigningConfig::from(credentials))
    } else {
        None
    };

    if !toolchain::is_flutter_project(project_root) {
        tracing::warn!(
            "No pubspec.yaml in {}; versionName/versionCode must come from the toolchain descriptor",
            project_root.display()
        );
    }
    let bounds = toolchain::read_sdk_bounds(&resolved.toolchain, project_root)
        .map_err(ShipwrightError::from)?;
    let config = resolve_variant(variant, &bounds).map_err(ShipwrightError::from)?;
    let namespace = resolved.namespace.as_deref().unwrap_or(application_id);
    let manifest =
        compose(application_id, namespace, config, signing).map_err(ShipwrightError::from)?;

    let variant = manifest.variant();
    println!("Manifest:");
    println!("  Application id: {}", manifest.application_id());
    println!("  Namespace:      {}", manifest.namespace());
    println!("  Variant:        {}", variant.name());
    println!(
        "  SDK:            min {} / target {} / compile {}",
        variant.min_sdk(),
        variant.target_sdk(),
        variant.compile_sdk()
    );
    println!(
        "  Version:        {} ({})",
        variant.version_name(),
        variant.version_code()
    );
    if let Some(ndk) = variant.ndk_version() {
        println!("  NDK:            {}", ndk);
    }
    println!(
        "  Signed:         {}",
        if manifest.is_signed() { "yes" } else { "no" }
    );
    println!();
    println!("{} Configuration is valid", style("✓").green().bold());

    Ok(())
}

/// Warn if key.properties has overly permissive permissions (on Unix).
#[cfg(unix)]
fn check_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = std::fs::metadata(path) {
        let mode = metadata.permissions().mode();
        // Check if group or others have any permissions
        if mode & 0o077 != 0 {
            eprintln!(
                "{} {} has overly permissive permissions ({:o}). Consider running: chmod 600 {}",
                style("Warning:").yellow(),
                path.display(),
                mode & 0o777,
                path.display()
            );
        }
    }
}

#[cfg(not(unix))]
fn check_file_permissions(_path: &Path) {}
