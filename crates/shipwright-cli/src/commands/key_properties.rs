//! `shipwright key-properties`: generate a key.properties file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use console::style;
use secrecy::SecretString;
use shipwright_core::signing::{self, Credentials, KeystoreType, detect_keystore_type};
use shipwright_core::{CredentialError, ShipwrightError};

use crate::config::DEFAULT_KEY_PROPERTIES;

#[derive(Args, Debug)]
pub struct KeyPropertiesArgs {
    /// Key alias inside the keystore
    #[arg(long)]
    pub alias: String,

    /// Path to the keystore file
    #[arg(long)]
    pub store_file: PathBuf,

    /// Keystore password
    #[arg(long, env = "SHIPWRIGHT_STORE_PASSWORD", hide_env_values = true)]
    pub store_password: String,

    /// Key password (defaults to the keystore password)
    #[arg(long, env = "SHIPWRIGHT_KEY_PASSWORD", hide_env_values = true)]
    pub key_password: Option<String>,

    /// Output file (defaults to android/key.properties in the project)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,

    /// Skip unlocking the keystore before writing
    #[arg(long)]
    pub no_verify: bool,
}

pub async fn handle_key_properties_command(project_root: &Path, args: KeyPropertiesArgs) -> Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| project_root.join(DEFAULT_KEY_PROPERTIES));

    if output.exists() && !args.force {
        bail!(
            "{} already exists. Use --force to overwrite it",
            output.display()
        );
    }

    let store_file = std::fs::canonicalize(&args.store_file)
        .map_err(|_| ShipwrightError::from(CredentialError::KeystoreMissing(args.store_file.clone())))?;
    let key_password = args
        .key_password
        .clone()
        .unwrap_or_else(|| args.store_password.clone());

    let credentials = Credentials::new(
        args.alias.clone(),
        SecretString::from(key_password),
        SecretString::from(args.store_password.clone()),
        store_file,
    )
    .map_err(ShipwrightError::from)?;

    if !args.no_verify {
        verify(&credentials).await?;
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&output, signing::render_key_properties(&credentials))
        .with_context(|| format!("Failed to write {}", output.display()))?;
    restrict_permissions(&output)?;

    // Read it back through the same loader the build uses
    let loaded = signing::load(&output).map_err(ShipwrightError::from)?;

    println!(
        "{} Wrote {} (alias '{}')",
        style("✓").green().bold(),
        output.display(),
        loaded.alias()
    );
    println!("  Keep this file out of version control.");

    Ok(())
}

async fn verify(credentials: &Credentials) -> Result<()> {
    let data = tokio::fs::read(credentials.store_file())
        .await
        .with_context(|| format!("Failed to read {}", credentials.store_file().display()))?;

    if detect_keystore_type(&data) == KeystoreType::Jks {
        signing::unlock_private_key(credentials)
            .await
            .map_err(ShipwrightError::from)?;
    }

    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
