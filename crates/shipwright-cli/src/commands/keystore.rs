//! `shipwright inspect-keystore`: list keystore entries.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use secrecy::{ExposeSecret, SecretString};
use shipwright_core::signing::{self, JksEntry, JksKeystore, KeystoreType, detect_keystore_type};
use shipwright_core::{BuildError, ShipwrightError};

#[derive(Args, Debug)]
pub struct InspectKeystoreArgs {
    /// Path to the keystore (.jks, .keystore, .p12)
    #[arg(required_unless_present = "key_properties")]
    pub keystore: Option<PathBuf>,

    /// Read the keystore path and store password from key.properties
    #[arg(long, conflicts_with = "keystore")]
    pub key_properties: Option<PathBuf>,

    /// Keystore password
    #[arg(long, env = "SHIPWRIGHT_STORE_PASSWORD", hide_env_values = true)]
    pub store_password: Option<String>,
}

pub async fn handle_inspect_keystore_command(args: InspectKeystoreArgs) -> Result<()> {
    let (path, password) = match (&args.key_properties, &args.keystore) {
        (Some(properties), _) => {
            let credentials = signing::load(properties).map_err(ShipwrightError::from)?;
            (
                credentials.store_file().to_path_buf(),
                SecretString::from(credentials.store_password().expose_secret().to_string()),
            )
        }
        (None, Some(keystore)) => {
            let Some(password) = args.store_password.clone() else {
                bail!("A store password is required. Pass --store-password or set SHIPWRIGHT_STORE_PASSWORD");
            };
            (keystore.clone(), SecretString::from(password))
        }
        (None, None) => bail!("Pass a keystore path or --key-properties"),
    };

    let data = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let keystore_type = detect_keystore_type(&data);

    println!("Keystore: {}", path.display());
    println!("Type:     {}", keystore_type);

    if keystore_type != KeystoreType::Jks {
        println!("Entries are not listed for {} keystores.", keystore_type);
        return Ok(());
    }

    let keystore = JksKeystore::open(&data, password.expose_secret())
        .map_err(BuildError::from)
        .map_err(ShipwrightError::from)?;

    let entries = keystore.entries();
    println!("Entries:  {}", entries.len());
    println!();
    println!("{:<24} {:<20} {:<12}", "ALIAS", "KIND", "CERTIFICATES");
    println!("{}", "-".repeat(56));

    for entry in entries {
        let (kind, certificates) = match entry {
            JksEntry::PrivateKey {
                certificate_chain, ..
            } => ("PrivateKeyEntry", certificate_chain.len()),
            JksEntry::TrustedCertificate { .. } => ("trustedCertEntry", 1),
        };
        println!("{:<24} {:<20} {:<12}", entry.alias(), kind, certificates);
    }

    Ok(())
}
