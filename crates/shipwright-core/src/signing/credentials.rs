//! Signing credentials and the `key.properties` loader.
//!
//! Credentials are loaded once per build from a properties file and handed
//! to a [`SigningConfig`]. Passwords live in [`SecretString`] so they are
//! zeroized on drop and redacted from `Debug` output.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};

use crate::error::CredentialError;

use super::properties::parse_properties;

pub const KEY_ALIAS: &str = "keyAlias";
pub const KEY_PASSWORD: &str = "keyPassword";
pub const STORE_PASSWORD: &str = "storePassword";
pub const STORE_FILE: &str = "storeFile";

/// Validated signing credentials.
///
/// All four fields are non-empty and the keystore file existed when the
/// value was constructed.
#[derive(Debug)]
pub struct Credentials {
    alias: String,
    key_password: SecretString,
    store_password: SecretString,
    store_file: PathBuf,
}

impl Credentials {
    /// Validates and assembles credentials.
    ///
    /// Fails with `Malformed` for an empty field and `KeystoreMissing` if
    /// `store_file` does not exist.
    pub fn new(
        alias: String,
        key_password: SecretString,
        store_password: SecretString,
        store_file: PathBuf,
    ) -> Result<Self, CredentialError> {
        if alias.trim().is_empty() {
            return Err(CredentialError::Malformed { key: KEY_ALIAS });
        }
        if key_password.expose_secret().trim().is_empty() {
            return Err(CredentialError::Malformed { key: KEY_PASSWORD });
        }
        if store_password.expose_secret().trim().is_empty() {
            return Err(CredentialError::Malformed { key: STORE_PASSWORD });
        }
        if store_file.as_os_str().is_empty() {
            return Err(CredentialError::Malformed { key: STORE_FILE });
        }
        if !store_file.is_file() {
            return Err(CredentialError::KeystoreMissing(store_file));
        }

        Ok(Self {
            alias,
            key_password,
            store_password,
            store_file,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn key_password(&self) -> &SecretString {
        &self.key_password
    }

    pub fn store_password(&self) -> &SecretString {
        &self.store_password
    }

    pub fn store_file(&self) -> &Path {
        &self.store_file
    }
}

/// Signing configuration for a build. Owns its credentials for the build's duration.
#[derive(Debug)]
pub struct SigningConfig {
    credentials: Credentials,
}

impl SigningConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn alias(&self) -> &str {
        self.credentials.alias()
    }
}

impl From<Credentials> for SigningConfig {
    fn from(credentials: Credentials) -> Self {
        Self::new(credentials)
    }
}

/// Loads signing credentials from a `key.properties` file.
///
/// Relative `storeFile` paths resolve against the properties file's
/// directory.
pub fn load(path: &Path) -> Result<Credentials, CredentialError> {
    let root = path.parent().unwrap_or_else(|| Path::new("."));
    load_with_root(path, root)
}

/// Loads signing credentials, resolving a relative `storeFile` against `project_root`.
pub fn load_with_root(path: &Path, project_root: &Path) -> Result<Credentials, CredentialError> {
    if !path.exists() {
        return Err(CredentialError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut properties = parse_properties(&content);

    let mut take = |key: &'static str| -> Result<String, CredentialError> {
        match properties.remove(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(CredentialError::Malformed { key }),
        }
    };

    let alias = take(KEY_ALIAS)?;
    let key_password = SecretString::from(take(KEY_PASSWORD)?);
    let store_password = SecretString::from(take(STORE_PASSWORD)?);
    let store_file = PathBuf::from(take(STORE_FILE)?);

    let store_file = if store_file.is_absolute() {
        store_file
    } else {
        project_root.join(store_file)
    };

    tracing::debug!(
        "Loaded signing credentials for alias '{}' from {}",
        alias,
        path.display()
    );

    Credentials::new(alias, key_password, store_password, store_file)
}

/// Generates `key.properties` content for the given credentials.
///
/// The store file path is written as given, so callers control whether it
/// is absolute or relative.
pub fn render_key_properties(credentials: &Credentials) -> String {
    format!(
        "storePassword={}\n\
         keyPassword={}\n\
         keyAlias={}\n\
         storeFile={}\n",
        escape_value(credentials.store_password().expose_secret()),
        escape_value(credentials.key_password().expose_secret()),
        escape_value(credentials.alias()),
        escape_value(&credentials.store_file().display().to_string()),
    )
}

/// Escapes a value so [`parse_properties`] reads it back unchanged.
fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0c' => out.push_str("\\f"),
            ' ' if i == 0 => out.push_str("\\ "),
            c => out.push(c),
        }
    }
    out
}
