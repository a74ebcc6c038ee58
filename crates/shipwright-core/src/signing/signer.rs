//! Artifact signing backends.
//!
//! [`NativeSigner`] verifies JKS credentials in-process and appends a
//! signature block to the bundle. [`ApksignerSigner`] delegates to the
//! Android SDK `apksigner` tool for real APK signing schemes.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use tokio::process::Command;
use zeroize::Zeroizing;

use crate::error::BuildError;

use super::credentials::{Credentials, SigningConfig};
use super::keystore::{JksKeystore, KeystoreType, detect_keystore_type};

type HmacSha256 = Hmac<Sha256>;

/// Magic bytes opening a signature block.
pub const SIGNATURE_MAGIC: &[u8; 8] = b"SWSIG\x00\x01\x00";

/// Trait for artifact signing.
///
/// Signers modify the artifact at `artifact` in place. A credential or
/// keystore mismatch must surface as [`BuildError::SigningFailed`].
#[async_trait]
pub trait ArtifactSigner: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Signs the artifact in place.
    async fn sign(&self, artifact: &Path, signing: &SigningConfig) -> Result<(), BuildError>;
}

/// In-process signer for JKS keystores.
///
/// Appends a trailer to the artifact:
///
/// ```text
/// magic (8) | alias length (u16 BE) | alias | HMAC-SHA256 (32) | payload length (u64 BE)
/// ```
///
/// The MAC is keyed by the private key recovered from the keystore, so the
/// block is deterministic for identical inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeSigner;

impl NativeSigner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArtifactSigner for NativeSigner {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn sign(&self, artifact: &Path, signing: &SigningConfig) -> Result<(), BuildError> {
        let credentials = signing.credentials();
        let private_key = unlock_private_key(credentials).await?;

        let mut payload = tokio::fs::read(artifact)
            .await
            .map_err(|e| io_failure("read", artifact, e))?;
        if read_signature_block(&payload).is_some() {
            return Err(BuildError::SigningFailed(format!(
                "{} already carries a signature block",
                artifact.display()
            )));
        }

        let block = signature_block(&payload, &private_key, credentials.alias())?;
        payload.extend_from_slice(&block);
        tokio::fs::write(artifact, &payload)
            .await
            .map_err(|e| io_failure("write", artifact, e))?;

        tracing::debug!(
            "Signed {} with alias '{}'",
            artifact.display(),
            credentials.alias()
        );

        Ok(())
    }
}

/// Opens the JKS keystore named by `credentials` and recovers the private key.
///
/// Fails with [`BuildError::SigningFailed`] on a wrong store or key password,
/// an unknown alias, or a keystore that is not JKS.
pub async fn unlock_private_key(credentials: &Credentials) -> Result<Zeroizing<Vec<u8>>, BuildError> {
    let keystore_data = tokio::fs::read(credentials.store_file())
        .await
        .map_err(|e| io_failure("read", credentials.store_file(), e))?;

    if detect_keystore_type(&keystore_data) != KeystoreType::Jks {
        return Err(BuildError::SigningFailed(format!(
            "{} is not a JKS keystore; use the apksigner backend for PKCS12 keystores",
            credentials.store_file().display()
        )));
    }

    let keystore = JksKeystore::open(&keystore_data, credentials.store_password().expose_secret())?;
    let private_key =
        keystore.private_key(credentials.alias(), credentials.key_password().expose_secret())?;
    Ok(private_key)
}

fn io_failure(action: &str, path: &Path, err: std::io::Error) -> BuildError {
    BuildError::SigningFailed(format!("Failed to {} {}: {}", action, path.display(), err))
}

/// Builds the signature block for `payload`.
fn signature_block(payload: &[u8], key: &[u8], alias: &str) -> Result<Vec<u8>, BuildError> {
    let alias_len = u16::try_from(alias.len())
        .map_err(|_| BuildError::SigningFailed("key alias is too long".to_string()))?;

    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| BuildError::SigningFailed(format!("Invalid signing key: {}", e)))?;
    mac.update(payload);
    let tag = mac.finalize().into_bytes();

    let mut block = Vec::with_capacity(8 + 2 + alias.len() + 32 + 8);
    block.extend_from_slice(SIGNATURE_MAGIC);
    block.extend_from_slice(&alias_len.to_be_bytes());
    block.extend_from_slice(alias.as_bytes());
    block.extend_from_slice(&tag);
    block.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    Ok(block)
}

/// A parsed signature block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBlock {
    pub alias: String,
    pub mac: [u8; 32],
    pub payload_len: u64,
}

/// Reads the trailing signature block from a signed artifact, if present.
pub fn read_signature_block(data: &[u8]) -> Option<SignatureBlock> {
    let len_offset = data.len().checked_sub(8)?;
    let payload_len = u64::from_be_bytes(data[len_offset..].try_into().ok()?);
    let payload_end = usize::try_from(payload_len).ok()?;

    let block = data.get(payload_end..len_offset)?;
    let rest = block.strip_prefix(SIGNATURE_MAGIC.as_slice())?;
    let (alias_len, rest) = rest.split_first_chunk::<2>()?;
    let alias_len = u16::from_be_bytes(*alias_len) as usize;
    if rest.len() != alias_len + 32 {
        return None;
    }

    let (alias, mac) = rest.split_at(alias_len);
    Some(SignatureBlock {
        alias: String::from_utf8(alias.to_vec()).ok()?,
        mac: mac.try_into().ok()?,
        payload_len,
    })
}

/// Signer backed by the Android SDK `apksigner` tool.
///
/// Passwords are passed through environment variables (`env:` syntax) so
/// they never appear on the command line.
#[derive(Debug, Clone)]
pub struct ApksignerSigner {
    program: PathBuf,
}

const STORE_PASS_ENV: &str = "SHIPWRIGHT_KS_PASS";
const KEY_PASS_ENV: &str = "SHIPWRIGHT_KEY_PASS";

impl ApksignerSigner {
    /// Uses `apksigner` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("apksigner")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for `apksigner sign`. Contains no secret values.
    pub fn sign_args(artifact: &Path, signing: &SigningConfig) -> Vec<String> {
        let credentials = signing.credentials();
        vec![
            "sign".to_string(),
            "--ks".to_string(),
            credentials.store_file().display().to_string(),
            "--ks-key-alias".to_string(),
            credentials.alias().to_string(),
            "--ks-pass".to_string(),
            format!("env:{}", STORE_PASS_ENV),
            "--key-pass".to_string(),
            format!("env:{}", KEY_PASS_ENV),
            artifact.display().to_string(),
        ]
    }
}

impl Default for ApksignerSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactSigner for ApksignerSigner {
    fn name(&self) -> &'static str {
        "apksigner"
    }

    async fn sign(&self, artifact: &Path, signing: &SigningConfig) -> Result<(), BuildError> {
        let credentials = signing.credentials();

        let output = Command::new(&self.program)
            .args(Self::sign_args(artifact, signing))
            .env(STORE_PASS_ENV, credentials.store_password().expose_secret())
            .env(KEY_PASS_ENV, credentials.key_password().expose_secret())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                BuildError::SigningFailed(format!(
                    "Failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_apksigner_error(&stderr, credentials.alias()));
        }

        tracing::debug!("apksigner signed {}", artifact.display());
        Ok(())
    }
}

/// Maps `apksigner` error output to a signing failure.
fn classify_apksigner_error(stderr: &str, alias: &str) -> BuildError {
    let lower = stderr.to_lowercase();

    if lower.contains("password was incorrect") || lower.contains("failed to decrypt") {
        return BuildError::SigningFailed("Invalid keystore or key password".to_string());
    }
    if lower.contains("does not contain key with alias")
        || (lower.contains("alias") && lower.contains("not found"))
    {
        return BuildError::SigningFailed(format!("Alias '{}' not found in keystore", alias));
    }
    if lower.contains("invalid keystore format") {
        return BuildError::SigningFailed("Invalid keystore format".to_string());
    }

    let summary = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("unknown error");
    BuildError::SigningFailed(format!("apksigner failed: {}", summary.trim()))
}
