//! Build artifact models.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::BuildVariant;

/// File name of the artifact record written next to each artifact.
pub const ARTIFACT_RECORD_NAME: &str = "artifact.json";

/// A packaged build artifact.
///
/// Holds no timestamps so identical inputs produce identical records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Final location of the artifact.
    pub path: PathBuf,
    pub variant: BuildVariant,
    pub signed: bool,
    /// SHA-256 checksum of the artifact file.
    pub sha256: String,
    /// File size in bytes.
    pub size_bytes: u64,
}

impl Artifact {
    /// Path of the JSON record for an artifact stored in `dir`.
    pub fn record_path(dir: &Path) -> PathBuf {
        dir.join(ARTIFACT_RECORD_NAME)
    }

    /// Reads an artifact record written by the package builder.
    pub fn read_record(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read(path)?;
        serde_json::from_slice(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Infers content type from file extension.
pub fn infer_content_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    let content_type = match extension.as_str() {
        "apk" => "application/vnd.android.package-archive",
        "aab" => "application/octet-stream",
        "tar" => "application/x-tar",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    };

    Some(content_type)
}

/// Computes SHA-256 checksum of a file.
pub async fn compute_sha256(path: &Path) -> std::io::Result<String> {
    use sha2::{Digest, Sha256};
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024]; // 64KB buffer

    loop {
        let bytes_read = file.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
