//! Package builder.
//!
//! Drives a [`Compiler`] and an [`ArtifactSigner`] for a composed manifest.
//! All work happens in a staging directory inside the output directory; the
//! artifact and its record are only moved into place once every step has
//! succeeded, so a failed build never leaves a partial artifact behind.

use std::path::{Path, PathBuf};

use crate::error::BuildError;
use crate::models::{Artifact, BuildManifest, compute_sha256};
use crate::signing::ArtifactSigner;

use super::compiler::Compiler;

/// Builds artifacts into `<output_dir>/<variant>/`.
pub struct PackageBuilder {
    compiler: Box<dyn Compiler>,
    signer: Box<dyn ArtifactSigner>,
    output_dir: PathBuf,
}

impl PackageBuilder {
    pub fn new(
        compiler: Box<dyn Compiler>,
        signer: Box<dyn ArtifactSigner>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            compiler,
            signer,
            output_dir: output_dir.into(),
        }
    }

    /// Directory the artifact for `manifest` ends up in.
    pub fn variant_dir(&self, manifest: &BuildManifest) -> PathBuf {
        self.output_dir.join(manifest.variant_name().as_str())
    }

    /// Compiles, signs when the manifest carries signing, and publishes the
    /// artifact together with its `artifact.json` record.
    ///
    /// `secrets` are kept out of the compiled artifact. The keystore of the
    /// manifest's signing configuration is always added to them.
    pub async fn build(
        &self,
        sources: &Path,
        manifest: &BuildManifest,
        secrets: &[PathBuf],
    ) -> Result<Artifact, BuildError> {
        if !sources.is_dir() {
            return Err(BuildError::CompilationFailed(format!(
                "Source tree not found: {}",
                sources.display()
            )));
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.output_dir)?;

        tracing::info!(
            "Compiling {} ({}) with {} compiler",
            manifest.application_id(),
            manifest.variant_name(),
            self.compiler.name()
        );
        let mut secrets = secrets.to_vec();
        if let Some(signing) = manifest.signing() {
            secrets.push(signing.credentials().store_file().to_path_buf());
        }
        let compiled = self
            .compiler
            .compile(sources, manifest, staging.path(), &secrets)
            .await?;

        match manifest.signing() {
            Some(signing) => {
                tracing::info!(
                    "Signing with key '{}' using {} signer",
                    signing.alias(),
                    self.signer.name()
                );
                self.signer.sign(&compiled, signing).await?;
            }
            None => tracing::info!("No signing configuration, artifact left unsigned"),
        }

        let file_name = compiled.file_name().ok_or_else(|| {
            BuildError::CompilationFailed(format!(
                "Compiler produced an invalid path: {}",
                compiled.display()
            ))
        })?;
        let variant_dir = self.variant_dir(manifest);

        let artifact = Artifact {
            path: variant_dir.join(file_name),
            variant: manifest.variant_name(),
            signed: manifest.is_signed(),
            sha256: compute_sha256(&compiled).await?,
            size_bytes: tokio::fs::metadata(&compiled).await?.len(),
        };

        let record = serde_json::to_vec_pretty(&artifact)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let staged_record = Artifact::record_path(staging.path());
        tokio::fs::write(&staged_record, record).await?;

        tokio::fs::create_dir_all(&variant_dir).await?;
        tokio::fs::rename(&compiled, &artifact.path).await?;
        if let Err(e) = tokio::fs::rename(&staged_record, Artifact::record_path(&variant_dir)).await {
            if let Err(cleanup) = tokio::fs::remove_file(&artifact.path).await {
                tracing::warn!(
                    "Failed to remove {} after publishing its record failed: {}",
                    artifact.path.display(),
                    cleanup
                );
            }
            return Err(e.into());
        }

        tracing::info!(
            "Artifact written to {} ({} bytes, sha256 {})",
            artifact.path.display(),
            artifact.size_bytes,
            artifact.sha256
        );

        Ok(artifact)
    }
}
