//! CLI command implementations.

pub mod build;
pub mod check;
pub mod key_properties;
pub mod keystore;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use shipwright_core::config::SignerKind;

use crate::config::{self, ConfigFlags, ResolvedConfig};

/// Flags shared by commands that run the pipeline.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectFlags {
    /// Application id (reverse-domain, e.g. com.example.app)
    #[arg(long)]
    pub application_id: Option<String>,

    /// Kotlin/Java namespace (defaults to the application id)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Path to key.properties
    #[arg(long)]
    pub key_properties: Option<PathBuf>,

    /// Toolchain descriptor with SDK bounds (YAML or JSON)
    #[arg(long)]
    pub toolchain: Option<PathBuf>,

    /// Source tree to package
    #[arg(long)]
    pub sources: Option<PathBuf>,

    /// Output directory
    #[arg(long, short)]
    pub output_dir: Option<PathBuf>,

    /// External build command (e.g. "flutter build apk --release")
    #[arg(long)]
    pub build_command: Option<String>,

    /// Glob matching the artifact produced by --build-command
    #[arg(long)]
    pub artifact_glob: Option<String>,

    /// Signing backend (native or apksigner)
    #[arg(long)]
    pub signer: Option<SignerKind>,

    /// Also sign debug builds
    #[arg(long)]
    pub sign_debug: bool,
}

impl ProjectFlags {
    fn to_config_flags(&self) -> ConfigFlags {
        ConfigFlags {
            application_id: self.application_id.clone(),
            namespace: self.namespace.clone(),
            key_properties: self.key_properties.clone(),
            toolchain: self.toolchain.clone(),
            sources: self.sources.clone(),
            output_dir: self.output_dir.clone(),
            build_command: self.build_command.clone(),
            artifact_glob: self.artifact_glob.clone(),
            signer: self.signer,
            sign_debug: self.sign_debug,
        }
    }

    /// Loads `shipwright.yaml` and applies environment and flag overrides.
    pub fn resolve(&self, project_root: &Path) -> Result<ResolvedConfig> {
        let file_config = config::load_project_config(project_root)?;
        config::resolve_config(project_root, &self.to_config_flags(), file_config)
    }
}
