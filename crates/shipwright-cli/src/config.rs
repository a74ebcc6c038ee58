//! CLI configuration resolution.
//!
//! Combines `shipwright.yaml` with environment variables and command-line
//! flags. Priority order: CLI flags > environment variables > project file >
//! defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shipwright_core::config::{CompilerSettings, ProjectConfig, SignerKind};
use shipwright_core::pipeline::{
    ArchiveCompiler, CommandCompiler, Compiler, PackageBuilder, PackageRequest,
};
use shipwright_core::signing::{ApksignerSigner, ArtifactSigner, NativeSigner};

/// Default location of the signing properties, relative to the project root.
pub const DEFAULT_KEY_PROPERTIES: &str = "android/key.properties";
/// Default toolchain descriptor, relative to the project root.
pub const DEFAULT_TOOLCHAIN: &str = "toolchain.yaml";
/// Default output directory, relative to the project root.
pub const DEFAULT_OUTPUT_DIR: &str = "build/shipwright";

const ENV_APPLICATION_ID: &str = "SHIPWRIGHT_APPLICATION_ID";
const ENV_KEY_PROPERTIES: &str = "SHIPWRIGHT_KEY_PROPERTIES";
const ENV_TOOLCHAIN: &str = "SHIPWRIGHT_TOOLCHAIN";
const ENV_OUTPUT_DIR: &str = "SHIPWRIGHT_OUTPUT_DIR";
const ENV_SIGNER: &str = "SHIPWRIGHT_SIGNER";

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigFlags {
    pub application_id: Option<String>,
    pub namespace: Option<String>,
    pub key_properties: Option<PathBuf>,
    pub toolchain: Option<PathBuf>,
    pub sources: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub build_command: Option<String>,
    pub artifact_glob: Option<String>,
    pub signer: Option<SignerKind>,
    pub sign_debug: bool,
}

/// Resolved configuration after applying priority rules.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub project_root: PathBuf,
    pub application_id: Option<String>,
    pub namespace: Option<String>,
    pub key_properties: PathBuf,
    pub toolchain: PathBuf,
    pub sources: PathBuf,
    pub output_dir: PathBuf,
    pub compiler: Option<CompilerSettings>,
    pub signer: SignerKind,
    pub sign_debug: bool,
}

/// Loads `shipwright.yaml` from the project root.
pub fn load_project_config(project_root: &Path) -> Result<Option<ProjectConfig>> {
    ProjectConfig::load(project_root)
        .map_err(shipwright_core::ShipwrightError::from)
        .with_context(|| format!("Failed to load project configuration in {}", project_root.display()))
}

/// Resolve configuration by applying priority rules.
///
/// Paths from the project file are relative to `project_root`; paths from
/// flags and the environment are used as given.
pub fn resolve_config(
    project_root: &Path,
    flags: &ConfigFlags,
    file_config: Option<ProjectConfig>,
) -> Result<ResolvedConfig> {
    let mut resolved = ResolvedConfig {
        project_root: project_root.to_path_buf(),
        application_id: None,
        namespace: None,
        key_properties: project_root.join(DEFAULT_KEY_PROPERTIES),
        toolchain: project_root.join(DEFAULT_TOOLCHAIN),
        sources: project_root.to_path_buf(),
        output_dir: project_root.join(DEFAULT_OUTPUT_DIR),
        compiler: None,
        signer: SignerKind::default(),
        sign_debug: false,
    };

    // Apply project file (lowest priority)
    if let Some(config) = file_config {
        resolved.application_id = config.application_id;
        resolved.namespace = config.namespace;
        if let Some(path) = config.key_properties {
            resolved.key_properties = project_root.join(path);
        }
        if let Some(path) = config.toolchain {
            resolved.toolchain = project_root.join(path);
        }
        if let Some(path) = config.sources {
            resolved.sources = project_root.join(path);
        }
        if let Some(path) = config.output_dir {
            resolved.output_dir = project_root.join(path);
        }
        resolved.compiler = config.compiler;
        resolved.signer = config.signer.unwrap_or_default();
        resolved.sign_debug = config.sign_debug;
    }

    // Apply environment variables (medium priority)
    if let Ok(value) = std::env::var(ENV_APPLICATION_ID) {
        resolved.application_id = Some(value);
    }
    if let Ok(value) = std::env::var(ENV_KEY_PROPERTIES) {
        resolved.key_properties = PathBuf::from(value);
    }
    if let Ok(value) = std::env::var(ENV_TOOLCHAIN) {
        resolved.toolchain = PathBuf::from(value);
    }
    if let Ok(value) = std::env::var(ENV_OUTPUT_DIR) {
        resolved.output_dir = PathBuf::from(value);
    }
    if let Ok(value) = std::env::var(ENV_SIGNER) {
        resolved.signer = value
            .parse()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid {}", ENV_SIGNER))?;
    }

    // Apply CLI flags (highest priority)
    if let Some(value) = &flags.application_id {
        resolved.application_id = Some(value.clone());
    }
    if let Some(value) = &flags.namespace {
        resolved.namespace = Some(value.clone());
    }
    if let Some(path) = &flags.key_properties {
        resolved.key_properties = path.clone();
    }
    if let Some(path) = &flags.toolchain {
        resolved.toolchain = path.clone();
    }
    if let Some(path) = &flags.sources {
        resolved.sources = path.clone();
    }
    if let Some(path) = &flags.output_dir {
        resolved.output_dir = path.clone();
    }
    if let Some(command) = &flags.build_command {
        let artifact_glob = flags
            .artifact_glob
            .clone()
            .or_else(|| resolved.compiler.as_ref().map(|c| c.artifact_glob.clone()))
            .context("--build-command requires --artifact-glob")?;
        resolved.compiler = Some(CompilerSettings {
            command: command.clone(),
            artifact_glob,
        });
    } else if let (Some(glob), Some(compiler)) = (&flags.artifact_glob, resolved.compiler.as_mut()) {
        compiler.artifact_glob = glob.clone();
    }
    if let Some(signer) = flags.signer {
        resolved.signer = signer;
    }
    if flags.sign_debug {
        resolved.sign_debug = true;
    }

    Ok(resolved)
}

impl ResolvedConfig {
    /// Application id, required for building.
    pub fn application_id(&self) -> Result<&str> {
        self.application_id.as_deref().context(
            "No application id configured. Pass --application-id or set application_id in shipwright.yaml",
        )
    }

    pub fn package_request(&self, variant: &str) -> Result<PackageRequest> {
        Ok(PackageRequest {
            project_root: self.project_root.clone(),
            variant: variant.to_string(),
            application_id: self.application_id()?.to_string(),
            namespace: self.namespace.clone(),
            key_properties: Some(self.key_properties.clone()),
            toolchain: self.toolchain.clone(),
            sources: self.sources.clone(),
            sign_debug: self.sign_debug,
        })
    }

    pub fn package_builder(&self) -> PackageBuilder {
        let compiler: Box<dyn Compiler> = match &self.compiler {
            Some(settings) => Box::new(CommandCompiler::new(
                settings.command.clone(),
                settings.artifact_glob.clone(),
            )),
            None => Box::new(ArchiveCompiler::new().exclude_path(self.output_dir.clone())),
        };
        let signer: Box<dyn ArtifactSigner> = match self.signer {
            SignerKind::Native => Box::new(NativeSigner::new()),
            SignerKind::Apksigner => Box::new(ApksignerSigner::new()),
        };

        PackageBuilder::new(compiler, signer, self.output_dir.clone())
    }
}
