//! Project configuration file (`shipwright.yaml`).
//!
//! Every field is optional; the CLI layers flags and `SHIPWRIGHT_*`
//! environment variables on top of whatever the file provides.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name looked up in the project root.
pub const PROJECT_FILE_NAME: &str = "shipwright.yaml";

/// Contents of `shipwright.yaml`. Paths are relative to the project root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_properties: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// External build command. The archive compiler is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<CompilerSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<SignerKind>,
    #[serde(default)]
    pub sign_debug: bool,
}

/// Settings for the command compiler.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerSettings {
    /// Shell command run in the source tree.
    pub command: String,
    /// Glob, relative to the source tree, matching the produced artifact.
    pub artifact_glob: String,
}

/// Signing backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerKind {
    #[default]
    Native,
    Apksigner,
}

impl SignerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignerKind::Native => "native",
            SignerKind::Apksigner => "apksigner",
        }
    }
}

impl std::fmt::Display for SignerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(SignerKind::Native),
            "apksigner" => Ok(SignerKind::Apksigner),
            other => Err(format!(
                "Unknown signer '{}' (expected 'native' or 'apksigner')",
                other
            )),
        }
    }
}

impl ProjectConfig {
    /// Loads `shipwright.yaml` from `project_root`.
    ///
    /// Returns `Ok(None)` if the file doesn't exist and an error if it exists
    /// but is invalid.
    pub fn load(project_root: &Path) -> Result<Option<Self>, ConfigError> {
        let path = project_root.join(PROJECT_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            ConfigError::ProjectFile(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::from_yaml(&content)?;
        tracing::debug!("Loaded project configuration from {}", path.display());
        Ok(Some(config))
    }

    /// Parses and validates YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: ProjectConfig = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::ProjectFile(format!("Invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let paths = [
            ("key_properties", &self.key_properties),
            ("toolchain", &self.toolchain),
            ("sources", &self.sources),
            ("output_dir", &self.output_dir),
        ];
        for (field, path) in paths {
            if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                return Err(ConfigError::ProjectFile(format!("'{}' must not be empty", field)));
            }
        }

        if let Some(compiler) = &self.compiler {
            if compiler.command.trim().is_empty() {
                return Err(ConfigError::ProjectFile(
                    "'compiler.command' must not be empty".to_string(),
                ));
            }
            glob::Pattern::new(&compiler.artifact_glob).map_err(|e| {
                ConfigError::ProjectFile(format!(
                    "'compiler.artifact_glob' is not a valid glob: {}",
                    e
                ))
            })?;
        }

        Ok(())
    }
}
