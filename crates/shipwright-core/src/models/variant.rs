//! Build variant models.

use serde::{Deserialize, Serialize};

/// Named build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildVariant {
    Debug,
    Release,
}

impl BuildVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildVariant::Debug => "debug",
            BuildVariant::Release => "release",
        }
    }
}

impl std::str::FromStr for BuildVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(BuildVariant::Debug),
            "release" => Ok(BuildVariant::Release),
            _ => Err(format!("Unknown build variant: {}", s)),
        }
    }
}

impl std::fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// SDK and version values supplied by the toolchain descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkBounds {
    pub min_sdk: u32,
    pub target_sdk: u32,
    pub compile_sdk: u32,
    pub version_code: u32,
    pub version_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndk_version: Option<String>,
}

/// Optimization flags applied per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationFlags {
    pub debuggable: bool,
    pub minify: bool,
    pub shrink_resources: bool,
}

impl OptimizationFlags {
    /// Defaults for a variant: debug builds stay debuggable, release builds are minified.
    pub fn for_variant(variant: BuildVariant) -> Self {
        match variant {
            BuildVariant::Debug => Self {
                debuggable: true,
                minify: false,
                shrink_resources: false,
            },
            BuildVariant::Release => Self {
                debuggable: false,
                minify: true,
                shrink_resources: true,
            },
        }
    }
}

/// A resolved variant. Only constructed by the variant resolver, which
/// guarantees `min_sdk <= target_sdk <= compile_sdk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantConfig {
    pub(crate) name: BuildVariant,
    pub(crate) min_sdk: u32,
    pub(crate) target_sdk: u32,
    pub(crate) compile_sdk: u32,
    pub(crate) version_code: u32,
    pub(crate) version_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) ndk_version: Option<String>,
    pub(crate) optimization: OptimizationFlags,
}

impl VariantConfig {
    pub fn name(&self) -> BuildVariant {
        self.name
    }

    pub fn min_sdk(&self) -> u32 {
        self.min_sdk
    }

    pub fn target_sdk(&self) -> u32 {
        self.target_sdk
    }

    pub fn compile_sdk(&self) -> u32 {
        self.compile_sdk
    }

    pub fn version_code(&self) -> u32 {
        self.version_code
    }

    pub fn version_name(&self) -> &str {
        &self.version_name
    }

    pub fn ndk_version(&self) -> Option<&str> {
        self.ndk_version.as_deref()
    }

    pub fn optimization(&self) -> OptimizationFlags {
        self.optimization
    }

    pub fn is_release(&self) -> bool {
        self.name == BuildVariant::Release
    }
}
