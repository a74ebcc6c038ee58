//! Build manifest models.
//!
//! A release manifest always owns a signing configuration; a debug manifest
//! may or may not. The split is encoded in [`BuildManifest`] so the
//! "release without signing" state cannot be constructed.

use serde::Serialize;

use crate::signing::SigningConfig;

use super::{BuildVariant, VariantConfig};

/// Application identity shared by both manifest kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppIdentity {
    pub application_id: String,
    pub namespace: String,
}

/// Manifest for a release build. Signing is mandatory.
#[derive(Debug)]
pub struct ReleaseManifest {
    pub(crate) identity: AppIdentity,
    pub(crate) variant: VariantConfig,
    pub(crate) signing: SigningConfig,
}

impl ReleaseManifest {
    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    pub fn variant(&self) -> &VariantConfig {
        &self.variant
    }

    pub fn signing(&self) -> &SigningConfig {
        &self.signing
    }
}

/// Manifest for a debug build. Signing is optional.
#[derive(Debug)]
pub struct DebugManifest {
    pub(crate) identity: AppIdentity,
    pub(crate) variant: VariantConfig,
    pub(crate) signing: Option<SigningConfig>,
}

impl DebugManifest {
    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    pub fn variant(&self) -> &VariantConfig {
        &self.variant
    }

    pub fn signing(&self) -> Option<&SigningConfig> {
        self.signing.as_ref()
    }
}

/// Composed, immutable build manifest.
#[derive(Debug)]
pub enum BuildManifest {
    Debug(DebugManifest),
    Release(ReleaseManifest),
}

impl BuildManifest {
    pub fn identity(&self) -> &AppIdentity {
        match self {
            BuildManifest::Debug(m) => m.identity(),
            BuildManifest::Release(m) => m.identity(),
        }
    }

    pub fn application_id(&self) -> &str {
        &self.identity().application_id
    }

    pub fn namespace(&self) -> &str {
        &self.identity().namespace
    }

    pub fn variant(&self) -> &VariantConfig {
        match self {
            BuildManifest::Debug(m) => m.variant(),
            BuildManifest::Release(m) => m.variant(),
        }
    }

    pub fn variant_name(&self) -> BuildVariant {
        self.variant().name()
    }

    pub fn signing(&self) -> Option<&SigningConfig> {
        match self {
            BuildManifest::Debug(m) => m.signing(),
            BuildManifest::Release(m) => Some(m.signing()),
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signing().is_some()
    }

    /// Secret-free description embedded in bundles and exported to toolchains.
    pub fn summary(&self) -> ManifestSummary<'_> {
        ManifestSummary {
            application_id: self.application_id(),
            namespace: self.namespace(),
            variant: self.variant(),
            signed: self.is_signed(),
            signing_alias: self.signing().map(SigningConfig::alias),
        }
    }
}

/// Serializable view of a manifest without credentials.
#[derive(Debug, Serialize)]
pub struct ManifestSummary<'a> {
    pub application_id: &'a str,
    pub namespace: &'a str,
    pub variant: &'a VariantConfig,
    pub signed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_alias: Option<&'a str>,
}
