//! Manifest composer.
//!
//! Merges application identity, the resolved variant and an optional signing
//! configuration into a [`BuildManifest`].

use crate::error::ConfigError;
use crate::models::{
    AppIdentity, BuildManifest, BuildVariant, DebugManifest, ReleaseManifest, VariantConfig,
};
use crate::signing::SigningConfig;

/// Composes a build manifest.
///
/// Release variants require `signing`; debug variants accept either.
pub fn compose(
    application_id: &str,
    namespace: &str,
    variant: VariantConfig,
    signing: Option<SigningConfig>,
) -> Result<BuildManifest, ConfigError> {
    validate_identifier("applicationId", application_id)?;
    validate_identifier("namespace", namespace)?;

    let identity = AppIdentity {
        application_id: application_id.to_string(),
        namespace: namespace.to_string(),
    };

    match variant.name() {
        BuildVariant::Release => {
            let signing = signing.ok_or(ConfigError::MissingSigning)?;
            Ok(BuildManifest::Release(ReleaseManifest {
                identity,
                variant,
                signing,
            }))
        }
        BuildVariant::Debug => Ok(BuildManifest::Debug(DebugManifest {
            identity,
            variant,
            signing,
        })),
    }
}

/// Checks for a reverse-domain name: two or more `.`-separated segments,
/// each starting with an ASCII letter and containing only letters, digits
/// and `_`.
fn validate_identifier(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let valid_segment = |segment: &str| {
        let mut chars = segment.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let segments: Vec<&str> = value.split('.').collect();
    if segments.len() < 2 || !segments.iter().all(|s| valid_segment(s)) {
        return Err(ConfigError::InvalidIdentifier {
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}
