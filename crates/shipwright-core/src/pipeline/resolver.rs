//! Build variant resolver.
//!
//! Turns a variant name plus toolchain-supplied SDK bounds into a concrete
//! [`VariantConfig`]. Pure: no I/O.

use crate::error::ConfigError;
use crate::models::{BuildVariant, OptimizationFlags, SdkBounds, VariantConfig};

/// Resolves a variant name against SDK bounds.
///
/// Fails with `InvalidBounds` unless `min_sdk <= target_sdk <= compile_sdk`.
pub fn resolve(variant_name: &str, bounds: &SdkBounds) -> Result<VariantConfig, ConfigError> {
    let name: BuildVariant = variant_name
        .parse()
        .map_err(|_| ConfigError::UnknownVariant(variant_name.to_string()))?;

    resolve_variant(name, bounds)
}

/// Resolves an already-parsed variant against SDK bounds.
pub fn resolve_variant(name: BuildVariant, bounds: &SdkBounds) -> Result<VariantConfig, ConfigError> {
    if bounds.min_sdk > bounds.target_sdk || bounds.target_sdk > bounds.compile_sdk {
        return Err(ConfigError::InvalidBounds {
            min_sdk: bounds.min_sdk,
            target_sdk: bounds.target_sdk,
            compile_sdk: bounds.compile_sdk,
        });
    }

    if bounds.version_code == 0 {
        return Err(ConfigError::InvalidVersion(
            "versionCode must be a positive integer".to_string(),
        ));
    }
    if bounds.version_name.trim().is_empty() {
        return Err(ConfigError::InvalidVersion(
            "versionName must not be empty".to_string(),
        ));
    }

    Ok(VariantConfig {
        name,
        min_sdk: bounds.min_sdk,
        target_sdk: bounds.target_sdk,
        compile_sdk: bounds.compile_sdk,
        version_code: bounds.version_code,
        version_name: bounds.version_name.clone(),
        ndk_version: bounds.ndk_version.clone(),
        optimization: OptimizationFlags::for_variant(name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_sdk_bounds;

    fn bounds(min_sdk: u32, target_sdk: u32, compile_sdk: u32) -> SdkBounds {
        SdkBounds {
            min_sdk,
            target_sdk,
            compile_sdk,
            ..test_sdk_bounds()
        }
    }

    #[test]
    fn test_resolve_release() {
        let config = resolve("release", &bounds(21, 34, 34)).unwrap();
        assert_eq!(config.name(), BuildVariant::Release);
        assert_eq!(config.min_sdk(), 21);
        assert_eq!(config.target_sdk(), 34);
        assert_eq!(config.compile_sdk(), 34);
        assert_eq!(config.version_code(), 7);
        assert_eq!(config.version_name(), "1.2.0");
        assert!(config.optimization().minify);
    }

    #[test]
    fn test_resolve_debug() {
        let config = resolve("debug", &bounds(21, 33, 34)).unwrap();
        assert_eq!(config.name(), BuildVariant::Debug);
        assert!(config.optimization().debuggable);
    }

    #[test]
    fn test_equal_bounds_are_valid() {
        assert!(resolve("debug", &bounds(34, 34, 34)).is_ok());
    }

    #[test]
    fn test_min_above_target_is_invalid() {
        for (min, target, compile) in [(22, 21, 34), (35, 34, 34), (34, 21, 34)] {
            let err = resolve("release", &bounds(min, target, compile)).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidBounds { .. }));
        }
    }

    #[test]
    fn test_target_above_compile_is_invalid() {
        for (min, target, compile) in [(21, 35, 34), (21, 34, 33), (1, 100, 99)] {
            let err = resolve("debug", &bounds(min, target, compile)).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidBounds { .. }));
        }
    }

    #[test]
    fn test_invalid_bounds_message_names_values() {
        let err = resolve("release", &bounds(30, 21, 34)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("minSdk (30)"));
        assert!(message.contains("targetSdk (21)"));
    }

    #[test]
    fn test_unknown_variant() {
        let err = resolve("profile", &bounds(21, 34, 34)).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVariant(name) if name == "profile"));
    }

    #[test]
    fn test_zero_version_code_is_invalid() {
        let mut sdk = bounds(21, 34, 34);
        sdk.version_code = 0;
        assert!(matches!(
            resolve("release", &sdk),
            Err(ConfigError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let sdk = bounds(21, 34, 34);
        assert_eq!(resolve("release", &sdk).unwrap(), resolve("release", &sdk).unwrap());
    }
}
