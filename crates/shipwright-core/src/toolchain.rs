//! Toolchain descriptor and Flutter project version detection.
//!
//! SDK bounds come from an external descriptor (YAML or JSON) exposing
//! `minSdkVersion`, `targetSdkVersion`, `compileSdkVersion` and optionally
//! `versionCode`, `versionName`, `ndkVersion`. When the version fields are
//! missing they are taken from the Flutter `pubspec.yaml` (`version: 1.2.3+4`).

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::SdkBounds;

/// Flutter uses build number 1 when `pubspec.yaml` has no `+<code>` suffix.
const DEFAULT_VERSION_CODE: u32 = 1;

/// Raw descriptor as written by the external toolchain.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolchainDescriptor {
    min_sdk_version: u32,
    target_sdk_version: u32,
    compile_sdk_version: u32,
    #[serde(default)]
    version_code: Option<u32>,
    #[serde(default)]
    version_name: Option<String>,
    #[serde(default)]
    ndk_version: Option<String>,
}

/// Descriptor serialization format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFormat {
    Yaml,
    Json,
}

impl DescriptorFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DescriptorFormat::Json,
            _ => DescriptorFormat::Yaml,
        }
    }
}

/// Project version declared in `pubspec.yaml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubspecVersion {
    pub name: String,
    pub code: u32,
}

/// Reads SDK bounds from a descriptor file, filling versioning from
/// `pubspec.yaml` in `project_dir` when the descriptor omits it.
pub fn read_sdk_bounds(descriptor: &Path, project_dir: &Path) -> Result<SdkBounds, ConfigError> {
    let content = std::fs::read_to_string(descriptor).map_err(|e| {
        ConfigError::Descriptor(format!("Failed to read {}: {}", descriptor.display(), e))
    })?;

    let pubspec = read_pubspec_version(project_dir);
    parse_sdk_bounds(&content, DescriptorFormat::from_path(descriptor), pubspec)
}

/// Parses descriptor content, using `pubspec` as the version fallback.
pub fn parse_sdk_bounds(
    content: &str,
    format: DescriptorFormat,
    pubspec: Option<PubspecVersion>,
) -> Result<SdkBounds, ConfigError> {
    let descriptor: ToolchainDescriptor = match format {
        DescriptorFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Descriptor(format!("Invalid YAML: {}", e)))?,
        DescriptorFormat::Json => serde_json::from_str(content)
            .map_err(|e| ConfigError::Descriptor(format!("Invalid JSON: {}", e)))?,
    };

    let (version_name, version_code) = match (descriptor.version_name, descriptor.version_code) {
        (Some(name), Some(code)) => (name, code),
        (name, code) => {
            let Some(pubspec) = pubspec else {
                return Err(ConfigError::Descriptor(
                    "versionName/versionCode missing and no pubspec.yaml version found".to_string(),
                ));
            };
            (
                name.unwrap_or(pubspec.name),
                code.unwrap_or(pubspec.code),
            )
        }
    };

    Ok(SdkBounds {
        min_sdk: descriptor.min_sdk_version,
        target_sdk: descriptor.target_sdk_version,
        compile_sdk: descriptor.compile_sdk_version,
        version_code,
        version_name,
        ndk_version: descriptor.ndk_version,
    })
}

/// Gets the version declared in `pubspec.yaml`, if any.
pub fn read_pubspec_version(project_dir: &Path) -> Option<PubspecVersion> {
    let content = std::fs::read_to_string(project_dir.join("pubspec.yaml")).ok()?;
    parse_pubspec_version(&content)
}

/// Parses the top-level `version:` line of a pubspec.
fn parse_pubspec_version(content: &str) -> Option<PubspecVersion> {
    let re = regex_lite::Regex::new(r#"(?m)^version:\s*["']?([^\s"'#+]+)(?:\+(\d+))?"#).ok()?;
    let captures = re.captures(content)?;

    let name = captures.get(1)?.as_str().to_string();
    let code = match captures.get(2) {
        Some(code) => code.as_str().parse().ok()?,
        None => DEFAULT_VERSION_CODE,
    };

    Some(PubspecVersion { name, code })
}

/// Detects if a directory contains a Flutter project.
///
/// A Flutter project is identified by the presence of `pubspec.yaml`.
pub fn is_flutter_project(project_dir: &Path) -> bool {
    project_dir.join("pubspec.yaml").is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_descriptor() {
        let content = "minSdkVersion: 21\ntargetSdkVersion: 34\ncompileSdkVersion: 34\n\
                       versionCode: 12\nversionName: \"2.0.1\"\nndkVersion: 26.1.10909125\n";
        let bounds = parse_sdk_bounds(content, DescriptorFormat::Yaml, None).unwrap();

        assert_eq!(bounds.min_sdk, 21);
        assert_eq!(bounds.target_sdk, 34);
        assert_eq!(bounds.compile_sdk, 34);
        assert_eq!(bounds.version_code, 12);
        assert_eq!(bounds.version_name, "2.0.1");
        assert_eq!(bounds.ndk_version.as_deref(), Some("26.1.10909125"));
    }

    #[test]
    fn test_parse_json_descriptor() {
        let content = r#"{"minSdkVersion": 23, "targetSdkVersion": 35, "compileSdkVersion": 35,
                          "versionCode": 3, "versionName": "0.3.0"}"#;
        let bounds = parse_sdk_bounds(content, DescriptorFormat::Json, None).unwrap();
        assert_eq!(bounds.min_sdk, 23);
        assert_eq!(bounds.version_name, "0.3.0");
        assert!(bounds.ndk_version.is_none());
    }

    #[test]
    fn test_version_falls_back_to_pubspec() {
        let content = "minSdkVersion: 21\ntargetSdkVersion: 34\ncompileSdkVersion: 34\n";
        let pubspec = PubspecVersion {
            name: "1.4.0".to_string(),
            code: 9,
        };
        let bounds = parse_sdk_bounds(content, DescriptorFormat::Yaml, Some(pubspec)).unwrap();
        assert_eq!(bounds.version_name, "1.4.0");
        assert_eq!(bounds.version_code, 9);
    }

    #[test]
    fn test_descriptor_version_overrides_pubspec() {
        let content = "minSdkVersion: 21\ntargetSdkVersion: 34\ncompileSdkVersion: 34\nversionCode: 40\n";
        let pubspec = PubspecVersion {
            name: "1.4.0".to_string(),
            code: 9,
        };
        let bounds = parse_sdk_bounds(content, DescriptorFormat::Yaml, Some(pubspec)).unwrap();
        assert_eq!(bounds.version_name, "1.4.0");
        assert_eq!(bounds.version_code, 40);
    }

    #[test]
    fn test_missing_version_without_pubspec() {
        let content = "minSdkVersion: 21\ntargetSdkVersion: 34\ncompileSdkVersion: 34\n";
        let err = parse_sdk_bounds(content, DescriptorFormat::Yaml, None).unwrap_err();
        assert!(matches!(err, ConfigError::Descriptor(_)));
    }

    #[test]
    fn test_missing_sdk_field_is_descriptor_error() {
        let content = "minSdkVersion: 21\ncompileSdkVersion: 34\n";
        let err = parse_sdk_bounds(content, DescriptorFormat::Yaml, None).unwrap_err();
        assert!(err.to_string().contains("targetSdkVersion"));
    }

    #[test]
    fn test_parse_pubspec_version() {
        assert_eq!(
            parse_pubspec_version("name: aurora\nversion: 1.2.3+45\n"),
            Some(PubspecVersion {
                name: "1.2.3".to_string(),
                code: 45
            })
        );
        assert_eq!(
            parse_pubspec_version("name: aurora\nversion: \"2.0.0\"\n"),
            Some(PubspecVersion {
                name: "2.0.0".to_string(),
                code: 1
            })
        );
        // Nested keys are not the project version
        assert_eq!(
            parse_pubspec_version("environment:\n  version: 3.0.0\n"),
            None
        );
    }

    #[test]
    fn test_descriptor_format_from_path() {
        assert_eq!(DescriptorFormat::from_path(Path::new("sdk.json")), DescriptorFormat::Json);
        assert_eq!(DescriptorFormat::from_path(Path::new("sdk.yaml")), DescriptorFormat::Yaml);
        assert_eq!(DescriptorFormat::from_path(Path::new("sdk")), DescriptorFormat::Yaml);
    }
}
