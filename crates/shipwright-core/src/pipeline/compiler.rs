//! Compilation backends.
//!
//! Provides the trait for turning a source tree into an unsigned bundle and
//! two implementations: a deterministic tar bundler and a shell command
//! runner for external toolchains such as `flutter build apk`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use walkdir::{DirEntry, WalkDir};

use crate::error::BuildError;
use crate::models::BuildManifest;

/// Path of the manifest summary inside archive bundles.
pub const MANIFEST_ENTRY: &str = "META-INF/shipwright.json";

/// File names never copied into a bundle: signing material and VCS metadata.
pub const DEFAULT_EXCLUDED_NAMES: &[&str] = &[
    "key.properties",
    "*.jks",
    "*.keystore",
    "*.p12",
    "*.pfx",
    ".git",
    ".dart_tool",
];

/// Trait for compilation backends.
///
/// Implementations write the unsigned artifact into `staging` and return
/// its path. Any failure is a [`BuildError::CompilationFailed`].
///
/// `secrets` lists files holding signing material for this build, such as
/// the configured `key.properties` and its keystore. None of them may end
/// up in the artifact.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Compiles `sources` against `manifest`.
    async fn compile(
        &self,
        sources: &Path,
        manifest: &BuildManifest,
        staging: &Path,
        secrets: &[PathBuf],
    ) -> Result<PathBuf, BuildError>;
}

/// Bundles the source tree into a reproducible tar archive.
///
/// Entries are sorted by path, timestamps and owners are zeroed and modes
/// are normalized to 0644/0755, so the same tree always yields the same
/// bytes. The manifest summary is stored first as [`MANIFEST_ENTRY`].
#[derive(Debug, Clone)]
pub struct ArchiveCompiler {
    excluded_paths: Vec<PathBuf>,
    excluded_names: Vec<glob::Pattern>,
}

impl ArchiveCompiler {
    pub fn new() -> Self {
        let excluded_names = DEFAULT_EXCLUDED_NAMES
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();

        Self {
            excluded_paths: Vec::new(),
            excluded_names,
        }
    }

    /// Excludes a file or directory (and everything below it).
    pub fn exclude_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded_paths.push(path.into());
        self
    }
}

impl Default for ArchiveCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Compiler for ArchiveCompiler {
    fn name(&self) -> &'static str {
        "archive"
    }

    async fn compile(
        &self,
        sources: &Path,
        manifest: &BuildManifest,
        staging: &Path,
        secrets: &[PathBuf],
    ) -> Result<PathBuf, BuildError> {
        let summary = serde_json::to_vec_pretty(&manifest.summary()).map_err(|e| {
            BuildError::CompilationFailed(format!("Failed to serialize manifest: {}", e))
        })?;

        let root = std::fs::canonicalize(sources).map_err(|e| {
            BuildError::CompilationFailed(format!(
                "Source tree {} is not accessible: {}",
                sources.display(),
                e
            ))
        })?;
        let excluded_paths: Vec<PathBuf> = self
            .excluded_paths
            .iter()
            .chain(secrets)
            .filter_map(|p| std::fs::canonicalize(p).ok())
            .collect();
        let excluded_names = self.excluded_names.clone();
        let output = staging.join(format!("app-{}.tar", manifest.variant_name()));

        let out = output.clone();
        let count = tokio::task::spawn_blocking(move || {
            write_bundle(&root, &excluded_paths, &excluded_names, &summary, &out)
        })
        .await
        .map_err(|e| BuildError::CompilationFailed(format!("Bundling task failed: {}", e)))?
        .map_err(|e| match e {
            BuildError::Io(e) => {
                BuildError::CompilationFailed(format!("Failed to write {}: {}", output.display(), e))
            }
            other => other,
        })?;

        tracing::debug!("Bundled {} files into {}", count, output.display());
        Ok(output)
    }
}

/// Writes the tar bundle; returns the number of source files included.
fn write_bundle(
    root: &Path,
    excluded_paths: &[PathBuf],
    excluded_names: &[glob::Pattern],
    summary: &[u8],
    output: &Path,
) -> Result<usize, BuildError> {
    let file = std::fs::File::create(output)?;
    let mut builder = tar::Builder::new(std::io::BufWriter::new(file));
    append_entry(&mut builder, MANIFEST_ENTRY, summary, 0o644)?;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(e, excluded_paths, excluded_names));

    let mut count = 0;
    for entry in walker {
        let entry = entry.map_err(|e| {
            BuildError::CompilationFailed(format!("Failed to walk {}: {}", root.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).map_err(|_| {
            BuildError::CompilationFailed(format!("Unexpected path {}", entry.path().display()))
        })?;
        let name = archive_name(relative)?;
        let data = std::fs::read(entry.path())?;

        append_entry(&mut builder, &name, &data, normalized_mode(&entry))?;
        count += 1;
    }

    let mut writer = builder.into_inner()?;
    writer.flush()?;
    Ok(count)
}

fn is_excluded(entry: &DirEntry, excluded_paths: &[PathBuf], excluded_names: &[glob::Pattern]) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    if excluded_paths.iter().any(|p| p == entry.path()) {
        return true;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| excluded_names.iter().any(|p| p.matches(name)))
}

/// Archive path with `/` separators; non-UTF-8 names are rejected.
fn archive_name(relative: &Path) -> Result<String, BuildError> {
    let parts = relative
        .components()
        .map(|c| {
            c.as_os_str().to_str().ok_or_else(|| {
                BuildError::CompilationFailed(format!(
                    "Non UTF-8 path in source tree: {}",
                    relative.display()
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn normalized_mode(entry: &DirEntry) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    match entry.metadata() {
        Ok(metadata) if metadata.permissions().mode() & 0o111 != 0 => 0o755,
        _ => 0o644,
    }
}

#[cfg(not(unix))]
fn normalized_mode(_entry: &DirEntry) -> u32 {
    0o644
}

fn append_entry<W: Write>(
    builder: &mut tar::Builder<W>,
    path: &str,
    data: &[u8],
    mode: u32,
) -> std::io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    builder.append_data(&mut header, path, data)
}

/// Runs an external toolchain command and picks up the file it produces.
///
/// The manifest is exported through `SHIPWRIGHT_*` environment variables;
/// credentials are never exported.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    command: String,
    artifact_glob: String,
}

impl CommandCompiler {
    /// `artifact_glob` is relative to the source tree.
    pub fn new(command: impl Into<String>, artifact_glob: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            artifact_glob: artifact_glob.into(),
        }
    }

    fn locate_artifact(&self, sources: &Path, manifest: &BuildManifest) -> Result<PathBuf, BuildError> {
        let pattern = sources.join(&self.artifact_glob);
        let pattern = pattern.to_str().ok_or_else(|| {
            BuildError::CompilationFailed("Artifact glob is not valid UTF-8".to_string())
        })?;

        let mut matches: Vec<PathBuf> = glob::glob(pattern)
            .map_err(|e| BuildError::CompilationFailed(format!("Invalid artifact glob: {}", e)))?
            .filter_map(|p| p.ok())
            .filter(|p| p.is_file())
            .collect();
        matches.sort();

        if matches.len() > 1 {
            let variant = manifest.variant_name().as_str();
            matches.retain(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.contains(variant))
            });
        }

        match matches.len() {
            0 => Err(BuildError::CompilationFailed(format!(
                "No artifact matched '{}' after running the build command",
                self.artifact_glob
            ))),
            1 => Ok(matches.remove(0)),
            _ => Err(BuildError::CompilationFailed(format!(
                "Multiple artifacts matched '{}': {}",
                self.artifact_glob,
                matches
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

#[async_trait]
impl Compiler for CommandCompiler {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn compile(
        &self,
        sources: &Path,
        manifest: &BuildManifest,
        staging: &Path,
        secrets: &[PathBuf],
    ) -> Result<PathBuf, BuildError> {
        tracing::info!("Running build command: {}", self.command);

        let output = Command::new("/bin/sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(sources)
            .envs(manifest_env(manifest))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BuildError::CompilationFailed(format!("Failed to run build command: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::CompilationFailed(format!(
                "Build command exited with {}: {}",
                output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                sanitize_tool_output(&tail(&stderr, 20))
            )));
        }

        let produced = self.locate_artifact(sources, manifest)?;
        if is_secret(&produced, secrets) {
            return Err(BuildError::CompilationFailed(format!(
                "Artifact glob '{}' matched signing material",
                self.artifact_glob
            )));
        }
        let extension = produced
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_string();
        let staged = staging.join(format!("app-{}.{}", manifest.variant_name(), extension));
        tokio::fs::copy(&produced, &staged).await.map_err(|e| {
            BuildError::CompilationFailed(format!(
                "Failed to stage {}: {}",
                produced.display(),
                e
            ))
        })?;

        tracing::debug!("Picked up {} from build command", produced.display());
        Ok(staged)
    }
}

fn is_secret(path: &Path, secrets: &[PathBuf]) -> bool {
    let Ok(path) = std::fs::canonicalize(path) else {
        return false;
    };
    secrets
        .iter()
        .filter_map(|s| std::fs::canonicalize(s).ok())
        .any(|s| s == path)
}

/// Environment exported to build commands.
pub fn manifest_env(manifest: &BuildManifest) -> Vec<(String, String)> {
    let variant = manifest.variant();
    let optimization = variant.optimization();

    let mut env = vec![
        ("SHIPWRIGHT_APPLICATION_ID", manifest.application_id().to_string()),
        ("SHIPWRIGHT_NAMESPACE", manifest.namespace().to_string()),
        ("SHIPWRIGHT_VARIANT", variant.name().to_string()),
        ("SHIPWRIGHT_MIN_SDK", variant.min_sdk().to_string()),
        ("SHIPWRIGHT_TARGET_SDK", variant.target_sdk().to_string()),
        ("SHIPWRIGHT_COMPILE_SDK", variant.compile_sdk().to_string()),
        ("SHIPWRIGHT_VERSION_CODE", variant.version_code().to_string()),
        ("SHIPWRIGHT_VERSION_NAME", variant.version_name().to_string()),
        ("SHIPWRIGHT_DEBUGGABLE", optimization.debuggable.to_string()),
        ("SHIPWRIGHT_MINIFY", optimization.minify.to_string()),
        ("SHIPWRIGHT_SHRINK_RESOURCES", optimization.shrink_resources.to_string()),
    ];
    if let Some(ndk) = variant.ndk_version() {
        env.push(("SHIPWRIGHT_NDK_VERSION", ndk.to_string()));
    }

    env.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Last `lines` lines of tool output.
fn tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Masks anything that looks like a password assignment in tool output.
fn sanitize_tool_output(output: &str) -> String {
    match regex_lite::Regex::new(r"(?i)(pass(?:word)?\s*[=:]\s*)\S+") {
        Ok(re) => re.replace_all(output, "${1}***").to_string(),
        Err(_) => output.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{compose, resolve};
    use crate::test_utils::test_sdk_bounds;

    fn debug_manifest() -> BuildManifest {
        let variant = resolve("debug", &test_sdk_bounds()).unwrap();
        compose("com.example.app", "com.example.app", variant, None).unwrap()
    }

    fn entry_names(archive: &Path) -> Vec<String> {
        let file = std::fs::File::open(archive).unwrap();
        let mut archive = tar::Archive::new(file);
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_archive_contains_sorted_sources_and_manifest() {
        let sources = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(sources.path().join("lib/src")).unwrap();
        std::fs::write(sources.path().join("pubspec.yaml"), "name: app\n").unwrap();
        std::fs::write(sources.path().join("lib/main.dart"), "void main() {}\n").unwrap();
        std::fs::write(sources.path().join("lib/src/b.dart"), "b\n").unwrap();
        std::fs::write(sources.path().join("lib/src/a.dart"), "a\n").unwrap();
        let staging = tempfile::tempdir().unwrap();

        let bundle = ArchiveCompiler::new()
            .compile(sources.path(), &debug_manifest(), staging.path(), &[])
            .await
            .unwrap();

        assert_eq!(bundle.file_name().unwrap(), "app-debug.tar");
        assert_eq!(
            entry_names(&bundle),
            vec![
                MANIFEST_ENTRY,
                "lib/main.dart",
                "lib/src/a.dart",
                "lib/src/b.dart",
                "pubspec.yaml",
            ]
        );
    }

    #[tokio::test]
    async fn test_archive_excludes_signing_material() {
        let sources = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(sources.path().join("android/app")).unwrap();
        std::fs::create_dir_all(sources.path().join(".git")).unwrap();
        std::fs::create_dir_all(sources.path().join("build/out")).unwrap();
        std::fs::write(sources.path().join("android/key.properties"), "keyAlias=x\n").unwrap();
        std::fs::write(sources.path().join("android/app/upload.jks"), [0xFE, 0xED]).unwrap();
        std::fs::write(sources.path().join("android/app/build.gradle"), "android {}\n").unwrap();
        std::fs::write(sources.path().join(".git/HEAD"), "ref\n").unwrap();
        std::fs::write(sources.path().join("build/out/old.tar"), "old\n").unwrap();
        let staging = tempfile::tempdir().unwrap();

        let bundle = ArchiveCompiler::new()
            .exclude_path(sources.path().join("build"))
            .compile(sources.path(), &debug_manifest(), staging.path(), &[])
            .await
            .unwrap();

        assert_eq!(
            entry_names(&bundle),
            vec![MANIFEST_ENTRY, "android/app/build.gradle"]
        );
    }

    #[tokio::test]
    async fn test_archive_is_reproducible() {
        let sources = tempfile::tempdir().unwrap();
        std::fs::write(sources.path().join("main.dart"), "void main() {}\n").unwrap();
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let manifest = debug_manifest();

        let a = ArchiveCompiler::new()
            .compile(sources.path(), &manifest, first.path(), &[])
            .await
            .unwrap();
        // Touch the file so its mtime differs
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(sources.path().join("main.dart"), "void main() {}\n").unwrap();
        let b = ArchiveCompiler::new()
            .compile(sources.path(), &manifest, second.path(), &[])
            .await
            .unwrap();

        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }

    #[tokio::test]
    async fn test_archive_missing_sources() {
        let staging = tempfile::tempdir().unwrap();
        let err = ArchiveCompiler::new()
            .compile(&staging.path().join("missing"), &debug_manifest(), staging.path(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::CompilationFailed(_)));
    }

    #[tokio::test]
    async fn test_archive_excludes_configured_secrets() {
        let sources = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(sources.path().join("android/app")).unwrap();
        std::fs::write(sources.path().join("android/release-signing.properties"), "storePassword=s3cret\n").unwrap();
        std::fs::write(sources.path().join("android/app/upload.key"), [0xFE, 0xED]).unwrap();
        std::fs::write(sources.path().join("android/app/build.gradle"), "android {}\n").unwrap();
        let staging = tempfile::tempdir().unwrap();
        let secrets = vec![
            sources.path().join("android/release-signing.properties"),
            sources.path().join("android/app/upload.key"),
        ];

        let bundle = ArchiveCompiler::new()
            .compile(sources.path(), &debug_manifest(), staging.path(), &secrets)
            .await
            .unwrap();

        assert_eq!(
            entry_names(&bundle),
            vec![MANIFEST_ENTRY, "android/app/build.gradle"]
        );
    }

    #[tokio::test]
    async fn test_archive_write_failure_is_compilation_failure() {
        let sources = tempfile::tempdir().unwrap();
        std::fs::write(sources.path().join("main.dart"), "void main() {}\n").unwrap();
        let staging = tempfile::tempdir().unwrap();

        let err = ArchiveCompiler::new()
            .compile(
                sources.path(),
                &debug_manifest(),
                &staging.path().join("gone"),
                &[],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::CompilationFailed(_)));
        assert!(err.to_string().contains("Failed to write"));
    }

    #[test]
    fn test_manifest_env() {
        let env = manifest_env(&debug_manifest());
        let get = |key: &str| env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

        assert_eq!(get("SHIPWRIGHT_APPLICATION_ID"), Some("com.example.app"));
        assert_eq!(get("SHIPWRIGHT_VARIANT"), Some("debug"));
        assert_eq!(get("SHIPWRIGHT_MIN_SDK"), Some("21"));
        assert_eq!(get("SHIPWRIGHT_VERSION_CODE"), Some("7"));
        assert_eq!(get("SHIPWRIGHT_DEBUGGABLE"), Some("true"));
        assert_eq!(get("SHIPWRIGHT_NDK_VERSION"), None);
    }

    #[test]
    fn test_sanitize_tool_output() {
        let sanitized = sanitize_tool_output("storePassword=hunter2 and key pass: abc");
        assert!(!sanitized.contains("hunter2"));
        assert!(!sanitized.contains("abc"));
        assert_eq!(sanitize_tool_output("BUILD FAILED"), "BUILD FAILED");
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_compiler_picks_up_artifact() {
        let sources = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let compiler = CommandCompiler::new(
            "mkdir -p out && printf '%s' \"$SHIPWRIGHT_APPLICATION_ID\" > out/app-debug.apk",
            "out/*.apk",
        );

        let staged = compiler
            .compile(sources.path(), &debug_manifest(), staging.path(), &[])
            .await
            .unwrap();

        assert_eq!(staged, staging.path().join("app-debug.apk"));
        assert_eq!(std::fs::read_to_string(staged).unwrap(), "com.example.app");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_compiler_prefers_variant_match() {
        let sources = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let compiler = CommandCompiler::new(
            "mkdir -p out && echo d > out/app-debug.apk && echo r > out/app-release.apk",
            "out/*.apk",
        );

        let staged = compiler
            .compile(sources.path(), &debug_manifest(), staging.path(), &[])
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(staged).unwrap(), "d\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_compiler_failure() {
        let sources = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let compiler = CommandCompiler::new("echo 'FAILURE: Build failed' >&2; exit 3", "*.apk");

        let err = compiler
            .compile(sources.path(), &debug_manifest(), staging.path(), &[])
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, BuildError::CompilationFailed(_)));
        assert!(message.contains("exited with 3"));
        assert!(message.contains("FAILURE: Build failed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_compiler_no_artifact() {
        let sources = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let compiler = CommandCompiler::new("true", "out/*.apk");

        let err = compiler
            .compile(sources.path(), &debug_manifest(), staging.path(), &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No artifact matched"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_compiler_refuses_signing_material() {
        let sources = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        std::fs::write(sources.path().join("upload.key"), [0xFE, 0xED]).unwrap();
        let compiler = CommandCompiler::new("true", "*.key");

        let err = compiler
            .compile(
                sources.path(),
                &debug_manifest(),
                staging.path(),
                &[sources.path().join("upload.key")],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::CompilationFailed(_)));
        assert!(!staging.path().join("app-debug.key").exists());
    }
}
