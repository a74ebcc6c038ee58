//! Test utilities for Shipwright integration tests.
//!
//! Builds JKS keystores and project trees on disk so tests can exercise the
//! full pipeline without `keytool`.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::SdkBounds;
use crate::signing::keystore::{
    JKS_MAGIC, KEY_PROTECTOR_OID, key_check, password_bytes, store_digest, xor_keystream,
};

/// Store password used by [`TestProject`].
pub const TEST_STORE_PASSWORD: &str = "test-store-password";
/// Key password used by [`TestProject`].
pub const TEST_KEY_PASSWORD: &str = "test-key-password";
/// Key alias used by [`TestProject`].
pub const TEST_KEY_ALIAS: &str = "upload";

/// A single-entry JKS keystore.
#[derive(Debug, Clone)]
pub struct JksFixture {
    store_password: String,
    alias: String,
    key_password: String,
    private_key: Vec<u8>,
}

impl JksFixture {
    /// Creates a keystore with a deterministic private key derived from the alias.
    pub fn new(store_password: &str, alias: &str, key_password: &str) -> Self {
        // Shaped like a PKCS#8 PrivateKeyInfo; only the bytes matter here.
        let mut private_key = vec![0x30, 0x42];
        private_key.extend_from_slice(&Sha256::digest(format!("private-key:{}", alias).as_bytes()));
        private_key.extend_from_slice(&Sha256::digest(format!("private-key-2:{}", alias).as_bytes()));
        private_key.extend_from_slice(&[0x01, 0x02]);

        Self {
            store_password: store_password.to_string(),
            alias: alias.to_string(),
            key_password: key_password.to_string(),
            private_key,
        }
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    /// Serializes the keystore in JKS version 2 format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&JKS_MAGIC.to_be_bytes());
        body.extend_from_slice(&2u32.to_be_bytes());
        body.extend_from_slice(&1u32.to_be_bytes());

        // Private key entry
        body.extend_from_slice(&1u32.to_be_bytes());
        write_utf(&mut body, &self.alias);
        body.extend_from_slice(&1_700_000_000_000u64.to_be_bytes());

        let protected = self.protected_key();
        body.extend_from_slice(&(protected.len() as u32).to_be_bytes());
        body.extend_from_slice(&protected);

        let certificate = Sha256::digest(format!("certificate:{}", self.alias).as_bytes());
        body.extend_from_slice(&1u32.to_be_bytes());
        write_utf(&mut body, "X.509");
        body.extend_from_slice(&(certificate.len() as u32).to_be_bytes());
        body.extend_from_slice(&certificate);

        let digest = store_digest(&self.store_password, &body);
        body.extend_from_slice(&digest);
        body
    }

    /// Writes the keystore to `path`.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_bytes())
    }

    /// DER `EncryptedPrivateKeyInfo` using the JKS key protector.
    fn protected_key(&self) -> Vec<u8> {
        let password = password_bytes(&self.key_password);
        let salt: Vec<u8> = Sha256::digest(format!("salt:{}", self.alias).as_bytes())[..20].to_vec();
        let stream = xor_keystream(&password, &salt, self.private_key.len());

        let mut encrypted = salt.clone();
        encrypted.extend(self.private_key.iter().zip(stream.iter()).map(|(p, k)| p ^ k));
        encrypted.extend_from_slice(&key_check(&password, &self.private_key));

        let mut algorithm = der(0x06, KEY_PROTECTOR_OID);
        algorithm.extend_from_slice(&[0x05, 0x00]);
        let mut info = der(0x30, &algorithm);
        info.extend_from_slice(&der(0x04, &encrypted));
        der(0x30, &info)
    }
}

fn write_utf(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
}

fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xFF {
        out.extend_from_slice(&[0x81, len as u8]);
    } else {
        out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]);
    }
    out.extend_from_slice(content);
    out
}

/// SDK bounds used across tests: minSdk 21, targetSdk 34, compileSdk 34.
pub fn test_sdk_bounds() -> SdkBounds {
    SdkBounds {
        min_sdk: 21,
        target_sdk: 34,
        compile_sdk: 34,
        version_code: 7,
        version_name: "1.2.0".to_string(),
        ndk_version: None,
    }
}

/// A Flutter-style project laid out in a temporary directory.
///
/// ```text
/// <root>/
///   pubspec.yaml
///   lib/main.dart
///   assets/logo.txt
///   toolchain.yaml
///   android/key.properties
///   android/app/upload-keystore.jks
/// ```
pub struct TestProject {
    dir: tempfile::TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp project");
        let root = dir.path();

        std::fs::create_dir_all(root.join("lib")).unwrap();
        std::fs::create_dir_all(root.join("assets")).unwrap();
        std::fs::create_dir_all(root.join("android/app")).unwrap();

        std::fs::write(
            root.join("pubspec.yaml"),
            "name: aurora\nversion: 1.2.0+7\n",
        )
        .unwrap();
        std::fs::write(root.join("lib/main.dart"), "void main() {}\n").unwrap();
        std::fs::write(root.join("assets/logo.txt"), "logo\n").unwrap();
        std::fs::write(
            root.join("toolchain.yaml"),
            "minSdkVersion: 21\ntargetSdkVersion: 34\ncompileSdkVersion: 34\n",
        )
        .unwrap();

        JksFixture::new(TEST_STORE_PASSWORD, TEST_KEY_ALIAS, TEST_KEY_PASSWORD)
            .write_to(&root.join("android/app/upload-keystore.jks"))
            .unwrap();

        let project = Self { dir };
        project.write_key_properties(&format!(
            "storePassword={}\nkeyPassword={}\nkeyAlias={}\nstoreFile=app/upload-keystore.jks\n",
            TEST_STORE_PASSWORD, TEST_KEY_PASSWORD, TEST_KEY_ALIAS
        ));
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn key_properties_path(&self) -> PathBuf {
        self.root().join("android/key.properties")
    }

    pub fn toolchain_path(&self) -> PathBuf {
        self.root().join("toolchain.yaml")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("build/shipwright")
    }

    /// Replaces the contents of `android/key.properties`.
    pub fn write_key_properties(&self, content: &str) {
        std::fs::write(self.key_properties_path(), content).unwrap();
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
