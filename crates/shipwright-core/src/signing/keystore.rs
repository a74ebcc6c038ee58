//! Keystore inspection.
//!
//! Detects the keystore format from its magic bytes and, for Java KeyStore
//! (JKS) files, verifies the store password, the alias and the key password
//! without shelling out to `keytool`.

use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::error::BuildError;

/// JKS magic bytes (`0xFEEDFEED`).
pub const JKS_MAGIC: u32 = 0xFEED_FEED;

/// Whitener appended to the store password when computing the JKS digest.
pub(crate) const JKS_WHITENER: &[u8] = b"Mighty Aphrodite";

/// DER-encoded OID 1.3.6.1.4.1.42.2.17.1.1 (Sun JKS key protector).
pub(crate) const KEY_PROTECTOR_OID: &[u8] = &[
    0x2B, 0x06, 0x01, 0x04, 0x01, 0x2A, 0x02, 0x11, 0x01, 0x01,
];

const SHA1_LEN: usize = 20;

/// Keystore container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeystoreType {
    Jks,
    Pkcs12,
}

impl KeystoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeystoreType::Jks => "jks",
            KeystoreType::Pkcs12 => "pkcs12",
        }
    }
}

impl std::fmt::Display for KeystoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detects the keystore type from its magic bytes.
pub fn detect_keystore_type(data: &[u8]) -> KeystoreType {
    // PKCS12 files start with 0x30 (ASN.1 SEQUENCE)
    // JKS files start with magic bytes 0xFEEDFEED
    if data.len() >= 4 && u32::from_be_bytes([data[0], data[1], data[2], data[3]]) == JKS_MAGIC {
        return KeystoreType::Jks;
    }

    KeystoreType::Pkcs12
}

/// Keystore verification failures. Messages never include passwords.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeystoreError {
    #[error("keystore password was incorrect or the keystore is corrupted")]
    WrongStorePassword,

    #[error("key password was incorrect for alias '{0}'")]
    WrongKeyPassword(String),

    #[error("alias '{0}' not found in keystore")]
    AliasNotFound(String),

    #[error("alias '{0}' is a trusted certificate, not a private key")]
    NotAPrivateKey(String),

    #[error("keystore is not in JKS format")]
    NotJks,

    #[error("unsupported JKS version {0}")]
    UnsupportedVersion(u32),

    #[error("unsupported key protection algorithm")]
    UnsupportedKeyProtection,

    #[error("keystore is truncated or malformed")]
    Truncated,
}

impl From<KeystoreError> for BuildError {
    fn from(err: KeystoreError) -> Self {
        BuildError::SigningFailed(err.to_string())
    }
}

/// An entry stored in a JKS keystore.
#[derive(Debug, Clone)]
pub enum JksEntry {
    PrivateKey {
        alias: String,
        /// DER `EncryptedPrivateKeyInfo` protected with the key password.
        protected_key: Vec<u8>,
        certificate_chain: Vec<Vec<u8>>,
    },
    TrustedCertificate {
        alias: String,
        certificate: Vec<u8>,
    },
}

impl JksEntry {
    pub fn alias(&self) -> &str {
        match self {
            JksEntry::PrivateKey { alias, .. } | JksEntry::TrustedCertificate { alias, .. } => alias,
        }
    }
}

/// A JKS keystore whose integrity has been verified with the store password.
#[derive(Debug, Clone)]
pub struct JksKeystore {
    entries: Vec<JksEntry>,
}

impl JksKeystore {
    /// Opens a JKS keystore, verifying its integrity digest.
    pub fn open(data: &[u8], store_password: &str) -> Result<Self, KeystoreError> {
        if detect_keystore_type(data) != KeystoreType::Jks {
            return Err(KeystoreError::NotJks);
        }
        if data.len() < 12 + SHA1_LEN {
            return Err(KeystoreError::Truncated);
        }

        let (body, stored_digest) = data.split_at(data.len() - SHA1_LEN);
        let computed = store_digest(store_password, body);
        if !bool::from(computed.as_slice().ct_eq(stored_digest)) {
            return Err(KeystoreError::WrongStorePassword);
        }

        let mut reader = Reader::new(body);
        reader.u32()?; // magic
        let version = reader.u32()?;
        if version != 1 && version != 2 {
            return Err(KeystoreError::UnsupportedVersion(version));
        }

        let count = reader.u32()?;
        let mut entries = Vec::new();
        for _ in 0..count {
            let tag = reader.u32()?;
            let alias = reader.utf()?;
            reader.u64()?; // creation timestamp

            match tag {
                1 => {
                    let len = reader.u32()? as usize;
                    let protected_key = reader.bytes(len)?.to_vec();
                    let chain_len = reader.u32()?;
                    let mut certificate_chain = Vec::new();
                    for _ in 0..chain_len {
                        certificate_chain.push(reader.certificate(version)?);
                    }
                    entries.push(JksEntry::PrivateKey {
                        alias,
                        protected_key,
                        certificate_chain,
                    });
                }
                2 => {
                    let certificate = reader.certificate(version)?;
                    entries.push(JksEntry::TrustedCertificate { alias, certificate });
                }
                _ => return Err(KeystoreError::Truncated),
            }
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[JksEntry] {
        &self.entries
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.entries.iter().map(JksEntry::alias).collect()
    }

    /// Recovers the PKCS#8 private key stored under `alias`.
    ///
    /// JKS aliases are case-insensitive.
    pub fn private_key(
        &self,
        alias: &str,
        key_password: &str,
    ) -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.alias().eq_ignore_ascii_case(alias))
            .ok_or_else(|| KeystoreError::AliasNotFound(alias.to_string()))?;

        match entry {
            JksEntry::PrivateKey { protected_key, .. } => {
                let encrypted = encrypted_key_data(protected_key)?;
                recover_key(encrypted, key_password)
                    .ok_or_else(|| KeystoreError::WrongKeyPassword(alias.to_string()))
            }
            JksEntry::TrustedCertificate { .. } => {
                Err(KeystoreError::NotAPrivateKey(alias.to_string()))
            }
        }
    }
}

/// Encodes a password the way Java does: UTF-16 code units, big-endian.
pub(crate) fn password_bytes(password: &str) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(password.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect())
}

/// SHA-1 over password, whitener and keystore body.
pub(crate) fn store_digest(store_password: &str, body: &[u8]) -> [u8; SHA1_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(password_bytes(store_password).as_slice());
    hasher.update(JKS_WHITENER);
    hasher.update(body);
    hasher.finalize().into()
}

/// Produces the key protector keystream: `SHA1(password || previous)` chained from the salt.
pub(crate) fn xor_keystream(password: &[u8], salt: &[u8], len: usize) -> Zeroizing<Vec<u8>> {
    let mut stream = Zeroizing::new(Vec::with_capacity(len));
    let mut digest = salt.to_vec();

    while stream.len() < len {
        let mut hasher = Sha1::new();
        hasher.update(password);
        hasher.update(&digest);
        digest = hasher.finalize().to_vec();
        let take = (len - stream.len()).min(SHA1_LEN);
        stream.extend_from_slice(&digest[..take]);
    }

    stream
}

/// SHA-1 check value stored after the protected key.
pub(crate) fn key_check(password: &[u8], plain_key: &[u8]) -> [u8; SHA1_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(password);
    hasher.update(plain_key);
    hasher.finalize().into()
}

/// Decrypts `salt || encrypted || check`; `None` if the check value does not match.
fn recover_key(encrypted: &[u8], key_password: &str) -> Option<Zeroizing<Vec<u8>>> {
    if encrypted.len() < 2 * SHA1_LEN {
        return None;
    }

    let password = password_bytes(key_password);
    let (salt, rest) = encrypted.split_at(SHA1_LEN);
    let (cipher, check) = rest.split_at(rest.len() - SHA1_LEN);

    let stream = xor_keystream(&password, salt, cipher.len());
    let plain: Zeroizing<Vec<u8>> =
        Zeroizing::new(cipher.iter().zip(stream.iter()).map(|(c, k)| c ^ k).collect());

    let computed = key_check(&password, &plain);
    if bool::from(computed.as_slice().ct_eq(check)) {
        Some(plain)
    } else {
        None
    }
}

/// Extracts the encrypted payload from a DER `EncryptedPrivateKeyInfo`.
fn encrypted_key_data(der: &[u8]) -> Result<&[u8], KeystoreError> {
    let (tag, info, _) = der_element(der)?;
    if tag != 0x30 {
        return Err(KeystoreError::UnsupportedKeyProtection);
    }

    let (tag, algorithm, rest) = der_element(info)?;
    if tag != 0x30 {
        return Err(KeystoreError::UnsupportedKeyProtection);
    }
    let (tag, oid, _) = der_element(algorithm)?;
    if tag != 0x06 || oid != KEY_PROTECTOR_OID {
        return Err(KeystoreError::UnsupportedKeyProtection);
    }

    let (tag, encrypted, _) = der_element(rest)?;
    if tag != 0x04 {
        return Err(KeystoreError::UnsupportedKeyProtection);
    }

    Ok(encrypted)
}

/// Reads one DER element, returning `(tag, content, remainder)`.
fn der_element(data: &[u8]) -> Result<(u8, &[u8], &[u8]), KeystoreError> {
    let (&tag, rest) = data.split_first().ok_or(KeystoreError::Truncated)?;
    let (&first, mut rest) = rest.split_first().ok_or(KeystoreError::Truncated)?;

    let len = if first < 0x80 {
        first as usize
    } else {
        let octets = (first & 0x7F) as usize;
        if octets == 0 || octets > 4 || rest.len() < octets {
            return Err(KeystoreError::Truncated);
        }
        let len = rest[..octets].iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
        rest = &rest[octets..];
        len
    };

    if rest.len() < len {
        return Err(KeystoreError::Truncated);
    }
    let (content, remainder) = rest.split_at(len);
    Ok((tag, content, remainder))
}

/// Big-endian cursor over the keystore body.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], KeystoreError> {
        let end = self.pos.checked_add(len).ok_or(KeystoreError::Truncated)?;
        let slice = self.data.get(self.pos..end).ok_or(KeystoreError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, KeystoreError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, KeystoreError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, KeystoreError> {
        let b = self.bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }

    /// Java modified UTF-8 string. Aliases are ASCII in practice.
    fn utf(&mut self) -> Result<String, KeystoreError> {
        let len = self.u16()? as usize;
        let raw = self.bytes(len)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    fn certificate(&mut self, version: u32) -> Result<Vec<u8>, KeystoreError> {
        if version == 2 {
            self.utf()?; // certificate type, e.g. "X.509"
        }
        let len = self.u32()? as usize;
        Ok(self.bytes(len)?.to_vec())
    }
}
