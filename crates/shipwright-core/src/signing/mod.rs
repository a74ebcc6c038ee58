//! Code signing for Android packages.
//!
//! This module provides functionality for:
//! - Loading `key.properties` credentials (the credential store)
//! - JKS keystore inspection and password verification
//! - Signing artifacts natively or through `apksigner`

pub mod credentials;
pub mod keystore;
pub mod properties;
pub mod signer;

pub use credentials::{Credentials, SigningConfig, load, load_with_root, render_key_properties};
pub use keystore::{JksEntry, JksKeystore, KeystoreError, KeystoreType, detect_keystore_type};
pub use signer::{
    ApksignerSigner, ArtifactSigner, NativeSigner, SignatureBlock, read_signature_block,
    unlock_private_key,
};
