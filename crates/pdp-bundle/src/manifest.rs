//! The `MANIFEST` entry: per-file SHA-256 hashes plus an optional Ed25519
//! signature over a canonical serialisation of the manifest (spec §6.4).

use std::collections::BTreeMap;

use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::BundleError;

/// The `MANIFEST` entry of a bundle archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest format version; currently always `"1"`.
    pub version: String,
    /// The hash algorithm used for `files`; currently always `"SHA-256"`.
    #[serde(rename = "hashAlgorithm")]
    pub hash_algorithm: String,
    /// RFC3339 creation timestamp.
    #[serde(rename = "createdAt")]
    pub created_at: String,
    /// File name to lowercase-hex SHA-256 digest, over raw (uncompressed)
    /// entry bytes.
    pub files: BTreeMap<String, String>,
    /// The signature, if this manifest has been signed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<ManifestSignature>,
}

/// An Ed25519 signature over a manifest's canonical signing bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestSignature {
    /// Always `"Ed25519"`.
    pub algorithm: String,
    /// Opaque identifier for the signing key.
    #[serde(rename = "keyId")]
    pub key_id: String,
    /// Base64-encoded raw 64-byte signature.
    pub value: String,
}

impl Manifest {
    /// Build an unsigned manifest over `files` (entry name to raw bytes).
    #[must_use]
    pub fn build(files: &BTreeMap<String, Vec<u8>>, created_at: impl Into<String>) -> Self {
        let hashes = files.iter().map(|(name, bytes)| (name.clone(), hex_sha256(bytes))).collect();
        Self {
            version: "1".to_string(),
            hash_algorithm: "SHA-256".to_string(),
            created_at: created_at.into(),
            files: hashes,
            signature: None,
        }
    }

    /// The canonical signing input: `{version, hashAlgorithm, createdAt,
    /// files}` with file keys sorted ascending, compact separators, UTF-8
    /// (spec §6.4). `files` is a `BTreeMap` so key order is already sorted.
    #[must_use]
    pub fn signing_bytes(&self) -> Vec<u8> {
        let unsigned = serde_json::json!({
            "version": self.version,
            "hashAlgorithm": self.hash_algorithm,
            "createdAt": self.created_at,
            "files": self.files,
        });
        serde_json::to_vec(&unsigned).expect("manifest fields are always serializable")
    }

    /// Sign this manifest with `signing_key`, attaching the resulting
    /// signature under `key_id`.
    pub fn sign(&mut self, signing_key: &ed25519_dalek::SigningKey, key_id: impl Into<String>) {
        let bytes = self.signing_bytes();
        let signature = signing_key.sign(&bytes);
        self.signature = Some(ManifestSignature {
            algorithm: "Ed25519".to_string(),
            key_id: key_id.into(),
            value: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, signature.to_bytes()),
        });
    }

    /// Verify this manifest's signature against `public_key`, and that every
    /// hash it records matches the actual SHA-256 digest of the
    /// corresponding entry in `files`.
    pub fn verify(&self, public_key: &VerifyingKey, files: &BTreeMap<String, Vec<u8>>) -> Result<(), BundleError> {
        let sig = self.signature.as_ref().ok_or(BundleError::SignatureMissing)?;
        if sig.algorithm != "Ed25519" {
            return Err(BundleError::SignatureInvalid(format!("unsupported signature algorithm '{}'", sig.algorithm)));
        }
        let sig_bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &sig.value)
            .map_err(|e| BundleError::SignatureInvalid(e.to_string()))?;
        let sig_bytes: [u8; 64] =
            sig_bytes.try_into().map_err(|_| BundleError::SignatureInvalid("signature is not 64 bytes".to_string()))?;
        let signature = Signature::from_bytes(&sig_bytes);
        public_key
            .verify(&self.signing_bytes(), &signature)
            .map_err(|_| BundleError::SignatureInvalid("signature does not match".to_string()))?;

        for (name, expected_hash) in &self.files {
            let actual = files
                .get(name)
                .ok_or_else(|| BundleError::SignatureInvalid(format!("manifest references missing file '{name}'")))?;
            if !constant_time_eq(&hex_sha256(actual), expected_hash) {
                return Err(BundleError::SignatureInvalid(format!("file '{name}' does not match its manifest hash")));
            }
        }
        Ok(())
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signing_key() -> ed25519_dalek::SigningKey {
        ed25519_dalek::SigningKey::from_bytes(&[7u8; 32])
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let mut files = BTreeMap::new();
        files.insert("pdp.json".to_string(), b"{}".to_vec());
        let key = signing_key();
        let mut manifest = Manifest::build(&files, "2026-01-01T00:00:00Z");
        manifest.sign(&key, "k1");

        let public = key.verifying_key();
        assert!(manifest.verify(&public, &files).is_ok());
    }

    #[test]
    fn tampered_file_fails_verification() {
        let mut files = BTreeMap::new();
        files.insert("pdp.json".to_string(), b"{}".to_vec());
        let key = signing_key();
        let mut manifest = Manifest::build(&files, "2026-01-01T00:00:00Z");
        manifest.sign(&key, "k1");

        files.insert("pdp.json".to_string(), b"{\"tampered\":true}".to_vec());
        let public = key.verifying_key();
        assert!(manifest.verify(&public, &files).is_err());
    }

    #[test]
    fn missing_signature_is_rejected() {
        let mut files = BTreeMap::new();
        files.insert("pdp.json".to_string(), b"{}".to_vec());
        let manifest = Manifest::build(&files, "2026-01-01T00:00:00Z");
        let key = signing_key();
        assert!(manifest.verify(&key.verifying_key(), &files).is_err());
    }
}
