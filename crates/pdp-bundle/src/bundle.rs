//! [`Bundle`]: the in-memory content of a parsed `.saplbundle` archive.

use std::collections::BTreeMap;

use sha2::Digest;

use crate::error::BundleError;
use crate::manifest::Manifest;

/// A parsed bundle: the required `pdp.json`, zero or more `.sapl` documents,
/// and an optional signature manifest (spec §4.4.3, §6.4).
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Raw `pdp.json` bytes.
    pub pdp_json: Vec<u8>,
    /// Entry name to raw bytes for every `*.sapl` document.
    pub sapl_documents: BTreeMap<String, Vec<u8>>,
    /// The `MANIFEST` entry, if present.
    pub manifest: Option<Manifest>,
}

impl Bundle {
    /// A stable identifier for this bundle's content: `pdp.json`'s
    /// `configurationId` field if present, otherwise `"bundle:<hex>@sha256:
    /// <hex>"` over the bundle's content (testable property 5: reparsing
    /// identical bytes always yields the same id). The fallback mirrors
    /// `pdp_config::configuration_id`'s `"<prefix>:<path>@sha256:<hex>"`
    /// shape so an id printed here and one published by a configuration
    /// source look the same; this method has no source path to embed, so it
    /// repeats the digest in both positions.
    #[must_use]
    pub fn configuration_id(&self) -> String {
        if let Some(id) = self.explicit_configuration_id() {
            return id;
        }
        let mut hasher = sha2::Sha256::new();
        hasher.update(&self.pdp_json);
        for (name, bytes) in &self.sapl_documents {
            hasher.update(name.as_bytes());
            hasher.update(bytes);
        }
        let digest = hex::encode(hasher.finalize());
        format!("bundle:{digest}@sha256:{digest}")
    }

    fn explicit_configuration_id(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(&self.pdp_json).ok()?;
        value.get("configurationId")?.as_str().map(str::to_string)
    }

    /// Verify this bundle's `MANIFEST` signature against `public_key`,
    /// including the per-file hash check.
    pub fn verify(&self, public_key: &ed25519_dalek::VerifyingKey) -> Result<(), BundleError> {
        let manifest = self.manifest.as_ref().ok_or(BundleError::SignatureMissing)?;
        let mut files = self.sapl_documents.clone();
        files.insert("pdp.json".to_string(), self.pdp_json.clone());
        manifest.verify(public_key, &files)
    }
}
