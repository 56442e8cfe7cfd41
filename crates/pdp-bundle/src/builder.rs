//! [`BundleBuilder`]: serialise a `pdp.json` plus `.sapl` documents into a
//! `.saplbundle` ZIP archive, optionally signed (spec §6.4).

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::BundleError;
use crate::manifest::Manifest;

/// Builds a `.saplbundle` archive in memory.
pub struct BundleBuilder {
    pdp_json: Vec<u8>,
    sapl_documents: BTreeMap<String, Vec<u8>>,
    signing_key: Option<(ed25519_dalek::SigningKey, String)>,
    created_at: String,
}

impl BundleBuilder {
    /// Start a new bundle with the given `pdp.json` bytes, stamped with
    /// `created_at` (an RFC3339 timestamp) if a `MANIFEST` ends up written.
    #[must_use]
    pub fn new(pdp_json: Vec<u8>, created_at: impl Into<String>) -> Self {
        Self { pdp_json, sapl_documents: BTreeMap::new(), signing_key: None, created_at: created_at.into() }
    }

    /// Add a `.sapl` document entry.
    #[must_use]
    pub fn with_document(mut self, name: impl Into<String>, contents: Vec<u8>) -> Self {
        self.sapl_documents.insert(name.into(), contents);
        self
    }

    /// Sign the resulting bundle with `signing_key`, writing a `MANIFEST`
    /// entry attributed to `key_id`.
    #[must_use]
    pub fn signed_with(mut self, signing_key: ed25519_dalek::SigningKey, key_id: impl Into<String>) -> Self {
        self.signing_key = Some((signing_key, key_id.into()));
        self
    }

    /// Serialize to ZIP bytes.
    pub fn build(self) -> Result<Vec<u8>, BundleError> {
        let mut all_files: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        all_files.insert("pdp.json".to_string(), self.pdp_json.clone());
        for (name, bytes) in &self.sapl_documents {
            all_files.insert(name.clone(), bytes.clone());
        }

        let manifest = self.signing_key.map(|(key, key_id)| {
            let mut m = Manifest::build(&all_files, self.created_at.clone());
            m.sign(&key, key_id);
            m
        });

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut cursor);
            let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

            zip.start_file("pdp.json", options)?;
            zip.write_all(&self.pdp_json)?;

            for (name, bytes) in &self.sapl_documents {
                zip.start_file(name, options)?;
                zip.write_all(bytes)?;
            }

            if let Some(manifest) = &manifest {
                zip.start_file("MANIFEST", options)?;
                zip.write_all(&serde_json::to_vec(manifest)?)?;
            }

            zip.finish()?;
        }
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::BundleParser;

    #[test]
    fn build_then_parse_round_trips_bytes() {
        let bytes = BundleBuilder::new(b"{\"configurationId\":\"c1\"}".to_vec(), "2026-01-01T00:00:00Z")
            .with_document("policy.sapl", b"policy p1 permit".to_vec())
            .build()
            .expect("build succeeds");

        let bundle = BundleParser::parse(&bytes).expect("parse succeeds");
        assert_eq!(bundle.pdp_json, b"{\"configurationId\":\"c1\"}");
        assert_eq!(bundle.sapl_documents.get("policy.sapl").unwrap(), b"policy p1 permit");
        assert_eq!(bundle.configuration_id(), "c1");
    }

    #[test]
    fn configuration_id_falls_back_to_a_prefixed_digest_without_an_explicit_id() {
        let bytes = BundleBuilder::new(b"{}".to_vec(), "2026-01-01T00:00:00Z")
            .with_document("policy.sapl", b"policy p1 permit".to_vec())
            .build()
            .expect("build succeeds");
        let bundle = BundleParser::parse(&bytes).expect("parse succeeds");
        let id = bundle.configuration_id();
        assert!(id.starts_with("bundle:"));
        assert!(id.contains("@sha256:"));
    }

    #[test]
    fn signed_bundle_verifies_with_matching_key() {
        let key = ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]);
        let bytes = BundleBuilder::new(b"{}".to_vec(), "2026-01-01T00:00:00Z")
            .with_document("policy.sapl", b"policy p1 permit".to_vec())
            .signed_with(key.clone(), "k1")
            .build()
            .expect("build succeeds");

        let bundle = BundleParser::parse(&bytes).expect("parse succeeds");
        assert!(bundle.verify(&key.verifying_key()).is_ok());
    }
}
