//! [`BundleParser`]: validate and decode `.saplbundle` archive bytes into a
//! [`Bundle`] (spec §4.4.3).

use std::collections::BTreeMap;
use std::io::Read;

use crate::bundle::Bundle;
use crate::error::BundleError;
use crate::manifest::Manifest;

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Parses and validates `.saplbundle` archive bytes.
pub struct BundleParser;

impl BundleParser {
    /// Parse `bytes` as a ZIP archive, enforcing the path-traversal and
    /// nested-archive checks before accepting any entry.
    pub fn parse(bytes: &[u8]) -> Result<Bundle, BundleError> {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;

        let mut files = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();
            validate_entry_path(&name)?;

            let mut contents = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut contents)?;
            if contents.len() >= ZIP_MAGIC.len() && contents[..ZIP_MAGIC.len()] == ZIP_MAGIC {
                return Err(BundleError::NestedArchive);
            }
            files.insert(name, contents);
        }

        let pdp_json = files.remove("pdp.json").ok_or(BundleError::MissingPdpJson)?;
        let manifest = match files.remove("MANIFEST") {
            Some(bytes) => Some(serde_json::from_slice::<Manifest>(&bytes)?),
            None => None,
        };
        let sapl_documents = files.into_iter().filter(|(name, _)| name.ends_with(".sapl")).collect();

        Ok(Bundle { pdp_json, sapl_documents, manifest })
    }
}

fn validate_entry_path(name: &str) -> Result<(), BundleError> {
    if name.contains("..") || name.starts_with('/') || name.contains('\\') {
        return Err(BundleError::PathTraversal(name.to_string()));
    }
    Ok(())
}
