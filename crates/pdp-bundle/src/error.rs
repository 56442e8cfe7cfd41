//! Bundle-level error taxonomy (spec §7 "Bundle error").

use thiserror::Error;

/// Failure modes for building, parsing, and verifying bundles.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The archive contains an entry whose body begins with a ZIP magic
    /// number (spec §4.4.3: nested-archive rejection).
    #[error("bundle contains a nested archive")]
    NestedArchive,
    /// An entry path escapes the archive root.
    #[error("entry path escapes archive root: {0}")]
    PathTraversal(String),
    /// The archive has no `pdp.json` entry.
    #[error("bundle has no pdp.json entry")]
    MissingPdpJson,
    /// Verification was requested but no `MANIFEST` entry was present.
    #[error("bundle signature is missing")]
    SignatureMissing,
    /// Signature or hash verification failed.
    #[error("bundle signature is invalid: {0}")]
    SignatureInvalid(String),
    /// The ZIP container itself is malformed.
    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// Reading or writing archive bytes failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The `MANIFEST` entry is not well-formed JSON.
    #[error("manifest is malformed: {0}")]
    ManifestMalformed(#[from] serde_json::Error),
}
