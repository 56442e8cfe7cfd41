//! Configuration- and bundle-level error taxonomy (spec §7).

use thiserror::Error;

/// A non-fatal failure that causes a single publish to be skipped while the
/// source keeps running (spec §7 "Configuration error" / "Bundle error").
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `pdp.json` was present but not valid JSON, or failed schema checks.
    #[error("invalid pdp.json: {0}")]
    InvalidPdpJson(String),
    /// The `pdpId` contains characters outside the allowed set.
    #[error("invalid characters")]
    InvalidPdpId,
    /// Total `.sapl` bytes or file count exceeded the source's caps.
    #[error("size or file-count limit exceeded")]
    LimitExceeded,
    /// A bundle failed a structural or signature check and was skipped.
    #[error("bundle rejected: {0}")]
    BundleRejected(#[from] pdp_bundle::BundleError),
}

/// A fatal failure that prevents a source from being constructed at all
/// (spec §7 "Fatal").
#[derive(Debug, Error)]
pub enum FatalError {
    /// The configured root path does not exist or is not a directory.
    #[error("not a directory")]
    NotADirectory,
    /// The configured `pdpId` contains characters outside the allowed set.
    #[error("invalid characters")]
    InvalidPdpId,
    /// `Unverified` security policy was selected without `acceptRisk`.
    #[error("security policy rejected: unverified bundles require acceptRisk")]
    UnverifiedRiskNotAccepted,
    /// The underlying OS file-watch facility could not be installed.
    #[error("failed to install file watcher: {0}")]
    Watch(String),
}
