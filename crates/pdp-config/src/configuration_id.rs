//! The canonical `configurationId` format shared by every source: directory,
//! local bundle, and remote bundle (spec §3 PDPConfiguration, §4.4).

use sha2::Digest;

/// Compute `"<prefix>:<path>@sha256:<hex>"` over `content`. `prefix`
/// distinguishes the originating source kind (`"directory"`, `"bundle"`,
/// `"remote"`); `path` is the source-relative location (a filesystem path
/// or URL) that produced `content`.
#[must_use]
pub fn configuration_id(prefix: &str, path: &str, content: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(content);
    format!("{prefix}:{path}@sha256:{}", hex::encode(hasher.finalize()))
}
